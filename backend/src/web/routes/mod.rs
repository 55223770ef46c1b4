pub mod import_routes;
pub mod monitor_routes;
