pub mod batch;
pub mod import;
pub mod kuma;
pub mod server;
pub mod services;
pub mod version;
pub mod web;

#[cfg(test)]
mod test_support;
