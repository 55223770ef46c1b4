/// Build version. CI sets `APP_VERSION` to the release tag; local builds fall
/// back to the crate version.
pub const VERSION: &str = match option_env!("APP_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
