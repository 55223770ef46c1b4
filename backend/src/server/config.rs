use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "KUMA_CONSOLE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub log_dir: String,
    /// Rows returned in the upload preview.
    pub preview_rows: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    upload_dir: Option<String>,
    max_upload_bytes: Option<usize>,
    log_dir: Option<String>,
    preview_rows: Option<usize>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_PREVIEW_ROWS: usize = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl Default for ServerConfig {
    fn default() -> Self {
        Self::merge(PartialServerConfig::default(), PartialServerConfig::default())
    }
}

impl ServerConfig {
    /// Loads the config file (if given and present), then lets `KUMA_CONSOLE_*`
    /// environment variables override it. Anything still unset gets its default.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => read_file_layer(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };
        let env_config: PartialServerConfig = envy::prefixed(ENV_PREFIX).from_env()?;

        let config = Self::merge(file_config, env_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(file_config: PartialServerConfig, env_config: PartialServerConfig) -> Self {
        ServerConfig {
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            upload_dir: env_config
                .upload_dir
                .or(file_config.upload_dir)
                .unwrap_or_else(default_upload_dir),
            max_upload_bytes: env_config
                .max_upload_bytes
                .or(file_config.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            preview_rows: env_config
                .preview_rows
                .or(file_config.preview_rows)
                .unwrap_or(DEFAULT_PREVIEW_ROWS),
            connect_timeout_secs: env_config
                .connect_timeout_secs
                .or(file_config.connect_timeout_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout_secs: env_config
                .request_timeout_secs
                .or(file_config.request_timeout_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".into()));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn read_file_layer(path: &Path) -> Result<PartialServerConfig, ConfigError> {
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let display = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_layer(vars: &[(&str, &str)]) -> PartialServerConfig {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:5000");
        assert_eq!(config.upload_dir, "uploads");
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.preview_rows, 10);
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");
        fs::write(&path, "listen_addr = \"127.0.0.1:9000\"\npreview_rows = 5\n").unwrap();

        let file = read_file_layer(&path).unwrap();
        let env = env_layer(&[("KUMA_CONSOLE_PREVIEW_ROWS", "20"), ("UNRELATED", "x")]);
        let config = ServerConfig::merge(file, env);

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.preview_rows, 20);
        assert_eq!(config.log_dir, "logs");
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let layer = read_file_layer(Path::new("/nonexistent/console.toml")).unwrap();
        assert!(layer.listen_addr.is_none());
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");
        fs::write(&path, "preview_rows = \"many\"").unwrap();
        assert!(matches!(read_file_layer(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let env = env_layer(&[("KUMA_CONSOLE_REQUEST_TIMEOUT_SECS", "0")]);
        let config = ServerConfig::merge(PartialServerConfig::default(), env);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
