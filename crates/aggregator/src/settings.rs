//! Layered configuration loading
//!
//! Defaults, then an optional TOML/JSON file, then `YIELD__`-prefixed environment
//! variables (`YIELD__REFRESH__INTERVAL_SECS=30`).

use config::{Config, Environment, File};
use std::path::Path;
use tracing::info;

use yield_core::{ConfigError, ConfigResult, DashboardConfig};

pub const ENV_PREFIX: &str = "YIELD";
pub const DEFAULT_CONFIG_FILE: &str = "yield-dashboard";

/// Load and validate configuration. An explicit `path` must exist; without one,
/// `yield-dashboard.{toml,json}` in the working directory is used when present.
pub fn load_settings(path: Option<&Path>) -> ConfigResult<DashboardConfig> {
    let defaults = Config::try_from(&DashboardConfig::default()).map_err(load_error)?;

    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let config: DashboardConfig = Config::builder()
        .add_source(defaults)
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(load_error)?
        .try_deserialize()
        .map_err(load_error)?;

    config.validate()?;
    info!(
        rpc = %config.rpc.http_url,
        interval_secs = config.refresh.interval_secs,
        "Configuration loaded"
    );
    Ok(config)
}

fn load_error(e: config::ConfigError) -> ConfigError {
    ConfigError::Load(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_settings(None).unwrap();
        assert_eq!(config.refresh.interval_secs, 15);
        assert_eq!(config.protocols.benqi.markets.len(), 5);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = temp_file(
            "override.toml",
            "[refresh]\ninterval_secs = 60\n\n[protocols.silo]\nenabled = false\n",
        );

        let config = load_settings(Some(&path)).unwrap();
        assert_eq!(config.refresh.interval_secs, 60);
        assert!(!config.protocols.silo.enabled);
        assert_eq!(config.price.ttl_secs, 30);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let path = temp_file("invalid.toml", "[refresh]\ninterval_secs = 0\n");
        assert!(matches!(load_settings(Some(&path)), Err(ConfigError::Invalid(_))));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_explicit_file() {
        let path = std::env::temp_dir().join("does-not-exist-yield.toml");
        assert!(matches!(load_settings(Some(&path)), Err(ConfigError::Load(_))));
    }
}
