//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated.
pub fn default_config() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `NASA_API_KEY` and `GATEWAY_BIND_ADDRESS` on top of file values.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("NASA_API_KEY").filter(|v| !v.is_empty()) {
        config.upstreams.nasa.api_key = key;
    }
    if let Some(addr) = lookup("GATEWAY_BIND_ADDRESS").filter(|v| !v.is_empty()) {
        config.listener.bind_address = addr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            "NASA_API_KEY" => Some("secret".to_string()),
            "GATEWAY_BIND_ADDRESS" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.upstreams.nasa.api_key, "secret");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[timeouts]\nupstream_secs = 0").unwrap();

        let err = load_config(&path).unwrap_err();
        let _ = fs::remove_file(&path);

        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("timeouts.upstream_secs"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
