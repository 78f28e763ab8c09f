//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::RouterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// File looked for in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "router.toml";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Pick the config file: the explicit path (from `--config` or its
/// environment variable), then `./router.toml`. Returns `None` when no
/// candidate exists.
pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
    fallback.exists().then_some(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reports_all_validation_errors() {
        let err = parse_config(
            r#"
            [execution]
            timeout_secs = 0

            [[routes]]
            pattern = "^/("
            name = "broken"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse_config(include_str!("../../router.example.toml")).unwrap();
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].stages, vec!["not_found"]);
    }

    #[test]
    fn parse_rejects_bad_toml() {
        assert!(matches!(parse_config("routes = 7"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(locate_config(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
