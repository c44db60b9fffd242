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
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BodyMode, CacheMode, CacheScope};
    use std::io::Write;

    const SAMPLE: &str = r#"
[upstream]
base_url = "http://127.0.0.1:9000"
api_prefix = "/api/v2"

[session]
cookie_name = "sid"

[[routes]]
name = "space-detail"
method = "GET"
path = "/spaces/{id}"
upstream_path = "/spaces/{id}"
cache = { ttl_secs = 600, tags = ["student:spaces:detail:{id}"], scope = "session" }

[[routes]]
name = "space-update"
method = "PATCH"
path = "/spaces/{id}"
upstream_path = "/spaces/{id}"
body = "json"
invalidates = ["student:spaces:detail:{id}"]

[[routes]]
name = "departments"
method = "GET"
path = "/admin/departments"
upstream_path = "/departments"
forward_query = true
cache = { mode = "dynamic", max_ttl_secs = 120, tags = ["admin:departments"] }
"#;

    #[test]
    fn parses_sample_config() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.upstream.api_prefix, "/api/v2");
        assert_eq!(config.session.cookie_name, "sid");
        // Untouched sections fall back to defaults
        assert_eq!(config.session.auth_scheme, "Bearer");
        assert_eq!(config.routes.len(), 3);

        let detail = &config.routes[0];
        assert!(detail.auth);
        assert!(!detail.forward_query);
        let cache = detail.cache.as_ref().unwrap();
        assert_eq!(cache.mode, CacheMode::Ttl);
        assert_eq!(cache.ttl_secs, Some(600));
        assert_eq!(cache.scope, CacheScope::Session);

        assert_eq!(config.routes[1].body, BodyMode::Json);
        assert_eq!(config.routes[2].cache.as_ref().unwrap().mode, CacheMode::Dynamic);
    }

    #[test]
    fn rejects_invalid_toml() {
        let err = parse_config("[upstream\nbase_url = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reports_validation_errors() {
        let content = r#"
[[routes]]
name = "upload"
method = "POST"
path = "/files"
upstream_path = "/files"
streaming = true
cache = { ttl_secs = 10, tags = ["files"] }
"#;
        let err = parse_config(content).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert!(!errors.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
