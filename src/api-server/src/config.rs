//! Application Configuration
//!
//! This module defines the configuration structure for the substitution-plan
//! API server. It uses the `config` crate to layer built-in defaults, optional
//! configuration files, `APP__*` environment variables and the plain
//! `API_PREFIX_DIR` / `API_PORT` / `DEBUG` variables the service has always
//! been deployed with.
//!
//! The loaded [`Config`] is constructed once at boot and handed to discovery,
//! the dispatchers and the router explicitly.

use serde::Deserialize;

use crate::error::{ApiError, Result};

/// Main configuration for the application
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: String,
    /// Registers debug-only endpoints and enables verbose error envelopes
    #[serde(default)]
    pub debug: bool,
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub graphql: GraphQLConfig,
    #[serde(default)]
    pub legacy: LegacyConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// REST/GraphQL path layout
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Prefix put in front of every registered endpoint, e.g. `/api`
    #[serde(default)]
    pub prefix: String,
}

/// GraphQL schema sources and tooling
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLConfig {
    /// Extra directory scanned for `*.graphql` fragments next to the bundled ones
    pub schema_dir: Option<String>,
    /// Serve GraphiQL on `GET {prefix}/graphql` (debug mode only)
    #[serde(default = "default_true")]
    pub playground: bool,
}

/// Legacy substitution-plan endpoint used by the old mobile clients
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub path: String,
    /// Expected value of the `SEC` query parameter
    pub secure_hash: Option<String>,
    /// Expected value of the `PW` query parameter
    pub password_hash: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from defaults, config files and environment variables
    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let builder = config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("debug", false)?
            .set_default("server.host", ServerConfig::default().host)?
            .set_default("server.port", ServerConfig::default().port)?
            .set_default("api.prefix", ApiConfig::default().prefix)?
            .set_default("graphql.playground", true)?
            .set_default("legacy.enabled", true)?
            .set_default("legacy.path", LegacyConfig::default().path)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::File::with_name(&format!("config/environments/{}", environment))
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .set_override_option("api.prefix", std::env::var("API_PREFIX_DIR").ok())?
            .set_override_option("server.port", std::env::var("API_PORT").ok())?
            .set_override_option("debug", std::env::var("DEBUG").ok())?;

        builder.build()?.try_deserialize()
    }

    /// Check if the environment is development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Check if the environment is production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Normalised API prefix: empty, or starting with `/` and without trailing `/`
    pub fn api_prefix(&self) -> String {
        normalize_prefix(&self.api.prefix)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 && self.is_production() {
            return Err(ApiError::configuration(
                "server.port must be set in production",
            ));
        }

        if self.api.prefix.contains(char::is_whitespace) {
            return Err(ApiError::configuration(format!(
                "api.prefix must not contain whitespace: {:?}",
                self.api.prefix
            )));
        }

        if self.legacy.enabled {
            if !self.legacy.path.starts_with('/') {
                return Err(ApiError::configuration(
                    "legacy.path must start with a \"/\"",
                ));
            }
            if self.is_production()
                && (self.legacy.secure_hash.is_none() || self.legacy.password_hash.is_none())
            {
                return Err(ApiError::configuration(
                    "legacy.secure_hash and legacy.password_hash are required in production",
                ));
            }
        }

        Ok(())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

// Default implementations for sub-configurations

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            debug: false,
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            graphql: GraphQLConfig::default(),
            legacy: LegacyConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: "/api".to_string(),
        }
    }
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            schema_dir: None,
            playground: true,
        }
    }
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/legacy/vertretungsplan".to_string(),
            secure_hash: None,
            password_hash: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_config_from_env_with_defaults() {
        let config = Config::from_env();
        assert!(config.is_ok());
    }

    #[rstest]
    #[case("", "")]
    #[case("/", "")]
    #[case("api", "/api")]
    #[case("/api", "/api")]
    #[case("/api/", "/api")]
    #[case("api/v2/", "/api/v2")]
    fn test_prefix_normalization(#[case] raw: &str, #[case] expected: &str) {
        let mut config = Config::default();
        config.api.prefix = raw.to_string();
        assert_eq!(config.api_prefix(), expected);
    }

    #[test]
    fn test_environment_detection() {
        let mut config = Config::default();
        config.environment = "development".to_string();
        assert!(config.is_development());
        assert!(!config.is_production());

        config.environment = "production".to_string();
        assert!(!config.is_development());
        assert!(config.is_production());
    }

    #[test]
    fn test_production_requires_legacy_secrets() {
        let mut config = Config::default();
        config.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.legacy.secure_hash = Some("sec".to_string());
        config.legacy.password_hash = Some("pw".to_string());
        assert!(config.validate().is_ok());

        config.legacy.enabled = false;
        config.legacy.secure_hash = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.api.prefix = "/my api".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.legacy.path = "legacy".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_configurations() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.api_prefix(), "/api");
        assert!(!config.debug);
        assert!(config.graphql.playground);
        assert!(config.legacy.password_hash.is_none());
    }
}
