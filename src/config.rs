//! Configuration loading and validation.
//!
//! Settings layer from built-in defaults, optional TOML profiles under
//! `config/`, and `APP__`-prefixed environment variables, in that order.
//! The JWT secret deliberately has no default.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Runtime settings for the service.
///
/// Field names double as configuration keys, both in the TOML profiles and
/// as `APP__<NAME>` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    // Core settings. database_url and jwt_secret must come from the
    // environment or a profile.
    pub database_url: String,
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,
    /// Session lifetime in seconds
    pub jwt_expiration: usize,
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// Deployment environment name; "development" relaxes a few checks
    pub environment: String,

    // Logging
    #[serde(default = "defaults::log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,

    // Startup behavior
    #[serde(default)]
    pub auto_migrate: bool,
    #[serde(default = "defaults::seed_admin")]
    pub seed_admin: bool,

    // CORS
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
    #[serde(default)]
    pub cors_allow_any_origin: bool,
    #[serde(default)]
    pub cors_allow_credentials: bool,

    // Database pool sizing and timeouts (seconds)
    #[serde(default = "defaults::db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "defaults::db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "defaults::db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "defaults::db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "defaults::db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    // Internals
    #[serde(default = "defaults::event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    // Token claims
    #[serde(default = "defaults::auth_issuer")]
    pub auth_issuer: String,
    #[serde(default = "defaults::auth_audience")]
    pub auth_audience: String,
}

impl AppConfig {
    /// Constructor for tests and tooling; every optional knob takes its
    /// serde default.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            host,
            port,
            environment,
            log_level: defaults::log_level(),
            log_json: false,
            auto_migrate: false,
            seed_admin: defaults::seed_admin(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: defaults::db_max_connections(),
            db_min_connections: defaults::db_min_connections(),
            db_connect_timeout_secs: defaults::db_connect_timeout_secs(),
            db_idle_timeout_secs: defaults::db_idle_timeout_secs(),
            db_acquire_timeout_secs: defaults::db_acquire_timeout_secs(),
            event_channel_capacity: defaults::event_channel_capacity(),
            request_timeout_secs: defaults::request_timeout_secs(),
            auth_issuer: defaults::auth_issuer(),
            auth_audience: defaults::auth_audience(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Permissive CORS is acceptable in development or when explicitly
    /// switched on.
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn has_explicit_cors_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Cross-field checks that `validator` cannot express per field.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_explicit_cors_origins() {
            errors.add(
                "cors_allowed_origins",
                field_error(
                    "cors_allowed_origins_required",
                    "Set APP__CORS_ALLOWED_ORIGINS outside development, or opt in to \
                     permissive CORS with APP__CORS_ALLOW_ANY_ORIGIN=true",
                ),
            );
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            errors.add(
                "jwt_secret",
                field_error(
                    "jwt_secret_default_dev",
                    "The bundled development JWT secret is for development only; \
                     set APP__JWT_SECRET to a unique value",
                ),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

mod defaults {
    pub(super) const ENVIRONMENT: &str = "development";

    pub(super) fn port() -> u16 {
        8080
    }
    pub(super) fn log_level() -> String {
        "info".to_string()
    }
    pub(super) fn seed_admin() -> bool {
        true
    }
    pub(super) fn db_max_connections() -> u32 {
        16
    }
    pub(super) fn db_min_connections() -> u32 {
        2
    }
    pub(super) fn db_connect_timeout_secs() -> u64 {
        30
    }
    pub(super) fn db_idle_timeout_secs() -> u64 {
        600
    }
    pub(super) fn db_acquire_timeout_secs() -> u64 {
        8
    }
    pub(super) fn event_channel_capacity() -> usize {
        1024
    }
    pub(super) fn request_timeout_secs() -> u64 {
        30
    }
    pub(super) fn auth_issuer() -> String {
        "wholesaler-api".to_string()
    }
    pub(super) fn auth_audience() -> String {
        "wholesaler-auth".to_string()
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(field_error(
            "log_level",
            "Must be one of: trace, debug, info, warn, error",
        )),
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 64 {
        return Err(field_error(
            "jwt_secret",
            "JWT secret must be at least 64 characters",
        ));
    }

    const PLACEHOLDERS: [&str; 4] = [
        "CHANGE_THIS_SECRET_IN_PRODUCTION",
        "INSECURE_DEFAULT_DO_NOT_USE_IN_PRODUCTION",
        "your-secret-key",
        "default-secret-key",
    ];
    if PLACEHOLDERS
        .iter()
        .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
    {
        return Err(field_error(
            "jwt_secret",
            "JWT secret is a known placeholder; generate a random value",
        ));
    }

    let lower = trimmed.to_ascii_lowercase();
    if ["changeme", "password", "default", "12345", "abcdef"]
        .iter()
        .any(|weak| lower.contains(weak))
    {
        return Err(field_error(
            "jwt_secret",
            "JWT secret contains a guessable fragment; use a cryptographically random string",
        ));
    }

    // Also catches single-character repetition
    let distinct: HashSet<char> = trimmed.chars().collect();
    if distinct.len() < 10 {
        return Err(field_error(
            "jwt_secret",
            "JWT secret needs at least 10 distinct characters",
        ));
    }

    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        return Err(field_error(
            "event_channel_capacity",
            "event_channel_capacity must be greater than 0",
        ));
    }
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to this
/// crate while tower-http stays at debug so request traces remain visible.
pub fn init_tracing(level: &str, json: bool) {
    let filter = match env::var("RUST_LOG") {
        Ok(custom) if !custom.trim().is_empty() => custom,
        _ => format!("wholesaler_api={},tower_http=debug", level),
    };

    // try_init keeps repeated calls, as happen across tests, from panicking
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Load configuration from defaults, the optional `config/` profiles, and
/// `APP__` environment variables. Later sources override earlier ones.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let profile = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| defaults::ENVIRONMENT.to_string());
    info!("Loading configuration for environment: {}", profile);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "No '{}' directory; using built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let raw = Config::builder()
        .set_default("database_url", "sqlite://wholesaler.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", defaults::ENVIRONMENT)?
        .set_default("log_level", "info")?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, profile)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Checked up front so a missing secret reads as one clear message
    // instead of a deserialization failure
    if raw.get_string("jwt_secret").is_err() {
        error!(
            "JWT secret missing. Set APP__JWT_SECRET to a random string of at least \
             64 characters (try: openssl rand -base64 64)."
        );
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let cfg: AppConfig = raw.try_deserialize()?;

    cfg.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        e
    })?;
    cfg.validate_additional_constraints().map_err(|e| {
        error!("Configuration security checks failed: {:?}", e);
        e
    })?;

    info!("Configuration loaded");
    Ok(cfg)
}

#[cfg(test)]
mod cors_policy_tests {
    use super::*;

    fn production_config(mutate: impl FnOnce(&mut AppConfig)) -> AppConfig {
        let mut cfg = AppConfig::new(
            "sqlite://wholesaler.db?mode=memory".into(),
            "wholesaler_test_signing_secret_with_plenty_of_entropy_9f8e7d6c5b4a3210".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        );
        mutate(&mut cfg);
        cfg
    }

    #[test]
    fn production_needs_an_explicit_origin_policy() {
        let cfg = production_config(|_| {});

        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn an_origin_list_satisfies_the_policy() {
        let cfg =
            production_config(|c| c.cors_allowed_origins = Some("https://example.com".into()));

        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn the_any_origin_flag_satisfies_the_policy() {
        let cfg = production_config(|c| c.cors_allow_any_origin = true);

        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn a_blank_origin_list_does_not_count() {
        let cfg = production_config(|c| c.cors_allowed_origins = Some(" , ,".into()));

        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn development_defaults_to_permissive() {
        let cfg = production_config(|c| c.environment = "development".into());

        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn the_bundled_dev_secret_never_passes_outside_development() {
        let cfg = production_config(|c| {
            c.cors_allow_any_origin = true;
            c.jwt_secret = DEV_DEFAULT_JWT_SECRET.into();
        });

        assert!(cfg.validate_additional_constraints().is_err());
    }
}

#[cfg(test)]
mod jwt_secret_tests {
    use super::*;

    #[test]
    fn rejects_short_secrets() {
        assert!(validate_jwt_secret("too-short").is_err());
    }

    #[test]
    fn rejects_weak_fragments() {
        let padded = format!("password{}", "x".repeat(60));
        assert!(validate_jwt_secret(&padded).is_err());
    }

    #[test]
    fn rejects_repeated_characters() {
        assert!(validate_jwt_secret(&"a".repeat(80)).is_err());
    }

    #[test]
    fn rejects_low_character_diversity() {
        assert!(validate_jwt_secret(&"ab".repeat(40)).is_err());
    }

    #[test]
    fn accepts_strong_secrets() {
        assert!(validate_jwt_secret(
            "wholesaler_test_signing_secret_with_plenty_of_entropy_9f8e7d6c5b4a3210"
        )
        .is_ok());
    }
}
