use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let database_url = resolve_database_url(&lookup)?;
    let env = parse_environment(&or_default("SHELF_ENV", "development"))?;

    let jwt_secret = lookup("SHELF_JWT_SECRET")
        .ok()
        .filter(|s| !s.trim().is_empty());
    if jwt_secret.is_none() && env != Environment::Development {
        return Err(ConfigError::MissingEnvVar("SHELF_JWT_SECRET".to_string()));
    }

    let bind_addr = parse_addr("SHELF_BIND_ADDR", "0.0.0.0:8080")?;
    let log_level = or_default("SHELF_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("SHELF_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHELF_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHELF_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    let request_timeout_secs = parse_u64("SHELF_REQUEST_TIMEOUT_SECS", "30")?;
    let rate_limit_per_minute = parse_positive_usize("SHELF_RATE_LIMIT_PER_MINUTE", "600")?;
    let batch_chunk_size = parse_positive_usize("SHELF_BATCH_CHUNK_SIZE", "100")?;
    let batch_max_concurrency = parse_positive_usize("SHELF_BATCH_MAX_CONCURRENCY", "4")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        jwt_secret,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        request_timeout_secs,
        rate_limit_per_minute,
        batch_chunk_size,
        batch_max_concurrency,
    })
}

/// Use `DATABASE_URL` when present, otherwise assemble a DSN from the
/// `DB_*` component variables.
fn resolve_database_url<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    if let Ok(url) = lookup("DATABASE_URL") {
        return Ok(url);
    }

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let host = require("DB_HOST")?;
    let user = require("DB_USER")?;
    let name = require("DB_NAME")?;
    let password = lookup("DB_PASSWORD").unwrap_or_default();
    let port = lookup("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let sslmode = lookup("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string());

    port.parse::<u16>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "DB_PORT".to_string(),
            reason: e.to_string(),
        })?;

    let user = utf8_percent_encode(&user, NON_ALPHANUMERIC);
    let credentials = if password.is_empty() {
        user.to_string()
    } else {
        format!("{user}:{}", utf8_percent_encode(&password, NON_ALPHANUMERIC))
    };

    Ok(format!(
        "postgres://{credentials}@{host}:{port}/{name}?sslmode={sslmode}"
    ))
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHELF_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
