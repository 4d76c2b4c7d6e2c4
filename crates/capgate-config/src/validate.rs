//! Post-merge validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];
const OVERLAP_POLICIES: &[&str] = &["supersede", "reject"];

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::ValidationError`] found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_storage(config)?;
    validate_negotiation(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message,
    }
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!(
                "unsupported value '{value}'; expected one of: {}",
                allowed.join(", ")
            ),
        ))
    }
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    if let Some(path) = &config.storage.path
        && path.trim().is_empty()
    {
        return Err(invalid(
            "storage.path",
            "must not be empty; remove it to use the default location".to_owned(),
        ));
    }
    Ok(())
}

fn validate_negotiation(config: &Config) -> ConfigResult<()> {
    let n = &config.negotiation;
    one_of("negotiation.overlap", &n.overlap, OVERLAP_POLICIES)?;

    for (i, key) in n.capabilities.iter().enumerate() {
        if key.is_empty() || key.contains('\0') {
            return Err(invalid(
                &format!("negotiation.capabilities[{i}]"),
                "capability keys must be non-empty and must not contain NUL".to_owned(),
            ));
        }
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    one_of("logging.level", &config.logging.level, LOG_LEVELS)?;
    one_of("logging.format", &config.logging.format, LOG_FORMATS)?;
    Ok(())
}
