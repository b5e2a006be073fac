//! Environment configuration helpers shared by the binaries.
//!
//! Configuration is fail-fast: required variables must be present and
//! parseable or the process refuses to start with a clear error.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// Configuration errors raised during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },
}

/// Read a required variable; empty counts as missing.
pub fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Read a variable with a default for absent or empty values.
#[must_use]
pub fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Read an optional variable; empty collapses to `None`.
#[must_use]
pub fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset.
pub fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(value) if !value.is_empty() => {
            value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var: name,
                message: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; each test uses a unique name to
    // stay independent of execution order.

    #[test]
    fn test_require_env_missing() {
        assert!(matches!(
            require_env("COURIER_TEST_REQ_ABSENT"),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    fn test_require_env_present() {
        env::set_var("COURIER_TEST_REQ_PRESENT", "value");
        assert_eq!(require_env("COURIER_TEST_REQ_PRESENT").unwrap(), "value");
    }

    #[test]
    fn test_env_or_default() {
        assert_eq!(env_or("COURIER_TEST_OR_ABSENT", "8080"), "8080");

        env::set_var("COURIER_TEST_OR_EMPTY", "");
        assert_eq!(env_or("COURIER_TEST_OR_EMPTY", "8080"), "8080");
    }

    #[test]
    fn test_env_parse_default_and_invalid() {
        assert_eq!(env_parse("COURIER_TEST_PARSE_ABSENT", 42_u32).unwrap(), 42);

        env::set_var("COURIER_TEST_PARSE_BAD", "not-a-number");
        assert!(env_parse("COURIER_TEST_PARSE_BAD", 42_u32).is_err());

        env::set_var("COURIER_TEST_PARSE_OK", "7");
        assert_eq!(env_parse("COURIER_TEST_PARSE_OK", 42_u32).unwrap(), 7);
    }

    #[test]
    fn test_optional_env_empty_is_none() {
        env::set_var("COURIER_TEST_OPT_EMPTY", "");
        assert_eq!(optional_env("COURIER_TEST_OPT_EMPTY"), None);
        assert_eq!(optional_env("COURIER_TEST_OPT_ABSENT"), None);
    }
}
