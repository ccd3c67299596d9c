//! Error types for the PID strategy.

use thiserror::Error;

/// Result type alias for strategy operations.
pub type StrategyResult<T> = Result<T, StrategyError>;

/// A configuration field that could not be turned into a usable controller
/// config. Every variant names the key and the raw value that was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unable to parse {key}: invalid value {value:?}: {reason}")]
    Parse {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("unable to parse {key}: unknown quantification method {value:?}")]
    UnknownQuantization { key: &'static str, value: String },

    #[error("{key} must be greater than zero, got {value:?}")]
    NonPositive { key: &'static str, value: String },

    #[error("{key} must contain at least one coefficient, got {value:?}")]
    EmptyCoefficients { key: &'static str, value: String },

    #[error("{key} must not be NaN")]
    NotANumber { key: &'static str, value: String },

    #[error("conflict: {max_key} ({max}) cannot be smaller than {min_key} ({min})")]
    Conflict {
        max_key: &'static str,
        max: String,
        min_key: &'static str,
        min: String,
    },
}

impl ConfigError {
    /// The configuration key this error is about.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Parse { key, .. }
            | Self::UnknownQuantization { key, .. }
            | Self::NonPositive { key, .. }
            | Self::EmptyCoefficients { key, .. }
            | Self::NotANumber { key, .. } => key,
            Self::Conflict { max_key, .. } => max_key,
        }
    }

    /// The raw value that was rejected.
    pub fn value(&self) -> &str {
        match self {
            Self::Parse { value, .. }
            | Self::UnknownQuantization { value, .. }
            | Self::NonPositive { value, .. }
            | Self::EmptyCoefficients { value, .. }
            | Self::NotANumber { value, .. } => value,
            Self::Conflict { max, .. } => max,
        }
    }
}

/// Errors returned to the host from a strategy run.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The policy's merged configuration is malformed. No state was created.
    #[error("unable to parse strategy config: {0}")]
    Config(#[from] ConfigError),

    /// A state that validation should have made impossible. Indicates a bug.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_key_and_value() {
        let err = ConfigError::Parse {
            key: "target",
            value: "fifty".to_string(),
            reason: "invalid float literal".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("target"));
        assert!(msg.contains("\"fifty\""));
        assert_eq!(err.key(), "target");
        assert_eq!(err.value(), "fifty");
    }

    #[test]
    fn config_error_converts_into_strategy_error() {
        let err: StrategyError = ConfigError::NonPositive {
            key: "time_divider_ns",
            value: "0".to_string(),
        }
        .into();
        assert!(matches!(err, StrategyError::Config(_)));
        assert!(err.to_string().starts_with("unable to parse strategy config"));
    }
}
