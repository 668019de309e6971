//! Configuration errors with actionable messages.

use std::fmt::Write as _;

/// A configuration problem found at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A value is present but unusable.
    #[error("Invalid configuration: {message}\n\nHow to fix: {fix_hint}")]
    Invalid { message: String, fix_hint: String },

    /// A setting required by an enabled feature is absent.
    #[error("Missing required configuration: {setting}\n\nRequired for: {context}\nSet via: {env_var}")]
    MissingRequired {
        setting: String,
        context: String,
        env_var: String,
    },

    /// Two settings contradict each other.
    #[error("Incompatible settings: {setting1} cannot be used with {setting2}\n\nReason: {reason}")]
    Incompatible {
        setting1: String,
        setting2: String,
        reason: String,
    },

    #[error("{}", render_multiple(.0))]
    Multiple(Vec<ConfigurationError>),
}

fn render_multiple(errors: &[ConfigurationError]) -> String {
    let mut out = String::from("Multiple configuration errors:\n");
    for (i, err) in errors.iter().enumerate() {
        let _ = writeln!(out, "\n{}. {err}", i + 1);
    }
    out
}

impl ConfigurationError {
    pub fn invalid(message: impl Into<String>, fix_hint: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            fix_hint: fix_hint.into(),
        }
    }

    pub fn missing_required(
        setting: impl Into<String>,
        context: impl Into<String>,
        env_var: impl Into<String>,
    ) -> Self {
        Self::MissingRequired {
            setting: setting.into(),
            context: context.into(),
            env_var: env_var.into(),
        }
    }

    pub fn incompatible(
        setting1: impl Into<String>,
        setting2: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Incompatible {
            setting1: setting1.into(),
            setting2: setting2.into(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of problems: one error stays itself, several become `Multiple`.
    pub fn from_list(mut errors: Vec<ConfigurationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Number of underlying problems.
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_display() {
        let err = ConfigurationError::missing_required(
            "gateway.cron_secret",
            "Triggering autopilot runs",
            "CRON_SECRET",
        );
        let msg = err.to_string();
        assert!(msg.contains("Missing required"));
        assert!(msg.contains("CRON_SECRET"));
    }

    #[test]
    fn test_incompatible_display() {
        let err = ConfigurationError::incompatible(
            "scheduler.lease_secs=60",
            "scheduler.request_timeout_secs=300",
            "A lease shorter than one request lets a second trigger pick up a running schedule",
        );
        assert!(err.to_string().contains("Incompatible settings"));
    }

    #[test]
    fn test_from_list() {
        assert!(ConfigurationError::from_list(Vec::new()).is_none());

        let single = ConfigurationError::from_list(vec![ConfigurationError::invalid("a", "b")])
            .unwrap();
        assert_eq!(single.count(), 1);
        assert!(!matches!(single, ConfigurationError::Multiple(_)));

        let many = ConfigurationError::from_list(vec![
            ConfigurationError::invalid("Error 1", "Fix 1"),
            ConfigurationError::invalid("Error 2", "Fix 2"),
        ])
        .unwrap();
        let msg = many.to_string();
        assert!(msg.contains("Multiple configuration errors"));
        assert!(msg.contains("1. Invalid configuration: Error 1"));
        assert!(msg.contains("2. Invalid configuration: Error 2"));
        assert_eq!(many.count(), 2);
    }
}
