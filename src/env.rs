//! Runtime environment, read from `CAMPUS_PUSH_ENV`.
//!
//! `CAMPUS_PUSH_ENV=test` pins config and data under the repo's
//! `tmp/campus-push-test` so integration runs never touch a real install.
//! Any other value, or none, is production.

use std::path::PathBuf;

const TEST_STATE_DIR: &str = "tmp/campus-push-test";

/// Where the service is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Normal install (default).
    Production,
    /// Test runs; state lives in [`test_state_dir`].
    Test,
}

impl Environment {
    /// Detect current environment from `CAMPUS_PUSH_ENV`.
    #[must_use]
    pub fn current() -> Self {
        Self::parse(std::env::var("CAMPUS_PUSH_ENV").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("test") => Self::Test,
            _ => Self::Production,
        }
    }

    /// Config directory this environment pins, if any.
    #[must_use]
    pub fn state_dir(self) -> Option<PathBuf> {
        match self {
            Self::Test => Some(test_state_dir()),
            Self::Production => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Scratch state directory used by tests.
#[must_use]
pub fn test_state_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(TEST_STATE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse(Some("test")), Environment::Test);
        assert_eq!(Environment::parse(Some("staging")), Environment::Production);
        assert_eq!(Environment::parse(None), Environment::Production);
    }

    #[test]
    fn test_only_test_mode_pins_state_dir() {
        assert_eq!(Environment::Test.state_dir(), Some(test_state_dir()));
        assert_eq!(Environment::Production.state_dir(), None);
        assert!(test_state_dir().ends_with("tmp/campus-push-test"));
        assert_eq!(Environment::Test.to_string(), "test");
    }
}
