/// Deployment environment
///
/// Read from `APP_ENV`. Some components change behavior per environment:
/// the local storage provider only activates in development, and HSTS is
/// only sent in production.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    Development,

    /// Automated test runs
    Test,

    /// Production deployment
    Production,
}

impl Environment {
    /// Reads `APP_ENV`, defaulting to development when unset
    pub fn from_env() -> Result<Self, String> {
        match std::env::var("APP_ENV") {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::Development),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("Unknown APP_ENV value: {}", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment() {
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("DEV".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
        assert_eq!(" production ".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_environment_flags() {
        assert!(Environment::Development.is_development());
        assert!(!Environment::Test.is_development());
        assert!(Environment::Production.is_production());
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
