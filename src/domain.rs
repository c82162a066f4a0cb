use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SimError;

/// One of the three simulated subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Finance,
    Healthcare,
    Dev,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Finance, Domain::Healthcare, Domain::Dev];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Finance => "finance",
            Domain::Healthcare => "healthcare",
            Domain::Dev => "dev",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Domain::Finance => "finance.jsonl",
            Domain::Healthcare => "healthcare.jsonl",
            Domain::Dev => "developer.jsonl",
        }
    }

    /// Normalise a user-supplied domain name.
    ///
    /// Accepts `health`/`healthcare`, `finance`, and anything containing
    /// `dev` (`dev`, `developer`, `DevTools`, ...). Case-insensitive.
    pub fn parse_alias(raw: &str) -> Result<Self, SimError> {
        let d = raw.trim().to_lowercase();
        match d.as_str() {
            "health" | "healthcare" => Ok(Domain::Healthcare),
            "finance" => Ok(Domain::Finance),
            _ if d.contains("dev") => Ok(Domain::Dev),
            _ => Err(SimError::InvalidDomain(raw.to_string())),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_normalisation() {
        assert_eq!(Domain::parse_alias("Health").unwrap(), Domain::Healthcare);
        assert_eq!(Domain::parse_alias("healthcare").unwrap(), Domain::Healthcare);
        assert_eq!(Domain::parse_alias("FINANCE").unwrap(), Domain::Finance);
        assert_eq!(Domain::parse_alias("DevTools").unwrap(), Domain::Dev);
        assert_eq!(Domain::parse_alias("developer").unwrap(), Domain::Dev);
    }

    #[test]
    fn test_unknown_alias_rejected() {
        let err = Domain::parse_alias("weather").unwrap_err();
        assert!(matches!(err, SimError::InvalidDomain(ref d) if d == "weather"));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Domain::Dev).unwrap(), "\"dev\"");
        let d: Domain = serde_json::from_str("\"healthcare\"").unwrap();
        assert_eq!(d, Domain::Healthcare);
    }
}
