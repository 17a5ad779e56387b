use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReleasabilityError, Result};

const GRAMMAR: &str = "[<PREFIX>-]<MAJOR>.<MINOR>.<PATCH>[-M<N>](.|+)<BUILD NUMBER>";
const GRAMMAR_WITH_DASH: &str = "[<PREFIX>-]<MAJOR>.<MINOR>.<PATCH>[-M<N>](.|+|-)<BUILD NUMBER>";

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z][A-Za-z_]*-)?(\d+)\.(\d+)\.(\d+)(?:-M\d+)?[.+](\d+)$")
        .expect("version pattern is valid")
});

static VERSION_PATTERN_WITH_DASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z][A-Za-z_]*-)?(\d+)\.(\d+)\.(\d+)(?:-M\d+)?[.+\-](\d+)$")
        .expect("version pattern is valid")
});

/// Which build-tag grammar to accept.
///
/// The default grammar takes `.` or `+` before the build number. Some npm-style
/// builds publish `1.2.3-456`; enable `allow_dash_separator` for those.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPolicy {
    #[serde(default)]
    pub allow_dash_separator: bool,
}

impl VersionPolicy {
    pub fn new(allow_dash_separator: bool) -> Self {
        Self { allow_dash_separator }
    }

    fn pattern(&self) -> &'static Regex {
        if self.allow_dash_separator {
            &VERSION_PATTERN_WITH_DASH
        } else {
            &VERSION_PATTERN
        }
    }

    fn grammar(&self) -> &'static str {
        if self.allow_dash_separator {
            GRAMMAR_WITH_DASH
        } else {
            GRAMMAR
        }
    }

    fn invalid(&self, version: &str) -> ReleasabilityError {
        ReleasabilityError::InvalidVersionFormat {
            version: version.to_string(),
            reason: format!("expected {}", self.grammar()),
        }
    }

    pub fn validate_version(&self, version: &str) -> Result<()> {
        if self.pattern().is_match(version) {
            Ok(())
        } else {
            Err(self.invalid(version))
        }
    }

    pub fn extract_build_number(&self, version: &str) -> Result<u64> {
        let captures = self
            .pattern()
            .captures(version)
            .ok_or_else(|| self.invalid(version))?;

        captures[4]
            .parse::<u64>()
            .map_err(|e| ReleasabilityError::InvalidVersionFormat {
                version: version.to_string(),
                reason: format!("build number is not a valid number ({})", e),
            })
    }

    pub fn extract_semantic_version(&self, version: &str) -> Result<String> {
        let captures = self
            .pattern()
            .captures(version)
            .ok_or_else(|| self.invalid(version))?;
        Ok(format!("{}.{}.{}", &captures[1], &captures[2], &captures[3]))
    }
}

/// Validate a build tag with the default grammar
pub fn validate_version(version: &str) -> Result<()> {
    VersionPolicy::default().validate_version(version)
}

/// Build number of a build tag, using the default grammar
pub fn extract_build_number(version: &str) -> Result<u64> {
    VersionPolicy::default().extract_build_number(version)
}

pub fn extract_semantic_version(version: &str) -> Result<String> {
    VersionPolicy::default().extract_semantic_version(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_build_number_from_valid_versions() {
        let cases = [
            ("1.2.3.1234", 1234),
            ("42.2.1.5433", 5433),
            ("10.0.0-M3.77", 77),
            ("1.2.3+987", 987),
            ("sonar-1.2.3.55", 55),
            ("dotnet-9.8.7-M1+4", 4),
        ];

        for (version, expected) in cases {
            assert_eq!(extract_build_number(version).unwrap(), expected, "{}", version);
        }
    }

    #[test]
    fn test_invalid_versions_are_rejected() {
        for version in ["1.2.3", "42.2", "5.4.3.2.1", "1.2.3.abc", "", "1.2.3.", "-1.2.3.4", "1.2.3-45"] {
            assert!(validate_version(version).is_err(), "{} should be invalid", version);
            assert!(extract_build_number(version).is_err(), "{} should be invalid", version);
        }
    }

    #[test]
    fn test_invalid_version_error_names_the_version() {
        let err = extract_build_number("1.2.3").unwrap_err();
        assert!(matches!(err, ReleasabilityError::InvalidVersionFormat { .. }));
        assert!(err.to_string().contains("1.2.3"));
    }

    #[test]
    fn test_dash_separator_requires_policy() {
        assert!(validate_version("1.2.3-45").is_err());

        let policy = VersionPolicy::new(true);
        assert_eq!(policy.extract_build_number("1.2.3-45").unwrap(), 45);
        assert_eq!(policy.extract_build_number("1.2.3-M2-45").unwrap(), 45);
        assert_eq!(policy.extract_build_number("1.2.3.45").unwrap(), 45);
    }

    #[test]
    fn test_build_number_overflow_is_invalid() {
        assert!(extract_build_number("1.2.3.99999999999999999999999").is_err());
    }

    #[test]
    fn test_extract_semantic_version() {
        assert_eq!(extract_semantic_version("1.2.3.1234").unwrap(), "1.2.3");
        assert_eq!(extract_semantic_version("app-4.3.2-M1+9").unwrap(), "4.3.2");
        assert!(extract_semantic_version("4.3").is_err());
    }
}
