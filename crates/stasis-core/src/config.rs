//! Snapshot options
//!
//! Options load from a TOML file and can be overridden from the environment:
//!
//! ```toml
//! max_objects = 100000
//! shape_policy = "lenient"
//! strict = false
//! ```
//!
//! | Variable              | Field          |
//! |-----------------------|----------------|
//! | `STASIS_MAX_OBJECTS`  | `max_objects`  |
//! | `STASIS_SHAPE_POLICY` | `shape_policy` |
//! | `STASIS_STRICT`       | `strict`       |

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override has an unusable value
    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Value found
        value: String,
    },
}

/// What to do when a restored class has different member slots than the
/// snapshot recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapePolicy {
    /// Fail the restore with a shape mismatch error
    #[default]
    Reject,
    /// Copy members by name; slots the snapshot lacks stay null
    Lenient,
}

impl FromStr for ShapePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(ShapePolicy::Reject),
            "lenient" => Ok(ShapePolicy::Lenient),
            _ => Err(()),
        }
    }
}

/// Snapshot options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotOptions {
    /// Maximum number of section objects in one snapshot (None = unlimited)
    pub max_objects: Option<usize>,

    /// Class shape change policy
    pub shape_policy: ShapePolicy,

    /// Panic on content errors instead of returning them
    pub strict: bool,
}

impl SnapshotOptions {
    /// Parse options from TOML
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load options from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Apply `STASIS_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("STASIS_MAX_OBJECTS") {
            self.max_objects = match value.trim() {
                "" | "none" => None,
                v => Some(v.parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "STASIS_MAX_OBJECTS",
                    value: value.clone(),
                })?),
            };
        }
        if let Some(value) = lookup("STASIS_SHAPE_POLICY") {
            self.shape_policy = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "STASIS_SHAPE_POLICY",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("STASIS_STRICT") {
            self.strict = match value.trim() {
                "1" | "true" => true,
                "0" | "false" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "STASIS_STRICT",
                        value,
                    })
                }
            };
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SnapshotOptions::from_toml_str("").unwrap();
        assert_eq!(options, SnapshotOptions::default());
        assert_eq!(options.shape_policy, ShapePolicy::Reject);
        assert!(!options.strict);
    }

    #[test]
    fn test_parse_toml() {
        let options = SnapshotOptions::from_toml_str(
            "max_objects = 500\nshape_policy = \"lenient\"\nstrict = true\n",
        )
        .unwrap();
        assert_eq!(options.max_objects, Some(500));
        assert_eq!(options.shape_policy, ShapePolicy::Lenient);
        assert!(options.strict);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            SnapshotOptions::from_toml_str("max_object = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env = |var: &'static str| match var {
            "STASIS_MAX_OBJECTS" => Some("42".to_string()),
            "STASIS_SHAPE_POLICY" => Some("Lenient".to_string()),
            _ => None,
        };
        let options = SnapshotOptions::default().with_overrides(env).unwrap();
        assert_eq!(options.max_objects, Some(42));
        assert_eq!(options.shape_policy, ShapePolicy::Lenient);
        assert!(!options.strict);
    }

    #[test]
    fn test_invalid_override() {
        let env = |var: &'static str| (var == "STASIS_STRICT").then(|| "maybe".to_string());
        assert!(matches!(
            SnapshotOptions::default().with_overrides(env),
            Err(ConfigError::InvalidEnv {
                var: "STASIS_STRICT",
                ..
            })
        ));
    }
}
