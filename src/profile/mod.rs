//! Encoding profiles
//!
//! Profiles live in one YAML document mapping profile names to settings.
//! `default` is the base every other profile is deep-merged over; an
//! optional JSON override is merged last.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{InterpError, InterpResult};

/// Name of the base profile
pub const DEFAULT_PROFILE: &str = "default";

/// Fully resolved encoding settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    /// Video bitrate in kbit/s
    pub v_bitrate: u64,
    /// Audio bitrate in kbit/s
    pub a_bitrate: u64,
    /// x264 private options
    #[serde(default)]
    pub x264: Mapping,
    /// NVENC options
    #[serde(default)]
    pub nvenc: Mapping,
    /// SVP motion analysis settings
    pub analyse: Value,
    /// SVP frame rendering settings
    pub smooth: Value,
}

/// All profiles from a profiles file, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet {
    profiles: Mapping,
}

impl ProfileSet {
    /// Parse a profiles document
    pub fn from_yaml_str(content: &str) -> InterpResult<Self> {
        let document: Value = serde_yaml::from_str(content)?;
        match document {
            Value::Mapping(profiles) => Ok(Self { profiles }),
            _ => Err(InterpError::InvalidProfile {
                message: "profiles document must map names to settings".to_string(),
            }),
        }
    }

    /// Load a profiles file
    pub fn load(path: &Path) -> InterpResult<Self> {
        let load_error = |message: String| InterpError::ProfileLoad {
            path: path.display().to_string(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let set = Self::from_yaml_str(&content).map_err(|e| load_error(e.to_string()))?;
        debug!(path = %path.display(), profiles = set.profiles.len(), "profiles loaded");
        Ok(set)
    }

    /// Profile names in file order
    pub fn names(&self) -> Vec<String> {
        self.profiles
            .keys()
            .filter_map(|key| key.as_str().map(str::to_owned))
            .collect()
    }

    /// Merge `default`, the named profile and the override, in that order
    pub fn resolve_value(
        &self,
        name: &str,
        override_json: Option<&serde_json::Value>,
    ) -> InterpResult<Mapping> {
        let mut resolved = Mapping::new();
        deep_merge(&mut resolved, self.section(DEFAULT_PROFILE)?);
        if name != DEFAULT_PROFILE {
            deep_merge(&mut resolved, self.section(name)?);
        }

        if let Some(json) = override_json {
            match serde_yaml::to_value(json)? {
                Value::Mapping(overrides) => deep_merge(&mut resolved, &overrides),
                _ => {
                    return Err(InterpError::InvalidProfile {
                        message: "profile override must be a JSON object".to_string(),
                    })
                }
            }
        }

        Ok(resolved)
    }

    /// Resolve a profile into typed settings
    pub fn resolve(
        &self,
        name: &str,
        override_json: Option<&serde_json::Value>,
    ) -> InterpResult<Profile> {
        let resolved = self.resolve_value(name, override_json)?;
        serde_yaml::from_value(Value::Mapping(resolved)).map_err(|e| InterpError::InvalidProfile {
            message: format!("{}: {}", name, e),
        })
    }

    fn section(&self, name: &str) -> InterpResult<&Mapping> {
        match self.profiles.get(name) {
            Some(Value::Mapping(section)) => Ok(section),
            Some(_) => Err(InterpError::InvalidProfile {
                message: format!("profile {} is not a mapping", name),
            }),
            None => Err(InterpError::ProfileNotFound {
                name: name.to_string(),
            }),
        }
    }
}

/// Merge `source` into `dest`.
///
/// Nested mappings merge key by key; any other value replaces what `dest`
/// had under that key.
pub fn deep_merge(dest: &mut Mapping, source: &Mapping) {
    for (key, value) in source {
        match value {
            Value::Mapping(nested) => {
                if !matches!(dest.get(key), Some(Value::Mapping(_))) {
                    dest.insert(key.clone(), Value::Mapping(Mapping::new()));
                }
                if let Some(Value::Mapping(target)) = dest.get_mut(key) {
                    deep_merge(target, nested);
                }
            }
            other => {
                dest.insert(key.clone(), other.clone());
            }
        }
    }
}
