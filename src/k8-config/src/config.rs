use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::ConfigError;

pub const DEFAULT_STORAGE_PREFIX: &str = "/registry";

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOptions {
    /// root of every storage key
    pub prefix: String,
    /// group versions objects are encoded with
    #[serde(default)]
    pub encode_versions: Vec<String>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_STORAGE_PREFIX.to_owned(),
            encode_versions: vec![],
        }
    }
}

/// Options every api server carries, loadable from yaml
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendedOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub component_name: String,
    pub storage: StorageOptions,
    /// requested emulation version, `major.minor`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emulated_version: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
}

impl RecommendedOptions {
    pub fn new<S: Into<String>>(prefix: S, encode_versions: Vec<String>) -> Self {
        Self {
            storage: StorageOptions {
                prefix: prefix.into(),
                encode_versions,
            },
            ..Default::default()
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        debug!(path = %path.as_ref().display(), "loading options");
        let file = File::open(path.as_ref())?;
        Ok(serde_yaml::from_reader(file)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn set_emulated_version<S: Into<String>>(mut self, version: S) -> Self {
        self.emulated_version = Some(version.into());
        self
    }

    pub fn set_feature_gate<S: Into<String>>(mut self, name: S, enabled: bool) -> Self {
        self.feature_gates.insert(name.into(), enabled);
        self
    }

    /// every problem found, empty if valid
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = vec![];

        if !self.storage.prefix.starts_with('/') {
            errors.push(ConfigError::invalid(
                "storage.prefix",
                format!("\"{}\" must be an absolute key", self.storage.prefix),
            ));
        }

        for (index, version) in self.storage.encode_versions.iter().enumerate() {
            if version.trim().is_empty() {
                errors.push(ConfigError::invalid(
                    format!("storage.encodeVersions[{}]", index),
                    "must not be empty",
                ));
            }
        }

        if let Some(version) = &self.emulated_version {
            if !is_major_minor(version) {
                errors.push(ConfigError::invalid(
                    "emulatedVersion",
                    format!("\"{}\" is not of form major.minor", version),
                ));
            }
        }

        for name in self.feature_gates.keys() {
            if name.is_empty() || name.contains(char::is_whitespace) {
                errors.push(ConfigError::invalid(
                    "featureGates",
                    format!("illegal feature name \"{}\"", name),
                ));
            }
        }

        errors
    }
}

fn is_major_minor(version: &str) -> bool {
    let version = version.strip_prefix('v').unwrap_or(version);
    let parts: Vec<&str> = version.split('.').collect();
    (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
