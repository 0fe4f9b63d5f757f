//!
//! # Component versions
//!
//! Binary and emulation versions of the components making up a server, the
//! feature gates evaluated against them, and the mappings that keep the
//! emulation version of a dependent component in step with its anchor.
//!
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use tracing::trace;

/// component every api server depends on
pub const DEFAULT_KUBE_COMPONENT: &str = "kube";

/// binary version of the kube component this kit is built against
pub const DEFAULT_KUBE_BINARY_VERSION: &str = "1.34";

/// oldest emulation version is this many minors behind the binary version
const MAX_EMULATION_OFFSET: i64 = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("illegal version string \"{0}\"")]
    Parse(String),
    #[error("component \"{0}\" is not registered")]
    UnknownComponent(String),
    #[error("component \"{0}\" is already registered")]
    DuplicateComponent(String),
    #[error("component \"{0}\" cannot map its emulation version onto itself")]
    SelfMapping(String),
    #[error("emulation version of \"{to}\" is already mapped from \"{from}\"")]
    DuplicateMapping { from: String, to: String },
    #[error("emulation version of \"{to}\" is requested explicitly and also mapped from \"{from}\"")]
    ConflictingRequest { from: String, to: String },
    #[error("emulation version {requested} of \"{component}\" is not within [{min}, {max}]")]
    EmulationOutOfRange {
        component: String,
        requested: Version,
        min: Version,
        max: Version,
    },
    #[error("feature \"{feature}\" is unknown to \"{component}\"")]
    UnknownFeature { component: String, feature: String },
    #[error("feature \"{feature}\" of \"{component}\" is locked to {default}")]
    LockedFeature {
        component: String,
        feature: String,
        default: bool,
    },
}

/// `major.minor[.patch]`, ordered numerically
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: 0,
        }
    }

    pub const fn with_patch(mut self, patch: u32) -> Self {
        self.patch = patch;
        self
    }

    /// same major and minor, patch dropped
    pub fn major_minor(&self) -> Self {
        Self::new(self.major, self.minor)
    }

    /// shift minor by offset, saturating at zero. patch is dropped
    pub fn offset_minor(&self, offset: i64) -> Self {
        let minor = (self.minor as i64 + offset).clamp(0, u32::MAX as i64);
        Self::new(self.major, minor as u32)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let parts = trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::Parse(s.to_owned()))?;

        match parts.as_slice() {
            [major, minor] => Ok(Self::new(*major, *minor)),
            [major, minor, patch] => Ok(Self::new(*major, *minor).with_patch(*patch)),
            _ => Err(VersionError::Parse(s.to_owned())),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveVersion {
    binary: Version,
    emulation: Version,
    min_compatibility: Version,
}

impl EffectiveVersion {
    pub fn new(binary: Version) -> Self {
        Self {
            binary,
            emulation: binary.major_minor(),
            min_compatibility: binary.offset_minor(-1),
        }
    }

    pub fn binary_version(&self) -> Version {
        self.binary
    }

    pub fn emulation_version(&self) -> Version {
        self.emulation
    }

    pub fn min_compatibility_version(&self) -> Version {
        self.min_compatibility
    }

    pub fn set_emulation_version(&mut self, emulation: Version) {
        self.emulation = emulation.major_minor();
        self.min_compatibility = emulation.offset_minor(-1);
    }

    fn validate(&self, component: &str) -> Option<VersionError> {
        let max = self.binary.major_minor();
        let min = max.offset_minor(-MAX_EMULATION_OFFSET);
        if self.emulation > max || self.emulation < min {
            Some(VersionError::EmulationOutOfRange {
                component: component.to_owned(),
                requested: self.emulation,
                min,
                max,
            })
        } else {
            None
        }
    }
}

impl FromStr for EffectiveVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.parse()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreRelease {
    Alpha,
    Beta,
    GA,
    Deprecated,
}

/// behavior of a feature starting at `version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedSpec {
    pub version: Version,
    pub default: bool,
    pub pre_release: PreRelease,
    pub lock_to_default: bool,
}

impl VersionedSpec {
    pub fn new(version: Version, default: bool, pre_release: PreRelease) -> Self {
        Self {
            version,
            default,
            pre_release,
            lock_to_default: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.lock_to_default = true;
        self
    }
}

pub type VersionedSpecs = Vec<VersionedSpec>;

/// Feature gate evaluated at an emulation version
#[derive(Debug, Clone, Default)]
pub struct FeatureGate {
    known: BTreeMap<String, VersionedSpecs>,
    overrides: BTreeMap<String, bool>,
    emulation: Option<Version>,
}

impl FeatureGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// add specs for features, merging with any already known
    pub fn add_versioned(&mut self, features: BTreeMap<String, VersionedSpecs>) {
        for (name, specs) in features {
            let entry = self.known.entry(name).or_default();
            entry.extend(specs);
            entry.sort_by_key(|spec| spec.version);
        }
    }

    pub fn set_from_map(&mut self, overrides: &BTreeMap<String, bool>) {
        for (name, enabled) in overrides {
            self.overrides.insert(name.clone(), *enabled);
        }
    }

    pub fn set_emulation_version(&mut self, version: Version) {
        self.emulation = Some(version.major_minor());
    }

    pub fn emulation_version(&self) -> Option<Version> {
        self.emulation
    }

    pub fn known_features(&self) -> Vec<&str> {
        self.known.keys().map(|name| name.as_str()).collect()
    }

    /// spec in effect at the emulation version, latest spec if none is set
    fn current_spec(&self, feature: &str) -> Option<&VersionedSpec> {
        let specs = self.known.get(feature)?;
        match self.emulation {
            Some(emulation) => specs.iter().rev().find(|spec| spec.version <= emulation),
            None => specs.last(),
        }
    }

    pub fn enabled(&self, feature: &str) -> bool {
        let spec = match self.current_spec(feature) {
            Some(spec) => spec,
            None => return false,
        };
        if spec.lock_to_default {
            return spec.default;
        }
        self.overrides
            .get(feature)
            .copied()
            .unwrap_or(spec.default)
    }

    fn validate(&self, component: &str) -> Vec<VersionError> {
        let mut errors = vec![];
        for (feature, enabled) in &self.overrides {
            match self.current_spec(feature) {
                None => errors.push(VersionError::UnknownFeature {
                    component: component.to_owned(),
                    feature: feature.clone(),
                }),
                Some(spec) if spec.lock_to_default && spec.default != *enabled => {
                    errors.push(VersionError::LockedFeature {
                        component: component.to_owned(),
                        feature: feature.clone(),
                        default: spec.default,
                    })
                }
                Some(_) => {}
            }
        }
        errors
    }
}

/// Maps emulation version of one component onto another.
/// `None` defers to the dependent component's own default.
pub type VersionMapping = Arc<dyn Fn(&Version) -> Option<Version> + Send + Sync>;

/// Mapping anchored at `anchor`: the anchor maps onto `dependent_max` and every
/// minor below it onto one minor lower of the dependent, never above `dependent_max`.
/// Other majors have no mapping.
pub fn dependent_version_mapping(anchor: Version, dependent_max: Version) -> VersionMapping {
    Arc::new(move |version: &Version| {
        if version.major != anchor.major {
            return None;
        }
        let offset = version.minor as i64 - anchor.minor as i64;
        let mapped = dependent_max.major_minor().offset_minor(offset);
        if mapped > dependent_max {
            Some(dependent_max)
        } else {
            Some(mapped)
        }
    })
}

struct ComponentGlobals {
    effective_version: EffectiveVersion,
    feature_gate: FeatureGate,
}

struct EmulationMapping {
    from: String,
    to: String,
    mapping: VersionMapping,
}

/// Versions and feature gates of every component in the process.
///
/// Owned by the builder. Components register first, then requests and
/// mappings are applied once by `set`.
#[derive(Default)]
pub struct ComponentGlobalsRegistry {
    components: BTreeMap<String, ComponentGlobals>,
    mappings: Vec<EmulationMapping>,
    emulation_requests: BTreeMap<String, Version>,
    feature_gate_requests: BTreeMap<String, BTreeMap<String, bool>>,
    set_done: bool,
}

impl fmt::Debug for ComponentGlobalsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mappings: Vec<String> = self
            .mappings
            .iter()
            .map(|m| format!("{}->{}", m.from, m.to))
            .collect();
        f.debug_struct("ComponentGlobalsRegistry")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("mappings", &mappings)
            .field("set_done", &self.set_done)
            .finish()
    }
}

impl ComponentGlobalsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        component: &str,
        effective_version: EffectiveVersion,
        feature_gate: FeatureGate,
    ) -> Result<(), VersionError> {
        if self.components.contains_key(component) {
            return Err(VersionError::DuplicateComponent(component.to_owned()));
        }
        self.component_globals_or_register(component, effective_version, feature_gate);
        Ok(())
    }

    /// register unless already present. returns true if newly registered
    pub fn component_globals_or_register(
        &mut self,
        component: &str,
        effective_version: EffectiveVersion,
        feature_gate: FeatureGate,
    ) -> bool {
        if self.components.contains_key(component) {
            trace!(component, "component already registered");
            return false;
        }
        debug!(
            component,
            binary = %effective_version.binary_version(),
            "registering component"
        );
        self.components.insert(
            component.to_owned(),
            ComponentGlobals {
                effective_version,
                feature_gate,
            },
        );
        true
    }

    pub fn is_registered(&self, component: &str) -> bool {
        self.components.contains_key(component)
    }

    pub fn components(&self) -> Vec<&str> {
        self.components.keys().map(|name| name.as_str()).collect()
    }

    pub fn effective_version_for(&self, component: &str) -> Option<&EffectiveVersion> {
        self.components
            .get(component)
            .map(|globals| &globals.effective_version)
    }

    pub fn feature_gate_for(&self, component: &str) -> Option<&FeatureGate> {
        self.components
            .get(component)
            .map(|globals| &globals.feature_gate)
    }

    /// emulation version of `to` follows emulation version of `from`
    pub fn set_emulation_version_mapping(
        &mut self,
        from: &str,
        to: &str,
        mapping: VersionMapping,
    ) -> Result<(), VersionError> {
        if from == to {
            return Err(VersionError::SelfMapping(from.to_owned()));
        }
        for component in [from, to] {
            if !self.components.contains_key(component) {
                return Err(VersionError::UnknownComponent(component.to_owned()));
            }
        }
        if let Some(existing) = self.mappings.iter().find(|m| m.to == to) {
            return Err(VersionError::DuplicateMapping {
                from: existing.from.clone(),
                to: to.to_owned(),
            });
        }
        self.mappings.push(EmulationMapping {
            from: from.to_owned(),
            to: to.to_owned(),
            mapping,
        });
        Ok(())
    }

    pub fn request_emulation_version(&mut self, component: &str, version: Version) {
        self.emulation_requests
            .insert(component.to_owned(), version.major_minor());
    }

    pub fn request_feature_gates(&mut self, component: &str, overrides: BTreeMap<String, bool>) {
        self.feature_gate_requests
            .entry(component.to_owned())
            .or_default()
            .extend(overrides);
    }

    /// Apply requested versions and feature gates, then the emulation mappings.
    /// Only the first call has an effect.
    pub fn set(&mut self) -> Result<(), VersionError> {
        if self.set_done {
            trace!("component globals already set");
            return Ok(());
        }

        for (component, version) in &self.emulation_requests {
            let globals = self
                .components
                .get_mut(component)
                .ok_or_else(|| VersionError::UnknownComponent(component.clone()))?;
            debug!(component = %component, %version, "emulation version requested");
            globals.effective_version.set_emulation_version(*version);
        }

        for (component, overrides) in &self.feature_gate_requests {
            let globals = self
                .components
                .get_mut(component)
                .ok_or_else(|| VersionError::UnknownComponent(component.clone()))?;
            globals.feature_gate.set_from_map(overrides);
        }

        for mapping in &self.mappings {
            if self.emulation_requests.contains_key(&mapping.to) {
                // reported by validate
                continue;
            }
            let from_version = match self.components.get(&mapping.from) {
                Some(globals) => globals.effective_version.emulation_version(),
                None => return Err(VersionError::UnknownComponent(mapping.from.clone())),
            };
            match (mapping.mapping)(&from_version) {
                Some(mapped) => {
                    debug!(
                        from = %mapping.from,
                        to = %mapping.to,
                        %from_version,
                        %mapped,
                        "mapped emulation version"
                    );
                    if let Some(globals) = self.components.get_mut(&mapping.to) {
                        globals.effective_version.set_emulation_version(mapped);
                    }
                }
                None => {
                    debug!(from = %mapping.from, to = %mapping.to, %from_version, "no mapping, keep default");
                }
            }
        }

        for globals in self.components.values_mut() {
            let emulation = globals.effective_version.emulation_version();
            globals.feature_gate.set_emulation_version(emulation);
        }

        self.set_done = true;
        Ok(())
    }

    /// every inconsistency found, empty if valid
    pub fn validate(&self) -> Vec<VersionError> {
        let mut errors = vec![];

        for component in self
            .emulation_requests
            .keys()
            .chain(self.feature_gate_requests.keys())
        {
            if !self.components.contains_key(component) {
                errors.push(VersionError::UnknownComponent(component.clone()));
            }
        }

        for mapping in &self.mappings {
            if self.emulation_requests.contains_key(&mapping.to) {
                errors.push(VersionError::ConflictingRequest {
                    from: mapping.from.clone(),
                    to: mapping.to.clone(),
                });
            }
        }

        for (component, globals) in &self.components {
            if let Some(err) = globals.effective_version.validate(component) {
                errors.push(err);
            }
            errors.extend(globals.feature_gate.validate(component));
        }

        errors
    }
}
