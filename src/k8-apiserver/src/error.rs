use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use k8_config::ConfigError;
use k8_storage::SelectorError;
use k8_storage::StorageError;
use k8_types::validation::summarize;
use k8_types::validation::ErrorList;
use k8_types::GroupResource;
use k8_types::GroupVersion;

use crate::compatibility::VersionError;

/// Per request failure, surfaced to the serving layer as is
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{resource} \"{name}\" not found")]
    NotFound {
        resource: GroupResource,
        name: String,
    },
    #[error("{resource} \"{name}\" already exists")]
    AlreadyExists {
        resource: GroupResource,
        name: String,
    },
    #[error("operation cannot be fulfilled on {resource} \"{name}\": {reason}")]
    Conflict {
        resource: GroupResource,
        name: String,
        reason: String,
    },
    #[error("{kind} \"{name}\" is invalid: {}", summarize(.errors))]
    Invalid {
        kind: String,
        name: String,
        errors: ErrorList,
    },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("object does not have metadata")]
    MissingMetadata,
    #[error("selector error: {0}")]
    Selector(#[from] SelectorError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Json error: {0}")]
    Json(#[from] SerdeJsonError),
}

impl ApiError {
    pub fn invalid<K: Into<String>, N: Into<String>>(kind: K, name: N, errors: ErrorList) -> Self {
        Self::Invalid {
            kind: kind.into(),
            name: name.into(),
            errors,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

/// Assembly time failure. Aborts start up, never retried.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("all exposed resources are expected to have the same group: \"{expected}\" and \"{found}\"")]
    GroupMismatch { expected: String, found: String },
    #[error("resource {resource} cannot be served in group version {group_version}")]
    ResourceGroupMismatch {
        resource: GroupResource,
        group_version: GroupVersion,
    },
    #[error("empty group name is not allowed")]
    EmptyGroupName,
    #[error("no group versions given for {0}")]
    NoGroupVersions(String),
    #[error("cannot construct store for {resource}: {source}")]
    StoreConstruction {
        resource: GroupResource,
        #[source]
        source: StorageError,
    },
    #[error("resource \"{resource}\" of version \"{version}\" is contributed more than once")]
    StorageCollision { version: String, resource: String },
    #[error("api group \"{0}\" is already installed")]
    GroupAlreadyInstalled(String),
    #[error("post start hook \"{0}\" is already registered")]
    DuplicatePostStartHook(String),
    #[error("post start hook \"{name}\" failed: {reason}")]
    PostStartHook { name: String, reason: String },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("version error: {0}")]
    Version(#[from] VersionError),
    #[error("invalid configuration: [{}]", .0.join(", "))]
    Invalid(Vec<String>),
}
