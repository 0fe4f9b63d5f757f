use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use k8_types::options::ListOptions;

use crate::StorageError;

pub type SharedBackend = Arc<dyn StorageBackend>;

#[derive(Debug, Clone, PartialEq)]
pub enum NameSpace {
    All,
    Named(String),
}

impl NameSpace {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn named(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Named(name) => name,
        }
    }
}

impl From<String> for NameSpace {
    fn from(namespace: String) -> Self {
        NameSpace::Named(namespace)
    }
}

impl From<&str> for NameSpace {
    fn from(namespace: &str) -> Self {
        NameSpace::Named(namespace.to_owned())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListArg {
    pub field_selector: Option<String>,
    pub label_selector: Option<String>,
    pub limit: Option<u32>,
}

impl ListArg {
    pub fn with_label_selector<S: Into<String>>(mut self, selector: S) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn with_field_selector<S: Into<String>>(mut self, selector: S) -> Self {
        self.field_selector = Some(selector.into());
        self
    }
}

impl From<ListOptions> for ListArg {
    fn from(options: ListOptions) -> Self {
        Self {
            field_selector: options.field_selector,
            label_selector: options.label_selector,
            limit: options.limit,
        }
    }
}

/// raw items under a key prefix
#[derive(Debug, Default, Clone)]
pub struct ListResult {
    pub items: Vec<Value>,
    /// store revision at the time of listing
    pub resource_version: String,
}

/// Physical persistence engine behind every store adapter.
///
/// Values are JSON documents carrying a `metadata` object. The backend owns
/// `metadata.resourceVersion`: it stamps a new, monotonically increasing
/// version on every write.
#[async_trait]
pub trait StorageBackend: Debug + Send + Sync {
    /// fails with `AlreadyExists` if key is taken
    async fn create(&self, key: &str, value: Value) -> Result<Value, StorageError>;

    async fn get(&self, key: &str) -> Result<Value, StorageError>;

    /// all values whose key starts with prefix
    async fn list(&self, prefix: &str) -> Result<ListResult, StorageError>;

    /// replace existing value. if `precondition` is set, the stored
    /// resource version must match it
    async fn update(
        &self,
        key: &str,
        precondition: Option<&str>,
        value: Value,
    ) -> Result<Value, StorageError>;

    /// remove and return the value
    async fn delete(&self, key: &str) -> Result<Value, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }
}
