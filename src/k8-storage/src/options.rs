use std::fmt::Debug;
use std::sync::Arc;

use tracing::trace;

use k8_types::GroupResource;

use crate::InMemoryStorage;
use crate::SharedBackend;
use crate::StorageError;

/// everything a store adapter needs to reach its backend
#[derive(Debug, Clone)]
pub struct RestOptions {
    pub backend: SharedBackend,
    /// key prefix for all objects of the resource, e.g. `/registry/foo/bars`
    pub resource_prefix: String,
}

/// Resolves storage configuration for a resource
pub trait RestOptionsGetter: Debug + Send + Sync {
    fn get_rest_options(&self, resource: &GroupResource) -> Result<RestOptions, StorageError>;
}

/// All resources share one backend under a common prefix
#[derive(Debug, Clone)]
pub struct StorageFactory {
    backend: SharedBackend,
    prefix: String,
}

impl StorageFactory {
    pub fn new<S: Into<String>>(backend: SharedBackend, prefix: S) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn in_memory<S: Into<String>>(prefix: S) -> Self {
        Self::new(Arc::new(InMemoryStorage::new()), prefix)
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl RestOptionsGetter for StorageFactory {
    fn get_rest_options(&self, resource: &GroupResource) -> Result<RestOptions, StorageError> {
        if resource.resource.is_empty() {
            return Err(StorageError::Config(format!(
                "empty resource name for group \"{}\"",
                resource.group
            )));
        }
        if !self.prefix.starts_with('/') {
            return Err(StorageError::Config(format!(
                "storage prefix \"{}\" must be absolute",
                self.prefix
            )));
        }
        let resource_prefix = format!(
            "{}/{}",
            self.prefix.trim_end_matches('/'),
            resource.resource
        );
        trace!(%resource, %resource_prefix, "resolved rest options");
        Ok(RestOptions {
            backend: self.backend.clone(),
            resource_prefix,
        })
    }
}

#[cfg(test)]
mod test {

    use std::sync::Arc;

    use k8_types::GroupResource;

    use super::RestOptionsGetter;
    use super::StorageFactory;

    #[test]
    fn test_resource_prefix() {
        let factory = StorageFactory::in_memory("/registry/foo.example.com/");
        let options = factory
            .get_rest_options(&GroupResource::new("foo.example.com", "bars"))
            .expect("options");
        assert_eq!(options.resource_prefix, "/registry/foo.example.com/bars");
        assert!(Arc::ptr_eq(&options.backend, factory.backend()));
    }

    #[test]
    fn test_misconfigured() {
        let factory = StorageFactory::in_memory("registry");
        assert!(factory
            .get_rest_options(&GroupResource::new("foo", "bars"))
            .is_err());

        let factory = StorageFactory::in_memory("/registry");
        assert!(factory
            .get_rest_options(&GroupResource::new("foo", ""))
            .is_err());
    }
}
