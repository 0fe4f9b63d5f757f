use std::fmt;
use std::sync::Arc;

use tracing::debug;

use k8_types::GroupVersion;

use crate::resource::new_list;
use crate::resource::new_object;
use crate::resource::ApiResource;
use crate::rest::new_store;
use crate::rest::DefaultStrategy;
use crate::rest::PrepareForUpdaterStrategy;
use crate::rest::ResourceStorageMap;
use crate::rest::StatusStore;
use crate::rest::Storage;
use crate::rest::StorageMap;
use crate::ApiGroupInfo;
use crate::BuildError;
use crate::CompletedConfig;

/// Builds the api group contribution of a registration once the server
/// configuration is complete
pub type ApiGroupFn =
    Box<dyn FnOnce(&CompletedConfig) -> Result<ApiGroupInfo, BuildError> + Send>;

/// Registration of one kind: the group versions it is served at and the
/// function producing its storage
pub struct ResourceHandler {
    group_versions: Vec<GroupVersion>,
    api_group_fn: ApiGroupFn,
}

impl fmt::Debug for ResourceHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("group_versions", &self.group_versions)
            .finish()
    }
}

impl ResourceHandler {
    pub fn group_versions(&self) -> &[GroupVersion] {
        &self.group_versions
    }

    pub(crate) fn into_parts(self) -> (Vec<GroupVersion>, ApiGroupFn) {
        (self.group_versions, self.api_group_fn)
    }
}

/// Register kind `S` at the given group versions.
///
/// Every group version must be in the group of the kind.
pub fn resource<S: ApiResource>(
    group_versions: Vec<GroupVersion>,
) -> Result<ResourceHandler, BuildError> {
    let group_resource = S::group_resource();
    if group_versions.is_empty() {
        return Err(BuildError::NoGroupVersions(group_resource.to_string()));
    }
    if let Some(gv) = group_versions
        .iter()
        .find(|gv| gv.group != group_resource.group)
    {
        return Err(BuildError::ResourceGroupMismatch {
            resource: group_resource,
            group_version: gv.clone(),
        });
    }

    let versions = group_versions.clone();
    let api_group_fn: ApiGroupFn = Box::new(move |config: &CompletedConfig| {
        let storage = resource_storage::<S>(config)?;
        let mut versioned_resources_storage_map = StorageMap::new();
        for gv in &versions {
            versioned_resources_storage_map.insert(gv.version.clone(), storage.clone());
        }
        Ok(ApiGroupInfo::new(
            group_resource.group.clone(),
            versions,
            versioned_resources_storage_map,
        ))
    });

    Ok(ResourceHandler {
        group_versions,
        api_group_fn,
    })
}

/// main storage of the kind plus its status view, if the kind has one
fn resource_storage<S: ApiResource>(
    config: &CompletedConfig,
) -> Result<ResourceStorageMap, BuildError> {
    let group_resource = S::group_resource();
    let strategy = Arc::new(DefaultStrategy::<S>::new());
    let copy_status = strategy.capabilities().copy_status();

    let (store, storage) = new_store(
        new_object::<S>,
        new_list::<S>,
        group_resource.clone(),
        strategy,
        config.rest_options_getter(),
    )?;

    let mut map = ResourceStorageMap::new();
    map.insert(group_resource.resource.clone(), storage);

    if let Some(copy_status) = copy_status {
        let status_strategy = PrepareForUpdaterStrategy::status(store.update_strategy(), copy_status);
        let status: Arc<dyn Storage> = Arc::new(StatusStore::new(store, Arc::new(status_strategy)));
        map.insert(format!("{}/status", group_resource.resource), status);
    }

    debug!(
        resource = %group_resource,
        kind = %S::kind(),
        entries = ?map.keys().collect::<Vec<_>>(),
        "resource registered"
    );
    Ok(map)
}
