use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use k8_config::DEFAULT_STORAGE_PREFIX;
use k8_storage::RestOptionsGetter;
use k8_storage::StorageFactory;
use k8_types::GroupVersion;

use crate::compatibility::ComponentGlobalsRegistry;
use crate::compatibility::EffectiveVersion;
use crate::compatibility::FeatureGate;
use crate::rest::Storage;
use crate::rest::StorageMap;
use crate::BuildError;
use crate::StopSignal;

/// Background collaborator started once the server is assembled.
/// It is expected to run until `stop` is notified.
pub trait SharedInformerFactory: Debug + Send + Sync {
    fn start(&self, stop: Arc<StopSignal>);
}

/// Server configuration, open to modification until completed
#[derive(Debug)]
pub struct RecommendedConfig {
    pub component_name: String,
    pub rest_options_getter: Option<Arc<dyn RestOptionsGetter>>,
    pub shared_informer_factory: Option<Arc<dyn SharedInformerFactory>>,
    pub effective_version: Option<EffectiveVersion>,
    pub feature_gate: Option<FeatureGate>,
}

impl RecommendedConfig {
    pub fn new<S: Into<String>>(component_name: S) -> Self {
        Self {
            component_name: component_name.into(),
            rest_options_getter: None,
            shared_informer_factory: None,
            effective_version: None,
            feature_gate: None,
        }
    }

    pub fn with_rest_options_getter(mut self, getter: Arc<dyn RestOptionsGetter>) -> Self {
        self.rest_options_getter = Some(getter);
        self
    }

    pub fn with_shared_informer_factory(mut self, factory: Arc<dyn SharedInformerFactory>) -> Self {
        self.shared_informer_factory = Some(factory);
        self
    }

    /// Fill what is still missing. Without a getter, objects are kept in
    /// process memory under the default prefix.
    pub fn complete(self) -> CompletedConfig {
        let rest_options_getter = match self.rest_options_getter {
            Some(getter) => getter,
            None => {
                warn!(
                    component = %self.component_name,
                    "no storage configured, using in-memory storage"
                );
                Arc::new(StorageFactory::in_memory(DEFAULT_STORAGE_PREFIX))
            }
        };
        CompletedConfig {
            component_name: self.component_name,
            rest_options_getter,
            shared_informer_factory: self.shared_informer_factory,
            effective_version: self.effective_version,
            feature_gate: self.feature_gate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletedConfig {
    component_name: String,
    rest_options_getter: Arc<dyn RestOptionsGetter>,
    shared_informer_factory: Option<Arc<dyn SharedInformerFactory>>,
    effective_version: Option<EffectiveVersion>,
    feature_gate: Option<FeatureGate>,
}

impl CompletedConfig {
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn rest_options_getter(&self) -> &dyn RestOptionsGetter {
        self.rest_options_getter.as_ref()
    }

    pub fn shared_informer_factory(&self) -> Option<&Arc<dyn SharedInformerFactory>> {
        self.shared_informer_factory.as_ref()
    }

    pub fn effective_version(&self) -> Option<&EffectiveVersion> {
        self.effective_version.as_ref()
    }

    pub fn feature_gate(&self) -> Option<&FeatureGate> {
        self.feature_gate.as_ref()
    }
}

/// Everything served for one api group
#[derive(Debug, Clone)]
pub struct ApiGroupInfo {
    group: String,
    prioritized_versions: Vec<GroupVersion>,
    versioned_resources_storage_map: StorageMap,
}

impl ApiGroupInfo {
    pub fn new<S: Into<String>>(
        group: S,
        prioritized_versions: Vec<GroupVersion>,
        versioned_resources_storage_map: StorageMap,
    ) -> Self {
        Self {
            group: group.into(),
            prioritized_versions,
            versioned_resources_storage_map,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// versions in order of preference
    pub fn prioritized_versions(&self) -> &[GroupVersion] {
        &self.prioritized_versions
    }

    pub fn versioned_resources_storage_map(&self) -> &StorageMap {
        &self.versioned_resources_storage_map
    }

    pub(crate) fn set_versioned_resources_storage_map(&mut self, map: StorageMap) {
        self.versioned_resources_storage_map = map;
    }

    /// append versions not yet known
    pub(crate) fn add_prioritized_versions(&mut self, versions: &[GroupVersion]) {
        for gv in versions {
            if !self.prioritized_versions.contains(gv) {
                self.prioritized_versions.push(gv.clone());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostStartHookContext {
    stop: Arc<StopSignal>,
}

impl PostStartHookContext {
    /// notified when the server shuts down
    pub fn done(&self) -> Arc<StopSignal> {
        self.stop.clone()
    }
}

pub type PostStartHookFn =
    Box<dyn Fn(&PostStartHookContext) -> Result<(), BuildError> + Send + Sync>;

struct PostStartHook {
    name: String,
    hook: PostStartHookFn,
}

/// Assembled server: installed api groups, the configuration they were
/// built with and the component versions of the process
pub struct ApiServer {
    name: String,
    config: CompletedConfig,
    groups: BTreeMap<String, ApiGroupInfo>,
    post_start_hooks: Vec<PostStartHook>,
    started: AtomicBool,
    registry: ComponentGlobalsRegistry,
}

impl fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ApiServer")
            .field("name", &self.name)
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("post_start_hooks", &self.post_start_hook_names())
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish()
    }
}

impl ApiServer {
    pub fn new<S: Into<String>>(
        name: S,
        config: CompletedConfig,
        registry: ComponentGlobalsRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            groups: BTreeMap::new(),
            post_start_hooks: vec![],
            started: AtomicBool::new(false),
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CompletedConfig {
        &self.config
    }

    pub fn component_globals_registry(&self) -> &ComponentGlobalsRegistry {
        &self.registry
    }

    pub fn install_api_group(&mut self, info: ApiGroupInfo) -> Result<(), BuildError> {
        if info.group.is_empty() {
            return Err(BuildError::EmptyGroupName);
        }
        if self.groups.contains_key(&info.group) {
            return Err(BuildError::GroupAlreadyInstalled(info.group));
        }
        info!(
            server = %self.name,
            group = %info.group,
            versions = ?info.versioned_resources_storage_map.keys().collect::<Vec<_>>(),
            "installing api group"
        );
        self.groups.insert(info.group.clone(), info);
        Ok(())
    }

    pub fn groups(&self) -> &BTreeMap<String, ApiGroupInfo> {
        &self.groups
    }

    pub fn group(&self, group: &str) -> Option<&ApiGroupInfo> {
        self.groups.get(group)
    }

    /// storage serving `resource` (or `resource/subresource`)
    pub fn storage(&self, group: &str, version: &str, resource: &str) -> Option<Arc<dyn Storage>> {
        self.groups
            .get(group)
            .and_then(|info| info.versioned_resources_storage_map.get(version))
            .and_then(|resources| resources.get(resource))
            .cloned()
    }

    pub fn add_post_start_hook<S: Into<String>>(
        &mut self,
        name: S,
        hook: PostStartHookFn,
    ) -> Result<(), BuildError> {
        let name = name.into();
        if self.post_start_hooks.iter().any(|h| h.name == name) {
            return Err(BuildError::DuplicatePostStartHook(name));
        }
        debug!(server = %self.name, hook = %name, "post start hook added");
        self.post_start_hooks.push(PostStartHook { name, hook });
        Ok(())
    }

    pub fn post_start_hook_names(&self) -> Vec<&str> {
        self.post_start_hooks
            .iter()
            .map(|h| h.name.as_str())
            .collect()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Run post start hooks. Only the first call runs them.
    pub fn start(&self, stop: Arc<StopSignal>) -> Result<(), BuildError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(server = %self.name, "already started");
            return Ok(());
        }

        let context = PostStartHookContext { stop };
        for PostStartHook { name, hook } in &self.post_start_hooks {
            debug!(server = %self.name, hook = %name, "running post start hook");
            hook(&context)?;
        }
        info!(server = %self.name, "started");
        Ok(())
    }

    /// start and wait until stopped
    pub async fn run(&self, stop: Arc<StopSignal>) -> Result<(), BuildError> {
        self.start(stop.clone())?;
        stop.listen().await;
        info!(server = %self.name, "stopped");
        Ok(())
    }
}
