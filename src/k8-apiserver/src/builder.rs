//!
//! # Builder
//!
//! Collects resource registrations and assembles them into one server:
//! checks that every group version is in the same group, registers the
//! component versions, merges the storage contributed for a group and
//! installs the start up hooks.
//!
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::info;

use k8_config::RecommendedOptions;
use k8_storage::SharedBackend;
use k8_storage::StorageFactory;
use k8_types::GroupVersion;

use crate::compatibility::dependent_version_mapping;
use crate::compatibility::ComponentGlobalsRegistry;
use crate::compatibility::EffectiveVersion;
use crate::compatibility::FeatureGate;
use crate::compatibility::Version;
use crate::compatibility::VersionedSpecs;
use crate::compatibility::DEFAULT_KUBE_BINARY_VERSION;
use crate::compatibility::DEFAULT_KUBE_COMPONENT;
use crate::rest::ResourceStorageMap;
use crate::rest::StorageMap;
use crate::ApiGroupFn;
use crate::ApiGroupInfo;
use crate::ApiServer;
use crate::BuildError;
use crate::PostStartHookContext;
use crate::RecommendedConfig;
use crate::ResourceHandler;
use crate::SharedInformerFactory;
use crate::StopSignal;

/// binary version of a component unless given
pub const DEFAULT_COMPONENT_VERSION: &str = "1.2";

pub type RecommendedConfigFn = Box<dyn FnOnce(&mut RecommendedConfig) + Send>;

/// Assembles an api server out of resource registrations
#[derive(Default)]
pub struct Builder {
    component_name: String,
    component_version: Option<String>,
    kube_version: Option<String>,
    group_versions: Vec<GroupVersion>,
    api_group_fns: Vec<ApiGroupFn>,
    shared_informer_factories: Vec<Arc<dyn SharedInformerFactory>>,
    recommended_options: Option<RecommendedOptions>,
    recommended_config_fns: Vec<RecommendedConfigFn>,
    backend: Option<SharedBackend>,
    registry: Option<ComponentGlobalsRegistry>,
    skip_registry_set: bool,
    feature_specs: BTreeMap<String, VersionedSpecs>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// name used for server identification and logging
    pub fn with_component_name<S: Into<String>>(mut self, name: S) -> Self {
        self.component_name = name.into();
        self
    }

    pub fn with_component_version<S: Into<String>>(mut self, version: S) -> Self {
        self.component_version = Some(version.into());
        self
    }

    /// binary version of the kube component the server depends on
    pub fn with_kube_version<S: Into<String>>(mut self, version: S) -> Self {
        self.kube_version = Some(version.into());
        self
    }

    pub fn with_group_versions(mut self, group_versions: Vec<GroupVersion>) -> Self {
        self.group_versions.extend(group_versions);
        self
    }

    pub fn with_api_group_fn(mut self, api_group_fn: ApiGroupFn) -> Self {
        self.api_group_fns.push(api_group_fn);
        self
    }

    /// add a registration: its storage and the group versions it is served at
    pub fn with(self, handler: ResourceHandler) -> Self {
        let (group_versions, api_group_fn) = handler.into_parts();
        self.with_api_group_fn(api_group_fn)
            .with_group_versions(group_versions)
    }

    /// started once the server is assembled
    pub fn with_shared_informer_factory(mut self, factory: Arc<dyn SharedInformerFactory>) -> Self {
        self.shared_informer_factories.push(factory);
        self
    }

    pub fn with_recommended_options(mut self, options: RecommendedOptions) -> Self {
        self.recommended_options = Some(options);
        self
    }

    /// modify the server configuration before it is completed
    pub fn with_recommended_config_fn(mut self, config_fn: RecommendedConfigFn) -> Self {
        self.recommended_config_fns.push(config_fn);
        self
    }

    /// physical store shared by every resource
    pub fn with_storage_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Registry of component versions to use. Components already
    /// registered in it are kept as they are.
    pub fn with_component_globals_registry(mut self, registry: ComponentGlobalsRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// leave requested versions and feature gates of the registry unapplied
    pub fn skip_component_globals_registry_set(mut self) -> Self {
        self.skip_registry_set = true;
        self
    }

    /// versioned specs of the component's features
    pub fn with_feature_specs(mut self, specs: BTreeMap<String, VersionedSpecs>) -> Self {
        self.feature_specs.extend(specs);
        self
    }

    /// the single group every registration belongs to
    fn group_name(&self) -> Result<String, BuildError> {
        let mut group_name: Option<&str> = None;
        for gv in &self.group_versions {
            if gv.group.is_empty() {
                return Err(BuildError::EmptyGroupName);
            }
            match group_name {
                Some(expected) if expected != gv.group => {
                    return Err(BuildError::GroupMismatch {
                        expected: expected.to_owned(),
                        found: gv.group.clone(),
                    });
                }
                Some(_) => {}
                None => group_name = Some(&gv.group),
            }
        }
        Ok(group_name.unwrap_or_default().to_owned())
    }

    /// group versions in order of registration, without duplicates
    fn ordered_group_versions(&self) -> Vec<GroupVersion> {
        let mut ordered: Vec<GroupVersion> = vec![];
        for gv in &self.group_versions {
            if !ordered.contains(gv) {
                ordered.push(gv.clone());
            }
        }
        ordered
    }

    fn register_components(
        &self,
        registry: &mut ComponentGlobalsRegistry,
    ) -> Result<(), BuildError> {
        let component_version: Version = self
            .component_version
            .as_deref()
            .unwrap_or(DEFAULT_COMPONENT_VERSION)
            .parse()?;
        let kube_version: Version = self
            .kube_version
            .as_deref()
            .unwrap_or(DEFAULT_KUBE_BINARY_VERSION)
            .parse()?;

        let mut feature_gate = FeatureGate::new();
        feature_gate.add_versioned(self.feature_specs.clone());
        registry.component_globals_or_register(
            &self.component_name,
            EffectiveVersion::new(component_version),
            feature_gate,
        );
        registry.component_globals_or_register(
            DEFAULT_KUBE_COMPONENT,
            EffectiveVersion::new(kube_version),
            FeatureGate::new(),
        );

        registry.set_emulation_version_mapping(
            &self.component_name,
            DEFAULT_KUBE_COMPONENT,
            dependent_version_mapping(component_version.major_minor(), kube_version.major_minor()),
        )?;
        Ok(())
    }

    /// Assemble the server. Every configuration problem is reported here,
    /// before anything is started.
    pub fn build(mut self) -> Result<ApiServer, BuildError> {
        debug!(component = %self.component_name, "building server");
        let group_name = self.group_name()?;
        let ordered_group_versions = self.ordered_group_versions();

        let mut options = self
            .recommended_options
            .take()
            .unwrap_or_else(|| RecommendedOptions::new(format!("/registry/{}", group_name), vec![]));
        options.storage.encode_versions = ordered_group_versions
            .iter()
            .map(|gv| gv.to_string())
            .collect();
        if self.component_name.is_empty() {
            self.component_name = options.component_name.clone();
        } else {
            options.component_name = self.component_name.clone();
        }

        let mut registry = self.registry.take().unwrap_or_default();
        self.register_components(&mut registry)?;

        // requests that do not parse are reported by the options validation
        if let Some(version) = options
            .emulated_version
            .as_deref()
            .and_then(|version| version.parse::<Version>().ok())
        {
            registry.request_emulation_version(&self.component_name, version);
        }
        if !options.feature_gates.is_empty() {
            registry.request_feature_gates(&self.component_name, options.feature_gates.clone());
        }

        if self.skip_registry_set {
            debug!("skipping component globals set");
        } else {
            registry.set()?;
        }

        if ordered_group_versions.is_empty() {
            return Err(BuildError::NoGroupVersions(self.component_name.clone()));
        }
        let errors: Vec<String> = options
            .validate()
            .into_iter()
            .map(|err| err.to_string())
            .chain(registry.validate().into_iter().map(|err| err.to_string()))
            .collect();
        if !errors.is_empty() {
            return Err(BuildError::Invalid(errors));
        }

        let mut config = RecommendedConfig::new(self.component_name.clone());
        for config_fn in self.recommended_config_fns.drain(..) {
            config_fn(&mut config);
        }
        config.feature_gate = registry.feature_gate_for(DEFAULT_KUBE_COMPONENT).cloned();
        config.effective_version = registry.effective_version_for(&self.component_name).cloned();

        if config.rest_options_getter.is_none() {
            let factory = match self.backend.take() {
                Some(backend) => StorageFactory::new(backend, options.storage.prefix.clone()),
                None => StorageFactory::in_memory(options.storage.prefix.clone()),
            };
            config.rest_options_getter = Some(Arc::new(factory));
        }
        let config_informer_factory = config.shared_informer_factory.clone();

        let mut server = ApiServer::new(
            format!("{}-apiserver", self.component_name),
            config.complete(),
            registry,
        );

        let mut groups: BTreeMap<String, ApiGroupInfo> = BTreeMap::new();
        for api_group_fn in self.api_group_fns.drain(..) {
            let info = api_group_fn(server.config())?;
            let group = info
                .prioritized_versions()
                .first()
                .map(|gv| gv.group.clone())
                .unwrap_or_default();
            if group.is_empty() {
                return Err(BuildError::EmptyGroupName);
            }

            match groups.get_mut(&group) {
                Some(previous) => {
                    let merged = merge_versioned_resources_storage_map(
                        previous.versioned_resources_storage_map(),
                        info.versioned_resources_storage_map(),
                    )?;
                    previous.set_versioned_resources_storage_map(merged);
                    previous.add_prioritized_versions(info.prioritized_versions());
                }
                None => {
                    groups.insert(group, info);
                }
            }
        }

        for info in groups.into_values() {
            server.install_api_group(info)?;
        }

        let factories = self.shared_informer_factories.clone();
        server.add_post_start_hook(
            format!("start-{}-server-informers", self.component_name),
            Box::new(move |context: &PostStartHookContext| {
                if let Some(factory) = &config_informer_factory {
                    factory.start(context.done());
                }
                for factory in &factories {
                    factory.start(context.done());
                }
                Ok(())
            }),
        )?;

        info!(server = %server.name(), groups = server.groups().len(), "server assembled");
        Ok(server)
    }

    /// Build and run the server until `stop` is notified
    pub async fn execute_with_stop(self, stop: Arc<StopSignal>) -> Result<(), BuildError> {
        let server = self.build()?;
        server.run(stop).await
    }

    /// Build and run until the process is stopped.
    /// Returns the process exit code.
    pub fn execute(self) -> i32 {
        let stop = StopSignal::shared();
        match fluvio_future::task::run_block_on(self.execute_with_stop(stop)) {
            Ok(()) => 0,
            Err(err) => {
                error!("{}", err);
                1
            }
        }
    }
}

/// Union of two storage maps of the same group. The inputs are left as
/// they are; a resource contributed to the same version by both is an error.
pub fn merge_versioned_resources_storage_map(
    a: &StorageMap,
    b: &StorageMap,
) -> Result<StorageMap, BuildError> {
    let mut merged = a.clone();
    for (version, resources) in b {
        let target: &mut ResourceStorageMap = merged.entry(version.clone()).or_default();
        for (resource, storage) in resources {
            if target.contains_key(resource) {
                return Err(BuildError::StorageCollision {
                    version: version.clone(),
                    resource: resource.clone(),
                });
            }
            target.insert(resource.clone(), storage.clone());
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod test {

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use k8_config::RecommendedOptions;
    use k8_types::GroupVersion;

    use super::merge_versioned_resources_storage_map;
    use super::Builder;
    use crate::compatibility::ComponentGlobalsRegistry;
    use crate::compatibility::PreRelease;
    use crate::compatibility::Version;
    use crate::compatibility::VersionedSpec;
    use crate::compatibility::DEFAULT_KUBE_COMPONENT;
    use crate::resource;
    use crate::rest::fixture::*;
    use crate::rest::ResourceStorageMap;
    use crate::rest::StorageMap;
    use crate::BuildError;
    use crate::RecommendedConfig;
    use crate::SharedInformerFactory;
    use crate::StopSignal;

    fn storage_map(entries: &[(&str, &str)]) -> StorageMap {
        let mut map = StorageMap::new();
        for (version, resource) in entries {
            map.entry(version.to_string())
                .or_insert_with(ResourceStorageMap::new)
                .insert(resource.to_string(), bar_storage());
        }
        map
    }

    fn keys(map: &StorageMap) -> Vec<(String, String)> {
        map.iter()
            .flat_map(|(version, resources)| {
                resources
                    .keys()
                    .map(move |resource| (version.clone(), resource.clone()))
            })
            .collect()
    }

    fn gv(version: &str) -> GroupVersion {
        GroupVersion::new(GROUP, version)
    }

    #[derive(Debug, Default)]
    struct CountingInformers {
        starts: AtomicUsize,
    }

    impl SharedInformerFactory for CountingInformers {
        fn start(&self, _stop: Arc<StopSignal>) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_merge_with_empty() {
        let a = storage_map(&[("v1", "bars"), ("v1", "bars/status")]);
        let empty = StorageMap::new();

        let merged = merge_versioned_resources_storage_map(&a, &empty).expect("merge");
        assert_eq!(keys(&merged), keys(&a));
        let merged = merge_versioned_resources_storage_map(&empty, &a).expect("merge");
        assert_eq!(keys(&merged), keys(&a));
        assert!(Arc::ptr_eq(&merged["v1"]["bars"], &a["v1"]["bars"]));

        let merged = merge_versioned_resources_storage_map(&empty, &empty).expect("merge");
        assert!(merged.is_empty());
    }

    #[test]
    fn test_merge_is_union() {
        let a = storage_map(&[("v1", "bars")]);
        let b = storage_map(&[("v1", "gadgets"), ("v2", "bars")]);

        let merged = merge_versioned_resources_storage_map(&a, &b).expect("merge");
        assert_eq!(
            keys(&merged),
            vec![
                ("v1".to_owned(), "bars".to_owned()),
                ("v1".to_owned(), "gadgets".to_owned()),
                ("v2".to_owned(), "bars".to_owned()),
            ]
        );
        assert!(Arc::ptr_eq(&merged["v1"]["bars"], &a["v1"]["bars"]));
        assert!(Arc::ptr_eq(&merged["v2"]["bars"], &b["v2"]["bars"]));

        let reversed = merge_versioned_resources_storage_map(&b, &a).expect("merge");
        assert_eq!(keys(&reversed), keys(&merged));

        // inputs untouched
        assert_eq!(keys(&a), vec![("v1".to_owned(), "bars".to_owned())]);
        assert_eq!(b["v1"].len(), 1);
    }

    #[test]
    fn test_merge_collision() {
        let a = storage_map(&[("v1", "bars")]);
        let b = storage_map(&[("v1", "bars")]);
        let err = merge_versioned_resources_storage_map(&a, &b).expect_err("collision");
        match err {
            BuildError::StorageCollision { version, resource } => {
                assert_eq!(version, "v1");
                assert_eq!(resource, "bars");
            }
            other => panic!("unexpected: {}", other),
        }
    }

    #[test]
    fn test_group_mismatch_across_registrations() {
        let err = Builder::new()
            .with_component_name("foo")
            .with_group_versions(vec![gv("v1")])
            .with_group_versions(vec![GroupVersion::new("other.example.com", "v1")])
            .build()
            .expect_err("mismatch");
        assert!(matches!(err, BuildError::GroupMismatch { .. }));
    }

    #[test]
    fn test_empty_group_is_rejected() {
        for group_versions in [
            vec![GroupVersion::new("", "v1"), gv("v1")],
            vec![gv("v1"), GroupVersion::new("", "v1")],
            vec![GroupVersion::new("", "v1")],
        ] {
            let err = Builder::new()
                .with_component_name("foo")
                .with_group_versions(group_versions)
                .build()
                .expect_err("empty group");
            assert!(matches!(err, BuildError::EmptyGroupName));
        }
    }

    #[test]
    fn test_build_without_group_versions() {
        let err = Builder::new()
            .with_component_name("foo")
            .build()
            .expect_err("nothing registered");
        assert!(matches!(err, BuildError::NoGroupVersions(_)));
    }

    #[test]
    fn test_build_merges_registrations() {
        let server = Builder::new()
            .with_component_name("foo")
            .with(resource::<BarSpec>(vec![gv("v1")]).expect("bars"))
            .with(resource::<GadgetSpec>(vec![gv("v1"), gv("v2")]).expect("gadgets"))
            .build()
            .expect("build");

        assert_eq!(server.name(), "foo-apiserver");
        assert_eq!(server.groups().len(), 1);
        let info = server.group(GROUP).expect("group");
        assert_eq!(info.prioritized_versions(), &[gv("v1"), gv("v2")]);
        assert_eq!(
            keys(info.versioned_resources_storage_map()),
            vec![
                ("v1".to_owned(), "bars".to_owned()),
                ("v1".to_owned(), "gadgets".to_owned()),
                ("v1".to_owned(), "gadgets/status".to_owned()),
                ("v2".to_owned(), "gadgets".to_owned()),
                ("v2".to_owned(), "gadgets/status".to_owned()),
            ]
        );

        let bars = server.storage(GROUP, "v1", "bars").expect("bars");
        assert_eq!(bars.resource_prefix(), "/registry/foo.example.com/bars");
        assert_eq!(
            server.post_start_hook_names(),
            vec!["start-foo-server-informers"]
        );
    }

    #[test]
    fn test_same_kind_twice_collides() {
        let err = Builder::new()
            .with_component_name("foo")
            .with(resource::<BarSpec>(vec![gv("v1")]).expect("bars"))
            .with(resource::<BarSpec>(vec![gv("v1")]).expect("bars"))
            .build()
            .expect_err("collision");
        assert!(matches!(err, BuildError::StorageCollision { .. }));
    }

    #[test]
    fn test_versions_registered_and_mapped() {
        let server = Builder::new()
            .with_component_name("foo")
            .with_group_versions(vec![gv("v1")])
            .with_recommended_options(
                RecommendedOptions::new("/registry/foo.example.com", vec![])
                    .set_emulated_version("1.1"),
            )
            .build()
            .expect("build");

        let registry = server.component_globals_registry();
        let foo = registry.effective_version_for("foo").expect("foo");
        assert_eq!(foo.binary_version(), Version::new(1, 2));
        assert_eq!(foo.emulation_version(), Version::new(1, 1));
        let kube = registry
            .effective_version_for(DEFAULT_KUBE_COMPONENT)
            .expect("kube");
        assert_eq!(kube.emulation_version(), Version::new(1, 33));

        let config = server.config();
        assert_eq!(
            config.effective_version().map(|v| v.emulation_version()),
            Some(Version::new(1, 1))
        );
        assert!(config.feature_gate().is_some());
    }

    #[test]
    fn test_feature_gates_from_options() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "Widgets".to_owned(),
            vec![
                VersionedSpec::new(Version::new(1, 0), false, PreRelease::Alpha),
                VersionedSpec::new(Version::new(1, 2), true, PreRelease::GA).locked(),
            ],
        );

        let server = Builder::new()
            .with_component_name("foo")
            .with_group_versions(vec![gv("v1")])
            .with_feature_specs(specs.clone())
            .with_recommended_options(
                RecommendedOptions::new("/registry/foo.example.com", vec![])
                    .set_emulated_version("1.1")
                    .set_feature_gate("Widgets", true),
            )
            .build()
            .expect("build");
        let gate = server
            .component_globals_registry()
            .feature_gate_for("foo")
            .expect("gate");
        assert!(gate.enabled("Widgets"));

        // locked at 1.2
        let err = Builder::new()
            .with_component_name("foo")
            .with_group_versions(vec![gv("v1")])
            .with_feature_specs(specs)
            .with_recommended_options(
                RecommendedOptions::new("/registry/foo.example.com", vec![])
                    .set_feature_gate("Widgets", false)
                    .set_feature_gate("Unknown", true),
            )
            .build()
            .expect_err("invalid");
        match err {
            BuildError::Invalid(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {}", other),
        }
    }

    #[test]
    fn test_invalid_options_aggregated() {
        let err = Builder::new()
            .with_component_name("foo")
            .with_group_versions(vec![gv("v1")])
            .with_recommended_options(
                RecommendedOptions::new("registry", vec![]).set_emulated_version("one"),
            )
            .build()
            .expect_err("invalid");
        match err {
            BuildError::Invalid(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {}", other),
        }
    }

    #[test]
    fn test_injected_registry_keeps_registration() {
        let mut registry = ComponentGlobalsRegistry::new();
        registry
            .register(
                "foo",
                "1.5".parse().expect("version"),
                Default::default(),
            )
            .expect("register");

        let server = Builder::new()
            .with_component_name("foo")
            .with_group_versions(vec![gv("v1")])
            .with_component_globals_registry(registry)
            .skip_component_globals_registry_set()
            .build()
            .expect("build");
        let foo = server
            .component_globals_registry()
            .effective_version_for("foo")
            .expect("foo");
        assert_eq!(foo.binary_version(), Version::new(1, 5));
        let kube = server
            .component_globals_registry()
            .effective_version_for(DEFAULT_KUBE_COMPONENT)
            .expect("kube");
        assert_eq!(kube.emulation_version(), Version::new(1, 34));
    }

    #[test]
    fn test_post_start_hook_starts_informers_once() {
        let config_informers = Arc::new(CountingInformers::default());
        let extra_informers = Arc::new(CountingInformers::default());

        let shared: Arc<dyn SharedInformerFactory> = config_informers.clone();
        let server = Builder::new()
            .with_component_name("foo")
            .with(resource::<BarSpec>(vec![gv("v1")]).expect("bars"))
            .with_shared_informer_factory(extra_informers.clone())
            .with_recommended_config_fn(Box::new(move |config: &mut RecommendedConfig| {
                config.shared_informer_factory = Some(shared);
            }))
            .build()
            .expect("build");

        let stop = StopSignal::shared();
        server.start(stop.clone()).expect("start");
        server.start(stop).expect("start again");
        assert_eq!(config_informers.starts.load(Ordering::SeqCst), 1);
        assert_eq!(extra_informers.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_tolerates_missing_config_informers() {
        let informers = Arc::new(CountingInformers::default());
        let server = Builder::new()
            .with_component_name("foo")
            .with(resource::<BarSpec>(vec![gv("v1")]).expect("bars"))
            .with_shared_informer_factory(informers.clone())
            .build()
            .expect("build");
        assert!(server.config().shared_informer_factory().is_none());
        server.start(StopSignal::shared()).expect("start");
        assert_eq!(informers.starts.load(Ordering::SeqCst), 1);
    }

    #[fluvio_future::test]
    async fn test_execute_until_stopped() {
        let stop = StopSignal::shared();
        stop.notify();
        Builder::new()
            .with_component_name("foo")
            .with(resource::<BarSpec>(vec![gv("v1")]).expect("bars"))
            .execute_with_stop(stop)
            .await
            .expect("execute");
    }
}
