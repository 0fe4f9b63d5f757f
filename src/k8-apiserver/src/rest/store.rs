use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use k8_storage::ListArg;
use k8_storage::NameSpace;
use k8_storage::RestOptions;
use k8_storage::RestOptionsGetter;
use k8_storage::SelectionPredicate;
use k8_storage::SharedBackend;
use k8_storage::StorageError;
use k8_types::table::Table;
use k8_types::validation::ErrorList;
use k8_types::validation::FieldError;
use k8_types::validation::FieldPath;
use k8_types::GroupResource;
use k8_types::ItemMeta;
use k8_types::K8List;
use k8_types::K8Obj;
use k8_types::Spec;

use super::get_attrs;
use super::AttrFunc;
use super::CreateStrategy;
use super::Scoper;
use super::Storage;
use super::Strategy;
use super::TableConvertor;
use super::UpdateStrategy;
use crate::ApiError;
use crate::BuildError;
use crate::RequestContext;

const OPTIMISTIC_LOCK_ERROR_MSG: &str =
    "the object has been modified; please apply your changes to the latest version and try again";

/// Why `segment` cannot be one segment of a storage key, if it cannot.
/// Names and namespaces are joined with `/`, so they may not contain it.
fn path_segment_problem(segment: &str) -> Option<String> {
    if segment == "." || segment == ".." {
        return Some(format!("may not be '{}'", segment));
    }
    ["/", "%"]
        .iter()
        .find(|illegal| segment.contains(*illegal))
        .map(|illegal| format!("may not contain '{}'", illegal))
}

/// Build the storage adapter of a kind.
///
/// Returns the typed store and the adapter to expose. The adapter reports
/// the strategy's short names when it has any; otherwise it is the store itself.
pub fn new_store<S, T>(
    new_fn: fn() -> K8Obj<S>,
    new_list_fn: fn() -> K8List<S>,
    group_resource: GroupResource,
    strategy: Arc<T>,
    options_getter: &dyn RestOptionsGetter,
) -> Result<(Arc<Store<S>>, Arc<dyn Storage>), BuildError>
where
    S: Spec,
    T: Strategy<S> + 'static,
{
    let short_names = strategy.short_names();
    let store = Arc::new(Store::new(
        new_fn,
        new_list_fn,
        group_resource,
        strategy,
        options_getter,
    )?);

    let storage: Arc<dyn Storage> = if short_names.is_empty() {
        store.clone()
    } else {
        Arc::new(ShortNamesStorage::new(store.clone(), short_names))
    };
    Ok((store, storage))
}

/// Generic store of one kind, driving its strategies on every write
pub struct Store<S: Spec> {
    new_fn: fn() -> K8Obj<S>,
    new_list_fn: fn() -> K8List<S>,
    group_resource: GroupResource,
    singular_name: String,
    namespace_scoped: bool,
    create_strategy: Arc<dyn CreateStrategy<S>>,
    update_strategy: Arc<dyn UpdateStrategy<S>>,
    table_convertor: Arc<dyn TableConvertor<S>>,
    attr_func: AttrFunc,
    options: RestOptions,
}

impl<S: Spec> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Store")
            .field("group_resource", &self.group_resource)
            .field("singular_name", &self.singular_name)
            .field("namespace_scoped", &self.namespace_scoped)
            .field("resource_prefix", &self.options.resource_prefix)
            .finish()
    }
}

impl<S: Spec> Store<S> {
    /// fails only if storage options cannot be resolved for the resource
    pub fn new<T>(
        new_fn: fn() -> K8Obj<S>,
        new_list_fn: fn() -> K8List<S>,
        group_resource: GroupResource,
        strategy: Arc<T>,
        options_getter: &dyn RestOptionsGetter,
    ) -> Result<Self, BuildError>
    where
        T: Strategy<S> + 'static,
    {
        let options = options_getter
            .get_rest_options(&group_resource)
            .map_err(|source| BuildError::StoreConstruction {
                resource: group_resource.clone(),
                source,
            })?;

        let singular_name = strategy
            .singular_name()
            .unwrap_or_else(|| S::kind().to_lowercase());
        let namespace_scoped = Scoper::namespace_scoped(strategy.as_ref());

        debug!(
            resource = %group_resource,
            singular = %singular_name,
            prefix = %options.resource_prefix,
            "store created"
        );

        let create_strategy: Arc<dyn CreateStrategy<S>> = strategy.clone();
        let update_strategy: Arc<dyn UpdateStrategy<S>> = strategy.clone();
        let table_convertor: Arc<dyn TableConvertor<S>> = strategy;

        Ok(Self {
            new_fn,
            new_list_fn,
            group_resource,
            singular_name,
            namespace_scoped,
            create_strategy,
            update_strategy,
            table_convertor,
            attr_func: get_attrs,
            options,
        })
    }

    pub fn update_strategy(&self) -> Arc<dyn UpdateStrategy<S>> {
        self.update_strategy.clone()
    }

    fn resolve_namespace(&self, ctx: &RequestContext, namespace: &str) -> Result<String, ApiError> {
        if !self.namespace_scoped {
            if namespace.is_empty() {
                return Ok(String::new());
            }
            return Err(ApiError::BadRequest(format!(
                "{} is cluster scoped, namespace \"{}\" is not allowed",
                self.group_resource, namespace
            )));
        }

        let resolved = match (namespace.is_empty(), ctx.namespace()) {
            (false, Some(requested)) if requested != namespace => {
                return Err(ApiError::BadRequest(format!(
                    "the namespace of the object ({}) does not match the namespace on the request ({})",
                    namespace, requested
                )))
            }
            (false, _) => namespace,
            (true, Some(requested)) => requested,
            (true, None) => {
                return Err(ApiError::BadRequest(format!(
                    "namespace is required for {}",
                    self.group_resource
                )))
            }
        };
        self.check_namespace(resolved)?;
        Ok(resolved.to_owned())
    }

    fn check_namespace(&self, namespace: &str) -> Result<(), ApiError> {
        match path_segment_problem(namespace) {
            Some(problem) => Err(ApiError::BadRequest(format!(
                "invalid namespace \"{}\": {}",
                namespace, problem
            ))),
            None => Ok(()),
        }
    }

    fn check_name(&self, name: &str) -> Result<(), ApiError> {
        match path_segment_problem(name) {
            Some(problem) => Err(self.invalid(
                name,
                vec![FieldError::invalid(
                    FieldPath::new("metadata").child("name"),
                    name,
                    problem,
                )],
            )),
            None => Ok(()),
        }
    }

    fn key(&self, namespace: &str, name: &str) -> String {
        if self.namespace_scoped {
            format!("{}/{}/{}", self.options.resource_prefix, namespace, name)
        } else {
            format!("{}/{}", self.options.resource_prefix, name)
        }
    }

    fn item_key(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<String, ApiError> {
        if item.name.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "name is required to address {}",
                self.group_resource
            )));
        }
        self.check_name(&item.name)?;
        let namespace = self.resolve_namespace(ctx, &item.namespace)?;
        Ok(self.key(&namespace, &item.name))
    }

    fn storage_error(&self, err: StorageError, name: &str) -> ApiError {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound {
                resource: self.group_resource.clone(),
                name: name.to_owned(),
            },
            StorageError::AlreadyExists(_) => ApiError::AlreadyExists {
                resource: self.group_resource.clone(),
                name: name.to_owned(),
            },
            StorageError::Conflict { .. } => ApiError::Conflict {
                resource: self.group_resource.clone(),
                name: name.to_owned(),
                reason: OPTIMISTIC_LOCK_ERROR_MSG.to_owned(),
            },
            other => ApiError::Storage(other),
        }
    }

    fn invalid(&self, name: &str, errors: ErrorList) -> ApiError {
        ApiError::invalid(S::kind(), name, errors)
    }

    pub async fn get_object(
        &self,
        ctx: &RequestContext,
        item: &ItemMeta,
    ) -> Result<K8Obj<S>, ApiError> {
        let key = self.item_key(ctx, item)?;
        let value = self
            .options
            .backend
            .get(&key)
            .await
            .map_err(|err| self.storage_error(err, &item.name))?;
        Ok(serde_json::from_value(value)?)
    }

    /// objects of a namespace, or of every namespace, matching the selectors
    pub async fn list_objects(
        &self,
        _ctx: &RequestContext,
        namespace: &NameSpace,
        arg: &ListArg,
    ) -> Result<K8List<S>, ApiError> {
        let predicate = SelectionPredicate::from_arg(arg)?;
        let prefix = match namespace {
            NameSpace::Named(ns) if self.namespace_scoped => {
                self.check_namespace(ns)?;
                format!("{}/{}/", self.options.resource_prefix, ns)
            }
            _ => format!("{}/", self.options.resource_prefix),
        };

        let result = self.options.backend.list(&prefix).await?;
        let mut list = (self.new_list_fn)();
        list.metadata.resource_version = result.resource_version;

        for value in result.items {
            // zero means no limit
            if let Some(limit) = arg.limit.filter(|limit| *limit > 0) {
                if list.items.len() >= limit as usize {
                    break;
                }
            }
            let (labels, fields) = (self.attr_func)(&value, self.namespace_scoped)?;
            if predicate.matches(&labels, &fields) {
                list.items.push(serde_json::from_value(value)?);
            }
        }

        trace!(resource = %self.group_resource, prefix = %prefix, count = list.items.len(), "listed");
        Ok(list)
    }

    #[instrument(skip(self, ctx, obj), fields(resource = %self.group_resource))]
    pub async fn create_object(
        &self,
        ctx: &RequestContext,
        mut obj: K8Obj<S>,
    ) -> Result<K8Obj<S>, ApiError> {
        obj.metadata.namespace = self.resolve_namespace(ctx, &obj.metadata.namespace)?;
        if !obj.metadata.resource_version.is_empty() {
            return Err(ApiError::BadRequest(
                "resourceVersion should not be set on objects to be created".to_owned(),
            ));
        }

        self.create_strategy.prepare_for_create(ctx, &mut obj);

        if obj.metadata.name.is_empty() && !obj.metadata.generate_name.is_empty() {
            obj.metadata.name = self
                .create_strategy
                .generate_name(&obj.metadata.generate_name);
        }
        if obj.metadata.name.is_empty() {
            return Err(self.invalid(
                "",
                vec![FieldError::required(
                    FieldPath::new("metadata").child("name"),
                    "name or generateName is required",
                )],
            ));
        }
        self.check_name(&obj.metadata.name)?;

        obj.api_version = S::api_version();
        obj.kind = S::kind();

        let errors = self.create_strategy.validate(ctx, &obj);
        if !errors.is_empty() {
            return Err(self.invalid(&obj.metadata.name, errors));
        }
        self.create_strategy.canonicalize(&mut obj);

        let key = self.key(&obj.metadata.namespace, &obj.metadata.name);
        let value = serde_json::to_value(&obj)?;
        let stored = self
            .options
            .backend
            .create(&key, value)
            .await
            .map_err(|err| self.storage_error(err, &obj.metadata.name))?;
        debug!(name = %obj.metadata.name, "created");
        Ok(serde_json::from_value(stored)?)
    }

    pub async fn update_object(
        &self,
        ctx: &RequestContext,
        obj: K8Obj<S>,
    ) -> Result<K8Obj<S>, ApiError> {
        self.update_with(self.update_strategy.as_ref(), ctx, obj)
            .await
    }

    /// update using `strategy` instead of the store's own update strategy
    #[instrument(skip(self, strategy, ctx, obj), fields(resource = %self.group_resource))]
    pub async fn update_with(
        &self,
        strategy: &dyn UpdateStrategy<S>,
        ctx: &RequestContext,
        mut obj: K8Obj<S>,
    ) -> Result<K8Obj<S>, ApiError> {
        obj.metadata.namespace = self.resolve_namespace(ctx, &obj.metadata.namespace)?;
        if obj.metadata.name.is_empty() {
            return Err(self.invalid(
                "",
                vec![FieldError::required(
                    FieldPath::new("metadata").child("name"),
                    "name is required",
                )],
            ));
        }
        self.check_name(&obj.metadata.name)?;

        let key = self.key(&obj.metadata.namespace, &obj.metadata.name);
        let existing: K8Obj<S> = match self.options.backend.get(&key).await {
            Ok(value) => serde_json::from_value(value)?,
            Err(err) if err.is_not_found() => {
                if strategy.allow_create_on_update() {
                    debug!(name = %obj.metadata.name, "not found, creating on update");
                    obj.metadata.resource_version.clear();
                    return self.create_object(ctx, obj).await;
                }
                return Err(self.storage_error(err, &obj.metadata.name));
            }
            Err(err) => return Err(self.storage_error(err, &obj.metadata.name)),
        };

        let precondition = if obj.metadata.resource_version.is_empty() {
            if !strategy.allow_unconditional_update() {
                return Err(self.invalid(
                    &obj.metadata.name,
                    vec![FieldError::invalid(
                        FieldPath::new("metadata").child("resourceVersion"),
                        "",
                        "must be specified for an update",
                    )],
                ));
            }
            obj.metadata.resource_version = existing.metadata.resource_version.clone();
            existing.metadata.resource_version.clone()
        } else if obj.metadata.resource_version != existing.metadata.resource_version {
            return Err(ApiError::Conflict {
                resource: self.group_resource.clone(),
                name: obj.metadata.name.clone(),
                reason: OPTIMISTIC_LOCK_ERROR_MSG.to_owned(),
            });
        } else {
            obj.metadata.resource_version.clone()
        };

        obj.api_version = S::api_version();
        obj.kind = S::kind();

        strategy.prepare_for_update(ctx, &mut obj, &existing);
        let errors = strategy.validate_update(ctx, &obj, &existing);
        if !errors.is_empty() {
            return Err(self.invalid(&obj.metadata.name, errors));
        }
        strategy.canonicalize(&mut obj);

        let value = serde_json::to_value(&obj)?;
        let stored = self
            .options
            .backend
            .update(&key, Some(&precondition), value)
            .await
            .map_err(|err| self.storage_error(err, &obj.metadata.name))?;
        debug!(name = %obj.metadata.name, "updated");
        Ok(serde_json::from_value(stored)?)
    }

    pub async fn delete_object(
        &self,
        ctx: &RequestContext,
        item: &ItemMeta,
    ) -> Result<K8Obj<S>, ApiError> {
        let key = self.item_key(ctx, item)?;
        let value = self
            .options
            .backend
            .delete(&key)
            .await
            .map_err(|err| self.storage_error(err, &item.name))?;
        debug!(resource = %self.group_resource, name = %item.name, "deleted");
        Ok(serde_json::from_value(value)?)
    }

    pub fn convert_objects_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[K8Obj<S>],
    ) -> Result<Option<Table>, ApiError> {
        self.table_convertor.convert_to_table(ctx, objects)
    }
}

#[async_trait]
impl<S: Spec> Storage for Store<S> {
    fn group_resource(&self) -> &GroupResource {
        &self.group_resource
    }

    fn kind(&self) -> String {
        S::kind()
    }

    fn singular_name(&self) -> &str {
        &self.singular_name
    }

    fn namespace_scoped(&self) -> bool {
        self.namespace_scoped
    }

    fn backend(&self) -> &SharedBackend {
        &self.options.backend
    }

    fn resource_prefix(&self) -> &str {
        &self.options.resource_prefix
    }

    fn new_object(&self) -> Result<Value, ApiError> {
        Ok(serde_json::to_value((self.new_fn)())?)
    }

    fn new_list(&self) -> Result<Value, ApiError> {
        Ok(serde_json::to_value((self.new_list_fn)())?)
    }

    async fn get(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError> {
        let obj = self.get_object(ctx, item).await?;
        Ok(serde_json::to_value(obj)?)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        namespace: &NameSpace,
        arg: &ListArg,
    ) -> Result<Value, ApiError> {
        let list = self.list_objects(ctx, namespace, arg).await?;
        Ok(serde_json::to_value(list)?)
    }

    async fn create(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError> {
        let obj: K8Obj<S> = serde_json::from_value(obj)?;
        let created = self.create_object(ctx, obj).await?;
        Ok(serde_json::to_value(created)?)
    }

    async fn update(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError> {
        let obj: K8Obj<S> = serde_json::from_value(obj)?;
        let updated = self.update_object(ctx, obj).await?;
        Ok(serde_json::to_value(updated)?)
    }

    async fn delete(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError> {
        let deleted = self.delete_object(ctx, item).await?;
        Ok(serde_json::to_value(deleted)?)
    }

    fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[Value],
    ) -> Result<Option<Table>, ApiError> {
        let objects = objects
            .iter()
            .map(|value| serde_json::from_value::<K8Obj<S>>(value.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        self.convert_objects_to_table(ctx, &objects)
    }
}

/// Status subresource of a kind.
///
/// Shares the store of the main resource and differs from it only in the
/// update strategy.
#[derive(Debug)]
pub struct StatusStore<S: Spec> {
    store: Arc<Store<S>>,
    update_strategy: Arc<dyn UpdateStrategy<S>>,
}

impl<S: Spec> StatusStore<S> {
    pub fn new(store: Arc<Store<S>>, update_strategy: Arc<dyn UpdateStrategy<S>>) -> Self {
        Self {
            store,
            update_strategy,
        }
    }

    pub fn store(&self) -> &Arc<Store<S>> {
        &self.store
    }
}

#[async_trait]
impl<S: Spec> Storage for StatusStore<S> {
    fn group_resource(&self) -> &GroupResource {
        self.store.group_resource()
    }

    fn kind(&self) -> String {
        S::kind()
    }

    fn singular_name(&self) -> &str {
        Storage::singular_name(self.store.as_ref())
    }

    fn namespace_scoped(&self) -> bool {
        self.store.namespace_scoped
    }

    fn backend(&self) -> &SharedBackend {
        self.store.backend()
    }

    fn resource_prefix(&self) -> &str {
        self.store.resource_prefix()
    }

    fn new_object(&self) -> Result<Value, ApiError> {
        self.store.new_object()
    }

    fn new_list(&self) -> Result<Value, ApiError> {
        self.store.new_list()
    }

    async fn get(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError> {
        Storage::get(self.store.as_ref(), ctx, item).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        namespace: &NameSpace,
        arg: &ListArg,
    ) -> Result<Value, ApiError> {
        Storage::list(self.store.as_ref(), ctx, namespace, arg).await
    }

    async fn create(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError> {
        Storage::create(self.store.as_ref(), ctx, obj).await
    }

    async fn update(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError> {
        let obj: K8Obj<S> = serde_json::from_value(obj)?;
        let updated = self
            .store
            .update_with(self.update_strategy.as_ref(), ctx, obj)
            .await?;
        Ok(serde_json::to_value(updated)?)
    }

    async fn delete(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError> {
        Storage::delete(self.store.as_ref(), ctx, item).await
    }

    fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[Value],
    ) -> Result<Option<Table>, ApiError> {
        Storage::convert_to_table(self.store.as_ref(), ctx, objects)
    }
}

/// Adapter additionally reporting short names of the resource
#[derive(Debug)]
pub struct ShortNamesStorage {
    inner: Arc<dyn Storage>,
    short_names: Vec<String>,
}

impl ShortNamesStorage {
    pub fn new(inner: Arc<dyn Storage>, short_names: Vec<String>) -> Self {
        Self { inner, short_names }
    }
}

#[async_trait]
impl Storage for ShortNamesStorage {
    fn group_resource(&self) -> &GroupResource {
        self.inner.group_resource()
    }

    fn kind(&self) -> String {
        self.inner.kind()
    }

    fn singular_name(&self) -> &str {
        self.inner.singular_name()
    }

    fn namespace_scoped(&self) -> bool {
        self.inner.namespace_scoped()
    }

    fn short_names(&self) -> Vec<String> {
        self.short_names.clone()
    }

    fn backend(&self) -> &SharedBackend {
        self.inner.backend()
    }

    fn resource_prefix(&self) -> &str {
        self.inner.resource_prefix()
    }

    fn new_object(&self) -> Result<Value, ApiError> {
        self.inner.new_object()
    }

    fn new_list(&self) -> Result<Value, ApiError> {
        self.inner.new_list()
    }

    async fn get(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError> {
        self.inner.get(ctx, item).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        namespace: &NameSpace,
        arg: &ListArg,
    ) -> Result<Value, ApiError> {
        self.inner.list(ctx, namespace, arg).await
    }

    async fn create(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError> {
        self.inner.create(ctx, obj).await
    }

    async fn update(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError> {
        self.inner.update(ctx, obj).await
    }

    async fn delete(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError> {
        self.inner.delete(ctx, item).await
    }

    fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[Value],
    ) -> Result<Option<Table>, ApiError> {
        self.inner.convert_to_table(ctx, objects)
    }
}
