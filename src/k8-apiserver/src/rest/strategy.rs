use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

use tracing::trace;

use k8_types::table::Table;
use k8_types::validation::ErrorList;
use k8_types::K8Obj;
use k8_types::Spec;

use crate::resource::ApiResource;
use crate::resource::Capabilities;
use crate::resource::CopyStatusFn;
use crate::ApiError;
use crate::RequestContext;

/// whether objects live in a namespace
pub trait Scoper {
    fn namespace_scoped(&self) -> bool;
}

pub trait CreateStrategy<S: Spec>: Scoper + Debug + Send + Sync {
    /// name for an object created with `generateName`
    fn generate_name(&self, base: &str) -> String;

    /// normalize a new object before validation
    fn prepare_for_create(&self, ctx: &RequestContext, obj: &mut K8Obj<S>);

    fn validate(&self, ctx: &RequestContext, obj: &K8Obj<S>) -> ErrorList;

    fn canonicalize(&self, obj: &mut K8Obj<S>);
}

pub trait UpdateStrategy<S: Spec>: Scoper + Debug + Send + Sync {
    fn allow_create_on_update(&self) -> bool;

    /// normalize an updated object before validation. `old` is the stored object
    fn prepare_for_update(&self, ctx: &RequestContext, obj: &mut K8Obj<S>, old: &K8Obj<S>);

    fn validate_update(&self, ctx: &RequestContext, obj: &K8Obj<S>, old: &K8Obj<S>) -> ErrorList;

    fn canonicalize(&self, obj: &mut K8Obj<S>);

    /// update without a resource version is accepted
    fn allow_unconditional_update(&self) -> bool;
}

pub trait TableConvertor<S: Spec>: Debug + Send + Sync {
    /// `None` if there is no custom table view
    fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[K8Obj<S>],
    ) -> Result<Option<Table>, ApiError>;
}

/// Full lifecycle policy of a kind
pub trait Strategy<S: Spec>: CreateStrategy<S> + UpdateStrategy<S> + TableConvertor<S> {
    fn short_names(&self) -> Vec<String>;

    /// `None` keeps the default singular name
    fn singular_name(&self) -> Option<String>;
}

/// Strategy dispatching to the capabilities of a kind.
/// Every absent capability falls back to an inert default.
#[derive(Debug, Clone)]
pub struct DefaultStrategy<S: Spec> {
    capabilities: Capabilities<S>,
    namespace_scoped: bool,
}

impl<S: ApiResource> DefaultStrategy<S> {
    pub fn new() -> Self {
        Self::with_capabilities(S::capabilities())
    }
}

impl<S: ApiResource> Default for DefaultStrategy<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Spec> DefaultStrategy<S> {
    pub fn with_capabilities(capabilities: Capabilities<S>) -> Self {
        trace!(
            kind = S::label(),
            capabilities = ?capabilities,
            "resolved capabilities"
        );
        Self {
            capabilities,
            namespace_scoped: S::NAME_SPACED,
        }
    }

    pub fn capabilities(&self) -> &Capabilities<S> {
        &self.capabilities
    }

    pub fn canonicalize(&self, obj: &mut K8Obj<S>) {
        if let Some(canonicalize) = self.capabilities.canonicalize {
            canonicalize(obj);
        }
    }
}

impl<S: Spec> Scoper for DefaultStrategy<S> {
    fn namespace_scoped(&self) -> bool {
        self.namespace_scoped
    }
}

impl<S: Spec> CreateStrategy<S> for DefaultStrategy<S> {
    fn generate_name(&self, base: &str) -> String {
        match self.capabilities.generate_name {
            Some(generate_name) => generate_name(base),
            None => base.to_owned(),
        }
    }

    fn prepare_for_create(&self, ctx: &RequestContext, obj: &mut K8Obj<S>) {
        if let Some(prepare) = self.capabilities.prepare_for_create {
            prepare(ctx, obj);
        }
    }

    fn validate(&self, ctx: &RequestContext, obj: &K8Obj<S>) -> ErrorList {
        match self.capabilities.validate {
            Some(validate) => validate(ctx, obj),
            None => vec![],
        }
    }

    fn canonicalize(&self, obj: &mut K8Obj<S>) {
        DefaultStrategy::canonicalize(self, obj)
    }
}

impl<S: Spec> UpdateStrategy<S> for DefaultStrategy<S> {
    fn allow_create_on_update(&self) -> bool {
        self.capabilities
            .allow_create_on_update
            .map(|allow| allow())
            .unwrap_or(false)
    }

    /// On the main endpoint the stored status is kept, so a write there
    /// only changes spec and metadata.
    fn prepare_for_update(&self, ctx: &RequestContext, obj: &mut K8Obj<S>, old: &K8Obj<S>) {
        if let Some(copy_status) = self.capabilities.copy_status {
            copy_status(old, obj);
        }
        if let Some(prepare) = self.capabilities.prepare_for_update {
            prepare(ctx, obj, old);
        }
    }

    fn validate_update(&self, ctx: &RequestContext, obj: &K8Obj<S>, old: &K8Obj<S>) -> ErrorList {
        match self.capabilities.validate_update {
            Some(validate_update) => validate_update(ctx, obj, old),
            None => vec![],
        }
    }

    fn canonicalize(&self, obj: &mut K8Obj<S>) {
        DefaultStrategy::canonicalize(self, obj)
    }

    fn allow_unconditional_update(&self) -> bool {
        self.capabilities
            .allow_unconditional_update
            .map(|allow| allow())
            .unwrap_or(false)
    }
}

impl<S: Spec> TableConvertor<S> for DefaultStrategy<S> {
    fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[K8Obj<S>],
    ) -> Result<Option<Table>, ApiError> {
        match self.capabilities.convert_to_table {
            Some(convert) => convert(ctx, objects).map(Some),
            None => Ok(None),
        }
    }
}

impl<S: Spec> Strategy<S> for DefaultStrategy<S> {
    fn short_names(&self) -> Vec<String> {
        self.capabilities
            .short_names
            .map(|names| names())
            .unwrap_or_default()
    }

    fn singular_name(&self) -> Option<String> {
        self.capabilities
            .singular_name
            .map(|name| name())
            .filter(|name| !name.is_empty())
    }
}

/// Rewrites the incoming object and a working copy of the stored one before
/// the inner strategy prepares the update.
pub type PrepareForUpdateOverride<S> =
    Arc<dyn Fn(&RequestContext, &mut K8Obj<S>, &mut K8Obj<S>) + Send + Sync>;

/// Update strategy whose `prepare_for_update` may be overridden.
/// Everything else is delegated to the inner strategy unchanged.
pub struct PrepareForUpdaterStrategy<S: Spec> {
    inner: Arc<dyn UpdateStrategy<S>>,
    override_fn: Option<PrepareForUpdateOverride<S>>,
}

impl<S: Spec> PrepareForUpdaterStrategy<S> {
    pub fn new(
        inner: Arc<dyn UpdateStrategy<S>>,
        override_fn: Option<PrepareForUpdateOverride<S>>,
    ) -> Self {
        Self { inner, override_fn }
    }

    /// Strategy of the status subresource: the incoming status is moved onto
    /// the stored object, which then replaces the incoming one. Only status
    /// changes survive.
    pub fn status(inner: Arc<dyn UpdateStrategy<S>>, copy_status: CopyStatusFn<S>) -> Self {
        let override_fn: PrepareForUpdateOverride<S> =
            Arc::new(move |_ctx: &RequestContext, obj: &mut K8Obj<S>, old: &mut K8Obj<S>| {
                copy_status(obj, old);
                *obj = old.clone();
            });
        Self::new(inner, Some(override_fn))
    }
}

impl<S: Spec> fmt::Debug for PrepareForUpdaterStrategy<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrepareForUpdaterStrategy")
            .field("inner", &self.inner)
            .field("override", &self.override_fn.is_some())
            .finish()
    }
}

impl<S: Spec> Scoper for PrepareForUpdaterStrategy<S> {
    fn namespace_scoped(&self) -> bool {
        self.inner.namespace_scoped()
    }
}

impl<S: Spec> UpdateStrategy<S> for PrepareForUpdaterStrategy<S> {
    fn allow_create_on_update(&self) -> bool {
        self.inner.allow_create_on_update()
    }

    fn prepare_for_update(&self, ctx: &RequestContext, obj: &mut K8Obj<S>, old: &K8Obj<S>) {
        match &self.override_fn {
            Some(override_fn) => {
                let mut old = old.clone();
                override_fn(ctx, obj, &mut old);
                self.inner.prepare_for_update(ctx, obj, &old);
            }
            None => self.inner.prepare_for_update(ctx, obj, old),
        }
    }

    fn validate_update(&self, ctx: &RequestContext, obj: &K8Obj<S>, old: &K8Obj<S>) -> ErrorList {
        self.inner.validate_update(ctx, obj, old)
    }

    fn canonicalize(&self, obj: &mut K8Obj<S>) {
        self.inner.canonicalize(obj)
    }

    fn allow_unconditional_update(&self) -> bool {
        self.inner.allow_unconditional_update()
    }
}
