//!
//! # Capabilities
//!
//! Optional behaviors a resource kind may implement. Each one is an
//! independent trait on the kind's spec type; a kind opts into the ones it
//! needs and lists them in its `Capabilities` table.
//!
use std::fmt;

use k8_types::table::Table;
use k8_types::validation::ErrorList;
use k8_types::K8Obj;
use k8_types::Spec;

use crate::ApiError;
use crate::RequestContext;

/// name for an object created with `generateName`
pub trait NameGenerator: Spec {
    fn generate_name(base: &str) -> String;
}

pub trait PrepareForCreater: Spec {
    fn prepare_for_create(ctx: &RequestContext, obj: &mut K8Obj<Self>);
}

pub trait PrepareForUpdater: Spec {
    fn prepare_for_update(ctx: &RequestContext, obj: &mut K8Obj<Self>, old: &K8Obj<Self>);
}

pub trait Validater: Spec {
    fn validate(ctx: &RequestContext, obj: &K8Obj<Self>) -> ErrorList;
}

pub trait ValidateUpdater: Spec {
    fn validate_update(ctx: &RequestContext, obj: &K8Obj<Self>, old: &K8Obj<Self>) -> ErrorList;
}

pub trait Canonicalizer: Spec {
    fn canonicalize(obj: &mut K8Obj<Self>);
}

pub trait AllowCreateOnUpdater: Spec {
    fn allow_create_on_update() -> bool;
}

pub trait AllowUnconditionalUpdater: Spec {
    fn allow_unconditional_update() -> bool;
}

pub trait TableConverter: Spec {
    fn convert_to_table(ctx: &RequestContext, objects: &[K8Obj<Self>]) -> Result<Table, ApiError>;
}

pub trait ShortNamesProvider: Spec {
    fn short_names() -> Vec<String>;
}

pub trait SingularNameProvider: Spec {
    fn singular_name() -> String;
}

/// Kind with a status subresource
pub trait StatusCopier: Spec {
    /// copy status fields of `from` onto `to`
    fn copy_status(from: &K8Obj<Self>, to: &mut K8Obj<Self>) {
        to.status = from.status.clone();
    }
}

pub(crate) type GenerateNameFn = fn(&str) -> String;
pub(crate) type PrepareForCreateFn<S> = fn(&RequestContext, &mut K8Obj<S>);
pub(crate) type PrepareForUpdateFn<S> = fn(&RequestContext, &mut K8Obj<S>, &K8Obj<S>);
pub(crate) type ValidateFn<S> = fn(&RequestContext, &K8Obj<S>) -> ErrorList;
pub(crate) type ValidateUpdateFn<S> = fn(&RequestContext, &K8Obj<S>, &K8Obj<S>) -> ErrorList;
pub(crate) type CanonicalizeFn<S> = fn(&mut K8Obj<S>);
pub(crate) type FlagFn = fn() -> bool;
pub(crate) type ConvertToTableFn<S> = fn(&RequestContext, &[K8Obj<S>]) -> Result<Table, ApiError>;
pub(crate) type NamesFn = fn() -> Vec<String>;
pub(crate) type NameFn = fn() -> String;
pub type CopyStatusFn<S> = fn(&K8Obj<S>, &mut K8Obj<S>);

/// Capabilities of a kind, resolved once when the kind is registered.
///
/// An entry can only be enabled when the kind implements the matching trait:
///
/// ```ignore
/// impl ApiResource for BarSpec {
///     fn capabilities() -> Capabilities<Self> {
///         Capabilities::new().validater().status_copier()
///     }
/// }
/// ```
pub struct Capabilities<S: Spec> {
    pub(crate) generate_name: Option<GenerateNameFn>,
    pub(crate) prepare_for_create: Option<PrepareForCreateFn<S>>,
    pub(crate) prepare_for_update: Option<PrepareForUpdateFn<S>>,
    pub(crate) validate: Option<ValidateFn<S>>,
    pub(crate) validate_update: Option<ValidateUpdateFn<S>>,
    pub(crate) canonicalize: Option<CanonicalizeFn<S>>,
    pub(crate) allow_create_on_update: Option<FlagFn>,
    pub(crate) allow_unconditional_update: Option<FlagFn>,
    pub(crate) convert_to_table: Option<ConvertToTableFn<S>>,
    pub(crate) short_names: Option<NamesFn>,
    pub(crate) singular_name: Option<NameFn>,
    pub(crate) copy_status: Option<CopyStatusFn<S>>,
}

impl<S: Spec> Capabilities<S> {
    /// no optional behavior
    pub fn new() -> Self {
        Self {
            generate_name: None,
            prepare_for_create: None,
            prepare_for_update: None,
            validate: None,
            validate_update: None,
            canonicalize: None,
            allow_create_on_update: None,
            allow_unconditional_update: None,
            convert_to_table: None,
            short_names: None,
            singular_name: None,
            copy_status: None,
        }
    }

    pub fn name_generator(mut self) -> Self
    where
        S: NameGenerator,
    {
        self.generate_name = Some(S::generate_name as GenerateNameFn);
        self
    }

    pub fn prepare_for_creater(mut self) -> Self
    where
        S: PrepareForCreater,
    {
        self.prepare_for_create = Some(S::prepare_for_create as PrepareForCreateFn<S>);
        self
    }

    pub fn prepare_for_updater(mut self) -> Self
    where
        S: PrepareForUpdater,
    {
        self.prepare_for_update = Some(S::prepare_for_update as PrepareForUpdateFn<S>);
        self
    }

    pub fn validater(mut self) -> Self
    where
        S: Validater,
    {
        self.validate = Some(S::validate as ValidateFn<S>);
        self
    }

    pub fn validate_updater(mut self) -> Self
    where
        S: ValidateUpdater,
    {
        self.validate_update = Some(S::validate_update as ValidateUpdateFn<S>);
        self
    }

    pub fn canonicalizer(mut self) -> Self
    where
        S: Canonicalizer,
    {
        self.canonicalize = Some(S::canonicalize as CanonicalizeFn<S>);
        self
    }

    pub fn allow_create_on_updater(mut self) -> Self
    where
        S: AllowCreateOnUpdater,
    {
        self.allow_create_on_update = Some(S::allow_create_on_update as FlagFn);
        self
    }

    pub fn allow_unconditional_updater(mut self) -> Self
    where
        S: AllowUnconditionalUpdater,
    {
        self.allow_unconditional_update = Some(S::allow_unconditional_update as FlagFn);
        self
    }

    pub fn table_converter(mut self) -> Self
    where
        S: TableConverter,
    {
        self.convert_to_table = Some(S::convert_to_table as ConvertToTableFn<S>);
        self
    }

    pub fn short_names_provider(mut self) -> Self
    where
        S: ShortNamesProvider,
    {
        self.short_names = Some(S::short_names as NamesFn);
        self
    }

    pub fn singular_name_provider(mut self) -> Self
    where
        S: SingularNameProvider,
    {
        self.singular_name = Some(S::singular_name as NameFn);
        self
    }

    pub fn status_copier(mut self) -> Self
    where
        S: StatusCopier,
    {
        self.copy_status = Some(S::copy_status as CopyStatusFn<S>);
        self
    }

    /// status move, if the kind has a status subresource
    pub fn copy_status(&self) -> Option<CopyStatusFn<S>> {
        self.copy_status
    }

    pub fn has_status(&self) -> bool {
        self.copy_status.is_some()
    }

    /// names of the enabled capabilities
    pub fn enabled(&self) -> Vec<&'static str> {
        let flags = [
            ("NameGenerator", self.generate_name.is_some()),
            ("PrepareForCreater", self.prepare_for_create.is_some()),
            ("PrepareForUpdater", self.prepare_for_update.is_some()),
            ("Validater", self.validate.is_some()),
            ("ValidateUpdater", self.validate_update.is_some()),
            ("Canonicalizer", self.canonicalize.is_some()),
            ("AllowCreateOnUpdater", self.allow_create_on_update.is_some()),
            (
                "AllowUnconditionalUpdater",
                self.allow_unconditional_update.is_some(),
            ),
            ("TableConverter", self.convert_to_table.is_some()),
            ("ShortNamesProvider", self.short_names.is_some()),
            ("SingularNameProvider", self.singular_name.is_some()),
            ("StatusCopier", self.copy_status.is_some()),
        ];
        flags
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl<S: Spec> Default for Capabilities<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Spec> Clone for Capabilities<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Spec> Copy for Capabilities<S> {}

impl<S: Spec> fmt::Debug for Capabilities<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Capabilities").field(&self.enabled()).finish()
    }
}

#[cfg(test)]
mod test {

    use serde::Deserialize;
    use serde::Serialize;

    use k8_types::validation::ErrorList;
    use k8_types::validation::FieldError;
    use k8_types::validation::FieldPath;
    use k8_types::Crd;
    use k8_types::CrdNames;
    use k8_types::K8Obj;
    use k8_types::Spec;
    use k8_types::Status;

    use super::Capabilities;
    use super::NameGenerator;
    use super::StatusCopier;
    use super::Validater;
    use crate::RequestContext;

    const WIDGET_API: Crd = Crd {
        group: "test.example.com",
        version: "v1",
        names: CrdNames {
            kind: "Widget",
            plural: "widgets",
        },
    };

    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    struct WidgetSpec {
        color: String,
    }

    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    struct WidgetStatus {
        painted: bool,
    }

    impl Status for WidgetStatus {}

    impl Spec for WidgetSpec {
        type Status = WidgetStatus;

        fn metadata() -> &'static Crd {
            &WIDGET_API
        }
    }

    impl NameGenerator for WidgetSpec {
        fn generate_name(base: &str) -> String {
            format!("{}w", base)
        }
    }

    impl Validater for WidgetSpec {
        fn validate(_ctx: &RequestContext, obj: &K8Obj<Self>) -> ErrorList {
            if obj.spec.color.is_empty() {
                vec![FieldError::required(FieldPath::new("spec").child("color"), "")]
            } else {
                vec![]
            }
        }
    }

    impl StatusCopier for WidgetSpec {}

    #[test]
    fn test_empty_table() {
        let caps = Capabilities::<WidgetSpec>::new();
        assert!(caps.enabled().is_empty());
        assert!(!caps.has_status());
    }

    #[test]
    fn test_enabled_entries_dispatch() {
        let caps = Capabilities::<WidgetSpec>::new()
            .name_generator()
            .validater()
            .status_copier();
        assert_eq!(
            caps.enabled(),
            vec!["NameGenerator", "Validater", "StatusCopier"]
        );

        let generate = caps.generate_name.expect("generator");
        assert_eq!(generate("w-"), "w-w");

        let validate = caps.validate.expect("validate");
        let obj = K8Obj::new("w1", WidgetSpec::default());
        assert_eq!(validate(&RequestContext::new(), &obj).len(), 1);

        let copy_status = caps.copy_status().expect("status");
        let from = obj.clone().set_status(WidgetStatus { painted: true });
        let mut to = obj;
        copy_status(&from, &mut to);
        assert!(to.status.painted);
    }
}
