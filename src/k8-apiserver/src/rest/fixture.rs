//! kinds shared by unit tests

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use k8_storage::StorageFactory;
use k8_types::table::Table;
use k8_types::table::TableColumnDefinition;
use k8_types::validation::ErrorList;
use k8_types::validation::FieldError;
use k8_types::validation::FieldPath;
use k8_types::Crd;
use k8_types::CrdNames;
use k8_types::K8Obj;
use k8_types::Spec;
use k8_types::Status;

use super::new_store;
use super::DefaultStrategy;
use super::Storage;
use super::Store;
use crate::resource::*;
use crate::ApiError;
use crate::RequestContext;

pub const GROUP: &str = "foo.example.com";

const BAR_API: Crd = Crd {
    group: GROUP,
    version: "v1",
    names: CrdNames {
        kind: "Bar",
        plural: "bars",
    },
};

const CLUSTER_BAR_API: Crd = Crd {
    group: GROUP,
    version: "v1",
    names: CrdNames {
        kind: "ClusterBar",
        plural: "clusterbars",
    },
};

const GADGET_API: Crd = Crd {
    group: GROUP,
    version: "v1",
    names: CrdNames {
        kind: "Gadget",
        plural: "gadgets",
    },
};

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct BarSpec {
    pub message: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct BarStatus {}

impl Status for BarStatus {}

impl Spec for BarSpec {
    type Status = BarStatus;

    fn metadata() -> &'static Crd {
        &BAR_API
    }
}

impl ApiResource for BarSpec {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct ClusterBarSpec {
    pub message: String,
}

impl Spec for ClusterBarSpec {
    type Status = BarStatus;
    const NAME_SPACED: bool = false;

    fn metadata() -> &'static Crd {
        &CLUSTER_BAR_API
    }
}

impl ApiResource for ClusterBarSpec {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct GadgetSpec {
    pub size: u32,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct GadgetStatus {
    pub phase: String,
}

impl Status for GadgetStatus {}

impl Spec for GadgetSpec {
    type Status = GadgetStatus;

    fn metadata() -> &'static Crd {
        &GADGET_API
    }
}

impl NameGenerator for GadgetSpec {
    fn generate_name(base: &str) -> String {
        format!("{}gen", base)
    }
}

impl Validater for GadgetSpec {
    fn validate(_ctx: &RequestContext, obj: &K8Obj<Self>) -> ErrorList {
        if obj.spec.size == 0 {
            vec![FieldError::invalid(
                FieldPath::new("spec").child("size"),
                0,
                "must be positive",
            )]
        } else {
            vec![]
        }
    }
}

impl AllowUnconditionalUpdater for GadgetSpec {
    fn allow_unconditional_update() -> bool {
        true
    }
}

impl TableConverter for GadgetSpec {
    fn convert_to_table(_ctx: &RequestContext, objects: &[K8Obj<Self>]) -> Result<Table, ApiError> {
        let mut table = Table::new(vec![
            TableColumnDefinition::new("Name", "string"),
            TableColumnDefinition::new("Size", "integer"),
        ]);
        for obj in objects {
            table.add_row(vec![obj.metadata.name.clone().into(), obj.spec.size.into()]);
        }
        Ok(table)
    }
}

impl ShortNamesProvider for GadgetSpec {
    fn short_names() -> Vec<String> {
        vec!["gd".to_owned()]
    }
}

impl SingularNameProvider for GadgetSpec {
    fn singular_name() -> String {
        "gizmo".to_owned()
    }
}

impl StatusCopier for GadgetSpec {}

impl ApiResource for GadgetSpec {
    fn capabilities() -> Capabilities<Self> {
        Capabilities::new()
            .name_generator()
            .validater()
            .allow_unconditional_updater()
            .table_converter()
            .short_names_provider()
            .singular_name_provider()
            .status_copier()
    }
}

pub fn factory() -> StorageFactory {
    StorageFactory::in_memory(format!("/registry/{}", GROUP))
}

/// typed store and exposed adapter of a kind on the given factory
pub fn store_with<S: ApiResource>(factory: &StorageFactory) -> (Arc<Store<S>>, Arc<dyn Storage>) {
    new_store(
        new_object::<S>,
        new_list::<S>,
        S::group_resource(),
        Arc::new(DefaultStrategy::<S>::new()),
        factory,
    )
    .expect("store")
}

pub fn bar_storage() -> Arc<dyn Storage> {
    store_with::<BarSpec>(&factory()).1
}

pub fn gadget(name: &str, size: u32, phase: &str) -> K8Obj<GadgetSpec> {
    K8Obj::new(name, GadgetSpec { size })
        .set_namespace("ns")
        .set_status(GadgetStatus {
            phase: phase.to_owned(),
        })
}
