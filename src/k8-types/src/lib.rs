mod crd;
mod metadata;
pub mod options;
pub mod table;
pub mod validation;

pub use self::crd::*;
pub use self::metadata::*;
pub use self::spec_def::*;

mod spec_def {

    use std::fmt::Debug;

    use serde::de::DeserializeOwned;
    use serde::Serialize;

    use super::Crd;
    use super::GroupResource;

    pub trait Status:
        Sized + Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync
    {
    }

    /// Resource kind.
    ///
    /// A kind is identified by its spec type: the object stored and served
    /// for it is `K8Obj<Self>`.
    pub trait Spec:
        Sized + Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
    {
        type Status: Status;

        /// if true, spec is namespaced
        const NAME_SPACED: bool = true;

        /// identity of the kind
        fn metadata() -> &'static Crd;

        fn label() -> &'static str {
            Self::metadata().names.kind
        }

        fn api_version() -> String {
            let metadata = Self::metadata();
            if metadata.group == "core" {
                return metadata.version.to_owned();
            }
            format!("{}/{}", metadata.group, metadata.version)
        }

        fn kind() -> String {
            Self::metadata().names.kind.to_owned()
        }

        /// group and lower-case plural resource name
        fn group_resource() -> GroupResource {
            let metadata = Self::metadata();
            GroupResource::new(metadata.group, metadata.names.plural)
        }
    }
}

#[cfg(test)]
mod test {

    use serde::Deserialize;
    use serde::Serialize;

    use crate::Crd;
    use crate::CrdNames;
    use crate::GroupResource;
    use crate::Spec;
    use crate::Status;

    const CORE_API: Crd = Crd {
        group: "core",
        version: "v1",
        names: CrdNames {
            kind: "Widget",
            plural: "widgets",
        },
    };

    #[derive(Deserialize, Serialize, Debug, Default, Clone)]
    struct WidgetSpec {}

    #[derive(Deserialize, Serialize, Debug, Default, Clone)]
    struct WidgetStatus {}

    impl Status for WidgetStatus {}

    impl Spec for WidgetSpec {
        type Status = WidgetStatus;

        fn metadata() -> &'static Crd {
            &CORE_API
        }
    }

    #[test]
    fn test_core_api_version() {
        assert_eq!(WidgetSpec::api_version(), "v1");
        assert_eq!(WidgetSpec::kind(), "Widget");
        assert_eq!(
            WidgetSpec::group_resource(),
            GroupResource::new("core", "widgets")
        );
    }
}
