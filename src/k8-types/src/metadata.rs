use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::Spec;

/// Object metadata. Every field is optional on the wire.
#[derive(Deserialize, Serialize, PartialEq, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    /// prefix used to generate a name when `name` is empty
    #[serde(skip_serializing_if = "String::is_empty")]
    pub generate_name: String,
    /// empty for cluster scoped objects
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    /// opaque version stamped by the store on every write
    pub resource_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_grace_period_seconds: Option<u32>,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

impl ObjectMeta {
    pub fn new<S>(name: S, namespace: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// name only, for cluster scoped objects
    pub fn named<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_labels<T: Into<String>>(mut self, labels: Vec<(T, T)>) -> Self {
        self.labels = labels
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    pub fn with_generate_name<S: Into<String>>(mut self, base: S) -> Self {
        self.generate_name = base.into();
        self
    }

    pub fn as_item(&self) -> ItemMeta {
        ItemMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// address of a stored object
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemMeta {
    pub name: String,
    pub namespace: String,
}

impl ItemMeta {
    pub fn new<S: Into<String>>(name: S, namespace: S) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// cluster scoped item
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
        }
    }
}

impl fmt::Display for ItemMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: Option<bool>,
}

/// Resource object: type identity, metadata, spec and status.
/// Missing type identity is filled in from the kind when decoding.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(bound(serialize = "S: Serialize"))]
#[serde(bound(deserialize = "S: DeserializeOwned"))]
pub struct K8Obj<S>
where
    S: Spec,
{
    #[serde(default = "S::api_version")]
    pub api_version: String,
    #[serde(default = "S::kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: S,
    #[serde(default)]
    pub status: S::Status,
}

impl<S> K8Obj<S>
where
    S: Spec,
{
    pub fn new<N>(name: N, spec: S) -> Self
    where
        N: Into<String>,
    {
        Self {
            api_version: S::api_version(),
            kind: S::kind(),
            metadata: ObjectMeta::named(name),
            spec,
            status: S::Status::default(),
        }
    }

    pub fn set_namespace<N: Into<String>>(mut self, namespace: N) -> Self {
        self.metadata.namespace = namespace.into();
        self
    }

    pub fn set_status(mut self, status: S::Status) -> Self {
        self.status = status;
        self
    }
}

/// List of objects of one kind
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(bound(serialize = "K8Obj<S>: Serialize"))]
#[serde(bound(deserialize = "K8Obj<S>: DeserializeOwned"))]
pub struct K8List<S>
where
    S: Spec,
{
    pub api_version: String,
    pub kind: String,
    pub metadata: ListMetadata,
    pub items: Vec<K8Obj<S>>,
}

impl<S> K8List<S>
where
    S: Spec,
{
    pub fn new() -> Self {
        Self {
            api_version: S::api_version(),
            kind: format!("{}List", S::kind()),
            metadata: ListMetadata::default(),
            items: vec![],
        }
    }
}

impl<S> Default for K8List<S>
where
    S: Spec,
{
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    /// store revision at the time of listing
    #[serde(default)]
    pub resource_version: String,
}

#[cfg(test)]
mod test {

    use serde::Deserialize;
    use serde::Serialize;

    use super::ItemMeta;
    use super::K8List;
    use super::K8Obj;
    use super::ObjectMeta;
    use crate::Crd;
    use crate::CrdNames;
    use crate::Spec;
    use crate::Status;

    const TEST_API: Crd = Crd {
        group: "test.example.com",
        version: "v1",
        names: CrdNames {
            kind: "Gadget",
            plural: "gadgets",
        },
    };

    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    struct GadgetSpec {
        size: u16,
    }

    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    struct GadgetStatus {
        ready: bool,
    }

    impl Status for GadgetStatus {}

    impl Spec for GadgetSpec {
        type Status = GadgetStatus;

        fn metadata() -> &'static Crd {
            &TEST_API
        }
    }

    #[test]
    fn test_metadata_labels() {
        let metadata = ObjectMeta::default().with_labels(vec![("app", "test")]);
        assert_eq!(metadata.labels.len(), 1);
        assert_eq!(metadata.labels.get("app").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_obj_defaults_type_identity() {
        let obj: K8Obj<GadgetSpec> =
            serde_json::from_str(r#"{"metadata":{"name":"g1"},"spec":{"size":3}}"#)
                .expect("parse");
        assert_eq!(obj.api_version, "test.example.com/v1");
        assert_eq!(obj.kind, "Gadget");
        assert_eq!(obj.spec.size, 3);
        assert_eq!(obj.status, GadgetStatus::default());
        assert_eq!(obj.metadata.as_item(), ItemMeta::named("g1"));
    }

    #[test]
    fn test_optional_metadata_skipped() {
        let value = serde_json::to_value(ObjectMeta::named("a")).expect("json");
        assert!(value.get("generateName").is_none());
        assert!(value.get("ownerReferences").is_none());
        assert_eq!(value["resourceVersion"], "");
        let value =
            serde_json::to_value(ObjectMeta::default().with_generate_name("a-")).expect("json");
        assert_eq!(value["generateName"], "a-");
    }

    #[test]
    fn test_item_display() {
        assert_eq!(ItemMeta::new("a", "ns").to_string(), "ns/a");
        assert_eq!(ItemMeta::named("a").to_string(), "a");
    }

    #[test]
    fn test_list_kind() {
        let list = K8List::<GadgetSpec>::new();
        assert_eq!(list.kind, "GadgetList");
        assert!(list.items.is_empty());
    }

    const NOTE_API: Crd = Crd {
        group: "test.example.com",
        version: "v1",
        names: CrdNames {
            kind: "Note",
            plural: "notes",
        },
    };

    #[derive(Deserialize, Serialize, Debug, Default, Clone)]
    struct NoteSpec {
        text: String,
    }

    // no PartialEq
    #[derive(Deserialize, Serialize, Debug, Default, Clone)]
    struct NoteStatus {
        seen: bool,
    }

    impl Status for NoteStatus {}

    impl Spec for NoteSpec {
        type Status = NoteStatus;

        fn metadata() -> &'static Crd {
            &NOTE_API
        }
    }

    #[test]
    fn test_list_of_status_without_eq() {
        let mut list = K8List::<NoteSpec>::default();
        list.items.push(K8Obj::new("n1", NoteSpec::default()).set_namespace("ns"));
        let value = serde_json::to_value(&list).expect("json");
        assert_eq!(value["kind"], "NoteList");
        assert_eq!(value["items"][0]["metadata"]["namespace"], "ns");
        assert_eq!(value["items"][0]["status"]["seen"], false);
    }
}
