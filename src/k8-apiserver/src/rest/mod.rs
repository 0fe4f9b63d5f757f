#[cfg(test)]
pub(crate) mod fixture;
mod store;
mod strategy;

pub use store::*;
pub use strategy::*;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use k8_storage::ListArg;
use k8_storage::NameSpace;
use k8_storage::Set;
use k8_storage::SharedBackend;
use k8_types::table::Table;
use k8_types::GroupResource;
use k8_types::ItemMeta;
use k8_types::ObjectMeta;

use crate::ApiError;
use crate::RequestContext;

/// Storage adapter as seen by the serving layer. Objects are JSON documents.
#[async_trait]
pub trait Storage: Debug + Send + Sync {
    fn group_resource(&self) -> &GroupResource;

    fn kind(&self) -> String;

    fn singular_name(&self) -> &str;

    fn namespace_scoped(&self) -> bool;

    /// extra names the serving layer accepts for the resource
    fn short_names(&self) -> Vec<String> {
        vec![]
    }

    /// physical store objects are persisted in
    fn backend(&self) -> &SharedBackend;

    fn resource_prefix(&self) -> &str;

    /// empty object of the kind
    fn new_object(&self) -> Result<Value, ApiError>;

    fn new_list(&self) -> Result<Value, ApiError>;

    async fn get(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError>;

    async fn list(
        &self,
        ctx: &RequestContext,
        namespace: &NameSpace,
        arg: &ListArg,
    ) -> Result<Value, ApiError>;

    async fn create(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError>;

    async fn update(&self, ctx: &RequestContext, obj: Value) -> Result<Value, ApiError>;

    async fn delete(&self, ctx: &RequestContext, item: &ItemMeta) -> Result<Value, ApiError>;

    fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[Value],
    ) -> Result<Option<Table>, ApiError>;
}

/// resource (or `resource/subresource`) name to storage
pub type ResourceStorageMap = BTreeMap<String, Arc<dyn Storage>>;

/// version to resources
pub type StorageMap = BTreeMap<String, ResourceStorageMap>;

/// labels and selectable fields of a stored object
pub type AttrFunc = fn(&Value, bool) -> Result<(Set, Set), ApiError>;

/// Extract labels and fields used by list predicates.
/// Fails if the object does not have metadata.
pub fn get_attrs(obj: &Value, namespace_scoped: bool) -> Result<(Set, Set), ApiError> {
    let metadata = obj
        .get("metadata")
        .filter(|metadata| metadata.is_object())
        .ok_or(ApiError::MissingMetadata)?;
    let meta: ObjectMeta = serde_json::from_value(metadata.clone())?;
    let fields = selectable_fields(&meta, namespace_scoped);
    Ok((meta.labels, fields))
}

pub fn selectable_fields(meta: &ObjectMeta, namespace_scoped: bool) -> Set {
    let mut fields = Set::new();
    fields.insert("metadata.name".to_owned(), meta.name.clone());
    if namespace_scoped {
        fields.insert("metadata.namespace".to_owned(), meta.namespace.clone());
    }
    fields
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use k8_types::ObjectMeta;

    use super::get_attrs;
    use super::selectable_fields;
    use crate::ApiError;

    #[test]
    fn test_get_attrs() {
        let obj = json!({
            "metadata": {
                "name": "myname",
                "namespace": "ns",
                "labels": { "foo": "bar" }
            }
        });
        let (labels, fields) = get_attrs(&obj, true).expect("attrs");
        assert_eq!(labels.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(
            fields.get("metadata.name").map(String::as_str),
            Some("myname")
        );
        assert_eq!(
            fields.get("metadata.namespace").map(String::as_str),
            Some("ns")
        );
    }

    #[test]
    fn test_get_attrs_without_metadata() {
        let err = get_attrs(&json!({ "spec": {} }), true).expect_err("no metadata");
        assert!(matches!(err, ApiError::MissingMetadata));
    }

    #[test]
    fn test_selectable_fields() {
        let meta = ObjectMeta::new("n", "ns");
        let fields = selectable_fields(&meta, true);
        assert_eq!(fields.get("metadata.name").map(String::as_str), Some("n"));
        assert_eq!(
            fields.get("metadata.namespace").map(String::as_str),
            Some("ns")
        );

        let fields = selectable_fields(&ObjectMeta::named("c"), false);
        assert_eq!(fields.len(), 1);
    }
}
