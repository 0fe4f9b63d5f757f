use serde::Deserialize;
use serde::Serialize;

/// list query parameters, as received from the serving layer
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ListOptions {
    /// parse from url query string, e.g. `labelSelector=app%3Dfoo&limit=10`
    pub fn from_query(query: &str) -> Result<Self, serde_qs::Error> {
        serde_qs::from_str(query)
    }

    pub fn to_query(&self) -> Result<String, serde_qs::Error> {
        serde_qs::to_string(self)
    }
}
