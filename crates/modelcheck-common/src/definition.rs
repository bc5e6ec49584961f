use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "documentationUrl")]
    pub documentation_url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// JSON schema of the definition's configuration; `null` in the basic view.
    #[serde(default, alias = "modelSpec")]
    pub model_spec: Option<Value>,
    #[serde(default, alias = "createTime")]
    pub create_time: Option<String>,
    #[serde(default, alias = "updateTime")]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListModelDefinitionsResponse {
    #[serde(default, alias = "modelDefinitions")]
    pub model_definitions: Vec<ModelDefinition>,
    #[serde(default, alias = "nextPageToken")]
    pub next_page_token: String,
    #[serde(default, alias = "totalSize", deserialize_with = "crate::wire::lenient_i64")]
    pub total_size: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinitionResponse {
    #[serde(alias = "modelDefinition")]
    pub model_definition: ModelDefinition,
}
