use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operation::Operation;

/// Coarse serving state reported by `GET .../watch` and on the model itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelState {
    #[default]
    Unspecified,
    Offline,
    Online,
    Error,
    /// Any state string this client does not know about.
    Other(String),
}

impl ModelState {
    pub fn as_str(&self) -> &str {
        match self {
            ModelState::Unspecified => "STATE_UNSPECIFIED",
            ModelState::Offline => "STATE_OFFLINE",
            ModelState::Online => "STATE_ONLINE",
            ModelState::Error => "STATE_ERROR",
            ModelState::Other(s) => s,
        }
    }
}

impl From<String> for ModelState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "STATE_UNSPECIFIED" | "" => ModelState::Unspecified,
            "STATE_OFFLINE" => ModelState::Offline,
            "STATE_ONLINE" => ModelState::Online,
            "STATE_ERROR" => ModelState::Error,
            _ => ModelState::Other(s),
        }
    }
}

impl From<ModelState> for String {
    fn from(state: ModelState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Visibility {
    Unspecified,
    Private,
    Public,
    Other(String),
}

impl Visibility {
    pub fn as_str(&self) -> &str {
        match self {
            Visibility::Unspecified => "VISIBILITY_UNSPECIFIED",
            Visibility::Private => "VISIBILITY_PRIVATE",
            Visibility::Public => "VISIBILITY_PUBLIC",
            Visibility::Other(s) => s,
        }
    }
}

impl From<String> for Visibility {
    fn from(s: String) -> Self {
        match s.as_str() {
            "VISIBILITY_UNSPECIFIED" | "" => Visibility::Unspecified,
            "VISIBILITY_PRIVATE" => Visibility::Private,
            "VISIBILITY_PUBLIC" => Visibility::Public,
            _ => Visibility::Other(s),
        }
    }
}

impl From<Visibility> for String {
    fn from(v: Visibility) -> Self {
        v.as_str().to_string()
    }
}

/// Resource view requested through the `view` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum View {
    #[default]
    #[serde(rename = "VIEW_BASIC")]
    Basic,
    #[serde(rename = "VIEW_FULL")]
    Full,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Basic => "VIEW_BASIC",
            View::Full => "VIEW_FULL",
        }
    }
}

/// A model as returned by the backend. The gateway emits both snake_case and
/// camelCase spellings depending on version, so every multi-word field takes
/// both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "modelDefinition")]
    pub model_definition: Option<String>,
    /// `null` in the basic view, populated in the full view.
    #[serde(default)]
    pub configuration: Option<Value>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub state: Option<ModelState>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default, alias = "ownerName")]
    pub owner_name: Option<String>,
    #[serde(default, alias = "ownerUid")]
    pub owner_uid: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default, alias = "creatorUid")]
    pub creator_uid: Option<String>,
    #[serde(default, alias = "createTime")]
    pub create_time: Option<String>,
    #[serde(default, alias = "updateTime")]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model: Model,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default, alias = "nextPageToken")]
    pub next_page_token: String,
    #[serde(default, alias = "totalSize", deserialize_with = "crate::wire::lenient_i64")]
    pub total_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub state: Option<ModelState>,
    #[serde(default, alias = "createTime")]
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListVersionsResponse {
    #[serde(default)]
    pub versions: Vec<ModelVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchResponse {
    #[serde(default)]
    pub state: ModelState,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Deploy/undeploy reply. Newer backends answer `{model_id}`, older ones a
/// long-running `{operation}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployResponse {
    #[serde(default, alias = "modelId")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub operation: Option<Operation>,
}

/// JSON body of `POST /v1alpha/{namespace}/models`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub model_definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default)]
    pub configuration: Value,
}

impl CreateModelRequest {
    /// A GitHub-backed model: `model-definitions/github` with repository and tag.
    pub fn github(id: impl Into<String>, repository: &str, tag: &str) -> Self {
        Self {
            id: Some(id.into()),
            model_definition: "model-definitions/github".to_string(),
            configuration: serde_json::json!({ "repository": repository, "tag": tag }),
            ..Default::default()
        }
    }
}

/// Fields of `POST /v1alpha/{namespace}/models/multipart`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUpload {
    pub id: String,
    pub description: Option<String>,
    pub model_definition: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Body of `PATCH /v1alpha/{namespace}/models/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_wire() {
        let s: ModelState = serde_json::from_str("\"STATE_ONLINE\"").unwrap();
        assert_eq!(s, ModelState::Online);
        let s: ModelState = serde_json::from_str("\"STATE_SCALING\"").unwrap();
        assert_eq!(s, ModelState::Other("STATE_SCALING".to_string()));
        assert_eq!(serde_json::to_string(&ModelState::Offline).unwrap(), "\"STATE_OFFLINE\"");
    }

    #[test]
    fn test_model_accepts_camel_and_snake_case() {
        let camel = serde_json::json!({
            "name": "namespaces/admin/models/m1",
            "id": "m1",
            "modelDefinition": "model-definitions/container",
            "ownerUid": "8f1b2d8e-0c3c-4c9e-9d6e-3b8f2a1c0d4e",
            "createTime": "2024-01-01T00:00:00Z",
            "state": "STATE_OFFLINE",
            "configuration": null
        });
        let m: Model = serde_json::from_value(camel).unwrap();
        assert_eq!(m.model_definition.as_deref(), Some("model-definitions/container"));
        assert_eq!(m.state, Some(ModelState::Offline));
        assert!(m.configuration.is_none());
        assert!(m.owner_uid.is_some());

        let snake = serde_json::json!({
            "name": "namespaces/admin/models/m1",
            "id": "m1",
            "model_definition": "model-definitions/github",
            "create_time": "2024-01-01T00:00:00Z"
        });
        let m: Model = serde_json::from_value(snake).unwrap();
        assert_eq!(m.model_definition.as_deref(), Some("model-definitions/github"));
        assert_eq!(m.state, None);
    }

    #[test]
    fn test_deploy_response_shapes() {
        let newer: DeployResponse = serde_json::from_str(r#"{"model_id":"m1"}"#).unwrap();
        assert_eq!(newer.model_id.as_deref(), Some("m1"));
        assert!(newer.operation.is_none());

        let older: DeployResponse =
            serde_json::from_str(r#"{"operation":{"name":"operations/abc","done":false}}"#).unwrap();
        assert_eq!(older.operation.unwrap().name, "operations/abc");
    }

    #[test]
    fn test_create_request_is_camel_case() {
        let body = serde_json::to_value(CreateModelRequest::github("m1", "admin/model-mobilenetv2", "v1.0-cpu"))
            .unwrap();
        assert_eq!(body["modelDefinition"], "model-definitions/github");
        assert_eq!(body["configuration"]["tag"], "v1.0-cpu");
        assert!(body.get("displayName").is_none());
    }
}
