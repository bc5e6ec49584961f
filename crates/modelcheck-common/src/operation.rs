use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `google.rpc.Status` carried by a finished operation that failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Long-running operation envelope: `{name, done, metadata, response}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

impl Operation {
    /// `response.id`, set once a create operation has finished.
    pub fn response_id(&self) -> Option<&str> {
        self.response.as_ref()?.get("id")?.as_str()
    }

    pub fn response_name(&self) -> Option<&str> {
        self.response.as_ref()?.get("name")?.as_str()
    }

    pub fn failed(&self) -> bool {
        self.done && self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub operation: Operation,
}
