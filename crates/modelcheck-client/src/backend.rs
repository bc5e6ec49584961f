use async_trait::async_trait;
use modelcheck_common::{
    CreateModelRequest, DeployResponse, FilePart, ListModelDefinitionsResponse, ListModelsResponse,
    ListVersionsResponse, Model, ModelDefinition, ModelPatch, ModelUpload, Operation,
    TriggerRequest, TriggerResponse, View, WatchResponse,
};

use crate::error::Result;

/// Pagination and view for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
    pub view: Option<View>,
}

impl ListQuery {
    pub fn page(size: u32) -> Self {
        Self {
            page_size: Some(size),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.page_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.view = Some(view);
        self
    }

    /// `(key, value)` pairs in the order the backend documents them.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(size) = self.page_size {
            pairs.push(("page_size", size.to_string()));
        }
        if let Some(token) = &self.page_token {
            pairs.push(("page_token", token.clone()));
        }
        if let Some(view) = self.view {
            pairs.push(("view", view.as_str().to_string()));
        }
        pairs
    }
}

/// One method per model-backend endpoint. All methods succeed on any 2xx
/// status; 404 maps to `ClientError::NotFound`, other failures to
/// `ClientError::Status`.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Namespace id the backend is scoped to (`admin`, ...).
    fn namespace(&self) -> &str;

    async fn health(&self) -> Result<()>;

    // ── models ──
    async fn create_model_multipart(&self, upload: ModelUpload) -> Result<Operation>;
    async fn create_model(&self, request: &CreateModelRequest) -> Result<Operation>;
    async fn get_model(&self, id: &str, view: View) -> Result<Model>;
    async fn list_models(&self, query: &ListQuery) -> Result<ListModelsResponse>;
    async fn update_model(&self, id: &str, patch: &ModelPatch) -> Result<Model>;
    async fn delete_model(&self, id: &str) -> Result<()>;
    async fn list_versions(&self, id: &str) -> Result<ListVersionsResponse>;

    // ── private (admin) service ──
    async fn list_models_admin(&self, query: &ListQuery) -> Result<ListModelsResponse>;
    async fn lookup_model(&self, uid: &str, view: View) -> Result<Model>;

    // ── serving ──
    async fn deploy_model(&self, id: &str) -> Result<DeployResponse>;
    async fn undeploy_model(&self, id: &str) -> Result<DeployResponse>;
    async fn watch_model(&self, id: &str) -> Result<WatchResponse>;
    async fn trigger_model(&self, id: &str, request: &TriggerRequest) -> Result<TriggerResponse>;
    async fn trigger_model_multipart(&self, id: &str, files: Vec<FilePart>)
        -> Result<TriggerResponse>;

    async fn publish_model(&self, id: &str) -> Result<Model>;
    async fn unpublish_model(&self, id: &str) -> Result<Model>;

    // ── operations ──
    async fn get_operation(&self, name: &str) -> Result<Operation>;
    async fn cancel_operation(&self, name: &str) -> Result<()>;

    // ── model definitions ──
    async fn list_model_definitions(&self, query: &ListQuery)
        -> Result<ListModelDefinitionsResponse>;
    async fn get_model_definition(&self, id: &str, view: View) -> Result<ModelDefinition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_pairs() {
        let q = ListQuery::page(1).with_token("").with_view(View::Full);
        assert_eq!(
            q.to_pairs(),
            vec![("page_size", "1".to_string()), ("view", "VIEW_FULL".to_string())]
        );
        let q = ListQuery::default().with_token("abc");
        assert_eq!(q.to_pairs(), vec![("page_token", "abc".to_string())]);
    }
}
