use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use modelcheck_common::{
    AuthMode, CreateModelRequest, DeployResponse, FilePart, ListModelDefinitionsResponse,
    ListModelsResponse, ListVersionsResponse, Model, ModelDefinition, ModelDefinitionResponse,
    ModelPatch, ModelResponse, ModelUpload, Operation, OperationResponse, TriggerRequest,
    TriggerResponse, View, WatchResponse,
};

use crate::backend::{ListQuery, ModelBackend};
use crate::error::{ClientError, Result};

/// Attach the headers for `mode` to a request.
pub fn apply_auth(builder: RequestBuilder, mode: &AuthMode) -> RequestBuilder {
    mode.headers()
        .into_iter()
        .fold(builder, |b, (name, value)| b.header(name, value))
}

#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the public service, e.g. `http://localhost:8083`.
    pub public_url: String,
    /// Base URL of the private (admin) service, e.g. `http://localhost:3083`.
    pub private_url: String,
    pub namespace: String,
    pub auth: AuthMode,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl RestConfig {
    pub fn new(public_url: impl Into<String>, namespace: impl Into<String>) -> Self {
        let public_url = public_url.into();
        Self {
            private_url: public_url.clone(),
            public_url,
            namespace: namespace.into(),
            auth: AuthMode::Anonymous,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
        }
    }
}

/// `ModelBackend` over the JSON/multipart REST gateway.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: Client,
    public_url: String,
    private_url: String,
    namespace: String,
    auth: AuthMode,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            public_url: config.public_url.trim_end_matches('/').to_string(),
            private_url: config.private_url.trim_end_matches('/').to_string(),
            namespace: config.namespace,
            auth: config.auth,
        })
    }

    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }

    fn public(&self, path: &str) -> String {
        format!("{}/v1alpha/{}", self.public_url, path)
    }

    fn private(&self, path: &str) -> String {
        format!("{}/v1alpha/{}", self.private_url, path)
    }

    /// `.../v1alpha/namespaces/{ns}/models/{id}{suffix}` on the public host.
    fn model_url(&self, id: &str, suffix: &str) -> String {
        self.public(&format!(
            "namespaces/{}/models/{}{}",
            urlencoding::encode(&self.namespace),
            urlencoding::encode(id),
            suffix
        ))
    }

    fn models_url(&self, suffix: &str) -> String {
        self.public(&format!(
            "namespaces/{}/models{}",
            urlencoding::encode(&self.namespace),
            suffix
        ))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let builder = apply_auth(builder, &self.auth);
        let resp = builder.send().await?;
        tracing::debug!(url = %resp.url(), status = resp.status().as_u16(), "backend response");
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        decode(self.send(builder).await?).await
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        let resp = self.send(builder).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(ClientError::status(status.as_u16(), resp.text().await?))
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::status(status.as_u16(), body));
    }
    serde_json::from_str(&body).map_err(|e| ClientError::Decode(format!("{e}: {body}")))
}

fn view_query(view: View) -> [(&'static str, &'static str); 1] {
    [("view", view.as_str())]
}

#[async_trait]
impl ModelBackend for RestBackend {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn health(&self) -> Result<()> {
        self.send_empty(self.http.get(self.public("health/model"))).await
    }

    async fn create_model_multipart(&self, upload: ModelUpload) -> Result<Operation> {
        let mut form = Form::new()
            .text("id", upload.id)
            .text("model_definition", upload.model_definition);
        if let Some(description) = upload.description {
            form = form.text("description", description);
        }
        let part = Part::bytes(upload.content).file_name(upload.file_name);
        form = form.part("content", part);

        let resp: OperationResponse = self
            .send_json(self.http.post(self.models_url("/multipart")).multipart(form))
            .await?;
        Ok(resp.operation)
    }

    async fn create_model(&self, request: &CreateModelRequest) -> Result<Operation> {
        let resp: OperationResponse = self
            .send_json(self.http.post(self.models_url("")).json(request))
            .await?;
        Ok(resp.operation)
    }

    async fn get_model(&self, id: &str, view: View) -> Result<Model> {
        let resp: ModelResponse = self
            .send_json(self.http.get(self.model_url(id, "")).query(&view_query(view)))
            .await?;
        Ok(resp.model)
    }

    async fn list_models(&self, query: &ListQuery) -> Result<ListModelsResponse> {
        self.send_json(self.http.get(self.models_url("")).query(&query.to_pairs()))
            .await
    }

    async fn update_model(&self, id: &str, patch: &ModelPatch) -> Result<Model> {
        let resp: ModelResponse = self
            .send_json(self.http.patch(self.model_url(id, "")).json(patch))
            .await?;
        Ok(resp.model)
    }

    async fn delete_model(&self, id: &str) -> Result<()> {
        self.send_empty(self.http.delete(self.model_url(id, ""))).await
    }

    async fn list_versions(&self, id: &str) -> Result<ListVersionsResponse> {
        self.send_json(self.http.get(self.model_url(id, "/versions")))
            .await
    }

    async fn list_models_admin(&self, query: &ListQuery) -> Result<ListModelsResponse> {
        self.send_json(
            self.http
                .get(self.private("admin/models"))
                .query(&query.to_pairs()),
        )
        .await
    }

    async fn lookup_model(&self, uid: &str, view: View) -> Result<Model> {
        let url = self.private(&format!("admin/models/{}/lookUp", urlencoding::encode(uid)));
        let resp: ModelResponse = self
            .send_json(self.http.get(url).query(&view_query(view)))
            .await?;
        Ok(resp.model)
    }

    async fn deploy_model(&self, id: &str) -> Result<DeployResponse> {
        self.send_json(
            self.http
                .post(self.model_url(id, "/deploy"))
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn undeploy_model(&self, id: &str) -> Result<DeployResponse> {
        self.send_json(
            self.http
                .post(self.model_url(id, "/undeploy"))
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn watch_model(&self, id: &str) -> Result<WatchResponse> {
        self.send_json(self.http.get(self.model_url(id, "/watch")))
            .await
    }

    async fn trigger_model(&self, id: &str, request: &TriggerRequest) -> Result<TriggerResponse> {
        self.send_json(self.http.post(self.model_url(id, "/trigger")).json(request))
            .await
    }

    async fn trigger_model_multipart(
        &self,
        id: &str,
        files: Vec<FilePart>,
    ) -> Result<TriggerResponse> {
        let form = files.into_iter().fold(Form::new(), |form, f| {
            form.part("file", Part::bytes(f.content).file_name(f.file_name))
        });
        self.send_json(
            self.http
                .post(self.model_url(id, "/trigger-multipart"))
                .multipart(form),
        )
        .await
    }

    async fn publish_model(&self, id: &str) -> Result<Model> {
        let url = self.public(&format!("models/{}:publish", urlencoding::encode(id)));
        let resp: ModelResponse = self.send_json(self.http.post(url)).await?;
        Ok(resp.model)
    }

    async fn unpublish_model(&self, id: &str) -> Result<Model> {
        let url = self.public(&format!("models/{}:unpublish", urlencoding::encode(id)));
        let resp: ModelResponse = self.send_json(self.http.post(url)).await?;
        Ok(resp.model)
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        let resp: OperationResponse = self.send_json(self.http.get(self.public(name))).await?;
        Ok(resp.operation)
    }

    async fn cancel_operation(&self, name: &str) -> Result<()> {
        self.send_empty(self.http.post(self.public(&format!("{name}/cancel"))))
            .await
    }

    async fn list_model_definitions(
        &self,
        query: &ListQuery,
    ) -> Result<ListModelDefinitionsResponse> {
        self.send_json(
            self.http
                .get(self.public("model-definitions"))
                .query(&query.to_pairs()),
        )
        .await
    }

    async fn get_model_definition(&self, id: &str, view: View) -> Result<ModelDefinition> {
        let url = self.public(&format!("model-definitions/{}", urlencoding::encode(id)));
        let resp: ModelDefinitionResponse = self
            .send_json(self.http.get(url).query(&view_query(view)))
            .await?;
        Ok(resp.model_definition)
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
}

/// `POST {mgmt_url}/v1beta/auth/login`; returns the access token for
/// `AuthMode::Bearer`.
pub async fn login(mgmt_url: &str, username: &str, password: &str) -> Result<String> {
    let url = format!("{}/v1beta/auth/login", mgmt_url.trim_end_matches('/'));
    let resp = Client::new()
        .post(&url)
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await?;
    let body: LoginResponse = decode(resp).await?;
    tracing::info!(username, "logged in");
    Ok(body.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        let mut config = RestConfig::new("http://localhost:8083/", "admin");
        config.private_url = "http://localhost:3083".to_string();
        RestBackend::new(config).unwrap()
    }

    #[test]
    fn test_urls() {
        let b = backend();
        assert_eq!(
            b.model_url("m1", "/watch"),
            "http://localhost:8083/v1alpha/namespaces/admin/models/m1/watch"
        );
        assert_eq!(
            b.models_url("/multipart"),
            "http://localhost:8083/v1alpha/namespaces/admin/models/multipart"
        );
        assert_eq!(b.private("admin/models"), "http://localhost:3083/v1alpha/admin/models");
        assert_eq!(
            b.public("operations/abc"),
            "http://localhost:8083/v1alpha/operations/abc"
        );
    }

    #[test]
    fn test_apply_auth_sets_headers() {
        let client = Client::new();
        let mode = AuthMode::JwtSub("8f1b2d8e-0c3c-4c9e-9d6e-3b8f2a1c0d4e".to_string());
        let req = apply_auth(client.get("http://localhost/"), &mode)
            .build()
            .unwrap();
        assert_eq!(
            req.headers().get(modelcheck_common::auth::JWT_SUB_HEADER).unwrap(),
            "8f1b2d8e-0c3c-4c9e-9d6e-3b8f2a1c0d4e"
        );

        let req = apply_auth(client.get("http://localhost/"), &AuthMode::Bearer("t".into()))
            .build()
            .unwrap();
        assert_eq!(req.headers().get("authorization").unwrap(), "Bearer t");
    }
}
