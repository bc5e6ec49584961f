use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::Instant;

use modelcheck_common::validate::random_id;
use modelcheck_common::{
    CreateModelRequest, DeployResponse, FilePart, ListModelDefinitionsResponse, ListModelsResponse,
    ListVersionsResponse, Model, ModelDefinition, ModelName, ModelPatch, ModelState, ModelUpload,
    ModelVersion, Operation, OperationError, TaskOutput, TriggerRequest, TriggerResponse, View,
    Visibility, WatchResponse,
};

use crate::backend::{ListQuery, ModelBackend};
use crate::error::{ClientError, Result};

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;
const DEFINITION_IDS: [&str; 3] = ["container", "github", "local"];

#[derive(Debug, Clone)]
pub struct MemoryBackendConfig {
    pub namespace: String,
    /// Time a created model spends in `STATE_UNSPECIFIED` before going offline.
    pub create_latency: Duration,
    /// Time a deploy/undeploy takes to reach its target state.
    pub deploy_latency: Duration,
    /// Deploys end in `STATE_ERROR` and their operation carries an error.
    pub fail_deploy: bool,
    /// Deploy/undeploy answer `{model_id, operation}` when set, `{model_id}`
    /// alone otherwise.
    pub deploy_operation: bool,
    /// `watch` answers 404 for this long after a model is created.
    pub watch_delay: Duration,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            namespace: "admin".to_string(),
            create_latency: Duration::from_secs(2),
            deploy_latency: Duration::from_secs(3),
            fail_deploy: false,
            deploy_operation: true,
            watch_delay: Duration::ZERO,
        }
    }
}

/// In-process model backend. State transitions are driven by
/// `tokio::time::Instant`, so tests under paused time are deterministic.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    config: MemoryBackendConfig,
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    seq: u64,
    models: BTreeMap<String, ModelEntry>,
    operations: BTreeMap<String, OperationEntry>,
}

#[derive(Debug)]
struct ModelEntry {
    seq: u64,
    created_at: Instant,
    model: Model,
    configuration: Value,
    /// What `trigger` answers per input.
    output: TaskOutput,
    state: ModelState,
    transition: Option<Transition>,
}

#[derive(Debug, Clone)]
struct Transition {
    operation: String,
    from: ModelState,
    to: ModelState,
    started_at: Instant,
    ready_at: Instant,
}

#[derive(Debug)]
struct OperationEntry {
    model_id: String,
    ready_at: Instant,
    error: Option<OperationError>,
    cancelled: bool,
}

impl ModelEntry {
    /// A model in transition reports `STATE_UNSPECIFIED` until it settles.
    fn reported_state(&self) -> ModelState {
        match self.transition {
            Some(_) => ModelState::Unspecified,
            None => self.state.clone(),
        }
    }

    fn view(&self, view: View) -> Model {
        let mut model = self.model.clone();
        model.state = Some(self.reported_state());
        model.configuration = match view {
            View::Full => Some(self.configuration.clone()),
            View::Basic => None,
        };
        model
    }
}

impl Inner {
    /// Apply every transition whose deadline has passed.
    fn settle(&mut self, now: Instant) {
        for entry in self.models.values_mut() {
            let ready = matches!(&entry.transition, Some(t) if now >= t.ready_at);
            if !ready {
                continue;
            }
            if let Some(t) = entry.transition.take() {
                let failed = self
                    .operations
                    .get(&t.operation)
                    .is_some_and(|op| op.error.is_some());
                entry.state = if failed { ModelState::Error } else { t.to };
                tracing::debug!(model_id = %entry.model.id, state = %entry.state, "model settled");
            }
        }
    }

    fn model(&self, id: &str) -> Result<&ModelEntry> {
        self.models
            .get(id)
            .ok_or_else(|| ClientError::NotFound(format!("model {id} not found")))
    }

    fn model_mut(&mut self, id: &str) -> Result<&mut ModelEntry> {
        self.models
            .get_mut(id)
            .ok_or_else(|| ClientError::NotFound(format!("model {id} not found")))
    }

    /// Models newest first, the order list endpoints return them in.
    fn newest_first(&self) -> Vec<&ModelEntry> {
        let mut entries: Vec<&ModelEntry> = self.models.values().collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries
    }
}

fn bad_request(message: impl Into<String>) -> ClientError {
    ClientError::Status {
        status: 400,
        body: message.into(),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Offset-token pagination shared by every list endpoint.
fn paginate<T: Clone>(items: &[T], query: &ListQuery) -> Result<(Vec<T>, String)> {
    let size = match query.page_size {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(n) => (n as usize).min(MAX_PAGE_SIZE),
    };
    let offset = match query.page_token.as_deref() {
        None | Some("") => 0,
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| bad_request(format!("invalid page_token '{token}'")))?,
    };
    let page: Vec<T> = items.iter().skip(offset).take(size).cloned().collect();
    let next = offset + page.len();
    let token = if next < items.len() {
        next.to_string()
    } else {
        String::new()
    };
    Ok((page, token))
}

fn into_output(value: Value) -> TaskOutput {
    match value {
        Value::Object(map) => TaskOutput(map),
        _ => TaskOutput::default(),
    }
}

fn bounding_box() -> Value {
    json!({ "top": 0, "left": 0, "width": 0, "height": 0 })
}

fn task_output(task: &str) -> TaskOutput {
    let value = match task {
        "TASK_DETECTION" => json!({ "detection": { "objects": [
            { "category": "match", "score": 1.0, "bounding_box": bounding_box() }
        ] } }),
        "TASK_KEYPOINT" => json!({ "keypoint": { "objects": [
            { "keypoints": [{ "x": 0.0, "y": 0.0, "v": 1.0 }], "score": 1.0, "bounding_box": bounding_box() }
        ] } }),
        "TASK_UNSPECIFIED" => json!({ "unspecified": { "raw_outputs": [
            { "name": "output", "data_type": "FP32", "shape": [1], "data": [1.0] }
        ] } }),
        _ => json!({ "classification": { "category": "match", "score": 1.0 } }),
    };
    into_output(value)
}

/// Task and trigger output of an uploaded model, taken from the archive name
/// the way the dummy fixtures are named.
fn outputs_for_file(file_name: &str) -> (&'static str, TaskOutput) {
    if file_name.contains("empty-response") {
        // A detector that answers one zeroed object.
        let output = json!({ "detection": { "objects": [
            { "category": "", "score": 0, "bounding_box": bounding_box() }
        ] } });
        return ("TASK_DETECTION", into_output(output));
    }
    let task = if file_name.contains("det") {
        "TASK_DETECTION"
    } else if file_name.contains("keypoint") {
        "TASK_KEYPOINT"
    } else if file_name.contains("unspecified") {
        "TASK_UNSPECIFIED"
    } else {
        "TASK_CLASSIFICATION"
    };
    (task, task_output(task))
}

fn definition(id: &str, view: View) -> ModelDefinition {
    let title = match id {
        "container" => "Container",
        "github" => "GitHub",
        _ => "Local",
    };
    let model_spec = match view {
        View::Basic => None,
        View::Full => Some(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": format!("{title} spec"),
            "type": "object",
            "additionalProperties": false,
        })),
    };
    ModelDefinition {
        name: format!("model-definitions/{id}"),
        uid: Some(uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, id.as_bytes()).to_string()),
        id: id.to_string(),
        title: Some(title.to_string()),
        documentation_url: Some(format!("https://www.instill.tech/docs/import-models/{id}")),
        icon: Some(format!("{id}.svg")),
        model_spec,
        create_time: None,
        update_time: None,
    }
}

impl MemoryBackend {
    pub fn new(config: MemoryBackendConfig) -> Self {
        Self {
            config,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub fn config(&self) -> &MemoryBackendConfig {
        &self.config
    }

    /// Number of models currently stored, for tests.
    pub async fn model_count(&self) -> usize {
        self.inner.read().await.models.len()
    }

    fn owner(&self) -> String {
        format!("users/{}", self.config.namespace)
    }

    fn owner_uid(&self) -> String {
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, self.config.namespace.as_bytes()).to_string()
    }

    fn new_operation(
        inner: &mut Inner,
        model_id: &str,
        ready_at: Instant,
        error: Option<OperationError>,
    ) -> String {
        let name = format!("operations/{}", uuid::Uuid::new_v4());
        inner.operations.insert(
            name.clone(),
            OperationEntry {
                model_id: model_id.to_string(),
                ready_at,
                error,
                cancelled: false,
            },
        );
        name
    }

    fn operation_view(inner: &Inner, name: &str, now: Instant) -> Result<Operation> {
        let op = inner
            .operations
            .get(name)
            .ok_or_else(|| ClientError::NotFound(format!("operation {name} not found")))?;
        let done = op.cancelled || now >= op.ready_at;
        let response = inner
            .models
            .get(&op.model_id)
            .and_then(|m| serde_json::to_value(m.view(View::Basic)).ok());
        Ok(Operation {
            name: name.to_string(),
            done,
            metadata: None,
            response,
            error: if done { op.error.clone() } else { None },
        })
    }

    async fn insert_model(
        &self,
        id: String,
        description: Option<String>,
        model_definition: String,
        task: String,
        output: TaskOutput,
        visibility: Visibility,
        configuration: Value,
    ) -> Result<Operation> {
        let definition_id = model_definition
            .strip_prefix("model-definitions/")
            .unwrap_or(&model_definition);
        if !DEFINITION_IDS.contains(&definition_id) {
            return Err(bad_request(format!("unknown model definition '{model_definition}'")));
        }
        let name = ModelName::new(self.config.namespace.clone(), id.clone());
        if id.is_empty() || id.contains('/') {
            return Err(bad_request(format!("invalid model id '{id}'")));
        }

        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        if inner.models.contains_key(&id) {
            return Err(ClientError::Status {
                status: 409,
                body: format!("model {id} already exists"),
            });
        }

        let ready_at = now + self.config.create_latency;
        let operation = Self::new_operation(&mut inner, &id, ready_at, None);
        let ts = now_rfc3339();
        let owner_uid = self.owner_uid();
        let model = Model {
            name: name.to_string(),
            uid: Some(uuid::Uuid::new_v4().to_string()),
            id: id.clone(),
            description,
            model_definition: Some(model_definition),
            configuration: None,
            task: Some(task),
            state: None,
            visibility: Some(visibility),
            owner_name: Some(self.owner()),
            owner_uid: Some(owner_uid.clone()),
            creator: Some(self.owner()),
            creator_uid: Some(owner_uid),
            create_time: Some(ts.clone()),
            update_time: Some(ts),
        };
        inner.seq += 1;
        let seq = inner.seq;
        inner.models.insert(
            id.clone(),
            ModelEntry {
                seq,
                created_at: now,
                model,
                configuration,
                output,
                state: ModelState::Unspecified,
                transition: Some(Transition {
                    operation: operation.clone(),
                    from: ModelState::Unspecified,
                    to: ModelState::Offline,
                    started_at: now,
                    ready_at,
                }),
            },
        );
        tracing::info!(model_id = %id, operation = %operation, "model created");
        Self::operation_view(&inner, &operation, now)
    }

    async fn transition(&self, id: &str, to: ModelState) -> Result<DeployResponse> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        let entry = inner.model(id)?;
        if entry.transition.is_some() {
            return Err(ClientError::Status {
                status: 422,
                body: format!("model {id} is in a transition state"),
            });
        }
        if entry.state == to {
            return Ok(DeployResponse {
                model_id: Some(id.to_string()),
                operation: None,
            });
        }

        let ready_at = now + self.config.deploy_latency;
        let error = (to == ModelState::Online && self.config.fail_deploy).then(|| OperationError {
            code: 13,
            message: format!("model {id} failed to come online"),
        });
        let operation = Self::new_operation(&mut inner, id, ready_at, error);
        let entry = inner.model_mut(id)?;
        entry.transition = Some(Transition {
            operation: operation.clone(),
            from: entry.state.clone(),
            to: to.clone(),
            started_at: now,
            ready_at,
        });
        tracing::info!(model_id = %id, target = %to, operation = %operation, "model transition started");
        let operation = if self.config.deploy_operation {
            Some(Self::operation_view(&inner, &operation, now)?)
        } else {
            None
        };
        Ok(DeployResponse {
            model_id: Some(id.to_string()),
            operation,
        })
    }

    async fn trigger(&self, id: &str, inputs: usize) -> Result<TriggerResponse> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        let entry = inner.model(id)?;
        let state = entry.reported_state();
        if state != ModelState::Online {
            return Err(bad_request(format!("model {id} is {state}, not online")));
        }
        if inputs == 0 {
            return Err(bad_request("task_inputs must not be empty"));
        }
        Ok(TriggerResponse {
            task: entry.model.task.clone(),
            task_outputs: vec![entry.output.clone(); inputs],
        })
    }

    async fn set_visibility(&self, id: &str, visibility: Visibility) -> Result<Model> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        let entry = inner.model_mut(id)?;
        entry.model.visibility = Some(visibility);
        entry.model.update_time = Some(now_rfc3339());
        Ok(entry.view(View::Full))
    }

    async fn list(&self, query: &ListQuery) -> Result<ListModelsResponse> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        let view = query.view.unwrap_or_default();
        let all: Vec<Model> = inner.newest_first().into_iter().map(|e| e.view(view)).collect();
        let (models, next_page_token) = paginate(&all, query)?;
        Ok(ListModelsResponse {
            models,
            next_page_token,
            total_size: all.len() as i64,
        })
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

#[async_trait]
impl ModelBackend for MemoryBackend {
    fn namespace(&self) -> &str {
        &self.config.namespace
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }

    async fn create_model_multipart(&self, upload: ModelUpload) -> Result<Operation> {
        if upload.content.is_empty() {
            return Err(bad_request("model content is empty"));
        }
        let (task, output) = outputs_for_file(&upload.file_name);
        self.insert_model(
            upload.id,
            upload.description,
            upload.model_definition,
            task.to_string(),
            output,
            Visibility::Private,
            json!({ "content": upload.file_name }),
        )
        .await
    }

    async fn create_model(&self, request: &CreateModelRequest) -> Result<Operation> {
        let id = request.id.clone().unwrap_or_else(|| random_id(10));
        let task = request
            .task
            .clone()
            .unwrap_or_else(|| "TASK_CLASSIFICATION".to_string());
        let output = task_output(&task);
        self.insert_model(
            id,
            request.description.clone(),
            request.model_definition.clone(),
            task,
            output,
            request.visibility.clone().unwrap_or(Visibility::Private),
            request.configuration.clone(),
        )
        .await
    }

    async fn get_model(&self, id: &str, view: View) -> Result<Model> {
        let mut inner = self.inner.write().await;
        inner.settle(Instant::now());
        Ok(inner.model(id)?.view(view))
    }

    async fn list_models(&self, query: &ListQuery) -> Result<ListModelsResponse> {
        self.list(query).await
    }

    async fn update_model(&self, id: &str, patch: &ModelPatch) -> Result<Model> {
        let mut inner = self.inner.write().await;
        inner.settle(Instant::now());
        let entry = inner.model_mut(id)?;
        if let Some(description) = &patch.description {
            entry.model.description = Some(description.clone());
        }
        entry.model.update_time = Some(now_rfc3339());
        Ok(entry.view(View::Full))
    }

    async fn delete_model(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.settle(Instant::now());
        if inner.model(id)?.transition.is_some() {
            return Err(ClientError::Status {
                status: 422,
                body: format!("model {id} is in a transition state"),
            });
        }
        inner.models.remove(id);
        inner.operations.retain(|_, op| op.model_id != id);
        tracing::info!(model_id = %id, "model deleted");
        Ok(())
    }

    async fn list_versions(&self, id: &str) -> Result<ListVersionsResponse> {
        let mut inner = self.inner.write().await;
        inner.settle(Instant::now());
        let entry = inner.model(id)?;
        Ok(ListVersionsResponse {
            versions: vec![ModelVersion {
                name: format!("{}/versions/v1", entry.model.name),
                id: "v1".to_string(),
                state: Some(entry.reported_state()),
                create_time: entry.model.create_time.clone(),
            }],
        })
    }

    async fn list_models_admin(&self, query: &ListQuery) -> Result<ListModelsResponse> {
        self.list(query).await
    }

    async fn lookup_model(&self, uid: &str, view: View) -> Result<Model> {
        let mut inner = self.inner.write().await;
        inner.settle(Instant::now());
        inner
            .models
            .values()
            .find(|e| e.model.uid.as_deref() == Some(uid))
            .map(|e| e.view(view))
            .ok_or_else(|| ClientError::NotFound(format!("model with uid {uid} not found")))
    }

    async fn deploy_model(&self, id: &str) -> Result<DeployResponse> {
        self.transition(id, ModelState::Online).await
    }

    async fn undeploy_model(&self, id: &str) -> Result<DeployResponse> {
        self.transition(id, ModelState::Offline).await
    }

    async fn watch_model(&self, id: &str) -> Result<WatchResponse> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        let entry = inner.model(id)?;
        if now < entry.created_at + self.config.watch_delay {
            return Err(ClientError::NotFound(format!("model {id} not found")));
        }
        let progress = entry.transition.as_ref().map(|t| {
            let total = (t.ready_at - t.started_at).as_millis().max(1);
            let done = (now - t.started_at).as_millis();
            (done * 100 / total).min(99) as i32
        });
        let message = match &entry.transition {
            Some(t) => Some(format!("{} -> {}", t.from, t.to)),
            None if entry.state == ModelState::Error => Some("deployment failed".to_string()),
            None => None,
        };
        Ok(WatchResponse {
            state: entry.reported_state(),
            progress,
            message,
        })
    }

    async fn trigger_model(&self, id: &str, request: &TriggerRequest) -> Result<TriggerResponse> {
        self.trigger(id, request.task_inputs.len()).await
    }

    async fn trigger_model_multipart(
        &self,
        id: &str,
        files: Vec<FilePart>,
    ) -> Result<TriggerResponse> {
        self.trigger(id, files.len()).await
    }

    async fn publish_model(&self, id: &str) -> Result<Model> {
        self.set_visibility(id, Visibility::Public).await
    }

    async fn unpublish_model(&self, id: &str) -> Result<Model> {
        self.set_visibility(id, Visibility::Private).await
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        Self::operation_view(&inner, name, now)
    }

    async fn cancel_operation(&self, name: &str) -> Result<()> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.settle(now);
        let op = inner
            .operations
            .get_mut(name)
            .ok_or_else(|| ClientError::NotFound(format!("operation {name} not found")))?;
        if op.cancelled || now >= op.ready_at {
            return Ok(());
        }
        op.cancelled = true;
        op.error = Some(OperationError {
            code: 1,
            message: "operation cancelled".to_string(),
        });
        let model_id = op.model_id.clone();
        if let Some(entry) = inner.models.get_mut(&model_id) {
            if entry.transition.as_ref().is_some_and(|t| t.operation == name) {
                if let Some(t) = entry.transition.take() {
                    // An aborted create leaves a model that never came up.
                    entry.state = match t.from {
                        ModelState::Unspecified => ModelState::Error,
                        from => from,
                    };
                }
            }
        }
        tracing::info!(operation = %name, model_id = %model_id, "operation cancelled");
        Ok(())
    }

    async fn list_model_definitions(
        &self,
        query: &ListQuery,
    ) -> Result<ListModelDefinitionsResponse> {
        let view = query.view.unwrap_or_default();
        let all: Vec<ModelDefinition> =
            DEFINITION_IDS.iter().map(|id| definition(id, view)).collect();
        let (model_definitions, next_page_token) = paginate(&all, query)?;
        Ok(ListModelDefinitionsResponse {
            model_definitions,
            next_page_token,
            total_size: all.len() as i64,
        })
    }

    async fn get_model_definition(&self, id: &str, view: View) -> Result<ModelDefinition> {
        let id = id.strip_prefix("model-definitions/").unwrap_or(id);
        if !DEFINITION_IDS.contains(&id) {
            return Err(ClientError::NotFound(format!("model definition {id} not found")));
        }
        Ok(definition(id, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::{wait_model_state, PollOutcome, PollPolicy, StateTarget};

    fn upload(id: &str) -> ModelUpload {
        ModelUpload {
            id: id.to_string(),
            description: Some("dummy".to_string()),
            model_definition: "model-definitions/container".to_string(),
            file_name: "dummy-cls-model.zip".to_string(),
            content: vec![0x50, 0x4b, 0x03, 0x04],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_settles_offline() {
        let backend = MemoryBackend::default();
        let op = backend.create_model_multipart(upload("m1")).await.unwrap();
        assert!(!op.done);
        assert_eq!(op.response_id(), Some("m1"));

        let w = backend.watch_model("m1").await.unwrap();
        assert_eq!(w.state, ModelState::Unspecified);
        assert_eq!(
            backend.delete_model("m1").await.unwrap_err().http_status(),
            Some(422)
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        let op = backend.get_operation(&op.name).await.unwrap();
        assert!(op.done);
        let model = backend.get_model("m1", View::Basic).await.unwrap();
        assert_eq!(model.state, Some(ModelState::Offline));
        assert!(model.configuration.is_none());
        assert_eq!(model.name, "namespaces/admin/models/m1");
        assert!(backend.get_model("m1", View::Full).await.unwrap().configuration.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_and_unknown() {
        let backend = MemoryBackend::default();
        backend.create_model_multipart(upload("m1")).await.unwrap();
        let err = backend.create_model_multipart(upload("m1")).await.unwrap_err();
        assert_eq!(err.http_status(), Some(409));
        assert!(backend.get_model("nope", View::Basic).await.unwrap_err().is_not_found());
        assert!(backend.publish_model("nope").await.unwrap_err().is_not_found());
        assert!(backend.get_operation("operations/nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_trigger_undeploy() {
        let backend = MemoryBackend::default();
        backend.create_model_multipart(upload("m1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        let err = backend
            .trigger_model("m1", &TriggerRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), Some(400));

        let resp = backend.deploy_model("m1").await.unwrap();
        assert_eq!(resp.model_id.as_deref(), Some("m1"));
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(backend.watch_model("m1").await.unwrap().state, ModelState::Online);

        let req = TriggerRequest::classification([
            modelcheck_common::ImageInput::Url("https://example.com/dog.jpg".into()),
            modelcheck_common::ImageInput::Url("https://example.com/cat.jpg".into()),
        ]);
        let out = backend.trigger_model("m1", &req).await.unwrap();
        assert_eq!(out.task.as_deref(), Some("TASK_CLASSIFICATION"));
        assert_eq!(out.task_outputs.len(), 2);
        let c = out.task_outputs[0].classification().unwrap();
        assert_eq!(c.category.as_deref(), Some("match"));
        assert_eq!(c.score, Some(1.0));

        backend.undeploy_model("m1").await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(backend.watch_model("m1").await.unwrap().state, ModelState::Offline);
        backend.delete_model("m1").await.unwrap();
        assert_eq!(backend.model_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deploy_reports_error() {
        let backend = MemoryBackend::new(MemoryBackendConfig {
            fail_deploy: true,
            ..Default::default()
        });
        backend.create_model_multipart(upload("m1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let op = backend.deploy_model("m1").await.unwrap().operation.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(backend.watch_model("m1").await.unwrap().state, ModelState::Error);
        assert!(backend.get_operation(&op.name).await.unwrap().failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_reverts_state() {
        let backend = MemoryBackend::default();
        backend.create_model_multipart(upload("m1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let op = backend.deploy_model("m1").await.unwrap().operation.unwrap();
        backend.cancel_operation(&op.name).await.unwrap();

        let op = backend.get_operation(&op.name).await.unwrap();
        assert!(op.done);
        assert!(op.error.is_some());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(backend.watch_model("m1").await.unwrap().state, ModelState::Offline);
        // Cancelling a finished operation is a no-op.
        backend.cancel_operation(&op.name).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_reports_unspecified() {
        let backend = MemoryBackend::default();
        backend.create_model_multipart(upload("m1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        backend.deploy_model("m1").await.unwrap();

        assert_eq!(backend.watch_model("m1").await.unwrap().state, ModelState::Unspecified);
        let model = backend.get_model("m1", View::Basic).await.unwrap();
        assert_eq!(model.state, Some(ModelState::Unspecified));
        let err = backend
            .trigger_model("m1", &TriggerRequest::classification([
                modelcheck_common::ImageInput::Url("https://example.com/dog.jpg".into()),
            ]))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), Some(400));

        let start = Instant::now();
        let target = StateTarget::IsNot(ModelState::Unspecified);
        let watch = wait_model_state(&backend, "m1", target, &PollPolicy::local())
            .await
            .into_result()
            .unwrap();
        assert_eq!(watch.state, ModelState::Online);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_not_found_right_after_create() {
        let backend = MemoryBackend::new(MemoryBackendConfig {
            watch_delay: Duration::from_secs(5),
            ..Default::default()
        });
        backend.create_model_multipart(upload("m1")).await.unwrap();
        let target = StateTarget::IsNot(ModelState::Unspecified);

        let outcome = wait_model_state(&backend, "m1", target.clone(), &PollPolicy::local()).await;
        assert!(matches!(outcome, PollOutcome::Failed(_)), "{outcome:?}");

        let policy = PollPolicy::local().tolerating_fetch_errors();
        let watch = wait_model_state(&backend, "m1", target, &policy)
            .await
            .into_result()
            .unwrap();
        assert_eq!(watch.state, ModelState::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_without_operation() {
        let backend = MemoryBackend::new(MemoryBackendConfig {
            deploy_operation: false,
            ..Default::default()
        });
        backend.create_model_multipart(upload("m1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let resp = backend.deploy_model("m1").await.unwrap();
        assert_eq!(resp.model_id.as_deref(), Some("m1"));
        assert!(resp.operation.is_none());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(backend.watch_model("m1").await.unwrap().state, ModelState::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_create_errors_and_delete_drops_operations() {
        let backend = MemoryBackend::default();
        let op = backend.create_model_multipart(upload("m1")).await.unwrap();
        backend.cancel_operation(&op.name).await.unwrap();
        assert_eq!(backend.watch_model("m1").await.unwrap().state, ModelState::Error);
        assert!(backend.get_operation(&op.name).await.unwrap().failed());

        backend.delete_model("m1").await.unwrap();
        assert!(backend.get_operation(&op.name).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_outputs_follow_archive_name() {
        let backend = MemoryBackend::default();
        for (id, file) in [
            ("det", "dummy-det-model.zip"),
            ("kp", "dummy-keypoint-model.zip"),
            ("raw", "dummy-unspecified-model.zip"),
            ("empty", "empty-response-model.zip"),
        ] {
            let mut u = upload(id);
            u.file_name = file.to_string();
            backend.create_model_multipart(u).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        for id in ["det", "kp", "raw", "empty"] {
            backend.deploy_model(id).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(3)).await;

        let req = TriggerRequest::classification([modelcheck_common::ImageInput::Url(
            "https://example.com/dog.jpg".into(),
        )]);
        let det = backend.trigger_model("det", &req).await.unwrap();
        assert_eq!(det.task.as_deref(), Some("TASK_DETECTION"));
        assert_eq!(det.shape(), vec![vec!["detection.objects".to_string()]]);
        let kp = backend.trigger_model("kp", &req).await.unwrap();
        assert_eq!(kp.task.as_deref(), Some("TASK_KEYPOINT"));
        assert!(kp.task_outputs[0].get("keypoint").is_some());
        let raw = backend.trigger_model("raw", &req).await.unwrap();
        assert_eq!(raw.shape(), vec![vec!["unspecified.raw_outputs".to_string()]]);

        let empty = backend.trigger_model("empty", &req).await.unwrap();
        assert_eq!(empty.task.as_deref(), Some("TASK_DETECTION"));
        let object = &empty.task_outputs[0].get("detection").unwrap()["objects"][0];
        assert_eq!(object["category"], "");
        assert_eq!(object["score"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_newest_first_paginated() {
        let backend = MemoryBackend::default();
        for id in ["a1", "b2", "c3"] {
            backend.create_model_multipart(upload(id)).await.unwrap();
        }
        let page = backend.list_models(&ListQuery::page(2)).await.unwrap();
        assert_eq!(page.total_size, 3);
        let ids: Vec<&str> = page.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["c3", "b2"]);
        assert_eq!(page.next_page_token, "2");

        let page = backend
            .list_models(&ListQuery::page(2).with_token(page.next_page_token))
            .await
            .unwrap();
        assert_eq!(page.models.len(), 1);
        assert_eq!(page.models[0].id, "a1");
        assert!(page.next_page_token.is_empty());

        let err = backend
            .list_models(&ListQuery::default().with_token("zz"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), Some(400));
    }

    #[tokio::test]
    async fn test_definitions() {
        let backend = MemoryBackend::default();
        let basic = backend
            .list_model_definitions(&ListQuery::default().with_view(View::Basic))
            .await
            .unwrap();
        assert_eq!(basic.total_size, 3);
        assert_eq!(basic.model_definitions[0].id, "container");
        assert!(basic.model_definitions[0].model_spec.is_none());

        let full = backend
            .get_model_definition("github", View::Full)
            .await
            .unwrap();
        assert!(full.model_spec.is_some());
        assert!(backend
            .get_model_definition("nope", View::Basic)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
