use anyhow::{anyhow, Result};
use modelcheck_client::wait_operation;
use modelcheck_common::names::{
    check_canonical_version_name, last_segment, legacy_model_id, ModelName,
};
use modelcheck_common::validate::random_id;
use modelcheck_common::{CreateModelRequest, View, Visibility};

use super::{expect_completed, teardown, Context, Scenario};
use crate::check::CheckReport;

/// `name` is the canonical identifier and `id` is its trailing segment, for
/// models and for their versions.
pub(super) async fn invariants(ctx: &mut Context<'_>, report: &mut CheckReport) -> Result<()> {
    let mut g = report.group(Scenario::Invariants.name());
    let backend = ctx.backend;
    let namespace = backend.namespace().to_string();
    let suffix = random_id(8);

    // The server assigns the id.
    let request = CreateModelRequest {
        display_name: Some(format!("Test Invariant Model {suffix}")),
        description: Some("Model for resource name invariants".to_string()),
        model_definition: "model-definitions/container".to_string(),
        visibility: Some(Visibility::Private),
        region: Some("REGION_GCP_EUROPE_WEST4".to_string()),
        hardware: Some("CPU".to_string()),
        task: Some("TASK_CLASSIFICATION".to_string()),
        configuration: serde_json::json!({}),
        ..Default::default()
    };
    let path = ctx.models_path();
    let op = backend.create_model(&request).await;
    g.check_ok(format!("POST {path} response status is 2xx"), &op);
    let op = op?;

    let mut id = op.response_id().map(str::to_string);
    if let Some(id) = &id {
        ctx.track(id);
    }
    let done = wait_operation(backend, &op.name, &ctx.policy).await;
    let done = expect_completed(&mut g, format!("create operation {} completes", op.name), done)?;
    if id.is_none() {
        id = done.response_id().map(str::to_string);
        if let Some(id) = &id {
            ctx.track(id);
        }
    }
    let id = id.ok_or_else(|| anyhow!("create operation {} carries no model id", op.name))?;

    let model = backend.get_model(&id, View::Basic).await;
    g.check_ok(format!("GET {path}/{id} by canonical id response status is 200"), &model);
    let model = model?;
    g.check(
        format!("GET {path}/{id} by canonical id returns that model"),
        model.id == id,
    );
    g.check(
        "name contains namespace",
        model.name.contains(&format!("namespaces/{namespace}")),
    );
    g.check("name contains resource type", model.name.contains("/models/"));
    g.check("name ends with id", model.name.ends_with(&id));
    match name_format_error(&model.name) {
        None => g.check("name format matches namespaces/{namespace}/models/{model}", true),
        Some(detail) => g.fail("name format matches namespaces/{namespace}/models/{model}", detail),
    };
    g.check("id equals last segment of name", last_segment(&model.name) == id);

    let unknown = backend.get_model("non-existent-model-id", View::Basic).await;
    g.check(
        format!("GET {path}/non-existent-model-id response status is 404 or 400"),
        unknown
            .as_ref()
            .err()
            .and_then(|e| e.http_status())
            .is_some_and(|s| s == 404 || s == 400),
    );

    let versions = backend.list_versions(&id).await;
    g.check_ok(format!("GET {path}/{id}/versions response status is 200"), &versions);
    if let Some(version) = versions.ok().and_then(|v| v.versions.into_iter().next()) {
        g.check(
            "version name contains model path",
            version.name.contains(&format!("models/{id}")),
        );
        g.check("version name contains versions segment", version.name.contains("/versions/"));
        g.check("version name ends with version id", version.name.ends_with(&version.id));
        g.check(
            "version name format matches .../models/{model}/versions/{version}",
            check_canonical_version_name(&version.name, &version.id).is_ok(),
        );
    }

    teardown(ctx, &mut g, &id).await
}

/// Why `name` is not a canonical model name, or `None` when it is. Names in
/// the pre-namespace layout are called out so a stale server is easy to spot.
fn name_format_error(name: &str) -> Option<String> {
    let err = ModelName::parse(name).err()?;
    Some(match legacy_model_id(name) {
        Some(id) => format!("{err} (legacy name format for model {id})"),
        None => err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_format_error() {
        assert_eq!(name_format_error("namespaces/admin/models/abc"), None);

        let legacy = name_format_error("users/admin/models/abc").unwrap();
        assert!(legacy.contains("legacy name format for model abc"), "{legacy}");

        let other = name_format_error("namespaces/admin/pipelines/abc").unwrap();
        assert!(!other.contains("legacy"), "{other}");
    }
}
