use anyhow::Result;
use modelcheck_client::ListQuery;
use modelcheck_common::View;

use super::{Context, Scenario};
use crate::check::CheckReport;

pub(super) async fn model_definitions(
    ctx: &mut Context<'_>,
    report: &mut CheckReport,
) -> Result<()> {
    let mut g = report.group(Scenario::ModelDefinitions.name());
    let backend = ctx.backend;

    let basic = backend
        .list_model_definitions(&ListQuery::default().with_view(View::Basic))
        .await;
    g.check_ok(
        "GET /v1alpha/model-definitions?view=VIEW_BASIC response status is 200",
        &basic,
    );
    let basic = basic?;
    g.check(
        "GET /v1alpha/model-definitions?view=VIEW_BASIC response total_size is 3",
        basic.total_size == 3,
    );
    let first = basic.model_definitions.first();
    g.check(
        "GET /v1alpha/model-definitions?view=VIEW_BASIC response model_definitions[0].id is container",
        first.is_some_and(|d| d.id == "container"),
    );
    g.check(
        "GET /v1alpha/model-definitions?view=VIEW_BASIC response model_definitions[0].model_spec is null",
        first.is_some_and(|d| d.model_spec.is_none()),
    );
    g.check(
        "GET /v1alpha/model-definitions?view=VIEW_BASIC response names are model-definitions/{id}",
        basic
            .model_definitions
            .iter()
            .all(|d| d.name == format!("model-definitions/{}", d.id)),
    );

    let full = backend
        .list_model_definitions(&ListQuery::default().with_view(View::Full))
        .await;
    g.check_ok(
        "GET /v1alpha/model-definitions?view=VIEW_FULL response status is 200",
        &full,
    );
    let full = full?;
    g.check(
        "GET /v1alpha/model-definitions?view=VIEW_FULL response model_definitions[0].model_spec is not null",
        full.model_definitions
            .first()
            .is_some_and(|d| d.model_spec.is_some()),
    );

    let one = backend.get_model_definition("container", View::Full).await;
    g.check_ok(
        "GET /v1alpha/model-definitions/container response status is 200",
        &one,
    );
    if let Ok(one) = &one {
        g.check(
            "GET /v1alpha/model-definitions/container response id is container",
            one.id == "container",
        );
    }

    let missing = backend.get_model_definition("non-existent", View::Basic).await;
    g.check(
        "GET /v1alpha/model-definitions/non-existent response status is 404",
        missing.as_ref().err().is_some_and(|e| e.is_not_found()),
    );
    Ok(())
}
