use anyhow::Result;
use modelcheck_client::ListQuery;
use modelcheck_common::validate::random_id;
use modelcheck_common::{ModelPatch, View, Visibility};

use super::{create_from_fixture, teardown, Context, Scenario};
use crate::check::CheckReport;
use crate::fixtures::CLS_MODEL;

/// Two models, listed one per page: newest first, then the older one through
/// `page_token`.
pub(super) async fn list_pagination(
    ctx: &mut Context<'_>,
    report: &mut CheckReport,
) -> Result<()> {
    let mut g = report.group(Scenario::ListPagination.name());
    let backend = ctx.backend;
    let older = create_from_fixture(ctx, &mut g, CLS_MODEL).await?;
    let newer = create_from_fixture(ctx, &mut g, CLS_MODEL).await?;
    let path = ctx.models_path();

    let first = backend.list_models(&ListQuery::page(1)).await;
    g.check_ok(format!("GET {path}?page_size=1 response status is 200"), &first);
    let first = first?;
    g.check(
        format!("GET {path}?page_size=1 response models.length is 1"),
        first.models.len() == 1,
    );
    g.check(
        format!("GET {path}?page_size=1 response models[0] is the newest model"),
        first.models.first().is_some_and(|m| m.id == newer),
    );
    g.check(
        format!("GET {path}?page_size=1 response next_page_token is set"),
        !first.next_page_token.is_empty(),
    );
    g.check(
        format!("GET {path}?page_size=1 response total_size >= 2"),
        first.total_size >= 2,
    );

    let second = backend
        .list_models(&ListQuery::page(1).with_token(first.next_page_token.clone()))
        .await;
    g.check_ok(
        format!("GET {path}?page_size=1&page_token=... response status is 200"),
        &second,
    );
    if let Ok(second) = &second {
        g.check(
            format!("GET {path}?page_size=1&page_token=... response models[0] is the older model"),
            second.models.first().is_some_and(|m| m.id == older),
        );
    }

    let full = backend
        .list_models(&ListQuery::default().with_view(View::Full))
        .await;
    g.check_ok(format!("GET {path}?view=VIEW_FULL response status is 200"), &full);
    if let Ok(full) = &full {
        let ours: Vec<_> = full
            .models
            .iter()
            .filter(|m| m.id == older || m.id == newer)
            .collect();
        g.check(
            format!("GET {path}?view=VIEW_FULL response lists both models"),
            ours.len() == 2,
        );
        g.check(
            format!("GET {path}?view=VIEW_FULL response model.configuration is set"),
            ours.iter().all(|m| m.configuration.is_some()),
        );
    }

    let admin = backend.list_models_admin(&ListQuery::page(1)).await;
    g.check_ok("GET /v1alpha/admin/models?page_size=1 response status is 200", &admin);
    if let Ok(admin) = &admin {
        g.check(
            "GET /v1alpha/admin/models?page_size=1 response models.length is 1",
            admin.models.len() == 1,
        );
    }

    let model = backend.get_model(&newer, View::Basic).await?;
    if let Some(uid) = model.uid.as_deref() {
        let looked_up = backend.lookup_model(uid, View::Full).await;
        g.check_ok(
            format!("GET /v1alpha/admin/models/{uid}/lookUp response status is 200"),
            &looked_up,
        );
        if let Ok(looked_up) = &looked_up {
            g.check(
                format!("GET /v1alpha/admin/models/{uid}/lookUp response model.id matches"),
                looked_up.id == newer,
            );
        }
    }

    teardown(ctx, &mut g, &older).await?;
    teardown(ctx, &mut g, &newer).await
}

pub(super) async fn update(ctx: &mut Context<'_>, report: &mut CheckReport) -> Result<()> {
    let mut g = report.group(Scenario::Update.name());
    let backend = ctx.backend;
    let id = create_from_fixture(ctx, &mut g, CLS_MODEL).await?;
    let path = format!("{}/{id}", ctx.models_path());

    let description = random_id(20);
    let patch = ModelPatch {
        description: Some(description.clone()),
    };
    let updated = backend.update_model(&id, &patch).await;
    g.check_ok(format!("PATCH {path} response status is 200"), &updated);
    if let Ok(updated) = &updated {
        g.check(
            format!("PATCH {path} response model.description is updated"),
            updated.description.as_deref() == Some(description.as_str()),
        );
        g.check(format!("PATCH {path} response model.id is unchanged"), updated.id == id);
    }

    let fetched = backend.get_model(&id, View::Basic).await;
    g.check(
        format!("GET {path} after PATCH returns the new description"),
        fetched
            .as_ref()
            .is_ok_and(|m| m.description.as_deref() == Some(description.as_str())),
    );

    let cleared = backend
        .update_model(
            &id,
            &ModelPatch {
                description: Some(String::new()),
            },
        )
        .await;
    g.check_ok(format!("PATCH {path} with empty description response status is 200"), &cleared);
    if let Ok(cleared) = &cleared {
        g.check(
            format!("PATCH {path} with empty description response model.description is empty"),
            cleared.description.as_deref().unwrap_or("").is_empty(),
        );
    }

    teardown(ctx, &mut g, &id).await
}

pub(super) async fn publish(ctx: &mut Context<'_>, report: &mut CheckReport) -> Result<()> {
    let mut g = report.group(Scenario::Publish.name());
    let backend = ctx.backend;
    let id = create_from_fixture(ctx, &mut g, CLS_MODEL).await?;

    let published = backend.publish_model(&id).await;
    g.check_ok(format!("POST /v1alpha/models/{id}:publish response status is 200"), &published);
    if let Ok(model) = &published {
        g.check(
            format!("POST /v1alpha/models/{id}:publish response model.visibility is VISIBILITY_PUBLIC"),
            model.visibility == Some(Visibility::Public),
        );
    }

    let unpublished = backend.unpublish_model(&id).await;
    g.check_ok(
        format!("POST /v1alpha/models/{id}:unpublish response status is 200"),
        &unpublished,
    );
    if let Ok(model) = &unpublished {
        g.check(
            format!("POST /v1alpha/models/{id}:unpublish response model.visibility is VISIBILITY_PRIVATE"),
            model.visibility == Some(Visibility::Private),
        );
    }

    let unknown = random_id(10);
    let err = backend.publish_model(&unknown).await;
    g.check(
        format!("POST /v1alpha/models/{unknown}:publish response status is 404"),
        err.as_ref().err().is_some_and(|e| e.is_not_found()),
    );
    let err = backend.unpublish_model(&unknown).await;
    g.check(
        format!("POST /v1alpha/models/{unknown}:unpublish response status is 404"),
        err.as_ref().err().is_some_and(|e| e.is_not_found()),
    );

    teardown(ctx, &mut g, &id).await
}
