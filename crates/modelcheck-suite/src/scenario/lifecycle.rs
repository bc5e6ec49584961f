use anyhow::Result;
use modelcheck_client::{wait_model_state, wait_operation, StateTarget};
use modelcheck_common::validate::{base64_image, is_uuid, is_valid_creator, is_valid_owner};
use modelcheck_common::{check_canonical_name, FilePart, ImageInput, ModelState, TriggerRequest, View};

use super::{create_from_fixture, expect_completed, fixture_upload, teardown, Context, Scenario};
use crate::check::CheckReport;
use crate::fixtures::{CAT_IMG, CLS_MODEL, DOG_IMG};

const DOG_URL: &str = "https://artifacts.instill.tech/imgs/dog.jpg";

/// Upload, deploy, trigger and delete one classification model.
pub(super) async fn create_deploy_trigger(
    ctx: &mut Context<'_>,
    report: &mut CheckReport,
) -> Result<()> {
    let mut g = report.group(Scenario::CreateDeployTrigger.name());
    let backend = ctx.backend;
    let id = create_from_fixture(ctx, &mut g, CLS_MODEL).await?;
    let path = format!("{}/{id}", ctx.models_path());

    let model = backend.get_model(&id, View::Basic).await;
    g.check_ok(format!("GET {path} response status is 200"), &model);
    let model = model?;
    g.check(
        format!("GET {path} response model.state is STATE_OFFLINE"),
        model.state == Some(ModelState::Offline),
    );
    g.check(
        format!("GET {path} response model.name is canonical"),
        check_canonical_name(&model.name, &id).is_ok(),
    );
    g.check(
        format!("GET {path} response model.uid is a uuid"),
        model.uid.as_deref().is_some_and(is_uuid),
    );
    g.check(
        format!("GET {path} response model.owner_name is valid"),
        model.owner_name.as_deref().is_some_and(is_valid_owner),
    );
    if let Some(creator) = model.creator.as_deref() {
        g.check(
            format!("GET {path} response model.creator is a user"),
            is_valid_creator(creator),
        );
    }
    g.check(
        format!("GET {path} response model.configuration is null in VIEW_BASIC"),
        model.configuration.is_none(),
    );
    g.check(
        format!("GET {path} response model.create_time is set"),
        model.create_time.is_some(),
    );

    let deploy = backend.deploy_model(&id).await;
    g.check_ok(format!("POST {path}/deploy response status is 2xx"), &deploy);
    deploy?;
    let online = wait_model_state(
        backend,
        &id,
        StateTarget::Is(ModelState::Online),
        &ctx.watch_policy(),
    )
    .await;
    expect_completed(&mut g, format!("GET {path}/watch reaches STATE_ONLINE"), online)?;

    let fixtures = ctx.fixtures;
    let dog = fixtures.get(DOG_IMG)?;
    let request = TriggerRequest::classification([ImageInput::Base64(base64_image(dog))]);
    let first = backend.trigger_model(&id, &request).await;
    g.check_ok(format!("POST {path}/trigger response status is 200"), &first);
    let first = first?;
    let classification = first
        .task_outputs
        .first()
        .and_then(|out| out.classification());
    g.check(
        format!("POST {path}/trigger task_outputs[0].classification.category is set"),
        classification.as_ref().is_some_and(|c| c.category.is_some()),
    );
    g.check(
        format!("POST {path}/trigger task_outputs[0].classification.score > 0"),
        classification
            .as_ref()
            .and_then(|c| c.score)
            .is_some_and(|s| s > 0.0),
    );

    let second = backend.trigger_model(&id, &request).await;
    g.check_ok(format!("POST {path}/trigger repeated response status is 200"), &second);
    if let Ok(second) = &second {
        g.check(
            format!("POST {path}/trigger repeated output has the same shape"),
            second.shape() == first.shape(),
        );
    }

    let by_url = TriggerRequest::classification([
        ImageInput::Url(DOG_URL.to_string()),
        ImageInput::Base64(base64_image(dog)),
    ]);
    let mixed = backend.trigger_model(&id, &by_url).await;
    g.check_ok(format!("POST {path}/trigger url + base64 response status is 200"), &mixed);
    if let Ok(mixed) = &mixed {
        g.check(
            format!("POST {path}/trigger url + base64 task_outputs.length is 2"),
            mixed.task_outputs.len() == 2,
        );
    }

    let files = vec![
        FilePart {
            file_name: DOG_IMG.to_string(),
            content: dog.to_vec(),
        },
        FilePart {
            file_name: CAT_IMG.to_string(),
            content: fixtures.get(CAT_IMG)?.to_vec(),
        },
    ];
    let multipart = backend.trigger_model_multipart(&id, files).await;
    g.check_ok(
        format!("POST {path}/trigger-multipart response status is 200"),
        &multipart,
    );
    if let Ok(multipart) = &multipart {
        g.check(
            format!("POST {path}/trigger-multipart task_outputs.length is 2"),
            multipart.task_outputs.len() == 2,
        );
        g.check(
            format!("POST {path}/trigger-multipart task matches the model"),
            multipart.task == first.task,
        );
    }

    teardown(ctx, &mut g, &id).await
}

/// Upload a model and cancel its create operation straight away. Only the
/// cancel call's status is asserted; the model is torn down if it survived.
pub(super) async fn cancel_operation(
    ctx: &mut Context<'_>,
    report: &mut CheckReport,
) -> Result<()> {
    let mut g = report.group(Scenario::CancelOperation.name());
    let backend = ctx.backend;
    let upload = fixture_upload(ctx, CLS_MODEL)?;
    let id = upload.id.clone();

    let path = format!("{}/multipart", ctx.models_path());
    let op = backend.create_model_multipart(upload).await;
    g.check_ok(format!("POST {path} response status is 2xx"), &op);
    let op = op?;
    ctx.track(&id);

    let cancel = backend.cancel_operation(&op.name).await;
    g.check_ok(
        format!("POST /v1alpha/{}/cancel response status is 200", op.name),
        &cancel,
    );

    let outcome = wait_operation(backend, &op.name, &ctx.policy).await;
    tracing::info!(operation = %op.name, outcome = outcome.label(), "cancelled create operation");

    match backend.get_model(&id, View::Basic).await {
        Err(err) if err.is_not_found() => {
            ctx.forget(&id);
            Ok(())
        }
        _ => teardown(ctx, &mut g, &id).await,
    }
}
