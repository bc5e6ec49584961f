use anyhow::Result;
use modelcheck_client::{wait_model_state, wait_operation, StateTarget};
use modelcheck_common::validate::{base64_image, random_id};
use modelcheck_common::{
    CreateModelRequest, ImageInput, ModelState, TaskInput, TaskOutput, TriggerRequest,
};
use serde_json::Value;

use super::{create_from_fixture, expect_completed, teardown, Context, Scenario};
use crate::check::{CheckReport, Group};
use crate::fixtures::{
    CLS_NO_README_MODEL, DET_MODEL, DOG_IMG, EMPTY_RESPONSE_MODEL, KEYPOINT_MODEL,
    UNSPECIFIED_MODEL,
};

const DOG_URL: &str = "https://artifacts.instill.tech/imgs/dog.jpg";
const GITHUB_REPOSITORY: &str = "admin/model-mobilenetv2";
const GITHUB_TAG: &str = "v1.0-cpu";

/// Expected answer of one dummy model archive.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Classification,
    Detection,
    Keypoint,
    Unspecified,
    /// A detector whose single object has an empty category and zero score.
    Empty,
}

impl Expect {
    fn task(self) -> &'static str {
        match self {
            Expect::Classification => "TASK_CLASSIFICATION",
            Expect::Detection | Expect::Empty => "TASK_DETECTION",
            Expect::Keypoint => "TASK_KEYPOINT",
            Expect::Unspecified => "TASK_UNSPECIFIED",
        }
    }

    /// Input key of `task_inputs[]` for this task.
    fn input_key(self) -> &'static str {
        match self {
            Expect::Classification => "classification",
            Expect::Detection | Expect::Empty => "detection",
            Expect::Keypoint => "keypoint",
            Expect::Unspecified => "unspecified",
        }
    }

    /// `(output key, list field)` the first task output must carry.
    fn output_path(self) -> (&'static str, Option<&'static str>) {
        match self {
            Expect::Classification => ("classification", None),
            Expect::Detection | Expect::Empty => ("detection", Some("objects")),
            Expect::Keypoint => ("keypoint", Some("objects")),
            Expect::Unspecified => ("unspecified", Some("raw_outputs")),
        }
    }
}

const TASK_MODELS: [(&str, Expect); 5] = [
    (DET_MODEL, Expect::Detection),
    (KEYPOINT_MODEL, Expect::Keypoint),
    (UNSPECIFIED_MODEL, Expect::Unspecified),
    (EMPTY_RESPONSE_MODEL, Expect::Empty),
    (CLS_NO_README_MODEL, Expect::Classification),
];

/// Deploy one model per task fixture and check the shape of its answer.
pub(super) async fn infer_tasks(ctx: &mut Context<'_>, report: &mut CheckReport) -> Result<()> {
    let mut g = report.group(Scenario::InferTasks.name());
    for (fixture, expect) in TASK_MODELS {
        if let Err(err) = infer_one(ctx, &mut g, fixture, expect).await {
            tracing::warn!(fixture, error = %format!("{err:#}"), "task model check aborted");
            g.fail(format!("{fixture} runs to completion"), format!("{err:#}"));
        }
    }
    Ok(())
}

async fn infer_one(
    ctx: &mut Context<'_>,
    g: &mut Group<'_>,
    fixture: &str,
    expect: Expect,
) -> Result<()> {
    let backend = ctx.backend;
    let id = create_from_fixture(ctx, g, fixture).await?;
    let path = format!("{}/{id}", ctx.models_path());

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
    expect_completed(g, format!("GET {path}/watch reaches STATE_ONLINE"), online)?;

    let dog = base64_image(ctx.fixtures.get(DOG_IMG)?);
    let request = TriggerRequest {
        task_inputs: vec![TaskInput::new(
            expect.input_key(),
            serde_json::json!({ "image_base64": dog }),
        )],
    };
    let trigger = backend.trigger_model(&id, &request).await;
    g.check_ok(format!("POST {path}/trigger {fixture} response status is 200"), &trigger);
    if let Ok(resp) = &trigger {
        g.check(
            format!("POST {path}/trigger {fixture} task is {}", expect.task()),
            resp.task.as_deref() == Some(expect.task()),
        );
        g.check(
            format!("POST {path}/trigger {fixture} task_outputs.length is 1"),
            resp.task_outputs.len() == 1,
        );
        let (key, _) = expect.output_path();
        g.check(
            format!("POST {path}/trigger {fixture} task_outputs[0] has {key}"),
            resp.task_outputs.first().is_some_and(|out| output_ok(out, expect)),
        );
    }

    teardown(ctx, g, &id).await
}

/// Whether `out` has the fields a model of kind `expect` answers with.
fn output_ok(out: &TaskOutput, expect: Expect) -> bool {
    let (key, list) = expect.output_path();
    let Some(payload) = out.get(key) else {
        return false;
    };
    match (expect, list) {
        (Expect::Classification, _) => out
            .classification()
            .is_some_and(|c| c.category.is_some()),
        (Expect::Empty, Some(list)) => first_item(payload, list).is_some_and(|obj| {
            obj["category"] == "" && obj["score"].as_f64() == Some(0.0)
        }),
        (_, Some(list)) => payload.get(list).and_then(Value::as_array).is_some(),
        (_, None) => true,
    }
}

fn first_item<'v>(payload: &'v Value, list: &str) -> Option<&'v Value> {
    payload.get(list)?.as_array()?.first()
}

/// Create a model from a GitHub repository, deploy it and trigger it by URL.
/// Runs on the remote timeout since the server pulls the weights itself.
pub(super) async fn github_model(ctx: &mut Context<'_>, report: &mut CheckReport) -> Result<()> {
    let mut g = report.group(Scenario::GithubModel.name());
    let backend = ctx.backend;
    let remote = ctx.remote_policy;
    let id = random_id(10);
    let request = CreateModelRequest::github(id.clone(), GITHUB_REPOSITORY, GITHUB_TAG);

    let models = ctx.models_path();
    let op = backend.create_model(&request).await;
    g.check_ok(format!("POST {models} github response status is 2xx"), &op);
    let op = op?;
    ctx.track(&id);
    let created = wait_operation(backend, &op.name, &remote).await;
    expect_completed(&mut g, format!("create operation {} completes", op.name), created)?;

    let path = format!("{models}/{id}");
    let deploy = backend.deploy_model(&id).await;
    g.check_ok(format!("POST {path}/deploy response status is 2xx"), &deploy);
    deploy?;
    let online = wait_model_state(
        backend,
        &id,
        StateTarget::Is(ModelState::Online),
        &remote.tolerating_fetch_errors(),
    )
    .await;
    expect_completed(&mut g, format!("GET {path}/watch reaches STATE_ONLINE"), online)?;

    let request = TriggerRequest::classification([ImageInput::Url(DOG_URL.to_string())]);
    let trigger = backend.trigger_model(&id, &request).await;
    g.check_ok(format!("POST {path}/trigger url response status is 200"), &trigger);
    if let Ok(resp) = &trigger {
        g.check(
            format!("POST {path}/trigger url task_outputs.length is 1"),
            resp.task_outputs.len() == 1,
        );
        let classification = resp.task_outputs.first().and_then(TaskOutput::classification);
        g.check(
            format!("POST {path}/trigger url task_outputs[0].classification.category is set"),
            classification.as_ref().is_some_and(|c| c.category.is_some()),
        );
        g.check(
            format!("POST {path}/trigger url task_outputs[0].classification.score > 0"),
            classification
                .as_ref()
                .and_then(|c| c.score)
                .is_some_and(|s| s > 0.0),
        );
    }

    teardown(ctx, &mut g, &id).await
}
