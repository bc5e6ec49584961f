mod definitions;
mod inference;
mod invariants;
mod lifecycle;
mod query;

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context as _, Result};
use modelcheck_client::{
    wait_model_state, wait_operation, wait_until, ListQuery, ModelBackend, PollOutcome,
    PollPolicy, StateTarget, Verdict,
};
use modelcheck_common::validate::random_id;
use modelcheck_common::{ModelState, ModelUpload};

use crate::check::{CheckReport, Group};
use crate::config::SuiteConfig;
use crate::fixtures::Fixtures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    Health,
    CreateDeployTrigger,
    InferTasks,
    GithubModel,
    ModelDefinitions,
    Invariants,
    ListPagination,
    Update,
    Publish,
    CancelOperation,
    Cleanup,
}

impl Scenario {
    /// Run order; `Cleanup` goes last so it sees every model left behind.
    pub const ALL: [Scenario; 11] = [
        Scenario::Health,
        Scenario::CreateDeployTrigger,
        Scenario::InferTasks,
        Scenario::GithubModel,
        Scenario::ModelDefinitions,
        Scenario::Invariants,
        Scenario::ListPagination,
        Scenario::Update,
        Scenario::Publish,
        Scenario::CancelOperation,
        Scenario::Cleanup,
    ];

    /// What a run without explicit scenarios executes: everything except
    /// `github-model`, which pulls weights from GitHub and may take an hour.
    pub const DEFAULT: [Scenario; 10] = [
        Scenario::Health,
        Scenario::CreateDeployTrigger,
        Scenario::InferTasks,
        Scenario::ModelDefinitions,
        Scenario::Invariants,
        Scenario::ListPagination,
        Scenario::Update,
        Scenario::Publish,
        Scenario::CancelOperation,
        Scenario::Cleanup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Health => "health",
            Scenario::CreateDeployTrigger => "create-deploy-trigger",
            Scenario::InferTasks => "infer-tasks",
            Scenario::GithubModel => "github-model",
            Scenario::ModelDefinitions => "model-definitions",
            Scenario::Invariants => "invariants",
            Scenario::ListPagination => "list-pagination",
            Scenario::Update => "update",
            Scenario::Publish => "publish",
            Scenario::CancelOperation => "cancel-operation",
            Scenario::Cleanup => "cleanup",
        }
    }

    async fn run(self, ctx: &mut Context<'_>, report: &mut CheckReport) -> Result<()> {
        match self {
            Scenario::Health => {
                let result = ctx.backend.health().await;
                report
                    .group(self.name())
                    .check_ok("GET /v1alpha/health/model response status is 200", &result);
                Ok(())
            }
            Scenario::CreateDeployTrigger => lifecycle::create_deploy_trigger(ctx, report).await,
            Scenario::InferTasks => inference::infer_tasks(ctx, report).await,
            Scenario::GithubModel => inference::github_model(ctx, report).await,
            Scenario::ModelDefinitions => definitions::model_definitions(ctx, report).await,
            Scenario::Invariants => invariants::invariants(ctx, report).await,
            Scenario::ListPagination => query::list_pagination(ctx, report).await,
            Scenario::Update => query::update(ctx, report).await,
            Scenario::Publish => query::publish(ctx, report).await,
            Scenario::CancelOperation => lifecycle::cancel_operation(ctx, report).await,
            Scenario::Cleanup => cleanup(ctx, report).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Scenario::ALL.iter().find(|sc| sc.name() == s) {
            Some(sc) => Ok(*sc),
            None => bail!(
                "unknown scenario '{s}', expected one of: {}",
                Scenario::ALL.map(Scenario::name).join(", ")
            ),
        }
    }
}

/// State shared by the scenarios of one run.
pub struct Context<'a> {
    pub backend: &'a dyn ModelBackend,
    pub fixtures: &'a Fixtures,
    /// Locally uploaded models.
    pub policy: PollPolicy,
    /// GitHub-backed models.
    pub remote_policy: PollPolicy,
    /// Models created and not yet deleted.
    created: Vec<String>,
    /// Models this run deleted; none may show up in later lists.
    deleted: Vec<String>,
}

impl<'a> Context<'a> {
    pub fn new(backend: &'a dyn ModelBackend, fixtures: &'a Fixtures, config: &SuiteConfig) -> Self {
        Self {
            backend,
            fixtures,
            policy: config.local_policy(),
            remote_policy: config.remote_policy(),
            created: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn created(&self) -> &[String] {
        &self.created
    }

    pub fn deleted(&self) -> &[String] {
        &self.deleted
    }

    fn track(&mut self, id: &str) {
        self.created.push(id.to_string());
    }

    fn forget(&mut self, id: &str) {
        self.created.retain(|c| c != id);
        self.deleted.push(id.to_string());
    }

    fn models_path(&self) -> String {
        format!("/v1alpha/namespaces/{}/models", self.backend.namespace())
    }

    /// Policy for `watch` polls. The endpoint can 404 for a moment after a
    /// create, so fetch errors are retried until the deadline.
    fn watch_policy(&self) -> PollPolicy {
        self.policy.tolerating_fetch_errors()
    }
}

/// Multipart upload of `fixture` under a fresh random id.
fn fixture_upload(ctx: &Context<'_>, fixture: &str) -> Result<ModelUpload> {
    Ok(ModelUpload {
        id: random_id(10),
        description: Some(random_id(20)),
        model_definition: "model-definitions/container".to_string(),
        file_name: fixture.to_string(),
        content: ctx.fixtures.get(fixture)?.to_vec(),
    })
}

/// Upload `fixture` under a fresh random id and wait for the create operation.
/// Returns the model id once the model exists.
async fn create_from_fixture(
    ctx: &mut Context<'_>,
    g: &mut Group<'_>,
    fixture: &str,
) -> Result<String> {
    let upload = fixture_upload(ctx, fixture)?;
    let id = upload.id.clone();

    let path = format!("{}/multipart", ctx.models_path());
    let op = ctx.backend.create_model_multipart(upload).await;
    g.check_ok(format!("POST {path} response status is 2xx"), &op);
    let op = op.with_context(|| format!("creating model from {fixture}"))?;
    ctx.track(&id);
    g.check(
        format!("POST {path} response operation.name is set"),
        !op.name.is_empty(),
    );

    let outcome = wait_operation(ctx.backend, &op.name, &ctx.policy).await;
    expect_completed(g, format!("create operation {} completes", op.name), outcome)?;
    Ok(id)
}

/// Record a check for a poll outcome and turn anything but `Completed` into an error.
fn expect_completed<T>(g: &mut Group<'_>, name: String, outcome: PollOutcome<T>) -> Result<T> {
    match outcome {
        PollOutcome::Completed(v) => {
            g.check(name, true);
            Ok(v)
        }
        PollOutcome::TimedOut { elapsed, .. } => {
            g.fail(name.clone(), format!("timed out after {elapsed:?}"));
            bail!("{name}: timed out after {elapsed:?}")
        }
        PollOutcome::Failed(reason) => {
            g.fail(name.clone(), &reason);
            bail!("{name}: {reason}")
        }
    }
}

/// Wait for a model to leave any transition, then delete it. The delete is
/// retried while the backend answers 422 (still transitioning).
async fn teardown(ctx: &mut Context<'_>, g: &mut Group<'_>, id: &str) -> Result<()> {
    let backend = ctx.backend;
    let settled = wait_model_state(
        backend,
        id,
        StateTarget::IsNot(ModelState::Unspecified),
        &ctx.watch_policy(),
    )
    .await;
    let name = format!("model {id} settles before delete");
    match settled {
        PollOutcome::Completed(_) => {
            g.check(name, true);
        }
        PollOutcome::TimedOut { elapsed, .. } => {
            g.fail(name, format!("timed out after {elapsed:?}"));
        }
        PollOutcome::Failed(reason) => {
            g.fail(name, reason);
        }
    }

    let deleted = wait_until(
        &ctx.policy,
        move || async move {
            match backend.delete_model(id).await {
                Ok(()) => Ok(true),
                Err(err) if err.http_status() == Some(422) => {
                    tracing::debug!(model_id = %id, "model busy, retrying delete");
                    Ok(false)
                }
                Err(err) => Err(err),
            }
        },
        |done: &bool| if *done { Verdict::Done } else { Verdict::Continue },
    )
    .await;
    let path = format!("{}/{id}", ctx.models_path());
    expect_completed(g, format!("DELETE {path} response status is 204"), deleted)?;
    ctx.forget(id);
    Ok(())
}

/// Every model id visible in the namespace, following page tokens.
async fn list_all_ids(backend: &dyn ModelBackend) -> Result<Vec<String>> {
    const MAX_PAGES: usize = 1_000;
    let mut ids = Vec::new();
    let mut token = String::new();
    for _ in 0..MAX_PAGES {
        let page = backend
            .list_models(&ListQuery::page(100).with_token(token))
            .await?;
        ids.extend(page.models.into_iter().map(|m| m.id));
        if page.next_page_token.is_empty() {
            return Ok(ids);
        }
        token = page.next_page_token;
    }
    bail!("model list did not end after {MAX_PAGES} pages")
}

async fn cleanup(ctx: &mut Context<'_>, report: &mut CheckReport) -> Result<()> {
    let mut g = report.group(Scenario::Cleanup.name());
    for id in ctx.created.clone() {
        if let Err(err) = teardown(ctx, &mut g, &id).await {
            tracing::warn!(model_id = %id, error = %err, "cleanup failed");
        }
    }

    let listed = list_all_ids(ctx.backend).await;
    g.check_ok("list models after cleanup succeeds", &listed);
    let listed = listed?;
    let leaked: Vec<&String> = ctx.deleted.iter().filter(|id| listed.contains(id)).collect();
    if leaked.is_empty() {
        g.check("deleted models are absent from the list", true);
    } else {
        g.fail("deleted models are absent from the list", format!("{leaked:?}"));
    }
    Ok(())
}

/// Run `scenarios` in the given order against `backend`. A scenario that
/// aborts early records a failed check and the run continues.
pub async fn run_scenarios(
    backend: &dyn ModelBackend,
    fixtures: &Fixtures,
    config: &SuiteConfig,
    scenarios: &[Scenario],
) -> CheckReport {
    let mut report = CheckReport::new();
    let mut ctx = Context::new(backend, fixtures, config);
    for &scenario in scenarios {
        tracing::info!(scenario = %scenario, "running scenario");
        if let Err(err) = scenario.run(&mut ctx, &mut report).await {
            tracing::warn!(scenario = %scenario, error = %format!("{err:#}"), "scenario aborted");
            report
                .group(scenario.name())
                .fail("scenario runs to completion", format!("{err:#}"));
        }
    }
    if !ctx.created.is_empty() {
        tracing::warn!(models = ?ctx.created, "models left behind");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_roundtrip() {
        for sc in Scenario::ALL {
            assert_eq!(sc.name().parse::<Scenario>().unwrap(), sc);
        }
        let err = "bogus".parse::<Scenario>().unwrap_err().to_string();
        assert!(err.contains("create-deploy-trigger"), "{err}");
        assert_eq!(Scenario::ALL.last(), Some(&Scenario::Cleanup));
        assert_eq!(Scenario::DEFAULT.last(), Some(&Scenario::Cleanup));
        assert!(!Scenario::DEFAULT.contains(&Scenario::GithubModel));
        assert_eq!(Scenario::DEFAULT.len() + 1, Scenario::ALL.len());
    }
}
