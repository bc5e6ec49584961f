mod args;
mod client;
mod config;
mod output;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use modelcheck_client::{
    login, wait_model_state, wait_operation, ListQuery, MemoryBackend, MemoryBackendConfig,
    ModelBackend, PollOutcome, PollPolicy, StateTarget,
};
use modelcheck_common::telemetry::init_tracing;
use modelcheck_common::validate::{base64_image, random_id};
use modelcheck_common::{
    CreateModelRequest, FilePart, ImageInput, ModelPatch, ModelState, ModelUpload, Operation,
    TriggerRequest, View,
};
use modelcheck_suite::{run_suite, Fixtures, Hosts};

use crate::args::{Args, BackendKind, Command, DefinitionCommand, ModelCommand, OperationCommand};
use crate::client::rest_backend;
use crate::config::{build_hosts, build_suite_config};
use crate::output::{
    print_definition_detail, print_definitions, print_model_detail, print_models,
    print_operation, print_report, print_trigger, print_versions, print_watch,
};

fn view(full: bool) -> View {
    if full {
        View::Full
    } else {
        View::Basic
    }
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn policy(args: &Args, remote: bool) -> PollPolicy {
    let config = build_suite_config(args, ".".into());
    if remote {
        config.remote_policy()
    } else {
        config.local_policy()
    }
}

/// Print a poll outcome and turn anything but completion into an error.
fn report_wait<T>(what: &str, outcome: PollOutcome<T>) -> Result<T> {
    match outcome {
        PollOutcome::Completed(v) => {
            println!("✓ {what}");
            Ok(v)
        }
        PollOutcome::TimedOut { elapsed, .. } => bail!("{what}: timed out after {elapsed:?}"),
        PollOutcome::Failed(reason) => bail!("{what}: {reason}"),
    }
}

async fn wait_created(backend: &dyn ModelBackend, op: &Operation, policy: &PollPolicy) -> Result<()> {
    let done = report_wait(
        &format!("operation {} done", op.name),
        wait_operation(backend, &op.name, policy).await,
    )?;
    print_operation(&done);
    Ok(())
}

async fn trigger_images(
    backend: &dyn ModelBackend,
    id: &str,
    images: &[String],
    multipart: bool,
) -> Result<()> {
    let resp = if multipart {
        let mut files = Vec::with_capacity(images.len());
        for image in images {
            if is_url(image) {
                bail!("trigger-multipart takes files, not URLs: {image}");
            }
            let path = Path::new(image);
            let content = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {image}"))?;
            files.push(FilePart {
                file_name: file_name(path),
                content,
            });
        }
        backend.trigger_model_multipart(id, files).await?
    } else {
        let mut inputs = Vec::with_capacity(images.len());
        for image in images {
            if is_url(image) {
                inputs.push(ImageInput::Url(image.clone()));
            } else {
                let content = tokio::fs::read(image)
                    .await
                    .with_context(|| format!("reading {image}"))?;
                inputs.push(ImageInput::Base64(base64_image(&content)));
            }
        }
        backend
            .trigger_model(id, &TriggerRequest::classification(inputs))
            .await?
    };
    print_trigger(&resp);
    Ok(())
}

async fn run_model(args: &Args, backend: &dyn ModelBackend, cmd: &ModelCommand) -> Result<()> {
    match cmd {
        ModelCommand::List {
            page_size,
            page_token,
            full,
            admin,
        } => {
            let mut query = ListQuery::default().with_view(view(*full));
            query.page_size = *page_size;
            if let Some(token) = page_token {
                query = query.with_token(token.clone());
            }
            let resp = if *admin {
                backend.list_models_admin(&query).await?
            } else {
                backend.list_models(&query).await?
            };
            print_models(&resp);
        }
        ModelCommand::Get { id, full } => {
            print_model_detail(&backend.get_model(id, view(*full)).await?);
        }
        ModelCommand::Lookup { uid, full } => {
            print_model_detail(&backend.lookup_model(uid, view(*full)).await?);
        }
        ModelCommand::Create {
            id,
            file,
            description,
            definition,
            wait,
        } => {
            let content = tokio::fs::read(file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let id = id.clone().unwrap_or_else(|| random_id(10));
            let upload = ModelUpload {
                id: id.clone(),
                description: description.clone(),
                model_definition: definition.clone(),
                file_name: file_name(file),
                content,
            };
            let op = backend.create_model_multipart(upload).await?;
            println!("✓ Model '{id}' create requested: {}", op.name);
            if *wait {
                wait_created(backend, &op, &policy(args, false)).await?;
            }
        }
        ModelCommand::CreateGithub {
            id,
            repository,
            tag,
            wait,
        } => {
            let request = CreateModelRequest::github(id.clone(), repository, tag);
            let op = backend.create_model(&request).await?;
            println!("✓ Model '{id}' create requested from {repository}@{tag}: {}", op.name);
            if *wait {
                wait_created(backend, &op, &policy(args, true)).await?;
            }
        }
        ModelCommand::Update { id, description } => {
            let patch = ModelPatch {
                description: Some(description.clone()),
            };
            let model = backend.update_model(id, &patch).await?;
            println!("✓ Model '{id}' updated");
            print_model_detail(&model);
        }
        ModelCommand::Delete { id } => {
            backend.delete_model(id).await?;
            println!("✓ Model '{id}' deleted");
        }
        ModelCommand::Versions { id } => {
            print_versions(&backend.list_versions(id).await?);
        }
        ModelCommand::Deploy { id, wait } => {
            let resp = backend.deploy_model(id).await?;
            println!("✓ Model '{id}' deploy requested");
            if let Some(op) = &resp.operation {
                print_operation(op);
            }
            if *wait {
                let target = StateTarget::Is(ModelState::Online);
                let outcome = wait_model_state(backend, id, target, &policy(args, false)).await;
                report_wait(&format!("model '{id}' online"), outcome)?;
            }
        }
        ModelCommand::Undeploy { id, wait } => {
            let resp = backend.undeploy_model(id).await?;
            println!("✓ Model '{id}' undeploy requested");
            if let Some(op) = &resp.operation {
                print_operation(op);
            }
            if *wait {
                let target = StateTarget::Is(ModelState::Offline);
                let outcome = wait_model_state(backend, id, target, &policy(args, false)).await;
                report_wait(&format!("model '{id}' offline"), outcome)?;
            }
        }
        ModelCommand::Watch { id } => {
            print_watch(id, &backend.watch_model(id).await?);
        }
        ModelCommand::Trigger {
            id,
            images,
            multipart,
        } => {
            trigger_images(backend, id, images, *multipart).await?;
        }
        ModelCommand::Publish { id } => {
            let model = backend.publish_model(id).await?;
            println!("✓ Model '{id}' published");
            print_model_detail(&model);
        }
        ModelCommand::Unpublish { id } => {
            let model = backend.unpublish_model(id).await?;
            println!("✓ Model '{id}' unpublished");
            print_model_detail(&model);
        }
    }
    Ok(())
}

async fn run_operation(args: &Args, backend: &dyn ModelBackend, cmd: &OperationCommand) -> Result<()> {
    match cmd {
        OperationCommand::Get { name } => {
            print_operation(&backend.get_operation(name).await?);
        }
        OperationCommand::Wait { name } => {
            let outcome = wait_operation(backend, name, &policy(args, false)).await;
            print_operation(&report_wait(&format!("operation {name} done"), outcome)?);
        }
        OperationCommand::Cancel { name } => {
            backend.cancel_operation(name).await?;
            println!("✓ Operation {name} cancel requested");
        }
    }
    Ok(())
}

async fn run_definition(backend: &dyn ModelBackend, cmd: &DefinitionCommand) -> Result<()> {
    match cmd {
        DefinitionCommand::List { full } => {
            let query = ListQuery::default().with_view(view(*full));
            print_definitions(&backend.list_model_definitions(&query).await?);
        }
        DefinitionCommand::Get { id, full } => {
            print_definition_detail(&backend.get_model_definition(id, view(*full)).await?);
        }
    }
    Ok(())
}

async fn run_checks(args: &Args, hosts: &Hosts) -> Result<bool> {
    let Command::Run {
        backend: kind,
        scenarios,
        fixtures_root,
        synthetic_fixtures,
    } = &args.command
    else {
        bail!("not a run command");
    };

    let config = build_suite_config(args, fixtures_root.clone());
    let fixtures = if *synthetic_fixtures || *kind == BackendKind::Memory {
        Fixtures::synthetic()
    } else {
        let fixtures = Fixtures::load(&config.fixtures_root)?;
        if !fixtures.missing().is_empty() {
            tracing::warn!(missing = ?fixtures.missing(), "fixture files not found");
        }
        fixtures
    };
    tracing::info!(source = ?fixtures.source(), "fixtures ready");

    let report = match kind {
        BackendKind::Rest => {
            let backend = rest_backend(args, hosts)?;
            run_suite(&backend, &fixtures, &config, scenarios).await
        }
        BackendKind::Memory => {
            let backend = MemoryBackend::new(MemoryBackendConfig {
                namespace: args.namespace.clone(),
                ..Default::default()
            });
            run_suite(&backend, &fixtures, &config, scenarios).await
        }
    };
    print_report(&report);
    Ok(report.all_passed())
}

async fn run(args: &Args) -> Result<bool> {
    let hosts = build_hosts(args)?;
    tracing::debug!(mode = %args.mode, public = %hosts.public, "resolved hosts");

    if let Command::Run { .. } = &args.command {
        return run_checks(args, &hosts).await;
    }
    if let Command::Login = &args.command {
        let token = login(&hosts.mgmt, &args.user, &args.password).await?;
        println!("{token}");
        return Ok(true);
    }

    let backend = rest_backend(args, &hosts)?;
    match &args.command {
        Command::Health => {
            backend.health().await?;
            println!("✓ Backend at {} is healthy", hosts.public);
        }
        Command::Model { subcommand } => run_model(args, &backend, subcommand).await?,
        Command::Operation { subcommand } => run_operation(args, &backend, subcommand).await?,
        Command::Definition { subcommand } => run_definition(&backend, subcommand).await?,
        Command::Run { .. } | Command::Login => {}
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let provider = init_tracing(
        "modelcheck",
        args.otlp_url.as_deref(),
        args.otlp_token.as_deref(),
    );

    let code = match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("✗ {err:#}");
            ExitCode::FAILURE
        }
    };

    if let Some(provider) = provider {
        if let Err(err) = provider.shutdown() {
            eprintln!("failed to flush traces: {err}");
        }
    }
    code
}
