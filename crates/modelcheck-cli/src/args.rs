use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use modelcheck_suite::{Mode, Scenario};

#[derive(Debug, Parser)]
#[command(name = "modelcheck")]
#[command(about = "Conformance checks and client for the model backend", long_about = None)]
pub struct Args {
    /// Protocol used to reach the API gateway
    #[arg(long, env = "API_GATEWAY_PROTOCOL", default_value = "http")]
    pub protocol: String,

    /// API gateway host:port; public and private traffic go through it when set
    #[arg(long, env = "API_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Backend host when no gateway is used
    #[arg(long, env = "HOSTNAME", default_value = "localhost")]
    pub hostname: String,

    /// Host layout: localhost, api-gateway or internal
    #[arg(long, env = "MODE", default_value = "localhost")]
    pub mode: Mode,

    /// Namespace id models are created in
    #[arg(long, env = "MODELCHECK_NAMESPACE", default_value = "admin")]
    pub namespace: String,

    /// Basic auth user
    #[arg(long, env = "MODELCHECK_USER", default_value = "admin")]
    pub user: String,

    /// Basic auth password
    #[arg(long, env = "MODELCHECK_PASSWORD", default_value = "password", hide_env_values = true)]
    pub password: String,

    /// Access token (Authorization: Bearer); takes precedence over basic auth
    #[arg(long, env = "MODELCHECK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// User uid sent in the Instill-User-Uid header instead of credentials
    #[arg(long, env = "MODELCHECK_JWT_SUB")]
    pub jwt_sub: Option<String>,

    #[arg(
        long,
        env = "MODELCHECK_POLL_INTERVAL_MS",
        default_value_t = 1_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,

    /// Timeout for operations on uploaded models
    #[arg(long, env = "MODELCHECK_POLL_TIMEOUT_MS", default_value_t = 120_000)]
    pub poll_timeout_ms: u64,

    /// Timeout for operations on GitHub-backed models
    #[arg(long, env = "MODELCHECK_REMOTE_TIMEOUT_MS", default_value_t = 3_600_000)]
    pub remote_timeout_ms: u64,

    /// OTLP/HTTP endpoint for trace export
    #[arg(long, env = "MODELCHECK_OTLP_URL")]
    pub otlp_url: Option<String>,

    #[arg(long, env = "MODELCHECK_OTLP_TOKEN", hide_env_values = true)]
    pub otlp_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the backend health endpoint
    Health,
    /// Log in on the management service and print the access token
    Login,
    /// Model management
    Model {
        #[command(subcommand)]
        subcommand: ModelCommand,
    },
    /// Long-running operations
    Operation {
        #[command(subcommand)]
        subcommand: OperationCommand,
    },
    /// Model definitions
    Definition {
        #[command(subcommand)]
        subcommand: DefinitionCommand,
    },
    /// Run the conformance scenarios
    Run {
        /// Backend to run against
        #[arg(long, value_enum, default_value_t = BackendKind::Rest)]
        backend: BackendKind,

        /// Scenario to run (repeatable; default: all)
        #[arg(long = "scenario")]
        scenarios: Vec<Scenario>,

        /// Directory holding integration-test/data
        #[arg(long, env = "TEST_FOLDER_ABS_PATH", default_value = ".")]
        fixtures_root: PathBuf,

        /// Use built-in stand-ins instead of loading fixture files
        #[arg(long)]
        synthetic_fixtures: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Rest,
    /// In-process fake, no network
    Memory,
}

#[derive(Debug, Subcommand)]
pub enum ModelCommand {
    /// List models in the namespace
    List {
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        page_token: Option<String>,
        /// Request VIEW_FULL
        #[arg(long)]
        full: bool,
        /// Use the private admin endpoint
        #[arg(long)]
        admin: bool,
    },
    /// Show one model
    Get {
        id: String,
        #[arg(long)]
        full: bool,
    },
    /// Find a model by uid through the private service
    Lookup {
        uid: String,
        #[arg(long)]
        full: bool,
    },
    /// Upload a model archive
    Create {
        /// Model id; random when omitted
        #[arg(long)]
        id: Option<String>,
        /// Path to the model archive
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "model-definitions/container")]
        definition: String,
        /// Wait for the create operation to finish
        #[arg(long)]
        wait: bool,
    },
    /// Create a model from a GitHub repository
    CreateGithub {
        #[arg(long)]
        id: String,
        /// owner/repo
        #[arg(long)]
        repository: String,
        #[arg(long)]
        tag: String,
        #[arg(long)]
        wait: bool,
    },
    /// Update a model's description
    Update {
        id: String,
        #[arg(long)]
        description: String,
    },
    Delete {
        id: String,
    },
    /// List a model's versions
    Versions {
        id: String,
    },
    Deploy {
        id: String,
        /// Wait until the model is online
        #[arg(long)]
        wait: bool,
    },
    Undeploy {
        id: String,
        /// Wait until the model is offline
        #[arg(long)]
        wait: bool,
    },
    /// Show the model's serving state
    Watch {
        id: String,
    },
    /// Run inference on image files or URLs
    Trigger {
        id: String,
        /// Image path or http(s) URL (repeatable)
        #[arg(long = "image", required = true)]
        images: Vec<String>,
        /// Send files through trigger-multipart instead of base64 JSON
        #[arg(long)]
        multipart: bool,
    },
    Publish {
        id: String,
    },
    Unpublish {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum OperationCommand {
    /// Show an operation, e.g. operations/1234
    Get { name: String },
    /// Poll an operation until it is done
    Wait { name: String },
    /// Cancel an operation
    Cancel { name: String },
}

#[derive(Debug, Subcommand)]
pub enum DefinitionCommand {
    List {
        #[arg(long)]
        full: bool,
    },
    Get {
        id: String,
        #[arg(long)]
        full: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "modelcheck",
            "--hostname",
            "backend",
            "run",
            "--backend",
            "memory",
            "--scenario",
            "health",
            "--scenario",
            "publish",
        ])
        .unwrap();
        assert_eq!(args.hostname, "backend");
        match args.command {
            Command::Run {
                backend, scenarios, ..
            } => {
                assert_eq!(backend, BackendKind::Memory);
                assert_eq!(scenarios, vec![Scenario::Health, Scenario::Publish]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = Args::try_parse_from(["modelcheck", "--poll-interval-ms", "0", "health"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_trigger_requires_image() {
        assert!(Args::try_parse_from(["modelcheck", "model", "trigger", "m1"]).is_err());
        let args = Args::try_parse_from([
            "modelcheck",
            "--mode",
            "api-gateway",
            "model",
            "trigger",
            "m1",
            "--image",
            "dog.jpg",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::ApiGateway);
    }
}
