use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use modelcheck_suite::{Hosts, SuiteConfig};

use crate::args::Args;

pub fn build_hosts(args: &Args) -> Result<Hosts> {
    Hosts::resolve(
        args.mode,
        &args.protocol,
        args.gateway_url.as_deref(),
        &args.hostname,
    )
}

pub fn build_suite_config(args: &Args, fixtures_root: PathBuf) -> SuiteConfig {
    SuiteConfig {
        fixtures_root,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        poll_timeout: Duration::from_millis(args.poll_timeout_ms),
        remote_timeout: Duration::from_millis(args.remote_timeout_ms),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_build_from_flags() {
        let args = Args::try_parse_from([
            "modelcheck",
            "--mode",
            "localhost",
            "--gateway-url",
            "api.example.com:8080",
            "--poll-timeout-ms",
            "5000",
            "health",
        ])
        .unwrap();
        let hosts = build_hosts(&args).unwrap();
        assert_eq!(hosts.public, format!("{}://api.example.com:8080", args.protocol));

        let config = build_suite_config(&args, PathBuf::from("/data"));
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.fixtures_root, PathBuf::from("/data"));
    }
}
