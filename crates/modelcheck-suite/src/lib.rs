pub mod check;
pub mod config;
pub mod fixtures;
pub mod scenario;

use modelcheck_client::ModelBackend;

pub use check::{CheckReport, CheckResult, Group};
pub use config::{Hosts, Mode, SuiteConfig};
pub use fixtures::Fixtures;
pub use scenario::Scenario;

/// Run `scenarios` (`Scenario::DEFAULT` when empty) and return the recorded checks.
pub async fn run_suite(
    backend: &dyn ModelBackend,
    fixtures: &Fixtures,
    config: &SuiteConfig,
    scenarios: &[Scenario],
) -> CheckReport {
    let scenarios = if scenarios.is_empty() {
        &Scenario::DEFAULT[..]
    } else {
        scenarios
    };
    tracing::info!(
        namespace = backend.namespace(),
        scenarios = scenarios.len(),
        interval_ms = config.poll_interval.as_millis() as u64,
        timeout_ms = config.poll_timeout.as_millis() as u64,
        "starting suite"
    );
    let report = scenario::run_scenarios(backend, fixtures, config, scenarios).await;
    tracing::info!(
        passed = report.passed(),
        failed = report.failed(),
        "suite finished"
    );
    report
}
