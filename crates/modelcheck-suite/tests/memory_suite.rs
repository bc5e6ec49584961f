use std::time::Duration;

use modelcheck_client::{MemoryBackend, MemoryBackendConfig, ModelBackend};
use modelcheck_suite::{run_suite, CheckReport, Fixtures, Scenario, SuiteConfig};

fn describe_failures(report: &CheckReport) -> String {
    report
        .failures()
        .map(|f| format!("[{}] {}: {}", f.group, f.name, f.detail.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test(start_paused = true)]
async fn test_full_suite_passes_against_memory_backend() {
    let backend = MemoryBackend::default();
    let fixtures = Fixtures::synthetic();
    let report = run_suite(&backend, &fixtures, &SuiteConfig::default(), &Scenario::ALL).await;

    assert!(report.all_passed(), "failures:\n{}", describe_failures(&report));
    assert_eq!(report.rate(), 1.0);
    assert!(report.total() > 50, "only {} checks ran", report.total());
    for scenario in Scenario::ALL {
        assert!(
            report.results().iter().any(|r| r.group == scenario.name()),
            "no checks recorded for {scenario}"
        );
    }
    assert_eq!(backend.model_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_deploy_is_reported() {
    let backend = MemoryBackend::new(MemoryBackendConfig {
        fail_deploy: true,
        ..Default::default()
    });
    let fixtures = Fixtures::synthetic();
    let report = run_suite(
        &backend,
        &fixtures,
        &SuiteConfig::default(),
        &[Scenario::CreateDeployTrigger, Scenario::Cleanup],
    )
    .await;

    assert!(!report.all_passed());
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.group, "create-deploy-trigger");
    assert!(failure.name.contains("STATE_ONLINE"), "{}", failure.name);
    // Cleanup still removes the errored model.
    assert_eq!(backend.model_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out() {
    let backend = MemoryBackend::new(MemoryBackendConfig {
        create_latency: Duration::from_secs(30),
        ..Default::default()
    });
    let config = SuiteConfig {
        poll_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let report = run_suite(&backend, &Fixtures::synthetic(), &config, &[Scenario::Update]).await;

    let failure = report.failures().next().unwrap();
    assert!(failure.detail.as_deref().unwrap_or("").contains("timed out"));
    assert!(report.failures().any(|f| f.name == "scenario runs to completion"));
    assert_eq!(backend.model_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_fixture_aborts_scenario() {
    let backend = MemoryBackend::default();
    let fixtures = Fixtures::default();
    let report = run_suite(
        &backend,
        &fixtures,
        &SuiteConfig::default(),
        &[Scenario::Health, Scenario::Publish],
    )
    .await;

    assert_eq!(report.failed(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.group, "publish");
    assert!(failure.detail.as_deref().unwrap_or("").contains("dummy-cls-model.zip"));
    assert!(backend.health().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_default_run_skips_github_model() {
    let backend = MemoryBackend::default();
    let report = run_suite(&backend, &Fixtures::synthetic(), &SuiteConfig::default(), &[]).await;

    assert!(report.all_passed(), "failures:\n{}", describe_failures(&report));
    assert!(!report.results().iter().any(|r| r.group == "github-model"));
    assert!(report.results().iter().any(|r| r.group == "infer-tasks"));
    assert_eq!(backend.model_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_waits_out_slow_deploy() {
    let backend = MemoryBackend::new(MemoryBackendConfig {
        deploy_latency: Duration::from_secs(8),
        ..Default::default()
    });
    let config = SuiteConfig {
        poll_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let report = run_suite(
        &backend,
        &Fixtures::synthetic(),
        &config,
        &[Scenario::CreateDeployTrigger, Scenario::Cleanup],
    )
    .await;

    // The deploy outlives the scenario's wait, so only that scenario fails.
    assert!(report.failures().all(|f| f.group == "create-deploy-trigger"));
    let cleanup: Vec<_> = report.results().iter().filter(|r| r.group == "cleanup").collect();
    assert!(cleanup.iter().any(|r| r.name.starts_with("DELETE ") && r.passed));
    assert_eq!(backend.model_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_watch_not_found_after_create_is_tolerated() {
    let backend = MemoryBackend::new(MemoryBackendConfig {
        watch_delay: Duration::from_secs(3),
        ..Default::default()
    });
    let report = run_suite(
        &backend,
        &Fixtures::synthetic(),
        &SuiteConfig::default(),
        &[Scenario::CreateDeployTrigger, Scenario::InferTasks, Scenario::Cleanup],
    )
    .await;

    assert!(report.all_passed(), "failures:\n{}", describe_failures(&report));
    assert_eq!(backend.model_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_without_operation_still_cancels() {
    let backend = MemoryBackend::new(MemoryBackendConfig {
        deploy_operation: false,
        ..Default::default()
    });
    let report = run_suite(&backend, &Fixtures::synthetic(), &SuiteConfig::default(), &[]).await;

    assert!(report.all_passed(), "failures:\n{}", describe_failures(&report));
    assert!(report
        .results()
        .iter()
        .any(|r| r.group == "cancel-operation" && r.name.ends_with("/cancel response status is 200")));
    assert_eq!(backend.model_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_task_models_answer_in_their_shape() {
    let backend = MemoryBackend::default();
    let report = run_suite(
        &backend,
        &Fixtures::synthetic(),
        &SuiteConfig::default(),
        &[Scenario::InferTasks],
    )
    .await;

    assert!(report.all_passed(), "failures:\n{}", describe_failures(&report));
    for task in ["TASK_DETECTION", "TASK_KEYPOINT", "TASK_UNSPECIFIED", "TASK_CLASSIFICATION"] {
        assert!(
            report.results().iter().any(|r| r.name.ends_with(&format!("task is {task}"))),
            "no check for {task}"
        );
    }
    assert!(report
        .results()
        .iter()
        .any(|r| r.name.contains("empty-response-model.zip task_outputs[0] has detection")));
    assert_eq!(backend.model_count().await, 0);
}
