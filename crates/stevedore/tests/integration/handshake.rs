/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! End-to-end handshake scenarios: both sides run in one process over a
//! tempdir workspace, with a recording backend standing in for the
//! workflow engine.

use std::sync::Arc;
use tempfile::TempDir;

use stevedore::handshake::{
    MainRunner, SidecarController, Workspace, MAIN_COMPLETE_MARKER, SIDECAR_EXITCODE_MARKER,
};
use stevedore::invocation::Mountpoint;
use stevedore::report::{ReportConfig, Reporter, INFRASTRUCTURE_ERROR_KIND, WORKLOAD_ERROR_KIND};
use stevedore::stage::{ContentStager, StagePlan};

use crate::support::{
    fast_handshake, write_bundle, BackendCall, FailingStore, LocalStore, RecordingBackend,
};

fn reporter(backend: Arc<RecordingBackend>) -> Reporter {
    Reporter::new(backend).with_config(ReportConfig {
        log_location_hint: "Full log at /tmp/workspace/main-container/main.log.".to_string(),
        ..ReportConfig::default()
    })
}

/// Runs both handshake sides concurrently and returns the pair of exit
/// codes (main, sidecar).
async fn run_both(
    workspace: &Workspace,
    command: &str,
    plan: StagePlan,
    store: Arc<dyn stevedore::stage::ObjectStore>,
    token: Option<&str>,
    backend: Arc<RecordingBackend>,
) -> (i32, i32) {
    let workdir = plan.working_directory(&workspace.entrypoint_root());
    let main = MainRunner::new(workspace.clone(), command, workdir).with_config(fast_handshake());
    let sidecar = SidecarController::new(
        workspace.clone(),
        ContentStager::new(store),
        plan,
        reporter(backend),
        token.map(str::to_string),
    )
    .with_config(fast_handshake());

    let (main_code, sidecar_code) = tokio::join!(main.run(), sidecar.run());
    (main_code.expect("main runner"), sidecar_code)
}

#[tokio::test]
async fn failing_workload_reports_failure_with_token() {
    let dir = TempDir::new().unwrap();
    let workspace = Workspace::new(dir.path());
    let backend = Arc::new(RecordingBackend::default());

    let (main_code, sidecar_code) = run_both(
        &workspace,
        "exit 3",
        StagePlan::new(vec![]),
        Arc::new(FailingStore), // empty plan, never consulted
        Some("tok"),
        Arc::clone(&backend),
    )
    .await;

    assert_eq!(main_code, 3);
    assert_eq!(sidecar_code, 0);
    assert_eq!(workspace.read_exit_marker(MAIN_COMPLETE_MARKER).unwrap(), 3);

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        BackendCall::Failure { token, error, cause } => {
            assert_eq!(token, "tok");
            assert_eq!(error, WORKLOAD_ERROR_KIND);
            assert!(cause.contains("exit code 3"));
            assert!(cause.len() <= ReportConfig::default().excerpt_max_bytes);
        }
        other => panic!("expected failure report, got {other:?}"),
    }
}

#[tokio::test]
async fn successful_workload_reports_success_exactly_once() {
    let dir = TempDir::new().unwrap();
    let workspace = Workspace::new(dir.path());
    let backend = Arc::new(RecordingBackend::default());

    let (main_code, sidecar_code) = run_both(
        &workspace,
        "exit 0",
        StagePlan::new(vec![]),
        Arc::new(FailingStore),
        Some("tok"),
        Arc::clone(&backend),
    )
    .await;

    assert_eq!(main_code, 0);
    assert_eq!(sidecar_code, 0);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(
        &calls[0],
        BackendCall::Success { token, .. } if token == "tok"
    ));
}

#[tokio::test]
async fn no_token_means_no_callbacks_at_all() {
    let dir = TempDir::new().unwrap();
    let workspace = Workspace::new(dir.path());
    let backend = Arc::new(RecordingBackend::default());

    let (main_code, sidecar_code) = run_both(
        &workspace,
        "exit 5",
        StagePlan::new(vec![]),
        Arc::new(FailingStore),
        None,
        Arc::clone(&backend),
    )
    .await;

    assert_eq!(main_code, 5);
    assert_eq!(sidecar_code, 0);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn staging_failure_fires_only_the_infrastructure_path() {
    let dir = TempDir::new().unwrap();
    let workspace = Workspace::new(dir.path());
    let backend = Arc::new(RecordingBackend::default());

    // Only the sidecar runs: with staging broken the green light never
    // comes, exactly as in a real task.
    let plan = StagePlan::new(vec![Mountpoint::new("app", "s3://bucket/app.tar.gz")]);
    let sidecar = SidecarController::new(
        workspace.clone(),
        ContentStager::new(Arc::new(FailingStore)),
        plan,
        reporter(Arc::clone(&backend)),
        Some("tok".to_string()),
    )
    .with_config(fast_handshake());

    let code = sidecar.run().await;
    assert_ne!(code, 0);
    assert_eq!(
        workspace.read_exit_marker(SIDECAR_EXITCODE_MARKER).unwrap(),
        code
    );

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        BackendCall::Failure { error, cause, .. } => {
            assert_eq!(error, INFRASTRUCTURE_ERROR_KIND);
            assert!(cause.contains("bundle unavailable"));
        }
        other => panic!("expected infrastructure failure report, got {other:?}"),
    }
}

#[tokio::test]
async fn staged_bundle_runs_from_its_own_directory() {
    let dir = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    write_bundle(source.path(), "app.tar.gz", "run.sh", "echo from-bundle; exit 0");

    let workspace = Workspace::new(dir.path());
    let backend = Arc::new(RecordingBackend::default());
    let plan = StagePlan::new(vec![Mountpoint::new("app", "s3://bucket/app.tar.gz")]);

    let (main_code, sidecar_code) = run_both(
        &workspace,
        "sh ./run.sh",
        plan,
        Arc::new(LocalStore {
            source_dir: source.path().to_path_buf(),
        }),
        Some("tok"),
        Arc::clone(&backend),
    )
    .await;

    assert_eq!(main_code, 0);
    assert_eq!(sidecar_code, 0);
    // Single mountpoint: the workload ran inside entrypoint/app.
    assert!(workspace.entrypoint_root().join("app/run.sh").exists());
    let log = std::fs::read_to_string(workspace.main_log_path()).unwrap();
    assert!(log.contains("from-bundle"));
    assert_eq!(backend.successes(), 1);
}

#[tokio::test]
async fn normal_and_infrastructure_reports_are_mutually_exclusive() {
    let dir = TempDir::new().unwrap();
    let workspace = Workspace::new(dir.path());
    let backend = Arc::new(RecordingBackend::default());

    // Staging succeeded (empty plan) and the workload failed: exactly one
    // workload-failure report, no infrastructure report.
    run_both(
        &workspace,
        "exit 9",
        StagePlan::new(vec![]),
        Arc::new(FailingStore),
        Some("tok"),
        Arc::clone(&backend),
    )
    .await;

    let failures = backend.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        BackendCall::Failure { error, .. } if error == WORKLOAD_ERROR_KIND
    ));
}
