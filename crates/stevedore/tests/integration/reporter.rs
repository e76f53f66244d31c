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

//! Reporter behavior against a scripted backend: exactly-once semantics,
//! cause budgets, and the infrastructure-failure retry ceiling.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

use stevedore::error::ReportError;
use stevedore::report::{
    MetricsConfig, ReportConfig, Reporter, FAILURE_METRIC, SUCCESS_METRIC, SUCCESS_OUTPUT,
    WORKLOAD_ERROR_KIND,
};

use crate::support::{BackendCall, RecordingBackend, RecordingMetrics};

fn write_log(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("main.log");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[tokio::test]
async fn success_is_sent_exactly_once_with_fixed_output() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "all good\n");
    let backend = Arc::new(RecordingBackend::default());
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>);

    reporter.report_completion("tok", 0, &log).await.unwrap();

    let calls = backend.calls();
    assert_eq!(
        calls,
        vec![BackendCall::Success {
            token: "tok".to_string(),
            output: SUCCESS_OUTPUT.to_string(),
        }]
    );
}

#[tokio::test]
async fn workload_failure_cause_stays_within_byte_budget() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, &"spam line\n".repeat(20_000));
    let backend = Arc::new(RecordingBackend::default());
    let config = ReportConfig {
        excerpt_max_bytes: 2048,
        ..ReportConfig::default()
    };
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>).with_config(config);

    reporter.report_completion("tok", 7, &log).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        BackendCall::Failure { error, cause, .. } => {
            assert_eq!(error, WORKLOAD_ERROR_KIND);
            assert!(cause.starts_with("Task failed with exit code 7."));
            assert!(cause.len() <= 2048);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn failure_cause_survives_invalid_utf8_logs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("main.log");
    let mut bytes = vec![0x6c, 0x6f, 0x67, 0xff, 0xfe];
    bytes.extend_from_slice(b"\nlast line before exit\n");
    std::fs::write(&path, &bytes).unwrap();
    let backend = Arc::new(RecordingBackend::default());
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>);

    reporter.report_completion("tok", 3, &path).await.unwrap();

    match &backend.calls()[0] {
        BackendCall::Failure { cause, .. } => {
            assert!(cause.contains("last line before exit"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn failure_cause_omits_logs_when_disabled() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "secret diagnostic output\n");
    let backend = Arc::new(RecordingBackend::default());
    let config = ReportConfig {
        include_error_logs: false,
        ..ReportConfig::default()
    };
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>).with_config(config);

    reporter.report_completion("tok", 2, &log).await.unwrap();

    match &backend.calls()[0] {
        BackendCall::Failure { cause, .. } => {
            assert!(!cause.contains("secret diagnostic output"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn infrastructure_retry_stops_on_first_success() {
    let backend = Arc::new(RecordingBackend::failing_first(2));
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>);

    reporter
        .report_infrastructure_failure("tok", "staging broke")
        .await
        .unwrap();

    // Two refused attempts, then the accepted third. Nothing after.
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test]
async fn infrastructure_retry_gives_up_at_the_ceiling() {
    let backend = Arc::new(RecordingBackend::failing_first(100));
    let config = ReportConfig {
        retry_limit: 5,
        ..ReportConfig::default()
    };
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>).with_config(config);

    let err = reporter
        .report_infrastructure_failure("tok", "staging broke")
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::RetriesExhausted { attempts: 5 }));
    assert_eq!(backend.calls().len(), 5);
}

#[tokio::test]
async fn outcome_metrics_follow_the_callback() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "");
    let backend = Arc::new(RecordingBackend::default());
    let metrics = Arc::new(RecordingMetrics::default());
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>).with_metrics(
        MetricsConfig {
            namespace: "Jobs".to_string(),
            dimensions: BTreeMap::new(),
        },
        Arc::clone(&metrics) as Arc<_>,
    );

    reporter.report_completion("tok", 0, &log).await.unwrap();
    reporter.report_completion("tok", 4, &log).await.unwrap();

    let counts = metrics.counts.lock().unwrap().clone();
    assert_eq!(
        counts,
        vec![
            ("Jobs".to_string(), SUCCESS_METRIC.to_string()),
            ("Jobs".to_string(), FAILURE_METRIC.to_string()),
        ]
    );
}

#[tokio::test]
async fn metric_sink_outage_never_fails_the_callback() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "");
    let backend = Arc::new(RecordingBackend::default());
    let metrics = Arc::new(RecordingMetrics {
        always_fail: true,
        ..RecordingMetrics::default()
    });
    let reporter = Reporter::new(Arc::clone(&backend) as Arc<_>).with_metrics(
        MetricsConfig {
            namespace: "Jobs".to_string(),
            dimensions: BTreeMap::new(),
        },
        Arc::clone(&metrics) as Arc<_>,
    );

    reporter.report_completion("tok", 0, &log).await.unwrap();
    assert_eq!(backend.successes(), 1);
}
