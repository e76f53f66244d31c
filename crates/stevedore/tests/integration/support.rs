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

//! Mock collaborators shared by the integration tests: a call-recording
//! workflow backend with scripted failures, a local-filesystem object
//! store, and a scripted scheduler.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use stevedore::error::{ReportError, SchedulerError, StageError};
use stevedore::handshake::HandshakeConfig;
use stevedore::launcher::{LaunchedTask, RegisteredTaskDefinition, RunTaskRequest, Scheduler};
use stevedore::report::{MetricsSink, WorkflowBackend};
use stevedore::stage::ObjectStore;
use stevedore::taskdef::TaskSpecification;

/// Poll fast, fail fast: suits tests where both handshake sides run in one
/// process.
pub fn fast_handshake() -> HandshakeConfig {
    HandshakeConfig {
        poll_interval: Duration::from_millis(5),
        wait_timeout: Duration::from_secs(5),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Success {
        token: String,
        output: String,
    },
    Failure {
        token: String,
        error: String,
        cause: String,
    },
}

/// Records every callback; optionally fails the first N failure reports.
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Mutex<Vec<BackendCall>>,
    pub failures_before_success: Mutex<u32>,
}

impl RecordingBackend {
    pub fn failing_first(n: u32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures_before_success: Mutex::new(n),
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn successes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Success { .. }))
            .count()
    }

    pub fn failures(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::Failure { .. }))
            .collect()
    }
}

#[async_trait]
impl WorkflowBackend for RecordingBackend {
    async fn send_success(&self, token: &str, output: &str) -> Result<(), ReportError> {
        self.calls.lock().unwrap().push(BackendCall::Success {
            token: token.to_string(),
            output: output.to_string(),
        });
        Ok(())
    }

    async fn send_failure(&self, token: &str, error: &str, cause: &str) -> Result<(), ReportError> {
        self.calls.lock().unwrap().push(BackendCall::Failure {
            token: token.to_string(),
            error: error.to_string(),
            cause: cause.to_string(),
        });
        let mut remaining = self.failures_before_success.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ReportError::Callback {
                call: "send_failure",
                message: "simulated transport failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Counts emitted metrics; optionally fails every call.
#[derive(Default)]
pub struct RecordingMetrics {
    pub counts: Mutex<Vec<(String, String)>>,
    pub always_fail: bool,
}

#[async_trait]
impl MetricsSink for RecordingMetrics {
    async fn put_count(
        &self,
        namespace: &str,
        metric: &str,
        _dimensions: &BTreeMap<String, String>,
        _value: f64,
    ) -> Result<(), ReportError> {
        self.counts
            .lock()
            .unwrap()
            .push((namespace.to_string(), metric.to_string()));
        if self.always_fail {
            return Err(ReportError::Metric("simulated sink outage".to_string()));
        }
        Ok(())
    }
}

/// Serves archives from a local directory, keyed by reference basename.
pub struct LocalStore {
    pub source_dir: PathBuf,
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn fetch(&self, reference: &str, dest: &Path) -> Result<(), StageError> {
        let filename = reference.rsplit('/').next().unwrap_or(reference);
        tokio::fs::copy(self.source_dir.join(filename), dest)
            .await
            .map_err(|e| StageError::Fetch {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Always refuses to fetch; drives the infrastructure-failure path.
pub struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
    async fn fetch(&self, reference: &str, _dest: &Path) -> Result<(), StageError> {
        Err(StageError::Fetch {
            reference: reference.to_string(),
            message: "bundle unavailable".to_string(),
        })
    }
}

/// Writes a small tar.gz bundle containing one file.
pub fn write_bundle(dir: &Path, archive_name: &str, file_name: &str, content: &str) {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let file = std::fs::File::create(dir.join(archive_name)).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(&mut header, file_name, content.as_bytes())
        .unwrap();
    builder
        .into_inner()
        .unwrap()
        .finish()
        .unwrap()
        .flush()
        .unwrap();
}

/// Scripted scheduler: records every call, optionally refuses launches.
#[derive(Default)]
pub struct MockScheduler {
    pub registered: Mutex<Vec<String>>,
    pub run_requests: Mutex<Vec<RunTaskRequest>>,
    pub deregistered: Mutex<Vec<String>>,
    pub fail_register: bool,
    pub fail_run: bool,
}

impl MockScheduler {
    pub fn refusing_launches() -> Self {
        Self {
            fail_run: true,
            ..Self::default()
        }
    }

    pub fn refusing_registration() -> Self {
        Self {
            fail_register: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    async fn register_task_definition(
        &self,
        spec: &TaskSpecification,
    ) -> Result<RegisteredTaskDefinition, SchedulerError> {
        if self.fail_register {
            return Err(SchedulerError::Call {
                call: "register_task_definition",
                message: "simulated registration refusal".to_string(),
            });
        }
        self.registered.lock().unwrap().push(spec.family.clone());
        Ok(RegisteredTaskDefinition {
            family: spec.family.clone(),
            revision: 1,
        })
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<LaunchedTask, SchedulerError> {
        self.run_requests.lock().unwrap().push(request.clone());
        if self.fail_run {
            return Err(SchedulerError::Call {
                call: "run_task",
                message: "simulated launch refusal".to_string(),
            });
        }
        Ok(LaunchedTask {
            task_arn: format!("arn:aws:ecs:task/{}", request.task_definition),
        })
    }

    async fn deregister_task_definition(&self, reference: &str) -> Result<(), SchedulerError> {
        self.deregistered.lock().unwrap().push(reference.to_string());
        Ok(())
    }
}
