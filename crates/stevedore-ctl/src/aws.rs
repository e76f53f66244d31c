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

//! AWS CLI-backed collaborators.
//!
//! One [`AwsCli`] value implements every external boundary the library
//! defines: the container scheduler, the object store, the workflow
//! callback, and the metrics sink. All calls shell out to the `aws` binary
//! rather than linking an SDK; the sidecar container ships that binary
//! anyway, and the CLI keeps credentials handling in one place.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use stevedore::error::{ReportError, SchedulerError, StageError};
use stevedore::launcher::{LaunchedTask, RegisteredTaskDefinition, RunTaskRequest, Scheduler};
use stevedore::report::{MetricsSink, WorkflowBackend};
use stevedore::stage::ObjectStore;
use stevedore::taskdef::{TaskSpecification, SIDECAR_CONTAINER_NAME};

/// Shared AWS CLI invoker, fixed to one region.
pub struct AwsCli {
    region: String,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    /// Runs one `aws` subcommand and returns its stdout. A nonzero exit
    /// maps to the trimmed stderr text.
    async fn run(&self, args: &[&str]) -> Result<String, String> {
        debug!(subcommand = args.first().copied().unwrap_or(""), "aws cli call");
        let output = Command::new("aws")
            .args(args)
            .arg("--region")
            .arg(&self.region)
            .output()
            .await
            .map_err(|e| format!("failed to spawn aws cli: {e}"))?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Scheduler for AwsCli {
    async fn register_task_definition(
        &self,
        spec: &TaskSpecification,
    ) -> Result<RegisteredTaskDefinition, SchedulerError> {
        let payload = serde_json::to_string(spec).map_err(|e| SchedulerError::Call {
            call: "register_task_definition",
            message: e.to_string(),
        })?;
        let stdout = self
            .run(&[
                "ecs",
                "register-task-definition",
                "--cli-input-json",
                &payload,
            ])
            .await
            .map_err(|message| SchedulerError::Call {
                call: "register_task_definition",
                message,
            })?;

        let response: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| SchedulerError::MalformedResponse(e.to_string()))?;
        let definition = &response["taskDefinition"];
        let family = definition["family"].as_str().ok_or_else(|| {
            SchedulerError::MalformedResponse("registration response lacks family".to_string())
        })?;
        let revision = definition["revision"].as_i64().ok_or_else(|| {
            SchedulerError::MalformedResponse("registration response lacks revision".to_string())
        })?;

        Ok(RegisteredTaskDefinition {
            family: family.to_string(),
            revision,
        })
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<LaunchedTask, SchedulerError> {
        let network = serde_json::json!({
            "awsvpcConfiguration": {
                "subnets": request.network.subnets,
                "securityGroups": request.network.security_groups,
                "assignPublicIp": if request.network.assign_public_ip {
                    "ENABLED"
                } else {
                    "DISABLED"
                },
            }
        })
        .to_string();
        let overrides = serde_json::json!({
            "containerOverrides": [{
                "name": SIDECAR_CONTAINER_NAME,
                "command": [request.sidecar_command],
            }]
        })
        .to_string();

        let stdout = self
            .run(&[
                "ecs",
                "run-task",
                "--cluster",
                &request.cluster,
                "--task-definition",
                &request.task_definition,
                "--launch-type",
                "FARGATE",
                "--network-configuration",
                &network,
                "--overrides",
                &overrides,
            ])
            .await
            .map_err(|message| SchedulerError::Call {
                call: "run_task",
                message,
            })?;

        let response: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| SchedulerError::MalformedResponse(e.to_string()))?;
        if let Some(failure) = response["failures"].as_array().and_then(|f| f.first()) {
            return Err(SchedulerError::Call {
                call: "run_task",
                message: failure["reason"].as_str().unwrap_or("unknown reason").to_string(),
            });
        }
        let task_arn = response["tasks"][0]["taskArn"].as_str().ok_or_else(|| {
            SchedulerError::MalformedResponse("launch response lacks a task arn".to_string())
        })?;

        Ok(LaunchedTask {
            task_arn: task_arn.to_string(),
        })
    }

    async fn deregister_task_definition(&self, reference: &str) -> Result<(), SchedulerError> {
        self.run(&["ecs", "deregister-task-definition", "--task-definition", reference])
            .await
            .map_err(|message| SchedulerError::Call {
                call: "deregister_task_definition",
                message,
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for AwsCli {
    async fn fetch(&self, reference: &str, dest: &Path) -> Result<(), StageError> {
        let dest = dest.to_string_lossy();
        self.run(&["s3", "cp", reference, &dest])
            .await
            .map_err(|message| StageError::Fetch {
                reference: reference.to_string(),
                message,
            })?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowBackend for AwsCli {
    async fn send_success(&self, token: &str, output: &str) -> Result<(), ReportError> {
        self.run(&[
            "stepfunctions",
            "send-task-success",
            "--task-token",
            token,
            "--task-output",
            output,
        ])
        .await
        .map_err(|message| ReportError::Callback {
            call: "send_success",
            message,
        })?;
        Ok(())
    }

    async fn send_failure(&self, token: &str, error: &str, cause: &str) -> Result<(), ReportError> {
        self.run(&[
            "stepfunctions",
            "send-task-failure",
            "--task-token",
            token,
            "--error",
            error,
            "--cause",
            cause,
        ])
        .await
        .map_err(|message| ReportError::Callback {
            call: "send_failure",
            message,
        })?;
        Ok(())
    }
}

#[async_trait]
impl MetricsSink for AwsCli {
    async fn put_count(
        &self,
        namespace: &str,
        metric: &str,
        dimensions: &std::collections::BTreeMap<String, String>,
        value: f64,
    ) -> Result<(), ReportError> {
        let mut data = format!("MetricName={metric},Value={value},Unit=Count");
        if !dimensions.is_empty() {
            let dims: Vec<String> = dimensions
                .iter()
                .map(|(name, value)| format!("{{Name={name},Value={value}}}"))
                .collect();
            data.push_str(&format!(",Dimensions=[{}]", dims.join(",")));
        }
        self.run(&[
            "cloudwatch",
            "put-metric-data",
            "--namespace",
            namespace,
            "--metric-data",
            &data,
        ])
        .await
        .map_err(ReportError::Metric)?;
        Ok(())
    }
}
