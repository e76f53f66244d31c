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

//! Task lifecycle orchestration.
//!
//! validate -> build specification -> register -> launch with the sidecar
//! override -> deregister. Registration exists only long enough to be
//! referenced by one launch call; deregistration removes the ability to
//! launch new instances and never affects the already-running task.
//!
//! Deregistration is guaranteed on every exit path once registration
//! succeeded, launch failure included. A deregister failure is logged; when
//! the launch itself failed, the launch error wins.
//!
//! The orchestrator returns once the scheduler has *accepted* the launch.
//! It never waits for the task, and it never learns the workload outcome:
//! that travels through the workflow-engine callback or container logs.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::defaults::{
    EXCERPT_MAX_BYTES, EXCERPT_MAX_LINES, REPORT_RETRY_LIMIT,
};
use crate::error::{LaunchError, SchedulerError};
use crate::invocation::TaskInvocation;
use crate::script::{sidecar_script, SidecarScriptParams};
use crate::taskdef::{build_task_specification, SpecOptions, TaskSpecification};

/// Handle to a registered task definition revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTaskDefinition {
    pub family: String,
    pub revision: i64,
}

impl RegisteredTaskDefinition {
    /// The `family:revision` reference the scheduler resolves.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

/// Handle to an accepted (running or pending) task.
#[derive(Debug, Clone)]
pub struct LaunchedTask {
    pub task_arn: String,
}

/// Network placement for one launch.
#[derive(Debug, Clone)]
pub struct NetworkConfiguration {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: bool,
}

/// One launch call: a registered definition plus per-run overrides.
#[derive(Debug, Clone)]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    /// Command override for the sidecar container (the handshake script).
    pub sidecar_command: String,
    pub network: NetworkConfiguration,
}

/// Container scheduler boundary. Implementations are external
/// collaborators (SDK or CLI backed); the orchestrator only depends on
/// these three calls.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn register_task_definition(
        &self,
        spec: &TaskSpecification,
    ) -> Result<RegisteredTaskDefinition, SchedulerError>;

    async fn run_task(&self, request: &RunTaskRequest) -> Result<LaunchedTask, SchedulerError>;

    async fn deregister_task_definition(&self, reference: &str) -> Result<(), SchedulerError>;
}

/// Orchestrator tuning, typically sourced from configuration.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub spec: SpecOptions,
    pub report_retry_limit: u32,
    pub excerpt_max_bytes: usize,
    pub excerpt_max_lines: usize,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            spec: SpecOptions::default(),
            report_retry_limit: REPORT_RETRY_LIMIT,
            excerpt_max_bytes: EXCERPT_MAX_BYTES,
            excerpt_max_lines: EXCERPT_MAX_LINES,
        }
    }
}

/// Result of an accepted launch.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    /// The (now deregistered) definition reference the task was launched
    /// from.
    pub task_definition: String,
    pub task_arn: String,
}

/// Top-level control flow for one "run this code" unit of work.
pub struct TaskLauncher {
    scheduler: Arc<dyn Scheduler>,
    options: LaunchOptions,
}

impl TaskLauncher {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            options: LaunchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LaunchOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates, registers, launches, and deregisters one task.
    ///
    /// # Errors
    /// Validation errors make no scheduler call. Registration errors make
    /// no launch call. Launch errors still deregister the specification
    /// before propagating.
    pub async fn launch(&self, invocation: &TaskInvocation) -> Result<LaunchOutcome, LaunchError> {
        invocation.validate()?;

        let launch_id = Uuid::new_v4();
        let spec = build_task_specification(invocation, &self.options.spec, Utc::now());
        info!(%launch_id, family = %spec.family, "registering task definition");

        let registered = self.scheduler.register_task_definition(&spec).await?;
        let reference = registered.reference();
        info!(%launch_id, %reference, "task definition registered");

        let request = RunTaskRequest {
            cluster: invocation.cluster.clone(),
            task_definition: reference.clone(),
            sidecar_command: self.render_sidecar_command(invocation, &spec),
            network: NetworkConfiguration {
                subnets: invocation.subnets.clone(),
                security_groups: invocation.security_groups.clone(),
                assign_public_ip: invocation.assign_public_ip,
            },
        };

        let run_result = self.scheduler.run_task(&request).await;

        // Scoped release: the revision is removed whether or not the launch
        // was accepted. A deregister failure never masks a launch error.
        if let Err(err) = self.scheduler.deregister_task_definition(&reference).await {
            warn!(%launch_id, %reference, error = %err, "failed to deregister task definition");
        }

        let launched = run_result?;
        info!(%launch_id, task_arn = %launched.task_arn, "task launch accepted");

        Ok(LaunchOutcome {
            task_definition: reference,
            task_arn: launched.task_arn,
        })
    }

    fn render_sidecar_command(
        &self,
        invocation: &TaskInvocation,
        spec: &TaskSpecification,
    ) -> String {
        let metric_namespace = invocation.metric_namespace.clone();
        sidecar_script(&SidecarScriptParams {
            mountpoints: invocation.mountpoint_plan(),
            token: invocation.token.clone(),
            region: self.options.spec.region.clone(),
            log_group: TaskSpecification::log_group(invocation, &spec.family),
            log_stream_prefix: spec.family.clone(),
            send_error_logs: invocation.send_error_logs,
            metric_namespace,
            metric_dimensions: invocation.metric_dimensions.clone(),
            poll_secs: self.options.spec.poll_secs,
            timeout_secs: self.options.spec.timeout_secs,
            retry_limit: self.options.report_retry_limit,
            excerpt_max_bytes: self.options.excerpt_max_bytes,
            excerpt_max_lines: self.options.excerpt_max_lines,
        })
    }
}
