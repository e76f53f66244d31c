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

//! In-container handshake agents.
//!
//! These subcommands are the native alternative to the generated shell
//! scripts: an image that ships this binary runs `agent main` as the
//! workload entrypoint and `agent sidecar` as the controller. Both return
//! the exit status the container should terminate with; reporting and
//! diagnostics happen inside the library state machines.

use std::path::Path;
use std::sync::Arc;
use tracing::error;

use stevedore::defaults::TIMEOUT_EXIT_CODE;
use stevedore::error::HandshakeError;
use stevedore::handshake::MAIN_COMPLETE_MARKER;
use stevedore::report::{MetricsConfig, ReportConfig, Reporter};
use stevedore::{ContentStager, MainRunner, SidecarController, StagePlan, Workspace};

use crate::aws::AwsCli;
use crate::config::StevedoreConfig;

/// Workload side: wait for the green light, run the command, record the
/// outcome.
pub async fn agent_main(
    input: &Path,
    workspace: &Path,
    config: &StevedoreConfig,
) -> anyhow::Result<i32> {
    let invocation = super::read_invocation(input)?;
    let workspace = Workspace::new(workspace);
    let plan = StagePlan::new(invocation.mountpoint_plan());
    let workdir = plan.working_directory(&workspace.entrypoint_root());

    let runner = MainRunner::new(workspace.clone(), invocation.cmd_to_run.clone(), workdir)
        .with_config(config.handshake_config());

    match runner.run().await {
        Ok(code) => Ok(code),
        Err(HandshakeError::MarkerTimeout { .. }) => Ok(TIMEOUT_EXIT_CODE),
        Err(err) => {
            error!(error = %err, "workload agent failed");
            // The sidecar is polling for the main-complete marker; leave it
            // a failure outcome rather than letting its wait run out.
            if let Err(marker_err) = workspace.write_exit_marker(MAIN_COMPLETE_MARKER, 1) {
                error!(error = %marker_err, "could not record the failure outcome");
            }
            Ok(1)
        }
    }
}

/// Controller side: stage content, give the green light, observe the
/// outcome, report it.
pub async fn agent_sidecar(
    input: &Path,
    workspace: &Path,
    config: &StevedoreConfig,
) -> anyhow::Result<i32> {
    let invocation = super::read_invocation(input)?;
    let workspace = Workspace::new(workspace);
    let plan = StagePlan::new(invocation.mountpoint_plan());

    let aws = Arc::new(AwsCli::new(config.scheduler.region.clone()));
    let mut reporter = Reporter::new(Arc::clone(&aws) as Arc<_>).with_config(ReportConfig {
        include_error_logs: invocation.send_error_logs,
        excerpt_max_bytes: config.reporting.excerpt_max_bytes,
        excerpt_max_lines: config.reporting.excerpt_max_lines,
        retry_limit: config.reporting.retry_limit,
        log_location_hint: "See the task's log streams for full output.".to_string(),
    });
    if let Some(namespace) = &invocation.metric_namespace {
        reporter = reporter.with_metrics(
            MetricsConfig {
                namespace: namespace.clone(),
                dimensions: invocation.metric_dimensions.clone(),
            },
            Arc::clone(&aws) as Arc<_>,
        );
    }

    let controller = SidecarController::new(
        workspace,
        ContentStager::new(aws),
        plan,
        reporter,
        invocation.token.clone(),
    )
    .with_config(config.handshake_config());

    Ok(controller.run().await)
}
