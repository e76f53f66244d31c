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

use anyhow::{bail, Context};
use std::path::Path;

use stevedore::build_task_specification;
use stevedore::defaults::WORKSPACE_PATH;
use stevedore::handshake::ENTRYPOINT_DIR;
use stevedore::script::{
    main_runner_script, sidecar_script, MainScriptParams, SidecarScriptParams,
};
use stevedore::taskdef::TaskSpecification;
use stevedore::StagePlan;

use crate::config::StevedoreConfig;

/// Renders what a launch would generate, without registering anything: the
/// task-definition JSON and the two container scripts.
pub fn render(input: &Path, side: &str, config: &StevedoreConfig) -> anyhow::Result<()> {
    let invocation = super::read_invocation(input)?;
    invocation
        .validate()
        .context("invocation failed validation")?;

    let spec = build_task_specification(&invocation, &config.spec_options(), chrono::Utc::now());
    let plan = StagePlan::new(invocation.mountpoint_plan());
    let entrypoint_root = format!("{WORKSPACE_PATH}/{ENTRYPOINT_DIR}");
    let workdir = plan
        .working_directory(Path::new(&entrypoint_root))
        .to_string_lossy()
        .into_owned();

    let main = main_runner_script(&MainScriptParams {
        command: invocation.cmd_to_run.clone(),
        workdir,
        poll_secs: config.handshake.poll_secs,
        timeout_secs: config.handshake.wait_timeout_secs,
    });
    let sidecar = sidecar_script(&SidecarScriptParams {
        mountpoints: invocation.mountpoint_plan(),
        token: invocation.token.clone(),
        region: config.scheduler.region.clone(),
        log_group: TaskSpecification::log_group(&invocation, &spec.family),
        log_stream_prefix: spec.family.clone(),
        send_error_logs: invocation.send_error_logs,
        metric_namespace: invocation.metric_namespace.clone(),
        metric_dimensions: invocation.metric_dimensions.clone(),
        poll_secs: config.handshake.poll_secs,
        timeout_secs: config.handshake.wait_timeout_secs,
        retry_limit: config.reporting.retry_limit,
        excerpt_max_bytes: config.reporting.excerpt_max_bytes,
        excerpt_max_lines: config.reporting.excerpt_max_lines,
    });

    match side {
        "main" => println!("{main}"),
        "sidecar" => println!("{sidecar}"),
        "taskdef" => println!("{}", serde_json::to_string_pretty(&spec)?),
        "all" => {
            println!("# --- task definition ---");
            println!("{}", serde_json::to_string_pretty(&spec)?);
            println!("# --- main container ---");
            println!("{main}");
            println!("# --- sidecar container ---");
            println!("{sidecar}");
        }
        other => bail!("unknown part '{other}' (expected main, sidecar, taskdef, or all)"),
    }

    Ok(())
}
