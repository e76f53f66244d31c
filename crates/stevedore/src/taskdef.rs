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

//! Task specification builder.
//!
//! Assembles the declarative two-container task description the scheduler
//! consumes: the workload ("main") container, non-essential, running the
//! generated bootstrap script; and the control-plane sidecar, essential,
//! whose command arrives as a per-launch override. Essential marking is
//! load-bearing: the scheduler tears the task down when the essential
//! container exits, and the sidecar performs the final report, so it must
//! be the one whose exit ends the task.
//!
//! Everything only known after placement (content bundles, callback token,
//! network result) stays out of the registered specification and travels in
//! the sidecar override instead.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::defaults::{SIDECAR_IMAGE, WORKSPACE_PATH};
use crate::handshake::ENTRYPOINT_DIR;
use crate::invocation::TaskInvocation;
use crate::script::{main_runner_script, MainScriptParams};
use crate::stage::StagePlan;

/// Name of the workload container within the specification.
pub const MAIN_CONTAINER_NAME: &str = "main";
/// Name of the control-plane container within the specification.
pub const SIDECAR_CONTAINER_NAME: &str = "sidecar";
/// Name of the shared ephemeral volume.
pub const WORKSPACE_VOLUME: &str = "workspace";

static FAMILY_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static pattern"));

/// Replaces every character outside the scheduler's naming grammar
/// (letters, digits, underscore, hyphen) with a hyphen.
pub fn sanitize_name(raw: &str) -> String {
    FAMILY_SANITIZER.replace_all(raw, "-").into_owned()
}

/// Derives a fresh, timestamp-qualified family name from the log stream
/// prefix.
pub fn family_name(log_stream_prefix: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        sanitize_name(log_stream_prefix),
        now.format("%Y%m%d%H%M%S%3f")
    )
}

/// Settings the builder takes from configuration rather than the
/// invocation.
#[derive(Debug, Clone)]
pub struct SpecOptions {
    /// Control-plane image run as the sidecar.
    pub sidecar_image: String,
    /// Region recorded in the log routing options.
    pub region: String,
    /// Seconds between green-light polls in the main script.
    pub poll_secs: u64,
    /// Seconds before the main script's green-light wait gives up.
    pub timeout_secs: u64,
}

impl Default for SpecOptions {
    fn default() -> Self {
        Self {
            sidecar_image: SIDECAR_IMAGE.to_string(),
            region: "us-east-1".to_string(),
            poll_secs: crate::defaults::DEFAULT_POLL_INTERVAL.as_secs(),
            timeout_secs: crate::defaults::DEFAULT_WAIT_TIMEOUT.as_secs(),
        }
    }
}

/// Declarative description of the two-container task, serialized to the
/// scheduler's camelCase JSON shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpecification {
    pub family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_role_arn: Option<String>,
    pub execution_role_arn: String,
    pub network_mode: String,
    pub cpu: String,
    pub memory: String,
    pub requires_compatibilities: Vec<String>,
    pub volumes: Vec<Volume>,
    pub container_definitions: Vec<ContainerDefinition>,
}

impl TaskSpecification {
    /// Log group the task routes to, caller-specified or derived from the
    /// family.
    pub fn log_group(invocation: &TaskInvocation, family: &str) -> String {
        invocation
            .log_group
            .clone()
            .unwrap_or_else(|| format!("/aws/ecs/{family}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Volume {
    pub name: String,
    pub host: HostVolume,
}

/// Empty host descriptor: the scheduler provisions an ephemeral volume.
#[derive(Debug, Clone, Serialize, Default)]
pub struct HostVolume {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub entry_point: Vec<String>,
    pub command: Vec<String>,
    pub essential: bool,
    pub mount_points: Vec<MountPointSpec>,
    pub log_configuration: LogConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_credentials: Option<RepositoryCredentials>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPointSpec {
    pub source_volume: String,
    pub container_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfiguration {
    pub log_driver: String,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCredentials {
    pub credentials_parameter: String,
}

/// Builds a fresh specification for one validated invocation.
///
/// The main container's command is the generated bootstrap script, fixed at
/// registration time because the workload command is fixed per invocation.
/// The sidecar's registered command is a placeholder; the real handshake
/// script always arrives as a launch-time override.
pub fn build_task_specification(
    invocation: &TaskInvocation,
    options: &SpecOptions,
    now: DateTime<Utc>,
) -> TaskSpecification {
    let family = family_name(&invocation.log_stream_prefix, now);
    let log_group = TaskSpecification::log_group(invocation, &family);

    let plan = StagePlan::new(invocation.mountpoint_plan());
    let entrypoint_root = format!("{WORKSPACE_PATH}/{ENTRYPOINT_DIR}");
    let workdir = plan
        .working_directory(std::path::Path::new(&entrypoint_root))
        .to_string_lossy()
        .into_owned();

    let main_script = main_runner_script(&MainScriptParams {
        command: invocation.cmd_to_run.clone(),
        workdir,
        poll_secs: options.poll_secs,
        timeout_secs: options.timeout_secs,
    });

    let credentials = invocation
        .credentials_secret_arn
        .as_ref()
        .map(|arn| RepositoryCredentials {
            credentials_parameter: arn.clone(),
        });

    let mount_points = vec![MountPointSpec {
        source_volume: WORKSPACE_VOLUME.to_string(),
        container_path: WORKSPACE_PATH.to_string(),
    }];

    let main_container = ContainerDefinition {
        name: MAIN_CONTAINER_NAME.to_string(),
        image: invocation.image.clone(),
        entry_point: shell_entry_point(),
        command: vec![main_script],
        essential: false,
        mount_points: mount_points.clone(),
        log_configuration: log_configuration(
            &log_group,
            &format!("{family}-{MAIN_CONTAINER_NAME}"),
            &options.region,
        ),
        repository_credentials: credentials.clone(),
    };

    let sidecar_container = ContainerDefinition {
        name: SIDECAR_CONTAINER_NAME.to_string(),
        image: options.sidecar_image.clone(),
        entry_point: shell_entry_point(),
        // Overridden at launch; registering a no-op keeps the definition
        // launchable for debugging without an override.
        command: vec!["true".to_string()],
        essential: true,
        mount_points,
        log_configuration: log_configuration(
            &log_group,
            &format!("{family}-{SIDECAR_CONTAINER_NAME}"),
            &options.region,
        ),
        repository_credentials: credentials,
    };

    TaskSpecification {
        family,
        task_role_arn: invocation.task_role_arn.clone(),
        execution_role_arn: invocation.task_execution_role_arn.clone(),
        network_mode: "awsvpc".to_string(),
        cpu: invocation.task_cpu.clone(),
        memory: invocation.task_memory.clone(),
        requires_compatibilities: vec!["FARGATE".to_string()],
        volumes: vec![Volume {
            name: WORKSPACE_VOLUME.to_string(),
            host: HostVolume::default(),
        }],
        container_definitions: vec![main_container, sidecar_container],
    }
}

fn shell_entry_point() -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string()]
}

fn log_configuration(group: &str, stream_prefix: &str, region: &str) -> LogConfiguration {
    LogConfiguration {
        log_driver: "awslogs".to_string(),
        options: BTreeMap::from([
            ("awslogs-create-group".to_string(), "true".to_string()),
            ("awslogs-group".to_string(), group.to_string()),
            ("awslogs-region".to_string(), region.to_string()),
            ("awslogs-stream-prefix".to_string(), stream_prefix.to_string()),
        ]),
    }
}
