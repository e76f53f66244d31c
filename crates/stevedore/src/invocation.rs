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

//! Invocation model and validation.
//!
//! A [`TaskInvocation`] is the boundary contract of the launcher: one
//! structured request describing the workload image, the command to run, the
//! content bundles to stage, resource and network placement, and the
//! optional workflow callback token. Invocations are constructed once per
//! call and are immutable thereafter.
//!
//! All validation happens here, before any external call: required fields,
//! the `content` XOR `mountpoints` exclusivity rule, and the archive-suffix
//! check on every bundle reference. String-typed resource quantities are
//! enforced by the type system at deserialization.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::defaults::{
    ARCHIVE_SUFFIX, DEFAULT_LOG_STREAM_PREFIX, DEFAULT_TASK_CPU, DEFAULT_TASK_MEMORY,
    IMPLICIT_MOUNTPOINT,
};
use crate::error::ValidationError;

/// A named reference to a compressed content bundle staged into the
/// workload's filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mountpoint {
    /// Directory name under the entrypoint root the bundle extracts into.
    pub name: String,
    /// Object-store reference of the archive (must end in the archive
    /// suffix, checked case-insensitively).
    pub reference: String,
}

impl Mountpoint {
    pub fn new(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
        }
    }
}

/// Returns true when `reference` names an accepted archive.
pub fn is_archive_reference(reference: &str) -> bool {
    reference.to_ascii_lowercase().ends_with(ARCHIVE_SUFFIX)
}

/// Maximum accepted mountpoint name length.
const MOUNTPOINT_NAME_MAX: usize = 64;

/// Returns true when `name` is usable as a mountpoint directory name.
///
/// Names become both filesystem path segments and generated shell text, so
/// the grammar is deliberately narrow: letters, digits, underscore, hyphen.
/// This rules out path separators and traversal as well as every shell
/// metacharacter.
pub fn is_safe_mountpoint_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MOUNTPOINT_NAME_MAX
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A single "run this code, tell me how it went" request.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskInvocation {
    /// Workload container image reference.
    #[serde(default)]
    pub image: String,

    /// Command executed inside the workload container.
    #[serde(default)]
    pub cmd_to_run: String,

    /// Single unnamed content bundle. Mutually exclusive with `mountpoints`.
    #[serde(default)]
    pub content: Option<String>,

    /// Named content bundles (name -> archive reference). Mutually exclusive
    /// with `content`.
    #[serde(default)]
    pub mountpoints: BTreeMap<String, String>,

    /// IAM role assumed by the task's containers.
    #[serde(default)]
    pub task_role_arn: Option<String>,

    /// IAM role used by the scheduler to pull images and ship logs.
    #[serde(default)]
    pub task_execution_role_arn: String,

    /// CPU reservation. The scheduler requires a string-typed quantity.
    #[serde(default = "default_task_cpu")]
    pub task_cpu: String,

    /// Memory reservation. The scheduler requires a string-typed quantity.
    #[serde(default = "default_task_memory")]
    pub task_memory: String,

    /// Placement target (cluster) the task launches into.
    #[serde(default, alias = "ecs_cluster")]
    pub cluster: String,

    /// Subnets for the task's network interface.
    #[serde(default)]
    pub subnets: Vec<String>,

    /// Security groups for the task's network interface.
    #[serde(default)]
    pub security_groups: Vec<String>,

    /// Whether the task's network interface receives a public IP.
    #[serde(default)]
    pub assign_public_ip: bool,

    /// Opaque workflow callback token. Absent means fire-and-forget.
    #[serde(default)]
    pub token: Option<String>,

    /// Secret reference for private registry pulls, bound to both
    /// containers when supplied.
    #[serde(default)]
    pub credentials_secret_arn: Option<String>,

    /// Prefix for log stream names; also seeds the task family name.
    #[serde(default = "default_log_stream_prefix")]
    pub log_stream_prefix: String,

    /// Log group both containers route to. Defaults to a group derived from
    /// the task family.
    #[serde(default)]
    pub log_group: Option<String>,

    /// Namespace for outcome count metrics. Absent disables metric emission.
    #[serde(default)]
    pub metric_namespace: Option<String>,

    /// Dimensions attached to outcome metrics.
    #[serde(default)]
    pub metric_dimensions: BTreeMap<String, String>,

    /// Whether failure reports include the tail of the captured workload
    /// log, or only the generated header.
    #[serde(default = "default_true", alias = "send_error_logs_to_stepfunctions")]
    pub send_error_logs: bool,
}

fn default_task_cpu() -> String {
    DEFAULT_TASK_CPU.to_string()
}

fn default_task_memory() -> String {
    DEFAULT_TASK_MEMORY.to_string()
}

fn default_log_stream_prefix() -> String {
    DEFAULT_LOG_STREAM_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

impl TaskInvocation {
    /// Parses an invocation from its JSON boundary representation.
    ///
    /// Parsing alone does not validate; call [`TaskInvocation::validate`]
    /// before acting on the result.
    pub fn from_json(payload: &str) -> Result<Self, ValidationError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Validates the invocation. No external call may be made before this
    /// returns `Ok`.
    ///
    /// # Errors
    /// Returns the first violated rule: missing required field, conflicting
    /// content sources, non-archive bundle reference, or malformed command
    /// text.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cluster.is_empty() {
            return Err(ValidationError::MissingField { field: "ecs_cluster" });
        }
        if self.image.is_empty() {
            return Err(ValidationError::MissingField { field: "image" });
        }
        if self.subnets.is_empty() {
            return Err(ValidationError::MissingField { field: "subnets" });
        }
        if self.task_execution_role_arn.is_empty() {
            return Err(ValidationError::MissingField {
                field: "task_execution_role_arn",
            });
        }

        if self.content.is_some() && !self.mountpoints.is_empty() {
            return Err(ValidationError::ConflictingContentSources);
        }

        for mountpoint in self.mountpoint_plan() {
            if !is_safe_mountpoint_name(&mountpoint.name) {
                return Err(ValidationError::InvalidMountpointName {
                    name: mountpoint.name,
                });
            }
            if !is_archive_reference(&mountpoint.reference) {
                return Err(ValidationError::NotAnArchive {
                    name: mountpoint.name,
                    reference: mountpoint.reference,
                    suffix: ARCHIVE_SUFFIX,
                });
            }
        }

        if self.cmd_to_run.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        if self.cmd_to_run.contains('\0') {
            return Err(ValidationError::MalformedCommand);
        }

        Ok(())
    }

    /// Resolves the content-supply mechanism into an ordered list of
    /// mountpoints. A bare `content` reference becomes one implicit
    /// mountpoint named [`IMPLICIT_MOUNTPOINT`].
    pub fn mountpoint_plan(&self) -> Vec<Mountpoint> {
        if let Some(reference) = &self.content {
            return vec![Mountpoint::new(IMPLICIT_MOUNTPOINT, reference.clone())];
        }
        self.mountpoints
            .iter()
            .map(|(name, reference)| Mountpoint::new(name.clone(), reference.clone()))
            .collect()
    }

    /// Whether this invocation expects a workflow callback.
    pub fn wants_callback(&self) -> bool {
        self.token.is_some()
    }
}
