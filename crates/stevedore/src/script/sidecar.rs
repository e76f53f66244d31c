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

//! Sidecar handshake script, supplied as a per-launch command override.
//!
//! The whole handshake runs as one supervised subshell whose output is teed
//! to the sidecar log and whose exit status lands in the sidecar exit-code
//! marker. Two reporting paths exist on purpose: the normal-path report
//! fires after the main-complete marker is observed, and the independent
//! infrastructure-failure path fires when the handshake subshell itself
//! failed, which can happen before the main container ever runs (e.g. a
//! staging error). The two are mutually exclusive when staging succeeded
//! and the normal report went through.

use std::collections::BTreeMap;

use crate::defaults::WORKSPACE_PATH;
use crate::handshake::{
    ENTRYPOINT_DIR, INIT_MARKER, MAIN_COMPLETE_MARKER, MAIN_CONTAINER_DIR, MAIN_LOG_FILE,
    PREINIT_MARKER, SIDECAR_DIR, SIDECAR_EXITCODE_MARKER, SIDECAR_LOG_FILE,
};
use crate::invocation::Mountpoint;
use crate::report::{INFRASTRUCTURE_ERROR_KIND, SUCCESS_OUTPUT, WORKLOAD_ERROR_KIND};

use super::{sh_quote, ShellScript};

/// Parameters for the sidecar handshake script, resolved at launch time.
#[derive(Debug, Clone)]
pub struct SidecarScriptParams {
    /// Content bundles to stage before the green light.
    pub mountpoints: Vec<Mountpoint>,
    /// Workflow callback token; `None` disables all reporting.
    pub token: Option<String>,
    /// Region passed to every collaborator CLI call.
    pub region: String,
    /// Log group named in generated error headers.
    pub log_group: String,
    /// Stream prefix named in generated error headers.
    pub log_stream_prefix: String,
    /// Whether failure causes include the workload log tail.
    pub send_error_logs: bool,
    /// Namespace for outcome metrics; `None` disables emission.
    pub metric_namespace: Option<String>,
    /// Dimensions attached to outcome metrics.
    pub metric_dimensions: BTreeMap<String, String>,
    /// Seconds between main-complete polls.
    pub poll_secs: u64,
    /// Seconds before the main-complete wait gives up.
    pub timeout_secs: u64,
    /// Attempt ceiling for the infrastructure-failure report.
    pub retry_limit: u32,
    /// Byte budget for failure causes.
    pub excerpt_max_bytes: usize,
    /// Trailing-line cap applied after the byte budget.
    pub excerpt_max_lines: usize,
}

/// Renders the sidecar handshake script.
pub fn sidecar_script(params: &SidecarScriptParams) -> String {
    let ws = WORKSPACE_PATH;
    let region = sh_quote(&params.region);
    let mut script = ShellScript::new();

    script
        .line("set -u")
        .line(format!("ws={}", sh_quote(ws)))
        .line("handshake() {")
        .line("    set -e")
        .line(format!(
            "    mkdir -p \"$ws/{MAIN_CONTAINER_DIR}\" \"$ws/{ENTRYPOINT_DIR}\" \"$ws/{SIDECAR_DIR}\""
        ))
        .line(format!("    : > \"$ws/{PREINIT_MARKER}\""));

    // Names are validated upstream, and quoted here regardless: nothing
    // caller-controlled lands in the script outside single quotes.
    for mountpoint in &params.mountpoints {
        let name = sh_quote(&mountpoint.name);
        let reference = sh_quote(&mountpoint.reference);
        script
            .line(format!("    mkdir -p \"$ws\"/{ENTRYPOINT_DIR}/{name}"))
            .line(format!(
                "    aws s3 cp --region {region} {reference} \"$ws\"/{SIDECAR_DIR}/bundle-{name}.tar.gz"
            ))
            .line(format!(
                "    tar -xzf \"$ws\"/{SIDECAR_DIR}/bundle-{name}.tar.gz -C \"$ws\"/{ENTRYPOINT_DIR}/{name}"
            ))
            .line(format!(
                "    rm -f \"$ws\"/{SIDECAR_DIR}/bundle-{name}.tar.gz"
            ));
    }

    script
        .line(format!("    : > \"$ws/{INIT_MARKER}\""))
        .line("    waited=0")
        .line(format!("    while [ ! -f \"$ws/{MAIN_COMPLETE_MARKER}\" ]; do"))
        .line(format!(
            "        if [ \"$waited\" -ge {} ]; then",
            params.timeout_secs
        ))
        .line("            echo 'timed out waiting for main-complete' >&2")
        .line("            return 124")
        .line("        fi")
        .line(format!("        sleep {}", params.poll_secs))
        .line(format!("        waited=$((waited+{}))", params.poll_secs))
        .line("    done")
        .line(format!("    rc=$(cat \"$ws/{MAIN_COMPLETE_MARKER}\")"));

    if let Some(token) = &params.token {
        let token = sh_quote(token);
        script
            .line("    if [ \"$rc\" -eq 0 ]; then")
            .line(format!(
                "        aws stepfunctions send-task-success --region {region} --task-token {token} --task-output {}",
                sh_quote(SUCCESS_OUTPUT)
            ));
        push_metric_line(&mut script, params, "TaskSuccess", "        ");
        script.line("    else");
        // Header assembled by printf so the log identifiers stay quoted
        // data; only $rc expands.
        script.line(format!(
            "        printf 'Task failed with exit code %s. Full log in log group %s stream prefix %s.\\n' \"$rc\" {group} {prefix} > \"$ws/{SIDECAR_DIR}/cause.txt\"",
            group = sh_quote(&params.log_group),
            prefix = sh_quote(&params.log_stream_prefix)
        ));
        if params.send_error_logs {
            script.line(format!(
                "        tail -c {bytes} \"$ws/{MAIN_CONTAINER_DIR}/{MAIN_LOG_FILE}\" 2>/dev/null | tail -n {lines} >> \"$ws/{SIDECAR_DIR}/cause.txt\"",
                bytes = params.excerpt_max_bytes,
                lines = params.excerpt_max_lines
            ));
        }
        script.line(format!(
            "        aws stepfunctions send-task-failure --region {region} --task-token {token} --error {kind} --cause \"$(tail -c {bytes} \"$ws/{SIDECAR_DIR}/cause.txt\")\"",
            kind = sh_quote(WORKLOAD_ERROR_KIND),
            bytes = params.excerpt_max_bytes
        ));
        push_metric_line(&mut script, params, "TaskFailure", "        ");
        script.line("    fi");
    }

    script
        .line("    return 0")
        .line("}")
        .line(format!("mkdir -p \"$ws/{SIDECAR_DIR}\""))
        .line("(")
        .line("    ( handshake )")
        .line(format!(
            "    printf '%s' \"$?\" > \"$ws/{SIDECAR_DIR}/rc\""
        ))
        .line(format!(
            ") 2>&1 | tee -a \"$ws/{SIDECAR_DIR}/{SIDECAR_LOG_FILE}\""
        ))
        .line(format!(
            "hrc=$(cat \"$ws/{SIDECAR_DIR}/rc\" 2>/dev/null || echo 1)"
        ))
        .line(format!(
            "printf '%s' \"$hrc\" > \"$ws/{SIDECAR_EXITCODE_MARKER}\""
        ));

    if let Some(token) = &params.token {
        let token = sh_quote(token);
        script
            .line("if [ \"$hrc\" -ne 0 ]; then")
            .line("    attempt=1")
            .line(format!(
                "    while [ \"$attempt\" -le {} ]; do",
                params.retry_limit
            ))
            .line(format!(
                "        if aws stepfunctions send-task-failure --region {region} --task-token {token} --error {kind} --cause \"$(printf 'Sidecar handshake failed with exit code %s. Full log in log group %s stream prefix %s.' \"$hrc\" {group} {prefix})\"; then",
                kind = sh_quote(INFRASTRUCTURE_ERROR_KIND),
                group = sh_quote(&params.log_group),
                prefix = sh_quote(&params.log_stream_prefix)
            ))
            .line("            break")
            .line("        fi")
            .line("        echo \"failure report attempt $attempt did not go through\" >&2")
            .line("        attempt=$((attempt+1))")
            .line("    done")
            .line("fi");
    }

    script.line("exit \"$hrc\"");
    script.render()
}

/// Appends a best-effort outcome metric call. The trailing `|| true` keeps
/// metric failures from affecting the reporting path.
fn push_metric_line(
    script: &mut ShellScript,
    params: &SidecarScriptParams,
    metric: &str,
    indent: &str,
) {
    let Some(namespace) = &params.metric_namespace else {
        return;
    };
    let mut data = format!("MetricName={metric},Value=1,Unit=Count");
    if !params.metric_dimensions.is_empty() {
        let dims: Vec<String> = params
            .metric_dimensions
            .iter()
            .map(|(name, value)| format!("{{Name={name},Value={value}}}"))
            .collect();
        data.push_str(&format!(",Dimensions=[{}]", dims.join(",")));
    }
    script.line(format!(
        "{indent}aws cloudwatch put-metric-data --region {region} --namespace {ns} --metric-data {data} || true",
        region = sh_quote(&params.region),
        ns = sh_quote(namespace),
        data = sh_quote(&data)
    ));
}
