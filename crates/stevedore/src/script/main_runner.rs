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

//! Main-container bootstrap script.
//!
//! Two states: wait for the sidecar's green light, then run the user
//! command. The user command executes under its own `sh -c` so it is not
//! subject to the wrapper's `set -u` strictness and its natural exit status
//! is captured rather than short-circuited. All output is duplicated to a
//! durable log file in the shared volume; the wrapper itself terminates with
//! the user command's status so the scheduler records a matching outcome.

use crate::defaults::{TIMEOUT_EXIT_CODE, WORKSPACE_PATH};
use crate::handshake::{INIT_MARKER, MAIN_COMPLETE_MARKER, MAIN_CONTAINER_DIR, MAIN_LOG_FILE};

use super::{sh_quote, ShellScript};

/// Parameters for the main-container script, fixed at registration time.
#[derive(Debug, Clone)]
pub struct MainScriptParams {
    /// User-supplied command text, run via `sh -c`.
    pub command: String,
    /// Resolved entrypoint directory the command runs in.
    pub workdir: String,
    /// Seconds between green-light polls.
    pub poll_secs: u64,
    /// Seconds before the green-light wait gives up.
    pub timeout_secs: u64,
}

/// Renders the main-container bootstrap script.
pub fn main_runner_script(params: &MainScriptParams) -> String {
    let ws = WORKSPACE_PATH;
    let mut script = ShellScript::new();

    script
        .line("set -u")
        .line(format!("ws={}", sh_quote(ws)))
        .line("waited=0")
        .line(format!("while [ ! -f \"$ws/{INIT_MARKER}\" ]; do"))
        .line(format!("    if [ \"$waited\" -ge {} ]; then", params.timeout_secs))
        .line("        echo 'timed out waiting for sidecar init' >&2")
        .line(format!(
            "        echo {TIMEOUT_EXIT_CODE} > \"$ws/{MAIN_COMPLETE_MARKER}\""
        ))
        .line(format!("        exit {TIMEOUT_EXIT_CODE}"))
        .line("    fi")
        .line(format!("    sleep {}", params.poll_secs))
        .line(format!("    waited=$((waited+{}))", params.poll_secs))
        .line("done")
        .line(format!("mkdir -p \"$ws/{MAIN_CONTAINER_DIR}\""))
        // A missing workdir is still an outcome: record it in the
        // main-complete marker so the sidecar does not wait out its timeout.
        .line(format!("if ! cd {}; then", sh_quote(&params.workdir)))
        .line("    echo 'working directory is missing' >&2")
        .line(format!("    echo 1 > \"$ws/{MAIN_COMPLETE_MARKER}\""))
        .line("    exit 1")
        .line("fi")
        .line(format!(
            "{{ sh -c {cmd}; echo \"$?\" > \"$ws/{MAIN_CONTAINER_DIR}/rc\"; }} 2>&1 | tee -a \"$ws/{MAIN_CONTAINER_DIR}/{MAIN_LOG_FILE}\"",
            cmd = sh_quote(&params.command)
        ))
        .line(format!("rc=$(cat \"$ws/{MAIN_CONTAINER_DIR}/rc\")"))
        .line(format!("echo \"$rc\" > \"$ws/{MAIN_COMPLETE_MARKER}\""))
        .line("exit \"$rc\"");

    script.render()
}
