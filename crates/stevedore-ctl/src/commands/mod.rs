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

pub mod agent;
pub mod launch;
pub mod render;
pub mod validate;

pub use agent::{agent_main, agent_sidecar};
pub use launch::launch;
pub use render::render;
pub use validate::validate;

use anyhow::Context;
use std::io::Read;
use std::path::Path;

use stevedore::TaskInvocation;

/// Reads an invocation payload from a file, or stdin when the path is `-`.
pub(crate) fn read_invocation(input: &Path) -> anyhow::Result<TaskInvocation> {
    let payload = if input == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read invocation from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("failed to read invocation from {}", input.display()))?
    };

    TaskInvocation::from_json(&payload).context("invocation payload is not valid JSON")
}
