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

//! Generated in-container shell scripts.
//!
//! Both containers bootstrap from generated POSIX shell: the main container
//! runs the script assembled at registration time, the sidecar runs the
//! handshake script supplied as a per-launch command override. Every
//! caller-controlled value (command text, bundle references, callback
//! tokens, log identifiers) passes through [`sh_quote`] before it reaches
//! script text, so untrusted input can never terminate a quoting context.
//!
//! The scripts speak the same sentinel-file protocol as the in-process state
//! machines in [`crate::handshake`]; the marker names are shared constants.

mod main_runner;
mod sidecar;

pub use main_runner::{main_runner_script, MainScriptParams};
pub use sidecar::{sidecar_script, SidecarScriptParams};

/// Quotes a value for safe inclusion in shell text.
///
/// The value is wrapped in single quotes; embedded single quotes are closed,
/// escaped, and reopened (`'` becomes `'\''`). The result is always a single
/// shell word, regardless of input content.
pub fn sh_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Line-oriented shell script builder.
///
/// Keeps generated scripts readable in container logs and keeps the
/// renderers honest: text enters the script one line at a time, and
/// parameters are quoted at the call site with [`sh_quote`].
#[derive(Debug, Default)]
pub struct ShellScript {
    lines: Vec<String>,
}

impl ShellScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one line of script text.
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(text.into());
        self
    }

    /// Appends a blank separator line.
    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    /// Renders the script as newline-joined text.
    pub fn render(&self) -> String {
        let mut script = self.lines.join("\n");
        script.push('\n');
        script
    }
}
