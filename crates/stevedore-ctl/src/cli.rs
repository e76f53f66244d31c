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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stevedore-ctl",
    version,
    about = "Command-line interface for launching single-use container tasks",
    long_about = "A tool for validating, rendering, launching, and supervising \
                  two-container compute tasks with workflow-engine callbacks"
)]
pub struct Cli {
    /// Path to a configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an invocation payload without any scheduler call
    Validate {
        /// Path to the JSON invocation payload, or "-" for stdin
        input: PathBuf,
    },

    /// Render the generated container scripts for an invocation
    Render {
        /// Path to the JSON invocation payload, or "-" for stdin
        input: PathBuf,

        /// Which part to print (main, sidecar, taskdef, all)
        #[arg(long, default_value = "all")]
        side: String,
    },

    /// Register, launch, and deregister one task
    Launch {
        /// Path to the JSON invocation payload, or "-" for stdin
        input: PathBuf,

        /// Print the launch outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// In-container handshake agents
    #[command(subcommand)]
    Agent(AgentCommands),
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Run the workload side of the handshake
    Main {
        /// Path to the JSON invocation payload, or "-" for stdin
        input: PathBuf,

        /// Root of the shared workspace volume
        #[arg(long, default_value = "/tmp/workspace")]
        workspace: PathBuf,
    },

    /// Run the controller side of the handshake
    Sidecar {
        /// Path to the JSON invocation payload, or "-" for stdin
        input: PathBuf,

        /// Root of the shared workspace volume
        #[arg(long, default_value = "/tmp/workspace")]
        workspace: PathBuf,
    },
}
