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

//! Command-line interface for stevedore: validating invocations, rendering
//! the generated container scripts, launching tasks, and serving as the
//! in-container handshake agent.

pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod utils;

pub use cli::{AgentCommands, Cli, Commands};
pub use utils::logging::init_logging;
