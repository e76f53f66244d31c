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

use anyhow::Result;
use clap::Parser;
use stevedore_ctl::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    let config = config::ConfigLoader::new().load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { ref input } => {
            commands::validate(input)?;
        }
        Commands::Render { ref input, ref side } => {
            commands::render(input, side, &config)?;
        }
        Commands::Launch { ref input, json } => {
            commands::launch(input, json, &config).await?;
        }
        Commands::Agent(ref agent) => {
            // Agent processes are the container entrypoints; their exit
            // status is the handshake outcome, so they never return here.
            let code = match agent {
                AgentCommands::Main { input, workspace } => {
                    commands::agent_main(input, workspace, &config).await?
                }
                AgentCommands::Sidecar { input, workspace } => {
                    commands::agent_sidecar(input, workspace, &config).await?
                }
            };
            std::process::exit(code);
        }
    }

    Ok(())
}
