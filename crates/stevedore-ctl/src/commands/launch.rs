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

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

use stevedore::TaskLauncher;

use crate::aws::AwsCli;
use crate::config::StevedoreConfig;

/// Registers, launches, and deregisters one task, then prints the outcome.
/// Returns once the scheduler has accepted the launch; the workload outcome
/// travels through the workflow callback.
pub async fn launch(input: &Path, json: bool, config: &StevedoreConfig) -> anyhow::Result<()> {
    let invocation = super::read_invocation(input)?;

    let scheduler = Arc::new(AwsCli::new(config.scheduler.region.clone()));
    let launcher = TaskLauncher::new(scheduler).with_options(config.launch_options());

    let outcome = launcher
        .launch(&invocation)
        .await
        .context("task launch failed")?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "taskDefinition": outcome.task_definition,
                "taskArn": outcome.task_arn,
            })
        );
    } else {
        println!("Task launch accepted.");
        println!("  definition: {}", outcome.task_definition);
        println!("  task arn:   {}", outcome.task_arn);
    }

    Ok(())
}
