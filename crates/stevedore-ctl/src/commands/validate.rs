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

/// Parses and validates an invocation payload without touching any
/// external service, then prints a short summary of what a launch would do.
pub fn validate(input: &Path) -> anyhow::Result<()> {
    let invocation = super::read_invocation(input)?;
    invocation
        .validate()
        .context("invocation failed validation")?;

    println!("Invocation is valid.");
    println!("  image:     {}", invocation.image);
    println!("  cluster:   {}", invocation.cluster);
    println!("  command:   {}", invocation.cmd_to_run);
    let plan = invocation.mountpoint_plan();
    if plan.is_empty() {
        println!("  content:   (none)");
    } else {
        for mountpoint in &plan {
            println!("  content:   {} <- {}", mountpoint.name, mountpoint.reference);
        }
    }
    println!(
        "  callback:  {}",
        if invocation.wants_callback() {
            "workflow token supplied"
        } else {
            "none (fire-and-forget)"
        }
    );

    Ok(())
}
