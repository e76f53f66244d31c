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

//! Launch orchestration against a scripted scheduler: call ordering, the
//! scoped-deregistration guarantee, and the rendered sidecar override.

use std::sync::Arc;

use stevedore::error::LaunchError;
use stevedore::invocation::TaskInvocation;
use stevedore::launcher::TaskLauncher;

use crate::support::MockScheduler;

fn invocation(extra: &str) -> TaskInvocation {
    let payload = format!(
        r#"{{
            "image": "registry.example.com/worker:1",
            "cmd_to_run": "python job.py",
            "content": "s3://bucket/job.tar.gz",
            "subnets": ["subnet-1"],
            "security_groups": ["sg-1"],
            "ecs_cluster": "batch",
            "task_execution_role_arn": "arn:aws:iam::1:role/exec",
            "log_stream_prefix": "nightly-job"
            {extra}
        }}"#
    );
    TaskInvocation::from_json(&payload).unwrap()
}

#[tokio::test]
async fn successful_launch_registers_runs_and_deregisters() {
    let scheduler = Arc::new(MockScheduler::default());
    let launcher = TaskLauncher::new(Arc::clone(&scheduler) as Arc<_>);

    let outcome = launcher
        .launch(&invocation(r#", "token": "tok-123""#))
        .await
        .unwrap();

    let registered = scheduler.registered.lock().unwrap().clone();
    assert_eq!(registered.len(), 1);
    assert!(registered[0].starts_with("nightly-job"));

    let runs = scheduler.run_requests.lock().unwrap().clone();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].cluster, "batch");
    assert_eq!(runs[0].task_definition, outcome.task_definition);
    assert_eq!(runs[0].network.subnets, vec!["subnet-1"]);

    // The revision is gone by the time launch() returns.
    let deregistered = scheduler.deregistered.lock().unwrap().clone();
    assert_eq!(deregistered, vec![outcome.task_definition.clone()]);
    assert!(outcome.task_arn.contains(&outcome.task_definition));
}

#[tokio::test]
async fn sidecar_override_carries_the_handshake() {
    let scheduler = Arc::new(MockScheduler::default());
    let launcher = TaskLauncher::new(Arc::clone(&scheduler) as Arc<_>);

    launcher
        .launch(&invocation(r#", "token": "tok-123""#))
        .await
        .unwrap();

    let runs = scheduler.run_requests.lock().unwrap().clone();
    let script = &runs[0].sidecar_command;
    assert!(script.contains("sidecar-init-complete"));
    assert!(script.contains("main-complete"));
    assert!(script.contains("'tok-123'"));
    assert!(script.contains("s3://bucket/job.tar.gz"));
}

#[tokio::test]
async fn fire_and_forget_launch_renders_no_callback() {
    let scheduler = Arc::new(MockScheduler::default());
    let launcher = TaskLauncher::new(Arc::clone(&scheduler) as Arc<_>);

    launcher.launch(&invocation("")).await.unwrap();

    let runs = scheduler.run_requests.lock().unwrap().clone();
    assert!(!runs[0].sidecar_command.contains("send-task-"));
}

#[tokio::test]
async fn invalid_invocation_makes_no_scheduler_call() {
    let scheduler = Arc::new(MockScheduler::default());
    let launcher = TaskLauncher::new(Arc::clone(&scheduler) as Arc<_>);

    let mut bad = invocation("");
    bad.image.clear();
    let err = launcher.launch(&bad).await.unwrap_err();

    assert!(matches!(err, LaunchError::Validation(_)));
    assert!(scheduler.registered.lock().unwrap().is_empty());
    assert!(scheduler.run_requests.lock().unwrap().is_empty());
    assert!(scheduler.deregistered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn registration_failure_stops_before_launch() {
    let scheduler = Arc::new(MockScheduler::refusing_registration());
    let launcher = TaskLauncher::new(Arc::clone(&scheduler) as Arc<_>);

    let err = launcher.launch(&invocation("")).await.unwrap_err();

    assert!(matches!(err, LaunchError::Scheduler(_)));
    assert!(scheduler.run_requests.lock().unwrap().is_empty());
    assert!(scheduler.deregistered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn refused_launch_still_deregisters_the_definition() {
    let scheduler = Arc::new(MockScheduler::refusing_launches());
    let launcher = TaskLauncher::new(Arc::clone(&scheduler) as Arc<_>);

    let err = launcher.launch(&invocation("")).await.unwrap_err();

    assert!(matches!(err, LaunchError::Scheduler(_)));
    let deregistered = scheduler.deregistered.lock().unwrap().clone();
    assert_eq!(deregistered.len(), 1);
}
