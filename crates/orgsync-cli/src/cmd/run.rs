use crate::cmd::{connect, load_config, load_roster};
use crate::output::{print_anomalies, print_json, print_table};
use orgsync_core::pipeline::{run_pipeline, FailureReason, PipelineResult, Stage};
use orgsync_core::preflight::PreflightCheck;
use std::path::Path;

// ---------------------------------------------------------------------------
// RunExit: typed non-zero exit codes, mapped to a process exit in main
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    PipelineFailed {
        stage: Stage,
        reason: FailureReason,
    },
    PreflightFailed {
        check: PreflightCheck,
    },
}

impl RunExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunExit::PipelineFailed { .. } => 2,
            RunExit::PreflightFailed { .. } => 3,
        }
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::PipelineFailed { stage, reason } => {
                write!(f, "pipeline failed at stage '{stage}' ({reason})")
            }
            RunExit::PreflightFailed { check } => {
                write!(f, "precondition '{check}' failed")
            }
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let errors = config.errors();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("[error] {}", e.message);
        }
        return Err(RunExit::PipelineFailed {
            stage: Stage::Start,
            reason: FailureReason::InvalidConfig,
        }
        .into());
    }
    let roster = load_roster(config_path, &config)?;
    let client = connect(&config)?;

    let result = run_pipeline(&client, &roster, &config);

    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }

    match (result.success, result.failure_reason) {
        (true, _) | (false, None) => Ok(()),
        (false, Some(reason)) => Err(RunExit::PipelineFailed {
            stage: result.stage,
            reason,
        }
        .into()),
    }
}

fn print_result(result: &PipelineResult) {
    if let Some(ou) = &result.iteration_ou_id {
        println!("Course iteration OU: {ou}");
    }
    if let Some(policy) = &result.policy_id {
        println!("SCP policy:          {policy}");
    }

    if result.accounts.is_empty() {
        if result.success {
            println!("No accounts to create.");
        }
    } else {
        println!();
        let rows = result
            .accounts
            .iter()
            .map(|r| {
                vec![
                    r.record.member_email.clone(),
                    r.record.project_slug.clone(),
                    r.outcome.describe(),
                ]
            })
            .collect();
        print_table(&["EMAIL", "PROJECT", "OUTCOME"], rows);
    }

    print_anomalies(&result.anomalies);

    println!();
    if result.success {
        println!("Pipeline finished.");
    } else if let Some(message) = &result.message {
        println!("Pipeline failed at {}: {message}", result.stage);
    }
}
