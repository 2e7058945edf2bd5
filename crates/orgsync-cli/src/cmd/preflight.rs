use crate::cmd::run::RunExit;
use crate::cmd::{connect, load_config};
use crate::output::print_json;
use orgsync_core::preflight::{run_preconditions, PreflightCheck};
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let client = connect(&config)?;

    match run_preconditions(&client, &config.required_actions) {
        Ok(report) => {
            if json {
                print_json(&serde_json::json!({
                    "passed": true,
                    "report": report,
                }))?;
            } else {
                for check in &report.passed {
                    println!("[ok] {check}");
                }
                println!();
                println!(
                    "Organization {} managed by {}",
                    report.organization.id, report.caller.account
                );
            }
            Ok(())
        }
        Err(e) => {
            let failed = e.check();
            if json {
                print_json(&serde_json::json!({
                    "passed": false,
                    "check": failed,
                    "error": e.to_string(),
                }))?;
            } else {
                for check in PreflightCheck::all()
                    .iter()
                    .take_while(|c| **c != failed)
                {
                    println!("[ok] {check}");
                }
                println!("[failed] {failed}: {e}");
            }
            Err(RunExit::PreflightFailed { check: failed }.into())
        }
    }
}
