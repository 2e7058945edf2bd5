use crate::cmd::{connect, load_config, load_roster};
use crate::output::{print_anomalies, print_json, print_table};
use orgsync_core::reconcile::Reconciler;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let roster = load_roster(config_path, &config)?;
    let client = connect(&config)?;

    let plan = Reconciler::new(&client, &roster, &config).plan()?;

    if json {
        return print_json(&plan);
    }

    if plan.to_create.is_empty() {
        println!(
            "Organization is in sync for {} ({} projects).",
            plan.semester,
            plan.desired.len()
        );
    } else {
        let rows = plan
            .to_create
            .iter()
            .map(|r| {
                vec![
                    r.member_email.clone(),
                    r.project_slug.clone(),
                    r.account_name(),
                ]
            })
            .collect();
        print_table(&["EMAIL", "PROJECT", "ACCOUNT NAME"], rows);
        println!();
        println!(
            "{} of {} accounts would be created in '{}'.",
            plan.to_create.len(),
            plan.desired.len(),
            plan.semester
        );
    }
    print_anomalies(&plan.anomalies);
    Ok(())
}
