use crate::cmd::{connect, load_config};
use crate::output::{print_anomalies, print_json, print_table};
use anyhow::Context;
use orgsync_core::checks::check_tree;
use orgsync_core::extract::extract;
use orgsync_core::reconcile::resolve_parent;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let client = connect(&config)?;

    let (_, parent) = resolve_parent(&client, &config.organization)
        .context("failed to resolve the iteration parent")?;
    let extraction = extract(&client, &parent)?;
    let violation = check_tree(&extraction.tree).err();

    if json {
        print_json(&serde_json::json!({
            "tree": extraction.tree,
            "anomalies": extraction.anomalies,
            "violation": violation.as_ref().map(|v| v.to_string()),
        }))?;
    } else if extraction.tree.iterations.is_empty() {
        println!("No course iteration OUs under {parent}.");
    } else {
        let mut rows = Vec::new();
        for iteration in &extraction.tree.iterations {
            if iteration.members.is_empty() {
                rows.push(vec![
                    iteration.name.clone(),
                    iteration.ou_id.clone(),
                    "-".to_string(),
                    "-".to_string(),
                ]);
            }
            for member in &iteration.members {
                rows.push(vec![
                    iteration.name.clone(),
                    iteration.ou_id.clone(),
                    member.member_email.clone(),
                    member.project_slug.clone(),
                ]);
            }
        }
        print_table(&["ITERATION", "OU", "EMAIL", "PROJECT"], rows);
        print_anomalies(&extraction.anomalies);
    }

    match violation {
        Some(v) => Err(v).context("organization tree is inconsistent"),
        None => Ok(()),
    }
}
