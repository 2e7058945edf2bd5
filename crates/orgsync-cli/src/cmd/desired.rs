use crate::cmd::{load_config, load_roster};
use crate::output::{print_json, print_table};
use orgsync_core::course::{desired_state, CourseCatalog};
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let roster = load_roster(config_path, &config)?;

    let semester = roster.current_semester()?;
    let records = desired_state(&roster)?;

    if json {
        return print_json(&serde_json::json!({
            "semester": semester,
            "records": records,
        }));
    }

    if records.is_empty() {
        println!("No contactable projects in {semester}.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| vec![r.project_slug.clone(), r.member_email.clone()])
        .collect();
    print_table(&["PROJECT", "EMAIL"], rows);
    println!();
    println!("{} projects in {semester}.", records.len());
    Ok(())
}
