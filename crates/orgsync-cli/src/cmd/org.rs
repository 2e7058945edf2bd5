use crate::cmd::{connect, load_config};
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use orgsync_core::api::{FeatureSet, OrgApi};
use std::path::Path;

#[derive(Subcommand)]
pub enum OrgSubcommand {
    /// Create an organization (all features) with the caller as management account
    Create,

    /// Show the caller's organization
    Show,
}

pub fn run(config_path: &Path, subcmd: OrgSubcommand, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let client = connect(&config)?;

    let organization = match subcmd {
        OrgSubcommand::Create => {
            let org = client
                .create_organization(FeatureSet::All)
                .context("failed to create the AWS organization")?;
            tracing::info!(organization = %org.id, "created AWS organization");
            org
        }
        OrgSubcommand::Show => client
            .describe_organization()
            .context("failed to describe the AWS organization")?,
    };

    if json {
        return print_json(&organization);
    }

    println!("Organization:       {}", organization.id);
    println!("Management account: {}", organization.management_account_id);
    if let Some(feature_set) = &organization.feature_set {
        println!("Feature set:        {feature_set}");
    }
    println!(
        "SCP enabled:        {}",
        if organization.scp_enabled() { "yes" } else { "no" }
    );
    Ok(())
}
