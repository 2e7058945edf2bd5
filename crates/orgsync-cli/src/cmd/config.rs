use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use orgsync_core::config::{Config, WarnLevel};
use orgsync_core::course::{Roster, RosterProject};
use orgsync_core::io::write_if_missing;
use orgsync_core::types::Semester;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a default config and an example roster next to it
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config, defaults included
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init { force } => init(config_path, force),
        ConfigSubcommand::Show => show(config_path, json),
        ConfigSubcommand::Validate => validate(config_path, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(config_path: &Path, force: bool) -> anyhow::Result<()> {
    let config = Config::default();

    if force {
        config.save(config_path).context("failed to write config")?;
        println!("Wrote {}", config_path.display());
    } else {
        let yaml = serde_yaml::to_string(&config)?;
        if write_if_missing(config_path, yaml.as_bytes()).context("failed to write config")? {
            println!("Wrote {}", config_path.display());
        } else {
            println!("{} already exists; keeping it", config_path.display());
        }
    }

    let roster_path = config.roster_path(config_path);
    let semester = Semester::current();
    let example = Roster {
        current_semester: None,
        projects: vec![RosterProject {
            slug: "example-project".to_string(),
            semester,
            mailing_list: Some("example-project@example.org".to_string()),
        }],
    };
    let yaml = serde_yaml::to_string(&example)?;
    if write_if_missing(&roster_path, yaml.as_bytes()).context("failed to write roster")? {
        println!("Wrote {}", roster_path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("failed to load config")?;
    if json {
        print_json(&config)?;
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
