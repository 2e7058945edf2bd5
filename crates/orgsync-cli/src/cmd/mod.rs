pub mod config;
pub mod desired;
pub mod diff;
pub mod org;
pub mod preflight;
pub mod run;
pub mod tree;

use anyhow::Context;
use orgsync_aws::AwsOrgClient;
use orgsync_core::config::Config;
use orgsync_core::course::Roster;
use std::path::Path;

pub(crate) fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    Config::load(config_path).context("failed to load config")
}

pub(crate) fn load_roster(config_path: &Path, config: &Config) -> anyhow::Result<Roster> {
    let path = config.roster_path(config_path);
    Roster::load(&path).with_context(|| format!("failed to load roster {}", path.display()))
}

pub(crate) fn connect(config: &Config) -> anyhow::Result<AwsOrgClient> {
    AwsOrgClient::new(&config.aws).context("failed to initialize the AWS client")
}
