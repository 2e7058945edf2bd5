use crate::error::{OrgSyncError, Result};
use crate::paths;
use crate::policy::DENY_ALL_POLICY;
use crate::preflight::REQUIRED_ACTIONS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// AwsConfig
// ---------------------------------------------------------------------------

/// Connection settings. Unset fields fall back to the standard AWS
/// environment (env vars, shared profile, instance role).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Override the service endpoint, e.g. for a local emulator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

// ---------------------------------------------------------------------------
// OrganizationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationConfig {
    /// Parent of the course iteration OUs. Defaults to the organization root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ou_id: Option<String>,
}

// ---------------------------------------------------------------------------
// PollingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Status polls per account-creation request before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_seconds() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

// ---------------------------------------------------------------------------
// AccountsConfig
// ---------------------------------------------------------------------------

/// The temporary tag marks a freshly created account until it has been
/// moved out of the organization root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_temporary_tag_key")]
    pub temporary_tag_key: String,
    #[serde(default = "default_temporary_tag_value")]
    pub temporary_tag_value: String,
}

fn default_temporary_tag_key() -> String {
    "course_iteration_tag".to_string()
}

fn default_temporary_tag_value() -> String {
    "no_iteration".to_string()
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            temporary_tag_key: default_temporary_tag_key(),
            temporary_tag_value: default_temporary_tag_value(),
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Reuse this existing SCP instead of looking it up by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    #[serde(default = "default_policy_name")]
    pub name: String,
    #[serde(default = "default_policy_description")]
    pub description: String,
    /// Policy document (JSON). Defaults to deny-all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

fn default_policy_name() -> String {
    "orgsync-deny-all".to_string()
}

fn default_policy_description() -> String {
    "Deny all actions in student project accounts".to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            policy_id: None,
            name: default_policy_name(),
            description: default_policy_description(),
            content: None,
        }
    }
}

impl PolicyConfig {
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or(DENY_ALL_POLICY)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default = "default_required_actions")]
    pub required_actions: Vec<String>,
    /// Course roster export, relative to the config file.
    #[serde(default = "default_roster")]
    pub roster: PathBuf,
}

fn default_version() -> u32 {
    1
}

fn default_required_actions() -> Vec<String> {
    REQUIRED_ACTIONS.iter().map(|a| a.to_string()).collect()
}

fn default_roster() -> PathBuf {
    PathBuf::from(paths::ROSTER_FILE)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            aws: AwsConfig::default(),
            organization: OrganizationConfig::default(),
            polling: PollingConfig::default(),
            accounts: AccountsConfig::default(),
            policy: PolicyConfig::default(),
            required_actions: default_required_actions(),
            roster: default_roster(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(OrgSyncError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Roster location, resolved against the config file's directory.
    pub fn roster_path(&self, config_path: &Path) -> PathBuf {
        paths::relative_to_config(config_path, &self.roster)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.polling.max_attempts == 0 {
            push(
                WarnLevel::Error,
                "polling.max_attempts is 0: account creation would never be checked".to_string(),
            );
        } else if self.polling.max_attempts > 10 {
            push(
                WarnLevel::Warning,
                format!(
                    "polling.max_attempts={} (>10 is unusual)",
                    self.polling.max_attempts
                ),
            );
        }

        if self.polling.interval_seconds == 0 {
            push(
                WarnLevel::Warning,
                "polling.interval_seconds is 0: status will be polled without pause".to_string(),
            );
        }

        if self.required_actions.is_empty() {
            push(
                WarnLevel::Error,
                "required_actions is empty: the permission check would pass vacuously".to_string(),
            );
        }
        for action in &self.required_actions {
            if !action.contains(':') {
                push(
                    WarnLevel::Warning,
                    format!("required action '{action}' is not of the form 'service:Action'"),
                );
            }
        }

        if self.accounts.temporary_tag_key.trim().is_empty() {
            push(
                WarnLevel::Error,
                "accounts.temporary_tag_key is empty".to_string(),
            );
        }

        if self.policy.policy_id.is_none() && self.policy.name.trim().is_empty() {
            push(
                WarnLevel::Error,
                "policy.name is empty and no policy.policy_id is set".to_string(),
            );
        }

        if serde_json::from_str::<serde_json::Value>(self.policy.content()).is_err() {
            push(
                WarnLevel::Error,
                "policy.content is not a valid JSON document".to_string(),
            );
        }

        warnings
    }

    /// Error-level findings of [`Config::validate`]. A run refuses to start
    /// while any remain.
    pub fn errors(&self) -> Vec<ConfigWarning> {
        self.validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("version: 1\n").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.polling.interval(), Duration::from_secs(5));
        assert_eq!(cfg.polling.max_attempts, 3);
        assert_eq!(cfg.accounts.temporary_tag_key, "course_iteration_tag");
        assert!(cfg
            .required_actions
            .contains(&"organizations:CreateAccount".to_string()));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(paths::CONFIG_FILE);
        let mut cfg = Config::default();
        cfg.organization.parent_ou_id = Some("ou-abcd-1234".to_string());
        cfg.polling.max_attempts = 10;
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join(paths::CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, OrgSyncError::ConfigNotFound(_)));
    }

    #[test]
    fn unset_optionals_are_not_serialized() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(!yaml.contains("parent_ou_id"));
        assert!(!yaml.contains("endpoint_url"));
        assert!(!yaml.contains("policy_id"));
    }

    #[test]
    fn roster_path_is_relative_to_config() {
        let cfg = Config::default();
        assert_eq!(
            cfg.roster_path(Path::new("/srv/orgsync/orgsync.yaml")),
            PathBuf::from("/srv/orgsync/roster.yaml")
        );
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_settings() {
        let mut cfg = Config::default();
        cfg.polling.max_attempts = 0;
        cfg.polling.interval_seconds = 0;
        cfg.required_actions.clear();
        cfg.policy.content = Some("{not json".to_string());

        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 3);
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("interval_seconds")));
    }

    #[test]
    fn errors_exclude_plain_warnings() {
        let mut cfg = Config::default();
        cfg.polling.max_attempts = 25;
        assert!(cfg.errors().is_empty());

        cfg.polling.max_attempts = 0;
        let errors = cfg.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("max_attempts"));
    }

    #[test]
    fn validate_warns_on_many_attempts() {
        let mut cfg = Config::default();
        cfg.polling.max_attempts = 25;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }
}
