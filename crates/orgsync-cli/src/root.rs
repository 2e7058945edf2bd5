use orgsync_core::paths::{find_config, CONFIG_FILE};
use std::path::{Path, PathBuf};

/// Resolve the config file path.
///
/// Priority:
/// 1. `--config` flag / `ORGSYNC_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `orgsync.yaml`
/// 3. Fall back to `cwd/orgsync.yaml`
pub fn resolve_config(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_config(&cwd).unwrap_or_else(|| cwd.join(CONFIG_FILE))
}
