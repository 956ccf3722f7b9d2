//! Group snapshot controller configuration.
//!
//! Environment variables:
//! - `VGS_ENABLE_GROUP_SNAPSHOTS`: set to `0` to turn every sync into a no-op.
//!   Defaults to `1` (enabled).
//! - `VGS_CONFLICT_RETRIES`: how many times a read-modify-write is reloaded
//!   after a concurrent update before the conflict is returned.  Defaults to `5`.

use std::sync::LazyLock;

const DEFAULT_CONFLICT_RETRIES: u32 = 5;

/// Settings for [`GroupSnapshotController`](crate::GroupSnapshotController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Feature gate for group snapshot reconciliation.
    pub enable_group_snapshots: bool,
    /// Reload-and-retry budget for optimistic concurrency conflicts.
    pub conflict_retries: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            enable_group_snapshots: true,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl ControllerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            enable_group_snapshots: lookup("VGS_ENABLE_GROUP_SNAPSHOTS")
                .map(|v| v != "0")
                .unwrap_or(true),
            conflict_retries: lookup("VGS_CONFLICT_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CONFLICT_RETRIES),
        }
    }
}

/// Globally initialized configuration, read from environment variables at first access.
pub static CONFIG: LazyLock<ControllerConfig> = LazyLock::new(ControllerConfig::from_env);
