//! Policy engine configuration.
//!
//! Provides [`PolicyConfig`], loaded from environment variables like the other
//! RustStack service configs.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default identity-policy size limit in bytes.
pub const DEFAULT_MAX_IAM_POLICY_SIZE: usize = 6144;

/// Policy engine configuration.
///
/// # Examples
///
/// ```
/// use ruststack_iam_policy_core::config::PolicyConfig;
///
/// let config = PolicyConfig::default();
/// assert_eq!(config.max_iam_policy_size, 6144);
/// assert!(config.catalog_dir.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Directory holding replacement catalog files. `None` uses the bundled catalogs.
    #[builder(default)]
    pub catalog_dir: Option<String>,

    /// Maximum size of an identity policy, in bytes of compact JSON.
    #[builder(default = DEFAULT_MAX_IAM_POLICY_SIZE)]
    pub max_iam_policy_size: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            catalog_dir: None,
            max_iam_policy_size: DEFAULT_MAX_IAM_POLICY_SIZE,
            log_level: String::from("info"),
        }
    }
}

impl PolicyConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `POLICY_CATALOG_DIR` | unset (bundled catalogs) |
    /// | `POLICY_MAX_IAM_POLICY_SIZE` | `6144` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Unparsable numbers keep their default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("POLICY_CATALOG_DIR")
            && !v.is_empty()
        {
            config.catalog_dir = Some(v);
        }
        if let Ok(v) = std::env::var("POLICY_MAX_IAM_POLICY_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            config.max_iam_policy_size = n;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}
