//! Sync run configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::util::normalize_base_url;

/// Raw v2fly `domain-list-community` data directory.
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/v2fly/domain-list-community/master/data/";

/// Object-group name prefix that marks a group as managed.
pub const DEFAULT_PREFIX: &str = "domain-list";

/// Per-group capacity used when the caller does not set one.
pub const DEFAULT_MAX_ENTRIES_PER_GROUP: usize = 300;

/// Options for a single reconciliation run.
///
/// Every field is optional in the JSON form; missing keys fall back to the
/// defaults below.
///
/// # Example
///
/// ```
/// use keenetic_geosite_sync::SyncConfig;
///
/// let config = SyncConfig::new("domain-list")
///     .with_route_interface("Wireguard0")
///     .with_max_entries_per_group(50);
///
/// assert_eq!(config.prefix, "domain-list");
/// assert_eq!(config.max_entries_per_group, 50);
/// assert!(config.dry_run);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncConfig {
    /// Root locator; a list key is appended to it (URL-encoded).
    pub base_url: String,

    /// Timeout for a single fetch attempt, in milliseconds.
    pub timeout_ms: u64,

    /// Fetch attempts per list before giving up.
    pub retries: u32,

    /// Name prefix of managed object-groups.
    pub prefix: String,

    /// Print the commands instead of applying them.
    pub dry_run: bool,

    /// Interface that managed groups are routed through (e.g. `Wireguard0`).
    pub route_interface: Option<String>,

    /// Maximum number of domains in one object-group.
    pub max_entries_per_group: usize,

    /// Descriptions used to create groups when none exist yet.
    pub initial_domains: Vec<String>,

    /// Running configuration to reconcile against instead of asking the router.
    pub running_config_text: Option<String>,

    /// Overall deadline for planning, in milliseconds.
    pub deadline_ms: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 15_000,
            retries: 3,
            prefix: DEFAULT_PREFIX.to_string(),
            dry_run: true,
            route_interface: None,
            max_entries_per_group: DEFAULT_MAX_ENTRIES_PER_GROUP,
            initial_domains: Vec::new(),
            running_config_text: None,
            deadline_ms: None,
        }
    }
}

impl SyncConfig {
    /// Creates a dry-run config managing groups named `<prefix>...`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be read and
    /// [`SyncError::Json`] if it is not a valid config document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded sync config");
        Ok(config)
    }

    /// Overrides the list source root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the per-attempt fetch timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Overrides the number of fetch attempts.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Switches between printing and applying commands.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Routes managed groups through `interface`.
    #[must_use]
    pub fn with_route_interface(mut self, interface: impl Into<String>) -> Self {
        self.route_interface = Some(interface.into());
        self
    }

    /// Overrides the per-group capacity.
    #[must_use]
    pub const fn with_max_entries_per_group(mut self, max: usize) -> Self {
        self.max_entries_per_group = max;
        self
    }

    /// Sets the seed descriptions used when no managed group exists.
    #[must_use]
    pub fn with_initial_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Reconciles against `text` instead of the router's running config.
    #[must_use]
    pub fn with_running_config_text(mut self, text: impl Into<String>) -> Self {
        self.running_config_text = Some(text.into());
        self
    }

    /// Bounds the whole planning phase.
    #[must_use]
    pub const fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Base URL with a guaranteed trailing slash.
    #[must_use]
    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.base_url)
    }

    /// Per-attempt fetch timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Route interface, ignoring blank values.
    #[must_use]
    pub fn route_interface(&self) -> Option<&str> {
        self.route_interface
            .as_deref()
            .map(str::trim)
            .filter(|iface| !iface.is_empty())
    }

    /// Checks option values before any I/O happens.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(SyncError::InvalidConfig("prefix must not be empty".into()));
        }
        if self.prefix.chars().any(char::is_whitespace) {
            return Err(SyncError::InvalidConfig(format!(
                "prefix must not contain whitespace, got {:?}",
                self.prefix
            )));
        }
        if self.max_entries_per_group == 0 {
            return Err(SyncError::InvalidConfig(
                "maxEntriesPerGroup must be a positive integer, got 0".into(),
            ));
        }
        if self.retries == 0 {
            return Err(SyncError::InvalidConfig("retries must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(SyncError::InvalidConfig("timeoutMs must be positive".into()));
        }
        if self.deadline_ms == Some(0) {
            return Err(SyncError::InvalidConfig("deadlineMs must be positive".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(SyncError::InvalidConfig("baseUrl must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let c = SyncConfig::new("geo");
        assert_eq!(c.prefix, "geo");
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.retries, 3);
        assert_eq!(c.max_entries_per_group, DEFAULT_MAX_ENTRIES_PER_GROUP);
        assert!(c.dry_run);
        assert!(c.route_interface().is_none());
        c.validate().unwrap();
    }

    #[test]
    fn blank_route_interface_is_ignored() {
        let c = SyncConfig::default().with_route_interface("  ");
        assert!(c.route_interface().is_none());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = SyncConfig::default()
            .with_max_entries_per_group(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_empty_prefix_and_zero_retries() {
        assert!(SyncConfig::new("").validate().is_err());
        assert!(SyncConfig::default().with_retries(0).validate().is_err());
        assert!(SyncConfig::default().with_timeout_ms(0).validate().is_err());
    }

    #[test]
    fn loads_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "baseUrl": "https://mirror.test/data",
                "prefix": "geo",
                "dryRun": false,
                "routeInterface": "Wireguard0",
                "maxEntriesPerGroup": 50,
                "initialDomains": ["Youtube", "Discord"]
            }"#,
        )
        .unwrap();

        let c = SyncConfig::from_file(&path).unwrap();
        assert_eq!(c.normalized_base_url(), "https://mirror.test/data/");
        assert_eq!(c.prefix, "geo");
        assert!(!c.dry_run);
        assert_eq!(c.route_interface(), Some("Wireguard0"));
        assert_eq!(c.max_entries_per_group, 50);
        assert_eq!(c.initial_domains, vec!["Youtube", "Discord"]);
        assert_eq!(c.timeout_ms, 15_000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "prefx": "typo" }"#).unwrap();
        assert!(matches!(
            SyncConfig::from_file(&path),
            Err(SyncError::Json(_))
        ));
    }
}
