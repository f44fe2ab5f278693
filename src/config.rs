/*!
 * Module Configuration
 * Lease timings, package discovery and teardown settings
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{
    DEFAULT_LEASE_POLL_INTERVAL, DEFAULT_PACKAGE_EXTENSION, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_SPONSOR_RENEWAL,
};
use crate::lease::LeaseTerms;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Host-wide configuration for the module subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ModuleConfig {
    /// Terms issued for every cross-boundary object
    pub lease: LeaseTerms,
    /// Lifetime a sponsor grants at each checkpoint
    pub sponsor_renewal: Duration,
    /// Interval between lifetime-manager checkpoints
    pub poll_interval: Duration,
    /// Extension (without the dot) that marks a file as a module package
    pub package_extension: String,
    /// Copy packages into a shadow directory before launching them
    pub shadow_copy: bool,
    /// Time a boundary gets to exit on its own before it is killed
    pub shutdown_grace: Duration,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            lease: LeaseTerms::default(),
            sponsor_renewal: DEFAULT_SPONSOR_RENEWAL,
            poll_interval: DEFAULT_LEASE_POLL_INTERVAL,
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            shadow_copy: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ModuleConfig {
    /// Defaults overridden by `SNIP_*` environment variables
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("SNIP_LEASE_INITIAL_SECS") {
            config.lease.initial = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SNIP_LEASE_RENEW_ON_CALL_SECS") {
            config.lease.renew_on_call = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SNIP_LEASE_SPONSORSHIP_TIMEOUT_SECS") {
            config.lease.sponsorship_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SNIP_SPONSOR_RENEWAL_SECS") {
            config.sponsor_renewal = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SNIP_LEASE_POLL_SECS") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Ok(ext) = std::env::var("SNIP_PACKAGE_EXTENSION") {
            config.package_extension = ext.trim_start_matches('.').to_string();
        }
        if let Ok(value) = std::env::var("SNIP_SHADOW_COPY") {
            config.shadow_copy = value == "1" || value.eq_ignore_ascii_case("true");
        }
        if let Some(ms) = env_u64("SNIP_SHUTDOWN_GRACE_MS") {
            config.shutdown_grace = Duration::from_millis(ms);
        }

        config
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the timing relationships the lease protocol depends on
    ///
    /// Pinned terms (zero initial lease) skip the comparisons against the
    /// initial lease since no lease is ever issued under them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.package_extension.is_empty() {
            return Err(ConfigError::Invalid("package extension is empty".into()));
        }
        if self.lease.is_pinned() {
            if self.sponsor_renewal.is_zero() || self.poll_interval.is_zero() {
                return Err(ConfigError::Invalid(
                    "sponsor renewal and poll interval must be non-zero".into(),
                ));
            }
            return Ok(());
        }
        if self.sponsor_renewal.is_zero() || self.sponsor_renewal > self.lease.initial {
            return Err(ConfigError::Invalid(format!(
                "sponsor renewal {:?} must be non-zero and at most the initial lease {:?}",
                self.sponsor_renewal, self.lease.initial
            )));
        }
        if self.poll_interval.is_zero() || self.poll_interval > self.lease.initial {
            return Err(ConfigError::Invalid(format!(
                "poll interval {:?} must be non-zero and at most the initial lease {:?}",
                self.poll_interval, self.lease.initial
            )));
        }
        if self.lease.renew_on_call > self.lease.initial {
            return Err(ConfigError::Invalid(
                "renew-on-call time cannot exceed the initial lease".into(),
            ));
        }
        Ok(())
    }

    pub fn with_lease(mut self, lease: LeaseTerms) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_sponsor_renewal(mut self, renewal: Duration) -> Self {
        self.sponsor_renewal = renewal;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_package_extension(mut self, ext: impl Into<String>) -> Self {
        self.package_extension = ext.into();
        self
    }

    pub fn with_shadow_copy(mut self, enabled: bool) -> Self {
        self.shadow_copy = enabled;
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring unparseable configuration override");
            None
        }
    }
}
