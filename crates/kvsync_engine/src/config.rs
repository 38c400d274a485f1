//! Configuration for the sync engine.

use crate::error::SyncError;
use kvsync_protocol::{BatchLimits, DeletePolicy};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How a process drives the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncMode {
    /// Compute and report, never write.
    DryRun,
    /// One apply, then exit.
    #[default]
    Once,
    /// Apply on a timer until an error or the iteration bound.
    Poll,
    /// Apply on each HTTP trigger.
    Hook,
}

impl SyncMode {
    /// Returns the flag spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::DryRun => "DRYRUN",
            SyncMode::Once => "ONCE",
            SyncMode::Poll => "POLL",
            SyncMode::Hook => "HOOK",
        }
    }

    /// Returns true if the mode writes to the store.
    pub fn writes(&self) -> bool {
        !matches!(self, SyncMode::DryRun)
    }
}

impl FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRYRUN" | "DRY" => Ok(SyncMode::DryRun),
            "ONCE" => Ok(SyncMode::Once),
            "POLL" => Ok(SyncMode::Poll),
            "HOOK" => Ok(SyncMode::Hook),
            _ => Err(SyncError::BadConfig(format!(
                "invalid strategy '{}', expected one of: DRYRUN, ONCE, POLL, HOOK",
                s
            ))),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Consul base URL, e.g. `http://127.0.0.1:8500`.
    pub consul_url: String,
    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,
    /// KV prefix the live dataset is read from.
    pub base_path: String,
    /// Stance toward live-only paths.
    pub delete_policy: DeletePolicy,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transaction bounds.
    pub batch_limits: BatchLimits,
    /// Mutual TLS material.
    pub tls: Option<TlsConfig>,
    /// Poll loop settings.
    pub poll: PollConfig,
}

impl SyncConfig {
    /// Creates a configuration for the given Consul URL.
    pub fn new(consul_url: impl Into<String>) -> Self {
        Self {
            consul_url: consul_url.into(),
            token: None,
            base_path: String::new(),
            delete_policy: DeletePolicy::default(),
            timeout: Duration::from_secs(5),
            batch_limits: BatchLimits::default(),
            tls: None,
            poll: PollConfig::default(),
        }
    }

    /// Sets the ACL token. An empty token is treated as none.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Sets the KV base path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Sets the delete policy.
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transaction bounds.
    pub fn with_batch_limits(mut self, limits: BatchLimits) -> Self {
        self.batch_limits = limits;
        self
    }

    /// Enables mutual TLS.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets the poll loop settings.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }
}

/// PEM files for mutual TLS against Consul.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Client certificate.
    pub cert_file: PathBuf,
    /// Client private key (PKCS#8).
    pub key_file: PathBuf,
    /// CA bundle used to verify the server.
    pub ca_file: Option<PathBuf>,
}

impl TlsConfig {
    /// Creates a TLS configuration from a client certificate and key.
    pub fn new(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            ca_file: None,
        }
    }

    /// Sets the CA bundle.
    pub fn with_ca_file(mut self, ca_file: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(ca_file.into());
        self
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between iterations.
    pub interval: Duration,
    /// Stop after this many iterations. `None` loops forever.
    pub max_iterations: Option<u64>,
}

impl PollConfig {
    /// Creates an unbounded poll configuration.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_iterations: None,
        }
    }

    /// Bounds the number of iterations.
    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Returns true once `completed` iterations exhaust the bound.
    pub fn is_exhausted(&self, completed: u64) -> bool {
        self.max_iterations.is_some_and(|max| completed >= max)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("http://consul:8500")
            .with_token("secret")
            .with_base_path("apps/")
            .with_delete_policy(DeletePolicy::Skip)
            .with_timeout(Duration::from_secs(10))
            .with_batch_limits(BatchLimits::new(8, 1024));

        assert_eq!(config.consul_url, "http://consul:8500");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.base_path, "apps/");
        assert_eq!(config.delete_policy, DeletePolicy::Skip);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.batch_limits.max_operations, 8);
        assert!(config.tls.is_none());
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::new("http://consul:8500").with_token("");
        assert!(config.token.is_none());
        assert_eq!(config.delete_policy, DeletePolicy::Deny);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.poll.interval, Duration::from_secs(60));
    }

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!("dryrun".parse::<SyncMode>().unwrap(), SyncMode::DryRun);
        assert_eq!(" Poll ".parse::<SyncMode>().unwrap(), SyncMode::Poll);
        assert_eq!("HOOK".parse::<SyncMode>().unwrap(), SyncMode::Hook);
        assert_eq!(SyncMode::default(), SyncMode::Once);
        assert!(!SyncMode::DryRun.writes());

        let err = "sometimes".parse::<SyncMode>().unwrap_err();
        assert_eq!(err.exit_code(), 20);
    }

    #[test]
    fn poll_bound() {
        let unbounded = PollConfig::new(Duration::from_millis(1));
        assert!(!unbounded.is_exhausted(1_000_000));

        let bounded = unbounded.with_max_iterations(3);
        assert!(!bounded.is_exhausted(2));
        assert!(bounded.is_exhausted(3));
    }
}
