//! Delete policy.

use crate::error::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// What to do with paths that exist in the store but not locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Report the deletes and abort the run before any write.
    #[default]
    Deny,
    /// Delete the paths as part of the transaction batches.
    Allow,
    /// Never compute deletes; live-only paths are left untouched.
    Skip,
}

impl DeletePolicy {
    /// Returns true if deletes should be computed at all.
    pub fn computes_deletes(&self) -> bool {
        !matches!(self, DeletePolicy::Skip)
    }

    /// Returns the flag spelling of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletePolicy::Deny => "false",
            DeletePolicy::Allow => "true",
            DeletePolicy::Skip => "skip",
        }
    }
}

impl FromStr for DeletePolicy {
    type Err = ProtocolError;

    /// Accepts the flag spellings (`false`, `true`, `skip`) and the
    /// descriptive ones (`deny`, `allow`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "false" | "deny" => Ok(DeletePolicy::Deny),
            "true" | "allow" => Ok(DeletePolicy::Allow),
            "skip" => Ok(DeletePolicy::Skip),
            _ => Err(ProtocolError::InvalidDeletePolicy(s.to_string())),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
