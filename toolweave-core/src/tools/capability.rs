//! Capability-based permission grants
//!
//! Tools declare the capabilities they need; the execution context carries a
//! [`CapabilityPolicy`] describing what the caller has been granted. Policies
//! are deny-by-default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Capabilities a tool may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read files and list directories
    FileRead,

    /// Create, modify or delete files
    FileWrite,

    /// Make network requests
    Network,

    /// Spawn subprocesses
    ProcessSpawn,

    /// Inspect host and process information
    SystemInfo,

    /// Read environment variables
    Environment,
}

impl Capability {
    /// Get all defined capabilities
    pub fn all() -> &'static [Capability] {
        &[
            Capability::FileRead,
            Capability::FileWrite,
            Capability::Network,
            Capability::ProcessSpawn,
            Capability::SystemInfo,
            Capability::Environment,
        ]
    }

    /// Capabilities that can change state outside the process
    pub fn privileged() -> &'static [Capability] {
        &[
            Capability::FileWrite,
            Capability::Network,
            Capability::ProcessSpawn,
        ]
    }

    /// Check if this capability is privileged
    pub fn is_privileged(&self) -> bool {
        Self::privileged().contains(self)
    }

    /// Get the string name of this capability
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FileRead => "file_read",
            Capability::FileWrite => "file_write",
            Capability::Network => "network",
            Capability::ProcessSpawn => "process_spawn",
            Capability::SystemInfo => "system_info",
            Capability::Environment => "environment",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: HashSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability
    pub fn add(&mut self, cap: Capability) -> &mut Self {
        self.capabilities.insert(cap);
        self
    }

    /// Remove a capability
    pub fn remove(&mut self, cap: Capability) -> &mut Self {
        self.capabilities.remove(&cap);
        self
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

/// Permission grant attached to an execution context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    /// Explicitly allowed capabilities
    allowed: CapabilitySet,

    /// Explicitly denied capabilities (takes precedence over allowed)
    denied: CapabilitySet,

    /// Allow capabilities not explicitly mentioned
    default_allow: bool,
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self::deny_all()
    }
}

impl CapabilityPolicy {
    /// Create a policy that denies every capability
    pub fn deny_all() -> Self {
        Self {
            allowed: CapabilitySet::new(),
            denied: CapabilitySet::new(),
            default_allow: false,
        }
    }

    /// Create a policy that grants every capability
    pub fn allow_all() -> Self {
        Self {
            allowed: Capability::all().iter().copied().collect(),
            denied: CapabilitySet::new(),
            default_allow: true,
        }
    }

    /// Grant only the non-privileged (read-side) capabilities
    pub fn read_only() -> Self {
        Self::deny_all().allow_many(
            Capability::all()
                .iter()
                .copied()
                .filter(|cap| !cap.is_privileged()),
        )
    }

    /// Allow a specific capability
    pub fn allow(mut self, cap: Capability) -> Self {
        self.allowed.add(cap);
        self.denied.remove(cap);
        self
    }

    /// Deny a specific capability
    pub fn deny(mut self, cap: Capability) -> Self {
        self.denied.add(cap);
        self.allowed.remove(cap);
        self
    }

    /// Allow multiple capabilities
    pub fn allow_many(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        for cap in caps {
            self.allowed.add(cap);
            self.denied.remove(cap);
        }
        self
    }

    /// Check if a capability is allowed by this policy
    pub fn is_allowed(&self, cap: Capability) -> bool {
        if self.denied.contains(cap) {
            return false;
        }
        if self.allowed.contains(cap) {
            return true;
        }
        self.default_allow
    }

    /// Check every required capability, returning the denied ones on failure
    pub fn check_all(&self, required: &CapabilitySet) -> Result<(), CapabilitySet> {
        let denied: CapabilitySet = required
            .iter()
            .copied()
            .filter(|cap| !self.is_allowed(*cap))
            .collect();

        if denied.is_empty() {
            Ok(())
        } else {
            Err(denied)
        }
    }
}
