//! Addressing configuration
//!
//! Everything here has a sensible default; deployments override the host
//! list and, on memory-constrained hardware, the address cache size.

use serde::{Deserialize, Serialize};

use vajra_core::NodeId;

use crate::abbrev::AddressCache;
use crate::error::ConfigError;
use crate::hosts::HostsConfig;

/// Configuration for the addressing core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressingConfig {
    /// Slots in the recently-seen address cache; a power of two
    pub address_cache_size: usize,
    /// Node offering directory registration, if any
    pub directory_service: Option<NodeId>,
    /// Statically configured unicast hosts
    pub hosts: HostsConfig,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            address_cache_size: 1024,
            directory_service: None,
            hosts: HostsConfig::default(),
        }
    }
}

impl AddressingConfig {
    /// Build the address cache this configuration describes
    pub fn address_cache(&self) -> Result<AddressCache, ConfigError> {
        AddressCache::new(self.address_cache_size)
    }

    /// Validate configuration invariants
    ///
    /// Returns a list of warnings; an empty list means the configuration
    /// is valid.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !self.address_cache_size.is_power_of_two()
            || self.address_cache_size > 1 << 24
            || self.address_cache_size == 0
        {
            warnings.push(ConfigWarning::InvalidCacheSize);
        }

        for (i, host) in self.hosts.hosts.iter().enumerate() {
            if !host.sid.is_wire_valid() {
                warnings.push(ConfigWarning::ReservedHostId(i));
            }
            if host.port == 0 {
                warnings.push(ConfigWarning::ZeroHostPort(i));
            }
        }

        warnings
    }

    /// Check if the configuration is valid (no warnings)
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Configuration warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Cache size is not a power of two in 1..=2^24
    InvalidCacheSize,
    /// Host entry at this position has a reserved first byte
    ReservedHostId(usize),
    /// Host entry at this position has port 0
    ZeroHostPort(usize),
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::InvalidCacheSize => {
                write!(f, "address_cache_size must be a power of two in 1..=2^24")
            }
            ConfigWarning::ReservedHostId(i) => {
                write!(f, "host entry {i} has a reserved identifier first byte")
            }
            ConfigWarning::ZeroHostPort(i) => write!(f, "host entry {i} has port 0"),
        }
    }
}
