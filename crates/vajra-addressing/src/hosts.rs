//! Statically configured unicast hosts
//!
//! An operator can pin a node to a known IPv4 address, typically for
//! infrastructure nodes that sit behind a gateway rather than on the
//! mesh. Configuration only seeds a probe; the subscriber becomes
//! reachable (as assumed unicast) when the probe's reply arrives.

use std::net::{Ipv4Addr, SocketAddrV4};

use serde::{Deserialize, Serialize};
use tracing::debug;

use vajra_core::{InterfaceTable, NodeId, ProbeTransport};

use crate::directory::Directory;
use crate::error::HostsError;
use crate::subscriber::{Reachability, SubscriberId};

/// One configured host entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    /// The node this entry pins
    pub sid: NodeId,
    /// Interface to probe on; unset means any
    #[serde(default)]
    pub interface: Option<String>,
    /// IPv4 address of the host
    pub address: Ipv4Addr,
    /// Overlay port on the host
    pub port: u16,
}

/// The configured host list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostsConfig {
    #[serde(default)]
    pub hosts: Vec<HostRecord>,
}

impl HostsConfig {
    /// Find the entry for a node, if one is configured
    pub fn lookup(&self, sid: &NodeId) -> Option<&HostRecord> {
        self.hosts.iter().find(|h| h.sid == *sid)
    }
}

/// Probe the configured address of a subscriber
///
/// Does nothing when the subscriber is already reachable or has no host
/// entry. Returns whether a probe was sent; an entry naming an unknown
/// interface is an error and the probe is skipped.
pub fn load_subscriber_address(
    directory: &Directory,
    hosts: &HostsConfig,
    interfaces: &InterfaceTable,
    transport: &mut dyn ProbeTransport,
    subscriber: SubscriberId,
) -> Result<bool, HostsError> {
    if directory
        .resolve(interfaces, Some(subscriber))
        .intersects(Reachability::ANY)
    {
        return Ok(false);
    }

    let sid = directory.subscriber(subscriber).sid;
    let Some(record) = hosts.lookup(&sid) else {
        return Ok(false);
    };

    let interface = match &record.interface {
        Some(name) => Some(interfaces.find_by_name(name).ok_or_else(|| {
            HostsError::UnknownInterface {
                sid,
                name: name.clone(),
            }
        })?),
        None => None,
    };

    let addr = SocketAddrV4::new(record.address, record.port);
    debug!(sid = %sid, addr = %addr, "probing configured unicast address");
    Ok(transport.send_probe(&sid, addr, interface))
}
