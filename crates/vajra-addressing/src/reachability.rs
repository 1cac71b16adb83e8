//! Reachability validation and transitions
//!
//! The `reachable` field stored on a subscriber is a claim, not a fact:
//! interfaces go down and next hops disappear between updates. Reads go
//! through [`Directory::resolve`], which validates the claim against live
//! interface state and, for indirect routes, against the next hop's own
//! effective reachability.

use std::net::{Ipv4Addr, SocketAddrV4};

use tracing::{debug, warn};

use vajra_core::{InterfaceId, InterfaceTable, Keyring, Registrar};

use crate::directory::Directory;
use crate::error::ReachabilityError;
use crate::subscriber::{Reachability, SubscriberId};

// An indirect route must terminate at a directly reachable hop, so valid
// chains are short; the cap only guards against corrupted next_hop cycles.
const MAX_HOP_CHAIN: usize = 8;

impl Directory {
    /// Effective reachability of a subscriber, validating the stored state
    /// rather than merely reading it
    pub fn resolve(
        &self,
        interfaces: &InterfaceTable,
        subscriber: Option<SubscriberId>,
    ) -> Reachability {
        self.resolve_at(interfaces, subscriber, 0)
    }

    fn resolve_at(
        &self,
        interfaces: &InterfaceTable,
        subscriber: Option<SubscriberId>,
        depth: usize,
    ) -> Reachability {
        let Some(id) = subscriber else {
            return Reachability::NONE;
        };
        if depth > MAX_HOP_CHAIN {
            return Reachability::NONE;
        }

        let sub = self.subscriber(id);
        let mut ret = sub.reachable;

        if ret.intersects(Reachability::INDIRECT) {
            match sub.next_hop {
                None => ret = Reachability::NONE,
                Some(hop) => {
                    if !self
                        .subscriber(hop)
                        .reachable
                        .contains(Reachability::DIRECT)
                    {
                        // An indirect route through another indirect hop
                        // is not a route
                        ret = Reachability::NONE;
                    } else {
                        let via = self.resolve_at(interfaces, Some(hop), depth + 1);
                        if via.intersects(Reachability::ASSUMED)
                            || !via.contains(Reachability::DIRECT)
                        {
                            ret = Reachability::NONE;
                        }
                    }
                }
            }
        }

        if ret.contains(Reachability::DIRECT) {
            // Make sure the interface is still up
            match sub.interface {
                None => ret = Reachability::NONE,
                Some(iface) => {
                    if !interfaces.is_up(iface) {
                        ret = Reachability::NONE;
                    }
                }
            }
        }

        ret
    }

    /// Transition a subscriber's stored reachability
    ///
    /// On a real change this logs the transition, requests a signing-key
    /// exchange for newly reachable nodes whose key lookup has not
    /// completed, and triggers directory-service registration when the
    /// configured directory-service node comes within reach.
    pub fn set_reachable(
        &mut self,
        id: SubscriberId,
        reachable: Reachability,
        keyring: &mut dyn Keyring,
        registrar: &mut dyn Registrar,
    ) {
        if self.subscriber(id).reachable == reachable {
            return;
        }
        self.subscriber_mut(id).reachable = reachable;

        let sub = self.subscriber(id);
        if reachable.is_none() {
            debug!(sid = %sub.sid, "not reachable");
        } else if reachable.intersects(Reachability::INDIRECT) {
            let via = sub
                .next_hop
                .map(|h| self.subscriber(h).sid.to_string())
                .unwrap_or_else(|| "none".to_string());
            debug!(sid = %sub.sid, via = %via, "reachable indirectly");
        } else if !reachable.intersects(Reachability::SELF) {
            debug!(sid = %sub.sid, mode = %reachable, "reachable");
        }

        // Pre-emptively kick off the key exchange
        let sub = self.subscriber(id);
        if !sub.signing_key_known && reachable.intersects(Reachability::ANY) {
            keyring.request_signing_key(&sub.sid);
        }

        if self.directory_service() == Some(id) {
            registrar.register_self();
        }
    }

    /// Record that a subscriber answered from a unicast address
    ///
    /// Refused when the subscriber is already reachable by any mode or is
    /// already tracked by the routing layer.
    pub fn reachable_unicast(
        &mut self,
        id: SubscriberId,
        interface: InterfaceId,
        addr: Ipv4Addr,
        port: u16,
        keyring: &mut dyn Keyring,
        registrar: &mut dyn Registrar,
    ) -> Result<(), ReachabilityError> {
        let sub = self.subscriber(id);
        if sub.reachable.intersects(Reachability::ANY) {
            warn!(sid = %sub.sid, reachable = %sub.reachable, "subscriber is already reachable");
            return Err(ReachabilityError::AlreadyReachable(sub.sid));
        }
        if sub.has_route {
            warn!(sid = %sub.sid, "subscriber is already tracked for overlay routing");
            return Err(ReachabilityError::AlreadyRouted(sub.sid));
        }

        let sub = self.subscriber_mut(id);
        sub.interface = Some(interface);
        sub.address = Some(SocketAddrV4::new(addr, port));
        self.set_reachable(id, Reachability::UNICAST, keyring, registrar);
        Ok(())
    }
}
