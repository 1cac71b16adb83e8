//! Link-layer interface table
//!
//! The overlay runs over one or more link-layer interfaces (radio, wifi,
//! ethernet). The addressing core never drives interfaces itself; it only
//! needs to know whether the interface a subscriber is bound to is still
//! up, and to resolve interface names from host configuration.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Opaque handle into an [`InterfaceTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceId(u32);

/// Operational state of a link-layer interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceState {
    Up,
    Down,
}

/// A single link-layer interface
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub state: InterfaceState,
}

/// Table of known link-layer interfaces
///
/// Interfaces are registered once and flip between up and down as the
/// link layer reports; handles stay valid for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct InterfaceTable {
    interfaces: Vec<Interface>,
}

impl InterfaceTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interface, returning its handle
    pub fn register(&mut self, name: impl Into<String>, state: InterfaceState) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len() as u32);
        self.interfaces.push(Interface {
            name: name.into(),
            state,
        });
        id
    }

    /// Find an interface by name
    pub fn find_by_name(&self, name: &str) -> Option<InterfaceId> {
        self.interfaces
            .iter()
            .position(|i| i.name == name)
            .map(|i| InterfaceId(i as u32))
    }

    /// Get an interface by handle
    pub fn get(&self, id: InterfaceId) -> Option<&Interface> {
        self.interfaces.get(id.0 as usize)
    }

    /// Update the state of an interface
    pub fn set_state(&mut self, id: InterfaceId, state: InterfaceState) {
        if let Some(iface) = self.interfaces.get_mut(id.0 as usize) {
            iface.state = state;
        }
    }

    /// Whether the interface exists and is up
    pub fn is_up(&self, id: InterfaceId) -> bool {
        self.get(id).is_some_and(|i| i.state == InterfaceState::Up)
    }

    /// Number of registered interfaces
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Whether no interfaces are registered
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl Display for InterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceState::Up => write!(f, "up"),
            InterfaceState::Down => write!(f, "down"),
        }
    }
}
