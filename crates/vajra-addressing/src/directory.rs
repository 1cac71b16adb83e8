//! The subscriber directory
//!
//! A 16-way radix trie keyed by the successive nibbles of a node ID. Each
//! trie slot is empty, holds a subscriber leaf, or holds a child node; a
//! leaf sits at the shallowest depth that distinguishes it from every
//! other subscriber, which makes the minimum unambiguous prefix of each
//! node a property of the structure itself.
//!
//! Trie nodes and subscribers live in arenas indexed by opaque handles.
//! Nothing is ever freed: `next_hop` back-references between subscribers
//! stay valid for the process lifetime.

use vajra_core::{nibble_at, NodeId, NODE_ID_LEN};

use crate::subscriber::{Reachability, Subscriber, SubscriberId};

const FANOUT: usize = 16;

#[derive(Debug, Clone, Copy)]
struct TrieNodeId(u32);

#[derive(Debug, Clone, Copy, Default)]
enum Slot {
    #[default]
    Empty,
    Leaf(SubscriberId),
    Child(TrieNodeId),
}

#[derive(Debug)]
struct TrieNode {
    slots: [Slot; FANOUT],
}

impl TrieNode {
    fn new() -> Self {
        Self {
            slots: [Slot::Empty; FANOUT],
        }
    }
}

/// Directory of every node this process has ever heard of
#[derive(Debug)]
pub struct Directory {
    nodes: Vec<TrieNode>,
    subscribers: Vec<Subscriber>,
    self_node: Option<SubscriberId>,
    directory_service: Option<SubscriberId>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new()],
            subscribers: Vec::new(),
            self_node: None,
            directory_service: None,
        }
    }

    /// Number of known subscribers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscribers are known
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Access a subscriber record
    pub fn subscriber(&self, id: SubscriberId) -> &Subscriber {
        &self.subscribers[id.0 as usize]
    }

    /// Mutate a subscriber record
    pub fn subscriber_mut(&mut self, id: SubscriberId) -> &mut Subscriber {
        &mut self.subscribers[id.0 as usize]
    }

    /// Insert the local node and mark it reachable as ourselves
    pub fn set_self(&mut self, sid: NodeId) -> SubscriberId {
        let id = self
            .find_or_insert(sid.as_bytes(), true)
            .expect("inserting a full-length id cannot be ambiguous");
        self.subscriber_mut(id).reachable = Reachability::SELF;
        self.self_node = Some(id);
        id
    }

    /// The local node, if [`set_self`](Self::set_self) has run
    pub fn self_subscriber(&self) -> Option<SubscriberId> {
        self.self_node
    }

    /// Insert and remember the directory-service node; its reachability
    /// transitions trigger registration
    pub fn set_directory_service(&mut self, sid: NodeId) -> SubscriberId {
        let id = self
            .find_or_insert(sid.as_bytes(), true)
            .expect("inserting a full-length id cannot be ambiguous");
        self.directory_service = Some(id);
        id
    }

    /// The configured directory-service node
    pub fn directory_service(&self) -> Option<SubscriberId> {
        self.directory_service
    }

    /// Find a subscriber from a whole or abbreviated node ID, optionally
    /// inserting it.
    ///
    /// Returns `None` when the prefix is ambiguous (several known
    /// subscribers share it) or unknown without `create`. Insertion
    /// requires the full 32 bytes; `create` is ignored for anything
    /// shorter.
    pub fn find_or_insert(&mut self, id: &[u8], create: bool) -> Option<SubscriberId> {
        let create = create && id.len() == NODE_ID_LEN;
        let max_pos = id.len() * 2;
        let mut node = TrieNodeId(0);
        let mut pos = 0;

        while pos < max_pos {
            let nibble = nibble_at(id, pos) as usize;
            pos += 1;

            match self.nodes[node.0 as usize].slots[nibble] {
                Slot::Child(child) => node = child,

                Slot::Empty => {
                    // Subscriber is not yet known
                    if !create {
                        return None;
                    }
                    let sid = NodeId::from_slice(id).expect("create implies full length");
                    let new = SubscriberId(self.subscribers.len() as u32);
                    self.subscribers.push(Subscriber::new(sid, pos as u8));
                    self.nodes[node.0 as usize].slots[nibble] = Slot::Leaf(new);
                    return Some(new);
                }

                Slot::Leaf(existing) => {
                    // A subscriber sits in this slot; does it match the
                    // rest of the id we were given?
                    let existing_sid = self.subscribers[existing.0 as usize].sid;
                    if &existing_sid.as_bytes()[..id.len()] == id {
                        return Some(existing);
                    }

                    // Inserting here means pushing the resident one level
                    // deeper first, then continuing the descent.
                    if !create {
                        return None;
                    }
                    let child = TrieNodeId(self.nodes.len() as u32);
                    self.nodes.push(TrieNode::new());
                    self.nodes[node.0 as usize].slots[nibble] = Slot::Child(child);

                    let moved = existing_sid.nibble(pos) as usize;
                    self.nodes[child.0 as usize].slots[moved] = Slot::Leaf(existing);
                    self.subscribers[existing.0 as usize].abbreviate_len = pos as u8 + 1;

                    node = child;
                }
            }
        }

        // The whole prefix was consumed inside a shared subtree:
        // abbreviation is not unique
        None
    }

    /// Read-only lookup of a whole or abbreviated node ID
    pub fn find(&self, id: &[u8]) -> Option<SubscriberId> {
        let max_pos = id.len() * 2;
        let mut node = TrieNodeId(0);
        let mut pos = 0;

        while pos < max_pos {
            let nibble = nibble_at(id, pos) as usize;
            pos += 1;

            match self.nodes[node.0 as usize].slots[nibble] {
                Slot::Child(child) => node = child,
                Slot::Empty => return None,
                Slot::Leaf(leaf) => {
                    let sid = self.subscribers[leaf.0 as usize].sid;
                    return (&sid.as_bytes()[..id.len()] == id).then_some(leaf);
                }
            }
        }
        None
    }

    /// Walk every subscriber in identifier order, starting at `start`
    /// (inclusive) when given. The callback returns `true` to stop.
    pub fn enumerate_from<F>(&self, start: Option<&NodeId>, mut callback: F)
    where
        F: FnMut(SubscriberId, &Subscriber) -> bool,
    {
        self.walk(
            TrieNodeId(0),
            0,
            start.map(|s| s.as_bytes().as_slice()),
            None,
            &mut callback,
        );
    }

    /// Walk every subscriber whose identifier starts with `prefix`
    pub fn walk_prefix<F>(&self, prefix: &[u8], mut callback: F)
    where
        F: FnMut(SubscriberId, &Subscriber) -> bool,
    {
        self.walk(TrieNodeId(0), 0, Some(prefix), Some(prefix), &mut callback);
    }

    /// Collect the subscribers matching `prefix`
    pub fn matching_prefix(&self, prefix: &[u8]) -> Vec<SubscriberId> {
        let mut out = Vec::new();
        self.walk_prefix(prefix, |id, _| {
            out.push(id);
            false
        });
        out
    }

    /// Depth-first in-order walk. `start` selects the first slot at each
    /// level until the first branch has been taken, then stops applying:
    /// it prunes only the left edge of the walk. `end` bounds the last
    /// slot at every level. Returns `true` if the callback stopped the
    /// walk.
    fn walk(
        &self,
        node: TrieNodeId,
        pos: usize,
        mut start: Option<&[u8]>,
        end: Option<&[u8]>,
        callback: &mut dyn FnMut(SubscriberId, &Subscriber) -> bool,
    ) -> bool {
        let mut first = 0;
        if let Some(s) = start {
            if pos < s.len() * 2 {
                first = nibble_at(s, pos) as usize;
            }
        }

        let mut last = FANOUT;
        if let Some(e) = end {
            if pos < e.len() * 2 {
                last = nibble_at(e, pos) as usize + 1;
            }
        }

        for i in first..last {
            match self.nodes[node.0 as usize].slots[i] {
                Slot::Child(child) => {
                    if self.walk(child, pos + 1, start, end, callback) {
                        return true;
                    }
                }
                Slot::Leaf(leaf) => {
                    if callback(leaf, &self.subscribers[leaf.0 as usize]) {
                        return true;
                    }
                }
                Slot::Empty => {}
            }
            // Only the leftmost branch of the walk is bounded by start
            start = None;
        }
        false
    }
}
