//! The compact opcode abbreviation scheme
//!
//! An alternative, denser encoding that reserves first bytes 0x00-0x0F as
//! opcodes: fixed 3/7/11-byte prefixes, per-peer index references, and
//! index assignments piggybacked on prefixes or full addresses. Keeping a
//! replica of every neighbour's index table costs about 8 KiB per node,
//! so this implementation parses every opcode but allocates no indices:
//! assignments are acknowledged and dropped, and index references are
//! answered as unsupported so the sender falls back to a resolvable form.
//!
//! The emit side uses the recently-seen address cache to pick between a
//! 7-byte prefix (the receiver almost certainly knows the rest) and the
//! full address.

use tracing::debug;

use vajra_core::{FrameBuffer, FrameReader, NodeId, NODE_ID_LEN};

use crate::error::{CodecError, ConfigError};

const CODE_INDEX1: u8 = 0x01;
const CODE_PREFIX3: u8 = 0x05;
const CODE_PREFIX7: u8 = 0x06;
const CODE_PREFIX11: u8 = 0x07;
const CODE_FULL_INDEX1: u8 = 0x08;
const CODE_PREFIX3_INDEX1: u8 = 0x09;
const CODE_PREFIX7_INDEX1: u8 = 0x0A;
const CODE_PREFIX11_INDEX1: u8 = 0x0B;
const CODE_PREFIX11_INDEX2: u8 = 0x0D;
const CODE_FULL_INDEX2: u8 = 0x0E;
const CODE_BROADCAST: u8 = 0x0F;

/// Largest address cache: the index uses the first 24 bits of the id
const MAX_CACHE_SIZE: usize = 1 << 24;

/// Outcome of expanding one compact address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactOutcome {
    /// The full identifier was recovered
    Resolved(NodeId),
    /// Link-local broadcast
    Broadcast,
    /// A prefix that is not in the cache; ask the sender to explain
    NeedsExplain,
    /// An opcode this node keeps no state for; tell the sender so it
    /// stops using it
    Unsupported(u8),
}

/// Direct-mapped cache of recently seen full identifiers
///
/// Conclusively resolving short prefixes needs a recently-seen cache:
/// without one, the birthday paradox and deliberately mined colliding
/// prefixes would let an attacker divert other nodes' traffic.
pub struct AddressCache {
    sids: Vec<NodeId>,
    shift: u32,
}

impl AddressCache {
    /// Create a cache with `size` slots (a power of two, at most 2^24)
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if size == 0 || size > MAX_CACHE_SIZE {
            return Err(ConfigError::CacheSizeOutOfRange(size));
        }
        if !size.is_power_of_two() {
            return Err(ConfigError::CacheSizeNotPowerOfTwo(size));
        }
        Ok(Self {
            sids: vec![NodeId::new([0u8; NODE_ID_LEN]); size],
            shift: 24 - size.trailing_zeros(),
        })
    }

    // Slot for an id, from its first 24 bits
    fn index(&self, id: &[u8]) -> usize {
        let key = (id[0] as u32) << 16 | (id[1] as u32) << 8 | id[2] as u32;
        (key >> self.shift) as usize
    }

    /// Note that an identifier was seen; returns whether it was already
    /// cached
    pub fn observe(&mut self, sid: &NodeId) -> bool {
        let index = self.index(sid.as_bytes());
        if self.sids[index] == *sid {
            return true;
        }
        self.sids[index] = *sid;
        false
    }

    /// Recover the full identifier behind a prefix, if its slot holds a
    /// matching entry
    pub fn lookup_prefix(&self, prefix: &[u8]) -> Option<NodeId> {
        let entry = self.sids[self.index(prefix)];
        (&entry.as_bytes()[..prefix.len()] == prefix).then_some(entry)
    }
}

/// Emit a compact encoding of an address
///
/// Identifiers the cache has seen recently go out as a 7-byte prefix; the
/// receiver has very likely cached them too. Everything else goes out in
/// full, which is also what teaches caches in the first place.
pub fn compact_address(
    cache: &mut AddressCache,
    out: &mut FrameBuffer,
    sid: &NodeId,
) -> Result<(), CodecError> {
    if !sid.is_wire_valid() {
        return Err(CodecError::ReservedAddress(sid.as_bytes()[0]));
    }

    if cache.observe(sid) {
        out.append_byte(CODE_PREFIX7)?;
        out.append_bytes(&sid.as_bytes()[..7])?;
    } else {
        out.append_bytes(sid.as_bytes())?;
    }
    Ok(())
}

/// Parse one compact address
///
/// Every opcode is consumed at its correct length even when the outcome is
/// `Unsupported`, so the rest of the frame stays parseable.
pub fn expand_compact(
    cache: &mut AddressCache,
    rdr: &mut FrameReader<'_>,
) -> Result<CompactOutcome, CodecError> {
    let code = rdr.peek_byte()?;
    match code {
        0x00 | 0x02 | 0x03 | 0x04 | 0x0C => {
            rdr.read_byte()?;
            debug!(code, "reserved compact address code");
            Ok(CompactOutcome::Unsupported(code))
        }

        CODE_INDEX1 => {
            rdr.read_byte()?;
            let index = rdr.read_byte()?;
            debug!(index, "index reference without an index table");
            Ok(CompactOutcome::Unsupported(code))
        }

        CODE_PREFIX3 | CODE_PREFIX3_INDEX1 => {
            let index_bytes = usize::from(code == CODE_PREFIX3_INDEX1);
            prefix_lookup(cache, rdr, 3, index_bytes)
        }

        CODE_PREFIX7 | CODE_PREFIX7_INDEX1 => {
            let index_bytes = usize::from(code == CODE_PREFIX7_INDEX1);
            prefix_lookup(cache, rdr, 7, index_bytes)
        }

        CODE_PREFIX11 | CODE_PREFIX11_INDEX1 | CODE_PREFIX11_INDEX2 => {
            let index_bytes = match code {
                CODE_PREFIX11_INDEX1 => 1,
                CODE_PREFIX11_INDEX2 => 2,
                _ => 0,
            };
            prefix_lookup(cache, rdr, 11, index_bytes)
        }

        CODE_FULL_INDEX1 | CODE_FULL_INDEX2 => {
            rdr.read_byte()?;
            let sid = read_full_id(rdr)?;
            let index_bytes = if code == CODE_FULL_INDEX2 { 2 } else { 1 };
            let index = read_index(rdr, index_bytes)?;
            debug!(sid = %sid, index, "ignoring index assignment");
            cache.observe(&sid);
            Ok(CompactOutcome::Resolved(sid))
        }

        CODE_BROADCAST => {
            rdr.read_byte()?;
            Ok(CompactOutcome::Broadcast)
        }

        // First byte >= 0x10: an unabbreviated address
        _ => {
            let sid = read_full_id(rdr)?;
            cache.observe(&sid);
            Ok(CompactOutcome::Resolved(sid))
        }
    }
}

fn read_full_id(rdr: &mut FrameReader<'_>) -> Result<NodeId, CodecError> {
    let mut bytes = [0u8; NODE_ID_LEN];
    bytes.copy_from_slice(rdr.read_bytes(NODE_ID_LEN)?);
    Ok(NodeId::new(bytes))
}

fn prefix_lookup(
    cache: &AddressCache,
    rdr: &mut FrameReader<'_>,
    prefix_len: usize,
    index_bytes: usize,
) -> Result<CompactOutcome, CodecError> {
    rdr.read_byte()?;
    let prefix = rdr.read_bytes(prefix_len)?;
    let index = read_index(rdr, index_bytes)?;

    match cache.lookup_prefix(prefix) {
        Some(sid) => {
            if index_bytes > 0 {
                // Resolvable now regardless; remembering the assignment
                // could only save bandwidth later
                debug!(sid = %sid, index, "ignoring index assignment");
            }
            Ok(CompactOutcome::Resolved(sid))
        }
        None => Ok(CompactOutcome::NeedsExplain),
    }
}

fn read_index(rdr: &mut FrameReader<'_>, index_bytes: usize) -> Result<u16, CodecError> {
    let mut index = 0u16;
    for _ in 0..index_bytes {
        index = index << 8 | rdr.read_byte()? as u16;
    }
    Ok(index)
}
