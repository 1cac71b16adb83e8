//! Address wire codec and please-explain repair
//!
//! Addresses travel in one of three shapes: a one-byte sentinel for the
//! frame's sender (0xFF) or for the immediately preceding address in the
//! same frame (0xFE), or a length byte in 1..=32 followed by that many
//! leading bytes of the node ID. The encoder always emits the shortest
//! form that the directory says still resolves uniquely; the decoder
//! resolves against its own directory, and when a prefix matches nothing
//! or several candidates it queues a please-explain request instead of
//! failing the frame.
//!
//! Addressing state is threaded through every call as an explicit
//! [`FrameContext`]; nothing survives across frames.

use std::net::SocketAddrV4;

use tracing::{debug, info, warn};

use vajra_core::{FrameBuffer, FrameReader, InterfaceId, BROADCAST_PREFIX_LEN, NODE_ID_LEN};

use crate::broadcast::BroadcastId;
use crate::directory::Directory;
use crate::error::CodecError;
use crate::frame::{Frame, PacketQueue};
use crate::subscriber::{Reachability, SubscriberId};

/// Sentinel: the frame's sender
const CODE_SELF: u8 = 0xFF;
/// Sentinel: the immediately preceding address in this frame
const CODE_PREVIOUS: u8 = 0xFE;

/// TTL for a please-explain sent to a reachable destination
const EXPLAIN_TTL_UNICAST: u8 = 64;
/// TTL for a please-explain flooded to an unknown destination
const EXPLAIN_TTL_BROADCAST: u8 = 1;

/// Per-frame addressing state
///
/// Threaded explicitly through every encode and decode call; a context
/// never outlives the frame it was created for.
#[derive(Debug, Default)]
pub struct FrameContext {
    /// The frame's sender, once the header has established it
    pub sender: Option<SubscriberId>,
    /// The most recently resolved or emitted address
    pub previous: Option<SubscriberId>,
    /// Set when any address in the frame failed to resolve; authoritative
    /// for whether the decoded addresses may be used
    pub invalid_addresses: bool,
    /// Pending please-explain request, built up during decoding
    pub please_explain: Option<Frame>,
    /// Link the frame arrived on, for pre-resolved replies
    pub interface: Option<InterfaceId>,
    /// Address the frame arrived from
    pub addr: Option<SocketAddrV4>,
}

impl FrameContext {
    /// A fresh context for one frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish the frame's sender
    pub fn set_sender(&mut self, sender: SubscriberId) {
        self.sender = Some(sender);
    }
}

/// Result of decoding one inbound address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedAddress {
    /// Resolved to a known (possibly just learned) subscriber
    Subscriber(SubscriberId),
    /// Link-local broadcast framing; the BPI is recoverable only from a
    /// full-length literal
    Broadcast(Option<BroadcastId>),
    /// Could not be resolved; `invalid_addresses` is set and a
    /// please-explain entry has been queued on the context
    Unresolved,
}

impl Directory {
    /// Append the shortest safe encoding of a subscriber's address
    ///
    /// Emits the previous sentinel, the sender sentinel, or a length-
    /// prefixed leading slice of the node ID sized by the subscriber's
    /// minimum unambiguous prefix. A set `send_full` flag forces the full
    /// 32 bytes once and clears itself.
    pub fn append_address(
        &mut self,
        ctx: Option<&mut FrameContext>,
        buf: &mut FrameBuffer,
        subscriber: SubscriberId,
    ) -> Result<(), CodecError> {
        let is_sender = ctx
            .as_ref()
            .is_some_and(|c| c.sender == Some(subscriber));
        let is_previous = ctx
            .as_ref()
            .is_some_and(|c| c.previous == Some(subscriber));

        // Previous wins over sender: a repeated mention of the sender
        // collapses to 0xFE, and only its first mention (when nothing
        // precedes it) emits 0xFF
        if is_previous {
            buf.append_byte(CODE_PREVIOUS)?;
        } else if is_sender {
            buf.append_byte(CODE_SELF)?;
        } else {
            let sub = self.subscriber_mut(subscriber);
            let len = if sub.send_full {
                sub.send_full = false;
                NODE_ID_LEN
            } else {
                let mut len = (sub.abbreviate_len as usize + 2) / 2;
                if sub.reachable == Reachability::SELF {
                    // One spare byte of margin on our own address: peers
                    // may know subscribers we have never heard of
                    len += 1;
                }
                len.min(NODE_ID_LEN)
            };
            buf.append_byte(len as u8)?;
            buf.append_bytes(&sub.sid.as_bytes()[..len])?;
        }

        if let Some(c) = ctx {
            c.previous = Some(subscriber);
        }
        Ok(())
    }

    /// Decode one inbound address
    ///
    /// Unresolvable abbreviations and sentinels without their referent are
    /// not errors: the context is flagged, a please-explain entry is
    /// queued where applicable, and decoding of the rest of the frame can
    /// continue. Errors are only returned for malformed input, and are
    /// fatal for the frame.
    pub fn parse_address(
        &mut self,
        ctx: &mut FrameContext,
        rdr: &mut FrameReader<'_>,
    ) -> Result<DecodedAddress, CodecError> {
        let code = rdr.read_byte()?;
        match code {
            CODE_SELF => match ctx.sender {
                None => {
                    info!("could not resolve address, sender has not been set");
                    ctx.invalid_addresses = true;
                    Ok(DecodedAddress::Unresolved)
                }
                Some(sender) => {
                    ctx.previous = Some(sender);
                    Ok(DecodedAddress::Subscriber(sender))
                }
            },

            CODE_PREVIOUS => match ctx.previous {
                None => {
                    info!("unable to decode previous address, nothing precedes it");
                    ctx.invalid_addresses = true;
                    Ok(DecodedAddress::Unresolved)
                }
                Some(previous) => Ok(DecodedAddress::Subscriber(previous)),
            },

            len @ 1..=32 => {
                let len = len as usize;
                let id = rdr.read_bytes(len)?;

                if is_broadcast_prefix(id) {
                    let bpi = (len == NODE_ID_LEN).then(|| {
                        let mut bytes = [0u8; 8];
                        bytes.copy_from_slice(&id[BROADCAST_PREFIX_LEN..]);
                        BroadcastId::new(bytes)
                    });
                    return Ok(DecodedAddress::Broadcast(bpi));
                }

                match self.find_or_insert(id, true) {
                    Some(subscriber) => {
                        ctx.previous = Some(subscriber);
                        Ok(DecodedAddress::Subscriber(subscriber))
                    }
                    None => {
                        ctx.invalid_addresses = true;
                        self.request_explanation(ctx, id);
                        Ok(DecodedAddress::Unresolved)
                    }
                }
            }

            other => Err(CodecError::UnknownCode(other)),
        }
    }

    /// Queue a please-explain entry for an unresolvable prefix
    ///
    /// The request tells the peer which abbreviation we choked on, and
    /// also enumerates every known subscriber matching it, so the peer
    /// learns not to use an abbreviation that is too short.
    fn request_explanation(&mut self, ctx: &mut FrameContext, prefix: &[u8]) {
        for candidate in self.matching_prefix(prefix) {
            if self.push_explain_response(ctx, candidate) {
                break;
            }
        }

        info!(prefix = %hex::encode(prefix), "asking for explanation of ambiguous address");
        let frame = ctx.please_explain.get_or_insert_with(Frame::please_explain);
        if frame.payload.fits(1 + prefix.len()) {
            // Record lengths below 32 are requests rather than answers
            let _ = frame.payload.append_byte(prefix.len() as u8);
            let _ = frame.payload.append_bytes(prefix);
        }
    }

    /// Append one full-address record to the pending please-explain
    ///
    /// Returns `true` when the payload is full and the caller should stop.
    pub(crate) fn push_explain_response(
        &mut self,
        ctx: &mut FrameContext,
        subscriber: SubscriberId,
    ) -> bool {
        let frame = ctx.please_explain.get_or_insert_with(Frame::please_explain);
        if !frame.payload.fits(1 + NODE_ID_LEN) {
            return true;
        }

        let sub = self.subscriber_mut(subscriber);
        if sub.reachable == Reachability::SELF {
            // One of our identities is unknown out there; the header of
            // our next payload must carry our full id
            sub.send_full = true;
        }

        debug!(sid = %sub.sid, "adding full address by way of explanation");
        let record_ok = frame.payload.append_byte(NODE_ID_LEN as u8).is_ok()
            && frame.payload.append_bytes(sub.sid.as_bytes()).is_ok();
        !record_ok
    }

    /// Finalise and send the pending please-explain, if any
    ///
    /// Called once per inbound frame, after decoding finishes. A reachable
    /// destination gets a routed unicast request; otherwise the request is
    /// flooded one hop with a fresh broadcast id, pre-resolved onto the
    /// link it arrived on when that is known.
    pub fn send_please_explain(
        &mut self,
        ctx: &mut FrameContext,
        source: Option<SubscriberId>,
        destination: Option<SubscriberId>,
        queue: &mut dyn PacketQueue,
    ) -> bool {
        let Some(mut frame) = ctx.please_explain.take() else {
            return true;
        };

        let Some(source) = source.or_else(|| self.self_subscriber()) else {
            warn!("dropping please-explain, local identity is not set");
            return false;
        };
        frame.source = Some(source);
        self.subscriber_mut(source).send_full = true;
        frame.destination = destination;

        let stored = destination.map_or(Reachability::NONE, |d| self.subscriber(d).reachable);
        if stored.intersects(Reachability::ANY) {
            frame.ttl = EXPLAIN_TTL_UNICAST;
        } else {
            frame.ttl = EXPLAIN_TTL_BROADCAST;
            frame.broadcast_id = Some(BroadcastId::random());
            if ctx.interface.is_some() {
                frame.next_hop = destination;
                frame.recv_addr = ctx.addr;
                frame.interface = ctx.interface;
            }
        }

        queue.enqueue(frame)
    }

    /// Process an inbound request for explanation of abbreviations
    ///
    /// Full-length records teach us subscribers we did not know; shorter
    /// records are answered with every matching subscriber we do know.
    pub fn process_explain(
        &mut self,
        frame: &Frame,
        queue: &mut dyn PacketQueue,
    ) -> Result<(), CodecError> {
        let mut ctx = FrameContext::new();
        let mut rdr = frame.payload.reader();

        while !rdr.is_empty() {
            let len = rdr.read_byte()?;
            if len == 0 || len as usize > NODE_ID_LEN {
                return Err(CodecError::InvalidExplainRecord(len));
            }
            let id = rdr.read_bytes(len as usize)?;

            if len as usize == NODE_ID_LEN {
                // Explanations double as introductions; make sure we know
                // this one
                self.find_or_insert(id, true);
            } else {
                debug!(prefix = %hex::encode(id), "sending explain responses");
                for candidate in self.matching_prefix(id) {
                    if self.push_explain_response(&mut ctx, candidate) {
                        break;
                    }
                }
            }
        }

        self.send_please_explain(&mut ctx, frame.destination, frame.source, queue);
        Ok(())
    }
}

/// Append link-local broadcast framing carrying a BPI
pub fn append_broadcast(buf: &mut FrameBuffer, bpi: &BroadcastId) -> Result<(), CodecError> {
    buf.append_byte(NODE_ID_LEN as u8)?;
    buf.append_bytes(&[0xFF; BROADCAST_PREFIX_LEN])?;
    bpi.write_to(buf)?;
    Ok(())
}

/// Whether a literal address is link-local broadcast framing: every byte
/// of its overlap with the 24-byte all-ones prefix is set
fn is_broadcast_prefix(id: &[u8]) -> bool {
    id.iter()
        .take(BROADCAST_PREFIX_LEN)
        .all(|&b| b == 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockQueue;
    use vajra_core::NodeId;

    fn id(prefix: &[u8]) -> NodeId {
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes[..prefix.len()].copy_from_slice(prefix);
        NodeId::new(bytes)
    }

    fn insert(dir: &mut Directory, prefix: &[u8]) -> SubscriberId {
        dir.find_or_insert(id(prefix).as_bytes(), true).unwrap()
    }

    #[test]
    fn test_sender_and_previous_sentinels() {
        let mut dir = Directory::new();
        let s = insert(&mut dir, &[0x10]);
        let t = insert(&mut dir, &[0x20]);

        let mut ctx = FrameContext::new();
        ctx.set_sender(s);
        let mut buf = FrameBuffer::new();

        dir.append_address(Some(&mut ctx), &mut buf, s).unwrap();
        dir.append_address(Some(&mut ctx), &mut buf, s).unwrap();
        dir.append_address(Some(&mut ctx), &mut buf, t).unwrap();

        // sender, previous, then a 1-byte prefix for t
        assert_eq!(&buf.as_slice()[..3], &[0xFF, 0xFE, 0x01]);
        assert_eq!(buf.as_slice()[3], 0x20);
        assert_eq!(buf.len(), 4);

        // And it decodes back to the same pair on a receiver that already
        // knows both nodes (a short prefix cannot teach a new one)
        let mut rx = Directory::new();
        let rs = insert(&mut rx, &[0x10]);
        insert(&mut rx, &[0x20]);
        let mut rctx = FrameContext::new();
        rctx.set_sender(rs);
        let mut rdr = buf.reader();

        assert_eq!(
            rx.parse_address(&mut rctx, &mut rdr).unwrap(),
            DecodedAddress::Subscriber(rs)
        );
        assert_eq!(
            rx.parse_address(&mut rctx, &mut rdr).unwrap(),
            DecodedAddress::Subscriber(rs)
        );
        match rx.parse_address(&mut rctx, &mut rdr).unwrap() {
            DecodedAddress::Subscriber(rt) => {
                assert_eq!(rx.subscriber(rt).sid, id(&[0x20]));
            }
            other => panic!("expected subscriber, got {other:?}"),
        }
        assert!(!rctx.invalid_addresses);
    }

    #[test]
    fn test_sentinels_without_referent_flag_context() {
        let mut dir = Directory::new();
        let mut ctx = FrameContext::new();

        let data = [0xFFu8];
        let mut rdr = FrameReader::new(&data);
        assert_eq!(
            dir.parse_address(&mut ctx, &mut rdr).unwrap(),
            DecodedAddress::Unresolved
        );
        assert!(ctx.invalid_addresses);

        let mut ctx = FrameContext::new();
        let data = [0xFEu8];
        let mut rdr = FrameReader::new(&data);
        assert_eq!(
            dir.parse_address(&mut ctx, &mut rdr).unwrap(),
            DecodedAddress::Unresolved
        );
        assert!(ctx.invalid_addresses);
        assert!(ctx.please_explain.is_none());
    }

    #[test]
    fn test_send_full_forces_one_full_encoding() {
        let mut dir = Directory::new();
        let s = insert(&mut dir, &[0x42]);
        dir.subscriber_mut(s).send_full = true;

        let mut buf = FrameBuffer::new();
        dir.append_address(None, &mut buf, s).unwrap();
        assert_eq!(buf.as_slice()[0], 32);
        assert_eq!(buf.len(), 33);
        assert!(!dir.subscriber(s).send_full);

        // Next encoding is back to the short form
        let mut buf = FrameBuffer::new();
        dir.append_address(None, &mut buf, s).unwrap();
        assert_eq!(buf.as_slice()[0], 1);
    }

    #[test]
    fn test_own_address_gets_margin_byte() {
        let mut dir = Directory::new();
        let me = dir.set_self(id(&[0x42]));

        let mut buf = FrameBuffer::new();
        dir.append_address(None, &mut buf, me).unwrap();
        // abbreviate_len 1 nibble would give 1 byte; SELF bumps it to 2
        assert_eq!(buf.as_slice()[0], 2);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_full_roundtrip_on_empty_context() {
        let mut tx = Directory::new();
        let s = insert(&mut tx, &[0x42, 0x99]);
        tx.subscriber_mut(s).send_full = true;

        let mut buf = FrameBuffer::new();
        tx.append_address(None, &mut buf, s).unwrap();

        let mut rx = Directory::new();
        let mut ctx = FrameContext::new();
        let mut rdr = buf.reader();
        match rx.parse_address(&mut ctx, &mut rdr).unwrap() {
            DecodedAddress::Subscriber(r) => {
                assert_eq!(rx.subscriber(r).sid, id(&[0x42, 0x99]));
                assert_eq!(ctx.previous, Some(r));
            }
            other => panic!("expected subscriber, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_codes_are_fatal() {
        let mut dir = Directory::new();

        for code in [0x00u8, 0x21, 0x80, 0xFD] {
            let mut ctx = FrameContext::new();
            let data = [code];
            let mut rdr = FrameReader::new(&data);
            assert!(matches!(
                dir.parse_address(&mut ctx, &mut rdr),
                Err(CodecError::UnknownCode(c)) if c == code
            ));
        }

        // Truncated literal
        let mut ctx = FrameContext::new();
        let data = [0x04u8, 0xAA];
        let mut rdr = FrameReader::new(&data);
        assert!(matches!(
            dir.parse_address(&mut ctx, &mut rdr),
            Err(CodecError::Buffer(_))
        ));
    }

    #[test]
    fn test_broadcast_literal_never_enters_directory() {
        let mut dir = Directory::new();
        let bpi = BroadcastId::new([1, 2, 3, 4, 5, 6, 7, 8]);

        let mut buf = FrameBuffer::new();
        append_broadcast(&mut buf, &bpi).unwrap();

        let mut ctx = FrameContext::new();
        let mut rdr = buf.reader();
        assert_eq!(
            dir.parse_address(&mut ctx, &mut rdr).unwrap(),
            DecodedAddress::Broadcast(Some(bpi))
        );
        assert!(dir.is_empty());

        // A short all-ones prefix is still broadcast, without a BPI
        let data = [0x03u8, 0xFF, 0xFF, 0xFF];
        let mut rdr = FrameReader::new(&data);
        assert_eq!(
            dir.parse_address(&mut ctx, &mut rdr).unwrap(),
            DecodedAddress::Broadcast(None)
        );
        assert!(dir.is_empty());
    }

    #[test]
    fn test_ambiguous_prefix_builds_explain_request() {
        let mut dir = Directory::new();
        let me = dir.set_self(id(&[0x51, 0x00]));
        let _x = insert(&mut dir, &[0x51, 0x20]);

        // A 1-byte prefix shared by both subscribers
        let mut ctx = FrameContext::new();
        let data = [0x01u8, 0x51];
        let mut rdr = FrameReader::new(&data);
        assert_eq!(
            dir.parse_address(&mut ctx, &mut rdr).unwrap(),
            DecodedAddress::Unresolved
        );
        assert!(ctx.invalid_addresses);

        // Two full-address answers plus the request record
        let frame = ctx.please_explain.as_ref().unwrap();
        let payload = frame.payload.as_slice();
        assert_eq!(payload.len(), 33 + 33 + 2);
        assert_eq!(payload[0], 32);
        assert_eq!(&payload[1..33], id(&[0x51, 0x00]).as_bytes());
        assert_eq!(payload[33], 32);
        assert_eq!(&payload[34..66], id(&[0x51, 0x20]).as_bytes());
        assert_eq!(&payload[66..], &[0x01, 0x51]);

        // Explaining our own identity forces the full id next time
        assert!(dir.subscriber(me).send_full);
    }

    #[test]
    fn test_unknown_prefix_requests_without_candidates() {
        let mut dir = Directory::new();
        let mut ctx = FrameContext::new();
        let data = [0x02u8, 0x77, 0x77];
        let mut rdr = FrameReader::new(&data);

        assert_eq!(
            dir.parse_address(&mut ctx, &mut rdr).unwrap(),
            DecodedAddress::Unresolved
        );
        let frame = ctx.please_explain.as_ref().unwrap();
        assert_eq!(frame.payload.as_slice(), &[0x02, 0x77, 0x77]);
    }

    #[test]
    fn test_send_please_explain_unicast_vs_flood() {
        let mut dir = Directory::new();
        let me = dir.set_self(id(&[0x42]));
        let peer = insert(&mut dir, &[0x60]);
        let mut queue = MockQueue::default();

        // Reachable destination: routed with a long ttl
        dir.subscriber_mut(peer).reachable = Reachability::BROADCAST;
        let mut ctx = FrameContext::new();
        ctx.please_explain = Some(Frame::please_explain());
        assert!(dir.send_please_explain(&mut ctx, None, Some(peer), &mut queue));

        let frame = &queue.frames[0];
        assert_eq!(frame.ttl, 64);
        assert_eq!(frame.source, Some(me));
        assert_eq!(frame.destination, Some(peer));
        assert!(frame.broadcast_id.is_none());
        assert!(dir.subscriber(me).send_full);

        // Unreachable destination: one-hop flood with a fresh BPI
        dir.subscriber_mut(peer).reachable = Reachability::NONE;
        let mut ctx = FrameContext::new();
        ctx.please_explain = Some(Frame::please_explain());
        assert!(dir.send_please_explain(&mut ctx, None, Some(peer), &mut queue));

        let frame = &queue.frames[1];
        assert_eq!(frame.ttl, 1);
        assert!(frame.broadcast_id.is_some());

        // Nothing pending: nothing sent
        let mut ctx = FrameContext::new();
        assert!(dir.send_please_explain(&mut ctx, None, None, &mut queue));
        assert_eq!(queue.frames.len(), 2);
    }

    #[test]
    fn test_process_explain_teaches_and_answers() {
        // The peer asks about a prefix we can explain, and tells us about
        // a node we had never heard of
        let mut dir = Directory::new();
        let me = dir.set_self(id(&[0x51, 0x00]));
        insert(&mut dir, &[0x51, 0x20]);
        let requester = insert(&mut dir, &[0x90]);
        dir.subscriber_mut(requester).reachable = Reachability::BROADCAST;

        let mut request = Frame::please_explain();
        request.source = Some(requester);
        request.destination = Some(me);
        request.payload.append_byte(32).unwrap();
        request
            .payload
            .append_bytes(id(&[0xAB, 0xCD]).as_bytes())
            .unwrap();
        request.payload.append_byte(1).unwrap();
        request.payload.append_bytes(&[0x51]).unwrap();

        let mut queue = MockQueue::default();
        dir.process_explain(&request, &mut queue).unwrap();

        // The full record taught us a new subscriber
        assert!(dir.find(id(&[0xAB, 0xCD]).as_bytes()).is_some());

        // The short record produced a reply listing both matches
        assert_eq!(queue.frames.len(), 1);
        let reply = &queue.frames[0];
        assert_eq!(reply.destination, Some(requester));
        assert_eq!(reply.ttl, 64);
        let payload = reply.payload.as_slice();
        assert_eq!(payload.len(), 66);
        assert_eq!(payload[0], 32);
        assert_eq!(&payload[1..33], id(&[0x51, 0x00]).as_bytes());
        assert_eq!(&payload[34..66], id(&[0x51, 0x20]).as_bytes());
    }

    #[test]
    fn test_process_explain_rejects_malformed_records() {
        let mut dir = Directory::new();
        let mut queue = MockQueue::default();

        let mut frame = Frame::please_explain();
        frame.payload.append_byte(0).unwrap();
        assert!(matches!(
            dir.process_explain(&frame, &mut queue),
            Err(CodecError::InvalidExplainRecord(0))
        ));

        let mut frame = Frame::please_explain();
        frame.payload.append_byte(5).unwrap();
        frame.payload.append_bytes(&[1, 2]).unwrap();
        assert!(matches!(
            dir.process_explain(&frame, &mut queue),
            Err(CodecError::Buffer(_))
        ));
    }

    #[test]
    fn test_explain_payload_stops_when_full() {
        let mut dir = Directory::new();
        // 40 subscribers sharing a first byte: 40 full records would be
        // 1320 bytes, past the payload cap
        for i in 0..40u8 {
            insert(&mut dir, &[0x51, i << 2]);
        }

        let mut ctx = FrameContext::new();
        let data = [0x01u8, 0x51];
        let mut rdr = FrameReader::new(&data);
        dir.parse_address(&mut ctx, &mut rdr).unwrap();

        let frame = ctx.please_explain.as_ref().unwrap();
        assert!(frame.payload.len() <= crate::frame::EXPLAIN_PAYLOAD_LIMIT);
        // 31 full records fill the payload; the request record no longer
        // fits and is dropped, like any other overflow
        assert_eq!(frame.payload.len(), 31 * 33);
    }
}
