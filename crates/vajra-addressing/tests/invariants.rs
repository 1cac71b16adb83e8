//! Structural invariants of the directory and the codec
//!
//! Exercised over batches of seeded pseudo-random identifiers rather than
//! hand-picked cases, so the trie's split and abbreviation behaviour is
//! checked against populations with realistic prefix collisions.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use vajra_addressing::{BroadcastCache, BroadcastId, DecodedAddress, Directory, FrameContext};
use vajra_core::{FrameBuffer, NodeId, NODE_ID_LEN};

fn random_ids(seed: u64, count: usize) -> Vec<NodeId> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ids = Vec::with_capacity(count);
    while ids.len() < count {
        let mut bytes = [0u8; NODE_ID_LEN];
        rng.fill_bytes(&mut bytes);
        // Keep the population wire-valid and duplicate-free
        bytes[0] |= 0x10;
        let id = NodeId::new(bytes);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn shared_nibbles(a: &NodeId, b: &NodeId) -> usize {
    (0..NODE_ID_LEN * 2)
        .take_while(|&i| a.nibble(i) == b.nibble(i))
        .count()
}

#[test]
fn test_inserted_ids_always_resolve_in_full() {
    let ids = random_ids(7, 128);
    let mut dir = Directory::new();

    let handles: Vec<_> = ids
        .iter()
        .map(|id| dir.find_or_insert(id.as_bytes(), true).unwrap())
        .collect();
    assert_eq!(dir.len(), ids.len());

    for (id, handle) in ids.iter().zip(&handles) {
        assert_eq!(dir.find_or_insert(id.as_bytes(), false), Some(*handle));
        assert_eq!(dir.subscriber(*handle).sid, *id);
    }
}

#[test]
fn test_shared_prefixes_are_ambiguous_for_every_pair() {
    let ids = random_ids(11, 96);
    let mut dir = Directory::new();
    for id in &ids {
        dir.find_or_insert(id.as_bytes(), true).unwrap();
    }

    let mut checked = 0;
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            let shared = shared_nibbles(a, b);
            // A lookup that lies entirely within the shared prefix can
            // never resolve; check every whole-byte length inside it
            for bytes in 1..=shared / 2 {
                assert_eq!(
                    dir.find(&a.as_bytes()[..bytes]),
                    None,
                    "prefix of {bytes} bytes shared by two ids resolved"
                );
                checked += 1;
            }
        }
    }
    // 96 ids over 16 first nibbles guarantee plenty of colliding pairs
    assert!(checked > 0);
}

#[test]
fn test_abbreviate_len_is_the_resolution_threshold() {
    let ids = random_ids(13, 96);
    let mut dir = Directory::new();
    let handles: Vec<_> = ids
        .iter()
        .map(|id| dir.find_or_insert(id.as_bytes(), true).unwrap())
        .collect();

    for handle in handles {
        let sub = dir.subscriber(handle);
        let sid = sub.sid;
        let abbrev = sub.abbreviate_len as usize;

        // Any whole-byte prefix covering abbreviate_len nibbles resolves
        let enough = abbrev.div_ceil(2);
        assert_eq!(dir.find(&sid.as_bytes()[..enough]), Some(handle));

        // Any whole-byte prefix strictly inside it does not
        for bytes in 1..enough {
            if bytes * 2 < abbrev {
                assert_eq!(dir.find(&sid.as_bytes()[..bytes]), None);
            }
        }
    }
}

#[test]
fn test_enumeration_is_ordered_and_complete() {
    let mut ids = random_ids(17, 64);
    let mut dir = Directory::new();
    for id in &ids {
        dir.find_or_insert(id.as_bytes(), true).unwrap();
    }

    let mut seen = Vec::new();
    dir.enumerate_from(None, |_, sub| {
        seen.push(sub.sid);
        false
    });

    ids.sort();
    assert_eq!(seen, ids);
}

#[test]
fn test_encode_decode_identity_for_full_addresses() {
    let ids = random_ids(19, 32);
    let mut tx = Directory::new();

    for id in &ids {
        let s = tx.find_or_insert(id.as_bytes(), true).unwrap();
        tx.subscriber_mut(s).send_full = true;

        let mut buf = FrameBuffer::new();
        tx.append_address(None, &mut buf, s).unwrap();
        assert_eq!(buf.len(), 33);

        // A fresh receiver with an empty context learns exactly this id
        let mut rx = Directory::new();
        let mut ctx = FrameContext::new();
        let mut rdr = buf.reader();
        match rx.parse_address(&mut ctx, &mut rdr).unwrap() {
            DecodedAddress::Subscriber(r) => assert_eq!(rx.subscriber(r).sid, *id),
            other => panic!("expected subscriber, got {other:?}"),
        }
    }
}

#[test]
fn test_repeated_subscriber_encodes_as_previous_after_first() {
    let ids = random_ids(23, 8);
    let mut tx = Directory::new();
    let handles: Vec<_> = ids
        .iter()
        .map(|id| tx.find_or_insert(id.as_bytes(), true).unwrap())
        .collect();

    for &handle in &handles {
        let mut ctx = FrameContext::new();
        let mut buf = FrameBuffer::new();

        tx.append_address(Some(&mut ctx), &mut buf, handle).unwrap();
        let first_len = buf.len();
        assert_ne!(buf.as_slice()[0], 0xFE);

        for _ in 0..3 {
            tx.append_address(Some(&mut ctx), &mut buf, handle).unwrap();
        }
        assert_eq!(buf.len(), first_len + 3);
        assert_eq!(&buf.as_slice()[first_len..], &[0xFE, 0xFE, 0xFE]);
    }
}

#[test]
fn test_broadcast_cache_verdicts_over_many_ids() {
    let mut cache = BroadcastCache::new();
    let mut rng = StdRng::seed_from_u64(29);

    for _ in 0..4096 {
        let mut bytes = [0u8; 8];
        rng.fill_bytes(&mut bytes);
        let bpi = BroadcastId::new(bytes);

        // Whatever happened to its slot before, a BPI just observed must
        // read as a duplicate until something evicts it
        cache.drop_check(&bpi);
        assert!(cache.drop_check(&bpi));
        assert!(cache.drop_check(&bpi));
    }
}
