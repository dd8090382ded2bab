// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Collapse-mode equivalence (the invariant spec.md calls out as "the
//! single most subtle" one): `LEAVES_ONLY` and `LEAVES_AND_INNERS` are two
//! different in-memory shapes for the same logical content, and must
//! always agree on `get_hash()`.

use catl_core::shamap::{SHAMapOptions, SetMode};
use catl_core::{CollapseMode, Item, Key, LeafType, SHAMap, Slice};
use proptest::prelude::*;

fn map_with(mode: CollapseMode) -> SHAMap<'static> {
    SHAMap::with_options(LeafType::AccountState, SHAMapOptions { collapse_mode: mode })
}

fn key_from_nibbles(nibbles: &[u8]) -> Key {
    let mut bytes = [0u8; 32];
    for (i, &nibble) in nibbles.iter().enumerate() {
        let byte = &mut bytes[i / 2];
        if i % 2 == 0 {
            *byte = (*byte & 0x0F) | (nibble << 4);
        } else {
            *byte = (*byte & 0xF0) | (nibble & 0x0F);
        }
    }
    Key::from_bytes(bytes)
}

fn item_for(key: Key) -> Item<'static> {
    Item::new(key, Slice::Borrowed(b"v"))
}

/// Scenario S6: a shallow leaf (`kc`) beside a deep collision chain
/// (`ka`/`kb`, diverging only at nibble 7); hashes agree under both modes
/// with no deletion at all, since collision-chain insertion is identical
/// in both.
#[test]
fn s6_collision_depth_insertion_matches_across_modes() {
    let shared_prefix = [1, 2, 3, 4, 5];
    let ka = key_from_nibbles(&[&shared_prefix[..], &[0xB, 0xD, 0x0]].concat());
    let kb = key_from_nibbles(&[&shared_prefix[..], &[0xB, 0xD, 0x1]].concat());
    let kc = key_from_nibbles(&[&shared_prefix[..], &[0xA]].concat());

    let mut leaves_only = map_with(CollapseMode::LeavesOnly);
    let mut leaves_and_inners = map_with(CollapseMode::LeavesAndInners);
    for map in [&mut leaves_only, &mut leaves_and_inners] {
        map.set_item(item_for(ka), SetMode::AddOrUpdate).unwrap();
        map.set_item(item_for(kb), SetMode::AddOrUpdate).unwrap();
        map.set_item(item_for(kc), SetMode::AddOrUpdate).unwrap();
    }

    assert!(leaves_only.contains(ka).unwrap());
    assert!(leaves_only.contains(kb).unwrap());
    assert_eq!(leaves_only.get_hash(), leaves_and_inners.get_hash());
}

/// Engineers the exact shape that forces a multi-level depth skip: `kd`
/// sits alone one level above a sub-chain holding `ka`/`kb`. Deleting `kd`
/// leaves that sub-chain as the *only* child of an otherwise-empty inner
/// node, which `LEAVES_AND_INNERS` promotes straight into its
/// grandparent's slot, a structural case `LEAVES_ONLY` never produces.
/// Before the synthetic-hash fix in `node.rs`, this test fails: the
/// promoted node's cached hash was used directly instead of being folded
/// through the skipped depths.
#[test]
fn delete_induced_depth_skip_preserves_hash_equivalence() {
    let shared_prefix = [1, 2, 3, 4, 5];
    let ka = key_from_nibbles(&[&shared_prefix[..], &[0xB, 0xD, 0x0]].concat());
    let kb = key_from_nibbles(&[&shared_prefix[..], &[0xB, 0xD, 0x1]].concat());
    let kd = key_from_nibbles(&[&shared_prefix[..], &[0xB, 0xC]].concat());
    let kc = key_from_nibbles(&[&shared_prefix[..], &[0xA]].concat());

    let mut leaves_only = map_with(CollapseMode::LeavesOnly);
    let mut leaves_and_inners = map_with(CollapseMode::LeavesAndInners);
    for map in [&mut leaves_only, &mut leaves_and_inners] {
        for key in [ka, kb, kd, kc] {
            map.set_item(item_for(key), SetMode::AddOrUpdate).unwrap();
        }
        assert!(map.remove_item(kd).unwrap());
    }

    assert!(leaves_only.contains(ka).unwrap());
    assert!(leaves_only.contains(kb).unwrap());
    assert!(!leaves_only.contains(kd).unwrap());
    assert_eq!(leaves_only.get_hash(), leaves_and_inners.get_hash());
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u8),
    Delete(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..24).prop_map(Op::Insert),
        (0u8..24).prop_map(Op::Delete),
    ]
}

/// A small, shared key domain (only the last byte varies) forces heavy
/// collision and frequent multi-level collapses on delete, so randomized
/// histories actually exercise the depth-skip path rather than building
/// disjoint single-leaf branches that never collapse past one level.
fn key_for_id(id: u8) -> Key {
    let mut bytes = [0u8; 32];
    bytes[31] = id;
    Key::from_bytes(bytes)
}

proptest! {
    #[test]
    fn random_insert_delete_histories_agree_across_collapse_modes(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let mut leaves_only = map_with(CollapseMode::LeavesOnly);
        let mut leaves_and_inners = map_with(CollapseMode::LeavesAndInners);

        for op in &ops {
            match *op {
                Op::Insert(id) => {
                    let key = key_for_id(id);
                    leaves_only.set_item(item_for(key), SetMode::AddOrUpdate).unwrap();
                    leaves_and_inners.set_item(item_for(key), SetMode::AddOrUpdate).unwrap();
                }
                Op::Delete(id) => {
                    let key = key_for_id(id);
                    let a = leaves_only.remove_item(key).unwrap();
                    let b = leaves_and_inners.remove_item(key).unwrap();
                    prop_assert_eq!(a, b);
                }
            }
            prop_assert_eq!(leaves_only.get_hash(), leaves_and_inners.get_hash());
        }
    }
}
