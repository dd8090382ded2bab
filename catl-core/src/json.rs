// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! `trie_json`: a diagnostic JSON dump of a [`crate::shamap::SHAMap`]'s
//! current structure, for debugging and for comparing two trees by eye.
//! Not part of the consensus-critical hash computation; purely a
//! developer tool, grounded on the pretty-printed JSON walk the original
//! SHAMap debugging tools use.

use crate::hash::LeafType;
use crate::node::{Node, NodeRef};
use crate::shamap::SHAMap;
use serde_json::{json, Value};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, Default)]
pub struct TrieJsonOptions {
    /// When true, leaf keys are rendered as their raw hex string ("hash").
    /// When false, they are rendered as a `nibbles` array, useful for
    /// visually confirming branch selection while debugging path finding.
    pub key_as_hash: bool,
}

pub fn trie_json<W: Write>(map: &SHAMap, writer: W, options: TrieJsonOptions) -> io::Result<()> {
    let value = node_to_value(map.root(), options);
    serde_json::to_writer_pretty(writer, &value).map_err(io::Error::from)
}

fn node_to_value(node: &NodeRef, options: TrieJsonOptions) -> Value {
    match &**node {
        Node::Inner(inner) => {
            let mut children = serde_json::Map::new();
            for branch in 0u8..16 {
                if let Some(child) = inner.child(branch) {
                    children.insert(format!("{branch:X}"), node_to_value(child, options));
                }
            }
            json!({
                "type": "inner",
                "depth": inner.depth(),
                "hash": inner.hash().hex(),
                "children": children,
            })
        }
        Node::Leaf(leaf) => {
            let key = if options.key_as_hash {
                Value::String(leaf.key().hex())
            } else {
                Value::Array(
                    leaf.key()
                        .as_bytes()
                        .iter()
                        .flat_map(|b| [b >> 4, b & 0x0F])
                        .map(|nibble| Value::from(nibble))
                        .collect(),
                )
            };
            json!({
                "type": "leaf",
                "leaf_type": leaf_type_name(leaf.leaf_type()),
                "key": key,
                "value_len": leaf.item().value().len(),
                "hash": leaf.hash().hex(),
            })
        }
    }
}

fn leaf_type_name(leaf_type: LeafType) -> &'static str {
    match leaf_type {
        LeafType::AccountState => "account_state",
        LeafType::TransactionNoMeta => "transaction_no_meta",
        LeafType::TransactionWithMeta => "transaction_with_meta",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Item, Key, Slice};
    use crate::shamap::SetMode;

    #[test]
    fn dump_is_valid_json() {
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(Item::new(Key::ZERO, Slice::Borrowed(&[0u8; 32])), SetMode::AddOrUpdate)
            .unwrap();
        let mut buf = Vec::new();
        trie_json(&map, &mut buf, TrieJsonOptions::default()).unwrap();
        let parsed: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["type"], "inner");
    }
}
