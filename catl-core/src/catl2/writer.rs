// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Serializes a [`SHAMap`] into the packed v2 layout, children before
//! parents, so a reader can mmap the result and follow child offsets
//! forward-seeking only (no backward references to resolve).

use crate::catl2::format::{TAG_INNER, TAG_LEAF};
use crate::hash::LeafType;
use crate::node::{Node, NodeRef};
use crate::shamap::SHAMap;
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashMap;
use std::io::{self, Write};

pub fn write_shamap<W: Write>(map: &SHAMap, mut w: W) -> io::Result<()> {
    let mut body = Vec::new();
    let mut written: HashMap<usize, u64> = HashMap::new();
    let root_offset = write_node(map.root(), &mut body, &mut written)?;

    let header = crate::catl2::format::V2Header {
        magic: crate::catl2::format::MAGIC,
        version: 1,
        leaf_type_tag: leaf_type_tag(map.map_type()),
        _reserved: 0,
        node_count: written.len() as u32,
        root_offset,
    };
    w.write_u32::<LittleEndian>(header.magic)?;
    w.write_u16::<LittleEndian>(header.version)?;
    w.write_u8(header.leaf_type_tag)?;
    w.write_u8(header._reserved)?;
    w.write_u32::<LittleEndian>(header.node_count)?;
    w.write_u64::<LittleEndian>(header.root_offset)?;
    w.write_all(&body)
}

fn leaf_type_tag(leaf_type: LeafType) -> u8 {
    match leaf_type {
        LeafType::AccountState => 0,
        LeafType::TransactionNoMeta => 1,
        LeafType::TransactionWithMeta => 2,
    }
}

/// Writes `node`'s subtree into `body` in post-order (children first),
/// memoizing by the `Rc`'s heap address so a subtree shared by multiple
/// parents, the common case right after a `snapshot()`, is only
/// serialized once.
fn write_node(
    node: &NodeRef,
    body: &mut Vec<u8>,
    written: &mut HashMap<usize, u64>,
) -> io::Result<u64> {
    let base = crate::catl2::format::V2Header::SIZE as u64;
    let addr = std::rc::Rc::as_ptr(node) as *const () as usize;
    if let Some(&offset) = written.get(&addr) {
        return Ok(offset);
    }

    let offset = match &**node {
        Node::Leaf(leaf) => {
            let start = base + body.len() as u64;
            body.push(TAG_LEAF);
            body.extend_from_slice(leaf.key().as_bytes());
            let value = leaf.item().value().as_bytes();
            body.write_u32::<LittleEndian>(value.len() as u32)?;
            body.extend_from_slice(value);
            body.extend_from_slice(leaf.hash().as_bytes());
            start
        }
        Node::Inner(inner) => {
            let mut child_offsets = [0u64; 16];
            for branch in 0u8..16 {
                if let Some(child) = inner.child(branch) {
                    child_offsets[branch as usize] = write_node(child, body, written)?;
                }
            }
            let start = base + body.len() as u64;
            body.push(TAG_INNER);
            body.push(inner.depth());
            body.write_u16::<LittleEndian>(inner.branch_mask())?;
            body.extend_from_slice(inner.hash().as_bytes());
            for branch in 0u8..16 {
                if inner.has_child(branch) {
                    body.write_u64::<LittleEndian>(child_offsets[branch as usize])?;
                }
            }
            start
        }
    };
    written.insert(addr, offset);
    Ok(offset)
}
