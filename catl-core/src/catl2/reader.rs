// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Reads the packed v2 layout directly out of a memory-mapped byte slice.
//! [`NodeView`] is this crate's answer to `PolyNodePtr`: instead of a
//! tagged raw pointer shared between mmap and heap storage, it is a plain
//! enum: `Mmap` borrows straight out of the file, `Owned` wraps the same
//! `Rc<Node>` the in-memory trie uses. Reading a hash out of an
//! unmaterialized `Mmap` view never copies or allocates; only
//! [`NodeView::materialize`] does.

use crate::catl2::format::{TAG_LEAF, V2Header};
use crate::error::{ParseError, ParseErrorKind};
use crate::hash::LeafType;
use crate::node::{InnerNode, LeafNode, Node, NodeRef};
use crate::primitives::{Hash256, Item, Key, Slice};
use byteorder::{ByteOrder, LittleEndian};
use std::rc::Rc;

/// A node reached while walking a mapped v2 file: either still resident in
/// the mapped bytes, or materialized into the ordinary heap tree.
pub enum NodeView<'a> {
    Mmap {
        data: &'a [u8],
        offset: u64,
        leaf_type: LeafType,
    },
    Owned(NodeRef<'a>),
}

impl<'a> NodeView<'a> {
    pub fn hash(&self) -> Hash256 {
        match self {
            NodeView::Mmap { data, offset, .. } => read_hash_field(data, *offset),
            NodeView::Owned(node) => node.hash(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            NodeView::Mmap { data, offset, .. } => data[*offset as usize] == TAG_LEAF,
            NodeView::Owned(node) => node.is_leaf(),
        }
    }

    /// Builds the equivalent `Rc`-owned node, copying any leaf bytes out of
    /// the mapped file so the result no longer borrows from it.
    pub fn materialize(&self) -> NodeRef<'static> {
        match self {
            NodeView::Mmap {
                data,
                offset,
                leaf_type,
            } => materialize_at(data, *offset, *leaf_type),
            NodeView::Owned(node) => materialize_owned(node),
        }
    }
}

fn read_hash_field(data: &[u8], offset: u64) -> Hash256 {
    let pos = offset as usize;
    let tag = data[pos];
    let hash_pos = if tag == TAG_LEAF {
        let key_end = pos + 1 + 32;
        let value_len = LittleEndian::read_u32(&data[key_end..key_end + 4]) as usize;
        key_end + 4 + value_len
    } else {
        pos + 1 + 1 + 2
    };
    Hash256::from_slice(&data[hash_pos..hash_pos + 32]).expect("32 bytes sliced")
}

fn materialize_at(data: &[u8], offset: u64, leaf_type: LeafType) -> NodeRef<'static> {
    let pos = offset as usize;
    let tag = data[pos];
    if tag == TAG_LEAF {
        let key = Key::from_slice(&data[pos + 1..pos + 33]).expect("32 bytes sliced");
        let value_len = LittleEndian::read_u32(&data[pos + 33..pos + 37]) as usize;
        let value_start = pos + 37;
        let value = &data[value_start..value_start + value_len];
        let item = Item::new(key, Slice::Owned(bytes::Bytes::copy_from_slice(value)));
        Rc::new(Node::new_leaf(item, leaf_type))
    } else {
        let depth = data[pos + 1];
        let branch_mask = LittleEndian::read_u16(&data[pos + 2..pos + 4]);
        let mut inner = InnerNode::new(depth);
        let mut child_pos = pos + 4 + 32;
        for branch in 0u8..16 {
            if branch_mask & (1 << branch) != 0 {
                let child_offset = LittleEndian::read_u64(&data[child_pos..child_pos + 8]);
                child_pos += 8;
                inner.set_child(branch, Some(materialize_at(data, child_offset, leaf_type)));
            }
        }
        Rc::new(Node::Inner(inner))
    }
}

fn materialize_owned<'a>(node: &NodeRef<'a>) -> NodeRef<'static> {
    match &**node {
        Node::Leaf(leaf) => Rc::new(Node::Leaf(LeafNode::new(
            leaf.item().to_owned_item(),
            leaf.leaf_type(),
        ))),
        Node::Inner(inner) => {
            let mut new_inner = InnerNode::new(inner.depth());
            for branch in 0u8..16 {
                if let Some(child) = inner.child(branch) {
                    new_inner.set_child(branch, Some(materialize_owned(child)));
                }
            }
            Rc::new(Node::Inner(new_inner))
        }
    }
}

/// Reads a packed v2 file's header and exposes its root as a [`NodeView`].
pub struct CatlV2Reader<'a> {
    data: &'a [u8],
    header: V2Header,
}

impl<'a> CatlV2Reader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, ParseError> {
        if data.len() < V2Header::SIZE {
            return Err(ParseError::new(
                0,
                ParseErrorKind::UnexpectedEof {
                    wanted: V2Header::SIZE,
                    available: data.len(),
                },
            ));
        }
        let magic = LittleEndian::read_u32(&data[0..4]);
        if magic != crate::catl2::format::MAGIC {
            return Err(ParseError::new(
                0,
                ParseErrorKind::InvalidHeader(format!("bad v2 magic: 0x{magic:08X}")),
            ));
        }
        let header = V2Header {
            magic,
            version: LittleEndian::read_u16(&data[4..6]),
            leaf_type_tag: data[6],
            _reserved: data[7],
            node_count: LittleEndian::read_u32(&data[8..12]),
            root_offset: LittleEndian::read_u64(&data[12..20]),
        };
        Ok(CatlV2Reader { data, header })
    }

    pub fn header(&self) -> &V2Header {
        &self.header
    }

    pub fn leaf_type(&self) -> LeafType {
        match self.header.leaf_type_tag {
            0 => LeafType::AccountState,
            1 => LeafType::TransactionNoMeta,
            _ => LeafType::TransactionWithMeta,
        }
    }

    pub fn root(&self) -> NodeView<'a> {
        NodeView::Mmap {
            data: self.data,
            offset: self.header.root_offset,
            leaf_type: self.leaf_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catl2::writer::write_shamap;
    use crate::primitives::Slice as PSlice;
    use crate::shamap::{SHAMap, SetMode};

    #[test]
    fn writes_then_reads_back_matching_hash() {
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(Item::new(Key::ZERO, PSlice::Borrowed(&[0u8; 32])), SetMode::AddOrUpdate)
            .unwrap();
        let expected = map.get_hash();

        let mut buf = Vec::new();
        write_shamap(&map, &mut buf).unwrap();

        let reader = CatlV2Reader::new(&buf).unwrap();
        assert_eq!(reader.root().hash(), expected);
    }

    #[test]
    fn materialized_tree_matches_view_hash() {
        let mut map = SHAMap::new(LeafType::AccountState);
        let mut key2 = [0u8; 32];
        key2[0] = 0xFF;
        map.set_item(Item::new(Key::ZERO, PSlice::Borrowed(b"a")), SetMode::AddOrUpdate)
            .unwrap();
        map.set_item(Item::new(Key::from_bytes(key2), PSlice::Borrowed(b"b")), SetMode::AddOrUpdate)
            .unwrap();

        let mut buf = Vec::new();
        write_shamap(&map, &mut buf).unwrap();
        let reader = CatlV2Reader::new(&buf).unwrap();
        let view = reader.root();
        let materialized = view.materialize();
        assert_eq!(materialized.hash(), map.get_hash());
    }
}
