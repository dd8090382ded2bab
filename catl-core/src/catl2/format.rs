// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! On-disk layout for CATL v2: a packed, perma-cache-hash tree, written
//! bottom-up so that every node's children are at lower file offsets than
//! the node itself. Grounded on the *concept* described by
//! `hybrid-shamap-v2/hybrid-shamap.h` (a polymorphic node pointer that is
//! either an mmap offset or a heap `Rc`); the exact C++ struct layout
//! lived in headers outside what was captured here, so the concrete byte
//! format below is this crate's own, built to the same design goal: every
//! node's hash is stored alongside it so no rehashing is needed to answer
//! "what is this subtree's hash" while walking the mapped file.

pub const MAGIC: u32 = 0x3254_4143; // "CAT2" in LE
pub const HEADER_SIZE: usize = 4 + 2 + 1 + 1 + 4 + 8;

pub const TAG_LEAF: u8 = 1;
pub const TAG_INNER: u8 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct V2Header {
    pub magic: u32,
    pub version: u16,
    pub leaf_type_tag: u8,
    pub _reserved: u8,
    pub node_count: u32,
    pub root_offset: u64,
}

impl V2Header {
    pub const SIZE: usize = HEADER_SIZE;
}
