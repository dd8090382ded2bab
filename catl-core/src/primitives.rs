// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width primitives shared by every layer of the trie and the CATL
//! codec: [`Hash256`], [`Key`], the zero-copy [`Slice`] view and the
//! [`Item`] it backs.

use bytes::Bytes;
use std::fmt;

/// Number of bytes in a SHAMap hash or key.
pub const WIDTH: usize = 32;

/// A 32-byte hash value. Used both as the output of the domain-tagged
/// SHA-512/256 hasher and as the wire representation of ledger/tx/state
/// hashes in CATL records.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Hash256([u8; WIDTH]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; WIDTH]);

    pub fn from_bytes(bytes: [u8; WIDTH]) -> Self {
        Hash256(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != WIDTH {
            return None;
        }
        let mut bytes = [0u8; WIDTH];
        bytes.copy_from_slice(slice);
        Some(Hash256(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; WIDTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; WIDTH]
    }

    pub fn hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Returns the nibble (4-bit value) of this hash at nibble position
    /// `depth`, where position 0 is the high nibble of byte 0. See
    /// `select_branch` for the SHAMap-key variant of this.
    pub fn nibble_at(&self, depth: u8) -> u8 {
        let byte = self.0[(depth / 2) as usize];
        if depth % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        }
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

/// The sole key type for all maps: a 256-bit identifier navigated one
/// nibble per trie level.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Key([u8; WIDTH]);

impl Key {
    pub const ZERO: Key = Key([0u8; WIDTH]);
    pub const MAX: Key = Key([0xFFu8; WIDTH]);

    pub fn from_bytes(bytes: [u8; WIDTH]) -> Self {
        Key(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != WIDTH {
            return None;
        }
        let mut bytes = [0u8; WIDTH];
        bytes.copy_from_slice(slice);
        Some(Key(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; WIDTH] {
        &self.0
    }

    pub fn hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// `select_branch(depth)`: the nibble of this key at nibble position
    /// `depth`. Position 0 is the high nibble of byte 0, through position 63.
    /// Depth >= 64 is a structural error (`Error::InvalidDepth`).
    pub fn select_branch(&self, depth: u8) -> Result<u8, crate::error::Error> {
        if depth >= 64 {
            return Err(crate::error::Error::InvalidDepth { depth });
        }
        let byte = self.0[(depth / 2) as usize];
        Ok(if depth % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        })
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.hex())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

/// A non-owning view of bytes, valid for the lifetime of its backing
/// buffer. `Borrowed` is used for data read directly out of a memory-mapped
/// CATL file; `Owned` is used for data constructed in memory (e.g. by a
/// writer, or in tests) and is cheap to clone because `Bytes` is refcounted.
#[derive(Clone)]
pub enum Slice<'a> {
    Borrowed(&'a [u8]),
    Owned(Bytes),
}

impl<'a> Slice<'a> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Slice::Borrowed(b) => b,
            Slice::Owned(b) => b.as_ref(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Detaches this slice from its borrowed lifetime by copying into an
    /// owned, refcounted buffer. A `SHAMap` that must outlive the mmap it
    /// was built from (e.g. a `state` map carried across ledgers after the
    /// reader moves on) calls this during ingestion.
    pub fn to_owned_slice(&self) -> Slice<'static> {
        Slice::Owned(Bytes::copy_from_slice(self.as_bytes()))
    }
}

impl<'a> PartialEq for Slice<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl<'a> Eq for Slice<'a> {}

impl<'a> fmt::Debug for Slice<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.as_bytes();
        let preview_len = bytes.len().min(8);
        write!(
            f,
            "Slice({} bytes, {}{})",
            bytes.len(),
            hex::encode(&bytes[..preview_len]),
            if bytes.len() > preview_len { "..." } else { "" }
        )
    }
}

/// The pair `(Key, value Slice)`. An item is a view: ownership of the
/// underlying bytes is external (mmap region or owned buffer). Items are
/// immutable once constructed and may be shared by multiple leaves across
/// snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item<'a> {
    key: Key,
    value: Slice<'a>,
}

impl<'a> Item<'a> {
    pub fn new(key: Key, value: Slice<'a>) -> Self {
        Item { key, value }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn value(&self) -> &Slice<'a> {
        &self.value
    }

    pub fn to_owned_item(&self) -> Item<'static> {
        Item {
            key: self.key,
            value: self.value.to_owned_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_branch_reads_high_then_low_nibble() {
        let key = Key::from_bytes({
            let mut b = [0u8; 32];
            b[0] = 0xAB;
            b
        });
        assert_eq!(key.select_branch(0).unwrap(), 0xA);
        assert_eq!(key.select_branch(1).unwrap(), 0xB);
    }

    #[test]
    fn select_branch_rejects_depth_64() {
        let key = Key::ZERO;
        assert!(matches!(
            key.select_branch(64),
            Err(crate::error::Error::InvalidDepth { depth: 64 })
        ));
    }

    #[test]
    fn hash_zero_is_well_defined() {
        assert!(Hash256::ZERO.is_zero());
        assert_eq!(Hash256::ZERO.hex().len(), 64);
    }
}
