// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! SHA-512/256 domain-tagged hashing. All hashes in this crate are the
//! leading 256 bits of SHA-512 of a prefix-tagged payload; `sha2::Sha512_256`
//! computes exactly that truncation natively.
//!
//! Prefixes below are reproduced byte-for-byte from rippled's `HashPrefix`
//! table (see `original_source/catl-hasher.cpp`).

use crate::primitives::Hash256;
use sha2::{Digest, Sha512_256};

/// `'M','I','N',0x00`: inner node hash domain.
pub const PREFIX_INNER_NODE: [u8; 4] = [b'M', b'I', b'N', 0x00];
/// `'M','L','N',0x00`: account-state leaf hash domain.
pub const PREFIX_ACCOUNT_STATE_LEAF: [u8; 4] = [b'M', b'L', b'N', 0x00];
/// `'S','N','D',0x00`: transaction leaf hash domain (either variant).
pub const PREFIX_TRANSACTION_LEAF: [u8; 4] = [b'S', b'N', b'D', 0x00];

/// The leaf tag selecting which domain prefix a leaf's hash uses. This is
/// also `SHAMap::map_type`; the map a leaf was inserted through fixes its
/// tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LeafType {
    AccountState,
    TransactionNoMeta,
    TransactionWithMeta,
}

impl LeafType {
    pub fn hash_prefix(self) -> [u8; 4] {
        match self {
            LeafType::AccountState => PREFIX_ACCOUNT_STATE_LEAF,
            LeafType::TransactionNoMeta | LeafType::TransactionWithMeta => {
                PREFIX_TRANSACTION_LEAF
            }
        }
    }
}

/// Computes `SHA-512-256(prefix || value_bytes || key_bytes)`.
pub fn leaf_hash(leaf_type: LeafType, value: &[u8], key_bytes: &[u8; 32]) -> Hash256 {
    let mut hasher = Sha512_256::new();
    hasher.update(leaf_type.hash_prefix());
    hasher.update(value);
    hasher.update(key_bytes);
    Hash256::from_bytes(hasher.finalize().into())
}

/// Computes the inner-node hash over 16 child hashes (zero hash for empty
/// children). Returns the all-zero hash if every child is empty; callers
/// typically special-case this before calling, since an all-empty inner
/// node never needs to touch the hasher, but the formula is equivalent
/// either way.
pub fn inner_hash(children: &[Hash256; 16]) -> Hash256 {
    let mut hasher = Sha512_256::new();
    hasher.update(PREFIX_INNER_NODE);
    for child in children {
        hasher.update(child.as_bytes());
    }
    Hash256::from_bytes(hasher.finalize().into())
}
