// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! A 16-ary radix Merkle trie (`SHAMap`) with consensus-critical,
//! domain-tagged SHA-512/256 hashing, and a codec for the CATL ledger
//! catalogue file format built on top of it.
//!
//! The trie lives in [`shamap`]/[`node`]/[`path_finder`]; the hashing rules
//! it is built on are in [`hash`]; [`catl1`] reads and writes the v1
//! catalogue format, driving a [`shamap::SHAMap`] per ledger.

pub mod catl1;
pub mod catl2;
pub mod error;
pub mod hash;
pub mod json;
pub mod node;
pub mod path_finder;
pub mod primitives;
pub mod shamap;

pub use error::{Error, ParseError, ParseErrorKind, ParseResult, Result};
pub use hash::LeafType;
pub use primitives::{Hash256, Item, Key, Slice};
pub use shamap::{CollapseMode, SHAMap, SHAMapOptions};
