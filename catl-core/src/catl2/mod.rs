// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! CATL v2: an optional packed layout for a single [`SHAMap`](crate::shamap::SHAMap)
//! snapshot, written bottom-up with every node's hash stored alongside it so
//! a reader can mmap the file and answer hash queries without rehashing.

pub mod format;
pub mod reader;
pub mod writer;

pub use format::V2Header;
pub use reader::{CatlV2Reader, NodeView};
pub use writer::write_shamap;
