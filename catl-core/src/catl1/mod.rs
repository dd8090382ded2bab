// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! CATL v1: the original catalogue file format, a fixed header followed by one
//! `LedgerInfo` + state-node-stream + tx-node-stream triple per ledger.
//! Grounded throughout on `catl-hasher.cpp`'s `CATLHasher` class.

pub mod compress;
pub mod header;
pub mod ledger_info;
pub mod reader;
pub mod stream;
pub mod writer;

pub use compress::Body;
pub use header::CatlHeader;
pub use ledger_info::LedgerInfo;
pub use reader::{CatlReader, LedgerOutcome, ReaderOptions, Stats};
pub use stream::NodeType;
pub use writer::CatlWriter;
