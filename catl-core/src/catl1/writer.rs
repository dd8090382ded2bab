// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Assembles a CATL v1 byte stream ledger by ledger. Drives its own
//! internal `state`/`tx` maps exactly as [`crate::catl1::reader::CatlReader`]
//! does on the way in, so that the `account_hash`/`tx_hash` fields it
//! writes into each [`LedgerInfo`] are always the hash of what was actually
//! written, never a value the caller has to get right by hand.

use crate::catl1::header::CatlHeader;
use crate::catl1::ledger_info::LedgerInfo;
use crate::catl1::stream::{self, NodeType};
use crate::hash::LeafType;
use crate::primitives::{Item, Key, Slice};
use crate::shamap::{CollapseMode, SHAMap, SHAMapOptions, SetMode};
use std::io;

pub struct CatlWriter {
    min_ledger: u32,
    max_ledger: u32,
    network_id: u16,
    collapse_mode: CollapseMode,
    state_map: SHAMap<'static>,
    tx_map: SHAMap<'static>,
    body: Vec<u8>,
    pending_info: Option<LedgerInfo>,
    state_buf: Vec<u8>,
    tx_buf: Vec<u8>,
    ledger_count: u32,
}

impl CatlWriter {
    pub fn new(min_ledger: u32, max_ledger: u32, network_id: u16) -> Self {
        Self::with_collapse_mode(min_ledger, max_ledger, network_id, CollapseMode::default())
    }

    pub fn with_collapse_mode(
        min_ledger: u32,
        max_ledger: u32,
        network_id: u16,
        collapse_mode: CollapseMode,
    ) -> Self {
        CatlWriter {
            min_ledger,
            max_ledger,
            network_id,
            collapse_mode,
            state_map: SHAMap::with_options(LeafType::AccountState, SHAMapOptions { collapse_mode }),
            tx_map: SHAMap::with_options(LeafType::TransactionWithMeta, SHAMapOptions { collapse_mode }),
            body: Vec::new(),
            pending_info: None,
            state_buf: Vec::new(),
            tx_buf: Vec::new(),
            ledger_count: 0,
        }
    }

    /// Starts a new ledger. `info.account_hash`/`info.tx_hash` are
    /// overwritten with the real computed hashes when the ledger is
    /// finished; every other field is taken verbatim from `info`.
    pub fn begin_ledger(&mut self, info: LedgerInfo) -> io::Result<()> {
        if self.ledger_count == 0 {
            self.state_map = SHAMap::with_options(
                LeafType::AccountState,
                SHAMapOptions {
                    collapse_mode: self.collapse_mode,
                },
            );
        }
        self.tx_map = SHAMap::with_options(
            LeafType::TransactionWithMeta,
            SHAMapOptions {
                collapse_mode: self.collapse_mode,
            },
        );
        self.pending_info = Some(info);
        self.state_buf.clear();
        self.tx_buf.clear();
        Ok(())
    }

    pub fn write_state_node(&mut self, key: Key, value: &[u8]) -> io::Result<()> {
        stream::write_node_record(&mut self.state_buf, NodeType::AccountState, key, value)?;
        let owned = Item::new(key, Slice::Owned(bytes::Bytes::copy_from_slice(value)));
        self.state_map
            .set_item(owned, SetMode::AddOrUpdate)
            .expect("writer-constructed item always has a valid key/value");
        Ok(())
    }

    pub fn write_state_removal(&mut self, key: Key) -> io::Result<()> {
        stream::write_remove_record(&mut self.state_buf, key)?;
        self.state_map.remove_item(key).ok();
        Ok(())
    }

    pub fn write_tx_node(&mut self, node_type: NodeType, key: Key, value: &[u8]) -> io::Result<()> {
        stream::write_node_record(&mut self.tx_buf, node_type, key, value)?;
        let owned = Item::new(key, Slice::Owned(bytes::Bytes::copy_from_slice(value)));
        // Both transaction leaf variants share a hash domain (`hash.rs`), so
        // reusing the same internal map for either is hash-correct.
        self.tx_map
            .set_item(owned, SetMode::AddOrUpdate)
            .expect("writer-constructed item always has a valid key/value");
        Ok(())
    }

    /// Closes the state stream with a terminal marker. Call once per
    /// ledger, after the last `write_state_node`/`write_state_removal`.
    pub fn finish_state(&mut self) -> io::Result<()> {
        stream::write_terminal(&mut self.state_buf)
    }

    /// Closes the tx stream, computes both hashes, and appends this
    /// ledger's full byte range (`LedgerInfo` + state stream + tx stream)
    /// to the assembled body.
    pub fn finish_tx(&mut self) -> io::Result<()> {
        stream::write_terminal(&mut self.tx_buf)?;
        let mut info = self
            .pending_info
            .take()
            .expect("finish_tx called without a matching begin_ledger");
        info.account_hash = self.state_map.get_hash();
        info.tx_hash = self.tx_map.get_hash();
        info.write_to(&mut self.body)?;
        self.body.extend_from_slice(&self.state_buf);
        self.body.extend_from_slice(&self.tx_buf);
        self.ledger_count += 1;
        Ok(())
    }

    /// Serializes the header followed by every finished ledger's bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut header = CatlHeader::new(self.min_ledger, self.max_ledger, self.network_id);
        header.filesize = (crate::catl1::header::HEADER_SIZE + self.body.len()) as u64;
        let mut out = Vec::with_capacity(header.filesize as usize);
        header.write_to(&mut out).expect("writing to a Vec never fails");
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catl1::reader::{CatlReader, ReaderOptions};

    #[test]
    fn two_ledger_state_delta_round_trips_and_verifies() {
        let mut w = CatlWriter::new(1, 2, 7);

        w.begin_ledger(blank_info(1)).unwrap();
        w.write_state_node(key(1), b"alice").unwrap();
        w.write_state_node(key(2), b"bob").unwrap();
        w.finish_state().unwrap();
        w.finish_tx().unwrap();

        w.begin_ledger(blank_info(2)).unwrap();
        w.write_state_node(key(2), b"bob2").unwrap();
        w.write_state_removal(key(1)).unwrap();
        w.finish_state().unwrap();
        w.write_tx_node(NodeType::TransactionWithMeta, key(99), b"txdata")
            .unwrap();
        w.finish_tx().unwrap();

        let bytes = w.into_bytes();
        let mut reader = CatlReader::new(&bytes, ReaderOptions::default()).unwrap();

        let first = reader.next_ledger().unwrap().unwrap();
        assert!(first.state_hash_matches);
        assert!(first.tx_hash_matches);

        let second = reader.next_ledger().unwrap().unwrap();
        assert!(second.state_hash_matches);
        assert!(second.tx_hash_matches);
        assert!(reader.state_map().contains(key(2)).unwrap());
        assert!(!reader.state_map().contains(key(1)).unwrap());

        assert!(reader.next_ledger().unwrap().is_none());
    }

    fn key(last: u8) -> Key {
        let mut k = [0u8; 32];
        k[31] = last;
        Key::from_bytes(k)
    }

    fn blank_info(sequence: u32) -> LedgerInfo {
        LedgerInfo {
            sequence,
            hash: crate::primitives::Hash256::ZERO,
            tx_hash: crate::primitives::Hash256::ZERO,
            account_hash: crate::primitives::Hash256::ZERO,
            parent_hash: crate::primitives::Hash256::ZERO,
            drops: 0,
            close_flags: 0,
            close_time_resolution: 10,
            close_time: 0,
            parent_close_time: 0,
        }
    }
}
