// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Drives a `state` and a `tx` [`SHAMap`] across the ledger range of a CATL
//! v1 byte buffer, verifying each ledger's declared hashes against what got
//! built, grounded on `CATLHasher::processFile`/`processLedger` in the
//! original hasher.

use crate::catl1::header::{CatlHeader, HEADER_SIZE};
use crate::catl1::ledger_info::{LedgerInfo, LEDGER_INFO_SIZE};
use crate::catl1::stream::{self, NodeType, Record, DEFAULT_MAX_VALUE_SIZE};
use crate::error::{ParseError, ParseErrorKind};
use crate::hash::LeafType;
use crate::primitives::{Item, Slice};
use crate::shamap::{SHAMap, SetMode};

#[derive(Clone, Copy, Debug)]
pub struct ReaderOptions {
    pub max_value_size: u32,
    pub collapse_mode: crate::shamap::CollapseMode,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            collapse_mode: crate::shamap::CollapseMode::default(),
        }
    }
}

/// Running counters mirroring the original hasher's `Stats` struct,
/// exposed so a driver (e.g. the `catl1-hasher` CLI) can print a summary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    pub ledgers_processed: u32,
    pub state_nodes_added: u64,
    pub state_removals_attempted: u64,
    pub state_removals_succeeded: u64,
    pub tx_nodes_added: u64,
    pub successful_hash_verifications: u32,
    pub failed_hash_verifications: u32,
}

/// The outcome of processing one ledger: its header record and whether its
/// declared state/tx hashes matched what the driven maps computed.
#[derive(Debug)]
pub struct LedgerOutcome {
    pub info: LedgerInfo,
    pub state_nodes: u32,
    pub tx_nodes: u32,
    pub state_hash_matches: bool,
    pub tx_hash_matches: bool,
}

/// Streams a CATL v1 byte buffer ledger by ledger. `'a` is the lifetime of
/// the backing buffer (typically a `memmap2::Mmap`, held alive by the
/// caller for at least as long as this reader and any maps it returns).
pub struct CatlReader<'a> {
    data: &'a [u8],
    header: CatlHeader,
    offset: usize,
    state_map: SHAMap<'a>,
    tx_map: SHAMap<'a>,
    first_ledger_seen: bool,
    options: ReaderOptions,
    stats: Stats,
}

impl<'a> CatlReader<'a> {
    pub fn new(data: &'a [u8], options: ReaderOptions) -> Result<Self, ParseError> {
        let header = CatlHeader::read_from(data)?;
        if (header.filesize as usize) != data.len() {
            tracing::warn!(
                header_filesize = header.filesize,
                actual = data.len(),
                "CATL header filesize disagrees with buffer length; proceeding with the buffer's actual length"
            );
        }
        Ok(CatlReader {
            data,
            header,
            offset: HEADER_SIZE,
            state_map: SHAMap::with_options(
                LeafType::AccountState,
                crate::shamap::SHAMapOptions {
                    collapse_mode: options.collapse_mode,
                },
            ),
            tx_map: SHAMap::with_options(
                LeafType::TransactionWithMeta,
                crate::shamap::SHAMapOptions {
                    collapse_mode: options.collapse_mode,
                },
            ),
            first_ledger_seen: false,
            options,
            stats: Stats::default(),
        })
    }

    pub fn header(&self) -> &CatlHeader {
        &self.header
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn state_map(&self) -> &SHAMap<'a> {
        &self.state_map
    }

    pub fn tx_map(&self) -> &SHAMap<'a> {
        &self.tx_map
    }

    /// Processes the next ledger, or returns `None` once the remaining
    /// bytes are too few to hold another [`LedgerInfo`] (trailing padding,
    /// not an error).
    pub fn next_ledger(&mut self) -> Result<Option<LedgerOutcome>, ParseError> {
        if self.offset + LEDGER_INFO_SIZE > self.data.len() {
            return Ok(None);
        }

        let ledger_offset = self.offset as u64;
        let info = LedgerInfo::read_from(&self.data[self.offset..], ledger_offset)?;
        self.offset += LEDGER_INFO_SIZE;

        if info.sequence < self.header.min_ledger || info.sequence > self.header.max_ledger {
            tracing::warn!(
                sequence = info.sequence,
                min = self.header.min_ledger,
                max = self.header.max_ledger,
                "ledger sequence outside header-declared range"
            );
        }

        let is_first = info.sequence == self.header.min_ledger && !self.first_ledger_seen;
        if is_first {
            self.state_map = SHAMap::with_options(
                LeafType::AccountState,
                crate::shamap::SHAMapOptions {
                    collapse_mode: self.options.collapse_mode,
                },
            );
            self.first_ledger_seen = true;
        }

        let mut state_nodes = 0u32;
        self.offset = self.process_map(self.offset, true, &mut state_nodes)?;

        self.tx_map = SHAMap::with_options(
            LeafType::TransactionWithMeta,
            crate::shamap::SHAMapOptions {
                collapse_mode: self.options.collapse_mode,
            },
        );
        let mut tx_nodes = 0u32;
        self.offset = self.process_map(self.offset, false, &mut tx_nodes)?;

        let state_hash_matches = self.state_map.get_hash() == info.account_hash;
        let tx_hash_matches = self.tx_map.get_hash() == info.tx_hash;

        self.stats.ledgers_processed += 1;
        self.stats.state_nodes_added += state_nodes as u64;
        self.stats.tx_nodes_added += tx_nodes as u64;
        if state_hash_matches {
            self.stats.successful_hash_verifications += 1;
        } else {
            self.stats.failed_hash_verifications += 1;
        }
        if tx_hash_matches {
            self.stats.successful_hash_verifications += 1;
        } else {
            self.stats.failed_hash_verifications += 1;
        }

        Ok(Some(LedgerOutcome {
            info,
            state_nodes,
            tx_nodes,
            state_hash_matches,
            tx_hash_matches,
        }))
    }

    fn process_map(
        &mut self,
        mut offset: usize,
        is_state_map: bool,
        nodes_processed: &mut u32,
    ) -> Result<usize, ParseError> {
        loop {
            let file_offset = offset as u64;
            let (record, next) =
                stream::read_record(self.data, offset, file_offset, self.options.max_value_size)?;
            offset = next;
            match record {
                Record::Terminal => return Ok(offset),
                Record::Remove { key } => {
                    if !is_state_map {
                        return Err(ParseError::new(
                            file_offset,
                            ParseErrorKind::WrongStreamContext(
                                "REMOVE record is only valid in the state map stream",
                            ),
                        ));
                    }
                    self.stats.state_removals_attempted += 1;
                    let removed = self.state_map.remove_item(key).map_err(|e| {
                        ParseError::new(file_offset, ParseErrorKind::Tree(e))
                    })?;
                    if removed {
                        self.stats.state_removals_succeeded += 1;
                        *nodes_processed += 1;
                    }
                    // A REMOVE targeting a key already absent from the state
                    // map is a no-op, not an error; only the attempt is
                    // counted.
                }
                Record::Node {
                    node_type, key, value,
                } => {
                    let leaf_type = match (is_state_map, node_type) {
                        (true, NodeType::AccountState) => LeafType::AccountState,
                        (false, NodeType::TransactionNoMeta) => LeafType::TransactionNoMeta,
                        (false, NodeType::TransactionWithMeta) => LeafType::TransactionWithMeta,
                        _ => {
                            return Err(ParseError::new(
                                file_offset,
                                ParseErrorKind::WrongStreamContext(
                                    "node type tag is not valid for this stream",
                                ),
                            ))
                        }
                    };
                    let item = Item::new(key, Slice::Borrowed(value));
                    let map = if is_state_map {
                        &mut self.state_map
                    } else {
                        &mut self.tx_map
                    };
                    map.set_item(item, SetMode::AddOrUpdate)
                        .map_err(|e| ParseError::new(file_offset, ParseErrorKind::Tree(e)))?;
                    *nodes_processed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catl1::writer::CatlWriter;

    fn sample_file() -> Vec<u8> {
        let mut w = CatlWriter::new(1, 1, 0);
        w.begin_ledger(LedgerInfo {
            sequence: 1,
            hash: crate::primitives::Hash256::ZERO,
            tx_hash: crate::primitives::Hash256::ZERO,
            account_hash: crate::primitives::Hash256::ZERO,
            parent_hash: crate::primitives::Hash256::ZERO,
            drops: 0,
            close_flags: 0,
            close_time_resolution: 10,
            close_time: 0,
            parent_close_time: 0,
        })
        .unwrap();
        w.write_state_node(crate::primitives::Key::ZERO, &[0u8; 32]).unwrap();
        w.finish_state().unwrap();
        w.finish_tx().unwrap();
        w.into_bytes()
    }

    #[test]
    fn reads_back_a_minimal_single_ledger_file() {
        let bytes = sample_file();
        let mut reader = CatlReader::new(&bytes, ReaderOptions::default()).unwrap();
        let outcome = reader.next_ledger().unwrap().expect("one ledger");
        assert_eq!(outcome.info.sequence, 1);
        assert_eq!(outcome.state_nodes, 1);
        assert!(outcome.state_hash_matches);
        assert!(reader.next_ledger().unwrap().is_none());
    }
}
