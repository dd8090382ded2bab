// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! The per-map node stream: a sequence of tagged records terminated by
//! `TERMINAL`, grounded on `processMap`'s byte layout in the original
//! hasher. Each record is `[tag: u8][key: 32 bytes]` and, for anything
//! other than `REMOVE`/`TERMINAL`, `[size: u32 LE][value: size bytes]`.

use crate::error::{ParseError, ParseErrorKind};
use crate::primitives::Key;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

/// Default sanity ceiling on a single record's value size, matching the
/// original hasher's `MAX_REASONABLE_DATA_SIZE` (5 MiB). Configurable via
/// [`crate::catl1::ReaderOptions::max_value_size`] since real ledger state
/// can occasionally carry larger blobs than rippled's own tooling assumed.
pub const DEFAULT_MAX_VALUE_SIZE: u32 = 5 * 1024 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeType {
    Inner,
    TransactionNoMeta,
    TransactionWithMeta,
    AccountState,
    Remove,
    Terminal,
}

impl NodeType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(NodeType::Inner),
            2 => Some(NodeType::TransactionNoMeta),
            3 => Some(NodeType::TransactionWithMeta),
            4 => Some(NodeType::AccountState),
            254 => Some(NodeType::Remove),
            255 => Some(NodeType::Terminal),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            NodeType::Inner => 1,
            NodeType::TransactionNoMeta => 2,
            NodeType::TransactionWithMeta => 3,
            NodeType::AccountState => 4,
            NodeType::Remove => 254,
            NodeType::Terminal => 255,
        }
    }
}

/// One record read from a node stream, borrowing directly out of the
/// input buffer.
pub enum Record<'a> {
    Node {
        node_type: NodeType,
        key: Key,
        value: &'a [u8],
    },
    Remove {
        key: Key,
    },
    Terminal,
}

/// Reads one record from `data` at `offset`. Returns the record and the
/// offset immediately past it. `offset` is relative to the start of `data`;
/// `file_offset` is added to it only for error reporting.
pub fn read_record<'a>(
    data: &'a [u8],
    offset: usize,
    file_offset: u64,
    max_value_size: u32,
) -> Result<(Record<'a>, usize), ParseError> {
    let mut pos = offset;
    let tag = *data.get(pos).ok_or_else(|| {
        ParseError::new(
            file_offset + pos as u64,
            ParseErrorKind::UnexpectedEof {
                wanted: 1,
                available: data.len().saturating_sub(pos),
            },
        )
    })?;
    pos += 1;

    let node_type = NodeType::from_tag(tag).ok_or_else(|| {
        ParseError::new(file_offset + pos as u64 - 1, ParseErrorKind::InvalidNodeType { tag })
    })?;

    if node_type == NodeType::Terminal {
        return Ok((Record::Terminal, pos));
    }

    let key_bytes = data.get(pos..pos + 32).ok_or_else(|| {
        ParseError::new(
            file_offset + pos as u64,
            ParseErrorKind::UnexpectedEof {
                wanted: 32,
                available: data.len().saturating_sub(pos),
            },
        )
    })?;
    let key = Key::from_slice(key_bytes).expect("exactly 32 bytes sliced");
    pos += 32;

    if node_type == NodeType::Remove {
        return Ok((Record::Remove { key }, pos));
    }

    let size_bytes = data.get(pos..pos + 4).ok_or_else(|| {
        ParseError::new(
            file_offset + pos as u64,
            ParseErrorKind::UnexpectedEof {
                wanted: 4,
                available: data.len().saturating_sub(pos),
            },
        )
    })?;
    let size = u32::from_le_bytes(size_bytes.try_into().unwrap());
    pos += 4;

    if size > max_value_size {
        return Err(ParseError::new(
            file_offset + pos as u64 - 4,
            ParseErrorKind::InvalidValueSize {
                size,
                limit: max_value_size,
            },
        ));
    }

    let value = data.get(pos..pos + size as usize).ok_or_else(|| {
        ParseError::new(
            file_offset + pos as u64,
            ParseErrorKind::UnexpectedEof {
                wanted: size as usize,
                available: data.len().saturating_sub(pos),
            },
        )
    })?;
    pos += size as usize;

    Ok((
        Record::Node {
            node_type,
            key,
            value,
        },
        pos,
    ))
}

pub fn write_node_record<W: Write>(mut w: W, node_type: NodeType, key: Key, value: &[u8]) -> io::Result<()> {
    w.write_u8(node_type.tag())?;
    w.write_all(key.as_bytes())?;
    w.write_u32::<LittleEndian>(value.len() as u32)?;
    w.write_all(value)
}

pub fn write_remove_record<W: Write>(mut w: W, key: Key) -> io::Result<()> {
    w.write_u8(NodeType::Remove.tag())?;
    w.write_all(key.as_bytes())
}

pub fn write_terminal<W: Write>(mut w: W) -> io::Result<()> {
    w.write_u8(NodeType::Terminal.tag())
}
