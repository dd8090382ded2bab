// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! The 164-byte per-ledger header, grounded on `LedgerInfo` in the
//! original hasher.

use crate::error::{ParseError, ParseErrorKind};
use crate::primitives::Hash256;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const LEDGER_INFO_SIZE: usize = 4 + 32 * 4 + 8 + 4 + 4 + 8 + 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LedgerInfo {
    pub sequence: u32,
    pub hash: Hash256,
    pub tx_hash: Hash256,
    pub account_hash: Hash256,
    pub parent_hash: Hash256,
    pub drops: u64,
    pub close_flags: u32,
    pub close_time_resolution: u32,
    pub close_time: u64,
    pub parent_close_time: u64,
}

impl LedgerInfo {
    pub fn read_from<R: Read>(mut r: R, base_offset: u64) -> Result<Self, ParseError> {
        let sequence = read_u32(&mut r, base_offset)?;
        let hash = read_hash(&mut r, base_offset + 4)?;
        let tx_hash = read_hash(&mut r, base_offset + 36)?;
        let account_hash = read_hash(&mut r, base_offset + 68)?;
        let parent_hash = read_hash(&mut r, base_offset + 100)?;
        let drops = read_u64(&mut r, base_offset + 132)?;
        let close_flags = read_u32(&mut r, base_offset + 140)?;
        let close_time_resolution = read_u32(&mut r, base_offset + 144)?;
        let close_time = read_u64(&mut r, base_offset + 148)?;
        let parent_close_time = read_u64(&mut r, base_offset + 156)?;
        Ok(LedgerInfo {
            sequence,
            hash,
            tx_hash,
            account_hash,
            parent_hash,
            drops,
            close_flags,
            close_time_resolution,
            close_time,
            parent_close_time,
        })
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.sequence)?;
        w.write_all(self.hash.as_bytes())?;
        w.write_all(self.tx_hash.as_bytes())?;
        w.write_all(self.account_hash.as_bytes())?;
        w.write_all(self.parent_hash.as_bytes())?;
        w.write_u64::<LittleEndian>(self.drops)?;
        w.write_u32::<LittleEndian>(self.close_flags)?;
        w.write_u32::<LittleEndian>(self.close_time_resolution)?;
        w.write_u64::<LittleEndian>(self.close_time)?;
        w.write_u64::<LittleEndian>(self.parent_close_time)
    }
}

fn read_u32<R: Read>(r: &mut R, offset: u64) -> Result<u32, ParseError> {
    r.read_u32::<LittleEndian>().map_err(|e| eof(offset, 4, e))
}

fn read_u64<R: Read>(r: &mut R, offset: u64) -> Result<u64, ParseError> {
    r.read_u64::<LittleEndian>().map_err(|e| eof(offset, 8, e))
}

fn read_hash<R: Read>(r: &mut R, offset: u64) -> Result<Hash256, ParseError> {
    let mut buf = [0u8; 32];
    r.read_exact(&mut buf).map_err(|e| eof(offset, 32, e))?;
    Ok(Hash256::from_bytes(buf))
}

fn eof(offset: u64, wanted: usize, e: io::Error) -> ParseError {
    let kind = if e.kind() == io::ErrorKind::UnexpectedEof {
        ParseErrorKind::UnexpectedEof { wanted, available: 0 }
    } else {
        ParseErrorKind::InvalidHeader(format!("I/O error: {e}"))
    };
    ParseError::new(offset, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let info = LedgerInfo {
            sequence: 42,
            hash: Hash256::from_bytes([1u8; 32]),
            tx_hash: Hash256::from_bytes([2u8; 32]),
            account_hash: Hash256::from_bytes([3u8; 32]),
            parent_hash: Hash256::from_bytes([4u8; 32]),
            drops: 100_000_000_000,
            close_flags: 0,
            close_time_resolution: 10,
            close_time: 700_000_000,
            parent_close_time: 699_999_990,
        };
        let mut buf = Vec::new();
        info.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), LEDGER_INFO_SIZE);
        let parsed = LedgerInfo::read_from(&buf[..], 0).unwrap();
        assert_eq!(parsed, info);
    }
}
