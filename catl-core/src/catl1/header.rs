// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! The 88-byte CATL v1 file header, grounded on `CATLHeader` in the
//! original hasher: magic, ledger range, version/compression bits, network
//! id, declared file size, and a (usually-zero) whole-file hash.

use crate::error::{ParseError, ParseErrorKind};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// `"CATL"` read as a little-endian `u32`.
pub const MAGIC: u32 = 0x4C54_4143;
pub const VERSION_MASK: u16 = 0x00FF;
pub const COMPRESS_LEVEL_MASK: u16 = 0x0F00;

pub const HEADER_SIZE: usize = 4 + 4 + 4 + 2 + 2 + 8 + 64;

/// CATL v1's fixed 88-byte header. `file_hash` is carried through
/// byte-for-byte on a round trip but, per rippled's own catalogue tooling,
/// is conventionally left all-zero and is not validated by this reader.
///
/// `version`'s low byte is the format version; its next byte is a zlib
/// compression level (0 = uncompressed). This header is agnostic to which
/// is set. Decompressing a compressed body is [`crate::catl1::compress`]'s
/// job, run before the ledger stream is ever touched.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CatlHeader {
    pub magic: u32,
    pub min_ledger: u32,
    pub max_ledger: u32,
    pub version: u16,
    pub network_id: u16,
    pub filesize: u64,
    pub file_hash: [u8; 64],
}

impl CatlHeader {
    pub fn new(min_ledger: u32, max_ledger: u32, network_id: u16) -> Self {
        CatlHeader {
            magic: MAGIC,
            min_ledger,
            max_ledger,
            version: 1,
            network_id,
            filesize: 0,
            file_hash: [0u8; 64],
        }
    }

    pub fn version_number(&self) -> u16 {
        self.version & VERSION_MASK
    }

    pub fn compression_level(&self) -> u8 {
        ((self.version & COMPRESS_LEVEL_MASK) >> 8) as u8
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self, ParseError> {
        let magic = r
            .read_u32::<LittleEndian>()
            .map_err(|e| io_err(0, e))?;
        if magic != MAGIC {
            return Err(ParseError::new(
                0,
                ParseErrorKind::InvalidHeader(format!(
                    "bad magic: expected 0x{MAGIC:08X}, got 0x{magic:08X}"
                )),
            ));
        }
        let min_ledger = r.read_u32::<LittleEndian>().map_err(|e| io_err(4, e))?;
        let max_ledger = r.read_u32::<LittleEndian>().map_err(|e| io_err(8, e))?;
        let version = r.read_u16::<LittleEndian>().map_err(|e| io_err(12, e))?;
        let network_id = r.read_u16::<LittleEndian>().map_err(|e| io_err(14, e))?;
        let filesize = r.read_u64::<LittleEndian>().map_err(|e| io_err(16, e))?;
        let mut file_hash = [0u8; 64];
        r.read_exact(&mut file_hash).map_err(|e| io_err(24, e))?;

        let header = CatlHeader {
            magic,
            min_ledger,
            max_ledger,
            version,
            network_id,
            filesize,
            file_hash,
        };
        Ok(header)
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.magic)?;
        w.write_u32::<LittleEndian>(self.min_ledger)?;
        w.write_u32::<LittleEndian>(self.max_ledger)?;
        w.write_u16::<LittleEndian>(self.version)?;
        w.write_u16::<LittleEndian>(self.network_id)?;
        w.write_u64::<LittleEndian>(self.filesize)?;
        w.write_all(&self.file_hash)
    }
}

fn io_err(offset: u64, e: io::Error) -> ParseError {
    let kind = if e.kind() == io::ErrorKind::UnexpectedEof {
        ParseErrorKind::UnexpectedEof {
            wanted: HEADER_SIZE,
            available: offset as usize,
        }
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
        let header = CatlHeader {
            filesize: 12345,
            ..CatlHeader::new(10, 20, 1)
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let parsed = CatlHeader::read_from(&buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0] = 0xFF;
        assert!(CatlHeader::read_from(&buf[..]).is_err());
    }
}
