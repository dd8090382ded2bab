// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Zlib body decompression for CATL v1 files written with a non-zero
//! compression level, grounded on the reference validator's stream setup:
//! the header is always stored uncompressed, and everything after it is a
//! raw zlib stream when `compression_level() > 0`.

use crate::catl1::header::{CatlHeader, HEADER_SIZE};
use crate::error::{ParseError, ParseErrorKind};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Either the original buffer (no copy needed) or a freshly inflated one.
pub enum Body<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl<'a> Body<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Body::Borrowed(b) => b,
            Body::Owned(v) => v,
        }
    }
}

/// Reads `data`'s header and, if it declares a non-zero compression level,
/// inflates the body that follows. The returned buffer always begins with
/// the same 88-byte header followed by an uncompressed ledger stream, so
/// [`crate::catl1::reader::CatlReader::new`] can be handed its output
/// exactly as it would a never-compressed file.
pub fn load(data: &[u8]) -> Result<Body<'_>, ParseError> {
    let header = CatlHeader::read_from(data)?;
    if header.compression_level() == 0 {
        return Ok(Body::Borrowed(data));
    }

    let compressed = &data[HEADER_SIZE..];
    let mut decoder = ZlibDecoder::new(compressed);
    let mut inflated = Vec::new();
    decoder.read_to_end(&mut inflated).map_err(|e| {
        ParseError::new(
            HEADER_SIZE as u64,
            ParseErrorKind::InvalidHeader(format!(
                "zlib decompression failed (level {}): {e}",
                header.compression_level()
            )),
        )
    })?;

    let mut out = Vec::with_capacity(HEADER_SIZE + inflated.len());
    out.extend_from_slice(&data[..HEADER_SIZE]);
    out.extend_from_slice(&inflated);
    Ok(Body::Owned(out))
}
