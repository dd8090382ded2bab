// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Error kinds for the trie core (structural/programmer errors) and the
//! CATL parser (offset-tagged parse errors), per the error handling design.

use thiserror::Error;

/// Structural errors in the trie core. These should not occur on
/// well-formed input; they are programmer errors, surfaced to the caller
/// rather than swallowed.
#[derive(Debug, Error, Eq, PartialEq, Clone, Copy)]
pub enum Error {
    #[error("invalid depth {depth} for branch selection (max allowed is 63)")]
    InvalidDepth { depth: u8 },

    #[error("collision resolution reached max depth 64 without diverging")]
    MaxDepthExceeded,

    #[error("internal SHAMap invariant violated: {0}")]
    Internal(&'static str),
}

/// The kind of a CATL parse failure, independent of where it occurred.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum ParseErrorKind {
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unexpected end of file: wanted {wanted} bytes, {available} available")]
    UnexpectedEof { wanted: usize, available: usize },

    #[error("invalid node type tag 0x{tag:02X}")]
    InvalidNodeType { tag: u8 },

    #[error("invalid value size {size} (limit is {limit})")]
    InvalidValueSize { size: u32, limit: u32 },

    #[error("node of this kind is not valid in this stream context: {0}")]
    WrongStreamContext(&'static str),

    #[error(transparent)]
    Tree(#[from] Error),
}

/// A parse failure tagged with the byte offset at which it occurred,
/// matching the CLI driver contract: "given a byte source for
/// a CATL file, either drives processing to completion or returns an error
/// with the byte offset at which parsing failed."
#[derive(Debug, Error, Eq, PartialEq, Clone)]
#[error("parse error at offset {offset}: {kind}")]
pub struct ParseError {
    pub offset: u64,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(offset: u64, kind: ParseErrorKind) -> Self {
        ParseError { offset, kind }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
pub type ParseResult<T> = std::result::Result<T, ParseError>;
