//! Byte-range request and response headers
//!
//! Request ranges follow the storage service's convention of
//! `bytes=<offset>-<offset + size>`; responses carry the total object size
//! after the slash of a `Content-Range` value.

use std::fmt;

use crate::error::{Error, Result};

/// Offset value callers use to ask for the trailing bytes of an object
pub const FROM_END: i64 = -1;

/// A byte range to request from a storage node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `size` bytes starting at `offset`
    Span { offset: u64, size: u64 },
    /// The last `size` bytes of the object
    Suffix(u64),
    /// Everything from `offset` to the end (resumed downloads)
    From(u64),
}

impl ByteRange {
    /// Build a range from an offset that may be the [`FROM_END`] sentinel
    pub fn new(offset: i64, size: u64) -> Result<Self> {
        match offset {
            FROM_END => Ok(ByteRange::Suffix(size)),
            o if o >= 0 => Ok(ByteRange::Span {
                offset: o as u64,
                size,
            }),
            o => Err(Error::Range(format!("negative offset {o}"))),
        }
    }

    /// Header value for the `Range` request header
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::Span { offset, size } => {
                write!(f, "bytes={}-{}", offset, offset.saturating_add(*size))
            }
            ByteRange::Suffix(size) => write!(f, "bytes=-{size}"),
            ByteRange::From(offset) => write!(f, "bytes={offset}-"),
        }
    }
}

/// Extract the total object size from a `Content-Range` value
///
/// Expects `<unit> <start>-<end>/<total>`.
pub fn parse_total_size(content_range: &str) -> Result<u64> {
    let mut parts = content_range.split('/');
    let (Some(_served), Some(total), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::Range(format!("wrong range {content_range}")));
    };

    let total = total.trim();
    if total.is_empty() {
        return Err(Error::Range(format!(
            "missing total size in {content_range}"
        )));
    }
    total
        .parse::<u64>()
        .map_err(|e| Error::Range(format!("bad total size in {content_range}: {e}")))
}
