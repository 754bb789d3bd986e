//! Object file framing.
//!
//! An object file is a short text header, a NUL byte, then the stored
//! payload:
//!
//! ```text
//! <kind> <encoding> <stored length>\0<payload>
//! ```
//!
//! `kind` is `blob` or `tree` and `encoding` is `raw` or `zstd`. The object's
//! location is the digest of the decoded payload, not of the file.

use crate::error::{Error, Result};
use crate::tree::EntryType;

/// Longest possible header, terminator included.
pub const MAX_HEADER_LEN: usize = 32;

/// How the payload is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Zstd,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Raw => "raw",
            Encoding::Zstd => "zstd",
        }
    }

    fn parse(name: &str) -> Result<Self> {
        match name {
            "raw" => Ok(Encoding::Raw),
            "zstd" => Ok(Encoding::Zstd),
            _ => Err(Error::invalid_header(format!("unknown encoding {:?}", name))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub kind: EntryType,
    pub encoding: Encoding,
    /// Length of the payload as stored, after encoding.
    pub stored_len: u64,
}

impl ObjectHeader {
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{} {} {}\0",
            self.kind.as_str(),
            self.encoding.as_str(),
            self.stored_len
        )
        .into_bytes()
    }

    /// Parse the header at the start of `data` and return it together with
    /// the bytes that follow the terminator.
    pub fn split(data: &[u8]) -> Result<(Self, &[u8])> {
        let end = data
            .iter()
            .take(MAX_HEADER_LEN)
            .position(|&byte| byte == 0)
            .ok_or_else(|| Error::invalid_header("no terminator within header bounds"))?;
        let text = std::str::from_utf8(&data[..end])
            .map_err(|_| Error::invalid_header("header is not UTF-8"))?;

        let mut fields = text.split(' ');
        let (Some(kind), Some(encoding), Some(stored_len), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::invalid_header(format!("malformed header {:?}", text)));
        };

        let header = ObjectHeader {
            kind: EntryType::parse(kind)
                .map_err(|_| Error::invalid_header(format!("unknown kind {:?}", kind)))?,
            encoding: Encoding::parse(encoding)?,
            stored_len: stored_len
                .parse()
                .map_err(|_| Error::invalid_header(format!("bad length {:?}", stored_len)))?,
        };
        Ok((header, &data[end + 1..]))
    }
}
