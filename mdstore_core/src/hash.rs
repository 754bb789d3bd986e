//! Object locations.
//!
//! A location is the BLAKE3 digest of an object's uncompressed payload and is
//! written as 64 lowercase hex digits everywhere it leaves the process:
//! reference JSON, tree lines, ref files and object file names.

use crate::error::{Error, Result};
use hex::FromHex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Digest length in bytes.
pub const HASH_SIZE: usize = 32;

/// Digest a realm names its objects with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "blake3-256")]
    Blake3,
}

impl Algorithm {
    /// Name recorded in the realm config and used as the objects directory.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Blake3 => "blake3-256",
        }
    }

    pub fn digest(self, data: &[u8]) -> Hash {
        match self {
            Algorithm::Blake3 => Hash(*blake3::hash(data).as_bytes()),
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        [Algorithm::Blake3]
            .into_iter()
            .find(|algorithm| algorithm.as_str() == name)
            .ok_or_else(|| Error::unsupported_algorithm(name))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub fn hash_bytes(data: &[u8]) -> Self {
        Algorithm::default().digest(data)
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        <[u8; HASH_SIZE]>::from_hex(text)
            .map(Hash)
            .map_err(|e| Error::invalid_hash(format!("{:?}: {}", text, e)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `<first byte>/<remaining bytes>` in hex; objects are sharded by their
    /// first byte.
    pub fn shard_path(&self) -> PathBuf {
        let (shard, rest) = self.0.split_at(1);
        PathBuf::from(hex::encode(shard)).join(hex::encode(rest))
    }
}

impl FromStr for Hash {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Hash::from_hex(text)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_hex()).finish()
    }
}
