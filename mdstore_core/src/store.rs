//! The `cas` realm: a directory of content-addressed blobs and trees.
//!
//! ```text
//! <realm>/config.json
//! <realm>/objects/<algorithm>/<xx>/<remaining hex digits>
//! <realm>/refs/<ref name>
//! ```

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Hash};
use crate::object::{Encoding, MAX_HEADER_LEN, ObjectHeader};
use crate::refs::RefManager;
use crate::tree::{self, EntryType, ListedEntry, TreeEntry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Blobs at least this large are stored zstd-encoded.
const ZSTD_MIN_LEN: usize = 4096;

const ZSTD_LEVEL: i32 = 3;

const CONFIG_FILE: &str = "config.json";

const CONFIG_FORMAT: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RealmConfig {
    format: u32,
    algorithm: Algorithm,
}

/// A content-addressed store rooted at one realm directory.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    realm: String,
    algorithm: Algorithm,
}

impl Store {
    /// Create the realm layout at `root` and open it.
    pub fn init<P: AsRef<Path>>(root: P, algorithm: Algorithm) -> Result<Self> {
        let store = Self::new(root.as_ref(), algorithm);

        fs::create_dir_all(store.objects_dir())?;
        fs::create_dir_all(store.root.join("refs"))?;
        let config = RealmConfig {
            format: CONFIG_FORMAT,
            algorithm,
        };
        fs::write(
            store.root.join(CONFIG_FILE),
            serde_json::to_vec_pretty(&config)?,
        )?;

        Ok(store)
    }

    /// Open an initialized realm.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let invalid = |reason: String| Error::invalid_store(root, reason);

        let config = fs::read(root.join(CONFIG_FILE))
            .map_err(|e| invalid(format!("unreadable {}: {}", CONFIG_FILE, e)))?;
        let config: RealmConfig = serde_json::from_slice(&config)
            .map_err(|e| invalid(format!("malformed {}: {}", CONFIG_FILE, e)))?;
        if config.format != CONFIG_FORMAT {
            return Err(invalid(format!(
                "unsupported config format {}",
                config.format
            )));
        }

        let store = Self::new(root, config.algorithm);
        for required in [store.objects_dir(), root.join("refs")] {
            if !required.is_dir() {
                return Err(invalid(format!("missing {}", required.display())));
            }
        }
        Ok(store)
    }

    fn new(root: &Path, algorithm: Algorithm) -> Self {
        Self {
            root: root.to_path_buf(),
            realm: root.to_string_lossy().into_owned(),
            algorithm,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The realm identifier recorded in references to this store's objects.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn refs(&self) -> RefManager<'_> {
        RefManager::new(self)
    }

    pub(crate) fn objects_dir(&self) -> PathBuf {
        self.root.join("objects").join(self.algorithm.as_str())
    }

    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        self.objects_dir().join(hash.shard_path())
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.object_path(hash).is_file()
    }

    /// Kind of a stored object, read from its header only.
    pub fn object_kind(&self, hash: &Hash) -> Result<EntryType> {
        let mut prefix = Vec::with_capacity(MAX_HEADER_LEN);
        self.open_object(hash)?
            .take(MAX_HEADER_LEN as u64)
            .read_to_end(&mut prefix)?;
        Ok(ObjectHeader::split(&prefix)?.0.kind)
    }

    fn open_object(&self, hash: &Hash) -> Result<fs::File> {
        fs::File::open(self.object_path(hash)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::object_not_found(hash.to_hex()),
            _ => e.into(),
        })
    }

    /// Decoded payload of the object at `hash`, which must be of `kind`.
    /// The payload is checked against `hash`.
    fn read_object(&self, hash: &Hash, kind: EntryType) -> Result<Vec<u8>> {
        let mut file = Vec::new();
        self.open_object(hash)?.read_to_end(&mut file)?;
        let path = self.object_path(hash);

        let (header, stored) = ObjectHeader::split(&file)?;
        if header.kind != kind {
            return Err(Error::invalid_object_type(
                kind.as_str(),
                header.kind.as_str(),
            ));
        }
        if stored.len() as u64 != header.stored_len {
            return Err(Error::corrupted_object(
                &path,
                format!("{} stored bytes, header says {}", stored.len(), header.stored_len),
            ));
        }

        let payload = match header.encoding {
            Encoding::Raw => stored.to_vec(),
            Encoding::Zstd => zstd::decode_all(stored)
                .map_err(|e| Error::compression_error(format!("zstd decode: {}", e)))?,
        };

        let actual = self.algorithm.digest(&payload);
        if actual != *hash {
            return Err(Error::corrupted_object(
                &path,
                format!("content digests to {}", actual),
            ));
        }
        Ok(payload)
    }

    /// Store `payload` under its digest. An object that is already present
    /// is not rewritten.
    fn write_object(&self, kind: EntryType, payload: &[u8]) -> Result<Hash> {
        let hash = self.algorithm.digest(payload);
        let path = self.object_path(&hash);
        if path.is_file() {
            return Ok(hash);
        }

        let (encoding, stored) = if kind == EntryType::Blob && payload.len() >= ZSTD_MIN_LEN {
            let encoded = zstd::encode_all(payload, ZSTD_LEVEL)
                .map_err(|e| Error::compression_error(format!("zstd encode: {}", e)))?;
            (Encoding::Zstd, encoded)
        } else {
            (Encoding::Raw, payload.to_vec())
        };
        let header = ObjectHeader {
            kind,
            encoding,
            stored_len: stored.len() as u64,
        };

        let shard = path
            .parent()
            .ok_or_else(|| Error::invalid_store(&self.root, "object path has no parent"))?;
        fs::create_dir_all(shard)?;

        // Written beside the target so the rename stays on one filesystem
        let mut staged = tempfile::NamedTempFile::new_in(shard)?;
        staged.write_all(&header.encode())?;
        staged.write_all(&stored)?;
        staged.as_file().sync_data()?;
        staged.persist(&path)?;

        trace!(%hash, kind = kind.as_str(), encoding = encoding.as_str(), "stored object");
        Ok(hash)
    }

    pub fn put_blob(&self, data: &[u8]) -> Result<Hash> {
        self.write_object(EntryType::Blob, data)
    }

    pub fn get_blob(&self, hash: &Hash) -> Result<Vec<u8>> {
        self.read_object(hash, EntryType::Blob)
    }

    /// Store a tree. Entry order does not matter: the encoding is canonical.
    pub fn put_tree(&self, entries: Vec<TreeEntry>) -> Result<Hash> {
        self.write_object(EntryType::Tree, &tree::encode_tree(entries))
    }

    pub fn get_tree(&self, hash: &Hash) -> Result<Vec<TreeEntry>> {
        tree::decode_tree(&self.read_object(hash, EntryType::Tree)?)
    }

    /// Every blob below the tree `hash`, depth-first in entry order, named by
    /// its path relative to that tree.
    pub fn list_tree_recursive(&self, hash: &Hash) -> Result<Vec<ListedEntry>> {
        let mut listed = Vec::new();
        let mut stack = vec![(String::new(), self.get_tree(hash)?.into_iter())];

        while let Some((prefix, entries)) = stack.last_mut() {
            let Some(entry) = entries.next() else {
                stack.pop();
                continue;
            };
            let path = match prefix.as_str() {
                "" => entry.name,
                _ => format!("{}/{}", prefix, entry.name),
            };
            match entry.entry_type {
                EntryType::Blob => listed.push(ListedEntry {
                    entry_type: entry.entry_type,
                    mode: entry.mode,
                    hash: entry.hash,
                    path,
                }),
                EntryType::Tree => stack.push((path, self.get_tree(&entry.hash)?.into_iter())),
            }
        }

        Ok(listed)
    }
}
