//! Backend primitives consumed by the mapping layer.
//!
//! A backend family is a named storage implementation; a realm is one
//! instance of it. References carry both names so that an object can be
//! loaded again without the caller holding on to the backend.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::lock::{BackendLock, BackendLockGuard};
use crate::store::Store;
use crate::tree::{ListedEntry, TreeEntry};
use std::path::Path;

/// Family name of the on-disk content-addressed store.
pub const CAS_FAMILY: &str = "cas";

/// Storage primitives of one realm.
///
/// Implementations must be deterministic: saving the same tree entries or
/// blob bytes twice yields the same location.
pub trait Backend {
    /// Mapper family this backend belongs to.
    fn family(&self) -> &str;

    /// Realm identifier recorded in references.
    fn realm(&self) -> &str;

    /// Directory that identifies the realm for locking.
    fn realm_path(&self) -> &Path;

    /// List every leaf below the tree at `location`.
    ///
    /// Fails with `BackendRead` if `location` is not a readable tree.
    fn list_tree_recursive(&self, location: &Hash) -> Result<Vec<ListedEntry>>;

    /// List the immediate entries of the tree `ref_name` points at. A ref
    /// that does not exist lists as empty.
    fn list_ref_tree(&self, ref_name: &str) -> Result<Vec<TreeEntry>>;

    fn save_tree(&self, entries: Vec<TreeEntry>) -> Result<Hash>;

    fn save_blob(&self, data: &[u8]) -> Result<Hash>;

    fn load_blob(&self, location: &Hash) -> Result<Vec<u8>>;

    fn read_ref(&self, ref_name: &str) -> Result<Option<Hash>>;

    /// Repoint `ref_name` at `location`.
    fn update_ref(&self, ref_name: &str, location: &Hash) -> Result<()>;

    /// Take the realm's read-modify-write lock for the guard's lifetime.
    fn lock(&self) -> Result<BackendLockGuard> {
        BackendLock::for_realm(self.realm_path()).acquire()
    }
}

/// Open the realm `realm` of backend family `family`.
pub fn open_backend(family: &str, realm: &str) -> Result<Box<dyn Backend>> {
    match family {
        CAS_FAMILY => Ok(Box::new(Store::open(realm)?)),
        _ => Err(Error::unknown_mapper_family(family)),
    }
}

impl Backend for Store {
    fn family(&self) -> &str {
        CAS_FAMILY
    }

    fn realm(&self) -> &str {
        Store::realm(self)
    }

    fn realm_path(&self) -> &Path {
        self.root()
    }

    fn list_tree_recursive(&self, location: &Hash) -> Result<Vec<ListedEntry>> {
        Store::list_tree_recursive(self, location)
            .map_err(|e| Error::backend_read(location.to_hex(), e))
    }

    fn list_ref_tree(&self, ref_name: &str) -> Result<Vec<TreeEntry>> {
        match self.refs().get(ref_name)? {
            Some(hash) => self
                .get_tree(&hash)
                .map_err(|e| Error::backend_read(format!("{} ({})", ref_name, hash), e)),
            None => Ok(Vec::new()),
        }
    }

    fn save_tree(&self, entries: Vec<TreeEntry>) -> Result<Hash> {
        self.put_tree(entries)
    }

    fn save_blob(&self, data: &[u8]) -> Result<Hash> {
        self.put_blob(data)
    }

    fn load_blob(&self, location: &Hash) -> Result<Vec<u8>> {
        self.get_blob(location)
    }

    fn read_ref(&self, ref_name: &str) -> Result<Option<Hash>> {
        self.refs().get(ref_name)
    }

    fn update_ref(&self, ref_name: &str, location: &Hash) -> Result<()> {
        self.refs().update(ref_name, location)
    }
}
