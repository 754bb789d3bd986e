//! Keeps mapped objects reachable from dedicated refs.
//!
//! Objects that are only referenced from inside a serialized record are not
//! reachable through tree entries, so a collector would drop them. Mappers
//! record every such object here; [`ObjectReferenceTracker::flush`] appends
//! the recorded entries to the tree behind the matching reserved ref.

use crate::backend::Backend;
use crate::error::Result;
use crate::hash::Hash;
use crate::tree::{EntryType, FileMode, TreeEntry, file_modes};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Reserved refs maintained by the metadata model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectReference {
    TreeVersionList,
    UuidSet,
    DatasetTree,
    Metadata,
    FileTree,
}

impl ObjectReference {
    pub const ALL: [ObjectReference; 5] = [
        ObjectReference::TreeVersionList,
        ObjectReference::UuidSet,
        ObjectReference::DatasetTree,
        ObjectReference::Metadata,
        ObjectReference::FileTree,
    ];

    /// Full ref name.
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectReference::TreeVersionList => "refs/datalad/dataset-tree-version-list",
            ObjectReference::UuidSet => "refs/datalad/dataset-uuid-set",
            ObjectReference::DatasetTree => "refs/datalad/object-references/dataset-tree",
            ObjectReference::Metadata => "refs/datalad/object-references/metadata",
            ObjectReference::FileTree => "refs/datalad/object-references/file-tree",
        }
    }
}

/// Name of the tree entry that pins `hash`.
pub fn object_reference_name(hash: &Hash) -> String {
    format!("object_reference:{}", hash)
}

/// In-memory batches of pinning entries, grouped by ref.
///
/// One tracker belongs to one session; nothing touches the backend until
/// [`flush`](ObjectReferenceTracker::flush).
#[derive(Debug, Default)]
pub struct ObjectReferenceTracker {
    pending: BTreeMap<ObjectReference, Vec<TreeEntry>>,
}

impl ObjectReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a pinning entry for `hash` under `reference`.
    ///
    /// Entries are not deduplicated.
    pub fn record(
        &mut self,
        reference: ObjectReference,
        mode: FileMode,
        entry_type: EntryType,
        hash: Hash,
    ) -> Result<()> {
        let entry = TreeEntry::new(entry_type, mode, hash, object_reference_name(&hash))?;
        self.pending.entry(reference).or_default().push(entry);
        Ok(())
    }

    pub fn add_tree_reference(&mut self, reference: ObjectReference, hash: Hash) -> Result<()> {
        self.record(reference, file_modes::TREE, EntryType::Tree, hash)
    }

    pub fn add_blob_reference(&mut self, reference: ObjectReference, hash: Hash) -> Result<()> {
        self.record(reference, file_modes::BLOB, EntryType::Blob, hash)
    }

    /// Entries queued for `reference`.
    pub fn pending(&self, reference: ObjectReference) -> &[TreeEntry] {
        self.pending.get(&reference).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    /// Append every pending batch to its ref's tree in `backend`.
    ///
    /// Each ref is updated under the realm lock. Existing entries are kept.
    /// A batch whose update fails stays pending and the first error is
    /// returned after all batches were tried.
    pub fn flush(&mut self, backend: &dyn Backend) -> Result<()> {
        let mut first_error = None;

        for (reference, entries) in std::mem::take(&mut self.pending) {
            match Self::flush_batch(backend, reference, &entries) {
                Ok(location) => debug!(
                    realm = backend.realm(),
                    reference = reference.as_str(),
                    added = entries.len(),
                    %location,
                    "flushed object references"
                ),
                Err(e) => {
                    warn!(
                        realm = backend.realm(),
                        reference = reference.as_str(),
                        error = %e,
                        "object reference flush failed"
                    );
                    self.pending.insert(reference, entries);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush_batch(
        backend: &dyn Backend,
        reference: ObjectReference,
        entries: &[TreeEntry],
    ) -> Result<Hash> {
        let _guard = backend.lock()?;

        let mut tree_entries = backend.list_ref_tree(reference.as_str())?;
        tree_entries.extend_from_slice(entries);

        let location = backend.save_tree(tree_entries)?;
        backend.update_ref(reference.as_str(), &location)?;
        Ok(location)
    }

    /// Removing pins is not supported.
    ///
    /// # Panics
    ///
    /// Always.
    pub fn remove_object_reference(&mut self, reference: ObjectReference, hash: &Hash) {
        unimplemented!(
            "removing object reference {} from {}",
            hash,
            reference.as_str()
        )
    }
}
