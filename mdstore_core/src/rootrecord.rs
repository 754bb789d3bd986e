//! Entry point to the metadata of one dataset version.

use crate::backend::Backend;
use crate::connector::Connector;
use crate::error::Result;
use crate::filetree::FileTree;
use crate::hash::Hash;
use crate::mapper::MappedObject;
use crate::metadata::Metadata;
use crate::reference::{RecordHeader, Reference};
use crate::tracker::{ObjectReference, ObjectReferenceTracker};
use serde::{Deserialize, Serialize};

/// Identifies a dataset version and connects its dataset-level metadata
/// and its file tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRootRecord {
    dataset_identifier: String,
    dataset_version: String,
    dataset_level_metadata: Connector<Metadata>,
    file_tree: Connector<FileTree>,
}

#[derive(Serialize, Deserialize)]
struct RootRecord {
    #[serde(rename = "@")]
    header: RecordHeader,
    dataset_identifier: String,
    dataset_version: String,
    dataset_level_metadata: Reference,
    file_tree: Reference,
}

impl MetadataRootRecord {
    pub fn new(
        dataset_identifier: impl Into<String>,
        dataset_version: impl Into<String>,
        dataset_level_metadata: Metadata,
        file_tree: FileTree,
    ) -> Self {
        Self::from_connectors(
            dataset_identifier,
            dataset_version,
            Connector::from_object(dataset_level_metadata),
            Connector::from_object(file_tree),
        )
    }

    pub fn from_connectors(
        dataset_identifier: impl Into<String>,
        dataset_version: impl Into<String>,
        dataset_level_metadata: Connector<Metadata>,
        file_tree: Connector<FileTree>,
    ) -> Self {
        Self {
            dataset_identifier: dataset_identifier.into(),
            dataset_version: dataset_version.into(),
            dataset_level_metadata,
            file_tree,
        }
    }

    pub fn dataset_identifier(&self) -> &str {
        &self.dataset_identifier
    }

    pub fn dataset_version(&self) -> &str {
        &self.dataset_version
    }

    pub fn dataset_level_metadata(&self) -> &Connector<Metadata> {
        &self.dataset_level_metadata
    }

    pub fn file_tree(&self) -> &Connector<FileTree> {
        &self.file_tree
    }

    /// The file-tree connector itself, for reaching file metadata through
    /// [`Connector::get_object_nested`].
    pub fn file_tree_mut(&mut self) -> &mut Connector<FileTree> {
        &mut self.file_tree
    }

    pub fn get_dataset_level_metadata(&mut self) -> Result<&Metadata> {
        self.dataset_level_metadata.get_object()
    }

    pub fn get_dataset_level_metadata_mut(&mut self) -> Result<&mut Metadata> {
        self.dataset_level_metadata.get_object_mut()
    }

    pub fn get_file_tree(&mut self) -> Result<&FileTree> {
        self.file_tree.get_object()
    }

    pub fn get_file_tree_mut(&mut self) -> Result<&mut FileTree> {
        self.file_tree.get_object_mut()
    }

    pub fn unget_dataset_level_metadata(&mut self) -> Result<()> {
        self.dataset_level_metadata.unget()
    }

    pub fn unget_file_tree(&mut self) -> Result<()> {
        self.file_tree.unget()
    }
}

impl MappedObject for MetadataRootRecord {
    const CLASS_NAME: &'static str = "MetadataRootRecord";

    fn unmap(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Hash> {
        let record = RootRecord {
            header: RecordHeader::new(Self::CLASS_NAME),
            dataset_identifier: self.dataset_identifier.clone(),
            dataset_version: self.dataset_version.clone(),
            dataset_level_metadata: self
                .dataset_level_metadata
                .save_object(backend, tracker)?
                .clone(),
            file_tree: self.file_tree.save_object(backend, tracker)?.clone(),
        };

        let location = backend.save_blob(&serde_json::to_vec(&record)?)?;
        tracker.add_blob_reference(ObjectReference::Metadata, location)?;
        Ok(location)
    }

    fn map(backend: &dyn Backend, location: &Hash) -> Result<Self> {
        let record: RootRecord = serde_json::from_slice(&backend.load_blob(location)?)?;
        record.header.check(Self::CLASS_NAME)?;

        Ok(Self::from_connectors(
            record.dataset_identifier,
            record.dataset_version,
            Connector::from_reference(record.dataset_level_metadata),
            Connector::from_reference(record.file_tree),
        ))
    }

    fn deepcopy(
        &self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Self> {
        Ok(Self::from_connectors(
            self.dataset_identifier.clone(),
            self.dataset_version.clone(),
            self.dataset_level_metadata.deepcopy(backend, tracker)?,
            self.file_tree.deepcopy(backend, tracker)?,
        ))
    }

    fn has_unsaved_children(&self) -> bool {
        self.dataset_level_metadata.is_modified() || self.file_tree.is_modified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Algorithm;
    use crate::store::Store;
    use serde_json::json;
    use tempfile::TempDir;

    fn record() -> MetadataRootRecord {
        let mut dataset_metadata = Metadata::new();
        dataset_metadata.add_record("core", json!({"name": "example"}));

        let mut file_metadata = Metadata::new();
        file_metadata.add_record("core", json!({"size": 3}));
        let mut file_tree = FileTree::new();
        file_tree.add_metadata("data/file.txt", file_metadata).unwrap();

        MetadataRootRecord::new(
            "5f4c7e0a-2d6c-4a57-9a89-6cf2b0e6d1a4",
            "a1b2c3",
            dataset_metadata,
            file_tree,
        )
    }

    #[test]
    fn test_unmap_saves_connected_objects() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path(), Algorithm::Blake3).unwrap();
        let mut tracker = ObjectReferenceTracker::new();

        let mut root_record = record();
        let location = root_record.unmap(&store, &mut tracker).unwrap();

        assert!(!root_record.dataset_level_metadata().is_dirty());
        assert!(!root_record.file_tree().is_dirty());
        // Dataset metadata, file metadata and the record itself
        assert_eq!(tracker.pending(ObjectReference::Metadata).len(), 3);
        assert_eq!(tracker.pending(ObjectReference::FileTree).len(), 1);

        let mut mapped = MetadataRootRecord::map(&store, &location).unwrap();
        assert_eq!(mapped, root_record);
        assert_eq!(mapped.dataset_identifier(), root_record.dataset_identifier());
        assert_eq!(mapped.dataset_version(), "a1b2c3");
        assert!(!mapped.file_tree().is_loaded());

        let file_tree = mapped.get_file_tree_mut().unwrap();
        assert_eq!(
            file_tree
                .get_metadata("data/file.txt")
                .unwrap()
                .and_then(|m| m.get_record("core")),
            Some(&json!({"size": 3}))
        );
        assert_eq!(
            mapped
                .get_dataset_level_metadata()
                .unwrap()
                .get_record("core"),
            Some(&json!({"name": "example"}))
        );
    }

    #[test]
    fn test_unget_requires_save() {
        let mut root_record = record();
        assert!(root_record.unget_file_tree().is_err());
        assert!(root_record.unget_dataset_level_metadata().is_err());
    }
}
