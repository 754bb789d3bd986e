//! Dataset hierarchy: maps dataset paths to their root records.

use crate::backend::Backend;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::mapper::{MappedObject, map_tree, unmap_tree};
use crate::path::MetadataPath;
use crate::rootrecord::MetadataRootRecord;
use crate::tracker::{ObjectReference, ObjectReferenceTracker};
use crate::treenode::{PathsRecursive, TreeNode};

/// Datasets may contain subdatasets, so a path that holds a record may also
/// have children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetTree {
    root: TreeNode<Connector<MetadataRootRecord>>,
}

impl DatasetTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &TreeNode<Connector<MetadataRootRecord>> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut TreeNode<Connector<MetadataRootRecord>> {
        &mut self.root
    }

    /// Attach `record` to the dataset at `path`.
    ///
    /// Fails with `StructuralConflict` only if `path` already has a record;
    /// existing subdatasets are kept.
    pub fn add_dataset(
        &mut self,
        path: impl Into<MetadataPath>,
        record: MetadataRootRecord,
    ) -> Result<()> {
        let path = path.into();
        if self.root.get_value(&path).is_some() {
            return Err(Error::structural_conflict(
                path.to_string(),
                "dataset already has a root record",
            ));
        }
        self.root.add_node_hierarchy(
            path,
            TreeNode::with_value(Connector::from_object(record)),
            true,
        )
    }

    pub fn contains(&self, path: impl Into<MetadataPath>) -> bool {
        self.root.get_value(path).is_some()
    }

    /// Root record of the dataset at `path`, loading it if needed.
    pub fn get_dataset(
        &mut self,
        path: impl Into<MetadataPath>,
    ) -> Result<Option<&MetadataRootRecord>> {
        match self.root.get_value_mut(path) {
            Some(connector) => Ok(Some(connector.get_object()?)),
            None => Ok(None),
        }
    }

    pub fn get_dataset_mut(
        &mut self,
        path: impl Into<MetadataPath>,
    ) -> Result<Option<&mut MetadataRootRecord>> {
        match self.root.get_value_mut(path) {
            Some(connector) => Ok(Some(connector.get_object_mut()?)),
            None => Ok(None),
        }
    }

    pub fn unget_dataset(&mut self, path: impl Into<MetadataPath>) -> Result<()> {
        match self.root.get_value_mut(path) {
            Some(connector) => connector.unget(),
            None => Ok(()),
        }
    }

    pub fn get_paths_recursive(&self) -> PathsRecursive<'_, Connector<MetadataRootRecord>> {
        self.root.get_paths_recursive()
    }
}

impl MappedObject for DatasetTree {
    const CLASS_NAME: &'static str = "DatasetTree";

    fn unmap(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Hash> {
        let location = unmap_tree(&mut self.root, backend, tracker)?;
        tracker.add_tree_reference(ObjectReference::DatasetTree, location)?;
        Ok(location)
    }

    fn map(backend: &dyn Backend, location: &Hash) -> Result<Self> {
        Ok(Self {
            root: map_tree(backend, location)?,
        })
    }

    fn deepcopy(
        &self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Self> {
        Ok(Self {
            root: self
                .root
                .try_map(|connector| connector.deepcopy(backend, tracker))?,
        })
    }

    fn has_unsaved_children(&self) -> bool {
        self.get_paths_recursive()
            .any(|(_, connector)| connector.is_modified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filetree::FileTree;
    use crate::hash::Algorithm;
    use crate::metadata::Metadata;
    use crate::store::Store;
    use tempfile::TempDir;

    fn record(version: &str) -> MetadataRootRecord {
        MetadataRootRecord::new("ds-id", version, Metadata::new(), FileTree::new())
    }

    #[test]
    fn test_nested_datasets() {
        let mut dataset_tree = DatasetTree::new();
        dataset_tree.add_dataset("x", record("outer")).unwrap();
        dataset_tree.add_dataset("x/y", record("inner")).unwrap();

        assert_eq!(
            dataset_tree.get_dataset("x").unwrap().unwrap().dataset_version(),
            "outer"
        );
        assert_eq!(
            dataset_tree
                .get_dataset("x/y")
                .unwrap()
                .unwrap()
                .dataset_version(),
            "inner"
        );
    }

    #[test]
    fn test_parent_added_after_child() {
        let mut dataset_tree = DatasetTree::new();
        dataset_tree.add_dataset("x/y", record("inner")).unwrap();
        dataset_tree.add_dataset("x", record("outer")).unwrap();

        let paths: Vec<_> = dataset_tree
            .get_paths_recursive()
            .map(|(path, _)| path.to_string())
            .collect();
        assert_eq!(paths, vec!["x", "x/y"]);
    }

    #[test]
    fn test_nested_datasets_without_conversion_conflict() {
        let mut dataset_tree = DatasetTree::new();
        let outer = TreeNode::with_value(Connector::from_object(record("outer")));
        dataset_tree
            .root_mut()
            .add_node_hierarchy("x", outer, false)
            .unwrap();

        let result = dataset_tree.root_mut().add_node_hierarchy(
            "x/y",
            TreeNode::with_value(Connector::from_object(record("inner"))),
            false,
        );
        assert!(matches!(result, Err(Error::StructuralConflict { .. })));
    }

    #[test]
    fn test_duplicate_dataset_rejected() {
        let mut dataset_tree = DatasetTree::new();
        dataset_tree.add_dataset("x", record("1")).unwrap();

        assert!(matches!(
            dataset_tree.add_dataset("x", record("2")),
            Err(Error::StructuralConflict { .. })
        ));
        assert_eq!(
            dataset_tree.get_dataset("x").unwrap().unwrap().dataset_version(),
            "1"
        );
    }

    #[test]
    fn test_unmap_map_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path(), Algorithm::Blake3).unwrap();
        let mut tracker = ObjectReferenceTracker::new();

        let mut dataset_tree = DatasetTree::new();
        dataset_tree.add_dataset("", record("top")).unwrap();
        dataset_tree.add_dataset("x", record("outer")).unwrap();
        dataset_tree.add_dataset("x/y", record("inner")).unwrap();

        let location = dataset_tree.unmap(&store, &mut tracker).unwrap();
        assert_eq!(tracker.pending(ObjectReference::DatasetTree).len(), 1);
        assert_eq!(tracker.pending(ObjectReference::FileTree).len(), 3);

        let mut mapped = DatasetTree::map(&store, &location).unwrap();
        assert_eq!(mapped, dataset_tree);
        assert_eq!(
            mapped.get_dataset("").unwrap().unwrap().dataset_version(),
            "top"
        );
        assert_eq!(
            mapped.get_dataset("x/y").unwrap().unwrap().dataset_version(),
            "inner"
        );
        mapped.unget_dataset("x/y").unwrap();
        assert!(!mapped.root().get_value("x/y").unwrap().is_loaded());
    }
}
