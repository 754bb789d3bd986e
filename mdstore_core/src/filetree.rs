//! Per-file metadata of one dataset version.

use crate::backend::Backend;
use crate::connector::Connector;
use crate::error::Result;
use crate::hash::Hash;
use crate::mapper::{MappedObject, map_tree, unmap_tree};
use crate::metadata::Metadata;
use crate::path::MetadataPath;
use crate::tracker::{ObjectReference, ObjectReferenceTracker};
use crate::treenode::{PathsRecursive, TreeNode};

/// Maps file paths to lazily loaded [`Metadata`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileTree {
    root: TreeNode<Connector<Metadata>>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &TreeNode<Connector<Metadata>> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut TreeNode<Connector<Metadata>> {
        &mut self.root
    }

    /// Attach `metadata` to the file at `path`.
    ///
    /// Fails with `StructuralConflict` if `path` already has metadata, lies
    /// below a file, or is a directory.
    pub fn add_metadata(
        &mut self,
        path: impl Into<MetadataPath>,
        metadata: Metadata,
    ) -> Result<()> {
        self.add_connector(path, Connector::from_object(metadata))
    }

    pub fn add_connector(
        &mut self,
        path: impl Into<MetadataPath>,
        connector: Connector<Metadata>,
    ) -> Result<()> {
        self.root
            .add_node_hierarchy(path, TreeNode::with_value(connector), false)
    }

    pub fn contains(&self, path: impl Into<MetadataPath>) -> bool {
        self.root.get_value(path).is_some()
    }

    /// Metadata of the file at `path`, loading it if needed.
    pub fn get_metadata(&mut self, path: impl Into<MetadataPath>) -> Result<Option<&Metadata>> {
        match self.root.get_value_mut(path) {
            Some(connector) => Ok(Some(connector.get_object()?)),
            None => Ok(None),
        }
    }

    pub fn get_metadata_mut(
        &mut self,
        path: impl Into<MetadataPath>,
    ) -> Result<Option<&mut Metadata>> {
        match self.root.get_value_mut(path) {
            Some(connector) => Ok(Some(connector.get_object_mut()?)),
            None => Ok(None),
        }
    }

    /// Drop the loaded metadata of `path` from memory. Missing paths are
    /// ignored.
    pub fn unget_metadata(&mut self, path: impl Into<MetadataPath>) -> Result<()> {
        match self.root.get_value_mut(path) {
            Some(connector) => connector.unget(),
            None => Ok(()),
        }
    }

    pub fn get_paths_recursive(&self) -> PathsRecursive<'_, Connector<Metadata>> {
        self.root.get_paths_recursive()
    }
}

impl MappedObject for FileTree {
    const CLASS_NAME: &'static str = "FileTree";

    fn unmap(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Hash> {
        let location = unmap_tree(&mut self.root, backend, tracker)?;
        tracker.add_tree_reference(ObjectReference::FileTree, location)?;
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
