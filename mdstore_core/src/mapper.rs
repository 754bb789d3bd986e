//! Translation between in-memory objects and backend blobs and trees.
//!
//! Every persistable class implements [`MappedObject`]. Path-indexed trees
//! share one walker, [`unmap_tree`] / [`map_tree`], which is parameterized
//! over how a single node value becomes a blob ([`LeafCodec`]).

use crate::backend::Backend;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::path::MetadataPath;
use crate::reference::Reference;
use crate::tracker::ObjectReferenceTracker;
use crate::tree::TreeEntry;
use crate::treenode::TreeNode;
use tracing::debug;

/// Reserved entry name holding the value of a node that also has children.
pub const NODE_VALUE_NAME: &str = ".mdstore_node_value";

/// A class that can be written to and read from a backend.
pub trait MappedObject: Sized {
    /// Class name recorded in references.
    const CLASS_NAME: &'static str;

    /// Write the object, and anything it owns that is not yet stored, to
    /// `backend`; returns the object's location.
    fn unmap(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Hash>;

    /// Read the object stored at `location`.
    fn map(backend: &dyn Backend, location: &Hash) -> Result<Self>;

    /// A copy whose stored parts live in `backend`.
    fn deepcopy(
        &self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Self>;

    /// True if a connector owned by the object holds changes that are not
    /// stored yet. Classes without connectors keep the default.
    fn has_unsaved_children(&self) -> bool {
        false
    }
}

/// Encodes one node value as a blob of a backend tree.
pub trait LeafCodec: Sized {
    fn encode_leaf(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Hash>;

    fn decode_leaf(backend: &dyn Backend, location: &Hash) -> Result<Self>;
}

/// A connector leaf is its object's reference: the object is saved, then
/// the reference JSON is stored as the leaf blob.
impl<T: MappedObject> LeafCodec for Connector<T> {
    fn encode_leaf(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Hash> {
        let json = self.save_object(backend, tracker)?.to_json()?;
        backend.save_blob(json.as_bytes())
    }

    fn decode_leaf(backend: &dyn Backend, location: &Hash) -> Result<Self> {
        let data = backend.load_blob(location)?;
        let reference = Reference::from_json(std::str::from_utf8(&data)?)?;
        Ok(Connector::from_reference(reference))
    }
}

/// Store `node` as a backend tree and return the root tree's location.
///
/// A child without children becomes a blob entry; a child with children
/// becomes a subtree. A node's own value, the root's included, is stored as
/// a blob named [`NODE_VALUE_NAME`] inside the node's tree.
pub fn unmap_tree<V: LeafCodec>(
    node: &mut TreeNode<V>,
    backend: &dyn Backend,
    tracker: &mut ObjectReferenceTracker,
) -> Result<Hash> {
    unmap_node(node, &MetadataPath::root(), backend, tracker)
}

fn unmap_node<V: LeafCodec>(
    node: &mut TreeNode<V>,
    path: &MetadataPath,
    backend: &dyn Backend,
    tracker: &mut ObjectReferenceTracker,
) -> Result<Hash> {
    let (value, children) = node.parts_mut();
    let mut entries = Vec::with_capacity(children.len() + 1);

    if let Some(value) = value {
        let location = value.encode_leaf(backend, tracker)?;
        entries.push(TreeEntry::blob(location, NODE_VALUE_NAME)?);
    }

    for (name, child) in children.iter_mut() {
        let child_path = path.join(name);
        if name == NODE_VALUE_NAME {
            return Err(Error::structural_conflict(
                child_path.to_string(),
                "name is reserved for node values",
            ));
        }

        let entry = if child.is_leaf_node()
            && let Some(value) = child.value_mut()
        {
            TreeEntry::blob(value.encode_leaf(backend, tracker)?, name.as_str())?
        } else {
            TreeEntry::tree(
                unmap_node(child, &child_path, backend, tracker)?,
                name.as_str(),
            )?
        };
        entries.push(entry);
    }

    backend.save_tree(entries)
}

/// Rebuild the tree stored at `location`.
///
/// Leaf conversion is allowed, so nodes that hold a value and children come
/// back as such.
pub fn map_tree<V: LeafCodec>(backend: &dyn Backend, location: &Hash) -> Result<TreeNode<V>> {
    let mut root = TreeNode::new();

    for entry in backend.list_tree_recursive(location)? {
        let path = MetadataPath::new(&entry.path);
        let is_node_value = path.name() == Some(NODE_VALUE_NAME);
        let path = if is_node_value {
            path.parent().unwrap_or_default()
        } else {
            path
        };

        let value = V::decode_leaf(backend, &entry.hash)?;
        root.add_node_hierarchy(path, TreeNode::with_value(value), true)?;
    }

    Ok(root)
}

/// Save `connector` and point `ref_name` at the result, under the realm
/// lock.
///
/// Pinning entries recorded while saving stay in `tracker` until it is
/// flushed.
pub fn save_to_ref<T: MappedObject>(
    connector: &mut Connector<T>,
    backend: &dyn Backend,
    ref_name: &str,
    tracker: &mut ObjectReferenceTracker,
) -> Result<Reference> {
    let _guard = backend.lock()?;

    let reference = connector.save_object(backend, tracker)?.clone();
    backend.update_ref(ref_name, &reference.location_hash()?)?;

    debug!(
        realm = backend.realm(),
        ref_name,
        class_name = T::CLASS_NAME,
        location = reference.location(),
        "bound object to ref"
    );
    Ok(reference)
}

/// An unloaded connector to the object `ref_name` points at, or `None` if
/// the ref does not exist.
pub fn load_from_ref<T: MappedObject>(
    backend: &dyn Backend,
    ref_name: &str,
) -> Result<Option<Connector<T>>> {
    let location = backend.read_ref(ref_name)?;
    Ok(location.map(|location| {
        Connector::from_reference(Reference::new(
            backend.family(),
            backend.realm(),
            T::CLASS_NAME,
            location.to_hex(),
        ))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Algorithm;
    use crate::store::Store;
    use crate::tree::EntryType;
    use tempfile::TempDir;

    /// Leaf codec storing a plain string.
    #[derive(Debug, Clone, PartialEq)]
    struct Text(String);

    impl LeafCodec for Text {
        fn encode_leaf(
            &mut self,
            backend: &dyn Backend,
            _tracker: &mut ObjectReferenceTracker,
        ) -> Result<Hash> {
            backend.save_blob(self.0.as_bytes())
        }

        fn decode_leaf(backend: &dyn Backend, location: &Hash) -> Result<Self> {
            let data = backend.load_blob(location)?;
            Ok(Text(String::from_utf8_lossy(&data).into_owned()))
        }
    }

    fn text(value: &str) -> TreeNode<Text> {
        TreeNode::with_value(Text(value.to_string()))
    }

    fn setup() -> (TempDir, Store) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path(), Algorithm::Blake3).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_unmap_map_round_trip() {
        let (_temp, store) = setup();
        let mut tracker = ObjectReferenceTracker::new();

        let mut tree = TreeNode::new();
        for path in ["a/b/c", "a/b/a", "b", "c/d/e"] {
            tree.add_node_hierarchy(path, text(path), false).unwrap();
        }

        let location = unmap_tree(&mut tree, &store, &mut tracker).unwrap();
        let mapped: TreeNode<Text> = map_tree(&store, &location).unwrap();
        assert_eq!(mapped, tree);
    }

    #[test]
    fn test_unmap_layout() {
        let (_temp, store) = setup();
        let mut tracker = ObjectReferenceTracker::new();

        let mut tree = TreeNode::new();
        tree.add_node_hierarchy("dir/file", text("content"), false)
            .unwrap();
        tree.add_node_hierarchy("top", text("top"), false).unwrap();

        let location = unmap_tree(&mut tree, &store, &mut tracker).unwrap();
        let entries = store.get_tree(&location).unwrap();

        let names: Vec<_> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.entry_type))
            .collect();
        assert_eq!(names, vec![("dir", EntryType::Tree), ("top", EntryType::Blob)]);
        assert_eq!(entries[0].to_line().split(' ').next(), Some("040000"));
        assert_eq!(entries[1].to_line().split(' ').next(), Some("100644"));
    }

    #[test]
    fn test_unmap_is_deterministic() {
        let (_temp, store) = setup();
        let mut tracker = ObjectReferenceTracker::new();

        let mut first = TreeNode::new();
        let mut second = TreeNode::new();
        for path in ["x/1", "x/2", "y"] {
            first.add_node_hierarchy(path, text(path), false).unwrap();
        }
        for path in ["y", "x/2", "x/1"] {
            second.add_node_hierarchy(path, text(path), false).unwrap();
        }

        assert_eq!(
            unmap_tree(&mut first, &store, &mut tracker).unwrap(),
            unmap_tree(&mut second, &store, &mut tracker).unwrap()
        );
    }

    #[test]
    fn test_node_values_round_trip() {
        let (_temp, store) = setup();
        let mut tracker = ObjectReferenceTracker::new();

        let mut tree = TreeNode::new();
        tree.add_node_hierarchy("", text("root"), true).unwrap();
        tree.add_node_hierarchy("x", text("x"), true).unwrap();
        tree.add_node_hierarchy("x/y", text("x/y"), true).unwrap();

        let location = unmap_tree(&mut tree, &store, &mut tracker).unwrap();
        let listed: Vec<_> = store
            .list_tree_recursive(&location)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(
            listed,
            vec![".mdstore_node_value", "x/.mdstore_node_value", "x/y"]
        );

        let mapped: TreeNode<Text> = map_tree(&store, &location).unwrap();
        assert_eq!(mapped, tree);
        assert_eq!(mapped.value(), Some(&Text("root".to_string())));
    }

    #[test]
    fn test_valueless_additions_round_trip() {
        let (_temp, store) = setup();
        let mut tracker = ObjectReferenceTracker::new();

        let mut tree = TreeNode::new();
        tree.add_node_hierarchy("dir/sub", TreeNode::new(), false)
            .unwrap();
        tree.add_node_hierarchy("full", text("full"), false).unwrap();

        let location = unmap_tree(&mut tree, &store, &mut tracker).unwrap();
        let entries = store.get_tree(&location).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "full");

        let mapped: TreeNode<Text> = map_tree(&store, &location).unwrap();
        assert_eq!(mapped, tree);
    }

    #[test]
    fn test_carriage_return_names_round_trip() {
        let (_temp, store) = setup();
        let mut tracker = ObjectReferenceTracker::new();

        let mut tree = TreeNode::new();
        tree.add_node_hierarchy("a\r", text("cr"), false).unwrap();
        tree.add_node_hierarchy("dir\r/b", text("nested"), false)
            .unwrap();

        let location = unmap_tree(&mut tree, &store, &mut tracker).unwrap();
        let mapped: TreeNode<Text> = map_tree(&store, &location).unwrap();
        assert_eq!(mapped, tree);
        assert_eq!(mapped.get_value("a\r"), Some(&Text("cr".to_string())));
    }

    #[test]
    fn test_reserved_child_name_rejected() {
        let (_temp, store) = setup();
        let mut tracker = ObjectReferenceTracker::new();

        let mut tree = TreeNode::new();
        tree.add_node_hierarchy("a/.mdstore_node_value", text("bad"), false)
            .unwrap();

        let result = unmap_tree(&mut tree, &store, &mut tracker);
        assert!(matches!(result, Err(Error::StructuralConflict { .. })));
    }

    #[test]
    fn test_map_tree_on_blob_fails() {
        let (_temp, store) = setup();
        let blob = store.put_blob(b"not a tree").unwrap();

        let result = map_tree::<Text>(&store, &blob);
        assert!(matches!(result, Err(Error::BackendRead { .. })));
    }

    #[test]
    fn test_load_from_missing_ref() {
        let (_temp, store) = setup();
        let result = load_from_ref::<crate::metadata::Metadata>(&store, "refs/heads/none");
        assert!(result.unwrap().is_none());
    }
}
