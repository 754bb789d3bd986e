use mdstore_core::{
    Algorithm, Backend, Connector, DatasetTree, Error, FileTree, MappedObject, Metadata,
    MetadataRootRecord, ObjectReference, ObjectReferenceTracker, Store, TreeNode, load_from_ref,
    save_to_ref,
};
use serde_json::json;
use tempfile::TempDir;

fn new_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::init(temp_dir.path(), Algorithm::Blake3).unwrap();
    (temp_dir, store)
}

fn metadata(extractor: &str, record: serde_json::Value) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.add_record(extractor, record);
    metadata
}

#[test]
fn file_tree_paths_share_one_object() {
    let (_temp, store) = new_store();
    let mut tracker = ObjectReferenceTracker::new();

    let leaf = metadata("core", json!({"checksum": "abc"}));
    let paths = ["a/b/c", "a/b/a", "b", "c/d/e"];

    let mut connector = Connector::from_object(FileTree::new());
    let file_tree = connector.get_object_mut().unwrap();
    for path in paths {
        file_tree.add_metadata(path, leaf.clone()).unwrap();
    }
    connector.save_object(&store, &mut tracker).unwrap();

    let file_tree = connector.get_object().unwrap();
    let entries: Vec<_> = file_tree.get_paths_recursive().collect();
    assert_eq!(entries.len(), 4);

    let mut listed: Vec<_> = entries.iter().map(|(path, _)| path.to_string()).collect();
    listed.sort();
    let mut expected: Vec<_> = paths.iter().map(|p| p.to_string()).collect();
    expected.sort();
    assert_eq!(listed, expected);

    let locations: Vec<_> = entries
        .iter()
        .map(|(_, connector)| connector.reference().unwrap().location().to_string())
        .collect();
    assert!(locations.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn nested_datasets_need_leaf_conversion() {
    let record = |version: &str| {
        MetadataRootRecord::new("uuid-1", version, Metadata::new(), FileTree::new())
    };

    let mut converted = TreeNode::new();
    converted
        .add_node_hierarchy("x", TreeNode::with_value(record("outer")), true)
        .unwrap();
    converted
        .add_node_hierarchy("x/y", TreeNode::with_value(record("inner")), true)
        .unwrap();
    assert_eq!(converted.get_value("x").unwrap().dataset_version(), "outer");
    assert_eq!(converted.get_value("x/y").unwrap().dataset_version(), "inner");

    let mut strict = TreeNode::new();
    strict
        .add_node_hierarchy("x", TreeNode::with_value(record("outer")), false)
        .unwrap();
    let result = strict.add_node_hierarchy("x/y", TreeNode::with_value(record("inner")), false);
    assert!(matches!(result, Err(Error::StructuralConflict { .. })));
}

#[test]
fn dataset_tree_survives_ref_binding_flush_and_gc() {
    let (_temp, store) = new_store();
    let mut tracker = ObjectReferenceTracker::new();

    let mut file_tree = FileTree::new();
    file_tree
        .add_metadata("data/table.csv", metadata("core", json!({"rows": 12})))
        .unwrap();
    let root_record = MetadataRootRecord::new(
        "3f9a6d5e-8b1c-4c2e-9f77-0d8e5a4b1c2d",
        "0123abcd",
        metadata("core", json!({"name": "survey"})),
        file_tree,
    );

    let mut dataset_tree = DatasetTree::new();
    dataset_tree.add_dataset("", root_record).unwrap();
    let mut connector = Connector::from_object(dataset_tree);

    let reference =
        save_to_ref(&mut connector, &store, "refs/heads/datasets", &mut tracker).unwrap();
    assert_eq!(reference.class_name(), "DatasetTree");
    tracker.flush(&store).unwrap();
    assert!(tracker.is_empty());

    for reserved in [
        ObjectReference::DatasetTree,
        ObjectReference::FileTree,
        ObjectReference::Metadata,
    ] {
        assert!(!store.list_ref_tree(reserved.as_str()).unwrap().is_empty());
    }

    let orphan = store.put_blob(b"never referenced").unwrap();
    store.gc(false).unwrap();
    assert!(!store.contains(&orphan));

    let mut loaded = load_from_ref::<DatasetTree>(&store, "refs/heads/datasets")
        .unwrap()
        .unwrap();
    assert_eq!(loaded, connector);

    let dataset_tree = loaded.get_object_mut().unwrap();
    let root_record = dataset_tree.get_dataset_mut("").unwrap().unwrap();
    assert_eq!(root_record.dataset_version(), "0123abcd");
    assert_eq!(
        root_record
            .get_dataset_level_metadata()
            .unwrap()
            .get_record("core"),
        Some(&json!({"name": "survey"}))
    );

    let file_tree = root_record.get_file_tree_mut().unwrap();
    assert_eq!(
        file_tree
            .get_metadata("data/table.csv")
            .unwrap()
            .unwrap()
            .get_record("core"),
        Some(&json!({"rows": 12}))
    );
}

#[test]
fn deepcopy_resolves_unloaded_values() {
    let (_temp_a, source) = new_store();
    let (_temp_b, target) = new_store();
    let mut tracker = ObjectReferenceTracker::new();

    let mut file_tree = FileTree::new();
    file_tree
        .add_metadata("one", metadata("core", json!(1)))
        .unwrap();
    file_tree
        .add_metadata("dir/two", metadata("core", json!(2)))
        .unwrap();

    let mut connector = Connector::from_object(file_tree);
    connector.save_object(&source, &mut tracker).unwrap();
    connector.unget().unwrap();

    let reference = connector.reference().unwrap().clone();
    let mut reloaded = Connector::<FileTree>::from_reference(reference);
    let stored = reloaded.get_object().unwrap().clone();
    assert!(
        stored
            .get_paths_recursive()
            .all(|(_, value)| !value.is_loaded())
    );

    let mut copy = stored.deepcopy(&target, &mut tracker).unwrap();
    assert_eq!(copy, stored);
    assert_eq!(
        copy.get_metadata("dir/two").unwrap().unwrap().get_record("core"),
        Some(&json!(2))
    );
}

#[test]
fn ref_binding_inside_held_lock_does_not_block() {
    let (_temp, store) = new_store();
    let mut tracker = ObjectReferenceTracker::new();

    let _outer = store.lock().unwrap();
    let mut connector = Connector::from_object(metadata("core", json!("locked")));
    save_to_ref(&mut connector, &store, "refs/heads/locked", &mut tracker).unwrap();
    tracker.flush(&store).unwrap();

    assert!(store.read_ref("refs/heads/locked").unwrap().is_some());
}

#[test]
fn missing_ref_loads_as_none() {
    let (_temp, store) = new_store();
    assert!(
        load_from_ref::<FileTree>(&store, "refs/heads/absent")
            .unwrap()
            .is_none()
    );
}
