//! # mdstore core
//!
//! A hierarchical metadata model persisted into a content-addressed store.
//!
//! Callers build path-indexed trees of metadata records in memory, write
//! them out as backend trees and blobs, and load them back lazily. Objects
//! that are only referenced from inside other records are pinned from
//! dedicated refs so that garbage collection keeps them.
//!
//! ## Features
//!
//! - Generic path-indexed trees ([`TreeNode`]) with strict or
//!   leaf-converting insertion
//! - Lazy load/unload proxies ([`Connector`]) addressed by [`Reference`]
//! - One tree walker for every tree-shaped class ([`unmap_tree`], [`map_tree`])
//! - Object-reference tracking ([`ObjectReferenceTracker`])
//! - Reentrant, multi-process realm locking ([`BackendLock`])
//! - An on-disk content-addressed backend ([`Store`]) with refs and a
//!   mark-and-sweep collector
//!
//! ## Example
//!
//! ```no_run
//! use mdstore_core::{
//!     Algorithm, Connector, FileTree, Metadata, ObjectReferenceTracker, Store, load_from_ref,
//!     save_to_ref,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::init("./metadata-store", Algorithm::Blake3)?;
//! let mut tracker = ObjectReferenceTracker::new();
//!
//! // Describe one file
//! let mut metadata = Metadata::new();
//! metadata.add_record("core", serde_json::json!({"size": 1024}));
//! let mut file_tree = FileTree::new();
//! file_tree.add_metadata("data/sample.csv", metadata)?;
//!
//! // Persist, bind to a ref, and pin everything that was written
//! let mut connector = Connector::from_object(file_tree);
//! save_to_ref(&mut connector, &store, "refs/heads/files", &mut tracker)?;
//! tracker.flush(&store)?;
//!
//! // Load it back lazily
//! if let Some(mut loaded) = load_from_ref::<FileTree>(&store, "refs/heads/files")? {
//!     let file_tree = loaded.get_object_nested()?;
//!     println!("{:?}", file_tree.get_metadata("data/sample.csv")?);
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod connector;
mod datasettree;
mod error;
mod filetree;
mod gc;
mod hash;
mod lock;
mod mapper;
mod metadata;
mod object;
mod path;
mod reference;
mod refs;
mod rootrecord;
mod store;
mod tracker;
mod tree;
mod treenode;

pub use backend::{Backend, CAS_FAMILY, open_backend};
pub use connector::Connector;
pub use datasettree::DatasetTree;
pub use error::{Error, Result};
pub use filetree::FileTree;
pub use gc::GcStats;
pub use hash::{Algorithm, Hash};
pub use lock::{BackendLock, BackendLockGuard, LOCK_FILE_NAME};
pub use mapper::{
    LeafCodec, MappedObject, NODE_VALUE_NAME, load_from_ref, map_tree, save_to_ref, unmap_tree,
};
pub use metadata::Metadata;
pub use object::{Encoding, ObjectHeader};
pub use path::MetadataPath;
pub use reference::{NONE_MARKER, Reference, SCHEMA_VERSION};
pub use refs::{RefManager, validate_ref_name};
pub use rootrecord::MetadataRootRecord;
pub use store::Store;
pub use tracker::{ObjectReference, ObjectReferenceTracker, object_reference_name};
pub use tree::{EntryType, FileMode, ListedEntry, TreeEntry, file_modes};
pub use treenode::{PathsRecursive, TreeNode};
