//! Metadata records keyed by the name of the extractor that produced them.

use crate::backend::Backend;
use crate::error::Result;
use crate::hash::Hash;
use crate::mapper::MappedObject;
use crate::reference::RecordHeader;
use crate::tracker::{ObjectReference, ObjectReferenceTracker};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A set of metadata records, stored as one JSON blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    records: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct MetadataRecord {
    #[serde(rename = "@")]
    header: RecordHeader,
    records: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record of `extractor`, returning the one it replaces.
    pub fn add_record(&mut self, extractor: impl Into<String>, record: Value) -> Option<Value> {
        self.records.insert(extractor.into(), record)
    }

    pub fn get_record(&self, extractor: &str) -> Option<&Value> {
        self.records.get(extractor)
    }

    pub fn remove_record(&mut self, extractor: &str) -> Option<Value> {
        self.records.remove(extractor)
    }

    /// Extractor names in sorted order.
    pub fn extractors(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MappedObject for Metadata {
    const CLASS_NAME: &'static str = "Metadata";

    fn unmap(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Hash> {
        let record = MetadataRecord {
            header: RecordHeader::new(Self::CLASS_NAME),
            records: self.records.clone(),
        };
        let location = backend.save_blob(&serde_json::to_vec(&record)?)?;
        tracker.add_blob_reference(ObjectReference::Metadata, location)?;
        Ok(location)
    }

    fn map(backend: &dyn Backend, location: &Hash) -> Result<Self> {
        let record: MetadataRecord = serde_json::from_slice(&backend.load_blob(location)?)?;
        record.header.check(Self::CLASS_NAME)?;
        Ok(Self {
            records: record.records,
        })
    }

    fn deepcopy(
        &self,
        _backend: &dyn Backend,
        _tracker: &mut ObjectReferenceTracker,
    ) -> Result<Self> {
        Ok(self.clone())
    }
}
