//! Backend-independent descriptors of persisted objects.

use crate::error::{Error, Result};
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version written into every serialized record.
pub const SCHEMA_VERSION: &str = "1.0";

/// Placeholder held by every field of the none reference.
pub const NONE_MARKER: &str = "*None*";

/// The `"@"` object that tags a serialized record with its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RecordHeader {
    #[serde(rename = "type")]
    type_name: String,
    version: String,
}

impl RecordHeader {
    pub(crate) fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            version: SCHEMA_VERSION.to_string(),
        }
    }

    pub(crate) fn check(&self, type_name: &str) -> Result<()> {
        if self.type_name != type_name {
            return Err(Error::invalid_record(format!(
                "expected a {} record, got {}",
                type_name, self.type_name
            )));
        }
        if self.version != SCHEMA_VERSION {
            return Err(Error::invalid_record(format!(
                "unsupported {} schema version {}",
                type_name, self.version
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct ReferenceRecord {
    #[serde(rename = "@")]
    header: RecordHeader,
    mapper_family: String,
    realm: String,
    class_name: String,
    location: String,
}

/// Names the backend family, realm, object class and location of a
/// persisted object.
///
/// Serializes to a JSON object tagged with an `"@"` record header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "ReferenceRecord", try_from = "ReferenceRecord")]
pub struct Reference {
    mapper_family: String,
    realm: String,
    class_name: String,
    location: String,
}

impl Reference {
    const TYPE_NAME: &'static str = "Reference";

    pub fn new(
        mapper_family: impl Into<String>,
        realm: impl Into<String>,
        class_name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            mapper_family: mapper_family.into(),
            realm: realm.into(),
            class_name: class_name.into(),
            location: location.into(),
        }
    }

    /// The reference that points nowhere.
    pub fn none() -> Self {
        Self::new(NONE_MARKER, NONE_MARKER, NONE_MARKER, NONE_MARKER)
    }

    pub fn is_none(&self) -> bool {
        *self == Self::none()
    }

    pub fn mapper_family(&self) -> &str {
        &self.mapper_family
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Parse the location as a content hash.
    pub fn location_hash(&self) -> Result<Hash> {
        Hash::from_hex(&self.location)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<Reference> for ReferenceRecord {
    fn from(reference: Reference) -> Self {
        Self {
            header: RecordHeader::new(Reference::TYPE_NAME),
            mapper_family: reference.mapper_family,
            realm: reference.realm,
            class_name: reference.class_name,
            location: reference.location,
        }
    }
}

impl TryFrom<ReferenceRecord> for Reference {
    type Error = Error;

    fn try_from(record: ReferenceRecord) -> Result<Self> {
        record.header.check(Reference::TYPE_NAME)?;
        Ok(Self {
            mapper_family: record.mapper_family,
            realm: record.realm,
            class_name: record.class_name,
            location: record.location,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}:{}",
            self.class_name, self.location, self.mapper_family, self.realm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_none_reference_json_shape() {
        let value: serde_json::Value =
            serde_json::from_str(&Reference::none().to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "@": {"type": "Reference", "version": SCHEMA_VERSION},
                "mapper_family": "*None*",
                "realm": "*None*",
                "class_name": "*None*",
                "location": "*None*"
            })
        );
    }

    #[test]
    fn test_none_reference_from_json() {
        let text = json!({
            "@": {"type": "Reference", "version": SCHEMA_VERSION},
            "mapper_family": "*None*",
            "realm": "*None*",
            "class_name": "*None*",
            "location": "*None*"
        })
        .to_string();

        let reference = Reference::from_json(&text).unwrap();
        assert!(reference.is_none());
    }

    #[test]
    fn test_header_is_written_first() {
        let text = Reference::new("cas", "/tmp/realm", "Metadata", "ab")
            .to_json()
            .unwrap();
        assert!(text.starts_with(r#"{"@":{"type":"Reference","version":"#));
    }

    #[test]
    fn test_reference_json_round_trip() {
        let hash = Hash::hash_bytes(b"object");
        let reference = Reference::new("cas", "/tmp/realm", "FileTree", hash.to_hex());

        let parsed = Reference::from_json(&reference.to_json().unwrap()).unwrap();
        assert_eq!(parsed, reference);
        assert!(!parsed.is_none());
        assert_eq!(parsed.location_hash().unwrap(), hash);
    }

    #[test]
    fn test_wrong_record_type_rejected() {
        let text = json!({
            "@": {"type": "Metadata", "version": SCHEMA_VERSION},
            "mapper_family": "cas",
            "realm": "r",
            "class_name": "Metadata",
            "location": "00"
        })
        .to_string();

        let err = Reference::from_json(&text).unwrap_err();
        assert!(err.to_string().contains("expected a Reference record"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let text = json!({
            "@": {"type": "Reference", "version": "0.1"},
            "mapper_family": "cas",
            "realm": "r",
            "class_name": "Metadata",
            "location": "00"
        })
        .to_string();

        assert!(Reference::from_json(&text).is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            Reference::from_json("{not json"),
            Err(Error::Json { .. })
        ));
        assert!(Reference::none().location_hash().is_err());
    }
}
