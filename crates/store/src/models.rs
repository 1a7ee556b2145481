//! File metadata models.
//!
//! These types represent both stored documents (for the store adapters) and
//! the records handed around by the upload and listing layers.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier of an authenticated principal (the user behind a session).
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);
impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque record identifier, assigned by the store on creation.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);
impl FileId {
    /// Mint a fresh identifier. Only store adapters should call this.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A file description that has not been persisted yet.
///
/// Carries no id, owner or date: those are stamped by the store when the
/// record is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub url: String,
}
impl NewFileRecord {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            url: url.into(),
        }
    }

    /// Check field invariants before a write.
    ///
    /// The MIME type may be empty; name and URL may not.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidRecord("empty name"));
        }
        if self.url.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidRecord("empty url"));
        }
        if i64::try_from(self.size).is_err() {
            exn::bail!(ErrorKind::InvalidRecord("size out of range"));
        }
        Ok(())
    }
}

/// A persisted file record.
///
/// `id` and `owner` never change after creation. The serialized shape keeps
/// the field names of the hosted document collection (`type`, `uploadDate`),
/// and accepts the legacy `userId` spelling for the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: OffsetDateTime,
    #[serde(alias = "userId")]
    pub owner: PrincipalId,
}
impl FileMetadata {
    /// Attach the store-assigned identity to a record.
    pub fn from_record(id: FileId, owner: PrincipalId, record: NewFileRecord, upload_date: OffsetDateTime) -> Self {
        Self {
            id,
            name: record.name,
            size: record.size,
            mime_type: record.mime_type,
            url: record.url,
            upload_date,
            owner,
        }
    }

    /// True when this record describes the same upload as `record`.
    pub fn matches(&self, record: &NewFileRecord) -> bool {
        self.name == record.name && self.size == record.size && self.mime_type == record.mime_type && self.url == record.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(NewFileRecord::new("", 1, "text/plain", "https://cdn.example/x"), "empty name")]
    #[case(NewFileRecord::new("   ", 1, "text/plain", "https://cdn.example/x"), "empty name")]
    #[case(NewFileRecord::new("x.txt", 1, "text/plain", ""), "empty url")]
    #[case(NewFileRecord::new("x.txt", u64::MAX, "text/plain", "https://cdn.example/x"), "size out of range")]
    fn test_invalid_records(#[case] record: NewFileRecord, #[case] reason: &str) {
        let err = record.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRecord(r) if *r == reason));
    }

    #[test]
    fn test_unknown_mime_type_is_valid() {
        assert!(NewFileRecord::new("blob", 0, "", "https://cdn.example/blob").validate().is_ok());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(FileId::generate(), FileId::generate());
    }

    #[test]
    fn test_deserialize_legacy_owner_field() {
        let json = r#"{
            "id": "abc",
            "name": "a.png",
            "size": 2097152,
            "type": "image/png",
            "url": "https://cdn.example/a.png",
            "uploadDate": "2025-03-01T12:00:00Z",
            "userId": "user-1"
        }"#;
        let file: FileMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(file.owner, PrincipalId::from("user-1"));
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.upload_date.year(), 2025);
    }

    #[test]
    fn test_serialize_uses_canonical_names() {
        let file = FileMetadata::from_record(
            FileId::from("abc"),
            PrincipalId::from("user-1"),
            NewFileRecord::new("a.png", 10, "image/png", "https://cdn.example/a.png"),
            OffsetDateTime::UNIX_EPOCH,
        );
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["owner"], "user-1");
        assert_eq!(json["type"], "image/png");
        assert_eq!(json["uploadDate"], "1970-01-01T00:00:00Z");
        assert!(json.get("userId").is_none());
    }
}
