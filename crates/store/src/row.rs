use crate::error::{Error, ErrorKind, Result};
use crate::models::{FileId, FileMetadata, NewFileRecord, PrincipalId};
use exn::ResultExt;
use time::OffsetDateTime;

const NANOS_PER_MILLI: i128 = 1_000_000;

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) id: String,
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) size: i64,
    pub(crate) mime_type: String,
    pub(crate) url: String,
    /// Unix milliseconds, assigned by the database on insert. `NULL` for
    /// rows written without a server timestamp.
    pub(crate) uploaded_at: Option<i64>,
}
impl FileRow {
    /// Resolve the row into a model. A missing timestamp resolves to `now`.
    pub(crate) fn into_metadata(self, now: OffsetDateTime) -> Result<FileMetadata> {
        let upload_date = match self.uploaded_at {
            Some(millis) => from_unix_millis(millis)?,
            None => now,
        };
        Ok(FileMetadata {
            id: FileId::from(self.id),
            name: self.name,
            size: u64::try_from(self.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            mime_type: self.mime_type,
            url: self.url,
            upload_date,
            owner: PrincipalId::from(self.owner),
        })
    }
}
impl TryFrom<(&FileId, &PrincipalId, &NewFileRecord)> for FileRow {
    type Error = Error;
    fn try_from((id, owner, record): (&FileId, &PrincipalId, &NewFileRecord)) -> Result<Self> {
        Ok(Self {
            id: id.as_str().to_string(),
            owner: owner.as_str().to_string(),
            name: record.name.clone(),
            size: i64::try_from(record.size).or_raise(|| ErrorKind::InvalidRecord("size out of range"))?,
            mime_type: record.mime_type.clone(),
            url: record.url.clone(),
            uploaded_at: None,
        })
    }
}

pub(crate) fn from_unix_millis(millis: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
        .or_raise(|| ErrorKind::InvalidData("upload date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(uploaded_at: Option<i64>) -> FileRow {
        FileRow {
            id: "4c1e0f6b1a8f4f0e9d7f0c1b2a3d4e5f".to_string(),
            owner: "user-1".to_string(),
            name: "report.pdf".to_string(),
            size: 1024,
            mime_type: "application/pdf".to_string(),
            url: "https://cdn.example/report.pdf".to_string(),
            uploaded_at,
        }
    }

    #[test]
    fn test_row_to_model() {
        let now = OffsetDateTime::now_utc();
        let model = row(Some(1_700_000_000_123)).into_metadata(now).unwrap();
        assert_eq!(model.size, 1024);
        assert_eq!(model.owner.as_str(), "user-1");
        assert_eq!(model.upload_date.unix_timestamp(), 1_700_000_000);
        assert_eq!(model.upload_date.millisecond(), 123);
    }

    #[test]
    fn test_missing_timestamp_resolves_to_now() {
        let now = OffsetDateTime::now_utc();
        let model = row(None).into_metadata(now).unwrap();
        assert_eq!(model.upload_date, now);
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let mut bad = row(None);
        bad.size = -1;
        let err = bad.into_metadata(OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("file size")));
    }
}
