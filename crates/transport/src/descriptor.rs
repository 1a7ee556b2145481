//! Uploaded-file descriptors returned when a transfer completes.

use serde::{Deserialize, Serialize};

/// Descriptor exactly as a hosted upload service reports it.
///
/// Depending on the service version the retrieval URL arrives as `url`,
/// `ufsUrl`, both, or (on a broken response) neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUploadedFile {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ufs_url: Option<String>,
}

/// Normalized descriptor handed to the rest of the system.
///
/// `url` is `None` when the service did not report a usable location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub url: Option<String>,
}

impl From<RawUploadedFile> for UploadedFile {
    fn from(raw: RawUploadedFile) -> Self {
        let usable = |url: Option<String>| url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        Self {
            url: usable(raw.url).or_else(|| usable(raw.ufs_url)),
            name: raw.name,
            size: raw.size,
            mime_type: raw.mime_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn raw(url: Option<&str>, ufs_url: Option<&str>) -> RawUploadedFile {
        RawUploadedFile {
            name: "a.png".to_string(),
            size: 2_097_152,
            mime_type: "image/png".to_string(),
            url: url.map(str::to_string),
            ufs_url: ufs_url.map(str::to_string),
        }
    }

    #[rstest]
    #[case(Some("https://cdn.example/a.png"), None, Some("https://cdn.example/a.png"))]
    #[case(None, Some("https://ufs.example/a.png"), Some("https://ufs.example/a.png"))]
    #[case(Some("https://cdn.example/a.png"), Some("https://ufs.example/a.png"), Some("https://cdn.example/a.png"))]
    #[case(Some("  "), Some("https://ufs.example/a.png"), Some("https://ufs.example/a.png"))]
    #[case(Some(""), Some(""), None)]
    #[case(None, None, None)]
    fn test_url_resolution(#[case] url: Option<&str>, #[case] ufs_url: Option<&str>, #[case] expected: Option<&str>) {
        let file = UploadedFile::from(raw(url, ufs_url));
        assert_eq!(file.url.as_deref(), expected);
    }

    #[test]
    fn test_deserialize_service_payload() {
        let json = r#"{"name":"a.png","size":2097152,"type":"image/png","ufsUrl":"https://ufs.example/a.png"}"#;
        let file: RawUploadedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.ufs_url.as_deref(), Some("https://ufs.example/a.png"));
        assert!(file.url.is_none());
    }
}
