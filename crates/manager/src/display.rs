//! Presentation helpers for file listings.

use derive_more::Display;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Icon-level kind of a file, derived from its MIME type.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    #[display("image")]
    Image,
    #[display("pdf")]
    Pdf,
    #[display("video")]
    Video,
    #[display("file")]
    Other,
}
impl FileKind {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.contains("pdf") {
            Self::Pdf
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::Other
        }
    }
}

/// Render a byte count as `B`, `KB` or `MB` (binary units, one decimal).
///
/// ```
/// use filedeck_manager::format_size;
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(2 * 1024 * 1024), "2.0 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    match bytes {
        b if b < KIB => format!("{b} B"),
        b if b < MIB => format!("{:.1} KB", b as f64 / KIB as f64),
        b => format!("{:.1} MB", b as f64 / MIB as f64),
    }
}
