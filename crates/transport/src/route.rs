//! Upload routes: named policies mapping content categories to limits.

use crate::size::ByteSize;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Broad content category, derived from a MIME type.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[display("image")]
    Image,
    #[display("pdf")]
    Pdf,
    #[display("video")]
    Video,
    #[display("audio")]
    Audio,
    #[display("text")]
    Text,
    /// Anything else. A route accepting `blob` accepts every category.
    #[display("blob")]
    Blob,
}
impl Category {
    /// Classify a MIME type. Unknown or empty types are [`Blob`](Self::Blob).
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.split_once('/') {
            Some(("image", _)) => Self::Image,
            Some(("video", _)) => Self::Video,
            Some(("audio", _)) => Self::Audio,
            Some(("text", _)) => Self::Text,
            Some(("application", "pdf")) => Self::Pdf,
            _ => Self::Blob,
        }
    }
}

/// Size and count ceilings for one category within a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_file_size: ByteSize,
    #[serde(default = "Limits::default_count")]
    pub max_file_count: u32,
}
impl Limits {
    pub const fn new(max_file_size: ByteSize, max_file_count: u32) -> Self {
        Self { max_file_size, max_file_count }
    }

    fn default_count() -> u32 {
        1
    }
}

/// A named upload policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(BTreeMap<Category, Limits>);
impl Route {
    pub fn new(limits: impl IntoIterator<Item = (Category, Limits)>) -> Self {
        Self(limits.into_iter().collect())
    }

    /// Limits that apply to `category`, and the category they are keyed by.
    ///
    /// An exact match wins over a `blob` catch-all.
    pub fn limits_for(&self, category: Category) -> Option<(Category, &Limits)> {
        self.0
            .get(&category)
            .map(|limits| (category, limits))
            .or_else(|| self.0.get(&Category::Blob).map(|limits| (Category::Blob, limits)))
    }

    pub fn categories(&self) -> impl Iterator<Item = (&Category, &Limits)> {
        self.0.iter()
    }
}

/// Every route a transport accepts, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable(BTreeMap<String, Route>);
impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = (String, Route)>) -> Self {
        Self(routes.into_iter().collect())
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Route)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl Default for RouteTable {
    fn default() -> Self {
        let image = Limits::new(ByteSize::mb(4), 1);
        let pdf = Limits::new(ByteSize::mb(16), 1);
        Self::new([
            ("imageUploader".to_string(), Route::new([(Category::Image, image)])),
            ("pdfUploader".to_string(), Route::new([(Category::Pdf, pdf)])),
            (
                "fileUploader".to_string(),
                Route::new([
                    (Category::Image, Limits::new(ByteSize::mb(4), 5)),
                    (Category::Pdf, Limits::new(ByteSize::mb(16), 3)),
                    (Category::Video, Limits::new(ByteSize::mb(64), 1)),
                ]),
            ),
        ])
    }
}
