use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How a response body is written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Binary,
}

impl ContentKind {
    /// A content type containing "text" is textual, everything else is binary.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("text") => ContentKind::Text,
            _ => ContentKind::Binary,
        }
    }
}

/// Outcome of one successful fetch. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub kind: ContentKind,
    pub content_length: usize,
    pub response_time: Duration,
    pub local_path: Option<PathBuf>,
}

impl DownloadRecord {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            content_type: None,
            kind: ContentKind::Binary,
            content_length: 0,
            response_time: Duration::from_secs(0),
            local_path: None,
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_ref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

/// A URL that could not be mirrored and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUrl {
    pub url: String,
    pub kind: String,
    pub reason: String,
}

/// Final accounting of a mirror run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorSummary {
    pub pages: Vec<DownloadRecord>,
    pub assets: Vec<DownloadRecord>,
    pub failed: Vec<FailedUrl>,
    pub interrupted: bool,
}

impl MirrorSummary {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.pages
            .iter()
            .chain(self.assets.iter())
            .map(|r| r.content_length)
            .sum()
    }
}
