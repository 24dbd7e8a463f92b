use crate::error::{MirrorError, Result};
use crate::normalize::CanonicalUrl;
use crate::record::{ContentKind, DownloadRecord};
use reqwest::Client;
use std::borrow::Cow;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Body and metadata of one successful GET.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub record: DownloadRecord,
    pub body: Vec<u8>,
}

impl FetchedContent {
    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Write the body to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        match self.record.kind {
            ContentKind::Text => write_file(path, self.text().as_bytes()),
            ContentKind::Binary => write_file(path, &self.body),
        }
    }
}

pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let fs_err = |source| MirrorError::Filesystem {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(fs_err)?;
    }
    std::fs::write(path, bytes).map_err(fs_err)
}

/// Single-request HTTP fetcher. Never retries.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT)
    }

    pub fn with_config(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2).max(1)))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| MirrorError::ClientSetup(e.to_string()))?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchedContent> {
        debug!("Fetching {}", url);

        let transport_err = |source| MirrorError::Transport {
            url: url.to_string(),
            source,
        };

        let start = Instant::now();
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes().await.map_err(transport_err)?.to_vec();

        let mut record = DownloadRecord::new(url.to_string());
        record.status_code = status.as_u16();
        record.kind = ContentKind::from_content_type(content_type.as_deref());
        record.content_type = content_type;
        record.content_length = body.len();
        record.response_time = start.elapsed();

        Ok(FetchedContent { record, body })
    }
}
