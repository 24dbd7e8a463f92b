use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),

    #[error("HTTP request failed for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl MirrorError {
    /// Short label used in the failure listing of the summary.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorError::InvalidUrl(_) => "invalid-url",
            MirrorError::RobotsDisallowed(_) => "robots",
            MirrorError::Transport { .. } => "transport",
            MirrorError::HttpStatus { .. } => "http-status",
            MirrorError::Parse(_) => "parse",
            MirrorError::Filesystem { .. } => "filesystem",
            MirrorError::ClientSetup(_) => "client",
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
