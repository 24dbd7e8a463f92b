pub mod engine;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod page;
pub mod path;
pub mod record;
pub mod robots;
pub mod state;

pub use engine::{MirrorEngine, ProgressCallback};
pub use error::{MirrorError, Result};
pub use normalize::CanonicalUrl;
pub use record::{ContentKind, DownloadRecord, FailedUrl, MirrorSummary};
