use indicatif::{ProgressBar, ProgressStyle};
use sitegrab_engine::fetch::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use sitegrab_engine::{MirrorEngine, MirrorError, MirrorSummary, ProgressCallback};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Options for configuring a mirror run
pub struct MirrorOptions {
    pub url: Url,
    pub output_dir: PathBuf,
    pub delay: Duration,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub respect_robots: bool,
    pub max_pages: Option<usize>,
    pub show_progress: bool,
}

impl MirrorOptions {
    pub fn new(url: Url, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url,
            output_dir: output_dir.into(),
            delay: Duration::from_secs(1),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            respect_robots: true,
            max_pages: None,
            show_progress: true,
        }
    }
}

/// Callback for reporting each page as it is processed
pub type MirrorProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Run a mirror with the given options.
///
/// Ctrl-C sets the engine's cancel flag; the summary of completed work is
/// still returned with `interrupted` set.
pub async fn execute_mirror(
    options: MirrorOptions,
    progress_callback: Option<MirrorProgressCallback>,
) -> Result<MirrorSummary, MirrorError> {
    let MirrorOptions {
        url,
        output_dir,
        delay,
        timeout_secs,
        user_agent,
        respect_robots,
        max_pages,
        show_progress,
    } = options;

    let progress_bar = if show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Starting mirror of {}...", url));
        Some(pb)
    } else {
        None
    };

    let pb_clone = progress_bar.clone();
    let internal_callback: ProgressCallback = Arc::new(move |saved: usize, page: String| {
        if let Some(ref pb) = pb_clone {
            pb.set_message(format!(
                "Mirroring... {} pages saved ({})",
                saved,
                extract_url_path(&page)
            ));
        }
        if let Some(ref callback) = progress_callback {
            callback(saved, page);
        }
    });

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let interrupt_listener = {
        let flag = cancel_flag.clone();
        let pb = progress_bar.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.store(true, Ordering::SeqCst);
                match pb {
                    Some(pb) => pb.set_message("Interrupted, finishing current request..."),
                    None => warn!("Interrupted, finishing current request"),
                }
            }
        })
    };

    let engine = MirrorEngine::new(&output_dir)
        .with_delay(delay)
        .with_timeout(timeout_secs)
        .with_user_agent(user_agent)
        .with_robots(respect_robots)
        .with_max_pages(max_pages)
        .with_progress_callback(internal_callback)
        .with_cancel_flag(cancel_flag);

    let result = engine.mirror(url.as_str()).await;
    interrupt_listener.abort();

    if let Some(ref pb) = progress_bar {
        match &result {
            Ok(summary) if summary.interrupted => {
                pb.finish_with_message(format!(
                    "Mirror interrupted after {} pages",
                    summary.page_count()
                ));
            }
            Ok(summary) => {
                pb.finish_with_message(format!(
                    "Mirror complete! {} pages, {} assets",
                    summary.page_count(),
                    summary.asset_count()
                ));
            }
            Err(_) => pb.finish_and_clear(),
        }
    }

    result
}
