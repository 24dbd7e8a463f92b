use crate::error::{MirrorError, Result};
use crate::fetch::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, Fetcher};
use crate::normalize::CanonicalUrl;
use crate::page::PageProcessor;
use crate::record::MirrorSummary;
use crate::robots::RobotsGate;
use crate::state::CrawlState;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Called after every page attempt with (pages saved so far, url).
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Slice length for the interruptible inter-request pause.
const PAUSE_SLICE: Duration = Duration::from_millis(100);

pub struct MirrorEngine {
    output_root: PathBuf,
    delay: Duration,
    timeout_secs: u64,
    user_agent: String,
    respect_robots: bool,
    max_pages: Option<usize>,
    progress_callback: Option<ProgressCallback>,
    cancel_flag: Arc<AtomicBool>,
}

impl MirrorEngine {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            delay: Duration::from_secs(1),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            respect_robots: true,
            max_pages: None,
            progress_callback: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_robots(mut self, respect_robots: bool) -> Self {
        self.respect_robots = respect_robots;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Share a flag that stops the crawl before its next fetch once set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Mirror every same-domain page reachable from `seed`.
    ///
    /// Only an invalid seed, an unusable output directory or a client setup
    /// failure return `Err`; per-URL failures end up in the summary.
    pub async fn mirror(&self, seed: &str) -> Result<MirrorSummary> {
        let seed = CanonicalUrl::parse(seed)
            .ok_or_else(|| MirrorError::InvalidUrl(format!("Invalid seed URL: {}", seed)))?;
        let seed_host = seed.authority();

        info!("Starting download of {}", seed);
        info!("Output directory: {}", self.output_root.display());

        std::fs::create_dir_all(&self.output_root).map_err(|source| MirrorError::Filesystem {
            path: self.output_root.display().to_string(),
            source,
        })?;

        let fetcher = Fetcher::with_config(self.timeout_secs, &self.user_agent)?;
        let robots = if self.respect_robots {
            RobotsGate::load(&fetcher, &seed).await
        } else {
            RobotsGate::allow_all()
        };

        let delay = match robots.crawl_delay() {
            Some(crawl_delay) if crawl_delay > self.delay => {
                info!("Using robots.txt crawl delay of {:?}", crawl_delay);
                crawl_delay
            }
            _ => self.delay,
        };

        let mut state = CrawlState::new(seed_host, self.output_root.clone());
        state.enqueue(seed);

        let interrupted = self.run(&fetcher, &robots, &mut state, delay).await;
        let summary = state.into_summary(interrupted);

        info!("Download complete!");
        info!("Downloaded {} pages", summary.page_count());
        info!("Downloaded {} assets", summary.asset_count());
        if !summary.failed.is_empty() {
            warn!("Failed to download {} URLs", summary.failed_count());
        }

        Ok(summary)
    }

    /// Drive the frontier until it is empty. Returns true when interrupted.
    async fn run(
        &self,
        fetcher: &Fetcher,
        robots: &RobotsGate,
        state: &mut CrawlState,
        delay: Duration,
    ) -> bool {
        let processor = PageProcessor::new(fetcher, robots);

        loop {
            if self.is_cancelled() {
                warn!(
                    "Interrupted with {} URLs still queued",
                    state.pending_count()
                );
                return true;
            }

            if let Some(max) = self.max_pages
                && state.saved_page_count() >= max
            {
                info!("Reached page limit of {}", max);
                return false;
            }

            let Some(url) = state.next_pending() else {
                return false;
            };

            if !robots.can_fetch(&url) {
                warn!("Robots.txt disallows fetching: {}", url);
                state.mark_failed(&url, &MirrorError::RobotsDisallowed(url.to_string()));
                continue;
            }

            info!("Processing HTML page: {}", url);
            if let Err(e) = self.crawl_page(fetcher, &processor, state, &url).await {
                warn!("Failed to process HTML page {}: {}", url, e);
                state.mark_failed(&url, &e);
            }

            if let Some(ref callback) = self.progress_callback {
                callback(state.saved_page_count(), url.to_string());
            }

            if state.pending_count() > 0 && !delay.is_zero() {
                self.pause(delay).await;
            }
        }
    }

    async fn crawl_page(
        &self,
        fetcher: &Fetcher,
        processor: &PageProcessor<'_>,
        state: &mut CrawlState,
        url: &CanonicalUrl,
    ) -> Result<()> {
        let content = fetcher.fetch(url).await?;
        let mut record = content.record.clone();

        if !record.is_html() {
            // Linked documents such as PDFs are stored as they are
            let path = state.local_path(url);
            content.save_to(&path)?;
            debug!("Saved non-HTML page {} -> {}", url, path.display());
            record.local_path = Some(path);
            state.mark_saved_as_asset(url, record);
            return Ok(());
        }

        let document = processor.process(state, url, &content).await?;
        debug!(
            "{}: {} references rewritten, {} pages queued, {} assets downloaded",
            url,
            document.references_rewritten,
            document.pages_discovered,
            document.assets_downloaded
        );
        record.local_path = Some(document.local_path);
        state.mark_saved(url, record);
        Ok(())
    }

    /// Sleep for `delay`, returning early once the cancel flag is set.
    async fn pause(&self, delay: Duration) {
        let mut remaining = delay;
        while !remaining.is_zero() && !self.is_cancelled() {
            let step = remaining.min(PAUSE_SLICE);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }
}
