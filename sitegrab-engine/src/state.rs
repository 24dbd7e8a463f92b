use crate::error::MirrorError;
use crate::normalize::{CanonicalUrl, same_domain};
use crate::path::{disambiguate, to_local_path};
use crate::record::{DownloadRecord, FailedUrl, MirrorSummary};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Lifecycle of a page URL within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlState {
    Pending,
    Fetching,
    Saved,
    Failed,
}

impl UrlState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UrlState::Saved | UrlState::Failed)
    }
}

/// Assigns every URL one file for the whole run and keeps two URLs from
/// sharing a file.
#[derive(Debug, Default)]
struct PathRegistry {
    by_url: HashMap<CanonicalUrl, PathBuf>,
    owners: HashMap<PathBuf, CanonicalUrl>,
}

impl PathRegistry {
    fn claim(&mut self, url: &CanonicalUrl, output_root: &Path) -> PathBuf {
        if let Some(path) = self.by_url.get(url) {
            return path.clone();
        }

        let mut path = to_local_path(url, output_root);
        if let Some(owner) = self.owners.get(&path)
            && owner != url
        {
            let alternative = disambiguate(&path, url);
            warn!(
                "{} maps to {} already used by {}; saving as {}",
                url,
                path.display(),
                owner,
                alternative.display()
            );
            path = alternative;
        }

        self.owners.insert(path.clone(), url.clone());
        self.by_url.insert(url.clone(), path.clone());
        path
    }
}

/// Everything the crawl knows about the run: frontier, per-URL state,
/// attempted assets, the path registry and the accounting for the summary.
#[derive(Debug)]
pub struct CrawlState {
    seed_host: String,
    output_root: PathBuf,
    frontier: VecDeque<CanonicalUrl>,
    seen_pages: HashSet<CanonicalUrl>,
    page_states: HashMap<CanonicalUrl, UrlState>,
    seen_assets: HashSet<CanonicalUrl>,
    paths: PathRegistry,
    pages: Vec<DownloadRecord>,
    assets: Vec<DownloadRecord>,
    failed: Vec<FailedUrl>,
}

impl CrawlState {
    pub fn new(seed_host: impl Into<String>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            seed_host: seed_host.into(),
            output_root: output_root.into(),
            frontier: VecDeque::new(),
            seen_pages: HashSet::new(),
            page_states: HashMap::new(),
            seen_assets: HashSet::new(),
            paths: PathRegistry::default(),
            pages: Vec::new(),
            assets: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn seed_host(&self) -> &str {
        &self.seed_host
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn is_in_scope(&self, url: &CanonicalUrl) -> bool {
        same_domain(url, &self.seed_host)
    }

    /// Queue a same-domain page. Returns false for off-domain URLs and for
    /// URLs already queued, visited, or mirrored as an asset.
    pub fn enqueue(&mut self, url: CanonicalUrl) -> bool {
        if !self.is_in_scope(&url) || self.seen_assets.contains(&url) {
            return false;
        }
        if !self.seen_pages.insert(url.clone()) {
            return false;
        }
        self.page_states.insert(url.clone(), UrlState::Pending);
        self.frontier.push_back(url);
        true
    }

    /// Next pending page in FIFO order, moved to `Fetching`.
    pub fn next_pending(&mut self) -> Option<CanonicalUrl> {
        while let Some(url) = self.frontier.pop_front() {
            if self.state_of(&url).is_some_and(UrlState::is_terminal) {
                continue;
            }
            self.page_states.insert(url.clone(), UrlState::Fetching);
            return Some(url);
        }
        None
    }

    pub fn state_of(&self, url: &CanonicalUrl) -> Option<UrlState> {
        self.page_states.get(url).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.frontier.len()
    }

    /// First request to download `url` as an asset. Pages and assets already
    /// attempted return false so nothing is fetched twice.
    pub fn claim_asset(&mut self, url: &CanonicalUrl) -> bool {
        if self.seen_pages.contains(url) {
            return false;
        }
        self.seen_assets.insert(url.clone())
    }

    /// The file `url` is mirrored into, stable for the whole run.
    pub fn local_path(&mut self, url: &CanonicalUrl) -> PathBuf {
        self.paths.claim(url, &self.output_root)
    }

    pub fn mark_saved(&mut self, url: &CanonicalUrl, record: DownloadRecord) {
        self.page_states.insert(url.clone(), UrlState::Saved);
        self.pages.push(record);
    }

    /// A page URL that turned out not to be HTML: saved, but counted as an asset.
    pub fn mark_saved_as_asset(&mut self, url: &CanonicalUrl, record: DownloadRecord) {
        self.page_states.insert(url.clone(), UrlState::Saved);
        self.assets.push(record);
    }

    pub fn mark_failed(&mut self, url: &CanonicalUrl, error: &MirrorError) {
        if self.page_states.contains_key(url) {
            self.page_states.insert(url.clone(), UrlState::Failed);
        }
        self.failed.push(FailedUrl {
            url: url.to_string(),
            kind: error.kind().to_string(),
            reason: error.to_string(),
        });
    }

    pub fn record_asset(&mut self, record: DownloadRecord) {
        self.assets.push(record);
    }

    pub fn saved_page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_summary(self, interrupted: bool) -> MirrorSummary {
        MirrorSummary {
            pages: self.pages,
            assets: self.assets,
            failed: self.failed,
            interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    fn state() -> CrawlState {
        CrawlState::new("example.com", "out")
    }

    #[test]
    fn test_frontier_is_fifo_and_deduplicated() {
        let mut state = state();
        assert!(state.enqueue(url("https://example.com/")));
        assert!(state.enqueue(url("https://example.com/a")));
        assert!(!state.enqueue(url("https://example.com/a#frag")));
        assert!(state.enqueue(url("https://example.com/b")));
        assert_eq!(state.pending_count(), 3);

        assert_eq!(state.next_pending().unwrap().as_str(), "https://example.com/");
        assert_eq!(state.next_pending().unwrap().as_str(), "https://example.com/a");
        assert_eq!(state.next_pending().unwrap().as_str(), "https://example.com/b");
        assert!(state.next_pending().is_none());
    }

    #[test]
    fn test_off_domain_is_never_enqueued() {
        let mut state = state();
        assert!(!state.enqueue(url("https://other.com/")));
        assert!(!state.enqueue(url("https://sub.example.com/")));
        assert_eq!(state.pending_count(), 0);
    }

    #[test]
    fn test_visited_url_never_returns_to_pending() {
        let mut state = state();
        let home = url("https://example.com/");
        state.enqueue(home.clone());
        let current = state.next_pending().unwrap();
        assert_eq!(state.state_of(&current), Some(UrlState::Fetching));

        state.mark_saved(&current, DownloadRecord::new(current.to_string()));
        assert_eq!(state.state_of(&home), Some(UrlState::Saved));
        assert!(!state.enqueue(home.clone()));
        assert!(state.next_pending().is_none());
    }

    #[test]
    fn test_failed_page_is_terminal_and_reported() {
        let mut state = state();
        let page = url("https://example.com/missing");
        state.enqueue(page.clone());
        let current = state.next_pending().unwrap();
        let err = MirrorError::HttpStatus {
            url: current.to_string(),
            status: 404,
        };
        state.mark_failed(&current, &err);

        assert_eq!(state.state_of(&page), Some(UrlState::Failed));
        let summary = state.into_summary(false);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].kind, "http-status");
        assert!(summary.failed[0].reason.contains("404"));
    }

    #[test]
    fn test_assets_and_pages_are_disjoint() {
        let mut state = state();
        let css = url("https://example.com/style.css");
        assert!(state.claim_asset(&css));
        assert!(!state.claim_asset(&css));
        assert!(!state.enqueue(css.clone()));

        let page = url("https://example.com/about");
        state.enqueue(page.clone());
        assert!(!state.claim_asset(&page));
    }

    #[test]
    fn test_local_path_is_stable() {
        let mut state = state();
        let about = url("https://example.com/about");
        let first = state.local_path(&about);
        assert_eq!(first, Path::new("out/about.html"));
        assert_eq!(state.local_path(&about), first);
    }

    #[test]
    fn test_colliding_urls_get_distinct_paths() {
        let mut state = state();
        let a = url("https://example.com/list?page=1");
        let b = url("https://example.com/list?page=2");
        let c = url("https://example.com/list.html");

        let pa = state.local_path(&a);
        let pb = state.local_path(&b);
        let pc = state.local_path(&c);

        assert_eq!(pa, Path::new("out/list.html"));
        assert_ne!(pa, pb);
        assert_ne!(pa, pc);
        assert_ne!(pb, pc);
        assert_eq!(state.local_path(&b), pb);
    }
}
