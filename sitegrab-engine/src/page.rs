//! Page processing: reference extraction, asset downloads and link rewriting.
//!
//! Rewriting is split in two steps. [`RewritePlan::build`] decides, for every
//! reference-bearing attribute value found on the page, what it becomes in the
//! mirror. [`RewritePlan::apply`] then streams the original markup through
//! lol_html once and swaps the planned values in, leaving everything else
//! byte-for-byte intact.

use crate::error::{MirrorError, Result};
use crate::fetch::{FetchedContent, Fetcher, write_file};
use crate::normalize::{CanonicalUrl, normalize};
use crate::path::relative_reference;
use crate::robots::RobotsGate;
use crate::state::CrawlState;
use lol_html::{HtmlRewriter, Settings, element};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Elements and attributes that carry references, shared by extraction and
/// rewriting so both passes see the same attributes.
const REFERENCE_ATTRIBUTES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("img[srcset]", "srcset"),
    ("script[src]", "src"),
    ("video[src]", "src"),
    ("video[poster]", "poster"),
    ("audio[src]", "src"),
    ("source[src]", "src"),
    ("source[srcset]", "srcset"),
    ("*[style]", "style"),
];

/// `rel` tokens that make a `<link>` a resource rather than a navigable page.
const RESOURCE_LINK_RELS: &[&str] = &[
    "stylesheet",
    "icon",
    "shortcut",
    "apple-touch-icon",
    "preload",
    "prefetch",
    "modulepreload",
    "manifest",
];

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("CSS url() pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Candidate for the frontier.
    Page,
    /// Downloaded immediately while the page is processed.
    Asset,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub url: CanonicalUrl,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AttributeValue {
    attr: &'static str,
    value: String,
}

/// References found on one page, in document order per element type.
#[derive(Debug, Default)]
pub struct Extraction {
    pub references: Vec<Reference>,
    attributes: Vec<AttributeValue>,
}

impl Extraction {
    pub fn pages(&self) -> impl Iterator<Item = &Reference> {
        self.references
            .iter()
            .filter(|r| r.kind == ReferenceKind::Page)
    }

    pub fn assets(&self) -> impl Iterator<Item = &Reference> {
        self.references
            .iter()
            .filter(|r| r.kind == ReferenceKind::Asset)
    }
}

fn is_resource_link(rel: Option<&str>) -> bool {
    rel.map(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| RESOURCE_LINK_RELS.contains(&token.to_ascii_lowercase().as_str()))
    })
    .unwrap_or(false)
}

/// Raw reference strings inside one attribute value.
fn reference_candidates(attr: &str, value: &str) -> Vec<String> {
    match attr {
        "srcset" => value
            .split(',')
            .filter_map(|candidate| candidate.split_whitespace().next())
            .map(|s| s.to_string())
            .collect(),
        "style" => CSS_URL
            .captures_iter(value)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .collect(),
        _ => vec![value.to_string()],
    }
}

/// Collect every reference on the page, resolved against `page_url`.
pub fn extract_references(html: &str, page_url: &CanonicalUrl) -> Extraction {
    let document = Html::parse_document(html);
    let mut extraction = Extraction::default();
    let mut seen_refs = HashSet::new();
    let mut seen_attrs = HashSet::new();

    for &(selector, attr) in REFERENCE_ATTRIBUTES {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };
            let kind = match element.value().name() {
                "a" => ReferenceKind::Page,
                "link" if !is_resource_link(element.value().attr("rel")) => ReferenceKind::Page,
                _ => ReferenceKind::Asset,
            };

            let mut found_any = false;
            for raw in reference_candidates(attr, value) {
                if let Some(url) = normalize(page_url.as_url(), &raw) {
                    found_any = true;
                    let reference = Reference { url, kind };
                    if seen_refs.insert(reference.clone()) {
                        extraction.references.push(reference);
                    }
                }
            }

            let attribute = AttributeValue {
                attr,
                value: value.to_string(),
            };
            if found_any && seen_attrs.insert(attribute.clone()) {
                extraction.attributes.push(attribute);
            }
        }
    }

    extraction
}

/// Rewrite the references inside one attribute value with `resolve`.
/// Returns `None` when nothing in the value changes.
fn rewrite_value(
    attr: &str,
    value: &str,
    resolve: &mut impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    match attr {
        "srcset" => {
            let mut changed = false;
            let candidates: Vec<String> = value
                .split(',')
                .map(|candidate| {
                    let candidate = candidate.trim();
                    let (raw, descriptor) = match candidate.split_once(char::is_whitespace) {
                        Some((raw, descriptor)) => (raw, Some(descriptor.trim())),
                        None => (candidate, None),
                    };
                    let replaced = match resolve(raw) {
                        Some(new) => {
                            changed = true;
                            new
                        }
                        None => raw.to_string(),
                    };
                    match descriptor {
                        Some(d) if !d.is_empty() => format!("{} {}", replaced, d),
                        _ => replaced,
                    }
                })
                .collect();
            changed.then(|| candidates.join(", "))
        }
        "style" => {
            let mut changed = false;
            let rewritten = CSS_URL.replace_all(value, |caps: &regex::Captures| {
                match resolve(caps[1].trim()) {
                    Some(new) => {
                        changed = true;
                        format!("url('{}')", new)
                    }
                    None => caps[0].to_string(),
                }
            });
            changed.then(|| rewritten.into_owned())
        }
        _ => resolve(value),
    }
}

/// Planned attribute edits for one page: original value to mirrored value,
/// per attribute name.
#[derive(Debug, Default)]
pub struct RewritePlan {
    edits: HashMap<&'static str, HashMap<String, String>>,
}

impl RewritePlan {
    /// `resolve` returns the local file of an in-scope URL and `None` for
    /// references that stay untouched.
    pub fn build(
        extraction: &Extraction,
        page_url: &CanonicalUrl,
        page_path: &Path,
        mut resolve: impl FnMut(&CanonicalUrl) -> Option<PathBuf>,
    ) -> Self {
        let mut plan = RewritePlan::default();
        let mut to_local = |raw: &str| -> Option<String> {
            let url = normalize(page_url.as_url(), raw)?;
            let target = resolve(&url)?;
            let mut href = relative_reference(page_path, &target);
            if let Some((_, fragment)) = raw.split_once('#')
                && !fragment.is_empty()
            {
                href.push('#');
                href.push_str(fragment);
            }
            Some(href)
        };

        for attribute in &extraction.attributes {
            if let Some(new_value) = rewrite_value(attribute.attr, &attribute.value, &mut to_local)
                && new_value != attribute.value
            {
                plan.edits
                    .entry(attribute.attr)
                    .or_default()
                    .insert(attribute.value.clone(), new_value);
            }
        }
        plan
    }

    pub fn get(&self, attr: &str, value: &str) -> Option<&str> {
        self.edits
            .get(attr)
            .and_then(|values| values.get(value))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.edits.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream `html` through the rewriter, replacing planned attribute values.
    /// Returns the rewritten document and the number of attributes changed.
    pub fn apply(&self, html: &str) -> Result<(String, usize)> {
        let mut output = Vec::with_capacity(html.len());
        let rewrite_count = AtomicUsize::new(0);

        let handlers = REFERENCE_ATTRIBUTES
            .iter()
            .map(|&(selector, attr)| {
                let count = &rewrite_count;
                element!(selector, move |el| {
                    if let Some(value) = el.get_attribute(attr) {
                        let decoded = html_escape::decode_html_entities(&value);
                        if let Some(new_value) = self.get(attr, &decoded) {
                            el.set_attribute(attr, new_value)?;
                            count.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Ok(())
                })
            })
            .collect::<Vec<_>>();

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(html.as_bytes())
            .map_err(|e| MirrorError::Parse(format!("HTML rewrite error: {}", e)))?;
        rewriter
            .end()
            .map_err(|e| MirrorError::Parse(format!("HTML rewrite finalization error: {}", e)))?;

        let rewritten = String::from_utf8(output)
            .map_err(|e| MirrorError::Parse(format!("Invalid UTF-8 in rewritten HTML: {}", e)))?;
        Ok((rewritten, rewrite_count.load(Ordering::Relaxed)))
    }
}

/// A fetched page after rewriting and persisting.
#[derive(Debug, Clone)]
pub struct MirroredDocument {
    pub url: CanonicalUrl,
    pub local_path: PathBuf,
    pub references_rewritten: usize,
    pub pages_discovered: usize,
    pub assets_downloaded: usize,
    /// Saved without rewriting because the markup could not be processed.
    pub raw_fallback: bool,
}

/// Turns one fetched HTML page into its mirrored form.
pub struct PageProcessor<'a> {
    fetcher: &'a Fetcher,
    robots: &'a RobotsGate,
}

impl<'a> PageProcessor<'a> {
    pub fn new(fetcher: &'a Fetcher, robots: &'a RobotsGate) -> Self {
        Self { fetcher, robots }
    }

    /// Discover links, download assets, rewrite and write the page.
    ///
    /// New same-domain pages are queued on `state`; assets are fetched here,
    /// before the page itself is written.
    pub async fn process(
        &self,
        state: &mut CrawlState,
        url: &CanonicalUrl,
        page: &FetchedContent,
    ) -> Result<MirroredDocument> {
        let html = page.text();
        let extraction = extract_references(&html, url);

        let mut pages_discovered = 0;
        for reference in extraction.pages() {
            if state.enqueue(reference.url.clone()) {
                debug!("Queued page {}", reference.url);
                pages_discovered += 1;
            }
        }

        let mut assets_downloaded = 0;
        for reference in extraction.assets() {
            if state.is_in_scope(&reference.url) && self.download_asset(state, &reference.url).await
            {
                assets_downloaded += 1;
            }
        }

        let page_path = state.local_path(url);
        let plan = RewritePlan::build(&extraction, url, &page_path, |target| {
            if state.is_in_scope(target) {
                Some(state.local_path(target))
            } else {
                None
            }
        });

        let (output, references_rewritten, raw_fallback) = match plan.apply(&html) {
            Ok((rewritten, count)) => (rewritten.into_bytes(), count, false),
            Err(e) => {
                warn!("Could not rewrite {}: {}. Saving original content", url, e);
                (page.body.clone(), 0, true)
            }
        };

        write_file(&page_path, &output)?;
        info!("Saved HTML page: {}", page_path.display());

        Ok(MirroredDocument {
            url: url.clone(),
            local_path: page_path,
            references_rewritten,
            pages_discovered,
            assets_downloaded,
            raw_fallback,
        })
    }

    /// Fetch and store one asset. Returns true when it was newly downloaded.
    async fn download_asset(&self, state: &mut CrawlState, url: &CanonicalUrl) -> bool {
        if !state.claim_asset(url) {
            return false;
        }
        if !self.robots.can_fetch(url) {
            warn!("Robots.txt disallows fetching: {}", url);
            state.mark_failed(url, &MirrorError::RobotsDisallowed(url.to_string()));
            return false;
        }

        let path = state.local_path(url);
        let outcome = match self.fetcher.fetch(url).await {
            Ok(content) => content.save_to(&path).map(|_| content.record),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(mut record) => {
                info!("Downloaded: {} -> {}", url, path.display());
                record.local_path = Some(path);
                state.record_asset(record);
                true
            }
            Err(e) => {
                warn!("Failed to download {}: {}", url, e);
                state.mark_failed(url, &e);
                false
            }
        }
    }
}
