use std::fmt;
use url::Url;

/// A fetchable http(s) URL with the fragment removed.
///
/// Two references that differ only by fragment produce the same
/// `CanonicalUrl`, so this is the key for every crawl set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Canonicalize an absolute URL string.
    pub fn parse(input: &str) -> Option<Self> {
        Url::parse(input.trim()).ok().and_then(Self::from_url)
    }

    pub fn from_url(mut url: Url) -> Option<Self> {
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return None;
        }
        url.set_fragment(None);
        Some(Self(url))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.0.query()
    }

    /// Host plus explicit port, e.g. `example.com` or `127.0.0.1:8080`.
    pub fn authority(&self) -> String {
        authority(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Host plus explicit (non-default) port of a URL.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Resolve `reference` against `base`, drop the fragment and keep only
/// fetchable http(s) results.
pub fn normalize(base: &Url, reference: &str) -> Option<CanonicalUrl> {
    let reference = reference.trim();
    // Skip empty, in-page anchors and non-fetchable schemes
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }
    let lowered = reference.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let resolved = base.join(reference).ok()?;
    CanonicalUrl::from_url(resolved)
}

/// Exact host (and port) comparison. Subdomains of the seed host do not match.
pub fn same_domain(url: &CanonicalUrl, seed_host: &str) -> bool {
    authority(url.as_url())
        .map(|a| a.eq_ignore_ascii_case(seed_host))
        .unwrap_or(false)
}
