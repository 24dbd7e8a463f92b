//! robots.txt gate for the seed host.
//!
//! Only the `User-agent: *` group is consulted. Any failure to load the file
//! degrades to allow-all.

use crate::fetch::Fetcher;
use crate::normalize::CanonicalUrl;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound applied to a server-supplied `Crawl-delay`.
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// Parsed rules of the wildcard group.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    rules: Vec<Rule>,
    crawl_delay: Option<Duration>,
}

impl RobotsPolicy {
    pub fn parse(body: &str) -> Self {
        let mut policy = RobotsPolicy::default();
        let mut in_wildcard = false;
        // Consecutive user-agent lines share one group
        let mut group_has_rules = true;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if group_has_rules {
                        in_wildcard = false;
                        group_has_rules = false;
                    }
                    if value == "*" {
                        in_wildcard = true;
                    }
                }
                "allow" | "disallow" => {
                    group_has_rules = true;
                    if in_wildcard && !value.is_empty() {
                        policy.rules.push(Rule {
                            allow: field == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                "crawl-delay" => {
                    group_has_rules = true;
                    if in_wildcard
                        && let Ok(secs) = value.parse::<f64>()
                        && secs.is_finite()
                        && secs >= 0.0
                    {
                        // Finite and non-negative, so conversion only fails when too large
                        let delay = Duration::try_from_secs_f64(secs)
                            .map_or(MAX_CRAWL_DELAY, |delay| delay.min(MAX_CRAWL_DELAY));
                        policy.crawl_delay = Some(delay);
                    }
                }
                _ => {}
            }
        }

        policy
    }

    /// Longest matching rule wins, `Allow` wins a tie, no match allows.
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<&Rule> = None;
        for rule in self.rules.iter().filter(|r| pattern_matches(&r.pattern, path)) {
            best = match best {
                Some(current)
                    if current.pattern.len() > rule.pattern.len()
                        || (current.pattern.len() == rule.pattern.len() && current.allow) =>
                {
                    Some(current)
                }
                _ => Some(rule),
            };
        }
        best.map(|r| r.allow).unwrap_or(true)
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return if anchored {
            path == pattern
        } else {
            path.starts_with(pattern)
        };
    }

    if !path.starts_with(parts[0]) {
        return false;
    }
    let mut pos = parts[0].len();
    let last = parts.len() - 1;
    for (idx, part) in parts.iter().enumerate().skip(1) {
        if idx == last && anchored {
            return path[pos..].ends_with(part);
        }
        match path[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }
    true
}

/// Advisory gate in front of every fetch.
#[derive(Debug, Clone, Default)]
pub struct RobotsGate {
    policy: Option<RobotsPolicy>,
}

impl RobotsGate {
    pub fn allow_all() -> Self {
        Self { policy: None }
    }

    pub fn from_policy(policy: RobotsPolicy) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    /// Fetch `{scheme}://{host}/robots.txt` for the seed.
    pub async fn load(fetcher: &Fetcher, seed: &CanonicalUrl) -> Self {
        let Some(robots_url) = seed
            .as_url()
            .join("/robots.txt")
            .ok()
            .and_then(CanonicalUrl::from_url)
        else {
            warn!("Could not build robots.txt URL for {}", seed);
            return Self::allow_all();
        };

        match fetcher.fetch(&robots_url).await {
            Ok(content) => {
                info!("Robots.txt loaded from {}", robots_url);
                Self::from_policy(RobotsPolicy::parse(&content.text()))
            }
            Err(e) => {
                warn!("Could not load robots.txt: {}", e);
                Self::allow_all()
            }
        }
    }

    pub fn can_fetch(&self, url: &CanonicalUrl) -> bool {
        let Some(policy) = &self.policy else {
            return true;
        };
        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        policy.is_allowed(&target)
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.policy.as_ref().and_then(|p| p.crawl_delay())
    }

    pub fn is_loaded(&self) -> bool {
        self.policy.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const ROBOTS: &str = "\
# example robots
User-agent: Googlebot
Disallow: /

User-agent: *
Disallow: /private/
Allow: /private/public
Disallow: /*.pdf$
Disallow: /search?
Crawl-delay: 2
";

    fn url(p: &str) -> CanonicalUrl {
        CanonicalUrl::parse(&format!("https://example.com{}", p)).unwrap()
    }

    #[test]
    fn test_wildcard_group_rules() {
        let gate = RobotsGate::from_policy(RobotsPolicy::parse(ROBOTS));

        assert!(gate.can_fetch(&url("/")));
        assert!(gate.can_fetch(&url("/about")));
        assert!(!gate.can_fetch(&url("/private/data")));
        assert!(gate.can_fetch(&url("/private/public/page")));
        assert!(!gate.can_fetch(&url("/files/report.pdf")));
        assert!(gate.can_fetch(&url("/files/report.pdf.html")));
        assert!(!gate.can_fetch(&url("/search?q=x")));
        assert!(gate.can_fetch(&url("/search")));
    }

    #[test]
    fn test_other_agent_groups_are_ignored() {
        let policy = RobotsPolicy::parse("User-agent: BadBot\nDisallow: /\n");
        assert!(policy.is_allowed("/anything"));
    }

    #[test]
    fn test_grouped_user_agents_share_rules() {
        let policy = RobotsPolicy::parse("User-agent: a\nUser-agent: *\nDisallow: /x\n");
        assert!(!policy.is_allowed("/x/y"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow:\n");
        assert!(policy.is_allowed("/"));
        assert!(policy.is_allowed("/deep/path"));
    }

    #[test]
    fn test_fields_are_case_insensitive() {
        let policy = RobotsPolicy::parse("USER-AGENT: *\nDISALLOW: /admin\n");
        assert!(!policy.is_allowed("/admin/panel"));
    }

    #[test]
    fn test_allow_wins_tie() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /page\nAllow: /page\n");
        assert!(policy.is_allowed("/page"));
    }

    #[test]
    fn test_crawl_delay_is_parsed() {
        let policy = RobotsPolicy::parse(ROBOTS);
        assert_eq!(policy.crawl_delay(), Some(Duration::from_secs(2)));

        let policy = RobotsPolicy::parse("User-agent: *\nCrawl-delay: soon\n");
        assert_eq!(policy.crawl_delay(), None);
    }

    #[test]
    fn test_oversized_crawl_delay_is_capped() {
        let policy = RobotsPolicy::parse("User-agent: *\nCrawl-delay: 1e30\n");
        assert_eq!(policy.crawl_delay(), Some(MAX_CRAWL_DELAY));

        let policy = RobotsPolicy::parse("User-agent: *\nCrawl-delay: 3600\n");
        assert_eq!(policy.crawl_delay(), Some(MAX_CRAWL_DELAY));
    }

    #[test]
    fn test_unloaded_gate_allows_all() {
        let gate = RobotsGate::allow_all();
        assert!(!gate.is_loaded());
        assert!(gate.can_fetch(&url("/private/data")));
        assert_eq!(gate.crawl_delay(), None);
    }

    #[tokio::test]
    async fn test_load_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("User-agent: *\nDisallow: /secret\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let seed = CanonicalUrl::parse(&format!("{}/start/page", server.uri())).unwrap();
        let gate = RobotsGate::load(&Fetcher::new().unwrap(), &seed).await;

        assert!(gate.is_loaded());
        let secret = CanonicalUrl::parse(&format!("{}/secret/x", server.uri())).unwrap();
        assert!(!gate.can_fetch(&secret));
        assert!(gate.can_fetch(&seed));
    }

    #[tokio::test]
    async fn test_missing_robots_degrades_to_allow_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let seed = CanonicalUrl::parse(&server.uri()).unwrap();
        let gate = RobotsGate::load(&Fetcher::new().unwrap(), &seed).await;

        assert!(!gate.is_loaded());
        assert!(gate.can_fetch(&seed));
    }
}
