//! Same-site page discovery for multi-page inspections (made by FontLab https://www.fontlab.com/)
//!
//! Three best-effort sources (sitemaps, in-page links, well-known paths) each
//! produce candidate lists without touching shared state. [`merge_candidates`]
//! folds them into a [`PageSet`] keyed by normalized URL, then ranks and caps.

use std::collections::HashSet;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::future::join3;
use futures_util::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use url::Url;

use crate::urlnorm::normalize_url;

pub const ORIGINAL_PRIORITY: i32 = 100;

const SITEMAP_CANDIDATES: [&str; 3] = ["sitemap.xml", "sitemap_index.xml", "sitemaps.xml"];
const SITEMAP_LIMIT: usize = 50;
const SITEMAP_BASE_PRIORITY: i32 = 80;

const LINK_BASE_SCORE: i32 = 50;
const LINK_MIN_SCORE: i32 = 10;
/// Link candidates stop being accepted once the set holds this many pages.
const LINK_SOFT_CAP: usize = 100;
const STRONG_KEYWORDS: [&str; 6] = ["about", "contact", "service", "product", "home", "main"];
const WEAK_KEYWORDS: [&str; 5] = ["blog", "news", "team", "portfolio", "gallery"];
const PENALTY_KEYWORDS: [&str; 6] = ["login", "register", "admin", "api", "download", "pdf"];

const COMMON_PATHS: [(&str, i32); 16] = [
    ("/about", 70),
    ("/about-us", 70),
    ("/contact", 65),
    ("/contact-us", 65),
    ("/services", 60),
    ("/products", 60),
    ("/blog", 55),
    ("/news", 50),
    ("/team", 45),
    ("/portfolio", 45),
    ("/gallery", 40),
    ("/pricing", 40),
    ("/faq", 35),
    ("/careers", 35),
    ("/privacy", 30),
    ("/terms", 30),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSource {
    Original,
    Sitemap,
    InternalLink,
    CommonPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPage {
    pub url: String,
    pub title: Option<String>,
    pub priority: i32,
    pub source: PageSource,
}

impl DiscoveredPage {
    pub fn new(url: impl Into<String>, priority: i32, source: PageSource) -> Self {
        Self {
            url: url.into(),
            title: None,
            priority,
            source,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }
}

/// Budgets and switches for one discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryOptions {
    pub max_pages: usize,
    /// Navigation and sitemap fetch timeout.
    pub timeout_ms: u64,
    /// Per-request timeout for well-known path probes.
    pub probe_timeout_ms: u64,
    /// Upper bound on in-flight path probes.
    pub probe_concurrency: usize,
    pub include_subdomains: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_pages: 10,
            timeout_ms: 30_000,
            probe_timeout_ms: 5_000,
            probe_concurrency: 16,
            include_subdomains: false,
        }
    }
}

impl DiscoveryOptions {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_probe_timeout_ms(mut self, probe_timeout_ms: u64) -> Self {
        self.probe_timeout_ms = probe_timeout_ms;
        self
    }

    pub fn with_probe_concurrency(mut self, probe_concurrency: usize) -> Self {
        self.probe_concurrency = probe_concurrency;
        self
    }

    pub fn include_subdomains(mut self, include: bool) -> Self {
        self.include_subdomains = include;
        self
    }
}

/// HTTP side of discovery: sitemap bodies and HEAD probes.
pub trait PageFetcher {
    /// Body of a successful (2xx) GET; anything else is an error.
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
    fn head_status(&self, url: &str) -> impl Future<Output = Result<u16>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub title: Option<String>,
    pub links: Vec<PageLink>,
}

/// Page loading side of discovery: one navigation to the base page.
pub trait PageNavigator {
    fn open(&self, url: &str) -> impl Future<Output = Result<PageSnapshot>> + Send;
}

/// Candidates produced by the three sources, ready to merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCandidates {
    pub title: Option<String>,
    pub sitemap: Vec<DiscoveredPage>,
    pub links: Vec<DiscoveredPage>,
    pub common_paths: Vec<DiscoveredPage>,
}

/// Insertion-ordered page set keyed by normalized URL; the first writer wins.
#[derive(Debug, Clone)]
pub struct PageSet {
    pages: Vec<DiscoveredPage>,
    seen: HashSet<String>,
}

impl PageSet {
    pub fn seeded(original_url: impl Into<String>) -> Self {
        let original = DiscoveredPage::new(original_url, ORIGINAL_PRIORITY, PageSource::Original);
        let mut seen = HashSet::new();
        seen.insert(original.url.clone());
        Self {
            pages: vec![original],
            seen,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn insert_if_absent(&mut self, page: DiscoveredPage) -> bool {
        if !self.seen.insert(page.url.clone()) {
            return false;
        }
        self.pages.push(page);
        true
    }

    /// Set the original page's title if it has none.
    pub fn backfill_title(&mut self, title: Option<String>) {
        let Some(title) = title.filter(|t| !t.trim().is_empty()) else {
            return;
        };
        if let Some(original) = self
            .pages
            .iter_mut()
            .find(|page| page.source == PageSource::Original)
        {
            original.title.get_or_insert(title);
        }
    }

    /// Stable sort by descending priority, then keep at most `max_pages` (at least one).
    pub fn into_ranked(mut self, max_pages: usize) -> Vec<DiscoveredPage> {
        self.pages.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.pages.truncate(max_pages.max(1));
        self.pages
    }
}

/// Fold source candidates into the seeded set: sitemap, then links, then common paths.
pub fn merge_candidates(
    original_url: &str,
    candidates: SourceCandidates,
    max_pages: usize,
) -> Vec<DiscoveredPage> {
    let mut set = PageSet::seeded(original_url);
    set.backfill_title(candidates.title);

    for page in candidates.sitemap {
        set.insert_if_absent(page);
    }
    for page in candidates.links {
        if set.len() >= LINK_SOFT_CAP {
            break;
        }
        set.insert_if_absent(page);
    }
    for page in candidates.common_paths {
        set.insert_if_absent(page);
    }

    set.into_ranked(max_pages)
}

/// Discover up to `options.max_pages` same-site pages starting from `base_url`.
///
/// Never fails: each source degrades to nothing on error and the original
/// page is always present.
pub async fn discover_pages<F, N>(
    base_url: &str,
    options: &DiscoveryOptions,
    fetcher: &F,
    navigator: &N,
) -> Vec<DiscoveredPage>
where
    F: PageFetcher,
    N: PageNavigator,
{
    let original = normalize_url(base_url);
    let Ok(base) = Url::parse(&original) else {
        tracing::debug!(url = %original, "base url is not parseable; skipping discovery sources");
        return PageSet::seeded(original).into_ranked(options.max_pages);
    };

    let (sitemap, (title, links), common_paths) = join3(
        sitemap_candidates(&base, options, fetcher),
        link_candidates(&base, options, navigator),
        common_path_candidates(&base, options, fetcher),
    )
    .await;

    tracing::debug!(
        url = %original,
        sitemap = sitemap.len(),
        links = links.len(),
        common_paths = common_paths.len(),
        "discovery sources finished"
    );

    merge_candidates(
        &original,
        SourceCandidates {
            title,
            sitemap,
            links,
            common_paths,
        },
        options.max_pages,
    )
}

// --- sitemap source ---

/// Try each sitemap location in turn; the first successful fetch is used.
pub async fn sitemap_candidates<F: PageFetcher>(
    base: &Url,
    options: &DiscoveryOptions,
    fetcher: &F,
) -> Vec<DiscoveredPage> {
    let limit = Duration::from_millis(options.timeout_ms);

    for name in SITEMAP_CANDIDATES {
        let Ok(location) = base.join(&format!("/{name}")) else {
            continue;
        };
        match with_timeout(limit, fetcher.fetch_text(location.as_str())).await {
            Ok(body) => {
                let pages = sitemap_pages(base, &body);
                tracing::debug!(sitemap = %location, pages = pages.len(), "sitemap fetched");
                return pages;
            }
            Err(err) => tracing::debug!(sitemap = %location, "sitemap unavailable: {err}"),
        }
    }
    Vec::new()
}

fn loc_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").ok())
        .as_ref()
}

/// `<loc>` entries of a sitemap body that share the base origin, in order.
pub fn parse_sitemap_locs(base: &Url, body: &str) -> Vec<String> {
    let Some(pattern) = loc_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
        .filter(|loc| {
            Url::parse(loc)
                .map(|url| url.origin() == base.origin())
                .unwrap_or(false)
        })
        .take(SITEMAP_LIMIT)
        .collect()
}

fn sitemap_pages(base: &Url, body: &str) -> Vec<DiscoveredPage> {
    parse_sitemap_locs(base, body)
        .into_iter()
        .enumerate()
        .map(|(index, loc)| {
            DiscoveredPage::new(
                normalize_url(&loc),
                SITEMAP_BASE_PRIORITY - index as i32,
                PageSource::Sitemap,
            )
        })
        .collect()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// --- internal-link source ---

/// Navigate to the base page once; returns its title and scored same-site links.
pub async fn link_candidates<N: PageNavigator>(
    base: &Url,
    options: &DiscoveryOptions,
    navigator: &N,
) -> (Option<String>, Vec<DiscoveredPage>) {
    let limit = Duration::from_millis(options.timeout_ms);
    let snapshot = match with_timeout(limit, navigator.open(base.as_str())).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::debug!(url = %base, "navigation failed: {err}");
            return (None, Vec::new());
        }
    };

    let title = snapshot
        .title
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());
    let links = scored_links(base, &snapshot.links, options.include_subdomains);
    (title, links)
}

/// Resolve, filter, and score anchors in page order; duplicates keep their first score.
pub fn scored_links(base: &Url, links: &[PageLink], include_subdomains: bool) -> Vec<DiscoveredPage> {
    let Some(domain) = base.host_str().map(bare_domain) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut pages = Vec::new();

    for (index, link) in links.iter().enumerate() {
        let Ok(target) = Url::parse(&link.href).or_else(|_| base.join(&link.href)) else {
            continue;
        };
        if !matches!(target.scheme(), "http" | "https") {
            continue;
        }
        let Some(host) = target.host_str() else {
            continue;
        };
        if !same_site(host, domain, include_subdomains) {
            continue;
        }

        let url = normalize_url(target.as_str());
        if !seen.insert(url.clone()) {
            continue;
        }
        let text = link.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let priority = link_score(&url, &text, index);
        pages.push(
            DiscoveredPage::new(url, priority, PageSource::InternalLink)
                .with_title(Some(text).filter(|t| !t.is_empty())),
        );
    }
    pages
}

/// Keyword score for a link; `index` is its position on the page.
///
/// Each later link loses one point, so equal keyword hits rank in page order.
pub fn link_score(url: &str, text: &str, index: usize) -> i32 {
    let haystack = format!("{} {}", url.to_lowercase(), text.to_lowercase());
    let hits = |keywords: &[&str]| keywords.iter().filter(|k| haystack.contains(*k)).count() as i32;

    let position = i32::try_from(index).unwrap_or(i32::MAX);
    let score = LINK_BASE_SCORE + 20 * hits(&STRONG_KEYWORDS) + 10 * hits(&WEAK_KEYWORDS)
        - 20 * hits(&PENALTY_KEYWORDS);
    score.saturating_sub(position).max(LINK_MIN_SCORE)
}

fn bare_domain(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn same_site(host: &str, domain: &str, include_subdomains: bool) -> bool {
    let host = bare_domain(host);
    host.eq_ignore_ascii_case(domain)
        || (include_subdomains
            && host.len() > domain.len()
            && host.to_ascii_lowercase().ends_with(&format!(".{}", domain.to_ascii_lowercase())))
}

// --- common-path source ---

/// HEAD-probe the well-known paths; only a 200 counts.
pub async fn common_path_candidates<F: PageFetcher>(
    base: &Url,
    options: &DiscoveryOptions,
    fetcher: &F,
) -> Vec<DiscoveredPage> {
    let limit = Duration::from_millis(options.probe_timeout_ms);
    let probes = COMMON_PATHS.iter().filter_map(|(path, priority)| {
        base.join(path)
            .ok()
            .map(|url| (normalize_url(url.as_str()), *priority))
    });

    stream::iter(probes)
        .map(|(url, priority)| async move {
            match with_timeout(limit, fetcher.head_status(&url)).await {
                Ok(200) => Some(DiscoveredPage::new(url, priority, PageSource::CommonPath)),
                Ok(status) => {
                    tracing::trace!(%url, status, "path probe miss");
                    None
                }
                Err(err) => {
                    tracing::trace!(%url, "path probe failed: {err}");
                    None
                }
            }
        })
        .buffered(options.probe_concurrency.max(1))
        .filter_map(|page| async move { page })
        .collect()
        .await
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("timed out after {}ms", limit.as_millis())),
    }
}
