//! reqwest-backed discovery collaborators (made by FontLab https://www.fontlab.com/)

use anyhow::{Context, Result};
use reqwest::redirect::Policy;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::discovery::{PageFetcher, PageLink, PageNavigator, PageSnapshot};

pub const DEFAULT_USER_AGENT: &str = concat!("fontsleuth/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 5;

fn build_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()
        .context("building HTTP client")
}

/// Sitemap fetches and HEAD probes over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(user_agent)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        response
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))
    }

    async fn head_status(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .with_context(|| format!("HEAD {url}"))?;
        Ok(response.status().as_u16())
    }
}

/// Static-HTML stand-in for a browser navigation: fetches the page and reads
/// its title and anchors without running scripts.
#[derive(Debug, Clone)]
pub struct HttpNavigator {
    client: Client,
}

impl HttpNavigator {
    pub fn new(user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(user_agent)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl PageNavigator for HttpNavigator {
    async fn open(&self, url: &str) -> Result<PageSnapshot> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))?;

        Ok(snapshot_from_html(&final_url, &body))
    }
}

/// Page title and resolved anchors of an HTML document.
pub fn snapshot_from_html(page_url: &Url, html: &str) -> PageSnapshot {
    let document = Html::parse_document(html);
    let (Ok(title_selector), Ok(anchor_selector)) =
        (Selector::parse("title"), Selector::parse("a[href]"))
    else {
        return PageSnapshot::default();
    };

    let title = document
        .select(&title_selector)
        .next()
        .map(|node| node.text().collect::<String>())
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty());

    let links = document
        .select(&anchor_selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') {
                return None;
            }
            let resolved = page_url.join(href).ok()?;
            Some(PageLink {
                href: resolved.to_string(),
                text: anchor.text().collect::<String>().trim().to_string(),
            })
        })
        .collect();

    PageSnapshot { title, links }
}
