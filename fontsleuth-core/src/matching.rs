//! Reconciling active CSS font families with downloaded font files (made by FontLab https://www.fontlab.com/)
//!
//! Matching runs an ordered list of rules and stops at the first rule that
//! accepts any file:
//!
//! 1. `@font-face` declarations for the family are pooled and their `url(...)`
//!    sources compared against each download URL.
//! 2. Extracted metadata names, Google Fonts URL slugs, and Google Fonts file
//!    names are compared against the family.
//! 3. Direct comparisons against metadata names with progressively looser
//!    rules.
//!
//! Every function here is pure; calls for different fonts share nothing.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fonts::{ActiveFont, DownloadedFontFile, FontFaceDeclaration};

const GOOGLE_FONTS_STATIC: &str = "fonts.gstatic.com";
const GOOGLE_FONTS_API: &str = "fonts.googleapis.com";
const GOOGLE_FONTS_SOURCE: &str = "Google Fonts";

/// Which stage of the cascade produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Declaration,
    Metadata,
    DirectName,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMatch<'a> {
    pub file: &'a DownloadedFontFile,
    pub strategy: MatchStrategy,
}

/// Lowercase, drop quotes, trim.
pub fn normalize_family(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Per-family state computed once and shared by every rule.
struct MatchContext {
    family: String,
    compact: String,
    words: Vec<String>,
    /// `url(...)` targets pooled from every declaration of the family.
    css_urls: Vec<String>,
}

impl MatchContext {
    fn new(active: &ActiveFont, declarations: &[FontFaceDeclaration]) -> Self {
        let family = normalize_family(&active.family);
        let css_urls = declarations
            .iter()
            .filter(|decl| normalize_family(&decl.family) == family)
            .flat_map(|decl| extract_css_urls(&decl.source))
            .collect();

        Self {
            compact: strip_whitespace(&family),
            words: words(&family),
            family,
            css_urls,
        }
    }
}

type Rule = fn(&MatchContext, &DownloadedFontFile) -> bool;

const RULES: &[(MatchStrategy, Rule)] = &[
    (MatchStrategy::Declaration, declared_url_matches),
    (MatchStrategy::Metadata, metadata_name_equals),
    (MatchStrategy::Metadata, google_slug_matches),
    (MatchStrategy::Metadata, google_file_name_matches),
    (MatchStrategy::DirectName, direct_exact),
    (MatchStrategy::DirectName, direct_compact_containment),
    (MatchStrategy::DirectName, direct_word_containment),
    (MatchStrategy::DirectName, direct_first_word),
];

/// Best-matching downloaded file for `active`, with the strategy that found it.
pub fn match_font<'a>(
    active: &ActiveFont,
    downloaded: &'a [DownloadedFontFile],
    declarations: &[FontFaceDeclaration],
) -> Option<FontMatch<'a>> {
    if downloaded.is_empty() {
        return None;
    }
    let ctx = MatchContext::new(active, declarations);
    if ctx.family.is_empty() {
        return None;
    }

    RULES.iter().find_map(|(strategy, rule)| {
        downloaded
            .iter()
            .find(|file| rule(&ctx, file))
            .map(|file| {
                tracing::trace!(family = %active.family, url = %file.url, ?strategy, "font matched");
                FontMatch {
                    file,
                    strategy: *strategy,
                }
            })
    })
}

pub fn find_matching_font_file<'a>(
    active: &ActiveFont,
    downloaded: &'a [DownloadedFontFile],
    declarations: &[FontFaceDeclaration],
) -> Option<&'a DownloadedFontFile> {
    match_font(active, downloaded, declarations).map(|m| m.file)
}

/// Every file accepted by the first rule that accepts any; a family can
/// span several weight/style files.
pub fn find_all_matching_font_files<'a>(
    active: &ActiveFont,
    downloaded: &'a [DownloadedFontFile],
    declarations: &[FontFaceDeclaration],
) -> Vec<&'a DownloadedFontFile> {
    if downloaded.is_empty() {
        return Vec::new();
    }
    let ctx = MatchContext::new(active, declarations);
    if ctx.family.is_empty() {
        return Vec::new();
    }

    RULES
        .iter()
        .map(|(_, rule)| {
            downloaded
                .iter()
                .filter(|file| rule(&ctx, file))
                .collect::<Vec<_>>()
        })
        .find(|hits| !hits.is_empty())
        .unwrap_or_default()
}

/// Display name for `active`: metadata family, then metadata name, then the
/// declared family, then the original string untouched.
pub fn get_correct_font_family(
    active: &ActiveFont,
    downloaded: &[DownloadedFontFile],
    declarations: &[FontFaceDeclaration],
) -> String {
    let Some(found) = match_font(active, downloaded, declarations) else {
        return active.family.clone();
    };

    let metadata = found.file.metadata.as_ref();
    metadata
        .and_then(|m| m.font_family.clone())
        .or_else(|| metadata.and_then(|m| m.font_name.clone()))
        .or_else(|| {
            let family = normalize_family(&active.family);
            declarations
                .iter()
                .find(|decl| normalize_family(&decl.family) == family)
                .map(|decl| strip_quotes(&decl.family))
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| active.family.clone())
}

// --- declaration rule ---

fn declared_url_matches(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    ctx.css_urls.iter().any(|css| urls_match(&file.url, css))
}

fn css_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"]*?))\s*\)"#).ok())
        .as_ref()
}

/// All `url(...)` targets in a CSS `src` value, in order of appearance.
pub fn extract_css_urls(src: &str) -> Vec<String> {
    let Some(pattern) = css_url_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(src)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Compare a downloaded URL against one declared CSS URL.
pub fn urls_match(font_url: &str, css_url: &str) -> bool {
    if font_url.is_empty() || css_url.is_empty() {
        return false;
    }
    if font_url == css_url {
        return true;
    }
    if font_url.ends_with(css_url) || css_url.ends_with(font_url) {
        return true;
    }

    if let (Ok(a), Ok(b)) = (Url::parse(font_url), Url::parse(css_url)) {
        if a.host_str().is_some() && a.host_str() == b.host_str() {
            let same_path = if a.host_str() == Some(GOOGLE_FONTS_STATIC) {
                google_family_and_version_match(&a, &b)
            } else {
                shared_leading_segments(&a, &b) >= 2
            };
            if same_path {
                return true;
            }
        }
    }

    match (file_name(font_url), file_name(css_url)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// `fonts.gstatic.com/s/<family>/<version>/...` must agree on both segments.
fn google_family_and_version_match(a: &Url, b: &Url) -> bool {
    let (a, b) = (segments(a), segments(b));
    a.len() >= 3 && b.len() >= 3 && a[0] == "s" && b[0] == "s" && a[1] == b[1] && a[2] == b[2]
}

fn shared_leading_segments(a: &Url, b: &Url) -> usize {
    segments(a)
        .iter()
        .zip(segments(b).iter())
        .take_while(|(x, y)| x == y)
        .count()
}

fn file_name(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next()?;
    without_query
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

// --- metadata rules ---

fn metadata_name_equals(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    metadata_names(file, false)
        .iter()
        .any(|name| normalize_family(name) == ctx.family)
}

fn google_slug_matches(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    let Some(slug) = google_fonts_slug(&file.url) else {
        return false;
    };
    let readable = readable_slug(&slug).to_lowercase();
    let slug = strip_whitespace(&slug.to_lowercase());

    readable == ctx.family
        || slug == ctx.compact
        || contains_either(&readable, &ctx.family)
        || contains_either(&slug, &ctx.compact)
}

fn google_file_name_matches(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    if file.source != GOOGLE_FONTS_SOURCE {
        return false;
    }
    let name = alphanumeric(&file.name);
    let family = alphanumeric(&ctx.family);
    contains_either(&name, &family)
}

/// The `<slug>` in a Google Fonts `/s/<slug>/` path.
pub fn google_fonts_slug(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if host != GOOGLE_FONTS_STATIC && host != GOOGLE_FONTS_API {
        return None;
    }
    let segs = segments(&parsed);
    match segs.as_slice() {
        ["s", slug, ..] if !slug.is_empty() => Some(slug.to_string()),
        _ => None,
    }
}

/// `notoSansKR` becomes `Noto Sans K R`; the first letter is capitalized.
pub fn readable_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len() + 4);
    for (i, ch) in slug.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_uppercase());
        } else {
            if ch.is_uppercase() {
                out.push(' ');
            }
            out.push(ch);
        }
    }
    out
}

// --- direct-name rules ---

fn direct_exact(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    metadata_names(file, true)
        .iter()
        .any(|name| normalize_family(name) == ctx.family)
}

fn direct_compact_containment(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    metadata_names(file, true)
        .iter()
        .any(|name| contains_either(&strip_whitespace(&normalize_family(name)), &ctx.compact))
}

fn direct_word_containment(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    metadata_names(file, true).iter().any(|name| {
        let candidate = words(&normalize_family(name));
        words_within(&ctx.words, &candidate) || words_within(&candidate, &ctx.words)
    })
}

fn direct_first_word(ctx: &MatchContext, file: &DownloadedFontFile) -> bool {
    let Some(first) = ctx.words.first().filter(|w| w.chars().count() > 3) else {
        return false;
    };
    metadata_names(file, true).iter().any(|name| {
        words(&normalize_family(name))
            .first()
            .is_some_and(|other| other.chars().count() > 3 && other == first)
    })
}

fn metadata_names(file: &DownloadedFontFile, with_unique_id: bool) -> Vec<&str> {
    let Some(meta) = file.metadata.as_ref() else {
        return Vec::new();
    };
    let mut names = vec![meta.font_name.as_deref(), meta.font_family.as_deref()];
    if with_unique_id {
        names.push(meta.unique_identifier.as_deref());
    }
    names.into_iter().flatten().filter(|n| !n.trim().is_empty()).collect()
}

/// Every word in `needles` is a substring of some word in `haystack`.
fn words_within(needles: &[String], haystack: &[String]) -> bool {
    !needles.is_empty()
        && !haystack.is_empty()
        && needles
            .iter()
            .all(|needle| haystack.iter().any(|word| word.contains(needle.as_str())))
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn strip_quotes(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect::<String>()
        .trim()
        .to_string()
}

fn alphanumeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
