//! URL canonicalization used as the dedup key for discovered pages (made by FontLab https://www.fontlab.com/)

use std::borrow::Cow;

use url::Url;

/// Exact query keys dropped during normalization, on top of every `utm_*` key.
pub const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "ref",
    "source",
    "campaign",
    "sessionid",
    "sid",
    "_ga",
    "_gid",
    "timestamp",
];

/// Canonicalize a URL string for deduplication.
///
/// Prepends `https://` when no scheme is present, clears the fragment, drops
/// tracking query parameters and strips trailing `/`s. Input that does not
/// parse as a URL is returned unchanged. Normalizing twice yields the same
/// string as normalizing once.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let candidate: Cow<'_, str> = if has_scheme(raw) {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(format!("https://{raw}"))
    };

    let mut url = match Url::parse(&candidate) {
        Ok(url) => url,
        Err(_) => return raw.to_string(),
    };

    url.set_fragment(None);
    strip_tracking_params(&mut url);

    let mut out: String = url.into();
    let authority = out.find("://").map_or(0, |i| i + 3);
    let kept = authority + out[authority..].trim_end_matches('/').len();
    out.truncate(kept);
    out
}

fn strip_tracking_params(url: &mut Url) {
    let Some(query) = url.query() else {
        return;
    };
    if query.is_empty() {
        url.set_query(None);
        return;
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !pairs.iter().any(|(k, _)| is_tracking_param(k)) {
        return;
    }

    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking_param(k)).collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
