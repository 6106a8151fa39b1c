//! Paywalled-publisher detection and title guessing for the open-access
//! fallback.

use super::filename::last_path_segment;

/// Publisher domains that usually answer anonymous PDF requests with a
/// login page or a 403. Matching is a plain substring test on the URL.
const PAYWALLED_DOMAINS: &[&str] = &[
    "sciencedirect.com",
    "elsevier.com",
    "springer.com",
    "link.springer.com",
    "wiley.com",
    "onlinelibrary.wiley.com",
    "ieee.org",
    "ieeexplore.ieee.org",
    "acm.org",
    "dl.acm.org",
    "nature.com",
    "tandfonline.com",
    "jstor.org",
    "sagepub.com",
    "cambridge.org",
    "oup.com",
    "academic.oup.com",
];

const QUERY_TITLE_KEYS: &[&str] = &["title", "q", "query"];

/// Minimum length (in chars) for a hint or path segment to pass as a title.
const MIN_TITLE_CHARS: usize = 10;

pub fn is_paywalled(url: &str) -> bool {
    PAYWALLED_DOMAINS.iter().any(|domain| url.contains(domain))
}

/// Best guess at the paper title behind `url`, for searching an open-access
/// copy. Tries the filename hint, then `title`/`q`/`query` query
/// parameters, then a descriptive last path segment.
pub fn derive_title(url: &str, hint: Option<&str>) -> Option<String> {
    if let Some(title) = hint.and_then(title_from_hint) {
        return Some(title);
    }
    if let Some(title) = title_from_query(url) {
        return Some(title);
    }
    title_from_path(url)
}

fn title_from_hint(hint: &str) -> Option<String> {
    let hint = hint.trim();
    let hint = hint.strip_suffix(".pdf").unwrap_or(hint);
    let title = hint.replace(['_', '-'], " ").trim().to_string();
    (title.chars().count() > MIN_TITLE_CHARS).then_some(title)
}

fn title_from_query(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    // First key in priority order wins, regardless of parameter order
    QUERY_TITLE_KEYS.iter().find_map(|key| {
        parsed
            .query_pairs()
            .find(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    })
}

fn title_from_path(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    let segment = segment.trim();
    if segment.chars().count() > MIN_TITLE_CHARS && !segment.contains('.') {
        Some(segment.replace(['_', '-'], " "))
    } else {
        None
    }
}
