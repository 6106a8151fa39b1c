//! Local filename derivation
//!
//! Names are derived from the URL (or the caller's hint) alone, without
//! looking at the filesystem.

use regex::Regex;
use std::sync::LazyLock;

static ARXIV_PDF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"arxiv\.org/pdf/([^?#]+)").expect("static regex"));

/// Derive a filesystem-safe filename ending in `.pdf`.
///
/// - `hint` wins when given
/// - arXiv URLs become `arxiv_<id>.pdf`
/// - Google Scholar URLs (and anything without a usable last segment) get a
///   timestamp name
/// - otherwise the last path segment, minus any `.pdf` suffix
pub fn resolve_filename(url: &str, hint: Option<&str>) -> String {
    let base = match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => hint.to_string(),
        None => name_from_url(url),
    };

    let with_ext = if base.ends_with(".pdf") {
        base
    } else {
        format!("{}.pdf", base)
    };
    sanitize(&with_ext)
}

fn name_from_url(url: &str) -> String {
    if url.contains("arxiv.org") {
        return match ARXIV_PDF_RE.captures(url).and_then(|c| c.get(1)) {
            Some(id) => {
                let id = id.as_str().trim_end_matches('/');
                let id = id.strip_suffix(".pdf").unwrap_or(id);
                format!("arxiv_{}", id)
            }
            None => timestamp_name(),
        };
    }

    if url.contains("scholar.google") {
        return timestamp_name();
    }

    let segment = last_path_segment(url).unwrap_or_default();
    let stem = segment.strip_suffix(".pdf").unwrap_or(&segment);
    if stem.is_empty() {
        timestamp_name()
    } else {
        stem.to_string()
    }
}

/// Final non-empty path segment, percent-decoded.
pub(crate) fn last_path_segment(url: &str) -> Option<String> {
    let raw = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.split('/').filter(|s| !s.is_empty()).last())
            .map(str::to_string),
    }?;

    Some(
        urlencoding::decode(&raw)
            .map(|s| s.into_owned())
            .unwrap_or(raw),
    )
}

fn timestamp_name() -> String {
    format!("paper_{}", chrono::Utc::now().timestamp_millis())
}

/// Replace everything outside `[A-Za-z0-9._-]` with `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_timestamp_name(name: &str) -> bool {
        name.strip_prefix("paper_")
            .and_then(|rest| rest.strip_suffix(".pdf"))
            .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }

    #[test]
    fn test_arxiv_new_style() {
        assert_eq!(
            resolve_filename("https://arxiv.org/pdf/2301.00001", None),
            "arxiv_2301.00001.pdf"
        );
        assert_eq!(
            resolve_filename("https://arxiv.org/pdf/1706.03762v7.pdf", None),
            "arxiv_1706.03762v7.pdf"
        );
    }

    #[test]
    fn test_arxiv_old_style_is_sanitized() {
        assert_eq!(
            resolve_filename("https://arxiv.org/pdf/hep-th/9901001", None),
            "arxiv_hep-th_9901001.pdf"
        );
    }

    #[test]
    fn test_arxiv_without_pdf_path_gets_timestamp() {
        assert!(is_timestamp_name(&resolve_filename("https://arxiv.org/abs/2301.00001", None)));
    }

    #[test]
    fn test_scholar_gets_timestamp() {
        let name = resolve_filename("https://scholar.google.com/scholar?cluster=123", None);
        assert!(is_timestamp_name(&name), "{}", name);
    }

    #[test]
    fn test_plain_url_strips_pdf() {
        assert_eq!(
            resolve_filename("https://example.org/papers/deep-nets.pdf", None),
            "deep-nets.pdf"
        );
        assert_eq!(
            resolve_filename("https://example.org/download/report?id=7", None),
            "report.pdf"
        );
    }

    #[test]
    fn test_empty_segment_gets_timestamp() {
        assert!(is_timestamp_name(&resolve_filename("https://example.org/", None)));
        assert!(is_timestamp_name(&resolve_filename("https://example.org/.pdf", None)));
    }

    #[test]
    fn test_hint_is_used_and_sanitized() {
        assert_eq!(
            resolve_filename("https://arxiv.org/pdf/2301.00001", Some("My Paper (2023)")),
            "My_Paper__2023_.pdf"
        );
        assert_eq!(
            resolve_filename("https://example.org/x.pdf", Some("already.pdf")),
            "already.pdf"
        );
    }

    #[test]
    fn test_blank_hint_ignored() {
        assert_eq!(
            resolve_filename("https://example.org/x.pdf", Some("  ")),
            "x.pdf"
        );
    }

    #[test]
    fn test_percent_encoded_segment() {
        assert_eq!(
            resolve_filename("https://example.org/files/r%C3%A9sum%C3%A9%20final.pdf", None),
            "r_sum__final.pdf"
        );
    }
}
