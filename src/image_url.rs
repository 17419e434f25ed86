//! Image URL resolution
//!
//! Turns whatever an `<img>` or meta tag carries (absolute, protocol-relative,
//! root-relative, bare relative, or a `srcset` list) into one absolute URL.

use url::Url;

use crate::utils::constants::IMAGE_SKIP_KEYWORDS;

/// One entry of a `srcset` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate {
    pub url: String,
    /// Width from a `NNNw` descriptor, if the entry has one
    pub width: Option<u32>,
}

/// Resolve `candidate` against the page it was found on
///
/// - `http(s)://…` passes through unchanged
/// - `//host/path` gains the page's scheme
/// - `/path` gains the page's scheme and host
/// - anything else is joined to scheme and host with exactly one `/`
///
/// If `page_url` itself cannot be parsed the candidate is returned trimmed.
pub fn normalize(candidate: &str, page_url: &str) -> String {
    let candidate = candidate.trim();

    if is_absolute(candidate) || candidate.starts_with("data:") {
        return candidate.to_string();
    }

    let Ok(page) = Url::parse(page_url) else {
        return candidate.to_string();
    };
    let scheme = page.scheme();

    if let Some(rest) = candidate.strip_prefix("//") {
        return format!("{scheme}://{rest}");
    }

    let origin = match (page.host_str(), page.port()) {
        (Some(host), Some(port)) => format!("{scheme}://{host}:{port}"),
        (Some(host), None) => format!("{scheme}://{host}"),
        (None, _) => return candidate.to_string(),
    };

    if candidate.starts_with('/') {
        return format!("{origin}{candidate}");
    }

    let relative = candidate.trim_start_matches("./").trim_start_matches('/');
    format!("{origin}/{relative}")
}

fn is_absolute(candidate: &str) -> bool {
    let lower = candidate.get(..8).unwrap_or(candidate).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Parse a `srcset` attribute into its entries
pub fn parse_srcset(srcset: &str) -> Vec<SrcsetCandidate> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let width = parts
                .next()
                .and_then(|d| d.strip_suffix('w').or_else(|| d.strip_suffix('W')))
                .and_then(|w| w.parse::<u32>().ok());
            Some(SrcsetCandidate {
                url: url.to_string(),
                width,
            })
        })
        .collect()
}

/// The `srcset` entry with the largest width descriptor
///
/// Entries without a `w` descriptor rank as width 0; ties keep the earliest.
pub fn best_srcset_candidate(srcset: &str) -> Option<SrcsetCandidate> {
    parse_srcset(srcset)
        .into_iter()
        .fold(None, |best: Option<SrcsetCandidate>, entry| match &best {
            Some(b) if entry.width.unwrap_or(0) <= b.width.unwrap_or(0) => best,
            _ => Some(entry),
        })
}

/// Whether a URL looks like site chrome (logos, banners, ads) rather than product media
pub fn is_skipped(url: &str) -> bool {
    let lower = url.to_lowercase();
    IMAGE_SKIP_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://shop.example.com/p/1";

    #[test]
    fn protocol_relative_gains_page_scheme() {
        assert_eq!(
            normalize("//cdn.example.com/a.jpg", PAGE),
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(
            normalize("//cdn.example.com/a.jpg", "http://shop.example.com/"),
            "http://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn root_relative_gains_scheme_and_host() {
        assert_eq!(
            normalize("/img/a.jpg", PAGE),
            "https://shop.example.com/img/a.jpg"
        );
        assert_eq!(
            normalize("/img/a.jpg", "http://localhost:8080/p/1"),
            "http://localhost:8080/img/a.jpg"
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        let url = "https://other.example.org/x/y.png?w=800";
        assert_eq!(normalize(url, PAGE), url);
        assert_eq!(normalize("HTTP://A.B/c.jpg", PAGE), "HTTP://A.B/c.jpg");
    }

    #[test]
    fn bare_relative_joins_with_single_slash() {
        assert_eq!(
            normalize("media/a.jpg", PAGE),
            "https://shop.example.com/media/a.jpg"
        );
        assert_eq!(
            normalize("./media/a.jpg", PAGE),
            "https://shop.example.com/media/a.jpg"
        );
    }

    #[test]
    fn unparseable_page_url_leaves_candidate_alone() {
        assert_eq!(normalize(" /a.jpg ", "not a url"), "/a.jpg");
    }

    #[test]
    fn srcset_picks_widest_entry() {
        let best = best_srcset_candidate(
            "/s.jpg 320w, /l.jpg 1280w, /m.jpg 640w",
        )
        .unwrap();
        assert_eq!(best.url, "/l.jpg");
        assert_eq!(best.width, Some(1280));
    }

    #[test]
    fn srcset_without_widths_keeps_first() {
        let best = best_srcset_candidate("/a.jpg 1x, /b.jpg 2x").unwrap();
        assert_eq!(best.url, "/a.jpg");
        assert_eq!(best.width, None);
        assert!(best_srcset_candidate("  ").is_none());
    }

    #[test]
    fn skip_list_matches_case_insensitively() {
        assert!(is_skipped("https://x.com/static/LOGO.png"));
        assert!(is_skipped("https://x.com/img/promo-banner.jpg"));
        assert!(!is_skipped("https://cdn.x.com/products/shirt-1.jpg"));
    }
}
