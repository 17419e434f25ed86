//! Host and registrable-domain helpers

use url::Url;

/// Second-level labels that form a compound public suffix with a ccTLD
/// (`com.tr`, `co.uk`, `net.au`, ...)
const COMPOUND_SECOND_LEVEL: &[&str] = &[
    "com", "co", "net", "org", "gov", "edu", "gen", "biz", "web", "bel", "av", "tv", "k12",
];

/// Lower-cased host of `url`, if it has one
pub fn host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
}

/// Host with a leading `www.` removed (`www.zara.com` → `zara.com`)
pub fn registrable_domain(url: &str) -> Option<String> {
    host(url).map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
}

/// Brand-like token derived from the domain, upper-cased
///
/// `flyingtiger.com` → `FLYINGTIGER`, `shop.example.com.tr` → `EXAMPLE`.
pub fn brand_token(url: &str) -> Option<String> {
    let domain = registrable_domain(url)?;
    let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();

    let label = match labels.as_slice() {
        [] => return None,
        [only] => *only,
        [.., sld, tld]
            if labels.len() >= 3 && tld.len() == 2 && COMPOUND_SECOND_LEVEL.contains(sld) =>
        {
            labels[labels.len() - 3]
        }
        [.., name, _tld] => *name,
    };

    Some(label.to_uppercase())
}
