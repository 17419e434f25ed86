//! Shared configuration constants for the scraper
//!
//! Default values and keyword lists used throughout the codebase to ensure
//! consistency and avoid magic numbers.

/// Chrome user agent string for stealth mode
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Attempts per scrape request before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed pause between failed attempts
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 2_000;

/// Settle wait after navigation when a profile sets none
pub const DEFAULT_WAIT_MS: u64 = 3_000;

/// Navigation timeout when a profile sets none
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// URL substrings that mark an image as page chrome rather than product media
///
/// Matched case-insensitively anywhere in the resolved URL.
pub const IMAGE_SKIP_KEYWORDS: &[&str] = &[
    "logo", "banner", "icon", "header", "footer", "ad", "promo", "campaign", "ads",
];

/// `alt` text fragments that mark an image as the product shot
pub const PRODUCT_ALT_KEYWORDS: &[&str] = &["product", "ürün", "resmi"];

/// Bonus for an image whose `alt` text names the product
pub const PRODUCT_ALT_SCORE: f64 = 100.0;

/// Minimum rendered edge for the last-resort `<img>` scan
pub const MIN_FALLBACK_IMAGE_EDGE: f64 = 150.0;

/// Title fragments served by bot walls and error pages (compared upper-cased)
pub const BOT_BLOCK_SIGNATURES: &[&str] = &[
    "ACCESS DENIED",
    "FORBIDDEN",
    "BOT DETECTED",
    "ATTENTION REQUIRED",
    "JUST A MOMENT",
    "ARE YOU A ROBOT",
    "ARE YOU HUMAN",
    "CAPTCHA",
    "REQUEST BLOCKED",
];

/// Plausible range for a price scraped from free DOM text
pub const PRICE_SANITY_MIN: f64 = 10.0;
pub const PRICE_SANITY_MAX: f64 = 100_000.0;

/// Currency suffix used by the canonical price format
pub const CURRENCY_SUFFIX: &str = "TL";

/// Scroll the page halfway so lazily-loaded gallery images get real sources
pub const LAZY_LOAD_SCRIPT: &str =
    "window.scrollTo(0, Math.floor(document.body.scrollHeight / 2)); true";
