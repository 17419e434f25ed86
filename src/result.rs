//! Result assembly and validation
//!
//! Turns the cascade's [`ProductFields`] into the public [`ExtractionResult`]:
//! prices formatted, images resolved, title cleaned. Validity is checked
//! here too, and terminal failures are described by [`ScrapeFailure`].

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AttemptError, PageError};
use crate::extract::{ProductFields, collapse_whitespace};
use crate::image_url;
use crate::price;
use crate::utils::constants::BOT_BLOCK_SIGNATURES;

/// Product data extracted from one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Cleaned, upper-cased product name
    pub title: Option<String>,
    /// Current price, formatted `1.299,99 TL`
    pub price: Option<String>,
    /// Pre-discount price, only when higher than `price`
    pub original_price: Option<String>,
    pub discount_message: Option<String>,
    /// Absolute URL of the primary image
    pub image: Option<String>,
    /// Every image found, primary first, no duplicates
    pub images: Vec<String>,
    pub brand: Option<String>,
    /// The input URL, unmodified
    pub url: String,
}

impl ExtractionResult {
    /// Normalize raw cascade output for `url`
    pub fn assemble(fields: ProductFields, url: &str) -> Self {
        let brand = fields
            .brand
            .map(|b| collapse_whitespace(&b))
            .filter(|b| !b.is_empty());

        let title = fields
            .title
            .map(|t| clean_title(&t, brand.as_deref()))
            .filter(|t| !t.is_empty());

        let original_price = match (fields.price, fields.original_price) {
            (Some(current), Some(original))
                if original > current && !price::same_amount(original, current) =>
            {
                Some(price::format(original))
            }
            _ => None,
        };

        let resolve = |raw: &String| {
            if raw.trim().is_empty() {
                return None;
            }
            let resolved = image_url::normalize(raw, url);
            (!resolved.is_empty() && !resolved.starts_with("data:")).then_some(resolved)
        };
        let image = fields.image.as_ref().and_then(resolve);

        let mut seen = HashSet::new();
        let images = image
            .iter()
            .cloned()
            .chain(fields.images.iter().filter_map(resolve))
            .filter(|u| seen.insert(u.clone()))
            .collect();

        Self {
            title,
            price: fields.price.map(price::format),
            original_price,
            discount_message: fields
                .discount_message
                .map(|d| collapse_whitespace(&d))
                .filter(|d| !d.is_empty()),
            image,
            images,
            brand,
            url: url.to_string(),
        }
    }

    /// Title, price and image present, and the title is not a bot wall
    pub fn is_valid(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !is_bot_block_title(t))
            && self.price.is_some()
            && self.image.is_some()
    }

    /// The result itself when valid, otherwise why the attempt failed
    pub fn validate(self) -> Result<Self, AttemptError> {
        if let Some(title) = self.title.as_deref().filter(|t| is_bot_block_title(t)) {
            return Err(PageError::Blocked(title.to_string()).into());
        }

        let mut missing = Vec::new();
        if self.title.is_none() {
            missing.push("title");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        if self.image.is_none() {
            missing.push("image");
        }

        if missing.is_empty() {
            Ok(self)
        } else {
            Err(AttemptError::IncompleteExtraction { missing })
        }
    }
}

/// Whether a page or product title is a bot wall / error page
pub fn is_bot_block_title(title: &str) -> bool {
    let upper = title.to_uppercase();
    BOT_BLOCK_SIGNATURES.iter().any(|sig| upper.contains(sig))
}

/// Strip store suffixes and stray punctuation, then upper-case
///
/// `"Keten Gömlek | Zara Türkiye"` → `"KETEN GÖMLEK"`. A trailing
/// `" - <store>"` segment is dropped only when it names `store`, since
/// product names themselves use `" - "`.
pub fn clean_title(raw: &str, store: Option<&str>) -> String {
    let mut title = raw.split(" | ").next().unwrap_or(raw).trim();

    if let Some(store) = store.map(str::trim).filter(|s| !s.is_empty()) {
        if let Some((head, tail)) = title.rsplit_once(" - ") {
            if tail.trim().to_lowercase() == store.to_lowercase() {
                title = head;
            }
        }
    }

    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "-&+/%'".contains(*c))
        .collect();

    collapse_whitespace(&kept).to_uppercase()
}

/// How a scrape ended without a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every attempt failed
    Exhausted,
    /// Cancelled by the caller between attempts
    Cancelled,
    /// Not an absolute http(s) URL; no attempt was made
    InvalidUrl,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Exhausted => "attempts exhausted",
            FailureKind::Cancelled => "cancelled",
            FailureKind::InvalidUrl => "invalid URL",
        };
        f.write_str(label)
    }
}

/// Terminal failure of one scrape request
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Scrape of {url} failed ({kind}) after {attempts} attempt(s): {reason}")]
pub struct ScrapeFailure {
    pub url: String,
    pub domain: Option<String>,
    pub kind: FailureKind,
    /// Reason the last attempt failed
    pub reason: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl ScrapeFailure {
    pub fn new(url: &str, kind: FailureKind, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            domain: crate::domain::registrable_domain(url),
            kind,
            reason: reason.into(),
            attempts,
            timestamp: Utc::now(),
        }
    }
}
