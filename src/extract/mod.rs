//! Extraction cascade
//!
//! Runs the extraction tiers against one loaded page, in precedence order:
//!
//! 1. structured data (JSON-LD `Product`, then Open Graph / meta tags)
//! 2. the site profile's custom extractor, if any
//! 3. profile selectors, then generic DOM heuristics, then a currency regex
//!
//! Each tier only fills fields that are still empty. A value, once set, is
//! frozen for the rest of the cascade.

pub mod generic;
pub mod images;
pub mod structured;

use tracing::debug;

use crate::error::PageError;
use crate::page::{Element, ProductPage};
use crate::profiles::SiteProfile;

/// Partially extracted product data, before normalization and validation
///
/// Prices are already numeric; images are raw candidates, resolved to absolute
/// URLs only at assembly time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFields {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_message: Option<String>,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub brand: Option<String>,
}

impl ProductFields {
    /// Copy every field of `other` that is still empty here
    ///
    /// `price` and `original_price` move as a unit: a crossed-out price from
    /// one tier is never paired with a current price from another.
    /// Gallery images are appended. Returns the names of the fields filled.
    pub fn fill_missing(&mut self, other: ProductFields) -> Vec<&'static str> {
        let mut filled = Vec::new();

        if self.title.is_none() && other.title.is_some() {
            self.title = other.title;
            filled.push("title");
        }
        if self.price.is_none() && other.price.is_some() {
            self.price = other.price;
            self.original_price = other.original_price;
            filled.push("price");
        }
        if self.discount_message.is_none() && other.discount_message.is_some() {
            self.discount_message = other.discount_message;
            filled.push("discount_message");
        }
        if self.image.is_none() && other.image.is_some() {
            self.image = other.image;
            filled.push("image");
        }
        if self.brand.is_none() && other.brand.is_some() {
            self.brand = other.brand;
            filled.push("brand");
        }
        self.images.extend(other.images);

        filled
    }

    /// Required fields (title, price, image) that are still empty
    pub fn missing_required(&self) -> Vec<&'static str> {
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
        missing
    }
}

/// Run the full cascade against a loaded page
pub async fn extract_product(
    page: &dyn ProductPage,
    page_url: &str,
    profile: Option<&SiteProfile>,
) -> Result<ProductFields, PageError> {
    let mut fields = structured::extract(page).await?;
    debug!(
        "Structured data supplied: title={} price={} image={}",
        fields.title.is_some(),
        fields.price.is_some(),
        fields.image.is_some()
    );

    if let Some(custom) = profile.and_then(|p| p.custom_extractor.as_ref()) {
        let custom_fields = custom.extract(page, page_url).await?;
        let filled = fields.fill_missing(custom_fields);
        debug!("Custom extractor '{}' filled {:?}", custom.name(), filled);
    }

    generic::fill(page, page_url, profile, &mut fields).await?;
    Ok(fields)
}

/// Usable value of an element: `content` for meta tags, otherwise its text
/// (falling back to a `content` attribute, as microdata spans carry)
pub(crate) fn element_value(el: &Element) -> Option<String> {
    let value = if el.tag == "meta" {
        el.attribute("content")
    } else {
        Some(el.text_content())
            .filter(|t| !t.is_empty())
            .or_else(|| el.attribute("content"))
    }?;

    let collapsed = collapse_whitespace(value);
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Collapse runs of whitespace into single spaces and trim
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_missing_never_overwrites() {
        let mut base = ProductFields {
            title: Some("JSON-LD TITLE".into()),
            images: vec!["a.jpg".into()],
            ..Default::default()
        };
        let later = ProductFields {
            title: Some("DOM TITLE".into()),
            price: Some(120.0),
            original_price: Some(150.0),
            image: Some("b.jpg".into()),
            images: vec!["b.jpg".into()],
            ..Default::default()
        };

        let filled = base.fill_missing(later);
        assert_eq!(filled, vec!["price", "image"]);
        assert_eq!(base.title.as_deref(), Some("JSON-LD TITLE"));
        assert_eq!(base.original_price, Some(150.0));
        assert_eq!(base.images, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn price_and_original_move_together() {
        let mut base = ProductFields {
            price: Some(99.0),
            ..Default::default()
        };
        base.fill_missing(ProductFields {
            price: Some(80.0),
            original_price: Some(120.0),
            ..Default::default()
        });
        assert_eq!(base.price, Some(99.0));
        assert_eq!(base.original_price, None);
    }

    #[test]
    fn missing_required_lists_gaps() {
        let fields = ProductFields {
            title: Some("X".into()),
            ..Default::default()
        };
        assert_eq!(fields.missing_required(), vec!["price", "image"]);
    }

    #[test]
    fn element_value_prefers_meta_content() {
        let mut meta = Element {
            tag: "meta".into(),
            ..Default::default()
        };
        meta.attributes.insert("content".into(), "  Nike  ".into());
        assert_eq!(element_value(&meta).as_deref(), Some("Nike"));

        let span = Element {
            tag: "span".into(),
            text: "\n  Sepette   %10  indirim \n".into(),
            ..Default::default()
        };
        assert_eq!(element_value(&span).as_deref(), Some("Sepette %10 indirim"));

        assert_eq!(element_value(&Element::default()), None);
    }
}
