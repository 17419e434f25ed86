//! Structured-data extraction
//!
//! Reads schema.org `Product` documents from
//! `<script type="application/ld+json">` blocks, then fills whatever is still
//! missing from Open Graph / product meta tags. Malformed blocks are skipped;
//! nothing in here fails on bad markup.

use serde_json::Value;
use tracing::debug;

use super::{ProductFields, collapse_whitespace};
use crate::error::PageError;
use crate::page::{Element, ProductPage, select_all};
use crate::price;

const JSON_LD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

/// Extract structured product data from a page
pub async fn extract(page: &dyn ProductPage) -> Result<ProductFields, PageError> {
    let scripts = select_all(page, JSON_LD_SELECTOR).await?;

    let mut fields = find_product(scripts.iter().map(|s| s.text.as_str()))
        .map(|product| from_json_ld(&product))
        .unwrap_or_default();

    let metas = select_all(page, "meta").await?;
    fields.fill_missing(from_meta(&metas));

    Ok(fields)
}

/// First `Product` in document order across all JSON-LD blocks
///
/// Each block is checked as a bare object, as an array of objects, and through
/// its `@graph` array.
pub fn find_product<'a>(blocks: impl IntoIterator<Item = &'a str>) -> Option<Value> {
    for (index, raw) in blocks.into_iter().enumerate() {
        let body = strip_wrappers(raw);
        if body.is_empty() {
            continue;
        }

        let doc: Value = match serde_json::from_str(body) {
            Ok(doc) => doc,
            Err(e) => {
                debug!("Skipping malformed JSON-LD block #{}: {}", index, e);
                continue;
            }
        };

        if let Some(product) = product_in(&doc) {
            return Some(product.clone());
        }
    }
    None
}

/// Remove HTML comment / CDATA guards some CMSes wrap around JSON-LD
fn strip_wrappers(raw: &str) -> &str {
    let mut body = raw.trim();
    for prefix in ["<!--", "//<![CDATA[", "<![CDATA["] {
        body = body.strip_prefix(prefix).unwrap_or(body).trim_start();
    }
    for suffix in ["-->", "//]]>", "]]>"] {
        body = body.strip_suffix(suffix).unwrap_or(body).trim_end();
    }
    body
}

fn product_in(doc: &Value) -> Option<&Value> {
    match doc {
        Value::Array(items) => items.iter().find_map(product_in),
        Value::Object(obj) => {
            if is_product(doc) {
                return Some(doc);
            }
            match obj.get("@graph") {
                Some(Value::Array(graph)) => graph.iter().find(|item| is_product(item)),
                Some(item @ Value::Object(_)) if is_product(item) => Some(item),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_product(value: &Value) -> bool {
    let type_matches = |t: &str| {
        let t = t
            .strip_prefix("https://schema.org/")
            .or_else(|| t.strip_prefix("http://schema.org/"))
            .unwrap_or(t);
        t == "Product"
    };

    match value.get("@type") {
        Some(Value::String(t)) => type_matches(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(type_matches),
        _ => false,
    }
}

/// Map a JSON-LD `Product` onto product fields
pub fn from_json_ld(product: &Value) -> ProductFields {
    let mut fields = ProductFields {
        title: product.get("name").and_then(text),
        brand: product.get("brand").and_then(brand_name),
        ..Default::default()
    };

    if let Some(offer) = product.get("offers").and_then(first_object) {
        let (price, original) = offer_prices(offer);
        fields.price = price;
        fields.original_price = original;
    }

    let images = product.get("image").map(image_urls).unwrap_or_default();
    fields.image = images.first().cloned();
    fields.images = images;

    fields
}

fn offer_prices(offer: &Value) -> (Option<f64>, Option<f64>) {
    let is_aggregate = offer
        .get("@type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.ends_with("AggregateOffer"));

    let price = offer
        .get("price")
        .and_then(json_price)
        .or_else(|| {
            offer
                .get("priceSpecification")
                .and_then(first_object)
                .and_then(|spec| spec.get("price"))
                .and_then(json_price)
        })
        .or_else(|| {
            is_aggregate
                .then(|| offer.get("lowPrice").and_then(json_price))
                .flatten()
        });

    let original = match (price, is_aggregate) {
        (Some(current), true) => offer
            .get("highPrice")
            .and_then(json_price)
            .filter(|high| *high > current && !price::same_amount(*high, current)),
        _ => None,
    };

    (price, original)
}

/// JSON-LD prices are trusted: no sanity range applies
fn json_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => price::parse(s),
        _ => None,
    }
}

fn first_object(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find(|v| v.is_object()),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn brand_name(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => text(value),
        Value::Object(obj) => obj.get("name").and_then(text),
        Value::Array(items) => items.iter().find_map(brand_name),
        _ => None,
    }
}

/// Image URLs from a string, an `ImageObject`, or an array of either
fn image_urls(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Object(obj) => ["url", "contentUrl"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        Value::Array(items) => items.iter().flat_map(image_urls).collect(),
        _ => Vec::new(),
    }
}

/// Map Open Graph / product meta tags onto product fields
///
/// When both `product:sale_price:amount` and `product:price:amount` are present
/// the sale price is current and the regular price is the original.
pub fn from_meta(metas: &[Element]) -> ProductFields {
    let lookup = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|key| {
            metas
                .iter()
                .find(|m| meta_key(m).is_some_and(|k| k.eq_ignore_ascii_case(key)))
                .and_then(|m| m.attribute("content"))
                .map(collapse_whitespace)
                .filter(|v| !v.is_empty())
        })
    };

    let regular = lookup(&["product:price:amount", "og:price:amount", "price"])
        .and_then(|raw| price::parse(&raw));
    let sale = lookup(&["product:sale_price:amount"]).and_then(|raw| price::parse(&raw));

    let (price, original_price) = match (sale, regular) {
        (Some(sale), Some(regular)) if regular > sale && !price::same_amount(sale, regular) => {
            (Some(sale), Some(regular))
        }
        (Some(sale), _) => (Some(sale), None),
        (None, regular) => (regular, None),
    };

    let images: Vec<String> = metas
        .iter()
        .filter(|m| {
            meta_key(m).is_some_and(|k| {
                k.eq_ignore_ascii_case("og:image") || k.eq_ignore_ascii_case("og:image:secure_url")
            })
        })
        .filter_map(|m| m.attribute("content").map(str::to_string))
        .collect();

    ProductFields {
        title: lookup(&["og:title"]),
        price,
        original_price,
        discount_message: None,
        image: images.first().cloned(),
        images,
        brand: lookup(&["product:brand", "og:brand", "brand"]),
    }
}

/// The key a meta tag is addressed by: `property`, `name` or `itemprop`
fn meta_key(meta: &Element) -> Option<&str> {
    meta.attribute("property")
        .or_else(|| meta.attribute("name"))
        .or_else(|| meta.attribute("itemprop"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(key_attr: &str, key: &str, content: &str) -> Element {
        let mut el = Element {
            tag: "meta".into(),
            ..Default::default()
        };
        el.attributes.insert(key_attr.into(), key.into());
        el.attributes.insert("content".into(), content.into());
        el
    }

    #[test]
    fn finds_product_directly_in_array_and_in_graph() {
        let direct = r#"{"@type": "Product", "name": "A"}"#;
        let array = r#"[{"@type": "BreadcrumbList"}, {"@type": "Product", "name": "B"}]"#;
        let graph = r#"{"@context": "https://schema.org", "@graph": [
            {"@type": "Organization", "name": "Org"},
            {"@type": ["Product", "Thing"], "name": "C"}
        ]}"#;

        assert_eq!(find_product([direct]).unwrap()["name"], "A");
        assert_eq!(find_product([array]).unwrap()["name"], "B");
        assert_eq!(find_product([graph]).unwrap()["name"], "C");
    }

    #[test]
    fn first_product_in_document_order_wins() {
        let first = r#"{"@type": "Product", "name": "First"}"#;
        let second = r#"{"@type": "Product", "name": "Second"}"#;
        assert_eq!(find_product([first, second]).unwrap()["name"], "First");
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let broken = r#"{"@type": "Product", "name": "Broken",,}"#;
        let good = r#"<!-- {"@type": "http://schema.org/Product", "name": "Good"} -->"#;
        assert_eq!(find_product([broken, "", good]).unwrap()["name"], "Good");
        assert!(find_product([broken]).is_none());
    }

    #[test]
    fn maps_offer_image_and_brand_shapes() {
        let product = json!({
            "@type": "Product",
            "name": "  Keten   Gömlek ",
            "brand": {"@type": "Brand", "name": "Mavi"},
            "image": [{"@type": "ImageObject", "url": "//cdn.x.com/1.jpg"}, "/2.jpg"],
            "offers": [{"@type": "Offer", "price": "1.299,99", "priceCurrency": "TRY"}]
        });

        let fields = from_json_ld(&product);
        assert_eq!(fields.title.as_deref(), Some("Keten Gömlek"));
        assert_eq!(fields.brand.as_deref(), Some("Mavi"));
        assert_eq!(fields.price, Some(1299.99));
        assert_eq!(fields.original_price, None);
        assert_eq!(fields.image.as_deref(), Some("//cdn.x.com/1.jpg"));
        assert_eq!(fields.images.len(), 2);
    }

    #[test]
    fn blank_image_urls_are_dropped() {
        let product = json!({
            "@type": "Product",
            "name": "Kupa",
            "image": [{"@type": "ImageObject", "url": "  "}, ""]
        });
        let fields = from_json_ld(&product);
        assert_eq!(fields.image, None);
        assert!(fields.images.is_empty());
    }

    #[test]
    fn aggregate_offer_supplies_high_price_as_original() {
        let product = json!({
            "@type": "Product",
            "offers": {"@type": "AggregateOffer", "lowPrice": 899.9, "highPrice": 1199.9}
        });
        let fields = from_json_ld(&product);
        assert_eq!(fields.price, Some(899.9));
        assert_eq!(fields.original_price, Some(1199.9));
    }

    #[test]
    fn plain_offer_ignores_high_price() {
        let product = json!({
            "@type": "Product",
            "offers": {"@type": "Offer", "price": 5, "highPrice": 9}
        });
        let fields = from_json_ld(&product);
        assert_eq!(fields.price, Some(5.0), "trusted prices skip the sanity range");
        assert_eq!(fields.original_price, None);
    }

    #[test]
    fn meta_tags_fill_title_image_price_and_brand() {
        let metas = vec![
            meta("property", "og:title", "ÜRÜN X"),
            meta("property", "og:image", "//cdn.x.com/i.jpg"),
            meta("property", "og:image", "//cdn.x.com/j.jpg"),
            meta("property", "product:price:amount", "1299.99"),
            meta("property", "product:brand", "Koton"),
        ];
        let fields = from_meta(&metas);
        assert_eq!(fields.title.as_deref(), Some("ÜRÜN X"));
        assert_eq!(fields.image.as_deref(), Some("//cdn.x.com/i.jpg"));
        assert_eq!(fields.images.len(), 2);
        assert_eq!(fields.price, Some(1299.99));
        assert_eq!(fields.brand.as_deref(), Some("Koton"));
    }

    #[test]
    fn meta_name_price_and_sale_price() {
        let metas = vec![
            meta("name", "price", "249,90"),
            meta("property", "product:sale_price:amount", "199,90"),
        ];
        let fields = from_meta(&metas);
        assert_eq!(fields.price, Some(199.9));
        assert_eq!(fields.original_price, Some(249.9));
    }
}
