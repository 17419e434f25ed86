use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::custom::CustomExtractor;
use crate::error::PageError;
use crate::extract::ProductFields;
use crate::page::{ProductPage, select_all};
use crate::price;

const STATE_MARKER: &str = "__PRODUCT_DETAIL_APP_INITIAL_STATE__";
const IMAGE_CDN: &str = "https://cdn.dsmcdn.com";

/// Trendyol product pages: reads the product-detail state the page embeds
/// for hydration instead of the rendered DOM
pub struct TrendyolExtractor;

#[async_trait]
impl CustomExtractor for TrendyolExtractor {
    fn name(&self) -> &'static str {
        "trendyol"
    }

    async fn extract(
        &self,
        page: &dyn ProductPage,
        _page_url: &str,
    ) -> Result<ProductFields, PageError> {
        let scripts = select_all(page, "script").await?;
        let state = scripts.iter().find_map(|s| embedded_state(&s.text));

        Ok(match state {
            Some(state) => from_state(&state),
            None => {
                debug!("No {} on page", STATE_MARKER);
                ProductFields::default()
            }
        })
    }
}

/// Parse the JSON object assigned to the state marker, ignoring what follows it
fn embedded_state(script: &str) -> Option<Value> {
    let start = script.find(STATE_MARKER)? + STATE_MARKER.len();
    let rest = script[start..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();

    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) if value.is_object() => Some(value),
        Some(Err(e)) => {
            debug!("Unparseable {}: {}", STATE_MARKER, e);
            None
        }
        _ => None,
    }
}

fn from_state(state: &Value) -> ProductFields {
    let product = &state["product"];
    let amount = |key: &str| {
        let field = &product["price"][key];
        let value = match field.get("value") {
            Some(v) => v.as_f64(),
            None => field.as_f64(),
        };
        value.filter(|v| *v > 0.0)
    };

    let selling = amount("discountedPrice").or_else(|| amount("sellingPrice"));
    let original = amount("originalPrice")
        .zip(selling)
        .filter(|(orig, sell)| orig > sell && !price::same_amount(*orig, *sell))
        .map(|(orig, _)| orig);

    let images: Vec<String> = product["images"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(cdn_url)
                .collect()
        })
        .unwrap_or_default();

    ProductFields {
        title: non_empty(&product["name"]),
        price: selling,
        original_price: original,
        discount_message: non_empty(&product["campaign"]["name"]),
        image: images.first().cloned(),
        images,
        brand: non_empty(&product["brand"]["name"]),
    }
}

/// Image paths in the state are relative to the CDN host
fn cdn_url(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("//") {
        path.to_string()
    } else {
        format!("{}/{}", IMAGE_CDN, path.trim_start_matches('/'))
    }
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
