use async_trait::async_trait;

use super::custom::CustomExtractor;
use crate::error::PageError;
use crate::extract::{ProductFields, element_value};
use crate::image_url;
use crate::page::{ProductPage, select_all};
use crate::price;

const TITLE_SELECTORS: &[&str] = &["h1.product-detail-info__header-name", "h1"];

const CURRENT_PRICE_SELECTORS: &[&str] = &[
    ".price-current__amount .money-amount__main",
    ".price__amount--on-sale .money-amount__main",
    ".price__amount-current",
    ".money-amount__main",
];

const OLD_PRICE_SELECTORS: &[&str] = &[
    ".price-old__amount .money-amount__main",
    ".price__amount--old .money-amount__main",
    ".price__amount-old",
];

const DISCOUNT_SELECTORS: &[&str] = &[
    ".price-current__discount-percentage",
    ".price__discount-percentage",
];

const MEDIA_SELECTOR: &str = "picture.media-image source, picture.media-image img";

/// Zara serves srcsets as width templates: `...jpg?ts=1&w={width}`
const WIDTH_PLACEHOLDER: &str = "{width}";
const TEMPLATE_WIDTH: &str = "1920";

/// Zara storefronts: price blocks and templated `<picture>` sources
pub struct ZaraExtractor;

#[async_trait]
impl CustomExtractor for ZaraExtractor {
    fn name(&self) -> &'static str {
        "zara"
    }

    async fn extract(
        &self,
        page: &dyn ProductPage,
        page_url: &str,
    ) -> Result<ProductFields, PageError> {
        let mut fields = ProductFields {
            title: first_text(page, TITLE_SELECTORS).await?,
            discount_message: first_text(page, DISCOUNT_SELECTORS).await?,
            brand: Some("ZARA".to_string()),
            ..Default::default()
        };

        let current = first_price(page, CURRENT_PRICE_SELECTORS).await?;
        if let Some(current) = current {
            fields.price = Some(current);
            fields.original_price = first_price(page, OLD_PRICE_SELECTORS)
                .await?
                .filter(|old| *old > current && !price::same_amount(*old, current));
        }

        let mut images = Vec::new();
        for el in select_all(page, MEDIA_SELECTOR).await? {
            let source = el
                .attribute("srcset")
                .and_then(image_url::best_srcset_candidate)
                .map(|c| c.url)
                .or_else(|| el.attribute("src").map(str::to_string));

            if let Some(source) = source.filter(|s| !s.starts_with("data:")) {
                let url = image_url::normalize(
                    &source.replace(WIDTH_PLACEHOLDER, TEMPLATE_WIDTH),
                    page_url,
                );
                if !images.contains(&url) {
                    images.push(url);
                }
            }
        }
        fields.image = images.first().cloned();
        fields.images = images;

        Ok(fields)
    }
}

async fn first_text(page: &dyn ProductPage, selectors: &[&str]) -> Result<Option<String>, PageError> {
    for selector in selectors {
        if let Some(text) = select_all(page, selector).await?.iter().find_map(element_value) {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

async fn first_price(page: &dyn ProductPage, selectors: &[&str]) -> Result<Option<f64>, PageError> {
    for selector in selectors {
        let found = select_all(page, selector)
            .await?
            .iter()
            .filter_map(element_value)
            .find_map(|raw| price::parse_candidate(&raw));
        if let Some(token) = found {
            return Ok(Some(token.value));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::HtmlPage;

    #[tokio::test]
    async fn reads_price_blocks_and_templated_sources() {
        let page = HtmlPage::from_html(
            r#"<html><body>
              <h1 class="product-detail-info__header-name">Keten Karışımlı Gömlek</h1>
              <div class="price-old__amount"><span class="money-amount__main">1.590,00 TL</span></div>
              <div class="price-current__amount"><span class="money-amount__main">1.290,00 TL</span></div>
              <span class="price-current__discount-percentage">-19%</span>
              <picture class="media-image">
                <source srcset="https://static.zara.net/photos/g1.jpg?w={width} 1x">
                <img src="https://static.zara.net/photos/g1-small.jpg">
              </picture>
            </body></html>"#,
        );

        let fields = ZaraExtractor
            .extract(&page, "https://www.zara.com/tr/tr/gomlek-p1.html")
            .await
            .unwrap();

        assert_eq!(fields.title.as_deref(), Some("Keten Karışımlı Gömlek"));
        assert_eq!(fields.price, Some(1290.0));
        assert_eq!(fields.original_price, Some(1590.0));
        assert_eq!(fields.discount_message.as_deref(), Some("-19%"));
        assert_eq!(fields.brand.as_deref(), Some("ZARA"));
        assert_eq!(
            fields.image.as_deref(),
            Some("https://static.zara.net/photos/g1.jpg?w=1920")
        );
        assert_eq!(fields.images.len(), 2);
    }

    #[tokio::test]
    async fn leaves_price_empty_without_price_blocks() {
        let page = HtmlPage::from_html("<html><body><h1>Ceket</h1></body></html>");
        let fields = ZaraExtractor
            .extract(&page, "https://www.zara.com/tr/tr/ceket-p2.html")
            .await
            .unwrap();
        assert_eq!(fields.title.as_deref(), Some("Ceket"));
        assert_eq!(fields.price, None);
        assert!(fields.images.is_empty());
    }
}
