mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{ScriptedLoader, TimeoutLoader, init_tracing, scraper};
use kodegen_tools_product_scraper::{
    CustomExtractor, ExtractorCatalog, FailureKind, PageError, ProductFields, ProductPage,
    SelectorSet, SiteProfile, SiteRegistry,
};
use tokio_util::sync::CancellationToken;

const OG_PAGE: &str = r#"<html><head>
    <title>Ürün X | Example Store</title>
    <meta property="og:title" content="Ürün X">
    <meta property="og:image" content="//cdn.x.com/i.jpg">
</head><body>
    <h1>Something else</h1>
    <span class="price">1.299,99 TL</span>
</body></html>"#;

const NO_IMAGE_PAGE: &str = r#"<html><head><title>Kupa</title></head><body>
    <h1>Kupa</h1><span class="price">249,90 TL</span>
</body></html>"#;

const BLOCKED_PAGE: &str = r#"<html><head><title>Access Denied</title></head><body>
    <h1>Access Denied</h1><span class="price">249,90 TL</span>
    <img src="/p/kupa.jpg" width="800" height="800">
</body></html>"#;

#[tokio::test]
async fn open_graph_page_end_to_end() {
    init_tracing();
    let loader = ScriptedLoader::always(OG_PAGE);
    let scraper = scraper(loader.clone(), SiteRegistry::empty());

    let result = scraper.scrape("https://www.example.com/p/1").await.unwrap();

    assert_eq!(result.title.as_deref(), Some("ÜRÜN X"));
    assert_eq!(result.image.as_deref(), Some("https://cdn.x.com/i.jpg"));
    assert_eq!(result.price.as_deref(), Some("1.299,99 TL"));
    assert_eq!(result.original_price, None);
    assert_eq!(result.brand.as_deref(), Some("EXAMPLE"));
    assert_eq!(result.images[0], "https://cdn.x.com/i.jpg");
    assert_eq!(result.url, "https://www.example.com/p/1");
    assert_eq!(loader.calls(), 1);
}

#[tokio::test]
async fn json_ld_title_beats_dom_title() {
    let page = r#"<html><head>
        <script type="application/ld+json">
          {"@context": "https://schema.org", "@type": "Product", "name": "Json Title",
           "image": "https://cdn.shop.com/p/1.jpg",
           "offers": {"@type": "Offer", "price": "349.90", "priceCurrency": "TRY"}}
        </script>
    </head><body><h1>Dom Title</h1><span class="price">999,00 TL</span></body></html>"#;

    let scraper = scraper(ScriptedLoader::always(page), SiteRegistry::empty());
    let result = scraper.scrape("https://shop.com/p/1").await.unwrap();

    assert_eq!(result.title.as_deref(), Some("JSON TITLE"));
    assert_eq!(result.price.as_deref(), Some("349,90 TL"));
}

#[tokio::test]
async fn empty_json_ld_image_falls_through_to_gallery() {
    let page = r#"<html><head>
        <script type="application/ld+json">
          {"@type": "Product", "name": "Kupa",
           "image": {"@type": "ImageObject", "url": ""},
           "offers": {"@type": "Offer", "price": "249.90"}}
        </script>
    </head><body>
        <div class="product-gallery"><img src="/media/kupa-1.jpg" alt="Ürün resmi"></div>
    </body></html>"#;

    let scraper = scraper(ScriptedLoader::always(page), SiteRegistry::empty());
    let result = scraper.scrape("https://shop.com/p/1").await.unwrap();

    assert_eq!(result.image.as_deref(), Some("https://shop.com/media/kupa-1.jpg"));
    assert_eq!(result.price.as_deref(), Some("249,90 TL"));
}

/// Fills only the price, leaving everything else to the generic tiers
struct PriceOnly;

#[async_trait]
impl CustomExtractor for PriceOnly {
    fn name(&self) -> &'static str {
        "price_only"
    }

    async fn extract(
        &self,
        _page: &dyn ProductPage,
        _page_url: &str,
    ) -> Result<ProductFields, PageError> {
        Ok(ProductFields {
            price: Some(150.0),
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn custom_price_is_kept_and_generic_tiers_fill_image() {
    let page = r#"<html><body>
        <h1>Seramik Kupa</h1>
        <span class="price">999,00 TL</span>
        <div class="product-gallery"><img src="/media/kupa-1.jpg" alt="Ürün resmi"></div>
    </body></html>"#;

    let registry =
        SiteRegistry::empty().with_profile(SiteProfile::new("shop.com").with_custom_extractor(Arc::new(PriceOnly)));
    let scraper = scraper(ScriptedLoader::always(page), registry);

    let result = scraper.scrape("https://www.shop.com/kupa").await.unwrap();
    assert_eq!(result.price.as_deref(), Some("150,00 TL"));
    assert_eq!(result.image.as_deref(), Some("https://www.shop.com/media/kupa-1.jpg"));
    assert_eq!(result.title.as_deref(), Some("SERAMIK KUPA"));
}

#[tokio::test]
async fn profile_selectors_run_before_generic_ones() {
    let page = r#"<html><body>
        <h1>Generic heading</h1>
        <h2 class="pdp-name">Profile Name</h2>
        <div class="pdp-price">89,90 TL</div>
        <span class="price">12,00 TL</span>
        <div class="pdp-media"><img src="/m/1.jpg"></div>
    </body></html>"#;

    let selectors = SelectorSet {
        title: vec!["h2.pdp-name".into()],
        price: vec![".pdp-price".into()],
        image: vec![".pdp-media img".into()],
        brand: vec!["Pdp Brand".into()],
        ..Default::default()
    };
    let registry = SiteRegistry::empty().with_profile(SiteProfile::new("pdp.com").with_selectors(selectors));
    let scraper = scraper(ScriptedLoader::always(page), registry);

    let result = scraper.scrape("https://pdp.com/p/9").await.unwrap();
    assert_eq!(result.title.as_deref(), Some("PROFILE NAME"));
    assert_eq!(result.price.as_deref(), Some("89,90 TL"));
    assert_eq!(result.image.as_deref(), Some("https://pdp.com/m/1.jpg"));
    assert_eq!(result.brand.as_deref(), Some("Pdp Brand"));
}

#[tokio::test]
async fn incomplete_extraction_is_retried() {
    let complete = r#"<html><body>
        <h1>Kupa</h1><span class="price">249,90 TL</span>
        <img src="/p/kupa.jpg" width="800" height="800">
    </body></html>"#;
    let loader = ScriptedLoader::new(&[NO_IMAGE_PAGE, complete]);
    let scraper = scraper(loader.clone(), SiteRegistry::empty());

    let result = scraper.scrape("https://kupa.com/p/1").await.unwrap();
    assert_eq!(result.image.as_deref(), Some("https://kupa.com/p/kupa.jpg"));
    assert_eq!(loader.calls(), 2);
}

#[tokio::test]
async fn bot_wall_exhausts_all_attempts() {
    let loader = ScriptedLoader::always(BLOCKED_PAGE);
    let scraper = scraper(loader.clone(), SiteRegistry::empty());

    let failure = scraper.scrape("https://kupa.com/p/1").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Exhausted);
    assert_eq!(failure.attempts, 3);
    assert!(failure.reason.contains("Bot-block"), "{}", failure.reason);
    assert_eq!(loader.calls(), 3);
}

#[tokio::test]
async fn timeouts_stop_after_exactly_three_attempts() {
    let loader = Arc::new(TimeoutLoader::default());
    let scraper = scraper(loader.clone(), SiteRegistry::empty());

    let failure = scraper.scrape("https://slow.com/p/1").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Exhausted);
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.domain.as_deref(), Some("slow.com"));
    assert!(failure.reason.contains("timeout"), "{}", failure.reason);
    assert_eq!(loader.calls(), 3);
}

#[tokio::test]
async fn invalid_urls_make_no_attempt() {
    let loader = ScriptedLoader::always(OG_PAGE);
    let scraper = scraper(loader.clone(), SiteRegistry::empty());

    for url in ["", "/p/1", "mailto:shop@example.com"] {
        let failure = scraper.scrape(url).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidUrl);
        assert_eq!(failure.attempts, 0);
    }
    assert_eq!(loader.calls(), 0);
}

#[tokio::test]
async fn cancelled_token_stops_before_first_attempt() {
    let loader = ScriptedLoader::always(OG_PAGE);
    let scraper = scraper(loader.clone(), SiteRegistry::empty());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let failure = scraper
        .scrape_with_cancel("https://www.example.com/p/1", &cancel)
        .await
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(failure.attempts, 0);
    assert_eq!(loader.calls(), 0);
}

#[tokio::test]
async fn batch_results_keep_input_order() {
    let loader = ScriptedLoader::always(OG_PAGE);
    let scraper = scraper(loader, SiteRegistry::empty());

    let urls = vec![
        "https://www.example.com/p/1".to_string(),
        "not a url".to_string(),
        "https://www.example.com/p/2".to_string(),
    ];
    let results = scraper.scrape_many(&urls).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().url, urls[0]);
    assert_eq!(results[1].as_ref().unwrap_err().kind, FailureKind::InvalidUrl);
    assert_eq!(results[2].as_ref().unwrap().url, urls[2]);
}

#[tokio::test]
async fn yaml_profile_file_drives_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.yaml");
    std::fs::write(
        &path,
        "profiles:\n  kupa.com:\n    selectors:\n      image: ['.hero img']\n      brand: ['Kupa Atölyesi']\n    wait_time_ms: 0\n",
    )
    .unwrap();

    let registry = SiteRegistry::from_file(&path, &ExtractorCatalog::builtin()).unwrap();
    let page = r#"<html><body>
        <h1>Kupa</h1><span class="price">249,90 TL</span>
        <div class="hero"><img data-src="/hero/kupa.jpg" src="/placeholder.gif"></div>
    </body></html>"#;
    let scraper = scraper(ScriptedLoader::always(page), registry);

    let result = scraper.scrape("https://kupa.com/p/1").await.unwrap();
    assert_eq!(result.image.as_deref(), Some("https://kupa.com/hero/kupa.jpg"));
    assert_eq!(result.brand.as_deref(), Some("Kupa Atölyesi"));
}
