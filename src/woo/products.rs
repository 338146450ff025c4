use crate::config::ShopConfig;
use crate::woo::{MediaId, ProductDirectory, WooError, ensure_success};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const SEO_TITLE_KEYS: &[&str] = &["_yoast_wpseo_title", "rank_math_title"];
const SEO_DESCRIPTION_KEYS: &[&str] = &["_yoast_wpseo_metadesc", "rank_math_description"];

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub meta_data: Vec<MetaEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductImage {
    pub id: MediaId,
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Product {
    pub fn seo_title(&self) -> Option<&str> {
        self.meta_text(SEO_TITLE_KEYS)
    }

    pub fn seo_description(&self) -> Option<&str> {
        self.meta_text(SEO_DESCRIPTION_KEYS)
    }

    // Unrendered `%%title%%`-style templates are useless as captions.
    fn meta_text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.meta_data
                .iter()
                .find(|entry| entry.key == *key)
                .and_then(|entry| entry.value.as_str())
                .map(str::trim)
                .filter(|value| !value.is_empty() && !value.contains("%%"))
        })
    }
}

#[derive(Serialize)]
struct ImagesUpdate<'a> {
    images: Vec<ImageRef<'a>>,
}

#[derive(Serialize)]
struct ImageRef<'a> {
    id: &'a MediaId,
}

#[derive(Debug, Clone)]
pub struct WooProductsClient {
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    http: Client,
}

impl WooProductsClient {
    pub fn new(http: Client, shop: &ShopConfig) -> Self {
        Self {
            base_url: shop.base_url.clone(),
            consumer_key: shop.consumer_key.clone(),
            consumer_secret: shop.consumer_secret.clone(),
            http,
        }
    }

    fn products_url(&self) -> String {
        format!("{}/wp-json/wc/v3/products", self.base_url)
    }
}

#[async_trait]
impl ProductDirectory for WooProductsClient {
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, WooError> {
        let response = self
            .http
            .get(self.products_url())
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .query(&[("sku", sku)])
            .send()
            .await
            .map_err(|err| WooError::Request(err.to_string()))?;
        let response = ensure_success(response).await?;

        let products: Vec<Product> = response
            .json()
            .await
            .map_err(|err| WooError::Deserialize(err.to_string()))?;
        debug!(target: "sync.woo", sku, matches = products.len(), "product_lookup");
        Ok(products.into_iter().next())
    }

    async fn replace_images(&self, product_id: u64, media_ids: &[MediaId]) -> Result<(), WooError> {
        let payload = ImagesUpdate {
            images: media_ids.iter().map(|id| ImageRef { id }).collect(),
        };
        let response = self
            .http
            .put(format!("{}/{}", self.products_url(), product_id))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .json(&payload)
            .send()
            .await
            .map_err(|err| WooError::Request(err.to_string()))?;
        ensure_success(response).await?;
        Ok(())
    }
}
