use crate::config::ShopConfig;
use crate::woo::products::Product;
use crate::woo::{MediaLibrary, WooError, ensure_success};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{
    Client,
    header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub type MediaId = u64;

/// Title, alt text and description written onto an uploaded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaCaption {
    pub title: String,
    pub alt_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MediaCaption {
    /// SEO title/description from the product, falling back to its name
    /// and a generated description.
    pub fn for_product(product: &Product, sku: &str) -> Self {
        let title = product
            .seo_title()
            .unwrap_or(product.name.as_str())
            .to_string();
        let description = product
            .seo_description()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} - product photo (SKU {sku})", product.name));
        Self {
            alt_text: title.clone(),
            title,
            description: Some(description),
        }
    }

    pub fn plain(product_name: &str) -> Self {
        Self {
            title: product_name.to_string(),
            alt_text: product_name.to_string(),
            description: None,
        }
    }
}

pub fn content_type_for(extension: &str) -> String {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    }
}

/// Non-ASCII names go through the RFC 5987 `filename*` form.
fn content_disposition(file_name: &str) -> String {
    let plain = file_name
        .chars()
        .all(|c| (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ');
    if plain {
        format!("attachment; filename=\"{file_name}\"")
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            urlencoding::encode(file_name)
        )
    }
}

#[derive(Deserialize)]
struct CreatedMedia {
    id: MediaId,
}

#[derive(Debug, Clone)]
pub struct WpMediaClient {
    base_url: String,
    authorization: String,
    http: Client,
}

impl WpMediaClient {
    pub fn new(http: Client, shop: &ShopConfig) -> Self {
        let raw = format!("{}:{}", shop.media_user, shop.media_password);
        Self {
            base_url: shop.base_url.clone(),
            authorization: format!("Basic {}", BASE64.encode(raw)),
            http,
        }
    }

    fn media_url(&self) -> String {
        format!("{}/wp-json/wp/v2/media", self.base_url)
    }
}

#[async_trait]
impl MediaLibrary for WpMediaClient {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<MediaId, WooError> {
        let size = body.len();
        let response = self
            .http
            .post(self.media_url())
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_DISPOSITION, content_disposition(file_name))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|err| WooError::Request(err.to_string()))?;
        let response = ensure_success(response).await?;
        let created: CreatedMedia = response
            .json()
            .await
            .map_err(|err| WooError::Deserialize(err.to_string()))?;
        debug!(target: "sync.woo", file_name, size, media_id = created.id, "media_created");
        Ok(created.id)
    }

    async fn update_caption(&self, id: MediaId, caption: &MediaCaption) -> Result<(), WooError> {
        let response = self
            .http
            .post(format!("{}/{}", self.media_url(), id))
            .header(AUTHORIZATION, &self.authorization)
            .json(caption)
            .send()
            .await
            .map_err(|err| WooError::Request(err.to_string()))?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, id: MediaId) -> Result<(), WooError> {
        let response = self
            .http
            .delete(format!("{}/{}", self.media_url(), id))
            .header(AUTHORIZATION, &self.authorization)
            .query(&[("force", "true")])
            .send()
            .await
            .map_err(|err| WooError::Request(err.to_string()))?;
        ensure_success(response).await?;
        Ok(())
    }
}
