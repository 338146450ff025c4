pub mod media;
pub mod products;

use crate::http::truncate_body;
use async_trait::async_trait;
use reqwest::Response;
use thiserror::Error;

pub use media::{MediaCaption, MediaId, WpMediaClient, content_type_for};
pub use products::{Product, WooProductsClient};

#[derive(Debug, Error)]
pub enum WooError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    Deserialize(String),
}

/// Product records on the commerce site.
#[async_trait]
pub trait ProductDirectory: Send + Sync {
    /// Zero or one product carrying exactly this SKU.
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, WooError>;

    /// Replaces the product's whole gallery; order is display order.
    async fn replace_images(&self, product_id: u64, media_ids: &[MediaId]) -> Result<(), WooError>;
}

/// Attachment library of the site the products live on.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<MediaId, WooError>;

    async fn update_caption(&self, id: MediaId, caption: &MediaCaption) -> Result<(), WooError>;

    /// Permanent delete, bypassing the trash.
    async fn delete(&self, id: MediaId) -> Result<(), WooError>;
}

async fn ensure_success(response: Response) -> Result<Response, WooError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WooError::Status {
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}
