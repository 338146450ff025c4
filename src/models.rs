use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::string::FromUtf8Error;

/// Storage notification in the S3 event shape. Only the fields the
/// pipeline reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    pub key: String,
}

/// Bucket + decoded key of the object that fired the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageObjectRef {
    pub bucket: String,
    pub key: String,
}

impl S3Event {
    /// First record only; one notification drives one invocation.
    pub fn first_object(&self) -> Option<Result<StorageObjectRef, FromUtf8Error>> {
        let record = self.records.first()?;
        Some(
            decode_object_key(&record.s3.object.key).map(|key| StorageObjectRef {
                bucket: record.s3.bucket.name.clone(),
                key,
            }),
        )
    }
}

/// Notification keys are form-encoded: `+` stands for a space.
pub fn decode_object_key(raw: &str) -> Result<String, FromUtf8Error> {
    urlencoding::decode(&raw.replace('+', " ")).map(|key| key.into_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyProcessed,
    UnsupportedExtension { extension: String },
    SecondaryImage,
    EmptySku,
    ProductNotFound { sku: String },
    NoSiblingImages { sku: String },
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::AlreadyProcessed => "already_processed",
            SkipReason::UnsupportedExtension { .. } => "unsupported_extension",
            SkipReason::SecondaryImage => "secondary_image",
            SkipReason::EmptySku => "empty_sku",
            SkipReason::ProductNotFound { .. } => "product_not_found",
            SkipReason::NoSiblingImages { .. } => "no_sibling_images",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncReport {
    Skipped {
        reason: SkipReason,
        stages: Vec<StageReport>,
    },
    Completed {
        product_id: u64,
        sku: String,
        media_ids: Vec<u64>,
        stages: Vec<StageReport>,
    },
}

impl SyncReport {
    pub fn stages(&self) -> &[StageReport] {
        match self {
            SyncReport::Skipped { stages, .. } | SyncReport::Completed { stages, .. } => stages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
