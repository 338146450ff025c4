use crate::config::{PipelineSettings, SourceDisposition};
use crate::filename::classify::split_key;
use crate::filename::{
    Classification, ImageCandidate, PrimaryImage, ProcessedMarkers, classify, is_sibling_of,
    rank_candidates, seo_file_name, view_indices,
};
use crate::models::{S3Event, SkipReason, StageReport, StorageObjectRef, SyncReport};
use crate::storage::ObjectStore;
use crate::woo::{
    MediaCaption, MediaId, MediaLibrary, Product, ProductDirectory, content_type_for,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::{future::Future, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Storage notification → product gallery ingestion.
///
/// One call to [`Pipeline::run`] handles one uploaded object. Every external
/// call is awaited before the next one starts, and images are ingested one
/// at a time in rank order.
///
/// The per-image loop is not transactional: when it fails, media created
/// earlier in the same run stays in the library unassociated. The
/// [`OrphanedMediaHook`] is told about those ids before the error is
/// returned; a later retrigger is expected to heal the product.
#[derive(Clone)]
pub struct Pipeline {
    storage: Arc<dyn ObjectStore>,
    products: Arc<dyn ProductDirectory>,
    media: Arc<dyn MediaLibrary>,
    orphans: Arc<dyn OrphanedMediaHook>,
    settings: Arc<PipelineSettings>,
    markers: ProcessedMarkers,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        products: Arc<dyn ProductDirectory>,
        media: Arc<dyn MediaLibrary>,
        settings: PipelineSettings,
    ) -> Self {
        let markers = ProcessedMarkers::new(&settings.processed_markers);
        Self {
            storage,
            products,
            media,
            orphans: Arc::new(LogOrphanedMedia),
            settings: Arc::new(settings),
            markers,
        }
    }

    pub fn with_orphan_hook(mut self, hook: Arc<dyn OrphanedMediaHook>) -> Self {
        self.orphans = hook;
        self
    }

    pub async fn handle_event(&self, event: &S3Event) -> Result<SyncReport, PipelineError> {
        let object = match event.first_object() {
            Some(Ok(object)) => object,
            Some(Err(err)) => {
                return Err(PipelineError::invalid_event(
                    "parse_event",
                    format!("undecodable object key: {err}"),
                ));
            }
            None => {
                return Err(PipelineError::invalid_event(
                    "parse_event",
                    "event carries no records",
                ));
            }
        };
        self.run(object).await
    }

    pub async fn run(&self, object: StorageObjectRef) -> Result<SyncReport, PipelineError> {
        let span = info_span!(
            "invocation",
            invocation_id = %Uuid::new_v4(),
            bucket = %object.bucket,
            key = %object.key,
        );
        async move {
            let result = self.execute(&object).await;
            match &result {
                Ok(report @ SyncReport::Completed { .. }) => {
                    info!(
                        target: "sync.pipeline",
                        stages = report.stages().len(),
                        "invocation_completed"
                    );
                    crate::metrics::invocation_finished("completed");
                }
                Ok(SyncReport::Skipped { .. }) => crate::metrics::invocation_finished("skipped"),
                Err(err) => {
                    error!(
                        target: "sync.pipeline",
                        stage = err.stage(),
                        detail = err.detail(),
                        "invocation_failed"
                    );
                    crate::metrics::invocation_finished("failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, object: &StorageObjectRef) -> Result<SyncReport, PipelineError> {
        let mut stages = Vec::new();

        let primary = match classify(&object.key, &self.markers) {
            Classification::Primary(primary) => primary,
            Classification::Skip(reason) => {
                info!(target: "sync.pipeline", reason = reason.label(), "trigger_ignored");
                return Ok(SyncReport::Skipped { reason, stages });
            }
        };
        info!(
            target: "sync.pipeline",
            sku = %primary.sku,
            file_name = %primary.file_name,
            extension = %primary.extension,
            "sku_detected"
        );

        let product = self
            .capture_stage(
                "lookup_product",
                &mut stages,
                stages::lookup_product(self.products.as_ref(), &primary.sku),
            )
            .await?;
        let Some(product) = product else {
            warn!(target: "sync.pipeline", sku = %primary.sku, "product_not_found");
            return Ok(SyncReport::Skipped {
                reason: SkipReason::ProductNotFound { sku: primary.sku },
                stages,
            });
        };
        info!(
            target: "sync.pipeline",
            product_id = product.id,
            name = %product.name,
            "product_found"
        );

        if self.settings.delete_previous_images && !product.images.is_empty() {
            self.capture_stage(
                "delete_stale_media",
                &mut stages,
                stages::delete_stale_media(self.media.as_ref(), &product),
            )
            .await?;
        }

        let keys = self
            .capture_stage(
                "list_siblings",
                &mut stages,
                stages::list_siblings(self.storage.as_ref(), &object.bucket, &primary, &self.markers),
            )
            .await?;
        if keys.is_empty() {
            warn!(target: "sync.pipeline", sku = %primary.sku, "no_sibling_images");
            return Ok(SyncReport::Skipped {
                reason: SkipReason::NoSiblingImages { sku: primary.sku },
                stages,
            });
        }

        let candidates = self
            .capture_stage(
                "rank_images",
                &mut stages,
                std::future::ready(Ok(stages::rank_images(keys))),
            )
            .await?;

        let media_ids = self
            .capture_stage(
                "ingest_images",
                &mut stages,
                self.ingest_images(&object.bucket, &product, &primary.sku, &candidates),
            )
            .await?;

        self.capture_stage(
            "associate_product",
            &mut stages,
            stages::associate_product(self.products.as_ref(), product.id, &media_ids),
        )
        .await?;
        info!(
            target: "sync.pipeline",
            product_id = product.id,
            images = media_ids.len(),
            "images_associated"
        );

        Ok(SyncReport::Completed {
            product_id: product.id,
            sku: primary.sku,
            media_ids,
            stages,
        })
    }

    async fn ingest_images(
        &self,
        bucket: &str,
        product: &Product,
        sku: &str,
        candidates: &[ImageCandidate],
    ) -> Result<StageOutcome<Vec<MediaId>>, PipelineError> {
        let caption = if self.settings.seo_rename {
            MediaCaption::for_product(product, sku)
        } else {
            MediaCaption::plain(&product.name)
        };

        let mut media_ids = Vec::with_capacity(candidates.len());
        let mut uploaded = Vec::with_capacity(candidates.len());
        let views = view_indices(candidates);
        for (candidate, view) in candidates.iter().zip(views) {
            let file_name = self.target_file_name(product, sku, candidate, view);
            if let Err(err) = self
                .ingest_image(bucket, candidate, &file_name, &caption, &mut media_ids)
                .await
            {
                if !media_ids.is_empty() {
                    self.orphans
                        .media_orphaned(product.id, &media_ids, &err)
                        .await;
                }
                return Err(err);
            }
            uploaded.push(json!({
                "key": candidate.key,
                "rank": candidate.rank,
                "primary": candidate.is_primary(),
                "file_name": file_name,
                "media_id": media_ids.last(),
            }));
        }

        Ok(StageOutcome::new(
            media_ids,
            json!({
                "count": uploaded.len(),
                "uploaded": uploaded,
                "caption_title": caption.title,
            }),
        ))
    }

    /// download → upload → caption → dispose; the media id is recorded as
    /// soon as the upload succeeds so a later failure still reports it.
    async fn ingest_image(
        &self,
        bucket: &str,
        candidate: &ImageCandidate,
        file_name: &str,
        caption: &MediaCaption,
        created: &mut Vec<MediaId>,
    ) -> Result<(), PipelineError> {
        let body = self
            .storage
            .get(bucket, &candidate.key)
            .await
            .map_err(|err| PipelineError::upstream("download_image", err.to_string()))?;
        let size = body.len();

        let media_id = self
            .media
            .upload(file_name, &content_type_for(&candidate.extension), body)
            .await
            .map_err(|err| {
                PipelineError::upstream("upload_media", format!("{}: {err}", candidate.key))
            })?;
        created.push(media_id);
        crate::metrics::image_ingested(&candidate.extension, size);
        info!(
            target: "sync.pipeline",
            key = %candidate.key,
            file_name,
            media_id,
            "image_uploaded"
        );

        self.media
            .update_caption(media_id, caption)
            .await
            .map_err(|err| {
                PipelineError::upstream("update_media_metadata", format!("media {media_id}: {err}"))
            })?;

        self.dispose_source(bucket, candidate).await
    }

    fn target_file_name(
        &self,
        product: &Product,
        sku: &str,
        candidate: &ImageCandidate,
        view: Option<usize>,
    ) -> String {
        if self.settings.seo_rename {
            seo_file_name(
                &product.name,
                sku,
                &candidate.extension,
                view,
            )
        } else {
            candidate.file_name.clone()
        }
    }

    async fn dispose_source(
        &self,
        bucket: &str,
        candidate: &ImageCandidate,
    ) -> Result<(), PipelineError> {
        let fail = |err: crate::storage::StorageError| {
            PipelineError::upstream("dispose_source", err.to_string())
        };
        match self.settings.source_disposition {
            SourceDisposition::Keep => Ok(()),
            SourceDisposition::Delete => self
                .storage
                .delete(bucket, &candidate.key)
                .await
                .map_err(fail),
            SourceDisposition::Archive => {
                let target = archive_key(&candidate.key, self.markers.archive_segment());
                self.storage
                    .copy(bucket, &candidate.key, &target)
                    .await
                    .map_err(fail)?;
                self.storage
                    .delete(bucket, &candidate.key)
                    .await
                    .map_err(fail)
            }
        }
    }

    async fn capture_stage<T, Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<StageOutcome<T>, PipelineError>>,
    {
        let started = Instant::now();
        let outcome = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, outcome.output));
        Ok(outcome.value)
    }
}

fn archive_key(key: &str, segment: &str) -> String {
    let (directory, file_name) = split_key(key);
    format!("{directory}{segment}/{file_name}")
}

/// Notified when an ingestion run dies after creating media it will never
/// associate.
#[async_trait]
pub trait OrphanedMediaHook: Send + Sync {
    async fn media_orphaned(&self, product_id: u64, media_ids: &[MediaId], error: &PipelineError);
}

pub struct LogOrphanedMedia;

#[async_trait]
impl OrphanedMediaHook for LogOrphanedMedia {
    async fn media_orphaned(&self, product_id: u64, media_ids: &[MediaId], error: &PipelineError) {
        warn!(
            target: "sync.pipeline",
            product_id,
            orphaned = ?media_ids,
            stage = error.stage(),
            "media_left_unassociated"
        );
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidEvent,
    Upstream,
}

impl PipelineError {
    pub fn invalid_event(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidEvent,
        }
    }

    pub fn upstream(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Upstream,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

pub mod stages {
    use super::*;

    pub(super) async fn lookup_product(
        directory: &dyn ProductDirectory,
        sku: &str,
    ) -> Result<StageOutcome<Option<Product>>, PipelineError> {
        let product = directory
            .find_by_sku(sku)
            .await
            .map_err(|err| PipelineError::upstream("lookup_product", err.to_string()))?;
        let output = json!({
            "sku": sku,
            "found": product.is_some(),
            "product_id": product.as_ref().map(|p| p.id),
            "existing_images": product.as_ref().map(|p| p.images.len()),
        });
        Ok(StageOutcome::new(product, output))
    }

    /// Best effort: a failed delete is logged and skipped.
    pub(super) async fn delete_stale_media(
        media: &dyn MediaLibrary,
        product: &Product,
    ) -> Result<StageOutcome<Vec<MediaId>>, PipelineError> {
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for image in &product.images {
            match media.delete(image.id).await {
                Ok(()) => {
                    debug!(
                        target: "sync.woo",
                        media_id = image.id,
                        src = image.src.as_deref().unwrap_or_default(),
                        "stale_media_deleted"
                    );
                    deleted.push(image.id);
                }
                Err(err) => {
                    warn!(
                        target: "sync.woo",
                        media_id = image.id,
                        error = %err,
                        "stale_media_delete_failed"
                    );
                    failed.push(image.id);
                }
            }
        }
        crate::metrics::stale_media_failed(failed.len());
        let output = json!({ "deleted": deleted, "failed": failed });
        Ok(StageOutcome::new(deleted, output))
    }

    pub(super) async fn list_siblings(
        storage: &dyn ObjectStore,
        bucket: &str,
        primary: &PrimaryImage,
        markers: &ProcessedMarkers,
    ) -> Result<StageOutcome<Vec<String>>, PipelineError> {
        let prefix = format!("{}{}", primary.directory, primary.sku);
        let listed = storage
            .list(bucket, &prefix)
            .await
            .map_err(|err| PipelineError::upstream("list_siblings", err.to_string()))?;
        let total = listed.len();
        let siblings: Vec<String> = listed
            .into_iter()
            .filter(|key| is_sibling_of(key, primary, markers))
            .collect();
        Ok(StageOutcome::new(
            siblings.clone(),
            json!({
                "trigger": primary.key,
                "prefix": prefix,
                "listed": total,
                "matched": siblings,
            }),
        ))
    }

    pub(super) fn rank_images(keys: Vec<String>) -> StageOutcome<Vec<ImageCandidate>> {
        let ordered = rank_candidates(keys);
        let order = ordered
            .iter()
            .map(|c| json!({ "key": c.key, "rank": c.rank }))
            .collect::<Vec<_>>();
        StageOutcome::new(ordered, json!({ "order": order }))
    }

    pub(super) async fn associate_product(
        directory: &dyn ProductDirectory,
        product_id: u64,
        media_ids: &[MediaId],
    ) -> Result<StageOutcome<()>, PipelineError> {
        directory
            .replace_images(product_id, media_ids)
            .await
            .map_err(|err| PipelineError::upstream("associate_product", err.to_string()))?;
        Ok(StageOutcome::new(
            (),
            json!({ "product_id": product_id, "media_ids": media_ids }),
        ))
    }
}
