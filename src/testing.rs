//! In-memory stand-ins for the bucket, product directory and media library.

use crate::config::PipelineSettings;
use crate::pipeline::{OrphanedMediaHook, Pipeline, PipelineError};
use crate::storage::{ObjectStore, StorageError};
use crate::woo::products::ProductImage;
use crate::woo::{MediaCaption, MediaId, MediaLibrary, Product, ProductDirectory, WooError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};
use tracing::{Event, Subscriber, subscriber::DefaultGuard};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

pub fn product(id: u64, name: &str, image_ids: &[MediaId]) -> Product {
    Product {
        id,
        name: name.to_string(),
        images: image_ids
            .iter()
            .map(|id| ProductImage { id: *id, src: None })
            .collect(),
        meta_data: Vec::new(),
    }
}

/// Objects keep insertion order; the body of each object is its key.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    calls: Mutex<Vec<String>>,
    fail_list: AtomicBool,
    fail_get: Mutex<Option<String>>,
}

impl FakeStore {
    pub fn with_keys(keys: &[&str]) -> Self {
        let objects = keys
            .iter()
            .map(|key| (key.to_string(), key.as_bytes().to_vec()))
            .collect();
        Self {
            objects: Mutex::new(objects),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list(&self, _bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.record(format!("list {prefix}"));
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::Request {
                op: "list",
                key: prefix.to_string(),
                detail: "AccessDenied".into(),
            });
        }
        Ok(self
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    async fn get(&self, _bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.record(format!("get {key}"));
        if self.fail_get.lock().unwrap().as_deref() == Some(key) {
            return Err(StorageError::Request {
                op: "get",
                key: key.to_string(),
                detail: "InternalError".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| StorageError::Request {
                op: "get",
                key: key.to_string(),
                detail: "NoSuchKey".into(),
            })
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StorageError> {
        self.record(format!("copy {from} -> {to}"));
        let body = self.get(bucket, from).await?;
        self.objects.lock().unwrap().push((to.to_string(), body));
        Ok(())
    }

    async fn delete(&self, _bucket: &str, key: &str) -> Result<(), StorageError> {
        self.record(format!("delete {key}"));
        self.objects.lock().unwrap().retain(|(candidate, _)| candidate != key);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    products: Vec<Product>,
    fail_replace: bool,
    fail_lookup: AtomicBool,
    lookups: Mutex<Vec<String>>,
    replaced: Mutex<Vec<(u64, Vec<MediaId>)>>,
}

impl FakeDirectory {
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn replaced(&self) -> Vec<(u64, Vec<MediaId>)> {
        self.replaced.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductDirectory for FakeDirectory {
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, WooError> {
        self.lookups.lock().unwrap().push(sku.to_string());
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(WooError::Status {
                status: 503,
                body: "service_unavailable".into(),
            });
        }
        Ok(self.products.first().cloned())
    }

    async fn replace_images(&self, product_id: u64, media_ids: &[MediaId]) -> Result<(), WooError> {
        if self.fail_replace {
            return Err(WooError::Status {
                status: 500,
                body: "internal_server_error".into(),
            });
        }
        self.replaced
            .lock()
            .unwrap()
            .push((product_id, media_ids.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub id: MediaId,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct FakeMedia {
    next_id: AtomicU64,
    attempts: AtomicUsize,
    fail_upload_on: Option<usize>,
    fail_caption: bool,
    fail_delete: HashSet<MediaId>,
    uploads: Mutex<Vec<Upload>>,
    captions: Mutex<Vec<(MediaId, MediaCaption)>>,
    deleted: Mutex<Vec<MediaId>>,
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(100),
            attempts: AtomicUsize::new(0),
            fail_upload_on: None,
            fail_caption: false,
            fail_delete: HashSet::new(),
            uploads: Mutex::default(),
            captions: Mutex::default(),
            deleted: Mutex::default(),
        }
    }
}

impl FakeMedia {
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn captions(&self) -> Vec<(MediaId, MediaCaption)> {
        self.captions.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MediaId> {
        self.deleted.lock().unwrap().clone()
    }

    /// Upload attempts plus caption updates plus deletes.
    pub fn total_calls(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
            + self.captions.lock().unwrap().len()
            + self.deleted.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaLibrary for FakeMedia {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<MediaId, WooError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upload_on == Some(attempt) {
            return Err(WooError::Status {
                status: 500,
                body: "upload_error".into(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.uploads.lock().unwrap().push(Upload {
            id,
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes: body,
        });
        Ok(id)
    }

    async fn update_caption(&self, id: MediaId, caption: &MediaCaption) -> Result<(), WooError> {
        if self.fail_caption {
            return Err(WooError::Request("connection reset".into()));
        }
        self.captions.lock().unwrap().push((id, caption.clone()));
        Ok(())
    }

    async fn delete(&self, id: MediaId) -> Result<(), WooError> {
        if self.fail_delete.contains(&id) {
            return Err(WooError::Status {
                status: 404,
                body: "rest_post_invalid_id".into(),
            });
        }
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingHook {
    calls: Mutex<Vec<(u64, Vec<MediaId>, &'static str)>>,
}

impl RecordingHook {
    pub fn calls(&self) -> Vec<(u64, Vec<MediaId>, &'static str)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrphanedMediaHook for RecordingHook {
    async fn media_orphaned(&self, product_id: u64, media_ids: &[MediaId], error: &PipelineError) {
        self.calls
            .lock()
            .unwrap()
            .push((product_id, media_ids.to_vec(), error.stage()));
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub directory: Arc<FakeDirectory>,
    pub media: Arc<FakeMedia>,
    pub hook: Arc<RecordingHook>,
}

impl Harness {
    pub fn new(keys: &[&str], product: Option<Product>) -> Self {
        Self {
            store: Arc::new(FakeStore::with_keys(keys)),
            directory: Arc::new(FakeDirectory {
                products: product.into_iter().collect(),
                ..FakeDirectory::default()
            }),
            media: Arc::new(FakeMedia::default()),
            hook: Arc::new(RecordingHook::default()),
        }
    }

    /// Fails the `attempt`-th upload (1-based).
    pub fn failing_upload(self, attempt: usize) -> Self {
        self.with_media(FakeMedia {
            fail_upload_on: Some(attempt),
            ..FakeMedia::default()
        })
    }

    pub fn failing_caption(self) -> Self {
        self.with_media(FakeMedia {
            fail_caption: true,
            ..FakeMedia::default()
        })
    }

    pub fn failing_delete(self, id: MediaId) -> Self {
        self.with_media(FakeMedia {
            fail_delete: HashSet::from([id]),
            ..FakeMedia::default()
        })
    }

    pub fn failing_lookup(self) -> Self {
        self.directory.fail_lookup.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_list(self) -> Self {
        self.store.fail_list.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_get(self, key: &str) -> Self {
        *self.store.fail_get.lock().unwrap() = Some(key.to_string());
        self
    }

    pub fn failing_replace(self) -> Self {
        let products = self.directory.products.clone();
        Self {
            directory: Arc::new(FakeDirectory {
                products,
                fail_replace: true,
                ..FakeDirectory::default()
            }),
            ..self
        }
    }

    fn with_media(self, media: FakeMedia) -> Self {
        Self {
            media: Arc::new(media),
            ..self
        }
    }

    pub fn pipeline(&self, settings: PipelineSettings) -> Pipeline {
        Pipeline::new(
            self.store.clone(),
            self.directory.clone(),
            self.media.clone(),
            settings,
        )
        .with_orphan_hook(self.hook.clone())
    }
}

/// Records the metadata target of every event emitted while the guard lives.
struct TargetRecorder(Arc<Mutex<Vec<String>>>);

impl<S: Subscriber> Layer<S> for TargetRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0
            .lock()
            .unwrap()
            .push(event.metadata().target().to_string());
    }
}

pub fn capture_targets() -> (DefaultGuard, Arc<Mutex<Vec<String>>>) {
    let targets = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(TargetRecorder(targets.clone()));
    (tracing::subscriber::set_default(subscriber), targets)
}
