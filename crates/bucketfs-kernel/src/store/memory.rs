//! In-memory S3 emulation.
//!
//! Used for tests and local runs. Buckets are created on first use, keys are
//! kept in lexicographic order, and multipart uploads are tracked per upload
//! id exactly like a real endpoint would (unknown or finished ids fail with
//! `NoSuchUpload`).
//!
//! Every call is counted per [`StoreOp`], and failures can be queued for a
//! given operation with [`MemoryObjectStore::fail_next`] (or, after some
//! successful calls, [`MemoryObjectStore::fail_after`]).

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bucketfs_types::StorageConfig;
use parking_lot::Mutex;

use super::{
    CompletedPart, Credentials, ListPage, ListRequest, ObjectData, ObjectMeta, ObjectStore,
    ObjectSummary, PartSummary, StoreConnector, StoreError, StoreOp, StoreResult,
};

const DEFAULT_MAX_KEYS: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    etag: String,
    last_modified: SystemTime,
}

impl StoredObject {
    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: self.body.len() as u64,
            content_type: Some(self.content_type.clone()),
            last_modified: Some(self.last_modified),
            etag: Some(self.etag.clone()),
        }
    }
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<i32, (Vec<u8>, String)>,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
}

/// A listing entry before pagination: either a rolled-up prefix or a key.
enum Listed {
    Prefix(String),
    Object(String),
}

impl Listed {
    fn marker(&self) -> &str {
        match self {
            Listed::Prefix(p) => p,
            Listed::Object(k) => k,
        }
    }
}

/// In-memory [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
    calls: Mutex<HashMap<StoreOp, usize>>,
    faults: Mutex<HashMap<StoreOp, VecDeque<Option<StoreError>>>>,
}

fn etag_of(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call and return a queued failure for it, if any.
    fn enter(&self, op: StoreOp) -> StoreResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        match self.faults.lock().get_mut(&op).and_then(|q| q.pop_front()) {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }

    /// Make the next call of `op` fail with `err`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.faults.lock().entry(op).or_default().push_back(Some(err));
    }

    /// Let `successes` further calls of `op` through, then fail the next
    /// one with `err`.
    pub fn fail_after(&self, op: StoreOp, successes: usize, err: StoreError) {
        let mut faults = self.faults.lock();
        let queue = faults.entry(op).or_default();
        queue.extend(std::iter::repeat_with(|| None).take(successes));
        queue.push_back(Some(err));
    }

    /// Number of calls made for `op`.
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Number of calls made across all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn reset_counts(&self) {
        self.calls.lock().clear();
    }

    /// Store an object directly, bypassing call accounting.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        let body = body.into();
        let object = StoredObject {
            etag: etag_of(&body),
            body,
            content_type: "application/octet-stream".to_string(),
            last_modified: SystemTime::now(),
        };
        self.state
            .lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    /// Whether `key` exists, bypassing call accounting.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key))
    }

    /// Body of `key`, bypassing call accounting.
    pub fn body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.body.clone())
    }

    /// All keys in `bucket`, in order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of multipart uploads still in progress.
    pub fn pending_upload_count(&self) -> usize {
        self.state.lock().uploads.len()
    }

    fn list_entries(objects: &BTreeMap<String, StoredObject>, request: &ListRequest) -> Vec<Listed> {
        let mut entries: Vec<Listed> = Vec::new();
        for key in objects.keys().filter(|k| k.starts_with(&request.prefix)) {
            let rest = &key[request.prefix.len()..];
            let rolled = request
                .delimiter
                .as_deref()
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| idx + d.len()));
            match rolled {
                Some(end) => {
                    let prefix = format!("{}{}", request.prefix, &rest[..end]);
                    // Keys sharing a prefix are contiguous in sorted order.
                    let duplicate = matches!(entries.last(), Some(Listed::Prefix(p)) if *p == prefix);
                    if !duplicate {
                        entries.push(Listed::Prefix(prefix));
                    }
                }
                None => entries.push(Listed::Object(key.clone())),
            }
        }
        entries
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> StoreResult<ListPage> {
        self.enter(StoreOp::ListObjectsV2)?;
        let state = self.state.lock();
        let Some(objects) = state.buckets.get(bucket) else {
            return Ok(ListPage::default());
        };

        let entries = Self::list_entries(objects, request);
        let start = match &request.continuation_token {
            Some(token) => entries
                .iter()
                .position(|e| e.marker() > token.as_str())
                .unwrap_or(entries.len()),
            None => 0,
        };
        let max_keys = request
            .max_keys
            .filter(|m| *m > 0)
            .map(|m| m as usize)
            .unwrap_or(DEFAULT_MAX_KEYS);
        let end = (start + max_keys).min(entries.len());

        let mut page = ListPage::default();
        for entry in &entries[start..end] {
            match entry {
                Listed::Prefix(p) => page.common_prefixes.push(p.clone()),
                Listed::Object(key) => {
                    let object = &objects[key];
                    page.objects.push(ObjectSummary {
                        key: key.clone(),
                        size: object.body.len() as u64,
                        last_modified: Some(object.last_modified),
                        etag: Some(object.etag.clone()),
                    });
                }
            }
        }
        if end < entries.len() {
            page.next_continuation_token = Some(entries[end - 1].marker().to_string());
        }
        Ok(page)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        self.enter(StoreOp::HeadObject)?;
        let state = self.state.lock();
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.meta(key))
            .ok_or_else(|| StoreError::NoSuchKey(key.to_string()))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectData> {
        self.enter(StoreOp::GetObject)?;
        let state = self.state.lock();
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| ObjectData {
                meta: o.meta(key),
                body: o.body.clone(),
            })
            .ok_or_else(|| StoreError::NoSuchKey(key.to_string()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<Option<String>> {
        self.enter(StoreOp::PutObject)?;
        let etag = etag_of(&body);
        let object = StoredObject {
            body,
            content_type: content_type.to_string(),
            etag: etag.clone(),
            last_modified: SystemTime::now(),
        };
        self.state
            .lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
        Ok(Some(etag))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.enter(StoreOp::DeleteObject)?;
        if let Some(objects) = self.state.lock().buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, dest_key: &str) -> StoreResult<()> {
        self.enter(StoreOp::CopyObject)?;
        let mut state = self.state.lock();
        let objects = state.buckets.entry(bucket.to_string()).or_default();
        let mut copy = objects
            .get(source_key)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchKey(source_key.to_string()))?;
        copy.last_modified = SystemTime::now();
        objects.insert(dest_key.to_string(), copy);
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String> {
        self.enter(StoreOp::CreateMultipartUpload)?;
        let mut state = self.state.lock();
        state.next_upload += 1;
        let upload_id = format!("upload-{:06}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> StoreResult<String> {
        self.enter(StoreOp::UploadPart)?;
        let mut state = self.state.lock();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| StoreError::NoSuchUpload(upload_id.to_string()))?;
        let etag = etag_of(&data);
        upload.parts.insert(part_number, (data, etag.clone()));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<Option<String>> {
        self.enter(StoreOp::CompleteMultipartUpload)?;
        let mut state = self.state.lock();
        let upload = state
            .uploads
            .get(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| StoreError::NoSuchUpload(upload_id.to_string()))?;

        if parts.is_empty() {
            return Err(StoreError::InvalidRequest("no parts specified".into()));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StoreError::InvalidRequest("InvalidPartOrder".into()));
        }

        let mut body = Vec::new();
        for part in parts {
            match upload.parts.get(&part.part_number) {
                Some((data, etag)) if *etag == part.etag => body.extend_from_slice(data),
                _ => {
                    return Err(StoreError::InvalidRequest(format!(
                        "InvalidPart: part {} not uploaded with etag {}",
                        part.part_number, part.etag
                    )));
                }
            }
        }

        let content_type = upload.content_type.clone();
        state.uploads.remove(upload_id);
        let etag = format!(
            "\"{}-{}\"",
            etag_of(&body).trim_matches('"'),
            parts.len()
        );
        state.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type,
                etag: etag.clone(),
                last_modified: SystemTime::now(),
            },
        );
        Ok(Some(etag))
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> StoreResult<()> {
        self.enter(StoreOp::AbortMultipartUpload)?;
        let mut state = self.state.lock();
        let known = state
            .uploads
            .get(upload_id)
            .is_some_and(|u| u.bucket == bucket && u.key == key);
        if !known {
            return Err(StoreError::NoSuchUpload(upload_id.to_string()));
        }
        state.uploads.remove(upload_id);
        Ok(())
    }

    async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<Vec<PartSummary>> {
        self.enter(StoreOp::ListParts)?;
        let state = self.state.lock();
        let upload = state
            .uploads
            .get(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| StoreError::NoSuchUpload(upload_id.to_string()))?;
        Ok(upload
            .parts
            .iter()
            .map(|(number, (data, etag))| PartSummary {
                part_number: *number,
                etag: Some(etag.clone()),
                size: data.len() as u64,
            })
            .collect())
    }
}

/// Connector that hands out one shared [`MemoryObjectStore`] regardless of
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: Arc<MemoryObjectStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryObjectStore> {
        &self.store
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(
        &self,
        _config: &StorageConfig,
        _credentials: &Credentials,
    ) -> StoreResult<Arc<dyn ObjectStore>> {
        Ok(self.store.clone())
    }
}
