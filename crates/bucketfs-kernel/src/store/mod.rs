//! Object-storage client binding.
//!
//! [`ObjectStore`] is the S3-compatible surface the rest of the kernel talks
//! to. Each operation maps onto one S3 API call; nothing here knows about
//! mounts or virtual paths. A [`StoreConnector`] builds a client from a
//! storage configuration and freshly decrypted credentials, once per
//! filesystem operation.
//!
//! Errors are a tagged enum ([`StoreError`]) so callers can match
//! "no such upload" or "no such key" structurally.

mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bucketfs_types::StorageConfig;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use thiserror::Error;

pub use memory::{MemoryConnector, MemoryObjectStore};

/// Object-storage error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key does not exist (GET/HEAD/COPY source).
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// The multipart upload id is unknown, completed, or aborted.
    #[error("no such upload: {0}")]
    NoSuchUpload(String),

    /// The bucket does not exist.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// The request was rejected (bad part list, bad arguments).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport or unclassified API failure.
    #[error("object storage request failed: {0}")]
    Request(String),
}

impl StoreError {
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, StoreError::NoSuchKey(_))
    }

    pub fn is_no_such_upload(&self) -> bool {
        matches!(self, StoreError::NoSuchUpload(_))
    }

    pub fn request(msg: impl Into<String>) -> Self {
        StoreError::Request(msg.into())
    }
}

/// Object-storage result type.
pub type StoreResult<T> = Result<T, StoreError>;

/// Names of the object-storage operations, for call accounting and fault
/// injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum StoreOp {
    ListObjectsV2,
    HeadObject,
    GetObject,
    PutObject,
    DeleteObject,
    CopyObject,
    CreateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
    ListParts,
}

/// Decrypted credentials. Lives for one operation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// A `ListObjectsV2` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<i32>,
}

impl ListRequest {
    /// Recursive listing of everything under `prefix`.
    pub fn recursive(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// One level of `prefix`, with `/` as delimiter.
    pub fn directory(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some("/".to_string()),
            ..Default::default()
        }
    }

    pub fn with_max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// An object as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub etag: Option<String>,
}

/// One page of a `ListObjectsV2` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub common_prefixes: Vec<String>,
    pub objects: Vec<ObjectSummary>,
    /// Present when more results are available.
    pub next_continuation_token: Option<String>,
}

impl ListPage {
    pub fn is_empty(&self) -> bool {
        self.common_prefixes.is_empty() && self.objects.is_empty()
    }
}

/// Object metadata from `HeadObject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<SystemTime>,
    pub etag: Option<String>,
}

/// Object body and metadata from `GetObject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    pub meta: ObjectMeta,
    pub body: Vec<u8>,
}

/// A part reference for `CompleteMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

impl CompletedPart {
    pub fn new(part_number: i32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// A part as reported by `ListParts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSummary {
    pub part_number: i32,
    pub etag: Option<String>,
    pub size: u64,
}

/// S3-compatible object-storage operations.
///
/// Keys are full object keys (root prefix and default folder included).
/// Implementations must map "missing key" and "missing upload" conditions to
/// [`StoreError::NoSuchKey`] and [`StoreError::NoSuchUpload`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `ListObjectsV2`: one page.
    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> StoreResult<ListPage>;

    /// `HeadObject`.
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta>;

    /// `GetObject`, whole body.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectData>;

    /// `PutObject`. Returns the new ETag, if the provider reports one.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<Option<String>>;

    /// `DeleteObject`. Deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// `CopyObject` within a bucket.
    async fn copy_object(&self, bucket: &str, source_key: &str, dest_key: &str)
    -> StoreResult<()>;

    /// `CreateMultipartUpload`. Returns the upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String>;

    /// `UploadPart`. Returns the part ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> StoreResult<String>;

    /// `CompleteMultipartUpload`. `parts` must be in ascending order.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<Option<String>>;

    /// `AbortMultipartUpload`.
    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
    -> StoreResult<()>;

    /// `ListParts`.
    async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<Vec<PartSummary>>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check whether a key exists. Errors other than "no such key" propagate.
    async fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        match self.head_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NoSuchKey(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List every object under `prefix`, following continuation tokens.
    async fn list_all_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut token = None;
        loop {
            let request = ListRequest::recursive(prefix).with_continuation_token(token);
            let page = self.list_objects(bucket, &request).await?;
            objects.extend(page.objects);
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => return Ok(objects),
            }
        }
    }
}

/// Builds object-storage clients from storage configurations.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        config: &StorageConfig,
        credentials: &Credentials,
    ) -> StoreResult<Arc<dyn ObjectStore>>;
}
