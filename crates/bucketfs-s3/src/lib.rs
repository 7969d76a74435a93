//! # bucketfs-s3
//!
//! [`ObjectStore`] over `aws-sdk-s3`, for AWS and any S3-compatible endpoint
//! (MinIO, R2, Ceph, ...).
//!
//! A client is built per connection from the storage config and the
//! decrypted credentials; nothing is pooled across operations. Service
//! error codes are mapped onto [`StoreError`] variants so the kernel can
//! match on them.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials as AwsCredentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as AwsCompletedPart};
use bucketfs_kernel::{
    CompletedPart, Credentials, ListPage, ListRequest, ObjectData, ObjectMeta, ObjectStore,
    ObjectSummary, PartSummary, StoreConnector, StoreError, StoreResult,
};
use bucketfs_types::StorageConfig;
use tracing::debug;

const PROVIDER_NAME: &str = "bucketfs";

// ============================================================================
// Connector
// ============================================================================

/// Builds an [`S3Store`] for each storage config.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

impl S3Connector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreConnector for S3Connector {
    async fn connect(
        &self,
        config: &StorageConfig,
        credentials: &Credentials,
    ) -> StoreResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(S3Store::new(config, credentials)))
    }
}

// ============================================================================
// Store
// ============================================================================

/// One configured S3 client.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: &StorageConfig, credentials: &Credentials) -> Self {
        let creds = AwsCredentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            PROVIDER_NAME,
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(creds)
            .force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(secs))
                    .build(),
            );
        }
        debug!(
            "s3 client for {} (endpoint {:?}, path style {})",
            config.bucket, config.endpoint, config.path_style
        );
        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> StoreResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.continuation_token.clone())
            .set_max_keys(request.max_keys)
            .send()
            .await
            .map_err(|e| classify(e, &request.prefix))?;

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectSummary {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().and_then(system_time),
                    etag: object.e_tag().map(str::to_string),
                })
            })
            .collect();
        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            common_prefixes,
            objects,
            next_continuation_token,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            last_modified: output.last_modified().and_then(system_time),
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectData> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        let meta = ObjectMeta {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            last_modified: output.last_modified().and_then(system_time),
            etag: output.e_tag().map(str::to_string),
        };
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::request(format!("reading {}: {}", key, e)))?
            .into_bytes()
            .to_vec();
        Ok(ObjectData {
            meta: ObjectMeta {
                size: body.len() as u64,
                ..meta
            },
            body,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<Option<String>> {
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        Ok(output.e_tag().map(str::to_string))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, dest_key: &str) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(bucket)
            .key(dest_key)
            .copy_source(copy_source(bucket, source_key))
            .send()
            .await
            .map_err(|e| classify(e, source_key))?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StoreError::request(format!("no upload id returned for {}", key)))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> StoreResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify(e, upload_id))?;
        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| StoreError::request(format!("no etag returned for part {}", part_number)))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<Option<String>> {
        let parts = parts
            .iter()
            .map(|p| {
                AwsCompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();
        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await
            .map_err(|e| classify(e, upload_id))?;
        Ok(output.e_tag().map(str::to_string))
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| classify(e, upload_id))?;
        Ok(())
    }

    async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<Vec<PartSummary>> {
        let mut parts = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_parts()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .set_part_number_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify(e, upload_id))?;
            parts.extend(output.parts().iter().filter_map(|part| {
                Some(PartSummary {
                    part_number: part.part_number()?,
                    etag: part.e_tag().map(str::to_string),
                    size: part.size().unwrap_or(0).max(0) as u64,
                })
            }));
            match output.next_part_number_marker() {
                Some(next) if output.is_truncated().unwrap_or(false) => {
                    marker = Some(next.to_string());
                }
                _ => return Ok(parts),
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `CopySource` header value: bucket and URL-encoded key.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, urlencoding::encode(key))
}

fn system_time(time: &DateTime) -> Option<SystemTime> {
    SystemTime::try_from(*time).ok()
}

/// Map an S3 error code to a structured error. `None` for codes that have
/// no variant of their own.
fn error_for_code(code: Option<&str>, subject: &str) -> Option<StoreError> {
    let subject = subject.to_string();
    match code? {
        "NoSuchKey" | "NotFound" => Some(StoreError::NoSuchKey(subject)),
        "NoSuchUpload" => Some(StoreError::NoSuchUpload(subject)),
        "NoSuchBucket" => Some(StoreError::NoSuchBucket(subject)),
        "InvalidPart" | "InvalidPartOrder" | "EntityTooSmall" | "InvalidArgument"
        | "InvalidRequest" => Some(StoreError::InvalidRequest(format!("{}: {}", code?, subject))),
        _ => None,
    }
}

fn classify<E, R>(err: SdkError<E, R>, subject: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let mapped = err
        .as_service_error()
        .and_then(|service| error_for_code(service.code(), subject));
    match mapped {
        Some(mapped) => mapped,
        None => StoreError::request(format!("{}: {}", subject, DisplayErrorContext(&err))),
    }
}
