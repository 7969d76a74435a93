//! Multipart upload coordination.
//!
//! Drives create → upload part → complete / abort against object storage
//! and keeps the file-metadata record and the directory cache in step.
//!
//! ```text
//! initialize ──► upload_part* ──► complete
//!                      │
//!                      └────────► abort
//! ```
//!
//! There is no resume. After `complete` or `abort` succeeds the upload id
//! is gone from object storage, and after `abort` no metadata row refers to
//! it either.

mod retry;

pub use retry::{RetryPolicy, retry};

use bucketfs_types::Caller;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::file_db::NewFile;
use crate::store::{CompletedPart, StoreError};
use crate::vfs::context::{FilesystemContext, MountBackend};
use crate::vfs::resolver::ResolvedLocation;
use crate::vfs::{VfsError, VfsResult, mime, paths};

/// Largest part count object storage accepts.
pub const MAX_PARTS: u64 = 10_000;

const MIB: u64 = 1024 * 1024;

/// An upload in progress, as handed to the caller after initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartSession {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    pub mount_id: String,
    /// Virtual path of the file being uploaded.
    pub path: String,
    pub content_type: String,
    pub recommended_part_size: u64,
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOutcome {
    pub path: String,
    pub key: String,
    pub etag: Option<String>,
    pub size: Option<u64>,
    /// The upload was already gone but the object exists, so an earlier
    /// completion won the race.
    pub recovered: bool,
}

/// Result of an abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortOutcome {
    pub upload_id: String,
    /// A follow-up part listing reported the upload gone.
    pub confirmed: bool,
    pub records_deleted: usize,
}

/// Part size for an upload of `size` bytes: at least `min_part_size`, big
/// enough to fit in [`MAX_PARTS`] parts, rounded up to a whole MiB.
pub fn recommended_part_size(size: u64, min_part_size: u64) -> u64 {
    let needed = size.div_ceil(MAX_PARTS).max(min_part_size).max(1);
    needed.div_ceil(MIB) * MIB
}

fn check_part_number(part_number: i32) -> VfsResult<()> {
    if part_number < 1 || part_number as u64 > MAX_PARTS {
        return Err(VfsError::bad_request(format!(
            "part number {} outside 1..={}",
            part_number, MAX_PARTS
        )));
    }
    Ok(())
}

/// Where an upload lands.
struct Target {
    path: String,
    location: ResolvedLocation,
    backend: MountBackend,
    key: String,
}

/// Drives multipart uploads.
#[derive(Debug, Clone)]
pub struct MultipartCoordinator {
    ctx: FilesystemContext,
}

impl MultipartCoordinator {
    pub fn new(ctx: FilesystemContext) -> Self {
        Self { ctx }
    }

    async fn target(&self, caller: &Caller, path: &str) -> VfsResult<Target> {
        let path = paths::normalize(path)?;
        if paths::is_directory(&path) {
            return Err(VfsError::invalid_path(path));
        }
        let location = self
            .ctx
            .resolver(caller)
            .await?
            .resolve(&path)
            .ok_or_else(|| VfsError::no_mount_point(&path))?;
        let backend = self.ctx.backend(&location.mount).await?;
        let key = backend.key(&location.sub_path);
        Ok(Target {
            path,
            location,
            backend,
            key,
        })
    }

    /// Start an upload.
    ///
    /// A directory `path` needs `filename`; otherwise `filename`, if given,
    /// replaces the last segment. The content type always comes from the
    /// file name's extension; `content_type` is ignored.
    #[tracing::instrument(skip(self, caller, content_type), name = "multipart.initialize")]
    pub async fn initialize(
        &self,
        caller: &Caller,
        path: &str,
        content_type: Option<&str>,
        size: u64,
        filename: Option<&str>,
    ) -> VfsResult<MultipartSession> {
        let path = paths::normalize(path)?;
        let file_path = match filename {
            Some(name) if name.is_empty() || name.contains('/') => {
                return Err(VfsError::invalid_path(name));
            }
            Some(name) if paths::is_directory(&path) => paths::join(&path, name),
            Some(name) => paths::join(&paths::parent(&path), name),
            None if paths::is_directory(&path) => {
                return Err(VfsError::bad_request(format!(
                    "{} is a directory and no filename was given",
                    path
                )));
            }
            None => path,
        };

        let target = self.target(caller, &file_path).await?;
        let name = paths::file_name(&target.path).to_string();
        let mimetype = mime::for_filename(&name);
        if let Some(requested) = content_type {
            if requested != mimetype {
                debug!("ignoring requested content type {} for {}", requested, name);
            }
        }

        let parent = paths::parent(&target.location.sub_path);
        if !target.backend.directory_exists(&parent).await? {
            return Err(VfsError::not_found(paths::parent(&target.path)));
        }

        let upload_id = target
            .backend
            .store
            .create_multipart_upload(target.backend.bucket(), &target.key, mimetype)
            .await?;

        let record = NewFile {
            filename: name,
            storage_path: target.key.clone(),
            mount_id: target.location.mount.id.clone(),
            size,
            mimetype: mimetype.to_string(),
            owner: caller.to_string(),
            upload_id: Some(upload_id.clone()),
        };
        if let Err(e) = self.ctx.files.insert_pending(&record) {
            let aborted = target
                .backend
                .store
                .abort_multipart_upload(target.backend.bucket(), &target.key, &upload_id)
                .await;
            if let Err(abort_err) = aborted {
                warn!("failed to abort {} after metadata error: {}", upload_id, abort_err);
            }
            return Err(e);
        }

        info!("initialized multipart upload {} for {}", upload_id, target.path);
        Ok(MultipartSession {
            upload_id,
            bucket: target.backend.bucket().to_string(),
            key: target.key,
            mount_id: target.location.mount.id,
            path: target.path,
            content_type: mimetype.to_string(),
            recommended_part_size: recommended_part_size(size, self.ctx.config.min_part_size),
        })
    }

    /// Upload one part. Pass-through to object storage.
    #[tracing::instrument(skip(self, caller, data), fields(len = data.len()), name = "multipart.upload_part")]
    pub async fn upload_part(
        &self,
        caller: &Caller,
        path: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> VfsResult<CompletedPart> {
        check_part_number(part_number)?;
        let target = self.target(caller, path).await?;
        let etag = target
            .backend
            .store
            .upload_part(target.backend.bucket(), &target.key, upload_id, part_number, data)
            .await?;
        Ok(CompletedPart::new(part_number, etag))
    }

    /// Finish an upload.
    ///
    /// Parts are sorted by number before completion. If storage reports the
    /// upload gone but the object exists, an earlier completion already
    /// succeeded and this call succeeds too.
    #[tracing::instrument(skip(self, caller, parts), fields(parts = parts.len()), name = "multipart.complete")]
    pub async fn complete(
        &self,
        caller: &Caller,
        path: &str,
        upload_id: &str,
        mut parts: Vec<CompletedPart>,
    ) -> VfsResult<CompleteOutcome> {
        if parts.is_empty() {
            return Err(VfsError::bad_request("no parts to complete"));
        }
        for part in &parts {
            check_part_number(part.part_number)?;
        }
        parts.sort_by_key(|p| p.part_number);

        let target = self.target(caller, path).await?;
        let store = &target.backend.store;
        let bucket = target.backend.bucket();

        let (etag, recovered) = match store
            .complete_multipart_upload(bucket, &target.key, upload_id, &parts)
            .await
        {
            Ok(etag) => (etag, false),
            Err(StoreError::NoSuchUpload(msg)) => match store.head_object(bucket, &target.key).await {
                Ok(meta) => {
                    warn!(
                        "upload {} already gone but {} exists; treating as completed",
                        upload_id, target.key
                    );
                    (meta.etag, true)
                }
                Err(StoreError::NoSuchKey(_)) => {
                    return Err(VfsError::not_found(format!("upload {}: {}", upload_id, msg)));
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        };

        let size = match store.head_object(bucket, &target.key).await {
            Ok(meta) => Some(meta.size),
            Err(e) => {
                warn!("could not stat completed object {}: {}", target.key, e);
                None
            }
        };

        let mount_id = &target.location.mount.id;
        self.ctx.invalidate_parent(mount_id, &target.location.sub_path);
        self.ctx.touch_mount(mount_id).await;

        let name = paths::file_name(&target.path).to_string();
        let record = NewFile {
            mimetype: mime::for_filename(&name).to_string(),
            filename: name,
            storage_path: target.key.clone(),
            mount_id: mount_id.clone(),
            size: size.unwrap_or(0),
            owner: caller.to_string(),
            upload_id: Some(upload_id.to_string()),
        };
        self.ctx.files.finalize_upload(&record, etag.as_deref())?;

        info!("completed multipart upload {} -> {}", upload_id, target.key);
        Ok(CompleteOutcome {
            path: target.path,
            key: target.key,
            etag,
            size,
            recovered,
        })
    }

    /// Abort an upload and remove its metadata.
    ///
    /// The abort call is retried per the configured policy, then verified
    /// by listing parts (a "no such upload" answer confirms it). If every
    /// attempt fails, one last abort is tried before the error is returned.
    /// Metadata records for the upload are deleted in every case.
    #[tracing::instrument(skip(self, caller), name = "multipart.abort")]
    pub async fn abort(&self, caller: &Caller, path: &str, upload_id: &str) -> VfsResult<AbortOutcome> {
        let target = match self.target(caller, path).await {
            Ok(target) => target,
            Err(e) => {
                match self.ctx.files.delete_by_upload_id(upload_id) {
                    Ok(count) => warn!(
                        "abort of {} could not reach storage, deleted {} records: {}",
                        upload_id, count, e
                    ),
                    Err(db_err) => {
                        warn!("failed to delete metadata for {}: {}", upload_id, db_err)
                    }
                }
                return Err(e);
            }
        };
        let store = &target.backend.store;
        let bucket = target.backend.bucket();
        let key = target.key.as_str();

        match store.list_parts(bucket, key, upload_id).await {
            Ok(parts) => debug!("aborting {} with {} uploaded parts", upload_id, parts.len()),
            Err(e) => debug!("could not snapshot parts of {}: {}", upload_id, e),
        }

        let aborted = retry(&self.ctx.config.abort_policy, "abort_multipart_upload", || async move {
            match store.abort_multipart_upload(bucket, key, upload_id).await {
                Err(StoreError::NoSuchUpload(_)) => Ok(()),
                other => other,
            }
        })
        .await;

        let result = match aborted {
            Ok(()) => {
                let confirmed = match store.list_parts(bucket, key, upload_id).await {
                    Err(StoreError::NoSuchUpload(_)) => true,
                    Ok(parts) => {
                        warn!(
                            "abort of {} unconfirmed: {} parts still listed",
                            upload_id,
                            parts.len()
                        );
                        false
                    }
                    Err(e) => {
                        warn!("abort of {} unconfirmed: {}", upload_id, e);
                        false
                    }
                };
                Ok(confirmed)
            }
            Err(e) => {
                if let Err(last) = store.abort_multipart_upload(bucket, key, upload_id).await {
                    warn!("final abort attempt for {} failed: {}", upload_id, last);
                }
                Err(e)
            }
        };

        let records_deleted = match self.ctx.files.delete_by_upload_id(upload_id) {
            Ok(count) => count,
            Err(e) if result.is_err() => {
                warn!("failed to delete metadata for {}: {}", upload_id, e);
                0
            }
            Err(e) => return Err(e),
        };
        self.ctx
            .invalidate_parent(&target.location.mount.id, &target.location.sub_path);

        let confirmed = result?;
        info!(
            "aborted multipart upload {} (confirmed: {}, records deleted: {})",
            upload_id, confirmed, records_deleted
        );
        Ok(AbortOutcome {
            upload_id: upload_id.to_string(),
            confirmed,
            records_deleted,
        })
    }
}
