//! The filesystem facade.
//!
//! Every operation takes the caller, resolves the path against the mounts
//! that caller can see, and then either composes a virtual listing or works
//! against the mount's bucket. Mutations refresh the mount's last-used time
//! and invalidate the cached listings they affect.

use std::time::SystemTime;

use bucketfs_types::{Caller, FileInfo, ListingResult};
use serde::Serialize;
use strum::{AsRefStr, Display};
use tracing::{debug, info, warn};

use super::context::{FilesystemContext, MountBackend};
use super::error::{ErrorKind, VfsError, VfsResult};
use super::lister::DirectoryLister;
use super::resolver::{MountResolver, ResolvedLocation};
use super::{mime, paths, virtual_dir};
use crate::multipart::{AbortOutcome, CompleteOutcome, MultipartCoordinator, MultipartSession};
use crate::store::{CompletedPart, ListRequest, StoreError, StoreResult};

/// Content type of directory marker objects.
const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// How a downloaded file should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Disposition {
    Attachment,
    Inline,
}

/// A file's bytes plus the headers needed to serve them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub name: String,
    pub content_type: String,
    pub content_length: u64,
    pub etag: Option<String>,
    pub last_modified: Option<SystemTime>,
    pub disposition: Disposition,
    pub body: Vec<u8>,
}

impl FileContent {
    /// `Content-Disposition` header value, with an RFC 5987 `filename*` for
    /// non-ASCII names.
    pub fn content_disposition(&self) -> String {
        let fallback: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
            .collect();
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            self.disposition,
            fallback,
            urlencoding::encode(&self.name)
        )
    }
}

/// Result of a single upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub path: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub etag: Option<String>,
    pub multipart: bool,
}

/// One failed path in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub path: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-path outcome of a batch removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRemoveResult {
    pub removed: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchRemoveResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The unified filesystem over every mount.
#[derive(Debug, Clone)]
pub struct Filesystem {
    ctx: FilesystemContext,
    lister: DirectoryLister,
    multipart: MultipartCoordinator,
}

impl Filesystem {
    pub fn new(ctx: FilesystemContext) -> Self {
        Self {
            lister: DirectoryLister::new(ctx.clone()),
            multipart: MultipartCoordinator::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &FilesystemContext {
        &self.ctx
    }

    pub fn multipart(&self) -> &MultipartCoordinator {
        &self.multipart
    }

    /// Resolve a path that must lie inside a mount.
    async fn locate(
        &self,
        caller: &Caller,
        path: &str,
    ) -> VfsResult<(ResolvedLocation, MountBackend)> {
        let location = self
            .ctx
            .resolver(caller)
            .await?
            .resolve(path)
            .ok_or_else(|| VfsError::no_mount_point(path))?;
        let backend = self.ctx.backend(&location.mount).await?;
        Ok((location, backend))
    }

    /// Like [`Self::locate`], but the mount root itself is refused.
    async fn locate_below_root(
        &self,
        caller: &Caller,
        path: &str,
    ) -> VfsResult<(ResolvedLocation, MountBackend)> {
        let resolver = self.ctx.resolver(caller).await?;
        let location = resolver
            .resolve(path)
            .ok_or_else(|| VfsError::no_mount_point(path))?;
        if location.is_mount_root() {
            return Err(VfsError::invalid_path(format!("{} is a mount root", path)));
        }
        let backend = self.ctx.backend(&location.mount).await?;
        Ok((location, backend))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// List a directory, virtual or backed.
    #[tracing::instrument(skip(self, caller), name = "fs.list_directory")]
    pub async fn list_directory(&self, caller: &Caller, path: &str) -> VfsResult<ListingResult> {
        let path = paths::as_directory(&paths::normalize(path)?);
        let resolver = self.ctx.resolver(caller).await?;
        match resolver.resolve(&path) {
            Some(location) => self.lister.list(&location).await,
            None if paths::is_root(&path) || resolver.has_mounts_under(&path) => {
                Ok(virtual_dir::compose(&path, resolver.mounts()))
            }
            None => Err(VfsError::not_found(path)),
        }
    }

    /// Metadata for a file or directory.
    ///
    /// Files are found by HEAD. When that misses, the path is checked as a
    /// directory by listing its prefix. Ancestors of mounts report as
    /// virtual directories.
    #[tracing::instrument(skip(self, caller), name = "fs.get_file_info")]
    pub async fn get_file_info(&self, caller: &Caller, path: &str) -> VfsResult<FileInfo> {
        let path = paths::normalize(path)?;
        let resolver = self.ctx.resolver(caller).await?;

        let location = resolver
            .resolve(&path)
            .or_else(|| resolver.resolve(&paths::as_directory(&path)).filter(|l| l.is_mount_root()));
        let Some(location) = location else {
            return virtual_info(&resolver, &path);
        };

        let dir_path = location.virtual_path(&paths::as_directory(&location.sub_path));
        if location.is_mount_root() {
            return Ok(FileInfo {
                mount_id: Some(location.mount.id.clone()),
                is_virtual: false,
                ..FileInfo::virtual_directory(dir_path, location.mount.display_name())
            });
        }

        let backend = self.ctx.backend(&location.mount).await?;
        let name = paths::file_name(&path).to_string();

        if !paths::is_directory(&path) {
            let key = backend.key(&location.sub_path);
            match backend.store.head_object(backend.bucket(), &key).await {
                Ok(meta) => {
                    return Ok(FileInfo {
                        path: location.virtual_path(&location.sub_path),
                        content_type: Some(
                            meta.content_type
                                .unwrap_or_else(|| mime::for_filename(&name).to_string()),
                        ),
                        name,
                        is_directory: false,
                        is_virtual: false,
                        size: Some(meta.size),
                        modified_at: meta.last_modified,
                        etag: meta.etag,
                        mount_id: Some(location.mount.id.clone()),
                        storage_key: Some(key),
                    });
                }
                Err(StoreError::NoSuchKey(_)) => {
                    debug!("no object at {}, checking for a directory", key);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if backend.directory_exists(&location.sub_path).await? {
            return Ok(FileInfo {
                mount_id: Some(location.mount.id.clone()),
                is_virtual: false,
                storage_key: Some(backend.dir_prefix(&location.sub_path)),
                ..FileInfo::virtual_directory(dir_path, name)
            });
        }
        Err(VfsError::not_found(path))
    }

    /// File bytes, served as an attachment.
    #[tracing::instrument(skip(self, caller), name = "fs.download_file")]
    pub async fn download_file(&self, caller: &Caller, path: &str) -> VfsResult<FileContent> {
        self.read_file(caller, path, Disposition::Attachment).await
    }

    /// File bytes, served inline.
    #[tracing::instrument(skip(self, caller), name = "fs.preview_file")]
    pub async fn preview_file(&self, caller: &Caller, path: &str) -> VfsResult<FileContent> {
        self.read_file(caller, path, Disposition::Inline).await
    }

    async fn read_file(
        &self,
        caller: &Caller,
        path: &str,
        disposition: Disposition,
    ) -> VfsResult<FileContent> {
        let path = paths::normalize(path)?;
        if paths::is_directory(&path) {
            return Err(VfsError::invalid_path(format!("{} is a directory", path)));
        }
        let (location, backend) = self.locate(caller, &path).await?;
        let key = backend.key(&location.sub_path);
        let data = match backend.store.get_object(backend.bucket(), &key).await {
            Ok(data) => data,
            Err(StoreError::NoSuchKey(_)) => return Err(VfsError::not_found(path)),
            Err(e) => return Err(e.into()),
        };

        let name = paths::file_name(&path).to_string();
        Ok(FileContent {
            content_type: data
                .meta
                .content_type
                .unwrap_or_else(|| mime::for_filename(&name).to_string()),
            content_length: data.body.len() as u64,
            etag: data.meta.etag,
            last_modified: data.meta.last_modified,
            disposition,
            body: data.body,
            name,
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a directory by writing a zero-byte marker object.
    #[tracing::instrument(skip(self, caller), name = "fs.create_directory")]
    pub async fn create_directory(&self, caller: &Caller, path: &str) -> VfsResult<FileInfo> {
        let path = paths::as_directory(&paths::normalize(path)?);
        let (location, backend) = self.locate(caller, &path).await?;
        if location.is_mount_root() {
            return Err(VfsError::already_exists(path));
        }

        let sub_path = &location.sub_path;
        let file_form = sub_path.trim_end_matches('/');
        if backend.directory_exists(sub_path).await? || backend.file_exists(file_form).await? {
            return Err(VfsError::already_exists(path));
        }
        if !backend.directory_exists(&paths::parent(sub_path)).await? {
            return Err(VfsError::not_found(paths::parent(&path)));
        }

        let key = backend.key(sub_path);
        backend
            .store
            .put_object(backend.bucket(), &key, Vec::new(), DIRECTORY_CONTENT_TYPE)
            .await?;

        self.ctx.invalidate_parent(&location.mount.id, sub_path);
        self.ctx.touch_mount(&location.mount.id).await;
        info!("created directory {}", path);

        Ok(FileInfo {
            mount_id: Some(location.mount.id.clone()),
            is_virtual: false,
            storage_key: Some(key),
            ..FileInfo::virtual_directory(path.clone(), paths::file_name(&path))
        })
    }

    /// Write a file.
    ///
    /// Payloads of at least the multipart threshold are uploaded in parts;
    /// a failed part aborts the upload. Smaller payloads use a single PUT
    /// with the content type inferred from the extension, else the one
    /// supplied.
    #[tracing::instrument(skip(self, caller, data, content_type), fields(len = data.len()), name = "fs.upload_file")]
    pub async fn upload_file(
        &self,
        caller: &Caller,
        path: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> VfsResult<UploadResult> {
        let path = paths::normalize(path)?;
        if paths::is_directory(&path) {
            return Err(VfsError::invalid_path(format!("{} is a directory", path)));
        }

        let size = data.len() as u64;
        if size >= self.ctx.config.multipart_threshold {
            return self.upload_multipart(caller, &path, data).await;
        }

        let (location, backend) = self.locate(caller, &path).await?;
        if !backend.directory_exists(&paths::parent(&location.sub_path)).await? {
            return Err(VfsError::not_found(paths::parent(&path)));
        }

        let name = paths::file_name(&path);
        let content_type = mime::from_filename(name)
            .or(content_type)
            .unwrap_or(mime::OCTET_STREAM)
            .to_string();
        let key = backend.key(&location.sub_path);
        let etag = backend
            .store
            .put_object(backend.bucket(), &key, data, &content_type)
            .await?;

        self.ctx.invalidate_parent(&location.mount.id, &location.sub_path);
        self.ctx.touch_mount(&location.mount.id).await;
        info!("uploaded {} ({} bytes)", path, size);

        Ok(UploadResult {
            path,
            key,
            size,
            content_type,
            etag,
            multipart: false,
        })
    }

    async fn upload_multipart(
        &self,
        caller: &Caller,
        path: &str,
        data: Vec<u8>,
    ) -> VfsResult<UploadResult> {
        let size = data.len() as u64;
        let session = self.multipart.initialize(caller, path, None, size, None).await?;
        let chunk = usize::try_from(session.recommended_part_size).unwrap_or(usize::MAX);

        let mut parts = Vec::new();
        for (index, part) in data.chunks(chunk.max(1)).enumerate() {
            let part_number = (index + 1) as i32;
            let uploaded = self
                .multipart
                .upload_part(caller, &session.path, &session.upload_id, part_number, part.to_vec())
                .await;
            match uploaded {
                Ok(part) => parts.push(part),
                Err(e) => {
                    warn!("part {} of {} failed, aborting: {}", part_number, session.path, e);
                    if let Err(abort_err) =
                        self.multipart.abort(caller, &session.path, &session.upload_id).await
                    {
                        warn!("abort of {} failed: {}", session.upload_id, abort_err);
                    }
                    return Err(e);
                }
            }
        }

        let outcome = match self
            .multipart
            .complete(caller, &session.path, &session.upload_id, parts)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("completion of {} failed, aborting: {}", session.path, e);
                if let Err(abort_err) =
                    self.multipart.abort(caller, &session.path, &session.upload_id).await
                {
                    warn!("abort of {} failed: {}", session.upload_id, abort_err);
                }
                return Err(e);
            }
        };
        Ok(UploadResult {
            path: outcome.path,
            key: outcome.key,
            size,
            content_type: session.content_type,
            etag: outcome.etag,
            multipart: true,
        })
    }

    /// Remove a file, or (trailing slash) a directory and everything in it.
    ///
    /// Returns how many objects were deleted. A directory with no objects
    /// under it is not found.
    #[tracing::instrument(skip(self, caller), name = "fs.remove_item")]
    pub async fn remove_item(&self, caller: &Caller, path: &str) -> VfsResult<usize> {
        let path = paths::normalize(path)?;
        let (location, backend) = self.locate_below_root(caller, &path).await?;
        let mount_id = &location.mount.id;
        let bucket = backend.bucket();

        let removed = if paths::is_directory(&path) {
            let prefix = backend.dir_prefix(&location.sub_path);
            let mut removed = 0;
            let deleted = delete_prefix(&backend, &prefix, &mut removed).await;
            if removed > 0 {
                self.ctx.cache.invalidate_subtree(mount_id, &location.sub_path);
            }
            if let Err(e) = deleted {
                if removed > 0 {
                    warn!("removal of {} stopped after {} objects: {}", path, removed, e);
                    self.ctx.invalidate_parent(mount_id, &location.sub_path);
                }
                return Err(e.into());
            }
            if removed == 0 {
                return Err(VfsError::not_found(path));
            }
            removed
        } else {
            let key = backend.key(&location.sub_path);
            if !backend.store.object_exists(bucket, &key).await? {
                return Err(VfsError::not_found(path));
            }
            backend.store.delete_object(bucket, &key).await?;
            1
        };

        self.ctx.invalidate_parent(mount_id, &location.sub_path);
        self.ctx.touch_mount(mount_id).await;
        info!("removed {} ({} objects)", path, removed);
        Ok(removed)
    }

    /// Move a file or directory within one mount.
    ///
    /// Both paths must resolve to the same mount and agree on being a file
    /// or a directory. The target must not exist and its parent must.
    /// Directories move object by object (copy, then delete).
    #[tracing::instrument(skip(self, caller), name = "fs.rename_item")]
    pub async fn rename_item(&self, caller: &Caller, from: &str, to: &str) -> VfsResult<()> {
        let from = paths::normalize(from)?;
        let to = paths::normalize(to)?;

        let resolver = self.ctx.resolver(caller).await?;
        let source = resolve_below_root(&resolver, &from)?;
        let target = resolve_below_root(&resolver, &to)?;
        if source.mount.id != target.mount.id {
            return Err(VfsError::CrossMount { from, to });
        }
        if paths::is_directory(&from) != paths::is_directory(&to) {
            return Err(VfsError::TypeMismatch { from, to });
        }
        let is_dir = paths::is_directory(&from);
        if is_dir && target.sub_path.starts_with(&source.sub_path) {
            return Err(VfsError::invalid_path(format!("cannot move {} into itself", from)));
        }

        let backend = self.ctx.backend(&source.mount).await?;
        let bucket = backend.bucket();
        let mount_id = &source.mount.id;

        let target_exists = if is_dir {
            backend.directory_exists(&target.sub_path).await?
                || backend.file_exists(target.sub_path.trim_end_matches('/')).await?
        } else {
            backend.file_exists(&target.sub_path).await?
                || backend.directory_exists(&paths::as_directory(&target.sub_path)).await?
        };
        if target_exists {
            return Err(VfsError::already_exists(to));
        }
        if !backend.directory_exists(&paths::parent(&target.sub_path)).await? {
            return Err(VfsError::not_found(paths::parent(&to)));
        }

        if is_dir {
            let from_prefix = backend.dir_prefix(&source.sub_path);
            let to_prefix = backend.dir_prefix(&target.sub_path);
            let objects = backend.store.list_all_objects(bucket, &from_prefix).await?;
            if objects.is_empty() {
                return Err(VfsError::not_found(from));
            }
            let mut copied = 0;
            let mut outcome = Ok(());
            for object in &objects {
                let rest = object.key.strip_prefix(&from_prefix).unwrap_or(&object.key);
                let dest = format!("{}{}", to_prefix, rest);
                if let Err(e) = move_object(&backend, &object.key, &dest, &mut copied).await {
                    outcome = Err(e);
                    break;
                }
            }
            if copied > 0 {
                self.ctx.cache.invalidate_subtree(mount_id, &source.sub_path);
                self.ctx.cache.invalidate_subtree(mount_id, &target.sub_path);
            }
            if let Err(e) = outcome {
                if copied > 0 {
                    warn!("move of {} stopped after {} objects: {}", from, copied, e);
                    self.ctx.invalidate_parent(mount_id, &source.sub_path);
                    self.ctx.invalidate_parent(mount_id, &target.sub_path);
                }
                return Err(e.into());
            }
            info!("moved {} -> {} ({} objects)", from, to, objects.len());
        } else {
            let from_key = backend.key(&source.sub_path);
            let to_key = backend.key(&target.sub_path);
            match backend.store.copy_object(bucket, &from_key, &to_key).await {
                Ok(()) => {}
                Err(StoreError::NoSuchKey(_)) => return Err(VfsError::not_found(from)),
                Err(e) => return Err(e.into()),
            }
            if let Err(e) = backend.store.delete_object(bucket, &from_key).await {
                warn!("copied {} to {} but could not delete the original: {}", from, to, e);
                self.ctx.invalidate_parent(mount_id, &target.sub_path);
                return Err(e.into());
            }
            info!("moved {} -> {}", from, to);
        }

        self.ctx.invalidate_parent(mount_id, &source.sub_path);
        self.ctx.invalidate_parent(mount_id, &target.sub_path);
        self.ctx.touch_mount(mount_id).await;
        Ok(())
    }

    /// Remove many paths, recording each outcome separately.
    #[tracing::instrument(skip(self, caller, paths), fields(count = paths.len()), name = "fs.batch_remove_items")]
    pub async fn batch_remove_items(&self, caller: &Caller, paths: &[String]) -> BatchRemoveResult {
        let mut result = BatchRemoveResult::default();
        for path in paths {
            match self.remove_item(caller, path).await {
                Ok(_) => result.removed.push(path.clone()),
                Err(e) => {
                    debug!("batch remove of {} failed: {}", path, e);
                    result.failed.push(BatchFailure {
                        path: path.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }
        result
    }

    // ========================================================================
    // Multipart
    // ========================================================================

    pub async fn initialize_multipart_upload(
        &self,
        caller: &Caller,
        path: &str,
        content_type: Option<&str>,
        size: u64,
        filename: Option<&str>,
    ) -> VfsResult<MultipartSession> {
        self.multipart
            .initialize(caller, path, content_type, size, filename)
            .await
    }

    pub async fn upload_part(
        &self,
        caller: &Caller,
        path: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> VfsResult<CompletedPart> {
        self.multipart
            .upload_part(caller, path, upload_id, part_number, data)
            .await
    }

    pub async fn complete_multipart_upload(
        &self,
        caller: &Caller,
        path: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> VfsResult<CompleteOutcome> {
        self.multipart.complete(caller, path, upload_id, parts).await
    }

    pub async fn abort_multipart_upload(
        &self,
        caller: &Caller,
        path: &str,
        upload_id: &str,
    ) -> VfsResult<AbortOutcome> {
        self.multipart.abort(caller, path, upload_id).await
    }
}

fn resolve_below_root(resolver: &MountResolver, path: &str) -> VfsResult<ResolvedLocation> {
    let location = resolver
        .resolve(path)
        .ok_or_else(|| VfsError::no_mount_point(path))?;
    if location.is_mount_root() {
        return Err(VfsError::invalid_path(format!("{} is a mount root", path)));
    }
    Ok(location)
}

/// Delete every object under `prefix`, page by page. `removed` counts the
/// deletions made so far, so a caller still knows what changed on error.
async fn delete_prefix(backend: &MountBackend, prefix: &str, removed: &mut usize) -> StoreResult<()> {
    let bucket = backend.bucket();
    let mut token = None;
    loop {
        let request = ListRequest::recursive(prefix).with_continuation_token(token);
        let page = backend.store.list_objects(bucket, &request).await?;
        for object in &page.objects {
            backend.store.delete_object(bucket, &object.key).await?;
            *removed += 1;
        }
        token = page.next_continuation_token;
        if token.is_none() {
            return Ok(());
        }
    }
}

/// Copy one object to `dest` and delete the original. `copied` is bumped
/// once the copy lands.
async fn move_object(
    backend: &MountBackend,
    key: &str,
    dest: &str,
    copied: &mut usize,
) -> StoreResult<()> {
    let bucket = backend.bucket();
    backend.store.copy_object(bucket, key, dest).await?;
    *copied += 1;
    backend.store.delete_object(bucket, key).await
}

/// Info for a path outside every mount.
fn virtual_info(resolver: &MountResolver, path: &str) -> VfsResult<FileInfo> {
    if paths::is_root(path) {
        return Ok(FileInfo::virtual_directory("/", ""));
    }
    if resolver.has_mounts_under(path) {
        return Ok(FileInfo::virtual_directory(
            paths::as_directory(path),
            paths::file_name(path),
        ));
    }
    Err(VfsError::not_found(path))
}
