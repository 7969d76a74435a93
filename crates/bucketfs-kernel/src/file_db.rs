//! SQLite persistence for file metadata.
//!
//! One row per stored file. Multipart uploads insert an `uploading` row at
//! initialization, flip it to `ready` on completion, and delete it (with its
//! secrets) on abort.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, Row, params};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::vfs::VfsResult;

/// Lifecycle state of a file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum FileStatus {
    Uploading,
    Ready,
}

/// A stored file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    /// Object key inside the mount's bucket.
    pub storage_path: String,
    pub mount_id: String,
    pub size: u64,
    pub etag: Option<String>,
    pub mimetype: String,
    pub owner: String,
    pub upload_id: Option<String>,
    pub status: FileStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields supplied when recording a file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFile {
    pub filename: String,
    pub storage_path: String,
    pub mount_id: String,
    pub size: u64,
    pub mimetype: String,
    pub owner: String,
    pub upload_id: Option<String>,
}

/// Durable file metadata.
pub trait FileMetadataStore: Send + Sync {
    /// Record an upload that has started but not completed.
    fn insert_pending(&self, file: &NewFile) -> VfsResult<FileRecord>;

    /// Mark an upload complete.
    ///
    /// The pending row for `file.upload_id` becomes `ready`; any other ready
    /// row for the same mount and storage path is removed. Without a pending
    /// row a fresh ready row is inserted.
    fn finalize_upload(&self, file: &NewFile, etag: Option<&str>) -> VfsResult<FileRecord>;

    /// Delete every record tied to an upload id. Secrets cascade.
    fn delete_by_upload_id(&self, upload_id: &str) -> VfsResult<usize>;

    /// Most recent record for a storage path.
    fn find_by_storage_path(&self, mount_id: &str, storage_path: &str)
    -> VfsResult<Option<FileRecord>>;

    fn find_by_upload_id(&self, upload_id: &str) -> VfsResult<Option<FileRecord>>;

    /// Attach a password or share secret to a file.
    fn attach_secret(&self, file_id: &str, secret_hash: &str) -> VfsResult<()>;

    fn secret_count(&self, file_id: &str) -> VfsResult<usize>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    mount_id TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    etag TEXT,
    mimetype TEXT NOT NULL,
    owner TEXT NOT NULL,
    upload_id TEXT,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (unixepoch()),
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);
CREATE INDEX IF NOT EXISTS idx_files_path ON files(mount_id, storage_path);
CREATE INDEX IF NOT EXISTS idx_files_upload ON files(upload_id);

-- Passwords and share secrets, removed with their file
CREATE TABLE IF NOT EXISTS file_secrets (
    id INTEGER PRIMARY KEY,
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    secret_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (unixepoch())
);
CREATE INDEX IF NOT EXISTS idx_file_secrets_file ON file_secrets(file_id);
"#;

const COLUMNS: &str = "id, filename, storage_path, mount_id, size, etag, mimetype, owner, \
                       upload_id, status, created_at, updated_at";

/// Database handle for file metadata.
pub struct FileDb {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for FileDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDb").finish_non_exhaustive()
    }
}

impl FileDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> SqliteResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &Row<'_>) -> SqliteResult<FileRecord> {
        let status: String = row.get(9)?;
        let size: i64 = row.get(4)?;
        Ok(FileRecord {
            id: row.get(0)?,
            filename: row.get(1)?,
            storage_path: row.get(2)?,
            mount_id: row.get(3)?,
            size: size.max(0) as u64,
            etag: row.get(5)?,
            mimetype: row.get(6)?,
            owner: row.get(7)?,
            upload_id: row.get(8)?,
            status: status.parse().unwrap_or(FileStatus::Ready),
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn get(conn: &Connection, id: &str) -> SqliteResult<FileRecord> {
        conn.query_row(
            &format!("SELECT {} FROM files WHERE id = ?1", COLUMNS),
            params![id],
            Self::row_to_record,
        )
    }

    fn insert(conn: &Connection, file: &NewFile, status: FileStatus, etag: Option<&str>) -> SqliteResult<String> {
        let id = Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO files (id, filename, storage_path, mount_id, size, etag, mimetype, owner, upload_id, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                file.filename,
                file.storage_path,
                file.mount_id,
                file.size as i64,
                etag,
                file.mimetype,
                file.owner,
                file.upload_id,
                status.as_ref(),
            ],
        )?;
        Ok(id)
    }
}

impl FileMetadataStore for FileDb {
    fn insert_pending(&self, file: &NewFile) -> VfsResult<FileRecord> {
        let conn = self.conn.lock();
        let id = Self::insert(&conn, file, FileStatus::Uploading, None)?;
        Ok(Self::get(&conn, &id)?)
    }

    fn finalize_upload(&self, file: &NewFile, etag: Option<&str>) -> VfsResult<FileRecord> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;

        let pending: Option<String> = match &file.upload_id {
            Some(upload_id) => tx
                .query_row(
                    "SELECT id FROM files WHERE upload_id = ?1 AND status = ?2 LIMIT 1",
                    params![upload_id, FileStatus::Uploading.as_ref()],
                    |row| row.get(0),
                )
                .optional()?,
            None => None,
        };

        tx.execute(
            "DELETE FROM files WHERE mount_id = ?1 AND storage_path = ?2 AND status = ?3
             AND id IS NOT ?4",
            params![file.mount_id, file.storage_path, FileStatus::Ready.as_ref(), pending],
        )?;

        let id = match pending {
            Some(id) => {
                tx.execute(
                    "UPDATE files SET status = ?2, etag = ?3, size = ?4, mimetype = ?5,
                     updated_at = unixepoch() WHERE id = ?1",
                    params![
                        id,
                        FileStatus::Ready.as_ref(),
                        etag,
                        file.size as i64,
                        file.mimetype,
                    ],
                )?;
                id
            }
            None => Self::insert(&tx, file, FileStatus::Ready, etag)?,
        };

        let record = Self::get(&tx, &id)?;
        tx.commit()?;
        Ok(record)
    }

    fn delete_by_upload_id(&self, upload_id: &str) -> VfsResult<usize> {
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM files WHERE upload_id = ?1", params![upload_id])?;
        Ok(count)
    }

    fn find_by_storage_path(
        &self,
        mount_id: &str,
        storage_path: &str,
    ) -> VfsResult<Option<FileRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM files WHERE mount_id = ?1 AND storage_path = ?2
                     ORDER BY updated_at DESC, id DESC LIMIT 1",
                    COLUMNS
                ),
                params![mount_id, storage_path],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_upload_id(&self, upload_id: &str) -> VfsResult<Option<FileRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {} FROM files WHERE upload_id = ?1 LIMIT 1", COLUMNS),
                params![upload_id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn attach_secret(&self, file_id: &str, secret_hash: &str) -> VfsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO file_secrets (file_id, secret_hash) VALUES (?1, ?2)",
            params![file_id, secret_hash],
        )?;
        Ok(())
    }

    fn secret_count(&self, file_id: &str) -> VfsResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM file_secrets WHERE file_id = ?1",
            params![file_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_file(upload_id: Option<&str>) -> NewFile {
        NewFile {
            filename: "big.bin".into(),
            storage_path: "files/big.bin".into(),
            mount_id: "m".into(),
            size: 10,
            mimetype: "application/octet-stream".into(),
            owner: "admin:root".into(),
            upload_id: upload_id.map(String::from),
        }
    }

    #[test]
    fn test_pending_then_finalize() {
        let db = FileDb::in_memory().unwrap();
        let pending = db.insert_pending(&new_file(Some("u1"))).unwrap();
        assert_eq!(pending.status, FileStatus::Uploading);
        assert!(pending.etag.is_none());

        let ready = db.finalize_upload(&new_file(Some("u1")), Some("\"abc\"")).unwrap();
        assert_eq!(ready.id, pending.id);
        assert_eq!(ready.status, FileStatus::Ready);
        assert_eq!(ready.etag.as_deref(), Some("\"abc\""));
    }

    #[test]
    fn test_finalize_replaces_older_ready_row() {
        let db = FileDb::in_memory().unwrap();
        db.finalize_upload(&new_file(Some("old")), None).unwrap();
        db.insert_pending(&new_file(Some("new"))).unwrap();
        let ready = db.finalize_upload(&new_file(Some("new")), None).unwrap();

        let found = db.find_by_storage_path("m", "files/big.bin").unwrap().unwrap();
        assert_eq!(found.id, ready.id);
        assert!(db.find_by_upload_id("old").unwrap().is_none());
    }

    #[test]
    fn test_finalize_twice_keeps_one_row() {
        let db = FileDb::in_memory().unwrap();
        db.insert_pending(&new_file(Some("u1"))).unwrap();
        db.finalize_upload(&new_file(Some("u1")), None).unwrap();
        db.finalize_upload(&new_file(Some("u1")), None).unwrap();
        assert_eq!(db.delete_by_upload_id("u1").unwrap(), 1);
    }

    #[test]
    fn test_delete_cascades_secrets() {
        let db = FileDb::in_memory().unwrap();
        let record = db.insert_pending(&new_file(Some("u1"))).unwrap();
        db.attach_secret(&record.id, "hash-1").unwrap();
        db.attach_secret(&record.id, "hash-2").unwrap();
        assert_eq!(db.secret_count(&record.id).unwrap(), 2);

        assert_eq!(db.delete_by_upload_id("u1").unwrap(), 1);
        assert_eq!(db.secret_count(&record.id).unwrap(), 0);
        assert!(db.find_by_upload_id("u1").unwrap().is_none());
    }

    #[test]
    fn test_attach_secret_requires_file() {
        let db = FileDb::in_memory().unwrap();
        assert!(db.attach_secret("missing", "hash").is_err());
    }

    #[test]
    fn test_on_disk_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.db");
        {
            let db = FileDb::open(&path).unwrap();
            db.insert_pending(&new_file(Some("u1"))).unwrap();
        }
        let db = FileDb::open(&path).unwrap();
        assert!(db.find_by_upload_id("u1").unwrap().is_some());
    }
}
