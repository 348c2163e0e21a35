//! Persistent metadata store backed by redb.
//!
//! Byte-level primitives shared by every collection. Each mutating commit
//! writes the current apply index under [`APPLY_INDEX_KEY`] in the same
//! write transaction as the data, so recovery never sees one without the
//! other.
//!
//! Commits are non-durable by default. A durable commit happens on
//! [`MetaStore::flush`], or automatically once more than
//! `write_buffer_size` payload bytes have accumulated since the last one.

use crate::codec::CollectionTag;
use crate::collection::{Collection, DentryTree, ExtendTree, InodeTree, MultipartTree};
use crate::error::{StoreError, StoreResult};
use crate::snapshot::MetaSnapshot;
use crate::tables::{self, APPLY_INDEX_KEY};
use metanode_common::StoreConfig;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use redb::{Builder, Database, Durability, ReadableTable, WriteTransaction};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, info};

/// File name of the redb database inside the store directory
pub const DB_FILE_NAME: &str = "metadata.redb";

type MetaTable<'txn> = redb::Table<'txn, &'static [u8], &'static [u8]>;

/// Persistent metadata store backed by redb.
///
/// The store is shared by reference between all collection facades and
/// callers. Reads and writes rely on redb's own concurrency control; the
/// lock around the handle only guards [`MetaStore::release`].
#[derive(Debug)]
pub struct MetaStore {
    path: PathBuf,
    db: RwLock<Option<Database>>,
    apply_index: AtomicU64,
    write_buffer_size: usize,
    /// Payload bytes committed non-durably since the last durable commit
    unsynced_bytes: AtomicUsize,
}

fn open_error(
    path: &Path,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> StoreError {
    StoreError::Open {
        path: path.to_path_buf(),
        source: source.into(),
    }
}

fn decode_apply_index(bytes: &[u8]) -> StoreResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::CorruptApplyIndex(bytes.len()))?;
    Ok(u64::from_be_bytes(raw))
}

fn read_apply_index(db: &Database) -> StoreResult<u64> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(tables::METADATA)?;
    match table.get(APPLY_INDEX_KEY)? {
        Some(val) => decode_apply_index(val.value()),
        None => Ok(0),
    }
}

impl MetaStore {
    /// Open (or create) the store under `dir`.
    ///
    /// The directory is created if missing. The in-memory apply index
    /// starts at the persisted value so a restarted node knows where to
    /// resume log replay.
    pub fn open(
        dir: impl AsRef<Path>,
        cache_size: usize,
        write_buffer_size: usize,
    ) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| open_error(dir, e))?;

        let db = Builder::new()
            .set_cache_size(cache_size)
            .create(dir.join(DB_FILE_NAME))
            .map_err(|e| open_error(dir, e))?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write().map_err(|e| open_error(dir, e))?;
        write_txn
            .open_table(tables::METADATA)
            .map_err(|e| open_error(dir, e))?;
        write_txn.commit().map_err(|e| open_error(dir, e))?;

        let applied = read_apply_index(&db).map_err(|e| open_error(dir, e))?;
        info!(
            "Opened metadata store at {:?} (apply index {})",
            dir, applied
        );

        Ok(Self {
            path: dir.to_path_buf(),
            db: RwLock::new(Some(db)),
            apply_index: AtomicU64::new(applied),
            write_buffer_size,
            unsynced_bytes: AtomicUsize::new(0),
        })
    }

    /// Open using a [`StoreConfig`]
    pub fn open_with_config(config: &StoreConfig) -> StoreResult<Self> {
        Self::open(&config.data_dir, config.cache_size, config.write_buffer_size)
    }

    /// Store directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn db(&self) -> StoreResult<MappedRwLockReadGuard<'_, Database>> {
        RwLockReadGuard::try_map(self.db.read(), Option::as_ref).map_err(|_| StoreError::Closed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.db.read().is_none()
    }

    // ---- Apply index ----

    /// Record the replicated-log position applied to this store. It is
    /// persisted by the next `put` or `delete`.
    pub fn set_apply_index(&self, index: u64) {
        let prev = self.apply_index.swap(index, Ordering::AcqRel);
        debug!("apply index {} -> {}", prev, index);
    }

    #[must_use]
    pub fn apply_index(&self) -> u64 {
        self.apply_index.load(Ordering::Acquire)
    }

    /// Apply index as last committed alongside data (0 if never written)
    pub fn persisted_apply_index(&self) -> StoreResult<u64> {
        let db = self.db()?;
        read_apply_index(&db)
    }

    fn stamp_apply_index(&self, table: &mut MetaTable<'_>) -> StoreResult<()> {
        let index = self.apply_index().to_be_bytes();
        table.insert(APPLY_INDEX_KEY, index.as_slice())?;
        Ok(())
    }

    // ---- Point operations ----

    pub fn get_bytes(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(tables::METADATA)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    /// True if a non-empty value is stored at `key`. An empty value reads
    /// the same as an absent one.
    pub fn has_key(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get_bytes(key)?.is_some_and(|v| !v.is_empty()))
    }

    /// Write `value` at `key` together with the current apply index
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::METADATA)?;
            table.insert(key, value)?;
            self.stamp_apply_index(&mut table)?;
        }
        self.commit(write_txn, key.len() + value.len())
    }

    /// Write `value` only if `key` holds no non-empty value. The check and
    /// the write share one write transaction. Returns whether it wrote.
    pub fn put_if_absent(&self, key: &[u8], value: &[u8]) -> StoreResult<bool> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(tables::METADATA)?;
            // Read and check, then drop the guard before mutating
            let occupied = table.get(key)?.is_some_and(|v| !v.value().is_empty());
            if occupied {
                false
            } else {
                table.insert(key, value)?;
                self.stamp_apply_index(&mut table)?;
                true
            }
        };
        if inserted {
            self.commit(write_txn, key.len() + value.len())?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Remove `key` together with writing the current apply index
    pub fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::METADATA)?;
            table.remove(key)?;
            self.stamp_apply_index(&mut table)?;
        }
        self.commit(write_txn, key.len())
    }

    fn commit(&self, mut write_txn: WriteTransaction, payload: usize) -> StoreResult<()> {
        // Accounted while the write transaction is still open: redb admits
        // one writer at a time until commit returns.
        let pending = self
            .unsynced_bytes
            .load(Ordering::Acquire)
            .saturating_add(payload);
        let durable = pending >= self.write_buffer_size;
        if durable {
            write_txn.set_durability(Durability::Immediate);
            self.unsynced_bytes.store(0, Ordering::Release);
        } else {
            write_txn.set_durability(Durability::None);
            self.unsynced_bytes.store(pending, Ordering::Release);
        }
        write_txn.commit()?;
        if durable {
            debug!("durable commit after {} buffered bytes", pending);
        }
        Ok(())
    }

    /// Make every committed write durable
    pub fn flush(&self) -> StoreResult<()> {
        let db = self.db()?;
        let mut write_txn = db.begin_write()?;
        write_txn.set_durability(Durability::Immediate);
        let flushed = self.unsynced_bytes.swap(0, Ordering::AcqRel);
        write_txn.commit()?;
        info!("Flushed metadata store at {:?} ({} bytes)", self.path, flushed);
        Ok(())
    }

    // ---- Scans ----

    /// Capture the committed state as an immutable view
    pub fn new_snapshot(&self) -> StoreResult<MetaSnapshot> {
        let db = self.db()?;
        Ok(MetaSnapshot::new(db.begin_read()?))
    }

    /// Visit values of keys in `[start, end]` in key order from a fresh
    /// snapshot. Stops when `visit` returns `Ok(false)` or an error.
    pub fn range<F, E>(&self, start: &[u8], end: &[u8], visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<bool, E>,
        E: From<StoreError>,
    {
        let snapshot = self.new_snapshot()?;
        snapshot.range_bytes(start, end, visit)
    }

    /// Same as [`MetaStore::range`] but reading through `snapshot`
    pub fn range_with_snapshot<F, E>(
        &self,
        snapshot: &MetaSnapshot,
        start: &[u8],
        end: &[u8],
        visit: F,
    ) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<bool, E>,
        E: From<StoreError>,
    {
        snapshot.range_bytes(start, end, visit)
    }

    /// Number of records in a collection.
    ///
    /// This walks the whole collection; keep it off hot paths.
    pub fn count(&self, tag: CollectionTag) -> StoreResult<u64> {
        self.new_snapshot()?.count(tag)
    }

    // ---- Collections ----

    #[must_use]
    pub const fn inodes(&self) -> InodeTree<'_> {
        Collection::new(self)
    }

    #[must_use]
    pub const fn dentries(&self) -> DentryTree<'_> {
        Collection::new(self)
    }

    #[must_use]
    pub const fn extends(&self) -> ExtendTree<'_> {
        Collection::new(self)
    }

    #[must_use]
    pub const fn multiparts(&self) -> MultipartTree<'_> {
        Collection::new(self)
    }

    // ---- Lifecycle ----

    /// Close the database. Safe to call more than once; later operations
    /// fail with [`StoreError::Closed`]. Waits for in-flight operations.
    pub fn release(&self) {
        let mut guard = self.db.write();
        if let Some(db) = guard.take() {
            drop(db);
            info!("Released metadata store at {:?}", self.path);
        }
    }
}

impl Drop for MetaStore {
    fn drop(&mut self) {
        self.release();
    }
}
