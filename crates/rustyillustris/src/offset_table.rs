//! Cumulative row offsets over the chunk files of a merger tree collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustyillustris_io::{Backend, Container};
use tracing::debug;

use crate::error::{Error, Result};
use crate::locator;

/// File name prefix of SubLink tree chunks, `tree_extended.<n>.hdf5`.
pub const SUBLINK_CHUNK_PREFIX: &str = "tree_extended";

/// Dataset whose length gives the rows held by a tree chunk.
const ROW_COUNT_DATASET: &str = "SubhaloID";

/// Row offsets of every chunk in a tree directory, plus the total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    files: Vec<PathBuf>,
    offsets: Vec<i64>,
}

impl OffsetTable {
    /// Scan `dir` for `<prefix>.<n>.hdf5` chunks and count their rows.
    ///
    /// Only dataset metadata is read.
    pub fn build<B: Backend>(backend: &B, dir: &Path, prefix: &str) -> Result<OffsetTable> {
        let mut chunks: Vec<(u64, PathBuf)> = backend
            .list_dir(dir)?
            .into_iter()
            .filter_map(|p| chunk_number(&p, prefix).map(|n| (n, p)))
            .collect();
        if chunks.is_empty() {
            return Err(Error::NotFound(format!(
                "no {prefix}.*.hdf5 chunks in {}",
                dir.display()
            )));
        }
        chunks.sort();

        let mut counts = Vec::with_capacity(chunks.len());
        for (_, path) in &chunks {
            let file = backend.open(path)?;
            counts.push(file.dataset_info(ROW_COUNT_DATASET)?.rows());
        }
        let table = OffsetTable {
            files: chunks.into_iter().map(|(_, p)| p).collect(),
            offsets: locator::cumulative(&counts),
        };
        debug!(dir = %dir.display(), chunks = table.files.len(), rows = table.total(), "built offset table");
        Ok(table)
    }

    /// `[0, rows(chunk 0), ...]`, one entry per chunk plus the total.
    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn total(&self) -> i64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Chunk and local row of a global row.
    pub fn locate(&self, row: i64) -> Result<(usize, u64)> {
        locator::locate(row, &self.offsets)
    }

    pub fn file(&self, chunk: usize) -> Option<&Path> {
        self.files.get(chunk).map(PathBuf::as_path)
    }

    /// Rows held by one chunk.
    pub fn chunk_rows(&self, chunk: usize) -> u64 {
        match (self.offsets.get(chunk), self.offsets.get(chunk + 1)) {
            (Some(a), Some(b)) => (b - a) as u64,
            _ => 0,
        }
    }
}

/// `<prefix>.<n>.hdf5` -> `n`.
pub(crate) fn chunk_number(path: &Path, prefix: &str) -> Option<u64> {
    let digits = path
        .file_name()?
        .to_str()?
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(".hdf5")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Offset tables keyed by tree directory, built at most once per key.
#[derive(Debug, Default)]
pub struct OffsetCache {
    tables: Mutex<HashMap<PathBuf, Arc<Mutex<Option<Arc<OffsetTable>>>>>>,
}

impl OffsetCache {
    pub fn new() -> OffsetCache {
        OffsetCache::default()
    }

    /// The cached table for `key`, building it with `build` on first use.
    ///
    /// Concurrent callers for the same key wait for a single build; a failed
    /// build leaves the slot empty.
    pub fn get_or_build<F>(&self, key: &Path, build: F) -> Result<Arc<OffsetTable>>
    where
        F: FnOnce() -> Result<OffsetTable>,
    {
        let slot = Arc::clone(self.tables.lock().entry(key.to_path_buf()).or_default());
        let mut table = slot.lock();
        if let Some(cached) = table.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let built = Arc::new(build()?);
        *table = Some(Arc::clone(&built));
        Ok(built)
    }

    /// True if a table for `key` has been built.
    pub fn contains(&self, key: &Path) -> bool {
        let slot = self.tables.lock().get(key).cloned();
        slot.is_some_and(|s| s.lock().is_some())
    }

    pub fn clear(&self) {
        self.tables.lock().clear();
    }
}

/// Which offset cache a tree load uses.
#[derive(Debug, Clone, Copy, Default)]
pub enum CachePolicy<'a> {
    /// The cache owned by the simulation handle.
    #[default]
    Shared,
    /// Rebuild the table on every call.
    Disabled,
    Custom(&'a OffsetCache),
}
