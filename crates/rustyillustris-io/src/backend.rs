//! Filesystem and in-memory backends.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::container::Backend;
use crate::error::{Error, Result};
use crate::h5file::H5File;

/// Opens memory-mapped files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBackend;

impl Backend for FsBackend {
    type File = H5File;

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn open(&self, path: &Path) -> Result<H5File> {
        H5File::open(path)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// HDF5 file images held in memory, keyed by lexically normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemBackend {
    files: BTreeMap<PathBuf, Arc<[u8]>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file image.
    pub fn insert(&mut self, path: impl AsRef<Path>, bytes: Vec<u8>) {
        self.files.insert(normalize(path.as_ref()), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Backend for MemBackend {
    type File = H5File;

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn open(&self, path: &Path) -> Result<H5File> {
        let key = normalize(path);
        match self.files.get(&key) {
            Some(bytes) => H5File::from_shared(key, Arc::clone(bytes)),
            None => Err(Error::NotFound(path.display().to_string())),
        }
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let dir = normalize(dir);
        Ok(self
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .cloned()
            .collect())
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
