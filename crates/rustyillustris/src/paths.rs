//! On-disk naming of snapshot, catalog, offset, tree and cartesian chunks.

use std::path::{Path, PathBuf};

use rustyillustris_io::Backend;

use crate::error::{Error, Result};
use crate::offset_table::{chunk_number, SUBLINK_CHUNK_PREFIX};

/// `<base>/snapdir_NNN/snap_NNN.<chunk>.hdf5`, else the `snapshot_NNN` spelling.
pub fn snapshot_path<B: Backend>(backend: &B, base: &Path, snap: u32, chunk: usize) -> PathBuf {
    let dir = base.join(format!("snapdir_{snap:03}"));
    let primary = dir.join(format!("snap_{snap:03}.{chunk}.hdf5"));
    if backend.exists(&primary) {
        return primary;
    }
    dir.join(format!("snapshot_{snap:03}.{chunk}.hdf5"))
}

/// `<base>/groups_NNN/groups_NNN.<chunk>.hdf5`, else `fof_subhalo_tab_NNN`.
pub fn catalog_path<B: Backend>(backend: &B, base: &Path, snap: u32, chunk: usize) -> PathBuf {
    let dir = base.join(format!("groups_{snap:03}"));
    let legacy = dir.join(format!("groups_{snap:03}.{chunk}.hdf5"));
    if backend.exists(&legacy) {
        return legacy;
    }
    dir.join(format!("fof_subhalo_tab_{snap:03}.{chunk}.hdf5"))
}

/// `<parent of base>/postprocessing/offsets/offsets_NNN.hdf5`.
pub fn offsets_path(base: &Path, snap: u32) -> PathBuf {
    base.join("..")
        .join("postprocessing")
        .join("offsets")
        .join(format!("offsets_{snap:03}.hdf5"))
}

pub fn cartesian_path(base: &Path, snap: u32, chunk: usize) -> PathBuf {
    base.join(format!("cartesian_{snap:03}"))
        .join(format!("cartesian_{snap:03}.{chunk}.hdf5"))
}

/// First of the known SubLink locations holding tree chunks.
pub fn sublink_dir<B: Backend>(backend: &B, base: &Path, tree_name: &str) -> Result<PathBuf> {
    let candidates = [
        base.join("trees").join(tree_name),
        base.join("..").join("postprocessing").join("trees").join(tree_name),
        base.join("postprocessing").join("trees").join(tree_name),
    ];
    for dir in candidates {
        let listed = backend.list_dir(&dir)?;
        let has_chunks = listed
            .iter()
            .any(|p| chunk_number(p, SUBLINK_CHUNK_PREFIX).is_some());
        if has_chunks {
            return Ok(dir);
        }
    }
    Err(Error::NotFound(format!(
        "{tree_name} tree files under {}",
        base.display()
    )))
}

/// `<base>/trees/treedata/trees_sf1_135.<chunk>.hdf5`, else the
/// postprocessing `trees_sf1_099` location.
pub fn lhalotree_path<B: Backend>(backend: &B, base: &Path, chunk: i64) -> PathBuf {
    let original = base
        .join("trees")
        .join("treedata")
        .join(format!("trees_sf1_135.{chunk}.hdf5"));
    if backend.exists(&original) {
        return original;
    }
    base.join("..")
        .join("postprocessing")
        .join("trees")
        .join("LHaloTree")
        .join(format!("trees_sf1_099.{chunk}.hdf5"))
}

/// How per-entity offsets are stored for a snapshot's group catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLayout {
    /// `groups_NNN` chunks carrying `Offsets/*` datasets and `FileOffsets_*`
    /// header attributes.
    Legacy,
    /// `fof_subhalo_tab_NNN` chunks with a separate `offsets_NNN.hdf5`.
    OffsetsFile,
}

impl CatalogLayout {
    pub fn detect<B: Backend>(backend: &B, base: &Path, snap: u32) -> CatalogLayout {
        let first = catalog_path(backend, base, snap, 0);
        let is_fof = first
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("fof_subhalo"));
        if is_fof {
            CatalogLayout::OffsetsFile
        } else {
            CatalogLayout::Legacy
        }
    }
}
