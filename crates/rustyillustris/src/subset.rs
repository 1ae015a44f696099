//! Particle ranges of single halos and subhalos within a snapshot.
//!
//! Snapshots store particles sorted by halo and subhalo, so one object's
//! particles of each type form a contiguous range. The group catalog
//! records the length of that range, the offsets files (or the catalog
//! chunks themselves in older releases) its start, and the first particle
//! of each type stored in every snapshot chunk.

use std::collections::BTreeMap;

use rustyillustris_io::{AttrValue, Backend, Container};
use tracing::debug;

use crate::array::FieldSet;
use crate::error::{Error, Result};
use crate::locator;
use crate::part_type::{PartType, NUM_PART_TYPES};
use crate::paths::{catalog_path, offsets_path, CatalogLayout};
use crate::reader::{read_array, read_i64s};
use crate::simulation::{header, header_i64, header_i64_vec, Simulation};

/// Halo (FoF group) or subhalo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Group,
    Subhalo,
}

impl EntityKind {
    /// Catalog group holding this kind's fields.
    pub fn group_name(self) -> &'static str {
        match self {
            EntityKind::Group => "Group",
            EntityKind::Subhalo => "Subhalo",
        }
    }

    /// `N{name}_Total` / `N{name}_ThisFile` spelling in catalog headers,
    /// following whichever convention `header` uses.
    pub(crate) fn count_name(self, header: &BTreeMap<String, AttrValue>) -> &'static str {
        match self {
            EntityKind::Group => "groups",
            EntityKind::Subhalo if header.contains_key("Nsubgroups_Total") => "subgroups",
            EntityKind::Subhalo => "subhalos",
        }
    }
}

/// Catalog chunk and local row of one halo or subhalo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogRow {
    pub chunk: usize,
    pub row: u64,
}

/// Per-type particle ranges of one object plus the snapshot's per-chunk
/// particle offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSubset {
    pub kind: EntityKind,
    pub id: u64,
    /// Particles of each type belonging to the object.
    pub len_type: Vec<i64>,
    /// Global index of the object's first particle of each type.
    pub offset_type: Vec<i64>,
    /// `snap_offsets[type][chunk]`: global index of the first particle of
    /// each type stored in each snapshot chunk.
    pub snap_offsets: Vec<Vec<i64>>,
    /// TNG-Cluster `OriginalZooms` tables, when the offsets file has them.
    pub original_zooms: Option<FieldSet>,
}

impl SnapshotSubset {
    pub fn count(&self, part_type: PartType) -> u64 {
        self.len_type
            .get(part_type.index())
            .copied()
            .unwrap_or(0)
            .max(0) as u64
    }

    /// Snapshot chunk and local offset of the first particle of `part_type`.
    pub fn start(&self, part_type: PartType) -> Result<(usize, u64)> {
        let pt = part_type.index();
        let (offset, starts) = self
            .offset_type
            .get(pt)
            .zip(self.snap_offsets.get(pt))
            .ok_or_else(|| Error::NotFound(format!("snapshot offsets of particle type {part_type}")))?;
        locator::locate_start(*offset, starts)
    }

    /// The same object with other per-type lengths and offsets.
    pub fn with_ranges(&self, len_type: Vec<i64>, offset_type: Vec<i64>) -> SnapshotSubset {
        SnapshotSubset {
            len_type,
            offset_type,
            ..self.clone()
        }
    }
}

/// Split a row-major `rows x cols` table into rows, or into columns when
/// `transpose` is set.
fn table(values: &[i64], rows: usize, cols: usize, transpose: bool) -> Vec<Vec<i64>> {
    if transpose {
        (0..cols)
            .map(|c| (0..rows).map(|r| values[r * cols + c]).collect())
            .collect()
    } else {
        values.chunks(cols.max(1)).map(<[i64]>::to_vec).collect()
    }
}

impl<B: Backend> Simulation<B> {
    /// Which offset storage the group catalog of `snap` uses.
    pub fn catalog_layout(&self, snap: u32) -> CatalogLayout {
        CatalogLayout::detect(self.backend(), self.base_path(), snap)
    }

    pub(crate) fn open_catalog_chunk(&self, snap: u32, chunk: usize) -> Result<B::File> {
        self.open_file(&catalog_path(self.backend(), self.base_path(), snap, chunk))
    }

    pub(crate) fn open_offsets_file(&self, snap: u32) -> Result<B::File> {
        self.open_file(&offsets_path(self.base_path(), snap))
    }

    /// Locate a halo or subhalo among the catalog chunks.
    ///
    /// IDs outside the catalog's declared total are `NotFound`.
    pub fn catalog_row(&self, snap: u32, kind: EntityKind, id: u64) -> Result<CatalogRow> {
        let first = self.open_catalog_chunk(snap, 0)?;
        let hdr = header(&first)?;
        let total = header_i64(&hdr, &format!("N{}_Total", kind.count_name(&hdr)))?;
        let name = kind.group_name();
        let mut offsets = match self.catalog_layout(snap) {
            CatalogLayout::Legacy => header_i64_vec(&hdr, &format!("FileOffsets_{name}"))?,
            CatalogLayout::OffsetsFile => {
                read_i64s(&self.open_offsets_file(snap)?, &format!("FileOffsets/{name}"), None)?
            }
        };
        offsets.push(total);
        let index = i64::try_from(id)
            .map_err(|_| Error::NotFound(format!("{name} {id} outside 0..{total}")))?;
        let (chunk, row) = locator::locate(index, &offsets)
            .map_err(|_| Error::NotFound(format!("{name} {id} outside 0..{total}")))?;
        debug!(snap, kind = name, id, chunk, row, "located catalog row");
        Ok(CatalogRow { chunk, row })
    }

    /// Particle ranges of one halo or subhalo in snapshot `snap`.
    pub fn resolve_subset(&self, snap: u32, kind: EntityKind, id: u64) -> Result<SnapshotSubset> {
        let name = kind.group_name();
        let loc = self.catalog_row(snap, kind, id)?;
        let chunk = self.open_catalog_chunk(snap, loc.chunk)?;
        let one_row = Some(loc.row..loc.row + 1);
        let len_type = read_i64s(&chunk, &format!("{name}/{name}LenType"), one_row.clone())?;

        let (offset_type, snap_offsets, original_zooms) = match self.catalog_layout(snap) {
            CatalogLayout::Legacy => {
                let hdr = header(&self.open_catalog_chunk(snap, 0)?)?;
                let snap_attr = hdr
                    .get("FileOffsets_Snap")
                    .ok_or_else(|| Error::MissingField("Header/FileOffsets_Snap".into()))?;
                let values = snap_attr
                    .to_i64_vec()
                    .ok_or_else(|| Error::InvalidArgument("FileOffsets_Snap is not integer".into()))?;
                let chunks = values.len() / NUM_PART_TYPES;
                let snap_offsets = match snap_attr.shape.as_slice() {
                    // stored type-major
                    [types, _] if *types as usize == NUM_PART_TYPES => {
                        table(&values, NUM_PART_TYPES, chunks, false)
                    }
                    _ => table(&values, chunks, NUM_PART_TYPES, true),
                };
                let offset_type = read_i64s(&chunk, &format!("Offsets/{name}_SnapByType"), one_row)?;
                (offset_type, snap_offsets, None)
            }
            CatalogLayout::OffsetsFile => {
                let off = self.open_offsets_file(snap)?;
                let by_chunk = read_array(&off, "FileOffsets/SnapByType", None)?;
                let values = by_chunk
                    .to_i64_vec()
                    .ok_or_else(|| Error::InvalidArgument("FileOffsets/SnapByType is not integer".into()))?;
                let snap_offsets = table(&values, by_chunk.rows(), by_chunk.row_len(), true);
                let offset_type = read_i64s(&off, &format!("{name}/SnapByType"), Some(id..id + 1))?;
                let zooms = if off.contains("OriginalZooms") {
                    let tables = off.datasets("OriginalZooms")?;
                    let mut set = FieldSet::new(0);
                    for t in tables {
                        let array = read_array(&off, &format!("OriginalZooms/{t}"), None)?;
                        set.count = set.count.max(array.rows() as u64);
                        set.insert(t, array);
                    }
                    Some(set)
                } else {
                    None
                };
                (offset_type, snap_offsets, zooms)
            }
        };

        Ok(SnapshotSubset {
            kind,
            id,
            len_type,
            offset_type,
            snap_offsets,
            original_zooms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subset() -> SnapshotSubset {
        SnapshotSubset {
            kind: EntityKind::Subhalo,
            id: 7,
            len_type: vec![3, 0, 0, 0, 5, 0],
            offset_type: vec![12, 0, 0, 0, 4, 0],
            snap_offsets: vec![vec![0, 10, 10, 20], vec![0; 4], vec![0; 4], vec![0; 4], vec![0, 2, 6, 6], vec![0; 4]],
            original_zooms: None,
        }
    }

    #[test]
    fn start_skips_empty_snapshot_chunks() {
        let s = subset();
        assert_eq!(s.count(PartType::GAS), 3);
        assert_eq!(s.start(PartType::GAS).unwrap(), (2, 2));
        assert_eq!(s.start(PartType::STARS).unwrap(), (1, 2));
        assert_eq!(s.count(PartType::DM), 0);
    }

    #[test]
    fn ranges_replaced() {
        let s = subset().with_ranges(vec![1; 6], vec![0; 6]);
        assert_eq!(s.count(PartType::BLACK_HOLES), 1);
        assert_eq!(s.id, 7);
        assert_eq!(s.snap_offsets.len(), 6);
    }

    #[test]
    fn offset_tables() {
        let values = [0, 1, 2, 3, 4, 5];
        assert_eq!(table(&values, 2, 3, false), vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(table(&values, 2, 3, true), vec![vec![0, 3], vec![1, 4], vec![2, 5]]);
    }

    #[test]
    fn count_name_convention() {
        let mut hdr = BTreeMap::new();
        assert_eq!(EntityKind::Subhalo.count_name(&hdr), "subhalos");
        hdr.insert("Nsubgroups_Total".to_string(), AttrValue::int(vec![4]));
        assert_eq!(EntityKind::Subhalo.count_name(&hdr), "subgroups");
        assert_eq!(EntityKind::Group.count_name(&hdr), "groups");
    }
}
