//! Particle reads from snapshot chunks.

use std::collections::BTreeMap;

use rustyillustris_io::{AttrValue, Backend};
use tracing::{debug, info_span};

use crate::array::{Array, FieldSet, Fields};
use crate::config::ReadOptions;
use crate::error::{Error, Result};
use crate::paths::snapshot_path;
use crate::part_type::{PartType, NUM_PART_TYPES};
use crate::reader::{read_i64_at, ChunkSource, LocalCount};
use crate::simulation::{header, header_i64, header_i64_vec, Simulation};
use crate::subset::{EntityKind, SnapshotSubset};

impl<B: Backend> Simulation<B> {
    /// `Header` attributes of the first chunk of snapshot `snap`.
    pub fn snapshot_header(&self, snap: u32) -> Result<BTreeMap<String, AttrValue>> {
        header(&self.open_file(&snapshot_path(self.backend(), self.base_path(), snap, 0))?)
    }

    /// Total particles of each type.
    ///
    /// With `NumPart_Total_HighWord` present, `NumPart_Total` holds the low
    /// 32 bits; without it, `NumPart_Total` is the full count.
    pub fn num_part(&self, snap: u32) -> Result<Vec<u64>> {
        let hdr = self.snapshot_header(snap)?;
        let low = header_i64_vec(&hdr, "NumPart_Total")?;
        let Some(high) = hdr.get("NumPart_Total_HighWord") else {
            return Ok(low.into_iter().map(|l| l as u64).collect());
        };
        let high = high
            .to_i64_vec()
            .ok_or_else(|| Error::InvalidArgument("NumPart_Total_HighWord is not integer".into()))?;
        Ok(low
            .iter()
            .zip(high.iter().chain(std::iter::repeat(&0)))
            .map(|(&l, &h)| ((l as u64) & 0xffff_ffff) | ((h as u64) << 32))
            .collect())
    }

    fn snapshot_source(&self, snap: u32, part_type: PartType) -> Result<ChunkSource<'_, B>> {
        let chunks = header_i64(&self.snapshot_header(snap)?, "NumFilesPerSnapshot")?.max(0) as usize;
        let paths = (0..chunks)
            .map(|c| snapshot_path(self.backend(), self.base_path(), snap, c))
            .collect();
        Ok(ChunkSource::new(
            self.backend(),
            paths,
            part_type.group_name(),
            LocalCount::Indexed("NumPart_ThisFile".into(), part_type.index()),
        ))
    }

    /// Where a read of `part_type` starts and how many particles it covers.
    fn subset_extent(
        &self,
        snap: u32,
        part_type: PartType,
        subset: Option<&SnapshotSubset>,
    ) -> Result<(u64, usize, u64)> {
        match subset {
            Some(s) => {
                let count = s.count(part_type);
                if count == 0 {
                    return Ok((0, 0, 0));
                }
                let (chunk, offset) = s.start(part_type)?;
                Ok((count, chunk, offset))
            }
            None => {
                let totals = self.num_part(snap)?;
                let count = totals.get(part_type.index()).copied().unwrap_or(0);
                Ok((count, 0, 0))
            }
        }
    }

    /// Read fields of one particle type, for the whole snapshot or for the
    /// particles of `subset`.
    pub fn load_subset(
        &self,
        snap: u32,
        part_type: PartType,
        fields: impl Into<Fields>,
        subset: Option<&SnapshotSubset>,
        opts: &ReadOptions,
    ) -> Result<FieldSet> {
        let _span = info_span!("load_subset", snap, part_type = %part_type).entered();
        let (count, chunk, offset) = self.subset_extent(snap, part_type, subset)?;
        if count == 0 {
            debug!("no particles of this type");
            return Ok(FieldSet::new(0));
        }
        self.field_reader(self.snapshot_source(snap, part_type)?, opts)?
            .read_fields(&fields.into(), count, chunk, offset)
    }

    /// Read a single field; an empty selection gives a zero-row array.
    pub fn load_subset_field(
        &self,
        snap: u32,
        part_type: PartType,
        field: &str,
        subset: Option<&SnapshotSubset>,
        opts: &ReadOptions,
    ) -> Result<Array> {
        let _span = info_span!("load_subset_field", snap, part_type = %part_type, field).entered();
        let (count, chunk, offset) = self.subset_extent(snap, part_type, subset)?;
        self.field_reader(self.snapshot_source(snap, part_type)?, opts)?
            .read_field(field, count, chunk, offset)
    }

    /// Particles of one FoF halo.
    pub fn load_halo(&self, snap: u32, id: u64, part_type: PartType, fields: impl Into<Fields>) -> Result<FieldSet> {
        let subset = self.resolve_subset(snap, EntityKind::Group, id)?;
        self.load_subset(snap, part_type, fields, Some(&subset), &ReadOptions::default())
    }

    /// Particles of one subhalo.
    pub fn load_subhalo(
        &self,
        snap: u32,
        id: u64,
        part_type: PartType,
        fields: impl Into<Fields>,
    ) -> Result<FieldSet> {
        let subset = self.resolve_subset(snap, EntityKind::Subhalo, id)?;
        self.load_subset(snap, part_type, fields, Some(&subset), &ReadOptions::default())
    }

    /// Particles of the original zoom region of a TNG-Cluster halo: its FoF
    /// particles followed by the outer fuzz.
    pub fn load_original_zoom(
        &self,
        snap: u32,
        id: u64,
        part_type: PartType,
        fields: impl Into<Fields>,
        opts: &ReadOptions,
    ) -> Result<FieldSet> {
        let _span = info_span!("load_original_zoom", snap, id).entered();
        let fields = fields.into();
        let subset = self.resolve_subset(snap, EntityKind::Group, id)?;
        let zooms = subset
            .original_zooms
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("OriginalZooms tables for snapshot {snap}")))?;

        let loc = self.catalog_row(snap, EntityKind::Group, id)?;
        let chunk = self.open_catalog_chunk(snap, loc.chunk)?;
        let orig_id = match read_i64_at(&chunk, "Group/GroupOrigHaloID", loc.row) {
            Ok(v) => v,
            Err(Error::MissingField(_)) => {
                return Err(Error::InvalidArgument(format!(
                    "halo {id} has no GroupOrigHaloID, not a TNG-Cluster run"
                )))
            }
            Err(e) => return Err(e),
        };
        let halo_ids = zooms
            .require("HaloIDs")?
            .to_i64_vec()
            .ok_or_else(|| Error::InvalidArgument("OriginalZooms/HaloIDs is not integer".into()))?;
        let row = halo_ids
            .iter()
            .position(|&h| h == orig_id)
            .ok_or_else(|| Error::NotFound(format!("original halo {orig_id} in OriginalZooms/HaloIDs")))?;

        let by_type = |name: &str| -> Result<Vec<i64>> {
            let table = zooms.require(name)?;
            let cols = table.row_len();
            table
                .slice_rows(row..row + 1)?
                .to_i64_vec()
                .filter(|v| v.len() == cols && cols == NUM_PART_TYPES)
                .ok_or_else(|| Error::InvalidArgument(format!("OriginalZooms/{name} is not a per-type integer table")))
        };
        let fof = subset.with_ranges(by_type("GroupsTotalLengthByType")?, by_type("GroupsSnapOffsetByType")?);
        let fuzz = subset.with_ranges(
            by_type("OuterFuzzTotalLengthByType")?,
            by_type("OuterFuzzSnapOffsetByType")?,
        );
        let inner = self.load_subset(snap, part_type, fields.clone(), Some(&fof), opts)?;
        let outer = self.load_subset(snap, part_type, fields, Some(&fuzz), opts)?;
        debug!(fof = inner.count, fuzz = outer.count, "original zoom parts");
        inner.concat(outer)
    }
}
