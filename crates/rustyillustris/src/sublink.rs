//! SubLink merger trees.
//!
//! A SubLink tree is stored depth first, so the progenitor tree of one
//! subhalo is the contiguous row range from its own row to its last
//! progenitor, and its main progenitor branch is a prefix of that range.

use rustyillustris_io::{Backend, Container};
use tracing::{debug, info_span, warn};

use crate::array::{FieldSet, Fields};
use crate::config::TreeOptions;
use crate::error::{Error, Result};
use crate::offset_table::SUBLINK_CHUNK_PREFIX;
use crate::paths::{sublink_dir, CatalogLayout};
use crate::reader::{read_array, read_i64_at, read_i64s};
use crate::simulation::Simulation;
use crate::subset::EntityKind;
use crate::walker::main_descendant_rows;

/// Tree name whose offsets only exist in the offsets files.
const GALAXY_TREE: &str = "SubLink_gal";

/// Where a subhalo's tree starts and how far its progenitors reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SublinkOffsets {
    /// Global row of the subhalo across the tree chunks, `-1` if untracked.
    pub row_num: i64,
    pub last_progenitor_id: i64,
    pub subhalo_id: i64,
}

impl<B: Backend> Simulation<B> {
    /// SubLink offsets of subhalo `id` at snapshot `snap`.
    pub fn sublink_offsets(&self, snap: u32, id: u64, tree_name: &str) -> Result<SublinkOffsets> {
        let use_offsets_file =
            tree_name == GALAXY_TREE || self.catalog_layout(snap) == CatalogLayout::OffsetsFile;
        let (file, prefix, row) = if use_offsets_file {
            (self.open_offsets_file(snap)?, format!("Subhalo/{tree_name}/"), id)
        } else {
            let loc = self.catalog_row(snap, EntityKind::Subhalo, id)?;
            (
                self.open_catalog_chunk(snap, loc.chunk)?,
                String::from("Offsets/Subhalo_Sublink"),
                loc.row,
            )
        };
        Ok(SublinkOffsets {
            row_num: read_i64_at(&file, &format!("{prefix}RowNum"), row)?,
            last_progenitor_id: read_i64_at(&file, &format!("{prefix}LastProgenitorID"), row)?,
            subhalo_id: read_i64_at(&file, &format!("{prefix}SubhaloID"), row)?,
        })
    }

    /// Progenitor tree of subhalo `id`, or `None` when the subhalo is not
    /// part of any tree.
    ///
    /// With [`TreeOptions::only_main_branch`] only the main progenitor
    /// branch is returned; with `only_main_descendant_branch` the subhalo
    /// followed by its descendants up to the root descendant.
    pub fn load_sublink_tree(
        &self,
        snap: u32,
        id: u64,
        fields: impl Into<Fields>,
        opts: &TreeOptions<'_>,
    ) -> Result<Option<FieldSet>> {
        let _span = info_span!("load_sublink_tree", snap, id, tree = %opts.tree_name).entered();
        if opts.only_main_branch && opts.only_main_descendant_branch {
            return Err(Error::InvalidArgument(
                "main progenitor and main descendant branches are exclusive".into(),
            ));
        }
        let offs = self.sublink_offsets(snap, id, &opts.tree_name)?;
        if offs.row_num == -1 {
            warn!(snap, id, "subhalo is not in the merger tree");
            return Ok(None);
        }

        let dir = sublink_dir(self.backend(), self.base_path(), &opts.tree_name)?;
        let table = self.offset_table(&dir, SUBLINK_CHUNK_PREFIX, opts.cache)?;
        let (chunk, file_off) = table.locate(offs.row_num)?;
        let path = table
            .file(chunk)
            .ok_or_else(|| Error::NotFound(format!("tree chunk {chunk} in {}", dir.display())))?;
        let file = self.open_file(path)?;

        // rows of the tree slab, and for descendant walks the rows picked from it
        let (start, n_rows, picked) = if opts.only_main_descendant_branch {
            let root_id = read_i64_at(&file, "RootDescendantID", file_off)?;
            let back = offs.subhalo_id - root_id;
            if back < 0 || back as u64 > file_off {
                return Err(Error::InvalidArgument(format!(
                    "root descendant {root_id} of subhalo {id} lies outside its tree file"
                )));
            }
            let start = file_off - back as u64;
            let descendants = read_i64s(&file, "DescendantID", Some(start..file_off + 1))?;
            let rows = main_descendant_rows(&descendants, root_id, back as usize)?;
            (start, back as u64 + 1, Some(rows))
        } else if opts.only_main_branch {
            let leaf = read_i64_at(&file, "MainLeafProgenitorID", file_off)?;
            (file_off, (leaf - offs.subhalo_id + 1).max(0) as u64, None)
        } else {
            (file_off, (offs.last_progenitor_id - offs.subhalo_id + 1).max(0) as u64, None)
        };

        if start + n_rows > table.chunk_rows(chunk) {
            return Err(Error::InvalidArgument(format!(
                "tree of subhalo {id} spans files ({} rows from row {start} of {})",
                n_rows,
                path.display()
            )));
        }
        debug!(chunk, start, rows = n_rows, "reading tree slab");

        let names = fields.into().resolve(|| Ok(file.datasets("")?))?;
        let count = picked.as_ref().map_or(n_rows, |r| r.len() as u64);
        let mut tree = FieldSet::new(count);
        for name in names {
            let slab = read_array(&file, &name, Some(start..start + n_rows))?;
            let array = match &picked {
                Some(rows) => slab.gather_rows(rows)?,
                None => slab,
            };
            tree.insert(name, array);
        }
        Ok(Some(tree))
    }
}
