//! LHaloTree merger trees, rearranged into depth-first order.

use rustyillustris_io::{Backend, Container};
use tracing::{debug, info_span, warn};

use crate::array::{FieldSet, Fields};
use crate::config::TreeOptions;
use crate::error::{Error, Result};
use crate::paths::{lhalotree_path, CatalogLayout};
use crate::reader::{read_array, read_i64_at};
use crate::simulation::Simulation;
use crate::subset::EntityKind;
use crate::walker::{gather_field, Links};

/// Location of a subhalo in the LHaloTree files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LHaloTreeOffsets {
    /// Tree chunk file number.
    pub file: i64,
    /// Row of the subhalo within its tree.
    pub index: i64,
    /// Tree number within the chunk, `-1` if the subhalo is in no tree.
    pub num: i64,
}

impl<B: Backend> Simulation<B> {
    pub fn lhalo_tree_offsets(&self, snap: u32, id: u64) -> Result<LHaloTreeOffsets> {
        let (file, prefix, row) = match self.catalog_layout(snap) {
            CatalogLayout::OffsetsFile => (self.open_offsets_file(snap)?, "Subhalo/LHaloTree/", id),
            CatalogLayout::Legacy => {
                let loc = self.catalog_row(snap, EntityKind::Subhalo, id)?;
                (self.open_catalog_chunk(snap, loc.chunk)?, "Offsets/Subhalo_LHaloTree", loc.row)
            }
        };
        Ok(LHaloTreeOffsets {
            file: read_i64_at(&file, &format!("{prefix}File"), row)?,
            index: read_i64_at(&file, &format!("{prefix}Index"), row)?,
            num: read_i64_at(&file, &format!("{prefix}Num"), row)?,
        })
    }

    /// Subtree of subhalo `id`, flattened depth first with the main branch
    /// leading, or `None` when the subhalo is in no tree.
    pub fn load_lhalo_tree(
        &self,
        snap: u32,
        id: u64,
        fields: impl Into<Fields>,
        opts: &TreeOptions<'_>,
    ) -> Result<Option<FieldSet>> {
        let _span = info_span!("load_lhalo_tree", snap, id).entered();
        let offs = self.lhalo_tree_offsets(snap, id)?;
        if offs.num == -1 {
            warn!(snap, id, "subhalo is not in the merger tree");
            return Ok(None);
        }
        let group = format!("Tree{}", offs.num);
        let file = self.open_file(&lhalotree_path(self.backend(), self.base_path(), offs.file))?;
        if !file.contains(&group) {
            return Err(Error::NotFound(format!("{group} in tree file {}", offs.file)));
        }

        let names = fields.into().resolve(|| Ok(file.datasets(&group)?))?;
        if let Some(missing) = names.iter().find(|n| !file.contains(&format!("{group}/{n}"))) {
            return Err(Error::MissingField(format!("{group}/{missing}")));
        }

        let links = Links::from_arrays(
            &read_array(&file, &format!("{group}/FirstProgenitor"), None)?,
            &read_array(&file, &format!("{group}/NextProgenitor"), None)?,
        )?;
        let root = usize::try_from(offs.index)
            .map_err(|_| Error::InvalidArgument(format!("negative tree index {}", offs.index)))?;
        let rows = links.flatten(root, opts.only_main_branch)?;
        debug!(tree = %group, rows = rows.len(), "flattened subtree");

        let mut tree = FieldSet::new(rows.len() as u64);
        for name in names {
            let array = gather_field(
                &file,
                &format!("{group}/{name}"),
                &rows,
                self.config().small_tree_rows,
            )?;
            tree.insert(name, array);
        }
        Ok(Some(tree))
    }
}
