//! Group catalog reads: every halo or subhalo, or one of them.

use std::collections::BTreeMap;

use rustyillustris_io::{AttrValue, Backend, Container};
use tracing::{debug, info_span, warn};

use crate::array::{FieldSet, Fields};
use crate::config::ReadOptions;
use crate::error::{Error, Result};
use crate::paths::catalog_path;
use crate::reader::{read_array, ChunkSource, LocalCount};
use crate::simulation::{header, header_i64, Simulation};
use crate::subset::EntityKind;

/// One halo or one subhalo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Halo(u64),
    Subhalo(u64),
}

impl Selector {
    /// Selector from a pair of optional IDs; exactly one must be given.
    pub fn from_ids(halo: Option<u64>, subhalo: Option<u64>) -> Result<Selector> {
        match (halo, subhalo) {
            (Some(h), None) => Ok(Selector::Halo(h)),
            (None, Some(s)) => Ok(Selector::Subhalo(s)),
            _ => Err(Error::InvalidArgument(
                "specify exactly one of a halo ID or a subhalo ID".into(),
            )),
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Selector::Halo(_) => EntityKind::Group,
            Selector::Subhalo(_) => EntityKind::Subhalo,
        }
    }

    pub fn id(self) -> u64 {
        match self {
            Selector::Halo(id) | Selector::Subhalo(id) => id,
        }
    }
}

/// Every field of every subhalo and halo, plus the catalog header.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCatalog {
    pub subhalos: FieldSet,
    pub halos: FieldSet,
    pub header: BTreeMap<String, AttrValue>,
}

impl<B: Backend> Simulation<B> {
    /// `Header` attributes of the first catalog chunk.
    pub fn load_catalog_header(&self, snap: u32) -> Result<BTreeMap<String, AttrValue>> {
        header(&self.open_catalog_chunk(snap, 0)?)
    }

    /// Fields of every halo or subhalo in the catalog of `snap`.
    pub fn load_objects(
        &self,
        snap: u32,
        kind: EntityKind,
        fields: impl Into<Fields>,
        opts: &ReadOptions,
    ) -> Result<FieldSet> {
        let name = kind.group_name();
        let _span = info_span!("load_objects", snap, kind = name).entered();
        let hdr = self.load_catalog_header(snap)?;
        let count_name = kind.count_name(&hdr);
        let total = header_i64(&hdr, &format!("N{count_name}_Total"))?.max(0) as u64;
        if total == 0 {
            warn!(snap, kind = name, "catalog holds no objects of this kind");
            return Ok(FieldSet::new(0));
        }
        let chunks = header_i64(&hdr, "NumFiles")?.max(0) as usize;
        let fields: Fields = fields.into();
        if chunks == 1 && opts.columns.is_empty() {
            return self.load_objects_whole(snap, name, &fields, total, opts);
        }
        let paths = (0..chunks)
            .map(|c| catalog_path(self.backend(), self.base_path(), snap, c))
            .collect();
        let source = ChunkSource::new(
            self.backend(),
            paths,
            name,
            LocalCount::Scalar(format!("N{count_name}_ThisFile")),
        );
        self.field_reader(source, opts)?
            .read_fields(&fields, total, 0, 0)
    }

    /// Catalogs written as one file: each dataset is read in one piece.
    fn load_objects_whole(
        &self,
        snap: u32,
        name: &str,
        fields: &Fields,
        total: u64,
        opts: &ReadOptions,
    ) -> Result<FieldSet> {
        let file = self.open_catalog_chunk(snap, 0)?;
        let names = fields.resolve(|| Ok(file.datasets(name)?))?;
        let float32 = opts.float32_under(self.config());
        let mut out = FieldSet::new(total);
        for field in names {
            let array = read_array(&file, &format!("{name}/{field}"), None)?;
            let read = array.shape().first().copied().unwrap_or(0);
            if read != total {
                return Err(Error::ReadCountMismatch { read, expected: total });
            }
            out.insert(field, if float32 { array.into_f32() } else { array });
        }
        Ok(out)
    }

    pub fn load_subhalos(&self, snap: u32, fields: impl Into<Fields>) -> Result<FieldSet> {
        self.load_objects(snap, EntityKind::Subhalo, fields, &ReadOptions::default())
    }

    pub fn load_halos(&self, snap: u32, fields: impl Into<Fields>) -> Result<FieldSet> {
        self.load_objects(snap, EntityKind::Group, fields, &ReadOptions::default())
    }

    /// The whole catalog of `snap`.
    pub fn load_catalog(&self, snap: u32, opts: &ReadOptions) -> Result<GroupCatalog> {
        Ok(GroupCatalog {
            subhalos: self.load_objects(snap, EntityKind::Subhalo, Fields::All, opts)?,
            halos: self.load_objects(snap, EntityKind::Group, Fields::All, opts)?,
            header: self.load_catalog_header(snap)?,
        })
    }

    /// Every field of one halo or subhalo; each array has the field's
    /// per-row shape (scalars have an empty shape).
    pub fn load_single(&self, snap: u32, selector: Selector) -> Result<FieldSet> {
        let kind = selector.kind();
        let name = kind.group_name();
        let loc = self.catalog_row(snap, kind, selector.id())?;
        debug!(snap, kind = name, id = selector.id(), chunk = loc.chunk, "loading single object");
        let file = self.open_catalog_chunk(snap, loc.chunk)?;
        let mut out = FieldSet::new(1);
        for field in file.datasets(name)? {
            let array = read_array(&file, &format!("{name}/{field}"), Some(loc.row..loc.row + 1))?;
            let trailing = array.shape().get(1..).unwrap_or_default().to_vec();
            out.insert(field, array.reshape(trailing)?);
        }
        Ok(out)
    }
}
