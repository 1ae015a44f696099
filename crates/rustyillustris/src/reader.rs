//! Chunked reads into pre-sized field buffers.
//!
//! A collection (one particle type of a snapshot, the halos of a group
//! catalog) is spread over numbered chunk files. [`FieldReader`] opens the
//! chunks from a starting position until the requested row count is
//! covered, plans the per-chunk slices, allocates one buffer per field and
//! copies each slice into its own disjoint region. With parallel reads the
//! regions are split off before the chunks fan out over the worker pool.

use std::mem;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use rustyillustris_io::{Backend, Container, DType};
use tracing::debug;

use crate::array::{Array, FieldSet, Fields};
use crate::config::{Config, ReadOptions};
use crate::error::{Error, Result};
use crate::locator::{self, ChunkDescriptor};

/// Where a chunk's row count for the collection is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCount {
    /// A scalar `Header` attribute, e.g. `Nsubgroups_ThisFile`.
    Scalar(String),
    /// One element of a per-type `Header` attribute, e.g. `NumPart_ThisFile[4]`.
    Indexed(String, usize),
}

/// The chunk files of one collection and the group its fields live in.
pub struct ChunkSource<'a, B: Backend> {
    backend: &'a B,
    paths: Vec<PathBuf>,
    group: String,
    local: LocalCount,
}

impl<'a, B: Backend> ChunkSource<'a, B> {
    /// `paths[i]` is chunk `i`; reads never go past the last path.
    pub fn new(backend: &'a B, paths: Vec<PathBuf>, group: impl Into<String>, local: LocalCount) -> Self {
        ChunkSource {
            backend,
            paths,
            group: group.into(),
            local,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn field_path(&self, name: &str) -> String {
        if self.group.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.group)
        }
    }

    /// Rows of this collection in `file`; zero when the group is absent.
    fn local_count(&self, file: &B::File) -> Result<u64> {
        if !self.group.is_empty() && !file.contains(&self.group) {
            return Ok(0);
        }
        let value = match &self.local {
            LocalCount::Scalar(name) => file.attr("Header", name)?.as_i64(),
            LocalCount::Indexed(name, i) => file
                .attr("Header", name)?
                .to_i64_vec()
                .and_then(|v| v.get(*i).copied()),
        };
        let count = value.ok_or_else(|| {
            Error::InvalidArgument(format!("Header count attribute {:?} is not an integer", self.local))
        })?;
        Ok(count.max(0) as u64)
    }
}

struct OpenChunk<F> {
    file: F,
    local: u64,
}

struct FieldSpec {
    path: String,
    dtype: DType,
    shape: Vec<u64>,
    column: Option<u64>,
    row_bytes: usize,
}

struct ChunkTask<'a, F> {
    file: &'a F,
    desc: ChunkDescriptor,
    outs: Vec<&'a mut [u8]>,
}

/// Streams a row range of a chunked collection into contiguous arrays.
pub struct FieldReader<'a, B: Backend> {
    source: ChunkSource<'a, B>,
    parallel: bool,
    pool: Option<Arc<ThreadPool>>,
    float32: bool,
    columns: Vec<Option<u64>>,
}

impl<'a, B: Backend> FieldReader<'a, B> {
    pub fn new(source: ChunkSource<'a, B>) -> Self {
        FieldReader {
            source,
            parallel: false,
            pool: None,
            float32: false,
            columns: Vec::new(),
        }
    }

    /// Apply per-call options on top of the run configuration.
    pub fn with_options(mut self, opts: &ReadOptions, config: &Config) -> Self {
        self.parallel = opts.parallel_under(config);
        self.float32 = opts.float32_under(config);
        self.columns = opts.columns.clone();
        self
    }

    /// Run parallel reads on `pool` instead of the global rayon pool.
    pub fn with_pool(mut self, pool: Option<Arc<ThreadPool>>) -> Self {
        self.pool = pool;
        self
    }

    /// Read `count` rows of every selected field, starting at row
    /// `start_offset` of chunk `start_chunk`.
    pub fn read_fields(
        &self,
        fields: &Fields,
        count: u64,
        start_chunk: usize,
        start_offset: u64,
    ) -> Result<FieldSet> {
        if count == 0 {
            return Ok(FieldSet::new(0));
        }
        let opened = self.open_chunks(start_chunk, start_offset, count)?;
        let locals: Vec<u64> = opened.iter().map(|c| c.local).collect();
        let plan = locator::plan(start_chunk, start_offset, count, &locals)?;

        // the first planned chunk holds the group and sets dtypes and shapes
        let template = &opened[plan[0].chunk - start_chunk].file;
        let names = fields.resolve(|| Ok(template.datasets(&self.source.group)?))?;
        let specs = self.field_specs(template, &names, count)?;

        let mut storage: Vec<Vec<u8>> = specs
            .iter()
            .map(|s| vec![0u8; count as usize * s.row_bytes])
            .collect();
        let mut tasks: Vec<ChunkTask<'_, B::File>> = plan
            .iter()
            .map(|d| ChunkTask {
                file: &opened[d.chunk - start_chunk].file,
                desc: *d,
                outs: Vec::with_capacity(specs.len()),
            })
            .collect();
        for (spec, bytes) in specs.iter().zip(storage.iter_mut()) {
            let mut rest = bytes.as_mut_slice();
            for task in tasks.iter_mut() {
                let (head, tail) = mem::take(&mut rest).split_at_mut(task.desc.rows as usize * spec.row_bytes);
                task.outs.push(head);
                rest = tail;
            }
        }

        let read_chunk = |task: ChunkTask<'_, B::File>| -> Result<()> {
            debug!(
                group = %self.source.group,
                chunk = task.desc.chunk,
                offset = task.desc.offset,
                rows = task.desc.rows,
                "reading chunk"
            );
            let rows = task.desc.offset..task.desc.offset + task.desc.rows;
            for (spec, out) in specs.iter().zip(task.outs) {
                task.file.read_rows_into(&spec.path, rows.clone(), spec.column, out)?;
            }
            Ok(())
        };
        if self.parallel && tasks.len() > 1 {
            let fan_out = || tasks.into_par_iter().try_for_each(|t| read_chunk(t));
            match &self.pool {
                Some(pool) => pool.install(fan_out)?,
                None => fan_out()?,
            }
        } else {
            tasks.into_iter().try_for_each(read_chunk)?;
        }

        let read: u64 = plan.iter().map(|d| d.rows).sum();
        if read != count {
            return Err(Error::ReadCountMismatch {
                read,
                expected: count,
            });
        }

        let mut result = FieldSet::new(count);
        for ((spec, bytes), name) in specs.into_iter().zip(storage).zip(names) {
            let array = Array::from_ne_bytes(spec.dtype, spec.shape, &bytes)?;
            result.insert(name, if self.float32 { array.into_f32() } else { array });
        }
        Ok(result)
    }

    /// Read one field; an empty selection yields an empty array.
    pub fn read_field(
        &self,
        field: &str,
        count: u64,
        start_chunk: usize,
        start_offset: u64,
    ) -> Result<Array> {
        if count == 0 {
            return self.empty_field(field);
        }
        self.read_fields(&Fields::from(field), count, start_chunk, start_offset)?
            .into_single()
            .ok_or_else(|| Error::MissingField(self.source.field_path(field)))
    }

    /// Open chunks from `start_chunk` until `count` rows are available, the
    /// chunk list ends, or a chunk file is missing.
    fn open_chunks(&self, start_chunk: usize, start_offset: u64, count: u64) -> Result<Vec<OpenChunk<B::File>>> {
        let mut opened = Vec::new();
        let mut available = 0u64;
        let mut offset = start_offset;
        for path in self.source.paths.iter().skip(start_chunk) {
            if available >= count {
                break;
            }
            if !self.source.backend.exists(path) {
                debug!(path = %path.display(), "chunk file missing, stopping");
                break;
            }
            let file = self.source.backend.open(path)?;
            let local = self.source.local_count(&file)?;
            available += local.saturating_sub(offset);
            offset = 0;
            opened.push(OpenChunk { file, local });
        }
        Ok(opened)
    }

    fn field_specs(&self, template: &B::File, names: &[String], count: u64) -> Result<Vec<FieldSpec>> {
        if !self.columns.is_empty() && self.columns.len() != names.len() {
            return Err(Error::InvalidArgument(format!(
                "{} column selections for {} fields",
                self.columns.len(),
                names.len()
            )));
        }
        let mut specs = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let path = self.source.field_path(name);
            if !template.contains(&path) {
                return Err(Error::MissingField(path));
            }
            let info = template.dataset_info(&path)?;
            if !info.dtype.is_numeric() {
                return Err(Error::InvalidArgument(format!("{path} is not numeric")));
            }
            let column = self.columns.get(i).copied().flatten();
            let shape = match column {
                Some(_) if info.shape.len() != 2 => {
                    return Err(Error::InvalidArgument(format!(
                        "column selection on non-2D field {path}"
                    )))
                }
                Some(_) => vec![count],
                None => std::iter::once(count).chain(info.shape.iter().skip(1).copied()).collect(),
            };
            specs.push(FieldSpec {
                row_bytes: info.row_bytes(column),
                dtype: info.dtype,
                path,
                shape,
                column,
            });
        }
        Ok(specs)
    }

    /// Zero-row array typed after the first chunk carrying `field`.
    fn empty_field(&self, field: &str) -> Result<Array> {
        let path = self.source.field_path(field);
        for chunk in &self.source.paths {
            if !self.source.backend.exists(chunk) {
                break;
            }
            let file = self.source.backend.open(chunk)?;
            if file.contains(&path) {
                let info = file.dataset_info(&path)?;
                let shape = std::iter::once(0).chain(info.shape.iter().skip(1).copied()).collect();
                return Array::from_ne_bytes(info.dtype, shape, &[]);
            }
        }
        Err(Error::MissingField(path))
    }
}

/// Read `rows` of a dataset as an array (all rows when `None`).
pub(crate) fn read_array<C: Container>(file: &C, path: &str, rows: Option<Range<u64>>) -> Result<Array> {
    if !file.contains(path) {
        return Err(Error::MissingField(path.to_string()));
    }
    let info = file.dataset_info(path)?;
    let rows = rows.unwrap_or(0..info.rows());
    let bytes = file.read_rows(path, rows.clone(), None)?;
    let mut shape = info.shape.clone();
    if let Some(first) = shape.first_mut() {
        *first = rows.end - rows.start;
    }
    Array::from_ne_bytes(info.dtype, shape, &bytes)
}

/// Integer values of `rows` of a dataset, flattened.
pub(crate) fn read_i64s<C: Container>(file: &C, path: &str, rows: Option<Range<u64>>) -> Result<Vec<i64>> {
    read_array(file, path, rows)?
        .to_i64_vec()
        .ok_or_else(|| Error::InvalidArgument(format!("{path} does not hold integers")))
}

/// Single integer at `row` of a 1-D dataset; a row past the end is `NotFound`.
pub(crate) fn read_i64_at<C: Container>(file: &C, path: &str, row: u64) -> Result<i64> {
    if !file.contains(path) {
        return Err(Error::MissingField(path.to_string()));
    }
    if row >= file.dataset_info(path)?.rows() {
        return Err(Error::NotFound(format!("{path}[{row}]")));
    }
    read_i64s(file, path, Some(row..row + 1))?
        .first()
        .copied()
        .ok_or_else(|| Error::NotFound(format!("{path}[{row}]")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyillustris_format::file_writer::{AttrValue as WAttr, FileWriter};
    use rustyillustris_io::MemBackend;

    /// Chunk `c` holds `counts[c]` gas cells with global ids and 3-vectors.
    fn snapshot(counts: &[u64]) -> (MemBackend, Vec<PathBuf>) {
        let mut backend = MemBackend::new();
        let mut paths = Vec::new();
        let mut next = 0u64;
        for (c, &n) in counts.iter().enumerate() {
            let mut w = FileWriter::new();
            w.create_group("Header").unwrap();
            w.set_attr("Header", "NumPart_ThisFile", WAttr::array(&[n as i32, 0, 0, 0, 0, 0]))
                .unwrap();
            if n > 0 {
                let ids: Vec<u64> = (next..next + n).collect();
                let pos: Vec<f64> = ids.iter().flat_map(|&i| [i as f64, 0.5, -(i as f64)]).collect();
                w.write("PartType0/ParticleIDs", &[n], &ids).unwrap();
                w.write("PartType0/Coordinates", &[n, 3], &pos).unwrap();
            }
            next += n;
            let path = PathBuf::from(format!("/snap/snap_000.{c}.hdf5"));
            backend.insert(&path, w.finish().unwrap());
            paths.push(path);
        }
        (backend, paths)
    }

    fn reader<'a>(backend: &'a MemBackend, paths: &[PathBuf]) -> FieldReader<'a, MemBackend> {
        FieldReader::new(ChunkSource::new(
            backend,
            paths.to_vec(),
            "PartType0",
            LocalCount::Indexed("NumPart_ThisFile".into(), 0),
        ))
    }

    fn ids(set: &FieldSet) -> Vec<i64> {
        set.require("ParticleIDs").unwrap().to_i64_vec().unwrap()
    }

    // -----------------------------------------------------------------------
    // serial reads
    // -----------------------------------------------------------------------

    #[test]
    fn full_read_skips_empty_chunks() {
        let (b, paths) = snapshot(&[3, 0, 4, 2]);
        let set = reader(&b, &paths).read_fields(&Fields::All, 9, 0, 0).unwrap();
        assert_eq!(set.count, 9);
        assert_eq!(set.names().collect::<Vec<_>>(), ["Coordinates", "ParticleIDs"]);
        assert_eq!(ids(&set), (0..9).collect::<Vec<_>>());
        let coords = set.require("Coordinates").unwrap();
        assert_eq!(coords.shape(), &[9, 3]);
        assert_eq!(coords.at_f64(8, 2), Some(-8.0));
    }

    #[test]
    fn offset_read_across_chunks() {
        let (b, paths) = snapshot(&[3, 0, 4, 2]);
        let set = reader(&b, &paths).read_fields(&Fields::from("ParticleIDs"), 4, 0, 2).unwrap();
        assert_eq!(ids(&set), vec![2, 3, 4, 5]);
    }

    #[test]
    fn single_field_matches_field_set() {
        let (b, paths) = snapshot(&[3, 4]);
        let r = reader(&b, &paths);
        let single = r.read_field("Coordinates", 5, 0, 1).unwrap();
        let set = r.read_fields(&Fields::from(["Coordinates", "ParticleIDs"]), 5, 0, 1).unwrap();
        assert_eq!(&single, set.require("Coordinates").unwrap());
    }

    #[test]
    fn short_chunk_list_is_a_mismatch() {
        let (b, paths) = snapshot(&[3, 4, 2]);
        let truncated = &paths[..2];
        assert!(matches!(
            reader(&b, truncated).read_fields(&Fields::All, 9, 0, 0),
            Err(Error::ReadCountMismatch { read: 7, expected: 9 })
        ));
    }

    #[test]
    fn missing_field_and_bad_columns() {
        let (b, paths) = snapshot(&[2]);
        assert!(matches!(
            reader(&b, &paths).read_fields(&Fields::from("Masses"), 2, 0, 0),
            Err(Error::MissingField(p)) if p == "PartType0/Masses"
        ));
        let cols = ReadOptions::new().columns(vec![Some(1)]);
        let r = reader(&b, &paths).with_options(&cols, &Config::default());
        assert!(matches!(
            r.read_fields(&Fields::from("ParticleIDs"), 2, 0, 0),
            Err(Error::InvalidArgument(_))
        ));
        let y = r.read_field("Coordinates", 2, 0, 0).unwrap();
        assert_eq!(y.shape(), &[2]);
        assert_eq!(y.to_f64_vec(), vec![0.5, 0.5]);
    }

    #[test]
    fn empty_selection() {
        let (b, paths) = snapshot(&[0, 2]);
        let r = reader(&b, &paths);
        assert_eq!(r.read_fields(&Fields::All, 0, 0, 0).unwrap(), FieldSet::new(0));
        let empty = r.read_field("Coordinates", 0, 0, 0).unwrap();
        assert_eq!(empty.shape(), &[0, 3]);
        assert!(matches!(r.read_field("Masses", 0, 0, 0), Err(Error::MissingField(_))));
    }

    // -----------------------------------------------------------------------
    // parallel reads and options
    // -----------------------------------------------------------------------

    #[test]
    fn parallel_read_matches_serial() {
        let (b, paths) = snapshot(&[5, 1, 0, 7, 3]);
        let serial = reader(&b, &paths).read_fields(&Fields::All, 14, 0, 2).unwrap();
        let parallel = reader(&b, &paths)
            .with_options(&ReadOptions::new().parallel(), &Config::default())
            .read_fields(&Fields::All, 14, 0, 2)
            .unwrap();
        assert_eq!(serial, parallel);

        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        let pooled = reader(&b, &paths)
            .with_options(&ReadOptions::new().parallel(), &Config::default())
            .with_pool(Some(Arc::new(pool)))
            .read_fields(&Fields::All, 14, 0, 2)
            .unwrap();
        assert_eq!(serial, pooled);
    }

    #[test]
    fn float32_down_cast() {
        let (b, paths) = snapshot(&[2]);
        let set = reader(&b, &paths)
            .with_options(&ReadOptions::new().float32(), &Config::default())
            .read_fields(&Fields::All, 2, 0, 0)
            .unwrap();
        assert_eq!(set.require("Coordinates").unwrap().dtype(), DType::F32);
        assert_eq!(set.require("ParticleIDs").unwrap().dtype(), DType::U64);
    }

    #[test]
    fn dataset_helpers() {
        let (b, paths) = snapshot(&[3]);
        let f = b.open(&paths[0]).unwrap();
        assert_eq!(read_i64s(&f, "PartType0/ParticleIDs", Some(1..3)).unwrap(), vec![1, 2]);
        assert_eq!(read_i64_at(&f, "PartType0/ParticleIDs", 2).unwrap(), 2);
        assert!(matches!(read_i64_at(&f, "PartType0/ParticleIDs", 3), Err(Error::NotFound(_))));
        assert!(matches!(read_i64_at(&f, "PartType0/Masses", 0), Err(Error::MissingField(_))));
        assert!(matches!(
            read_i64s(&f, "PartType0/Coordinates", None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(read_array(&f, "PartType0/Coordinates", None).unwrap().shape(), &[3, 3]);
    }
}
