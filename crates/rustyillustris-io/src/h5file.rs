//! Memory-mapped HDF5 container.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use rustyillustris_format::attribute::attributes;
use rustyillustris_format::dataset::{read_rows, DatasetMeta};
use rustyillustris_format::group::{group_entries, resolve_path};
use rustyillustris_format::object_header::ObjectHeader;
use rustyillustris_format::signature::find_signature;
use rustyillustris_format::superblock::Superblock;
use rustyillustris_format::FormatError;

use crate::container::{select_column, Container, DatasetInfo};
use crate::error::{Error, Result};
use crate::types::{AttrValue, DType};

enum Bytes {
    Mapped(Mmap),
    Shared(Arc<[u8]>),
}

impl Bytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            Bytes::Mapped(m) => &m[..],
            Bytes::Shared(b) => &b[..],
        }
    }
}

/// One HDF5 file, parsed lazily from a read-only mapping.
pub struct H5File {
    path: PathBuf,
    bytes: Bytes,
    base: usize,
    superblock: Superblock,
}

impl H5File {
    /// Open and memory-map a file.
    ///
    /// The file must not be modified while it is open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<H5File> {
        let file = fs::File::open(path.as_ref())?;
        // SAFETY: read-only mapping; the file is not modified while open.
        let mmap = unsafe { Mmap::map(&file)? };
        H5File::from_storage(path.as_ref().to_path_buf(), Bytes::Mapped(mmap))
    }

    /// Wrap an in-memory file image.
    pub fn from_shared(path: PathBuf, bytes: Arc<[u8]>) -> Result<H5File> {
        H5File::from_storage(path, Bytes::Shared(bytes))
    }

    fn from_storage(path: PathBuf, bytes: Bytes) -> Result<H5File> {
        let raw = bytes.as_slice();
        let signature = find_signature(raw)?;
        let superblock = Superblock::parse(raw, signature)?;
        let base = superblock.base_address as usize;
        if base > raw.len() {
            return Err(FormatError::UnexpectedEof {
                expected: base,
                available: raw.len(),
            }
            .into());
        }
        Ok(H5File {
            path,
            bytes,
            base,
            superblock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// File bytes starting at the base address.
    fn data(&self) -> &[u8] {
        &self.bytes.as_slice()[self.base..]
    }

    fn object(&self, path: &str) -> Result<ObjectHeader> {
        let address = resolve_path(self.data(), &self.superblock, path)?;
        Ok(ObjectHeader::parse(
            self.data(),
            address as usize,
            self.superblock.offset_size,
            self.superblock.length_size,
        )?)
    }

    fn meta(&self, path: &str) -> Result<DatasetMeta> {
        let header = self.object(path)?;
        if !header.is_dataset() {
            return Err(Error::NotADataset(path.to_string()));
        }
        Ok(DatasetMeta::from_header(
            &header,
            self.superblock.offset_size,
            self.superblock.length_size,
        )?)
    }

    /// Members of a group with their parsed headers.
    fn children(&self, group: &str) -> Result<Vec<(String, ObjectHeader)>> {
        let header = self.object(group)?;
        if !header.is_group() {
            return Err(Error::NotAGroup(group.to_string()));
        }
        let (os, ls) = (self.superblock.offset_size, self.superblock.length_size);
        let mut children = Vec::new();
        for entry in group_entries(self.data(), &header, os, ls)? {
            let child = ObjectHeader::parse(self.data(), entry.object_header_address as usize, os, ls)?;
            children.push((entry.name, child));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }
}

impl Container for H5File {
    fn contains(&self, path: &str) -> bool {
        resolve_path(self.data(), &self.superblock, path).is_ok()
    }

    fn datasets(&self, group: &str) -> Result<Vec<String>> {
        Ok(self
            .children(group)?
            .into_iter()
            .filter(|(_, h)| h.is_dataset())
            .map(|(name, _)| name)
            .collect())
    }

    fn members(&self, group: &str) -> Result<Vec<String>> {
        Ok(self.children(group)?.into_iter().map(|(name, _)| name).collect())
    }

    fn attrs(&self, object: &str) -> Result<BTreeMap<String, AttrValue>> {
        let header = self.object(object)?;
        Ok(attributes(&header, self.superblock.length_size)
            .iter()
            .filter_map(|m| AttrValue::from_message(m).map(|v| (m.name.clone(), v)))
            .collect())
    }

    fn dataset_info(&self, path: &str) -> Result<DatasetInfo> {
        let meta = self.meta(path)?;
        Ok(DatasetInfo {
            dtype: DType::from_datatype(&meta.datatype),
            shape: meta.shape().to_vec(),
        })
    }

    fn read_rows_into(
        &self,
        path: &str,
        rows: Range<u64>,
        column: Option<u64>,
        out: &mut [u8],
    ) -> Result<()> {
        let meta = self.meta(path)?;
        let info = DatasetInfo {
            dtype: DType::from_datatype(&meta.datatype),
            shape: meta.shape().to_vec(),
        };
        if let Some(c) = column {
            if info.shape.len() != 2 {
                return Err(Error::Unsupported(format!(
                    "column selection on rank-{} dataset {path}",
                    info.shape.len()
                )));
            }
            if c >= info.shape[1] {
                return Err(Error::ColumnOutOfRange {
                    column: c,
                    columns: info.shape[1],
                });
            }
        }
        let expected = rows.end.saturating_sub(rows.start) as usize * info.row_bytes(column);
        if out.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: out.len(),
            });
        }

        let raw = read_rows(self.data(), &meta, rows, self.superblock.offset_size)?;
        let elem = info.dtype.size();
        match column {
            Some(c) => select_column(&raw, info.row_len(), elem, c as usize, out),
            None => out.copy_from_slice(&raw),
        }
        if info.dtype.is_numeric() && meta.datatype.is_big_endian() != cfg!(target_endian = "big") {
            for element in out.chunks_exact_mut(elem) {
                element.reverse();
            }
        }
        Ok(())
    }
}
