//! Container and backend traits.
//!
//! A [`Container`] is one open chunk file: named groups, datasets and
//! attributes. A [`Backend`] opens containers by path and answers the
//! directory questions the loaders need (does this chunk exist, which
//! files are in this directory).

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{AttrValue, DType};

/// Element type and extent of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub dtype: DType,
    pub shape: Vec<u64>,
}

impl DatasetInfo {
    /// Rows along the first dimension; a scalar is one row.
    pub fn rows(&self) -> u64 {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Elements per row.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product::<u64>() as usize
    }

    /// Bytes per row, optionally restricted to one column.
    pub fn row_bytes(&self, column: Option<u64>) -> usize {
        match column {
            Some(_) => self.dtype.size(),
            None => self.row_len() * self.dtype.size(),
        }
    }
}

/// Read access to one container (chunk file).
///
/// Paths are slash separated and relative to the root group.
pub trait Container: Send + Sync {
    /// True if an object exists at `path`.
    fn contains(&self, path: &str) -> bool;

    /// Names of the datasets directly inside `group`, sorted.
    fn datasets(&self, group: &str) -> Result<Vec<String>>;

    /// Names of every member (groups and datasets) of `group`, sorted.
    fn members(&self, group: &str) -> Result<Vec<String>>;

    /// Every decodable attribute of the object at `object`.
    fn attrs(&self, object: &str) -> Result<BTreeMap<String, AttrValue>>;

    /// Element type and extent of the dataset at `path`, without reading data.
    fn dataset_info(&self, path: &str) -> Result<DatasetInfo>;

    /// Read rows `rows` of a dataset into `out` as native-endian bytes.
    ///
    /// With `column`, only that column of a 2-D dataset is read.
    fn read_rows_into(
        &self,
        path: &str,
        rows: Range<u64>,
        column: Option<u64>,
        out: &mut [u8],
    ) -> Result<()>;

    /// One attribute by name.
    fn attr(&self, object: &str, name: &str) -> Result<AttrValue> {
        self.attrs(object)?
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("{object}@{name}")))
    }

    /// Read rows into a fresh buffer.
    fn read_rows(&self, path: &str, rows: Range<u64>, column: Option<u64>) -> Result<Vec<u8>> {
        let info = self.dataset_info(path)?;
        let len = (rows.end.saturating_sub(rows.start)) as usize * info.row_bytes(column);
        let mut out = vec![0u8; len];
        self.read_rows_into(path, rows, column, &mut out)?;
        Ok(out)
    }
}

/// Opens containers and lists directories.
pub trait Backend: Send + Sync {
    type File: Container;

    /// True if a container exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Open the container at `path`.
    fn open(&self, path: &Path) -> Result<Self::File>;

    /// Files directly inside `dir`, sorted. A missing directory is empty.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Pick `column` out of each row of a row-major 2-D byte buffer.
pub(crate) fn select_column(
    rows: &[u8],
    row_len: usize,
    elem: usize,
    column: usize,
    out: &mut [u8],
) {
    let stride = row_len * elem;
    for (dst, src) in out.chunks_exact_mut(elem).zip(rows.chunks_exact(stride)) {
        dst.copy_from_slice(&src[column * elem..(column + 1) * elem]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_geometry() {
        let info = DatasetInfo {
            dtype: DType::F32,
            shape: vec![10, 3],
        };
        assert_eq!(info.rows(), 10);
        assert_eq!(info.row_len(), 3);
        assert_eq!(info.row_bytes(None), 12);
        assert_eq!(info.row_bytes(Some(1)), 4);

        let scalar = DatasetInfo {
            dtype: DType::I64,
            shape: vec![],
        };
        assert_eq!(scalar.rows(), 1);
        assert_eq!(scalar.row_len(), 1);
    }

    #[test]
    fn column_selection() {
        let rows: Vec<u8> = (0u8..12).collect();
        let mut out = vec![0u8; 4];
        // two rows of three u16 elements, pick column 1
        select_column(&rows, 3, 2, 1, &mut out);
        assert_eq!(out, vec![2, 3, 8, 9]);
    }
}
