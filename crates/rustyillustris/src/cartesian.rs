//! Cartesian grid outputs (THESAN).
//!
//! A grid of `NumPixels³` cells is stored in row-major pixel order
//! (`p = i·n² + j·n + k`) and split over chunk files.

use std::collections::BTreeMap;

use rustyillustris_io::{AttrValue, Backend, Container};
use tracing::{debug, info_span};

use crate::array::{Array, FieldSet, Fields};
use crate::error::{Error, Result};
use crate::paths::cartesian_path;
use crate::reader::read_array;
use crate::simulation::{header, header_i64, Simulation};

/// Inclusive pixel box `[start, end]` along each of the three axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub start: [u64; 3],
    pub end: [u64; 3],
}

impl BoundingBox {
    pub fn new(start: [u64; 3], end: [u64; 3]) -> BoundingBox {
        BoundingBox { start, end }
    }

    /// The whole grid of `n` pixels per side.
    pub fn full(n: u64) -> BoundingBox {
        let last = n.saturating_sub(1);
        BoundingBox::new([0; 3], [last; 3])
    }

    /// Check the box lies within a grid of `n` pixels per side.
    pub fn validate(&self, n: u64) -> Result<()> {
        for axis in 0..3 {
            if self.start[axis] > self.end[axis] || self.end[axis] >= n {
                return Err(Error::InvalidArgument(format!(
                    "bounding box {:?}..={:?} outside a grid of {n} pixels per side",
                    self.start, self.end
                )));
            }
        }
        Ok(())
    }

    /// Pixels inside the box.
    pub fn count(&self) -> u64 {
        (0..3).map(|a| self.end[a] - self.start[a] + 1).product()
    }

    /// True if the flat pixel index `p` of a grid of side `n` is inside.
    pub fn contains(&self, p: u64, n: u64) -> bool {
        let i = p / (n * n);
        let j = (p - i * n * n) / n;
        let k = p - i * n * n - j * n;
        [i, j, k]
            .iter()
            .enumerate()
            .all(|(a, &x)| x >= self.start[a] && x <= self.end[a])
    }
}

impl<B: Backend> Simulation<B> {
    pub fn cartesian_header(&self, snap: u32) -> Result<BTreeMap<String, AttrValue>> {
        header(&self.open_file(&cartesian_path(self.base_path(), snap, 0))?)
    }

    /// Fields of the grid cells inside `bbox`, or of the whole grid.
    pub fn load_cartesian(
        &self,
        snap: u32,
        fields: impl Into<Fields>,
        bbox: Option<BoundingBox>,
    ) -> Result<FieldSet> {
        let _span = info_span!("load_cartesian", snap).entered();
        let n = header_i64(&self.cartesian_header(snap)?, "NumPixels")?.max(0) as u64;
        if n == 0 {
            return Ok(FieldSet::new(0));
        }
        let whole = bbox.is_none();
        let bbox = bbox.unwrap_or_else(|| BoundingBox::full(n));
        bbox.validate(n)?;
        let count = bbox.count();

        let first = self.open_file(&cartesian_path(self.base_path(), snap, 0))?;
        let names = fields.into().resolve(|| Ok(first.datasets("")?))?;
        if let Some(missing) = names.iter().find(|f| !first.contains(f)) {
            return Err(Error::MissingField(missing.clone()));
        }
        let Some(lead) = names.first() else {
            return Ok(FieldSet::new(count));
        };

        let mut parts: Vec<Vec<Array>> = vec![Vec::new(); names.len()];
        let mut read = 0u64;
        let mut file_offset = 0u64;
        let mut chunk = 0usize;
        while read < count {
            let path = cartesian_path(self.base_path(), snap, chunk);
            if !self.backend().exists(&path) {
                debug!(chunk, "cartesian chunk missing, stopping");
                break;
            }
            let file = self.open_file(&path)?;
            let local = file.dataset_info(lead)?.rows();
            let picked: Vec<u64> = if whole {
                (0..local).collect()
            } else {
                (0..local)
                    .filter(|&r| bbox.contains(file_offset + r, n))
                    .collect()
            };
            debug!(chunk, local, picked = picked.len(), "reading cartesian chunk");
            if let (Some(&lo), Some(&hi)) = (picked.first(), picked.last()) {
                let rows: Vec<usize> = picked.iter().map(|&r| (r - lo) as usize).collect();
                for (name, acc) in names.iter().zip(parts.iter_mut()) {
                    let slab = read_array(&file, name, Some(lo..hi + 1))?;
                    acc.push(if whole { slab } else { slab.gather_rows(&rows)? });
                }
                read += picked.len() as u64;
            }
            file_offset += local;
            chunk += 1;
        }

        if read != count {
            return Err(Error::ReadCountMismatch {
                read,
                expected: count,
            });
        }
        let mut out = FieldSet::new(count);
        for (name, acc) in names.into_iter().zip(parts) {
            out.insert(name, Array::concat(&acc)?);
        }
        Ok(out)
    }
}
