//! Merger tree traversal and branch analytics.
//!
//! LHaloTree stores each tree as a flat table where every row names its
//! first progenitor and its next sibling progenitor. [`Links`] flattens a
//! subtree depth first, main branch first. SubLink trees are already
//! stored in that order, so their analytics work directly on row offsets
//! computed from the IDs.

use std::ops::Range;

use rustyillustris_io::Container;

use crate::array::{Array, FieldSet};
use crate::error::{Error, Result};
use crate::part_type::PartType;
use crate::reader::read_array;

/// Default lower bound on merger mass ratios.
pub const DEFAULT_MIN_MASS_RATIO: f64 = 1e-10;

/// First-progenitor / next-progenitor links of one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
    first: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
}

impl Links {
    pub fn new(first: Vec<Option<usize>>, next: Vec<Option<usize>>) -> Result<Links> {
        if first.len() != next.len() {
            return Err(Error::InvalidArgument(format!(
                "{} first progenitor links but {} next progenitor links",
                first.len(),
                next.len()
            )));
        }
        let n = first.len();
        if let Some(bad) = first.iter().chain(&next).flatten().find(|&&i| i >= n) {
            return Err(Error::InvalidArgument(format!("link to row {bad} outside {n} rows")));
        }
        Ok(Links { first, next })
    }

    /// Links from on-disk index columns, where a negative index means none.
    pub fn from_arrays(first: &Array, next: &Array) -> Result<Links> {
        let decode = |a: &Array| -> Result<Vec<Option<usize>>> {
            let values = a
                .to_i64_vec()
                .ok_or_else(|| Error::InvalidArgument("progenitor links are not integers".into()))?;
            Ok(values.into_iter().map(|v| usize::try_from(v).ok()).collect())
        };
        Links::new(decode(first)?, decode(next)?)
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Rows visited from `root` without recording them.
    pub fn count(&self, root: usize, only_main_branch: bool) -> Result<usize> {
        let mut n = 0;
        self.walk(root, only_main_branch, |_| n += 1)?;
        Ok(n)
    }

    /// Rows of the subtree below `root` in output order: a node, then the
    /// subtree of its first progenitor, then (unless only the main branch is
    /// wanted) the subtree of each further progenitor in sibling order.
    pub fn flatten(&self, root: usize, only_main_branch: bool) -> Result<Vec<usize>> {
        let mut rows = Vec::with_capacity(self.count(root, only_main_branch)?);
        self.walk(root, only_main_branch, |row| rows.push(row))?;
        Ok(rows)
    }

    fn walk(&self, root: usize, only_main_branch: bool, mut visit: impl FnMut(usize)) -> Result<()> {
        if root >= self.len() {
            return Err(Error::NotFound(format!("tree row {root} outside {} rows", self.len())));
        }
        let mut stack = vec![root];
        let mut visited = 0usize;
        while let Some(node) = stack.pop() {
            visited += 1;
            if visited > self.len() {
                return Err(Error::InvalidArgument(format!("progenitor links below row {root} form a cycle")));
            }
            visit(node);
            let Some(first) = self.first[node] else {
                continue;
            };
            if only_main_branch {
                stack.push(first);
                continue;
            }
            let start = stack.len();
            let mut sibling = Some(first);
            while let Some(s) = sibling {
                if stack.len() - start > self.len() {
                    return Err(Error::InvalidArgument(format!("sibling links from row {first} form a cycle")));
                }
                stack.push(s);
                sibling = self.next[s];
            }
            // first progenitor on top
            stack[start..].reverse();
        }
        Ok(())
    }
}

/// Rows from a subhalo down its descendant chain to the root descendant.
///
/// `descendants[i]` is the descendant ID of the row with ID `root_id + i`;
/// the walk starts at `start` and follows IDs until `-1`.
pub fn main_descendant_rows(descendants: &[i64], root_id: i64, start: usize) -> Result<Vec<usize>> {
    if start >= descendants.len() {
        return Err(Error::NotFound(format!("row {start} outside {} rows", descendants.len())));
    }
    let mut rows = vec![start];
    let mut row = start;
    while descendants[row] != -1 {
        let next = descendants[row] - root_id;
        if next < 0 || next as usize >= row {
            return Err(Error::InvalidArgument(format!(
                "descendant {} of row {row} is not an earlier row of this tree",
                descendants[row]
            )));
        }
        row = next as usize;
        rows.push(row);
    }
    Ok(rows)
}

/// Gather `rows` of a dataset in order.
///
/// Below `small_tree_rows` rows each one is read on its own; larger
/// selections read the whole column once and pick from memory.
pub fn gather_field<C: Container>(
    file: &C,
    path: &str,
    rows: &[usize],
    small_tree_rows: u64,
) -> Result<Array> {
    if (rows.len() as u64) >= small_tree_rows {
        return read_array(file, path, None)?.gather_rows(rows);
    }
    if !file.contains(path) {
        return Err(Error::MissingField(path.to_string()));
    }
    let info = file.dataset_info(path)?;
    let mut bytes = Vec::with_capacity(rows.len() * info.row_bytes(None));
    for &row in rows {
        let row = row as u64;
        bytes.extend_from_slice(&file.read_rows(path, row..row + 1, None)?);
    }
    let shape = std::iter::once(rows.len() as u64)
        .chain(info.shape.iter().skip(1).copied())
        .collect();
    Array::from_ne_bytes(info.dtype, shape, &bytes)
}

/// Largest mass of `part_type` along the main branch below `index`.
pub fn max_past_mass(tree: &FieldSet, index: usize, part_type: PartType) -> Result<f64> {
    let masses = tree.require("SubhaloMassType")?;
    let branch = main_branch_rows(tree, index)?;
    let column = part_type.index();
    branch
        .filter_map(|row| masses.at_f64(row, column))
        .reduce(f64::max)
        .ok_or_else(|| Error::InvalidArgument(format!("no {part_type} masses below row {index}")))
}

/// Rows `index ..= index + MainLeafProgenitorID - SubhaloID`, clipped to the tree.
fn main_branch_rows(tree: &FieldSet, index: usize) -> Result<Range<usize>> {
    let leaf = id_at(tree, "MainLeafProgenitorID", index)?;
    let id = id_at(tree, "SubhaloID", index)?;
    let size = (leaf - id + 1).max(0) as usize;
    let rows = tree.require("SubhaloID")?.rows();
    Ok(index..(index + size).min(rows))
}

fn id_at(tree: &FieldSet, field: &str, row: usize) -> Result<i64> {
    tree.require(field)?
        .get_i64(row)
        .ok_or_else(|| Error::InvalidArgument(format!("{field}[{row}] is not an integer ID")))
}

/// Count mergers along the main branch below `index`.
///
/// Each further progenitor of a main-branch node counts when both its
/// and the main progenitor's max past masses are positive and their ratio
/// lies in `[min_mass_ratio, 1 / min_mass_ratio]`.
pub fn num_mergers(
    tree: &FieldSet,
    min_mass_ratio: f64,
    part_type: PartType,
    index: usize,
) -> Result<u64> {
    const REQUIRED: [&str; 5] = [
        "SubhaloID",
        "NextProgenitorID",
        "MainLeafProgenitorID",
        "FirstProgenitorID",
        "SubhaloMassType",
    ];
    let missing: Vec<&str> = REQUIRED.iter().copied().filter(|f| !tree.contains(f)).collect();
    if !missing.is_empty() {
        return Err(Error::MissingField(format!(
            "merger counting needs {}",
            missing.join(",")
        )));
    }

    let inv_ratio = 1.0 / min_mass_ratio;
    let root_id = id_at(tree, "SubhaloID", index)?;
    let row_of = |id: i64| -> Result<usize> {
        usize::try_from(index as i64 + (id - root_id))
            .map_err(|_| Error::InvalidArgument(format!("subhalo ID {id} precedes the tree root")))
    };

    let mut mergers = 0;
    let mut fp_id = id_at(tree, "FirstProgenitorID", index)?;
    while fp_id != -1 {
        let fp_row = row_of(fp_id)?;
        let fp_mass = max_past_mass(tree, fp_row, part_type)?;

        let mut np_id = id_at(tree, "NextProgenitorID", fp_row)?;
        while np_id != -1 {
            let np_row = row_of(np_id)?;
            let np_mass = max_past_mass(tree, np_row, part_type)?;
            if fp_mass > 0.0 && np_mass > 0.0 {
                let ratio = np_mass / fp_mass;
                if ratio >= min_mass_ratio && ratio <= inv_ratio {
                    mergers += 1;
                }
            }
            np_id = id_at(tree, "NextProgenitorID", np_row)?;
        }
        fp_id = id_at(tree, "FirstProgenitorID", fp_row)?;
    }
    Ok(mergers)
}
