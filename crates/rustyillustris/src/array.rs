//! Typed arrays and field collections returned by the loaders.

use std::ops::Range;

use bytemuck::allocation::pod_collect_to_vec;
use rustyillustris_io::DType;

use crate::error::{Error, Result};

/// Element storage of an [`Array`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::I8($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::U8($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
        }
    };
}

macro_rules! map_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::I8($v) => ArrayData::I8($body),
            ArrayData::I16($v) => ArrayData::I16($body),
            ArrayData::I32($v) => ArrayData::I32($body),
            ArrayData::I64($v) => ArrayData::I64($body),
            ArrayData::U8($v) => ArrayData::U8($body),
            ArrayData::U16($v) => ArrayData::U16($body),
            ArrayData::U32($v) => ArrayData::U32($body),
            ArrayData::U64($v) => ArrayData::U64($body),
            ArrayData::F32($v) => ArrayData::F32($body),
            ArrayData::F64($v) => ArrayData::F64($body),
        }
    };
}

/// A numeric element type an [`Array`] can hold.
pub trait Element: bytemuck::Pod + PartialOrd {
    const DTYPE: DType;

    fn wrap(values: Vec<Self>) -> ArrayData;

    fn slice(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        })*
    };
}

impl_element! {
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
}

/// Row-major n-dimensional array. The first dimension counts rows
/// (particles, subhalos, tree nodes).
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<u64>,
    data: ArrayData,
}

impl Array {
    pub fn from_vec<T: Element>(shape: Vec<u64>, values: Vec<T>) -> Result<Array> {
        check_len(&shape, values.len())?;
        Ok(Array {
            shape,
            data: T::wrap(values),
        })
    }

    /// Decode native-endian bytes as elements of `dtype`.
    pub fn from_ne_bytes(dtype: DType, shape: Vec<u64>, bytes: &[u8]) -> Result<Array> {
        if dtype.size() == 0 || bytes.len() % dtype.size() != 0 {
            return Err(Error::InvalidArgument(format!(
                "{} bytes do not hold whole {dtype:?} elements",
                bytes.len()
            )));
        }
        let data = match dtype {
            DType::I8 => ArrayData::I8(pod_collect_to_vec(bytes)),
            DType::I16 => ArrayData::I16(pod_collect_to_vec(bytes)),
            DType::I32 => ArrayData::I32(pod_collect_to_vec(bytes)),
            DType::I64 => ArrayData::I64(pod_collect_to_vec(bytes)),
            DType::U8 => ArrayData::U8(bytes.to_vec()),
            DType::U16 => ArrayData::U16(pod_collect_to_vec(bytes)),
            DType::U32 => ArrayData::U32(pod_collect_to_vec(bytes)),
            DType::U64 => ArrayData::U64(pod_collect_to_vec(bytes)),
            DType::F32 => ArrayData::F32(pod_collect_to_vec(bytes)),
            DType::F64 => ArrayData::F64(pod_collect_to_vec(bytes)),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "non-numeric element type {other:?}"
                )))
            }
        };
        let array = Array { shape, data };
        check_len(&array.shape, array.len())?;
        Ok(array)
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    pub fn dtype(&self) -> DType {
        match self.data {
            ArrayData::I8(_) => DType::I8,
            ArrayData::I16(_) => DType::I16,
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
            ArrayData::U8(_) => DType::U8,
            ArrayData::U16(_) => DType::U16,
            ArrayData::U32(_) => DType::U32,
            ArrayData::U64(_) => DType::U64,
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
        }
    }

    /// Extent of the first dimension.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1) as usize
    }

    /// Elements per row.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product::<u64>() as usize
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        each_variant!(&self.data, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Raw native-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        each_variant!(&self.data, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Element at flat `index`, widened to f64.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        Some(match &self.data {
            ArrayData::I8(v) => *v.get(index)? as f64,
            ArrayData::I16(v) => *v.get(index)? as f64,
            ArrayData::I32(v) => *v.get(index)? as f64,
            ArrayData::I64(v) => *v.get(index)? as f64,
            ArrayData::U8(v) => *v.get(index)? as f64,
            ArrayData::U16(v) => *v.get(index)? as f64,
            ArrayData::U32(v) => *v.get(index)? as f64,
            ArrayData::U64(v) => *v.get(index)? as f64,
            ArrayData::F32(v) => *v.get(index)? as f64,
            ArrayData::F64(v) => *v.get(index)?,
        })
    }

    /// Integer element at flat `index`; `None` for floats.
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        match &self.data {
            ArrayData::I8(v) => v.get(index).map(|&x| x as i64),
            ArrayData::I16(v) => v.get(index).map(|&x| x as i64),
            ArrayData::I32(v) => v.get(index).map(|&x| x as i64),
            ArrayData::I64(v) => v.get(index).copied(),
            ArrayData::U8(v) => v.get(index).map(|&x| x as i64),
            ArrayData::U16(v) => v.get(index).map(|&x| x as i64),
            ArrayData::U32(v) => v.get(index).map(|&x| x as i64),
            ArrayData::U64(v) => v.get(index).and_then(|&x| i64::try_from(x).ok()),
            ArrayData::F32(_) | ArrayData::F64(_) => None,
        }
    }

    /// Element `column` of row `row`, widened to f64.
    pub fn at_f64(&self, row: usize, column: usize) -> Option<f64> {
        if column >= self.row_len().max(1) {
            return None;
        }
        self.get_f64(row * self.row_len().max(1) + column)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.get_f64(i)).collect()
    }

    /// Integer elements; `None` for float arrays.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        (0..self.len()).map(|i| self.get_i64(i)).collect()
    }

    /// Copy of rows `rows`.
    pub fn slice_rows(&self, rows: Range<usize>) -> Result<Array> {
        if rows.start > rows.end || rows.end > self.rows() {
            return Err(Error::InvalidArgument(format!(
                "row range {rows:?} outside {} rows",
                self.rows()
            )));
        }
        let width = self.row_len();
        let elems = rows.start * width..rows.end * width;
        Ok(Array {
            shape: self.with_rows(rows.len()),
            data: map_variant!(&self.data, v => v[elems.clone()].to_vec()),
        })
    }

    /// Rows picked by index, in the given order.
    pub fn gather_rows(&self, rows: &[usize]) -> Result<Array> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.rows()) {
            return Err(Error::InvalidArgument(format!(
                "row {bad} outside {} rows",
                self.rows()
            )));
        }
        let width = self.row_len();
        Ok(Array {
            shape: self.with_rows(rows.len()),
            data: map_variant!(&self.data, v => {
                let mut out = Vec::with_capacity(rows.len() * width);
                for &r in rows {
                    out.extend_from_slice(&v[r * width..(r + 1) * width]);
                }
                out
            }),
        })
    }

    /// Join arrays along the first dimension.
    pub fn concat(parts: &[Array]) -> Result<Array> {
        let first = parts
            .first()
            .ok_or_else(|| Error::InvalidArgument("nothing to concatenate".into()))?;
        let mut data = first.data.clone();
        let mut rows = first.rows();
        for part in &parts[1..] {
            if part.shape.get(1..) != first.shape.get(1..) || part.dtype() != first.dtype() {
                return Err(Error::InvalidArgument(format!(
                    "cannot join {:?} {:?} onto {:?} {:?}",
                    part.dtype(),
                    part.shape,
                    first.dtype(),
                    first.shape
                )));
            }
            append(&mut data, &part.data);
            rows += part.rows();
        }
        Ok(Array {
            shape: first.with_rows(rows),
            data,
        })
    }

    /// Same elements under a new shape.
    pub fn reshape(self, shape: Vec<u64>) -> Result<Array> {
        check_len(&shape, self.len())?;
        Ok(Array {
            shape,
            data: self.data,
        })
    }

    /// Narrow 64-bit floats to 32 bits; other types are returned unchanged.
    pub fn into_f32(self) -> Array {
        match self.data {
            ArrayData::F64(v) => Array {
                shape: self.shape,
                data: ArrayData::F32(v.into_iter().map(|x| x as f32).collect()),
            },
            data => Array {
                shape: self.shape,
                data,
            },
        }
    }

    fn with_rows(&self, rows: usize) -> Vec<u64> {
        let mut shape = self.shape.clone();
        match shape.first_mut() {
            Some(first) => *first = rows as u64,
            None => shape.push(rows as u64),
        }
        shape
    }
}

fn append(into: &mut ArrayData, from: &ArrayData) {
    match (into, from) {
        (ArrayData::I8(a), ArrayData::I8(b)) => a.extend_from_slice(b),
        (ArrayData::I16(a), ArrayData::I16(b)) => a.extend_from_slice(b),
        (ArrayData::I32(a), ArrayData::I32(b)) => a.extend_from_slice(b),
        (ArrayData::I64(a), ArrayData::I64(b)) => a.extend_from_slice(b),
        (ArrayData::U8(a), ArrayData::U8(b)) => a.extend_from_slice(b),
        (ArrayData::U16(a), ArrayData::U16(b)) => a.extend_from_slice(b),
        (ArrayData::U32(a), ArrayData::U32(b)) => a.extend_from_slice(b),
        (ArrayData::U64(a), ArrayData::U64(b)) => a.extend_from_slice(b),
        (ArrayData::F32(a), ArrayData::F32(b)) => a.extend_from_slice(b),
        (ArrayData::F64(a), ArrayData::F64(b)) => a.extend_from_slice(b),
        _ => unreachable!("element types checked by caller"),
    }
}

fn check_len(shape: &[u64], len: usize) -> Result<()> {
    let expected = shape.iter().product::<u64>() as usize;
    if expected != len {
        return Err(Error::InvalidArgument(format!(
            "shape {shape:?} needs {expected} elements, got {len}"
        )));
    }
    Ok(())
}

/// Which fields of a group to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Fields {
    /// Every dataset in the group.
    #[default]
    All,
    Named(Vec<String>),
}

impl Fields {
    /// Requested names, or `available` when everything was asked for.
    pub(crate) fn resolve(&self, available: impl FnOnce() -> Result<Vec<String>>) -> Result<Vec<String>> {
        match self {
            Fields::Named(names) if !names.is_empty() => Ok(names.clone()),
            _ => available(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Fields::All) || matches!(self, Fields::Named(n) if n.is_empty())
    }
}

impl From<&str> for Fields {
    fn from(name: &str) -> Fields {
        if name.is_empty() {
            Fields::All
        } else {
            Fields::Named(vec![name.to_string()])
        }
    }
}

impl From<String> for Fields {
    fn from(name: String) -> Fields {
        Fields::from(name.as_str())
    }
}

impl From<&[&str]> for Fields {
    fn from(names: &[&str]) -> Fields {
        Fields::Named(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Fields {
    fn from(names: [&str; N]) -> Fields {
        Fields::from(&names[..])
    }
}

impl From<Vec<&str>> for Fields {
    fn from(names: Vec<&str>) -> Fields {
        Fields::from(names.as_slice())
    }
}

impl From<Vec<String>> for Fields {
    fn from(names: Vec<String>) -> Fields {
        Fields::Named(names)
    }
}

/// Loaded fields of one collection, in request order, with the row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    pub count: u64,
    fields: Vec<(String, Array)>,
}

impl FieldSet {
    pub fn new(count: u64) -> FieldSet {
        FieldSet {
            count,
            fields: Vec::new(),
        }
    }

    /// Add a field, replacing one of the same name.
    pub fn insert(&mut self, name: impl Into<String>, array: Array) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = array,
            None => self.fields.push((name, array)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Array> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn require(&self, name: &str) -> Result<&Array> {
        self.get(name)
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Array> {
        let at = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(at).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array)> {
        self.fields.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The only field, if exactly one was loaded.
    pub fn into_single(mut self) -> Option<Array> {
        if self.fields.len() == 1 {
            self.fields.pop().map(|(_, a)| a)
        } else {
            None
        }
    }

    /// Join two reads of the same fields; an empty side yields the other.
    pub fn concat(self, other: FieldSet) -> Result<FieldSet> {
        if self.count == 0 {
            return Ok(other);
        }
        if other.count == 0 {
            return Ok(self);
        }
        let mut out = FieldSet::new(self.count + other.count);
        for (name, array) in self.fields {
            let tail = other
                .get(&name)
                .ok_or_else(|| Error::MissingField(name.clone()))?;
            out.fields.push((name, Array::concat(&[array, tail.clone()])?));
        }
        Ok(out)
    }
}

impl IntoIterator for FieldSet {
    type Item = (String, Array);
    type IntoIter = std::vec::IntoIter<(String, Array)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
