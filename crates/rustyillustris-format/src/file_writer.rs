//! Minimal HDF5 file writer.
//!
//! Produces files with a v3 superblock, v2 object headers, compact link
//! storage, contiguous or chunked (B-tree v1, optional shuffle + deflate)
//! datasets and compact v3 attributes. Objects are laid out children first,
//! so every address is known when its parent header is written. Metadata
//! checksums are written as zero.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::attribute::AttributeMessage;
use crate::data_layout::DataLayout;
use crate::dataspace::Dataspace;
use crate::datatype::{ByteOrder, Datatype};
use crate::error::FormatError;
use crate::filter_pipeline::{Filter, FilterPipeline, FILTER_DEFLATE, FILTER_SHUFFLE};
use crate::link_message::LinkMessage;
use crate::message_type::MessageType;
use crate::signature::HDF5_SIGNATURE;

const SUPERBLOCK_SIZE: usize = 48;
const UNDEFINED: u64 = u64::MAX;

/// A fixed-size element type that can be written as little-endian bytes.
pub trait Element: Copy {
    fn datatype() -> Datatype;
    fn extend_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($t:ty => $dt:expr),* $(,)?) => {
        $(impl Element for $t {
            fn datatype() -> Datatype {
                $dt
            }
            fn extend_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        })*
    };
}

const fn int(size: u32, signed: bool) -> Datatype {
    Datatype::FixedPoint {
        size,
        signed,
        byte_order: ByteOrder::LittleEndian,
    }
}

const fn float(size: u32) -> Datatype {
    Datatype::FloatingPoint {
        size,
        byte_order: ByteOrder::LittleEndian,
    }
}

impl_element! {
    i8 => int(1, true),
    u8 => int(1, false),
    i32 => int(4, true),
    u32 => int(4, false),
    i64 => int(8, true),
    u64 => int(8, false),
    f32 => float(4),
    f64 => float(8),
}

fn le_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for &v in values {
        v.extend_le(&mut out);
    }
    out
}

/// An attribute value ready to be attached to a group or dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrValue {
    datatype: Datatype,
    dataspace: Dataspace,
    raw: Vec<u8>,
}

impl AttrValue {
    pub fn scalar<T: Element>(value: T) -> AttrValue {
        AttrValue {
            datatype: T::datatype(),
            dataspace: Dataspace::scalar(),
            raw: le_bytes(&[value]),
        }
    }

    pub fn array<T: Element>(values: &[T]) -> AttrValue {
        AttrValue {
            datatype: T::datatype(),
            dataspace: Dataspace::simple(&[values.len() as u64]),
            raw: le_bytes(values),
        }
    }

    /// A 2-D array attribute stored row-major.
    pub fn array_2d<T: Element>(rows: usize, cols: usize, values: &[T]) -> AttrValue {
        AttrValue {
            datatype: T::datatype(),
            dataspace: Dataspace::simple(&[rows as u64, cols as u64]),
            raw: le_bytes(values),
        }
    }

    pub fn string(value: &str) -> AttrValue {
        AttrValue {
            datatype: Datatype::String {
                size: value.len().max(1) as u32,
            },
            dataspace: Dataspace::scalar(),
            raw: if value.is_empty() {
                vec![0]
            } else {
                value.as_bytes().to_vec()
            },
        }
    }
}

/// How a chunked dataset is split and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Rows per chunk along the first dimension.
    pub chunk_rows: u64,
    pub shuffle: bool,
    /// Deflate level, if compressed.
    pub deflate: Option<u32>,
}

#[derive(Default)]
struct GroupNode {
    children: Vec<(String, Node)>,
    attrs: Vec<AttributeMessage>,
}

struct DatasetNode {
    datatype: Datatype,
    shape: Vec<u64>,
    raw: Vec<u8>,
    chunking: Option<ChunkOptions>,
    attrs: Vec<AttributeMessage>,
}

enum Node {
    Group(GroupNode),
    Dataset(DatasetNode),
}

/// Builds an HDF5 file image in memory.
#[derive(Default)]
pub struct FileWriter {
    root: GroupNode,
}

impl FileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group and any missing parents.
    pub fn create_group(&mut self, path: &str) -> Result<(), FormatError> {
        group_mut(&mut self.root, path, true).map(|_| ())
    }

    /// Write a contiguous dataset from typed values.
    pub fn write<T: Element>(
        &mut self,
        path: &str,
        shape: &[u64],
        values: &[T],
    ) -> Result<(), FormatError> {
        self.write_raw(path, T::datatype(), shape, le_bytes(values), None)
    }

    /// Write a chunked dataset from typed values.
    pub fn write_chunked<T: Element>(
        &mut self,
        path: &str,
        shape: &[u64],
        values: &[T],
        options: ChunkOptions,
    ) -> Result<(), FormatError> {
        if shape.is_empty() || options.chunk_rows == 0 {
            return Err(FormatError::UnsupportedLayout(2));
        }
        self.write_raw(path, T::datatype(), shape, le_bytes(values), Some(options))
    }

    /// Write a dataset from raw little-endian bytes.
    pub fn write_raw(
        &mut self,
        path: &str,
        datatype: Datatype,
        shape: &[u64],
        raw: Vec<u8>,
        chunking: Option<ChunkOptions>,
    ) -> Result<(), FormatError> {
        let expected = shape.iter().product::<u64>() as usize * datatype.size() as usize;
        if raw.len() != expected {
            return Err(FormatError::UnexpectedEof {
                expected,
                available: raw.len(),
            });
        }
        let (parent, name) = split_path(path);
        let group = group_mut(&mut self.root, parent, true)?;
        group.children.push((
            name.to_string(),
            Node::Dataset(DatasetNode {
                datatype,
                shape: shape.to_vec(),
                raw,
                chunking,
                attrs: Vec::new(),
            }),
        ));
        Ok(())
    }

    /// Attach an attribute to the object at `object` ("" or "/" for the root).
    pub fn set_attr(&mut self, object: &str, name: &str, value: AttrValue) -> Result<(), FormatError> {
        let attr = AttributeMessage {
            name: name.to_string(),
            datatype: value.datatype,
            dataspace: value.dataspace,
            raw_data: value.raw,
        };
        let trimmed = object.trim_matches('/');
        if trimmed.is_empty() {
            self.root.attrs.push(attr);
            return Ok(());
        }
        let (parent, child) = split_path(trimmed);
        let group = group_mut(&mut self.root, parent, false)?;
        match group.children.iter_mut().find(|(n, _)| n == child) {
            Some((_, Node::Group(g))) => g.attrs.push(attr),
            Some((_, Node::Dataset(d))) => d.attrs.push(attr),
            None => return Err(FormatError::PathNotFound(object.to_string())),
        }
        Ok(())
    }

    /// Lay out the file and return its bytes.
    pub fn finish(self) -> Result<Vec<u8>, FormatError> {
        let mut buf = vec![0u8; SUPERBLOCK_SIZE];
        let root = emit_group(&self.root, &mut buf)?;
        let eof = buf.len() as u64;

        let mut sb = HDF5_SIGNATURE.to_vec();
        sb.extend_from_slice(&[3, 8, 8, 0]);
        sb.extend_from_slice(&0u64.to_le_bytes());
        sb.extend_from_slice(&UNDEFINED.to_le_bytes());
        sb.extend_from_slice(&eof.to_le_bytes());
        sb.extend_from_slice(&root.to_le_bytes());
        sb.extend_from_slice(&[0u8; 4]);
        buf[..SUPERBLOCK_SIZE].copy_from_slice(&sb);
        Ok(buf)
    }
}

fn split_path(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn group_mut<'a>(
    root: &'a mut GroupNode,
    path: &str,
    create: bool,
) -> Result<&'a mut GroupNode, FormatError> {
    let mut group = root;
    for name in path.split('/').filter(|c| !c.is_empty()) {
        let current = group;
        let index = match current.children.iter().position(|(n, _)| n == name) {
            Some(i) => i,
            None if create => {
                current
                    .children
                    .push((name.to_string(), Node::Group(GroupNode::default())));
                current.children.len() - 1
            }
            None => return Err(FormatError::PathNotFound(path.to_string())),
        };
        group = match &mut current.children[index].1 {
            Node::Group(g) => g,
            Node::Dataset(_) => return Err(FormatError::PathNotFound(path.to_string())),
        };
    }
    Ok(group)
}

// ---- object emission ----

fn append(buf: &mut Vec<u8>, bytes: &[u8]) -> u64 {
    let address = buf.len() as u64;
    buf.extend_from_slice(bytes);
    address
}

/// v2 object header with a 4-byte chunk size field.
fn object_header(messages: &[(MessageType, Vec<u8>)]) -> Vec<u8> {
    let body: usize = messages.iter().map(|(_, d)| 4 + d.len()).sum();
    let mut buf = b"OHDR".to_vec();
    buf.extend_from_slice(&[2, 0x02]);
    buf.extend_from_slice(&(body as u32).to_le_bytes());
    for (ty, data) in messages {
        buf.push(ty.to_u16() as u8);
        buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
        buf.push(0);
        buf.extend_from_slice(data);
    }
    buf.extend_from_slice(&[0u8; 4]);
    buf
}

fn emit_group(group: &GroupNode, buf: &mut Vec<u8>) -> Result<u64, FormatError> {
    // link info: version 0, no creation order, no dense storage
    let mut link_info = vec![0, 0];
    link_info.extend_from_slice(&UNDEFINED.to_le_bytes());
    link_info.extend_from_slice(&UNDEFINED.to_le_bytes());
    let mut messages = vec![(MessageType::LinkInfo, link_info)];

    for (name, child) in &group.children {
        let address = match child {
            Node::Group(g) => emit_group(g, buf)?,
            Node::Dataset(d) => emit_dataset(d, buf)?,
        };
        messages.push((MessageType::Link, LinkMessage::serialize_hard(name, address)));
    }
    for attr in &group.attrs {
        messages.push((MessageType::Attribute, attr.serialize()));
    }
    Ok(append(buf, &object_header(&messages)))
}

fn emit_dataset(ds: &DatasetNode, buf: &mut Vec<u8>) -> Result<u64, FormatError> {
    let dataspace = if ds.shape.is_empty() {
        Dataspace::scalar()
    } else {
        Dataspace::simple(&ds.shape)
    };
    let mut messages = vec![
        (MessageType::Dataspace, dataspace.serialize()),
        (MessageType::Datatype, ds.datatype.serialize()),
    ];
    match ds.chunking {
        None => {
            let address = (!ds.raw.is_empty()).then(|| append(buf, &ds.raw));
            let layout = DataLayout::Contiguous {
                address,
                size: ds.raw.len() as u64,
            };
            messages.push((MessageType::DataLayout, layout.serialize()));
        }
        Some(options) => {
            let (layout, pipeline) = emit_chunks(ds, options, buf)?;
            messages.push((MessageType::DataLayout, layout.serialize()));
            if !pipeline.filters.is_empty() {
                messages.push((MessageType::FilterPipeline, pipeline.serialize()));
            }
        }
    }
    for attr in &ds.attrs {
        messages.push((MessageType::Attribute, attr.serialize()));
    }
    Ok(append(buf, &object_header(&messages)))
}

fn emit_chunks(
    ds: &DatasetNode,
    options: ChunkOptions,
    buf: &mut Vec<u8>,
) -> Result<(DataLayout, FilterPipeline), FormatError> {
    let elem = ds.datatype.size() as usize;
    let rows = ds.shape[0];
    let row_bytes = ds.shape[1..].iter().product::<u64>() as usize * elem;
    let chunk_bytes = options.chunk_rows as usize * row_bytes;

    let mut pipeline = FilterPipeline::default();
    if options.shuffle {
        pipeline.filters.push(Filter {
            id: FILTER_SHUFFLE,
            flags: 0,
            client_data: vec![elem as u32],
        });
    }
    if let Some(level) = options.deflate {
        pipeline.filters.push(Filter {
            id: FILTER_DEFLATE,
            flags: 0,
            client_data: vec![level],
        });
    }

    let mut records = Vec::new();
    let mut start = 0u64;
    while start < rows {
        let end = (start + options.chunk_rows).min(rows);
        let mut chunk = ds.raw[start as usize * row_bytes..end as usize * row_bytes].to_vec();
        chunk.resize(chunk_bytes, 0);
        if options.shuffle {
            chunk = shuffle(&chunk, elem);
        }
        if let Some(level) = options.deflate {
            let deflate_err = |e: std::io::Error| FormatError::FilterError(format!("deflate: {e}"));
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level));
            enc.write_all(&chunk).map_err(deflate_err)?;
            chunk = enc.finish().map_err(deflate_err)?;
        }
        let address = append(buf, &chunk);
        records.push((chunk.len() as u32, start, address));
        start = end;
    }

    let mut chunk_dims = ds.shape.clone();
    chunk_dims[0] = options.chunk_rows;
    let btree_address = if records.is_empty() {
        None
    } else {
        Some(append(buf, &chunk_btree(&records, &ds.shape)))
    };
    Ok((
        DataLayout::Chunked {
            chunk_dims,
            btree_address,
            element_size: elem as u32,
        },
        pipeline,
    ))
}

/// A single level-0 chunk B-tree node; chunks only split the first dimension.
fn chunk_btree(records: &[(u32, u64, u64)], shape: &[u64]) -> Vec<u8> {
    let rank = shape.len();
    let mut node = b"TREE".to_vec();
    node.extend_from_slice(&[1, 0]);
    node.extend_from_slice(&(records.len() as u16).to_le_bytes());
    node.extend_from_slice(&UNDEFINED.to_le_bytes());
    node.extend_from_slice(&UNDEFINED.to_le_bytes());
    for &(size, row, address) in records {
        node.extend_from_slice(&size.to_le_bytes());
        node.extend_from_slice(&0u32.to_le_bytes());
        node.extend_from_slice(&row.to_le_bytes());
        for _ in 0..rank {
            node.extend_from_slice(&0u64.to_le_bytes());
        }
        node.extend_from_slice(&address.to_le_bytes());
    }
    node.extend_from_slice(&[0u8; 8]);
    for &d in shape {
        node.extend_from_slice(&d.to_le_bytes());
    }
    node.extend_from_slice(&0u64.to_le_bytes());
    node
}

fn shuffle(data: &[u8], size: usize) -> Vec<u8> {
    let n = data.len() / size;
    let mut out = data.to_vec();
    for i in 0..n {
        for b in 0..size {
            out[b * n + i] = data[i * size + b];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{read_rows, DatasetMeta};
    use crate::group::{group_entries, resolve_path};
    use crate::object_header::ObjectHeader;
    use crate::superblock::Superblock;

    fn open(bytes: &[u8]) -> Superblock {
        Superblock::parse(bytes, 0).unwrap()
    }

    fn dataset(bytes: &[u8], sb: &Superblock, path: &str) -> DatasetMeta {
        let addr = resolve_path(bytes, sb, path).unwrap();
        let hdr = ObjectHeader::parse(bytes, addr as usize, 8, 8).unwrap();
        DatasetMeta::from_header(&hdr, 8, 8).unwrap()
    }

    #[test]
    fn groups_datasets_and_attributes() {
        let mut w = FileWriter::new();
        w.create_group("Header").unwrap();
        w.set_attr("Header", "NumFilesPerSnapshot", AttrValue::scalar(2i32))
            .unwrap();
        w.write("PartType1/ParticleIDs", &[3], &[10u64, 11, 12]).unwrap();
        w.write("PartType1/Coordinates", &[2, 3], &[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap();
        let bytes = w.finish().unwrap();

        let sb = open(&bytes);
        assert_eq!(sb.version, 3);
        assert_eq!(sb.eof_address, bytes.len() as u64);

        let root = ObjectHeader::parse(&bytes, sb.root_group_address as usize, 8, 8).unwrap();
        let names: Vec<String> = group_entries(&bytes, &root, 8, 8)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Header", "PartType1"]);

        let header_addr = resolve_path(&bytes, &sb, "Header").unwrap();
        let header = ObjectHeader::parse(&bytes, header_addr as usize, 8, 8).unwrap();
        let attrs = crate::attribute::attributes(&header, 8);
        assert_eq!(attrs[0].name, "NumFilesPerSnapshot");
        assert_eq!(attrs[0].raw_data, 2i32.to_le_bytes().to_vec());

        let coords = dataset(&bytes, &sb, "PartType1/Coordinates");
        assert_eq!(coords.shape(), &[2, 3]);
        let row = read_rows(&bytes, &coords, 1..2, 8).unwrap();
        assert_eq!(row, le_bytes(&[3.0f32, 4.0, 5.0]));
    }

    #[test]
    fn chunked_with_filters() {
        let values: Vec<i64> = (0..50).map(|v| v * 3 - 7).collect();
        let mut w = FileWriter::new();
        w.write_chunked(
            "Tree0/SubhaloID",
            &[50],
            &values,
            ChunkOptions {
                chunk_rows: 16,
                shuffle: true,
                deflate: Some(6),
            },
        )
        .unwrap();
        let bytes = w.finish().unwrap();
        let sb = open(&bytes);
        let meta = dataset(&bytes, &sb, "Tree0/SubhaloID");
        assert_eq!(meta.filters.filters.len(), 2);
        let out = read_rows(&bytes, &meta, 10..40, 8).unwrap();
        assert_eq!(out, le_bytes(&values[10..40]));
    }

    #[test]
    fn empty_dataset_and_bad_sizes() {
        let mut w = FileWriter::new();
        w.write::<f64>("Group/GroupMass", &[0], &[]).unwrap();
        assert!(w.write("Group/Bad", &[3], &[1.0f64]).is_err());
        assert!(w.set_attr("Nope", "x", AttrValue::scalar(1i64)).is_err());
        let bytes = w.finish().unwrap();
        let sb = open(&bytes);
        let meta = dataset(&bytes, &sb, "Group/GroupMass");
        assert_eq!(meta.rows(), 0);
        assert!(read_rows(&bytes, &meta, 0..0, 8).unwrap().is_empty());
    }
}
