//! Pure-Rust parsing of the HDF5 structures found in chunked simulation
//! outputs.
//!
//! Covers superblocks v0–v3, object headers v1/v2, symbol-table and
//! compact-link groups, compact/contiguous/chunked layouts with deflate,
//! shuffle and fletcher32, and attributes. The `writer` feature adds a
//! small file writer for building fixtures.

pub mod attribute;
pub mod btree_v1;
mod bytes;
pub mod data_layout;
pub mod dataset;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod filter_pipeline;
pub mod filters;
pub mod group;
pub mod link_message;
pub mod local_heap;
pub mod message_type;
pub mod object_header;
pub mod signature;
pub mod superblock;
pub mod symbol_table;

#[cfg(feature = "writer")]
pub mod file_writer;

pub use dataset::DatasetMeta;
pub use datatype::{ByteOrder, Datatype};
pub use error::FormatError;
pub use superblock::Superblock;
