//! Container access for chunked simulation outputs.
//!
//! [`Container`] is the read interface the loaders are written against;
//! [`H5File`] implements it over a memory-mapped HDF5 file and
//! [`MemBackend`] serves in-memory file images for tests.

pub mod backend;
pub mod container;
pub mod error;
pub mod h5file;
pub mod types;

pub use backend::{FsBackend, MemBackend};
pub use container::{Backend, Container, DatasetInfo};
pub use error::{Error, Result};
pub use h5file::H5File;
pub use types::{AttrData, AttrValue, DType};
