//! Chunked reads of Illustris and IllustrisTNG simulation outputs.
//!
//! Snapshots, group catalogs, merger trees and cartesian grids are each
//! written as many numbered HDF5 chunk files. This crate locates the rows
//! of one halo, subhalo or tree across those chunks and reads them into
//! contiguous arrays.
//!
//! # Reading particles of a subhalo
//!
//! ```no_run
//! use rustyillustris::{PartType, Simulation};
//!
//! let sim = Simulation::new("/sims/TNG50-4/output");
//! let gas = sim.load_subhalo(99, 12, PartType::GAS, ["Coordinates", "Masses"])?;
//! let masses = gas.require("Masses")?;
//! println!("{} cells, first mass {:?}", gas.count, masses.get_f64(0));
//! # Ok::<(), rustyillustris::Error>(())
//! ```
//!
//! # Walking a merger tree
//!
//! ```no_run
//! use rustyillustris::{num_mergers, PartType, Simulation, TreeOptions, DEFAULT_MIN_MASS_RATIO};
//!
//! let sim = Simulation::new("/sims/TNG50-4/output");
//! let fields = [
//!     "SubhaloID",
//!     "NextProgenitorID",
//!     "MainLeafProgenitorID",
//!     "FirstProgenitorID",
//!     "SubhaloMassType",
//! ];
//! if let Some(tree) = sim.load_sublink_tree(99, 12, fields, &TreeOptions::default())? {
//!     let n = num_mergers(&tree, DEFAULT_MIN_MASS_RATIO, PartType::STARS, 0)?;
//!     println!("{n} mergers");
//! }
//! # Ok::<(), rustyillustris::Error>(())
//! ```

pub mod array;
pub mod cartesian;
pub mod config;
pub mod error;
pub mod groupcat;
pub mod lhalotree;
pub mod locator;
pub mod offset_table;
pub mod part_type;
pub mod paths;
pub mod reader;
pub mod simulation;
pub mod snapshot;
pub mod sublink;
pub mod subset;
pub mod walker;

pub use array::{Array, ArrayData, Element, FieldSet, Fields};
pub use cartesian::BoundingBox;
pub use config::{Config, ReadOptions, TreeOptions, DEFAULT_SMALL_TREE_ROWS};
pub use error::{Error, Result};
pub use groupcat::{GroupCatalog, Selector};
pub use lhalotree::LHaloTreeOffsets;
pub use locator::ChunkDescriptor;
pub use offset_table::{CachePolicy, OffsetCache, OffsetTable, SUBLINK_CHUNK_PREFIX};
pub use part_type::{PartType, NUM_PART_TYPES};
pub use paths::CatalogLayout;
pub use reader::{ChunkSource, FieldReader, LocalCount};
pub use simulation::Simulation;
pub use sublink::SublinkOffsets;
pub use subset::{CatalogRow, EntityKind, SnapshotSubset};
pub use walker::{max_past_mass, num_mergers, Links, DEFAULT_MIN_MASS_RATIO};

pub use rustyillustris_io::{AttrValue, Backend, Container, DType, FsBackend, H5File, MemBackend};
