//! Run configuration and per-call options.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::offset_table::CachePolicy;

/// Subtrees smaller than this are gathered row by row.
pub const DEFAULT_SMALL_TREE_ROWS: u64 = 1000;

/// Where the simulation lives and how reads are carried out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The `output` directory of a simulation run.
    pub base_path: PathBuf,
    /// Worker threads for chunk reads; `None` or 1 reads serially.
    pub threads: Option<usize>,
    pub small_tree_rows: u64,
    /// Down-cast 64-bit float fields to 32 bits unless a call overrides it.
    pub float32: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_path: PathBuf::from("."),
            threads: None,
            small_tree_rows: DEFAULT_SMALL_TREE_ROWS,
            float32: false,
        }
    }
}

impl Config {
    pub fn new(base_path: impl Into<PathBuf>) -> Config {
        Config {
            base_path: base_path.into(),
            ..Config::default()
        }
    }

    /// Read `ILLUSTRIS_BASE_PATH` and `ILLUSTRIS_THREADS` (or `OMP_NUM_THREADS`).
    pub fn from_env() -> Result<Config> {
        Config::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let base = var("ILLUSTRIS_BASE_PATH")
            .ok_or_else(|| Error::InvalidArgument("ILLUSTRIS_BASE_PATH is not set".into()))?;
        let threads = match var("ILLUSTRIS_THREADS").or_else(|| var("OMP_NUM_THREADS")) {
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|_| {
                Error::InvalidArgument(format!("thread count [{raw}] is not a number"))
            })?),
            None => None,
        };
        Ok(Config {
            threads,
            ..Config::new(base)
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_threads(mut self, threads: usize) -> Config {
        self.threads = Some(threads);
        self
    }

    pub(crate) fn parallel_by_default(&self) -> bool {
        self.threads.is_some_and(|t| t > 1)
    }
}

/// Options for snapshot and group catalog reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// Fan chunk reads out over worker threads.
    pub parallel: bool,
    pub float32: bool,
    /// Per-field column of a 2-D field (aligned with the requested field list).
    pub columns: Vec<Option<u64>>,
}

impl ReadOptions {
    pub fn new() -> ReadOptions {
        ReadOptions::default()
    }

    pub fn parallel(mut self) -> ReadOptions {
        self.parallel = true;
        self
    }

    pub fn float32(mut self) -> ReadOptions {
        self.float32 = true;
        self
    }

    pub fn columns(mut self, columns: Vec<Option<u64>>) -> ReadOptions {
        self.columns = columns;
        self
    }

    pub(crate) fn parallel_under(&self, config: &Config) -> bool {
        self.parallel || config.parallel_by_default()
    }

    pub(crate) fn float32_under(&self, config: &Config) -> bool {
        self.float32 || config.float32
    }
}

/// Options for merger tree loads.
#[derive(Debug, Clone)]
pub struct TreeOptions<'a> {
    /// Keep only the main progenitor branch.
    pub only_main_branch: bool,
    /// Keep only the main descendant branch (SubLink).
    pub only_main_descendant_branch: bool,
    /// SubLink tree directory name, e.g. `SubLink` or `SubLink_gal`.
    pub tree_name: String,
    pub cache: CachePolicy<'a>,
}

impl Default for TreeOptions<'_> {
    fn default() -> Self {
        TreeOptions {
            only_main_branch: false,
            only_main_descendant_branch: false,
            tree_name: String::from("SubLink"),
            cache: CachePolicy::Shared,
        }
    }
}

impl<'a> TreeOptions<'a> {
    pub fn main_branch() -> TreeOptions<'a> {
        TreeOptions {
            only_main_branch: true,
            ..TreeOptions::default()
        }
    }

    pub fn main_descendant_branch() -> TreeOptions<'a> {
        TreeOptions {
            only_main_descendant_branch: true,
            ..TreeOptions::default()
        }
    }

    pub fn tree_name(mut self, name: impl Into<String>) -> TreeOptions<'a> {
        self.tree_name = name.into();
        self
    }

    pub fn cache(mut self, cache: CachePolicy<'a>) -> TreeOptions<'a> {
        self.cache = cache;
        self
    }
}
