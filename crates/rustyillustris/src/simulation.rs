//! The simulation handle every loader hangs off.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustyillustris_io::{AttrValue, Backend, Container, FsBackend};

use crate::config::{Config, ReadOptions};
use crate::error::{Error, Result};
use crate::offset_table::{CachePolicy, OffsetCache, OffsetTable};
use crate::reader::{ChunkSource, FieldReader};

/// One simulation run: where its outputs live, how to open them and the
/// offset tables built so far.
///
/// ```no_run
/// use rustyillustris::{Fields, PartType, Simulation};
///
/// let sim = Simulation::new("/sims/TNG100-3/output");
/// let stars = sim.load_subhalo(99, 0, PartType::STARS, Fields::from(["Coordinates", "Masses"]))?;
/// println!("{} star particles", stars.count);
/// # Ok::<(), rustyillustris::Error>(())
/// ```
#[derive(Debug)]
pub struct Simulation<B: Backend = FsBackend> {
    backend: B,
    config: Config,
    cache: OffsetCache,
    /// Worker pool for `config.threads`, built on first parallel read.
    pool: Mutex<Option<Arc<ThreadPool>>>,
}

impl Simulation<FsBackend> {
    /// A simulation on the local filesystem.
    pub fn new(base_path: impl Into<PathBuf>) -> Simulation<FsBackend> {
        Simulation::open(Config::new(base_path))
    }

    pub fn open(config: Config) -> Simulation<FsBackend> {
        Simulation::with_backend(FsBackend, config)
    }
}

impl<B: Backend> Simulation<B> {
    pub fn with_backend(backend: B, config: Config) -> Simulation<B> {
        Simulation {
            backend,
            config,
            cache: OffsetCache::new(),
            pool: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Offset tables shared by tree loads that use [`CachePolicy::Shared`].
    pub fn offset_cache(&self) -> &OffsetCache {
        &self.cache
    }

    /// Open a chunk, reporting a missing file as `NotFound`.
    pub(crate) fn open_file(&self, path: &Path) -> Result<B::File> {
        if !self.backend.exists(path) {
            return Err(Error::NotFound(path.display().to_string()));
        }
        Ok(self.backend.open(path)?)
    }

    /// Offset table of a tree directory under the given cache policy.
    pub(crate) fn offset_table(
        &self,
        dir: &Path,
        prefix: &str,
        policy: CachePolicy<'_>,
    ) -> Result<Arc<OffsetTable>> {
        let build = || OffsetTable::build(&self.backend, dir, prefix);
        match policy {
            CachePolicy::Shared => self.cache.get_or_build(dir, build),
            CachePolicy::Custom(cache) => cache.get_or_build(dir, build),
            CachePolicy::Disabled => Ok(Arc::new(build()?)),
        }
    }

    /// The run's worker pool, or `None` to use rayon's global pool.
    pub(crate) fn thread_pool(&self) -> Result<Option<Arc<ThreadPool>>> {
        let n = match self.config.threads {
            Some(n) if n > 1 => n,
            _ => return Ok(None),
        };
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Some(Arc::clone(pool)));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("thread pool: {e}")))?;
        let pool = Arc::new(pool);
        *slot = Some(Arc::clone(&pool));
        Ok(Some(pool))
    }

    /// A reader over `source` with the call's options and the run's pool.
    pub(crate) fn field_reader<'a>(
        &'a self,
        source: ChunkSource<'a, B>,
        opts: &ReadOptions,
    ) -> Result<FieldReader<'a, B>> {
        let pool = if opts.parallel_under(&self.config) {
            self.thread_pool()?
        } else {
            None
        };
        Ok(FieldReader::new(source)
            .with_options(opts, &self.config)
            .with_pool(pool))
    }
}

/// Every attribute of the `Header` group.
pub(crate) fn header<C: Container>(file: &C) -> Result<BTreeMap<String, AttrValue>> {
    Ok(file.attrs("Header")?)
}

pub(crate) fn header_i64(header: &BTreeMap<String, AttrValue>, name: &str) -> Result<i64> {
    header
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::MissingField(format!("Header/{name}")))
}

pub(crate) fn header_i64_vec(header: &BTreeMap<String, AttrValue>, name: &str) -> Result<Vec<i64>> {
    header
        .get(name)
        .and_then(|v| v.to_i64_vec())
        .ok_or_else(|| Error::MissingField(format!("Header/{name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyillustris_io::MemBackend;

    fn sim(threads: Option<usize>) -> Simulation<MemBackend> {
        let config = Config {
            threads,
            ..Config::new("/sim")
        };
        Simulation::with_backend(MemBackend::new(), config)
    }

    #[test]
    fn thread_pool_is_built_once() {
        let s = sim(Some(3));
        let first = s.thread_pool().unwrap().unwrap();
        let second = s.thread_pool().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.current_num_threads(), 3);
    }

    #[test]
    fn serial_runs_use_no_pool() {
        assert!(sim(None).thread_pool().unwrap().is_none());
        assert!(sim(Some(1)).thread_pool().unwrap().is_none());
    }
}
