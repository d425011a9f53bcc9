//! The `VectorDb` handle: key ledger, inverse lookup and vector index kept
//! in lockstep, persisted together under one directory.
//!
//! A handle is single-writer. Two processes opening the same directory get
//! undefined results: the last `write()` wins and readers see whatever files
//! were on disk when they opened.

mod keys;

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use tracing::{debug, error, info, warn};

pub use keys::Keys;

use crate::error::{Result, StoreError};
use crate::index::FlatL2Index;
use crate::ledger::{InverseLookup, KeyLedger};
use crate::linalg::validate_vector;
use crate::options::StoreOptions;
use crate::storage::{self, Loaded, StorePaths};
use crate::types::VectorIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenState {
    /// Constructed, `open()` not called yet.
    Unopened,
    /// Opened with no prior state on disk.
    Fresh,
    /// Opened and loaded validated state from disk.
    Existing,
    /// `open()` failed; the handle refuses all further operations.
    Failed,
}

pub struct VectorDb {
    paths: StorePaths,
    dim: usize,
    options: StoreOptions,
    state: OpenState,
    index: FlatL2Index,
    ledger: KeyLedger,
    lookup: InverseLookup,
    persisted_version: u64,
}

impl VectorDb {
    /// Records the store location and creates its directory. Does not read
    /// or write any artifact.
    pub fn new(path: impl AsRef<Path>, dim: usize) -> Result<Self> {
        Self::with_options(path, dim, StoreOptions::default())
    }

    pub fn with_options(
        path: impl AsRef<Path>,
        dim: usize,
        options: StoreOptions,
    ) -> Result<Self> {
        let dir = path.as_ref();
        if options.create_dir && !dir.is_dir() {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            paths: StorePaths::new(dir),
            dim,
            options,
            state: OpenState::Unopened,
            index: FlatL2Index::new(dim),
            ledger: KeyLedger::new(),
            lookup: InverseLookup::new(),
            persisted_version: 0,
        })
    }

    /// Opens the store and hands the handle back, for `VectorDb::new(..)?.open()?`.
    pub fn open(mut self) -> Result<Self> {
        self.open_in_place()?;
        Ok(self)
    }

    /// Loads persisted state if all artifacts exist, or starts empty if none
    /// do. Any load or validation failure leaves the handle `Failed`.
    pub fn open_in_place(&mut self) -> Result<()> {
        if self.ensure_open().is_ok() && self.is_dirty() {
            warn!(
                path = %self.paths.dir.display(),
                rows = self.ledger.len(),
                "reopening store with unwritten mutations"
            );
        }
        self.reset();
        let loaded = match storage::load(&self.paths) {
            Ok(loaded) => loaded,
            Err(err) => return Err(self.fail(err)),
        };
        match loaded {
            Loaded::Absent => {
                info!(
                    path = %self.paths.dir.display(),
                    dim = self.dim,
                    "no store found, initializing a new one"
                );
                self.state = OpenState::Fresh;
            }
            Loaded::Found {
                index,
                ledger,
                lookup,
            } => {
                if let Err(err) = validate(self.dim, &index, &ledger, &lookup) {
                    return Err(self.fail(err));
                }
                info!(
                    path = %self.paths.dir.display(),
                    rows = ledger.len(),
                    dim = self.dim,
                    "opened store"
                );
                self.index = index;
                self.ledger = ledger;
                self.lookup = lookup;
                self.state = OpenState::Existing;
            }
        }
        self.persisted_version = self.ledger.version();
        Ok(())
    }

    fn reset(&mut self) {
        self.index = FlatL2Index::new(self.dim);
        self.ledger = KeyLedger::new();
        self.lookup = InverseLookup::new();
        self.persisted_version = 0;
    }

    fn fail(&mut self, err: StoreError) -> StoreError {
        error!(path = %self.paths.dir.display(), error = %err, "failed to open store");
        self.reset();
        self.state = OpenState::Failed;
        err
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            OpenState::Fresh | OpenState::Existing => Ok(()),
            OpenState::Unopened | OpenState::Failed => Err(StoreError::NotOpened),
        }
    }

    pub fn state(&self) -> OpenState {
        self.state
    }

    /// `true` when `open()` loaded prior state, `false` when it started empty
    /// or failed.
    pub fn initialized(&self) -> Result<bool> {
        match self.state {
            OpenState::Unopened => Err(StoreError::NotOpened),
            OpenState::Existing => Ok(true),
            OpenState::Fresh | OpenState::Failed => Ok(false),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn path(&self) -> &Path {
        &self.paths.dir
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Number of entries; 0 unless the store is open.
    pub fn len(&self) -> usize {
        match self.state {
            OpenState::Fresh | OpenState::Existing => self.ledger.len(),
            OpenState::Unopened | OpenState::Failed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutations since the last successful `open()` or `write()`.
    pub fn is_dirty(&self) -> bool {
        self.ledger.version() != self.persisted_version
    }

    pub fn keys(&self) -> Result<Keys<'_>> {
        self.ensure_open()?;
        Ok(Keys::new(&self.ledger, &self.lookup))
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.lookup.contains(key))
    }

    pub fn position_of(&self, key: &str) -> Result<Option<usize>> {
        self.ensure_open()?;
        Ok(self.lookup.get(key))
    }

    /// Appends `key` with `vector`. The vector is validated first; a valid
    /// vector for an already stored key returns `false` and changes nothing.
    pub fn insert(&mut self, key: &str, vector: &[f32]) -> Result<bool> {
        self.ensure_open()?;
        validate_vector(self.dim, vector)?;
        if self.lookup.contains(key) {
            return Ok(false);
        }
        let row = self.index.append(vector)?;
        let position = self.ledger.push(key.to_string());
        debug_assert_eq!(row, position);
        self.lookup.insert(key.to_string(), position);
        Ok(true)
    }

    /// Keys of the `k` stored vectors closest to `query`, nearest first.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<String>> {
        Ok(self
            .nearest_with_distances(query, k)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Like `nearest`, paired with squared L2 distances.
    pub fn nearest_with_distances(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        self.ensure_open()?;
        validate_vector(self.dim, query)?;
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|n| {
                self.ledger
                    .get(n.position)
                    .map(|key| (key.to_string(), n.distance))
            })
            .collect())
    }

    /// Stored vector for `key`, or a zero vector of the store's dimension when
    /// the key is absent. Use `contains` to tell the two apart.
    pub fn search_vector(&self, key: &str) -> Result<Vec<f32>> {
        self.ensure_open()?;
        Ok(self
            .lookup
            .get(key)
            .and_then(|position| self.index.reconstruct(position))
            .map(<[f32]>::to_vec)
            .unwrap_or_else(|| vec![0.0; self.dim]))
    }

    /// Removes the rows at `positions`, all at once: positions refer to the
    /// store as it is before the call, and duplicates are ignored. Every later
    /// row moves down. Returns `false` for an empty store or position set.
    pub fn remove<I>(&mut self, positions: I) -> Result<bool>
    where
        I: IntoIterator<Item = usize>,
    {
        self.ensure_open()?;
        if self.ledger.is_empty() {
            return Ok(false);
        }
        let positions: BTreeSet<usize> = positions.into_iter().collect();
        let Some(&last) = positions.last() else {
            return Ok(false);
        };
        let len = self.ledger.len();
        if last >= len {
            return Err(StoreError::PositionOutOfRange {
                position: last,
                len,
            });
        }

        let positions: Vec<usize> = positions.into_iter().collect();
        self.index.remove_rows(&positions)?;
        let removed = self.ledger.remove_positions(&positions);
        for key in &removed {
            self.lookup.remove(key);
        }
        self.lookup.reindex_from(&self.ledger, positions[0]);
        debug!(removed = removed.len(), remaining = self.ledger.len(), "removed rows");
        Ok(true)
    }

    pub fn remove_at(&mut self, position: usize) -> Result<bool> {
        self.remove([position])
    }

    pub fn remove_by_key(&mut self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        match self.lookup.get(key) {
            Some(position) => self.remove_at(position),
            None => Ok(false),
        }
    }

    /// Persists index, ledger and inverse lookup, overwriting prior artifacts.
    pub fn write(&mut self) -> Result<()> {
        self.ensure_open()?;
        let [index_bytes, payload_bytes, inv_bytes] = storage::store(
            &self.paths,
            &self.index,
            &self.ledger,
            &self.lookup,
            self.options.fsync_writes,
        )?;
        self.persisted_version = self.ledger.version();
        debug!(
            path = %self.paths.dir.display(),
            rows = self.ledger.len(),
            index_bytes,
            payload_bytes,
            inv_bytes,
            "wrote store"
        );
        Ok(())
    }

    /// Re-runs the load-time consistency check against in-memory state.
    pub fn check(&self) -> Result<()> {
        self.ensure_open()?;
        validate(self.dim, &self.index, &self.ledger, &self.lookup)
    }
}

fn validate(
    dim: usize,
    index: &FlatL2Index,
    ledger: &KeyLedger,
    lookup: &InverseLookup,
) -> Result<()> {
    if index.dim() != dim {
        return Err(StoreError::DimensionMismatch {
            expected: dim,
            got: index.dim(),
        });
    }
    if index.len() != ledger.len() {
        return Err(StoreError::Consistency {
            index_rows: index.len(),
            keys: ledger.len(),
            detail: "row count mismatch".to_string(),
        });
    }
    if let Some(position) = lookup.first_mismatch(ledger) {
        return Err(StoreError::Consistency {
            index_rows: index.len(),
            keys: ledger.len(),
            detail: format!("inverse lookup disagrees with ledger at position {position}"),
        });
    }
    Ok(())
}

impl fmt::Display for VectorDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .ledger
            .iter()
            .map(str::len)
            .max()
            .unwrap_or(0)
            .max("key".len());
        writeln!(f, "{:<8} | {:<width$} | vector", "position", "key")?;
        writeln!(f, "{:-<8}-+-{:-<width$}-+-{:-<6}", "", "", "")?;
        for (position, key) in self.ledger.iter().enumerate() {
            writeln!(f, "{position:<8} | {key:<width$} | <f32 x {}>", self.dim)?;
        }
        Ok(())
    }
}

impl fmt::Debug for VectorDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorDb")
            .field("path", &self.paths.dir)
            .field("dim", &self.dim)
            .field("state", &self.state)
            .field("len", &self.ledger.len())
            .finish()
    }
}

impl Drop for VectorDb {
    fn drop(&mut self) {
        if self.ensure_open().is_ok() && self.is_dirty() {
            warn!(
                path = %self.paths.dir.display(),
                rows = self.ledger.len(),
                "dropping store with unwritten mutations"
            );
        }
    }
}
