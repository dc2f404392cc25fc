//! Append-only, index-addressed storage of data files on the local disk.
//!
//! A [`LocalFileTree`] stores entries under `<root>/data` in a directory
//! hierarchy derived from the entry index: the index is cut into
//! `leaf_depth`-bit groups, the lowest group selects the position within a
//! leaf directory and the remaining groups (most significant first) name the
//! directories leading to it. With the default layout, entry 200 lives at
//! `data/1/200.json`.
//!
//! When an insert needs more index bits than the current depth provides, the
//! tree grows by moving the existing `data` directory down into a new `0`
//! branch, so existing paths stay valid under the deeper layout.
//!
//! Every operation runs under an interprocess reader/writer lock on
//! `<root>/.LOCK`, so several processes may share one tree.

mod config;
mod entry;
mod format;
mod lock;

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use lock::TreeLock;

pub use config::FileTreeConfig;
pub use entry::{TreeDataEntry, METADATA_EXTENSION};
pub use format::DataFormat;

/// Name of the layout file in the tree root.
pub const CONFIG_FILE: &str = ".filetree.json";
/// Name of the lock file in the tree root.
pub const LOCK_FILE: &str = ".LOCK";
/// Name of the directory holding entries.
pub const DATA_DIR: &str = "data";
/// Staging name for the data directory while the tree grows.
pub const GROWING_DATA_DIR: &str = ".GROWING.data";

/// How to open a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Refuse every write and only take shared locks.
    pub readonly: bool,
    /// Layout used when the root holds no tree yet. Ignored otherwise.
    pub layout: FileTreeConfig,
}

impl TreeOptions {
    /// Options for a readonly handle.
    #[must_use]
    pub fn readonly() -> Self {
        Self {
            readonly: true,
            layout: FileTreeConfig::default(),
        }
    }

    /// Options for a writable handle creating new trees with `layout`.
    #[must_use]
    pub fn with_layout(layout: FileTreeConfig) -> Self {
        Self {
            readonly: false,
            layout,
        }
    }
}

/// Files modified this close to the time they were read may be rewritten
/// without their mtime changing, so their cached copy is never trusted.
const MTIME_GRANULARITY_SECS: i64 = 2;

/// Cached view of the config file.
#[derive(Debug)]
struct TreeState {
    config: FileTreeConfig,
    /// mtime of the config file when `config` was loaded or written.
    config_mtime: DateTime<Utc>,
    last_config_read: DateTime<Utc>,
}

impl TreeState {
    fn is_current(&self, mtime: DateTime<Utc>) -> bool {
        mtime == self.config_mtime
            && mtime
                .checked_add_signed(TimeDelta::seconds(MTIME_GRANULARITY_SECS))
                .is_some_and(|settled| settled < self.last_config_read)
    }
}

/// Locked, append-only collection of entries rooted at a directory.
#[derive(Debug)]
pub struct LocalFileTree {
    root: PathBuf,
    readonly: bool,
    lock: TreeLock,
    state: Mutex<TreeState>,
}

/// Split `value` into directory components for a tree of the given shape.
///
/// Returns `tree_depth - 1` components, most significant first.
///
/// # Panics
///
/// Panics if `leaf_depth` is 64 or more. Layouts that pass
/// [`FileTreeConfig::validate`] never do.
#[must_use]
pub fn decompose_index(value: u64, tree_depth: u32, leaf_depth: u32) -> Vec<u64> {
    let bitmask = (1u64 << leaf_depth) - 1;
    let mut rest = value;
    let mut groups = Vec::with_capacity(tree_depth as usize);
    for _ in 0..tree_depth {
        groups.push(rest & bitmask);
        rest = rest.checked_shr(leaf_depth).unwrap_or(0);
    }
    // The lowest group is the position inside the leaf, not a directory.
    groups.into_iter().skip(1).rev().collect()
}

/// Depth needed to hold `file_count` entries with `leaf_depth`-bit levels.
///
/// # Panics
///
/// Panics if `leaf_depth` is zero.
#[must_use]
pub fn required_depth(file_count: u64, leaf_depth: u32) -> u32 {
    let max_bits = match file_count {
        0 | 1 => 0,
        n => u64::BITS - (n - 1).leading_zeros(),
    };
    max_bits.div_ceil(leaf_depth) + 1
}

/// Resolve Python-style slice bounds against `len`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `step` is zero.
pub fn slice_indices(
    len: u64,
    start: Option<i64>,
    stop: Option<i64>,
    step: i64,
) -> Result<Vec<u64>> {
    if step == 0 {
        return Err(Error::invalid_parameter("slice step cannot be zero"));
    }
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
    let clamp = |bound: Option<i64>, default: i64| match bound {
        None => default,
        Some(b) if b < 0 => (b + len).max(lower),
        Some(b) => b.min(upper),
    };
    let start = clamp(start, if step < 0 { upper } else { lower });
    let stop = clamp(stop, if step < 0 { lower } else { upper });

    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        // Bounds above keep i within 0..len.
        indices.push(u64::try_from(i).map_err(|_| Error::internal("negative slice index"))?);
        i += step;
    }
    Ok(indices)
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::file_access(path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source,
    })
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| Error::file_access(from, e))
}

impl LocalFileTree {
    /// Open the tree at `root`, creating it if the directory is missing or empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRootDir`] if `root` cannot host a tree,
    /// [`Error::InvalidTreeOperation`] if a readonly handle would have to
    /// create the tree, or an I/O error.
    pub fn open(root: impl AsRef<Path>, options: TreeOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        Self::validate_root(&root, options.readonly)?;
        options.layout.validate()?;

        // Checked before locking so a refused open leaves no lock file behind.
        if options.readonly && !root.join(CONFIG_FILE).is_file() {
            return Err(Error::invalid_operation(format!(
                "cannot create a file tree at {}: tree is readonly",
                root.display()
            )));
        }

        if !options.readonly {
            create_dir_all(&root.join(DATA_DIR))?;
        }

        let tree = Self {
            lock: TreeLock::new(root.join(LOCK_FILE)),
            readonly: options.readonly,
            state: Mutex::new(TreeState {
                config: options.layout.clone(),
                config_mtime: DateTime::<Utc>::MIN_UTC,
                last_config_read: DateTime::<Utc>::MIN_UTC,
            }),
            root,
        };

        {
            let _guard = tree.lock.acquire(tree.readonly)?;
            let mut state = tree.state()?;
            tree.load_config(&mut state, false, Some(&options.layout))?;
        }

        debug!("Opened file tree at {}", tree.root.display());
        Ok(tree)
    }

    fn validate_root(root: &Path, readonly: bool) -> Result<()> {
        if !root.exists() {
            if readonly {
                return Err(Error::invalid_root(
                    root,
                    "directory does not exist and the tree is readonly",
                ));
            }
            return Ok(());
        }
        if !root.is_dir() {
            return Err(Error::invalid_root(root, "exists but is not a directory"));
        }
        // A lock file alone is left by a process that never wrote a config.
        let non_empty = fs::read_dir(root)
            .map_err(|e| Error::file_access(root, e))?
            .filter_map(std::result::Result::ok)
            .any(|e| e.file_name() != LOCK_FILE);
        if non_empty && !root.join(CONFIG_FILE).is_file() {
            return Err(Error::invalid_root(
                root,
                format!("directory is not empty but {CONFIG_FILE} is missing"),
            ));
        }
        Ok(())
    }

    /// Root directory of the tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this handle refuses writes.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    fn state(&self) -> Result<MutexGuard<'_, TreeState>> {
        self.state
            .lock()
            .map_err(|_| Error::internal("file tree state lock poisoned"))
    }

    /// Layout as last read from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned.
    pub fn config(&self) -> Result<FileTreeConfig> {
        Ok(self.state()?.config.clone())
    }

    /// Number of entries as last read from disk.
    ///
    /// Call [`refresh`](Self::refresh) first to observe inserts made by other handles.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self.state() {
            Ok(state) => state.config.file_count,
            Err(e) => {
                warn!("Reporting an empty tree: {}", e);
                0
            }
        }
    }

    /// Whether the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reload the config if another handle changed it.
    ///
    /// # Errors
    ///
    /// Returns an error if locking or reading the config fails.
    pub fn refresh(&self) -> Result<FileTreeConfig> {
        let _guard = self.lock.read()?;
        let mut state = self.state()?;
        self.load_config(&mut state, true, None)?;
        Ok(state.config.clone())
    }

    /// Caller must hold the tree lock.
    fn load_config(
        &self,
        state: &mut TreeState,
        only_if_modified: bool,
        layout: Option<&FileTreeConfig>,
    ) -> Result<()> {
        let path = self.config_path();

        if !path.exists() {
            let Some(layout) = layout else {
                return Err(Error::invalid_root(
                    &self.root,
                    format!("{CONFIG_FILE} disappeared"),
                ));
            };
            info!("New file tree - initializing config file");
            state.config = layout.with_file_count(0);
            return self.write_config(state);
        }

        if only_if_modified {
            let last_modified = modified_time(&path)?;
            if state.is_current(last_modified) {
                debug!("Config file not modified since the last read");
                return Ok(());
            }
            debug!(
                "Config file possibly modified ({} vs {}). Updating",
                state.config_mtime, last_modified
            );
        }

        debug!("Reading config file from {}", path.display());
        let read_at = Utc::now();
        let mtime = modified_time(&path)?;
        let raw = fs::read(&path).map_err(|e| Error::file_access(&path, e))?;
        let config: FileTreeConfig = serde_json::from_slice(&raw)?;
        config.validate()?;
        state.config = config;
        state.config_mtime = mtime;
        state.last_config_read = read_at;
        Ok(())
    }

    /// Caller must hold the exclusive tree lock.
    fn write_config(&self, state: &mut TreeState) -> Result<()> {
        if self.readonly {
            return Err(Error::invalid_operation(
                "cannot modify the config file: tree is readonly",
            ));
        }
        let path = self.config_path();
        info!("Writing config file to {}", path.display());
        let raw = serde_json::to_vec_pretty(&state.config)?;
        fs::write(&path, raw).map_err(|e| Error::file_access(&path, e))?;
        state.config_mtime = modified_time(&path)?;
        state.last_config_read = Utc::now();
        Ok(())
    }

    /// Paths of the data file and, if the layout has one, the metadata file.
    fn entry_paths(&self, config: &FileTreeConfig, idx: u64) -> (PathBuf, Option<PathBuf>) {
        let mut dir = self.data_dir();
        for group in decompose_index(idx, config.tree_depth, config.leaf_depth) {
            dir.push(group.to_string());
        }
        let data = dir.join(format!("{idx}.{}", config.file_format.extension()));
        let metadata = config
            .has_metadata
            .then(|| dir.join(format!("{idx}.{METADATA_EXTENSION}")));
        (data, metadata)
    }

    /// Load the entry at `idx`. Negative indices count from the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] for indices outside the tree, or an
    /// error if the entry files cannot be read.
    pub fn get(&self, idx: i64) -> Result<TreeDataEntry> {
        let _guard = self.lock.read()?;
        let mut state = self.state()?;
        self.load_config(&mut state, true, None)?;

        let len = state.config.file_count;
        let resolved = if idx < 0 {
            i64::try_from(len).unwrap_or(i64::MAX) + idx
        } else {
            idx
        };
        let resolved = u64::try_from(resolved)
            .ok()
            .filter(|i| *i < len)
            .ok_or(Error::IndexOutOfBounds { index: idx, len })?;

        let (data, metadata) = self.entry_paths(&state.config, resolved);
        TreeDataEntry::load(&data, metadata.as_deref())
    }

    /// Grow the tree so it can address `new_file_count` entries.
    ///
    /// Caller must hold the exclusive tree lock.
    fn grow_tree(&self, state: &mut TreeState, new_file_count: u64) -> Result<()> {
        let current = state.config.tree_depth;
        let required = required_depth(new_file_count, state.config.leaf_depth);
        debug!("Current depth: {}, required depth: {}", current, required);
        if required <= current {
            return Ok(());
        }

        let grown = state.config.with_tree_depth(required);
        grown.validate().map_err(|_| {
            Error::invalid_operation(format!(
                "{new_file_count} entries exceed the addressable size of this tree"
            ))
        })?;

        info!(
            "Growing tree from depth {} to depth {} to accommodate {} entries",
            current, required, new_file_count
        );

        if state.config.file_count > 0 {
            // data -> .GROWING.data -> data/0/.../0
            let staging = self.root.join(GROWING_DATA_DIR);
            rename(&self.data_dir(), &staging)?;

            let mut new_parent = self.data_dir();
            for _ in 1..(required - current) {
                new_parent.push("0");
            }
            create_dir_all(&new_parent)?;
            rename(&staging, &new_parent.join("0"))?;
        }

        state.config = grown;
        self.write_config(state)
    }

    /// Append `entries` and return their indices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTreeOperation`] on a readonly handle, or an
    /// error if locking, growing, or writing fails. Entries written before a
    /// failure are not counted and will be overwritten by the next insert.
    pub fn insert(&self, entries: &[TreeDataEntry]) -> Result<Range<u64>> {
        if self.readonly {
            return Err(Error::invalid_operation("insert failed: tree is readonly"));
        }
        if entries.is_empty() {
            let len = self.len();
            return Ok(len..len);
        }

        let _guard = self.lock.write()?;
        let mut state = self.state()?;
        self.load_config(&mut state, true, None)?;

        let prev_file_count = state.config.file_count;
        let new_file_count = prev_file_count + entries.len() as u64;
        self.grow_tree(&mut state, new_file_count)?;

        let leaf_capacity = state.config.leaf_capacity();
        for (idx, entry) in (prev_file_count..).zip(entries) {
            let (data, metadata) = self.entry_paths(&state.config, idx);
            if let Some(leaf) = data.parent() {
                if idx % leaf_capacity == 0 || !leaf.exists() {
                    info!("Creating new leaf at {}", leaf.display());
                    create_dir_all(leaf)?;
                }
            }

            entry.write_data(&data, state.config.file_format)?;
            if let Some(metadata) = metadata {
                entry.write_metadata(&metadata)?;
            }
            debug!("Wrote entry {}", idx);
        }

        state.config = state.config.with_file_count(new_file_count);
        self.write_config(&mut state)?;
        info!(
            "Inserted {} entries ({}..{})",
            entries.len(),
            prev_file_count,
            new_file_count
        );

        Ok(prev_file_count..new_file_count)
    }

    /// Append a single entry and return its index.
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn push(&self, entry: TreeDataEntry) -> Result<u64> {
        Ok(self.insert(std::slice::from_ref(&entry))?.start)
    }

    /// Iterate over all entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = Result<TreeDataEntry>> + '_ {
        (0..self.len()).map(move |i| self.get(i64::try_from(i).unwrap_or(i64::MAX)))
    }

    /// Iterate over a slice of the tree with Python slice semantics.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is zero.
    pub fn range(
        &self,
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    ) -> Result<impl Iterator<Item = Result<TreeDataEntry>> + '_> {
        let indices = slice_indices(self.len(), start, stop, step)?;
        Ok(indices
            .into_iter()
            .map(move |i| self.get(i64::try_from(i).unwrap_or(i64::MAX))))
    }
}
