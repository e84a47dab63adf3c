// Sandboxed views of bound directories, cached by canonical root.
//
// A `Scope` resolves every relative path lexically under its root, then
// checks that the resolved target (after following symlinks) is still
// inside the root. Anything that escapes is reported as not found.

use std::collections::HashMap;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use atelier_common::path::normalize::normalize_decoded_path;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom, Take};
use tracing::debug;

pub const DEFAULT_SCOPE_CACHE_CAPACITY: usize = 64;

/// Reader returned by [`Scope::open`], limited to the requested range.
pub type ScopedReader = Take<File>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    pub is_directory: bool,
    pub size: u64,
}

#[derive(Debug)]
pub struct Scope {
    root: PathBuf,
}

impl Scope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn stat(&self, rel: &str) -> io::Result<EntryStat> {
        let path = self.resolve(rel).await?;
        let metadata = fs::metadata(&path).await?;
        Ok(EntryStat { is_directory: metadata.is_dir(), size: metadata.len() })
    }

    /// Names of the entries directly under `rel`, in directory order.
    pub async fn read_dir(&self, rel: &str) -> io::Result<Vec<String>> {
        let path = self.resolve(rel).await?;
        let mut entries = fs::read_dir(&path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Open a file for reading. With a range, the reader starts at
    /// `range.start()` and yields at most `end - start + 1` bytes.
    pub async fn open(
        &self,
        rel: &str,
        range: Option<RangeInclusive<u64>>,
    ) -> io::Result<ScopedReader> {
        let path = self.resolve(rel).await?;
        let mut file = File::open(&path).await?;
        match range {
            Some(range) => {
                file.seek(SeekFrom::Start(*range.start())).await?;
                let len = range.end().saturating_sub(*range.start()).saturating_add(1);
                Ok(file.take(len))
            }
            None => Ok(file.take(u64::MAX)),
        }
    }

    async fn resolve(&self, rel: &str) -> io::Result<PathBuf> {
        let normalized = normalize_decoded_path(rel).map_err(|error| not_found(error.to_string()))?;
        let joined = if normalized.is_empty() { self.root.clone() } else { self.root.join(&normalized) };

        let canonical = fs::canonicalize(&joined).await?;
        if !canonical.starts_with(&self.root) {
            debug!(root = %self.root.display(), rel, "rejected path resolving outside scope");
            return Err(not_found("path resolves outside the scope root"));
        }
        Ok(canonical)
    }
}

fn not_found(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, message.into())
}

/// Bounded cache of [`Scope`] handles keyed by canonical root.
#[derive(Debug)]
pub struct ScopeCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug)]
struct CachedScope {
    scope: Arc<Scope>,
    lru_tick: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    scopes: HashMap<PathBuf, CachedScope>,
    next_lru_tick: u64,
}

impl CacheInner {
    fn bump_lru_tick(&mut self) -> u64 {
        let tick = self.next_lru_tick;
        self.next_lru_tick = self.next_lru_tick.saturating_add(1);
        tick
    }

    fn evict_least_recent(&mut self) {
        let evict = self
            .scopes
            .iter()
            .min_by_key(|(_, entry)| entry.lru_tick)
            .map(|(root, _)| root.clone());
        if let Some(root) = evict {
            self.scopes.remove(&root);
            debug!(root = %root.display(), "evicted scope");
        }
    }
}

impl ScopeCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), inner: Mutex::new(CacheInner::default()) }
    }

    /// Return the scope for `root`, creating it if needed. The root is
    /// canonicalized when it exists and normalized lexically otherwise.
    pub async fn resolve(&self, root: impl AsRef<Path>) -> Arc<Scope> {
        let root = root.as_ref();
        let key = match fs::canonicalize(root).await {
            Ok(canonical) => canonical,
            Err(_) => lexical_normalize(root),
        };

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let lru_tick = inner.bump_lru_tick();
        if let Some(entry) = inner.scopes.get_mut(&key) {
            entry.lru_tick = lru_tick;
            return Arc::clone(&entry.scope);
        }

        while inner.scopes.len() >= self.capacity {
            inner.evict_least_recent();
        }

        let scope = Arc::new(Scope::new(key.clone()));
        inner.scopes.insert(key, CachedScope { scope: Arc::clone(&scope), lru_tick });
        scope
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).scopes.len()
    }
}

impl Default for ScopeCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE_CACHE_CAPACITY)
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
