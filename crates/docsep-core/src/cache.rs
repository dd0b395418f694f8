//! Bounded LRU cache of per-scan assets.
//!
//! Maps a scan coordinate to its decoded image, parsed transcription
//! and page shape. Entries are created lazily on first access and
//! evicted least-recently-used once the cache is full. The cache
//! exclusively owns decoded payloads; the hierarchy owns only path
//! references.
//!
//! Concurrency: lookups and inserts are safe from any number of
//! threads. A miss installs an in-flight marker so the underlying
//! decode/parse runs exactly once per coordinate; concurrent requesters
//! block on a condvar until the result lands. In-flight entries are
//! never eviction candidates, and returned payloads are `Arc`s, so a
//! later eviction never invalidates a caller.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{DocsepError, Result};
use crate::hierarchy::{Coordinate, Hierarchy};
use crate::provider::{ImagePayload, ImageProvider, LineRecord, TextProvider};

/// Default maximum number of resident entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Resolved per-scan asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Decoded image, or its explicit absence.
    pub image: ImagePayload,
    /// Parsed transcription lines in document order.
    pub lines: Vec<LineRecord>,
    /// Page size as (height, width).
    pub shape: (u32, u32),
}

enum Entry {
    /// A resolver is currently decoding this coordinate.
    InFlight,
    Ready(Arc<Asset>),
}

struct CacheInner {
    entries: HashMap<Coordinate, Entry>,
    /// Ready coordinates, least-recently-used first. In-flight entries
    /// are deliberately absent so eviction can never pick one.
    order: Vec<Coordinate>,
    hits: u64,
    misses: u64,
}

/// Bounded, concurrency-safe memo of [`Coordinate`] → [`Asset`].
pub struct AssetCache {
    hierarchy: Arc<Hierarchy>,
    image_provider: Box<dyn ImageProvider>,
    text_provider: Box<dyn TextProvider>,
    capacity: usize,
    inner: Mutex<CacheInner>,
    ready: Condvar,
}

impl AssetCache {
    /// Create a cache over a hierarchy with the given providers.
    /// Fails with [`DocsepError::Configuration`] on a zero capacity.
    pub fn new(
        hierarchy: Arc<Hierarchy>,
        image_provider: Box<dyn ImageProvider>,
        text_provider: Box<dyn TextProvider>,
        capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(DocsepError::Configuration(
                "cache capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            hierarchy,
            image_provider,
            text_provider,
            capacity,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: Vec::new(),
                hits: 0,
                misses: 0,
            }),
            ready: Condvar::new(),
        })
    }

    /// Resolve the asset for a coordinate, decoding on first access.
    ///
    /// Image failures degrade to [`ImagePayload::Absent`] inside the
    /// asset; a transcription [`DocsepError::Parse`] is returned to the
    /// caller and nothing is cached for the coordinate, so a retry hits
    /// the provider again.
    pub fn resolve(&self, coord: Coordinate) -> Result<Arc<Asset>> {
        let path = self
            .hierarchy
            .scan_path(coord)
            .ok_or_else(|| {
                DocsepError::Configuration(format!("coordinate {coord:?} is out of bounds"))
            })?
            .to_path_buf();

        {
            let mut inner = self.inner.lock().expect("asset cache lock poisoned");
            loop {
                match inner.entries.get(&coord) {
                    Some(Entry::Ready(asset)) => {
                        let asset = Arc::clone(asset);
                        inner.hits += 1;
                        touch(&mut inner.order, coord);
                        return Ok(asset);
                    }
                    Some(Entry::InFlight) => {
                        inner = self
                            .ready
                            .wait(inner)
                            .expect("asset cache lock poisoned");
                    }
                    None => {
                        inner.misses += 1;
                        inner.entries.insert(coord, Entry::InFlight);
                        break;
                    }
                }
            }
        }

        // Decode and parse outside the lock; other coordinates resolve
        // concurrently and waiters for this one sleep on the condvar.
        let result = self.load_asset(&path);

        let mut inner = self.inner.lock().expect("asset cache lock poisoned");
        match result {
            Ok(asset) => {
                let asset = Arc::new(asset);
                inner.entries.insert(coord, Entry::Ready(Arc::clone(&asset)));
                inner.order.push(coord);
                while inner.order.len() > self.capacity {
                    let oldest = inner.order.remove(0);
                    inner.entries.remove(&oldest);
                }
                self.ready.notify_all();
                Ok(asset)
            }
            Err(err) => {
                // A failed parse is never cached as a success; the next
                // resolver becomes the new loader.
                inner.entries.remove(&coord);
                self.ready.notify_all();
                Err(err)
            }
        }
    }

    fn load_asset(&self, path: &std::path::Path) -> Result<Asset> {
        let image = self.image_provider.load(path);
        if !image.is_present() {
            tracing::warn!(path = %path.display(), "scan image absent, using placeholder");
        }
        let transcription = self.text_provider.parse(path)?;
        Ok(Asset {
            image,
            lines: transcription.lines,
            shape: transcription.size,
        })
    }

    /// Number of resident (ready) entries.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("asset cache lock poisoned")
            .order
            .len()
    }

    /// Whether no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of resident entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cache hit count.
    pub fn hits(&self) -> u64 {
        self.inner.lock().expect("asset cache lock poisoned").hits
    }

    /// Cache miss count.
    pub fn misses(&self) -> u64 {
        self.inner.lock().expect("asset cache lock poisoned").misses
    }
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// Move a coordinate to the most-recently-used end.
fn touch(order: &mut Vec<Coordinate>, coord: Coordinate) {
    if let Some(pos) = order.iter().position(|&c| c == coord) {
        order.remove(pos);
        order.push(coord);
    }
}
