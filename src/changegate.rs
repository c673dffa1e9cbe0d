//! Modification-time change gate for skipping redundant pipe work.
//!
//! An LRU cache keyed by file basename, storing the last-seen mtime stamp
//! with a TTL. `is_changed` reports whether a file moved since it was last
//! observed — and updates the stored stamp *unconditionally*, so the read
//! has a side effect by design: asking twice about an untouched file says
//! "changed" the first time and "unchanged" the second.
//!
//! The gate is an explicit object owned by the build invocation (no
//! process-wide global), with an injectable [`Clock`] so tests control TTL
//! expiry deterministically, and `invalidate`/`snapshot` for callers that
//! need to reset or inspect state. Nothing is persisted across runs; a
//! fresh gate considers every file changed.

use lru::LruCache;
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Default capacity: enough for a site's asset set without unbounded growth.
const DEFAULT_CAPACITY: usize = 100;

/// Default entry time-to-live.
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Monotonic time source for TTL bookkeeping.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry {
    mtime_stamp: String,
    seen: Instant,
}

/// LRU, mtime-keyed change detector.
pub struct ChangeGate {
    cache: LruCache<String, Entry>,
    ttl: Duration,
    clock: Box<dyn Clock>,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_CAPACITY, DEFAULT_TTL, Box::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, ttl: Duration, clock: Box<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            ttl,
            clock,
        }
    }

    /// Whether `path` changed since last observed.
    ///
    /// True when no live entry exists for the file's basename or the stored
    /// mtime stamp differs from the on-disk one. The stored stamp is
    /// refreshed on every call regardless of the answer.
    pub fn is_changed(&mut self, path: &Path) -> io::Result<bool> {
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let stamp = mtime_stamp(path)?;
        let now = self.clock.now();

        let changed = match self.cache.get(&key) {
            Some(entry) if now.duration_since(entry.seen) < self.ttl => {
                entry.mtime_stamp != stamp
            }
            // Missing or expired entry: treat as changed.
            _ => true,
        };

        self.cache.put(
            key,
            Entry {
                mtime_stamp: stamp,
                seen: now,
            },
        );
        Ok(changed)
    }

    /// Drop the entry for one basename, forcing the next check to report
    /// "changed".
    pub fn invalidate(&mut self, file_name: &str) {
        self.cache.pop(file_name);
    }

    /// Current `(basename, mtime stamp)` pairs, most recently used first.
    /// Read-only: does not touch recency order.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.cache
            .iter()
            .map(|(k, v)| (k.clone(), v.mtime_stamp.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for ChangeGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Millisecond-precision mtime stamp, stringified for stable comparison.
fn mtime_stamp(path: &Path) -> io::Result<String> {
    let modified = std::fs::metadata(path)?.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    Ok(millis.to_string())
}
