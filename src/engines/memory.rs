use super::{
    prefix_upper_bound, Backend, BatchOp, OrderedBackend, RawEntry, RawScan, TransactionalBackend,
};
use crate::config::Config;
use crate::Result;
use crossbeam_skiplist::map::Entry;
use crossbeam_skiplist::SkipMap;
use log::debug;
use std::ops::Bound;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// In-process engine keeping records ordered in a skip list.
///
/// Reads never block; every mutation goes through `write` so that a batch
/// lands as a whole. Clones share the same records.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

struct Inner {
    records: SkipMap<Vec<u8>, Record>,
    write: Mutex<()>,
    default_ttl: Option<Duration>,
}

#[derive(Clone, Debug)]
struct Record {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Record {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::with_ttl(None)
    }

    pub fn open(config: &Config) -> MemoryBackend {
        MemoryBackend::with_ttl(config.default_ttl)
    }

    /// Records written through this backend expire `ttl` after their last write.
    pub fn with_ttl(default_ttl: Option<Duration>) -> MemoryBackend {
        MemoryBackend {
            inner: Arc::new(Inner {
                records: SkipMap::new(),
                write: Mutex::new(()),
                default_ttl,
            }),
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .records
            .iter()
            .filter(|e| e.value().live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, value: Vec<u8>) -> Record {
        Record {
            value,
            // a ttl past the end of the clock never expires
            expires_at: self
                .inner
                .default_ttl
                .and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn purge_expired(&self, key: &[u8]) {
        let _w = self.inner.write.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = self.inner.records.get(key) {
            if !entry.value().live(Instant::now()) {
                entry.remove();
            }
        }
    }

    fn scan_range(
        &self,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
        reverse: bool,
    ) -> RawScan<'_> {
        let now = Instant::now();
        let range = self.inner.records.range((lower, upper));
        if reverse {
            Box::new(range.rev().filter_map(move |e| live_entry(now, e)))
        } else {
            Box::new(range.filter_map(move |e| live_entry(now, e)))
        }
    }
}

fn live_entry(now: Instant, entry: Entry<'_, Vec<u8>, Record>) -> Option<Result<RawEntry>> {
    let record = entry.value();
    if record.live(now) {
        Some(Ok((entry.key().clone(), record.value.clone())))
    } else {
        None
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new()
    }
}

impl Backend for MemoryBackend {
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let record = match self.inner.records.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        if record.live(Instant::now()) {
            Ok(Some(record.value))
        } else {
            self.purge_expired(key);
            Ok(None)
        }
    }

    fn raw_set(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        let record = self.record(value);
        let _w = self.inner.write.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.records.insert(key.to_vec(), record);
        Ok(())
    }

    fn raw_delete(&self, key: &[u8]) -> Result<()> {
        let _w = self.inner.write.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.records.remove(key);
        Ok(())
    }

    fn raw_scan(&self, prefix: Option<&[u8]>) -> Result<RawScan<'_>> {
        let (lower, upper) = match prefix {
            Some(p) => (Bound::Included(p.to_vec()), prefix_upper_bound(p)),
            None => (Bound::Unbounded, Bound::Unbounded),
        };
        Ok(self.scan_range(lower, upper, false))
    }

    fn close(&self) -> Result<()> {
        debug!("closing memory backend with {} records", self.inner.records.len());
        Ok(())
    }
}

impl OrderedBackend for MemoryBackend {
    fn raw_range(
        &self,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
        reverse: bool,
    ) -> Result<RawScan<'_>> {
        Ok(self.scan_range(lower, upper, reverse))
    }
}

impl TransactionalBackend for MemoryBackend {
    fn apply_batch(&self, batch: Vec<BatchOp>) -> Result<()> {
        let _w = self.inner.write.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in batch {
            match value {
                Some(value) => {
                    let record = self.record(value);
                    self.inner.records.insert(key, record);
                }
                None => {
                    self.inner.records.remove(&key);
                }
            }
        }
        Ok(())
    }
}
