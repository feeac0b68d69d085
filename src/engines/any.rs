use super::{
    Backend, BatchOp, MemoryBackend, OrderedBackend, RawScan, SledBackend, TransactionalBackend,
};
use crate::config::{BackendKind, Config};
use crate::Result;
use std::ops::Bound;

/// Engine chosen from configuration.
#[derive(Clone)]
pub enum AnyBackend {
    Memory(MemoryBackend),
    Sled(SledBackend),
}

impl AnyBackend {
    pub fn open(config: &Config) -> Result<AnyBackend> {
        match config.backend {
            BackendKind::memory => Ok(AnyBackend::Memory(MemoryBackend::open(config))),
            BackendKind::sled => Ok(AnyBackend::Sled(SledBackend::open_with(config)?)),
        }
    }
}

impl Backend for AnyBackend {
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            AnyBackend::Memory(b) => b.raw_get(key),
            AnyBackend::Sled(b) => b.raw_get(key),
        }
    }

    fn raw_set(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        match self {
            AnyBackend::Memory(b) => b.raw_set(key, value),
            AnyBackend::Sled(b) => b.raw_set(key, value),
        }
    }

    fn raw_delete(&self, key: &[u8]) -> Result<()> {
        match self {
            AnyBackend::Memory(b) => b.raw_delete(key),
            AnyBackend::Sled(b) => b.raw_delete(key),
        }
    }

    fn raw_scan(&self, prefix: Option<&[u8]>) -> Result<RawScan<'_>> {
        match self {
            AnyBackend::Memory(b) => b.raw_scan(prefix),
            AnyBackend::Sled(b) => b.raw_scan(prefix),
        }
    }

    fn close(&self) -> Result<()> {
        match self {
            AnyBackend::Memory(b) => b.close(),
            AnyBackend::Sled(b) => b.close(),
        }
    }
}

impl OrderedBackend for AnyBackend {
    fn raw_range(
        &self,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
        reverse: bool,
    ) -> Result<RawScan<'_>> {
        match self {
            AnyBackend::Memory(b) => b.raw_range(lower, upper, reverse),
            AnyBackend::Sled(b) => b.raw_range(lower, upper, reverse),
        }
    }
}

impl TransactionalBackend for AnyBackend {
    fn apply_batch(&self, batch: Vec<BatchOp>) -> Result<()> {
        match self {
            AnyBackend::Memory(b) => b.apply_batch(batch),
            AnyBackend::Sled(b) => b.apply_batch(batch),
        }
    }
}
