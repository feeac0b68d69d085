use crate::locks::LockRegistry;
use crate::transaction::StagedTransaction;
use crate::Result;
use std::ops::Bound;
use std::sync::Arc;

/// One stored record as raw bytes.
pub type RawEntry = (Vec<u8>, Vec<u8>);

/// Lazily produced records; dropping it aborts the scan.
pub type RawScan<'a> = Box<dyn Iterator<Item = Result<RawEntry>> + 'a>;

/// Byte-level primitives a storage engine must provide.
pub trait Backend: Send + Sync {
    /// Returns `None` when the key is absent.
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn raw_set(&self, key: &[u8], value: Vec<u8>) -> Result<()>;

    /// Removing an absent key succeeds.
    fn raw_delete(&self, key: &[u8]) -> Result<()>;

    /// All records, or only those whose key starts with `prefix`.
    fn raw_scan(&self, prefix: Option<&[u8]>) -> Result<RawScan<'_>>;

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Engines whose keys are kept in byte order.
pub trait OrderedBackend: Backend {
    fn raw_range(
        &self,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
        reverse: bool,
    ) -> Result<RawScan<'_>>;
}

/// A staged write: `Some` sets the value, `None` deletes the key.
pub type BatchOp = (Vec<u8>, Option<Vec<u8>>);

/// Engines that can apply several writes atomically.
pub trait TransactionalBackend: Backend + Clone {
    fn apply_batch(&self, batch: Vec<BatchOp>) -> Result<()>;

    /// Stages writes over this engine. Commit takes the per-key locks of
    /// `locks` for every key the transaction read or wrote.
    fn begin_transaction(
        &self,
        writable: bool,
        locks: Arc<LockRegistry>,
    ) -> StagedTransaction<Self> {
        StagedTransaction::new(self.clone(), writable, locks)
    }
}

/// Upper bound of the key range sharing `prefix`, `Unbounded` when every
/// byte is `0xff`.
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Bound<Vec<u8>> {
    match prefix.iter().rposition(|b| *b != 0xff) {
        Some(i) => Bound::Excluded(
            prefix[..i]
                .iter()
                .chain(std::iter::once(&(prefix[i] + 1)))
                .copied()
                .collect::<Vec<u8>>(),
        ),
        None => Bound::Unbounded,
    }
}

mod any;
mod memory;
mod sled;

pub use self::any::AnyBackend;
pub use self::memory::MemoryBackend;
pub use self::sled::SledBackend;
