//! Typed key-value access over swappable storage engines.
//!
//! A [`KvStore`] pairs a backend driver with a value [`Codec`] and exposes the
//! [`Store`] contract. [`Prefix`] namespaces a store, [`KvStore::transaction`]
//! opens a staged write scope, and [`LockRegistry`] serializes writers of a
//! key for engines without native read-modify-write.

pub use codec::{AnyCodec, Bincode, Codec, CodecKind, Json, Raw};
pub use config::{BackendKind, Config};
pub use context::{CancelHandle, Context};
pub use engines::{
    AnyBackend, Backend, MemoryBackend, OrderedBackend, SledBackend, TransactionalBackend,
};
pub use error::{BackendError, CodecError, Error, Result};
pub use key::{Bytes, Key};
pub use locks::{KeyGuard, LockRegistry};
pub use prefix::Prefix;
pub use store::{EditFn, IterFn, KvStore, Order, Store};
pub use transaction::{StagedTransaction, Transaction};

pub mod codec;
pub mod config;
mod context;
pub mod engines;
mod error;
pub mod key;
mod locks;
mod prefix;
mod store;
mod transaction;

/// Opens a store over the backend and codec named by `config`.
pub fn open<K, V>(config: &Config) -> Result<KvStore<K, V, AnyBackend, AnyCodec>>
where
    K: Key,
    AnyCodec: Codec<V>,
{
    let backend = AnyBackend::open(config)?;
    Ok(KvStore::open(backend, AnyCodec(config.codec), config))
}
