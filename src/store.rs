use crate::codec::{Codec, Json};
use crate::config::Config;
use crate::context::Context;
use crate::engines::{Backend, OrderedBackend, RawScan, TransactionalBackend};
use crate::key::Key;
use crate::locks::LockRegistry;
use crate::transaction::Transaction;
use crate::{Error, Result};
use log::debug;
use std::marker::PhantomData;
use std::ops::Bound;
use std::sync::Arc;

/// Callback for `Store::edit`: receives the current value, returns the new one.
pub type EditFn<'a, V> = dyn FnMut(V) -> Result<V> + 'a;

/// Callback for range scans. Returning an error stops the scan and the error
/// is handed back to the caller; `Error::Stopped` is the usual way to end
/// early on purpose.
pub type IterFn<'a, K, V> = dyn FnMut(K, V) -> Result<()> + 'a;

/// Typed access to a key-value store, independent of the engine behind it.
pub trait Store<K, V> {
    /// Inserts or overwrites.
    fn set(&self, ctx: &Context, key: &K, value: &V) -> Result<()>;

    /// Fails with `Error::KeyNotFound` when the key is absent.
    fn get(&self, ctx: &Context, key: &K) -> Result<V>;

    /// Deleting an absent key succeeds.
    fn delete(&self, ctx: &Context, key: &K) -> Result<()>;

    /// Read-modify-write of one key, atomic against other writers of the
    /// same key. An absent key fails with `Error::KeyNotFound` without
    /// calling `edit`. `edit` must not write the same key through this store.
    fn edit(&self, ctx: &Context, key: &K, edit: &mut EditFn<'_, V>) -> Result<()>;

    /// Visits every record, in backend order.
    fn range(&self, ctx: &Context, iter: &mut IterFn<'_, K, V>) -> Result<()>;

    /// Visits records whose encoded key starts with the encoded `prefix`.
    fn range_with_prefix(&self, ctx: &Context, prefix: &K, iter: &mut IterFn<'_, K, V>)
        -> Result<()>;

    /// Releases a base store's resources, or commits a transaction scope.
    fn close(&self, ctx: &Context) -> Result<()>;
}

/// Bounds for an ordered scan. Both bounds are inclusive.
#[derive(Clone, Debug)]
pub struct Order<K> {
    pub min: Option<K>,
    pub max: Option<K>,
    pub reverse: bool,
}

impl<K> Default for Order<K> {
    fn default() -> Self {
        Order {
            min: None,
            max: None,
            reverse: false,
        }
    }
}

/// A `Store` over a backend driver and a value codec.
///
/// Writers of the same key are serialized through a lock registry, which
/// can be shared between stores over the same backend.
pub struct KvStore<K, V, B, C = Json> {
    backend: B,
    codec: C,
    locks: Arc<LockRegistry>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, B, C> KvStore<K, V, B, C>
where
    K: Key,
    B: Backend,
    C: Codec<V>,
{
    pub fn new(backend: B, codec: C) -> KvStore<K, V, B, C> {
        KvStore::with_locks(backend, codec, Arc::new(LockRegistry::new()))
    }

    pub fn open(backend: B, codec: C, config: &Config) -> KvStore<K, V, B, C> {
        KvStore::with_locks(backend, codec, Arc::new(LockRegistry::open(config)))
    }

    pub fn with_locks(backend: B, codec: C, locks: Arc<LockRegistry>) -> KvStore<K, V, B, C> {
        KvStore {
            backend,
            codec,
            locks,
            _marker: PhantomData,
        }
    }

    fn visit(&self, ctx: &Context, scan: RawScan<'_>, iter: &mut IterFn<'_, K, V>) -> Result<()> {
        for item in scan {
            ctx.err()?;
            let (raw_key, data) = item?;
            let key = K::from_key_bytes(&raw_key)?;
            let value = self.codec.unmarshal(&data)?;
            iter(key, value)?;
        }
        Ok(())
    }
}

impl<K, V, B, C> KvStore<K, V, B, C> {
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }
}

impl<K, V, B, C> KvStore<K, V, B, C>
where
    K: Key,
    B: OrderedBackend,
    C: Codec<V>,
{
    /// Visits records with keys between `order.min` and `order.max`, in
    /// ascending byte order or descending when `order.reverse` is set.
    pub fn range_ordered(
        &self,
        ctx: &Context,
        order: &Order<K>,
        iter: &mut IterFn<'_, K, V>,
    ) -> Result<()> {
        ctx.err()?;
        let lower = match &order.min {
            Some(k) => Bound::Included(k.to_key_bytes()?),
            None => Bound::Unbounded,
        };
        let upper = match &order.max {
            Some(k) => Bound::Included(k.to_key_bytes()?),
            None => Bound::Unbounded,
        };
        if let (Bound::Included(lo), Bound::Included(hi)) = (&lower, &upper) {
            if lo > hi {
                return Ok(());
            }
        }
        let scan = self.backend.raw_range(lower, upper, order.reverse)?;
        self.visit(ctx, scan, iter)
    }
}

impl<K, V, B, C> KvStore<K, V, B, C>
where
    K: Key,
    B: TransactionalBackend,
    C: Codec<V> + Clone,
{
    /// Opens a transaction scope. Nothing written through it is visible
    /// here until it is committed; dropping it uncommitted discards it.
    ///
    /// The scope shares this store's lock registry. Committing fails with
    /// `Error::Conflict` if a key the scope read has changed underneath it.
    pub fn transaction(&self, writable: bool) -> Result<Transaction<K, V, B, C>> {
        let txn = self
            .backend
            .begin_transaction(writable, Arc::clone(&self.locks));
        Ok(Transaction::new(KvStore::with_locks(
            txn,
            self.codec.clone(),
            Arc::clone(&self.locks),
        )))
    }
}

impl<K, V, B, C> Store<K, V> for KvStore<K, V, B, C>
where
    K: Key,
    B: Backend,
    C: Codec<V>,
{
    fn set(&self, ctx: &Context, key: &K, value: &V) -> Result<()> {
        ctx.err()?;
        let raw_key = key.to_key_bytes()?;
        let data = self.codec.marshal(value)?;
        let _guard = self.locks.acquire(ctx, &raw_key)?;
        self.backend.raw_set(&raw_key, data)
    }

    fn get(&self, ctx: &Context, key: &K) -> Result<V> {
        ctx.err()?;
        let raw_key = key.to_key_bytes()?;
        match self.backend.raw_get(&raw_key)? {
            Some(data) => self.codec.unmarshal(&data),
            None => Err(Error::KeyNotFound),
        }
    }

    fn delete(&self, ctx: &Context, key: &K) -> Result<()> {
        ctx.err()?;
        let raw_key = key.to_key_bytes()?;
        let _guard = self.locks.acquire(ctx, &raw_key)?;
        self.backend.raw_delete(&raw_key)
    }

    fn edit(&self, ctx: &Context, key: &K, edit: &mut EditFn<'_, V>) -> Result<()> {
        ctx.err()?;
        let raw_key = key.to_key_bytes()?;
        let _guard = self.locks.acquire(ctx, &raw_key)?;
        let current = match self.backend.raw_get(&raw_key)? {
            Some(data) => self.codec.unmarshal(&data)?,
            None => return Err(Error::KeyNotFound),
        };
        let next = edit(current)?;
        let data = self.codec.marshal(&next)?;
        self.backend.raw_set(&raw_key, data)
    }

    fn range(&self, ctx: &Context, iter: &mut IterFn<'_, K, V>) -> Result<()> {
        ctx.err()?;
        let scan = self.backend.raw_scan(None)?;
        self.visit(ctx, scan, iter)
    }

    fn range_with_prefix(
        &self,
        ctx: &Context,
        prefix: &K,
        iter: &mut IterFn<'_, K, V>,
    ) -> Result<()> {
        ctx.err()?;
        let raw_prefix = prefix.to_key_bytes()?;
        let scan = self.backend.raw_scan(Some(&raw_prefix))?;
        self.visit(ctx, scan, iter)
    }

    fn close(&self, _ctx: &Context) -> Result<()> {
        debug!("closing store");
        self.backend.close()
    }
}

impl<'s, K, V, S: Store<K, V> + ?Sized> Store<K, V> for &'s S {
    fn set(&self, ctx: &Context, key: &K, value: &V) -> Result<()> {
        (**self).set(ctx, key, value)
    }

    fn get(&self, ctx: &Context, key: &K) -> Result<V> {
        (**self).get(ctx, key)
    }

    fn delete(&self, ctx: &Context, key: &K) -> Result<()> {
        (**self).delete(ctx, key)
    }

    fn edit(&self, ctx: &Context, key: &K, edit: &mut EditFn<'_, V>) -> Result<()> {
        (**self).edit(ctx, key, edit)
    }

    fn range(&self, ctx: &Context, iter: &mut IterFn<'_, K, V>) -> Result<()> {
        (**self).range(ctx, iter)
    }

    fn range_with_prefix(
        &self,
        ctx: &Context,
        prefix: &K,
        iter: &mut IterFn<'_, K, V>,
    ) -> Result<()> {
        (**self).range_with_prefix(ctx, prefix, iter)
    }

    fn close(&self, ctx: &Context) -> Result<()> {
        (**self).close(ctx)
    }
}

macro_rules! forward_store {
    ($($ptr:ident),*) => {
        $(
            impl<K, V, S: Store<K, V> + ?Sized> Store<K, V> for $ptr<S> {
                fn set(&self, ctx: &Context, key: &K, value: &V) -> Result<()> {
                    (**self).set(ctx, key, value)
                }

                fn get(&self, ctx: &Context, key: &K) -> Result<V> {
                    (**self).get(ctx, key)
                }

                fn delete(&self, ctx: &Context, key: &K) -> Result<()> {
                    (**self).delete(ctx, key)
                }

                fn edit(&self, ctx: &Context, key: &K, edit: &mut EditFn<'_, V>) -> Result<()> {
                    (**self).edit(ctx, key, edit)
                }

                fn range(&self, ctx: &Context, iter: &mut IterFn<'_, K, V>) -> Result<()> {
                    (**self).range(ctx, iter)
                }

                fn range_with_prefix(
                    &self,
                    ctx: &Context,
                    prefix: &K,
                    iter: &mut IterFn<'_, K, V>,
                ) -> Result<()> {
                    (**self).range_with_prefix(ctx, prefix, iter)
                }

                fn close(&self, ctx: &Context) -> Result<()> {
                    (**self).close(ctx)
                }
            }
        )*
    };
}

forward_store!(Box, Arc);
