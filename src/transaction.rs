use crate::codec::Codec;
use crate::context::Context;
use crate::engines::{Backend, BatchOp, RawEntry, RawScan, TransactionalBackend};
use crate::key::Key;
use crate::locks::LockRegistry;
use crate::store::{EditFn, IterFn, KvStore, Store};
use crate::{Error, Result};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Peekable;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Staged = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

#[derive(Default)]
struct Scope {
    staged: Staged,
    // first value observed in the backend for each key read
    reads: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

/// Writes buffered over a backend until commit.
///
/// Reads see the staged writes first, then the value this transaction
/// already observed for the key, and only then fall through to the backend.
/// Nothing reaches the backend before `commit`, which locks every key the
/// transaction read or wrote, checks that no key it read has changed, and
/// applies the staged writes as one batch. After commit or rollback every
/// operation fails with `Error::TransactionClosed`.
pub struct StagedTransaction<B> {
    base: B,
    writable: bool,
    locks: Arc<LockRegistry>,
    scope: Mutex<Option<Scope>>,
}

impl<B: TransactionalBackend> StagedTransaction<B> {
    pub(crate) fn new(base: B, writable: bool, locks: Arc<LockRegistry>) -> StagedTransaction<B> {
        debug!("beginning {} transaction", if writable { "write" } else { "read" });
        StagedTransaction {
            base,
            writable,
            locks,
            scope: Mutex::new(Some(Scope::default())),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Publishes the staged writes. The transaction is finished afterwards
    /// whether or not the commit succeeded.
    pub fn commit(&self, ctx: &Context) -> Result<()> {
        let scope = self.lock().take().ok_or(Error::TransactionClosed)?;
        if scope.staged.is_empty() {
            debug!("committing empty transaction");
            return Ok(());
        }

        // sorted, so concurrent committers lock in the same order
        let keys: BTreeSet<&[u8]> = scope
            .staged
            .keys()
            .chain(scope.reads.keys())
            .map(Vec::as_slice)
            .collect();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.locks.acquire(ctx, key)?);
        }
        for (key, seen) in &scope.reads {
            if self.base.raw_get(key)? != *seen {
                debug!("transaction conflict on {:?}", key);
                return Err(Error::Conflict { key: key.clone() });
            }
        }

        debug!("committing transaction with {} writes", scope.staged.len());
        let batch: Vec<BatchOp> = scope.staged.into_iter().collect();
        self.base.apply_batch(batch)
    }

    pub fn rollback(&self) -> Result<()> {
        let scope = self.lock().take().ok_or(Error::TransactionClosed)?;
        debug!("rolling back transaction with {} writes", scope.staged.len());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Scope>> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stage(&self, key: &[u8], value: Option<Vec<u8>>) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnlyTransaction);
        }
        let mut guard = self.lock();
        let scope = guard.as_mut().ok_or(Error::TransactionClosed)?;
        scope.staged.insert(key.to_vec(), value);
        Ok(())
    }
}

impl<B: TransactionalBackend> Backend for StagedTransaction<B> {
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        {
            let guard = self.lock();
            let scope = guard.as_ref().ok_or(Error::TransactionClosed)?;
            if let Some(value) = scope.staged.get(key).or_else(|| scope.reads.get(key)) {
                return Ok(value.clone());
            }
        }
        let value = self.base.raw_get(key)?;
        let mut guard = self.lock();
        let scope = guard.as_mut().ok_or(Error::TransactionClosed)?;
        Ok(scope.reads.entry(key.to_vec()).or_insert(value).clone())
    }

    fn raw_set(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.stage(key, Some(value))
    }

    fn raw_delete(&self, key: &[u8]) -> Result<()> {
        self.stage(key, None)
    }

    fn raw_scan(&self, prefix: Option<&[u8]>) -> Result<RawScan<'_>> {
        let matches = |k: &[u8]| prefix.map_or(true, |p| k.starts_with(p));
        let (staged, reads) = {
            let guard = self.lock();
            let scope = guard.as_ref().ok_or(Error::TransactionClosed)?;
            let staged: Staged = scope
                .staged
                .iter()
                .filter(|(k, _)| matches(k.as_slice()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let reads: Staged = scope
                .reads
                .iter()
                .filter(|(k, _)| matches(k.as_slice()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (staged, reads)
        };
        let shadowed: BTreeSet<Vec<u8>> = staged.keys().cloned().collect();
        let base = self
            .base
            .raw_scan(prefix)?
            .filter_map(move |item| match item {
                Ok((k, _)) if shadowed.contains(&k) => None,
                Ok((k, v)) => match reads.get(&k) {
                    Some(Some(seen)) => Some(Ok((k, seen.clone()))),
                    Some(None) => None,
                    None => Some(Ok((k, v))),
                },
                Err(e) => Some(Err(e)),
            });
        let pending = staged.into_iter().filter_map(|(k, v)| v.map(|v| (k, v)));
        Ok(Box::new(Merge {
            base: base.peekable(),
            pending: pending.peekable(),
        }))
    }
}

// Interleaves the backend scan with staged puts in key order. The two never
// share a key.
struct Merge<A: Iterator, P: Iterator> {
    base: Peekable<A>,
    pending: Peekable<P>,
}

impl<A, P> Iterator for Merge<A, P>
where
    A: Iterator<Item = Result<RawEntry>>,
    P: Iterator<Item = RawEntry>,
{
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let take_pending = match (self.base.peek(), self.pending.peek()) {
            (Some(Ok((base_key, _))), Some((pending_key, _))) => pending_key < base_key,
            (Some(_), _) => false,
            (None, Some(_)) => true,
            (None, None) => return None,
        };
        if take_pending {
            self.pending.next().map(Ok)
        } else {
            self.base.next()
        }
    }
}

/// A store view bound to one backend transaction.
///
/// `commit` publishes the staged writes, `rollback` discards them, and
/// dropping the scope without either rolls back. `Store::close` commits, so
/// a scope handed around as a plain `Store` is finalized the same way a base
/// store is released.
pub struct Transaction<K, V, B: TransactionalBackend, C> {
    store: KvStore<K, V, StagedTransaction<B>, C>,
}

impl<K, V, B, C> Transaction<K, V, B, C>
where
    K: Key,
    B: TransactionalBackend,
    C: Codec<V>,
{
    pub(crate) fn new(store: KvStore<K, V, StagedTransaction<B>, C>) -> Transaction<K, V, B, C> {
        Transaction { store }
    }

    pub fn is_writable(&self) -> bool {
        self.store.backend().is_writable()
    }

    /// Fails with `Error::Conflict` when a key this scope read was changed
    /// by someone else in the meantime; nothing is written in that case.
    pub fn commit(self) -> Result<()> {
        self.store.backend().commit(&Context::background())
    }

    pub fn rollback(self) -> Result<()> {
        self.store.backend().rollback()
    }
}

impl<K, V, B, C> Store<K, V> for Transaction<K, V, B, C>
where
    K: Key,
    B: TransactionalBackend,
    C: Codec<V>,
{
    fn set(&self, ctx: &Context, key: &K, value: &V) -> Result<()> {
        self.store.set(ctx, key, value)
    }

    fn get(&self, ctx: &Context, key: &K) -> Result<V> {
        self.store.get(ctx, key)
    }

    fn delete(&self, ctx: &Context, key: &K) -> Result<()> {
        self.store.delete(ctx, key)
    }

    fn edit(&self, ctx: &Context, key: &K, edit: &mut EditFn<'_, V>) -> Result<()> {
        self.store.edit(ctx, key, edit)
    }

    fn range(&self, ctx: &Context, iter: &mut IterFn<'_, K, V>) -> Result<()> {
        self.store.range(ctx, iter)
    }

    fn range_with_prefix(
        &self,
        ctx: &Context,
        prefix: &K,
        iter: &mut IterFn<'_, K, V>,
    ) -> Result<()> {
        self.store.range_with_prefix(ctx, prefix, iter)
    }

    fn close(&self, ctx: &Context) -> Result<()> {
        ctx.err()?;
        self.store.backend().commit(ctx)
    }
}

impl<K, V, B: TransactionalBackend, C> Drop for Transaction<K, V, B, C> {
    fn drop(&mut self) {
        let txn = self.store.backend();
        if txn.is_open() {
            debug!("discarding uncommitted transaction");
            let _ = txn.rollback();
        }
    }
}
