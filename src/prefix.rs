use crate::context::Context;
use crate::key::Key;
use crate::store::{EditFn, IterFn, Store};
use crate::{Error, Result};

/// Namespaces every key of an inner store under a fixed prefix.
///
/// The prefix is joined to keys on their encoded form, and the joined bytes
/// are decoded back into a key for the inner store. Keys handed to range
/// callbacks have the prefix stripped again. Nesting `Prefix` over `Prefix`
/// concatenates the prefixes outermost-last: `Prefix(Prefix(s, "a"), "b")`
/// stores under `"ab"`.
///
/// Closing a namespace does not close the store beneath it.
pub struct Prefix<S> {
    inner: S,
    prefix: Vec<u8>,
}

impl<S> Prefix<S> {
    pub fn new<K: Key>(inner: S, prefix: &K) -> Result<Prefix<S>> {
        Ok(Prefix::from_bytes(inner, prefix.to_key_bytes()?))
    }

    pub fn from_bytes<P: Into<Vec<u8>>>(inner: S, prefix: P) -> Prefix<S> {
        Prefix {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn with_prefix<K: Key>(&self, key: &K) -> Result<K> {
        let mut raw = self.prefix.clone();
        raw.extend_from_slice(&key.to_key_bytes()?);
        K::from_key_bytes(&raw)
    }

    fn cut_prefix<K: Key>(&self, key: K) -> Result<K> {
        let raw = key.to_key_bytes()?;
        match raw.strip_prefix(self.prefix.as_slice()) {
            Some(rest) => K::from_key_bytes(rest),
            None => Err(Error::decode("key outside of namespace")),
        }
    }
}

impl<K, V, S> Store<K, V> for Prefix<S>
where
    K: Key,
    S: Store<K, V>,
{
    fn set(&self, ctx: &Context, key: &K, value: &V) -> Result<()> {
        self.inner.set(ctx, &self.with_prefix(key)?, value)
    }

    fn get(&self, ctx: &Context, key: &K) -> Result<V> {
        self.inner.get(ctx, &self.with_prefix(key)?)
    }

    fn delete(&self, ctx: &Context, key: &K) -> Result<()> {
        self.inner.delete(ctx, &self.with_prefix(key)?)
    }

    fn edit(&self, ctx: &Context, key: &K, edit: &mut EditFn<'_, V>) -> Result<()> {
        self.inner.edit(ctx, &self.with_prefix(key)?, edit)
    }

    fn range(&self, ctx: &Context, iter: &mut IterFn<'_, K, V>) -> Result<()> {
        let prefix = K::from_key_bytes(&self.prefix)?;
        self.inner
            .range_with_prefix(ctx, &prefix, &mut |k, v| iter(self.cut_prefix(k)?, v))
    }

    fn range_with_prefix(
        &self,
        ctx: &Context,
        prefix: &K,
        iter: &mut IterFn<'_, K, V>,
    ) -> Result<()> {
        let prefix = self.with_prefix(prefix)?;
        self.inner
            .range_with_prefix(ctx, &prefix, &mut |k, v| iter(self.cut_prefix(k)?, v))
    }

    fn close(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}
