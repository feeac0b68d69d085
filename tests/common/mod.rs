#![allow(dead_code)]

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tempfile::TempDir;
use typedkv::*;

pub const EDIT_SUFFIX: &str = "!";

pub fn memory_store<V>() -> KvStore<String, V, MemoryBackend, Json>
where
    V: Serialize + DeserializeOwned,
{
    KvStore::new(MemoryBackend::new(), Json)
}

pub fn sled_store<V>(dir: &TempDir) -> Result<KvStore<String, V, SledBackend, Json>>
where
    V: Serialize + DeserializeOwned,
{
    Ok(KvStore::new(SledBackend::open(dir.path())?, Json))
}

pub fn collect<K, V, S>(store: &S) -> Result<HashMap<K, V>>
where
    K: std::hash::Hash + Eq,
    S: Store<K, V>,
{
    let mut seen = HashMap::new();
    store.range(&Context::background(), &mut |k, v| {
        seen.insert(k, v);
        Ok(())
    })?;
    Ok(seen)
}

pub fn collect_prefix<K, V, S>(store: &S, prefix: &K) -> Result<HashMap<K, V>>
where
    K: std::hash::Hash + Eq,
    S: Store<K, V>,
{
    let mut seen = HashMap::new();
    store.range_with_prefix(&Context::background(), prefix, &mut |k, v| {
        seen.insert(k, v);
        Ok(())
    })?;
    Ok(seen)
}

/// Scenarios every string store must pass.
pub fn golden<S: Store<String, String>>(store: &S) -> Result<()> {
    set_get(store, "key", "value")?;
    missing_key(store)?;
    edit(store)?;
    delete(store)?;
    range(store)?;
    Ok(())
}

pub fn set_get<S: Store<String, String>>(store: &S, key: &str, value: &str) -> Result<()> {
    let ctx = Context::background();
    store.set(&ctx, &key.to_string(), &value.to_string())?;
    assert_eq!(store.get(&ctx, &key.to_string())?, value);

    store.set(&ctx, &key.to_string(), &format!("{}-2", value))?;
    assert_eq!(store.get(&ctx, &key.to_string())?, format!("{}-2", value));

    store.set(&ctx, &key.to_string(), &value.to_string())?;
    Ok(())
}

fn missing_key<S: Store<String, String>>(store: &S) -> Result<()> {
    let ctx = Context::background();
    let err = store.get(&ctx, &"never-written".to_string()).unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {}", err);
    Ok(())
}

fn edit<S: Store<String, String>>(store: &S) -> Result<()> {
    let ctx = Context::background();
    let key = "edit-key".to_string();
    store.set(&ctx, &key, &"value".to_string())?;
    store.edit(&ctx, &key, &mut |v| Ok(v + EDIT_SUFFIX))?;
    assert_eq!(store.get(&ctx, &key)?, "value!");

    let mut called = false;
    let err = store
        .edit(&ctx, &"edit-missing".to_string(), &mut |v| {
            called = true;
            Ok(v)
        })
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!called);

    // a failing edit leaves the value alone
    let err = store
        .edit(&ctx, &key, &mut |_| Err(Error::Config("rejected".to_string())))
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(store.get(&ctx, &key)?, "value!");

    store.delete(&ctx, &key)?;
    Ok(())
}

fn delete<S: Store<String, String>>(store: &S) -> Result<()> {
    let ctx = Context::background();
    let key = "delete-key".to_string();
    store.set(&ctx, &key, &"gone soon".to_string())?;
    store.delete(&ctx, &key)?;
    assert!(store.get(&ctx, &key).unwrap_err().is_not_found());

    store.delete(&ctx, &key)?;
    store.delete(&ctx, &"never-written".to_string())?;
    Ok(())
}

fn range<S: Store<String, String>>(store: &S) -> Result<()> {
    let ctx = Context::background();
    store.delete(&ctx, &"key".to_string())?;
    for i in 1..=3 {
        store.set(&ctx, &format!("key{}", i), &format!("value{}", i))?;
    }

    let mut visits = Vec::new();
    store.range(&ctx, &mut |k, v| {
        visits.push((k, v));
        Ok(())
    })?;
    visits.sort();
    assert_eq!(
        visits,
        vec![
            ("key1".to_string(), "value1".to_string()),
            ("key2".to_string(), "value2".to_string()),
            ("key3".to_string(), "value3".to_string()),
        ]
    );

    let mut count = 0;
    let res = store.range(&ctx, &mut |_, _| {
        count += 1;
        Err(Error::Stopped)
    });
    assert!(matches!(res, Err(Error::Stopped)));
    assert_eq!(count, 1);

    store.set(&ctx, &"other".to_string(), &"x".to_string())?;
    let matched = collect_prefix(store, &"key".to_string())?;
    assert_eq!(matched.len(), 3);
    assert_eq!(matched["key2"], "value2");

    for key in &["key1", "key2", "key3", "other"] {
        store.delete(&ctx, &key.to_string())?;
    }
    assert!(collect(store)?.is_empty());
    Ok(())
}

/// Namespacing through `Prefix`, ported from the shared store scenarios.
pub fn prefix_bytes<S: Store<String, String>>(
    store: &S,
    prefix: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let ctx = Context::background();
    let pm = Prefix::new(store, &prefix.to_string())?;
    let key = key.to_string();

    pm.set(&ctx, &key, &value.to_string())?;
    assert_eq!(store.get(&ctx, &format!("{}{}", prefix, key))?, value);
    assert_eq!(pm.get(&ctx, &key)?, value);

    let vals = collect(&pm)?;
    assert_eq!(vals.len(), 1);
    assert_eq!(vals[&key], value);

    if !key.is_empty() {
        let first = key.chars().next().map(String::from).unwrap_or_default();
        let vals = collect_prefix(&pm, &first)?;
        assert_eq!(vals.len(), 1);
        assert_eq!(vals[&key], value);
    }

    pm.edit(&ctx, &key, &mut |v| Ok(v + EDIT_SUFFIX))?;
    assert_eq!(pm.get(&ctx, &key)?, format!("{}{}", value, EDIT_SUFFIX));

    pm.delete(&ctx, &key)?;
    assert!(pm.get(&ctx, &key).unwrap_err().is_not_found());

    pm.close(&ctx)?;
    Ok(())
}
