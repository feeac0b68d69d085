use super::{Backend, BatchOp, OrderedBackend, RawScan, TransactionalBackend};
use crate::config::Config;
use crate::Result;
use log::{debug, warn};
use sled::{Batch, Db, IVec, Tree};
use std::ops::Bound;
use std::path::Path;

const DEFAULT_TREE: &str = "typedkv";

/// Embedded on-disk engine backed by one sled tree.
#[derive(Clone)]
pub struct SledBackend {
    db: Db,
    tree: Tree,
}

impl SledBackend {
    pub fn new(db: Db) -> Result<SledBackend> {
        let tree = db.open_tree(DEFAULT_TREE)?;
        Ok(SledBackend { db, tree })
    }

    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> Result<SledBackend> {
        debug!("opening sled backend at {}", path.display());
        SledBackend::new(sled::open(path)?)
    }

    pub fn open_with(config: &Config) -> Result<SledBackend> {
        if let Some(ttl) = config.default_ttl {
            warn!("sled backend cannot expire records, ignoring ttl of {:?}", ttl);
        }
        SledBackend::open(&config.path)
    }

    /// A backend over another tree of the same database.
    pub fn with_tree(&self, name: &str) -> Result<SledBackend> {
        Ok(SledBackend {
            db: self.db.clone(),
            tree: self.db.open_tree(name)?,
        })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn entry(item: sled::Result<(IVec, IVec)>) -> Result<(Vec<u8>, Vec<u8>)> {
    let (k, v) = item?;
    Ok((k.to_vec(), v.to_vec()))
}

impl Backend for SledBackend {
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn raw_set(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn raw_delete(&self, key: &[u8]) -> Result<()> {
        self.tree.remove(key)?;
        Ok(())
    }

    fn raw_scan(&self, prefix: Option<&[u8]>) -> Result<RawScan<'_>> {
        let iter = match prefix {
            Some(p) => self.tree.scan_prefix(p),
            None => self.tree.iter(),
        };
        Ok(Box::new(iter.map(entry)))
    }

    fn close(&self) -> Result<()> {
        debug!("flushing sled backend");
        self.db.flush()?;
        Ok(())
    }
}

impl OrderedBackend for SledBackend {
    fn raw_range(
        &self,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
        reverse: bool,
    ) -> Result<RawScan<'_>> {
        let iter = self.tree.range::<Vec<u8>, _>((lower, upper));
        if reverse {
            Ok(Box::new(iter.rev().map(entry)))
        } else {
            Ok(Box::new(iter.map(entry)))
        }
    }
}

impl TransactionalBackend for SledBackend {
    fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut batch = Batch::default();
        for (key, value) in ops {
            match value {
                Some(value) => batch.insert(key, value),
                None => batch.remove(key),
            }
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }
}
