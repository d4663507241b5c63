//! `RocksDB` config store.
//!
//! Entries are keyed by their absolute (namespaced) path and encoded with
//! CBOR. Directories are explicit entries, created implicitly by writes below
//! them, so listing a directory is a prefix scan.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use serde::{Deserialize, Serialize};

use crate::error::{codes, Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::Node;
use crate::{ConfigStore, DeleteOptions, GetOptions};

/// A stored entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    dir: bool,
    value: Option<String>,
}

impl Entry {
    const fn directory() -> Self {
        Self {
            dir: true,
            value: None,
        }
    }

    fn file(value: &str) -> Self {
        Self {
            dir: false,
            value: Some(value.to_string()),
        }
    }
}

/// RocksDB-backed config store.
///
/// Cloning is cheap and clones share the database.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    namespace: String,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// The returned store addresses the raw keyspace; see
    /// [`with_namespace`](Self::with_namespace).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            namespace: "/".to_string(),
        })
    }

    /// A view of the same database rooted at `namespace`.
    #[must_use]
    pub fn with_namespace(&self, namespace: &str) -> Self {
        Self {
            db: Arc::clone(&self.db),
            namespace: keys::normalize(namespace),
        }
    }

    /// The namespace every path is relative to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn cf(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf::NODES)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {}", cf::NODES)))
    }

    fn serialize(entry: &Entry) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(entry, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> Result<Entry> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn full_key(&self, path: &str) -> String {
        keys::join(&self.namespace, path)
    }

    fn read(&self, key: &str) -> Result<Option<Entry>> {
        if key == "/" {
            return Ok(Some(Entry::directory()));
        }
        let cf = self.cf()?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Every entry strictly below a directory key.
    fn descendants(&self, key: &str) -> Result<BTreeMap<String, Entry>> {
        let cf = self.cf()?;
        let prefix = keys::child_prefix(key);

        let mut out = BTreeMap::new();
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );

        for item in iter {
            let (k, v) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !k.starts_with(prefix.as_bytes()) {
                break;
            }

            let k = String::from_utf8(k.to_vec())
                .map_err(|e| StoreError::Database(format!("non-utf8 key: {e}")))?;
            out.insert(k, Self::deserialize(&v)?);
        }

        Ok(out)
    }

    fn build_node(
        &self,
        key: &str,
        entry: &Entry,
        all: &BTreeMap<String, Entry>,
        expand: bool,
        recursive: bool,
    ) -> Node {
        let mut node = Node {
            key: keys::strip_namespace(&self.namespace, key),
            value: entry.value.clone(),
            dir: entry.dir,
            nodes: Vec::new(),
        };

        if entry.dir && expand {
            let prefix = keys::child_prefix(key);
            for (child_key, child) in all {
                let Some(rest) = child_key.strip_prefix(&prefix) else {
                    continue;
                };
                if rest.contains('/') {
                    continue;
                }
                node.nodes
                    .push(self.build_node(child_key, child, all, recursive, recursive));
            }
        }

        node
    }

    /// Queue directory entries for every missing ancestor of `key`.
    fn ensure_parents(&self, key: &str, batch: &mut WriteBatch) -> Result<()> {
        let cf = self.cf()?;
        for ancestor in keys::ancestors(key) {
            match self.read(&ancestor)? {
                Some(entry) if entry.dir => {}
                Some(_) => {
                    return Err(StoreError::rejected(
                        codes::NOT_A_DIRECTORY,
                        format!("{ancestor} is not a directory"),
                    ))
                }
                None => batch.put_cf(&cf, ancestor.as_bytes(), Self::serialize(&Entry::directory())?),
            }
        }
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl ConfigStore for RocksStore {
    async fn get(&self, path: &str, options: GetOptions) -> Result<Node> {
        let key = self.full_key(path);
        let entry = self
            .read(&key)?
            .ok_or_else(|| StoreError::NotFound(keys::normalize(path)))?;

        let all = if entry.dir {
            self.descendants(&key)?
        } else {
            BTreeMap::new()
        };

        tracing::trace!(key = %key, entries = all.len(), "Read from rocks store");
        Ok(self.build_node(&key, &entry, &all, true, options.recursive))
    }

    async fn set(&self, path: &str, value: &str) -> Result<Node> {
        let key = self.full_key(path);
        if let Some(existing) = self.read(&key)? {
            if existing.dir {
                return Err(StoreError::rejected(
                    codes::NOT_A_FILE,
                    format!("{} is a directory", keys::normalize(path)),
                ));
            }
        }

        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        self.ensure_parents(&key, &mut batch)?;
        batch.put_cf(&cf, key.as_bytes(), Self::serialize(&Entry::file(value))?);
        self.write(batch)?;

        Ok(Node {
            key: keys::strip_namespace(&self.namespace, &key),
            value: Some(value.to_string()),
            dir: false,
            nodes: Vec::new(),
        })
    }

    async fn del(&self, path: &str, options: DeleteOptions) -> Result<()> {
        let key = self.full_key(path);
        let entry = self
            .read(&key)?
            .ok_or_else(|| StoreError::NotFound(keys::normalize(path)))?;

        if entry.dir && !options.recursive {
            return Err(StoreError::rejected(
                codes::NOT_A_FILE,
                format!("{} is a directory", keys::normalize(path)),
            ));
        }

        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        if entry.dir {
            for descendant in self.descendants(&key)?.keys() {
                batch.delete_cf(&cf, descendant.as_bytes());
            }
        }
        batch.delete_cf(&cf, key.as_bytes());
        self.write(batch)
    }

    async fn mkdir(&self, path: &str) -> Result<Node> {
        let key = self.full_key(path);
        if self.read(&key)?.is_some() {
            return Err(StoreError::rejected(
                codes::NODE_EXISTS,
                format!("{} already exists", keys::normalize(path)),
            ));
        }

        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        self.ensure_parents(&key, &mut batch)?;
        batch.put_cf(&cf, key.as_bytes(), Self::serialize(&Entry::directory())?);
        self.write(batch)?;

        Ok(Node {
            key: keys::strip_namespace(&self.namespace, &key),
            value: None,
            dir: true,
            nodes: Vec::new(),
        })
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let key = self.full_key(path);
        let entry = self
            .read(&key)?
            .ok_or_else(|| StoreError::NotFound(keys::normalize(path)))?;

        if !entry.dir {
            return Err(StoreError::rejected(
                codes::NOT_A_DIRECTORY,
                format!("{} is not a directory", keys::normalize(path)),
            ));
        }
        if !self.descendants(&key)?.is_empty() {
            return Err(StoreError::rejected(
                codes::DIRECTORY_NOT_EMPTY,
                format!("{} is not empty", keys::normalize(path)),
            ));
        }

        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf, key.as_bytes());
        self.write(batch)
    }
}
