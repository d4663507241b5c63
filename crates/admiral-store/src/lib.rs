//! Config store layer for admiral.
//!
//! Desired state lives in a namespaced key/value store with directory
//! semantics. This crate defines that contract ([`ConfigStore`]), the
//! records kept in it, and two backends:
//!
//! - [`EtcdStore`]: the etcd v2 keys API over HTTP, the production backend
//! - [`RocksStore`]: an embedded `RocksDB` database with the same semantics,
//!   for single-node installs and tests
//!
//! # Layout
//!
//! ```text
//! {namespace}
//! ├── applications/{applicationId}
//! ├── services/{serviceId}
//! └── deployments/{serviceId}/{deploymentId}
//! ```
//!
//! # Example
//!
//! ```no_run
//! use admiral_store::{ConfigStore, ConfigStoreExt, GetOptions, RocksStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RocksStore::open("/tmp/admiral-db")?.with_namespace("/admiral");
//!
//! store.set("/motd", "hello").await?;
//! let node = store.get("/motd", GetOptions::default()).await?;
//! assert_eq!(node.value.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod etcd;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use etcd::{EtcdConfig, EtcdStore};
pub use rocks::RocksStore;
pub use types::{
    Application, Deployment, DeploymentState, Node, Service, ServiceState, UnitFile,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Options for [`ConfigStore::get`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Expand directories all the way down instead of one level.
    pub recursive: bool,
}

impl GetOptions {
    /// Options for a fully expanded read.
    #[must_use]
    pub const fn recursive() -> Self {
        Self { recursive: true }
    }
}

/// Options for [`ConfigStore::del`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Delete a directory together with everything below it.
    pub recursive: bool,
}

impl DeleteOptions {
    /// Options for a recursive delete.
    #[must_use]
    pub const fn recursive() -> Self {
        Self { recursive: true }
    }
}

/// The config store contract.
///
/// All paths are relative to the implementation's namespace. An absent key
/// or directory is always reported as [`StoreError::NotFound`]; every other
/// failure is some other variant.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a key or directory.
    ///
    /// Directories are expanded one level, or fully with `recursive`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the path does not exist.
    async fn get(&self, path: &str, options: GetOptions) -> Result<Node>;

    /// Write a value, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Rejected` if the path is a directory.
    async fn set(&self, path: &str, value: &str) -> Result<Node>;

    /// Delete a key, or a directory tree with `recursive`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the path does not exist.
    async fn del(&self, path: &str, options: DeleteOptions) -> Result<()>;

    /// Create a directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Rejected` if the path already exists.
    async fn mkdir(&self, path: &str) -> Result<Node>;

    /// Remove an empty directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the directory does not exist and
    /// `StoreError::Rejected` if it is not empty.
    async fn rmdir(&self, path: &str) -> Result<()>;
}

/// JSON document helpers available on every [`ConfigStore`].
#[async_trait]
pub trait ConfigStoreExt: ConfigStore {
    /// Read and decode one document, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the document does not decode.
    async fn get_document<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(path, GetOptions::default()).await {
            Ok(node) => {
                let value = node.value.ok_or_else(|| {
                    StoreError::rejected(error::codes::NOT_A_FILE, format!("{path} is a directory"))
                })?;
                Ok(Some(serde_json::from_str(&value)?))
            }
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encode and write one document.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    async fn put_document<T>(&self, path: &str, document: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_string(document)?;
        self.set(path, &value).await?;
        Ok(())
    }

    /// Decode every leaf document below a directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the directory does not exist, or an
    /// error if a document does not decode.
    async fn list_documents<T>(&self, path: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let node = self.get(path, GetOptions::recursive()).await?;
        node.leaves()
            .into_iter()
            .filter_map(|leaf| leaf.value.as_deref())
            .map(|value| serde_json::from_str(value).map_err(StoreError::from))
            .collect()
    }
}

impl<S: ConfigStore + ?Sized> ConfigStoreExt for S {}
