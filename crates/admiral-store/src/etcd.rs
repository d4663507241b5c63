//! etcd v2 config store client.
//!
//! Speaks the etcd v2 keys API (`/v2/keys/...`) over HTTP. Every path is
//! prefixed with the configured namespace on the way out and stripped from
//! returned keys on the way back, so callers only ever see namespace-relative
//! keys.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{codes, Result, StoreError};
use crate::keys;
use crate::types::Node;
use crate::{ConfigStore, DeleteOptions, GetOptions};

/// Configuration for [`EtcdStore`].
#[derive(Debug, Clone)]
pub struct EtcdConfig {
    /// Base URL of the etcd client API, e.g. `http://127.0.0.1:4001`.
    pub endpoint: String,
    /// Root namespace for every path.
    pub namespace: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:4001".to_string(),
            namespace: "/admiral".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Successful etcd response.
#[derive(Debug, Deserialize)]
struct EtcdResponse {
    #[serde(default)]
    node: Option<Node>,
}

/// Error body returned by etcd.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdError {
    error_code: u32,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

/// HTTP client for the etcd v2 keys API.
#[derive(Debug, Clone)]
pub struct EtcdStore {
    client: reqwest::Client,
    endpoint: String,
    namespace: String,
}

impl EtcdStore {
    /// Create a new etcd client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: EtcdConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self::with_client(client, config.endpoint, &config.namespace))
    }

    /// Create a client with a pre-built reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>, namespace: &str) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            namespace: keys::normalize(namespace),
        }
    }

    /// A client sharing this one's connection pool but rooted elsewhere.
    #[must_use]
    pub fn with_namespace(&self, namespace: &str) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            namespace: keys::normalize(namespace),
        }
    }

    /// The namespace every path is relative to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/keys{}", self.endpoint, keys::join(&self.namespace, path))
    }

    fn strip(&self, mut node: Node) -> Node {
        node.key = keys::strip_namespace(&self.namespace, &node.key);
        node.nodes = node.nodes.into_iter().map(|n| self.strip(n)).collect();
        node
    }

    /// Decode a response, mapping etcd error bodies onto `StoreError`.
    async fn decode(&self, path: &str, response: reqwest::Response) -> Result<Node> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let parsed: EtcdResponse = serde_json::from_str(&body)?;
            return Ok(parsed.node.map(|n| self.strip(n)).unwrap_or_default());
        }

        match serde_json::from_str::<EtcdError>(&body) {
            Ok(err) if err.error_code == codes::KEY_NOT_FOUND => {
                tracing::debug!(path = %path, "etcd key not found");
                Err(StoreError::NotFound(keys::normalize(path)))
            }
            Ok(err) => {
                tracing::warn!(
                    path = %path,
                    code = err.error_code,
                    message = %err.message,
                    "etcd rejected request"
                );
                let message = match err.cause {
                    Some(cause) => format!("{}: {cause}", err.message),
                    None => err.message,
                };
                Err(StoreError::Rejected {
                    code: err.error_code,
                    message,
                })
            }
            Err(_) => Err(StoreError::Http(format!("etcd returned status {status}"))),
        }
    }
}

#[async_trait]
impl ConfigStore for EtcdStore {
    async fn get(&self, path: &str, options: GetOptions) -> Result<Node> {
        let mut request = self.client.get(self.url(path));
        if options.recursive {
            request = request.query(&[("recursive", "true")]);
        }
        let response = request.send().await?;
        self.decode(path, response).await
    }

    async fn set(&self, path: &str, value: &str) -> Result<Node> {
        let response = self
            .client
            .put(self.url(path))
            .form(&[("value", value)])
            .send()
            .await?;
        self.decode(path, response).await
    }

    async fn del(&self, path: &str, options: DeleteOptions) -> Result<()> {
        let mut request = self.client.delete(self.url(path));
        if options.recursive {
            request = request.query(&[("recursive", "true")]);
        }
        let response = request.send().await?;
        self.decode(path, response).await.map(|_| ())
    }

    async fn mkdir(&self, path: &str) -> Result<Node> {
        let response = self
            .client
            .put(self.url(path))
            .query(&[("prevExist", "false")])
            .form(&[("dir", "true")])
            .send()
            .await?;
        self.decode(path, response).await
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(path))
            .query(&[("dir", "true")])
            .send()
            .await?;
        self.decode(path, response).await.map(|_| ())
    }
}
