//! Admiral - control plane for fleet clusters.
//!
//! This is the entry point for the `admiral` binary. Every option can also
//! be set through an `ADMIRAL_*` environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use admiral_control::{ControlConfig, ControlPlane, RetryPolicy};
use admiral_fleet::{FleetClient, FleetConfig};
use admiral_gateway::{create_router, GatewayConfig, GatewayState};
use admiral_store::{ConfigStore, EtcdConfig, EtcdStore, RocksStore};

/// Config store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreBackend {
    /// etcd v2 over HTTP.
    Etcd,
    /// Embedded RocksDB, for single-node setups and development.
    Rocks,
}

/// Admiral - control plane for fleet clusters.
#[derive(Parser, Debug)]
#[command(name = "admiral")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the HTTP API listens on.
    #[arg(long, env = "ADMIRAL_LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    listen_addr: SocketAddr,

    /// Config store backend.
    #[arg(long, env = "ADMIRAL_STORE", value_enum, default_value = "etcd")]
    store: StoreBackend,

    /// etcd client URL.
    #[arg(long, env = "ADMIRAL_ETCD_URL", default_value = "http://127.0.0.1:4001")]
    etcd_url: String,

    /// Namespace every admiral key lives under.
    #[arg(long, env = "ADMIRAL_NAMESPACE", default_value = "/admiral")]
    namespace: String,

    /// RocksDB data directory, for `--store rocks`.
    #[arg(long, env = "ADMIRAL_DATA_DIR", default_value = "/var/lib/admiral")]
    data_dir: PathBuf,

    /// fleet API URL.
    #[arg(long, env = "ADMIRAL_FLEET_URL", default_value = "http://127.0.0.1:49153")]
    fleet_url: String,

    /// Timeout for config store and fleet requests, in seconds.
    #[arg(long, env = "ADMIRAL_UPSTREAM_TIMEOUT", default_value = "10")]
    upstream_timeout: u64,

    /// Timeout for a whole HTTP request, in seconds.
    #[arg(long, env = "ADMIRAL_REQUEST_TIMEOUT", default_value = "60")]
    request_timeout: u64,

    /// Attempts for scheduler reads during reconciliation.
    #[arg(long, env = "ADMIRAL_RETRY_ATTEMPTS", default_value = "3")]
    retry_attempts: u32,
}

/// The namespaced store for the registries and a root store for the router.
fn open_stores(
    args: &Args,
) -> Result<(Arc<dyn ConfigStore>, Arc<dyn ConfigStore>), Box<dyn std::error::Error>> {
    Ok(match args.store {
        StoreBackend::Etcd => {
            let root = EtcdStore::new(EtcdConfig {
                endpoint: args.etcd_url.clone(),
                namespace: "/".to_string(),
                timeout: Duration::from_secs(args.upstream_timeout),
            })?;
            let store: Arc<dyn ConfigStore> = Arc::new(root.with_namespace(&args.namespace));
            let root: Arc<dyn ConfigStore> = Arc::new(root);
            (store, root)
        }
        StoreBackend::Rocks => {
            tracing::info!(path = %args.data_dir.display(), "Opening RocksDB store");
            let root = RocksStore::open(&args.data_dir)?;
            let store: Arc<dyn ConfigStore> = Arc::new(root.with_namespace(&args.namespace));
            let root: Arc<dyn ConfigStore> = Arc::new(root);
            (store, root)
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,admiral=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        listen_addr = %args.listen_addr,
        store = ?args.store,
        etcd_url = %args.etcd_url,
        namespace = %args.namespace,
        fleet_url = %args.fleet_url,
        "Starting Admiral"
    );

    let (store, router_store) = open_stores(&args)?;

    let fleet = Arc::new(FleetClient::new(&FleetConfig {
        endpoint: args.fleet_url.clone(),
        timeout_seconds: args.upstream_timeout,
    })?);

    let control = ControlPlane::new(
        store,
        fleet,
        ControlConfig {
            retry: RetryPolicy {
                max_attempts: args.retry_attempts,
                ..RetryPolicy::default()
            },
        },
    );
    tracing::info!(retry_attempts = args.retry_attempts, "Control plane initialized");

    let config = GatewayConfig {
        listen_addr: args.listen_addr.to_string(),
        request_timeout_seconds: args.request_timeout,
        ..GatewayConfig::default()
    };
    let app = create_router(GatewayState::new(control, router_store, config));

    tracing::info!(listen_addr = %args.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(args.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
