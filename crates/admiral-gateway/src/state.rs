//! Gateway application state.

use std::sync::Arc;

use admiral_control::ControlPlane;
use admiral_store::ConfigStore;

use crate::config::GatewayConfig;

/// Shared state available to every handler.
#[derive(Clone)]
pub struct GatewayState {
    /// The control plane registries.
    pub control: ControlPlane,
    /// Config store rooted at `/`, for the router's `/vulcand` keys.
    pub router_store: Arc<dyn ConfigStore>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(
        control: ControlPlane,
        router_store: Arc<dyn ConfigStore>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            control,
            router_store,
            config,
        }
    }
}
