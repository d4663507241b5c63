//! Read-only views of the vulcand router configuration.
//!
//! vulcand keeps its configuration under `/vulcand` at the root of the
//! config store, outside admiral's namespace.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;
use tracing::{error, warn};

use admiral_store::{GetOptions, Node, StoreError};

use crate::error::ApiError;
use crate::state::GatewayState;

/// Directory holding one entry per backend.
pub const BACKENDS: &str = "/vulcand/backends";
/// Directory holding one entry per frontend.
pub const FRONTENDS: &str = "/vulcand/frontends";

fn router_error(err: StoreError, what: &str) -> ApiError {
    match err {
        StoreError::NotFound(_) => {
            ApiError::NotFound("The router has not been setup and was not found.".to_string())
        }
        other => {
            error!(error = %other, "Failed to read router {what}");
            ApiError::Internal(format!("There was a problem fetching the {what}."))
        }
    }
}

/// The frontend document of one `/vulcand/frontends/{id}` directory, with
/// its id added. Entries without a readable `frontend` key are skipped.
fn frontend(node: &Node) -> Option<Value> {
    let document = node
        .nodes
        .iter()
        .find(|child| child.key.ends_with("frontend"))
        .and_then(|child| child.value.as_deref());

    let Some(document) = document else {
        warn!(key = %node.key, "Frontend without a frontend document");
        return None;
    };

    match serde_json::from_str::<Value>(document) {
        Ok(Value::Object(mut fields)) => {
            fields.insert("id".to_string(), Value::String(node.name().to_string()));
            Some(Value::Object(fields))
        }
        Ok(_) | Err(_) => {
            warn!(key = %node.key, "Frontend document is not a JSON object");
            None
        }
    }
}

/// `GET /v1/router/backends`: backend ids.
///
/// # Errors
///
/// Returns 404 if the router has no configuration.
pub async fn list_backends(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state
        .router_store
        .get(BACKENDS, GetOptions::default())
        .await
        .map_err(|e| router_error(e, "backends"))?;

    let ids: Vec<String> = node.nodes.iter().map(|n| n.name().to_string()).collect();
    Ok(Json(ids))
}

/// `GET /v1/router/frontends`: frontend documents with their ids.
///
/// # Errors
///
/// Returns 404 if the router has no configuration.
pub async fn list_frontends(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state
        .router_store
        .get(FRONTENDS, GetOptions::recursive())
        .await
        .map_err(|e| router_error(e, "frontends"))?;

    let frontends: Vec<Value> = node.nodes.iter().filter_map(frontend).collect();
    Ok(Json(frontends))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(key: &str, value: &str) -> Node {
        Node {
            key: key.to_string(),
            value: Some(value.to_string()),
            ..Node::default()
        }
    }

    #[test]
    fn frontend_gets_its_id() {
        let node = Node {
            key: "/vulcand/frontends/f1".to_string(),
            dir: true,
            nodes: vec![
                leaf("/vulcand/frontends/f1/middlewares", "{}"),
                leaf(
                    "/vulcand/frontends/f1/frontend",
                    r#"{"Type":"http","BackendId":"b1"}"#,
                ),
            ],
            ..Node::default()
        };

        let value = frontend(&node).unwrap();
        assert_eq!(value["id"], "f1");
        assert_eq!(value["BackendId"], "b1");
    }

    #[test]
    fn malformed_frontends_are_skipped() {
        let missing = Node {
            key: "/vulcand/frontends/f2".to_string(),
            dir: true,
            ..Node::default()
        };
        assert!(frontend(&missing).is_none());

        let garbage = Node {
            key: "/vulcand/frontends/f3".to_string(),
            dir: true,
            nodes: vec![leaf("/vulcand/frontends/f3/frontend", "not json")],
            ..Node::default()
        };
        assert!(frontend(&garbage).is_none());
    }
}
