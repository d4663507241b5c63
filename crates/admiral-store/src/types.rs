//! Domain records persisted in the config store.
//!
//! Records are stored as JSON documents with camelCase field names.

use std::fmt;

use admiral_core::{ApplicationId, DeploymentId, ServiceId, UnitFileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node of the config store tree.
///
/// Leaf nodes carry a `value`; directory nodes carry child `nodes` when the
/// read expanded them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute key, relative to the store namespace.
    pub key: String,
    /// Value of a leaf node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether this node is a directory.
    #[serde(default)]
    pub dir: bool,
    /// Children of an expanded directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
}

impl Node {
    /// The last segment of the node's key.
    #[must_use]
    pub fn name(&self) -> &str {
        crate::keys::last_segment(&self.key)
    }

    /// Collect every leaf below (and including) this node, depth first.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Node>) {
        if self.dir {
            for child in &self.nodes {
                child.collect_leaves(out);
            }
        } else {
            out.push(self);
        }
    }
}

/// An application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Unique identifier.
    pub id: ApplicationId,
    /// Human-readable name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A unit file template owned by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFile {
    /// Identifier, also the template unit name prefix.
    pub id: UnitFileId,
    /// Rendered unit file text.
    #[serde(alias = "value")]
    pub content: String,
}

/// A service record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Unique identifier.
    pub id: ServiceId,
    /// Owning application. Immutable after creation.
    pub application: ApplicationId,
    /// Human-readable name.
    pub name: String,
    /// Name of the service template that produced the unit files.
    pub template: String,
    /// Current lifecycle state.
    pub state: ServiceState,
    /// Replica count per unit file.
    pub units: u32,
    /// Ordered unit file templates.
    #[serde(default)]
    pub unit_files: Vec<UnitFile>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// When `state` last changed.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
}

impl Service {
    /// Identifiers of the service's unit files, in order.
    #[must_use]
    pub fn unit_file_ids(&self) -> Vec<UnitFileId> {
        self.unit_files.iter().map(|f| f.id).collect()
    }
}

/// A deployment record: one scheduling generation of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Unique identifier.
    pub id: DeploymentId,
    /// Owning service. Immutable after creation.
    pub service: ServiceId,
    /// Number of distinct unit file templates.
    pub units: u32,
    /// Replicas per template, copied from the service at creation.
    pub cardinality: u32,
    /// Persisted lifecycle state.
    pub state: DeploymentState,
    /// Generation date, used to pick the latest deployment.
    pub date: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Total number of scheduled units expected when fully running.
    #[must_use]
    pub fn expected_units(&self) -> usize {
        self.units as usize * self.cardinality as usize
    }
}

/// Lifecycle states of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// Created, never started.
    Idle,
    /// A start is in progress.
    Starting,
    /// Every replica of the current deployment is running.
    Running,
    /// Some replicas of the current deployment are running.
    #[serde(rename = "partially running")]
    PartiallyRunning,
    /// A stop is in progress.
    Stopping,
    /// Every deployment has been stopped.
    Stopped,
    /// Deployments are being terminated.
    Unloading,
    /// Templates are registered but nothing is scheduled.
    Initialized,
    /// Templates are being destroyed.
    Terminating,
    /// Terminal: the service can never run again.
    Terminated,
}

impl ServiceState {
    /// The persisted text form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::PartiallyRunning => "partially running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Unloading => "unloading",
            Self::Initialized => "initialized",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle states of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Created, templates not yet submitted.
    Uninitialized,
    /// Templates submitted, nothing scheduled.
    Initialized,
    /// A start is in progress.
    Starting,
    /// Every expected unit is running.
    Running,
    /// Some expected units are running.
    #[serde(rename = "partially running")]
    PartiallyRunning,
    /// A stop is in progress.
    Stopping,
    /// Units are being destroyed.
    Terminating,
    /// Terminal: kept as history only.
    Terminated,
}

impl DeploymentState {
    /// The persisted text form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::PartiallyRunning => "partially running",
            Self::Stopping => "stopping",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_serialize_to_persisted_names() {
        assert_eq!(
            serde_json::to_string(&DeploymentState::PartiallyRunning).unwrap(),
            "\"partially running\""
        );
        assert_eq!(
            serde_json::to_string(&ServiceState::Initialized).unwrap(),
            "\"initialized\""
        );
        let state: ServiceState = serde_json::from_str("\"partially running\"").unwrap();
        assert_eq!(state, ServiceState::PartiallyRunning);
        assert_eq!(state.to_string(), "partially running");
    }

    #[test]
    fn service_document_uses_camel_case() {
        let now = Utc::now();
        let service = Service {
            id: ServiceId::generate(),
            application: ApplicationId::generate(),
            name: "web".to_string(),
            template: "fleetunits".to_string(),
            state: ServiceState::Idle,
            units: 2,
            unit_files: vec![],
            created_at: now,
            updated_at: now,
            changed_at: None,
        };

        let json = serde_json::to_value(&service).unwrap();
        assert!(json.get("unitFiles").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["changedAt"], serde_json::Value::Null);

        let parsed: Service = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, service);
    }

    #[test]
    fn unit_file_accepts_legacy_value_field() {
        let id = UnitFileId::generate();
        let json = format!(r#"{{"id":"{id}","value":"[Service]\nExecStart=/bin/true"}}"#);
        let file: UnitFile = serde_json::from_str(&json).unwrap();
        assert_eq!(file.id, id);
        assert!(file.content.starts_with("[Service]"));
    }

    #[test]
    fn expected_units_multiplies() {
        let now = Utc::now();
        let deployment = Deployment {
            id: DeploymentId::generate(),
            service: ServiceId::generate(),
            units: 3,
            cardinality: 4,
            state: DeploymentState::Uninitialized,
            date: now,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(deployment.expected_units(), 12);
    }

    #[test]
    fn node_leaves() {
        let tree = Node {
            key: "/deployments".into(),
            dir: true,
            nodes: vec![
                Node {
                    key: "/deployments/a".into(),
                    dir: true,
                    nodes: vec![Node {
                        key: "/deployments/a/1".into(),
                        value: Some("x".into()),
                        ..Node::default()
                    }],
                    ..Node::default()
                },
                Node {
                    key: "/deployments/b".into(),
                    value: Some("y".into()),
                    ..Node::default()
                },
            ],
            ..Node::default()
        };

        let leaves: Vec<&str> = tree.leaves().iter().map(|n| n.name()).collect();
        assert_eq!(leaves, vec!["1", "b"]);
    }
}
