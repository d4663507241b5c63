//! Types for the cluster scheduler contract.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime state of a unit loaded on a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitState {
    /// Canonical unit name, without the `.service` suffix.
    pub name: String,
    /// Machine the unit is loaded on.
    pub machine_id: Option<String>,
    /// systemd load state (`loaded`, `not-found`, ...).
    pub load_state: String,
    /// systemd active state.
    pub active_state: ActiveState,
    /// systemd sub state (`running`, `start-pre`, `dead`, ...).
    pub sub_state: String,
}

impl UnitState {
    /// Returns true if the unit is active and its process is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active_state == ActiveState::Active && self.sub_state == "running"
    }

    /// Returns true if the unit is still working through its start sequence.
    #[must_use]
    pub fn is_starting(&self) -> bool {
        self.active_state == ActiveState::Activating && self.sub_state == "start-pre"
    }
}

/// systemd active state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActiveState {
    /// Started and running.
    Active,
    /// Being started.
    Activating,
    /// Being stopped.
    Deactivating,
    /// Stopped.
    Inactive,
    /// Exited with an error.
    Failed,
    /// Reloading its configuration.
    Reloading,
    /// Not reported or not recognised.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ActiveState {
    /// Parse an active state as reported by systemd.
    #[must_use]
    pub fn from_systemd(state: &str) -> Self {
        match state {
            "active" => Self::Active,
            "activating" => Self::Activating,
            "deactivating" => Self::Deactivating,
            "inactive" => Self::Inactive,
            "failed" => Self::Failed,
            "reloading" => Self::Reloading,
            _ => Self::Unknown,
        }
    }

    /// The systemd spelling of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Activating => "activating",
            Self::Deactivating => "deactivating",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
            Self::Reloading => "reloading",
            Self::Unknown => "unknown",
        }
    }
}

/// Target state of a unit file in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Submitted but not placed on a machine.
    Inactive,
    /// Placed on a machine but not started.
    Loaded,
    /// Placed and started.
    Launched,
}

/// A unit file known to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFileInfo {
    /// Canonical unit name, without the `.service` suffix.
    pub name: String,
    /// State the scheduler is driving the unit towards.
    pub desired_state: Option<DesiredState>,
    /// State the scheduler last observed.
    pub current_state: Option<DesiredState>,
    /// Machine the unit is placed on, if any.
    pub machine_id: Option<String>,
}

/// A machine in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Machine identifier.
    pub id: String,
    /// Primary IP address.
    #[serde(default, rename = "primaryIP")]
    pub primary_ip: Option<String>,
    /// Machine metadata labels.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// One `Name=Value` line of a unit file, with its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOption {
    /// Section header, e.g. `Service`.
    pub section: String,
    /// Option name.
    pub name: String,
    /// Option value.
    pub value: String,
}

/// A unit template to submit: its canonical name and rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTemplate {
    /// Canonical template name, `{id}@`.
    pub name: String,
    /// Unit file text.
    pub content: String,
}

/// Configuration for the fleet client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Base URL of the fleet API, e.g. `http://127.0.0.1:49153`.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl FleetConfig {
    /// The request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:49153".to_string(),
            timeout_seconds: 30,
        }
    }
}
