//! fleet scheduler implementation.
//!
//! This module provides the [`ClusterScheduler`] contract and [`FleetClient`],
//! which drives a fleet cluster through its v1 REST API.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::types::{
    ActiveState, DesiredState, FleetConfig, Machine, UnitFileInfo, UnitOption, UnitState,
    UnitTemplate,
};
use crate::unit;
use crate::{FleetError, Result};

/// The cluster scheduler contract.
///
/// Unit names are canonical (no `.service` suffix). Placement is entirely
/// up to the scheduler.
#[async_trait]
pub trait ClusterScheduler: Send + Sync {
    /// List units currently loaded on machines, with their runtime state.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    async fn list_units(&self) -> Result<Vec<UnitState>>;

    /// List every unit file known to the scheduler, templates included.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    async fn list_unit_files(&self) -> Result<Vec<UnitFileInfo>>;

    /// List the machines in the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    async fn list_machines(&self) -> Result<Vec<Machine>>;

    /// Register unit templates without scheduling them.
    ///
    /// # Errors
    ///
    /// Returns an error if a template is invalid or already registered with
    /// different content.
    async fn submit(&self, templates: &[UnitTemplate]) -> Result<()>;

    /// Place units on machines without starting them.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::UnitNotFound` if an instance's template is missing.
    async fn load(&self, units: &[String]) -> Result<()>;

    /// Place and start units.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::UnitNotFound` if an instance's template is missing.
    async fn start(&self, units: &[String]) -> Result<()>;

    /// Stop units, leaving them loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler rejects the request.
    async fn stop(&self, units: &[String]) -> Result<()>;

    /// Remove units or templates from the cluster. Missing units are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler rejects the request.
    async fn destroy(&self, units: &[String]) -> Result<()>;
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUnitState {
    name: String,
    #[serde(default, rename = "machineID")]
    machine_id: Option<String>,
    #[serde(default)]
    systemd_load_state: String,
    #[serde(default)]
    systemd_active_state: String,
    #[serde(default)]
    systemd_sub_state: String,
}

impl From<WireUnitState> for UnitState {
    fn from(state: WireUnitState) -> Self {
        Self {
            name: unit::from_wire(&state.name),
            machine_id: state.machine_id,
            load_state: state.systemd_load_state,
            active_state: ActiveState::from_systemd(&state.systemd_active_state),
            sub_state: state.systemd_sub_state,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUnit {
    name: String,
    #[serde(default)]
    options: Vec<UnitOption>,
    #[serde(default)]
    desired_state: Option<DesiredState>,
    #[serde(default)]
    current_state: Option<DesiredState>,
    #[serde(default, rename = "machineID")]
    machine_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnitRequest<'a> {
    desired_state: DesiredState,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a [UnitOption]>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    code: u16,
    message: String,
}

/// One page of a paginated fleet listing.
trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatePage {
    #[serde(default)]
    states: Vec<WireUnitState>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl Page for StatePage {
    type Item = WireUnitState;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.states, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitPage {
    #[serde(default)]
    units: Vec<WireUnit>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl Page for UnitPage {
    type Item = WireUnit;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.units, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachinePage {
    #[serde(default)]
    machines: Vec<Machine>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl Page for MachinePage {
    type Item = Machine;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.machines, self.next_page_token)
    }
}

// =============================================================================
// FleetClient
// =============================================================================

/// HTTP client for the fleet v1 API.
#[derive(Debug, Clone)]
pub struct FleetClient {
    client: reqwest::Client,
    base_url: String,
}

impl FleetClient {
    /// Create a new fleet client.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Config` if the HTTP client cannot be created.
    pub fn new(config: &FleetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FleetError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, config.endpoint.clone()))
    }

    /// Create a client with a pre-built reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL of the fleet API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/fleet/v1{path}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("fleet returned status {status}"));

        Err(FleetError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_all<P: Page>(&self, path: &str) -> Result<Vec<P::Item>> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self.client.get(self.url(path));
            if let Some(token) = &token {
                request = request.query(&[("nextPageToken", token.as_str())]);
            }

            let response = Self::check(request.send().await?).await?;
            let page: P = response.json().await?;
            let (mut batch, next) = page.into_parts();
            items.append(&mut batch);

            match next {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn put_unit(&self, name: &str, request: &UnitRequest<'_>) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("/units/{}", unit::to_wire(name))))
            .json(request)
            .send()
            .await?;

        match Self::check(response).await {
            Ok(_) => {
                debug!(unit = %name, desired_state = ?request.desired_state, "Updated unit");
                Ok(())
            }
            Err(e) => {
                error!(unit = %name, error = %e, "Failed to update unit");
                Err(e)
            }
        }
    }

    /// Drive units to a desired state, creating instances from their templates.
    async fn set_desired_state(&self, names: &[String], state: DesiredState) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        let known: HashMap<String, Vec<UnitOption>> = self
            .fetch_all::<UnitPage>("/units")
            .await?
            .into_iter()
            .map(|u| (unit::from_wire(&u.name), u.options))
            .collect();

        for name in names {
            let options = if known.contains_key(name) {
                None
            } else {
                let template = unit::template_of(name)
                    .ok_or_else(|| FleetError::UnitNotFound(name.clone()))?;
                let options = known
                    .get(&template)
                    .ok_or(FleetError::UnitNotFound(template))?;
                Some(options.as_slice())
            };

            self.put_unit(
                name,
                &UnitRequest {
                    desired_state: state,
                    options,
                },
            )
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl ClusterScheduler for FleetClient {
    async fn list_units(&self) -> Result<Vec<UnitState>> {
        let states = self.fetch_all::<StatePage>("/state").await?;
        Ok(states.into_iter().map(UnitState::from).collect())
    }

    async fn list_unit_files(&self) -> Result<Vec<UnitFileInfo>> {
        let units = self.fetch_all::<UnitPage>("/units").await?;
        Ok(units
            .into_iter()
            .map(|u| UnitFileInfo {
                name: unit::from_wire(&u.name),
                desired_state: u.desired_state,
                current_state: u.current_state,
                machine_id: u.machine_id,
            })
            .collect())
    }

    async fn list_machines(&self) -> Result<Vec<Machine>> {
        self.fetch_all::<MachinePage>("/machines").await
    }

    async fn submit(&self, templates: &[UnitTemplate]) -> Result<()> {
        for template in templates {
            let options = unit::parse_unit_file(&template.content)?;
            self.put_unit(
                &template.name,
                &UnitRequest {
                    desired_state: DesiredState::Inactive,
                    options: Some(&options),
                },
            )
            .await?;
        }

        info!(count = templates.len(), "Submitted unit templates");
        Ok(())
    }

    async fn load(&self, units: &[String]) -> Result<()> {
        self.set_desired_state(units, DesiredState::Loaded).await
    }

    async fn start(&self, units: &[String]) -> Result<()> {
        self.set_desired_state(units, DesiredState::Launched).await?;
        info!(count = units.len(), "Started units");
        Ok(())
    }

    async fn stop(&self, units: &[String]) -> Result<()> {
        self.set_desired_state(units, DesiredState::Loaded).await?;
        info!(count = units.len(), "Stopped units");
        Ok(())
    }

    async fn destroy(&self, units: &[String]) -> Result<()> {
        for name in units {
            let response = self
                .client
                .delete(self.url(&format!("/units/{}", unit::to_wire(name))))
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                debug!(unit = %name, "Unit already gone");
                continue;
            }
            Self::check(response).await?;
            debug!(unit = %name, "Destroyed unit");
        }

        info!(count = units.len(), "Destroyed units");
        Ok(())
    }
}

// =============================================================================
// Mock Scheduler (for testing)
// =============================================================================

/// In-memory scheduler for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// A scheduler command recorded by [`InMemoryScheduler`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SchedulerCall {
        /// Templates submitted.
        Submit(Vec<String>),
        /// Units loaded.
        Load(Vec<String>),
        /// Units started.
        Start(Vec<String>),
        /// Units stopped.
        Stop(Vec<String>),
        /// Units or templates destroyed.
        Destroy(Vec<String>),
    }

    #[derive(Debug, Clone)]
    struct MockUnit {
        desired: DesiredState,
        active: ActiveState,
        sub: String,
    }

    #[derive(Default)]
    struct MockState {
        templates: BTreeMap<String, String>,
        units: BTreeMap<String, MockUnit>,
        machines: Vec<Machine>,
        calls: Vec<SchedulerCall>,
        list_failures: u32,
        start_failure: Option<String>,
    }

    /// A deterministic in-memory fleet.
    ///
    /// Started units come up `active/running` immediately; tests flip unit
    /// states with [`set_unit_state`](Self::set_unit_state) to simulate
    /// crashes.
    #[derive(Default)]
    pub struct InMemoryScheduler {
        state: Mutex<MockState>,
    }

    impl InMemoryScheduler {
        /// Create a new in-memory scheduler.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Replace the machine list.
        pub fn set_machines(&self, machines: Vec<Machine>) {
            self.state.lock().machines = machines;
        }

        /// Force the runtime state of a unit, creating it if needed.
        pub fn set_unit_state(&self, name: &str, active: ActiveState, sub: &str) {
            let mut state = self.state.lock();
            let unit = state.units.entry(name.to_string()).or_insert(MockUnit {
                desired: DesiredState::Launched,
                active,
                sub: sub.to_string(),
            });
            unit.active = active;
            unit.sub = sub.to_string();
        }

        /// Mark a unit as crashed.
        pub fn fail_unit(&self, name: &str) {
            self.set_unit_state(name, ActiveState::Failed, "failed");
        }

        /// Make the next `n` calls to `list_units` fail with a transport error.
        pub fn fail_next_list_units(&self, n: u32) {
            self.state.lock().list_failures = n;
        }

        /// Make the next call to `start` fail with the given message.
        pub fn fail_next_start(&self, message: &str) {
            self.state.lock().start_failure = Some(message.to_string());
        }

        /// Every command issued so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<SchedulerCall> {
            self.state.lock().calls.clone()
        }

        /// Unit lists passed to `start`, in order.
        #[must_use]
        pub fn start_calls(&self) -> Vec<Vec<String>> {
            self.state
                .lock()
                .calls
                .iter()
                .filter_map(|c| match c {
                    SchedulerCall::Start(units) => Some(units.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Forget recorded commands.
        pub fn clear_calls(&self) {
            self.state.lock().calls.clear();
        }

        /// Names of registered templates.
        #[must_use]
        pub fn templates(&self) -> Vec<String> {
            self.state.lock().templates.keys().cloned().collect()
        }

        /// Content of a registered template.
        #[must_use]
        pub fn template_content(&self, name: &str) -> Option<String> {
            self.state.lock().templates.get(name).cloned()
        }

        /// Names of units (not templates) known to the scheduler.
        #[must_use]
        pub fn unit_names(&self) -> Vec<String> {
            self.state.lock().units.keys().cloned().collect()
        }

        fn check_known(state: &MockState, name: &str) -> Result<()> {
            if state.units.contains_key(name) {
                return Ok(());
            }
            let template =
                unit::template_of(name).ok_or_else(|| FleetError::UnitNotFound(name.to_string()))?;
            if state.templates.contains_key(&template) {
                Ok(())
            } else {
                Err(FleetError::UnitNotFound(template))
            }
        }

        fn drive(&self, names: &[String], desired: DesiredState, active: ActiveState, sub: &str) -> Result<()> {
            let mut state = self.state.lock();
            for name in names {
                Self::check_known(&state, name)?;
            }
            for name in names {
                state.units.insert(
                    name.clone(),
                    MockUnit {
                        desired,
                        active,
                        sub: sub.to_string(),
                    },
                );
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ClusterScheduler for InMemoryScheduler {
        async fn list_units(&self) -> Result<Vec<UnitState>> {
            let mut state = self.state.lock();
            if state.list_failures > 0 {
                state.list_failures -= 1;
                return Err(FleetError::Http("injected list failure".to_string()));
            }

            Ok(state
                .units
                .iter()
                .filter(|(_, u)| u.desired != DesiredState::Inactive)
                .map(|(name, u)| UnitState {
                    name: name.clone(),
                    machine_id: Some("mock-machine".to_string()),
                    load_state: "loaded".to_string(),
                    active_state: u.active,
                    sub_state: u.sub.clone(),
                })
                .collect())
        }

        async fn list_unit_files(&self) -> Result<Vec<UnitFileInfo>> {
            let state = self.state.lock();
            let templates = state.templates.keys().map(|name| UnitFileInfo {
                name: name.clone(),
                desired_state: Some(DesiredState::Inactive),
                current_state: Some(DesiredState::Inactive),
                machine_id: None,
            });
            let units = state.units.iter().map(|(name, u)| UnitFileInfo {
                name: name.clone(),
                desired_state: Some(u.desired),
                current_state: Some(u.desired),
                machine_id: Some("mock-machine".to_string()),
            });
            Ok(templates.chain(units).collect())
        }

        async fn list_machines(&self) -> Result<Vec<Machine>> {
            Ok(self.state.lock().machines.clone())
        }

        async fn submit(&self, templates: &[UnitTemplate]) -> Result<()> {
            let mut state = self.state.lock();
            for template in templates {
                unit::parse_unit_file(&template.content)?;
                if let Some(existing) = state.templates.get(&template.name) {
                    if *existing != template.content {
                        return Err(FleetError::Api {
                            status: 409,
                            message: format!(
                                "unit {} already exists with different options",
                                template.name
                            ),
                        });
                    }
                }
            }
            for template in templates {
                state
                    .templates
                    .insert(template.name.clone(), template.content.clone());
            }
            state.calls.push(SchedulerCall::Submit(
                templates.iter().map(|t| t.name.clone()).collect(),
            ));
            Ok(())
        }

        async fn load(&self, units: &[String]) -> Result<()> {
            self.drive(units, DesiredState::Loaded, ActiveState::Inactive, "dead")?;
            self.state.lock().calls.push(SchedulerCall::Load(units.to_vec()));
            Ok(())
        }

        async fn start(&self, units: &[String]) -> Result<()> {
            if let Some(message) = self.state.lock().start_failure.take() {
                return Err(FleetError::Api {
                    status: 500,
                    message,
                });
            }
            self.drive(units, DesiredState::Launched, ActiveState::Active, "running")?;
            self.state.lock().calls.push(SchedulerCall::Start(units.to_vec()));
            Ok(())
        }

        async fn stop(&self, units: &[String]) -> Result<()> {
            let mut state = self.state.lock();
            for name in units {
                if let Some(unit) = state.units.get_mut(name) {
                    unit.desired = DesiredState::Loaded;
                    unit.active = ActiveState::Inactive;
                    unit.sub = "dead".to_string();
                }
            }
            state.calls.push(SchedulerCall::Stop(units.to_vec()));
            Ok(())
        }

        async fn destroy(&self, units: &[String]) -> Result<()> {
            let mut state = self.state.lock();
            for name in units {
                if unit::is_template(name) {
                    state.templates.remove(name);
                } else {
                    state.units.remove(name);
                }
            }
            state.calls.push(SchedulerCall::Destroy(units.to_vec()));
            Ok(())
        }
    }
}
