//! Service templates: how a service's unit files are produced.
//!
//! Templates form a closed set. A caller names one by string and
//! [`ServiceTemplate::from_name`] maps it onto a variant; unknown names are
//! rejected during service validation.

use admiral_core::{ServiceId, UnitFileId};
use admiral_fleet::{unit, FleetError};
use admiral_store::{Service, UnitFile};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ControlError, Result};
use crate::services::ServiceRegistry;
use crate::types::ServiceParams;
use crate::validation::ValidationErrors;

/// Bounds on the number of unit files a `fleetunits` service carries.
pub const MIN_UNIT_FILES: usize = 1;
/// See [`MIN_UNIT_FILES`].
pub const MAX_UNIT_FILES: usize = 10;

/// A known service template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTemplate {
    /// Raw fleet unit files supplied by the caller.
    FleetUnits,
}

impl ServiceTemplate {
    /// Look up a template by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fleetunits" => Some(Self::FleetUnits),
            _ => None,
        }
    }

    /// The canonical name stored on services.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FleetUnits => "fleetunits",
        }
    }

    /// Produce the service's unit files from template parameters and save
    /// them on the service.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the parameters are invalid,
    /// `ControlError::NotFound` if the service does not exist, or a store
    /// error.
    pub async fn apply(
        self,
        services: &ServiceRegistry,
        id: &ServiceId,
        params: TemplateParams,
    ) -> Result<Service> {
        match self {
            Self::FleetUnits => fleet_units(services, id, params).await,
        }
    }
}

/// Parameters accepted by the templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParams {
    /// Unit file text, one entry per unit file.
    #[serde(default)]
    pub unit_files: Vec<String>,
    /// Register the service's first unit with the router.
    #[serde(default)]
    pub router: Option<RouterParams>,
}

/// Router registration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterParams {
    /// Ports the first unit listens on; one registration unit each.
    #[serde(default)]
    pub ports: Vec<u16>,
}

fn validate(params: &TemplateParams) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.item_count("unitFiles", params.unit_files.len(), MIN_UNIT_FILES, MAX_UNIT_FILES);

    for (index, content) in params.unit_files.iter().enumerate() {
        if let Err(e) = unit::parse_unit_file(content) {
            let message = match e {
                FleetError::InvalidUnit(message) => message,
                other => other.to_string(),
            };
            errors.add("unitFiles", format!("Unit file {} is invalid: {message}", index + 1));
        }
    }

    if let Some(router) = &params.router {
        if router.ports.contains(&0) {
            errors.add("router", "Router ports must be between 1 and 65535");
        }
    }

    errors.into_result()
}

async fn fleet_units(
    services: &ServiceRegistry,
    id: &ServiceId,
    params: TemplateParams,
) -> Result<Service> {
    validate(&params)?;

    let mut service = services
        .get(id)
        .await?
        .ok_or_else(|| ControlError::not_found("service", id))?;

    service.unit_files = params
        .unit_files
        .into_iter()
        .map(|content| UnitFile {
            id: UnitFileId::generate(),
            content,
        })
        .collect();

    let ports = params.router.map(|r| r.ports).unwrap_or_default();
    if let Some(parent) = service.unit_files.first().map(|f| f.id) {
        for port in &ports {
            service.unit_files.push(UnitFile {
                id: UnitFileId::generate(),
                content: router_register_unit(&service.id, &parent, *port),
            });
        }
    }

    let service = services.set(ServiceParams::from(service)).await?;
    info!(
        service_id = %service.id,
        unit_files = service.unit_files.len(),
        router_ports = ports.len(),
        "Applied fleetunits template"
    );
    Ok(service)
}

/// A unit that follows each instance of `parent` onto its machine and keeps
/// a vulcand backend server entry for it alive.
fn router_register_unit(service: &ServiceId, parent: &UnitFileId, port: u16) -> String {
    let parent = unit::to_wire(&format!("{parent}@%i"));
    let key = format!("/vulcand/backends/{service}/servers/%i");

    format!(
        "[Unit]\n\
         Description=Router registration for {service} on port {port}\n\
         BindsTo={parent}\n\
         After={parent}\n\
         \n\
         [Service]\n\
         EnvironmentFile=/etc/environment\n\
         ExecStart=/bin/sh -c \"while true; do etcdctl set {key} '{{\\\"URL\\\": \\\"http://${{COREOS_PRIVATE_IPV4}}:{port}\\\"}}' --ttl 60; sleep 45; done\"\n\
         ExecStop=/usr/bin/etcdctl rm {key}\n\
         \n\
         [X-Fleet]\n\
         MachineOf={parent}\n"
    )
}
