//! Unit naming and cardinality.
//!
//! A deployment with `t` unit files and cardinality `c` schedules `t * c`
//! units named `{unitFileId}@{deploymentId}-{n}` for `n` in `0..c`. The
//! functions here compute that set and match live scheduler units back to a
//! deployment. None of them do I/O.

use std::collections::HashSet;

use admiral_core::{DeploymentId, UnitFileId};
use admiral_fleet::UnitState;
use admiral_store::{Deployment, Service};

/// Template unit name for a unit file: `{unitFileId}@`.
#[must_use]
pub fn template_name(unit_file: &UnitFileId) -> String {
    format!("{unit_file}@")
}

/// Scheduled unit name for one replica.
#[must_use]
pub fn unit_name(unit_file: &UnitFileId, deployment: &DeploymentId, replica: u32) -> String {
    format!("{unit_file}@{deployment}-{replica}")
}

/// Every unit the deployment should run, grouped by unit file in the given
/// order, replicas ascending within each group.
#[must_use]
pub fn desired_units(deployment: &Deployment, unit_file_ids: &[UnitFileId]) -> Vec<String> {
    unit_file_ids
        .iter()
        .flat_map(|unit_file| {
            (0..deployment.cardinality).map(move |n| unit_name(unit_file, &deployment.id, n))
        })
        .collect()
}

/// Returns true if `unit_name` ends in `@{deployment}-{integer}`.
#[must_use]
pub fn belongs_to_deployment(unit_name: &str, deployment: &DeploymentId) -> bool {
    let marker = format!("@{deployment}-");
    unit_name.rfind(&marker).is_some_and(|at| {
        let replica = &unit_name[at + marker.len()..];
        !replica.is_empty() && replica.bytes().all(|b| b.is_ascii_digit())
    })
}

/// The part of a unit name before the first `@`.
#[must_use]
pub fn template_prefix(unit_name: &str) -> &str {
    unit_name
        .split_once('@')
        .map_or(unit_name, |(prefix, _)| prefix)
}

/// Live units created from one of the service's unit files for this
/// deployment, whatever their runtime state.
#[must_use]
pub fn submitted_units(
    service: &Service,
    deployment: &Deployment,
    live: Vec<UnitState>,
) -> Vec<UnitState> {
    let unit_files: HashSet<String> = service
        .unit_files
        .iter()
        .map(|f| f.id.to_string())
        .collect();

    live.into_iter()
        .filter(|unit| {
            unit_files.contains(template_prefix(&unit.name))
                && belongs_to_deployment(&unit.name, &deployment.id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use admiral_core::{ApplicationId, ServiceId};
    use admiral_fleet::ActiveState;
    use admiral_store::{DeploymentState, ServiceState, UnitFile};
    use chrono::Utc;
    use proptest::prelude::*;

    fn deployment(cardinality: u32, units: u32) -> Deployment {
        let now = Utc::now();
        Deployment {
            id: DeploymentId::generate(),
            service: ServiceId::generate(),
            units,
            cardinality,
            state: DeploymentState::Initialized,
            date: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(unit_files: &[UnitFileId]) -> Service {
        let now = Utc::now();
        Service {
            id: ServiceId::generate(),
            application: ApplicationId::generate(),
            name: "web".to_string(),
            template: "fleetunits".to_string(),
            state: ServiceState::Idle,
            units: 2,
            unit_files: unit_files
                .iter()
                .map(|id| UnitFile {
                    id: *id,
                    content: "[Service]\n".to_string(),
                })
                .collect(),
            created_at: now,
            updated_at: now,
            changed_at: None,
        }
    }

    fn live(name: &str, active: ActiveState, sub: &str) -> UnitState {
        UnitState {
            name: name.to_string(),
            machine_id: Some("m1".to_string()),
            load_state: "loaded".to_string(),
            active_state: active,
            sub_state: sub.to_string(),
        }
    }

    #[test]
    fn desired_units_are_grouped_by_unit_file() {
        let d = deployment(2, 2);
        let a = UnitFileId::generate();
        let b = UnitFileId::generate();

        let units = desired_units(&d, &[a, b]);
        assert_eq!(
            units,
            vec![
                format!("{a}@{}-0", d.id),
                format!("{a}@{}-1", d.id),
                format!("{b}@{}-0", d.id),
                format!("{b}@{}-1", d.id),
            ]
        );
    }

    #[test]
    fn zero_cardinality_schedules_nothing() {
        let d = deployment(0, 1);
        assert!(desired_units(&d, &[UnitFileId::generate()]).is_empty());
    }

    #[test]
    fn belongs_requires_numeric_replica_suffix() {
        let d = DeploymentId::generate();
        let other = DeploymentId::generate();

        assert!(belongs_to_deployment(&format!("x@{d}-0"), &d));
        assert!(belongs_to_deployment(&format!("x@{d}-12"), &d));
        assert!(!belongs_to_deployment(&format!("x@{d}-"), &d));
        assert!(!belongs_to_deployment(&format!("x@{d}-1a"), &d));
        assert!(!belongs_to_deployment(&format!("x@{d}"), &d));
        assert!(!belongs_to_deployment(&format!("x@{other}-0"), &d));
        assert!(!belongs_to_deployment(&format!("{d}-0"), &d));
    }

    #[test]
    fn template_prefix_stops_at_first_at() {
        assert_eq!(template_prefix("abc@d-0"), "abc");
        assert_eq!(template_prefix("abc@"), "abc");
        assert_eq!(template_prefix("plain"), "plain");
    }

    #[test]
    fn submitted_units_match_service_and_deployment() {
        let mine = UnitFileId::generate();
        let foreign = UnitFileId::generate();
        let s = service(&[mine]);
        let d = deployment(2, 1);
        let other = deployment(2, 1);

        let units = vec![
            live(&unit_name(&mine, &d.id, 0), ActiveState::Active, "running"),
            live(&unit_name(&mine, &d.id, 1), ActiveState::Failed, "failed"),
            live(&unit_name(&foreign, &d.id, 0), ActiveState::Active, "running"),
            live(&unit_name(&mine, &other.id, 0), ActiveState::Active, "running"),
            live(&template_name(&mine), ActiveState::Inactive, "dead"),
        ];

        let submitted = submitted_units(&s, &d, units);
        let names: Vec<&str> = submitted.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                unit_name(&mine, &d.id, 0).as_str(),
                unit_name(&mine, &d.id, 1).as_str()
            ]
        );
    }

    proptest! {
        #[test]
        fn desired_units_has_exactly_t_times_c_unique_names(cardinality in 0u32..12, templates in 0usize..6) {
            let d = deployment(cardinality, u32::try_from(templates).unwrap());
            let ids: Vec<UnitFileId> = (0..templates).map(|_| UnitFileId::generate()).collect();

            let units = desired_units(&d, &ids);
            prop_assert_eq!(units.len(), templates * cardinality as usize);

            let unique: HashSet<&String> = units.iter().collect();
            prop_assert_eq!(unique.len(), units.len());

            for unit in &units {
                prop_assert!(belongs_to_deployment(unit, &d.id));
                let prefix = template_prefix(unit);
                prop_assert!(ids.iter().any(|id| id.to_string() == prefix));
                let replica: u32 = unit.rsplit('-').next().unwrap().parse().unwrap();
                prop_assert!(replica < cardinality);
            }
        }
    }
}
