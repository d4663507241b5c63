//! Deployment and service state machines.
//!
//! # Deployment
//!
//! ```text
//!  uninitialized ──submit──▶ initialized ──start──▶ starting
//!                                 ▲                    │
//!                                 │                    ▼
//!                               stop ◀──────── running / partially running
//!                                 │
//!                        (some units failed) ──▶ partially running
//!
//!  any non-terminal ──terminate──▶ terminating ──▶ terminated (final)
//! ```
//!
//! # Service
//!
//! ```text
//!  idle ─▶ starting ─▶ running / partially running ─▶ stopping ─▶ stopped
//!       ─▶ unloading ─▶ initialized ─▶ terminating ─▶ terminated (final)
//! ```

use admiral_core::{DeploymentId, ServiceId};
use admiral_store::{DeploymentState, ServiceState};

use crate::error::{ControlError, Result};

/// An operation on a deployment that is guarded by its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentAction {
    /// Register templates with the scheduler.
    Submit,
    /// Schedule units.
    Start,
    /// Stop running units.
    Stop,
    /// Destroy every unit.
    Terminate,
}

impl DeploymentAction {
    /// Verb used in conflict messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "be submitted",
            Self::Start => "be started",
            Self::Stop => "be stopped",
            Self::Terminate => "be terminated",
        }
    }

    /// Check if the action is allowed from a persisted state.
    #[must_use]
    pub const fn allowed_from(self, state: DeploymentState) -> bool {
        use DeploymentState::{Terminated, Terminating, Uninitialized};

        match self {
            Self::Submit => !matches!(state, Terminated | Terminating),
            Self::Start | Self::Stop => !matches!(state, Terminated | Terminating | Uninitialized),
            Self::Terminate => !matches!(state, Terminated),
        }
    }
}

/// Fail with a conflict unless `action` is allowed from `state`.
///
/// # Errors
///
/// Returns `ControlError::Conflict` naming the deployment and its state.
pub fn guard_deployment(
    id: &DeploymentId,
    state: DeploymentState,
    action: DeploymentAction,
) -> Result<()> {
    if action.allowed_from(state) {
        Ok(())
    } else {
        Err(ControlError::conflict(format!(
            "Deployment {id} cannot {} while {state}.",
            action.as_str()
        )))
    }
}

/// Returns true if the deployment is kept only as history.
#[must_use]
pub const fn is_terminal(state: DeploymentState) -> bool {
    matches!(state, DeploymentState::Terminated)
}

/// What a service start does with its latest deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// Create a fresh deployment.
    CreateDeployment,
    /// Start the latest deployment again.
    Reuse,
}

/// Decide how to start a service given its latest deployment's reconciled
/// state (`None` when it has never been deployed).
///
/// # Errors
///
/// Returns `ControlError::Conflict` if the deployment is running, partially
/// running without `start_partial`, or mid-transition.
pub fn decide_start(latest: Option<DeploymentState>, start_partial: bool) -> Result<StartDecision> {
    match latest {
        None | Some(DeploymentState::Terminated) => Ok(StartDecision::CreateDeployment),
        Some(DeploymentState::Running) => Err(ControlError::conflict(
            "A deployment for this service is already running and cannot be started again.",
        )),
        Some(DeploymentState::PartiallyRunning) if start_partial => Ok(StartDecision::Reuse),
        Some(DeploymentState::PartiallyRunning) => Err(ControlError::conflict(
            "The service is only partially running and cannot be started directly.",
        )),
        Some(DeploymentState::Initialized | DeploymentState::Uninitialized) => {
            Ok(StartDecision::Reuse)
        }
        Some(state) => Err(ControlError::conflict(format!(
            "This service cannot be started: currently in the {state} state."
        ))),
    }
}

/// Fail with a conflict if the service can never change state again.
///
/// # Errors
///
/// Returns `ControlError::Conflict` for a terminated service.
pub fn guard_service(id: &ServiceId, state: ServiceState) -> Result<()> {
    if state == ServiceState::Terminated {
        Err(ControlError::conflict(format!(
            "Service {id} has been terminated; create a new service to run it again."
        )))
    } else {
        Ok(())
    }
}

/// The service state that mirrors a deployment state.
#[must_use]
pub const fn service_state_for(state: DeploymentState) -> ServiceState {
    match state {
        DeploymentState::Uninitialized => ServiceState::Idle,
        DeploymentState::Initialized => ServiceState::Initialized,
        DeploymentState::Starting => ServiceState::Starting,
        DeploymentState::Running => ServiceState::Running,
        DeploymentState::PartiallyRunning => ServiceState::PartiallyRunning,
        DeploymentState::Stopping => ServiceState::Stopping,
        DeploymentState::Terminating => ServiceState::Terminating,
        DeploymentState::Terminated => ServiceState::Terminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_refuses_everything() {
        use DeploymentAction::*;

        for action in [Submit, Start, Stop, Terminate] {
            assert!(!action.allowed_from(DeploymentState::Terminated));
        }
    }

    #[test]
    fn terminating_only_allows_terminate() {
        use DeploymentAction::*;

        assert!(!Submit.allowed_from(DeploymentState::Terminating));
        assert!(!Start.allowed_from(DeploymentState::Terminating));
        assert!(!Stop.allowed_from(DeploymentState::Terminating));
        assert!(Terminate.allowed_from(DeploymentState::Terminating));
    }

    #[test]
    fn uninitialized_only_allows_submit_and_terminate() {
        assert!(!DeploymentAction::Start.allowed_from(DeploymentState::Uninitialized));
        assert!(!DeploymentAction::Stop.allowed_from(DeploymentState::Uninitialized));
        assert!(DeploymentAction::Terminate.allowed_from(DeploymentState::Uninitialized));
        assert!(DeploymentAction::Stop.allowed_from(DeploymentState::Initialized));
        assert!(DeploymentAction::Submit.allowed_from(DeploymentState::Uninitialized));
        assert!(DeploymentAction::Start.allowed_from(DeploymentState::Initialized));
        assert!(DeploymentAction::Start.allowed_from(DeploymentState::PartiallyRunning));
    }

    #[test]
    fn guard_reports_conflict() {
        let id = DeploymentId::generate();
        let result = guard_deployment(&id, DeploymentState::Terminated, DeploymentAction::Start);
        match result {
            Err(ControlError::Conflict(message)) => {
                assert!(message.contains("cannot be started while terminated"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(guard_deployment(&id, DeploymentState::Running, DeploymentAction::Stop).is_ok());
    }

    #[test]
    fn start_decisions() {
        assert_eq!(
            decide_start(None, false).unwrap(),
            StartDecision::CreateDeployment
        );
        assert_eq!(
            decide_start(Some(DeploymentState::Terminated), false).unwrap(),
            StartDecision::CreateDeployment
        );
        assert_eq!(
            decide_start(Some(DeploymentState::Initialized), false).unwrap(),
            StartDecision::Reuse
        );
        assert_eq!(
            decide_start(Some(DeploymentState::PartiallyRunning), true).unwrap(),
            StartDecision::Reuse
        );
        assert!(matches!(
            decide_start(Some(DeploymentState::PartiallyRunning), false),
            Err(ControlError::Conflict(_))
        ));
        assert!(matches!(
            decide_start(Some(DeploymentState::Running), true),
            Err(ControlError::Conflict(_))
        ));
        assert!(matches!(
            decide_start(Some(DeploymentState::Stopping), true),
            Err(ControlError::Conflict(_))
        ));
    }

    #[test]
    fn service_guard() {
        let id = ServiceId::generate();
        assert!(guard_service(&id, ServiceState::Stopped).is_ok());
        assert!(matches!(
            guard_service(&id, ServiceState::Terminated),
            Err(ControlError::Conflict(_))
        ));
    }

    #[test]
    fn mirrored_states() {
        assert_eq!(
            service_state_for(DeploymentState::PartiallyRunning),
            ServiceState::PartiallyRunning
        );
        assert_eq!(
            service_state_for(DeploymentState::Uninitialized),
            ServiceState::Idle
        );
    }

    #[test]
    fn terminal() {
        assert!(is_terminal(DeploymentState::Terminated));
        assert!(!is_terminal(DeploymentState::Terminating));
    }
}
