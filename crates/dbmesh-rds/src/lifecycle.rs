//! Topology lifecycle state machine.
//!
//! A topology is one cluster plus its member instances. The control plane is
//! authoritative, so these states are never stored; they describe where a
//! protocol leaves the topology and are reported on every
//! [`Applied`](crate::Applied) and [`Aborted`](crate::Aborted) outcome.
//!
//! # State Machine
//!
//! ```text
//!                 create                     restore
//!   ┌──────────┐ ───────▶ ┌──────────┐      ┌───────────┐ ◀─── Absent / Ready
//!   │  Absent  │          │ Creating │      │ Restoring │
//!   └──────────┘          └────┬─────┘      └─────┬─────┘
//!        ▲                     │  ok              │  ok
//!        │                     ▼                  ▼
//!        │               ┌──────────────────────────────┐
//!        │               │            Ready             │
//!        │               └──────────────┬───────────────┘
//!        │                              │ delete
//!        │   ok    ┌──────────┐         │
//!        └─────────│ Deleting │◀────────┘
//!                  └────┬─────┘
//!                       │ aborted (also from Creating / Restoring)
//!                       ▼
//!                  ┌──────────┐
//!                  │ Partial  │──▶ Creating / Restoring / Deleting
//!                  └──────────┘
//! ```
//!
//! `Partial` is a resting state: protocols never retry or roll back, so an
//! aborted protocol that already changed something leaves the topology there
//! until the caller re-invokes an operation.

use serde::{Deserialize, Serialize};

use crate::error::{RdsError, Result};

/// Where a topology stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyState {
    /// Neither the cluster nor any member exists.
    Absent,
    /// The cluster and its members are being created.
    Creating,
    /// A protocol aborted after changing the topology.
    Partial,
    /// The cluster and all requested members exist.
    Ready,
    /// Members and then the cluster are being deleted.
    Deleting,
    /// A cluster shell is being restored and members re-attached.
    Restoring,
}

impl std::fmt::Display for TopologyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Partial => "partial",
            Self::Ready => "ready",
            Self::Deleting => "deleting",
            Self::Restoring => "restoring",
        };
        f.write_str(s)
    }
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `RdsError::Validation` if the transition is not allowed.
pub fn validate_transition(from: TopologyState, to: TopologyState) -> Result<TopologyState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(RdsError::Validation(format!(
            "invalid topology transition from {from} to {to}"
        )))
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: TopologyState, to: TopologyState) -> bool {
    use TopologyState::{Absent, Creating, Deleting, Partial, Ready, Restoring};

    matches!(
        (from, to),
        (Absent | Partial, Creating | Restoring)
            | (Ready, Restoring | Deleting)
            | (Partial, Deleting)
            // a protocol that aborted before touching anything settles back
            | (Creating | Restoring, Ready | Partial | Absent)
            | (Deleting, Absent | Partial)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use TopologyState::*;

        assert!(is_valid_transition(Absent, Creating));
        assert!(is_valid_transition(Creating, Ready));
        assert!(is_valid_transition(Creating, Partial));
        assert!(is_valid_transition(Ready, Deleting));
        assert!(is_valid_transition(Deleting, Absent));
        assert!(is_valid_transition(Ready, Restoring));
        assert!(is_valid_transition(Restoring, Ready));
        assert!(is_valid_transition(Restoring, Partial));
        assert!(is_valid_transition(Partial, Deleting));
        assert!(is_valid_transition(Partial, Creating));
    }

    #[test]
    fn invalid_transitions() {
        use TopologyState::*;

        assert!(!is_valid_transition(Absent, Ready));
        assert!(!is_valid_transition(Absent, Deleting));
        assert!(!is_valid_transition(Ready, Creating));
        assert!(!is_valid_transition(Deleting, Ready));
        assert!(!is_valid_transition(Ready, Ready));
    }

    #[test]
    fn validate_transition_reports_states() {
        assert_eq!(
            validate_transition(TopologyState::Absent, TopologyState::Creating).unwrap(),
            TopologyState::Creating
        );
        let err = validate_transition(TopologyState::Deleting, TopologyState::Ready).unwrap_err();
        assert!(err.to_string().contains("deleting to ready"));
    }
}
