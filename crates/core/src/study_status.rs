//! Study lifecycle state machine.
//!
//! ```text
//!  (client-side UPLOADED)
//!          |
//!        create
//!          v
//!       PENDING --------> IN_PROGRESS ------> COMPLETED
//!          ^                   |
//!          |                   +------------> FAILED
//!          |                                    |
//!          +------------ resubmit --------------+  (also from PENDING / COMPLETED)
//! ```
//!
//! `UPLOADED` only exists in the browser before a study row is created and
//! is never persisted, so it has no variant here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Persisted lifecycle status of a study.
///
/// Serialized as `PENDING`, `IN_PROGRESS`, `COMPLETED`, `FAILED` on every
/// wire format and in the `studies.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StudyStatus {
    pub const ALL: [StudyStatus; 4] = [
        StudyStatus::Pending,
        StudyStatus::InProgress,
        StudyStatus::Completed,
        StudyStatus::Failed,
    ];

    /// Status given to every newly created study.
    pub const INITIAL: StudyStatus = StudyStatus::Pending;

    pub fn as_str(self) -> &'static str {
        match self {
            StudyStatus::Pending => "PENDING",
            StudyStatus::InProgress => "IN_PROGRESS",
            StudyStatus::Completed => "COMPLETED",
            StudyStatus::Failed => "FAILED",
        }
    }

    /// A study may be resubmitted from any status except `IN_PROGRESS`.
    pub fn can_resubmit(self) -> bool {
        self != StudyStatus::InProgress
    }

    /// Check that a study in this status may be resubmitted.
    pub fn check_resubmit(self) -> Result<(), CoreError> {
        if self.can_resubmit() {
            Ok(())
        } else {
            Err(CoreError::Precondition(
                "Please wait until the study is completed".into(),
            ))
        }
    }
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StudyStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown study state: {s}")))
    }
}

/// How strictly worker-reported transitions are checked at ingest time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any recognised status may overwrite any other, including moving
    /// backwards.
    #[default]
    Permissive,
    /// Only the forward edges of the lifecycle graph, plus redelivery of
    /// the current status, are accepted.
    Forward,
}

impl TransitionPolicy {
    pub fn permits(self, from: StudyStatus, to: StudyStatus) -> bool {
        use StudyStatus::*;

        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Forward => {
                from == to
                    || matches!(
                        (from, to),
                        (Pending, InProgress) | (InProgress, Completed) | (InProgress, Failed)
                    )
            }
        }
    }

    /// Like [`permits`](Self::permits) but produces a `Conflict` error.
    pub fn check(self, from: StudyStatus, to: StudyStatus) -> Result<(), CoreError> {
        if self.permits(from, to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Study cannot move from {from} to {to}"
            )))
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "forward" => Ok(TransitionPolicy::Forward),
            other => Err(CoreError::Validation(format!(
                "Unknown transition policy: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for status in StudyStatus::ALL {
            assert_eq!(status.as_str().parse::<StudyStatus>().unwrap(), status);
        }
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&StudyStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");

        let parsed: StudyStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(parsed, StudyStatus::Completed);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert_matches!("UPLOADED".parse::<StudyStatus>(), Err(CoreError::Validation(_)));
        assert_matches!("pending".parse::<StudyStatus>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn resubmit_rejected_only_while_in_progress() {
        assert_matches!(
            StudyStatus::InProgress.check_resubmit(),
            Err(CoreError::Precondition(_))
        );
        assert!(StudyStatus::Pending.check_resubmit().is_ok());
        assert!(StudyStatus::Completed.check_resubmit().is_ok());
        assert!(StudyStatus::Failed.check_resubmit().is_ok());
    }

    #[test]
    fn permissive_policy_allows_regression() {
        let policy = TransitionPolicy::Permissive;
        assert!(policy.permits(StudyStatus::Completed, StudyStatus::Pending));
        assert!(policy.permits(StudyStatus::Pending, StudyStatus::Completed));
    }

    #[test]
    fn forward_policy_follows_graph() {
        use StudyStatus::*;
        let policy = TransitionPolicy::Forward;

        assert!(policy.permits(Pending, InProgress));
        assert!(policy.permits(InProgress, Completed));
        assert!(policy.permits(InProgress, Failed));
        assert!(policy.permits(InProgress, InProgress));

        assert!(!policy.permits(Pending, Completed));
        assert!(!policy.permits(Completed, InProgress));
        assert!(!policy.permits(Failed, Pending));
        assert_matches!(policy.check(Completed, Failed), Err(CoreError::Conflict(_)));
        assert!(policy.check(Pending, InProgress).is_ok());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!(
            "Forward".parse::<TransitionPolicy>().unwrap(),
            TransitionPolicy::Forward
        );
        assert_eq!(
            " permissive ".parse::<TransitionPolicy>().unwrap(),
            TransitionPolicy::Permissive
        );
        assert!("strictest".parse::<TransitionPolicy>().is_err());
    }
}
