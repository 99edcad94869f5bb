//! Verdicts and failure causes
//!
//! A [`Verdict`] is produced fresh by every run and composed by a pure
//! reducer ([`Verdict::compose`]) from the reply evaluation and the final
//! group reports.

use serde::{Deserialize, Serialize};
use shared::{Address, Fault, ObservedCall, Reply};
use std::fmt;
use uuid::Uuid;

use crate::scenario::Ordering;

/// Identifies one declared mock expectation in diagnostics
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationRef {
    /// Zero-based declaration index within the scenario
    pub index: usize,
    pub address: Address,
    pub ordering: Ordering,
}

impl fmt::Display for ExpectationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expectation #{} ({}) at {}", self.index + 1, self.ordering, self.address)
    }
}

/// Error taxonomy a cause belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseKind {
    MatchMismatch,
    OrderingViolation,
    TimeoutExceeded,
    TransportError,
}

impl fmt::Display for CauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CauseKind::MatchMismatch => write!(f, "MatchMismatch"),
            CauseKind::OrderingViolation => write!(f, "OrderingViolation"),
            CauseKind::TimeoutExceeded => write!(f, "TimeoutExceeded"),
            CauseKind::TransportError => write!(f, "TransportError"),
        }
    }
}

/// Why a scenario failed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum Cause {
    /// A call reached the expectation it was due for, with the wrong content
    Mismatch {
        expectation: ExpectationRef,
        call: Uuid,
        differences: Vec<String>,
    },
    /// A call matched a STRICT expectation whose predecessors were not yet satisfied
    OutOfOrder {
        expected: ExpectationRef,
        received: ExpectationRef,
        call: Uuid,
    },
    /// A call nothing was waiting for (group already complete)
    Unexpected { address: Address, call: Uuid, reason: String },
    /// A call arrived at an UNRECEIVED endpoint
    Forbidden { expectation: ExpectationRef, call: Uuid },
    /// An expectation still waiting for calls when the run timed out
    Unmet { expectation: ExpectationRef, remaining: u32 },
    /// The synchronous reply did not match the expected success or fault
    ReplyMismatch { differences: Vec<String> },
    /// A fault came back where a success reply was expected
    UnexpectedFault { fault: Fault },
    /// A success reply came back where a fault was expected
    MissingFault { body: String },
    /// No synchronous reply arrived in time
    ReplyTimeout { waited_ms: u64 },
    /// The routing collaborator could not deliver or bind
    Transport { address: Address, message: String },
}

impl Cause {
    pub fn kind(&self) -> CauseKind {
        match self {
            Cause::Mismatch { .. }
            | Cause::ReplyMismatch { .. }
            | Cause::UnexpectedFault { .. }
            | Cause::MissingFault { .. } => CauseKind::MatchMismatch,
            Cause::OutOfOrder { .. } | Cause::Unexpected { .. } | Cause::Forbidden { .. } => {
                CauseKind::OrderingViolation
            }
            Cause::Unmet { .. } | Cause::ReplyTimeout { .. } => CauseKind::TimeoutExceeded,
            Cause::Transport { .. } => CauseKind::TransportError,
        }
    }

    /// Address the cause concerns, when it concerns a mock endpoint
    pub fn address(&self) -> Option<&Address> {
        match self {
            Cause::Mismatch { expectation, .. }
            | Cause::Forbidden { expectation, .. }
            | Cause::Unmet { expectation, .. } => Some(&expectation.address),
            Cause::OutOfOrder { received, .. } => Some(&received.address),
            Cause::Unexpected { address, .. } => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Mismatch {
                expectation,
                differences,
                ..
            } => write!(f, "{expectation}: content mismatch: {}", differences.join("; ")),
            Cause::OutOfOrder { expected, received, .. } => {
                write!(f, "{received}: received out of order, {expected} was still pending")
            }
            Cause::Unexpected { address, reason, .. } => write!(f, "unexpected call at {address}: {reason}"),
            Cause::Forbidden { expectation, .. } => write!(f, "{expectation}: called but must never be called"),
            Cause::Unmet { expectation, remaining } => {
                write!(f, "{expectation}: still waiting for {remaining} call(s)")
            }
            Cause::ReplyMismatch { differences } => write!(f, "reply mismatch: {}", differences.join("; ")),
            Cause::UnexpectedFault { fault } => write!(f, "expected a success reply, got {fault}"),
            Cause::MissingFault { body } => write!(f, "expected an exception, got success reply {body:?}"),
            Cause::ReplyTimeout { waited_ms } => write!(f, "no reply within {waited_ms}ms"),
            Cause::Transport { address, message } => write!(f, "transport failure at {address}: {message}"),
        }
    }
}

/// Lifecycle of an ordering group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupState {
    Pending,
    InProgress,
    Satisfied,
    Violated,
}

impl GroupState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GroupState::Satisfied | GroupState::Violated)
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GroupState::Pending => "PENDING",
            GroupState::InProgress => "IN_PROGRESS",
            GroupState::Satisfied => "SATISFIED",
            GroupState::Violated => "VIOLATED",
        };
        write!(f, "{label}")
    }
}

/// Final state of one ordering group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub ordering: Ordering,
    pub addresses: Vec<Address>,
    pub state: GroupState,
    /// Calls routed to this group
    pub calls: usize,
    pub causes: Vec<Cause>,
}

/// Terminal state of a scenario run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Passed,
    Failed,
    TimedOut,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "PASSED"),
            Outcome::Failed => write!(f, "FAILED"),
            Outcome::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub scenario: String,
    pub outcome: Outcome,
    /// Every cause, group causes first in group order, then run-level causes
    pub causes: Vec<Cause>,
    pub groups: Vec<GroupReport>,
    /// Reply received by a synchronous scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Reply>,
    /// All calls observed by the scenario's endpoints, in arrival order
    pub observed: Vec<ObservedCall>,
    pub elapsed_ms: u64,
}

impl Verdict {
    /// Reduce run results into a verdict
    ///
    /// TIMED_OUT when any cause is a timeout, FAILED when any other cause
    /// exists or a group did not reach SATISFIED, PASSED otherwise.
    pub fn compose(
        scenario: &str,
        run_causes: Vec<Cause>,
        groups: Vec<GroupReport>,
        reply: Option<Reply>,
        observed: Vec<ObservedCall>,
        elapsed_ms: u64,
    ) -> Self {
        let causes: Vec<Cause> = groups
            .iter()
            .flat_map(|group| group.causes.iter().cloned())
            .chain(run_causes)
            .collect();

        let outcome = if causes.iter().any(|c| c.kind() == CauseKind::TimeoutExceeded) {
            Outcome::TimedOut
        } else if !causes.is_empty() || groups.iter().any(|g| g.state != GroupState::Satisfied) {
            Outcome::Failed
        } else {
            Outcome::Passed
        };

        Self {
            scenario: scenario.to_string(),
            outcome,
            causes,
            groups,
            reply,
            observed,
            elapsed_ms,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// True when some cause has the given kind
    pub fn has_cause(&self, kind: CauseKind) -> bool {
        self.causes.iter().any(|c| c.kind() == kind)
    }

    /// One-line description of the failure, empty for passing verdicts
    pub fn cause_summary(&self) -> String {
        self.causes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(index: usize, ordering: Ordering) -> ExpectationRef {
        ExpectationRef {
            index,
            address: Address::parse("mem:targetWS").unwrap(),
            ordering,
        }
    }

    fn group(state: GroupState, causes: Vec<Cause>) -> GroupReport {
        GroupReport {
            ordering: Ordering::Strict,
            addresses: vec![Address::parse("mem:targetWS").unwrap()],
            state,
            calls: 0,
            causes,
        }
    }

    #[test]
    fn test_compose_passes_when_everything_is_satisfied() {
        let verdict = Verdict::compose("ok", vec![], vec![group(GroupState::Satisfied, vec![])], None, vec![], 3);
        assert_eq!(verdict.outcome, Outcome::Passed);
        assert!(verdict.passed());
        assert_eq!(verdict.cause_summary(), "");
    }

    #[test]
    fn test_compose_timeout_wins_over_other_causes() {
        let unmet = Cause::Unmet {
            expectation: reference(0, Ordering::Partial),
            remaining: 1,
        };
        let verdict = Verdict::compose(
            "slow",
            vec![Cause::ReplyMismatch {
                differences: vec!["$.response: expected \"PONG\", got \"PANG\"".to_string()],
            }],
            vec![group(GroupState::InProgress, vec![unmet])],
            None,
            vec![],
            10,
        );
        assert_eq!(verdict.outcome, Outcome::TimedOut);
        assert_eq!(verdict.causes.len(), 2);
        assert_eq!(verdict.causes[0].kind(), CauseKind::TimeoutExceeded);
    }

    #[test]
    fn test_compose_fails_on_unsatisfied_group_without_causes() {
        let verdict = Verdict::compose("stopped", vec![], vec![group(GroupState::Pending, vec![])], None, vec![], 1);
        assert_eq!(verdict.outcome, Outcome::Failed);
    }

    #[test]
    fn test_cause_kinds_and_display() {
        let forbidden = Cause::Forbidden {
            expectation: reference(1, Ordering::Unreceived),
            call: Uuid::new_v4(),
        };
        assert_eq!(forbidden.kind(), CauseKind::OrderingViolation);
        assert_eq!(
            forbidden.to_string(),
            "expectation #2 (UNRECEIVED) at mem:targetWS: called but must never be called"
        );

        let transport = Cause::Transport {
            address: Address::parse("mem:pingService").unwrap(),
            message: "nothing bound".to_string(),
        };
        assert_eq!(transport.kind(), CauseKind::TransportError);
        assert!(transport.address().is_none());
    }

    #[test]
    fn test_causes_serialize_with_tag() {
        let cause = Cause::ReplyTimeout { waited_ms: 250 };
        let json = serde_json::to_value(&cause).unwrap();
        assert_eq!(json["cause"], "reply_timeout");
        assert_eq!(json["waited_ms"], 250);
    }
}
