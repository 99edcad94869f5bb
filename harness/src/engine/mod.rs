//! Engine: canonical forms, matching, ordering and verdicts

pub mod canonical;
pub mod matcher;
pub mod ordering;
pub mod verdict;

pub use canonical::{Canonical, to_canonical_form};
pub use matcher::{BodyMatcher, MessageMatcher, Mismatch, Predicate};
pub use ordering::{Disposition, EndpointProgress, OrderingCoordinator};
pub use verdict::{Cause, CauseKind, ExpectationRef, GroupReport, GroupState, Outcome, Verdict};
