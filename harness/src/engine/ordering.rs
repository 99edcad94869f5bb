//! Ordering Coordinator
//!
//! Enforces STRICT, PARTIAL and UNRECEIVED semantics across the mock
//! endpoints of one scenario run. Each ordering group owns a small state
//! machine (`PENDING -> IN_PROGRESS -> SATISFIED | VIOLATED`) behind its own
//! lock; matching happens before the lock is taken, so the lock only guards
//! the transition itself. Every transition bumps a watch counter that waiters
//! subscribe to.

use shared::{Address, Fault, ObservedCall};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::engine::matcher::Mismatch;
use crate::engine::verdict::{Cause, ExpectationRef, GroupReport, GroupState};
use crate::scenario::{MockExpectation, MockResponse, Ordering, Scenario};

/// What an endpoint should do with an observed call
#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
    /// The call satisfied `expectation`; answer with its canned response
    Respond {
        expectation: usize,
        response: MockResponse,
        delay: Option<Duration>,
    },
    /// The call violated its group; answer with a rejection
    Reject(Fault),
}

/// Progress of one endpoint address, as seen by the coordinator
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointProgress {
    pub ordering: Ordering,
    /// Every expectation at this address has received its calls
    pub satisfied: bool,
    /// The group containing this address is VIOLATED
    pub violated: bool,
    pub causes: Vec<Cause>,
}

#[derive(Debug)]
enum Progress {
    /// Expanded slot sequence (repeat `n` yields `n` consecutive slots) and the next slot
    Strict { slots: Vec<usize>, cursor: usize },
    /// Calls still owed per member, in declaration order
    Partial { remaining: Vec<(usize, u32)> },
    Unreceived,
}

#[derive(Debug)]
struct GroupMachine {
    state: GroupState,
    progress: Progress,
    calls: usize,
    causes: Vec<Cause>,
}

#[derive(Debug)]
struct Group {
    ordering: Ordering,
    addresses: Vec<Address>,
    machine: Mutex<GroupMachine>,
}

impl Group {
    fn lock(&self) -> MutexGuard<'_, GroupMachine> {
        self.machine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct OrderingCoordinator {
    scenario: String,
    expectations: Vec<MockExpectation>,
    groups: Vec<Group>,
    routes: HashMap<Address, usize>,
    changes: watch::Sender<u64>,
}

impl OrderingCoordinator {
    /// Build one group per ordering discipline present in the scenario
    pub fn new(scenario: &Scenario) -> Self {
        let expectations = scenario.expectations().to_vec();
        let mut groups: Vec<Group> = Vec::new();
        let mut by_ordering: HashMap<Ordering, usize> = HashMap::new();
        let mut routes: HashMap<Address, usize> = HashMap::new();

        for (index, expectation) in expectations.iter().enumerate() {
            let group_index = *by_ordering.entry(expectation.ordering).or_insert_with(|| {
                groups.push(Group {
                    ordering: expectation.ordering,
                    addresses: Vec::new(),
                    machine: Mutex::new(GroupMachine {
                        state: GroupState::Pending,
                        progress: match expectation.ordering {
                            Ordering::Strict => Progress::Strict {
                                slots: Vec::new(),
                                cursor: 0,
                            },
                            Ordering::Partial => Progress::Partial { remaining: Vec::new() },
                            Ordering::Unreceived => Progress::Unreceived,
                        },
                        calls: 0,
                        causes: Vec::new(),
                    }),
                });
                groups.len() - 1
            });

            let group = &mut groups[group_index];
            if !group.addresses.contains(&expectation.address) {
                group.addresses.push(expectation.address.clone());
            }
            routes.entry(expectation.address.clone()).or_insert(group_index);

            let machine = group.machine.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
            match &mut machine.progress {
                Progress::Strict { slots, .. } => {
                    slots.extend(std::iter::repeat_n(index, expectation.repeat as usize))
                }
                Progress::Partial { remaining } => remaining.push((index, expectation.repeat)),
                Progress::Unreceived => {}
            }
        }

        let (changes, _) = watch::channel(0);
        Self {
            scenario: scenario.name().to_string(),
            expectations,
            groups,
            routes,
            changes,
        }
    }

    /// Receiver bumped on every group transition
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn ordering_of(&self, address: &Address) -> Option<Ordering> {
        self.routes.get(address).map(|g| self.groups[*g].ordering)
    }

    fn reference(&self, index: usize) -> ExpectationRef {
        let expectation = &self.expectations[index];
        ExpectationRef {
            index,
            address: expectation.address.clone(),
            ordering: expectation.ordering,
        }
    }

    /// Apply an observed call to its group and decide the endpoint's answer
    pub fn observe(&self, call: &ObservedCall) -> Disposition {
        let Some(&group_index) = self.routes.get(&call.address) else {
            warn!("🚫 [{}] call at {} has no expectation", self.scenario, call.address);
            return Disposition::Reject(Fault::not_found(format!("nothing expected at {}", call.address)));
        };
        let group = &self.groups[group_index];

        // Match against every member at this address before locking
        let checks: HashMap<usize, Result<(), Mismatch>> = self
            .expectations
            .iter()
            .enumerate()
            .filter(|(_, e)| e.address == call.address)
            .map(|(index, e)| (index, e.matcher.check(&call.message)))
            .collect();

        let mut machine = group.lock();
        machine.calls += 1;

        if machine.state == GroupState::Violated {
            drop(machine);
            self.notify();
            return Disposition::Reject(self.rejection(group.ordering, "group already violated"));
        }

        let decision = match &mut machine.progress {
            Progress::Strict { slots, cursor } => self.advance_strict(call, slots, cursor, &checks),
            Progress::Partial { remaining } => self.advance_partial(call, remaining, &checks),
            Progress::Unreceived => {
                let first = checks.keys().min().copied().unwrap_or_default();
                Err(Cause::Forbidden {
                    expectation: self.reference(first),
                    call: call.id,
                })
            }
        };

        let disposition = match decision {
            Ok((index, complete)) => {
                machine.state = if complete {
                    GroupState::Satisfied
                } else {
                    GroupState::InProgress
                };
                let expectation = &self.expectations[index];
                debug!(
                    "✅ [{}] call {} satisfied {} (group {})",
                    self.scenario,
                    call.id,
                    self.reference(index),
                    machine.state
                );
                Disposition::Respond {
                    expectation: index,
                    response: expectation.response.clone(),
                    delay: expectation.delay,
                }
            }
            Err(cause) => {
                warn!("❌ [{}] {}", self.scenario, cause);
                machine.state = GroupState::Violated;
                let fault = self.rejection(group.ordering, &cause.to_string());
                machine.causes.push(cause);
                Disposition::Reject(fault)
            }
        };

        drop(machine);
        self.notify();
        disposition
    }

    fn advance_strict(
        &self,
        call: &ObservedCall,
        slots: &[usize],
        cursor: &mut usize,
        checks: &HashMap<usize, Result<(), Mismatch>>,
    ) -> Result<(usize, bool), Cause> {
        let Some(&due) = slots.get(*cursor) else {
            return Err(Cause::Unexpected {
                address: call.address.clone(),
                call: call.id,
                reason: format!("all {} expected call(s) already received", slots.len()),
            });
        };

        if matches!(checks.get(&due), Some(Ok(()))) {
            *cursor += 1;
            return Ok((due, *cursor == slots.len()));
        }

        // Arrived early: matches a later slot
        if let Some(&early) = slots[*cursor..]
            .iter()
            .find(|slot| matches!(checks.get(*slot), Some(Ok(()))))
        {
            return Err(Cause::OutOfOrder {
                expected: self.reference(due),
                received: self.reference(early),
                call: call.id,
            });
        }

        // Mismatch against the nearest slot at this address
        match slots[*cursor..].iter().find_map(|slot| match checks.get(slot) {
            Some(Err(mismatch)) => Some((*slot, mismatch)),
            _ => None,
        }) {
            // A later address was called while an earlier slot is still due
            Some((slot, _)) if self.expectations[due].address != call.address => Err(Cause::OutOfOrder {
                expected: self.reference(due),
                received: self.reference(slot),
                call: call.id,
            }),
            Some((slot, mismatch)) => Err(Cause::Mismatch {
                expectation: self.reference(slot),
                call: call.id,
                differences: mismatch.differences.clone(),
            }),
            None => Err(Cause::Unexpected {
                address: call.address.clone(),
                call: call.id,
                reason: "every expected call at this address was already received".to_string(),
            }),
        }
    }

    fn advance_partial(
        &self,
        call: &ObservedCall,
        remaining: &mut [(usize, u32)],
        checks: &HashMap<usize, Result<(), Mismatch>>,
    ) -> Result<(usize, bool), Cause> {
        if let Some(entry) = remaining
            .iter_mut()
            .find(|(index, left)| *left > 0 && matches!(checks.get(index), Some(Ok(()))))
        {
            entry.1 -= 1;
            let index = entry.0;
            let complete = remaining.iter().all(|(_, left)| *left == 0);
            return Ok((index, complete));
        }

        if let Some((index, _)) = remaining
            .iter()
            .find(|(index, _)| matches!(checks.get(index), Some(Ok(()))))
        {
            return Err(Cause::Unexpected {
                address: call.address.clone(),
                call: call.id,
                reason: format!("{} was already satisfied", self.reference(*index)),
            });
        }

        match remaining.iter().find_map(|(index, left)| match checks.get(index) {
            Some(Err(mismatch)) if *left > 0 => Some((*index, mismatch)),
            _ => None,
        }) {
            Some((index, mismatch)) => Err(Cause::Mismatch {
                expectation: self.reference(index),
                call: call.id,
                differences: mismatch.differences.clone(),
            }),
            None => Err(Cause::Unexpected {
                address: call.address.clone(),
                call: call.id,
                reason: "every expected call at this address was already received".to_string(),
            }),
        }
    }

    fn rejection(&self, ordering: Ordering, reason: &str) -> Fault {
        match ordering {
            Ordering::Unreceived => Fault::not_found(reason),
            Ordering::Strict | Ordering::Partial => Fault::rejected(reason),
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    /// True once any group is VIOLATED
    pub fn any_violated(&self) -> bool {
        self.groups.iter().any(|g| g.lock().state == GroupState::Violated)
    }

    /// True when every STRICT and PARTIAL group is SATISFIED
    pub fn required_met(&self) -> bool {
        self.groups
            .iter()
            .filter(|g| g.ordering != Ordering::Unreceived)
            .all(|g| g.lock().state == GroupState::Satisfied)
    }

    pub fn has_unreceived(&self) -> bool {
        self.groups.iter().any(|g| g.ordering == Ordering::Unreceived)
    }

    pub fn state_of(&self, ordering: Ordering) -> Option<GroupState> {
        self.groups.iter().find(|g| g.ordering == ordering).map(|g| g.lock().state)
    }

    /// Progress of the expectations declared at `address`
    pub fn endpoint_progress(&self, address: &Address) -> Option<EndpointProgress> {
        let group = &self.groups[*self.routes.get(address)?];
        let machine = group.lock();

        let satisfied = match &machine.progress {
            Progress::Strict { slots, cursor } => slots[*cursor..]
                .iter()
                .all(|slot| self.expectations[*slot].address != *address),
            Progress::Partial { remaining } => remaining
                .iter()
                .all(|(index, left)| *left == 0 || self.expectations[*index].address != *address),
            Progress::Unreceived => machine.calls == 0,
        };

        Some(EndpointProgress {
            ordering: group.ordering,
            satisfied,
            violated: machine.state == GroupState::Violated,
            causes: machine
                .causes
                .iter()
                .filter(|c| c.address() == Some(address))
                .cloned()
                .collect(),
        })
    }

    /// Finalise every group at the end of a run
    ///
    /// UNRECEIVED groups without calls become SATISFIED. When the run timed
    /// out, each expectation still owed calls is reported as unmet.
    pub fn close(&self, timed_out: bool) -> Vec<GroupReport> {
        let reports = self
            .groups
            .iter()
            .map(|group| {
                let mut machine = group.lock();

                let mut unmet: Vec<(usize, u32)> = Vec::new();
                match &machine.progress {
                    Progress::Strict { slots, cursor } => {
                        for slot in &slots[*cursor..] {
                            match unmet.iter_mut().find(|(index, _)| index == slot) {
                                Some(entry) => entry.1 += 1,
                                None => unmet.push((*slot, 1)),
                            }
                        }
                    }
                    Progress::Partial { remaining } => {
                        unmet.extend(remaining.iter().filter(|(_, left)| *left > 0).copied());
                    }
                    Progress::Unreceived => {}
                }

                if group.ordering == Ordering::Unreceived && machine.state != GroupState::Violated {
                    machine.state = GroupState::Satisfied;
                }

                if timed_out && !machine.state.is_terminal() {
                    for (index, remaining) in unmet {
                        machine.causes.push(Cause::Unmet {
                            expectation: self.reference(index),
                            remaining,
                        });
                    }
                }

                GroupReport {
                    ordering: group.ordering,
                    addresses: group.addresses.clone(),
                    state: machine.state,
                    calls: machine.calls,
                    causes: machine.causes.clone(),
                }
            })
            .collect();

        self.notify();
        reports
    }
}
