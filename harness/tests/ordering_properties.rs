//! Ordering group properties checked over every arrival order

use harness::engine::{Disposition, OrderingCoordinator};
use harness::{GroupState, MockExpectation, Ordering, Scenario};
use shared::{Address, Message, ObservedCall, Payload};

const MEMBERS: [&str; 3] = ["mem:a", "mem:b", "mem:c"];

fn permutations() -> Vec<Vec<&'static str>> {
    let mut out = Vec::new();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                if i != j && j != k && i != k {
                    out.push(vec![MEMBERS[i], MEMBERS[j], MEMBERS[k]]);
                }
            }
        }
    }
    out
}

fn group_scenario(ordering: Ordering) -> Scenario {
    MEMBERS
        .iter()
        .fold(Scenario::sync("mem:proxy", "group"), |builder, address| {
            builder.add_expectation(MockExpectation::sync(*address).ordering(ordering))
        })
        .build()
        .unwrap()
}

fn call(address: &str) -> ObservedCall {
    ObservedCall::capture(
        Address::parse(address).unwrap(),
        Message::new(Payload::json(r#"{"request":"PING"}"#)),
        true,
    )
}

fn replay(scenario: &Scenario, order: &[&str]) -> GroupState {
    let coordinator = OrderingCoordinator::new(scenario);
    for address in order {
        coordinator.observe(&call(address));
    }
    coordinator.close(false)[0].state
}

#[test]
fn test_strict_group_is_satisfied_only_in_declared_order() {
    let scenario = group_scenario(Ordering::Strict);
    let orders = permutations();
    assert_eq!(orders.len(), 6);

    for order in orders {
        let state = replay(&scenario, &order);
        if order == MEMBERS {
            assert_eq!(state, GroupState::Satisfied, "declared order {order:?}");
        } else {
            assert_eq!(state, GroupState::Violated, "order {order:?}");
        }
    }
}

#[test]
fn test_partial_group_is_satisfied_in_every_order() {
    let scenario = group_scenario(Ordering::Partial);
    for order in permutations() {
        assert_eq!(replay(&scenario, &order), GroupState::Satisfied, "order {order:?}");
    }
}

#[test]
fn test_partial_group_stays_in_progress_until_complete() {
    let scenario = group_scenario(Ordering::Partial);
    for order in permutations() {
        assert_eq!(replay(&scenario, &order[..2]), GroupState::InProgress, "prefix {order:?}");
    }
}

#[test]
fn test_unreceived_group_is_satisfied_only_without_calls() {
    let scenario = Scenario::sync("mem:proxy", "forbidden")
        .add_expectation(MockExpectation::unreceived("mem:a"))
        .build()
        .unwrap();

    assert_eq!(replay(&scenario, &[]), GroupState::Satisfied);
    assert_eq!(replay(&scenario, &["mem:a"]), GroupState::Violated);
}

#[test]
fn test_violation_is_final() {
    let scenario = group_scenario(Ordering::Strict);
    let coordinator = OrderingCoordinator::new(&scenario);

    coordinator.observe(&call("mem:b"));
    assert_eq!(coordinator.state_of(Ordering::Strict), Some(GroupState::Violated));

    // The declared sequence no longer rescues the group
    for address in MEMBERS {
        assert!(matches!(coordinator.observe(&call(address)), Disposition::Reject(_)));
    }
    assert_eq!(coordinator.close(false)[0].state, GroupState::Violated);
}
