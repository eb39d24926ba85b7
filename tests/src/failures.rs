// ============ LaunchKit Failure Tests ============
// Collaborator faults injected at each step of a launch.
//
// The launch is not transactional: whatever was confirmed before a fault
// stays confirmed. These tests pin down where the run stops, which state it
// ends in, and what the report says was done.

use launchkit_math::MathError;
use launchkit_sdk::config::{LaunchConfig, RecipientFailurePolicy};
use launchkit_sdk::error::{ConfigError, ProvisioningError};
use launchkit_sdk::orchestrator::{Orchestrator, ProvisioningState};
use launchkit_sdk::simulated::SimulatedCluster;
use launchkit_sdk::TransportError;
use launchkit_types::{AllocationSpec, Distribution, StepKind};
use rust_decimal::Decimal;

use crate::integration::{creator, sample_config, sample_plan};

const BLOCK_TIME: i64 = 1_700_000_000;

// ============ Balance Verification ============

#[test]
fn test_balance_query_failure_aborts_before_vesting() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    cluster.fail_balance_query();
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());

    let err = orchestrator.run().unwrap_err();
    assert!(matches!(
        err,
        ProvisioningError::Aborted { state: ProvisioningState::VerifyingBalance, .. }
    ));
    assert_eq!(orchestrator.state(), ProvisioningState::Failed);
    assert_eq!(cluster.vesting_calls(), 0);
    assert!(cluster.pool_requests().is_empty());

    // The mint itself went through and is not retried
    assert_eq!(orchestrator.report().mint_signatures.len(), 3);
    assert!(orchestrator.report().recipients.is_empty());
    assert!(!orchestrator
        .transitions()
        .iter()
        .any(|s| matches!(s, ProvisioningState::VestingRecipients { .. })));
}

// ============ Recipient Failures ============

#[test]
fn test_recipient_failure_continues_by_default() {
    let plan = sample_plan();
    let failing = plan.allocations[2].recipient;
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    cluster.fail_recipient(failing);
    let mut orchestrator = Orchestrator::new(plan, creator(), cluster.collaborators());

    let report = orchestrator.run().unwrap();
    assert_eq!(cluster.vesting_calls(), 8);
    assert_eq!(report.succeeded().count(), 7);

    let failures: Vec<_> = report.failed().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 2);
    assert_eq!(failures[0].label, "marketing");
    assert_eq!(failures[0].recipient, failing);

    let transitions = orchestrator.transitions();
    for index in 3..8 {
        assert!(transitions.contains(&ProvisioningState::VestingRecipients { index }));
    }
    assert!(transitions.contains(&ProvisioningState::CreatingPool));
    assert_eq!(orchestrator.state(), ProvisioningState::Completed);
    assert!(report.pool.is_some());
}

#[test]
fn test_recipient_failure_aborts_when_asked() {
    let mut config = sample_config();
    config.recipient_failure_policy = RecipientFailurePolicy::Abort;
    let plan = config.validate().unwrap();
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    cluster.fail_recipient(plan.allocations[2].recipient);
    let mut orchestrator = Orchestrator::new(plan, creator(), cluster.collaborators());

    let err = orchestrator.run().unwrap_err();
    assert!(matches!(
        err,
        ProvisioningError::Aborted { state: ProvisioningState::VestingRecipients { index: 2 }, .. }
    ));
    assert_eq!(orchestrator.state(), ProvisioningState::Failed);
    assert_eq!(cluster.vesting_calls(), 3);
    assert!(cluster.pool_requests().is_empty());
    assert_eq!(orchestrator.report().succeeded().count(), 2);
    assert_eq!(orchestrator.report().failed().count(), 1);
}

#[test]
fn test_escrow_timeouts_are_recorded() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    cluster.stall_step(StepKind::CreateVestingEscrow);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());

    let report = orchestrator.run().unwrap();
    assert_eq!(report.failed().count(), 8);
    assert!(report.failed().all(|f| f.reason.contains("timed out")));

    // Recipient failures do not stop the pool
    assert!(report.pool.is_some());
}

// ============ Pool Failures ============

#[test]
fn test_pool_rejection_is_fatal() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    cluster.reject_step(StepKind::CreatePool);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());

    let err = orchestrator.run().unwrap_err();
    let ProvisioningError::TransportRejected { step, source } = &err else {
        panic!("expected a transport rejection, got {:?}", err);
    };
    assert_eq!(*step, StepKind::CreatePool);
    assert!(matches!(source, TransportError::Rejected { logs, .. } if !logs.is_empty()));

    assert_eq!(orchestrator.state(), ProvisioningState::Failed);
    assert_eq!(orchestrator.report().succeeded().count(), 8);
    assert!(orchestrator.report().pool.is_none());
}

// ============ Mint Failures ============

#[test]
fn test_mint_timeout_stops_everything() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    cluster.stall_step(StepKind::MintToken);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());

    let err = orchestrator.run().unwrap_err();
    assert!(matches!(
        err,
        ProvisioningError::TransportRejected { step: StepKind::MintToken, source: TransportError::Timeout { attempts: 3 } }
    ));
    assert_eq!(cluster.submissions(), 1);
    assert_eq!(cluster.vesting_calls(), 0);
}

#[test]
fn test_terminal_states_not_reentered() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    cluster.fail_balance_query();
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());
    assert!(orchestrator.run().is_err());

    let submissions = cluster.submissions();
    let err = orchestrator.run().unwrap_err();
    assert!(matches!(err, ProvisioningError::AlreadyRun(ProvisioningState::Failed)));
    assert_eq!(cluster.submissions(), submissions);
}

// ============ Validation Before Network ============

#[test]
fn test_overallocated_explicit_schedule_rejected() {
    let mut config = sample_config();
    config.recipients.push(AllocationSpec {
        label: "hand-rounded".to_string(),
        recipient: config.recipients[0].recipient,
        amount: Decimal::from(1_000_000u64),
        cliff_offset_secs: 0,
        distribution: Distribution::Explicit {
            cliff_unlock: "333333.333333".parse().unwrap(),
            amount_per_period: "55555.555555".parse().unwrap(),
            periods: 30,
            frequency_secs: 2_626_560,
        },
    });

    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Math { source: MathError::OverAllocated { excess: 999_999_999_983 }, .. }
    ));
}

#[test]
fn test_oversubscribed_supply_rejected() {
    let mut config = sample_config();
    config.token.supply = Decimal::from(9_000_000u64);
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_negative_amount_rejected() {
    let json = include_str!("../../deploy/launch.example.json").replace("\"500000\"", "\"-500000\"");
    let err = LaunchConfig::from_json(&json).unwrap().validate().unwrap_err();
    assert!(matches!(err, ConfigError::Math { source: MathError::InvalidAmount(_), .. }));
}
