// ============ LaunchKit Integration Tests ============
// The sample launch config driven end to end through the simulated cluster.
//
// Test categories:
// 1. Config normalization and schedule residuals
// 2. Full launch: mint, verify, eight escrows, pool
// 3. Post-launch: lock the pool position, claim lock fees, list referrals
// 4. Report serialization

use launchkit_math::amount::to_base_units;
use launchkit_math::timing::months;
use launchkit_math::SECONDS_PER_MONTH;
use launchkit_sdk::config::{LaunchConfig, LaunchPlan};
use launchkit_sdk::fees::{claim_lock_fees, FeeClaimOutcome};
use launchkit_sdk::keys::Identity;
use launchkit_sdk::orchestrator::{Orchestrator, ProvisioningState};
use launchkit_sdk::position::{lock_first_position, LockOutcome, LockRequest};
use launchkit_sdk::referral::list_referral_tokens;
use launchkit_sdk::simulated::SimulatedCluster;
use launchkit_sdk::DEFAULT_SEND_TX_MAX_RETRIES;
use launchkit_types::{ActivationType, Address, StepKind, USDC_MINT};

// ============ Helpers ============

const SAMPLE_CONFIG: &str = include_str!("../../deploy/launch.example.json");
const BLOCK_TIME: i64 = 1_700_000_000;

pub(crate) fn sample_config() -> LaunchConfig {
    LaunchConfig::from_json(SAMPLE_CONFIG).unwrap()
}

pub(crate) fn sample_plan() -> LaunchPlan {
    sample_config().validate().unwrap()
}

pub(crate) fn creator() -> Identity {
    Identity { address: Address::new([0x42; 32]) }
}

fn allocation<'a>(plan: &'a LaunchPlan, label: &str) -> &'a launchkit_types::AllocationPlan {
    plan.allocations.iter().find(|a| a.label == label).unwrap()
}

// ============ Test 1: Plan ============

#[test]
fn test_total_supply_normalizes() {
    let plan = sample_plan();
    assert_eq!(plan.supply_units, 10_000_000_000_000);
    assert_eq!(to_base_units("10000000", 6).unwrap(), 10_000_000_000_000);
}

#[test]
fn test_sample_residuals_are_reported() {
    let plan = sample_plan();

    assert_eq!(allocation(&plan, "potential-utility").schedule.residual, 17);
    assert_eq!(allocation(&plan, "team").schedule.residual, 19);
    assert_eq!(allocation(&plan, "future-activation").schedule.residual, 26);
    assert_eq!(allocation(&plan, "advisor").schedule.residual, 22);
    assert_eq!(allocation(&plan, "community").schedule.residual, 4);
    assert!(allocation(&plan, "marketing").schedule.is_exact());

    // Residuals stay with the creator
    assert_eq!(plan.unallocated_units, 17 + 19 + 26 + 22 + 4);
}

#[test]
fn test_immediate_allocations() {
    let plan = sample_plan();
    for label in ["strategic-seed", "cex"] {
        let schedule = allocation(&plan, label).schedule;
        assert_eq!(schedule.cliff_unlock_amount, schedule.total);
        assert_eq!(schedule.amount_per_period, 0);
        assert_eq!(schedule.frequency_secs, 0);
    }
}

#[test]
fn test_cliff_offsets_use_thirty_day_months() {
    let plan = sample_plan();
    assert_eq!(allocation(&plan, "potential-utility").cliff_offset_secs, months(6));
    assert_eq!(allocation(&plan, "team").cliff_offset_secs, months(12));
    assert_eq!(allocation(&plan, "future-activation").cliff_offset_secs, months(3));
    assert_eq!(allocation(&plan, "team").period_frequency_secs, SECONDS_PER_MONTH);
}

// ============ Test 2: Full Launch ============

#[test]
fn test_full_launch() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());

    let report = orchestrator.run().unwrap();
    assert_eq!(orchestrator.state(), ProvisioningState::Completed);
    assert_eq!(report.mint_signatures.len(), 3);
    assert_eq!(report.observed_balance, Some(10_000_000_000_000));
    assert_eq!(report.activation_time, Some(BLOCK_TIME + 600));
    assert_eq!(report.succeeded().count(), 8);
    assert_eq!(report.failed().count(), 0);
    assert!(report.pool.is_some());

    // Everything but the residuals left the creator's account
    let mint = report.mint.unwrap();
    assert_eq!(cluster.balance(&creator().address, &mint), Some(88));
    assert_eq!(cluster.submissions(), 3 + 8 + 1);
}

#[test]
fn test_escrow_cliffs_follow_activation() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());
    let report = orchestrator.run().unwrap();

    let activation = BLOCK_TIME + 600;
    let cliffs: Vec<(String, i64)> = report.succeeded().map(|r| (r.label.clone(), r.cliff_time)).collect();
    assert_eq!(cliffs[0], ("strategic-seed".to_string(), activation));
    assert_eq!(cliffs[1], ("potential-utility".to_string(), activation + months(6) as i64));
    assert_eq!(cliffs[3], ("team".to_string(), activation + months(12) as i64));

    for request in cluster.escrow_requests() {
        assert_eq!(request.vesting_start_time, activation);
        assert_eq!(request.sender, creator().address);
        assert!(!request.is_sender_multisig);
    }
}

#[test]
fn test_pool_params() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());
    let report = orchestrator.run().unwrap();

    let pools = cluster.pool_requests();
    assert_eq!(pools.len(), 1);
    let params = &pools[0];
    assert_eq!(params.token_a_mint, report.mint.unwrap());
    assert_eq!(params.token_b_mint.to_string(), USDC_MINT);
    assert_eq!(params.token_a_amount, 500_000_000_000);
    assert_eq!(params.token_b_amount, 10_000_000);
    assert_eq!(params.fees.max_base_fee_bps, 5_000);
    assert_eq!(params.fees.min_base_fee_bps, 100);
    assert!(params.fees.use_dynamic_fee);
    assert_eq!(params.activation_type, ActivationType::Timestamp);
    assert_eq!(params.activation_point, Some(BLOCK_TIME + 600));
}

#[test]
fn test_slot_activation_leaves_point_unset() {
    let mut config = sample_config();
    if let Some(pool) = config.pool.as_mut() {
        pool.activation_type = ActivationType::Slot;
    }
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let mut orchestrator = Orchestrator::new(config.validate().unwrap(), creator(), cluster.collaborators());
    orchestrator.run().unwrap();

    assert_eq!(cluster.pool_requests()[0].activation_point, None);
}

#[test]
fn test_launch_without_pool() {
    let mut config = sample_config();
    config.pool = None;
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let mut orchestrator = Orchestrator::new(config.validate().unwrap(), creator(), cluster.collaborators());

    let report = orchestrator.run().unwrap();
    assert!(report.pool.is_none());
    assert!(!orchestrator.transitions().contains(&ProvisioningState::CreatingPool));
    assert_eq!(cluster.balance(&creator().address, &report.mint.unwrap()), Some(500_000_000_088));
}

// ============ Test 3: Post-Launch ============

#[test]
fn test_lock_pool_position_after_launch() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());
    let report = orchestrator.run().unwrap();
    let pool = report.pool.unwrap();

    let request = LockRequest::new(pool.pool, creator().address, 365 * 86_400);
    let outcome = lock_first_position(&cluster, &cluster, &request).unwrap();
    let LockOutcome::Locked(receipt) = &outcome else {
        panic!("expected a lock, got {:?}", outcome);
    };
    assert_eq!(receipt.position, pool.position);
    assert_eq!(receipt.liquidity, 500_000_000_000);
    assert_eq!(receipt.cliff_point, BLOCK_TIME + 365 * 86_400);

    // Everything is locked now
    let again = lock_first_position(&cluster, &cluster, &request).unwrap();
    assert_eq!(again, LockOutcome::NothingUnlocked { position: pool.position });
}

#[test]
fn test_claim_fees_then_nothing_left() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let pool = Address::new([0x50; 32]);
    let owner = creator().address;
    cluster.seed_lock_escrow(pool, owner, 12_345, 600, 7);

    let first = claim_lock_fees(&cluster, &cluster, &pool, &owner, DEFAULT_SEND_TX_MAX_RETRIES).unwrap();
    assert!(matches!(first, FeeClaimOutcome::Claimed { lp_amount: 12_345, .. }));

    let second = claim_lock_fees(&cluster, &cluster, &pool, &owner, DEFAULT_SEND_TX_MAX_RETRIES).unwrap();
    assert!(matches!(second, FeeClaimOutcome::NothingToClaim { .. }));
}

#[test]
fn test_referral_listing() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let referral = Address::new([0x60; 32]);
    let usdc: Address = USDC_MINT.parse().unwrap();
    cluster.seed_referral_account(referral, usdc, 2_500_000);
    cluster.seed_referral_account(referral, Address::new([0x61; 32]), 10);

    let accounts = list_referral_tokens(&cluster, &referral).unwrap();
    assert_eq!(accounts[0].mint, usdc);
}

// ============ Test 4: Report ============

#[test]
fn test_report_serializes() {
    let cluster = SimulatedCluster::new(BLOCK_TIME);
    let mut orchestrator = Orchestrator::new(sample_plan(), creator(), cluster.collaborators());
    let report = orchestrator.run().unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["recipients"].as_array().unwrap().len(), 8);
    assert_eq!(json["recipients"][0]["outcome"], "vested");
    assert_eq!(json["recipients"][0]["label"], "strategic-seed");
    assert_eq!(json["creator"], creator().address.to_string());
    assert!(json["pool"]["pool"].is_string());
}

#[test]
fn test_plan_serializes_amounts_as_strings() {
    let plan = sample_plan();
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["allocations"][1]["residual"], "0.000017");
    assert_eq!(json["allocations"][1]["cliff_unlock_amount"], "333333.333333");
    assert_eq!(json["supply_units"], 10_000_000_000_000u64);
    assert_eq!(StepKind::CreateVestingEscrow.to_string(), "create-vesting-escrow");
}
