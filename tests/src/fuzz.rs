// ============ LaunchKit Fuzz / Property-Based Tests ============
// Manual property-based testing using a deterministic PRNG.
// Reproducible from the seed alone.
//
// Each test generates hundreds of random inputs and checks invariants that
// must hold for all of them.

use launchkit_math::amount::{from_base_units, to_base_units};
use launchkit_math::schedule::{plan, plan_within, tolerance, ResidualPolicy, Shape};
use launchkit_math::{MathError, TOKEN_AMOUNT_MAX};
use launchkit_sdk::orchestrator::{Orchestrator, ProvisioningState};
use launchkit_sdk::simulated::SimulatedCluster;
use rust_decimal::Decimal;

use crate::integration::{creator, sample_plan};

// ============ Deterministic PRNG ============

struct TestRng {
    state: u64,
}

impl TestRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn range_u64(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        min + (self.next_u64() % (max - min))
    }

    fn range_u128(&mut self, min: u128, max: u128) -> u128 {
        if min >= max {
            return min;
        }
        let wide = ((self.next_u64() as u128) << 64) | self.next_u64() as u128;
        min + (wide % (max - min))
    }

    fn chance(&mut self, one_in: u64) -> bool {
        self.next_u64() % one_in == 0
    }
}

// ============ Test 1: Normalizer Exactness ============

#[test]
fn test_fuzz_base_units_match_integer_construction() {
    let mut rng = TestRng::new(0x1A0C_0000_0000_0001);

    for _ in 0..2_000 {
        let whole = rng.range_u64(0, 1_000_000_000);
        let frac_digits = rng.range_u64(0, 7) as u32;
        let frac = rng.range_u64(0, 10u64.pow(frac_digits));
        let decimals = rng.range_u64(frac_digits as u64, 10) as u8;

        let raw = if frac_digits == 0 {
            whole.to_string()
        } else {
            format!("{}.{:0width$}", whole, frac, width = frac_digits as usize)
        };
        let units = to_base_units(raw.as_str(), decimals).unwrap();

        let expected = whole as u128 * 10u128.pow(decimals as u32)
            + frac as u128 * 10u128.pow(decimals as u32 - frac_digits);
        assert_eq!(units, expected, "{} at {} decimals", raw, decimals);

        let back = from_base_units(units, decimals).unwrap();
        assert_eq!(back, raw.parse::<Decimal>().unwrap().normalize());
    }
}

// ============ Test 2: Linear Split Accounting ============

#[test]
fn test_fuzz_linear_schedule_accounts_for_total() {
    let mut rng = TestRng::new(0x1A0C_0000_0000_0002);

    for _ in 0..2_000 {
        let total = rng.range_u128(1, TOKEN_AMOUNT_MAX);
        let cliff = rng.range_u128(0, total + 1);
        let periods = rng.range_u64(0, 120);
        let frequency = rng.range_u64(1, 10_000_000);
        let shape = Shape::Linear { cliff_unlock: cliff, periods, frequency_secs: frequency };

        let reported = plan(total, shape, ResidualPolicy::Report).unwrap();
        assert!(reported.residual >= 0);
        assert_eq!(reported.committed() + reported.residual as u128, total);
        if periods > 0 {
            assert!((reported.residual as u128) < periods as u128);
        } else {
            assert_eq!(reported.cliff_unlock_amount, total);
            assert_eq!(reported.frequency_secs, 0);
        }

        let folded = plan(total, shape, ResidualPolicy::FoldIntoCliff).unwrap();
        assert!(folded.is_exact());
        assert_eq!(folded.committed(), total);
        assert_eq!(folded.amount_per_period, reported.amount_per_period);
    }
}

// ============ Test 3: Explicit Reconciliation ============

#[test]
fn test_fuzz_explicit_schedule_never_overcommits_silently() {
    let mut rng = TestRng::new(0x1A0C_0000_0000_0003);

    for _ in 0..2_000 {
        let total = rng.range_u128(10_000, 1_000_000_000_000_000);
        let periods = rng.range_u64(1, 48);
        let cliff = rng.range_u128(0, total / 2);
        // Hand-rounded per-period amount: the exact split, nudged either way
        let exact = (total - cliff) / periods as u128;
        let nudge = rng.range_u128(0, exact / 1_000 + 2);
        let per_period = if rng.chance(2) { exact + nudge } else { exact.saturating_sub(nudge) };
        let shape = Shape::Explicit {
            cliff_unlock: cliff,
            amount_per_period: per_period,
            periods,
            frequency_secs: 2_626_560,
        };

        let committed = cliff + per_period * periods as u128;
        match plan(total, shape, ResidualPolicy::Report) {
            Ok(schedule) => {
                assert_eq!(schedule.residual, total as i128 - committed as i128);
                assert!(committed <= total + tolerance(total));
            }
            Err(MathError::OverAllocated { excess }) => {
                assert_eq!(excess, committed - total);
                assert!(excess > tolerance(total));
            }
            Err(e) => panic!("unexpected error {:?}", e),
        }
    }
}

// ============ Test 4: Ceiling ============

#[test]
fn test_fuzz_ceiling_respected() {
    let mut rng = TestRng::new(0x1A0C_0000_0000_0004);

    for _ in 0..1_000 {
        let ceiling = rng.range_u128(1_000, 1_000_000_000);
        let total = rng.range_u128(1, ceiling * 2);
        let result = plan_within(total, Shape::Immediate, ResidualPolicy::Report, ceiling);
        if total > ceiling {
            assert!(matches!(result, Err(MathError::ScheduleOverflow(_))));
        } else {
            assert_eq!(result.unwrap().cliff_unlock_amount, total);
        }
    }
}

// ============ Test 5: Random Recipient Failures ============

#[test]
fn test_fuzz_recipient_failures_are_all_accounted_for() {
    let mut rng = TestRng::new(0x1A0C_0000_0000_0005);

    for _ in 0..50 {
        let plan = sample_plan();
        let cluster = SimulatedCluster::new(1_700_000_000);
        let mut failing = Vec::new();
        for (index, allocation) in plan.allocations.iter().enumerate() {
            if rng.chance(3) {
                cluster.fail_recipient(allocation.recipient);
                failing.push(index);
            }
        }

        let mut orchestrator = Orchestrator::new(plan, creator(), cluster.collaborators());
        let report = orchestrator.run().unwrap();

        assert_eq!(orchestrator.state(), ProvisioningState::Completed);
        assert_eq!(report.recipients.len(), 8);
        assert_eq!(report.failed().map(|f| f.index).collect::<Vec<_>>(), failing);
        assert_eq!(report.succeeded().count(), 8 - failing.len());
        assert!(report.pool.is_some());
    }
}
