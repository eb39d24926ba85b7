// ============ LaunchKit Math Library ============
// Amount normalization, vesting schedule derivation and launch timestamps.
// Human amounts are fixed-point decimals, on-chain amounts are u128 base
// units. No floating point anywhere in this crate.

use rust_decimal::Decimal;
use thiserror::Error;

// ============ Constants ============

/// Largest decimals exponent accepted by the normalizer
pub const MAX_DECIMALS: u8 = 18;
pub const SECONDS_PER_DAY: u64 = 86_400;
/// Month cadence accepted by the lock program (30.4 days)
pub const SECONDS_PER_MONTH: u64 = 2_626_560;
/// Platform range for SPL token amounts
pub const TOKEN_AMOUNT_MAX: u128 = u64::MAX as u128;
pub const BPS_DENOMINATOR: u128 = 10_000;
/// Over-allocation tolerated on hand-rounded schedules (0.01%)
pub const RESIDUAL_TOLERANCE_BPS: u128 = 1;

// ============ Error Types ============

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("schedule overflow: {0}")]
    ScheduleOverflow(String),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("schedule over-allocates total by {excess} base units")]
    OverAllocated { excess: u128 },
}

// ============ Amount Normalizer ============

pub mod amount {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::RoundingStrategy;

    /// A human-denominated token quantity
    pub trait IntoAmount {
        fn into_amount(self) -> Result<Decimal, MathError>;
    }

    impl IntoAmount for Decimal {
        fn into_amount(self) -> Result<Decimal, MathError> {
            Ok(self)
        }
    }

    impl IntoAmount for &Decimal {
        fn into_amount(self) -> Result<Decimal, MathError> {
            Ok(*self)
        }
    }

    impl IntoAmount for &str {
        fn into_amount(self) -> Result<Decimal, MathError> {
            parse_amount(self)
        }
    }

    impl IntoAmount for &String {
        fn into_amount(self) -> Result<Decimal, MathError> {
            parse_amount(self)
        }
    }

    impl IntoAmount for u64 {
        fn into_amount(self) -> Result<Decimal, MathError> {
            Ok(Decimal::from(self))
        }
    }

    impl IntoAmount for i64 {
        fn into_amount(self) -> Result<Decimal, MathError> {
            Ok(Decimal::from(self))
        }
    }

    /// Parse a decimal string exactly. Rejects input that would need rounding
    /// to fit the 96-bit mantissa.
    pub fn parse_amount(raw: &str) -> Result<Decimal, MathError> {
        let trimmed = raw.trim().replace('_', "");
        Decimal::from_str_exact(&trimmed)
            .map_err(|e| MathError::InvalidAmount(format!("{:?}: {}", raw, e)))
    }

    /// 10^decimals as an exact decimal
    pub fn pow10(decimals: u8) -> Result<Decimal, MathError> {
        if decimals > MAX_DECIMALS {
            return Err(MathError::InvalidAmount(format!(
                "decimals {} exceeds maximum {}",
                decimals, MAX_DECIMALS
            )));
        }
        Ok(Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0))
    }

    /// round(amount × 10^decimals), half away from zero
    pub fn to_base_units<A: IntoAmount>(amount: A, decimals: u8) -> Result<u128, MathError> {
        let amount = amount.into_amount()?;
        if amount.is_zero() {
            pow10(decimals)?;
            return Ok(0);
        }
        if amount.is_sign_negative() {
            return Err(MathError::InvalidAmount(format!("negative amount {}", amount)));
        }

        let scaled = amount.checked_mul(pow10(decimals)?).ok_or_else(|| {
            MathError::InvalidAmount(format!("{} x 10^{} is out of range", amount, decimals))
        })?;

        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u128()
            .ok_or_else(|| {
                MathError::InvalidAmount(format!("{} x 10^{} is not a base-unit integer", amount, decimals))
            })
    }

    /// Base units rendered back to a human amount
    pub fn from_base_units(units: u128, decimals: u8) -> Result<Decimal, MathError> {
        if decimals > MAX_DECIMALS {
            return Err(MathError::InvalidAmount(format!(
                "decimals {} exceeds maximum {}",
                decimals, MAX_DECIMALS
            )));
        }
        let signed = i128::try_from(units)
            .map_err(|_| MathError::InvalidAmount(format!("{} base units out of range", units)))?;
        Decimal::try_from_i128_with_scale(signed, decimals as u32)
            .map(|d| d.normalize())
            .map_err(|e| MathError::InvalidAmount(format!("{} base units: {}", units, e)))
    }

    /// Same as `from_base_units` for signed residuals
    pub fn signed_from_base_units(units: i128, decimals: u8) -> Result<Decimal, MathError> {
        let magnitude = from_base_units(units.unsigned_abs(), decimals)?;
        Ok(if units < 0 { -magnitude } else { magnitude })
    }

    /// Narrow to the SPL token amount range
    pub fn to_token_amount(units: u128) -> Result<u64, MathError> {
        u64::try_from(units).map_err(|_| {
            MathError::ScheduleOverflow(format!("{} base units exceeds token range", units))
        })
    }
}

// ============ Schedule Planner ============

pub mod schedule {
    use super::*;

    /// How an allocation is released
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Shape {
        /// Everything unlocks at the cliff
        Immediate,
        /// Fixed cliff unlock, remainder split evenly over `periods`
        Linear {
            cliff_unlock: u128,
            periods: u64,
            frequency_secs: u64,
        },
        /// Hand-rounded amounts, reconciled against the total
        Explicit {
            cliff_unlock: u128,
            amount_per_period: u128,
            periods: u64,
            frequency_secs: u64,
        },
    }

    /// What to do with base units the even split leaves behind
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub enum ResidualPolicy {
        /// Move the residual into the cliff bucket
        FoldIntoCliff,
        /// Keep it visible on the schedule
        #[default]
        Report,
    }

    /// Parameters handed to the lock program, plus bookkeeping
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VestingSchedule {
        pub total: u128,
        pub cliff_unlock_amount: u128,
        pub amount_per_period: u128,
        pub frequency_secs: u64,
        pub number_of_periods: u64,
        /// total - cliff - per_period * periods; negative when over-committed
        pub residual: i128,
        /// Base units moved into the cliff by `FoldIntoCliff`
        pub folded: i128,
    }

    impl VestingSchedule {
        fn immediate(total: u128) -> Self {
            Self {
                total,
                cliff_unlock_amount: total,
                amount_per_period: 0,
                frequency_secs: 0,
                number_of_periods: 0,
                residual: 0,
                folded: 0,
            }
        }

        /// Sum the lock program will actually release
        pub fn committed(&self) -> u128 {
            self.cliff_unlock_amount + self.amount_per_period * self.number_of_periods as u128
        }

        pub fn is_exact(&self) -> bool {
            self.residual == 0
        }

        /// Seconds from cliff to the final unlock
        pub fn vesting_duration_secs(&self) -> u64 {
            self.frequency_secs.saturating_mul(self.number_of_periods)
        }

        /// Amount released once `elapsed_secs` have passed since the cliff
        pub fn unlocked_after(&self, elapsed_secs: u64) -> u128 {
            if self.number_of_periods == 0 || self.frequency_secs == 0 {
                return self.cliff_unlock_amount;
            }
            let periods = (elapsed_secs / self.frequency_secs).min(self.number_of_periods);
            self.cliff_unlock_amount + self.amount_per_period * periods as u128
        }
    }

    /// Over-commitment tolerated for a given total
    pub fn tolerance(total: u128) -> u128 {
        total / BPS_DENOMINATOR * RESIDUAL_TOLERANCE_BPS
    }

    /// Plan against the SPL token range
    pub fn plan(total: u128, shape: Shape, policy: ResidualPolicy) -> Result<VestingSchedule, MathError> {
        plan_within(total, shape, policy, TOKEN_AMOUNT_MAX)
    }

    /// Plan with an explicit ceiling on every base-unit quantity
    pub fn plan_within(
        total: u128,
        shape: Shape,
        policy: ResidualPolicy,
        ceiling: u128,
    ) -> Result<VestingSchedule, MathError> {
        if total > ceiling {
            return Err(MathError::ScheduleOverflow(format!(
                "total {} exceeds ceiling {}",
                total, ceiling
            )));
        }

        let schedule = match shape {
            Shape::Immediate => VestingSchedule::immediate(total),
            Shape::Linear { cliff_unlock, periods, frequency_secs } => {
                check_cliff(total, cliff_unlock)?;
                if periods == 0 {
                    VestingSchedule::immediate(total)
                } else {
                    check_frequency(frequency_secs)?;
                    let remaining = total - cliff_unlock;
                    let per_period = remaining / periods as u128;
                    let residual = remaining - per_period * periods as u128;
                    VestingSchedule {
                        total,
                        cliff_unlock_amount: cliff_unlock,
                        amount_per_period: per_period,
                        frequency_secs,
                        number_of_periods: periods,
                        residual: to_signed(residual)?,
                        folded: 0,
                    }
                }
            }
            Shape::Explicit { cliff_unlock, amount_per_period, periods, frequency_secs } => {
                if periods == 0 {
                    if amount_per_period != 0 {
                        return Err(MathError::InvalidSchedule(
                            "per-period amount set without periods".to_string(),
                        ));
                    }
                    check_cliff(total, cliff_unlock)?;
                    VestingSchedule::immediate(total)
                } else {
                    check_frequency(frequency_secs)?;
                    let committed = amount_per_period
                        .checked_mul(periods as u128)
                        .and_then(|vested| vested.checked_add(cliff_unlock))
                        .filter(|committed| *committed <= ceiling)
                        .ok_or_else(|| {
                            MathError::ScheduleOverflow(format!(
                                "{} + {} x {} exceeds ceiling {}",
                                cliff_unlock, amount_per_period, periods, ceiling
                            ))
                        })?;

                    let residual = to_signed(total)? - to_signed(committed)?;
                    if residual < 0 && residual.unsigned_abs() > tolerance(total) {
                        return Err(MathError::OverAllocated { excess: residual.unsigned_abs() });
                    }

                    VestingSchedule {
                        total,
                        cliff_unlock_amount: cliff_unlock,
                        amount_per_period,
                        frequency_secs,
                        number_of_periods: periods,
                        residual,
                        folded: 0,
                    }
                }
            }
        };

        Ok(apply_policy(schedule, policy))
    }

    fn apply_policy(mut schedule: VestingSchedule, policy: ResidualPolicy) -> VestingSchedule {
        if policy != ResidualPolicy::FoldIntoCliff || schedule.residual == 0 {
            return schedule;
        }
        let magnitude = schedule.residual.unsigned_abs();
        if schedule.residual > 0 {
            schedule.cliff_unlock_amount += magnitude;
        } else if schedule.cliff_unlock_amount >= magnitude {
            schedule.cliff_unlock_amount -= magnitude;
        } else {
            // Cliff too small to absorb the overshoot; leave it reported
            return schedule;
        }
        schedule.folded = schedule.residual;
        schedule.residual = 0;
        schedule
    }

    fn check_cliff(total: u128, cliff_unlock: u128) -> Result<(), MathError> {
        if cliff_unlock > total {
            return Err(MathError::OverAllocated { excess: cliff_unlock - total });
        }
        Ok(())
    }

    fn check_frequency(frequency_secs: u64) -> Result<(), MathError> {
        if frequency_secs == 0 {
            return Err(MathError::InvalidSchedule(
                "periodic vesting needs a non-zero frequency".to_string(),
            ));
        }
        Ok(())
    }

    fn to_signed(value: u128) -> Result<i128, MathError> {
        i128::try_from(value)
            .map_err(|_| MathError::ScheduleOverflow(format!("{} exceeds signed range", value)))
    }
}

// ============ Launch Timing ============

pub mod timing {
    use super::*;

    pub const DEFAULT_ACTIVATION_DELAY_SECS: u64 = 600;

    /// Cliff offsets count 30-day months
    pub const fn months(n: u64) -> u64 {
        n * 30 * SECONDS_PER_DAY
    }

    fn offset(base: i64, secs: u64, what: &str) -> Result<i64, MathError> {
        i64::try_from(secs)
            .ok()
            .and_then(|secs| base.checked_add(secs))
            .ok_or_else(|| MathError::ScheduleOverflow(format!("{} timestamp overflows", what)))
    }

    /// Block time plus the activation delay
    pub fn activation_time(block_time: i64, delay_secs: u64) -> Result<i64, MathError> {
        offset(block_time, delay_secs, "activation")
    }

    pub fn cliff_time(activation_time: i64, cliff_offset_secs: u64) -> Result<i64, MathError> {
        offset(activation_time, cliff_offset_secs, "cliff")
    }

    /// Timestamp of the last periodic unlock
    pub fn final_unlock_time(cliff_time: i64, schedule: &schedule::VestingSchedule) -> Result<i64, MathError> {
        offset(cliff_time, schedule.vesting_duration_secs(), "final unlock")
    }
}

// ============ Tests ============
