// ============ LaunchKit Types ============
// Shared type definitions for launch planning and provisioning.
// Addresses and signatures render as base58, amounts as decimal strings.

use core::fmt;
use core::str::FromStr;

use launchkit_math::amount::{from_base_units, signed_from_base_units, to_base_units};
use launchkit_math::schedule::{self, ResidualPolicy, Shape, VestingSchedule};
use launchkit_math::MathError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============ Well-Known Accounts ============

pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

// ============ Errors ============

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("invalid base58 in {0:?}")]
    InvalidEncoding(String),
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

fn decode_fixed<const N: usize>(raw: &str) -> Result<[u8; N], TypeError> {
    let bytes = bs58::decode(raw.trim())
        .into_vec()
        .map_err(|_| TypeError::InvalidEncoding(raw.to_string()))?;
    if bytes.len() != N {
        return Err(TypeError::InvalidLength { expected: N, actual: bytes.len() });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// ============ Address ============

/// 32-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// SHA-256 over the concatenated seeds. Used for deterministic
    /// addresses in dry runs, never for on-chain derivation.
    pub fn hashed(seeds: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }

    /// Parse one of the constants above; they are known-good literals
    pub fn well_known(raw: &'static str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============ Signature ============

/// 64-byte transaction signature returned on confirmation
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl FromStr for Signature {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<64>(s).map(Self)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============ Provisioning Steps ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    MintToken,
    CreateVestingEscrow,
    CreatePool,
    LockPosition,
    ClaimFees,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::MintToken => "mint-token",
            StepKind::CreateVestingEscrow => "create-vesting-escrow",
            StepKind::CreatePool => "create-pool",
            StepKind::LockPosition => "lock-position",
            StepKind::ClaimFees => "claim-fees",
        };
        f.write_str(name)
    }
}

// ============ Lock Program Modes ============

/// Who may change an escrow's recipient
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRecipientMode {
    Neither,
    #[default]
    CreatorOnly,
    RecipientOnly,
    Either,
}

/// Who may cancel an escrow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    Neither,
    #[default]
    CreatorOnly,
    RecipientOnly,
    Either,
}

impl UpdateRecipientMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl CancelMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// ============ Pool Parameters ============

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSchedulerMode {
    #[default]
    Linear,
    Exponential,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationType {
    Slot,
    #[default]
    Timestamp,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectFeeMode {
    BothTokens,
    #[default]
    QuoteOnly,
}

/// Launch pool settings, human units
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    /// Quote token; defaults to USDC
    #[serde(default = "default_quote_mint")]
    pub token_b_mint: Address,
    pub token_b_decimals: u8,
    #[serde(with = "rust_decimal::serde::str")]
    pub token_a_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub token_b_amount: Decimal,
    /// Quote tokens per base token
    #[serde(with = "rust_decimal::serde::str")]
    pub initial_price: Decimal,
    pub max_base_fee_bps: u16,
    pub min_base_fee_bps: u16,
    #[serde(default)]
    pub use_dynamic_fee: bool,
    #[serde(default)]
    pub fee_scheduler_mode: FeeSchedulerMode,
    pub number_of_period: u16,
    pub total_duration: u64,
    #[serde(default)]
    pub has_alpha_vault: bool,
    #[serde(default)]
    pub activation_type: ActivationType,
    #[serde(default)]
    pub collect_fee_mode: CollectFeeMode,
    #[serde(default)]
    pub is_lock_liquidity: bool,
}

fn default_quote_mint() -> Address {
    Address::well_known(USDC_MINT)
}

// ============ Allocations ============

/// How a recipient's allocation unlocks, human units
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// All of it at the cliff
    Immediate,
    /// Cliff unlock, remainder split evenly
    Linear {
        #[serde(default, with = "rust_decimal::serde::str")]
        cliff_unlock: Decimal,
        periods: u64,
        frequency_secs: u64,
    },
    /// Hand-picked cliff and per-period amounts
    Explicit {
        #[serde(with = "rust_decimal::serde::str")]
        cliff_unlock: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        amount_per_period: Decimal,
        periods: u64,
        frequency_secs: u64,
    },
}

/// One recipient as written in the launch config
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSpec {
    pub label: String,
    pub recipient: Address,
    /// Written as a string so it never passes through a float
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub cliff_offset_secs: u64,
    pub distribution: Distribution,
}

/// Resolved vesting parameters for one recipient
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    pub label: String,
    pub recipient: Address,
    pub total_amount: Decimal,
    pub decimals: u8,
    pub cliff_offset_secs: u64,
    pub cliff_unlock_amount: Decimal,
    pub per_period_amount: Decimal,
    pub period_frequency_secs: u64,
    pub number_of_periods: u64,
    /// Left over after cliff and periods; negative when over-committed
    pub residual: Decimal,
    #[serde(skip)]
    pub schedule: VestingSchedule,
}

impl AllocationPlan {
    /// Normalize a spec to base units and run the planner over it
    pub fn derive(spec: &AllocationSpec, decimals: u8, policy: ResidualPolicy) -> Result<Self, MathError> {
        let total = to_base_units(&spec.amount, decimals)?;
        let shape = match &spec.distribution {
            Distribution::Immediate => Shape::Immediate,
            Distribution::Linear { cliff_unlock, periods, frequency_secs } => Shape::Linear {
                cliff_unlock: to_base_units(cliff_unlock, decimals)?,
                periods: *periods,
                frequency_secs: *frequency_secs,
            },
            Distribution::Explicit { cliff_unlock, amount_per_period, periods, frequency_secs } => {
                Shape::Explicit {
                    cliff_unlock: to_base_units(cliff_unlock, decimals)?,
                    amount_per_period: to_base_units(amount_per_period, decimals)?,
                    periods: *periods,
                    frequency_secs: *frequency_secs,
                }
            }
        };
        let schedule = schedule::plan(total, shape, policy)?;

        Ok(Self {
            label: spec.label.clone(),
            recipient: spec.recipient,
            total_amount: spec.amount,
            decimals,
            cliff_offset_secs: spec.cliff_offset_secs,
            cliff_unlock_amount: from_base_units(schedule.cliff_unlock_amount, decimals)?,
            per_period_amount: from_base_units(schedule.amount_per_period, decimals)?,
            period_frequency_secs: schedule.frequency_secs,
            number_of_periods: schedule.number_of_periods,
            residual: signed_from_base_units(schedule.residual, decimals)?,
            schedule,
        })
    }

    pub fn total_base_units(&self) -> u128 {
        self.schedule.total
    }
}

// ============ Tests ============
