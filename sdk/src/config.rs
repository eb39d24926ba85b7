//! Launch configuration
//!
//! Everything a launch needs (supply, recipients, pool, policies) lives in
//! one JSON document. It is parsed and validated once; the orchestrator only
//! ever sees the resulting [`LaunchPlan`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use launchkit_math::amount::{to_base_units, to_token_amount};
use launchkit_math::schedule::ResidualPolicy;
use launchkit_math::timing::DEFAULT_ACTIVATION_DELAY_SECS;
use launchkit_math::BPS_DENOMINATOR;
use launchkit_types::{AllocationPlan, AllocationSpec, CancelMode, PoolSpec, UpdateRecipientMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::{DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS, DEFAULT_SEND_TX_MAX_RETRIES};

// ============ Config Document ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub commitment: Commitment,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Total supply in human units
    #[serde(with = "rust_decimal::serde::str")]
    pub supply: Decimal,
    pub decimals: u8,
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price_micro_lamports: u64,
}

/// Serde face of [`ResidualPolicy`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualHandling {
    FoldIntoCliff,
    #[default]
    Report,
}

impl From<ResidualHandling> for ResidualPolicy {
    fn from(value: ResidualHandling) -> Self {
        match value {
            ResidualHandling::FoldIntoCliff => ResidualPolicy::FoldIntoCliff,
            ResidualHandling::Report => ResidualPolicy::Report,
        }
    }
}

/// What a failed recipient escrow does to the rest of the run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientFailurePolicy {
    /// Log it and move on to the next recipient
    #[default]
    Continue,
    /// Abort the whole run
    Abort,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub cluster: ClusterConfig,
    pub keypair_path: PathBuf,
    pub token: TokenConfig,
    #[serde(default = "default_activation_delay")]
    pub activation_delay_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    #[serde(default)]
    pub residual_policy: ResidualHandling,
    #[serde(default)]
    pub recipient_failure_policy: RecipientFailurePolicy,
    #[serde(default)]
    pub update_recipient_mode: UpdateRecipientMode,
    #[serde(default)]
    pub cancel_mode: CancelMode,
    pub recipients: Vec<AllocationSpec>,
    #[serde(default)]
    pub pool: Option<PoolSpec>,
}

fn default_compute_unit_price() -> u64 {
    DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS
}

fn default_activation_delay() -> u64 {
    DEFAULT_ACTIVATION_DELAY_SECS
}

fn default_max_retries() -> u8 {
    DEFAULT_SEND_TX_MAX_RETRIES
}

// ============ Validated Plan ============

/// Pool amounts after normalization
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PoolAmounts {
    pub token_a: u64,
    pub token_b: u64,
}

/// A config that passed validation, with every amount in base units
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LaunchPlan {
    pub config: LaunchConfig,
    pub supply_units: u64,
    pub allocations: Vec<AllocationPlan>,
    pub pool_amounts: Option<PoolAmounts>,
    /// Supply left with the creator after escrows and pool
    pub unallocated_units: u64,
}

impl LaunchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Check every invariant and resolve all amounts. Nothing touches the
    /// network before this succeeds.
    pub fn validate(self) -> Result<LaunchPlan, ConfigError> {
        let decimals = self.token.decimals;
        let supply_units = to_base_units(&self.token.supply, decimals)
            .and_then(to_token_amount)
            .map_err(|source| ConfigError::Math { context: "token supply".to_string(), source })?;
        if supply_units == 0 {
            return Err(ConfigError::Invalid("token supply must be positive".to_string()));
        }

        let mut allocations = Vec::with_capacity(self.recipients.len());
        let mut committed: u128 = 0;
        let mut labels = HashSet::new();
        let mut recipients = HashSet::new();

        for spec in &self.recipients {
            if !labels.insert(spec.label.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate recipient label {:?}", spec.label)));
            }
            if !recipients.insert(spec.recipient) {
                warn!(recipient = %spec.recipient, label = %spec.label, "recipient receives more than one escrow");
            }

            let plan = AllocationPlan::derive(spec, decimals, self.residual_policy.into())
                .map_err(|source| ConfigError::Math { context: spec.label.clone(), source })?;
            if plan.schedule.residual != 0 {
                warn!(
                    label = %plan.label,
                    residual = %plan.residual,
                    "schedule does not add up to the allocation"
                );
            }
            debug!(
                label = %plan.label,
                cliff = %plan.cliff_unlock_amount,
                per_period = %plan.per_period_amount,
                periods = plan.number_of_periods,
                "allocation planned"
            );
            committed += plan.schedule.committed();
            allocations.push(plan);
        }

        let pool_amounts = match &self.pool {
            Some(pool) => {
                let amounts = validate_pool(pool, decimals)?;
                committed += amounts.token_a as u128;
                Some(amounts)
            }
            None => None,
        };

        if committed > supply_units as u128 {
            return Err(ConfigError::Invalid(format!(
                "allocations and pool need {} base units but supply is {}",
                committed, supply_units
            )));
        }

        Ok(LaunchPlan {
            supply_units,
            allocations,
            pool_amounts,
            unallocated_units: supply_units - committed as u64,
            config: self,
        })
    }
}

fn validate_pool(pool: &PoolSpec, token_a_decimals: u8) -> Result<PoolAmounts, ConfigError> {
    let max_bps = BPS_DENOMINATOR as u16;
    if pool.max_base_fee_bps > max_bps || pool.min_base_fee_bps > pool.max_base_fee_bps {
        return Err(ConfigError::Invalid(format!(
            "base fee bounds {}..{} bps out of order or above {}",
            pool.min_base_fee_bps, pool.max_base_fee_bps, max_bps
        )));
    }
    if pool.max_base_fee_bps != pool.min_base_fee_bps && (pool.number_of_period == 0 || pool.total_duration == 0) {
        return Err(ConfigError::Invalid("fee scheduler needs periods and a duration".to_string()));
    }
    if pool.initial_price <= Decimal::ZERO {
        return Err(ConfigError::Invalid("initial price must be positive".to_string()));
    }

    let normalize = |amount: &Decimal, decimals: u8, what: &str| {
        to_base_units(amount, decimals)
            .and_then(to_token_amount)
            .map_err(|source| ConfigError::Math { context: what.to_string(), source })
    };
    let token_a = normalize(&pool.token_a_amount, token_a_decimals, "pool token A")?;
    let token_b = normalize(&pool.token_b_amount, pool.token_b_decimals, "pool token B")?;
    if token_a == 0 || token_b == 0 {
        return Err(ConfigError::Invalid("pool needs both token amounts".to_string()));
    }

    Ok(PoolAmounts { token_a, token_b })
}

// ============ Tests ============
