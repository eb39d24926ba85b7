//! Permanent lock of a pool position's unlocked liquidity

use launchkit_math::schedule::{plan_within, ResidualPolicy, Shape};
use launchkit_math::timing::cliff_time;
use launchkit_types::{Address, Signature, StepKind};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ProvisioningError, Result, SdkError};
use crate::{LockPositionParams, PoolSdk, PositionInfo, Transport, DEFAULT_SEND_TX_MAX_RETRIES, LOCK_PERIOD_FREQUENCY};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockRequest {
    pub pool: Address,
    pub owner: Address,
    /// Seconds from now until the liquidity unlocks
    pub lock_duration_secs: u64,
    pub max_retries: u8,
}

impl LockRequest {
    pub fn new(pool: Address, owner: Address, lock_duration_secs: u64) -> Self {
        Self { pool, owner, lock_duration_secs, max_retries: DEFAULT_SEND_TX_MAX_RETRIES }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockReceipt {
    pub position: Address,
    pub vesting_account: Address,
    pub liquidity: u128,
    pub cliff_point: i64,
    /// Set when vested liquidity had to be refreshed first
    pub refresh_signature: Option<Signature>,
    pub signature: Signature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockOutcome {
    NoPositions,
    NothingUnlocked { position: Address },
    Locked(LockReceipt),
}

/// Lock all unlocked liquidity of the owner's first position in `pool`
/// until `now + lock_duration_secs`.
pub fn lock_first_position(
    transport: &dyn Transport,
    pool_sdk: &dyn PoolSdk,
    request: &LockRequest,
) -> Result<LockOutcome> {
    let sdk_err = |source| ProvisioningError::Sdk { step: StepKind::LockPosition, source };
    let rejected = |source| ProvisioningError::TransportRejected { step: StepKind::LockPosition, source };

    let positions = pool_sdk.user_positions(&request.pool, &request.owner).map_err(sdk_err)?;
    let Some(mut position) = positions.into_iter().next() else {
        info!(pool = %request.pool, owner = %request.owner, "no positions to lock");
        return Ok(LockOutcome::NoPositions);
    };
    debug!(
        position = %position.position,
        unlocked = position.unlocked_liquidity,
        vested = position.vested_liquidity,
        "found position"
    );

    let mut refresh_signature = None;
    if position.vested_liquidity > 0 {
        let vestings = pool_sdk.vesting_accounts(&position.position).map_err(sdk_err)?;
        let tx = pool_sdk.refresh_vesting(&request.owner, &position, &vestings).map_err(sdk_err)?;
        let signature = transport.submit_and_confirm(&tx, request.max_retries).map_err(rejected)?;
        info!(position = %position.position, vestings = vestings.len(), signature = %signature, "vesting refreshed");
        refresh_signature = Some(signature);
        position = refetch(pool_sdk, request, &position)?;
    }

    if position.unlocked_liquidity == 0 {
        warn!(position = %position.position, "no unlocked liquidity");
        return Ok(LockOutcome::NothingUnlocked { position: position.position });
    }

    let schedule = plan_within(position.unlocked_liquidity, Shape::Immediate, ResidualPolicy::Report, u128::MAX)?;
    let now = transport
        .block_time()
        .map_err(|source| ProvisioningError::QueryFailed { query: "block time", source })?;
    let cliff_point = cliff_time(now, request.lock_duration_secs)?;

    let params = LockPositionParams {
        owner: request.owner,
        payer: request.owner,
        pool: request.pool,
        position: position.position,
        position_nft_account: position.position_nft_account,
        cliff_point,
        period_frequency: LOCK_PERIOD_FREQUENCY,
        cliff_unlock_liquidity: schedule.cliff_unlock_amount,
        liquidity_per_period: schedule.amount_per_period,
        number_of_period: 0,
    };
    let built = pool_sdk.lock_position(&params).map_err(sdk_err)?;
    let signature = transport.submit_and_confirm(&built.transaction, request.max_retries).map_err(rejected)?;
    info!(
        position = %position.position,
        liquidity = schedule.cliff_unlock_amount,
        cliff_point,
        signature = %signature,
        "position locked"
    );

    Ok(LockOutcome::Locked(LockReceipt {
        position: position.position,
        vesting_account: built.vesting_account,
        liquidity: schedule.cliff_unlock_amount,
        cliff_point,
        refresh_signature,
        signature,
    }))
}

fn refetch(pool_sdk: &dyn PoolSdk, request: &LockRequest, stale: &PositionInfo) -> Result<PositionInfo> {
    let sdk_err = |source| ProvisioningError::Sdk { step: StepKind::LockPosition, source };
    let positions = pool_sdk.user_positions(&request.pool, &request.owner).map_err(sdk_err)?;
    positions
        .into_iter()
        .find(|p| p.position == stale.position)
        .ok_or_else(|| sdk_err(SdkError::NotFound(stale.position)))
}
