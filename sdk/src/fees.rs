//! Lock escrow fee inspection and claiming on dynamic AMM pools

use launchkit_types::{Address, Signature, StepKind};
use serde::Serialize;
use tracing::info;

use crate::error::{ProvisioningError, Result};
use crate::{FeeSdk, LockEscrow, Transport};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FeeClaimOutcome {
    NoEscrow,
    NothingToClaim { escrow: Address },
    Claimed {
        escrow: Address,
        lp_amount: u64,
        token_a: u64,
        token_b: u64,
        signature: Signature,
    },
}

/// Read the owner's lock escrow without claiming anything
pub fn inspect_lock_fees(fee_sdk: &dyn FeeSdk, pool: &Address, owner: &Address) -> Result<Option<LockEscrow>> {
    let escrow = fee_sdk
        .lock_escrow(pool, owner)
        .map_err(|source| ProvisioningError::Sdk { step: StepKind::ClaimFees, source })?;
    match &escrow {
        Some(escrow) => info!(
            escrow = %escrow.address,
            lp = escrow.unclaimed_lp,
            token_a = escrow.unclaimed_token_a,
            token_b = escrow.unclaimed_token_b,
            "unclaimed lock fees"
        ),
        None => info!(%pool, %owner, "no lock escrow"),
    }
    Ok(escrow)
}

/// Claim every unclaimed LP fee in the owner's lock escrow
pub fn claim_lock_fees(
    transport: &dyn Transport,
    fee_sdk: &dyn FeeSdk,
    pool: &Address,
    owner: &Address,
    max_retries: u8,
) -> Result<FeeClaimOutcome> {
    let Some(escrow) = inspect_lock_fees(fee_sdk, pool, owner)? else {
        return Ok(FeeClaimOutcome::NoEscrow);
    };
    if escrow.unclaimed_lp == 0 {
        return Ok(FeeClaimOutcome::NothingToClaim { escrow: escrow.address });
    }

    let tx = fee_sdk
        .claim_lock_fee(pool, owner, escrow.unclaimed_lp)
        .map_err(|source| ProvisioningError::Sdk { step: StepKind::ClaimFees, source })?;
    let signature = transport
        .submit_and_confirm(&tx, max_retries)
        .map_err(|source| ProvisioningError::TransportRejected { step: StepKind::ClaimFees, source })?;
    info!(escrow = %escrow.address, lp = escrow.unclaimed_lp, signature = %signature, "lock fees claimed");

    Ok(FeeClaimOutcome::Claimed {
        escrow: escrow.address,
        lp_amount: escrow.unclaimed_lp,
        token_a: escrow.unclaimed_token_a,
        token_b: escrow.unclaimed_token_b,
        signature,
    })
}
