//! Provisioning orchestrator
//!
//! Runs a validated [`LaunchPlan`] against the collaborator SDKs in a fixed
//! order: mint the supply, check it landed, open one vesting escrow per
//! recipient, then seed the launch pool. Every submission blocks on the
//! transport until it is final. One orchestrator runs at most once.

use core::fmt;

use launchkit_math::amount::to_token_amount;
use launchkit_math::timing::{activation_time, cliff_time};
use launchkit_types::{ActivationType, Address, AllocationPlan, Signature, StepKind, TOKEN_PROGRAM_ID};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{LaunchPlan, RecipientFailurePolicy};
use crate::error::{ProvisioningError, RecipientStepFailed, Result};
use crate::keys::Identity;
use crate::{
    LockSdk, MintParams, PoolCreationParams, PoolFees, PoolSdk, TokenSdk, Transport, UnsignedTransaction,
    VestingEscrowParams,
};

// ============ State ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProvisioningState {
    Idle,
    MintingToken,
    /// Blocked on the transport for a submitted transaction
    AwaitingConfirmation { step: StepKind },
    VerifyingBalance,
    VestingRecipients { index: usize },
    CreatingPool,
    Completed,
    Failed,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisioningState::Completed | ProvisioningState::Failed)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningState::Idle => f.write_str("idle"),
            ProvisioningState::MintingToken => f.write_str("minting-token"),
            ProvisioningState::AwaitingConfirmation { step } => write!(f, "awaiting-confirmation({})", step),
            ProvisioningState::VerifyingBalance => f.write_str("verifying-balance"),
            ProvisioningState::VestingRecipients { index } => write!(f, "vesting-recipients[{}]", index),
            ProvisioningState::CreatingPool => f.write_str("creating-pool"),
            ProvisioningState::Completed => f.write_str("completed"),
            ProvisioningState::Failed => f.write_str("failed"),
        }
    }
}

// ============ Report ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EscrowReceipt {
    pub index: usize,
    pub label: String,
    pub recipient: Address,
    pub escrow: Address,
    pub signature: Signature,
    pub cliff_time: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecipientOutcome {
    Vested(EscrowReceipt),
    Failed(RecipientStepFailed),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolReceipt {
    pub pool: Address,
    pub position: Address,
    pub position_nft: Address,
    pub signature: Signature,
}

/// What a run did on chain, up to the point it stopped
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningReport {
    pub creator: Address,
    pub mint: Option<Address>,
    pub token_account: Option<Address>,
    pub mint_signatures: Vec<Signature>,
    pub observed_balance: Option<u64>,
    pub activation_time: Option<i64>,
    pub recipients: Vec<RecipientOutcome>,
    pub pool: Option<PoolReceipt>,
}

impl ProvisioningReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &EscrowReceipt> {
        self.recipients.iter().filter_map(|outcome| match outcome {
            RecipientOutcome::Vested(receipt) => Some(receipt),
            RecipientOutcome::Failed(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &RecipientStepFailed> {
        self.recipients.iter().filter_map(|outcome| match outcome {
            RecipientOutcome::Vested(_) => None,
            RecipientOutcome::Failed(failure) => Some(failure),
        })
    }
}

// ============ Orchestrator ============

/// The chain-facing collaborators a run needs
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub transport: &'a dyn Transport,
    pub token: &'a dyn TokenSdk,
    pub lock: &'a dyn LockSdk,
    pub pool: &'a dyn PoolSdk,
}

pub struct Orchestrator<'a> {
    plan: LaunchPlan,
    creator: Identity,
    deps: Collaborators<'a>,
    state: ProvisioningState,
    transitions: Vec<ProvisioningState>,
    report: ProvisioningReport,
}

impl<'a> Orchestrator<'a> {
    pub fn new(plan: LaunchPlan, creator: Identity, deps: Collaborators<'a>) -> Self {
        Self {
            plan,
            creator,
            deps,
            state: ProvisioningState::Idle,
            transitions: vec![ProvisioningState::Idle],
            report: ProvisioningReport { creator: creator.address, ..Default::default() },
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`
    pub fn transitions(&self) -> &[ProvisioningState] {
        &self.transitions
    }

    pub fn report(&self) -> &ProvisioningReport {
        &self.report
    }

    pub fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    /// Execute the whole launch. Ends in `Completed` or `Failed`; a second
    /// call fails with `AlreadyRun` without touching the chain.
    pub fn run(&mut self) -> Result<ProvisioningReport> {
        if self.state != ProvisioningState::Idle {
            return Err(ProvisioningError::AlreadyRun(self.state));
        }
        info!(
            creator = %self.creator.address,
            supply = self.plan.supply_units,
            recipients = self.plan.allocations.len(),
            pool = self.plan.config.pool.is_some(),
            "starting launch"
        );

        match self.execute() {
            Ok(()) => {
                self.enter(ProvisioningState::Completed);
                info!(
                    vested = self.report.succeeded().count(),
                    failed = self.report.failed().count(),
                    "launch completed"
                );
                Ok(self.report.clone())
            }
            Err(e) => {
                error!(state = %self.state, error = %e, "launch failed");
                self.enter(ProvisioningState::Failed);
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<()> {
        let mint = self.mint()?;
        self.verify_balance(&mint)?;

        let block_time = self.deps.transport.block_time().map_err(|e| ProvisioningError::Aborted {
            state: self.state,
            reason: format!("block time unavailable: {}", e),
        })?;
        let activation = activation_time(block_time, self.plan.config.activation_delay_secs)?;
        self.report.activation_time = Some(activation);
        info!(block_time, activation, "activation time fixed");

        let allocations = self.plan.allocations.clone();
        for (index, allocation) in allocations.iter().enumerate() {
            self.vest(index, allocation, &mint, activation)?;
        }

        if self.plan.config.pool.is_some() {
            self.create_pool(&mint, activation)?;
        }
        Ok(())
    }

    // ============ Steps ============

    fn mint(&mut self) -> Result<Address> {
        self.enter(ProvisioningState::MintingToken);
        let params = MintParams {
            payer: self.creator.address,
            mint_authority: self.creator.address,
            decimals: self.plan.config.token.decimals,
            supply: self.plan.supply_units,
            compute_unit_price_micro_lamports: self.plan.config.token.compute_unit_price_micro_lamports,
        };
        let minted = self
            .deps
            .token
            .create_mint_and_supply(&params)
            .map_err(|source| ProvisioningError::Sdk { step: StepKind::MintToken, source })?;
        self.report.mint = Some(minted.mint);
        self.report.token_account = Some(minted.token_account);

        for tx in &minted.transactions {
            let signature = self.submit(tx)?;
            self.report.mint_signatures.push(signature);
        }
        info!(mint = %minted.mint, token_account = %minted.token_account, "token minted");
        Ok(minted.mint)
    }

    fn verify_balance(&mut self, mint: &Address) -> Result<()> {
        self.enter(ProvisioningState::VerifyingBalance);
        let balance = match self.deps.transport.token_balance(&self.creator.address, mint) {
            Ok(Some(balance)) => balance,
            Ok(None) => {
                return Err(ProvisioningError::Aborted {
                    state: self.state,
                    reason: format!("no token account for mint {}", mint),
                })
            }
            Err(e) => {
                return Err(ProvisioningError::Aborted {
                    state: self.state,
                    reason: format!("balance query failed: {}", e),
                })
            }
        };
        self.report.observed_balance = Some(balance);

        if balance < self.plan.supply_units {
            warn!(balance, expected = self.plan.supply_units, "minted balance below supply");
        } else {
            debug!(balance, "minted balance verified");
        }
        Ok(())
    }

    fn vest(&mut self, index: usize, allocation: &AllocationPlan, mint: &Address, activation: i64) -> Result<()> {
        self.enter(ProvisioningState::VestingRecipients { index });

        match self.open_escrow(index, allocation, mint, activation) {
            Ok(receipt) => {
                info!(
                    index,
                    label = %receipt.label,
                    recipient = %receipt.recipient,
                    escrow = %receipt.escrow,
                    signature = %receipt.signature,
                    "escrow created"
                );
                self.report.recipients.push(RecipientOutcome::Vested(receipt));
                Ok(())
            }
            Err(e) => {
                let failure = RecipientStepFailed {
                    index,
                    label: allocation.label.clone(),
                    recipient: allocation.recipient,
                    reason: e.to_string(),
                };
                match self.plan.config.recipient_failure_policy {
                    RecipientFailurePolicy::Continue => {
                        warn!(index, label = %failure.label, recipient = %failure.recipient, error = %e, "escrow failed, continuing");
                        self.report.recipients.push(RecipientOutcome::Failed(failure));
                        self.resume(ProvisioningState::VestingRecipients { index });
                        Ok(())
                    }
                    RecipientFailurePolicy::Abort => {
                        let reason = failure.to_string();
                        self.report.recipients.push(RecipientOutcome::Failed(failure));
                        Err(ProvisioningError::Aborted {
                            state: ProvisioningState::VestingRecipients { index },
                            reason,
                        })
                    }
                }
            }
        }
    }

    fn open_escrow(
        &mut self,
        index: usize,
        allocation: &AllocationPlan,
        mint: &Address,
        activation: i64,
    ) -> Result<EscrowReceipt> {
        let schedule = &allocation.schedule;
        let cliff = cliff_time(activation, allocation.cliff_offset_secs)?;
        let params = VestingEscrowParams {
            sender: self.creator.address,
            payer: self.creator.address,
            is_sender_multisig: false,
            recipient: allocation.recipient,
            token_mint: *mint,
            token_program: Address::well_known(TOKEN_PROGRAM_ID),
            vesting_start_time: activation,
            cliff_time: cliff,
            frequency: schedule.frequency_secs,
            cliff_unlock_amount: to_token_amount(schedule.cliff_unlock_amount)?,
            amount_per_period: to_token_amount(schedule.amount_per_period)?,
            number_of_period: schedule.number_of_periods,
            update_recipient_mode: self.plan.config.update_recipient_mode,
            cancel_mode: self.plan.config.cancel_mode,
        };
        debug!(
            index,
            cliff_time = cliff,
            cliff_unlock = params.cliff_unlock_amount,
            per_period = params.amount_per_period,
            periods = params.number_of_period,
            "building escrow"
        );

        let built = self
            .deps
            .lock
            .create_vesting_escrow(&params)
            .map_err(|source| ProvisioningError::Sdk { step: StepKind::CreateVestingEscrow, source })?;
        let signature = self.submit(&built.transaction)?;

        Ok(EscrowReceipt {
            index,
            label: allocation.label.clone(),
            recipient: allocation.recipient,
            escrow: built.escrow,
            signature,
            cliff_time: cliff,
        })
    }

    fn create_pool(&mut self, mint: &Address, activation: i64) -> Result<()> {
        self.enter(ProvisioningState::CreatingPool);
        let (Some(spec), Some(amounts)) = (self.plan.config.pool.as_ref(), self.plan.pool_amounts) else {
            return Ok(());
        };

        let params = PoolCreationParams {
            payer: self.creator.address,
            creator: self.creator.address,
            token_a_mint: *mint,
            token_b_mint: spec.token_b_mint,
            token_a_decimals: self.plan.config.token.decimals,
            token_b_decimals: spec.token_b_decimals,
            token_a_amount: amounts.token_a,
            token_b_amount: amounts.token_b,
            initial_price: spec.initial_price,
            fees: PoolFees {
                max_base_fee_bps: spec.max_base_fee_bps,
                min_base_fee_bps: spec.min_base_fee_bps,
                fee_scheduler_mode: spec.fee_scheduler_mode,
                number_of_period: spec.number_of_period,
                total_duration: spec.total_duration,
                use_dynamic_fee: spec.use_dynamic_fee,
            },
            has_alpha_vault: spec.has_alpha_vault,
            activation_type: spec.activation_type,
            collect_fee_mode: spec.collect_fee_mode,
            activation_point: match spec.activation_type {
                ActivationType::Timestamp => Some(activation),
                ActivationType::Slot => None,
            },
            token_a_program: Address::well_known(TOKEN_PROGRAM_ID),
            token_b_program: Address::well_known(TOKEN_PROGRAM_ID),
            is_lock_liquidity: spec.is_lock_liquidity,
        };

        let built = self
            .deps
            .pool
            .create_custom_pool(&params)
            .map_err(|source| ProvisioningError::Sdk { step: StepKind::CreatePool, source })?;
        let signature = self.submit(&built.transaction)?;
        info!(pool = %built.pool, position = %built.position, signature = %signature, "pool created");

        self.report.pool = Some(PoolReceipt {
            pool: built.pool,
            position: built.position,
            position_nft: built.position_nft,
            signature,
        });
        Ok(())
    }

    // ============ Plumbing ============

    /// Hand a transaction to the transport and block until it is final.
    /// On success the state returns to the step that submitted it.
    fn submit(&mut self, tx: &UnsignedTransaction) -> Result<Signature> {
        let resume = self.state;
        self.enter(ProvisioningState::AwaitingConfirmation { step: tx.kind });
        debug!(step = %tx.kind, digest = %hex::encode(tx.digest()), "submitting");

        let signature = self
            .deps
            .transport
            .submit_and_confirm(tx, self.plan.config.max_retries)
            .map_err(|source| ProvisioningError::TransportRejected { step: tx.kind, source })?;
        debug!(step = %tx.kind, signature = %signature, "confirmed");

        self.resume(resume);
        Ok(signature)
    }

    /// Return to a step after a confirmation wait, recording it only when
    /// the state actually changes
    fn resume(&mut self, step: ProvisioningState) {
        if self.state != step {
            self.enter(step);
        }
    }

    fn enter(&mut self, next: ProvisioningState) {
        debug!(from = %self.state, to = %next, "transition");
        self.state = next;
        self.transitions.push(next);
    }
}

// ============ Tests ============
