// ============ LaunchKit SDK ============
// Drives token launches through external chain SDKs: mint the supply,
// vest it to recipients, seed the launch pool, lock positions and claim
// fees. Transaction construction is delegated to the collaborator traits
// below; this crate only sequences, validates and reports.

pub mod config;
pub mod error;
pub mod fees;
pub mod keys;
pub mod orchestrator;
pub mod position;
pub mod referral;
pub mod simulated;

use launchkit_types::*;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub use error::{ProvisioningError, SdkError, TransportError};

// ============ Constants ============

/// Retry budget handed to the transport on every submission
pub const DEFAULT_SEND_TX_MAX_RETRIES: u8 = 3;
/// Priority fee used when the config does not set one
pub const DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 1_000;
/// The position lock program requires a non-zero frequency even without periods
pub const LOCK_PERIOD_FREQUENCY: u64 = 1;

// ============ Transaction Types ============

/// Unsigned transaction as produced by an SDK.
/// The message is SDK-encoded and opaque here; the transport adds the fee
/// payer signature. Ephemeral accounts the SDK generated (mint keypair,
/// escrow base, position NFT) are listed in `extra_signers` and have already
/// been signed for by the SDK.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub kind: StepKind,
    pub fee_payer: Address,
    pub extra_signers: Vec<Address>,
    pub compute_unit_price_micro_lamports: Option<u64>,
    pub message: Vec<u8>,
}

impl UnsignedTransaction {
    /// SHA-256 over kind, payer and message
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.to_string().as_bytes());
        hasher.update(self.fee_payer.as_bytes());
        for signer in &self.extra_signers {
            hasher.update(signer.as_bytes());
        }
        hasher.update(&self.message);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }
}

// ============ Transport ============

/// Chain access. Every call blocks until the cluster answers.
pub trait Transport {
    /// Sign as fee payer, submit, and wait for finality or a terminal rejection
    fn submit_and_confirm(
        &self,
        tx: &UnsignedTransaction,
        max_retries: u8,
    ) -> Result<Signature, TransportError>;

    /// Unix timestamp of the current slot
    fn block_time(&self) -> Result<i64, TransportError>;

    /// Balance of the owner's associated token account, `None` if it does not exist
    fn token_balance(&self, owner: &Address, mint: &Address) -> Result<Option<u64>, TransportError>;
}

// ============ Token SDK ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MintParams {
    pub payer: Address,
    pub mint_authority: Address,
    pub decimals: u8,
    /// Supply in base units, minted to the authority's token account
    pub supply: u64,
    pub compute_unit_price_micro_lamports: u64,
}

/// Create-mint, create-account and mint-to, in submission order
#[derive(Clone, Debug)]
pub struct MintTransactions {
    pub mint: Address,
    pub token_account: Address,
    pub transactions: Vec<UnsignedTransaction>,
}

pub trait TokenSdk {
    fn create_mint_and_supply(&self, params: &MintParams) -> Result<MintTransactions, SdkError>;
}

// ============ Lock SDK ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VestingEscrowParams {
    pub sender: Address,
    pub payer: Address,
    pub is_sender_multisig: bool,
    pub recipient: Address,
    pub token_mint: Address,
    pub token_program: Address,
    pub vesting_start_time: i64,
    pub cliff_time: i64,
    pub frequency: u64,
    pub cliff_unlock_amount: u64,
    pub amount_per_period: u64,
    pub number_of_period: u64,
    pub update_recipient_mode: UpdateRecipientMode,
    pub cancel_mode: CancelMode,
}

#[derive(Clone, Debug)]
pub struct EscrowTransaction {
    pub escrow: Address,
    pub transaction: UnsignedTransaction,
}

pub trait LockSdk {
    fn create_vesting_escrow(&self, params: &VestingEscrowParams) -> Result<EscrowTransaction, SdkError>;
}

// ============ Pool SDK ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolFees {
    pub max_base_fee_bps: u16,
    pub min_base_fee_bps: u16,
    pub fee_scheduler_mode: FeeSchedulerMode,
    pub number_of_period: u16,
    pub total_duration: u64,
    pub use_dynamic_fee: bool,
}

/// Inputs for a full-range custom pool. The SDK derives sqrt price,
/// liquidity delta and fee curve from these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolCreationParams {
    pub payer: Address,
    pub creator: Address,
    pub token_a_mint: Address,
    pub token_b_mint: Address,
    pub token_a_decimals: u8,
    pub token_b_decimals: u8,
    pub token_a_amount: u64,
    pub token_b_amount: u64,
    pub initial_price: Decimal,
    pub fees: PoolFees,
    pub has_alpha_vault: bool,
    pub activation_type: ActivationType,
    pub collect_fee_mode: CollectFeeMode,
    pub activation_point: Option<i64>,
    pub token_a_program: Address,
    pub token_b_program: Address,
    pub is_lock_liquidity: bool,
}

#[derive(Clone, Debug)]
pub struct PoolTransaction {
    pub pool: Address,
    pub position: Address,
    pub position_nft: Address,
    pub transaction: UnsignedTransaction,
}

/// A liquidity position as the pool SDK reports it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PositionInfo {
    pub position: Address,
    pub position_nft_account: Address,
    pub pool: Address,
    pub unlocked_liquidity: u128,
    pub vested_liquidity: u128,
}

impl PositionInfo {
    pub fn total_liquidity(&self) -> u128 {
        self.unlocked_liquidity.saturating_add(self.vested_liquidity)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockPositionParams {
    pub owner: Address,
    pub payer: Address,
    pub pool: Address,
    pub position: Address,
    pub position_nft_account: Address,
    pub cliff_point: i64,
    pub period_frequency: u64,
    pub cliff_unlock_liquidity: u128,
    pub liquidity_per_period: u128,
    pub number_of_period: u16,
}

#[derive(Clone, Debug)]
pub struct LockTransaction {
    pub vesting_account: Address,
    pub transaction: UnsignedTransaction,
}

pub trait PoolSdk {
    fn create_custom_pool(&self, params: &PoolCreationParams) -> Result<PoolTransaction, SdkError>;

    fn user_positions(&self, pool: &Address, owner: &Address) -> Result<Vec<PositionInfo>, SdkError>;

    fn vesting_accounts(&self, position: &Address) -> Result<Vec<Address>, SdkError>;

    fn refresh_vesting(
        &self,
        owner: &Address,
        position: &PositionInfo,
        vesting_accounts: &[Address],
    ) -> Result<UnsignedTransaction, SdkError>;

    fn lock_position(&self, params: &LockPositionParams) -> Result<LockTransaction, SdkError>;
}

// ============ Fee SDK ============

/// Lock escrow of a dynamic AMM pool and its unclaimed fees
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockEscrow {
    pub address: Address,
    pub owner: Address,
    pub unclaimed_lp: u64,
    pub unclaimed_token_a: u64,
    pub unclaimed_token_b: u64,
}

pub trait FeeSdk {
    fn lock_escrow(&self, pool: &Address, owner: &Address) -> Result<Option<LockEscrow>, SdkError>;

    fn claim_lock_fee(&self, pool: &Address, owner: &Address, lp_amount: u64) -> Result<UnsignedTransaction, SdkError>;
}

// ============ Referral SDK ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferralTokenAccount {
    pub address: Address,
    pub mint: Address,
    pub amount: u64,
}

pub trait ReferralSdk {
    fn referral_token_accounts(&self, referral: &Address) -> Result<Vec<ReferralTokenAccount>, SdkError>;
}

// ============ Tests ============
