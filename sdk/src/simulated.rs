//! In-memory cluster for dry runs
//!
//! Implements every collaborator trait over a single mutable ledger.
//! SDK calls encode the ledger change they intend as a JSON message; the
//! change is only applied when the transport confirms the transaction, so
//! a rejected submission leaves the ledger untouched. Addresses and
//! signatures are SHA-256 derived and stable across runs.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use launchkit_types::{Address, Signature, StepKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{SdkError, TransportError};
use crate::orchestrator::Collaborators;
use crate::{
    EscrowTransaction, FeeSdk, LockEscrow, LockPositionParams, LockSdk, LockTransaction, MintParams,
    MintTransactions, PoolCreationParams, PoolSdk, PoolTransaction, PositionInfo, ReferralSdk,
    ReferralTokenAccount, TokenSdk, Transport, UnsignedTransaction, VestingEscrowParams,
};

// ============ Ledger Effects ============

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
enum Effect {
    CreateMint { mint: Address },
    CreateTokenAccount { owner: Address, mint: Address },
    MintTo { owner: Address, mint: Address, amount: u64 },
    FundEscrow { sender: Address, mint: Address, escrow: Address, amount: u64 },
    CreatePool { creator: Address, pool: Address, position: Address, position_nft: Address, mint: Address, token_a: u64 },
    RefreshVesting { position: Address },
    LockPosition { position: Address, liquidity: u128 },
    ClaimLockFee { pool: Address, owner: Address },
}

fn encode(effect: &Effect) -> Result<Vec<u8>, SdkError> {
    serde_json::to_vec(effect).map_err(|e| SdkError::Build(e.to_string()))
}

// ============ Cluster ============

#[derive(Default)]
struct Ledger {
    nonce: u64,
    submissions: usize,
    vesting_calls: usize,
    balances: HashMap<(Address, Address), u64>,
    positions: Vec<PositionInfo>,
    lock_escrows: HashMap<(Address, Address), LockEscrow>,
    referral_accounts: Vec<(Address, ReferralTokenAccount)>,
    escrow_requests: Vec<VestingEscrowParams>,
    lock_requests: Vec<LockPositionParams>,
    pool_requests: Vec<PoolCreationParams>,
    rejected_steps: HashSet<StepKind>,
    stalled_steps: HashSet<StepKind>,
    failing_recipients: HashSet<Address>,
    balance_query_fails: bool,
    block_time_query_fails: bool,
}

impl Ledger {
    fn next_nonce(&mut self) -> [u8; 8] {
        self.nonce += 1;
        self.nonce.to_le_bytes()
    }

    fn apply(&mut self, effect: Effect) -> Result<(), String> {
        match effect {
            Effect::CreateMint { .. } => {}
            Effect::CreateTokenAccount { owner, mint } => {
                self.balances.entry((owner, mint)).or_insert(0);
            }
            Effect::MintTo { owner, mint, amount } => {
                let balance = self.balances.entry((owner, mint)).or_insert(0);
                *balance = balance.checked_add(amount).ok_or("supply overflow")?;
            }
            Effect::FundEscrow { sender, mint, amount, .. } => self.debit(sender, mint, amount)?,
            Effect::CreatePool { creator, pool, position, position_nft, mint, token_a } => {
                self.debit(creator, mint, token_a)?;
                self.positions.push(PositionInfo {
                    position,
                    position_nft_account: position_nft,
                    pool,
                    unlocked_liquidity: token_a as u128,
                    vested_liquidity: 0,
                });
            }
            Effect::RefreshVesting { position } => {
                let info = self.position_mut(&position)?;
                info.unlocked_liquidity += info.vested_liquidity;
                info.vested_liquidity = 0;
            }
            Effect::LockPosition { position, liquidity } => {
                let info = self.position_mut(&position)?;
                info.unlocked_liquidity = info
                    .unlocked_liquidity
                    .checked_sub(liquidity)
                    .ok_or("lock exceeds unlocked liquidity")?;
            }
            Effect::ClaimLockFee { pool, owner } => {
                let escrow = self.lock_escrows.get_mut(&(pool, owner)).ok_or("lock escrow missing")?;
                escrow.unclaimed_lp = 0;
                escrow.unclaimed_token_a = 0;
                escrow.unclaimed_token_b = 0;
            }
        }
        Ok(())
    }

    fn debit(&mut self, owner: Address, mint: Address, amount: u64) -> Result<(), String> {
        let balance = self.balances.get_mut(&(owner, mint)).ok_or("token account missing")?;
        let have = *balance;
        *balance = have
            .checked_sub(amount)
            .ok_or_else(|| format!("insufficient funds: have {}, need {}", have, amount))?;
        Ok(())
    }

    fn position_mut(&mut self, position: &Address) -> Result<&mut PositionInfo, String> {
        self.positions
            .iter_mut()
            .find(|p| p.position == *position)
            .ok_or_else(|| format!("position {} missing", position))
    }
}

/// Deterministic stand-in for a cluster and every SDK the launch uses
pub struct SimulatedCluster {
    block_time: i64,
    ledger: RefCell<Ledger>,
}

impl SimulatedCluster {
    pub fn new(block_time: i64) -> Self {
        Self { block_time, ledger: RefCell::new(Ledger::default()) }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators { transport: self, token: self, lock: self, pool: self }
    }

    // ============ Fault Injection ============

    /// Every submission of this step kind ends in a terminal rejection
    pub fn reject_step(&self, step: StepKind) {
        self.ledger.borrow_mut().rejected_steps.insert(step);
    }

    /// Every submission of this step kind exhausts its retries
    pub fn stall_step(&self, step: StepKind) {
        self.ledger.borrow_mut().stalled_steps.insert(step);
    }

    /// Escrow construction for this recipient fails in the lock SDK
    pub fn fail_recipient(&self, recipient: Address) {
        self.ledger.borrow_mut().failing_recipients.insert(recipient);
    }

    pub fn fail_balance_query(&self) {
        self.ledger.borrow_mut().balance_query_fails = true;
    }

    pub fn fail_block_time_query(&self) {
        self.ledger.borrow_mut().block_time_query_fails = true;
    }

    // ============ Seeding ============

    pub fn seed_position(&self, pool: Address, owner: Address, unlocked: u128, vested: u128) -> Address {
        let mut ledger = self.ledger.borrow_mut();
        let nonce = ledger.next_nonce();
        let position = Address::hashed(&[b"position", pool.as_bytes(), owner.as_bytes(), &nonce]);
        ledger.positions.push(PositionInfo {
            position,
            position_nft_account: Address::hashed(&[b"position-nft", position.as_bytes()]),
            pool,
            unlocked_liquidity: unlocked,
            vested_liquidity: vested,
        });
        position
    }

    pub fn seed_lock_escrow(&self, pool: Address, owner: Address, lp: u64, token_a: u64, token_b: u64) -> Address {
        let address = Address::hashed(&[b"lock-escrow", pool.as_bytes(), owner.as_bytes()]);
        self.ledger.borrow_mut().lock_escrows.insert(
            (pool, owner),
            LockEscrow { address, owner, unclaimed_lp: lp, unclaimed_token_a: token_a, unclaimed_token_b: token_b },
        );
        address
    }

    pub fn seed_referral_account(&self, referral: Address, mint: Address, amount: u64) {
        let address = Address::hashed(&[b"referral-ata", referral.as_bytes(), mint.as_bytes()]);
        self.ledger
            .borrow_mut()
            .referral_accounts
            .push((referral, ReferralTokenAccount { address, mint, amount }));
    }

    // ============ Inspection ============

    pub fn submissions(&self) -> usize {
        self.ledger.borrow().submissions
    }

    pub fn vesting_calls(&self) -> usize {
        self.ledger.borrow().vesting_calls
    }

    pub fn balance(&self, owner: &Address, mint: &Address) -> Option<u64> {
        self.ledger.borrow().balances.get(&(*owner, *mint)).copied()
    }

    pub fn escrow_requests(&self) -> Vec<VestingEscrowParams> {
        self.ledger.borrow().escrow_requests.clone()
    }

    pub fn lock_requests(&self) -> Vec<LockPositionParams> {
        self.ledger.borrow().lock_requests.clone()
    }

    pub fn pool_requests(&self) -> Vec<PoolCreationParams> {
        self.ledger.borrow().pool_requests.clone()
    }

    fn transaction(
        &self,
        kind: StepKind,
        fee_payer: Address,
        extra_signers: Vec<Address>,
        effect: &Effect,
    ) -> Result<UnsignedTransaction, SdkError> {
        Ok(UnsignedTransaction {
            kind,
            fee_payer,
            extra_signers,
            compute_unit_price_micro_lamports: None,
            message: encode(effect)?,
        })
    }
}

fn signature_for(digest: &[u8; 32], nonce: &[u8; 8]) -> Signature {
    let mut out = [0u8; 64];
    for (half, chunk) in out.chunks_mut(32).enumerate() {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(nonce);
        hasher.update([half as u8]);
        chunk.copy_from_slice(&hasher.finalize());
    }
    Signature(out)
}

// ============ Transport ============

impl Transport for SimulatedCluster {
    fn submit_and_confirm(&self, tx: &UnsignedTransaction, max_retries: u8) -> Result<Signature, TransportError> {
        let mut ledger = self.ledger.borrow_mut();
        ledger.submissions += 1;
        let digest = tx.digest();
        debug!(step = %tx.kind, digest = %hex::encode(digest), "simulated submit");

        if ledger.stalled_steps.contains(&tx.kind) {
            return Err(TransportError::Timeout { attempts: max_retries });
        }
        if ledger.rejected_steps.contains(&tx.kind) {
            return Err(TransportError::Rejected {
                cause: format!("simulated rejection of {}", tx.kind),
                logs: vec![format!("Program log: {} refused", tx.kind)],
            });
        }

        let effect: Effect = serde_json::from_slice(&tx.message).map_err(|e| TransportError::Rejected {
            cause: "message does not decode".to_string(),
            logs: vec![e.to_string()],
        })?;
        ledger.apply(effect).map_err(|cause| TransportError::Rejected {
            logs: vec![format!("Program log: {}", cause)],
            cause,
        })?;

        let nonce = ledger.next_nonce();
        Ok(signature_for(&digest, &nonce))
    }

    fn block_time(&self) -> Result<i64, TransportError> {
        if self.ledger.borrow().block_time_query_fails {
            return Err(TransportError::Unavailable("simulated block time failure".to_string()));
        }
        Ok(self.block_time)
    }

    fn token_balance(&self, owner: &Address, mint: &Address) -> Result<Option<u64>, TransportError> {
        let ledger = self.ledger.borrow();
        if ledger.balance_query_fails {
            return Err(TransportError::Unavailable("simulated balance query failure".to_string()));
        }
        Ok(ledger.balances.get(&(*owner, *mint)).copied())
    }
}

// ============ SDKs ============

impl TokenSdk for SimulatedCluster {
    fn create_mint_and_supply(&self, params: &MintParams) -> Result<MintTransactions, SdkError> {
        let nonce = self.ledger.borrow_mut().next_nonce();
        let mint = Address::hashed(&[b"mint", params.payer.as_bytes(), &nonce]);
        let owner = params.mint_authority;
        let token_account = Address::hashed(&[b"ata", owner.as_bytes(), mint.as_bytes()]);

        let steps = [
            (vec![mint], Effect::CreateMint { mint }),
            (vec![], Effect::CreateTokenAccount { owner, mint }),
            (vec![], Effect::MintTo { owner, mint, amount: params.supply }),
        ];
        let mut transactions = Vec::with_capacity(steps.len());
        for (signers, effect) in &steps {
            let mut tx = self.transaction(StepKind::MintToken, params.payer, signers.clone(), effect)?;
            tx.compute_unit_price_micro_lamports = Some(params.compute_unit_price_micro_lamports);
            transactions.push(tx);
        }
        Ok(MintTransactions { mint, token_account, transactions })
    }
}

impl LockSdk for SimulatedCluster {
    fn create_vesting_escrow(&self, params: &VestingEscrowParams) -> Result<EscrowTransaction, SdkError> {
        let nonce = {
            let mut ledger = self.ledger.borrow_mut();
            ledger.vesting_calls += 1;
            ledger.escrow_requests.push(params.clone());
            if ledger.failing_recipients.contains(&params.recipient) {
                return Err(SdkError::Build(format!("simulated failure for {}", params.recipient)));
            }
            ledger.next_nonce()
        };

        let amount = params
            .amount_per_period
            .checked_mul(params.number_of_period)
            .and_then(|vested| vested.checked_add(params.cliff_unlock_amount))
            .ok_or_else(|| SdkError::Build("escrow amount overflows".to_string()))?;
        let base = Address::hashed(&[b"escrow-base", &nonce]);
        let escrow = Address::hashed(&[b"escrow", base.as_bytes()]);
        let effect = Effect::FundEscrow { sender: params.sender, mint: params.token_mint, escrow, amount };
        let transaction = self.transaction(StepKind::CreateVestingEscrow, params.payer, vec![base], &effect)?;
        Ok(EscrowTransaction { escrow, transaction })
    }
}

impl PoolSdk for SimulatedCluster {
    fn create_custom_pool(&self, params: &PoolCreationParams) -> Result<PoolTransaction, SdkError> {
        self.ledger.borrow_mut().pool_requests.push(params.clone());
        let pool = Address::hashed(&[b"pool", params.token_a_mint.as_bytes(), params.token_b_mint.as_bytes()]);
        let position_nft = Address::hashed(&[b"position-nft-mint", pool.as_bytes(), params.creator.as_bytes()]);
        let position = Address::hashed(&[b"position", position_nft.as_bytes()]);

        let effect = Effect::CreatePool {
            creator: params.creator,
            pool,
            position,
            position_nft,
            mint: params.token_a_mint,
            token_a: params.token_a_amount,
        };
        let transaction = self.transaction(StepKind::CreatePool, params.payer, vec![position_nft], &effect)?;
        Ok(PoolTransaction { pool, position, position_nft, transaction })
    }

    fn user_positions(&self, pool: &Address, _owner: &Address) -> Result<Vec<PositionInfo>, SdkError> {
        Ok(self.ledger.borrow().positions.iter().filter(|p| p.pool == *pool).cloned().collect())
    }

    fn vesting_accounts(&self, position: &Address) -> Result<Vec<Address>, SdkError> {
        let ledger = self.ledger.borrow();
        let info = ledger
            .positions
            .iter()
            .find(|p| p.position == *position)
            .ok_or(SdkError::NotFound(*position))?;
        if info.vested_liquidity == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Address::hashed(&[b"vesting", position.as_bytes()])])
    }

    fn refresh_vesting(
        &self,
        owner: &Address,
        position: &PositionInfo,
        _vesting_accounts: &[Address],
    ) -> Result<UnsignedTransaction, SdkError> {
        let effect = Effect::RefreshVesting { position: position.position };
        self.transaction(StepKind::LockPosition, *owner, vec![], &effect)
    }

    fn lock_position(&self, params: &LockPositionParams) -> Result<LockTransaction, SdkError> {
        let nonce = {
            let mut ledger = self.ledger.borrow_mut();
            ledger.lock_requests.push(params.clone());
            ledger.next_nonce()
        };
        let vesting_account = Address::hashed(&[b"lock", params.position.as_bytes(), &nonce]);
        let effect = Effect::LockPosition { position: params.position, liquidity: params.cliff_unlock_liquidity };
        let transaction = self.transaction(StepKind::LockPosition, params.payer, vec![vesting_account], &effect)?;
        Ok(LockTransaction { vesting_account, transaction })
    }
}

impl FeeSdk for SimulatedCluster {
    fn lock_escrow(&self, pool: &Address, owner: &Address) -> Result<Option<LockEscrow>, SdkError> {
        Ok(self.ledger.borrow().lock_escrows.get(&(*pool, *owner)).cloned())
    }

    fn claim_lock_fee(&self, pool: &Address, owner: &Address, _lp_amount: u64) -> Result<UnsignedTransaction, SdkError> {
        let effect = Effect::ClaimLockFee { pool: *pool, owner: *owner };
        self.transaction(StepKind::ClaimFees, *owner, vec![], &effect)
    }
}

impl ReferralSdk for SimulatedCluster {
    fn referral_token_accounts(&self, referral: &Address) -> Result<Vec<ReferralTokenAccount>, SdkError> {
        Ok(self
            .ledger
            .borrow()
            .referral_accounts
            .iter()
            .filter(|(owner, _)| owner == referral)
            .map(|(_, account)| account.clone())
            .collect())
    }
}

// ============ Tests ============
