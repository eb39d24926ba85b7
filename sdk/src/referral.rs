//! Referral account token listing

use launchkit_types::Address;
use tracing::info;

use crate::error::SdkError;
use crate::{ReferralSdk, ReferralTokenAccount};

/// Token accounts held by a referral account, largest balance first
pub fn list_referral_tokens(sdk: &dyn ReferralSdk, referral: &Address) -> Result<Vec<ReferralTokenAccount>, SdkError> {
    let mut accounts = sdk.referral_token_accounts(referral)?;
    accounts.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.mint.cmp(&b.mint)));
    info!(%referral, accounts = accounts.len(), "referral token accounts");
    Ok(accounts)
}
