//! Immutable crowdsale terms and their validation.

use crate::error::{PoolError, PoolResult};
use crate::types::{checked_mul, Address, Amount, Asset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Terms of one token generation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TgeTerms {
    /// Price of one token unit in the unit of account's smallest unit.
    pub price: Amount,
    /// Minimum total purchase for success.
    pub softcap: Amount,
    /// Maximum total purchase.
    pub hardcap: Amount,
    pub min_purchase: Amount,
    /// Per-buyer cumulative maximum.
    pub max_purchase: Amount,
    /// Share of each purchase locked, 0..=100.
    pub lockup_percent: u8,
    pub lockup_duration_blocks: u64,
    /// Pool TVL (in the unit of account) gating lockup release; 0 disables.
    pub lockup_tvl_threshold: Amount,
    pub run_duration_blocks: u64,
    pub unit_of_account: Asset,
    /// When non-empty only these buyers may purchase.
    #[serde(default)]
    pub user_whitelist: BTreeSet<Address>,
    #[serde(default)]
    pub metadata_uri: String,
}

impl TgeTerms {
    /// Validate shape and check the hardcap fits under `token_cap`.
    pub fn validate(&self, token_cap: Amount) -> PoolResult<()> {
        if self.price == 0 {
            return Err(PoolError::InvalidArgument("price must be positive".to_string()));
        }
        if self.hardcap == 0 {
            return Err(PoolError::InvalidArgument("hardcap must be positive".to_string()));
        }
        if self.softcap > self.hardcap {
            return Err(PoolError::InvalidArgument(format!(
                "softcap {} higher than hardcap {}",
                self.softcap, self.hardcap
            )));
        }
        if self.min_purchase > self.max_purchase || self.max_purchase == 0 {
            return Err(PoolError::InvalidArgument(format!(
                "invalid purchase bounds: min {} max {}",
                self.min_purchase, self.max_purchase
            )));
        }
        if self.lockup_percent > 100 {
            return Err(PoolError::InvalidArgument(format!(
                "lockup percent {} above 100",
                self.lockup_percent
            )));
        }
        if self.run_duration_blocks == 0 {
            return Err(PoolError::InvalidArgument(
                "run duration must be at least one block".to_string(),
            ));
        }
        if self.hardcap > token_cap {
            return Err(PoolError::CapExceeded {
                cap: token_cap,
                would_have: self.hardcap,
            });
        }
        Ok(())
    }

    /// Payment due for `amount` tokens, exact.
    pub fn required_payment(&self, amount: Amount) -> PoolResult<Amount> {
        checked_mul(amount, self.price)
    }

    /// Locked part of a purchase, rounded up so the lockup never falls short.
    pub fn locked_portion(&self, amount: Amount) -> PoolResult<Amount> {
        let scaled = checked_mul(amount, Amount::from(self.lockup_percent))?;
        Ok(scaled.div_ceil(100))
    }

    pub fn is_whitelisted_buyer(&self, buyer: &Address) -> bool {
        self.user_whitelist.is_empty() || self.user_whitelist.contains(buyer)
    }
}
