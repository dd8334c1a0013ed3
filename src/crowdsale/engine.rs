//! Crowdsale engine: the purchase / refund / settle state machine.
//!
//! State is never stored. `Active`, `Successful` and `Failed` are derived on
//! every call from `start_block`, the run duration, `total_purchased` and the
//! softcap, so there is no stored state that could drift from the facts.
//!
//! ```text
//! Active ──(block >= start + run_duration)──┬── total >= softcap ──> Successful
//!                                           └── total <  softcap ──> Failed
//! ```
//!
//! `Successful` only admits `transfer_funds` (once) and `claim`; `Failed` only
//! admits `redeem`.

use super::terms::TgeTerms;
use crate::context::TxContext;
use crate::error::{PoolError, PoolResult, Role};
use crate::events::Event;
use crate::token::{GovernanceToken, LockEntry, LockReason};
use crate::types::{
    checked_add, checked_sub, mul_div, Address, Amount, Asset, BlockHeight, GenerationId, PoolId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Derived lifecycle state of a crowdsale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TgeState {
    Active,
    Successful,
    Failed,
}

/// Payment attached to a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub asset: Asset,
    pub amount: Amount,
}

impl Payment {
    pub fn native(amount: Amount) -> Self {
        Self {
            asset: Asset::Native,
            amount,
        }
    }

    pub fn token(token: Address, amount: Amount) -> Self {
        Self {
            asset: Asset::Token(token),
            amount,
        }
    }
}

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub minted: Amount,
    pub locked: Amount,
    pub paid: Payment,
}

/// Result of a redeem; empty when there was nothing left to redeem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedeemReceipt {
    pub burned: Amount,
    pub refunds: Vec<(Asset, Amount)>,
}

/// One crowdsale campaign. While it is the token's latest engine it holds
/// the mint capability; it keeps burn rights for its own refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdsaleEngine {
    address: Address,
    pool: PoolId,
    pool_address: Address,
    owner: Address,
    generation: GenerationId,
    terms: TgeTerms,
    start_block: BlockHeight,
    total_purchased: Amount,
    purchased_by: BTreeMap<Address, Amount>,
    /// Escrowed payment per buyer, per asset actually paid.
    paid_by: BTreeMap<Address, BTreeMap<Asset, Amount>>,
    /// Escrow tally per asset.
    collected: BTreeMap<Asset, Amount>,
    funds_transferred: bool,
}

impl CrowdsaleEngine {
    pub fn new(
        address: Address,
        pool: PoolId,
        pool_address: Address,
        owner: Address,
        generation: GenerationId,
        terms: TgeTerms,
        start_block: BlockHeight,
    ) -> Self {
        Self {
            address,
            pool,
            pool_address,
            owner,
            generation,
            terms,
            start_block,
            total_purchased: 0,
            purchased_by: BTreeMap::new(),
            paid_by: BTreeMap::new(),
            collected: BTreeMap::new(),
            funds_transferred: false,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    pub fn terms(&self) -> &TgeTerms {
        &self.terms
    }

    pub fn start_block(&self) -> BlockHeight {
        self.start_block
    }

    /// First block at which the campaign is no longer `Active`.
    pub fn end_block(&self) -> BlockHeight {
        self.start_block
            .saturating_add(self.terms.run_duration_blocks)
    }

    pub fn total_purchased(&self) -> Amount {
        self.total_purchased
    }

    pub fn purchased_by(&self, buyer: &Address) -> Amount {
        self.purchased_by.get(buyer).copied().unwrap_or(0)
    }

    pub fn purchasers(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.purchased_by.iter()
    }

    /// Escrowed payment of `buyer` per asset.
    pub fn paid_by(&self, buyer: &Address) -> Vec<(Asset, Amount)> {
        self.paid_by
            .get(buyer)
            .map(|paid| paid.iter().map(|(a, n)| (*a, *n)).collect())
            .unwrap_or_default()
    }

    pub fn collected(&self) -> Vec<(Asset, Amount)> {
        self.collected.iter().map(|(a, n)| (*a, *n)).collect()
    }

    /// Whether this campaign's TVL gate is open on `token`.
    pub fn lockup_tvl_reached(&self, token: &GovernanceToken) -> bool {
        token.is_tvl_reached(self.generation)
    }

    pub fn funds_transferred(&self) -> bool {
        self.funds_transferred
    }

    /// Derived state at `block`.
    pub fn state(&self, block: BlockHeight) -> TgeState {
        if block < self.end_block() {
            TgeState::Active
        } else if self.total_purchased >= self.terms.softcap {
            TgeState::Successful
        } else {
            TgeState::Failed
        }
    }

    fn ensure_state(&self, block: BlockHeight, expected: TgeState) -> PoolResult<()> {
        let state = self.state(block);
        if state != expected {
            return Err(PoolError::WrongState(format!(
                "TGE is {:?}, expected {:?}",
                state, expected
            )));
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &Address) -> PoolResult<()> {
        if *caller != self.owner {
            return Err(PoolError::Unauthorized {
                role: Role::EngineOwner,
                caller: *caller,
            });
        }
        Ok(())
    }

    fn ensure_token(&self, token: &GovernanceToken) -> PoolResult<()> {
        if token.engine_of(self.generation) != Some(self.address) {
            return Err(PoolError::WrongState(format!(
                "token {} is not sold by engine {}",
                token.address(),
                self.address
            )));
        }
        Ok(())
    }

    /// Check `payment` covers `required` units of the unit of account.
    ///
    /// Same-unit payments must match exactly. Other whitelisted assets are
    /// converted first; their value may exceed the price (slippage headroom)
    /// but never fall short.
    fn check_payment(
        &self,
        ctx: &TxContext<'_>,
        payment: &Payment,
        required: Amount,
    ) -> PoolResult<()> {
        let unit = self.terms.unit_of_account;
        if payment.asset == unit {
            if payment.amount != required {
                return Err(PoolError::IncorrectPaymentPassed {
                    expected: required,
                    received: payment.amount,
                });
            }
            return Ok(());
        }

        if !ctx.router.is_whitelisted(&payment.asset) {
            return Err(PoolError::AssetNotWhitelisted(payment.asset));
        }
        let value = ctx.router.convert(payment.asset, unit, payment.amount)?;
        if value < required {
            return Err(PoolError::IncorrectPaymentPassed {
                expected: required,
                received: value,
            });
        }
        Ok(())
    }

    /// Buy `amount` tokens.
    ///
    /// Mints to the buyer, locks the lockup share until
    /// `start_block + lockup_duration_blocks` (TVL-gated when a threshold is
    /// set) and escrows the payment in the engine.
    pub fn purchase(
        &mut self,
        ctx: &mut TxContext<'_>,
        token: &mut GovernanceToken,
        buyer: &Address,
        amount: Amount,
        payment: Payment,
    ) -> PoolResult<PurchaseReceipt> {
        self.ensure_token(token)?;
        self.ensure_state(ctx.block, TgeState::Active)?;
        if amount == 0 {
            return Err(PoolError::InvalidArgument("purchase amount is zero".to_string()));
        }
        if !self.terms.is_whitelisted_buyer(buyer) {
            return Err(PoolError::BuyerNotWhitelisted(*buyer));
        }
        if amount < self.terms.min_purchase {
            return Err(PoolError::MinPurchaseUnderflow {
                amount,
                min: self.terms.min_purchase,
            });
        }
        let buyer_total = checked_add(self.purchased_by(buyer), amount)?;
        if buyer_total > self.terms.max_purchase {
            return Err(PoolError::MaxPurchaseOverflow {
                max: self.terms.max_purchase,
                would_have: buyer_total,
            });
        }
        let total = checked_add(self.total_purchased, amount)?;
        if total > self.terms.hardcap {
            return Err(PoolError::HardcapOverflow {
                hardcap: self.terms.hardcap,
                would_have: total,
            });
        }
        let required = self.terms.required_payment(amount)?;
        self.check_payment(ctx, &payment, required)?;
        token.ensure_mintable(amount)?;
        let locked = self.terms.locked_portion(amount)?;
        let paid_total = checked_add(self.paid(buyer, &payment.asset), payment.amount)?;
        let collected_total = checked_add(
            self.collected.get(&payment.asset).copied().unwrap_or(0),
            payment.amount,
        )?;

        ctx.ledger
            .transfer(buyer, &self.address, payment.asset, payment.amount)?;
        token.mint(&self.address, buyer, amount)?;
        if locked > 0 {
            let entry = LockEntry {
                amount: locked,
                unlock_block: self
                    .start_block
                    .saturating_add(self.terms.lockup_duration_blocks),
                tvl_gated: self.terms.lockup_tvl_threshold > 0,
                reason: LockReason::Purchase(self.generation),
            };
            token.lock(&self.address, buyer, entry, ctx.block)?;
        }

        self.purchased_by.insert(*buyer, buyer_total);
        self.total_purchased = total;
        self.paid_by
            .entry(*buyer)
            .or_default()
            .insert(payment.asset, paid_total);
        self.collected.insert(payment.asset, collected_total);

        info!(
            pool = %self.pool,
            generation = %self.generation,
            buyer = %buyer,
            amount,
            locked,
            paid = payment.amount,
            asset = %payment.asset,
            "purchase"
        );
        ctx.emit(Event::Purchased {
            pool: self.pool,
            generation: self.generation,
            buyer: *buyer,
            amount,
            asset: payment.asset,
            paid: payment.amount,
        });

        Ok(PurchaseReceipt {
            minted: amount,
            locked,
            paid: payment,
        })
    }

    fn paid(&self, buyer: &Address, asset: &Asset) -> Amount {
        self.paid_by
            .get(buyer)
            .and_then(|paid| paid.get(asset))
            .copied()
            .unwrap_or(0)
    }

    /// Refund a failed campaign.
    ///
    /// Burns at most what the caller purchased here, never tokens received by
    /// transfer and never tokens held by another lock (e.g. a vote). Refunds
    /// the matching share of every asset the caller paid. Calling again with
    /// nothing left is a no-op.
    pub fn redeem(
        &mut self,
        ctx: &mut TxContext<'_>,
        token: &mut GovernanceToken,
        buyer: &Address,
    ) -> PoolResult<RedeemReceipt> {
        self.ensure_token(token)?;
        self.ensure_state(ctx.block, TgeState::Failed)?;

        let block = ctx.block;
        let purchased = self.purchased_by(buyer);
        let purchase_locked = token.purchase_locked(buyer, self.generation, block);
        let other_locked = token
            .locked_balance_of(buyer, block)
            .saturating_sub(purchase_locked);
        let burnable = purchased.min(token.balance_of(buyer).saturating_sub(other_locked));

        if burnable == 0 {
            debug!(pool = %self.pool, generation = %self.generation, buyer = %buyer, "nothing to redeem");
            return Ok(RedeemReceipt::default());
        }

        let mut refunds = Vec::new();
        for (asset, paid) in self.paid_by(buyer) {
            let refund = if burnable == purchased {
                paid
            } else {
                mul_div(paid, burnable, purchased)?
            };
            refunds.push((asset, refund));
        }

        token.release_purchase_locks(&self.address, self.generation, buyer, burnable, block)?;
        token.burn(&self.address, buyer, burnable, block)?;
        for (asset, refund) in &refunds {
            ctx.ledger.transfer(&self.address, buyer, *asset, *refund)?;
        }

        self.purchased_by
            .insert(*buyer, checked_sub(purchased, burnable)?);
        self.total_purchased = checked_sub(self.total_purchased, burnable)?;
        for (asset, refund) in &refunds {
            if let Some(paid) = self.paid_by.get_mut(buyer).and_then(|p| p.get_mut(asset)) {
                *paid = checked_sub(*paid, *refund)?;
            }
            if let Some(held) = self.collected.get_mut(asset) {
                *held = checked_sub(*held, *refund)?;
            }
        }

        info!(
            pool = %self.pool,
            generation = %self.generation,
            buyer = %buyer,
            burned = burnable,
            "redeem"
        );
        ctx.emit(Event::Redeemed {
            pool: self.pool,
            generation: self.generation,
            buyer: *buyer,
            amount: burnable,
        });

        Ok(RedeemReceipt {
            burned: burnable,
            refunds,
        })
    }

    /// Move the escrowed payment to the pool treasury, once.
    pub fn transfer_funds(
        &mut self,
        ctx: &mut TxContext<'_>,
        caller: &Address,
    ) -> PoolResult<Vec<(Asset, Amount)>> {
        self.ensure_state(ctx.block, TgeState::Successful)?;
        self.ensure_owner(caller)?;
        if self.funds_transferred {
            return Err(PoolError::WrongState("funds already transferred".to_string()));
        }

        let moved = self.collected();
        for (asset, amount) in &moved {
            ctx.ledger
                .transfer(&self.address, &self.pool_address, *asset, *amount)?;
        }
        self.funds_transferred = true;

        for (asset, amount) in &moved {
            info!(pool = %self.pool, generation = %self.generation, asset = %asset, amount, "funds transferred");
            ctx.emit(Event::FundsTransferred {
                pool: self.pool,
                generation: self.generation,
                asset: *asset,
                amount: *amount,
            });
        }
        Ok(moved)
    }

    /// Open the TVL gate once the pool's treasury value reaches the threshold.
    ///
    /// `pool_tvl` is the treasury value in the unit of account. The flag never
    /// resets; a repeated call is a no-op.
    pub fn set_lockup_tvl_reached(
        &self,
        ctx: &mut TxContext<'_>,
        token: &mut GovernanceToken,
        caller: &Address,
        pool_tvl: Amount,
    ) -> PoolResult<()> {
        self.ensure_token(token)?;
        self.ensure_owner(caller)?;
        if self.lockup_tvl_reached(token) {
            return Ok(());
        }
        if pool_tvl < self.terms.lockup_tvl_threshold {
            return Err(PoolError::TvlBelowThreshold {
                tvl: pool_tvl,
                threshold: self.terms.lockup_tvl_threshold,
            });
        }

        token.open_tvl_gate(&self.address, self.generation)?;
        info!(pool = %self.pool, generation = %self.generation, pool_tvl, "lockup TVL reached");
        ctx.emit(Event::LockupTvlReached {
            pool: self.pool,
            generation: self.generation,
        });
        Ok(())
    }

    /// Surface an explicit error while purchase lockups are still active.
    ///
    /// Release itself is passive; a successful claim only prunes released
    /// entries.
    pub fn claim(
        &self,
        token: &mut GovernanceToken,
        caller: &Address,
        block: BlockHeight,
    ) -> PoolResult<()> {
        self.ensure_token(token)?;
        if token.purchase_locked(caller, self.generation, block) > 0 {
            return Err(PoolError::ClaimNotAvailable);
        }
        token.prune(caller, block);
        Ok(())
    }
}
