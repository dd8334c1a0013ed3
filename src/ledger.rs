//! Host ledger: native and token balances of every account.
//!
//! Treasury holdings of pools and escrow held by crowdsale engines live here,
//! keyed by the entity's derived address.
//!
//! Between [`Ledger::begin`] and [`Ledger::commit`] every write records the
//! value it replaced, so [`Ledger::rollback`] can restore the balances
//! without the ledger ever being copied.

use crate::error::{PoolError, PoolResult};
use crate::types::{checked_add, Address, Amount, Asset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prior value of one balance slot; `None` when the slot did not exist.
type UndoEntry = (Address, Asset, Option<Amount>);

/// Balances per account and asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    balances: BTreeMap<Address, BTreeMap<Asset, Amount>>,
    #[serde(skip)]
    undo: Option<Vec<UndoEntry>>,
}

impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.balances == other.balances
    }
}

impl Eq for Ledger {}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address, asset: &Asset) -> Amount {
        self.balances
            .get(account)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or(0)
    }

    /// Non-zero holdings of `account`.
    pub fn holdings(&self, account: &Address) -> Vec<(Asset, Amount)> {
        self.balances
            .get(account)
            .map(|assets| {
                assets
                    .iter()
                    .filter(|(_, amount)| **amount > 0)
                    .map(|(asset, amount)| (*asset, *amount))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set(&mut self, account: &Address, asset: Asset, amount: Amount) {
        let prior = self.balances.entry(*account).or_default().insert(asset, amount);
        if let Some(undo) = self.undo.as_mut() {
            undo.push((*account, asset, prior));
        }
    }

    /// Start journaling writes for a transaction.
    pub fn begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    /// Keep every write since `begin`.
    pub fn commit(&mut self) {
        self.undo = None;
    }

    /// Undo every write since `begin`, newest first.
    pub fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        for (account, asset, prior) in undo.into_iter().rev() {
            match prior {
                Some(amount) => {
                    self.balances.entry(account).or_default().insert(asset, amount);
                }
                None => {
                    if let Some(assets) = self.balances.get_mut(&account) {
                        assets.remove(&asset);
                        if assets.is_empty() {
                            self.balances.remove(&account);
                        }
                    }
                }
            }
        }
    }

    /// Credit an account out of thin air (genesis allocation, faucet).
    pub fn credit(&mut self, account: &Address, asset: Asset, amount: Amount) -> PoolResult<()> {
        let balance = checked_add(self.balance_of(account, &asset), amount)?;
        self.set(account, asset, balance);
        Ok(())
    }

    /// Fail unless `account` holds at least `amount` of `asset`.
    pub fn ensure_balance(&self, account: &Address, asset: &Asset, amount: Amount) -> PoolResult<()> {
        let have = self.balance_of(account, asset);
        if have < amount {
            return Err(PoolError::InsufficientBalance { have, need: amount });
        }
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        asset: Asset,
        amount: Amount,
    ) -> PoolResult<()> {
        self.ensure_balance(from, &asset, amount)?;
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = checked_add(self.balance_of(to, &asset), amount)?;
        let from_balance = self.balance_of(from, &asset) - amount;

        self.set(from, asset, from_balance);
        self.set(to, asset, to_balance);
        Ok(())
    }
}
