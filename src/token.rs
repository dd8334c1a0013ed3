//! Governance token ledger with a parallel lock ledger.
//!
//! Balances are plain integers in the token's smallest unit. Every lock is a
//! [`LockEntry`]: purchase lockups and vote locks share one mechanism, so
//! "is this amount free?" is a single predicate over the entries.
//!
//! A token outlives the crowdsale that created it: secondary campaigns sell
//! the same token, so the token records every engine that sold it, keyed by
//! generation. The latest engine mints; any of them may burn its own refunds.
//!
//! Invariants:
//! - `total_supply <= cap`
//! - `locked_balance_of(addr) <= balance_of(addr)` at every reachable state
//! - transfers move at most `unlocked_balance_of(from)`

use crate::error::{PoolError, PoolResult, Role};
use crate::types::{checked_add, checked_sub, Address, Amount, BlockHeight, GenerationId, ProposalId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Descriptive terms of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    /// Maximum mintable supply.
    pub cap: Amount,
    /// Display decimals only; all arithmetic is on smallest units.
    #[serde(default)]
    pub decimals: u8,
}

/// Why an amount is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    /// Crowdsale lockup on tokens bought in the given generation.
    Purchase(GenerationId),
    /// Tokens committed to a proposal vote.
    Vote(ProposalId),
}

/// One independently released hold on part of a balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub amount: Amount,
    pub unlock_block: BlockHeight,
    pub tvl_gated: bool,
    pub reason: LockReason,
}

impl LockEntry {
    /// Released once the unlock block passed and, if gated, the selling
    /// generation reached its TVL threshold.
    ///
    /// Both inputs only move forward, so a released entry stays released.
    pub fn is_active(&self, block: BlockHeight, tvl_reached: &BTreeSet<GenerationId>) -> bool {
        if block < self.unlock_block {
            return true;
        }
        match self.reason {
            LockReason::Purchase(generation) if self.tvl_gated => !tvl_reached.contains(&generation),
            _ => false,
        }
    }
}

/// Capped, engine-mintable token with lock accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceToken {
    address: Address,
    info: TokenInfo,
    /// Engines that sold this token. The highest generation mints.
    engines: BTreeMap<GenerationId, Address>,
    /// Pool allowed to place vote locks and grant minting.
    pool: Address,
    /// Generations whose lockup TVL gate is open.
    tvl_reached: BTreeSet<GenerationId>,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    locks: BTreeMap<Address, Vec<LockEntry>>,
}

impl GovernanceToken {
    pub fn new(
        address: Address,
        info: TokenInfo,
        generation: GenerationId,
        engine: Address,
        pool: Address,
    ) -> Self {
        Self {
            address,
            info,
            engines: BTreeMap::from([(generation, engine)]),
            pool,
            tvl_reached: BTreeSet::new(),
            total_supply: 0,
            balances: BTreeMap::new(),
            locks: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn info(&self) -> &TokenInfo {
        &self.info
    }

    pub fn cap(&self) -> Amount {
        self.info.cap
    }

    /// Supply still mintable under the cap.
    pub fn remaining_supply(&self) -> Amount {
        self.info.cap.saturating_sub(self.total_supply)
    }

    /// Engine currently holding the mint capability.
    pub fn minter(&self) -> Address {
        self.engines
            .last_key_value()
            .map(|(_, engine)| *engine)
            .unwrap_or(Address::ZERO)
    }

    /// Engine that sold this token in `generation`, if any.
    pub fn engine_of(&self, generation: GenerationId) -> Option<Address> {
        self.engines.get(&generation).copied()
    }

    pub fn generations(&self) -> impl Iterator<Item = GenerationId> + '_ {
        self.engines.keys().copied()
    }

    pub fn is_tvl_reached(&self, generation: GenerationId) -> bool {
        self.tvl_reached.contains(&generation)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, addr: &Address) -> Amount {
        self.balances.get(addr).copied().unwrap_or(0)
    }

    /// Holders with a non-zero balance.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter().filter(|(_, amount)| **amount > 0)
    }

    /// All lock entries recorded for `addr`, active or not yet pruned.
    pub fn lock_entries(&self, addr: &Address) -> &[LockEntry] {
        self.locks.get(addr).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of active lock entries.
    pub fn locked_balance_of(&self, addr: &Address, block: BlockHeight) -> Amount {
        self.active_locked(addr, block, |_| true)
    }

    /// Sum of active lock entries held for `reason`.
    pub fn locked_for(&self, addr: &Address, reason: LockReason, block: BlockHeight) -> Amount {
        self.active_locked(addr, block, |r| *r == reason)
    }

    /// Sum of active purchase lockups from `generation`.
    pub fn purchase_locked(
        &self,
        addr: &Address,
        generation: GenerationId,
        block: BlockHeight,
    ) -> Amount {
        self.locked_for(addr, LockReason::Purchase(generation), block)
    }

    pub fn unlocked_balance_of(&self, addr: &Address, block: BlockHeight) -> Amount {
        self.balance_of(addr)
            .saturating_sub(self.locked_balance_of(addr, block))
    }

    fn active_locked(
        &self,
        addr: &Address,
        block: BlockHeight,
        filter: impl Fn(&LockReason) -> bool,
    ) -> Amount {
        self.lock_entries(addr)
            .iter()
            .filter(|entry| filter(&entry.reason) && entry.is_active(block, &self.tvl_reached))
            .fold(0, |acc: Amount, entry| acc.saturating_add(entry.amount))
    }

    fn ensure_minter(&self, caller: &Address) -> PoolResult<()> {
        if *caller != self.minter() {
            return Err(PoolError::Unauthorized {
                role: Role::Minter,
                caller: *caller,
            });
        }
        Ok(())
    }

    /// `caller` must be the engine of `generation`.
    fn ensure_engine(&self, caller: &Address, generation: GenerationId) -> PoolResult<()> {
        if self.engine_of(generation) != Some(*caller) {
            return Err(PoolError::Unauthorized {
                role: Role::Minter,
                caller: *caller,
            });
        }
        Ok(())
    }

    fn is_any_engine(&self, caller: &Address) -> bool {
        self.engines.values().any(|engine| engine == caller)
    }

    /// Hand the mint capability to the engine of a later generation.
    pub fn grant_minter(
        &mut self,
        caller: &Address,
        generation: GenerationId,
        engine: Address,
    ) -> PoolResult<()> {
        if *caller != self.pool {
            return Err(PoolError::Unauthorized {
                role: Role::PoolOwner,
                caller: *caller,
            });
        }
        if let Some((latest, _)) = self.engines.last_key_value() {
            if generation <= *latest {
                return Err(PoolError::WrongState(format!(
                    "token {} already sold in {}",
                    self.address, latest
                )));
            }
        }
        self.engines.insert(generation, engine);
        debug!(token = %self.address, generation = %generation, engine = %engine, "minter granted");
        Ok(())
    }

    /// Open the TVL gate for purchase lockups of `generation`. Idempotent.
    pub fn open_tvl_gate(&mut self, caller: &Address, generation: GenerationId) -> PoolResult<()> {
        self.ensure_engine(caller, generation)?;
        self.tvl_reached.insert(generation);
        Ok(())
    }

    /// Check a mint would fit under the cap without applying it.
    pub fn ensure_mintable(&self, amount: Amount) -> PoolResult<()> {
        let would_have = checked_add(self.total_supply, amount)?;
        if would_have > self.info.cap {
            return Err(PoolError::CapExceeded {
                cap: self.info.cap,
                would_have,
            });
        }
        Ok(())
    }

    pub fn mint(&mut self, caller: &Address, to: &Address, amount: Amount) -> PoolResult<()> {
        self.ensure_minter(caller)?;
        self.ensure_mintable(amount)?;
        let new_balance = checked_add(self.balance_of(to), amount)?;

        self.total_supply += amount;
        self.balances.insert(*to, new_balance);
        debug!(token = %self.address, to = %to, amount, "minted");
        Ok(())
    }

    /// Burn from `from`. Active locks may not end up above the balance, so
    /// callers burning locked tokens must release those locks first.
    pub fn burn(
        &mut self,
        caller: &Address,
        from: &Address,
        amount: Amount,
        block: BlockHeight,
    ) -> PoolResult<()> {
        if !self.is_any_engine(caller) {
            return Err(PoolError::Unauthorized {
                role: Role::Minter,
                caller: *caller,
            });
        }
        let balance = self.balance_of(from);
        if amount > balance {
            return Err(PoolError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }
        let unlocked = self.unlocked_balance_of(from, block);
        if amount > unlocked {
            return Err(PoolError::InsufficientUnlockedBalance {
                available: unlocked,
                requested: amount,
            });
        }

        self.balances.insert(*from, balance - amount);
        self.total_supply = checked_sub(self.total_supply, amount)?;
        debug!(token = %self.address, from = %from, amount, "burned");
        Ok(())
    }

    /// Place a lock. Vote locks come from the pool, purchase lockups from
    /// the engine of that generation. Only unlocked tokens can be locked.
    pub fn lock(
        &mut self,
        caller: &Address,
        addr: &Address,
        entry: LockEntry,
        block: BlockHeight,
    ) -> PoolResult<()> {
        let allowed = match entry.reason {
            LockReason::Vote(_) => *caller == self.pool,
            LockReason::Purchase(generation) => self.engine_of(generation) == Some(*caller),
        };
        if !allowed {
            return Err(PoolError::Unauthorized {
                role: Role::Locker,
                caller: *caller,
            });
        }
        let unlocked = self.unlocked_balance_of(addr, block);
        if entry.amount > unlocked {
            return Err(PoolError::InsufficientUnlockedBalance {
                available: unlocked,
                requested: entry.amount,
            });
        }
        if entry.amount == 0 {
            return Ok(());
        }

        debug!(
            token = %self.address,
            holder = %addr,
            amount = entry.amount,
            unlock_block = entry.unlock_block,
            tvl_gated = entry.tvl_gated,
            "locked"
        );
        let tvl_reached = &self.tvl_reached;
        let entries = self.locks.entry(*addr).or_default();
        entries.retain(|e| e.is_active(block, tvl_reached));
        entries.push(entry);
        Ok(())
    }

    /// Release up to `amount` of the active purchase lockups `generation`
    /// placed on `addr`.
    ///
    /// Used by that generation's engine when refunded tokens are burned.
    /// Returns the amount actually released.
    pub fn release_purchase_locks(
        &mut self,
        caller: &Address,
        generation: GenerationId,
        addr: &Address,
        amount: Amount,
        block: BlockHeight,
    ) -> PoolResult<Amount> {
        self.ensure_engine(caller, generation)?;
        let tvl_reached = &self.tvl_reached;
        let Some(entries) = self.locks.get_mut(addr) else {
            return Ok(0);
        };

        let mut remaining = amount;
        for entry in entries.iter_mut().filter(|e| {
            e.reason == LockReason::Purchase(generation) && e.is_active(block, tvl_reached)
        }) {
            if remaining == 0 {
                break;
            }
            let take = entry.amount.min(remaining);
            entry.amount -= take;
            remaining -= take;
        }
        entries.retain(|e| e.amount > 0 && e.is_active(block, tvl_reached));
        Ok(amount - remaining)
    }

    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
        block: BlockHeight,
    ) -> PoolResult<()> {
        if to.is_zero() {
            return Err(PoolError::InvalidArgument(
                "transfer to the zero address".to_string(),
            ));
        }
        let unlocked = self.unlocked_balance_of(from, block);
        if amount > unlocked {
            return Err(PoolError::InsufficientUnlockedBalance {
                available: unlocked,
                requested: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = checked_add(self.balance_of(to), amount)?;

        self.balances.insert(*from, self.balance_of(from) - amount);
        self.balances.insert(*to, to_balance);
        self.prune(from, block);
        Ok(())
    }

    /// Drop released entries for `addr`.
    pub fn prune(&mut self, addr: &Address, block: BlockHeight) {
        let tvl_reached = &self.tvl_reached;
        if let Some(entries) = self.locks.get_mut(addr) {
            entries.retain(|e| e.is_active(block, tvl_reached));
            if entries.is_empty() {
                self.locks.remove(addr);
            }
        }
    }
}
