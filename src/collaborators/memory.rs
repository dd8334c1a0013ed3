//! In-memory collaborators for tests and local simulation.

use super::traits::*;
use crate::error::{PoolError, PoolResult};
use crate::types::{checked_mul, Amount, Asset};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Exchange rate expressed as `numerator / denominator` units of the target
/// asset per unit of the source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub numerator: Amount,
    pub denominator: Amount,
}

impl Rate {
    pub fn new(numerator: Amount, denominator: Amount) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    fn apply(&self, amount: Amount) -> PoolResult<Amount> {
        if self.denominator == 0 {
            return Err(PoolError::InvalidArgument("zero rate denominator".to_string()));
        }
        Ok(checked_mul(amount, self.numerator)? / self.denominator)
    }
}

/// Whitelist with fixed direct conversion rates.
///
/// Only direct pairs are routed; there is no multi-hop search.
#[derive(Clone, Default)]
pub struct FixedRateRouter {
    state: Arc<Mutex<RouterState>>,
}

#[derive(Default)]
struct RouterState {
    whitelist: HashSet<Asset>,
    rates: HashMap<(Asset, Asset), Rate>,
}

impl FixedRateRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `asset` for payments.
    pub fn whitelist(&self, asset: Asset) {
        let mut state = self.state.lock().unwrap();
        state.whitelist.insert(asset);
    }

    /// Register a conversion rate from `from` to `to`.
    pub fn set_rate(&self, from: Asset, to: Asset, rate: Rate) {
        let mut state = self.state.lock().unwrap();
        state.rates.insert((from, to), rate);
    }
}

impl PaymentRouter for FixedRateRouter {
    fn is_whitelisted(&self, asset: &Asset) -> bool {
        if *asset == Asset::Native {
            return true;
        }
        let state = self.state.lock().unwrap();
        state.whitelist.contains(asset)
    }

    fn convert(&self, from: Asset, to: Asset, amount: Amount) -> PoolResult<Amount> {
        if from == to {
            return Ok(amount);
        }
        let state = self.state.lock().unwrap();
        let rate = state
            .rates
            .get(&(from, to))
            .copied()
            .ok_or(PoolError::NoRoute { from, to })?;
        rate.apply(amount)
    }
}

/// Metadata registry backed by a set of `(jurisdiction, entity_type)` pairs.
#[derive(Clone, Default)]
pub struct MemoryMetadata {
    records: Arc<Mutex<BTreeSet<(u16, u16)>>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_record(&self, jurisdiction: u16, entity_type: u16) {
        let mut records = self.records.lock().unwrap();
        records.insert((jurisdiction, entity_type));
    }
}

impl MetadataRegistry for MemoryMetadata {
    fn record_exists(&self, jurisdiction: u16, entity_type: u16) -> bool {
        let records = self.records.lock().unwrap();
        records.contains(&(jurisdiction, entity_type))
    }
}
