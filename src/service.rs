//! Pool factory: creator whitelist, creation fee and fee treasury.

use crate::context::TxContext;
use crate::crowdsale::TgeTerms;
use crate::error::{PoolError, PoolResult, Role};
use crate::events::Event;
use crate::governance::GovernanceSettings;
use crate::token::TokenInfo;
use crate::types::{Address, Amount, Asset, PoolId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Arguments of `create_pool`.
///
/// With `existing` set, a new TGE generation is started for that pool
/// instead of creating a pool; `jurisdiction`, `entity_type` and `name` are
/// then ignored. Without `governance`, a new pool takes the factory's
/// default settings and an existing pool keeps its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRequest {
    pub existing: Option<PoolId>,
    pub token: TokenInfo,
    pub tge: TgeTerms,
    #[serde(default)]
    pub governance: Option<GovernanceSettings>,
    pub jurisdiction: u16,
    pub entity_type: u16,
    pub name: String,
}

/// Handles returned by `create_pool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCreated {
    pub pool: PoolId,
    pub pool_address: Address,
    pub token: Address,
    pub tge: Address,
}

/// Factory configuration and collected fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    owner: Address,
    address: Address,
    creator_whitelist: BTreeSet<Address>,
    /// Native-currency fee charged per `create_pool` call.
    fee: Amount,
    #[serde(default)]
    default_governance: GovernanceSettings,
}

impl Service {
    pub fn new(owner: Address, fee: Amount) -> Self {
        Self {
            owner,
            address: Address::derive("service", &[&owner.0]),
            creator_whitelist: BTreeSet::new(),
            fee,
            default_governance: GovernanceSettings::default(),
        }
    }

    pub fn with_default_governance(mut self, settings: GovernanceSettings) -> Self {
        self.default_governance = settings;
        self
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Account holding collected fees.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// Settings for new pools whose request carries none.
    pub fn default_governance(&self) -> GovernanceSettings {
        self.default_governance
    }

    pub fn is_whitelisted(&self, creator: &Address) -> bool {
        self.creator_whitelist.contains(creator)
    }

    fn ensure_owner(&self, caller: &Address) -> PoolResult<()> {
        if *caller != self.owner {
            return Err(PoolError::Unauthorized {
                role: Role::ServiceOwner,
                caller: *caller,
            });
        }
        Ok(())
    }

    pub fn add_to_whitelist(&mut self, caller: &Address, creator: Address) -> PoolResult<()> {
        self.ensure_owner(caller)?;
        if !self.creator_whitelist.insert(creator) {
            return Err(PoolError::AlreadyWhitelisted(creator));
        }
        info!(creator = %creator, "creator whitelisted");
        Ok(())
    }

    pub fn remove_from_whitelist(&mut self, caller: &Address, creator: Address) -> PoolResult<()> {
        self.ensure_owner(caller)?;
        if !self.creator_whitelist.remove(&creator) {
            return Err(PoolError::AlreadyNotWhitelisted(creator));
        }
        info!(creator = %creator, "creator removed from whitelist");
        Ok(())
    }

    pub fn set_fee(&mut self, caller: &Address, fee: Amount) -> PoolResult<()> {
        self.ensure_owner(caller)?;
        self.fee = fee;
        info!(fee, "creation fee updated");
        Ok(())
    }

    pub fn set_default_governance(
        &mut self,
        caller: &Address,
        settings: GovernanceSettings,
    ) -> PoolResult<()> {
        self.ensure_owner(caller)?;
        settings.validate()?;
        self.default_governance = settings;
        info!(
            quorum = settings.quorum_percent,
            threshold = settings.threshold_percent,
            lifespan = settings.lifespan_blocks,
            "default governance updated"
        );
        Ok(())
    }

    /// Check the creator and take the exact creation fee.
    pub fn collect_fee(
        &self,
        ctx: &mut TxContext<'_>,
        creator: &Address,
        fee_paid: Amount,
    ) -> PoolResult<()> {
        if !self.is_whitelisted(creator) {
            return Err(PoolError::CreatorNotWhitelisted(*creator));
        }
        if fee_paid != self.fee {
            return Err(PoolError::IncorrectFee {
                expected: self.fee,
                received: fee_paid,
            });
        }
        if fee_paid > 0 {
            ctx.ledger
                .transfer(creator, &self.address, Asset::Native, fee_paid)?;
            ctx.emit(Event::FeeCollected {
                payer: *creator,
                amount: fee_paid,
            });
        }
        Ok(())
    }

    /// Send all collected fees to `to`.
    pub fn withdraw_fees(
        &self,
        ctx: &mut TxContext<'_>,
        caller: &Address,
        to: &Address,
    ) -> PoolResult<Amount> {
        self.ensure_owner(caller)?;
        let amount = ctx.ledger.balance_of(&self.address, &Asset::Native);
        ctx.ledger.transfer(&self.address, to, Asset::Native, amount)?;
        info!(to = %to, amount, "fees withdrawn");
        Ok(amount)
    }
}
