//! Shared fixture for integration tests.
//!
//! Mirrors a typical first raise: cap 10 000 tokens at 0.01 native each,
//! softcap 1 000, hardcap 5 000, half of every purchase locked for 50 blocks
//! or until the treasury holds 20 native.

#![allow(dead_code)]

use daopool::chain::{Chain, ChainState, Collaborators};
use daopool::collaborators::{FixedRateRouter, MemoryMetadata};
use daopool::crowdsale::{Payment, PurchaseReceipt, TgeTerms};
use daopool::error::PoolResult;
use daopool::governance::GovernanceSettings;
use daopool::service::{PoolCreated, PoolRequest};
use daopool::token::TokenInfo;
use daopool::types::{Address, Amount, Asset, GenerationId, PoolId};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const ETH: Amount = 1_000_000_000_000_000_000;
pub const PRICE: Amount = ETH / 100;
pub const JURISDICTION: u16 = 1;
pub const ENTITY_TYPE: u16 = 1;

pub fn account(label: &str) -> Address {
    Address::from_label(label)
}

pub fn token_info(symbol: &str) -> TokenInfo {
    TokenInfo {
        name: format!("{} Governance", symbol),
        symbol: symbol.to_string(),
        cap: 10_000,
        decimals: 0,
    }
}

pub fn tge_terms() -> TgeTerms {
    TgeTerms {
        price: PRICE,
        softcap: 1_000,
        hardcap: 5_000,
        min_purchase: 10,
        max_purchase: 3_000,
        lockup_percent: 50,
        lockup_duration_blocks: 50,
        lockup_tvl_threshold: 20 * ETH,
        run_duration_blocks: 20,
        unit_of_account: Asset::Native,
        user_whitelist: BTreeSet::new(),
        metadata_uri: "ipfs://tge-metadata".to_string(),
    }
}

/// Same campaign without lockups, so every purchased token can vote.
pub fn tge_terms_unlocked() -> TgeTerms {
    TgeTerms {
        lockup_percent: 0,
        lockup_duration_blocks: 0,
        lockup_tvl_threshold: 0,
        ..tge_terms()
    }
}

pub fn pool_request(tge: TgeTerms, governance: GovernanceSettings) -> PoolRequest {
    PoolRequest {
        existing: None,
        token: token_info("DAO"),
        tge,
        governance: Some(governance),
        jurisdiction: JURISDICTION,
        entity_type: ENTITY_TYPE,
        name: "Test DAO".to_string(),
    }
}

pub struct Harness {
    pub chain: Chain,
    pub router: FixedRateRouter,
    pub metadata: MemoryMetadata,
    pub operator: Address,
    pub creator: Address,
}

impl Harness {
    /// Chain with a whitelisted, funded creator and no pools.
    pub fn empty(fee: Amount) -> Self {
        let operator = account("operator");
        let creator = account("creator");
        let router = FixedRateRouter::new();
        let metadata = MemoryMetadata::new();
        metadata.create_record(JURISDICTION, ENTITY_TYPE);

        let mut chain = Chain::new(
            ChainState::genesis(operator, fee),
            Collaborators {
                router: Arc::new(router.clone()),
                metadata: Arc::new(metadata.clone()),
            },
        );
        chain.add_creator(&operator, creator).unwrap();
        chain.fund(&creator, Asset::Native, 100 * ETH).unwrap();

        Self {
            chain,
            router,
            metadata,
            operator,
            creator,
        }
    }

    /// Chain with one pool whose first TGE uses `terms`.
    pub fn with_terms(terms: TgeTerms) -> (Self, PoolCreated) {
        Self::with_pool(terms, GovernanceSettings::default())
    }

    pub fn with_pool(terms: TgeTerms, governance: GovernanceSettings) -> (Self, PoolCreated) {
        let mut harness = Self::empty(0);
        let creator = harness.creator;
        let created = harness
            .chain
            .create_pool(&creator, pool_request(terms, governance), 0)
            .unwrap();
        harness.chain.drain_events();
        (harness, created)
    }

    pub fn fund(&mut self, who: &Address, amount: Amount) {
        self.chain.fund(who, Asset::Native, amount).unwrap();
    }

    /// Buy `amount` from the current TGE paying the exact native price.
    pub fn buy(&mut self, pool: PoolId, who: &Address, amount: Amount) -> PoolResult<PurchaseReceipt> {
        self.chain
            .purchase(who, pool, amount, Payment::native(amount * PRICE))
    }

    /// Fund and buy in one step.
    pub fn funded_buy(&mut self, pool: PoolId, who: &Address, amount: Amount) -> PurchaseReceipt {
        self.fund(who, amount * PRICE);
        self.buy(pool, who, amount).unwrap()
    }

    /// Mine until the chain reaches `block`.
    pub fn mine_to(&mut self, block: u64) {
        let current = self.chain.block();
        assert!(block >= current, "cannot mine backwards");
        self.chain.mine(block - current);
    }

    pub fn native(&self, who: &Address) -> Amount {
        self.chain.balance(who, &Asset::Native)
    }

    pub fn tokens(&self, pool: PoolId, generation: u32, who: &Address) -> Amount {
        self.chain
            .token_balance(pool, GenerationId(generation), who)
            .unwrap()
    }
}
