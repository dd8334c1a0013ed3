//! Property-based tests for the crowdsale engine
//!
//! Tests for:
//! - Accounting: per-buyer purchases always sum to the total, never above hardcap
//! - Lock safety: locked balance never exceeds the balance
//! - Refunds: a failed campaign returns every escrowed unit, once

use super::{CrowdsaleEngine, Payment, TgeState, TgeTerms};
use crate::collaborators::FixedRateRouter;
use crate::context::TxContext;
use crate::events::EventLog;
use crate::ledger::Ledger;
use crate::token::{GovernanceToken, TokenInfo};
use crate::types::{Address, Amount, Asset, GenerationId, PoolId};
use proptest::prelude::*;
use std::collections::BTreeSet;

const PRICE: Amount = 1_000;

fn buyer(id: u8) -> Address {
    Address::from_label(&format!("buyer-{}", id))
}

fn terms(softcap: Amount, lockup_percent: u8) -> TgeTerms {
    TgeTerms {
        price: PRICE,
        softcap,
        hardcap: 5_000,
        min_purchase: 1,
        max_purchase: 2_000,
        lockup_percent,
        lockup_duration_blocks: 30,
        lockup_tvl_threshold: 0,
        run_duration_blocks: 20,
        unit_of_account: Asset::Native,
        user_whitelist: BTreeSet::new(),
        metadata_uri: String::new(),
    }
}

struct Sale {
    engine: CrowdsaleEngine,
    token: GovernanceToken,
    ledger: Ledger,
    router: FixedRateRouter,
    events: EventLog,
}

impl Sale {
    fn new(terms: TgeTerms) -> Self {
        let engine_addr = Address::from_label("engine");
        let pool_addr = Address::from_label("pool");
        let mut ledger = Ledger::new();
        for id in 0..8 {
            ledger
                .credit(&buyer(id), Asset::Native, 10_000 * PRICE)
                .unwrap();
        }
        Self {
            engine: CrowdsaleEngine::new(
                engine_addr,
                PoolId(0),
                pool_addr,
                Address::from_label("owner"),
                GenerationId(0),
                terms,
                0,
            ),
            token: GovernanceToken::new(
                Address::from_label("token"),
                TokenInfo {
                    name: "Prop".to_string(),
                    symbol: "PRP".to_string(),
                    cap: 10_000,
                    decimals: 0,
                },
                GenerationId(0),
                engine_addr,
                pool_addr,
            ),
            ledger,
            router: FixedRateRouter::new(),
            events: EventLog::new(),
        }
    }

    fn ctx(&mut self, block: u64) -> (TxContext<'_>, &mut CrowdsaleEngine, &mut GovernanceToken) {
        (
            TxContext {
                block,
                ledger: &mut self.ledger,
                router: &self.router,
                events: &mut self.events,
            },
            &mut self.engine,
            &mut self.token,
        )
    }
}

fn purchases() -> impl Strategy<Value = Vec<(u8, Amount, u64)>> {
    prop::collection::vec((0u8..8, 1u128..2_500, 0u64..25), 1..30)
}

proptest! {
    /// Property test: per-buyer purchases sum to the total, capped by hardcap
    #[test]
    fn prop_purchase_accounting(orders in purchases(), lockup in 0u8..=100) {
        let mut sale = Sale::new(terms(1_000, lockup));
        for (id, amount, block) in orders {
            let (mut ctx, engine, token) = sale.ctx(block);
            let _ = engine.purchase(&mut ctx, token, &buyer(id), amount, Payment::native(amount * PRICE));
        }

        let sum: Amount = sale.engine.purchasers().map(|(_, n)| *n).sum();
        prop_assert_eq!(sum, sale.engine.total_purchased());
        prop_assert!(sale.engine.total_purchased() <= 5_000);
        prop_assert_eq!(sale.token.total_supply(), sale.engine.total_purchased());
        prop_assert_eq!(
            sale.ledger.balance_of(&sale.engine.address(), &Asset::Native),
            sale.engine.total_purchased() * PRICE
        );
    }

    /// Property test: locks never exceed balances at any block
    #[test]
    fn prop_locked_never_exceeds_balance(orders in purchases(), at_block in 0u64..60) {
        let mut sale = Sale::new(terms(1_000, 50));
        for (id, amount, block) in orders {
            let (mut ctx, engine, token) = sale.ctx(block);
            let _ = engine.purchase(&mut ctx, token, &buyer(id), amount, Payment::native(amount * PRICE));
        }

        for id in 0..8 {
            let holder = buyer(id);
            prop_assert!(sale.token.locked_balance_of(&holder, at_block) <= sale.token.balance_of(&holder));
        }
    }

    /// Property test: failed campaigns refund everything, and redeem is idempotent
    #[test]
    fn prop_redeem_refunds_all(orders in purchases()) {
        // Softcap above hardcap is never reached.
        let mut sale = Sale::new(terms(5_000, 50));
        for (id, amount, block) in orders {
            let (mut ctx, engine, token) = sale.ctx(block);
            let _ = engine.purchase(&mut ctx, token, &buyer(id), amount.min(999), Payment::native(amount.min(999) * PRICE));
        }
        prop_assume!(sale.engine.state(20) == TgeState::Failed);

        for id in 0..8 {
            let (mut ctx, engine, token) = sale.ctx(20);
            engine.redeem(&mut ctx, token, &buyer(id)).unwrap();
            let (mut ctx, engine, token) = sale.ctx(21);
            let again = engine.redeem(&mut ctx, token, &buyer(id)).unwrap();
            prop_assert_eq!(again.burned, 0);
            prop_assert_eq!(sale.ledger.balance_of(&buyer(id), &Asset::Native), 10_000 * PRICE);
        }
        prop_assert_eq!(sale.engine.total_purchased(), 0);
        prop_assert_eq!(sale.token.total_supply(), 0);
        prop_assert_eq!(sale.ledger.balance_of(&sale.engine.address(), &Asset::Native), 0);
    }
}
