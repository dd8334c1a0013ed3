//! Integration tests for the embedded node.
//!
//! Concurrent callers share one chain; every transaction sees the previous
//! one's post-state, and subscribers see committed events only.

mod common;

use common::{account, pool_request, tge_terms, Harness, ETH, PRICE};
use daopool::chain::{Collaborators, EmbeddedNode};
use daopool::crowdsale::{Payment, TgeState};
use daopool::error::PoolError;
use daopool::events::Event;
use daopool::governance::GovernanceSettings;
use daopool::types::{Address, Asset, GenerationId, PoolId};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_respect_hardcap() {
    let (mut h, created) = Harness::with_terms(tge_terms());
    let pool = created.pool;
    let buyers: Vec<Address> = (0..10).map(|i| account(&format!("buyer-{}", i))).collect();
    for buyer in &buyers {
        h.fund(buyer, 100 * ETH);
    }
    let node = EmbeddedNode::new(h.chain);

    let handles: Vec<_> = buyers
        .iter()
        .copied()
        .map(|buyer| {
            let node = node.clone();
            tokio::spawn(async move {
                node.transact(move |chain| {
                    chain.purchase(&buyer, pool, 1_000, Payment::native(1_000 * PRICE))
                })
                .await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in futures::future::join_all(handles).await {
        match handle.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.minted, 1_000);
                accepted += 1;
            }
            Err(e) => assert!(matches!(e, PoolError::HardcapOverflow { hardcap: 5_000, .. })),
        }
    }
    assert_eq!(accepted, 5);

    let (total, supply, escrow) = node
        .query(|chain| {
            let pool = chain.pool(pool).unwrap();
            let generation = pool.current().unwrap();
            (
                generation.engine.total_purchased(),
                pool.current_token().unwrap().total_supply(),
                chain.balance(&generation.engine.address(), &Asset::Native),
            )
        })
        .await;
    assert_eq!(total, 5_000);
    assert_eq!(supply, 5_000);
    assert_eq!(escrow, 5_000 * PRICE);
}

#[tokio::test]
async fn test_subscribers_see_committed_events() {
    let mut h = Harness::empty(0);
    let creator = h.creator;
    let first = h
        .chain
        .create_pool(&creator, pool_request(tge_terms(), GovernanceSettings::default()), 0)
        .unwrap();
    let second = h
        .chain
        .create_pool(&creator, pool_request(tge_terms(), GovernanceSettings::default()), 0)
        .unwrap();
    assert_eq!(second.pool, PoolId(1));
    h.chain.drain_events();

    let (alice, bob) = (account("alice"), account("bob"));
    h.fund(&alice, 100 * ETH);
    let node = EmbeddedNode::new(h.chain);

    let mut everything = node.subscribe(None);
    let mut second_only = node.subscribe(Some(second.pool));
    assert_eq!(second_only.pool(), Some(second.pool));

    node.transact(|chain| chain.purchase(&alice, first.pool, 100, Payment::native(100 * PRICE)))
        .await
        .unwrap();
    // Rejected: below the minimum purchase, so nothing is published.
    assert!(node
        .transact(|chain| chain.purchase(&alice, second.pool, 5, Payment::native(5 * PRICE)))
        .await
        .is_err());
    node.transact(|chain| chain.purchase(&alice, second.pool, 200, Payment::native(200 * PRICE)))
        .await
        .unwrap();
    node.transact(|chain| chain.transfer_token(&alice, second.pool, GenerationId(0), &bob, 50))
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(timeout(WAIT, everything.next()).await.unwrap().unwrap());
    }
    assert!(matches!(
        seen[0],
        Event::Purchased { pool, amount: 100, .. } if pool == first.pool
    ));
    assert!(matches!(
        seen[1],
        Event::Purchased { pool, amount: 200, .. } if pool == second.pool
    ));
    assert!(matches!(seen[2], Event::Transfer { amount: 50, .. }));

    let only = timeout(WAIT, second_only.next()).await.unwrap().unwrap();
    assert!(matches!(
        only,
        Event::Purchased { pool, amount: 200, .. } if pool == second.pool
    ));
    assert!(timeout(Duration::from_millis(100), second_only.next())
        .await
        .is_err());
}

#[tokio::test]
async fn test_snapshot_restores_pools() {
    let (mut h, created) = Harness::with_terms(tge_terms());
    let pool = created.pool;
    let alice = account("alice");
    h.funded_buy(pool, &alice, 1_001);
    let router = h.router.clone();
    let metadata = h.metadata.clone();
    let node = EmbeddedNode::new(h.chain);
    node.mine(5).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.cbor");
    node.save_snapshot(&path).await.unwrap();

    let restored = EmbeddedNode::load_snapshot(
        &path,
        Collaborators {
            router: Arc::new(router),
            metadata: Arc::new(metadata),
        },
    )
    .await
    .unwrap();

    let (original_state, restored_state) = (
        node.query(|chain| chain.state().clone()).await,
        restored.query(|chain| chain.state().clone()).await,
    );
    assert_eq!(original_state, restored_state);

    let handles = restored
        .query(|chain| {
            let pool = chain.pool(pool).unwrap();
            let current = pool.current().unwrap();
            let token = pool.current_token().unwrap();
            (pool.address(), token.address(), current.engine.address())
        })
        .await;
    assert_eq!(handles, (created.pool_address, created.token, created.tge));
    assert_eq!(
        restored
            .query(|chain| chain.locked_balance(pool, GenerationId(0), &alice))
            .await,
        Ok(501)
    );

    // The restored node keeps running the same campaign.
    let bob = account("bob");
    restored
        .transact(|chain| {
            chain.fund(&bob, Asset::Native, 10 * ETH)?;
            chain.purchase(&bob, pool, 100, Payment::native(100 * PRICE))
        })
        .await
        .unwrap();
    restored.mine(15).await;
    assert_eq!(
        restored
            .query(|chain| chain.tge_state(pool, GenerationId(0)))
            .await,
        Ok(TgeState::Successful)
    );
}
