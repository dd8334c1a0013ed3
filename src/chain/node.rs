//! Embedded single-writer node.
//!
//! - One async lock serializes all transactions, so concurrent callers
//!   observe each other's post-state in a total order
//! - Committed events are broadcast after every transaction
//! - Subscribers get a real-time stream, optionally filtered by pool

use super::{Chain, ChainState, Collaborators};
use crate::error::PoolResult;
use crate::events::Event;
use crate::serialization::{decode_snapshot, encode_snapshot, SerializationError};
use crate::types::{BlockHeight, PoolId};
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Stream of committed events.
pub struct EventStream {
    inner: UnboundedReceiverStream<Event>,
    pool: Option<PoolId>,
}

impl EventStream {
    /// Pool this stream is filtered on, `None` for every event.
    pub fn pool(&self) -> Option<PoolId> {
        self.pool
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// In-process node owning a [`Chain`].
#[derive(Clone)]
pub struct EmbeddedNode {
    chain: Arc<Mutex<Chain>>,
    events_tx: broadcast::Sender<Event>,
}

impl EmbeddedNode {
    pub fn new(chain: Chain) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            chain: Arc::new(Mutex::new(chain)),
            events_tx,
        }
    }

    /// Run one or more chain operations as a critical section.
    ///
    /// Events committed inside are broadcast before the lock is released.
    pub async fn transact<T>(&self, op: impl FnOnce(&mut Chain) -> PoolResult<T>) -> PoolResult<T> {
        let mut chain = self.chain.lock().await;
        let result = op(&mut chain);
        for event in chain.drain_events() {
            // No subscribers is fine.
            let _ = self.events_tx.send(event);
        }
        result
    }

    /// Read-only access to the chain.
    pub async fn query<T>(&self, op: impl FnOnce(&Chain) -> T) -> T {
        let chain = self.chain.lock().await;
        op(&chain)
    }

    pub async fn mine(&self, blocks: u64) -> BlockHeight {
        let mut chain = self.chain.lock().await;
        chain.mine(blocks)
    }

    pub async fn block(&self) -> BlockHeight {
        self.chain.lock().await.block()
    }

    /// Subscribe to committed events, all pools or one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, pool: Option<PoolId>) -> EventStream {
        let mut rx = self.events_tx.subscribe();
        let (tx, receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if pool.is_some() && event.pool() != pool {
                            continue;
                        }
                        if tx.send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        EventStream {
            inner: UnboundedReceiverStream::new(receiver),
            pool,
        }
    }

    /// Write the current state to `path` as a CBOR snapshot.
    pub async fn save_snapshot(&self, path: &Path) -> Result<(), SerializationError> {
        let bytes = {
            let chain = self.chain.lock().await;
            encode_snapshot(chain.state())?
        };
        tokio::fs::write(path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Start a node from a snapshot written by [`save_snapshot`](Self::save_snapshot).
    pub async fn load_snapshot(
        path: &Path,
        collaborators: Collaborators,
    ) -> Result<Self, SerializationError> {
        let bytes = tokio::fs::read(path).await?;
        let state: ChainState = decode_snapshot(&bytes)?;
        debug!(path = %path.display(), block = state.block, pools = state.pools.len(), "snapshot loaded");
        Ok(Self::new(Chain::new(state, collaborators)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FixedRateRouter, MemoryMetadata};
    use crate::types::{Address, Asset};

    fn collaborators() -> Collaborators {
        Collaborators {
            router: Arc::new(FixedRateRouter::new()),
            metadata: Arc::new(MemoryMetadata::new()),
        }
    }

    fn node() -> EmbeddedNode {
        let owner = Address::from_label("owner");
        EmbeddedNode::new(Chain::new(ChainState::genesis(owner, 5), collaborators()))
    }

    #[tokio::test]
    async fn test_mine_advances_block() {
        let node = node();
        assert_eq!(node.block().await, 0);
        assert_eq!(node.mine(3).await, 3);
        assert_eq!(node.query(|chain| chain.block()).await, 3);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.cbor");
        let node = node();
        let whale = Address::from_label("whale");
        node.transact(|chain| chain.fund(&whale, Asset::Native, 1_000))
            .await
            .unwrap();
        node.mine(7).await;
        node.save_snapshot(&path).await.unwrap();

        let restored = EmbeddedNode::load_snapshot(&path, collaborators()).await.unwrap();
        assert_eq!(restored.block().await, 7);
        assert_eq!(
            restored
                .query(|chain| chain.balance(&whale, &Asset::Native))
                .await,
            1_000
        );
        assert_eq!(restored.query(|chain| chain.service().fee()).await, 5);
    }
}
