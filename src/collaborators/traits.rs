//! Trait abstractions for collaborators outside the core.
//!
//! The payment whitelist/swap router and the metadata registry are injected
//! as handles so tests can substitute in-memory implementations.

use crate::error::PoolResult;
use crate::types::{Amount, Asset};

/// Payment-token whitelist and conversion capability.
///
/// Swap routing math is not part of the core: a router only answers "is this
/// asset accepted" and "how much of `to` is `amount` of `from` worth".
pub trait PaymentRouter: Send + Sync {
    /// Whether `asset` may be used for payments and transfer proposals.
    fn is_whitelisted(&self, asset: &Asset) -> bool;

    /// Convert `amount` of `from` into units of `to`.
    ///
    /// Fails with `PoolError::NoRoute` when no route exists.
    fn convert(&self, from: Asset, to: Asset, amount: Amount) -> PoolResult<Amount>;
}

/// Registry of legal-entity records consulted before pool creation.
pub trait MetadataRegistry: Send + Sync {
    fn record_exists(&self, jurisdiction: u16, entity_type: u16) -> bool;
}
