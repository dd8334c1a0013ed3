//! Token generation events (crowdsales)
//!
//! A pool raises funds by selling its governance token through a
//! [`CrowdsaleEngine`]. Each engine runs one campaign under fixed
//! [`TgeTerms`]:
//! - Purchases mint tokens and escrow the payment
//! - A share of every purchase is locked until a block and, optionally, a
//!   treasury TVL threshold
//! - A failed campaign refunds buyers; a successful one moves escrow to the
//!   pool treasury

pub mod engine;
pub mod terms;

#[cfg(test)]
mod proptests;

pub use engine::{CrowdsaleEngine, Payment, PurchaseReceipt, RedeemReceipt, TgeState};
pub use terms::TgeTerms;
