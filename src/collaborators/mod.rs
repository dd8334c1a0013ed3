//! External collaborators of the core.
//!
//! - `PaymentRouter`: payment-token whitelist and conversion
//! - `MetadataRegistry`: legal-entity records checked at pool creation
//! - In-memory implementations for tests and simulation

pub mod memory;
pub mod traits;

pub use memory::{FixedRateRouter, MemoryMetadata, Rate};
pub use traits::{MetadataRegistry, PaymentRouter};
