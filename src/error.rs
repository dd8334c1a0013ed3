//! Error taxonomy for pool, crowdsale and governance operations.
//!
//! Every variant is a local, synchronous, non-retryable rejection: the
//! operation did not take effect and the caller must correct and resubmit.

use crate::types::{Address, Amount, Asset, PoolId, ProposalId};

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Role a caller was required to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The engine that owns a token's mint/burn capability.
    Minter,
    /// The owning pool or engine (token locks).
    Locker,
    /// Owner of a crowdsale engine.
    EngineOwner,
    /// Owner of a pool.
    PoolOwner,
    /// Owner of the factory service.
    ServiceOwner,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Minter => "minter",
            Role::Locker => "locker",
            Role::EngineOwner => "engine owner",
            Role::PoolOwner => "pool owner",
            Role::ServiceOwner => "service owner",
        };
        write!(f, "{}", name)
    }
}

/// Coarse classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    NotWhitelisted,
    WrongState,
    LimitExceeded,
    PaymentMismatch,
    InsufficientUnlockedFunds,
    AlreadyDone,
    InsufficientFunds,
    InvalidArgument,
    NotFound,
    /// Arithmetic overflow or broken internal invariant.
    Fatal,
}

/// Pool operation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Caller {caller} is not the {role}")]
    Unauthorized { role: Role, caller: Address },

    #[error("Not shareholder: {0}")]
    NotShareholder(Address),

    #[error("Not whitelisted: {0}")]
    BuyerNotWhitelisted(Address),

    #[error("Asset not whitelisted: {0}")]
    AssetNotWhitelisted(Asset),

    #[error("Creator not whitelisted: {0}")]
    CreatorNotWhitelisted(Address),

    #[error("Wrong state: {0}")]
    WrongState(String),

    #[error("Has active TGE")]
    ActiveTge,

    #[error("Already has active proposal: {0}")]
    ProposalAlreadyActive(ProposalId),

    #[error("Voting finished")]
    VotingFinished,

    #[error("Voting not finished")]
    VotingNotFinished,

    #[error("Claim not available: tokens still locked")]
    ClaimNotAvailable,

    #[error("Amount less than min purchase: {amount} < {min}")]
    MinPurchaseUnderflow { amount: Amount, min: Amount },

    #[error("Overflows max purchase: {would_have} > {max}")]
    MaxPurchaseOverflow { max: Amount, would_have: Amount },

    #[error("Overflows hardcap: {would_have} > {hardcap}")]
    HardcapOverflow { hardcap: Amount, would_have: Amount },

    #[error("Hardcap higher than remaining supply: {hardcap} > {remaining}")]
    HardcapAboveRemainingSupply { hardcap: Amount, remaining: Amount },

    #[error("Supply cap exceeded: max {cap}, would have {would_have}")]
    CapExceeded { cap: Amount, would_have: Amount },

    #[error("TVL below lockup threshold: {tvl} < {threshold}")]
    TvlBelowThreshold { tvl: Amount, threshold: Amount },

    #[error("Incorrect payment passed: expected {expected}, got {received}")]
    IncorrectPaymentPassed { expected: Amount, received: Amount },

    #[error("Incorrect fee passed: expected {expected}, got {received}")]
    IncorrectFee { expected: Amount, received: Amount },

    #[error("No conversion route from {from} to {to}")]
    NoRoute { from: Asset, to: Asset },

    #[error("Not enough unlocked balance: available {available}, requested {requested}")]
    InsufficientUnlockedBalance {
        available: Amount,
        requested: Amount,
    },

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("Already voted on {0}")]
    AlreadyVoted(ProposalId),

    #[error("Already whitelisted: {0}")]
    AlreadyWhitelisted(Address),

    #[error("Already not whitelisted: {0}")]
    AlreadyNotWhitelisted(Address),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Pool not found: {0}")]
    PoolNotFound(PoolId),

    #[error("Generation not found: {0}")]
    GenerationNotFound(String),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("Metadata record not found: jurisdiction {jurisdiction}, entity type {entity_type}")]
    RecordNotFound { jurisdiction: u16, entity_type: u16 },

    #[error("Arithmetic overflow")]
    Overflow,
}

impl PoolError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } | Self::NotShareholder(_) => ErrorKind::PermissionDenied,
            Self::BuyerNotWhitelisted(_)
            | Self::AssetNotWhitelisted(_)
            | Self::CreatorNotWhitelisted(_) => ErrorKind::NotWhitelisted,
            Self::WrongState(_)
            | Self::ActiveTge
            | Self::ProposalAlreadyActive(_)
            | Self::VotingFinished
            | Self::VotingNotFinished
            | Self::TvlBelowThreshold { .. } => ErrorKind::WrongState,
            Self::MinPurchaseUnderflow { .. }
            | Self::MaxPurchaseOverflow { .. }
            | Self::HardcapOverflow { .. }
            | Self::HardcapAboveRemainingSupply { .. }
            | Self::CapExceeded { .. } => ErrorKind::LimitExceeded,
            Self::IncorrectPaymentPassed { .. } | Self::IncorrectFee { .. } | Self::NoRoute { .. } => {
                ErrorKind::PaymentMismatch
            }
            Self::InsufficientUnlockedBalance { .. } | Self::ClaimNotAvailable => {
                ErrorKind::InsufficientUnlockedFunds
            }
            Self::AlreadyVoted(_) | Self::AlreadyWhitelisted(_) | Self::AlreadyNotWhitelisted(_) => {
                ErrorKind::AlreadyDone
            }
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::PoolNotFound(_)
            | Self::GenerationNotFound(_)
            | Self::ProposalNotFound(_)
            | Self::RecordNotFound { .. } => ErrorKind::NotFound,
            Self::Overflow => ErrorKind::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", PoolError::ActiveTge), "Has active TGE");
        assert_eq!(
            format!(
                "{}",
                PoolError::MaxPurchaseOverflow {
                    max: 3000,
                    would_have: 4000
                }
            ),
            "Overflows max purchase: 4000 > 3000"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PoolError::HardcapOverflow {
                hardcap: 1,
                would_have: 2
            }
            .kind(),
            ErrorKind::LimitExceeded
        );
        assert_eq!(
            PoolError::HardcapAboveRemainingSupply {
                hardcap: 9_500,
                remaining: 8_500
            }
            .kind(),
            ErrorKind::LimitExceeded
        );
        assert_eq!(PoolError::ClaimNotAvailable.kind(), ErrorKind::InsufficientUnlockedFunds);
        assert_eq!(PoolError::AlreadyVoted(ProposalId(1)).kind(), ErrorKind::AlreadyDone);
        assert_eq!(PoolError::Overflow.kind(), ErrorKind::Fatal);
        assert_eq!(
            PoolError::Unauthorized {
                role: Role::Minter,
                caller: Address::ZERO
            }
            .kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            PoolError::IncorrectPaymentPassed {
                expected: 1,
                received: 2
            }
            .kind(),
            ErrorKind::PaymentMismatch
        );
    }
}
