//! Primitive types shared by every component.
//!
//! Amounts are integers in the smallest unit of their asset. Time is block
//! height, never wall-clock.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{PoolError, PoolResult};

/// Token or currency amount in smallest units.
pub type Amount = u128;

/// Block height of the host ledger.
pub type BlockHeight = u64;

/// 20-byte account or entity address.
///
/// Serialized as a `0x`-prefixed hex string so it can key JSON maps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address (never a valid recipient).
    pub const ZERO: Address = Address([0u8; 20]);

    /// Derive a deterministic address from a domain tag and parts.
    ///
    /// Pools, engines and tokens get their addresses this way so that a
    /// restored snapshot resolves to the same handles.
    pub fn derive(domain: &str, parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Self(bytes)
    }

    /// Address for a human-readable account label (tests, CLI).
    pub fn from_label(label: &str) -> Self {
        Self::derive("account", &[label.as_bytes()])
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)
            .map_err(|e| PoolError::InvalidArgument(format!("invalid address hex: {}", e)))?;
        if bytes.len() != 20 {
            return Err(PoolError::InvalidArgument(format!(
                "invalid address length: expected 20 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Asset held on the host ledger: the native currency or a token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Native,
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(addr) => write!(f, "token:{}", addr),
        }
    }
}

/// Pool identifier (index into the chain's pool arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Token/TGE generation within a pool (0 = initial).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenerationId(pub u32);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Proposal identifier, monotonically increasing per pool starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal#{}", self.0)
    }
}

pub(crate) fn checked_add(a: Amount, b: Amount) -> PoolResult<Amount> {
    a.checked_add(b).ok_or(PoolError::Overflow)
}

pub(crate) fn checked_sub(a: Amount, b: Amount) -> PoolResult<Amount> {
    a.checked_sub(b).ok_or(PoolError::Overflow)
}

pub(crate) fn checked_mul(a: Amount, b: Amount) -> PoolResult<Amount> {
    a.checked_mul(b).ok_or(PoolError::Overflow)
}

/// `floor(a * b / d)` with a 256-bit intermediate product.
///
/// Fails only when `d` is zero or the quotient itself exceeds `Amount`.
pub(crate) fn mul_div(a: Amount, b: Amount, d: Amount) -> PoolResult<Amount> {
    if d == 0 {
        return Err(PoolError::Overflow);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / d);
    }
    let (hi, lo) = widening_mul(a, b);
    if hi >= d {
        return Err(PoolError::Overflow);
    }
    // Shift-subtract long division of (hi, lo) by d; rem < d throughout.
    let mut rem = hi;
    let mut quot: Amount = 0;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quot <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= 1;
        }
    }
    Ok(quot)
}

/// Full 256-bit product as `(high, low)` halves.
fn widening_mul(a: Amount, b: Amount) -> (Amount, Amount) {
    const MASK: Amount = u64::MAX as Amount;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// `part * 100 >= percent * whole`, evaluated without overflow.
///
/// Splits `whole = 100q + r`, so the condition becomes
/// `part >= percent*q + ceil(percent*r / 100)`.
pub fn meets_percent(part: Amount, whole: Amount, percent: u8) -> bool {
    let percent = Amount::from(percent.min(100));
    let q = whole / 100;
    let r = whole % 100;
    let required = percent * q + (percent * r).div_ceil(100);
    part >= required
}
