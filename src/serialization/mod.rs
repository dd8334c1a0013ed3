//! CBOR serialization for chain snapshots.
//!
//! - CBOR via `ciborium`; amounts above `u64::MAX` survive as bignums
//! - Snapshots are wrapped in a versioned envelope
//! - Schema evolution through `#[serde(default)]` on added fields

use crate::chain::ChainState;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot format version. v2 moved tokens into a per-pool arena.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Versioned envelope around a chain state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub state: ChainState,
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

/// Encode a chain state inside the current envelope.
pub fn encode_snapshot(state: &ChainState) -> Result<Vec<u8>, SerializationError> {
    #[derive(Serialize)]
    struct SnapshotRef<'a> {
        version: u32,
        state: &'a ChainState,
    }

    to_cbor(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        state,
    })
}

/// Decode a snapshot, rejecting unknown versions.
pub fn decode_snapshot(bytes: &[u8]) -> Result<ChainState, SerializationError> {
    let snapshot: Snapshot = from_cbor(bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SerializationError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(snapshot.state)
}
