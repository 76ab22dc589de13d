//! error types for shade-sync

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("number of blocks and encrypted logs is not equal: {blocks} blocks, {logs} encrypted logs")]
    BlockLogCountMismatch { blocks: usize, logs: usize },

    #[error("invalid private key length: received {0}, expected 32")]
    InvalidKeyLength(usize),

    #[error("private key reduces to zero")]
    ZeroPrivateKey,

    #[error("block {block} precedes the initial block {initial}")]
    BlockBeforeInitial { block: u64, initial: u64 },

    #[error("block {block} emits more log slots than its capacity of {capacity}")]
    BlockCapacityExceeded { block: u64, capacity: u64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("point is not on the curve")]
    InvalidPoint,

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("transaction slot {slot} not found in block {block}")]
    UnknownTransaction { block: u64, slot: usize },

    #[error("invalid transaction record: {0}")]
    InvalidTxRecord(String),

    #[error("chain source error: {0}")]
    Source(String),
}

impl SyncError {
    /// input-contract violations are not worth retrying as-is
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SyncError::BlockLogCountMismatch { .. }
                | SyncError::InvalidKeyLength(_)
                | SyncError::ZeroPrivateKey
                | SyncError::BlockBeforeInitial { .. }
                | SyncError::BlockCapacityExceeded { .. }
                | SyncError::InvalidConfig(_)
        )
    }
}

impl From<sled::Error> for SyncError {
    fn from(e: sled::Error) -> Self {
        SyncError::Store(format!("sled: {}", e))
    }
}

impl From<bincode::Error> for SyncError {
    fn from(e: bincode::Error) -> Self {
        SyncError::Store(format!("bincode: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
