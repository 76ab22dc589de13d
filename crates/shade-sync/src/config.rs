//! sync configuration and commitment tree layout

use serde::{Deserialize, Serialize};

use crate::{
    Result, SyncError, DEFAULT_BATCH_SIZE, INITIAL_BLOCK_NUMBER, MAX_NEW_NOTES_PER_TX,
    MAX_TXS_PER_BLOCK,
};

/// leaf allocation of the external note commitment tree
///
/// every block owns `max_txs_per_block * max_new_notes_per_tx` consecutive
/// leaves and every emitted log consumes exactly one of them, decryptable or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeLayout {
    /// first block number of the chain
    pub initial_block_number: u64,
    /// transaction slots per block
    pub max_txs_per_block: u64,
    /// note commitments per transaction
    pub max_new_notes_per_tx: u64,
}

impl Default for TreeLayout {
    fn default() -> Self {
        Self {
            initial_block_number: INITIAL_BLOCK_NUMBER,
            max_txs_per_block: MAX_TXS_PER_BLOCK,
            max_new_notes_per_tx: MAX_NEW_NOTES_PER_TX,
        }
    }
}

impl TreeLayout {
    /// leaves reserved per block
    pub fn block_capacity(&self) -> u64 {
        self.max_txs_per_block * self.max_new_notes_per_tx
    }

    /// global index of the first leaf of `block_number`
    pub fn block_start_index(&self, block_number: u64) -> Result<u64> {
        if block_number < self.initial_block_number {
            return Err(SyncError::BlockBeforeInitial {
                block: block_number,
                initial: self.initial_block_number,
            });
        }
        (block_number - self.initial_block_number)
            .checked_mul(self.block_capacity())
            .ok_or_else(|| SyncError::InvalidConfig(format!("block {} overflows the index space", block_number)))
    }

    /// global index of the `log_index`-th log slot inside `block_number`
    pub fn note_index(&self, block_number: u64, log_index: u64) -> Result<u64> {
        let capacity = self.block_capacity();
        if log_index >= capacity {
            return Err(SyncError::BlockCapacityExceeded {
                block: block_number,
                capacity,
            });
        }
        Ok(self.block_start_index(block_number)? + log_index)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_txs_per_block == 0 || self.max_new_notes_per_tx == 0 {
            return Err(SyncError::InvalidConfig(
                "per-block capacity must be non-zero".into(),
            ));
        }
        self.max_txs_per_block
            .checked_mul(self.max_new_notes_per_tx)
            .ok_or_else(|| SyncError::InvalidConfig("per-block capacity overflows".into()))?;
        Ok(())
    }
}

/// account sync configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// commitment tree layout of the ledger
    pub layout: TreeLayout,
    /// blocks pulled per `sync_step`
    pub batch_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            layout: TreeLayout::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        if self.batch_size == 0 {
            return Err(SyncError::InvalidConfig("batch size must be non-zero".into()));
        }
        Ok(())
    }
}
