//! transaction records
//!
//! a record is either a deployment (`contract_address` set) or a call
//! (`to` set), never both. once stored, only the block fields change.

use serde::{Deserialize, Serialize};

use crate::types::{Address, BlockHash, TxHash};
use crate::{Result, SyncError};

/// what a transaction did from the account's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Call { to: Address },
    Deployment { contract_address: Address },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub tx_hash: TxHash,
    pub block_hash: Option<BlockHash>,
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    /// empty on success
    pub error: String,
}

impl TxRecord {
    pub fn new(tx_hash: TxHash, from: Address, kind: TxKind) -> Self {
        let (to, contract_address) = match kind {
            TxKind::Call { to } => (Some(to), None),
            TxKind::Deployment { contract_address } => (None, Some(contract_address)),
        };
        Self {
            tx_hash,
            block_hash: None,
            block_number: None,
            from,
            to,
            contract_address,
            error: String::new(),
        }
    }

    /// record already seen in a block
    pub fn mined(
        tx_hash: TxHash,
        block_hash: BlockHash,
        block_number: u64,
        from: Address,
        kind: TxKind,
    ) -> Self {
        let mut record = Self::new(tx_hash, from, kind);
        record.confirm(block_hash, block_number);
        record
    }

    pub fn kind(&self) -> Option<TxKind> {
        match (self.to, self.contract_address) {
            (Some(to), None) => Some(TxKind::Call { to }),
            (None, Some(contract_address)) => Some(TxKind::Deployment { contract_address }),
            _ => None,
        }
    }

    pub fn is_mined(&self) -> bool {
        self.block_number.is_some()
    }

    /// fill in block info; nothing else is touched
    pub fn confirm(&mut self, block_hash: BlockHash, block_number: u64) {
        self.block_hash = Some(block_hash);
        self.block_number = Some(block_number);
    }

    pub fn validate(&self) -> Result<()> {
        match (self.to.is_some(), self.contract_address.is_some()) {
            (true, true) => Err(SyncError::InvalidTxRecord(format!(
                "{}: both to and contract address set",
                self.tx_hash
            ))),
            (false, false) => Err(SyncError::InvalidTxRecord(format!(
                "{}: neither to nor contract address set",
                self.tx_hash
            ))),
            _ => Ok(()),
        }
    }
}
