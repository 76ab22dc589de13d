//! block and encrypted-log inputs, already deserialised by the node layer

use serde::{Deserialize, Serialize};

use crate::types::{Address, BlockHash, Fr, TxHash};

/// one transaction slot of a block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTx {
    pub hash: TxHash,
    /// address of the contract deployed by this tx, zero for regular calls
    pub new_contract_address: Address,
}

impl BlockTx {
    pub fn call(hash: TxHash) -> Self {
        Self {
            hash,
            new_contract_address: Address::ZERO,
        }
    }

    pub fn deployment(hash: TxHash, contract_address: Address) -> Self {
        Self {
            hash,
            new_contract_address: contract_address,
        }
    }

    pub fn is_deployment(&self) -> bool {
        !self.new_contract_address.is_zero()
    }
}

/// public block data consumed by the scanner and reconciler
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub number: u64,
    pub hash: BlockHash,
    /// transactions in slot order
    pub txs: Vec<BlockTx>,
    /// nullifiers published by this block
    pub new_nullifiers: Vec<Fr>,
}

impl BlockContext {
    pub fn new(number: u64, hash: BlockHash) -> Self {
        Self {
            number,
            hash,
            txs: Vec::new(),
            new_nullifiers: Vec::new(),
        }
    }

    pub fn tx(&self, slot: usize) -> Option<&BlockTx> {
        self.txs.get(slot)
    }
}

/// encrypted logs emitted by one function call
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLogs {
    pub logs: Vec<Vec<u8>>,
}

/// encrypted logs of one transaction, grouped by function call
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLogs {
    pub function_logs: Vec<FunctionLogs>,
}

impl TxLogs {
    /// single function call emitting `logs`
    pub fn single(logs: Vec<Vec<u8>>) -> Self {
        Self {
            function_logs: vec![FunctionLogs { logs }],
        }
    }

    pub fn log_count(&self) -> usize {
        self.function_logs.iter().map(|f| f.logs.len()).sum()
    }
}

/// encrypted logs of one block, one entry per transaction slot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLogs {
    pub tx_logs: Vec<TxLogs>,
}

impl BlockLogs {
    pub fn new(tx_logs: Vec<TxLogs>) -> Self {
        Self { tx_logs }
    }

    pub fn log_count(&self) -> usize {
        self.tx_logs.iter().map(TxLogs::log_count).sum()
    }

    /// `(tx_slot, log)` in scan order
    pub fn slots(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        self.tx_logs.iter().enumerate().flat_map(|(slot, tx)| {
            tx.function_logs
                .iter()
                .flat_map(|f| f.logs.iter())
                .map(move |log| (slot, log.as_slice()))
        })
    }
}
