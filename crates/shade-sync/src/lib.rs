//! shade-sync - private state synchronisation for an encrypted-note ledger
//!
//! scans finalized blocks for encrypted note logs, trial-decrypts every log
//! against the account key, derives nullifiers for owned notes and folds the
//! result into a durable store in one atomic batch per call.
//!
//! pipeline:
//! - `scanner` walks blocks -> tx slots -> function calls -> logs, assigning
//!   every log one leaf index of the external commitment tree
//! - `nullifier` decorates decrypted notes with their spend marker
//! - `reconcile` builds transaction records, nullifier removals and
//!   confirmations into a `SyncBatch`
//! - `store` commits the batch and advances the cursor atomically
//! - `account` ties it together behind `AccountState`

pub mod account;
pub mod block;
pub mod cipher;
pub mod config;
pub mod error;
pub mod note;
pub mod nullifier;
pub mod oracle;
pub mod reconcile;
pub mod scanner;
pub mod source;
pub mod store;
pub mod tx;
pub mod types;

pub use account::{AccountState, HistoricTreeRoots};
pub use block::{BlockContext, BlockLogs, BlockTx, FunctionLogs, TxLogs};
pub use cipher::{decrypt_buffer, encrypt_buffer, TrialDecryption};
pub use config::{SyncConfig, TreeLayout};
pub use error::{Result, SyncError};
pub use note::{NoteCandidate, NotePayload, NoteRecord};
pub use nullifier::derive_nullifier;
pub use oracle::{CryptoOracle, PallasOracle};
pub use scanner::{scan, ScanResult};
pub use source::ChainSource;
pub use store::{BatchOutcome, MemoryStore, NoteStore, SledStore, SyncBatch, TreeRoots};
pub use tx::{TxKind, TxRecord};
pub use types::{Address, BlockHash, Fr, Point, PrivateKey, PublicKey, TxHash};

/// first block number of the ledger
pub const INITIAL_BLOCK_NUMBER: u64 = 1;

/// transaction slots per block
pub const MAX_TXS_PER_BLOCK: u64 = 4;

/// note commitments per transaction
pub const MAX_NEW_NOTES_PER_TX: u64 = 4;

/// blocks pulled per sync step
pub const DEFAULT_BATCH_SIZE: u64 = 10;

/// domain separator for the inner nullifier hash
pub const NULLIFIER_DOMAIN: &[u8] = b"SHADE_nullifier_v1";

/// domain separator for siloing a nullifier by contract address
pub const OUTER_NULLIFIER_DOMAIN: &[u8] = b"SHADE_siloed_nullifier_v1";
