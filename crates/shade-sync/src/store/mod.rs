//! local store contract and backends
//!
//! the reconciler never issues the four persist steps as separate calls.
//! it hands a whole `SyncBatch` to `commit_batch`, which applies notes, txs,
//! nullifier removals, confirmations and the cursor move as one unit.

mod memory;
mod sled_store;

pub use self::memory::MemoryStore;
pub use self::sled_store::SledStore;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::note::NoteRecord;
use crate::tx::TxRecord;
use crate::types::{Address, BlockHash, Fr, PublicKey, TxHash};
use crate::{Result, SyncError};

/// commitment tree roots, forwarded to proving without interpretation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRoots {
    pub private_data: Fr,
    pub nullifier: Fr,
    pub contract: Fr,
    pub l1_to_l2_messages: Fr,
}

/// block info for a tx that was stored before it was mined
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_hash: BlockHash,
    pub block_number: u64,
}

/// everything one reconcile call writes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncBatch {
    /// account the notes and nullifier removals are scoped to
    pub account: PublicKey,
    pub notes: Vec<NoteRecord>,
    pub new_txs: Vec<TxRecord>,
    /// published nullifiers in block order
    pub nullifiers: Vec<Fr>,
    /// pre-existing txs seen in these blocks, in block order
    pub confirmations: Vec<Confirmation>,
    /// last block covered by the batch
    pub synced_to: u64,
}

impl SyncBatch {
    pub fn new(account: PublicKey, synced_to: u64) -> Self {
        Self {
            account,
            notes: Vec::new(),
            new_txs: Vec::new(),
            nullifiers: Vec::new(),
            confirmations: Vec::new(),
            synced_to,
        }
    }
}

/// what a committed batch changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// durable cursor after the commit
    pub synced_to: u64,
    pub notes_added: usize,
    pub txs_added: usize,
    pub notes_removed: usize,
    pub txs_confirmed: usize,
}

/// data-access contract consumed by the reconciler and the account facade
pub trait NoteStore: Send + Sync {
    fn add_notes(&self, notes: &[NoteRecord]) -> Result<()>;

    fn add_txs(&self, txs: &[TxRecord]) -> Result<()>;

    fn get_tx(&self, hash: &TxHash) -> Result<Option<TxRecord>>;

    /// overwrite an existing record
    fn update_tx(&self, tx: &TxRecord) -> Result<()>;

    /// move `account`'s notes matching `nullifiers` out of the owned view
    fn remove_nullified_notes(
        &self,
        nullifiers: &[Fr],
        account: &PublicKey,
    ) -> Result<Vec<NoteRecord>>;

    /// txs sent by `address`
    fn txs_by_address(&self, address: &Address) -> Result<Vec<TxRecord>>;

    /// currently owned notes, by index
    fn notes_for_account(&self, account: &PublicKey) -> Result<Vec<NoteRecord>>;

    /// notes already nullified, by index
    fn spent_notes_for_account(&self, account: &PublicKey) -> Result<Vec<NoteRecord>>;

    fn tree_roots(&self) -> Result<TreeRoots>;

    fn set_tree_roots(&self, roots: &TreeRoots) -> Result<()>;

    /// durable sync cursor, 0 before the first batch
    fn synced_height(&self) -> Result<u64>;

    /// apply `batch` atomically
    fn commit_batch(&self, batch: &SyncBatch) -> Result<BatchOutcome>;
}

/// `account || nullifier`
pub(crate) fn note_key(account: &PublicKey, nullifier: &Fr) -> Vec<u8> {
    let mut key = Vec::with_capacity(96);
    key.extend_from_slice(&account.to_bytes());
    key.extend_from_slice(nullifier.as_ref());
    key
}

pub(crate) fn account_prefix(account: &PublicKey) -> Vec<u8> {
    account.to_bytes().to_vec()
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// staged view a backend exposes while applying one batch
pub(crate) trait BatchView {
    type Error;

    fn abort(err: SyncError) -> Self::Error;

    fn is_spent(&mut self, key: &[u8]) -> std::result::Result<bool, Self::Error>;
    fn has_note(&mut self, key: &[u8]) -> std::result::Result<bool, Self::Error>;
    fn put_note(&mut self, key: &[u8], note: &NoteRecord) -> std::result::Result<(), Self::Error>;
    fn take_note(&mut self, key: &[u8]) -> std::result::Result<Option<NoteRecord>, Self::Error>;
    fn put_spent(&mut self, key: &[u8], note: &NoteRecord) -> std::result::Result<(), Self::Error>;
    fn get_tx(&mut self, hash: &TxHash) -> std::result::Result<Option<TxRecord>, Self::Error>;
    fn put_tx(&mut self, tx: &TxRecord) -> std::result::Result<(), Self::Error>;
    fn cursor(&mut self) -> std::result::Result<u64, Self::Error>;
    fn set_cursor(&mut self, height: u64) -> std::result::Result<(), Self::Error>;
}

/// the four persist steps in order, then the cursor
///
/// re-applying an applied batch changes nothing: notes already nullified are
/// not re-inserted, tx inserts only fill block info on existing records and
/// the cursor never moves backwards.
pub(crate) fn apply_batch<V: BatchView>(
    view: &mut V,
    batch: &SyncBatch,
) -> std::result::Result<BatchOutcome, V::Error> {
    let mut outcome = BatchOutcome::default();

    for note in &batch.notes {
        if note.account != batch.account {
            return Err(V::abort(SyncError::Store(format!(
                "note at index {} belongs to another account",
                note.index
            ))));
        }
        let key = note_key(&note.account, &note.nullifier);
        if view.is_spent(&key)? {
            debug!("note at index {} already nullified, not re-adding", note.index);
            continue;
        }
        if !view.has_note(&key)? {
            outcome.notes_added += 1;
        }
        view.put_note(&key, note)?;
    }

    for tx in &batch.new_txs {
        tx.validate().map_err(V::abort)?;
        match view.get_tx(&tx.tx_hash)? {
            Some(mut existing) => {
                if let (Some(hash), Some(number)) = (tx.block_hash, tx.block_number) {
                    existing.confirm(hash, number);
                    view.put_tx(&existing)?;
                }
            }
            None => {
                view.put_tx(tx)?;
                outcome.txs_added += 1;
            }
        }
    }

    for nullifier in &batch.nullifiers {
        let key = note_key(&batch.account, nullifier);
        if let Some(note) = view.take_note(&key)? {
            debug!("note at index {} spent, nullifier {}", note.index, nullifier);
            view.put_spent(&key, &note)?;
            outcome.notes_removed += 1;
        }
    }

    for confirmation in &batch.confirmations {
        match view.get_tx(&confirmation.tx_hash)? {
            Some(mut existing) => {
                existing.confirm(confirmation.block_hash, confirmation.block_number);
                view.put_tx(&existing)?;
                outcome.txs_confirmed += 1;
            }
            None => warn!(
                "tx {} confirmed in block {} but not stored",
                confirmation.tx_hash, confirmation.block_number
            ),
        }
    }

    let cursor = view.cursor()?.max(batch.synced_to);
    view.set_cursor(cursor)?;
    outcome.synced_to = cursor;
    Ok(outcome)
}
