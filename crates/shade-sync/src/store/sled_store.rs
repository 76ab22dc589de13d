//! durable store on sled
//!
//! trees:
//! - `notes`: account || nullifier -> owned `NoteRecord`
//! - `spent_notes`: account || nullifier -> nullified `NoteRecord`
//! - `txs`: tx hash -> `TxRecord`
//! - `meta`: sync cursor, tree roots
//!
//! `commit_batch` runs as one transaction over all four trees.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree, Transactional};
use sled::{Db, Tree};
use tracing::info;

use super::{account_prefix, apply_batch, decode, encode, note_key, BatchOutcome, BatchView, NoteStore, SyncBatch, TreeRoots};
use crate::note::NoteRecord;
use crate::tx::TxRecord;
use crate::types::{Address, Fr, PublicKey, TxHash};
use crate::{Result, SyncError};

const CURSOR_KEY: &[u8] = b"synced_height";
const ROOTS_KEY: &[u8] = b"tree_roots";

pub struct SledStore {
    db: Db,
    notes: Tree,
    spent_notes: Tree,
    txs: Tree,
    meta: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("opening note store at {}", path.as_ref().display());
        Self::from_db(sled::open(path)?)
    }

    /// store that is deleted on drop
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self> {
        Ok(Self {
            notes: db.open_tree("notes")?,
            spent_notes: db.open_tree("spent_notes")?,
            txs: db.open_tree("txs")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn account_notes(tree: &Tree, account: &PublicKey) -> Result<Vec<NoteRecord>> {
        let mut notes = tree
            .scan_prefix(account_prefix(account))
            .map(|item| {
                let (_, value) = item?;
                decode::<NoteRecord>(&value)
            })
            .collect::<Result<Vec<_>>>()?;
        notes.sort_by_key(|n| n.index);
        Ok(notes)
    }
}

fn decode_cursor(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| SyncError::Store(format!("corrupt sync cursor ({} bytes)", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

/// the four trees inside one sled transaction
struct SledView<'a> {
    notes: &'a TransactionalTree,
    spent_notes: &'a TransactionalTree,
    txs: &'a TransactionalTree,
    meta: &'a TransactionalTree,
}

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<SyncError>>;

impl BatchView for SledView<'_> {
    type Error = ConflictableTransactionError<SyncError>;

    fn abort(err: SyncError) -> Self::Error {
        ConflictableTransactionError::Abort(err)
    }

    fn is_spent(&mut self, key: &[u8]) -> TxResult<bool> {
        Ok(self.spent_notes.get(key)?.is_some())
    }

    fn has_note(&mut self, key: &[u8]) -> TxResult<bool> {
        Ok(self.notes.get(key)?.is_some())
    }

    fn put_note(&mut self, key: &[u8], note: &NoteRecord) -> TxResult<()> {
        self.notes.insert(key, encode(note).map_err(Self::abort)?)?;
        Ok(())
    }

    fn take_note(&mut self, key: &[u8]) -> TxResult<Option<NoteRecord>> {
        match self.notes.remove(key)? {
            Some(value) => Ok(Some(decode(&value).map_err(Self::abort)?)),
            None => Ok(None),
        }
    }

    fn put_spent(&mut self, key: &[u8], note: &NoteRecord) -> TxResult<()> {
        self.spent_notes.insert(key, encode(note).map_err(Self::abort)?)?;
        Ok(())
    }

    fn get_tx(&mut self, hash: &TxHash) -> TxResult<Option<TxRecord>> {
        match self.txs.get(hash.as_ref())? {
            Some(value) => Ok(Some(decode(&value).map_err(Self::abort)?)),
            None => Ok(None),
        }
    }

    fn put_tx(&mut self, tx: &TxRecord) -> TxResult<()> {
        self.txs
            .insert(tx.tx_hash.as_ref(), encode(tx).map_err(Self::abort)?)?;
        Ok(())
    }

    fn cursor(&mut self) -> TxResult<u64> {
        match self.meta.get(CURSOR_KEY)? {
            Some(value) => decode_cursor(&value).map_err(Self::abort),
            None => Ok(0),
        }
    }

    fn set_cursor(&mut self, height: u64) -> TxResult<()> {
        self.meta.insert(CURSOR_KEY, &height.to_be_bytes()[..])?;
        Ok(())
    }
}

impl NoteStore for SledStore {
    fn add_notes(&self, notes: &[NoteRecord]) -> Result<()> {
        for note in notes {
            self.notes
                .insert(note_key(&note.account, &note.nullifier), encode(note)?)?;
        }
        Ok(())
    }

    fn add_txs(&self, txs: &[TxRecord]) -> Result<()> {
        for tx in txs {
            tx.validate()?;
            self.txs.insert(tx.tx_hash.as_ref(), encode(tx)?)?;
        }
        Ok(())
    }

    fn get_tx(&self, hash: &TxHash) -> Result<Option<TxRecord>> {
        match self.txs.get(hash.as_ref())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    fn update_tx(&self, tx: &TxRecord) -> Result<()> {
        if !self.txs.contains_key(tx.tx_hash.as_ref())? {
            return Err(SyncError::Store(format!("tx {} not found", tx.tx_hash)));
        }
        self.txs.insert(tx.tx_hash.as_ref(), encode(tx)?)?;
        Ok(())
    }

    fn remove_nullified_notes(&self, nullifiers: &[Fr], account: &PublicKey) -> Result<Vec<NoteRecord>> {
        let mut removed = Vec::new();
        for nullifier in nullifiers {
            let key = note_key(account, nullifier);
            if let Some(value) = self.notes.remove(&key)? {
                self.spent_notes.insert(&key, value.clone())?;
                removed.push(decode(&value)?);
            }
        }
        Ok(removed)
    }

    fn txs_by_address(&self, address: &Address) -> Result<Vec<TxRecord>> {
        let mut out = Vec::new();
        for item in self.txs.iter() {
            let (_, value) = item?;
            let tx: TxRecord = decode(&value)?;
            if tx.from == *address {
                out.push(tx);
            }
        }
        Ok(out)
    }

    fn notes_for_account(&self, account: &PublicKey) -> Result<Vec<NoteRecord>> {
        Self::account_notes(&self.notes, account)
    }

    fn spent_notes_for_account(&self, account: &PublicKey) -> Result<Vec<NoteRecord>> {
        Self::account_notes(&self.spent_notes, account)
    }

    fn tree_roots(&self) -> Result<TreeRoots> {
        match self.meta.get(ROOTS_KEY)? {
            Some(value) => decode(&value),
            None => Ok(TreeRoots::default()),
        }
    }

    fn set_tree_roots(&self, roots: &TreeRoots) -> Result<()> {
        self.meta.insert(ROOTS_KEY, encode(roots)?)?;
        Ok(())
    }

    fn synced_height(&self) -> Result<u64> {
        match self.meta.get(CURSOR_KEY)? {
            Some(value) => decode_cursor(&value),
            None => Ok(0),
        }
    }

    fn commit_batch(&self, batch: &SyncBatch) -> Result<BatchOutcome> {
        let outcome = (&self.notes, &self.spent_notes, &self.txs, &self.meta)
            .transaction(|(notes, spent_notes, txs, meta)| {
                let mut view = SledView {
                    notes,
                    spent_notes,
                    txs,
                    meta,
                };
                apply_batch(&mut view, batch)
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => SyncError::from(e),
            })?;
        self.db.flush()?;
        Ok(outcome)
    }
}
