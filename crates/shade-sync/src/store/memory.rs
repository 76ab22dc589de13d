//! in-memory store for tests and ephemeral accounts
//!
//! batches are applied to a staged copy of the state and swapped in only when
//! every step succeeded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{account_prefix, apply_batch, note_key, BatchOutcome, BatchView, NoteStore, SyncBatch, TreeRoots};
use crate::note::NoteRecord;
use crate::tx::TxRecord;
use crate::types::{Address, Fr, PublicKey, TxHash};
use crate::{Result, SyncError};

#[derive(Clone, Debug, Default)]
struct State {
    notes: BTreeMap<Vec<u8>, NoteRecord>,
    spent_notes: BTreeMap<Vec<u8>, NoteRecord>,
    txs: BTreeMap<TxHash, TxRecord>,
    cursor: u64,
    roots: TreeRoots,
}

impl State {
    fn account_notes(map: &BTreeMap<Vec<u8>, NoteRecord>, account: &PublicKey) -> Vec<NoteRecord> {
        let prefix = account_prefix(account);
        let mut notes: Vec<NoteRecord> = map
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, note)| note.clone())
            .collect();
        notes.sort_by_key(|n| n.index);
        notes
    }
}

impl BatchView for State {
    type Error = SyncError;

    fn abort(err: SyncError) -> SyncError {
        err
    }

    fn is_spent(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.spent_notes.contains_key(key))
    }

    fn has_note(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.notes.contains_key(key))
    }

    fn put_note(&mut self, key: &[u8], note: &NoteRecord) -> Result<()> {
        self.notes.insert(key.to_vec(), note.clone());
        Ok(())
    }

    fn take_note(&mut self, key: &[u8]) -> Result<Option<NoteRecord>> {
        Ok(self.notes.remove(key))
    }

    fn put_spent(&mut self, key: &[u8], note: &NoteRecord) -> Result<()> {
        self.spent_notes.insert(key.to_vec(), note.clone());
        Ok(())
    }

    fn get_tx(&mut self, hash: &TxHash) -> Result<Option<TxRecord>> {
        Ok(self.txs.get(hash).cloned())
    }

    fn put_tx(&mut self, tx: &TxRecord) -> Result<()> {
        self.txs.insert(tx.tx_hash, tx.clone());
        Ok(())
    }

    fn cursor(&mut self) -> Result<u64> {
        Ok(self.cursor)
    }

    fn set_cursor(&mut self, height: u64) -> Result<()> {
        self.cursor = height;
        Ok(())
    }
}

/// `Mutex`-guarded store with the same semantics as `SledStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of batches committed so far
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| SyncError::Store("memory store lock poisoned".into()))
    }
}

impl NoteStore for MemoryStore {
    fn add_notes(&self, notes: &[NoteRecord]) -> Result<()> {
        let mut state = self.lock()?;
        for note in notes {
            state.notes.insert(note_key(&note.account, &note.nullifier), note.clone());
        }
        Ok(())
    }

    fn add_txs(&self, txs: &[TxRecord]) -> Result<()> {
        let mut state = self.lock()?;
        for tx in txs {
            tx.validate()?;
            state.txs.insert(tx.tx_hash, tx.clone());
        }
        Ok(())
    }

    fn get_tx(&self, hash: &TxHash) -> Result<Option<TxRecord>> {
        Ok(self.lock()?.txs.get(hash).cloned())
    }

    fn update_tx(&self, tx: &TxRecord) -> Result<()> {
        let mut state = self.lock()?;
        match state.txs.get_mut(&tx.tx_hash) {
            Some(existing) => {
                *existing = tx.clone();
                Ok(())
            }
            None => Err(SyncError::Store(format!("tx {} not found", tx.tx_hash))),
        }
    }

    fn remove_nullified_notes(&self, nullifiers: &[Fr], account: &PublicKey) -> Result<Vec<NoteRecord>> {
        let mut state = self.lock()?;
        let mut removed = Vec::new();
        for nullifier in nullifiers {
            let key = note_key(account, nullifier);
            if let Some(note) = state.notes.remove(&key) {
                state.spent_notes.insert(key, note.clone());
                removed.push(note);
            }
        }
        Ok(removed)
    }

    fn txs_by_address(&self, address: &Address) -> Result<Vec<TxRecord>> {
        Ok(self
            .lock()?
            .txs
            .values()
            .filter(|tx| tx.from == *address)
            .cloned()
            .collect())
    }

    fn notes_for_account(&self, account: &PublicKey) -> Result<Vec<NoteRecord>> {
        Ok(State::account_notes(&self.lock()?.notes, account))
    }

    fn spent_notes_for_account(&self, account: &PublicKey) -> Result<Vec<NoteRecord>> {
        Ok(State::account_notes(&self.lock()?.spent_notes, account))
    }

    fn tree_roots(&self) -> Result<TreeRoots> {
        Ok(self.lock()?.roots)
    }

    fn set_tree_roots(&self, roots: &TreeRoots) -> Result<()> {
        self.lock()?.roots = *roots;
        Ok(())
    }

    fn synced_height(&self) -> Result<u64> {
        Ok(self.lock()?.cursor)
    }

    fn commit_batch(&self, batch: &SyncBatch) -> Result<BatchOutcome> {
        let mut state = self.lock()?;
        let mut staged = state.clone();
        let outcome = apply_batch(&mut staged, batch)?;
        *state = staged;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[test]
    fn test_batch_roundtrip() {
        testing::batch_roundtrip(&MemoryStore::new());
    }

    #[test]
    fn test_confirmations() {
        testing::confirmations_only_fill_block_info(&MemoryStore::new());
    }

    #[test]
    fn test_failed_batch_is_discarded() {
        let store = MemoryStore::new();
        testing::invalid_batch_leaves_store_untouched(&store);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn test_single_operations() {
        testing::single_operations(&MemoryStore::new());
    }
}
