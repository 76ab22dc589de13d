//! account facade
//!
//! holds the account identity and the in-memory cursor mirror, and is the only
//! mutating entry point into the pipeline. `process_blocks` calls are
//! serialised per account; readers can run concurrently and see the store as
//! of the last committed batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::{BlockContext, BlockLogs};
use crate::config::SyncConfig;
use crate::note::NoteRecord;
use crate::oracle::{CryptoOracle, PallasOracle};
use crate::reconcile::{reconcile, Owner};
use crate::scanner::scan;
use crate::source::ChainSource;
use crate::store::{BatchOutcome, NoteStore, TreeRoots};
use crate::tx::{TxKind, TxRecord};
use crate::types::{Address, Fr, PrivateKey, PublicKey, TxHash};
use crate::{Result, SyncError};

/// tree roots as handed to external proving
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricTreeRoots {
    pub private_data_tree_root: Fr,
    pub nullifier_tree_root: Fr,
    pub contract_tree_root: Fr,
    pub l1_to_l2_messages_tree_root: Fr,
    pub private_kernel_vk_tree_root: Fr,
}

pub struct AccountState<S: NoteStore, O: CryptoOracle = PallasOracle> {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
    store: Arc<S>,
    source: Arc<dyn ChainSource>,
    oracle: O,
    config: SyncConfig,
    synced_height: AtomicU64,
    process_lock: Mutex<()>,
}

impl<S: NoteStore> AccountState<S, PallasOracle> {
    /// account over the pallas oracle
    pub fn new(
        private_key: &[u8],
        address: Address,
        store: Arc<S>,
        source: Arc<dyn ChainSource>,
        config: SyncConfig,
    ) -> Result<Self> {
        Self::with_oracle(private_key, address, store, source, PallasOracle, config)
    }
}

impl<S: NoteStore, O: CryptoOracle> AccountState<S, O> {
    pub fn with_oracle(
        private_key: &[u8],
        address: Address,
        store: Arc<S>,
        source: Arc<dyn ChainSource>,
        oracle: O,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let private_key = PrivateKey::from_slice(private_key)?;
        if private_key.is_zero() {
            return Err(SyncError::ZeroPrivateKey);
        }
        let public_key = oracle.derive_public_key(&private_key)?;
        let synced_height = store.synced_height()?;
        debug!("account {} resumes at block {}", address, synced_height);
        Ok(Self {
            private_key,
            public_key,
            address,
            store,
            source,
            oracle,
            config,
            synced_height: AtomicU64::new(synced_height),
            process_lock: Mutex::new(()),
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// highest fully reconciled block, 0 before the first batch
    pub fn synced_height(&self) -> u64 {
        self.synced_height.load(Ordering::SeqCst)
    }

    /// cursor has reached the chain tip
    pub fn is_synchronised(&self) -> Result<bool> {
        Ok(self.synced_height() >= self.source.block_height()?)
    }

    pub fn transactions(&self) -> Result<Vec<TxRecord>> {
        self.store.txs_by_address(&self.address)
    }

    /// notes not yet nullified
    pub fn owned_notes(&self) -> Result<Vec<NoteRecord>> {
        self.store.notes_for_account(&self.public_key)
    }

    pub fn spent_notes(&self) -> Result<Vec<NoteRecord>> {
        self.store.spent_notes_for_account(&self.public_key)
    }

    pub fn historic_tree_roots(&self) -> Result<HistoricTreeRoots> {
        let roots = self.store.tree_roots()?;
        Ok(HistoricTreeRoots {
            private_data_tree_root: roots.private_data,
            nullifier_tree_root: roots.nullifier,
            contract_tree_root: roots.contract,
            l1_to_l2_messages_tree_root: roots.l1_to_l2_messages,
            private_kernel_vk_tree_root: Fr::ZERO,
        })
    }

    pub fn set_tree_roots(&self, roots: &TreeRoots) -> Result<()> {
        self.store.set_tree_roots(roots)
    }

    /// store a submitted tx so a later block can confirm it
    ///
    /// an already stored record is returned untouched.
    pub fn add_pending_tx(&self, hash: TxHash, kind: TxKind) -> Result<TxRecord> {
        if let Some(existing) = self.store.get_tx(&hash)? {
            return Ok(existing);
        }
        let record = TxRecord::new(hash, self.address, kind);
        self.store.add_txs(std::slice::from_ref(&record))?;
        debug!("pending tx {} stored", hash);
        Ok(record)
    }

    /// scan, decorate and reconcile one batch of blocks
    ///
    /// `Ok(None)` for an empty batch. on error nothing was committed and the
    /// cursor is unchanged, so the same call can be retried.
    pub fn process_blocks(
        &self,
        blocks: &[BlockContext],
        logs: &[BlockLogs],
    ) -> Result<Option<BatchOutcome>> {
        let _guard = self
            .process_lock
            .lock()
            .map_err(|_| SyncError::Store("account process lock poisoned".into()))?;

        let scans = scan(
            &self.oracle,
            &self.private_key,
            &self.config.layout,
            blocks,
            logs,
        )?;
        let owner = Owner {
            private_key: &self.private_key,
            public_key: &self.public_key,
            address: &self.address,
        };
        let outcome = reconcile(self.store.as_ref(), &self.oracle, &owner, scans)?;
        if let Some(outcome) = &outcome {
            self.synced_height.store(outcome.synced_to, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    /// pull and process up to `batch_size` blocks past the cursor
    ///
    /// returns how many blocks were processed, 0 at the tip.
    pub fn sync_step(&self) -> Result<usize> {
        let height = self.source.block_height()?;
        let from = (self.synced_height() + 1).max(self.config.layout.initial_block_number);
        if from > height {
            return Ok(0);
        }
        let take = self.config.batch_size.min(height - from + 1);
        let blocks = self.source.blocks(from, take)?;
        let logs = self.source.encrypted_logs(from, take)?;
        if blocks.is_empty() {
            return Ok(0);
        }
        self.process_blocks(&blocks, &logs)?;
        Ok(blocks.len())
    }

    /// run `sync_step` until the cursor reaches the chain tip
    pub fn sync_to_tip(&self) -> Result<u64> {
        let mut processed = 0usize;
        loop {
            let n = self.sync_step()?;
            if n == 0 {
                break;
            }
            processed += n;
        }
        info!(
            "account {} synced to block {} ({} blocks)",
            self.address,
            self.synced_height(),
            processed
        );
        Ok(self.synced_height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct FixedHeight(u64);

    impl ChainSource for FixedHeight {
        fn block_height(&self) -> Result<u64> {
            Ok(self.0)
        }

        fn blocks(&self, _from: u64, _take: u64) -> Result<Vec<BlockContext>> {
            Ok(Vec::new())
        }

        fn encrypted_logs(&self, _from: u64, _take: u64) -> Result<Vec<BlockLogs>> {
            Ok(Vec::new())
        }
    }

    fn account(height: u64) -> AccountState<MemoryStore> {
        AccountState::new(
            &[42u8; 32],
            Address([1u8; 32]),
            Arc::new(MemoryStore::new()),
            Arc::new(FixedHeight(height)),
            SyncConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_key_length() {
        let err = AccountState::new(
            &[42u8; 31],
            Address([1u8; 32]),
            Arc::new(MemoryStore::new()),
            Arc::new(FixedHeight(0)),
            SyncConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SyncError::InvalidKeyLength(31)));
    }

    #[test]
    fn test_rejects_zero_key() {
        let err = AccountState::new(
            &[0u8; 32],
            Address([1u8; 32]),
            Arc::new(MemoryStore::new()),
            Arc::new(FixedHeight(0)),
            SyncConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SyncError::ZeroPrivateKey));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_public_key_matches_oracle() {
        let account = account(0);
        let key = PrivateKey::from_bytes([42u8; 32]);
        assert_eq!(account.public_key(), &PallasOracle.derive_public_key(&key).unwrap());
    }

    #[test]
    fn test_synchronised_against_height() {
        assert!(account(0).is_synchronised().unwrap());
        assert!(!account(5).is_synchronised().unwrap());
    }

    #[test]
    fn test_empty_batch_keeps_cursor() {
        let account = account(0);
        assert_eq!(account.process_blocks(&[], &[]).unwrap(), None);
        assert_eq!(account.synced_height(), 0);
        assert_eq!(account.store().commit_count(), 0);
    }

    #[test]
    fn test_pending_tx_is_not_overwritten() {
        let account = account(0);
        let hash = TxHash([3u8; 32]);
        let first = account
            .add_pending_tx(hash, TxKind::Call { to: Address([5u8; 32]) })
            .unwrap();
        let second = account
            .add_pending_tx(hash, TxKind::Deployment { contract_address: Address([6u8; 32]) })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(account.transactions().unwrap(), vec![first]);
    }

    #[test]
    fn test_historic_roots_zero_vk_root() {
        let account = account(0);
        let roots = TreeRoots {
            private_data: Fr::from_u64(1),
            nullifier: Fr::from_u64(2),
            contract: Fr::from_u64(3),
            l1_to_l2_messages: Fr::from_u64(4),
        };
        account.set_tree_roots(&roots).unwrap();
        let historic = account.historic_tree_roots().unwrap();
        assert_eq!(historic.contract_tree_root, Fr::from_u64(3));
        assert_eq!(historic.private_kernel_vk_tree_root, Fr::ZERO);
    }
}
