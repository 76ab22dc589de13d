//! block log scanner
//!
//! walks every block's logs in (tx slot, function call, log) order and
//! trial-decrypts each one against the account key. every log consumes one
//! leaf of the commitment tree whether it decrypts or not, so a note's index is
//! `block_start_index(block) + position of its log inside the block`.
//!
//! trial decryption is independent per log and runs on rayon with the
//! `parallel` feature. index assignment happens afterwards, in a sequential
//! fold over the results, so the numbering never depends on scheduling.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::block::{BlockContext, BlockLogs};
use crate::config::TreeLayout;
use crate::note::{NoteCandidate, NotePayload};
use crate::oracle::CryptoOracle;
use crate::types::PrivateKey;
use crate::{Result, SyncError};

/// owned notes found in one block
#[derive(Clone, Debug)]
pub struct ScanResult<'a> {
    pub block: &'a BlockContext,
    /// tx slots holding at least one owned note
    pub owned_tx_slots: BTreeSet<usize>,
    /// notes awaiting nullifier derivation, in index order
    pub candidates: Vec<NoteCandidate>,
}

/// running state threaded through one block's log slots
struct BlockFold {
    log_index: u64,
    owned_tx_slots: BTreeSet<usize>,
    candidates: Vec<NoteCandidate>,
}

impl BlockFold {
    fn new() -> Self {
        Self {
            log_index: 0,
            owned_tx_slots: BTreeSet::new(),
            candidates: Vec::new(),
        }
    }

    fn step(
        mut self,
        layout: &TreeLayout,
        block_number: u64,
        tx_slot: usize,
        note: Option<NotePayload>,
    ) -> Result<Self> {
        let index = layout.note_index(block_number, self.log_index)?;
        trace!(
            "block {} slot {} log {} -> index {} ({})",
            block_number,
            tx_slot,
            self.log_index,
            index,
            if note.is_some() { "mine" } else { "not mine" }
        );
        if let Some(payload) = note {
            self.owned_tx_slots.insert(tx_slot);
            self.candidates.push(NoteCandidate {
                payload,
                tx_slot,
                index,
            });
        }
        self.log_index += 1;
        Ok(self)
    }
}

/// scan `blocks` with their matching `logs`
///
/// `blocks` and `logs` must be the same length; the check and every block's
/// capacity check happen before any decryption work.
pub fn scan<'a, O: CryptoOracle + ?Sized>(
    oracle: &O,
    private_key: &PrivateKey,
    layout: &TreeLayout,
    blocks: &'a [BlockContext],
    logs: &[BlockLogs],
) -> Result<Vec<ScanResult<'a>>> {
    if blocks.len() != logs.len() {
        return Err(SyncError::BlockLogCountMismatch {
            blocks: blocks.len(),
            logs: logs.len(),
        });
    }
    if blocks.is_empty() {
        return Ok(Vec::new());
    }

    let capacity = layout.block_capacity();
    for (block, block_logs) in blocks.iter().zip(logs) {
        layout.block_start_index(block.number)?;
        if block_logs.log_count() as u64 > capacity {
            return Err(SyncError::BlockCapacityExceeded {
                block: block.number,
                capacity,
            });
        }
    }

    blocks
        .iter()
        .zip(logs)
        .map(|(block, block_logs)| scan_block(oracle, private_key, layout, block, block_logs))
        .collect()
}

fn scan_block<'a, O: CryptoOracle + ?Sized>(
    oracle: &O,
    private_key: &PrivateKey,
    layout: &TreeLayout,
    block: &'a BlockContext,
    block_logs: &BlockLogs,
) -> Result<ScanResult<'a>> {
    let slots: Vec<(usize, &[u8])> = block_logs.slots().collect();
    let decrypted = trial_decrypt(oracle, private_key, &slots)?;

    let fold = slots
        .iter()
        .zip(decrypted)
        .try_fold(BlockFold::new(), |acc, ((tx_slot, _), note)| {
            acc.step(layout, block.number, *tx_slot, note)
        })?;

    if !fold.candidates.is_empty() {
        debug!(
            "block {}: {} owned notes in {} tx slots ({} logs)",
            block.number,
            fold.candidates.len(),
            fold.owned_tx_slots.len(),
            fold.log_index
        );
    }

    Ok(ScanResult {
        block,
        owned_tx_slots: fold.owned_tx_slots,
        candidates: fold.candidates,
    })
}

#[cfg(feature = "parallel")]
fn trial_decrypt<O: CryptoOracle + ?Sized>(
    oracle: &O,
    private_key: &PrivateKey,
    slots: &[(usize, &[u8])],
) -> Result<Vec<Option<NotePayload>>> {
    use rayon::prelude::*;
    slots
        .par_iter()
        .map(|(_, log)| NotePayload::try_from_encrypted(oracle, log, private_key))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn trial_decrypt<O: CryptoOracle + ?Sized>(
    oracle: &O,
    private_key: &PrivateKey,
    slots: &[(usize, &[u8])],
) -> Result<Vec<Option<NotePayload>>> {
    slots
        .iter()
        .map(|(_, log)| NotePayload::try_from_encrypted(oracle, log, private_key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{FunctionLogs, TxLogs};
    use crate::oracle::PallasOracle;
    use crate::types::{BlockHash, PublicKey};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Fixture {
        rng: ChaCha20Rng,
        key: PrivateKey,
        public: PublicKey,
        stranger: PublicKey,
    }

    impl Fixture {
        fn new(seed: u64) -> Self {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let key = PrivateKey::random(&mut rng);
            let public = PallasOracle.derive_public_key(&key).unwrap();
            let other = PrivateKey::random(&mut rng);
            let stranger = PallasOracle.derive_public_key(&other).unwrap();
            Self {
                rng,
                key,
                public,
                stranger,
            }
        }

        fn log_for(&mut self, owner: PublicKey) -> (NotePayload, Vec<u8>) {
            let payload = NotePayload::random(&mut self.rng);
            let ephemeral = PrivateKey::random(&mut self.rng);
            let blob = payload.to_encrypted(&PallasOracle, &owner, &ephemeral).unwrap();
            (payload, blob)
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let f = Fixture::new(1);
        let blocks = vec![BlockContext::new(1, BlockHash::ZERO)];
        let err = scan(&PallasOracle, &f.key, &TreeLayout::default(), &blocks, &[]).unwrap_err();
        assert!(matches!(
            err,
            SyncError::BlockLogCountMismatch { blocks: 1, logs: 0 }
        ));
    }

    #[test]
    fn test_empty_input_is_noop() {
        let f = Fixture::new(2);
        let out = scan(&PallasOracle, &f.key, &TreeLayout::default(), &[], &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_indices_count_every_log() {
        let mut f = Fixture::new(3);
        let (_, other0) = f.log_for(f.stranger);
        let (mine1, blob1) = f.log_for(f.public);
        let (_, other2) = f.log_for(f.stranger);
        let (mine3, blob3) = f.log_for(f.public);

        // block 3 starts at leaf 32 under the default layout
        let blocks = vec![BlockContext::new(3, BlockHash([3u8; 32]))];
        let logs = vec![BlockLogs::new(vec![
            TxLogs {
                function_logs: vec![
                    FunctionLogs { logs: vec![other0] },
                    FunctionLogs { logs: vec![blob1, other2] },
                ],
            },
            TxLogs::default(),
            TxLogs::single(vec![blob3]),
        ])];

        let out = scan(&PallasOracle, &f.key, &TreeLayout::default(), &blocks, &logs).unwrap();
        assert_eq!(out.len(), 1);
        let result = &out[0];
        assert_eq!(result.owned_tx_slots, BTreeSet::from([0, 2]));
        assert_eq!(
            result.candidates,
            vec![
                NoteCandidate { payload: mine1, tx_slot: 0, index: 33 },
                NoteCandidate { payload: mine3, tx_slot: 2, index: 35 },
            ]
        );
    }

    #[test]
    fn test_next_block_base_is_recomputed() {
        let mut f = Fixture::new(4);
        let (_, a) = f.log_for(f.public);
        let (mine, b) = f.log_for(f.public);

        let blocks = vec![
            BlockContext::new(1, BlockHash([1u8; 32])),
            BlockContext::new(2, BlockHash([2u8; 32])),
        ];
        let logs = vec![
            BlockLogs::new(vec![TxLogs::single(vec![a])]),
            BlockLogs::new(vec![TxLogs::default(), TxLogs::single(vec![b])]),
        ];
        let out = scan(&PallasOracle, &f.key, &TreeLayout::default(), &blocks, &logs).unwrap();
        assert_eq!(out[0].candidates[0].index, 0);
        assert_eq!(out[1].candidates, vec![NoteCandidate { payload: mine, tx_slot: 1, index: 16 }]);
    }

    #[test]
    fn test_capacity_exceeded_rejected_before_decrypting() {
        let f = Fixture::new(5);
        let layout = TreeLayout {
            initial_block_number: 1,
            max_txs_per_block: 1,
            max_new_notes_per_tx: 2,
        };
        let blocks = vec![BlockContext::new(1, BlockHash::ZERO)];
        let logs = vec![BlockLogs::new(vec![TxLogs::single(vec![vec![0u8; 90]; 3])])];
        assert!(matches!(
            scan(&PallasOracle, &f.key, &layout, &blocks, &logs),
            Err(SyncError::BlockCapacityExceeded { block: 1, capacity: 2 })
        ));
    }

    #[test]
    fn test_block_before_initial_rejected() {
        let f = Fixture::new(6);
        let blocks = vec![BlockContext::new(0, BlockHash::ZERO)];
        let logs = vec![BlockLogs::default()];
        assert!(matches!(
            scan(&PallasOracle, &f.key, &TreeLayout::default(), &blocks, &logs),
            Err(SyncError::BlockBeforeInitial { block: 0, initial: 1 })
        ));
    }
}
