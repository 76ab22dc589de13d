//! state reconciler
//!
//! folds scan results into one `SyncBatch`: owned notes with nullifiers,
//! transaction records for owner-pertaining tx slots, the blocks' published
//! nullifiers and block info for txs the store already knows. the batch is
//! then committed in one `commit_batch` call, so the cursor only moves once
//! everything else is durable.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::nullifier::decorate;
use crate::oracle::CryptoOracle;
use crate::scanner::ScanResult;
use crate::store::{BatchOutcome, Confirmation, NoteStore, SyncBatch};
use crate::tx::{TxKind, TxRecord};
use crate::types::{Address, PrivateKey, PublicKey, TxHash};
use crate::{Result, SyncError};

/// account identity the batch is built for
pub struct Owner<'a> {
    pub private_key: &'a PrivateKey,
    pub public_key: &'a PublicKey,
    pub address: &'a Address,
}

/// build the batch for `scans`, `None` when there is nothing to reconcile
pub fn build_batch<S, O>(
    store: &S,
    oracle: &O,
    owner: &Owner<'_>,
    scans: Vec<ScanResult<'_>>,
) -> Result<Option<SyncBatch>>
where
    S: NoteStore + ?Sized,
    O: CryptoOracle + ?Sized,
{
    let Some(last) = scans.last() else {
        return Ok(None);
    };
    let mut batch = SyncBatch::new(*owner.public_key, last.block.number);
    let mut created: HashSet<TxHash> = HashSet::new();

    for scan in scans {
        let block = scan.block;

        for &slot in &scan.owned_tx_slots {
            let tx = block.tx(slot).ok_or(SyncError::UnknownTransaction {
                block: block.number,
                slot,
            })?;
            // owned_tx_slots only holds slots with at least one candidate
            let Some(note) = scan.candidates.iter().find(|c| c.tx_slot == slot) else {
                continue;
            };
            let contract_address = note.payload.contract_address;
            let kind = if tx.is_deployment() {
                TxKind::Deployment { contract_address }
            } else {
                TxKind::Call { to: contract_address }
            };
            let record = TxRecord::mined(tx.hash, block.hash, block.number, *owner.address, kind);
            record.validate()?;
            debug!("block {} tx {} ({:?})", block.number, tx.hash, kind);
            created.insert(tx.hash);
            batch.new_txs.push(record);
        }

        for candidate in scan.candidates {
            batch.notes.push(decorate(
                oracle,
                candidate,
                owner.private_key,
                owner.public_key,
            )?);
        }

        batch.nullifiers.extend_from_slice(&block.new_nullifiers);

        for tx in &block.txs {
            if created.contains(&tx.hash) {
                continue;
            }
            if store.get_tx(&tx.hash)?.is_some() {
                debug!("confirming stored tx {} in block {}", tx.hash, block.number);
                batch.confirmations.push(Confirmation {
                    tx_hash: tx.hash,
                    block_hash: block.hash,
                    block_number: block.number,
                });
            }
        }
    }

    Ok(Some(batch))
}

/// reconcile `scans` into `store`, returning the commit outcome
///
/// `Ok(None)` for an empty scan: nothing is written and the cursor stays put.
pub fn reconcile<S, O>(
    store: &S,
    oracle: &O,
    owner: &Owner<'_>,
    scans: Vec<ScanResult<'_>>,
) -> Result<Option<BatchOutcome>>
where
    S: NoteStore + ?Sized,
    O: CryptoOracle + ?Sized,
{
    let first = scans.first().map(|s| s.block.number);
    let Some(batch) = build_batch(store, oracle, owner, scans)? else {
        return Ok(None);
    };
    let outcome = store.commit_batch(&batch)?;
    info!(
        "synced blocks {}..={}: +{} notes, -{} notes, +{} txs, {} confirmed",
        first.unwrap_or(batch.synced_to),
        batch.synced_to,
        outcome.notes_added,
        outcome.notes_removed,
        outcome.txs_added,
        outcome.txs_confirmed
    );
    Ok(Some(outcome))
}
