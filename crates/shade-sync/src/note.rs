//! note payloads and owned-note records
//!
//! a note is immutable once created; only whether it is still owned changes,
//! and that lives in the store.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cipher::{decrypt_buffer, encrypt_buffer, TrialDecryption};
use crate::oracle::CryptoOracle;
use crate::types::{Address, Fr, PrivateKey, PublicKey};
use crate::Result;

/// plaintext carried by an encrypted note log
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotePayload {
    /// contract that owns the note
    pub contract_address: Address,
    /// storage slot within that contract
    pub storage_slot: Fr,
    /// note preimage fields
    pub preimage: Vec<Fr>,
}

impl NotePayload {
    pub fn new(contract_address: Address, storage_slot: Fr, preimage: Vec<Fr>) -> Self {
        Self {
            contract_address,
            storage_slot,
            preimage,
        }
    }

    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        let len = (rng.next_u32() % 4 + 1) as usize;
        Self {
            contract_address: Address::random(rng),
            storage_slot: Fr::random(rng),
            preimage: (0..len).map(|_| Fr::random(rng)).collect(),
        }
    }

    /// `contract (32) || slot (32) || count (u32 be) || count * 32`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(68 + self.preimage.len() * Fr::SIZE);
        bytes.extend_from_slice(self.contract_address.as_ref());
        bytes.extend_from_slice(self.storage_slot.as_ref());
        bytes.extend_from_slice(&(self.preimage.len() as u32).to_be_bytes());
        for item in &self.preimage {
            bytes.extend_from_slice(item.as_ref());
        }
        bytes
    }

    /// strict inverse of `to_bytes`; trailing bytes are rejected
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 68 {
            return None;
        }
        let contract_address = Address(bytes[..32].try_into().ok()?);
        let storage_slot = Fr::from_slice(&bytes[32..64])?;
        let count = u32::from_be_bytes(bytes[64..68].try_into().ok()?) as usize;
        let body = &bytes[68..];
        if body.len() != count.checked_mul(Fr::SIZE)? {
            return None;
        }
        let preimage = body
            .chunks_exact(Fr::SIZE)
            .map(Fr::from_slice)
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            contract_address,
            storage_slot,
            preimage,
        })
    }

    /// encrypt for `owner` under `ephemeral`
    pub fn to_encrypted<O: CryptoOracle + ?Sized>(
        &self,
        oracle: &O,
        owner: &PublicKey,
        ephemeral: &PrivateKey,
    ) -> Result<Vec<u8>> {
        encrypt_buffer(oracle, &self.to_bytes(), owner, ephemeral)
    }

    /// trial-decrypt a log entry, `Ok(None)` when it is not ours
    pub fn try_from_encrypted<O: CryptoOracle + ?Sized>(
        oracle: &O,
        blob: &[u8],
        private_key: &PrivateKey,
    ) -> Result<Option<Self>> {
        match decrypt_buffer(oracle, blob, private_key)? {
            TrialDecryption::NotMine => Ok(None),
            TrialDecryption::Decrypted(plaintext) => {
                let payload = Self::from_bytes(&plaintext);
                if payload.is_none() {
                    warn!(
                        "log decrypted but plaintext is not a note payload ({} bytes), skipping",
                        plaintext.len()
                    );
                }
                Ok(payload)
            }
        }
    }
}

/// note found by the scanner, waiting for its nullifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteCandidate {
    pub payload: NotePayload,
    /// transaction slot inside the block
    pub tx_slot: usize,
    /// global leaf index in the commitment tree
    pub index: u64,
}

/// owned note as persisted by the store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteRecord {
    pub payload: NotePayload,
    pub nullifier: Fr,
    /// global leaf index in the commitment tree
    pub index: u64,
    /// owning account public key
    pub account: PublicKey,
}
