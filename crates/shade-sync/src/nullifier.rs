//! nullifier derivation
//!
//! pure function of (contract address, preimage, owner key). oracle failures
//! are never skipped: a wrong or missing nullifier would let a spent note look
//! spendable.

use tracing::debug;

use crate::note::{NoteCandidate, NotePayload, NoteRecord};
use crate::oracle::CryptoOracle;
use crate::types::{Fr, PrivateKey, PublicKey};
use crate::Result;

/// siloed nullifier of `note` under `owner`
pub fn derive_nullifier<O: CryptoOracle + ?Sized>(
    oracle: &O,
    note: &NotePayload,
    owner: &PrivateKey,
) -> Result<Fr> {
    oracle.siloed_nullifier(&note.contract_address, &note.preimage, owner)
}

/// turn a scan candidate into an owned-note record
pub fn decorate<O: CryptoOracle + ?Sized>(
    oracle: &O,
    candidate: NoteCandidate,
    owner: &PrivateKey,
    account: &PublicKey,
) -> Result<NoteRecord> {
    let nullifier = derive_nullifier(oracle, &candidate.payload, owner)?;
    debug!(
        "note at index {} (slot {}) nullifier {}",
        candidate.index, candidate.tx_slot, nullifier
    );
    Ok(NoteRecord {
        payload: candidate.payload,
        nullifier,
        index: candidate.index,
        account: *account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::PallasOracle;
    use crate::types::{Address, Point};
    use crate::SyncError;

    struct FailingOracle;

    impl CryptoOracle for FailingOracle {
        fn generator(&self) -> Result<Point> {
            PallasOracle.generator()
        }

        fn scalar_mul(&self, point: &Point, scalar: &PrivateKey) -> Result<Point> {
            PallasOracle.scalar_mul(point, scalar)
        }

        fn siloed_nullifier(&self, _: &Address, _: &[Fr], _: &PrivateKey) -> Result<Fr> {
            Err(SyncError::Oracle("hash backend unavailable".into()))
        }
    }

    fn payload() -> NotePayload {
        NotePayload::new(
            Address([4u8; 32]),
            Fr::from_u64(1),
            vec![Fr::from_u64(100), Fr::from_u64(7)],
        )
    }

    #[test]
    fn test_nullifier_is_deterministic() {
        let key = PrivateKey::from_bytes([1u8; 32]);
        let other = PrivateKey::from_bytes([2u8; 32]);
        let a = derive_nullifier(&PallasOracle, &payload(), &key).unwrap();
        let b = derive_nullifier(&PallasOracle, &payload(), &key).unwrap();
        let c = derive_nullifier(&PallasOracle, &payload(), &other).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_decorate_keeps_position() {
        let key = PrivateKey::from_bytes([1u8; 32]);
        let account = PallasOracle.derive_public_key(&key).unwrap();
        let candidate = NoteCandidate {
            payload: payload(),
            tx_slot: 2,
            index: 41,
        };
        let record = decorate(&PallasOracle, candidate, &key, &account).unwrap();
        assert_eq!(record.index, 41);
        assert_eq!(record.account, account);
        assert_eq!(
            record.nullifier,
            derive_nullifier(&PallasOracle, &payload(), &key).unwrap()
        );
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let key = PrivateKey::from_bytes([1u8; 32]);
        assert!(matches!(
            derive_nullifier(&FailingOracle, &payload(), &key),
            Err(SyncError::Oracle(_))
        ));
    }
}
