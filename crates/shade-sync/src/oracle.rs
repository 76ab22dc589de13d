//! arithmetic/hash oracle
//!
//! curve scalar multiplication and the siloed nullifier hash are black boxes
//! to the sync pipeline. `PallasOracle` is the in-process implementation over
//! the pallas curve; alternative curves plug in through `CryptoOracle`.

use blake2::{Blake2b512, Digest};
use ff::{Field, FromUniformBytes, PrimeField};
use group::prime::PrimeCurveAffine;
use group::{Curve, Group};
use pasta_curves::arithmetic::{Coordinates, CurveAffine};
use pasta_curves::pallas;
use subtle::CtOption;

use crate::types::{Address, Fr, Point, PrivateKey, PublicKey};
use crate::{Result, SyncError, NULLIFIER_DOMAIN, OUTER_NULLIFIER_DOMAIN};

/// curve and hash operations consumed by the cipher and nullifier deriver
pub trait CryptoOracle: Send + Sync {
    /// the curve base point
    fn generator(&self) -> Result<Point>;

    /// `scalar * point`; `SyncError::InvalidPoint` if `point` is not on the curve
    fn scalar_mul(&self, point: &Point, scalar: &PrivateKey) -> Result<Point>;

    /// nullifier hash over (preimage, key), siloed by contract address
    fn siloed_nullifier(
        &self,
        contract_address: &Address,
        preimage: &[Fr],
        private_key: &PrivateKey,
    ) -> Result<Fr>;

    /// `private_key * generator`
    fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey> {
        self.scalar_mul(&self.generator()?, private_key)
    }
}

/// pallas-curve oracle with blake2b nullifier hashing
#[derive(Debug, Clone, Copy, Default)]
pub struct PallasOracle;

impl PallasOracle {
    pub fn new() -> Self {
        Self
    }

    fn scalar(key: &PrivateKey) -> pallas::Scalar {
        let mut wide = [0u8; 64];
        wide[..32].copy_from_slice(key.as_bytes());
        pallas::Scalar::from_uniform_bytes(&wide)
    }

    /// rejects off-curve coordinates and the identity
    ///
    /// `(0, 0)` decodes to the identity, which would turn any key into a
    /// degenerate shared secret.
    fn decode(point: &Point) -> Result<pallas::Point> {
        let affine: CtOption<pallas::Affine> = pallas::Base::from_repr(point.x.0)
            .and_then(|x| pallas::Base::from_repr(point.y.0).and_then(|y| pallas::Affine::from_xy(x, y)));
        Option::<pallas::Affine>::from(affine)
            .filter(|p| !bool::from(p.is_identity()))
            .map(pallas::Point::from)
            .ok_or(SyncError::InvalidPoint)
    }

    fn encode(point: &pallas::Point) -> Result<Point> {
        let coords: Option<Coordinates<pallas::Affine>> = point.to_affine().coordinates().into();
        let coords = coords
            .ok_or_else(|| SyncError::Oracle("point at infinity has no coordinates".into()))?;
        Ok(Point::new(Fr(coords.x().to_repr()), Fr(coords.y().to_repr())))
    }

    fn hash_to_field(domain: &[u8], parts: &[&[u8]]) -> Fr {
        let mut hasher = Blake2b512::new();
        hasher.update(domain);
        for part in parts {
            hasher.update(part);
        }
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&hasher.finalize());
        Fr(pallas::Base::from_uniform_bytes(&wide).to_repr())
    }
}

impl CryptoOracle for PallasOracle {
    fn generator(&self) -> Result<Point> {
        Self::encode(&pallas::Point::generator())
    }

    fn scalar_mul(&self, point: &Point, scalar: &PrivateKey) -> Result<Point> {
        let p = Self::decode(point)?;
        let s = Self::scalar(scalar);
        if bool::from(s.is_zero()) {
            return Err(SyncError::ZeroPrivateKey);
        }
        Self::encode(&(p * s))
    }

    fn siloed_nullifier(
        &self,
        contract_address: &Address,
        preimage: &[Fr],
        private_key: &PrivateKey,
    ) -> Result<Fr> {
        let items: Vec<&[u8]> = preimage
            .iter()
            .map(|f| f.as_ref())
            .chain(std::iter::once(private_key.as_bytes().as_slice()))
            .collect();
        let inner = Self::hash_to_field(NULLIFIER_DOMAIN, &items);
        Ok(Self::hash_to_field(
            OUTER_NULLIFIER_DOMAIN,
            &[contract_address.as_ref(), inner.as_ref()],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_public_key_derivation_is_idempotent() {
        let oracle = PallasOracle::new();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let key = PrivateKey::random(&mut rng);
        let a = oracle.derive_public_key(&key).unwrap();
        let b = oracle.derive_public_key(&key).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, oracle.generator().unwrap());
    }

    #[test]
    fn test_ecdh_agrees() {
        let oracle = PallasOracle::new();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let a = PrivateKey::random(&mut rng);
        let b = PrivateKey::random(&mut rng);
        let pa = oracle.derive_public_key(&a).unwrap();
        let pb = oracle.derive_public_key(&b).unwrap();
        assert_eq!(
            oracle.scalar_mul(&pb, &a).unwrap(),
            oracle.scalar_mul(&pa, &b).unwrap()
        );
    }

    #[test]
    fn test_off_curve_point_rejected() {
        let oracle = PallasOracle::new();
        let key = PrivateKey::from_bytes([3u8; 32]);
        let bogus = Point::new(Fr::from_u64(1), Fr::from_u64(1));
        assert!(matches!(
            oracle.scalar_mul(&bogus, &key),
            Err(SyncError::InvalidPoint)
        ));
    }

    #[test]
    fn test_identity_point_rejected() {
        let oracle = PallasOracle::new();
        let key = PrivateKey::from_bytes([3u8; 32]);
        let identity = Point::new(Fr::ZERO, Fr::ZERO);
        assert!(matches!(
            oracle.scalar_mul(&identity, &key),
            Err(SyncError::InvalidPoint)
        ));
    }

    #[test]
    fn test_zero_scalar_rejected() {
        let oracle = PallasOracle::new();
        let zero = PrivateKey::from_bytes([0u8; 32]);
        let err = oracle.derive_public_key(&zero).unwrap_err();
        assert!(matches!(err, SyncError::ZeroPrivateKey));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_nullifier_is_siloed() {
        let oracle = PallasOracle::new();
        let key = PrivateKey::from_bytes([5u8; 32]);
        let preimage = vec![Fr::from_u64(10), Fr::from_u64(20)];
        let a = oracle
            .siloed_nullifier(&Address([1u8; 32]), &preimage, &key)
            .unwrap();
        let b = oracle
            .siloed_nullifier(&Address([2u8; 32]), &preimage, &key)
            .unwrap();
        let a2 = oracle
            .siloed_nullifier(&Address([1u8; 32]), &preimage, &key)
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a2);
    }
}
