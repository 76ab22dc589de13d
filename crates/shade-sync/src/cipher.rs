//! note cipher: ECDH-keyed AES-128-CBC with an echoed IV prefix
//!
//! ```text
//! blob = AES-128-CBC(key, iv, iv[..8] || plaintext) || ephemeral_pubkey (64)
//! key || iv = SHA-256(ECDH(pubkey, privkey) || 0x01)
//! ```
//!
//! decryption doubles as the ownership test: a wrong key either breaks the
//! padding or fails to reproduce the iv prefix. both outcomes are `NotMine`.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::oracle::CryptoOracle;
use crate::types::{Point, PrivateKey, PublicKey};
use crate::{Result, SyncError};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// bytes of the iv echoed in front of the plaintext
pub const IV_ECHO_LEN: usize = 8;
const BLOCK_LEN: usize = 16;

/// outcome of a trial decryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialDecryption {
    Decrypted(Vec<u8>),
    NotMine,
}

/// AES key material derived from an ECDH shared secret, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AesSecret([u8; 32]);

impl AesSecret {
    pub fn key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key.copy_from_slice(&self.0[..16]);
        key
    }

    pub fn iv(&self) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&self.0[16..]);
        iv
    }
}

/// hash the shared point with a fixed domain byte into 32 bytes of key material
///
/// an all-zero point encodes the identity and is refused as `InvalidPoint`,
/// on input and on output, whatever the oracle.
pub fn derive_aes_secret<O: CryptoOracle + ?Sized>(
    oracle: &O,
    ecdh_public_key: &PublicKey,
    ecdh_private_key: &PrivateKey,
) -> Result<AesSecret> {
    if is_identity(ecdh_public_key) {
        return Err(SyncError::InvalidPoint);
    }
    let shared = oracle.scalar_mul(ecdh_public_key, ecdh_private_key)?;
    if is_identity(&shared) {
        return Err(SyncError::InvalidPoint);
    }
    let mut hasher = Sha256::new();
    hasher.update(shared.to_bytes());
    hasher.update([1u8]);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Ok(AesSecret(out))
}

fn is_identity(point: &Point) -> bool {
    point.x.is_zero() && point.y.is_zero()
}

/// encrypt `data` for `owner` under a fresh ephemeral key
pub fn encrypt_buffer<O: CryptoOracle + ?Sized>(
    oracle: &O,
    data: &[u8],
    owner: &PublicKey,
    ephemeral: &PrivateKey,
) -> Result<Vec<u8>> {
    let secret = derive_aes_secret(oracle, owner, ephemeral)?;
    let iv = secret.iv();

    let mut plaintext = Vec::with_capacity(IV_ECHO_LEN + data.len());
    plaintext.extend_from_slice(&iv[..IV_ECHO_LEN]);
    plaintext.extend_from_slice(data);

    let mut blob = Aes128CbcEnc::new(&secret.key().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);
    let ephemeral_public = oracle.derive_public_key(ephemeral)?;
    blob.extend_from_slice(&ephemeral_public.to_bytes());
    Ok(blob)
}

/// trial-decrypt `blob` with `private_key`
///
/// only oracle failures are errors. a malformed blob, an off-curve ephemeral
/// key, bad padding or a mismatched iv echo all resolve to `NotMine`.
pub fn decrypt_buffer<O: CryptoOracle + ?Sized>(
    oracle: &O,
    blob: &[u8],
    private_key: &PrivateKey,
) -> Result<TrialDecryption> {
    if blob.len() < Point::SIZE + BLOCK_LEN {
        trace!("blob too short for trial decryption: {} bytes", blob.len());
        return Ok(TrialDecryption::NotMine);
    }
    let (ciphertext, ephemeral_bytes) = blob.split_at(blob.len() - Point::SIZE);
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Ok(TrialDecryption::NotMine);
    }
    let Some(ephemeral_public) = Point::from_slice(ephemeral_bytes) else {
        return Ok(TrialDecryption::NotMine);
    };

    let secret = match derive_aes_secret(oracle, &ephemeral_public, private_key) {
        Ok(secret) => secret,
        Err(SyncError::InvalidPoint) => return Ok(TrialDecryption::NotMine),
        Err(e) => return Err(e),
    };
    let iv = secret.iv();

    let plaintext = match Aes128CbcDec::new(&secret.key().into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
    {
        Ok(plaintext) => plaintext,
        Err(_) => return Ok(TrialDecryption::NotMine),
    };

    if plaintext.len() < IV_ECHO_LEN || plaintext[..IV_ECHO_LEN] != iv[..IV_ECHO_LEN] {
        return Ok(TrialDecryption::NotMine);
    }
    Ok(TrialDecryption::Decrypted(plaintext[IV_ECHO_LEN..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::PallasOracle;
    use crate::types::{Address, Fr};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn keypair(seed: u64) -> (PrivateKey, PublicKey) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let key = PrivateKey::random(&mut rng);
        let public = PallasOracle.derive_public_key(&key).unwrap();
        (key, public)
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (owner_key, owner_pub) = keypair(1);
        let (ephemeral, _) = keypair(2);
        let data = b"the note preimage goes here".to_vec();

        let blob = encrypt_buffer(&PallasOracle, &data, &owner_pub, &ephemeral).unwrap();
        assert_eq!(blob.len() % BLOCK_LEN, Point::SIZE % BLOCK_LEN);

        let out = decrypt_buffer(&PallasOracle, &blob, &owner_key).unwrap();
        assert_eq!(out, TrialDecryption::Decrypted(data));
    }

    #[test]
    fn test_wrong_key_is_not_mine() {
        let (_, owner_pub) = keypair(3);
        let (ephemeral, _) = keypair(4);
        let (stranger, _) = keypair(5);

        let blob = encrypt_buffer(&PallasOracle, b"secret", &owner_pub, &ephemeral).unwrap();
        let out = decrypt_buffer(&PallasOracle, &blob, &stranger).unwrap();
        assert_eq!(out, TrialDecryption::NotMine);
    }

    #[test]
    fn test_malformed_blobs_are_not_mine() {
        let (key, _) = keypair(6);
        for blob in [
            vec![],
            vec![0u8; 10],
            vec![0u8; Point::SIZE + 17],
            vec![1u8; Point::SIZE + 32],
            vec![0u8; BLOCK_LEN + Point::SIZE],
        ] {
            assert_eq!(
                decrypt_buffer(&PallasOracle, &blob, &key).unwrap(),
                TrialDecryption::NotMine
            );
        }
    }

    /// oracle that maps every product to the identity
    struct DegenerateOracle;

    impl CryptoOracle for DegenerateOracle {
        fn generator(&self) -> Result<Point> {
            PallasOracle.generator()
        }

        fn scalar_mul(&self, _: &Point, _: &PrivateKey) -> Result<Point> {
            Ok(Point::new(Fr::ZERO, Fr::ZERO))
        }

        fn siloed_nullifier(&self, _: &Address, _: &[Fr], _: &PrivateKey) -> Result<Fr> {
            Ok(Fr::ZERO)
        }
    }

    #[test]
    fn test_identity_shared_secret_is_not_mine() {
        let (key, _) = keypair(9);
        let blob = vec![1u8; BLOCK_LEN + Point::SIZE];
        assert_eq!(
            decrypt_buffer(&DegenerateOracle, &blob, &key).unwrap(),
            TrialDecryption::NotMine
        );
        assert!(matches!(
            derive_aes_secret(&PallasOracle, &Point::new(Fr::ZERO, Fr::ZERO), &key),
            Err(SyncError::InvalidPoint)
        ));
    }

    #[test]
    fn test_aes_secret_wipes() {
        let (key, _) = keypair(10);
        let (_, public) = keypair(11);
        let mut secret = derive_aes_secret(&PallasOracle, &public, &key).unwrap();
        assert_ne!(secret.key(), [0u8; 16]);
        secret.zeroize();
        assert_eq!(secret.key(), [0u8; 16]);
        assert_eq!(secret.iv(), [0u8; 16]);
    }

    #[test]
    fn test_empty_plaintext() {
        let (owner_key, owner_pub) = keypair(7);
        let (ephemeral, _) = keypair(8);
        let blob = encrypt_buffer(&PallasOracle, &[], &owner_pub, &ephemeral).unwrap();
        assert_eq!(
            decrypt_buffer(&PallasOracle, &blob, &owner_key).unwrap(),
            TrialDecryption::Decrypted(vec![])
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_roundtrip_and_wrong_key(data in proptest::collection::vec(any::<u8>(), 0..200), seed in any::<u64>()) {
            let (owner_key, owner_pub) = keypair(seed);
            let (ephemeral, _) = keypair(seed.wrapping_add(1));
            let (stranger, _) = keypair(seed.wrapping_add(2));

            let blob = encrypt_buffer(&PallasOracle, &data, &owner_pub, &ephemeral).unwrap();
            prop_assert_eq!(
                decrypt_buffer(&PallasOracle, &blob, &owner_key).unwrap(),
                TrialDecryption::Decrypted(data)
            );
            prop_assert_eq!(
                decrypt_buffer(&PallasOracle, &blob, &stranger).unwrap(),
                TrialDecryption::NotMine
            );
        }
    }
}
