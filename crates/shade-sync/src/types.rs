//! primitive types shared across the pipeline
//!
//! all ledger values arrive as fixed-size opaque buffers; these newtypes only
//! give them names, they never interpret field arithmetic themselves.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Result, SyncError};

/// field element (32 bytes, encoding owned by the oracle)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Fr(pub [u8; 32]);

impl Fr {
    pub const ZERO: Fr = Fr([0u8; 32]);
    pub const SIZE: usize = 32;

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }

    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        // keep below any ~254-bit modulus
        bytes[31] &= 0x0f;
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl AsRef<[u8]> for Fr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Fr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fr({})", self)
    }
}

impl std::fmt::Display for Fr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

macro_rules! byte_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: $name = $name([0u8; 32]);

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            pub fn to_bytes(&self) -> [u8; 32] {
                self.0
            }

            pub fn random<R: RngCore>(rng: &mut R) -> Self {
                let mut bytes = [0u8; 32];
                rng.fill_bytes(&mut bytes);
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }
    };
}

byte_id!(
    /// ledger address of an account or contract
    Address
);
byte_id!(
    /// transaction hash
    TxHash
);
byte_id!(
    /// block hash
    BlockHash
);

/// curve point, serialised as `x || y`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: Fr,
    pub y: Fr,
}

impl Point {
    pub const SIZE: usize = 64;

    pub fn new(x: Fr, y: Fr) -> Self {
        Self { x, y }
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.x.0);
        out[32..].copy_from_slice(&self.y.0);
        out
    }

    /// split a 64-byte buffer into coordinates; curve membership is the oracle's call
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        Some(Self {
            x: Fr::from_slice(&bytes[..32])?,
            y: Fr::from_slice(&bytes[32..])?,
        })
    }
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Point({}, {})", self.x, self.y)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

/// account public key
pub type PublicKey = Point;

/// 32-byte private scalar, wiped on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub const SIZE: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// reject anything that is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SyncError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_length() {
        assert!(PrivateKey::from_slice(&[7u8; 32]).is_ok());
        assert!(matches!(
            PrivateKey::from_slice(&[7u8; 31]),
            Err(SyncError::InvalidKeyLength(31))
        ));
        assert!(matches!(
            PrivateKey::from_slice(&[7u8; 33]),
            Err(SyncError::InvalidKeyLength(33))
        ));
    }

    #[test]
    fn test_point_bytes() {
        let p = Point::new(Fr([1u8; 32]), Fr([2u8; 32]));
        let bytes = p.to_bytes();
        assert_eq!(Point::from_slice(&bytes), Some(p));
        assert_eq!(Point::from_slice(&bytes[..63]), None);
    }

    #[test]
    fn test_zero_ids() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address([1u8; 32]).is_zero());
        assert!(Fr::ZERO.is_zero());
        assert_eq!(Fr::from_u64(5).0[0], 5);
    }

    #[test]
    fn test_private_key_debug_redacted() {
        let key = PrivateKey::from_bytes([9u8; 32]);
        assert_eq!(format!("{:?}", key), "PrivateKey(..)");
    }
}
