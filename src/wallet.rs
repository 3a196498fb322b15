// src/wallet.rs

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::balance::Balance;
use crate::crypto::{sha256, Hash};
use crate::error::NodeError;

pub const ADDRESS_LEN: usize = 36;

/// Fixed-width account identifier. Ordering is lexicographic over the raw
/// bytes, which is what the state checksum fold sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != ADDRESS_LEN {
            return Err(NodeError::InvalidArgument(format!(
                "address must be {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut raw = [0u8; ADDRESS_LEN];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Well-known burn address, the destination of PoW solution payouts.
    pub fn burn() -> Self {
        Self([0u8; ADDRESS_LEN])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

struct AddressVisitor;

impl<'de> de::Visitor<'de> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ADDRESS_LEN} address bytes")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Address, E> {
        Address::from_bytes(v).map_err(E::custom)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Address, A::Error> {
        let mut raw = [0u8; ADDRESS_LEN];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(Address(raw))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(AddressVisitor)
    }
}

/// Account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Address,
    pub balance: Balance,
    pub nonce: u64,
    pub data: Vec<u8>,
}

impl Wallet {
    /// Zero-initialized record, what a read of an unknown address returns.
    pub fn empty(id: Address) -> Self {
        Self {
            id,
            balance: Balance::zero(),
            nonce: 0,
            data: Vec::new(),
        }
    }

    /// Deterministic digest over the record fields. The balance enters in
    /// its canonical decimal form, the nonce little-endian.
    pub fn checksum(&self) -> Hash {
        let balance = self.balance.to_string();
        let mut buf =
            Vec::with_capacity(ADDRESS_LEN + balance.len() + 8 + self.data.len());
        buf.extend_from_slice(self.id.as_bytes());
        buf.extend_from_slice(balance.as_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.data);
        sha256(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::from_bytes(&[tag; ADDRESS_LEN]).unwrap()
    }

    #[test]
    fn address_length_is_enforced() {
        assert!(Address::from_bytes(&[1u8; 20]).is_err());
        assert!(Address::from_bytes(&[1u8; ADDRESS_LEN]).is_ok());
    }

    #[test]
    fn address_orders_lexicographically() {
        assert!(addr(1) < addr(2));
        let mut low = [5u8; ADDRESS_LEN];
        low[ADDRESS_LEN - 1] = 4;
        assert!(Address::from_bytes(&low).unwrap() < addr(5));
    }

    #[test]
    fn address_serde_round_trip() {
        let a = addr(7);
        let bytes = bincode::serialize(&a).unwrap();
        let back: Address = bincode::deserialize(&bytes).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn checksum_is_deterministic() {
        let w = Wallet {
            id: addr(1),
            balance: "12.5".parse().unwrap(),
            nonce: 3,
            data: vec![9, 9],
        };
        assert_eq!(w.checksum(), w.clone().checksum());
    }

    #[test]
    fn checksum_binds_every_field() {
        let w = Wallet {
            id: addr(1),
            balance: "12.5".parse().unwrap(),
            nonce: 3,
            data: vec![9, 9],
        };
        let mut other = w.clone();
        other.balance = "12.6".parse().unwrap();
        assert_ne!(w.checksum(), other.checksum());
        let mut other = w.clone();
        other.nonce = 4;
        assert_ne!(w.checksum(), other.checksum());
        let mut other = w.clone();
        other.data = vec![9];
        assert_ne!(w.checksum(), other.checksum());
        let mut other = w.clone();
        other.id = addr(2);
        assert_ne!(w.checksum(), other.checksum());
    }

    #[test]
    fn wallet_serde_round_trip() {
        let w = Wallet {
            id: addr(3),
            balance: "0.00000001".parse().unwrap(),
            nonce: 42,
            data: b"metadata".to_vec(),
        };
        let bytes = bincode::serialize(&w).unwrap();
        let back: Wallet = bincode::deserialize(&bytes).unwrap();
        assert_eq!(w, back);
    }
}
