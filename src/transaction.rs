// src/transaction.rs
//
// Transaction model for the mining core. Only the proof-of-work solution
// kind is produced here; everything else lives with the transaction pool.
//

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::balance::Balance;
use crate::chain::WalletKeys;
use crate::crypto::sha256;
use crate::wallet::Address;
use crate::Result;

const POW_PAYLOAD_DELIMITER: &str = "||";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    PoWSolution { block_num: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionType,
    pub from: Address,
    pub to: Address,
    pub amount: Balance,
    pub data: Vec<u8>,
    pub timestamp: i64,
    pub checksum: Vec<u8>,
    pub signature: Option<Vec<u8>>,
}

/// Canonical view the checksum and signature cover. The id, checksum and
/// signature themselves stay out of it.
#[derive(Serialize)]
struct SigningView<'a> {
    kind: &'a TransactionType,
    from: &'a Address,
    to: &'a Address,
    amount: &'a Balance,
    data: &'a [u8],
    timestamp: i64,
}

impl Transaction {
    /// Builds an unsigned PoW-solution transaction: zero-amount transfer
    /// from the solver to the burn address, the solution in `data`.
    pub fn new_pow_solution(
        solver: Address,
        public_key: &[u8],
        block_num: u64,
        nonce: &str,
    ) -> Result<Self> {
        let mut tx = Self {
            id: String::new(),
            kind: TransactionType::PoWSolution { block_num },
            from: solver,
            to: Address::burn(),
            amount: Balance::zero(),
            data: pow_payload(public_key, block_num, nonce),
            timestamp: Utc::now().timestamp(),
            checksum: Vec::new(),
            signature: None,
        };
        tx.checksum = tx.compute_checksum()?;
        tx.id = hex::encode(&tx.checksum);
        Ok(tx)
    }

    fn signing_bytes(&self) -> Result<Vec<u8>> {
        let view = SigningView {
            kind: &self.kind,
            from: &self.from,
            to: &self.to,
            amount: &self.amount,
            data: &self.data,
            timestamp: self.timestamp,
        };
        Ok(bincode::serialize(&view)?)
    }

    pub fn compute_checksum(&self) -> Result<Vec<u8>> {
        Ok(sha256(&self.signing_bytes()?).to_vec())
    }

    pub fn sign(&mut self, keys: &dyn WalletKeys) -> Result<()> {
        let message = self.signing_bytes()?;
        self.signature = Some(keys.sign(&message));
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// `"pubkey||blockNum||nonce"`, ASCII. The delimiter layout is fixed by
/// consensus; the public key travels as lowercase hex.
pub fn pow_payload(public_key: &[u8], block_num: u64, nonce: &str) -> Vec<u8> {
    format!(
        "{}{POW_PAYLOAD_DELIMITER}{block_num}{POW_PAYLOAD_DELIMITER}{nonce}",
        hex::encode(public_key)
    )
    .into_bytes()
}

/// Splits a solution payload back into `(pubkey, block_num, nonce)`.
/// Returns `None` for anything that does not parse.
pub fn parse_pow_payload(payload: &[u8]) -> Option<(Vec<u8>, u64, String)> {
    let text = std::str::from_utf8(payload).ok()?;
    let mut parts = text.splitn(3, POW_PAYLOAD_DELIMITER);
    let public_key = hex::decode(parts.next()?).ok()?;
    let block_num = parts.next()?.parse().ok()?;
    let nonce = parts.next()?.to_string();
    Some((public_key, block_num, nonce))
}
