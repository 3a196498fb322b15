// src/chain.rs
//
// Read-only view of the block chain plus the collaborator seams the core
// depends on. The node wires real implementations in; tests substitute
// in-memory fakes.
//

use serde::{Deserialize, Serialize};

use crate::wallet::Address;

/// Block header fields the mining core reads. An empty `pow_field` marks
/// the block as not yet sealed by a proof-of-work solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub block_num: u64,
    pub checksum: Vec<u8>,
    pub difficulty: u64,
    pub pow_field: Vec<u8>,
}

impl Block {
    pub fn is_sealed(&self) -> bool {
        !self.pow_field.is_empty()
    }
}

/// Chain storage handle.
pub trait BlockChainView: Send + Sync {
    fn last_block_num(&self) -> u64;
    fn block(&self, block_num: u64) -> Option<Block>;
}

/// Block processor handle; the miner only consults its operating flag.
pub trait BlockProcessorHandle: Send + Sync {
    fn operating(&self) -> bool;
}

/// Local key store handle.
pub trait WalletKeys: Send + Sync {
    fn address(&self) -> Address;
    fn public_key(&self) -> Vec<u8>;
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_means_nonempty_pow_field() {
        let mut block = Block {
            block_num: 1,
            checksum: vec![0xAB; 32],
            difficulty: 20,
            pow_field: Vec::new(),
        };
        assert!(!block.is_sealed());
        block.pow_field = vec![1];
        assert!(block.is_sealed());
    }
}
