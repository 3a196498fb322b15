// src/crypto.rs

use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};

use crate::error::NodeError;
use crate::Result;

/// 256-bit digest
pub type Hash = [u8; 32];

/// Argon2id puzzle parameters. Fixed by consensus.
pub const POW_MEMORY_KIB: u32 = 1024;
pub const POW_ITERATIONS: u32 = 1;
pub const POW_LANES: u32 = 4;
pub const POW_OUTPUT_LEN: usize = 32;

pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Argon2id digest over `(password, salt)` with the consensus parameters.
pub fn argon2id_pow(password: &[u8], salt: &[u8]) -> Result<Hash> {
    let params = Params::new(
        POW_MEMORY_KIB,
        POW_ITERATIONS,
        POW_LANES,
        Some(POW_OUTPUT_LEN),
    )
    .map_err(|e| NodeError::CryptographyError(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = [0u8; POW_OUTPUT_LEN];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| NodeError::CryptographyError(e.to_string()))?;
    Ok(out)
}
