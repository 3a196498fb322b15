// src/wallet_state.rs
//
// Authoritative in-memory view of all account balances. A single-level
// copy-on-write overlay (`delta`) lets the block processor apply a proposed
// block speculatively, read the resulting state checksum, then commit or
// revert without touching the committed map.
//

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::balance::Balance;
use crate::crypto::sha256;
use crate::wallet::{Address, Wallet};
use crate::Result;

/// Seed of the state checksum fold. Fixed by consensus.
const STATE_CHECKSUM_SEED: &[u8] = b"IXIAN-DLT";

/// One slice of the committed map, shipped to syncing peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsChunk {
    pub block_num: u64,
    pub chunk_num: i32,
    pub wallets: Vec<Wallet>,
}

impl WsChunk {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[derive(Debug, Clone, Default)]
struct Inner {
    /// Committed ground truth.
    base: BTreeMap<Address, Wallet>,
    /// Copy-on-write overlay, present iff a snapshot is active. Holds only
    /// wallets modified since the snapshot was taken.
    delta: Option<HashMap<Address, Wallet>>,
    cached_checksum: Option<Vec<u8>>,
    cached_delta_checksum: Option<Vec<u8>>,
}

impl Inner {
    fn lookup(&self, id: &Address, from_snapshot: bool) -> Option<&Wallet> {
        if from_snapshot {
            if let Some(wallet) = self.delta.as_ref().and_then(|d| d.get(id)) {
                return Some(wallet);
            }
        }
        self.base.get(id)
    }

    fn compute_checksum(&self, from_snapshot: bool) -> Vec<u8> {
        let mut addresses: Vec<&Address> = self.base.keys().collect();
        if from_snapshot {
            if let Some(delta) = &self.delta {
                addresses.extend(delta.keys().filter(|a| !self.base.contains_key(*a)));
            }
        }
        addresses.sort_unstable();

        // The fold concatenates uppercase hex *strings*, not raw bytes.
        // Deployed nodes agree on exactly this form.
        let mut digest = sha256(STATE_CHECKSUM_SEED).to_vec();
        for id in addresses {
            let wallet = match self.lookup(id, from_snapshot) {
                Some(w) => w,
                None => continue,
            };
            let folded = format!(
                "{}{}",
                hex::encode_upper(&digest),
                hex::encode_upper(wallet.checksum())
            );
            digest = sha256(folded.as_bytes()).to_vec();
        }
        digest
    }
}

pub struct WalletState {
    inner: Mutex<Inner>,
}

impl Default for WalletState {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy: base and caches always, the delta only when a snapshot is
/// active on the source.
impl Clone for WalletState {
    fn clone(&self) -> Self {
        Self {
            inner: Mutex::new(self.inner.lock().clone()),
        }
    }
}

impl WalletState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Record for `id` by the overlay rule; unknown addresses read as a
    /// zero-initialized record. Always returns a copy.
    pub fn get_wallet(&self, id: &Address, from_snapshot: bool) -> Wallet {
        let inner = self.inner.lock();
        inner
            .lookup(id, from_snapshot)
            .cloned()
            .unwrap_or_else(|| Wallet::empty(*id))
    }

    pub fn get_balance(&self, id: &Address, from_snapshot: bool) -> Balance {
        self.get_wallet(id, from_snapshot).balance
    }

    pub fn has_wallet(&self, id: &Address, from_snapshot: bool) -> bool {
        self.inner.lock().lookup(id, from_snapshot).is_some()
    }

    /// Number of committed wallets (the overlay is not counted).
    pub fn wallet_count(&self) -> usize {
        self.inner.lock().base.len()
    }

    pub fn is_snapshotting(&self) -> bool {
        self.inner.lock().delta.is_some()
    }

    /// Writes a fresh `{id, balance, nonce or 0}` record into the chosen
    /// layer. Returns false (and leaves all state untouched) when asked to
    /// write into a snapshot that is not active.
    pub fn set_wallet_balance(
        &self,
        id: Address,
        balance: Balance,
        to_snapshot: bool,
        nonce: Option<u64>,
    ) -> bool {
        let mut inner = self.inner.lock();
        let wallet = Wallet {
            id,
            balance,
            nonce: nonce.unwrap_or(0),
            data: Vec::new(),
        };
        if to_snapshot {
            match inner.delta.as_mut() {
                Some(delta) => {
                    delta.insert(id, wallet);
                }
                None => {
                    log::warn!("set_wallet_balance({id}) dropped: no snapshot is active");
                    return false;
                }
            }
            inner.cached_delta_checksum = None;
        } else {
            inner.base.insert(id, wallet);
            // A snapshot checksum is a function of base too.
            inner.cached_checksum = None;
            inner.cached_delta_checksum = None;
        }
        true
    }

    /// Re-stamps the nonce of an existing record, balance preserved.
    /// Returns false when the wallet exists in neither layer, or when asked
    /// to write into a snapshot that is not active.
    pub fn set_wallet_nonce(&self, id: &Address, nonce: u64, to_snapshot: bool) -> bool {
        let mut inner = self.inner.lock();
        let current = inner.lookup(id, to_snapshot).cloned();
        let mut wallet = match current {
            Some(w) => w,
            None => {
                log::warn!("set_wallet_nonce({id}) dropped: wallet not found");
                return false;
            }
        };
        wallet.nonce = nonce;
        if to_snapshot {
            match inner.delta.as_mut() {
                Some(delta) => {
                    delta.insert(*id, wallet);
                }
                None => {
                    log::warn!("set_wallet_nonce({id}) dropped: no snapshot is active");
                    return false;
                }
            }
            inner.cached_delta_checksum = None;
        } else {
            inner.base.insert(*id, wallet);
            inner.cached_checksum = None;
            inner.cached_delta_checksum = None;
        }
        true
    }

    /// Opens the copy-on-write overlay. Snapshots do not nest; returns
    /// false when one is already pending.
    pub fn snapshot(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.delta.is_some() {
            return false;
        }
        inner.delta = Some(HashMap::new());
        true
    }

    /// Folds the overlay into the committed map. No-op without a snapshot.
    pub fn commit(&self) {
        let mut inner = self.inner.lock();
        let delta = match inner.delta.take() {
            Some(d) => d,
            None => return,
        };
        for (id, wallet) in delta {
            inner.base.insert(id, wallet);
        }
        // Unconditionally, even for an empty overlay.
        inner.cached_checksum = None;
        inner.cached_delta_checksum = None;
    }

    /// Discards the overlay. No-op without a snapshot.
    pub fn revert(&self) {
        let mut inner = self.inner.lock();
        if inner.delta.take().is_some() {
            inner.cached_delta_checksum = None;
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.base.clear();
        inner.delta = None;
        inner.cached_checksum = None;
        inner.cached_delta_checksum = None;
    }

    /// State checksum, memoized until the next mutation of the layer it
    /// covers. With `from_snapshot` the overlay is folded over the base.
    pub fn checksum(&self, from_snapshot: bool) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let cached = if from_snapshot {
            &inner.cached_delta_checksum
        } else {
            &inner.cached_checksum
        };
        if let Some(digest) = cached {
            return digest.clone();
        }
        let digest = inner.compute_checksum(from_snapshot);
        if from_snapshot {
            inner.cached_delta_checksum = Some(digest.clone());
        } else {
            inner.cached_checksum = Some(digest.clone());
        }
        digest
    }

    /// Partitions the committed map into `ceil(len / chunk_size)` chunks.
    /// BTreeMap iteration keeps the partition stable for the duration of
    /// the call; consumers match chunks by checksum, not order.
    pub fn chunks(&self, chunk_size: usize, block_num: u64) -> Vec<WsChunk> {
        let inner = self.inner.lock();
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::with_capacity(inner.base.len().div_ceil(chunk_size));
        let mut wallets = Vec::with_capacity(chunk_size.min(inner.base.len()));
        for wallet in inner.base.values() {
            wallets.push(wallet.clone());
            if wallets.len() == chunk_size {
                chunks.push(WsChunk {
                    block_num,
                    chunk_num: chunks.len() as i32,
                    wallets: std::mem::take(&mut wallets),
                });
            }
        }
        if !wallets.is_empty() {
            chunks.push(WsChunk {
                block_num,
                chunk_num: chunks.len() as i32,
                wallets,
            });
        }
        chunks
    }

    /// Inserts or overwrites committed records from a sync chunk. Rejected
    /// (no state change) while a snapshot is active.
    pub fn apply_chunk_wallets(&self, wallets: &[Wallet]) -> bool {
        let mut inner = self.inner.lock();
        if inner.delta.is_some() {
            log::warn!(
                "chunk of {} wallets rejected: snapshot is active",
                wallets.len()
            );
            return false;
        }
        for wallet in wallets {
            inner.base.insert(wallet.id, wallet.clone());
        }
        inner.cached_checksum = None;
        inner.cached_delta_checksum = None;
        true
    }

    /// Exact sum of all committed balances. The overlay is excluded.
    pub fn total_supply(&self) -> Balance {
        let inner = self.inner.lock();
        let mut total = Balance::zero();
        for wallet in inner.base.values() {
            total += &wallet.balance;
        }
        total
    }
}
