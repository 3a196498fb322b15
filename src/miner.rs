// src/miner.rs
//
// Proof-of-work mining loop. One worker thread polls the chain tail for
// the most recent un-sealed block inside the redacted window and searches
// Argon2id pre-images against the block's difficulty mask. Solutions are
// broadcast as PoW transactions through the protocol seam.
//

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::chain::{Block, BlockChainView, BlockProcessorHandle, WalletKeys};
use crate::config::NodeConfig;
use crate::crypto::{argon2id_pow, Hash};
use crate::protocol::{ProtocolHandle, ProtocolMessageCode};
use crate::transaction::Transaction;
use crate::wallet::Address;
use crate::Result;

/// Difficulty bounds, fixed by consensus. Out-of-range block difficulties
/// are clamped, never rejected.
pub const MIN_DIFFICULTY: u64 = 14;
pub const MAX_DIFFICULTY: u64 = 256;

pub const NONCE_LEN: usize = 128;
const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Blocks below this height are never mined.
const MIN_MINABLE_BLOCK: u64 = 10;
const IDLE_SLEEP: Duration = Duration::from_secs(1);

pub fn clamp_difficulty(difficulty: u64) -> u64 {
    difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Byte mask with the first `difficulty` bits set, MSB first.
pub fn difficulty_mask(difficulty: u64) -> Vec<u8> {
    let difficulty = clamp_difficulty(difficulty);
    let full_bytes = (difficulty / 8) as usize;
    let tail_bits = (difficulty % 8) as u32;
    let mut mask = vec![0xFFu8; full_bytes];
    if tail_bits != 0 {
        mask.push(0xFFu8 << (8 - tail_bits));
    }
    mask
}

/// True when the hash carries at least `difficulty` leading zero bits.
/// Takes the hex rendering of the digest; upper- and lowercase both
/// decode. Difficulty is an explicit parameter, never process state.
pub fn validate_hash(hash_hex: &str, difficulty: u64) -> bool {
    let hash = match hex::decode(hash_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mask = difficulty_mask(difficulty);
    if hash.len() < mask.len() {
        return false;
    }
    mask.iter().zip(hash.iter()).all(|(m, h)| h & m == 0)
}

/// The Argon2id puzzle digest for one attempt. The password is the
/// uppercase-hex block checksum followed by the solver's Base58 address;
/// the salt is the nonce. Miner and verifier both go through here.
pub fn solving_hash(block_checksum: &[u8], solver: &Address, nonce: &str) -> Result<Hash> {
    let password = format!("{}{}", hex::encode_upper(block_checksum), solver);
    argon2id_pow(password.as_bytes(), nonce.as_bytes())
}

/// Recomputes and checks a claimed solution. Usable by block validators
/// without a running miner; a missing block fails the check.
pub fn verify_nonce(
    chain: &dyn BlockChainView,
    nonce: &str,
    block_num: u64,
    solver: &Address,
    difficulty: u64,
) -> bool {
    if nonce.is_empty() || nonce.len() > NONCE_LEN {
        return false;
    }
    let block = match chain.block(block_num) {
        Some(block) => block,
        None => return false,
    };
    match solving_hash(&block.checksum, solver, nonce) {
        Ok(digest) => validate_hash(&hex::encode_upper(digest), difficulty),
        Err(e) => {
            log::error!("❌ PoW verification failed for block #{block_num}: {e}");
            false
        }
    }
}

/// Most recent un-sealed block within the redacted window: scans
/// `last, last-1, ..` down to (and excluding) the window's oldest block.
pub fn find_unsealed_block(
    chain: &dyn BlockChainView,
    redacted_window_size: u64,
) -> Option<Block> {
    let last = chain.last_block_num();
    let oldest = last.saturating_sub(redacted_window_size);
    let mut block_num = last;
    while block_num > oldest {
        if let Some(block) = chain.block(block_num) {
            if !block.is_sealed() {
                return Some(block);
            }
        }
        block_num -= 1;
    }
    None
}

fn random_nonce(rng: &mut SmallRng) -> String {
    (0..NONCE_LEN)
        .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Default)]
struct MinerStats {
    /// Attempts since the last status report.
    window_hashes: AtomicU64,
    total_hashes: AtomicU64,
    solutions_found: AtomicU64,
    last_hash_rate: AtomicU64,
}

pub struct Miner {
    chain: Arc<dyn BlockChainView>,
    processor: Arc<dyn BlockProcessorHandle>,
    keys: Arc<dyn WalletKeys>,
    protocol: Arc<dyn ProtocolHandle>,
    config: NodeConfig,
    should_stop: Arc<AtomicBool>,
    stats: Arc<MinerStats>,
    handle: Option<JoinHandle<()>>,
}

impl Miner {
    pub fn new(
        chain: Arc<dyn BlockChainView>,
        processor: Arc<dyn BlockProcessorHandle>,
        keys: Arc<dyn WalletKeys>,
        protocol: Arc<dyn ProtocolHandle>,
        config: NodeConfig,
    ) -> Self {
        Self {
            chain,
            processor,
            keys,
            protocol,
            config,
            should_stop: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(MinerStats::default()),
            handle: None,
        }
    }

    /// Spawns the worker thread. Returns false when mining is disabled by
    /// configuration or a worker is already running.
    pub fn start(&mut self) -> bool {
        if self.config.disable_miner {
            log::warn!("⚠️  Mining is disabled in this configuration");
            return false;
        }
        if self.handle.is_some() {
            log::warn!("Miner is already running");
            return false;
        }
        self.should_stop.store(false, Ordering::Relaxed);
        let worker = MinerWorker {
            chain: Arc::clone(&self.chain),
            processor: Arc::clone(&self.processor),
            keys: Arc::clone(&self.keys),
            protocol: Arc::clone(&self.protocol),
            config: self.config.clone(),
            should_stop: Arc::clone(&self.should_stop),
            stats: Arc::clone(&self.stats),
            // Per-instance seeding keeps two miners off the same nonce
            // sequence.
            rng: SmallRng::from_entropy(),
        };
        self.handle = Some(thread::spawn(move || worker.run()));
        true
    }

    /// Flags the worker to stop and joins it. The flag is honored between
    /// hash attempts; an in-flight Argon2id call runs to completion.
    pub fn stop(&mut self) {
        self.should_stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::info!("✅ Miner shut down");
        }
    }

    /// Rate computed at the last status report.
    pub fn hashes_per_second(&self) -> u64 {
        self.stats.last_hash_rate.load(Ordering::Relaxed)
    }

    pub fn total_hashes(&self) -> u64 {
        self.stats.total_hashes.load(Ordering::Relaxed)
    }

    pub fn solutions_found(&self) -> u64 {
        self.stats.solutions_found.load(Ordering::Relaxed)
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.stop();
    }
}

struct MinerWorker {
    chain: Arc<dyn BlockChainView>,
    processor: Arc<dyn BlockProcessorHandle>,
    keys: Arc<dyn WalletKeys>,
    protocol: Arc<dyn ProtocolHandle>,
    config: NodeConfig,
    should_stop: Arc<AtomicBool>,
    stats: Arc<MinerStats>,
    rng: SmallRng,
}

impl MinerWorker {
    fn run(mut self) {
        log::info!(
            "⛏️  Miner started (redacted window: {} blocks)",
            self.config.redacted_window_size
        );
        while !self.should_stop.load(Ordering::Relaxed) {
            if !self.processor.operating() || self.chain.last_block_num() < MIN_MINABLE_BLOCK {
                thread::sleep(IDLE_SLEEP);
                continue;
            }
            match find_unsealed_block(self.chain.as_ref(), self.config.redacted_window_size) {
                Some(block) => self.solve(block),
                None => thread::sleep(IDLE_SLEEP),
            }
        }
        log::info!("🛑 Miner stopped");
    }

    /// Hashes against one block until a solution lands, the block goes
    /// stale, or the miner is stopped.
    fn solve(&mut self, mut block: Block) {
        let difficulty = clamp_difficulty(block.difficulty);
        let solver = self.keys.address();
        log::info!(
            "🔍 Solving block #{} (difficulty {difficulty})",
            block.block_num
        );
        let report_every = Duration::from_secs(self.config.status_interval_secs.max(1));
        let mut last_report = Instant::now();

        while !self.should_stop.load(Ordering::Relaxed) {
            let nonce = random_nonce(&mut self.rng);
            let digest = match solving_hash(&block.checksum, &solver, &nonce) {
                Ok(digest) => digest,
                Err(e) => {
                    log::error!("❌ PoW hashing failed: {e}; stopping miner");
                    self.should_stop.store(true, Ordering::Relaxed);
                    return;
                }
            };
            self.stats.window_hashes.fetch_add(1, Ordering::Relaxed);
            self.stats.total_hashes.fetch_add(1, Ordering::Relaxed);

            if validate_hash(&hex::encode_upper(digest), difficulty) {
                self.announce(&block, &nonce);
                block.pow_field = digest.to_vec();
                self.stats.solutions_found.fetch_add(1, Ordering::Relaxed);
                return;
            }

            if last_report.elapsed() >= report_every {
                self.report_status(&mut last_report);
                // Someone else may have sealed this block meanwhile.
                match self.chain.block(block.block_num) {
                    Some(fresh) if !fresh.is_sealed() => block = fresh,
                    _ => {
                        log::info!(
                            "⏭️  Block #{} sealed elsewhere or pruned, rescanning",
                            block.block_num
                        );
                        return;
                    }
                }
            }
        }
    }

    fn announce(&self, block: &Block, nonce: &str) {
        log::info!("🎉 Found PoW solution for block #{}", block.block_num);
        let payload = Transaction::new_pow_solution(
            self.keys.address(),
            &self.keys.public_key(),
            block.block_num,
            nonce,
        )
        .and_then(|mut tx| {
            tx.sign(self.keys.as_ref())?;
            tx.to_bytes()
        });
        match payload {
            Ok(bytes) => self
                .protocol
                .broadcast(ProtocolMessageCode::TransactionData, bytes),
            Err(e) => log::error!("❌ Failed to build solution transaction: {e}"),
        }
    }

    fn report_status(&self, last_report: &mut Instant) {
        let elapsed = last_report.elapsed().as_secs().max(1);
        let window = self.stats.window_hashes.swap(0, Ordering::Relaxed);
        let rate = window / elapsed;
        self.stats.last_hash_rate.store(rate, Ordering::Relaxed);
        log::info!(
            "📊 Mining status: {}/s, {} total hashes, {} solutions",
            format_hash_rate(rate),
            self.stats.total_hashes.load(Ordering::Relaxed),
            self.stats.solutions_found.load(Ordering::Relaxed)
        );
        *last_report = Instant::now();
    }
}

fn format_hash_rate(hashes_per_sec: u64) -> String {
    if hashes_per_sec >= 1_000_000 {
        format!("{:.1} MH", hashes_per_sec as f64 / 1_000_000.0)
    } else if hashes_per_sec >= 1_000 {
        format!("{:.1} KH", hashes_per_sec as f64 / 1_000.0)
    } else {
        format!("{hashes_per_sec} H")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::wallet::ADDRESS_LEN;

    fn addr(tag: u8) -> Address {
        Address::from_bytes(&[tag; ADDRESS_LEN]).unwrap()
    }

    struct MapChain {
        blocks: HashMap<u64, Block>,
        last: u64,
    }

    impl MapChain {
        fn new(last: u64, unsealed: &[u64]) -> Self {
            let mut blocks = HashMap::new();
            for num in 1..=last {
                blocks.insert(
                    num,
                    Block {
                        block_num: num,
                        checksum: vec![num as u8; 32],
                        difficulty: 20,
                        pow_field: if unsealed.contains(&num) {
                            Vec::new()
                        } else {
                            vec![1]
                        },
                    },
                );
            }
            Self { blocks, last }
        }
    }

    impl BlockChainView for MapChain {
        fn last_block_num(&self) -> u64 {
            self.last
        }
        fn block(&self, block_num: u64) -> Option<Block> {
            self.blocks.get(&block_num).cloned()
        }
    }

    #[test]
    fn mask_for_difficulty_14() {
        assert_eq!(difficulty_mask(14), vec![0xFF, 0xFC]);
    }

    #[test]
    fn mask_shapes() {
        assert_eq!(difficulty_mask(16), vec![0xFF, 0xFF]);
        assert_eq!(difficulty_mask(17), vec![0xFF, 0xFF, 0x80]);
        assert_eq!(difficulty_mask(256), vec![0xFF; 32]);
    }

    #[test]
    fn difficulty_is_clamped() {
        assert_eq!(difficulty_mask(1), difficulty_mask(14));
        assert_eq!(difficulty_mask(0), difficulty_mask(14));
        assert_eq!(difficulty_mask(999), difficulty_mask(256));
    }

    #[test]
    fn validate_boundary_at_14() {
        // Top 14 bits must be clear: second byte may only use its low 2.
        let mut hash = [0u8; 32];
        hash[1] = 0x02;
        assert!(validate_hash(&hex::encode_upper(hash), 14));
        hash[1] = 0x03;
        assert!(validate_hash(&hex::encode_upper(hash), 14));
        hash[1] = 0x04;
        assert!(!validate_hash(&hex::encode_upper(hash), 14));
        hash[1] = 0x00;
        hash[0] = 0x01;
        assert!(!validate_hash(&hex::encode_upper(hash), 14));
    }

    #[test]
    fn validate_at_256_accepts_only_zero() {
        assert!(validate_hash(&hex::encode_upper([0u8; 32]), 256));
        let mut nonzero = [0u8; 32];
        nonzero[31] = 1;
        assert!(!validate_hash(&hex::encode_upper(nonzero), 256));
    }

    #[test]
    fn validate_rejects_short_or_malformed_hashes() {
        assert!(!validate_hash("00", 14));
        assert!(!validate_hash("not hex at all", 14));
        assert!(!validate_hash("", 14));
    }

    #[test]
    fn validate_accepts_lowercase_hex() {
        assert!(validate_hash(&hex::encode([0u8; 32]), 256));
    }

    #[test]
    fn nonce_shape() {
        let mut rng = SmallRng::seed_from_u64(1);
        let nonce = random_nonce(&mut rng);
        assert_eq!(nonce.len(), NONCE_LEN);
        assert!(nonce.bytes().all(|b| NONCE_ALPHABET.contains(&b)));
    }

    #[test]
    fn nonce_streams_differ_per_seed() {
        let mut a = SmallRng::seed_from_u64(1);
        let mut b = SmallRng::seed_from_u64(2);
        assert_ne!(random_nonce(&mut a), random_nonce(&mut b));
    }

    #[test]
    fn unsealed_scan_picks_most_recent_in_window() {
        let chain = MapChain::new(100, &[50, 90]);
        let found = find_unsealed_block(&chain, 50).unwrap();
        assert_eq!(found.block_num, 90);
    }

    #[test]
    fn unsealed_scan_respects_window_edge() {
        // oldest = 100 - 50 = 50; block 51 is the oldest candidate.
        let chain = MapChain::new(100, &[51]);
        assert_eq!(find_unsealed_block(&chain, 50).unwrap().block_num, 51);

        let chain = MapChain::new(100, &[50]);
        assert!(find_unsealed_block(&chain, 50).is_none());
    }

    #[test]
    fn unsealed_scan_with_everything_sealed() {
        let chain = MapChain::new(30, &[]);
        assert!(find_unsealed_block(&chain, 50).is_none());
    }

    #[test]
    fn solving_hash_is_deterministic() {
        let checksum = vec![7u8; 32];
        let nonce = "A".repeat(NONCE_LEN);
        let a = solving_hash(&checksum, &addr(1), &nonce).unwrap();
        let b = solving_hash(&checksum, &addr(1), &nonce).unwrap();
        assert_eq!(a, b);
        let c = solving_hash(&checksum, &addr(2), &nonce).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn verify_nonce_missing_block_fails() {
        let chain = MapChain::new(10, &[5]);
        let nonce = "B".repeat(NONCE_LEN);
        assert!(!verify_nonce(&chain, &nonce, 999, &addr(1), 14));
    }

    #[test]
    fn verify_nonce_rejects_bad_nonce_shapes() {
        let chain = MapChain::new(10, &[5]);
        assert!(!verify_nonce(&chain, "", 5, &addr(1), 14));
        let oversize = "C".repeat(NONCE_LEN + 1);
        assert!(!verify_nonce(&chain, &oversize, 5, &addr(1), 14));
    }

    #[test]
    fn verify_nonce_agrees_with_recomputed_digest() {
        let chain = MapChain::new(10, &[5]);
        let block = chain.block(5).unwrap();
        let solver = addr(3);
        for tag in [b'D', b'E', b'F'] {
            let nonce: String = (tag as char).to_string().repeat(NONCE_LEN);
            let digest = solving_hash(&block.checksum, &solver, &nonce).unwrap();
            for difficulty in [14, 64, 256] {
                assert_eq!(
                    verify_nonce(&chain, &nonce, 5, &solver, difficulty),
                    validate_hash(&hex::encode_upper(digest), difficulty)
                );
            }
        }
    }

    proptest! {
        /// Loosening the difficulty never turns an accept into a reject.
        /// Hashes get a random run of leading zero bytes so both branches
        /// of the predicate are exercised.
        #[test]
        fn validate_is_monotone_in_difficulty(
            zeros in 0usize..=32,
            tail in proptest::collection::vec(any::<u8>(), 32),
            hi in 14u64..=256,
            lo in 14u64..=256,
        ) {
            prop_assume!(lo <= hi);
            let mut hash = vec![0u8; zeros];
            hash.extend_from_slice(&tail[zeros..]);
            let hash_hex = hex::encode_upper(&hash);
            if validate_hash(&hash_hex, hi) {
                prop_assert!(validate_hash(&hash_hex, lo));
            }
        }

        /// Mask length and bit count track the difficulty exactly.
        #[test]
        fn mask_bit_count_matches_difficulty(difficulty in 14u64..=256) {
            let mask = difficulty_mask(difficulty);
            prop_assert_eq!(mask.len() as u64, difficulty.div_ceil(8));
            let ones: u32 = mask.iter().map(|b| b.count_ones()).sum();
            prop_assert_eq!(ones as u64, difficulty);
        }
    }
}
