use ixian_core::wallet::ADDRESS_LEN;
use ixian_core::{Address, Balance, WalletState, WsChunk};

fn addr(tag: u8) -> Address {
    Address::from_bytes(&[tag; ADDRESS_LEN]).unwrap()
}

fn populated_state(count: u8) -> WalletState {
    let state = WalletState::new();
    for tag in 0..count {
        state.set_wallet_balance(
            addr(tag),
            Balance::from_units(1_000u64 + tag as u64 * 17),
            false,
            Some(tag as u64),
        );
    }
    state
}

#[test]
fn full_sync_over_serialized_chunks() {
    let source = populated_state(100);
    let target = WalletState::new();

    // Ship every chunk through its wire form, out of order: consumers
    // match content by checksum, not chunk order.
    let mut frames: Vec<Vec<u8>> = source
        .chunks(7, 42)
        .iter()
        .map(|c| c.to_bytes().unwrap())
        .collect();
    frames.reverse();

    for frame in frames {
        let chunk = WsChunk::from_bytes(&frame).unwrap();
        assert_eq!(chunk.block_num, 42);
        assert!(target.apply_chunk_wallets(&chunk.wallets));
    }

    assert_eq!(target.wallet_count(), source.wallet_count());
    assert_eq!(target.total_supply(), source.total_supply());
    assert_eq!(target.checksum(false), source.checksum(false));
}

#[test]
fn sync_waits_out_speculative_execution() {
    let source = populated_state(10);
    let target = WalletState::new();
    let chunks = source.chunks(4, 1);

    // Block execution in flight on the receiving node: chunks must bounce.
    assert!(target.snapshot());
    for chunk in &chunks {
        assert!(!target.apply_chunk_wallets(&chunk.wallets));
    }
    assert_eq!(target.wallet_count(), 0);

    // Once the speculative block settles the same chunks go through.
    target.revert();
    for chunk in &chunks {
        assert!(target.apply_chunk_wallets(&chunk.wallets));
    }
    assert_eq!(target.checksum(false), source.checksum(false));
}

#[test]
fn resync_overwrites_stale_records() {
    let source = populated_state(5);
    let target = populated_state(5);

    // Target drifted: one balance diverges.
    target.set_wallet_balance(addr(2), Balance::from_whole(999), false, None);
    assert_ne!(target.checksum(false), source.checksum(false));

    for chunk in source.chunks(2, 8) {
        assert!(target.apply_chunk_wallets(&chunk.wallets));
    }
    assert_eq!(target.checksum(false), source.checksum(false));
}

#[test]
fn speculative_block_cycle_keeps_replicas_in_step() {
    // Two replicas apply the same block; one speculatively, one directly.
    let speculative = populated_state(20);
    let direct = populated_state(20);

    assert!(speculative.snapshot());
    speculative.set_wallet_balance(addr(3), Balance::from_whole(1), true, Some(4));
    speculative.set_wallet_balance(addr(21), Balance::from_whole(50), true, None);
    let proposed = speculative.checksum(true);
    assert_ne!(proposed, speculative.checksum(false));
    speculative.commit();

    direct.set_wallet_balance(addr(3), Balance::from_whole(1), false, Some(4));
    direct.set_wallet_balance(addr(21), Balance::from_whole(50), false, None);

    assert_eq!(speculative.checksum(false), proposed);
    assert_eq!(direct.checksum(false), proposed);
}
