//! End-to-end wallet lifecycle tests against the simulated daemon.
//!
//! Each test opens a wallet over a [`SimDaemon`] chain, syncs, and walks
//! through receive/spend/confirm scenarios, checking balances, heights,
//! daemon status, and event delivery along the way.

use std::sync::Arc;

use parking_lot::Mutex;
use umbra_core::address::Network;
use umbra_core::constants::{COIN, COINBASE_MATURITY};
use umbra_daemon::{DaemonClient, RpcConnection, SimDaemon};
use umbra_tests::helpers::*;
use umbra_wallet::{
    Destination, SyncError, SyncPhase, TxConfig, Wallet, WalletConfig, WalletError, WalletEvent,
};

fn wallet_config(seed: u8) -> WalletConfig {
    WalletConfig::new(
        test_phrase(seed),
        Network::Testnet,
        RpcConnection::unauthenticated("http://localhost:38081"),
    )
}

/// Wallet funded with 1_000_000 motes at height 50, daemon at height 100.
fn funded_wallet(seed: u8) -> (Wallet, Arc<SimDaemon>) {
    let ring = test_ring(seed);
    let chain = linked_chain(
        101,
        &[(
            50,
            vec![payment_tx(ring.primary_address().pubkey_hash(), 1_000_000, 1)],
        )],
    );
    let daemon = Arc::new(SimDaemon::with_chain(chain));
    let wallet = Wallet::open(wallet_config(seed), Arc::clone(&daemon) as _).unwrap();
    (wallet, daemon)
}

#[test]
fn restore_and_sync_scenario() {
    let (wallet, _daemon) = funded_wallet(1);

    wallet.sync().unwrap();

    assert_eq!(wallet.get_balance(0), 1_000_000);
    assert_eq!(wallet.get_height(), 100);
    assert_eq!(wallet.get_daemon_height(), 100);
    assert!(wallet.is_connected_to_daemon());
    assert_eq!(wallet.sync_state().phase, SyncPhase::Idle);
}

#[test]
fn create_tx_scenario() {
    let (wallet, _daemon) = funded_wallet(2);
    wallet.sync().unwrap();

    let tx_set = wallet
        .create_tx(&TxConfig::single(foreign_address(0xAA), 500_000))
        .unwrap();

    assert!(tx_set.fee > 0);
    assert!(tx_set.fee + 500_000 <= 1_000_000);
    assert!(!tx_set.tx_hash.is_zero());
}

#[test]
fn overspend_scenario_leaves_cache_unreserved() {
    let (wallet, _daemon) = funded_wallet(3);
    wallet.sync().unwrap();

    let err = wallet
        .create_tx(&TxConfig::single(foreign_address(0xAA), 2_000_000))
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    assert_eq!(wallet.get_unlocked_balance(0), 1_000_000);

    // The wallet can still spend afterwards.
    wallet
        .create_tx(&TxConfig::single(foreign_address(0xAA), 500_000))
        .unwrap();
}

#[test]
fn rejected_relay_scenario_restores_unlocked_balance() {
    let (wallet, daemon) = funded_wallet(4);
    wallet.sync().unwrap();

    let before = wallet.get_unlocked_balance(0);
    let tx_set = wallet
        .create_tx(&TxConfig::single(foreign_address(0xAA), 500_000))
        .unwrap();

    daemon.reject_next_relay("double spend");
    let err = wallet.relay_tx(&tx_set).unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(wallet.get_unlocked_balance(0), before);
}

#[test]
fn full_spend_confirm_cycle() {
    let (wallet, daemon) = funded_wallet(5);
    wallet.sync().unwrap();

    let send_amount = 300_000;
    let tx_set = wallet
        .create_tx(&TxConfig::single(foreign_address(0xAA), send_amount))
        .unwrap();
    wallet.relay_tx(&tx_set).unwrap();

    // Relayed but unconfirmed: the funding output is pending spend.
    assert_eq!(wallet.get_balance(0), 0);
    assert_eq!(daemon.relayed().len(), 1);

    // The daemon mines our transaction into the next block.
    let tx = tx_set.decode().unwrap();
    let chain = daemon.fetch_blocks(0, 200).unwrap();
    daemon.push_block(next_block(&chain, vec![tx]));

    wallet.sync().unwrap();

    // The spend is confirmed and the change output is ours.
    let change = 1_000_000 - send_amount - tx_set.fee;
    assert_eq!(wallet.get_balance(0), change);
    assert_eq!(wallet.get_height(), 101);

    // Change is locked until the confirmation window passes.
    assert_eq!(wallet.get_unlocked_balance(0), 0);
}

#[test]
fn coinbase_maturity_scenario() {
    let ring = test_ring(6);
    let mature_at = 100 + COINBASE_MATURITY;
    let chain = linked_chain(
        101,
        &[(
            100,
            vec![coinbase_tx(ring.primary_address().pubkey_hash(), 50 * COIN, 100)],
        )],
    );
    let daemon = Arc::new(SimDaemon::with_chain(chain));
    let wallet = Wallet::open(wallet_config(6), Arc::clone(&daemon) as _).unwrap();

    wallet.sync().unwrap();
    assert_eq!(wallet.get_balance(0), 50 * COIN);
    assert_eq!(wallet.get_unlocked_balance(0), 0, "coinbase not yet mature");

    // Extend the chain past maturity and sync again.
    let mut chain = daemon.fetch_blocks(0, 200).unwrap();
    while chain.last().unwrap().header.height < mature_at {
        let block = next_block(&chain, vec![]);
        daemon.push_block(block.clone());
        chain.push(block);
    }
    wallet.sync().unwrap();

    assert_eq!(wallet.get_unlocked_balance(0), 50 * COIN);
}

#[test]
fn restore_height_skips_earlier_history() {
    let ring = test_ring(7);
    let pkh = ring.primary_address().pubkey_hash();
    let chain = linked_chain(
        80,
        &[
            (10, vec![payment_tx(pkh, 5 * COIN, 1)]),
            (60, vec![payment_tx(pkh, 3 * COIN, 2)]),
        ],
    );
    let daemon = Arc::new(SimDaemon::with_chain(chain));
    let config = wallet_config(7).with_restore_height(40);
    let wallet = Wallet::open(config, daemon as _).unwrap();

    wallet.sync().unwrap();

    // Only the payment after the restore height is visible.
    assert_eq!(wallet.get_balance(0), 3 * COIN);
    assert_eq!(wallet.get_height(), 79);
}

#[test]
fn offline_daemon_yields_typed_retryable_error() {
    let (wallet, daemon) = funded_wallet(8);
    daemon.set_offline(true);

    let err = wallet.sync().unwrap_err();
    assert!(matches!(
        err,
        WalletError::Sync(SyncError::DaemonUnreachable { .. })
    ));
    assert!(err.is_retryable());
    assert_eq!(wallet.sync_state().phase, SyncPhase::Error);
    assert!(!wallet.is_connected_to_daemon());

    // Recovery path: daemon returns, sync succeeds.
    daemon.set_offline(false);
    wallet.sync().unwrap();
    assert_eq!(wallet.get_balance(0), 1_000_000);
}

#[test]
fn event_stream_covers_the_whole_flow() {
    let (wallet, _daemon) = funded_wallet(9);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    wallet.add_listener(move |event| sink.lock().push(event.clone()));

    wallet.sync().unwrap();
    let tx_set = wallet
        .create_tx(&TxConfig::single(foreign_address(0xAA), 400_000))
        .unwrap();
    wallet.relay_tx(&tx_set).unwrap();
    wallet.flush_events();

    let events = seen.lock();

    // Progress events ascend strictly and end at the tip.
    let progress: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            WalletEvent::SyncProgress { height, .. } => Some(*height),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 101);
    assert!(progress.windows(2).all(|w| w[0] < w[1]));

    // The incoming transfer precedes its balance update, which precedes the
    // relay's balance update.
    let transfer_pos = events
        .iter()
        .position(|e| matches!(e, WalletEvent::NewTransfer { .. }))
        .expect("transfer event");
    let balance_positions: Vec<usize> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| matches!(e, WalletEvent::BalanceChanged { .. }).then_some(i))
        .collect();
    assert_eq!(balance_positions.len(), 2);
    assert!(transfer_pos < balance_positions[0]);
    assert!(balance_positions[0] < balance_positions[1]);

    // The final balance event reflects the reserved-then-committed spend.
    assert!(matches!(
        events[balance_positions[1]],
        WalletEvent::BalanceChanged { balance: 0, .. }
    ));
}

#[test]
fn reorg_scenario_moves_funds_to_the_new_branch() {
    let ring = test_ring(10);
    let pkh = ring.primary_address().pubkey_hash();
    let chain = linked_chain(20, &[(15, vec![payment_tx(pkh, 4 * COIN, 1)])]);
    let fork_parent = chain[14].clone();
    let daemon = Arc::new(SimDaemon::with_chain(chain));
    let wallet = Wallet::open(wallet_config(10), Arc::clone(&daemon) as _).unwrap();

    wallet.sync().unwrap();
    assert_eq!(wallet.get_balance(0), 4 * COIN);

    // Orphan heights 15..19; the replacement branch pays us elsewhere.
    let mut branch = vec![fork_parent];
    let mut replacement = Vec::new();
    for height in 15..=20u64 {
        let txs = if height == 18 {
            vec![payment_tx(pkh, 6 * COIN, 2)]
        } else {
            vec![]
        };
        let mut block = next_block(&branch, txs);
        block.header.timestamp += 7; // distinguish from the orphaned branch
        branch.push(block.clone());
        replacement.push(block);
    }
    daemon.replace_tail(15, replacement);

    wallet.sync().unwrap();

    assert_eq!(wallet.get_balance(0), 6 * COIN, "orphaned payment replaced");
    assert_eq!(wallet.get_height(), 20);
}

#[test]
fn persistent_wallet_reopens_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.umb");
    let daemon = Arc::new(SimDaemon::new());

    let config = wallet_config(11).with_path(&path).with_password("pw");
    let first = Wallet::open(config, Arc::clone(&daemon) as _).unwrap();
    let address = first.get_primary_address();
    drop(first);

    let config = wallet_config(11).with_path(&path).with_password("pw");
    let second = Wallet::open(config, daemon as _).unwrap();
    assert_eq!(second.get_primary_address(), address);
}

#[test]
fn multi_account_isolation() {
    let ring = test_ring(12);
    let chain = linked_chain(
        40,
        &[
            (5, vec![payment_tx(ring.address_for(0, 0).pubkey_hash(), 10 * COIN, 1)]),
            (6, vec![payment_tx(ring.address_for(1, 2).pubkey_hash(), 7 * COIN, 2)]),
            (7, vec![payment_tx(ring.address_for(5, 31).pubkey_hash(), 2 * COIN, 3)]),
        ],
    );
    let daemon = Arc::new(SimDaemon::with_chain(chain));
    let wallet = Wallet::open(wallet_config(12), daemon as _).unwrap();

    wallet.sync().unwrap();

    assert_eq!(wallet.get_balance(0), 10 * COIN);
    assert_eq!(wallet.get_balance(1), 7 * COIN);
    assert_eq!(wallet.get_balance(5), 2 * COIN);
    assert_eq!(wallet.get_balance(3), 0);

    // Spending from account 1 must not touch account 0 funds.
    let tx_set = wallet
        .create_tx(
            &TxConfig::new(vec![Destination::new(foreign_address(0xCC), 3 * COIN)])
                .from_account(1),
        )
        .unwrap();
    let tx = tx_set.decode().unwrap();
    let spent = tx.inputs[0].previous_output;
    let owned = wallet.sync_state(); // keep facade exercised
    assert_eq!(owned.wallet_height, 39);

    assert_eq!(wallet.get_balance(0), 10 * COIN);
    assert_eq!(wallet.get_balance(1), 0, "account 1 output reserved");
    let _ = spent;
}
