//! Incremental chain synchronization.
//!
//! The synchronizer pulls blocks from the daemon in batches, applies them
//! to the output cache, and emits progress/transfer/balance events in
//! commit order. One run lock coalesces re-entrant `sync()` calls; a
//! cancellation flag stops an in-flight pass cleanly between blocks.
//!
//! State machine: Idle → Syncing → Idle, with Error reachable from Syncing
//! when the daemon stays unreachable past the retry budget or the chain
//! reorganizes deeper than the checkpoint window.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use umbra_core::types::{Block, Hash256};
use umbra_daemon::{DaemonClient, DaemonError};

use crate::error::{SyncError, WalletError};
use crate::events::{EventBus, WalletEvent};
use crate::keyring::KeyRing;
use crate::outputs::OutputCache;

/// Tuning knobs for the sync loop.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Blocks requested per daemon round trip.
    pub batch_size: usize,
    /// Attempts per daemon call before giving up on a transient failure.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub retry_delay: Duration,
    /// Number of recent (height, hash) checkpoints kept for reorg recovery.
    pub checkpoint_window: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_attempts: 3,
            retry_delay: Duration::from_millis(200),
            checkpoint_window: 100,
        }
    }
}

/// The synchronizer's coarse state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    /// Caught up (or never started); no scan in progress.
    Idle,
    /// A sync pass is running.
    Syncing,
    /// The last pass failed; the next `sync()` call retries.
    Error,
}

/// Snapshot of the synchronizer's state, readable by the facade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncState {
    /// Coarse phase.
    pub phase: SyncPhase,
    /// Height of the last applied block (restore height before first sync).
    pub wallet_height: u64,
    /// Last observed daemon tip height.
    pub daemon_height: u64,
    /// Whether the last daemon probe succeeded.
    pub is_connected: bool,
    /// Whether the daemon reported itself synced.
    pub is_daemon_synced: bool,
    /// Whether the daemon reported itself trusted.
    pub is_daemon_trusted: bool,
}

struct SyncInner {
    phase: SyncPhase,
    last_applied: Option<u64>,
    daemon_height: u64,
    is_connected: bool,
    daemon_synced: bool,
    daemon_trusted: bool,
    /// Recent (height, header hash) pairs, ascending, for reorg recovery.
    checkpoints: VecDeque<(u64, Hash256)>,
}

/// What applying one fetched block did to the scan cursor.
enum ApplyOutcome {
    /// The block extended the wallet chain.
    Applied,
    /// A reorg rewound the cursor; the current batch is stale.
    Rewound,
}

/// Drives the incremental scan of daemon blocks into the output cache.
pub struct Synchronizer {
    daemon: Arc<dyn DaemonClient>,
    cache: Arc<OutputCache>,
    keyring: Arc<KeyRing>,
    events: Arc<EventBus>,
    restore_height: u64,
    options: SyncOptions,
    inner: Mutex<SyncInner>,
    /// Held for the duration of a sync pass; coalesces re-entrant calls.
    run_lock: Mutex<()>,
    cancelled: AtomicBool,
}

impl Synchronizer {
    /// Create a synchronizer starting from `restore_height`.
    pub fn new(
        daemon: Arc<dyn DaemonClient>,
        cache: Arc<OutputCache>,
        keyring: Arc<KeyRing>,
        events: Arc<EventBus>,
        restore_height: u64,
        options: SyncOptions,
    ) -> Self {
        Self {
            daemon,
            cache,
            keyring,
            events,
            restore_height,
            options,
            inner: Mutex::new(SyncInner {
                phase: SyncPhase::Idle,
                last_applied: None,
                daemon_height: 0,
                is_connected: false,
                daemon_synced: false,
                daemon_trusted: false,
                checkpoints: VecDeque::new(),
            }),
            run_lock: Mutex::new(()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Run one sync pass to completion: blocks until the wallet is caught
    /// up (Idle), the pass is cancelled (Idle), or an unrecoverable daemon
    /// failure occurs (Error).
    ///
    /// Concurrent calls coalesce: a second caller blocks until the running
    /// pass finishes, then observes the caught-up state and returns without
    /// rescanning any height.
    pub fn sync(&self) -> Result<(), WalletError> {
        let _run = self.run_lock.lock();
        self.cancelled.store(false, Ordering::SeqCst);
        self.set_phase(SyncPhase::Syncing);

        match self.run_pass() {
            Ok(()) => {
                self.set_phase(SyncPhase::Idle);
                Ok(())
            }
            Err(e) => {
                {
                    let mut inner = self.inner.lock();
                    inner.phase = SyncPhase::Error;
                    if matches!(e, WalletError::Sync(SyncError::DaemonUnreachable { .. })) {
                        inner.is_connected = false;
                    }
                }
                warn!(error = %e, "sync pass failed");
                Err(e)
            }
        }
    }

    /// Ask an in-flight sync pass to stop between blocks.
    ///
    /// The pass transitions cleanly to Idle and `sync()` returns Ok with
    /// whatever progress was made.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Snapshot the current sync state.
    pub fn state(&self) -> SyncState {
        let inner = self.inner.lock();
        SyncState {
            phase: inner.phase,
            wallet_height: inner.last_applied.unwrap_or(self.restore_height),
            daemon_height: inner.daemon_height,
            is_connected: inner.is_connected,
            is_daemon_synced: inner.daemon_synced,
            is_daemon_trusted: inner.daemon_trusted,
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.inner.lock().phase = phase;
    }

    fn run_pass(&self) -> Result<(), WalletError> {
        let info = self.with_retries("get_info", || self.daemon.get_info())?;
        {
            let mut inner = self.inner.lock();
            inner.is_connected = true;
            inner.daemon_synced = info.synced;
            inner.daemon_trusted = info.trusted;
            inner.daemon_height = info.height;
        }
        debug!(
            daemon_height = info.height,
            synced = info.synced,
            "daemon probed, starting scan"
        );

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("sync cancelled");
                return Ok(());
            }

            let (next, daemon_height) = {
                let inner = self.inner.lock();
                let next = match inner.last_applied {
                    Some(h) => h + 1,
                    None => self.restore_height,
                };
                (next, inner.daemon_height)
            };

            if next > daemon_height {
                // The daemon may have advanced while we scanned; check once
                // more before declaring the wallet caught up.
                let tip = self.with_retries("get_height", || self.daemon.get_height())?;
                if next > tip {
                    info!(wallet_height = next.saturating_sub(1), "sync complete");
                    return Ok(());
                }
                self.inner.lock().daemon_height = tip;
                continue;
            }

            let blocks = self.with_retries("fetch_blocks", || {
                self.daemon.fetch_blocks(next, self.options.batch_size)
            })?;
            if blocks.is_empty() {
                // Daemon is shorter than it advertised; treat as caught up.
                debug!(next, "daemon served no blocks, stopping");
                return Ok(());
            }

            for block in &blocks {
                if self.cancelled.load(Ordering::SeqCst) {
                    info!("sync cancelled");
                    return Ok(());
                }
                match self.apply_one(block)? {
                    ApplyOutcome::Applied => {}
                    ApplyOutcome::Rewound => break,
                }
            }
        }
    }

    /// Apply one fetched block: linkage check, cache scan, checkpoint, events.
    fn apply_one(&self, block: &Block) -> Result<ApplyOutcome, WalletError> {
        let height = block.header.height;

        let parent = { self.inner.lock().checkpoints.back().copied() };
        if let Some((tip_height, tip_hash)) = parent {
            if height <= tip_height {
                // Stale block from a batch fetched before a rewind.
                return Ok(ApplyOutcome::Rewound);
            }
            if height > tip_height + 1 {
                return Err(SyncError::Daemon {
                    operation: "fetch_blocks",
                    source: DaemonError::InvalidResponse(format!(
                        "non-consecutive block height {height}, expected {}",
                        tip_height + 1
                    )),
                }
                .into());
            }
            if block.header.prev_hash != tip_hash {
                self.handle_reorg()?;
                return Ok(ApplyOutcome::Rewound);
            }
        }

        let effects = self.cache.apply_block(block, &self.keyring)?;

        let daemon_height = {
            let mut inner = self.inner.lock();
            inner.last_applied = Some(height);
            inner.checkpoints.push_back((height, block.header.hash()));
            while inner.checkpoints.len() > self.options.checkpoint_window {
                inner.checkpoints.pop_front();
            }
            inner.daemon_height
        };

        self.events.emit(WalletEvent::SyncProgress {
            height,
            daemon_height,
        });
        for transfer in &effects.received {
            info!(
                tx_id = %transfer.tx_id,
                account = transfer.account,
                amount = transfer.amount,
                height,
                "incoming transfer"
            );
            self.events.emit(WalletEvent::NewTransfer {
                tx_id: transfer.tx_id,
                account: transfer.account,
                amount: transfer.amount,
                height: transfer.height,
            });
        }
        for &account in &effects.touched_accounts {
            self.events.emit(WalletEvent::BalanceChanged {
                account,
                balance: self.cache.balance(account),
                unlocked: self.cache.unlocked_balance(account, height),
            });
        }

        Ok(ApplyOutcome::Applied)
    }

    /// Walk the checkpoint window to find the common ancestor with the
    /// daemon's chain, then rewind the cache and cursor to it.
    fn handle_reorg(&self) -> Result<(), WalletError> {
        warn!("chain reorganization detected");

        let checkpoints: Vec<(u64, Hash256)> = {
            let inner = self.inner.lock();
            inner.checkpoints.iter().rev().copied().collect()
        };

        for (height, our_hash) in checkpoints {
            let theirs =
                self.with_retries("fetch_blocks", || self.daemon.fetch_blocks(height, 1))?;
            if let Some(block) = theirs.first() {
                if block.header.hash() == our_hash {
                    let affected = self.cache.rewind_to(height);
                    let mut inner = self.inner.lock();
                    while matches!(inner.checkpoints.back(), Some((h, _)) if *h > height) {
                        inner.checkpoints.pop_back();
                    }
                    inner.last_applied = Some(height);
                    info!(ancestor = height, affected, "rewound to common ancestor");
                    return Ok(());
                }
            }
        }

        Err(SyncError::ReorgTooDeep {
            window: self.options.checkpoint_window,
        }
        .into())
    }

    /// Run a daemon call, retrying transient failures with doubling backoff
    /// up to the configured attempt budget.
    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut call: impl FnMut() -> Result<T, DaemonError>,
    ) -> Result<T, WalletError> {
        let mut delay = self.options.retry_delay;
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    if attempt >= self.options.max_attempts {
                        return Err(SyncError::DaemonUnreachable {
                            attempts: attempt,
                            source: e,
                        }
                        .into());
                    }
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient daemon failure, retrying"
                    );
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(SyncError::Daemon {
                        operation,
                        source: e,
                    }
                    .into());
                }
            }
        }
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Synchronizer")
            .field("phase", &state.phase)
            .field("wallet_height", &state.wallet_height)
            .field("daemon_height", &state.daemon_height)
            .finish_non_exhaustive()
    }
}
