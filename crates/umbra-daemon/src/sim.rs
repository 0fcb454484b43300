//! In-memory daemon simulator.
//!
//! [`SimDaemon`] implements [`DaemonClient`] against a chain held in memory,
//! with hooks for failure injection (offline mode, scripted transient
//! failures, relay rejection) and tail replacement to simulate chain
//! reorganizations. It backs the engine's unit and integration tests and is
//! usable as a stand-in daemon for local development.

use parking_lot::Mutex;
use tracing::debug;

use umbra_core::types::Block;

use crate::client::{DaemonClient, DaemonInfo};
use crate::error::DaemonError;

struct SimState {
    /// Chain blocks; index == header height.
    blocks: Vec<Block>,
    synced: bool,
    trusted: bool,
    /// Hex payloads accepted by relay, in order.
    relayed: Vec<String>,
    /// When set, the next relay is rejected with this reason.
    reject_next_relay: Option<String>,
    /// Number of upcoming requests that fail with a transient error.
    fail_requests: u32,
    /// When true, every request fails with a transient error.
    offline: bool,
}

/// An in-memory daemon with failure injection.
pub struct SimDaemon {
    state: Mutex<SimState>,
}

impl SimDaemon {
    /// Create an empty simulated daemon (no blocks, synced, trusted).
    pub fn new() -> Self {
        Self::with_chain(Vec::new())
    }

    /// Create a simulated daemon pre-loaded with a chain.
    ///
    /// # Panics
    /// Panics if any block's header height does not match its position.
    pub fn with_chain(blocks: Vec<Block>) -> Self {
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(
                block.header.height, i as u64,
                "block at position {i} has height {}",
                block.header.height
            );
        }
        Self {
            state: Mutex::new(SimState {
                blocks,
                synced: true,
                trusted: true,
                relayed: Vec::new(),
                reject_next_relay: None,
                fail_requests: 0,
                offline: false,
            }),
        }
    }

    /// Append a block to the chain tip.
    ///
    /// # Panics
    /// Panics if the block's height is not exactly the next height.
    pub fn push_block(&self, block: Block) {
        let mut state = self.state.lock();
        assert_eq!(
            block.header.height,
            state.blocks.len() as u64,
            "pushed block height must be the next height"
        );
        state.blocks.push(block);
    }

    /// Replace the chain from `from_height` onward with new blocks,
    /// simulating a reorganization.
    ///
    /// # Panics
    /// Panics if `from_height` is past the tip or the replacement blocks do
    /// not continue the heights from `from_height`.
    pub fn replace_tail(&self, from_height: u64, blocks: Vec<Block>) {
        let mut state = self.state.lock();
        assert!(
            (from_height as usize) <= state.blocks.len(),
            "replace_tail beyond tip"
        );
        state.blocks.truncate(from_height as usize);
        for (i, block) in blocks.into_iter().enumerate() {
            assert_eq!(block.header.height, from_height + i as u64);
            state.blocks.push(block);
        }
    }

    /// Tip height of the simulated chain.
    ///
    /// # Panics
    /// Panics on an empty chain (no tip yet).
    pub fn tip_height(&self) -> u64 {
        let state = self.state.lock();
        assert!(!state.blocks.is_empty(), "empty chain has no tip");
        state.blocks.len() as u64 - 1
    }

    /// Set the daemon's own synced flag.
    pub fn set_synced(&self, synced: bool) {
        self.state.lock().synced = synced;
    }

    /// Set the daemon's trusted flag.
    pub fn set_trusted(&self, trusted: bool) {
        self.state.lock().trusted = trusted;
    }

    /// Take the daemon offline (every request fails transiently) or back
    /// online.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Fail the next `n` requests with a transient error, then recover.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_requests = n;
    }

    /// Reject the next relay with the given reason.
    pub fn reject_next_relay(&self, reason: impl Into<String>) {
        self.state.lock().reject_next_relay = Some(reason.into());
    }

    /// Hex payloads accepted by relay so far, in order.
    pub fn relayed(&self) -> Vec<String> {
        self.state.lock().relayed.clone()
    }

    /// Consume one scripted failure if armed. Must be called at the top of
    /// every trait method.
    fn check_failure(state: &mut SimState) -> Result<(), DaemonError> {
        if state.offline {
            return Err(DaemonError::Unreachable("daemon offline".into()));
        }
        if state.fail_requests > 0 {
            state.fail_requests -= 1;
            return Err(DaemonError::Unreachable("injected transient failure".into()));
        }
        Ok(())
    }
}

impl Default for SimDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonClient for SimDaemon {
    fn get_height(&self) -> Result<u64, DaemonError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state)?;
        if state.blocks.is_empty() {
            return Err(DaemonError::InvalidResponse("daemon has no blocks".into()));
        }
        Ok(state.blocks.len() as u64 - 1)
    }

    fn get_info(&self) -> Result<DaemonInfo, DaemonError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state)?;
        if state.blocks.is_empty() {
            return Err(DaemonError::InvalidResponse("daemon has no blocks".into()));
        }
        let height = state.blocks.len() as u64 - 1;
        Ok(DaemonInfo {
            height,
            target_height: height,
            synced: state.synced,
            trusted: state.trusted,
        })
    }

    fn fetch_blocks(&self, from_height: u64, max_count: usize) -> Result<Vec<Block>, DaemonError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state)?;
        let from = from_height as usize;
        if from >= state.blocks.len() {
            return Ok(Vec::new());
        }
        let to = (from + max_count).min(state.blocks.len());
        debug!(from_height, count = to - from, "sim daemon serving blocks");
        Ok(state.blocks[from..to].to_vec())
    }

    fn relay(&self, tx_hex: &str) -> Result<(), DaemonError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state)?;
        if let Some(reason) = state.reject_next_relay.take() {
            return Err(DaemonError::Rejected(reason));
        }
        state.relayed.push(tx_hex.to_string());
        Ok(())
    }
}
