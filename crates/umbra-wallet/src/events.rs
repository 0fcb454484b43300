//! Wallet event delivery.
//!
//! Listeners are registered in a shared map and invoked from a dedicated
//! delivery thread fed by an unbounded queue. Emission never blocks the
//! mutating thread (sync or relay); a slow listener delays only delivery,
//! never the synchronizer. Events are delivered in emission order, and to
//! listeners in ascending registration order.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::debug;

use umbra_core::types::Hash256;

/// Identifier of a registered listener.
pub type ListenerId = u64;

/// Events delivered to wallet listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    /// Sync advanced past a block.
    SyncProgress {
        /// Wallet height after applying the block.
        height: u64,
        /// Daemon height the sync is working towards.
        daemon_height: u64,
    },
    /// An incoming transfer was discovered during scan.
    NewTransfer {
        /// Transaction that paid the wallet.
        tx_id: Hash256,
        /// Receiving account.
        account: u32,
        /// Motes received by the account in this transaction.
        amount: u64,
        /// Block height of the transfer.
        height: u64,
    },
    /// An account's balance changed.
    BalanceChanged {
        /// The affected account.
        account: u32,
        /// New total balance in motes.
        balance: u64,
        /// New unlocked balance in motes.
        unlocked: u64,
    },
}

/// A registered listener callback.
pub type Listener = Box<dyn Fn(&WalletEvent) + Send + 'static>;

enum Message {
    Event(WalletEvent),
    /// Delivery barrier: ack once everything queued before it is delivered.
    Flush(mpsc::Sender<()>),
    Shutdown,
}

/// Queued, ordered event delivery to registered listeners.
pub struct EventBus {
    sender: mpsc::Sender<Message>,
    listeners: Arc<Mutex<BTreeMap<ListenerId, Listener>>>,
    next_id: AtomicU64,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl EventBus {
    /// Create an event bus and start its delivery thread.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Message>();
        let listeners: Arc<Mutex<BTreeMap<ListenerId, Listener>>> =
            Arc::new(Mutex::new(BTreeMap::new()));

        let worker_listeners = Arc::clone(&listeners);
        let worker = thread::Builder::new()
            .name("umbra-events".into())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Event(event) => {
                            let listeners = worker_listeners.lock();
                            for callback in listeners.values() {
                                callback(&event);
                            }
                        }
                        Message::Flush(ack) => {
                            let _ = ack.send(());
                        }
                        Message::Shutdown => break,
                    }
                }
            })
            .expect("spawning the event delivery thread cannot fail");

        Self {
            sender,
            listeners,
            next_id: AtomicU64::new(1),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Register a listener. Returns its id for later removal.
    pub fn subscribe(&self, callback: impl Fn(&WalletEvent) + Send + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, Box::new(callback));
        debug!(listener = id, "listener registered");
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.listeners.lock().remove(&id).is_some();
        if removed {
            debug!(listener = id, "listener removed");
        }
        removed
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Queue an event for delivery. Never blocks.
    pub fn emit(&self, event: WalletEvent) {
        // A send error means the bus is shutting down; late events are dropped.
        let _ = self.sender.send(Message::Event(event));
    }

    /// Block until every event queued before this call has been delivered.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.sender.send(Message::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
