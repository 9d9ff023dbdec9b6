// crates/sync-engine/src/connectivity.rs
//! Connectivity state tracking
//!
//! The monitor does not probe anything itself. Platform code (or an HTTP
//! reachability checker) reports observations through
//! [`ConnectivityMonitor::set_online`], and the monitor turns them into
//! transitions.

use std::sync::Mutex;
use tokio::sync::watch;

type OnlineCallback = Box<dyn Fn() + Send + Sync>;

/// Result of reporting a connectivity observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Offline to online
    WentOnline,
    /// Online to offline
    WentOffline,
    /// Same state as before
    Unchanged,
}

/// Tracks online/offline state and announces offline-to-online transitions
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    listeners: Mutex<Vec<OnlineCallback>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with a known initial state
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            state,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Current connectivity
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Records an observation
    ///
    /// Listeners registered with [`ConnectivityMonitor::on_online`] run on the
    /// calling thread, once per genuine offline-to-online transition.
    pub fn set_online(&self, online: bool) -> Transition {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        let transition = match (changed, online) {
            (false, _) => Transition::Unchanged,
            (true, true) => Transition::WentOnline,
            (true, false) => Transition::WentOffline,
        };

        match transition {
            Transition::WentOnline => {
                log::info!("Connectivity restored");
                self.notify_online();
            }
            Transition::WentOffline => log::info!("Connectivity lost"),
            Transition::Unchanged => {}
        }

        transition
    }

    /// Registers a callback fired on each offline-to-online transition
    ///
    /// Callbacks must not register further callbacks.
    pub fn on_online<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(Box::new(callback)),
            Err(_) => log::error!("Connectivity listener lock poisoned, callback dropped"),
        }
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    fn notify_online(&self) {
        match self.listeners.lock() {
            Ok(listeners) => {
                for listener in listeners.iter() {
                    listener();
                }
            }
            Err(_) => log::error!("Connectivity listener lock poisoned, skipping callbacks"),
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
