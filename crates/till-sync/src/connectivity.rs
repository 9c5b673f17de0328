//! # Connectivity Monitor
//!
//! Tracks whether the sync server is reachable and reports transitions.
//!
//! ## Signal Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   GET /health (probe task)  ──┐                                         │
//! │                               ├──► set_online(bool)                     │
//! │   external signal (CLI, OS) ──┘         │                               │
//! │                                         │ flip under the watch lock     │
//! │                                         ▼                               │
//! │                              changed? ──no──► nothing                   │
//! │                                  │                                      │
//! │                                 yes                                     │
//! │                                  ├──► watch::Sender<bool>  (orchestrator)│
//! │                                  └──► on_change handlers   (sync)       │
//! │                                                                         │
//! │   online() is a plain atomic load; the register reads it freely.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::transport::SyncTransport;

/// A reachability transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    BecameOnline,
    BecameOffline,
}

type ChangeHandler = Arc<dyn Fn(ConnectivityEvent) + Send + Sync>;

/// Reachability state shared by the probe, the orchestrator and the UI.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    tx: watch::Sender<bool>,
    handlers: Mutex<Vec<ChangeHandler>>,
}

impl ConnectivityMonitor {
    /// Starts offline. The first successful probe flips it.
    pub fn new() -> Self {
        Self::with_initial(false)
    }

    pub fn with_initial(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        ConnectivityMonitor {
            online: AtomicBool::new(online),
            tx,
            handlers: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Feeds a reachability observation.
    ///
    /// Returns the event when this observation changed the state, `None`
    /// when it repeated the current one.
    ///
    /// The flag and the watch value change together under the channel's
    /// lock, so `online()` and subscribers agree however callers race.
    /// Handlers run after every lock is released and may call `on_change`;
    /// racing transitions can reach them in either order.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            self.online.store(online, Ordering::SeqCst);
            true
        });
        if !changed {
            return None;
        }

        let event = if online {
            ConnectivityEvent::BecameOnline
        } else {
            ConnectivityEvent::BecameOffline
        };
        info!(?event, "Connectivity changed");

        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for handler in &handlers {
            handler(event);
        }

        Some(event)
    }

    /// Registers a listener called synchronously on every transition.
    ///
    /// Handlers must not block; hand work off to a task or channel.
    pub fn on_change<F>(&self, handler: F)
    where
        F: Fn(ConnectivityEvent) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(handler));
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Probes the server once and feeds the result.
    pub async fn probe_once(&self, transport: &dyn SyncTransport, timeout: Duration) -> bool {
        let reachable = match time::timeout(timeout, transport.probe()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "Health probe failed");
                false
            }
            Err(_) => {
                debug!(?timeout, "Health probe timed out");
                false
            }
        };
        self.set_online(reachable);
        reachable
    }

    /// Probes `GET /health` every `interval` until the handle is aborted.
    pub fn spawn_probe(
        self: &Arc<Self>,
        transport: Arc<dyn SyncTransport>,
        interval: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                monitor.probe_once(transport.as_ref(), timeout).await;
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.online())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emits_only_on_transitions() {
        let monitor = ConnectivityMonitor::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        monitor.on_change(move |e| sink.lock().unwrap().push(e));

        assert_eq!(monitor.set_online(false), None);
        assert_eq!(monitor.set_online(true), Some(ConnectivityEvent::BecameOnline));
        assert_eq!(monitor.set_online(true), None);
        assert_eq!(monitor.set_online(false), Some(ConnectivityEvent::BecameOffline));

        assert_eq!(
            *events.lock().unwrap(),
            vec![ConnectivityEvent::BecameOnline, ConnectivityEvent::BecameOffline]
        );
        assert!(!monitor.online());
    }

    #[test]
    fn test_handler_can_register_another_handler() {
        let monitor = Arc::new(ConnectivityMonitor::new());
        let late_calls = Arc::new(AtomicUsize::new(0));

        let inner = Arc::downgrade(&monitor);
        let counter = late_calls.clone();
        monitor.on_change(move |_| {
            if let Some(monitor) = inner.upgrade() {
                let counter = counter.clone();
                monitor.on_change(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        assert!(monitor.set_online(true).is_some());
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        // registered during the first transition, called on the second
        assert!(monitor.set_online(false).is_some());
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_racing_callers_leave_flag_and_watch_in_agreement() {
        let monitor = Arc::new(ConnectivityMonitor::new());
        let rx = monitor.subscribe();

        let workers: Vec<_> = (0..8)
            .map(|n| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for i in 0..2_000 {
                        monitor.set_online((i + n) % 2 == 0);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(monitor.online(), *rx.borrow());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let monitor = ConnectivityMonitor::new();
        let mut rx = monitor.subscribe();
        assert!(!*rx.borrow());

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        // a repeated signal does not wake subscribers
        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_probe_drives_state() {
        let monitor = ConnectivityMonitor::new();
        let transport = ScriptedTransport::new();
        let timeout = Duration::from_secs(1);

        assert!(monitor.probe_once(transport.as_ref(), timeout).await);
        assert!(monitor.online());

        transport.unreachable.store(true, Ordering::SeqCst);
        assert!(!monitor.probe_once(transport.as_ref(), timeout).await);
        assert!(!monitor.online());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_probe_runs_on_interval() {
        let monitor = Arc::new(ConnectivityMonitor::new());
        let transport = ScriptedTransport::new();
        let flips = Arc::new(AtomicUsize::new(0));
        let counter = flips.clone();
        monitor.on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handle = monitor.spawn_probe(
            transport.clone(),
            Duration::from_secs(15),
            Duration::from_secs(1),
        );

        time::sleep(Duration::from_secs(31)).await;
        handle.abort();

        assert!(monitor.online());
        assert_eq!(flips.load(Ordering::SeqCst), 1);
        assert_eq!(transport.probes.load(Ordering::SeqCst), 3);
    }
}
