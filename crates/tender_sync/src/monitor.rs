//! Connection status tracking and reconnect scheduling
//!
//! The realtime transport is owned by the host application; it feeds
//! channel lifecycle signals into the monitor, and the monitor answers
//! with reconnect attempt requests on a channel the transport owner
//! drains. Status changes fan out through a watch channel, so any number
//! of subscribers observe the latest value.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tender_config::ConnectionConfig;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Process-wide connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
    Syncing,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Disconnected
    }
}

/// Channel lifecycle signals delivered by the realtime transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSignal {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

impl ChannelSignal {
    /// Parse the transport's raw status string
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SUBSCRIBED" => Some(Self::Subscribed),
            "CHANNEL_ERROR" => Some(Self::ChannelError),
            "TIMED_OUT" => Some(Self::TimedOut),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Request for the transport owner to attempt a (re)subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectRequest {
    pub attempt: u32,
}

/// Backoff parameters for reconnect scheduling
#[derive(Debug, Clone)]
pub struct BackoffSettings {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffSettings {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            max_attempts: config.max_attempts,
        }
    }

    /// Delay before the given zero-based attempt: `min(base * 2^n, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

const MAX_ATTEMPTS_ERROR: &str = "max reconnection attempts reached";

/// Tracks connection state and owns reconnect timers
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    settings: BackoffSettings,
    status_tx: watch::Sender<ConnectionStatus>,
    attempts: AtomicU32,
    ever_connected: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
    attempt_tx: mpsc::UnboundedSender<ReconnectRequest>,
    last_error: Mutex<Option<String>>,
}

impl MonitorInner {
    fn set_status(&self, status: ConnectionStatus) {
        let previous = *self.status_tx.borrow();
        if previous != status {
            tracing::debug!("Connection status {:?} -> {:?}", previous, status);
            self.status_tx.send_replace(status);
        }
    }

    fn fire_attempt(&self, attempt: u32) {
        self.set_status(ConnectionStatus::Reconnecting);
        tracing::info!("Reconnect attempt {}", attempt);
        if self
            .attempt_tx
            .send(ReconnectRequest { attempt })
            .is_err()
        {
            tracing::debug!("No transport listening for reconnect requests");
        }
    }
}

impl ConnectionMonitor {
    /// Create a monitor along with the receiver the transport owner
    /// drains for reconnect attempt requests
    pub fn new(settings: BackoffSettings) -> (Self, mpsc::UnboundedReceiver<ReconnectRequest>) {
        let (status_tx, _status_rx) = watch::channel(ConnectionStatus::default());
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();

        let monitor = Self {
            inner: Arc::new(MonitorInner {
                settings,
                status_tx,
                attempts: AtomicU32::new(0),
                ever_connected: AtomicBool::new(false),
                timer: Mutex::new(None),
                reconciler: Mutex::new(None),
                attempt_tx,
                last_error: Mutex::new(None),
            }),
        };
        (monitor, attempt_rx)
    }

    /// Current status
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status_tx.borrow()
    }

    /// Subscribe to status changes; the receiver immediately sees the
    /// current value
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Last non-recoverable error, if any
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().ok().and_then(|g| g.clone())
    }

    /// Automatic reconnect attempts consumed so far
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Feed a transport lifecycle signal into the state machine
    pub fn handle_signal(&self, signal: ChannelSignal) {
        match signal {
            ChannelSignal::Subscribed => {
                self.cancel_timer();
                self.inner.attempts.store(0, Ordering::SeqCst);
                self.inner.ever_connected.store(true, Ordering::SeqCst);
                self.clear_error();
                self.inner.set_status(ConnectionStatus::Connected);
                tracing::info!("Channel subscribed");
            }
            ChannelSignal::ChannelError | ChannelSignal::TimedOut | ChannelSignal::Closed => {
                tracing::warn!("Channel signal {:?}", signal);
                self.inner.set_status(ConnectionStatus::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    /// Manually retry after the automatic attempts are exhausted (or at
    /// any time). Resets the attempt counter and fires immediately,
    /// cancelling any scheduled timer first.
    pub fn reconnect(&self) {
        tracing::info!("Manual reconnect requested");
        self.cancel_timer();
        self.inner.attempts.store(0, Ordering::SeqCst);
        self.clear_error();
        self.inner.fire_attempt(0);
    }

    /// Mark a sync cycle in progress
    pub fn begin_sync(&self) {
        self.inner.set_status(ConnectionStatus::Syncing);
    }

    /// Mark a sync cycle complete
    pub fn finish_sync(&self) {
        self.inner.set_status(ConnectionStatus::Connected);
    }

    /// A replay attempt failed; fall back to the backoff path
    pub fn sync_failed(&self) {
        self.inner.set_status(ConnectionStatus::Disconnected);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&self) {
        let attempt = self.inner.attempts.load(Ordering::SeqCst);
        if attempt >= self.inner.settings.max_attempts {
            tracing::error!("{}", MAX_ATTEMPTS_ERROR);
            if let Ok(mut guard) = self.inner.last_error.lock() {
                *guard = Some(MAX_ATTEMPTS_ERROR.to_string());
            }
            return;
        }

        self.cancel_timer();
        let delay = self.inner.settings.delay_for(attempt);
        self.inner.attempts.store(attempt + 1, Ordering::SeqCst);
        tracing::debug!("Scheduling reconnect attempt {} in {:?}", attempt, delay);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire_attempt(attempt);
        });
        if let Ok(mut guard) = self.inner.timer.lock() {
            *guard = Some(handle);
        }
    }

    fn cancel_timer(&self) {
        if let Ok(mut guard) = self.inner.timer.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    fn timer_active(&self) -> bool {
        self.inner
            .timer
            .lock()
            .ok()
            .map(|g| g.as_ref().map(|h| !h.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }

    fn clear_error(&self) {
        if let Ok(mut guard) = self.inner.last_error.lock() {
            *guard = None;
        }
    }

    /// Start the bounded reconciliation poll: a safety net that
    /// re-schedules reconnects when a push signal was missed. Only acts
    /// once the transport has connected at least once; the initial
    /// subscription is the transport owner's responsibility.
    pub fn spawn_reconciler(&self, interval: Duration) {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.reconcile_tick();
            }
        });
        if let Ok(mut guard) = self.inner.reconciler.lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }

    fn reconcile_tick(&self) {
        if self.status() == ConnectionStatus::Disconnected
            && self.inner.ever_connected.load(Ordering::SeqCst)
            && self.last_error().is_none()
            && !self.timer_active()
        {
            tracing::debug!("Reconciliation poll found stalled disconnect, rescheduling");
            self.schedule_reconnect();
        }
    }

    /// Abort owned background tasks
    pub fn shutdown(&self) {
        self.cancel_timer();
        if let Ok(mut guard) = self.inner.reconciler.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
