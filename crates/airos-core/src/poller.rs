// ── Poller ──
//
// Keeps the latest `DeviceSnapshot` for one device, refreshed on a fixed
// interval. At most one refresh runs at a time; errors are absorbed into
// "keep the last snapshot, record the error" and published to subscribers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use airos_api::{AirOsClient, DeviceSnapshot, ErrorKind, MacAddress};

use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::result::{Availability, RefreshResult};

/// Handle returned by [`Poller::on_refresh`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type RefreshCallback = Arc<dyn Fn(&RefreshResult) + Send + Sync>;

#[derive(Default)]
struct CallbackRegistry {
    next_id: u64,
    callbacks: BTreeMap<SubscriptionId, RefreshCallback>,
}

/// Cached state, replaced as a whole after every cycle.
#[derive(Debug, Clone, Default)]
struct PollerState {
    snapshot: Option<Arc<DeviceSnapshot>>,
    last_error: Option<RefreshResult>,
    last_success_at: Option<DateTime<Utc>>,
    consecutive_auth_failures: u32,
}

/// Background refresher for one device.
///
/// Cheaply cloneable via `Arc<PollerInner>`. Call [`start()`](Self::start)
/// for the initial refresh and the periodic task, [`shutdown()`](Self::shutdown)
/// to stop it.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    config: DeviceConfig,
    client: AirOsClient,
    state: watch::Sender<PollerState>,
    results: watch::Sender<Option<RefreshResult>>,
    /// Single-flight guard for refresh cycles.
    flight: Mutex<()>,
    /// Bumped after each completed cycle.
    generation: AtomicU64,
    callbacks: std::sync::Mutex<CallbackRegistry>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Poller {
    /// Build a poller. Does not touch the network.
    pub fn new(config: DeviceConfig) -> Result<Self, CoreError> {
        let client = AirOsClient::new(
            config.credentials(),
            config.login_encoding,
            &config.transport(),
        )?;
        let (state, _) = watch::channel(PollerState::default());
        let (results, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(PollerInner {
                config,
                client,
                state,
                results,
                flight: Mutex::new(()),
                generation: AtomicU64::new(0),
                callbacks: std::sync::Mutex::new(CallbackRegistry::default()),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    /// The underlying device client.
    pub fn client(&self) -> &AirOsClient {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the initial refresh and spawn the periodic refresh task.
    ///
    /// The initial result is returned whether or not it succeeded; a
    /// failing device is retried on the next tick. Calling `start` on a
    /// running poller only refreshes.
    pub async fn start(&self) -> RefreshResult {
        let result = self.refresh().await;

        let period = self.inner.config.poll_interval;
        if period.is_zero() {
            debug!("poll interval is zero, background refresh disabled");
            return result;
        }

        let mut task = self.inner.task.lock().await;
        if task.is_none() {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(refresh_task(self.clone(), period, cancel.clone()));
            *task = Some((cancel, handle));
            info!(interval_secs = period.as_secs(), "poller started");
        }
        result
    }

    /// Cancel the background task, wait for it, and drop the session.
    ///
    /// A refresh in flight is abandoned; the session ends up
    /// unauthenticated and the cached snapshot is kept.
    pub async fn shutdown(&self) {
        if let Some((cancel, handle)) = self.inner.task.lock().await.take() {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "refresh task ended abnormally");
            }
        }
        self.inner.client.logout().await;
        debug!("poller shut down");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.task.lock().await.is_some()
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run one poll cycle, or join the one already running.
    ///
    /// A caller that had to wait for an in-flight cycle gets that cycle's
    /// result instead of starting another.
    pub async fn refresh(&self) -> RefreshResult {
        let seen = self.inner.generation.load(Ordering::Acquire);
        let _flight = self.inner.flight.lock().await;

        if self.inner.generation.load(Ordering::Acquire) != seen {
            if let Some(result) = self.inner.results.borrow().clone() {
                debug!("joined in-flight refresh");
                return result;
            }
        }

        let outcome = self.run_cycle().await;
        let result = self.publish(outcome);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// The session decides under its own lock whether to log in first.
    async fn run_cycle(&self) -> Result<DeviceSnapshot, airos_api::Error> {
        self.inner.client.fetch_status().await
    }

    /// Classify a cycle outcome, update the cache, and notify subscribers.
    ///
    /// Only called with the flight lock held, so read-modify-replace of the
    /// state cannot race another writer.
    fn publish(&self, outcome: Result<DeviceSnapshot, airos_api::Error>) -> RefreshResult {
        let mut state = self.inner.state.borrow().clone();
        let result = match outcome {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                state.snapshot = Some(Arc::clone(&snapshot));
                state.last_error = None;
                state.last_success_at = Some(Utc::now());
                state.consecutive_auth_failures = 0;
                RefreshResult::Snapshot(snapshot)
            }
            Err(e) => {
                let result = match e.kind() {
                    ErrorKind::Authentication => {
                        state.consecutive_auth_failures += 1;
                        RefreshResult::AuthError {
                            message: e.to_string(),
                            consecutive: state.consecutive_auth_failures,
                        }
                    }
                    ErrorKind::Connection => RefreshResult::NetworkError {
                        message: e.to_string(),
                    },
                    ErrorKind::Protocol | ErrorKind::DataMissing => RefreshResult::ProtocolError {
                        message: e.to_string(),
                    },
                };
                state.last_error = Some(result.clone());
                result
            }
        };
        self.inner.state.send_replace(state);

        log_result(&result);
        self.inner.results.send_replace(Some(result.clone()));
        self.notify(&result);
        result
    }

    // ── Consumer surface ─────────────────────────────────────────

    /// Latest successful snapshot, if any.
    pub fn current_snapshot(&self) -> Option<Arc<DeviceSnapshot>> {
        self.inner.state.borrow().snapshot.clone()
    }

    /// Error from the most recent cycle; `None` after a success.
    pub fn last_error(&self) -> Option<RefreshResult> {
        self.inner.state.borrow().last_error.clone()
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.borrow().last_success_at
    }

    pub fn availability(&self) -> Availability {
        let state = self.inner.state.borrow();
        match (&state.snapshot, &state.last_error) {
            (None, _) => Availability::NeverConnected,
            (Some(_), None) => Availability::Available,
            (Some(_), Some(_)) => Availability::Stale,
        }
    }

    /// Watch the result of each cycle. `None` until the first completes.
    pub fn subscribe(&self) -> watch::Receiver<Option<RefreshResult>> {
        self.inner.results.subscribe()
    }

    /// Register a callback run after every cycle, on the refreshing task.
    ///
    /// Callbacks must not block.
    pub fn on_refresh<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&RefreshResult) + Send + Sync + 'static,
    {
        let mut registry = self
            .inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.callbacks.insert(id, Arc::new(callback));
        id
    }

    /// Remove a callback. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .remove(&id)
            .is_some()
    }

    fn notify(&self, result: &RefreshResult) {
        // Snapshot the list so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<RefreshCallback> = self
            .inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(result);
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Disconnect a station listed in the current snapshot.
    ///
    /// `mac` is matched ignoring case and separators; the command is sent
    /// with the address the device reported.
    pub async fn disconnect_station(&self, mac: &MacAddress) -> Result<(), CoreError> {
        let snapshot = self.current_snapshot().ok_or(CoreError::NotStarted)?;
        let station = snapshot
            .find_station(mac)
            .ok_or_else(|| CoreError::StationNotFound {
                mac: mac.to_string(),
            })?;
        let target = station.mac_address()?;

        info!(mac = %target, hostname = ?station.remote.hostname, "disconnecting station");
        self.inner.client.disconnect_station(&target).await?;
        Ok(())
    }
}

fn log_result(result: &RefreshResult) {
    match result {
        RefreshResult::Snapshot(s) => {
            debug!(device_id = s.device_id(), stations = s.station_count(), "refresh ok");
        }
        r if r.is_config_problem() => {
            error!(result = %r, "repeated authentication failures, check credentials");
        }
        r => warn!(result = %r, "refresh failed"),
    }
}

/// Periodically refresh until cancelled.
async fn refresh_task(poller: Poller, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    // A slow cycle pushes the schedule back instead of queueing catch-up ticks.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // A login dropped here leaves the session unauthenticated.
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = poller.refresh() => {}
                }
            }
        }
    }
    debug!("refresh task stopped");
}
