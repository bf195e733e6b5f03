//! Router connection handle
//!
//! Owns at most one management link at a time. A background supervisor task
//! dials the router, runs the registered connect actions once the link is
//! up, waits for the link to drop, runs the disconnect actions and, when the
//! connect was issued with `reconnect: true`, dials again with backoff.

use crate::error::ConnectionError;
use crate::router::actions::ActionRegistry;
use crate::router::reconnection::ReconnectionPolicy;
use crate::router::state::{ConnectionState, SharedConnectionState};
use crate::router::transport::{ManagementLink, ManagementTransport, TestConnectResult};
use crate::router::ConnectionOptions;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Handle to the single router connection of a console session
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    transport: Arc<dyn ManagementTransport>,
    policy: ReconnectionPolicy,
    state: SharedConnectionState,
    options: Mutex<Option<ConnectionOptions>>,
    link: Mutex<Option<Arc<dyn ManagementLink>>>,
    connect_actions: ActionRegistry,
    disconnect_actions: ActionRegistry,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionHandle {
    pub fn new(transport: Arc<dyn ManagementTransport>, policy: ReconnectionPolicy) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                transport,
                policy,
                state: SharedConnectionState::new(),
                options: Mutex::new(None),
                link: Mutex::new(None),
                connect_actions: ActionRegistry::new(),
                disconnect_actions: ActionRegistry::new(),
                supervisor: Mutex::new(None),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Options of the most recent connect
    pub fn options(&self) -> Option<ConnectionOptions> {
        lock(&self.inner.options).clone()
    }

    /// Run `action` once, the next time a link comes up
    pub fn add_connect_action<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.connect_actions.add(action);
    }

    /// Run `action` once, the next time an established link goes away
    pub fn add_disconnect_action<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.disconnect_actions.add(action);
    }

    /// Probe the router without opening a session
    pub async fn test_connect(&self, options: &ConnectionOptions) -> TestConnectResult {
        debug!(endpoint = %options.endpoint(), "Test connecting");
        self.inner.transport.probe(options).await
    }

    /// Start connecting in the background
    ///
    /// Completion is only reported through the connect actions. Must be
    /// called from within a tokio runtime. A connect while connected is
    /// ignored. A connect while a previous one is still dialing (or backing
    /// off before a re-dial) replaces it, so only the newest options are
    /// ever dialed.
    pub fn connect(&self, options: ConnectionOptions) {
        match self.inner.state.get() {
            ConnectionState::Connected => {
                warn!("Connect ignored, connection already active");
                return;
            }
            ConnectionState::Connecting => {
                let previous = lock(&self.inner.options)
                    .as_ref()
                    .map(ConnectionOptions::endpoint);
                info!(previous = ?previous, "Replacing pending connect");
            }
            ConnectionState::Disconnected | ConnectionState::Failed(_) => {}
        }

        info!(endpoint = %options.endpoint(), reconnect = options.reconnect, "Connecting to router");
        let mut supervisor = lock(&self.inner.supervisor);
        if let Some(previous) = supervisor.take() {
            previous.abort();
        }
        self.inner.state.start_connecting();
        *lock(&self.inner.options) = Some(options.clone());
        *supervisor = Some(tokio::spawn(supervise(Arc::clone(&self.inner), options)));
    }

    /// Number of disconnect actions waiting for the next link loss
    pub fn pending_disconnect_actions(&self) -> usize {
        self.inner.disconnect_actions.len()
    }

    /// Tear the connection down
    ///
    /// Stops any re-dialing, closes the link and, if a link was up, runs the
    /// disconnect actions. Pending connect actions are dropped.
    pub async fn disconnect(&self) {
        if let Some(supervisor) = lock(&self.inner.supervisor).take() {
            supervisor.abort();
        }

        let link = lock(&self.inner.link).take();
        let was_connected = link.is_some();
        if let Some(link) = link {
            link.close().await;
        }

        self.inner.connect_actions.clear();
        self.inner.state.set_disconnected();

        if was_connected {
            let fired = self.inner.disconnect_actions.fire();
            info!(fired, "Disconnected from router");
        } else {
            debug!("Disconnect with no open link");
        }
    }

    /// The open management link
    pub fn link(&self) -> Result<Arc<dyn ManagementLink>, ConnectionError> {
        lock(&self.inner.link)
            .clone()
            .ok_or(ConnectionError::NotConnected)
    }
}

async fn supervise(inner: Arc<ConnectionInner>, options: ConnectionOptions) {
    let endpoint = options.endpoint();
    let mut failures = 0u32;

    loop {
        match inner.transport.open(&options).await {
            Ok(link) => {
                failures = 0;
                *lock(&inner.link) = Some(Arc::clone(&link));
                inner.state.set_connected();

                let fired = inner.connect_actions.fire();
                info!(%endpoint, fired, "Router link established");

                link.closed().await;

                lock(&inner.link).take();
                inner.state.set_disconnected();
                let fired = inner.disconnect_actions.fire();
                warn!(%endpoint, fired, "Router link lost");

                if !options.reconnect {
                    return;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(%endpoint, attempt = failures, error = %e, "Failed to open router link");

                if !options.reconnect || failures >= inner.policy.max_attempts {
                    inner.state.set_failed(e.to_string());
                    inner.connect_actions.clear();
                    return;
                }
            }
        }

        inner.state.start_connecting();
        let delay = inner.policy.calculate_backoff(failures.max(1));
        debug!(%endpoint, ?delay, "Waiting before re-dialing router");
        tokio::time::sleep(delay).await;
    }
}
