//! Connect orchestrator
//!
//! Drives one console session from the connect form to a ready console:
//!
//! ```text
//! Idle -> Testing -> TestFailed -> Idle
//!                 -> TestOk -> Connecting -> AwaitingSchema -> AwaitingTopology -> Ready
//! ```
//!
//! Each stage awaits a completion signal produced by the previous one, so
//! the connect, schema and topology steps cannot overtake each other. Waits
//! are bounded by the session stage timeout when one is configured. Once a
//! session is ready a watcher sends the console back to the connect screen
//! whenever the router link drops.

use crate::config::store::SettingsStore;
use crate::config::{ConnectForm, SessionConfig};
use crate::error::{ConnectionError, ConsoleError};
use crate::router::{ConnectionHandle, ConnectionOptions, ConnectionState, Management};
use crate::session::location::{Location, Navigator};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Key of the one-shot topology action that completes a bring-up
pub const INITIALIZED_ACTION: &str = "initialized";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Where a bring-up currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BringUpPhase {
    #[default]
    Idle,
    Testing,
    TestFailed,
    TestOk,
    Connecting,
    AwaitingSchema,
    AwaitingTopology,
    Ready,
    Failed,
}

impl BringUpPhase {
    /// Whether a bring-up is running and a new submit must be refused
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            BringUpPhase::Testing
                | BringUpPhase::TestOk
                | BringUpPhase::Connecting
                | BringUpPhase::AwaitingSchema
                | BringUpPhase::AwaitingTopology
        )
    }
}

impl std::fmt::Display for BringUpPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BringUpPhase::Idle => "idle",
            BringUpPhase::Testing => "testing",
            BringUpPhase::TestFailed => "test failed",
            BringUpPhase::TestOk => "test ok",
            BringUpPhase::Connecting => "connecting",
            BringUpPhase::AwaitingSchema => "awaiting schema",
            BringUpPhase::AwaitingTopology => "awaiting topology",
            BringUpPhase::Ready => "ready",
            BringUpPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// What the connect form shows next to its button
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectStatus {
    /// A bring-up is running
    pub connecting: bool,
    /// Message of the last failed attempt
    pub error: Option<String>,
}

/// Result of a successful submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The session is up; the console moved to this location
    Ready(Location),
    /// The submit acted as "Disconnect" on a live session
    Disconnected,
}

pub struct ConnectOrchestrator {
    management: Management,
    settings: Arc<SettingsStore>,
    navigator: Navigator,
    stage_timeout: Option<Duration>,
    topology_refresh: Option<Duration>,
    phase: Arc<watch::Sender<BringUpPhase>>,
    status: Arc<watch::Sender<ConnectStatus>>,
    session_watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectOrchestrator {
    pub fn new(
        management: Management,
        settings: Arc<SettingsStore>,
        navigator: Navigator,
        session: &SessionConfig,
    ) -> Self {
        let (phase, _) = watch::channel(BringUpPhase::Idle);
        let (status, _) = watch::channel(ConnectStatus::default());
        Self {
            management,
            settings,
            navigator,
            stage_timeout: session.stage_timeout(),
            topology_refresh: session.topology_refresh(),
            phase: Arc::new(phase),
            status: Arc::new(status),
            session_watcher: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> BringUpPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<BringUpPhase> {
        self.phase.subscribe()
    }

    pub fn status(&self) -> ConnectStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectStatus> {
        self.status.subscribe()
    }

    pub fn management(&self) -> &Management {
        &self.management
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Label of the connect form button
    pub fn button_text(&self) -> &'static str {
        if self.management.connection.is_connected() {
            "Disconnect"
        } else {
            "Connect"
        }
    }

    /// Handle a connect form submit
    ///
    /// On a live session this disconnects. Otherwise it validates the form,
    /// stores the resolved address, port and username, test-connects and, if
    /// the router answers, runs the full bring-up.
    pub async fn submit(&self, form: &ConnectForm) -> Result<SubmitOutcome, ConsoleError> {
        // The link is already up while the schema and topology stages run
        if self.phase().is_in_progress() {
            return Err(ConnectionError::BringUpInProgress.into());
        }
        if self.management.connection.is_connected() {
            info!("Disconnect requested from the connect form");
            self.management.connection.disconnect().await;
            self.management.topology.stop_updating();
            self.set_status(false, None);
            self.set_phase(BringUpPhase::Idle);
            return Ok(SubmitOutcome::Disconnected);
        }

        let options = form.resolve()?;
        self.claim_bring_up()?;
        self.set_status(true, None);
        self.remember(&options);

        let endpoint = options.endpoint();
        info!(%endpoint, "Testing router connection");
        let probe = self.management.connection.test_connect(&options).await;
        if let Some(reason) = probe.error {
            let failure = ConnectionError::TestConnectFailed { endpoint };
            warn!(%reason, "{}", failure);
            self.set_status(false, Some(failure.to_string()));
            self.set_phase(BringUpPhase::TestFailed);
            self.set_phase(BringUpPhase::Idle);
            return Err(failure.into());
        }
        self.set_phase(BringUpPhase::TestOk);

        match self.bring_up(options).await {
            Ok(location) => {
                self.set_status(false, None);
                self.set_phase(BringUpPhase::Ready);
                Ok(SubmitOutcome::Ready(location))
            }
            Err(e) => {
                error!(error = %e, "Bring-up failed");
                self.abandon().await;
                self.set_status(false, Some(e.to_string()));
                self.set_phase(BringUpPhase::Failed);
                Err(e.into())
            }
        }
    }

    /// Tear the session down outside of the form toggle
    pub async fn shutdown(&self) {
        self.stop_session_watcher();
        self.management.topology.stop_updating();
        self.management.connection.disconnect().await;
        self.set_status(false, None);
        self.set_phase(BringUpPhase::Idle);
    }

    async fn bring_up(&self, options: ConnectionOptions) -> Result<Location, ConnectionError> {
        let connection = &self.management.connection;
        let topology = &self.management.topology;

        // The first disconnect action is armed by the connect action itself,
        // so a link that drops right after coming up is never missed
        let (connected_tx, connected_rx) = oneshot::channel();
        let watched = connection.clone();
        connection.add_connect_action(move || {
            let _ = connected_tx.send(arm_disconnect(&watched));
        });

        self.set_phase(BringUpPhase::Connecting);
        connection.connect(options.with_reconnect());

        self.set_phase(BringUpPhase::AwaitingSchema);
        let connected = self.await_stage("router connection", async {
            connected_rx.await.map_err(|_| match connection.state() {
                ConnectionState::Failed(reason) => ConnectionError::ConnectionFailed { reason },
                _ => ConnectionError::Abandoned,
            })
        });
        let disconnected = connected.await?;

        self.start_session_watcher(disconnected);

        let schema: Value = self
            .await_stage("management schema", self.management.schema())
            .await?;
        debug!(
            sections = schema.as_object().map_or(0, |sections| sections.len()),
            "Schema ready"
        );

        self.set_phase(BringUpPhase::AwaitingTopology);
        let initialized = topology.updated_once(INITIALIZED_ACTION);
        topology.set_update_entities(Vec::new());
        topology.get();
        self.await_stage("topology", async {
            initialized
                .await
                .map_err(|_| topology.last_error().unwrap_or(ConnectionError::Abandoned))
        })
        .await?;

        let location = self.navigator.handoff_after_ready();
        if let Some(interval) = self.topology_refresh {
            topology.start_updating(interval);
        }
        Ok(location)
    }

    async fn await_stage<T, F>(&self, stage: &str, step: F) -> Result<T, ConnectionError>
    where
        F: Future<Output = Result<T, ConnectionError>>,
    {
        match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, step).await {
                Ok(result) => result,
                Err(_) => Err(ConnectionError::StageTimeout {
                    stage: stage.to_string(),
                    seconds: limit.as_secs(),
                }),
            },
            None => step.await,
        }
    }

    /// Undo a bring-up that failed after the test connect
    async fn abandon(&self) {
        self.management.topology.del_updated_action(INITIALIZED_ACTION);
        self.stop_session_watcher();
        self.management.topology.stop_updating();
        self.management.connection.disconnect().await;
    }

    /// Persist the resolved form values
    fn remember(&self, options: &ConnectionOptions) {
        let saved = self.settings.update(|settings| {
            settings.address = options.address.clone();
            settings.port = Some(options.port);
            settings.username = options.username.clone();
        });
        match saved {
            Ok(true) => debug!("Connect settings saved"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Could not save connect settings"),
        }
    }

    fn claim_bring_up(&self) -> Result<(), ConnectionError> {
        let mut busy = false;
        self.phase.send_if_modified(|phase| {
            if phase.is_in_progress() {
                busy = true;
                false
            } else {
                *phase = BringUpPhase::Testing;
                true
            }
        });
        if busy {
            return Err(ConnectionError::BringUpInProgress);
        }
        debug!(phase = %BringUpPhase::Testing, "Bring-up phase");
        Ok(())
    }

    fn set_phase(&self, phase: BringUpPhase) {
        debug!(%phase, "Bring-up phase");
        self.phase.send_replace(phase);
    }

    fn set_status(&self, connecting: bool, error: Option<String>) {
        self.status.send_replace(ConnectStatus { connecting, error });
    }

    /// Return to the connect screen every time the link drops
    ///
    /// `disconnected` is the action armed when the link came up. Disconnect
    /// actions are one-shot, so the watcher arms a new one after each firing.
    fn start_session_watcher(&self, disconnected: oneshot::Receiver<()>) {
        let connection = self.management.connection.clone();
        let topology = self.management.topology.clone();
        let navigator = self.navigator.clone();
        let phase = Arc::clone(&self.phase);
        let status = Arc::clone(&self.status);

        let watcher = tokio::spawn(async move {
            let mut disconnected = disconnected;
            loop {
                if disconnected.await.is_err() {
                    break;
                }

                topology.stop_updating();
                status.send_replace(ConnectStatus::default());
                phase.send_replace(BringUpPhase::Idle);
                let location = navigator.redirect_to_connect();
                info!(%location, "Router session ended");
                disconnected = arm_disconnect(&connection);
            }
        });

        if let Some(previous) = lock(&self.session_watcher).replace(watcher) {
            previous.abort();
        }
    }

    fn stop_session_watcher(&self) {
        if let Some(watcher) = lock(&self.session_watcher).take() {
            watcher.abort();
        }
    }
}

fn arm_disconnect(connection: &ConnectionHandle) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    connection.add_disconnect_action(move || {
        let _ = tx.send(());
    });
    rx
}

impl Drop for ConnectOrchestrator {
    fn drop(&mut self) {
        self.stop_session_watcher();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_phases() {
        assert!(!BringUpPhase::Idle.is_in_progress());
        assert!(BringUpPhase::Testing.is_in_progress());
        assert!(BringUpPhase::AwaitingTopology.is_in_progress());
        assert!(!BringUpPhase::Ready.is_in_progress());
        assert!(!BringUpPhase::Failed.is_in_progress());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(BringUpPhase::AwaitingSchema.to_string(), "awaiting schema");
        assert_eq!(BringUpPhase::TestFailed.to_string(), "test failed");
    }
}
