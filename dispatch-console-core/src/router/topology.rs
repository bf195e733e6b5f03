//! Topology watcher
//!
//! Tracks a configurable set of management entity types. Each completed
//! refresh stores an opaque snapshot and runs the named updated actions.

use crate::error::ConnectionError;
use crate::router::actions::NamedActions;
use crate::router::connection::ConnectionHandle;
use crate::router::transport::ManagementRequest;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Entity types tracked when the update list is empty
pub const DEFAULT_ENTITIES: &[&str] = &["router", "router.node", "listener", "connection"];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Clone)]
pub struct Topology {
    inner: Arc<TopologyInner>,
}

struct TopologyInner {
    connection: ConnectionHandle,
    entities: Mutex<Vec<String>>,
    snapshot: Mutex<Option<Value>>,
    last_error: Mutex<Option<ConnectionError>>,
    actions: NamedActions,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl Topology {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self {
            inner: Arc::new(TopologyInner {
                connection,
                entities: Mutex::new(Vec::new()),
                snapshot: Mutex::new(None),
                last_error: Mutex::new(None),
                actions: NamedActions::new(),
                refresher: Mutex::new(None),
            }),
        }
    }

    /// Choose the entity types to track; an empty list means [`DEFAULT_ENTITIES`]
    pub fn set_update_entities(&self, entities: Vec<String>) {
        *lock(&self.inner.entities) = entities;
    }

    /// Entity types the next refresh will query
    pub fn update_entities(&self) -> Vec<String> {
        let entities = lock(&self.inner.entities).clone();
        if entities.is_empty() {
            DEFAULT_ENTITIES.iter().map(|e| e.to_string()).collect()
        } else {
            entities
        }
    }

    /// Latest topology snapshot, if any refresh has completed
    pub fn snapshot(&self) -> Option<Value> {
        lock(&self.inner.snapshot).clone()
    }

    /// Why the most recent refresh failed, cleared by the next success
    pub fn last_error(&self) -> Option<ConnectionError> {
        lock(&self.inner.last_error).clone()
    }

    /// Trigger a refresh in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn get(&self) {
        let topology = self.clone();
        tokio::spawn(async move {
            if let Err(e) = topology.refresh().await {
                warn!(error = %e, "Topology refresh failed");
            }
        });
    }

    /// Refresh now and run the updated actions
    ///
    /// A failed refresh records its error and drops the one-shot entries, so
    /// anyone waiting on [`Topology::updated_once`] sees the failure instead
    /// of waiting for a refresh that never comes.
    pub async fn refresh(&self) -> Result<Value, ConnectionError> {
        let snapshot = match self.query().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                *lock(&self.inner.last_error) = Some(e.clone());
                let dropped = self.inner.actions.drop_once();
                debug!(?dropped, "Dropped one-shot topology actions");
                return Err(e);
            }
        };
        *lock(&self.inner.last_error) = None;
        *lock(&self.inner.snapshot) = Some(snapshot.clone());

        let fired = self.inner.actions.fire();
        debug!(?fired, "Topology updated");
        Ok(snapshot)
    }

    async fn query(&self) -> Result<Value, ConnectionError> {
        let link = self.inner.connection.link()?;
        let entity_types = self.update_entities();
        debug!(?entity_types, "Requesting topology");
        link.request(ManagementRequest::Query { entity_types }).await
    }

    /// Run `action` after every refresh until `del_updated_action(key)`
    pub fn add_updated_action<F>(&self, key: &str, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.actions.add(key, action);
    }

    /// Remove the updated action registered under `key`
    pub fn del_updated_action(&self, key: &str) -> bool {
        self.inner.actions.remove(key)
    }

    pub fn has_updated_action(&self, key: &str) -> bool {
        self.inner.actions.contains(key)
    }

    /// Completion signal for the next refresh, registered under `key`
    ///
    /// The entry is removed as it fires, so later refreshes do not see it.
    /// If the refresh fails the sender is dropped and the receiver errors;
    /// [`Topology::last_error`] then says why.
    pub fn updated_once(&self, key: &str) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.actions.add_once(key, move || {
            let _ = tx.send(());
        });
        rx
    }

    /// Refresh every `interval` until stopped
    pub fn start_updating(&self, interval: Duration) {
        let topology = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Consume first immediate tick
            loop {
                ticker.tick().await;
                if let Err(e) = topology.refresh().await {
                    warn!(error = %e, "Periodic topology refresh failed");
                }
            }
        });

        if let Some(previous) = lock(&self.inner.refresher).replace(task) {
            previous.abort();
        }
    }

    pub fn stop_updating(&self) {
        if let Some(task) = lock(&self.inner.refresher).take() {
            task.abort();
        }
    }
}
