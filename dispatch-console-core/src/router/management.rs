//! Management client
//!
//! Bundles the connection handle and topology watcher of one console session
//! and serves the management schema.

use crate::error::ConnectionError;
use crate::router::connection::ConnectionHandle;
use crate::router::reconnection::ReconnectionPolicy;
use crate::router::topology::Topology;
use crate::router::transport::{ManagementRequest, ManagementTransport};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone)]
pub struct Management {
    pub connection: ConnectionHandle,
    pub topology: Topology,
    /// Schema of the last router it was fetched from, keyed by endpoint
    schema: Arc<Mutex<Option<(String, Value)>>>,
}

impl Management {
    pub fn new(transport: Arc<dyn ManagementTransport>, policy: ReconnectionPolicy) -> Self {
        let connection = ConnectionHandle::new(transport, policy);
        let topology = Topology::new(connection.clone());
        Self {
            connection,
            topology,
            schema: Arc::new(Mutex::new(None)),
        }
    }

    /// Fetch the management schema over the open link
    ///
    /// Served from cache when it was already fetched from the same endpoint.
    pub async fn schema(&self) -> Result<Value, ConnectionError> {
        let endpoint = self
            .connection
            .options()
            .map(|options| options.endpoint())
            .unwrap_or_default();

        let cached = self
            .schema
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .filter(|(cached_for, _)| *cached_for == endpoint)
            .map(|(_, schema)| schema);
        if let Some(schema) = cached {
            debug!(%endpoint, "Using cached schema");
            return Ok(schema);
        }

        let link = self.connection.link()?;
        let schema = link.request(ManagementRequest::GetSchema).await?;
        info!(%endpoint, "Received management schema");

        if let Ok(mut guard) = self.schema.lock() {
            *guard = Some((endpoint, schema.clone()));
        }
        Ok(schema)
    }

    /// Callback form of [`Management::schema`]
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_schema<F>(&self, callback: F)
    where
        F: FnOnce(Result<Value, ConnectionError>) + Send + 'static,
    {
        let management = self.clone();
        tokio::spawn(async move {
            callback(management.schema().await);
        });
    }
}
