//! Scripted in-memory transport shared by the integration tests
//!
//! Every test connect and open is recorded. Replies come from a script that
//! a test can change up front: test-connect and open failures, schema and
//! topology bodies, topology error statuses, and requests that never
//! answer. `drop_link` simulates the router going away under an open link.

#![allow(dead_code)]

use async_trait::async_trait;
use dispatch_console_core::error::ConnectionError;
use dispatch_console_core::router::{
    ConnectionOptions, ManagementLink, ManagementRequest, ManagementTransport, TestConnectResult,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Script {
    pub probe_error: Option<String>,
    pub open_error: Option<String>,
    pub schema: Value,
    pub topology: Value,
    pub hang_schema: bool,
    pub hang_topology: bool,
    /// Status and description returned for every topology query
    pub topology_error: Option<(u16, String)>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            probe_error: None,
            open_error: None,
            schema: json!({"entityTypes": {"router": {}, "listener": {}}}),
            topology: json!({"router": [{"name": "Router.A"}]}),
            hang_schema: false,
            hang_topology: false,
            topology_error: None,
        }
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
    probes: Mutex<Vec<ConnectionOptions>>,
    opens: Mutex<Vec<ConnectionOptions>>,
    links: Mutex<Vec<Arc<ScriptedLink>>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Self::default()
        })
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    pub fn opens(&self) -> Vec<ConnectionOptions> {
        self.opens.lock().unwrap().clone()
    }

    pub fn last_link(&self) -> Option<Arc<ScriptedLink>> {
        self.links.lock().unwrap().last().cloned()
    }

    /// Queries seen across every link, in order
    pub fn queries(&self) -> Vec<Vec<String>> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .flat_map(|link| link.queries.lock().unwrap().clone())
            .collect()
    }

    /// Close the most recent link from the router side
    pub fn drop_link(&self) {
        if let Some(link) = self.last_link() {
            link.closed.send_replace(true);
        }
    }
}

#[async_trait]
impl ManagementTransport for ScriptedTransport {
    async fn probe(&self, options: &ConnectionOptions) -> TestConnectResult {
        self.probes.lock().unwrap().push(options.clone());
        match self.script.lock().unwrap().probe_error.clone() {
            Some(reason) => TestConnectResult::failed(reason),
            None => TestConnectResult::ok(),
        }
    }

    async fn open(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn ManagementLink>, ConnectionError> {
        self.opens.lock().unwrap().push(options.clone());
        let script = self.script.lock().unwrap().clone();
        if let Some(reason) = script.open_error {
            return Err(ConnectionError::ConnectionFailed { reason });
        }

        let (closed, _) = watch::channel(false);
        let link = Arc::new(ScriptedLink {
            script,
            closed,
            queries: Mutex::new(Vec::new()),
        });
        self.links.lock().unwrap().push(Arc::clone(&link));
        Ok(link)
    }
}

pub struct ScriptedLink {
    script: Script,
    closed: watch::Sender<bool>,
    queries: Mutex<Vec<Vec<String>>>,
}

impl ScriptedLink {
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl ManagementLink for ScriptedLink {
    async fn request(&self, request: ManagementRequest) -> Result<Value, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::LinkClosed);
        }
        match request {
            ManagementRequest::GetSchema => {
                if self.script.hang_schema {
                    std::future::pending::<()>().await;
                }
                Ok(self.script.schema.clone())
            }
            ManagementRequest::Query { entity_types } => {
                self.queries.lock().unwrap().push(entity_types);
                if self.script.hang_topology {
                    std::future::pending::<()>().await;
                }
                match &self.script.topology_error {
                    Some((status, description)) => Err(ConnectionError::Management {
                        status: *status,
                        description: description.clone(),
                    }),
                    None => Ok(self.script.topology.clone()),
                }
            }
        }
    }

    async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        while !*closed.borrow_and_update() {
            if closed.changed().await.is_err() {
                return;
            }
        }
    }

    async fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Wait until `check` holds, polling briefly
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2 seconds");
}
