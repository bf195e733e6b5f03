//! Transport seam between the management client and the wire
//!
//! A transport knows how to probe a router and how to open a management
//! link to it. Everything above this seam (connection supervision, action
//! registries, topology tracking) is transport-agnostic.

use crate::error::ConnectionError;
use crate::router::ConnectionOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of a test connection
///
/// Only the presence of `error` is meaningful; success carries nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestConnectResult {
    pub error: Option<String>,
}

impl TestConnectResult {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Requests the management client issues over a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementRequest {
    /// Fetch the management schema
    GetSchema,

    /// Fetch the current attributes of the given entity types
    Query { entity_types: Vec<String> },
}

impl ManagementRequest {
    /// Management operation name
    pub fn operation(&self) -> &'static str {
        match self {
            ManagementRequest::GetSchema => "GET-SCHEMA",
            ManagementRequest::Query { .. } => "QUERY",
        }
    }
}

/// Opens management links to routers
#[async_trait]
pub trait ManagementTransport: Send + Sync {
    /// Check that the router accepts connections, without keeping a link open
    async fn probe(&self, options: &ConnectionOptions) -> TestConnectResult;

    /// Open a management link
    async fn open(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn ManagementLink>, ConnectionError>;
}

/// One open management link
#[async_trait]
pub trait ManagementLink: Send + Sync {
    /// Send a request and wait for its reply body
    async fn request(&self, request: ManagementRequest) -> Result<Value, ConnectionError>;

    /// Resolves once the link is gone, whoever closed it
    async fn closed(&self);

    /// Close the link from our side
    async fn close(&self);
}
