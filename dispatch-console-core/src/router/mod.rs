//! Router management module
//!
//! Connection handle, management client, topology watcher and the transports
//! underneath them.

pub mod actions;
pub mod bridge;
pub mod connection;
pub mod management;
pub mod options;
pub mod reconnection;
pub mod state;
pub mod topology;
pub mod transport;

// Public re-exports
pub use bridge::BridgeTransport;
pub use connection::ConnectionHandle;
pub use management::Management;
pub use options::ConnectionOptions;
pub use state::ConnectionState;
pub use topology::Topology;
pub use transport::{ManagementLink, ManagementRequest, ManagementTransport, TestConnectResult};
