//! TCP management-bridge transport
//!
//! Speaks newline-delimited JSON to a management bridge listening next to
//! the router. Each request carries an id; replies are matched back to the
//! waiting caller by that id, so several requests may be in flight at once.
//!
//! Request:  `{"id":7,"operation":"QUERY","entityTypes":["router"]}`
//! Reply:    `{"id":7,"statusCode":200,"statusDescription":"OK","body":{...}}`
//!
//! When the options carry a username, the first frame on a new link is
//! `{"id":1,"operation":"AUTH","username":"...","password":"..."}` and the
//! link is only handed out once the bridge answers it with a 2xx status.

use crate::error::ConnectionError;
use crate::router::transport::{
    ManagementLink, ManagementRequest, ManagementTransport, TestConnectResult,
};
use crate::router::ConnectionOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeResponse>>>>;

/// Longest reply line accepted before the link is dropped
pub const DEFAULT_MAX_FRAME_BYTES: u64 = 16 * 1024 * 1024;

const AUTH_OPERATION: &str = "AUTH";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgeRequest<'a> {
    id: u64,
    operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_types: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

impl<'a> BridgeRequest<'a> {
    fn new(operation: &'static str) -> Self {
        Self {
            id: 0,
            operation,
            entity_types: None,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeResponse {
    id: u64,
    status_code: u16,
    #[serde(default)]
    status_description: String,
    #[serde(default)]
    body: Value,
}

/// Transport that reaches routers through a TCP management bridge
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    connect_timeout: Duration,
    max_frame_bytes: u64,
}

impl BridgeTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Drop the link when a reply line grows past `bytes`
    pub fn with_max_frame_bytes(mut self, bytes: u64) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    async fn dial(&self, options: &ConnectionOptions) -> Result<TcpStream, String> {
        let target = (options.address.as_str(), options.port);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timed out after {} seconds",
                self.connect_timeout.as_secs()
            )),
        }
    }
}

#[async_trait]
impl ManagementTransport for BridgeTransport {
    async fn probe(&self, options: &ConnectionOptions) -> TestConnectResult {
        match self.dial(options).await {
            Ok(stream) => {
                drop(stream);
                TestConnectResult::ok()
            }
            Err(reason) => {
                debug!(endpoint = %options.endpoint(), %reason, "Probe failed");
                TestConnectResult::failed(reason)
            }
        }
    }

    async fn open(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn ManagementLink>, ConnectionError> {
        let stream = self
            .dial(options)
            .await
            .map_err(|reason| ConnectionError::ConnectionFailed { reason })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle on bridge socket");
        }
        let link = BridgeLink::start(stream, self.max_frame_bytes);

        if !options.username.is_empty() {
            let password = options.password.as_ref().map(|p| p.expose()).unwrap_or("");
            if let Err(e) = link.authenticate(&options.username, password).await {
                link.close().await;
                return Err(ConnectionError::ConnectionFailed {
                    reason: format!("authentication as {} failed: {}", options.username, e),
                });
            }
            debug!(username = %options.username, "Bridge accepted credentials");
        }
        Ok(Arc::new(link))
    }
}

/// An open bridge connection
pub struct BridgeLink {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    next_id: AtomicU64,
    closed_tx: Arc<watch::Sender<bool>>,
    closed_rx: watch::Receiver<bool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeLink {
    fn start(stream: TcpStream, max_frame_bytes: u64) -> Self {
        let (read_half, write_half) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (closed_tx, closed_rx) = watch::channel(false);
        let closed_tx = Arc::new(closed_tx);

        let reader = tokio::spawn(read_responses(
            read_half,
            max_frame_bytes,
            Arc::clone(&pending),
            Arc::clone(&closed_tx),
        ));

        Self {
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
            closed_tx,
            closed_rx,
            reader: Mutex::new(Some(reader)),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    async fn send_frame(&self, frame: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(frame.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Value, ConnectionError> {
        let mut request = BridgeRequest::new(AUTH_OPERATION);
        request.username = Some(username);
        request.password = Some(password);
        self.exchange(request).await
    }

    /// Send one request and wait for the reply with the same id
    async fn exchange(&self, mut request: BridgeRequest<'_>) -> Result<Value, ConnectionError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        request.id = id;
        let operation = request.operation;
        let frame = serde_json::to_string(&request).map_err(|e| ConnectionError::Protocol {
            reason: format!("Failed to encode request: {}", e),
        })?;

        // Register before looking at `closed`: the reader raises `closed`
        // before it clears `pending`, so a sender inserted after the clear
        // is always caught here.
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        if self.is_closed() {
            lock(&self.pending).remove(&id);
            return Err(ConnectionError::LinkClosed);
        }

        if let Err(e) = self.send_frame(&frame).await {
            lock(&self.pending).remove(&id);
            warn!(id, error = %e, "Failed to write management request");
            return Err(ConnectionError::LinkClosed);
        }
        debug!(id, operation, "Management request sent");

        let response = rx.await.map_err(|_| ConnectionError::LinkClosed)?;
        if (200..300).contains(&response.status_code) {
            Ok(response.body)
        } else {
            Err(ConnectionError::Management {
                status: response.status_code,
                description: response.status_description,
            })
        }
    }
}

#[async_trait]
impl ManagementLink for BridgeLink {
    async fn request(&self, request: ManagementRequest) -> Result<Value, ConnectionError> {
        let mut frame = BridgeRequest::new(request.operation());
        if let ManagementRequest::Query { entity_types } = &request {
            frame.entity_types = Some(entity_types.as_slice());
        }
        self.exchange(frame).await
    }

    async fn closed(&self) {
        let mut closed = self.closed_rx.clone();
        while !*closed.borrow_and_update() {
            if closed.changed().await.is_err() {
                return;
            }
        }
    }

    async fn close(&self) {
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Bridge socket shutdown failed");
            }
        }
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
        self.closed_tx.send_replace(true);
        lock(&self.pending).clear();
    }
}

impl Drop for BridgeLink {
    fn drop(&mut self) {
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
    }
}

/// Read one newline-terminated frame into `buf`
///
/// Returns `Ok(false)` at end of stream. A frame longer than `max_bytes` is
/// an `InvalidData` error.
async fn read_frame<R>(reader: &mut R, max_bytes: u64, buf: &mut Vec<u8>) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader).take(max_bytes + 1).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.len() as u64 > max_bytes {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("reply frame longer than {} bytes", max_bytes),
        ));
    }
    Ok(true)
}

async fn read_responses(
    reader: OwnedReadHalf,
    max_frame_bytes: u64,
    pending: Pending,
    closed: Arc<watch::Sender<bool>>,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        match read_frame(&mut reader, max_frame_bytes, &mut buf).await {
            Ok(true) => {
                if buf.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match serde_json::from_slice::<BridgeResponse>(&buf) {
                    Ok(response) => {
                        let waiter = lock(&pending).remove(&response.id);
                        match waiter {
                            Some(waiter) => {
                                let _ = waiter.send(response);
                            }
                            None => debug!(id = response.id, "Discarding unsolicited response"),
                        }
                    }
                    Err(e) => warn!(error = %e, "Discarding malformed management response"),
                }
            }
            Ok(false) => {
                debug!("Bridge closed the management link");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Management link read failed");
                break;
            }
        }
    }

    // Dropping the senders wakes every waiter with LinkClosed
    closed.send_replace(true);
    lock(&pending).clear();
}
