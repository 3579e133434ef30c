use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// A required setting is missing or malformed. Never retried.
    Configuration(String),
    /// Timeouts, refused connections, authentication failures. Retried.
    Connectivity(String),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            ConnectionError::Connectivity(msg) => write!(f, "Connectivity error: {msg}"),
        }
    }
}

impl std::error::Error for ConnectionError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Error(String),
}

/// Opens handles to a backing store.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    async fn connect(&self, uri: &str) -> Result<Self::Handle, ConnectionError>;

    /// Cheap local liveness check. Must not touch the network.
    fn is_live(&self, _handle: &Self::Handle) -> bool {
        true
    }

    async fn close(&self, _handle: Self::Handle) {}
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

type Establishing<H> = Shared<BoxFuture<'static, Result<H, ConnectionError>>>;

enum Slot<H> {
    Empty,
    Establishing(Establishing<H>),
    Ready(H),
}

/// Memoizes one connection handle for the lifetime of the process.
///
/// Concurrent callers during a cold start all await the same establishment
/// future. A failed establishment is evicted so the next caller starts over.
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    uri: Option<String>,
    retry: RetryPolicy,
    slot: Mutex<Slot<C::Handle>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, uri: Option<String>, retry: RetryPolicy) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            connector: Arc::new(connector),
            uri,
            retry,
            slot: Mutex::new(Slot::Empty),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(&*slot, Slot::Ready(handle) if self.connector.is_live(handle))
    }

    pub async fn ensure_connected(&self) -> Result<C::Handle, ConnectionError> {
        let (pending, stale) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match &*slot {
                Slot::Ready(handle) if self.connector.is_live(handle) => {
                    return Ok(handle.clone());
                }
                Slot::Establishing(pending) => (pending.clone(), None),
                _ => {
                    let uri = self.uri.clone().ok_or_else(|| {
                        ConnectionError::Configuration("MONGODB_URI is not set".to_string())
                    })?;
                    let stale = match std::mem::replace(&mut *slot, Slot::Empty) {
                        Slot::Ready(handle) => {
                            tracing::warn!("Cached database connection is no longer live");
                            self.emit(ConnectionEvent::Disconnected);
                            Some(handle)
                        }
                        _ => None,
                    };
                    tracing::info!("Creating new database connection");
                    let pending = establish(
                        self.connector.clone(),
                        uri,
                        self.retry,
                        self.events.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Slot::Establishing(pending.clone());
                    (pending, stale)
                }
            }
        };

        if let Some(handle) = stale {
            self.connector.close(handle).await;
        }

        let result = pending.clone().await;

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let still_current = matches!(&*slot, Slot::Establishing(current) if current.ptr_eq(&pending));
        match &result {
            Ok(handle) if still_current => *slot = Slot::Ready(handle.clone()),
            Err(_) if still_current => *slot = Slot::Empty,
            _ => {}
        }

        result
    }

    /// Close the cached handle, if any. The next `ensure_connected` reconnects.
    pub async fn shutdown(&self) {
        let previous = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, Slot::Empty)
        };

        if let Slot::Ready(handle) = previous {
            self.connector.close(handle).await;
            tracing::info!("Database connection closed");
            self.emit(ConnectionEvent::Disconnected);
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn establish<C: Connector>(
    connector: Arc<C>,
    uri: String,
    retry: RetryPolicy,
    events: broadcast::Sender<ConnectionEvent>,
) -> Result<C::Handle, ConnectionError> {
    let mut attempt = 0;
    loop {
        match connector.connect(&uri).await {
            Ok(handle) => {
                tracing::info!("Database connected");
                let _ = events.send(ConnectionEvent::Connected);
                return Ok(handle);
            }
            Err(err) => {
                tracing::error!("Database connection error: {err}");
                let _ = events.send(ConnectionEvent::Error(err.to_string()));

                if matches!(err, ConnectionError::Configuration(_)) || attempt >= retry.max_retries {
                    return Err(err);
                }

                let delay = retry.delay(attempt);
                attempt += 1;
                tracing::warn!(
                    "Retrying database connection in {}ms (retry {attempt}/{})",
                    delay.as_millis(),
                    retry.max_retries
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
