//! Frame dispatch by mux address.
//!
//! Handlers are registered per address. Every decoded frame is fanned out to
//! all handlers registered for its address, concurrently, and a failing
//! handler never prevents its siblings from running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{join_all, BoxFuture};
use parking_lot::RwLock;
use slipmux_frame::DecodedFrame;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::HandlerError;

/// Result type for frame handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Something that consumes payloads arriving on one mux address.
pub trait FrameHandler: Send + Sync + 'static {
    /// Handle one frame payload.
    fn handle(&self, payload: Bytes) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> FrameHandler for F
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, payload: Bytes) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(payload))
    }
}

/// Outcome of dispatching one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that ran.
    pub invoked: usize,
    /// Handlers that returned an error.
    pub failed: usize,
}

/// Callback that sees every frame, whatever its address.
pub type FrameObserver = Arc<dyn Fn(u8, &[u8]) + Send + Sync>;

/// Registry mapping mux addresses to handlers.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<u8, Vec<Arc<dyn FrameHandler>>>>>,
    observers: Arc<RwLock<Vec<FrameObserver>>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `address`. Multiple handlers per address are allowed.
    pub fn register<H: FrameHandler>(&self, address: u8, handler: H) {
        self.handlers
            .write()
            .entry(address)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Add an observer called synchronously for every frame before its handlers.
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(u8, &[u8]) + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    /// Number of handlers registered for `address`.
    pub fn handler_count(&self, address: u8) -> usize {
        self.handlers.read().get(&address).map_or(0, Vec::len)
    }

    /// Run every handler for the frame's address and wait for all of them.
    pub async fn dispatch(&self, address: u8, payload: Bytes) -> DispatchReport {
        debug!(
            address = %format!("{:#04x}", address),
            len = payload.len(),
            "Received data: {}",
            hex_preview(&payload)
        );

        for observer in self.observers.read().iter() {
            observer(address, &payload);
        }

        // Snapshot so the lock is not held across handler awaits.
        let handlers: Vec<Arc<dyn FrameHandler>> = self
            .handlers
            .read()
            .get(&address)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            metrics::counter!("devprov_frames_unhandled_total").increment(1);
            return DispatchReport::default();
        }

        let results = join_all(handlers.iter().map(|h| h.handle(payload.clone()))).await;

        let mut report = DispatchReport {
            invoked: results.len(),
            failed: 0,
        };
        for result in results {
            if let Err(e) = result {
                report.failed += 1;
                metrics::counter!("devprov_handler_errors_total").increment(1);
                error!(address = %format!("{:#04x}", address), "Handler error: {}", e);
            }
        }
        report
    }

    /// Dispatch a frame on its own task so the read loop keeps going.
    pub fn spawn_dispatch(&self, frame: DecodedFrame) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(frame.address, frame.payload).await })
    }
}

/// Hex dump of at most the first 64 bytes.
pub(crate) fn hex_preview(data: &[u8]) -> String {
    const MAX: usize = 64;
    if data.len() <= MAX {
        hex::encode(data)
    } else {
        format!("{}... ({} bytes)", hex::encode(&data[..MAX]), data.len())
    }
}
