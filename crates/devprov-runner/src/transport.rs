//! Byte-stream transports.
//!
//! The link only needs an ordered, bidirectional byte stream. A [`Connector`]
//! opens a fresh one each time, so the provisioning flow can reconnect after
//! the device restarts.

use std::io;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// An ordered bidirectional byte stream.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// A boxed byte stream as handed out by a [`Connector`].
pub type BoxedStream = Box<dyn ByteStream>;

/// Opens byte streams to one device.
pub trait Connector: Send + Sync {
    /// Open a new stream.
    fn connect(&self) -> BoxFuture<'_, io::Result<BoxedStream>>;

    /// Human-readable endpoint, for logs.
    fn describe(&self) -> String;
}

/// Connects over TCP, e.g. to a serial-to-TCP bridge or a simulated UART.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: String,
}

impl TcpConnector {
    /// Create a connector for `host:port`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        TcpConnector {
            endpoint: endpoint.into(),
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> BoxFuture<'_, io::Result<BoxedStream>> {
        Box::pin(async move {
            let stream = TcpStream::connect(&self.endpoint).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.endpoint)
    }
}

/// Hands out one pre-made stream, then refuses.
#[cfg(test)]
pub(crate) struct OneShotConnector(parking_lot::Mutex<Option<tokio::io::DuplexStream>>);

#[cfg(test)]
impl OneShotConnector {
    pub(crate) fn new(stream: tokio::io::DuplexStream) -> Self {
        OneShotConnector(parking_lot::Mutex::new(Some(stream)))
    }
}

#[cfg(test)]
impl Connector for OneShotConnector {
    fn connect(&self) -> BoxFuture<'_, io::Result<BoxedStream>> {
        let stream = self.0.lock().take();
        Box::pin(async move {
            stream
                .map(|s| Box::new(s) as BoxedStream)
                .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))
        })
    }

    fn describe(&self) -> String {
        "duplex".to_string()
    }
}
