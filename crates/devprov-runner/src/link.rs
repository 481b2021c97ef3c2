//! An open SLIP-mux connection to the device.
//!
//! The write half is owned by the [`Link`] and used through `&mut self`, so
//! frames never interleave on the wire. The read half is owned by a background
//! task that splits the byte stream into frames and hands each one to the
//! [`Dispatcher`] on its own task.

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use slipmux_frame::{encode_frame, FrameExtractor};

use crate::dispatcher::{hex_preview, Dispatcher};
use crate::error::LinkError;
use crate::transport::{BoxedStream, Connector};

const READ_BUFFER_SIZE: usize = 4096;

/// An open connection with a running reader task.
pub struct Link {
    writer: WriteHalf<BoxedStream>,
    reader: JoinHandle<()>,
    reader_done: bool,
}

impl Link {
    /// Open a stream through `connector` and start dispatching inbound frames.
    pub async fn open(connector: &dyn Connector, dispatcher: Dispatcher) -> std::io::Result<Link> {
        let stream = connector.connect().await?;
        debug!("Connected to {}", connector.describe());
        Ok(Self::from_stream(stream, dispatcher))
    }

    /// Wrap an already open stream.
    pub fn from_stream(stream: BoxedStream, dispatcher: Dispatcher) -> Link {
        let (reader, writer) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(reader, dispatcher));
        Link {
            writer,
            reader,
            reader_done: false,
        }
    }

    /// Send `payload` on mux channel `address`.
    pub async fn send(&mut self, address: u8, payload: &[u8]) -> Result<(), LinkError> {
        let frame = encode_frame(address, payload);
        debug!(
            address = %format!("{:#04x}", address),
            len = payload.len(),
            "Sending: {}",
            hex_preview(payload)
        );
        self.send_raw(&frame).await
    }

    /// Write bytes to the stream as-is.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        metrics::counter!("devprov_bytes_sent_total").increment(bytes.len() as u64);
        Ok(())
    }

    /// Whether the reader task has stopped (peer closed or read error).
    pub fn is_closed(&self) -> bool {
        self.reader_done || self.reader.is_finished()
    }

    /// Wait until the peer closes the stream.
    pub async fn closed(&mut self) {
        if self.reader_done {
            return;
        }
        if let Err(e) = (&mut self.reader).await {
            if e.is_panic() {
                error!("Link reader task panicked");
            }
        }
        self.reader_done = true;
    }

    /// Shut down the write side and stop the reader.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Error shutting down link: {}", e);
        }
        self.reader.abort();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut reader: ReadHalf<BoxedStream>, dispatcher: Dispatcher) {
    let mut extractor = FrameExtractor::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Connection closed by peer");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Read error: {}", e);
                return;
            }
        };
        metrics::counter!("devprov_bytes_received_total").increment(n as u64);

        for result in extractor.push(&buf[..n]) {
            match result {
                Ok(frame) => {
                    metrics::counter!("devprov_frames_received_total").increment(1);
                    dispatcher.spawn_dispatch(frame);
                }
                Err(e) => {
                    metrics::counter!("devprov_frame_errors_total").increment(1);
                    error!("Error processing packet: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::duplex;

    fn collecting_dispatcher(address: u8) -> (Dispatcher, Arc<parking_lot::Mutex<Vec<Bytes>>>) {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher.register(address, move |payload: Bytes| {
            let sink = sink.clone();
            async move {
                sink.lock().push(payload);
                Ok(())
            }
        });
        (dispatcher, seen)
    }

    #[tokio::test]
    async fn test_send_writes_slip_frame() {
        let (client, mut server) = duplex(1024);
        let mut link = Link::from_stream(Box::new(client), Dispatcher::new());

        link.send(0x11, b"{}").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x11{}\n");
        link.close().await;
    }

    #[tokio::test]
    async fn test_inbound_frames_dispatched() {
        let (client, mut server) = duplex(1024);
        let (dispatcher, seen) = collecting_dispatcher(0x11);
        let _link = Link::from_stream(Box::new(client), dispatcher);

        // A garbage frame with a bad escape, then a valid one split in two writes.
        server.write_all(b"\x11\xdb\x00\n\x11{\"a\"").await.unwrap();
        server.write_all(b":1}\n").await.unwrap();

        for _ in 0..100 {
            if !seen.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(seen.lock().as_slice(), &[Bytes::from_static(b"{\"a\":1}")]);
    }

    #[tokio::test]
    async fn test_closed_when_peer_drops() {
        let (client, server) = duplex(64);
        let mut link = Link::from_stream(Box::new(client), Dispatcher::new());
        drop(server);
        link.closed().await;
        assert!(link.is_closed());
    }
}
