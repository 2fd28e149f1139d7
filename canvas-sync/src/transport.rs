//! Duplex binary frame transports.
//!
//! Outbound frames go through [`Transport::send`], which never blocks: frames
//! are queued onto an unbounded channel and written by a background task.
//! Inbound frames arrive on a `mpsc::Receiver<Vec<u8>>` handed to
//! [`crate::SyncClient::run`].
//!
//! ```text
//!  SyncClient ──send──► ChannelTransport ──► writer task ──► WebSocket
//!  SyncClient ◄─recv─── mpsc::Receiver  ◄── reader task ◄── WebSocket
//! ```

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

/// Inbound buffer between the reader task and the client pump.
const INBOUND_CAPACITY: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("Connect failed: {0}")]
    Connect(String),
}

/// Ordered, at-most-once binary frame channel.
pub trait Transport {
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;
}

/// Connection state as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Transport that hands outbound frames to an mpsc channel.
///
/// Used directly for in-process wiring and tests, and as the send half of
/// [`WsTransport`].
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outgoing_tx: mpsc::UnboundedSender<Vec<u8>>,
    state: watch::Receiver<ConnectionState>,
}

impl ChannelTransport {
    /// Create a transport plus the receiver that sees every sent frame.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        // Sender dropped: state stays Connected for the transport's lifetime.
        let (_, state) = watch::channel(ConnectionState::Connected);
        (Self { outgoing_tx, state }, outgoing_rx)
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.outgoing_tx.is_closed() {
            return ConnectionState::Disconnected;
        }
        *self.state.borrow()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.outgoing_tx
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}

/// WebSocket transport built on `tokio-tungstenite`.
pub struct WsTransport;

impl WsTransport {
    /// Connect to `url` and spawn the reader/writer tasks.
    ///
    /// Returns the send half and the receiver of inbound frames. The receiver
    /// yields `None` once the socket closes.
    pub async fn connect(
        url: &str,
    ) -> Result<(ChannelTransport, mpsc::Receiver<Vec<u8>>), TransportError> {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let (ws_stream, _) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let _ = state_tx.send(ConnectionState::Disconnected);
            TransportError::Connect(e.to_string())
        })?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        log::info!("Connected to {url}");

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (inbound_tx, inbound_rx) = mpsc::channel::<Vec<u8>>(INBOUND_CAPACITY);

        // Writer task: forward outgoing channel to WebSocket
        tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                if ws_writer.send(Message::Binary(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        // Reader task: forward binary frames to the client pump
        let reader_state = state_tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        if inbound_tx.send(data.into()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            log::info!("WebSocket closed");
            let _ = reader_state.send(ConnectionState::Disconnected);
        });

        let _ = state_tx.send(ConnectionState::Connected);
        Ok((
            ChannelTransport {
                outgoing_tx,
                state: state_rx,
            },
            inbound_rx,
        ))
    }
}
