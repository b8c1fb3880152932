//! Transport ↔ Provider Bridge
//!
//! The transport is async (tokio); the provider makes blocking remote calls
//! and must handle one request at a time. The bridge puts the dispatcher on
//! its own thread:
//!
//! ```text
//! Tokio Runtime                         Worker Thread
//! ─────────────                         ─────────────
//!   reader ── Request ────────────────────►│ dispatch
//!              (crossbeam bounded)         │  (blocking remote calls)
//!                                          │
//!   writer ◄── Response ───────────────────┤ one or more envelopes
//!              (tokio mpsc)                │ per request
//! ```
//!
//! # Ordering
//!
//! 1. The request queue is FIFO and drained by a single worker
//! 2. Each request is handled to completion before the next is taken
//! 3. Envelopes reach the writer in the order they were sent
//!
//! Envelopes are newline-delimited JSON, one document per line.

use std::io;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use smbfsp_core::{deserialize_request, serialize_response, Request, Response};

use crate::dispatcher::Dispatcher;
use crate::reply::ResponseSink;

/// Pause between attempts while the request queue is full
const BACKPRESSURE_POLL: Duration = Duration::from_millis(1);

/// Message from the transport to the worker
#[derive(Debug)]
pub enum BridgeMessage {
    Request(Request),
    /// Stop after the requests already queued
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("provider worker is gone")]
    Closed,
}

/// Sends envelopes from the worker to the async writer
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Response>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Response>) -> Self {
        Self { tx }
    }
}

impl ResponseSink for ChannelSink {
    fn send(&mut self, response: Response) {
        if self.tx.send(response).is_err() {
            debug!("response channel closed, dropping envelope");
        }
    }
}

/// Transport-side handle to the provider worker
#[derive(Clone)]
pub struct ProviderBridge {
    request_tx: Sender<BridgeMessage>,
}

impl ProviderBridge {
    /// Start the worker thread; returns the bridge, the response stream and
    /// the worker's join handle
    pub fn spawn(
        dispatcher: Dispatcher,
        queue_depth: usize,
    ) -> io::Result<(Self, mpsc::UnboundedReceiver<Response>, JoinHandle<()>)> {
        let (request_tx, request_rx) = bounded(queue_depth.max(1));
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("smbfsp-provider".into())
            .spawn(move || run_worker(dispatcher, request_rx, ChannelSink::new(response_tx)))?;

        Ok((Self { request_tx }, response_rx, worker))
    }

    /// Queue a request, waiting while the queue is full
    pub async fn submit(&self, request: Request) -> Result<(), BridgeError> {
        self.send(BridgeMessage::Request(request)).await
    }

    /// Ask the worker to stop once the queued requests are handled
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.send(BridgeMessage::Shutdown).await
    }

    async fn send(&self, message: BridgeMessage) -> Result<(), BridgeError> {
        let mut message = message;
        let mut waited = false;
        loop {
            match self.request_tx.try_send(message) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => {
                    if !waited {
                        warn!("request queue full, waiting...");
                        waited = true;
                    }
                    message = returned;
                    tokio::time::sleep(BACKPRESSURE_POLL).await;
                }
                Err(TrySendError::Disconnected(_)) => return Err(BridgeError::Closed),
            }
        }
    }
}

fn run_worker(mut dispatcher: Dispatcher, requests: Receiver<BridgeMessage>, mut sink: ChannelSink) {
    info!("provider worker started");
    while let Ok(message) = requests.recv() {
        match message {
            BridgeMessage::Request(request) => dispatcher.dispatch(&request, &mut sink),
            BridgeMessage::Shutdown => break,
        }
    }
    info!("provider worker stopped");
}

/// Serve newline-delimited envelopes from `reader` until end of input,
/// writing every response envelope to `writer`
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    dispatcher: Dispatcher,
    queue_depth: usize,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (bridge, mut responses, worker) = ProviderBridge::spawn(dispatcher, queue_depth)?;

    let read_side = async move {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match deserialize_request(line) {
                Ok(request) => {
                    debug!(function = %request.function_name, message_id = request.message_id, "received");
                    if bridge.submit(request).await.is_err() {
                        error!("provider worker exited, closing input");
                        break;
                    }
                }
                Err(e) => warn!("dropping undecodable message: {}", e),
            }
        }
        if bridge.shutdown().await.is_err() {
            debug!("provider worker already stopped");
        }
        Ok::<(), io::Error>(())
    };

    let write_side = async move {
        let mut writer = writer;
        while let Some(response) = responses.recv().await {
            match serialize_response(&response) {
                Ok(mut line) => {
                    line.push('\n');
                    writer.write_all(line.as_bytes()).await?;
                    writer.flush().await?;
                }
                Err(e) => error!(message_id = response.message_id, "failed to encode response: {}", e),
            }
        }
        Ok::<(), io::Error>(())
    };

    let (read_result, write_result) = tokio::join!(read_side, write_side);

    if worker.join().is_err() {
        error!("provider worker panicked");
    }
    read_result?;
    write_result
}
