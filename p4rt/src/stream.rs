/*
Copyright (c) 2021 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/


//! The per-device bidirectional `StreamChannel`: mastership arbitration, packet-out and
//! packet-in.
//!
//! Two futures run on the endpoint's completion queues.  The writer drains an unbounded channel
//! of outgoing requests into the gRPC sink.  The reader only forwards what it receives onto a
//! per-session event channel.  A dispatcher thread drains that channel, hands packet-ins to the
//! [`NotificationSink`] and, when the stream ends, unregisters the session from its endpoint and
//! runs the session's close hook.
//!
//! Shutting a session down half-closes the call and also stops the reader, so the session ends
//! even if the target never finishes its side of the stream.

use futures::channel::mpsc::{self as futures_mpsc, UnboundedSender};
use futures::channel::oneshot;
use futures::future::{self, Either};
use futures::{SinkExt, StreamExt};

use grpcio::WriteFlags;

use proto::p4runtime::{
    stream_message_request,
    stream_message_response,
    MasterArbitrationUpdate,
    PacketOut,
    StreamMessageRequest,
    StreamMessageResponse,
    Uint128,
};

use std::fmt::{self, Display};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;

use tracing::{debug, info, warn};

use crate::channel::TransportEndpoint;
use crate::error::{P4Error, Result};
use crate::value::hex;

/// Receives packet-ins from every device.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, node_id: &str, payload: &[u8]);
}

/// How a stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    Completed,
    Error(String),
    /// The session was shut down locally before the target ended the stream.
    Cancelled,
}

impl Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Error(e) => write!(f, "error ({})", e),
            Termination::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Runs once, on the dispatcher thread, with the session id and how the stream ended.
pub type CloseHook = Box<dyn FnOnce(u64, Termination) + Send>;

enum SessionEvent {
    Message(StreamMessageResponse),
    Closed(Termination),
}

#[derive(Default)]
struct ClosedFlag {
    closed: Mutex<bool>,
    cond: Condvar,
}

impl ClosedFlag {
    fn set(&self) {
        *self.closed.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn get(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    /// Waits up to `timeout` for the flag.  Returns whether it is set.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.closed.lock().unwrap();
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |closed| !*closed)
            .unwrap();
        *guard
    }
}

pub struct StreamSession {
    id: u64,
    node_id: String,
    device_id: u64,
    endpoint: Arc<TransportEndpoint>,
    outbound: Mutex<Option<UnboundedSender<StreamMessageRequest>>>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    closed: Arc<ClosedFlag>,
}

impl StreamSession {
    /// Opens the stream on `endpoint`.  The caller must already have registered `id` on it.
    pub fn open(
        id: u64,
        node_id: &str,
        device_id: u64,
        endpoint: Arc<TransportEndpoint>,
        sink: Arc<dyn NotificationSink>,
        on_close: CloseHook,
    ) -> Result<Self> {
        if endpoint.is_shut_down() {
            return Err(P4Error::EndpointUnavailable(endpoint.key().to_string()));
        }
        let (mut call_sink, mut receiver) = endpoint
            .client()
            .stream_channel()
            .map_err(|e| P4Error::rpc(format!("{}: failed to open stream channel", node_id), e))?;

        let (outbound, requests) = futures_mpsc::unbounded::<StreamMessageRequest>();
        endpoint.client().spawn(async move {
            let mut requests = requests.map(|req| Ok::<_, grpcio::Error>((req, WriteFlags::default())));
            if let Err(e) = call_sink.send_all(&mut requests).await {
                debug!("stream {}: send failed ({})", id, e);
            }
            // Half-close once the session stops sending.
            if let Err(e) = call_sink.close().await {
                debug!("stream {}: close failed ({})", id, e);
            }
        });

        let (events, mut event_rx) = mpsc::unbounded_channel();
        let (cancel, mut cancelled) = oneshot::channel::<()>();
        let closed = Arc::new(ClosedFlag::default());
        let reader_closed = closed.clone();
        endpoint.client().spawn(async move {
            let termination = loop {
                match future::select(receiver.next(), &mut cancelled).await {
                    Either::Left((Some(Ok(msg)), _)) => {
                        if events.send(SessionEvent::Message(msg)).is_err() {
                            break Termination::Completed;
                        }
                    }
                    Either::Left((Some(Err(e)), _)) => break Termination::Error(e.to_string()),
                    Either::Left((None, _)) => break Termination::Completed,
                    Either::Right(_) => break Termination::Cancelled,
                }
            };
            // Dropping the receiver releases the call.
            drop(receiver);
            reader_closed.set();
            let _ = events.send(SessionEvent::Closed(termination));
        });

        let dispatch_node = node_id.to_string();
        let dispatch_endpoint = endpoint.clone();
        thread::Builder::new()
            .name(format!("p4rt-stream-{}", id))
            .spawn(move || {
                let mut on_close = Some(on_close);
                let mut termination = Termination::Completed;
                while let Some(event) = event_rx.blocking_recv() {
                    match event {
                        SessionEvent::Message(msg) => dispatch(&dispatch_node, &*sink, msg),
                        SessionEvent::Closed(t) => {
                            termination = t;
                            break;
                        }
                    }
                }
                match &termination {
                    Termination::Completed | Termination::Cancelled => {
                        info!("{}: stream {} {}", dispatch_node, id, termination)
                    }
                    Termination::Error(e) => warn!("{}: stream {} failed ({})", dispatch_node, id, e),
                }
                dispatch_endpoint.unregister(id);
                if let Some(hook) = on_close.take() {
                    hook(id, termination);
                }
            })
            .map_err(|e| P4Error::io(format!("{}: could not start stream dispatcher", node_id), e))?;

        debug!("{}: stream {} open on {}", node_id, id, endpoint.key());
        Ok(StreamSession {
            id,
            node_id: node_id.to_string(),
            device_id,
            endpoint,
            outbound: Mutex::new(Some(outbound)),
            cancel: Mutex::new(Some(cancel)),
            closed,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    pub fn endpoint(&self) -> &Arc<TransportEndpoint> {
        &self.endpoint
    }

    pub fn is_alive(&self) -> bool {
        !self.closed.get()
    }

    /// Waits up to `grace` for the stream to end and reports whether it is still open.
    pub fn alive_after(&self, grace: Duration) -> bool {
        !self.closed.wait(grace)
    }

    /// Queues `request` for the writer.  Never blocks.
    pub fn send(&self, request: StreamMessageRequest) -> Result<()> {
        match &*self.outbound.lock().unwrap() {
            Some(tx) => tx.unbounded_send(request).map_err(|_| P4Error::SessionClosed(self.id)),
            None => Err(P4Error::SessionClosed(self.id)),
        }
    }

    pub fn arbitrate(&self, election_id: u64) -> Result<()> {
        self.send(StreamMessageRequest {
            update: Some(stream_message_request::Update::Arbitration(MasterArbitrationUpdate {
                device_id: self.device_id,
                election_id: Some(Uint128 { high: 0, low: election_id }),
            })),
        })
    }

    pub fn packet_out(&self, payload: Vec<u8>) -> Result<()> {
        debug!("{}: packet-out {}", self.node_id, hex(&payload));
        self.send(StreamMessageRequest {
            update: Some(stream_message_request::Update::Packet(PacketOut {
                payload,
                metadata: Vec::new(),
            })),
        })
    }

    /// Stops sending, which half-closes the stream, stops the reader, and releases the session's
    /// hold on its endpoint.  Safe to call more than once.
    pub fn shutdown(&self) {
        if self.outbound.lock().unwrap().take().is_some() {
            debug!("{}: stream {} shut down", self.node_id, self.id);
        }
        if let Some(cancel) = self.cancel.lock().unwrap().take() {
            let _ = cancel.send(());
        }
        self.endpoint.unregister(self.id);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(node_id: &str, sink: &dyn NotificationSink, msg: StreamMessageResponse) {
    match msg.update {
        Some(stream_message_response::Update::Packet(packet)) => {
            debug!("{}: packet-in {}", node_id, hex(&packet.payload));
            sink.notify(node_id, &packet.payload);
        }
        Some(stream_message_response::Update::Arbitration(a)) => {
            let election = a.election_id.map_or(0, |e| ((e.high as u128) << 64) | e.low as u128);
            info!("{}: arbitration update for device {} (election id {})", node_id, a.device_id, election);
        }
        None => debug!("{}: empty stream message", node_id),
    }
}
