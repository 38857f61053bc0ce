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


use proto::p4runtime_grpc::P4RuntimeClient;

use std::sync::Arc;

use tracing::warn;

use crate::channel::TransportEndpoint;
use crate::error::Result;
use crate::pool::EndpointPool;
use crate::stream::{CloseHook, NotificationSink, StreamSession};

/// A device's path to its target: the shared endpoint for unary and server-streaming RPCs and
/// the device's own stream session.
pub struct Connector {
    endpoint: Arc<TransportEndpoint>,
    session: StreamSession,
}

impl Connector {
    /// Acquires the endpoint for `ip:port` from `pool` and opens a stream session on it.  The
    /// session counts against the endpoint from the moment it is acquired, so a garbage
    /// collection in between cannot evict it.
    pub fn open(
        pool: &EndpointPool,
        node_id: &str,
        ip: &str,
        port: u16,
        device_id: u64,
        sink: Arc<dyn NotificationSink>,
        on_close: CloseHook,
    ) -> Result<Self> {
        let session_id = pool.next_session_id();
        let endpoint = pool.acquire(ip, port, session_id)?;
        match StreamSession::open(session_id, node_id, device_id, endpoint.clone(), sink, on_close) {
            Ok(session) => Ok(Connector { endpoint, session }),
            Err(e) => {
                warn!("{}: {}", node_id, e);
                endpoint.unregister(session_id);
                pool.garbage_collect();
                Err(e)
            }
        }
    }

    pub fn client(&self) -> &P4RuntimeClient {
        self.endpoint.client()
    }

    pub fn endpoint(&self) -> &Arc<TransportEndpoint> {
        &self.endpoint
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    pub fn session_id(&self) -> u64 {
        self.session.id()
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}
