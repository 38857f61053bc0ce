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


//! One gRPC channel to a target's `ip:port`, shared by every device behind that endpoint.

use grpcio::{Channel, ChannelBuilder, Environment};

use proto::p4runtime_grpc::P4RuntimeClient;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{P4Error, Result};

pub fn endpoint_key(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

pub struct TransportEndpoint {
    key: String,
    channel: Channel,
    client: P4RuntimeClient,
    /// Stream sessions multiplexed on this channel.
    sessions: Mutex<HashSet<u64>>,
    shut_down: AtomicBool,
}

impl TransportEndpoint {
    /// Opens a channel to `ip:port` and waits up to `timeout` for it to become ready.
    pub fn connect(env: Arc<Environment>, ip: &str, port: u16, timeout: Duration) -> Result<Self> {
        let key = endpoint_key(ip, port);
        let channel = ChannelBuilder::new(env).connect(&key);
        if !futures::executor::block_on(channel.wait_for_connected(timeout)) {
            return Err(P4Error::EndpointUnavailable(key));
        }
        info!("{}: channel ready", key);
        Ok(TransportEndpoint {
            client: P4RuntimeClient::new(channel.clone()),
            channel,
            key,
            sessions: Mutex::new(HashSet::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn client(&self) -> &P4RuntimeClient {
        &self.client
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn register(&self, session_id: u64) {
        self.sessions.lock().unwrap().insert(session_id);
    }

    /// Returns false if the session was not registered.
    pub fn unregister(&self, session_id: u64) -> bool {
        self.sessions.lock().unwrap().remove(&session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Marks the endpoint dead.  The channel itself closes when the last handle to it is dropped.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("{}: endpoint shut down", self.key);
        }
    }
}
