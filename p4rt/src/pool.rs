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


//! Deduplicates transport endpoints by `ip:port` and reclaims the ones nobody streams on.

use grpcio::{EnvBuilder, Environment};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::channel::{endpoint_key, TransportEndpoint};
use crate::config::RuntimeConfig;
use crate::error::Result;

pub struct EndpointPool {
    env: Arc<Environment>,
    connect_timeout: Duration,
    endpoints: Mutex<HashMap<String, Arc<TransportEndpoint>>>,
    next_session_id: AtomicU64,
}

impl EndpointPool {
    pub fn new(config: &RuntimeConfig) -> Self {
        let env = EnvBuilder::new()
            .name_prefix("p4rt")
            .cq_count(config.completion_queues.max(1))
            .build();
        EndpointPool {
            env: Arc::new(env),
            connect_timeout: config.connect_timeout(),
            endpoints: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the endpoint for `ip:port`, connecting if there is none yet, with `session_id`
    /// registered on it.  A connection that fails is not cached.
    pub fn acquire(&self, ip: &str, port: u16, session_id: u64) -> Result<Arc<TransportEndpoint>> {
        let key = endpoint_key(ip, port);
        if let Some(endpoint) = self.endpoints.lock().unwrap().get(&key) {
            endpoint.register(session_id);
            return Ok(endpoint.clone());
        }

        // Connect without the lock held.  If another caller won the race, use theirs.
        let fresh = Arc::new(TransportEndpoint::connect(
            self.env.clone(),
            ip,
            port,
            self.connect_timeout,
        )?);
        let mut endpoints = self.endpoints.lock().unwrap();
        let endpoint = endpoints.entry(key).or_insert_with(|| fresh.clone()).clone();
        if !Arc::ptr_eq(&endpoint, &fresh) {
            fresh.shutdown();
        }
        endpoint.register(session_id);
        Ok(endpoint)
    }

    pub fn get(&self, ip: &str, port: u16) -> Option<Arc<TransportEndpoint>> {
        self.endpoints.lock().unwrap().get(&endpoint_key(ip, port)).cloned()
    }

    pub fn len(&self) -> usize {
        self.endpoints.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts and shuts down every endpoint with no registered sessions.  Returns how many were
    /// evicted.
    pub fn garbage_collect(&self) -> usize {
        let mut endpoints = self.endpoints.lock().unwrap();
        let idle: Vec<String> = endpoints
            .iter()
            .filter(|(_, endpoint)| endpoint.session_count() == 0)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &idle {
            if let Some(endpoint) = endpoints.remove(key) {
                endpoint.shutdown();
                info!("{}: endpoint released", key);
            }
        }
        if !idle.is_empty() {
            debug!("{} endpoint(s) remain", endpoints.len());
        }
        idle.len()
    }

    /// Drops the endpoint for `ip:port` whether or not sessions remain on it.
    pub fn remove_endpoint(&self, ip: &str, port: u16) -> bool {
        match self.endpoints.lock().unwrap().remove(&endpoint_key(ip, port)) {
            Some(endpoint) => {
                endpoint.shutdown();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let pool = EndpointPool::new(&RuntimeConfig::default());
        let a = pool.next_session_id();
        let b = pool.next_session_id();
        assert_ne!(a, b);
        assert!(pool.is_empty());
        assert_eq!(pool.garbage_collect(), 0);
        assert!(!pool.remove_endpoint("127.0.0.1", 50051));
    }

    #[test]
    fn keys() {
        assert_eq!(endpoint_key("10.0.0.1", 50051), "10.0.0.1:50051");
    }
}
