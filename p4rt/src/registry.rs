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


//! The devices a controller manages, keyed by node id and by `ip:port:device_id`.
//!
//! Registry methods never fail outward: problems are logged and reported as `None` or `false`.
//! Lock order is registry, then pool, then endpoint.  Nothing blocks on the network while the
//! registry lock is held.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::connector::Connector;
use crate::device::Device;
use crate::error::{P4Error, Result};
use crate::pool::EndpointPool;
use crate::schema::SchemaIndex;
use crate::stream::{CloseHook, NotificationSink, Termination};

fn target_key(ip: &str, port: u16, device_id: u64) -> String {
    format!("{}:{}:{}", ip, port, device_id)
}

#[derive(Default)]
struct Devices {
    by_node: HashMap<String, Arc<Device>>,
    /// `ip:port:device_id` to node id.
    by_target: HashMap<String, String>,
}

impl Devices {
    fn check_unique(&self, node_id: &str, target: &str) -> Result<()> {
        if self.by_node.contains_key(node_id) {
            return Err(P4Error::DuplicateDevice(format!("node {} already exists", node_id)));
        }
        if let Some(other) = self.by_target.get(target) {
            return Err(P4Error::DuplicateDevice(format!("{} is already node {}", target, other)));
        }
        Ok(())
    }

    fn remove(&mut self, node_id: &str) -> Option<Arc<Device>> {
        let device = self.by_node.remove(node_id)?;
        self.by_target
            .remove(&target_key(device.ip(), device.port(), device.device_id()));
        Some(device)
    }
}

pub struct DeviceRegistry {
    me: Weak<DeviceRegistry>,
    pool: Arc<EndpointPool>,
    sink: Arc<dyn NotificationSink>,
    config: Arc<RuntimeConfig>,
    devices: Mutex<Devices>,
}

impl DeviceRegistry {
    pub fn new(
        pool: Arc<EndpointPool>,
        sink: Arc<dyn NotificationSink>,
        config: RuntimeConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| DeviceRegistry {
            me: me.clone(),
            pool,
            sink,
            config: Arc::new(config),
            devices: Mutex::new(Devices::default()),
        })
    }

    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Connects to a new device and registers it.  Fails, leaving the registry unchanged, if the
    /// node id or the `(ip, port, device_id)` triple is taken, or if the device does not connect.
    pub fn add_device(
        &self,
        node_id: &str,
        ip: &str,
        port: u16,
        device_id: u64,
        schema: Option<SchemaIndex>,
        blob: Option<Vec<u8>>,
    ) -> Option<Arc<Device>> {
        let target = target_key(ip, port, device_id);
        if let Err(e) = self.devices.lock().unwrap().check_unique(node_id, &target) {
            warn!("{}: {}", node_id, e);
            return None;
        }

        let connector = match Connector::open(
            &self.pool,
            node_id,
            ip,
            port,
            device_id,
            self.sink.clone(),
            self.close_hook(node_id),
        ) {
            Ok(connector) => connector,
            Err(e) => {
                warn!("{}: could not connect ({})", node_id, e);
                return None;
            }
        };
        let device = Arc::new(Device::new(node_id, ip, port, device_id, connector, self.config.clone()));
        if let Some(schema) = schema {
            device.set_schema(schema);
        }
        if let Some(blob) = blob {
            device.set_blob(blob);
        }
        if !device.connect() {
            self.discard(&device);
            return None;
        }

        {
            let mut devices = self.devices.lock().unwrap();
            // Someone may have added the same device while we were connecting.
            if let Err(e) = devices.check_unique(node_id, &target) {
                drop(devices);
                warn!("{}: {}", node_id, e);
                self.discard(&device);
                return None;
            }
            devices.by_node.insert(node_id.to_string(), device.clone());
            devices.by_target.insert(target, node_id.to_string());
        }

        // The stream may have ended after `connect` but before the device was visible to the
        // close hook.
        if !device.is_alive() {
            self.remove_terminated(node_id, device.connector().session_id(), Termination::Completed);
            return None;
        }
        info!("{}: device added", node_id);
        Some(device)
    }

    /// Like [`add_device`](Self::add_device), reading the P4Info and device config from files.
    pub fn add_device_from_files(
        &self,
        node_id: &str,
        ip: &str,
        port: u16,
        device_id: u64,
        p4info: Option<&Path>,
        device_config: Option<&Path>,
    ) -> Option<Arc<Device>> {
        match load_pipeline(p4info, device_config) {
            Ok((schema, blob)) => self.add_device(node_id, ip, port, device_id, schema, blob),
            Err(e) => {
                warn!("{}: {}", node_id, e);
                None
            }
        }
    }

    /// Gets or creates the device, installs whichever of `schema` and `blob` are given, and
    /// pushes the pipeline.  Returns the device only if it ends up configured.
    pub fn configure_device(
        &self,
        node_id: &str,
        ip: &str,
        port: u16,
        device_id: u64,
        schema: Option<SchemaIndex>,
        blob: Option<Vec<u8>>,
    ) -> Option<Arc<Device>> {
        let device = match self.find_device(node_id) {
            Some(device) => {
                if let Some(schema) = schema {
                    device.set_schema(schema);
                }
                if let Some(blob) = blob {
                    device.set_blob(blob);
                }
                device
            }
            None => self.add_device(node_id, ip, port, device_id, schema, blob)?,
        };
        match device.push_pipeline_config() {
            Ok(()) => Some(device),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    pub fn find_device(&self, node_id: &str) -> Option<Arc<Device>> {
        self.devices.lock().unwrap().by_node.get(node_id).cloned()
    }

    pub fn find_device_by_target(&self, ip: &str, port: u16, device_id: u64) -> Option<Arc<Device>> {
        let devices = self.devices.lock().unwrap();
        let node_id = devices.by_target.get(&target_key(ip, port, device_id))?;
        devices.by_node.get(node_id).cloned()
    }

    /// The device with `device_id` and the smallest node id, if there are several.
    pub fn find_device_by_device_id(&self, device_id: u64) -> Option<Arc<Device>> {
        self.devices
            .lock()
            .unwrap()
            .by_node
            .values()
            .filter(|d| d.device_id() == device_id)
            .min_by(|a, b| a.node_id().cmp(b.node_id()))
            .cloned()
    }

    pub fn find_configured_device(&self, node_id: &str) -> Option<Arc<Device>> {
        self.find_device(node_id).filter(|d| d.is_configured())
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.devices.lock().unwrap().by_node.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().unwrap().by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.lock().unwrap().by_node.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// One description line per device, ordered by node id.
    pub fn query_nodes(&self) -> Vec<String> {
        let mut devices: Vec<Arc<Device>> =
            self.devices.lock().unwrap().by_node.values().cloned().collect();
        devices.sort_by(|a, b| a.node_id().cmp(b.node_id()));
        devices.iter().map(|d| d.describe()).collect()
    }

    /// Shuts down the device's connector, releases idle endpoints, then deregisters it.  Returns
    /// whether the node existed, including when its stream's close hook deregistered it first.
    pub fn remove_device(&self, node_id: &str) -> bool {
        let device = match self.find_device(node_id) {
            Some(device) => device,
            None => {
                debug!("{}: no such device", node_id);
                return false;
            }
        };
        device.shutdown();
        self.pool.garbage_collect();

        {
            let mut devices = self.devices.lock().unwrap();
            // The node may have been re-added since; leave that device alone.
            if devices.by_node.get(node_id).map_or(false, |d| Arc::ptr_eq(d, &device)) {
                devices.remove(node_id);
            }
        }
        info!("{}: device removed", node_id);
        true
    }

    /// Handles the end of a stream session.  Only removes the device if it still uses that
    /// session, so a late termination cannot remove a device that was re-added since.
    fn remove_terminated(&self, node_id: &str, session_id: u64, termination: Termination) {
        let removed = {
            let mut devices = self.devices.lock().unwrap();
            let current = devices
                .by_node
                .get(node_id)
                .map_or(false, |d| d.connector().session_id() == session_id);
            if current {
                devices.remove(node_id)
            } else {
                None
            }
        };
        if let Some(device) = removed {
            device.shutdown();
            info!("{}: device removed after stream {}", node_id, termination);
        }
        self.pool.garbage_collect();
    }

    fn close_hook(&self, node_id: &str) -> CloseHook {
        let registry = self.me.clone();
        let node_id = node_id.to_string();
        Box::new(move |session_id, termination| {
            if let Some(registry) = registry.upgrade() {
                registry.remove_terminated(&node_id, session_id, termination);
            }
        })
    }

    fn discard(&self, device: &Device) {
        device.shutdown();
        self.pool.garbage_collect();
    }
}

/// Reads whichever of the P4Info and device config paths are given.
pub fn load_pipeline(
    p4info: Option<&Path>,
    device_config: Option<&Path>,
) -> Result<(Option<SchemaIndex>, Option<Vec<u8>>)> {
    let schema = p4info.map(SchemaIndex::from_file).transpose()?;
    let blob = device_config
        .map(|path| fs::read(path).map_err(|e| P4Error::io(path.display().to_string(), e)))
        .transpose()?;
    Ok((schema, blob))
}
