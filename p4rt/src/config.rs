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


//! Runtime settings and device inventories, both read from JSON.

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{P4Error, Result};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How long a new endpoint may take to become ready before it is given up on.
    pub connect_timeout_ms: u64,

    /// How long a freshly opened stream must survive for `connect` to succeed.
    pub stream_grace_ms: u64,

    pub election_id: u64,
    pub role_id: u64,

    /// gRPC completion queues, shared by every endpoint in a pool.
    pub completion_queues: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            connect_timeout_ms: 3000,
            stream_grace_ms: 1000,
            election_id: 1,
            role_id: 0,
            completion_queues: 1,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(s).map_err(|e| P4Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|e| P4Error::io(path.display().to_string(), e))?;
        Self::from_json(&s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.completion_queues == 0 {
            return Err(P4Error::Config("completion_queues must be at least 1".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(P4Error::Config("connect_timeout_ms must not be zero".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn stream_grace(&self) -> Duration {
        Duration::from_millis(self.stream_grace_ms)
    }
}

/// One device to add, as listed in an inventory file.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceSpec {
    pub node_id: String,
    pub ip: String,
    pub port: u16,
    pub device_id: u64,
    #[serde(default)]
    pub p4info: Option<PathBuf>,
    #[serde(default)]
    pub device_config: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Inventory {
    pub devices: Vec<DeviceSpec>,
}

impl Inventory {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|e| P4Error::io(path.display().to_string(), e))?;
        serde_json::from_str(&s)
            .map_err(|e| P4Error::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.stream_grace(), Duration::from_secs(1));
        assert_eq!(config.election_id, 1);
        assert_eq!(config.role_id, 0);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = RuntimeConfig::from_json(r#"{"stream_grace_ms": 250, "election_id": 7}"#).unwrap();
        assert_eq!(config.stream_grace_ms, 250);
        assert_eq!(config.election_id, 7);
        assert_eq!(config.connect_timeout_ms, 3000);
        assert_eq!(config.completion_queues, 1);
    }

    #[test]
    fn unknown_and_invalid_settings_are_rejected() {
        assert!(matches!(RuntimeConfig::from_json(r#"{"grace": 1}"#), Err(P4Error::Config(_))));
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"completion_queues": 0}"#),
            Err(P4Error::Config(_))
        ));
        assert!(matches!(RuntimeConfig::from_json("not json"), Err(P4Error::Config(_))));
    }

    #[test]
    fn inventory_paths_are_optional() {
        let inventory: Inventory = serde_json::from_str(
            r#"{"devices": [
                {"node_id": "s1", "ip": "10.0.0.1", "port": 50051, "device_id": 0},
                {"node_id": "s2", "ip": "10.0.0.2", "port": 50051, "device_id": 1,
                 "p4info": "s2.p4info.bin", "device_config": "s2.json"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(inventory.devices.len(), 2);
        assert_eq!(inventory.devices[0].p4info, None);
        assert_eq!(inventory.devices[1].device_config, Some(PathBuf::from("s2.json")));
    }
}
