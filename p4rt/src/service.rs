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


//! Flattened entry points for a hosting controller.  Mutations return `bool`, reads return
//! rendered lines, and every failure is logged rather than returned.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::codec::{update, EntryCodec};
use crate::device::Device;
use crate::error::Result;
use crate::intent::{
    ActionProfileGroupIntent,
    ActionProfileMemberIntent,
    EntryKey,
    GroupKey,
    MemberKey,
    TableEntryIntent,
    UpdateIntent,
    UpdateKind,
};
use crate::registry::{load_pipeline, DeviceRegistry};
use crate::schema::SchemaIndex;

use proto::p4runtime::{entity, Update};

#[derive(Clone)]
pub struct P4Service {
    registry: Arc<DeviceRegistry>,
}

impl P4Service {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        P4Service { registry }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn add_node(
        &self,
        node_id: &str,
        ip: &str,
        port: u16,
        device_id: u64,
        p4info: Option<&Path>,
        device_config: Option<&Path>,
    ) -> bool {
        self.registry
            .add_device_from_files(node_id, ip, port, device_id, p4info, device_config)
            .is_some()
    }

    pub fn remove_node(&self, node_id: &str) -> bool {
        self.registry.remove_device(node_id)
    }

    /// Pushes the pipeline the node already holds.
    pub fn set_pipeline_config(&self, node_id: &str) -> bool {
        match self.registry.find_device(node_id) {
            Some(device) => log_failure(device.push_pipeline_config()),
            None => not_found(node_id),
        }
    }

    pub fn configure_device(
        &self,
        node_id: &str,
        ip: &str,
        port: u16,
        device_id: u64,
        p4info: Option<&Path>,
        device_config: Option<&Path>,
    ) -> bool {
        match load_pipeline(p4info, device_config) {
            Ok((schema, blob)) => self
                .registry
                .configure_device(node_id, ip, port, device_id, schema, blob)
                .is_some(),
            Err(e) => {
                warn!("{}: {}", node_id, e);
                false
            }
        }
    }

    /// The schema listing of the pipeline the target reports it is running.
    pub fn get_pipeline_config(&self, node_id: &str) -> Option<String> {
        let device = self.registry.find_device(node_id)?;
        match device.get_pipeline_config() {
            Ok(config) => config.p4info.map(|p4info| SchemaIndex::new(p4info).to_string()),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    pub fn query_nodes(&self) -> Vec<String> {
        self.registry.query_nodes()
    }

    fn configured(&self, node_id: &str) -> Option<Arc<Device>> {
        let device = self.registry.find_configured_device(node_id);
        if device.is_none() {
            warn!("{}: device not found or not configured", node_id);
        }
        device
    }

    fn write_one<F>(&self, node_id: &str, build: F) -> bool
    where
        F: FnOnce(&EntryCodec) -> Update,
    {
        match self.configured(node_id) {
            Some(device) => log_failure(device.write_with(|codec| vec![build(codec)])),
            None => false,
        }
    }

    fn read_rendered<F>(&self, node_id: &str, build: F) -> Option<Vec<String>>
    where
        F: FnOnce(&EntryCodec) -> proto::p4runtime::Entity,
    {
        let device = self.configured(node_id)?;
        match device.read_with(|codec| vec![build(codec)]) {
            Ok(lines) => Some(lines),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    pub fn add_table_entry(&self, node_id: &str, entry: &TableEntryIntent) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Insert, entity::Entity::TableEntry(codec.table_entry(entry)))
        })
    }

    pub fn modify_table_entry(&self, node_id: &str, entry: &TableEntryIntent) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Modify, entity::Entity::TableEntry(codec.table_entry(entry)))
        })
    }

    pub fn delete_table_entry(&self, node_id: &str, key: &EntryKey) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Delete, entity::Entity::TableEntry(codec.entry_key(key)))
        })
    }

    /// Entries of `table`, or of every table if `table` is empty.
    pub fn read_table_entry(&self, node_id: &str, table: &str) -> Option<Vec<String>> {
        self.read_rendered(node_id, |codec| codec.table_wildcard(table))
    }

    pub fn add_action_profile_member(&self, node_id: &str, member: &ActionProfileMemberIntent) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Insert, entity::Entity::ActionProfileMember(codec.member(member)))
        })
    }

    pub fn modify_action_profile_member(&self, node_id: &str, member: &ActionProfileMemberIntent) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Modify, entity::Entity::ActionProfileMember(codec.member(member)))
        })
    }

    pub fn delete_action_profile_member(&self, node_id: &str, key: &MemberKey) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Delete, entity::Entity::ActionProfileMember(codec.member_key(key)))
        })
    }

    pub fn read_action_profile_member(&self, node_id: &str, profile: &str) -> Option<Vec<String>> {
        self.read_rendered(node_id, |codec| codec.member_wildcard(profile))
    }

    pub fn add_action_profile_group(&self, node_id: &str, group: &ActionProfileGroupIntent) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Insert, entity::Entity::ActionProfileGroup(codec.group(group)))
        })
    }

    pub fn modify_action_profile_group(&self, node_id: &str, group: &ActionProfileGroupIntent) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Modify, entity::Entity::ActionProfileGroup(codec.group(group)))
        })
    }

    pub fn delete_action_profile_group(&self, node_id: &str, key: &GroupKey) -> bool {
        self.write_one(node_id, |codec| {
            update(UpdateKind::Delete, entity::Entity::ActionProfileGroup(codec.group_key(key)))
        })
    }

    pub fn read_action_profile_group(&self, node_id: &str, profile: &str) -> Option<Vec<String>> {
        self.read_rendered(node_id, |codec| codec.group_wildcard(profile))
    }

    /// Writes `updates` as a single batch.
    pub fn write_batch(&self, node_id: &str, updates: &[UpdateIntent]) -> bool {
        match self.configured(node_id) {
            Some(device) => log_failure(
                device.write_with(|codec| updates.iter().map(|u| codec.update(u)).collect()),
            ),
            None => false,
        }
    }

    pub fn transmit_packet(&self, node_id: &str, payload: &[u8]) -> bool {
        match self.registry.find_device(node_id) {
            Some(device) => log_failure(device.transmit_packet(payload.to_vec())),
            None => not_found(node_id),
        }
    }
}

fn log_failure(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

fn not_found(node_id: &str) -> bool {
    warn!("{}: no such device", node_id);
    false
}
