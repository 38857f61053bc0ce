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


//! A P4Runtime target as the controller sees it: identity, pipeline and connection state.

use futures::TryStreamExt;

use proto::p4runtime::{
    get_forwarding_pipeline_config_request::ResponseType,
    set_forwarding_pipeline_config_request,
    Entity,
    ForwardingPipelineConfig,
    GetForwardingPipelineConfigRequest,
    ReadRequest,
    SetForwardingPipelineConfigRequest,
    Uint128,
    Update,
    WriteRequest,
};

use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::codec::EntryCodec;
use crate::config::RuntimeConfig;
use crate::connector::Connector;
use crate::error::{P4Error, Result};
use crate::schema::SchemaIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Unknown,
    Connected,
    /// The current P4Info and device config have been pushed to the target.
    Configured,
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Unknown => "Unknown",
            State::Connected => "Connected",
            State::Configured => "Configured",
        };
        write!(f, "{}", s)
    }
}

struct Pipeline {
    schema: Option<Arc<SchemaIndex>>,
    blob: Option<Arc<Vec<u8>>>,
    state: State,
}

impl Pipeline {
    /// New pipeline input invalidates whatever was pushed before.
    fn touch(&mut self) {
        if self.state != State::Unknown {
            self.state = State::Connected;
        }
    }
}

pub struct Device {
    node_id: String,
    ip: String,
    port: u16,
    device_id: u64,
    connector: Connector,
    config: Arc<RuntimeConfig>,
    pipeline: Mutex<Pipeline>,
}

impl Device {
    pub fn new(
        node_id: &str,
        ip: &str,
        port: u16,
        device_id: u64,
        connector: Connector,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        Device {
            node_id: node_id.to_string(),
            ip: ip.to_string(),
            port,
            device_id,
            connector,
            config,
            pipeline: Mutex::new(Pipeline { schema: None, blob: None, state: State::Unknown }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn state(&self) -> State {
        self.pipeline.lock().unwrap().state
    }

    pub fn is_configured(&self) -> bool {
        self.state() == State::Configured
    }

    pub fn schema(&self) -> Option<Arc<SchemaIndex>> {
        self.pipeline.lock().unwrap().schema.clone()
    }

    pub fn set_schema(&self, schema: SchemaIndex) {
        let mut pipeline = self.pipeline.lock().unwrap();
        pipeline.schema = Some(Arc::new(schema));
        pipeline.touch();
    }

    pub fn set_blob(&self, blob: Vec<u8>) {
        let mut pipeline = self.pipeline.lock().unwrap();
        pipeline.blob = Some(Arc::new(blob));
        pipeline.touch();
    }

    fn election_id(&self) -> Option<Uint128> {
        Some(Uint128 { high: 0, low: self.config.election_id })
    }

    /// Sends a mastership arbitration update and reports whether the stream survives the grace
    /// interval.  A device that connects moves from `Unknown` to `Connected`.
    pub fn connect(&self) -> bool {
        let session = self.connector.session();
        if let Err(e) = session.arbitrate(self.config.election_id) {
            warn!("{}: arbitration failed ({})", self.node_id, e);
            return false;
        }
        if !session.alive_after(self.config.stream_grace()) {
            warn!("{}: stream closed during arbitration", self.node_id);
            return false;
        }
        let mut pipeline = self.pipeline.lock().unwrap();
        if pipeline.state == State::Unknown {
            pipeline.state = State::Connected;
        }
        info!("{}: connected to {}:{} as device {}", self.node_id, self.ip, self.port, self.device_id);
        true
    }

    pub fn is_alive(&self) -> bool {
        self.connector.session().is_alive()
    }

    /// Pushes the current P4Info and device config with VERIFY_AND_COMMIT.  On failure the state
    /// is left as it was.
    pub fn push_pipeline_config(&self) -> Result<()> {
        let (schema, blob) = {
            let pipeline = self.pipeline.lock().unwrap();
            match (&pipeline.schema, &pipeline.blob) {
                (Some(schema), Some(blob)) => (schema.clone(), blob.clone()),
                _ => return Err(P4Error::MissingPipeline(self.node_id.clone())),
            }
        };

        let request = SetForwardingPipelineConfigRequest {
            device_id: self.device_id,
            role_id: self.config.role_id,
            election_id: self.election_id(),
            action: set_forwarding_pipeline_config_request::Action::VerifyAndCommit as i32,
            config: Some(ForwardingPipelineConfig {
                p4info: Some(schema.p4info().clone()),
                p4_device_config: blob.as_ref().clone(),
                cookie: None,
            }),
        };
        self.connector
            .client()
            .set_forwarding_pipeline_config(&request)
            .map_err(|e| P4Error::rpc(format!("{}: failed to set forwarding pipeline", self.node_id), e))?;

        let mut pipeline = self.pipeline.lock().unwrap();
        // Only mark configured if nobody swapped the pipeline while the push was in flight.
        let unchanged = pipeline.schema.as_ref().map_or(false, |s| Arc::ptr_eq(s, &schema))
            && pipeline.blob.as_ref().map_or(false, |b| Arc::ptr_eq(b, &blob));
        if unchanged {
            pipeline.state = State::Configured;
            info!("{}: pipeline configured", self.node_id);
        }
        Ok(())
    }

    /// Fetches the P4Info and cookie the target is running.
    pub fn get_pipeline_config(&self) -> Result<ForwardingPipelineConfig> {
        let request = GetForwardingPipelineConfigRequest {
            device_id: self.device_id,
            response_type: ResponseType::P4infoAndCookie as i32,
        };
        let response = self
            .connector
            .client()
            .get_forwarding_pipeline_config(&request)
            .map_err(|e| {
                P4Error::rpc(format!("{}: failed to retrieve forwarding pipeline", self.node_id), e)
            })?;
        match response.config {
            Some(config) if config.p4info.is_some() => Ok(config),
            _ => Err(P4Error::MissingPipeline(self.node_id.clone())),
        }
    }

    fn configured_schema(&self) -> Result<Arc<SchemaIndex>> {
        let pipeline = self.pipeline.lock().unwrap();
        match (&pipeline.schema, pipeline.state) {
            (Some(schema), State::Configured) => Ok(schema.clone()),
            _ => Err(P4Error::NotConfigured(self.node_id.clone())),
        }
    }

    /// Sends `updates` in one `Write`.  They succeed or fail together.
    pub fn write(&self, updates: Vec<Update>) -> Result<()> {
        self.configured_schema()?;
        let request = WriteRequest {
            device_id: self.device_id,
            role_id: self.config.role_id,
            election_id: self.election_id(),
            updates,
            ..Default::default()
        };
        debug!("{}: writing {} update(s)", self.node_id, request.updates.len());
        self.connector
            .client()
            .write(&request)
            .map_err(|e| P4Error::rpc(format!("{}: failed to write request", self.node_id), e))?;
        Ok(())
    }

    /// Reads `entities`, collecting responses up to and including the first one marked
    /// `complete`.  Does not wait for the stream itself to end.
    pub fn read(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        self.configured_schema()?;
        let request = ReadRequest { device_id: self.device_id, entities };
        let mut responses = self
            .connector
            .client()
            .read(&request)
            .map_err(|e| P4Error::rpc(format!("{}: failed to read request", self.node_id), e))?;

        futures::executor::block_on(async {
            let mut entities = Vec::new();
            loop {
                match responses.try_next().await {
                    Ok(Some(response)) => {
                        entities.extend(response.entities);
                        if response.complete {
                            return Ok(entities);
                        }
                    }
                    Ok(None) => {
                        debug!("{}: read stream ended without a complete response", self.node_id);
                        return Ok(entities);
                    }
                    Err(e) => {
                        return Err(P4Error::rpc(
                            format!("{}: received invalid response", self.node_id),
                            e,
                        ))
                    }
                }
            }
        })
    }

    /// Encodes with the device's schema and writes the result.
    pub fn write_with<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(&EntryCodec) -> Vec<Update>,
    {
        let schema = self.configured_schema()?;
        let updates = build(&EntryCodec::new(&schema));
        self.write(updates)
    }

    /// Reads with entities built from the device's schema and renders what comes back.
    pub fn read_with<F>(&self, build: F) -> Result<Vec<String>>
    where
        F: FnOnce(&EntryCodec) -> Vec<Entity>,
    {
        let schema = self.configured_schema()?;
        let codec = EntryCodec::new(&schema);
        let entities = self.read(build(&codec))?;
        Ok(entities.iter().map(|e| codec.render_entity(e)).collect())
    }

    /// Sends `payload` as a packet-out without waiting for anything.
    pub fn transmit_packet(&self, payload: Vec<u8>) -> Result<()> {
        self.connector.session().packet_out(payload)
    }

    pub fn shutdown(&self) {
        self.connector.shutdown();
    }

    /// `nodeId = n deviceId = d ip = i port = p configured = State.`
    pub fn describe(&self) -> String {
        format!(
            "nodeId = {} deviceId = {} ip = {} port = {} configured = {}.",
            self.node_id,
            self.device_id,
            self.ip,
            self.port,
            self.state()
        )
    }
}
