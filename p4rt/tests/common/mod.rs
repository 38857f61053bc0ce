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


//! An in-process P4Runtime target for exercising the runtime end to end.

#![allow(dead_code)]

use anyhow::{anyhow, Result};

use futures::channel::mpsc::{self, UnboundedSender};
use futures::{FutureExt, SinkExt, StreamExt, TryFutureExt};

use grpcio::{
    DuplexSink,
    EnvBuilder,
    RequestStream,
    RpcContext,
    RpcStatus,
    RpcStatusCode,
    Server,
    ServerBuilder,
    ServerCredentials,
    ServerStreamingSink,
    UnarySink,
    WriteFlags,
};

use p4rt::config::RuntimeConfig;
use p4rt::intent::{ActionIntent, MatchIntent, ParamValue, TableEntryIntent};
use p4rt::{Device, DeviceRegistry, EndpointPool, NotificationSink, P4Service, SchemaIndex};

use proto::p4info::{self, match_field, P4Info};
use proto::p4runtime::{
    stream_message_request,
    stream_message_response,
    ForwardingPipelineConfig,
    GetForwardingPipelineConfigRequest,
    GetForwardingPipelineConfigResponse,
    MasterArbitrationUpdate,
    PacketIn,
    PacketOut,
    ReadRequest,
    ReadResponse,
    SetForwardingPipelineConfigRequest,
    SetForwardingPipelineConfigResponse,
    StreamMessageRequest,
    StreamMessageResponse,
    WriteRequest,
    WriteResponse,
};
use proto::p4runtime_grpc::{create_p4_runtime, P4Runtime};

use std::sync::{Arc, Mutex};

use tracing::error;

pub enum Completion<T> {
    Incomplete,
    Complete(T),
}
pub use Completion::*;

/// Repeatedly evaluates `condition`, sleeping a bit between calls, until it yields
/// Complete(value), then returns Ok(value).  After a while, however, give up and return an error
/// instead.
pub fn wait_until<T, F>(mut condition: F) -> Result<T>
where
    F: FnMut() -> Completion<T>,
{
    for i in 0..10 {
        if let Complete(result) = condition() {
            return Ok(result);
        }

        // Most conditions become true quickly, so only back off after a few tries.
        let ms = match i {
            0 => 10,
            1 => 100,
            _ => 1000,
        };
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }
    Err(anyhow!("wait_until timed out"))
}

pub const BLOB: &[u8] = b"{\"program\": \"fixture.p4\"}";

fn preamble(id: u32, name: &str) -> Option<p4info::Preamble> {
    Some(p4info::Preamble { id, name: name.into(), ..Default::default() })
}

/// `t1` (exact `f1`, 8 bits) with `a1(p1: bit<8>)`, and `fwd(port: bit<9>)` in action profile
/// `ap1`.
pub fn fixture_p4info() -> P4Info {
    P4Info {
        tables: vec![p4info::Table {
            preamble: preamble(1, "t1"),
            match_fields: vec![p4info::MatchField {
                id: 1,
                name: "f1".into(),
                bitwidth: 8,
                match_type: match_field::MatchType::Exact as i32,
                ..Default::default()
            }],
            action_refs: vec![p4info::ActionRef { id: 1, ..Default::default() }],
            ..Default::default()
        }],
        actions: vec![
            p4info::Action {
                preamble: preamble(1, "a1"),
                params: vec![p4info::action::Param {
                    id: 1,
                    name: "p1".into(),
                    bitwidth: 8,
                    ..Default::default()
                }],
            },
            p4info::Action {
                preamble: preamble(2, "fwd"),
                params: vec![p4info::action::Param {
                    id: 1,
                    name: "port".into(),
                    bitwidth: 9,
                    ..Default::default()
                }],
            },
        ],
        action_profiles: vec![p4info::ActionProfile {
            preamble: preamble(7, "ap1"),
            with_selector: true,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn fixture_schema() -> SchemaIndex {
    SchemaIndex::new(fixture_p4info())
}

pub fn exact_entry(f1: &str, p1: &str) -> TableEntryIntent {
    TableEntryIntent {
        table: "t1".into(),
        matches: vec![MatchIntent::Exact { field: "f1".into(), value: f1.into() }],
        action: Some(ActionIntent::Direct { name: "a1".into(), params: vec![ParamValue::new("p1", p1)] }),
        priority: 0,
    }
}

pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        connect_timeout_ms: 2000,
        stream_grace_ms: 200,
        ..Default::default()
    }
}

pub enum Injection {
    Packet(Vec<u8>),
    Close,
}

#[derive(Default)]
pub struct TargetState {
    pub pipelines: Vec<SetForwardingPipelineConfigRequest>,
    pub writes: Vec<WriteRequest>,
    pub reads: Vec<ReadRequest>,
    pub arbitrations: Vec<MasterArbitrationUpdate>,
    pub packets_out: Vec<PacketOut>,
    pub read_responses: Vec<ReadResponse>,
    pub hold_reads: bool,
    pub fail_pipeline: bool,
    pub fail_writes: bool,
    /// Keep streams open after the client half-closes them.
    pub ignore_half_close: bool,
    streams: Vec<UnboundedSender<Injection>>,
    held_reads: Vec<ServerStreamingSink<ReadResponse>>,
}

#[derive(Clone, Default)]
pub struct FakeTarget {
    state: Arc<Mutex<TargetState>>,
}

fn unary_fail<T>(ctx: &RpcContext, sink: UnarySink<T>, status: RpcStatus) {
    let f = sink
        .fail(status)
        .map_err(|e| error!("failed to send error: {:?}", e))
        .map(|_| ());
    ctx.spawn(f);
}

fn unary_success<T>(ctx: &RpcContext, sink: UnarySink<T>, reply: T) {
    let f = sink
        .success(reply)
        .map_err(|e: grpcio::Error| error!("reply failed: {:?}", e))
        .map(|_| ());
    ctx.spawn(f);
}

enum Incoming {
    Request(grpcio::Result<StreamMessageRequest>),
    RequestsDone,
    Inject(Injection),
}

impl P4Runtime for FakeTarget {
    fn write(&mut self, ctx: RpcContext, req: WriteRequest, sink: UnarySink<WriteResponse>) {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.writes.push(req);
            state.fail_writes
        };
        if fail {
            unary_fail(&ctx, sink, RpcStatus::new(RpcStatusCode::INVALID_ARGUMENT));
        } else {
            unary_success(&ctx, sink, WriteResponse::default());
        }
    }

    fn read(&mut self, ctx: RpcContext, req: ReadRequest, mut sink: ServerStreamingSink<ReadResponse>) {
        let (responses, hold) = {
            let mut state = self.state.lock().unwrap();
            state.reads.push(req);
            (state.read_responses.clone(), state.hold_reads)
        };
        let state = self.state.clone();
        let f = async move {
            for response in responses {
                sink.send((response, WriteFlags::default())).await?;
            }
            if hold {
                // Keep the call open so only the `complete` flag can end the read.
                state.lock().unwrap().held_reads.push(sink);
            } else {
                sink.close().await?;
            }
            Ok(())
        }
        .map_err(|e: grpcio::Error| error!("read failed: {:?}", e))
        .map(|_| ());
        ctx.spawn(f);
    }

    fn set_forwarding_pipeline_config(
        &mut self,
        ctx: RpcContext,
        req: SetForwardingPipelineConfigRequest,
        sink: UnarySink<SetForwardingPipelineConfigResponse>,
    ) {
        let fail = {
            let mut state = self.state.lock().unwrap();
            let fail = state.fail_pipeline;
            if !fail {
                state.pipelines.push(req);
            }
            fail
        };
        if fail {
            unary_fail(&ctx, sink, RpcStatus::new(RpcStatusCode::INVALID_ARGUMENT));
        } else {
            unary_success(&ctx, sink, SetForwardingPipelineConfigResponse::default());
        }
    }

    fn get_forwarding_pipeline_config(
        &mut self,
        ctx: RpcContext,
        _req: GetForwardingPipelineConfigRequest,
        sink: UnarySink<GetForwardingPipelineConfigResponse>,
    ) {
        let config = self
            .state
            .lock()
            .unwrap()
            .pipelines
            .last()
            .and_then(|p| p.config.clone());
        match config {
            Some(config) => unary_success(
                &ctx,
                sink,
                GetForwardingPipelineConfigResponse {
                    config: Some(ForwardingPipelineConfig {
                        p4info: config.p4info,
                        p4_device_config: Vec::new(),
                        cookie: config.cookie,
                    }),
                },
            ),
            None => unary_fail(&ctx, sink, RpcStatus::new(RpcStatusCode::FAILED_PRECONDITION)),
        }
    }

    fn stream_channel(
        &mut self,
        ctx: RpcContext,
        stream: RequestStream<StreamMessageRequest>,
        mut sink: DuplexSink<StreamMessageResponse>,
    ) {
        let (tx, rx) = mpsc::unbounded();
        self.state.lock().unwrap().streams.push(tx);

        let requests = stream
            .map(Incoming::Request)
            .chain(futures::stream::once(async { Incoming::RequestsDone }));
        let mut incoming = Box::pin(futures::stream::select(requests, rx.map(Incoming::Inject)));
        let state = self.state.clone();
        let f = async move {
            while let Some(item) = incoming.next().await {
                let reply = match item {
                    Incoming::Request(request) => match request?.update {
                        Some(stream_message_request::Update::Arbitration(a)) => {
                            state.lock().unwrap().arbitrations.push(a.clone());
                            stream_message_response::Update::Arbitration(a)
                        }
                        Some(stream_message_request::Update::Packet(p)) => {
                            state.lock().unwrap().packets_out.push(p);
                            continue;
                        }
                        None => continue,
                    },
                    Incoming::Inject(Injection::Packet(payload)) => {
                        stream_message_response::Update::Packet(PacketIn { payload, metadata: Vec::new() })
                    }
                    Incoming::RequestsDone => {
                        let ignore = state.lock().unwrap().ignore_half_close;
                        if ignore {
                            continue;
                        }
                        break;
                    }
                    Incoming::Inject(Injection::Close) => break,
                };
                sink.send((StreamMessageResponse { update: Some(reply) }, WriteFlags::default()))
                    .await?;
            }
            sink.close().await?;
            Ok(())
        }
        .map_err(|e: grpcio::Error| error!("stream_channel failed: {:?}", e))
        .map(|_| ());
        ctx.spawn(f)
    }
}

impl FakeTarget {
    pub fn with_state<R, F: FnOnce(&mut TargetState) -> R>(&self, f: F) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn pipelines(&self) -> Vec<SetForwardingPipelineConfigRequest> {
        self.with_state(|s| s.pipelines.clone())
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.with_state(|s| s.writes.clone())
    }

    pub fn reads(&self) -> Vec<ReadRequest> {
        self.with_state(|s| s.reads.clone())
    }

    pub fn arbitrations(&self) -> Vec<MasterArbitrationUpdate> {
        self.with_state(|s| s.arbitrations.clone())
    }

    pub fn packets_out(&self) -> Vec<PacketOut> {
        self.with_state(|s| s.packets_out.clone())
    }

    fn inject(&self, make: impl Fn() -> Injection) {
        self.with_state(|s| s.streams.retain(|tx| tx.unbounded_send(make()).is_ok()));
    }

    /// Sends a packet-in on every open stream.
    pub fn inject_packet(&self, payload: &[u8]) {
        self.inject(|| Injection::Packet(payload.to_vec()));
    }

    /// Ends every open stream with an OK status.
    pub fn close_streams(&self) {
        self.inject(|| Injection::Close);
    }
}

/// Dropping the server cancels whatever calls are still open, including held reads.
pub struct TargetServer {
    server: Server,
    pub port: u16,
    pub target: FakeTarget,
}

impl TargetServer {
    pub fn start() -> Result<Self> {
        let target = FakeTarget::default();
        let env = Arc::new(EnvBuilder::new().name_prefix("fake-target").build());
        let mut server = ServerBuilder::new(env)
            .register_service(create_p4_runtime(target.clone()))
            .build()?;
        let port = server.add_listening_port("127.0.0.1:0", ServerCredentials::insecure())?;
        server.start();
        Ok(TargetServer { server, port, target })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    packets: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingSink {
    pub fn packets(&self) -> Vec<(String, Vec<u8>)> {
        self.packets.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, node_id: &str, payload: &[u8]) {
        self.packets.lock().unwrap().push((node_id.to_string(), payload.to_vec()));
    }
}

/// A fake target plus a registry and service pointed at it.
pub struct Harness {
    pub server: TargetServer,
    pub sink: Arc<RecordingSink>,
    pub registry: Arc<DeviceRegistry>,
    pub service: P4Service,
}

pub const LOCALHOST: &str = "127.0.0.1";

impl Harness {
    pub fn new() -> Result<Self> {
        let server = TargetServer::start()?;
        let config = test_config();
        let sink = Arc::new(RecordingSink::default());
        let pool = Arc::new(EndpointPool::new(&config));
        let registry = DeviceRegistry::new(pool, sink.clone(), config);
        let service = P4Service::new(registry.clone());
        Ok(Harness { server, sink, registry, service })
    }

    pub fn port(&self) -> u16 {
        self.server.port
    }

    pub fn target(&self) -> &FakeTarget {
        &self.server.target
    }

    pub fn add(&self, node_id: &str, device_id: u64) -> Result<Arc<Device>> {
        self.registry
            .add_device(node_id, LOCALHOST, self.port(), device_id, None, None)
            .ok_or_else(|| anyhow!("{}: add_device failed", node_id))
    }

    pub fn add_with_pipeline(&self, node_id: &str, device_id: u64) -> Result<Arc<Device>> {
        self.registry
            .add_device(
                node_id,
                LOCALHOST,
                self.port(),
                device_id,
                Some(fixture_schema()),
                Some(BLOB.to_vec()),
            )
            .ok_or_else(|| anyhow!("{}: add_device failed", node_id))
    }

    pub fn configured(&self, node_id: &str, device_id: u64) -> Result<Arc<Device>> {
        self.registry
            .configure_device(
                node_id,
                LOCALHOST,
                self.port(),
                device_id,
                Some(fixture_schema()),
                Some(BLOB.to_vec()),
            )
            .ok_or_else(|| anyhow!("{}: configure_device failed", node_id))
    }
}
