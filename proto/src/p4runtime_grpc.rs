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


//! Client and server stubs for the `p4.v1.P4Runtime` service.  Messages travel with the prost
//! marshaller, so the stubs are maintained by hand alongside the message definitions.

use futures::Future;

use grpcio::{
    pr_de,
    pr_ser,
    CallOption,
    Channel,
    Client,
    ClientDuplexReceiver,
    ClientDuplexSender,
    ClientSStreamReceiver,
    DuplexSink,
    Marshaller,
    Method,
    MethodType,
    RequestStream,
    Result,
    RpcContext,
    ServerStreamingSink,
    Service,
    ServiceBuilder,
    UnarySink,
};

use crate::p4runtime::*;

macro_rules! p4runtime_method {
    ($name:ident, $ty:ident, $path:literal, $req:ty => $resp:ty) => {
        const $name: Method<$req, $resp> = Method {
            ty: MethodType::$ty,
            name: concat!("/p4.v1.P4Runtime/", $path),
            req_mar: Marshaller { ser: pr_ser, de: pr_de },
            resp_mar: Marshaller { ser: pr_ser, de: pr_de },
        };
    };
}

p4runtime_method!(WRITE, Unary, "Write", WriteRequest => WriteResponse);
p4runtime_method!(READ, ServerStreaming, "Read", ReadRequest => ReadResponse);
p4runtime_method!(
    SET_PIPELINE,
    Unary,
    "SetForwardingPipelineConfig",
    SetForwardingPipelineConfigRequest => SetForwardingPipelineConfigResponse
);
p4runtime_method!(
    GET_PIPELINE,
    Unary,
    "GetForwardingPipelineConfig",
    GetForwardingPipelineConfigRequest => GetForwardingPipelineConfigResponse
);
p4runtime_method!(STREAM_CHANNEL, Duplex, "StreamChannel", StreamMessageRequest => StreamMessageResponse);

/// Blocking unary calls plus the streaming calls, which hand back their sinks and receivers.
#[derive(Clone)]
pub struct P4RuntimeClient {
    client: Client,
}

impl P4RuntimeClient {
    pub fn new(channel: Channel) -> Self {
        P4RuntimeClient { client: Client::new(channel) }
    }

    pub fn write(&self, req: &WriteRequest) -> Result<WriteResponse> {
        self.client.unary_call(&WRITE, req, CallOption::default())
    }

    pub fn read(&self, req: &ReadRequest) -> Result<ClientSStreamReceiver<ReadResponse>> {
        self.client.server_streaming(&READ, req, CallOption::default())
    }

    pub fn set_forwarding_pipeline_config(
        &self,
        req: &SetForwardingPipelineConfigRequest,
    ) -> Result<SetForwardingPipelineConfigResponse> {
        self.client.unary_call(&SET_PIPELINE, req, CallOption::default())
    }

    pub fn get_forwarding_pipeline_config(
        &self,
        req: &GetForwardingPipelineConfigRequest,
    ) -> Result<GetForwardingPipelineConfigResponse> {
        self.client.unary_call(&GET_PIPELINE, req, CallOption::default())
    }

    pub fn stream_channel(
        &self,
    ) -> Result<(ClientDuplexSender<StreamMessageRequest>, ClientDuplexReceiver<StreamMessageResponse>)> {
        self.client.duplex_streaming(&STREAM_CHANNEL, CallOption::default())
    }

    /// Runs `f` on the channel's completion queues.
    pub fn spawn<F>(&self, f: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.client.spawn(f)
    }
}

/// Server side of the service, for targets (and test doubles of them).
pub trait P4Runtime {
    fn write(&mut self, ctx: RpcContext, req: WriteRequest, sink: UnarySink<WriteResponse>);
    fn read(&mut self, ctx: RpcContext, req: ReadRequest, sink: ServerStreamingSink<ReadResponse>);
    fn set_forwarding_pipeline_config(
        &mut self,
        ctx: RpcContext,
        req: SetForwardingPipelineConfigRequest,
        sink: UnarySink<SetForwardingPipelineConfigResponse>,
    );
    fn get_forwarding_pipeline_config(
        &mut self,
        ctx: RpcContext,
        req: GetForwardingPipelineConfigRequest,
        sink: UnarySink<GetForwardingPipelineConfigResponse>,
    );
    fn stream_channel(
        &mut self,
        ctx: RpcContext,
        stream: RequestStream<StreamMessageRequest>,
        sink: DuplexSink<StreamMessageResponse>,
    );
}

/// Every handler gets its own clone of `s`.
pub fn create_p4_runtime<S: P4Runtime + Send + Clone + 'static>(s: S) -> Service {
    let (mut write, mut read, mut set, mut get) = (s.clone(), s.clone(), s.clone(), s.clone());
    let mut stream = s;
    ServiceBuilder::new()
        .add_unary_handler(&WRITE, move |ctx, req, sink| write.write(ctx, req, sink))
        .add_server_streaming_handler(&READ, move |ctx, req, sink| read.read(ctx, req, sink))
        .add_unary_handler(&SET_PIPELINE, move |ctx, req, sink| {
            set.set_forwarding_pipeline_config(ctx, req, sink)
        })
        .add_unary_handler(&GET_PIPELINE, move |ctx, req, sink| {
            get.get_forwarding_pipeline_config(ctx, req, sink)
        })
        .add_duplex_streaming_handler(&STREAM_CHANNEL, move |ctx, req, sink| {
            stream.stream_channel(ctx, req, sink)
        })
        .build()
}
