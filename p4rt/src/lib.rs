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


//! Client-side P4Runtime runtime.
//!
//! A [`DeviceRegistry`] owns the [`Device`]s a controller talks to.  Each device reaches its
//! target through a [`Connector`], which pairs a shared [`TransportEndpoint`] (one gRPC channel per
//! `ip:port`, handed out by the [`EndpointPool`]) with a per-device [`StreamSession`] carrying
//! mastership arbitration and packet I/O.  Table entries and action-profile members and groups are
//! described symbolically as intents and translated to and from wire messages by the
//! [`EntryCodec`], using the [`SchemaIndex`] built from the device's P4Info.
//!
//! [`P4Service`] is the flattened, sentinel-returning surface meant for a hosting controller.

pub mod channel;
pub mod codec;
pub mod config;
pub mod connector;
pub mod device;
pub mod error;
pub mod intent;
pub mod pool;
pub mod registry;
pub mod schema;
pub mod service;
pub mod stream;
pub mod value;

pub use channel::TransportEndpoint;
pub use codec::EntryCodec;
pub use config::RuntimeConfig;
pub use connector::Connector;
pub use device::{Device, State};
pub use error::{P4Error, Result};
pub use pool::EndpointPool;
pub use registry::DeviceRegistry;
pub use schema::SchemaIndex;
pub use service::P4Service;
pub use stream::{NotificationSink, StreamSession, Termination};
