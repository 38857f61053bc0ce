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


use thiserror::Error;

/// Errors from device, connector and transport operations.
///
/// The registry and service layers log these and turn them into `None`/`false`.
#[derive(Debug, Error)]
pub enum P4Error {
    #[error("could not load P4Info: {0}")]
    SchemaLoad(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}: device is not configured")]
    NotConfigured(String),

    #[error("{0}: P4Info and device config are both required to push a pipeline")]
    MissingPipeline(String),

    #[error("{context}: {source}")]
    Rpc {
        context: String,
        #[source]
        source: grpcio::Error,
    },

    #[error("{0}: endpoint did not become ready")]
    EndpointUnavailable(String),

    #[error("duplicate device: {0}")]
    DuplicateDevice(String),

    #[error("stream session {0} is closed")]
    SessionClosed(u64),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl P4Error {
    pub(crate) fn rpc<S: Into<String>>(context: S, source: grpcio::Error) -> Self {
        P4Error::Rpc { context: context.into(), source }
    }

    pub(crate) fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        P4Error::Io { context: context.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, P4Error>;
