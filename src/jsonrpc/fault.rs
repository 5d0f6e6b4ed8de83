// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Request faults.
//!
//! Every failure the control protocol can report is a `RequestFault`: a kind,
//! a wire code, a message and the id of the request that caused it.
//! `RequestFault::to_response` is the only place a fault becomes a wire
//! response, so error responses always carry the same `jsonrpc`/`id`
//! conventions as success responses.

use thiserror::Error;

use crate::common::constants::jsonrpc;
use crate::jsonrpc::response::{ErrorObject, RequestId, Response};

/// Classification of a request fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Generic fault with a caller-chosen code
    Request,
    Parse,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
}

impl FaultKind {
    pub fn default_code(self) -> i32 {
        match self {
            FaultKind::Request | FaultKind::Internal => jsonrpc::ERROR_INTERNAL,
            FaultKind::Parse => jsonrpc::ERROR_PARSE,
            FaultKind::InvalidRequest => jsonrpc::ERROR_INVALID_REQUEST,
            FaultKind::MethodNotFound => jsonrpc::ERROR_METHOD_NOT_FOUND,
            FaultKind::InvalidParams => jsonrpc::ERROR_INVALID_PARAMS,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            FaultKind::Request => "request error",
            FaultKind::Parse => "parse error",
            FaultKind::InvalidRequest => "invalid request",
            FaultKind::MethodNotFound => "method not found",
            FaultKind::InvalidParams => "invalid params",
            FaultKind::Internal => "internal error",
        }
    }
}

/// A protocol fault raised while handling one request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct RequestFault {
    kind: FaultKind,
    code: i32,
    message: String,
    request_id: RequestId,
}

impl RequestFault {
    /// Generic fault. A `code` of 0 is rendered as an internal error.
    pub fn new(message: impl Into<String>, code: i32, request_id: impl Into<RequestId>) -> Self {
        Self {
            kind: FaultKind::Request,
            code,
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    /// Fault of a standard kind with its canonical code and message.
    pub fn of_kind(kind: FaultKind, request_id: impl Into<RequestId>) -> Self {
        Self {
            kind,
            code: kind.default_code(),
            message: kind.default_message().to_string(),
            request_id: request_id.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::of_kind(FaultKind::Parse, RequestId::Absent).with_message(message)
    }

    pub fn invalid_request(request_id: impl Into<RequestId>) -> Self {
        Self::of_kind(FaultKind::InvalidRequest, request_id)
    }

    pub fn method_not_found(request_id: impl Into<RequestId>) -> Self {
        Self::of_kind(FaultKind::MethodNotFound, request_id)
    }

    pub fn invalid_params(request_id: impl Into<RequestId>) -> Self {
        Self::of_kind(FaultKind::InvalidParams, request_id)
    }

    pub fn internal_error(request_id: impl Into<RequestId>) -> Self {
        Self::of_kind(FaultKind::Internal, request_id)
    }

    /// Replace the canonical message with diagnostic context.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<RequestId>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Raw code as constructed, before zero normalization.
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Code as it appears on the wire.
    pub fn wire_code(&self) -> i32 {
        if self.code == 0 {
            jsonrpc::ERROR_INTERNAL
        } else {
            self.code
        }
    }

    /// Render this fault as an error response.
    pub fn to_response(&self) -> Response {
        Response::failure(
            self.request_id,
            ErrorObject::new(self.wire_code(), self.message.clone()),
        )
    }
}
