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

//! Outbound JSON-RPC 2.0 messages: responses and notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::constants::jsonrpc;

/// Id of a request. `Absent` stands for a missing or `null` id and is
/// rendered as an explicit `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "Option<i64>")]
pub enum RequestId {
    #[default]
    Absent,
    Number(i64),
}

impl RequestId {
    pub fn as_i64(self) -> Option<i64> {
        match self {
            RequestId::Absent => None,
            RequestId::Number(n) => Some(n),
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, RequestId::Absent)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl From<Option<i64>> for RequestId {
    fn from(id: Option<i64>) -> Self {
        id.map_or(RequestId::Absent, RequestId::Number)
    }
}

impl From<RequestId> for Option<i64> {
    fn from(id: RequestId) -> Self {
        id.as_i64()
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Either the result or the error of a response; never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc::VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// Raw error response. Prefer `RequestFault::to_response`, which
    /// normalizes the code.
    pub fn failure(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: jsonrpc::VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorObject> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(err) => Some(err),
        }
    }
}

/// Unsolicited server-to-client message. Carries no `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc::VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}
