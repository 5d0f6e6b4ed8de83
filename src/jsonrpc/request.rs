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

//! Inbound JSON-RPC 2.0 requests.
//!
//! Parameters are a flat map keyed by name. Positional (array) parameters
//! are not supported.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::common::constants::jsonrpc;
use crate::jsonrpc::fault::RequestFault;
use crate::jsonrpc::response::{RequestId, Response};

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    pub params: Map<String, Value>,
    document: Value,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Map<String, Value>) -> Self {
        let id = id.into();
        let method = method.into();
        let document = serde_json::json!({
            "jsonrpc": jsonrpc::VERSION,
            "id": id,
            "method": method,
            "params": Value::Object(params.clone()),
        });
        Self {
            id,
            method,
            params,
            document,
        }
    }

    /// Parse one request from raw text.
    pub fn parse(raw: &str) -> Result<Self, RequestFault> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|e| RequestFault::parse_error(format!("parse error: {}", e)))?;
        Self::from_document(document)
    }

    /// Validate an already decoded JSON document as a request.
    pub fn from_document(document: Value) -> Result<Self, RequestFault> {
        let Some(object) = document.as_object() else {
            return Err(RequestFault::invalid_request(RequestId::Absent)
                .with_message("request must be a JSON object"));
        };

        let id = match object.get("id") {
            None | Some(Value::Null) => RequestId::Absent,
            Some(value) => match value.as_i64() {
                Some(n) => RequestId::Number(n),
                None => {
                    return Err(RequestFault::invalid_request(RequestId::Absent)
                        .with_message("id must be an integer or null"))
                }
            },
        };

        if let Some(version) = object.get("jsonrpc") {
            if version.as_str() != Some(jsonrpc::VERSION) {
                return Err(RequestFault::invalid_request(id)
                    .with_message("unsupported jsonrpc version"));
            }
        }

        let method = match object.get("method").and_then(Value::as_str) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => {
                return Err(RequestFault::invalid_request(id).with_message("method missing"));
            }
        };

        let params = match object.get("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(RequestFault::invalid_params(id)
                    .with_message("params must be an object"));
            }
        };

        Ok(Self {
            id,
            method,
            params,
            document,
        })
    }

    /// The parsed document this request was built from.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// A call without an id expects no success response.
    pub fn is_notification(&self) -> bool {
        self.id.is_absent()
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn param(&self, key: &str) -> Result<&Value, RequestFault> {
        self.params.get(key).ok_or_else(|| {
            RequestFault::invalid_params(self.id).with_message(format!("{} missing", key))
        })
    }

    pub fn param_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, RequestFault> {
        let value = self.param(key)?;
        T::deserialize(value).map_err(|_| {
            RequestFault::invalid_params(self.id).with_message(format!("{} has invalid type", key))
        })
    }

    /// Typed parameter checked against an inclusive range.
    pub fn param_in_range<T>(&self, key: &str, lower: T, upper: T) -> Result<T, RequestFault>
    where
        T: DeserializeOwned + PartialOrd,
    {
        let value: T = self.param_as(key)?;
        if value < lower || value > upper {
            return Err(RequestFault::invalid_params(self.id)
                .with_message(format!("{} out of range", key)));
        }
        Ok(value)
    }

    pub fn response(&self, result: Value) -> Response {
        Response::success(self.id, result)
    }

    pub fn error(&self, code: i32, message: impl Into<String>) -> Response {
        RequestFault::new(message, code, self.id).to_response()
    }
}
