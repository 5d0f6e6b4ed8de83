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

//! Control method handlers.

use serde_json::{json, Value};
use tracing::info;

use crate::common::constants::{api, methods};
use crate::control::session::RequestHandler;
use crate::jsonrpc::{Request, RequestFault};
use crate::stream::SourceHandle;

/// Handles the control methods over a fixed set of running sources.
pub struct StreamControl {
    sources: Vec<SourceHandle>,
}

impl StreamControl {
    pub fn new(sources: Vec<SourceHandle>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[SourceHandle] {
        &self.sources
    }

    fn find(&self, request: &Request) -> Result<&SourceHandle, RequestFault> {
        let id: String = request.param_as("id")?;
        self.sources
            .iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| {
                RequestFault::invalid_params(request.id).with_message(format!("stream {} not found", id))
            })
    }
}

fn describe(source: &SourceHandle) -> Value {
    let mut entry = json!({
        "id": source.id(),
        "uri": source.uri(),
        "kind": source.kind(),
        "status": source.status(),
    });
    if let Some(format) = source.sample_format() {
        entry["sample_format"] = json!(format);
    }
    entry
}

impl RequestHandler for StreamControl {
    fn handle(&mut self, request: &Request) -> Result<Value, RequestFault> {
        match request.method.as_str() {
            methods::SERVER_GET_RPC_VERSION => Ok(json!({
                "major": api::MAJOR,
                "minor": api::MINOR,
                "patch": api::PATCH,
            })),
            methods::STREAM_LIST => Ok(json!({
                "streams": self.sources.iter().map(describe).collect::<Vec<_>>(),
            })),
            methods::STREAM_GET_STATUS => Ok(describe(self.find(request)?)),
            methods::STREAM_RESTART => {
                let source = self.find(request)?;
                source.request_restart().map_err(|e| {
                    RequestFault::internal_error(request.id).with_message(e.to_string())
                })?;
                info!(source = source.id(), "restart requested over control channel");
                Ok(json!({ "id": source.id(), "restarting": true }))
            }
            _ => Err(RequestFault::method_not_found(request.id)),
        }
    }
}
