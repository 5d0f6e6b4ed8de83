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

//! Control session: request dispatch and the serve loop.
//!
//! Requests are answered strictly in arrival order. Source notifications are
//! written between responses, never inside one.

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::control::transport::{Inbound, LineTransport};
use crate::jsonrpc::{Notification, Request, RequestFault, Response};

/// Application side of the control channel.
pub trait RequestHandler: Send {
    fn handle(&mut self, request: &Request) -> Result<Value, RequestFault>;
}

/// Turn one inbound line into its response, if it gets one.
///
/// Faults always produce a response. Successful calls without an id do not.
pub fn respond<H>(handler: &mut H, raw: &str) -> Option<Response>
where
    H: RequestHandler + ?Sized,
{
    let request = match Request::parse(raw) {
        Ok(request) => request,
        Err(fault) => {
            debug!(code = fault.code(), "rejected request: {}", fault.message());
            return Some(fault.to_response());
        }
    };

    match handler.handle(&request) {
        Ok(_) if request.is_notification() => None,
        Ok(result) => Some(request.response(result)),
        Err(fault) => {
            let fault = if fault.request_id().is_absent() {
                fault.with_request_id(request.id)
            } else {
                fault
            };
            debug!(method = %request.method, code = fault.code(), "{}", fault.message());
            Some(fault.to_response())
        }
    }
}

/// Serve requests until the peer closes the channel.
pub async fn serve<R, W, H>(
    mut transport: LineTransport<R, W>,
    handler: &mut H,
    mut notifications: mpsc::Receiver<Notification>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: RequestHandler + ?Sized,
{
    let mut notifications_open = true;
    loop {
        tokio::select! {
            biased;

            inbound = transport.read_message() => match inbound? {
                None => {
                    info!("control channel closed");
                    return Ok(());
                }
                Some(Inbound::Message(text)) => {
                    if let Some(response) = respond(&mut *handler, &text) {
                        transport.write_response(&response).await?;
                    }
                }
                Some(Inbound::Malformed(reason)) => {
                    warn!("{}", reason);
                    let response = RequestFault::parse_error(reason).to_response();
                    transport.write_response(&response).await?;
                }
            },

            note = notifications.recv(), if notifications_open => match note {
                Some(note) => transport.write_notification(&note).await?,
                None => notifications_open = false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::RequestId;
    use serde_json::json;

    struct Echo;

    impl RequestHandler for Echo {
        fn handle(&mut self, request: &Request) -> Result<Value, RequestFault> {
            match request.method.as_str() {
                "echo" => Ok(Value::Object(request.params.clone())),
                "fail" => Err(RequestFault::internal_error(RequestId::Absent)),
                _ => Err(RequestFault::method_not_found(request.id)),
            }
        }
    }

    #[test]
    fn test_success_echoes_id() {
        let resp = respond(&mut Echo, r#"{"jsonrpc":"2.0","id":3,"method":"echo","params":{"x":1}}"#)
            .unwrap();
        assert_eq!(resp.id, RequestId::Number(3));
        assert_eq!(resp.result(), Some(&json!({"x": 1})));
    }

    #[test]
    fn test_notification_success_is_silent() {
        assert!(respond(&mut Echo, r#"{"jsonrpc":"2.0","method":"echo"}"#).is_none());
    }

    #[test]
    fn test_notification_fault_is_answered_with_null_id() {
        let resp = respond(&mut Echo, r#"{"jsonrpc":"2.0","method":"nope"}"#).unwrap();
        assert_eq!(resp.id, RequestId::Absent);
        assert_eq!(resp.error().map(|e| e.code), Some(-32601));
    }

    #[test]
    fn test_fault_without_id_inherits_request_id() {
        let resp = respond(&mut Echo, r#"{"jsonrpc":"2.0","id":11,"method":"fail"}"#).unwrap();
        assert_eq!(resp.id, RequestId::Number(11));
        assert_eq!(resp.error().map(|e| e.code), Some(-32603));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let resp = respond(&mut Echo, "{{{").unwrap();
        assert_eq!(resp.id, RequestId::Absent);
        assert_eq!(resp.error().map(|e| e.code), Some(-32700));
    }
}
