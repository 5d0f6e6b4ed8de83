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

//! JSON-RPC 2.0 message model.
//!
//! `Request` parses and validates inbound text, `Response` and
//! `Notification` are the outbound wire shapes, and `RequestFault` is the
//! single error type that renders into an error response.

pub mod fault;
pub mod request;
pub mod response;

pub use fault::{FaultKind, RequestFault};
pub use request::Request;
pub use response::{ErrorObject, Notification, Outcome, RequestId, Response};
