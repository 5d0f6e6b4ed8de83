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

//! roomcast: supervised audio stream sources with a JSON-RPC control channel.
//!
//! Helper processes such as librespot are spawned per source, kept alive by
//! a watchdog and restart policy, and their PCM output is handed to a
//! [`stream::PcmListener`]. The control channel speaks JSON-RPC 2.0.

pub mod common;
pub mod config;
pub mod control;
pub mod jsonrpc;
pub mod stream;
