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

//! roomcast Constants - Single source of truth for all configuration values.
//!
//! This module centralizes error codes, notification names, environment
//! variables and stream defaults so the wire format and the supervision
//! timings stay consistent across modules.

/// JSON-RPC 2.0 Error Codes
pub mod jsonrpc {
    /// Protocol version string carried by every message
    pub const VERSION: &str = "2.0";
    /// Parse error (standard JSON-RPC)
    pub const ERROR_PARSE: i32 = -32700;
    /// Invalid request (standard JSON-RPC)
    pub const ERROR_INVALID_REQUEST: i32 = -32600;
    /// Method not found (standard JSON-RPC)
    pub const ERROR_METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params (standard JSON-RPC)
    pub const ERROR_INVALID_PARAMS: i32 = -32602;
    /// Internal error (standard JSON-RPC), also the fallback for code 0
    pub const ERROR_INTERNAL: i32 = -32603;
}

/// Version of the control API reported by `Server.GetRPCVersion`
pub mod api {
    pub const MAJOR: u32 = 2;
    pub const MINOR: u32 = 0;
    pub const PATCH: u32 = 0;
}

/// Control Methods and Notifications
pub mod methods {
    pub const SERVER_GET_RPC_VERSION: &str = "Server.GetRPCVersion";
    pub const STREAM_LIST: &str = "Stream.List";
    pub const STREAM_GET_STATUS: &str = "Stream.GetStatus";
    pub const STREAM_RESTART: &str = "Stream.Restart";

    pub const STREAM_ON_UPDATE: &str = "Stream.OnUpdate";
    pub const STREAM_ON_METADATA: &str = "Stream.OnMetadata";
    pub const STREAM_ON_ERROR: &str = "Stream.OnError";
}

/// Configuration Environment Variables
pub mod config {
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
    pub const ENV_BACKOFF_MS: &str = "ROOMCAST_BACKOFF_MS";
    pub const ENV_BACKOFF_MAX_MS: &str = "ROOMCAST_BACKOFF_MAX_MS";
    pub const ENV_KILL_GRACE_MS: &str = "ROOMCAST_KILL_GRACE_MS";
    pub const ENV_READ_CHUNK_BYTES: &str = "ROOMCAST_READ_CHUNK_BYTES";
}

/// Stream source supervision defaults
pub mod stream {
    /// First restart delay after an exit or a hang
    pub const DEFAULT_BACKOFF_MS: u64 = 1_000;
    /// Upper bound for the doubling restart delay
    pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
    /// Time a helper gets between SIGTERM and SIGKILL
    pub const DEFAULT_KILL_GRACE_MS: u64 = 2_000;
    /// Size of a single stdout read
    pub const DEFAULT_READ_CHUNK_BYTES: usize = 4_096;
    /// Capacity of the per-process reader channels
    pub const READER_CHANNEL_CAPACITY: usize = 64;
    /// Capacity of the source event channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 128;
    /// Capacity of the source command channel
    pub const COMMAND_CHANNEL_CAPACITY: usize = 8;
}

/// Stream URI query keys shared by all sources
pub mod uri {
    pub const NAME: &str = "name";
    pub const WATCHDOG_TIMEOUT: &str = "wd_timeout";
    pub const PARAMS: &str = "params";
}

/// librespot helper conventions
pub mod librespot {
    pub const EXECUTABLE: &str = "librespot";
    pub const DEFAULT_DEVICE_NAME: &str = "Snapcast";
    pub const DEFAULT_BITRATE: u32 = 320;
    pub const ALLOWED_BITRATES: [u32; 3] = [96, 160, 320];
    pub const DEFAULT_VOLUME: u8 = 100;
    /// 130 minutes: the pipe backend stays silent while playback is paused
    pub const DEFAULT_WATCHDOG_TIMEOUT_SECS: u64 = 7_800;
    /// Fixed output format of the pipe backend
    pub const SAMPLE_FORMAT: &str = "44100:16:2";
}

/// Transport Limits
pub mod limits {
    /// Maximum allowed JSON-RPC message size (1 MB)
    pub const MAX_MESSAGE_SIZE_BYTES: usize = 1024 * 1024;
    /// Maximum stderr line length kept from a helper
    pub const MAX_STDERR_LINE_BYTES: usize = 8 * 1024;
}
