//! Stream sources.
//!
//! A source is an external helper process producing PCM on stdout. The URI
//! scheme selects the adapter that knows how to drive the helper; the
//! supervisor in [`source`] keeps it alive.

pub mod adapter;
pub mod backoff;
pub mod command;
pub mod librespot;
pub mod pipeline;
pub mod process;
pub mod source;
pub mod uri;
pub mod watchdog;

pub use adapter::{Directive, ProcessCommand, SourceAdapter, SourceNotice};
pub use process::{ProcessControl, ProcessLauncher, SpawnedProcess, SystemLauncher};
pub use source::{
    PcmListener, SourceEvent, SourceHandle, SourceSettings, SourceState, SourceStatus, StreamSource,
};
pub use uri::StreamUri;
pub use watchdog::Watchdog;

use crate::common::errors::SourceError;

/// Adapter for the URI scheme.
pub fn create_adapter(uri: &StreamUri) -> Result<Box<dyn SourceAdapter>, SourceError> {
    match uri.scheme() {
        "spotify" | "librespot" => Ok(Box::new(librespot::LibrespotAdapter::from_uri(uri)?)),
        "process" => Ok(Box::new(command::CommandAdapter::from_uri(uri)?)),
        other => Err(SourceError::UnknownScheme(other.to_string())),
    }
}
