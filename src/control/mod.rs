//! Control channel.
//!
//! A newline-delimited JSON-RPC session over any byte stream: requests go to
//! a [`RequestHandler`], source events go out as notifications.

pub mod events;
pub mod methods;
pub mod session;
pub mod transport;

pub use events::{notification_for, spawn_event_forwarder};
pub use methods::StreamControl;
pub use session::{respond, serve, RequestHandler};
pub use transport::{Inbound, LineTransport};
