//! Native-messaging bridge to the browser extension.
//!
//! The extension owns tabs, video elements and WebHID; this process owns the
//! hold logic. Requests to the extension carry an `id` and are answered with
//! a `RESPONSE` frame carrying the same id.

pub mod client;
pub mod codec;
pub mod error;
pub mod host;
pub mod messages;

pub use client::{BridgeVideoController, OffscreenLink, PendingRequests};
pub use error::BridgeError;
pub use host::{serve, MessageRouter};
pub use messages::{ExtensionMessage, HostMessage};
