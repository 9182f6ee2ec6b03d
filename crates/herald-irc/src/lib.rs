//! IRC transport for Build Herald.
//!
//! Implements the core's [`Connector`](herald_core::Connector) and
//! [`ChatTransport`](herald_core::ChatTransport) over plain TCP.

pub mod client;
pub mod message;

pub use client::{IrcConnector, IrcTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REALNAME};
pub use message::IrcMessage;
