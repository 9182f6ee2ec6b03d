//! Chat transport abstraction.
//!
//! A [`Connector`] opens one physical connection and returns the outbound
//! half as a [`ChatTransport`]. Inbound traffic is pushed as [`ChatEvent`]s
//! into the channel handed to `connect`; the connection is considered lost
//! when that channel closes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

/// Inbound notification from the chat network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Registration with the server completed under `nickname`, which may
    /// differ from the requested one after a collision.
    SignedOn { nickname: String },
    /// Our nickname changed.
    NickChanged { nickname: String },
    ChannelMessage {
        user: String,
        channel: String,
        text: String,
    },
    /// Emote (`/me`) in a channel.
    Action {
        user: String,
        channel: String,
        text: String,
    },
    /// We joined `channel`.
    Joined { channel: String },
    /// We left `channel`.
    Left { channel: String },
    /// We were kicked from `channel`.
    Kicked {
        channel: String,
        kicker: String,
        reason: String,
    },
    /// The connection is going away; the inbound channel closes next.
    Disconnected { reason: String },
}

/// Outbound half of a live connection.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_channel_message(&self, channel: &str, text: &str) -> Result<()>;

    async fn send_action(&self, channel: &str, text: &str) -> Result<()>;

    async fn send_private_message(&self, user: &str, text: &str) -> Result<()>;

    async fn join(&self, channel: &str) -> Result<()>;

    /// Close gracefully with `reason`.
    async fn disconnect(&self, reason: &str) -> Result<()>;
}

/// Opens connections for the reconnect loop.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and register as `nickname`.
    ///
    /// Errors mean the attempt failed; once this returns `Ok` the connection
    /// counts as established and its loss is reported by closing `inbound`.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        nickname: &str,
        inbound: UnboundedSender<ChatEvent>,
    ) -> Result<Arc<dyn ChatTransport>>;
}

/// Reduce an IRC-style user mask `nick!user@host` to `nick`.
pub fn nick_of(mask: &str) -> &str {
    mask.split_once('!').map_or(mask, |(nick, _)| nick)
}

/// Make `text` safe to put on the wire.
///
/// Non-ASCII characters and NUL become `?`, line breaks become spaces. The
/// message is never dropped because of its content.
pub fn encode_outbound(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\r' | '\n' => ' ',
            '\0' => '?',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nick_of_mask() {
        assert_eq!(nick_of("alice!~alice@example.org"), "alice");
        assert_eq!(nick_of("alice"), "alice");
    }

    #[test]
    fn test_encode_outbound_substitutes() {
        assert_eq!(encode_outbound("plain text"), "plain text");
        assert_eq!(encode_outbound("Grüße"), "Gr??e");
        assert_eq!(encode_outbound("two\r\nlines"), "two  lines");
        assert_eq!(encode_outbound("\x0304Failure\x0f"), "\x0304Failure\x0f");
    }
}
