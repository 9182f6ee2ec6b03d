//! TCP connection to an IRC server.
//!
//! [`IrcConnector::connect`] registers the nickname and spawns two tasks per
//! connection: a writer draining queued [`IrcMessage`]s onto the socket and a
//! reader translating server lines into [`ChatEvent`]s. The reader owns the
//! inbound sender, so the bot sees the connection as lost exactly when the
//! reader stops.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_core::transport::{ChatEvent, ChatTransport, Connector};
use herald_core::{HeraldError, Result};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::message::{ctcp_action, is_channel, IrcMessage};

pub const DEFAULT_REALNAME: &str = "Build Herald";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens plain-TCP IRC connections.
#[derive(Debug, Clone)]
pub struct IrcConnector {
    realname: String,
    connect_timeout: Duration,
}

impl IrcConnector {
    pub fn new() -> Self {
        Self::with_realname(DEFAULT_REALNAME)
    }

    pub fn with_realname(realname: impl Into<String>) -> Self {
        Self {
            realname: realname.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// How long a TCP connect may hang before the attempt counts as failed.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for IrcConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for IrcConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        nickname: &str,
        inbound: UnboundedSender<ChatEvent>,
    ) -> Result<Arc<dyn ChatTransport>> {
        let stream = connect_within(
            self.connect_timeout,
            host,
            port,
            TcpStream::connect((host, port)),
        )
        .await?;
        info!(host = %host, port, "TCP connection established");
        Ok(Arc::new(IrcTransport::start(
            stream,
            nickname,
            &self.realname,
            inbound,
        )))
    }
}

async fn connect_within<T>(
    limit: Duration,
    host: &str,
    port: u16,
    connecting: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, connecting).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(HeraldError::Transport(format!(
            "connect to {host}:{port}: {e}"
        ))),
        Err(_) => Err(HeraldError::Transport(format!(
            "connect to {host}:{port} timed out after {}s",
            limit.as_secs()
        ))),
    }
}

/// Outbound half of one IRC connection.
#[derive(Debug, Clone)]
pub struct IrcTransport {
    outbound: UnboundedSender<IrcMessage>,
}

impl IrcTransport {
    /// Register on an already connected stream and spawn its I/O tasks.
    pub fn start<S>(
        stream: S,
        nickname: &str,
        realname: &str,
        inbound: UnboundedSender<ChatEvent>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, queue) = mpsc::unbounded_channel();

        // Queued before the writer starts, so registration always goes first.
        let _ = outbound.send(IrcMessage::nick(nickname));
        let _ = outbound.send(IrcMessage::user(nickname, realname));

        tokio::spawn(write_loop(write_half, queue));
        tokio::spawn(read_loop(
            BufReader::new(read_half),
            nickname.to_string(),
            outbound.clone(),
            inbound,
        ));
        Self { outbound }
    }

    fn send(&self, message: IrcMessage) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| HeraldError::NotConnected)
    }
}

#[async_trait]
impl ChatTransport for IrcTransport {
    async fn send_channel_message(&self, channel: &str, text: &str) -> Result<()> {
        self.send(IrcMessage::privmsg(channel, text))
    }

    async fn send_action(&self, channel: &str, text: &str) -> Result<()> {
        self.send(IrcMessage::action(channel, text))
    }

    async fn send_private_message(&self, user: &str, text: &str) -> Result<()> {
        self.send(IrcMessage::privmsg(user, text))
    }

    async fn join(&self, channel: &str) -> Result<()> {
        self.send(IrcMessage::join(channel))
    }

    async fn disconnect(&self, reason: &str) -> Result<()> {
        self.send(IrcMessage::quit(reason))
    }
}

/// Write queued messages until the queue closes or a `QUIT` went out.
async fn write_loop<W>(mut writer: W, mut queue: UnboundedReceiver<IrcMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queue.recv().await {
        let line = message.to_line();
        debug!(line = %line, "irc >>");
        let mut bytes = line.into_bytes();
        bytes.extend_from_slice(b"\r\n");
        if let Err(e) = writer.write_all(&bytes).await {
            warn!(error = %e, "write to IRC server failed");
            return;
        }
        if message.command == "QUIT" {
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "failed to shut down IRC writer");
    }
}

/// Per-connection protocol state kept by the reader.
struct ReaderState {
    nickname: String,
    registered: bool,
    /// Last `ERROR` text from the server, used as the disconnect reason.
    error: Option<String>,
}

async fn read_loop<R>(
    mut reader: R,
    nickname: String,
    outbound: UnboundedSender<IrcMessage>,
    inbound: UnboundedSender<ChatEvent>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut state = ReaderState {
        nickname,
        registered: false,
        error: None,
    };
    let mut buf = Vec::new();

    let reason = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break state.error.take().unwrap_or_else(|| "connection closed".to_string()),
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                debug!(line = %line.trim_end(), "irc <<");
                let Some(message) = IrcMessage::parse(&line) else {
                    continue;
                };
                for event in handle_line(&mut state, message, &outbound) {
                    if inbound.send(event).is_err() {
                        debug!("bot stopped listening, closing reader");
                        return;
                    }
                }
            }
            Err(e) => break format!("read error: {e}"),
        }
    };

    info!(reason = %reason, "IRC connection closed");
    let _ = inbound.send(ChatEvent::Disconnected { reason });
}

/// Translate one server line into bot events, answering protocol chatter
/// (`PING`, nick collisions) directly.
fn handle_line(
    state: &mut ReaderState,
    message: IrcMessage,
    outbound: &UnboundedSender<IrcMessage>,
) -> Vec<ChatEvent> {
    let ours = message.source_nick() == Some(state.nickname.as_str());
    match message.command.as_str() {
        "PING" => {
            let token = message.param(0).unwrap_or_default();
            let _ = outbound.send(IrcMessage::pong(token));
            Vec::new()
        }
        "001" => {
            if let Some(nick) = message.param(0) {
                state.nickname = nick.to_string();
            }
            state.registered = true;
            info!(nickname = %state.nickname, "signed on");
            vec![ChatEvent::SignedOn {
                nickname: state.nickname.clone(),
            }]
        }
        "433" if !state.registered => {
            state.nickname.push('_');
            warn!(nickname = %state.nickname, "nickname in use, retrying");
            let _ = outbound.send(IrcMessage::nick(&state.nickname));
            Vec::new()
        }
        "NICK" if ours => match message.param(0) {
            Some(nick) => {
                state.nickname = nick.to_string();
                vec![ChatEvent::NickChanged {
                    nickname: nick.to_string(),
                }]
            }
            None => Vec::new(),
        },
        "PRIVMSG" => {
            let (Some(prefix), Some(target), Some(text)) =
                (message.prefix.clone(), message.param(0), message.param(1))
            else {
                return Vec::new();
            };
            if !is_channel(target) {
                debug!(from = %prefix, "ignoring private message");
                return Vec::new();
            }
            let channel = target.to_string();
            match ctcp_action(text) {
                Some(action) => vec![ChatEvent::Action {
                    user: prefix,
                    channel,
                    text: action.to_string(),
                }],
                None if text.starts_with('\u{1}') => Vec::new(),
                None => vec![ChatEvent::ChannelMessage {
                    user: prefix,
                    channel,
                    text: text.to_string(),
                }],
            }
        }
        "JOIN" if ours => message
            .param(0)
            .map(|channel| ChatEvent::Joined {
                channel: channel.to_string(),
            })
            .into_iter()
            .collect(),
        "PART" if ours => message
            .param(0)
            .map(|channel| ChatEvent::Left {
                channel: channel.to_string(),
            })
            .into_iter()
            .collect(),
        "KICK" if message.param(1) == Some(state.nickname.as_str()) => {
            vec![ChatEvent::Kicked {
                channel: message.param(0).unwrap_or_default().to_string(),
                kicker: message.source_nick().unwrap_or_default().to_string(),
                reason: message.param(2).unwrap_or_default().to_string(),
            }]
        }
        "ERROR" => {
            state.error = message.param(0).map(str::to_string);
            Vec::new()
        }
        _ => Vec::new(),
    }
}
