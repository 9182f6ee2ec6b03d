//! One chat identity on one live connection.
//!
//! The session authenticates and joins after sign-on, answers commands
//! addressed to it, and is the only way outbound text reaches the transport.
//! A fresh [`SessionManager`] is built for every connection.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::commands::{
    parse_command, respond_to_action, small_talk, CommandContext, CommandRegistry, Reply,
    ScheduledReply,
};
use crate::config::BotConfig;
use crate::error::Result;
use crate::obs;
use crate::registry::{BuilderRegistry, CategoryFilter};
use crate::transport::{encode_outbound, nick_of, ChatEvent, ChatTransport};

/// Services that authenticate nicknames.
pub const NICKSERV: &str = "NickServ";

/// Per-connection chat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub nickname: String,
    pub channel: String,
    pub authenticated: bool,
    pub joined: bool,
}

pub struct SessionManager {
    session: Session,
    credential: Option<String>,
    status_url: Option<String>,
    filter: CategoryFilter,
    transport: Arc<dyn ChatTransport>,
    commands: Arc<CommandRegistry>,
    registry: Arc<dyn BuilderRegistry>,
}

impl SessionManager {
    pub fn new(
        config: &BotConfig,
        transport: Arc<dyn ChatTransport>,
        commands: Arc<CommandRegistry>,
        registry: Arc<dyn BuilderRegistry>,
    ) -> Self {
        Self {
            session: Session {
                nickname: config.identity.clone(),
                channel: config.channel.clone(),
                authenticated: false,
                joined: false,
            },
            credential: config.credential.clone(),
            status_url: config.status_url.clone(),
            filter: config.category_filter(),
            transport,
            commands,
            registry,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Dispatch one inbound event. Returns replies that must be delivered later.
    pub async fn handle_event(&mut self, event: ChatEvent) -> Vec<ScheduledReply> {
        match event {
            ChatEvent::SignedOn { nickname } => {
                self.on_nick_changed(nickname);
                self.on_signed_on().await;
                Vec::new()
            }
            ChatEvent::NickChanged { nickname } => {
                self.on_nick_changed(nickname);
                Vec::new()
            }
            ChatEvent::ChannelMessage {
                user,
                channel,
                text,
            } => self.handle_message(&user, &channel, &text).await,
            ChatEvent::Action {
                user,
                channel,
                text,
            } => self.handle_action(&user, &channel, &text),
            ChatEvent::Joined { channel } => {
                self.on_joined(&channel);
                Vec::new()
            }
            ChatEvent::Left { channel } => {
                self.on_left(&channel);
                Vec::new()
            }
            ChatEvent::Kicked {
                channel,
                kicker,
                reason,
            } => {
                self.on_kicked(&channel, &kicker, &reason);
                Vec::new()
            }
            ChatEvent::Disconnected { reason } => {
                info!(reason = %reason, "transport reported disconnect");
                Vec::new()
            }
        }
    }

    /// Registration finished: identify if we have a password, then join.
    ///
    /// Joining does not wait for NickServ to acknowledge.
    pub async fn on_signed_on(&mut self) {
        if let Some(credential) = &self.credential {
            let identify = format!("IDENTIFY {credential}");
            match self.transport.send_private_message(NICKSERV, &identify).await {
                Ok(()) => self.session.authenticated = true,
                Err(e) => warn!(error = %e, "failed to send NickServ identification"),
            }
        }
        if let Err(e) = self.transport.join(&self.session.channel).await {
            warn!(channel = %self.session.channel, error = %e, "failed to join channel");
        }
    }

    /// Commands and emotes are matched against the nickname we actually hold.
    pub fn on_nick_changed(&mut self, nickname: String) {
        if nickname != self.session.nickname {
            info!(from = %self.session.nickname, to = %nickname, "nickname changed");
            self.session.nickname = nickname;
        }
    }

    pub fn on_joined(&mut self, channel: &str) {
        if channel == self.session.channel {
            self.session.joined = true;
        }
        info!(channel = %channel, "I have joined");
    }

    pub fn on_left(&mut self, channel: &str) {
        if channel == self.session.channel {
            self.session.joined = false;
        }
        info!(channel = %channel, "I have left");
    }

    pub fn on_kicked(&mut self, channel: &str, kicker: &str, reason: &str) {
        if channel == self.session.channel {
            self.session.joined = false;
        }
        warn!(channel = %channel, kicker = %kicker, reason = %reason, "I have been kicked");
    }

    /// Handle a channel message. Only messages addressed as `nick:` or
    /// `nick,` in our channel are considered.
    pub async fn handle_message(
        &mut self,
        user: &str,
        channel: &str,
        text: &str,
    ) -> Vec<ScheduledReply> {
        if channel != self.session.channel {
            return Vec::new();
        }
        let Some(message) = strip_address(text, &self.session.nickname) else {
            return Vec::new();
        };
        let user = nick_of(user);

        if let Some(replies) = small_talk(message) {
            return replies;
        }

        let Some((command, args)) = parse_command(message) else {
            return Vec::new();
        };
        let Some(handler) = self.commands.lookup(command) else {
            return Vec::new();
        };

        obs::emit_command_dispatched(command, user);
        let ctx = CommandContext {
            user,
            args,
            registry: self.registry.as_ref(),
            filter: &self.filter,
            status_url: self.status_url.as_deref(),
        };
        match handler(&ctx) {
            Ok(replies) => {
                for reply in &replies {
                    if let Err(e) = self.deliver(reply).await {
                        warn!(command = %command, error = %e, "failed to send command reply");
                    }
                }
            }
            Err(e) => {
                obs::emit_command_failed(command, &e);
                error!(command = %command, user = %user, error = ?e, "command handler failed");
                let notice = format!("Something bad happened (see logs): {}", e.kind());
                if let Err(send_err) = self.say(&notice).await {
                    error!(error = %send_err, "failed to report command failure");
                }
            }
        }
        Vec::new()
    }

    /// Handle an emote in our channel that mentions our nickname.
    pub fn handle_action(&self, user: &str, channel: &str, text: &str) -> Vec<ScheduledReply> {
        if channel != self.session.channel {
            return Vec::new();
        }
        let text = text.trim();
        if !text.contains(self.session.nickname.as_str()) {
            return Vec::new();
        }
        respond_to_action(text, nick_of(user), &self.session.nickname)
            .into_iter()
            .collect()
    }

    pub async fn say(&self, text: &str) -> Result<()> {
        self.transport
            .send_channel_message(&self.session.channel, &encode_outbound(text))
            .await
    }

    pub async fn act(&self, text: &str) -> Result<()> {
        self.transport
            .send_action(&self.session.channel, &encode_outbound(text))
            .await
    }

    pub async fn deliver(&self, reply: &Reply) -> Result<()> {
        match reply {
            Reply::Say(text) => self.say(text).await,
            Reply::Act(text) => self.act(text).await,
        }
    }

    /// Close the connection gracefully.
    pub async fn quit(&self, reason: &str) -> Result<()> {
        self.transport.disconnect(&encode_outbound(reason)).await
    }
}

/// Strip a leading `nick:` / `nick,` address, returning the trimmed rest.
fn strip_address<'a>(text: &'a str, nickname: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(nickname)?;
    let rest = rest.strip_prefix(':').or_else(|| rest.strip_prefix(','))?;
    Some(rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_address() {
        assert_eq!(strip_address("buildbot: status", "buildbot"), Some("status"));
        assert_eq!(strip_address("buildbot,ping", "buildbot"), Some("ping"));
        assert_eq!(strip_address("buildbot status", "buildbot"), None);
        assert_eq!(strip_address("hey buildbot: status", "buildbot"), None);
    }
}
