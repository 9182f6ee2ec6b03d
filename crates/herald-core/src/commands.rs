//! Chat command registry.
//!
//! Commands are looked up by exact, case-insensitive name in a table built
//! once at startup. A missing entry is the "unknown command" case and is
//! silently ignored by the session.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;
use crate::registry::{failing_builders, BuilderRegistry, CategoryFilter};
use crate::report::format_status;

/// Something the bot says in the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain channel message.
    Say(String),
    /// Emote (`/me`).
    Act(String),
}

/// A reply to deliver after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReply {
    pub delay: Duration,
    pub reply: Reply,
}

/// What a command handler gets to see.
pub struct CommandContext<'a> {
    /// Nick of the user who issued the command.
    pub user: &'a str,
    /// Everything after the command word, trimmed.
    pub args: &'a str,
    pub registry: &'a dyn BuilderRegistry,
    pub filter: &'a CategoryFilter,
    pub status_url: Option<&'a str>,
}

pub type CommandHandler = fn(&CommandContext<'_>) -> Result<Vec<Reply>>;

#[derive(Clone)]
pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// `VERSION`, `PING` and `STATUS`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("VERSION", command_version);
        registry.register("PING", command_ping);
        registry.register("STATUS", command_status);
        registry
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.to_ascii_uppercase(), handler);
    }

    pub fn lookup(&self, name: &str) -> Option<CommandHandler> {
        self.handlers.get(&name.to_ascii_uppercase()).copied()
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

/// Split a message into `(command, args)`.
pub fn parse_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.split_once(' ') {
        Some((cmd, args)) => Some((cmd, args.trim())),
        None => Some((text, "")),
    }
}

fn command_version(_ctx: &CommandContext<'_>) -> Result<Vec<Reply>> {
    Ok(vec![Reply::Say(format!(
        "buildherald-{} at your service",
        crate::VERSION
    ))])
}

fn command_ping(_ctx: &CommandContext<'_>) -> Result<Vec<Reply>> {
    Ok(vec![Reply::Say("pong".to_string())])
}

fn command_status(ctx: &CommandContext<'_>) -> Result<Vec<Reply>> {
    let failing = failing_builders(ctx.registry, ctx.filter);
    Ok(vec![Reply::Say(format_status(&failing, ctx.status_url))])
}

const SMALL_TALK_FIRST_DELAY: Duration = Duration::from_millis(500);
const SMALL_TALK_SPACING: Duration = Duration::from_millis(2500);

/// Canned answers to exact greetings. Each reply is delayed a little, and
/// multi-line scripts are spaced out.
pub fn small_talk(message: &str) -> Option<Vec<ScheduledReply>> {
    let script: &[&str] = match message {
        "hello" => &["yes?"],
        "hi" => &["hello"],
        _ => return None,
    };
    let mut delay = SMALL_TALK_FIRST_DELAY;
    let mut replies = Vec::with_capacity(script.len());
    for line in script {
        replies.push(ScheduledReply {
            delay,
            reply: Reply::Say(line.to_string()),
        });
        delay += SMALL_TALK_SPACING;
    }
    Some(replies)
}

/// Answer an emote aimed at `nickname`, e.g. `* alice pokes buildbot`.
///
/// `kicks` is answered with `kicks back` after a second, everything else
/// with `<verb> <user> too` after four.
pub fn respond_to_action(action: &str, user: &str, nickname: &str) -> Option<ScheduledReply> {
    if !action.ends_with(&format!("s {nickname}")) {
        return None;
    }
    let words: Vec<&str> = action.split_whitespace().collect();
    let verb = words.len().checked_sub(2).map(|i| words[i])?;

    let (text, delay) = if verb == "kicks" {
        (format!("{verb} back"), Duration::from_secs(1))
    } else {
        (format!("{verb} {user} too"), Duration::from_secs(4))
    };
    Some(ScheduledReply {
        delay,
        reply: Reply::Act(text),
    })
}
