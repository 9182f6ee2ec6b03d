//! IRC protocol lines (RFC 1459 framing, without the trailing CRLF).

use std::fmt;

const CTCP_DELIM: char = '\u{1}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// Source of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command word or three-digit numeric reply, as sent.
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    pub fn nick(nickname: &str) -> Self {
        Self::new("NICK", vec![nickname.to_string()])
    }

    pub fn user(username: &str, realname: &str) -> Self {
        Self::new(
            "USER",
            vec![
                username.to_string(),
                "0".to_string(),
                "*".to_string(),
                realname.to_string(),
            ],
        )
    }

    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", vec![channel.to_string()])
    }

    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", vec![target.to_string(), text.to_string()])
    }

    /// CTCP `ACTION`, i.e. `/me`.
    pub fn action(target: &str, text: &str) -> Self {
        Self::privmsg(target, &format!("{CTCP_DELIM}ACTION {text}{CTCP_DELIM}"))
    }

    pub fn pong(token: &str) -> Self {
        Self::new("PONG", vec![token.to_string()])
    }

    pub fn quit(reason: &str) -> Self {
        Self::new("QUIT", vec![reason.to_string()])
    }

    /// Parse one line. Returns `None` for empty or prefix-only lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start();

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ')?;
                rest = tail.trim_start();
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, tail)) => (command, tail),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param.to_string());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Serialize without the line terminator.
    pub fn to_line(&self) -> String {
        let mut line = String::new();
        if let Some(prefix) = &self.prefix {
            line.push(':');
            line.push_str(prefix);
            line.push(' ');
        }
        line.push_str(&self.command);
        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                line.push(' ');
                line.push_str(param);
            }
            line.push(' ');
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                line.push(':');
            }
            line.push_str(last);
        }
        line
    }

    /// Nick part of the prefix, if any.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_deref().map(herald_core::transport::nick_of)
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

impl fmt::Display for IrcMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Body of a CTCP `ACTION`, if `text` is one.
pub fn ctcp_action(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(CTCP_DELIM)?;
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    inner.strip_prefix("ACTION ")
}

/// Whether `target` names a channel rather than a user.
pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_prefix() {
        let msg = IrcMessage::parse(":alice!a@example.org PRIVMSG #scummvm :buildbot: status\r\n")
            .unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!a@example.org"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#scummvm", "buildbot: status"]);
        assert_eq!(msg.source_nick(), Some("alice"));
    }

    #[test]
    fn test_parse_numeric_and_ping() {
        let welcome = IrcMessage::parse(":irc.example.org 001 buildbot :Welcome to IRC").unwrap();
        assert_eq!(welcome.command, "001");
        assert_eq!(welcome.param(0), Some("buildbot"));

        let ping = IrcMessage::parse("PING :irc.example.org").unwrap();
        assert_eq!(ping.prefix, None);
        assert_eq!(ping.params, vec!["irc.example.org"]);
    }

    #[test]
    fn test_parse_rejects_empty_lines() {
        assert_eq!(IrcMessage::parse(""), None);
        assert_eq!(IrcMessage::parse("\r\n"), None);
        assert_eq!(IrcMessage::parse(":prefix-only"), None);
    }

    #[test]
    fn test_parse_keeps_empty_trailing_param() {
        let msg = IrcMessage::parse("TOPIC #scummvm :").unwrap();
        assert_eq!(msg.params, vec!["#scummvm", ""]);
    }

    #[test]
    fn test_to_line_marks_trailing_param_only_when_needed() {
        assert_eq!(IrcMessage::join("#scummvm").to_line(), "JOIN #scummvm");
        assert_eq!(IrcMessage::pong("abc").to_line(), "PONG abc");
        assert_eq!(
            IrcMessage::privmsg("#scummvm", "hello world").to_line(),
            "PRIVMSG #scummvm :hello world"
        );
        assert_eq!(IrcMessage::quit("").to_line(), "QUIT :");
        assert_eq!(
            IrcMessage::user("buildbot", "Build Herald").to_line(),
            "USER buildbot 0 * :Build Herald"
        );
    }

    #[test]
    fn test_action_is_wrapped_in_ctcp() {
        let msg = IrcMessage::action("#scummvm", "kicks back");
        assert_eq!(msg.to_line(), "PRIVMSG #scummvm :\u{1}ACTION kicks back\u{1}");
        assert_eq!(ctcp_action(msg.param(1).unwrap()), Some("kicks back"));
        assert_eq!(ctcp_action("kicks back"), None);
        assert_eq!(ctcp_action("\u{1}VERSION\u{1}"), None);
    }

    #[test]
    fn test_is_channel() {
        assert!(is_channel("#scummvm"));
        assert!(is_channel("&local"));
        assert!(!is_channel("NickServ"));
    }
}
