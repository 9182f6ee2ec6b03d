//! Error types for Build Herald.

use thiserror::Error;

/// Errors produced by the notifier core.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Configuration is present but invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The chat transport failed to connect or to send.
    #[error("transport error: {0}")]
    Transport(String),

    /// An operation needed a live chat session but there was none.
    #[error("not connected")]
    NotConnected,

    /// A chat command handler failed.
    #[error("command {command} failed: {reason}")]
    Command { command: String, reason: String },
}

impl HeraldError {
    /// Short, stable name of the error variant.
    ///
    /// This is what the channel gets to see when a command fails; the full
    /// error only goes to the log.
    pub fn kind(&self) -> &'static str {
        match self {
            HeraldError::Config(_) => "ConfigError",
            HeraldError::ConfigParse(_) => "ConfigParseError",
            HeraldError::Io(_) => "IoError",
            HeraldError::Transport(_) => "TransportError",
            HeraldError::NotConnected => "NotConnected",
            HeraldError::Command { .. } => "CommandError",
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, HeraldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_displays_command_and_reason() {
        let err = HeraldError::Command {
            command: "STATUS".to_string(),
            reason: "registry unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("STATUS"));
        assert!(msg.contains("registry unavailable"));
        assert_eq!(err.kind(), "CommandError");
    }

    #[test]
    fn test_kind_does_not_leak_details() {
        let err = HeraldError::Transport("password rejected for hunter2".to_string());
        assert_eq!(err.kind(), "TransportError");
        assert!(!err.kind().contains("hunter2"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: HeraldError = io.into();
        assert_eq!(err.kind(), "IoError");
        assert!(err.to_string().contains("refused"));
    }
}
