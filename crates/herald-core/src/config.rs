//! Bot configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! identity = "buildbot"
//! channel = "#scummvm"
//! host = "irc.libera.chat"
//! categories = ["ports"]
//! status_url = "http://buildbot.scummvm.org/"
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HeraldError, Result};
use crate::registry::CategoryFilter;
use crate::supervisor::ReconnectPolicy;

pub const DEFAULT_PORT: u16 = 6667;
pub const DEFAULT_QUIT_MESSAGE: &str = "buildmaster reconfigured: bot disconnecting";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Nickname used in the channel.
    pub identity: String,

    /// NickServ password, if the nick is registered.
    #[serde(default)]
    pub credential: Option<String>,

    pub channel: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Only report builders in these categories. All builders when absent.
    #[serde(default)]
    pub categories: Option<BTreeSet<String>>,

    #[serde(default = "default_debounce_window_secs")]
    pub debounce_window_secs: u64,

    #[serde(default = "default_lost_retry_delay_secs")]
    pub lost_retry_delay_secs: u64,

    #[serde(default = "default_failed_retry_delay_secs")]
    pub failed_retry_delay_secs: u64,

    /// Appended to reports and multi-failure STATUS answers.
    #[serde(default)]
    pub status_url: Option<String>,

    /// Use mIRC colour codes in reports.
    #[serde(default = "default_colors")]
    pub colors: bool,

    /// Sent with QUIT on shutdown.
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_debounce_window_secs() -> u64 {
    60
}

fn default_lost_retry_delay_secs() -> u64 {
    2
}

fn default_failed_retry_delay_secs() -> u64 {
    60
}

fn default_colors() -> bool {
    true
}

fn default_quit_message() -> String {
    DEFAULT_QUIT_MESSAGE.to_string()
}

impl BotConfig {
    /// Minimal config with every optional setting at its default.
    pub fn new(
        identity: impl Into<String>,
        channel: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            credential: None,
            channel: channel.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            categories: None,
            debounce_window_secs: default_debounce_window_secs(),
            lost_retry_delay_secs: default_lost_retry_delay_secs(),
            failed_retry_delay_secs: default_failed_retry_delay_secs(),
            status_url: None,
            colors: default_colors(),
            quit_message: default_quit_message(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: BotConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(HeraldError::Config("identity must not be empty".to_string()));
        }
        if self.identity.chars().any(char::is_whitespace) {
            return Err(HeraldError::Config(format!(
                "identity {:?} must not contain whitespace",
                self.identity
            )));
        }
        if !(self.channel.starts_with('#') || self.channel.starts_with('&')) {
            return Err(HeraldError::Config(format!(
                "channel {:?} must start with '#' or '&'",
                self.channel
            )));
        }
        if self.host.is_empty() {
            return Err(HeraldError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(HeraldError::Config("port must not be 0".to_string()));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_window_secs)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            lost_delay: Duration::from_secs(self.lost_retry_delay_secs),
            failed_delay: Duration::from_secs(self.failed_retry_delay_secs),
        }
    }

    pub fn category_filter(&self) -> CategoryFilter {
        self.categories.clone().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_toml_gets_defaults() {
        let config = BotConfig::from_toml_str(
            r##"
identity = "buildbot"
channel = "#scummvm"
host = "irc.example.org"
"##,
        )
        .unwrap();
        assert_eq!(config, BotConfig::new("buildbot", "#scummvm", "irc.example.org"));
        assert_eq!(config.port, 6667);
        assert_eq!(config.debounce_window(), Duration::from_secs(60));
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.category_filter(), CategoryFilter::All);
        assert_eq!(config.quit_message, DEFAULT_QUIT_MESSAGE);
    }

    #[test]
    fn test_full_toml() {
        let config = BotConfig::from_toml_str(
            r##"
identity = "buildbot"
credential = "s3cret"
channel = "#scummvm"
host = "irc.example.org"
port = 6697
categories = ["ports", "tools"]
debounce_window_secs = 30
lost_retry_delay_secs = 5
failed_retry_delay_secs = 120
status_url = "http://buildbot.example.org/"
colors = false
"##,
        )
        .unwrap();
        assert_eq!(config.credential.as_deref(), Some("s3cret"));
        assert_eq!(config.port, 6697);
        assert_eq!(config.category_filter(), CategoryFilter::only(["ports", "tools"]));
        assert_eq!(config.debounce_window(), Duration::from_secs(30));
        let policy = config.reconnect_policy();
        assert_eq!(policy.lost_delay, Duration::from_secs(5));
        assert_eq!(policy.failed_delay, Duration::from_secs(120));
        assert!(!config.colors);
    }

    #[test]
    fn test_validation_rejects_bad_channel_and_identity() {
        let mut config = BotConfig::new("buildbot", "scummvm", "irc.example.org");
        assert!(matches!(config.validate(), Err(HeraldError::Config(_))));

        config.channel = "#scummvm".to_string();
        config.identity = "build bot".to_string();
        assert!(matches!(config.validate(), Err(HeraldError::Config(_))));

        config.identity = "buildbot".to_string();
        config.port = 0;
        assert!(matches!(config.validate(), Err(HeraldError::Config(_))));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = BotConfig::from_toml_str(
            r##"
identity = "buildbot"
channel = "#scummvm"
host = "irc.example.org"
stable_timer = 60
"##,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ConfigParseError");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "identity = \"buildbot\"").unwrap();
        writeln!(file, "channel = \"&builds\"").unwrap();
        writeln!(file, "host = \"localhost\"").unwrap();
        let config = BotConfig::load(file.path()).unwrap();
        assert_eq!(config.channel, "&builds");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = BotConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert_eq!(err.kind(), "IoError");
    }
}
