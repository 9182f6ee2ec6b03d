//! Build Herald core library
//!
//! Turns a stream of buildbot builder events into debounced status reports
//! and delivers them to a chat channel, reconnecting as needed.

pub mod aggregator;
pub mod bot;
pub mod commands;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod feed;
pub mod obs;
pub mod registry;
pub mod report;
pub mod session;
pub mod supervisor;
pub mod telemetry;
pub mod timer;
pub mod tracker;
pub mod transport;

/// Version reported by the `version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use aggregator::{DebounceAggregator, PendingReport, ReportSnapshot, DEFAULT_WINDOW};
pub use bot::{BotEvent, BotHandle, StatusBot};
pub use commands::{CommandContext, CommandHandler, CommandRegistry, Reply, ScheduledReply};
pub use config::BotConfig;
pub use detector::{detect, Direction, Edge};
pub use domain::{BuildEvent, BuildEventKind, BuildResult, BuilderSnapshot, BuilderState};
pub use error::{HeraldError, Result};
pub use feed::{pump_json_lines, BuildEventFeed, EventHandler, SubscriptionId};
pub use registry::{all_idle, failing_builders, BuilderRegistry, CategoryFilter, MemoryRegistry};
pub use report::{format_status, ReportFormatter};
pub use session::{Session, SessionManager};
pub use supervisor::{ConnectionState, Outcome, ReconnectPolicy, ReconnectSupervisor};
pub use telemetry::init_tracing;
pub use timer::{ReschedulableTimer, TimerToken};
pub use tracker::{DueReport, FeedEvent, StatusTracker};
pub use transport::{ChatEvent, ChatTransport, Connector};
