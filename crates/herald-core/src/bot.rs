//! The status bot actor.
//!
//! One task owns all mutable state (pending report, connection state, chat
//! session) and processes [`BotEvent`]s strictly one at a time. Build events,
//! inbound chat traffic, connect outcomes and timer firings all arrive on the
//! same channel, so nothing is ever mutated concurrently.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn, Instrument, Span};

use crate::commands::{CommandRegistry, Reply, ScheduledReply};
use crate::config::BotConfig;
use crate::domain::BuildEvent;
use crate::error::Result;
use crate::feed::{BuildEventFeed, EventHandler, SubscriptionId};
use crate::obs;
use crate::registry::BuilderRegistry;
use crate::report::ReportFormatter;
use crate::session::SessionManager;
use crate::supervisor::{ConnectionState, ReconnectSupervisor};
use crate::timer::{ReschedulableTimer, TimerToken};
use crate::tracker::{FeedEvent, StatusTracker};
use crate::transport::{ChatEvent, ChatTransport, Connector};

/// Everything the bot reacts to.
pub enum BotEvent {
    Build(FeedEvent),
    Chat {
        connection: u64,
        event: ChatEvent,
    },
    Connected {
        connection: u64,
        transport: Arc<dyn ChatTransport>,
    },
    ConnectFailed {
        connection: u64,
        reason: String,
    },
    ConnectionLost {
        connection: u64,
        reason: String,
    },
    ReportDue(TimerToken),
    ReconnectDue(TimerToken),
    DelayedReply {
        connection: u64,
        reply: Reply,
    },
    Shutdown {
        reason: String,
    },
}

/// Cloneable handle for feeding and stopping a running [`StatusBot`].
#[derive(Clone)]
pub struct BotHandle {
    tx: UnboundedSender<BotEvent>,
    registry: Arc<dyn BuilderRegistry>,
}

impl BotHandle {
    /// Hand a build event to the bot. The registry must already reflect it.
    pub fn send_build_event(&self, event: &BuildEvent) -> bool {
        let captured = FeedEvent::capture(event, self.registry.as_ref());
        self.tx.send(BotEvent::Build(captured)).is_ok()
    }

    /// A feed handler forwarding every event to the bot.
    pub fn feed_handler(&self) -> EventHandler {
        let handle = self.clone();
        Arc::new(move |event: &BuildEvent| {
            if !handle.send_build_event(event) {
                debug!("bot stopped, dropping build event");
            }
        })
    }

    /// Subscribe the bot to every event kind on `feed`.
    pub fn subscribe(&self, feed: &BuildEventFeed) -> Vec<SubscriptionId> {
        feed.subscribe_all(self.feed_handler())
    }

    /// Request a graceful shutdown. Returns false if the bot already stopped.
    pub fn shutdown(&self, reason: &str) -> bool {
        self.tx
            .send(BotEvent::Shutdown {
                reason: reason.to_string(),
            })
            .is_ok()
    }
}

pub struct StatusBot {
    config: BotConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<dyn BuilderRegistry>,
    commands: Arc<CommandRegistry>,
    formatter: ReportFormatter,
    tracker: StatusTracker<BotEvent>,
    supervisor: ReconnectSupervisor<BotEvent>,
    session: Option<SessionManager>,
    /// Span of the live session, `Span::none()` between connections.
    span: Span,
    /// Id of the current (or most recent) connection attempt.
    connection: u64,
    connect_in_flight: bool,
    tx: UnboundedSender<BotEvent>,
    rx: UnboundedReceiver<BotEvent>,
}

impl StatusBot {
    pub fn new(
        config: BotConfig,
        registry: Arc<dyn BuilderRegistry>,
        connector: Arc<dyn Connector>,
    ) -> (Self, BotHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracker = StatusTracker::new(
            registry.clone(),
            config.category_filter(),
            config.debounce_window(),
            ReschedulableTimer::new(tx.clone(), BotEvent::ReportDue),
        );
        let supervisor = ReconnectSupervisor::new(
            config.reconnect_policy(),
            ReschedulableTimer::new(tx.clone(), BotEvent::ReconnectDue),
        );
        let handle = BotHandle {
            tx: tx.clone(),
            registry: registry.clone(),
        };
        let bot = Self {
            formatter: ReportFormatter::new(config.status_url.clone(), config.colors),
            config,
            connector,
            registry,
            commands: Arc::new(CommandRegistry::builtin()),
            tracker,
            supervisor,
            session: None,
            span: Span::none(),
            connection: 0,
            connect_in_flight: false,
            tx,
            rx,
        };
        (bot, handle)
    }

    /// Replace the built-in command table.
    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = Arc::new(commands);
        self
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Connect and process events until shutdown completes.
    pub async fn run(mut self) -> Result<()> {
        info!(
            host = %self.config.host,
            port = self.config.port,
            nickname = %self.config.identity,
            channel = %self.config.channel,
            "status bot starting"
        );
        self.start_attempt();

        while let Some(event) = self.rx.recv().await {
            self.handle(event).await;
            if self.supervisor.is_shutting_down() && !self.connect_in_flight {
                break;
            }
        }
        info!("status bot stopped");
        Ok(())
    }

    fn start_attempt(&mut self) {
        if !self.supervisor.begin_attempt() {
            return;
        }
        self.connection += 1;
        self.connect_in_flight = true;

        let connection = self.connection;
        let connector = self.connector.clone();
        let host = self.config.host.clone();
        let port = self.config.port;
        let nickname = self.config.identity.clone();
        let tx = self.tx.clone();
        info!(connection, host = %host, port, "connecting");

        tokio::spawn(async move {
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            match connector.connect(&host, port, &nickname, inbound_tx).await {
                Ok(transport) => {
                    if tx
                        .send(BotEvent::Connected {
                            connection,
                            transport,
                        })
                        .is_ok()
                    {
                        forward_inbound(connection, inbound_rx, tx).await;
                    }
                }
                Err(e) => {
                    let _ = tx.send(BotEvent::ConnectFailed {
                        connection,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    async fn handle(&mut self, event: BotEvent) {
        match event {
            BotEvent::Build(feed_event) => self.tracker.on_feed_event(&feed_event),
            BotEvent::Chat { connection, event } => self.on_chat(connection, event).await,
            BotEvent::Connected {
                connection,
                transport,
            } => self.on_connected(connection, transport).await,
            BotEvent::ConnectFailed { connection, reason } => {
                if connection == self.connection {
                    self.connect_in_flight = false;
                    warn!(connection, reason = %reason, "connection attempt failed");
                    self.supervisor.on_connection_failed(&reason);
                }
            }
            BotEvent::ConnectionLost { connection, reason } => {
                if connection != self.connection {
                    debug!(connection, "ignoring loss of stale connection");
                    return;
                }
                warn!(connection, reason = %reason, "connection lost");
                self.session = None;
                self.span = Span::none();
                self.supervisor.on_connection_lost(&reason);
            }
            BotEvent::ReportDue(token) => self.on_report_due(token).await,
            BotEvent::ReconnectDue(token) => {
                if self.supervisor.accept_retry(token) {
                    self.start_attempt();
                }
            }
            BotEvent::DelayedReply { connection, reply } => {
                if connection != self.connection {
                    return;
                }
                if let Some(session) = &self.session {
                    let delivered = session.deliver(&reply).instrument(self.span.clone()).await;
                    if let Err(e) = delivered {
                        warn!(error = %e, "failed to deliver delayed reply");
                    }
                }
            }
            BotEvent::Shutdown { reason } => self.on_shutdown(&reason).await,
        }
    }

    async fn on_connected(&mut self, connection: u64, transport: Arc<dyn ChatTransport>) {
        if connection == self.connection {
            self.connect_in_flight = false;
        }
        if connection != self.connection || !self.supervisor.on_connected() {
            info!(connection, "shutting down, closing fresh connection");
            if let Err(e) = transport.disconnect(&self.config.quit_message).await {
                debug!(error = %e, "failed to close fresh connection");
            }
            return;
        }

        self.span = obs::session_span(&self.config.identity, connection);
        self.span.in_scope(|| info!("connected"));
        self.session = Some(SessionManager::new(
            &self.config,
            transport,
            self.commands.clone(),
            self.registry.clone(),
        ));
    }

    async fn on_chat(&mut self, connection: u64, event: ChatEvent) {
        if connection != self.connection {
            debug!(connection, "ignoring event from stale connection");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let replies = session
            .handle_event(event)
            .instrument(self.span.clone())
            .await;
        self.schedule_replies(connection, replies);
    }

    fn schedule_replies(&self, connection: u64, replies: Vec<ScheduledReply>) {
        for scheduled in replies {
            let tx = self.tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(scheduled.delay).await;
                let _ = tx.send(BotEvent::DelayedReply {
                    connection,
                    reply: scheduled.reply,
                });
            });
        }
    }

    async fn on_report_due(&mut self, token: TimerToken) {
        let Some(due) = self.tracker.on_timer(token) else {
            return;
        };
        let message = self.formatter.format(&due.snapshot, &due.current_failures);
        let span = self.span.clone();
        match &self.session {
            Some(session) => match session.say(&message).instrument(span).await {
                Ok(()) => obs::emit_report_sent(
                    due.snapshot.succeeded.len(),
                    due.snapshot.failed.len(),
                    due.snapshot.revision.as_deref(),
                ),
                Err(e) => {
                    warn!(error = %e, "failed to send status report");
                    obs::emit_report_dropped(&message);
                }
            },
            None => obs::emit_report_dropped(&message),
        }
    }

    async fn on_shutdown(&mut self, reason: &str) {
        info!(reason = %reason, "shutdown requested");
        let was_connected = self.supervisor.request_shutdown();
        let span = std::mem::replace(&mut self.span, Span::none());
        if let Some(session) = self.session.take() {
            if was_connected {
                if let Err(e) = session.quit(reason).instrument(span).await {
                    warn!(error = %e, "failed to disconnect cleanly");
                }
            }
        }
    }
}

/// Forward one connection's inbound events, tagged with its id, and report
/// the loss once the transport closes the channel.
async fn forward_inbound(
    connection: u64,
    mut inbound: UnboundedReceiver<ChatEvent>,
    tx: UnboundedSender<BotEvent>,
) {
    let mut reason = "connection closed".to_string();
    while let Some(event) = inbound.recv().await {
        if let ChatEvent::Disconnected { reason: r } = event {
            reason = r;
            continue;
        }
        if tx.send(BotEvent::Chat { connection, event }).is_err() {
            return;
        }
    }
    let _ = tx.send(BotEvent::ConnectionLost { connection, reason });
}
