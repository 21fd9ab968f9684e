//! IRC client used for Twitch chat (and the optional osu! Bancho link).
//!
//! One background task owns the socket. Callers talk to it through an
//! [`IrcClient`] handle: outbound commands go over an mpsc channel, inbound
//! lines come back as [`ChatEvent`]s. JOIN acknowledgements are matched to
//! waiting callers through a pending-join map.

use super::message::{Command, IrcLine};
use super::rate_limit::{SendLimiter, SendQuota};
use super::stream::ChatStream;
use super::{ChatSink, ChatTransport};
use crate::error::ChatError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn};

/// Longest line accepted from the server.
const MAX_LINE_LEN: usize = 8192;

/// Capacity of the inbound event channel.
const EVENT_BUFFER: usize = 1024;

/// Connection settings for one IRC network.
#[derive(Debug, Clone)]
pub struct IrcConfig {
    /// `host:port`
    pub address: String,
    pub tls: bool,
    pub nick: String,
    pub password: Option<String>,
    /// Capabilities requested after login (Twitch tags/commands/membership).
    pub capabilities: Vec<String>,
    pub send_quota: SendQuota,
    /// Reconnect backoff.
    pub reconnect: RetryPolicy,
}

/// Something the connection task reports upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Login completed (numeric 001).
    Connected,
    /// Any line not consumed by the client itself.
    Line(IrcLine),
    /// The connection dropped; every joined channel is gone.
    Disconnected,
}

/// State shared between handles and the connection task.
#[derive(Debug)]
struct Shared {
    nick: String,
    joined: DashSet<String>,
    pending_joins: DashMap<String, oneshot::Sender<()>>,
}

/// Handle to a running IRC connection.
#[derive(Clone)]
pub struct IrcClient {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Command>,
    limiter: Arc<SendLimiter>,
}

impl IrcClient {
    /// Start the connection task.
    ///
    /// The task reconnects with backoff until every handle is dropped, or
    /// returns an error when the server rejects our credentials.
    pub fn spawn(
        config: IrcConfig,
    ) -> (
        IrcClient,
        mpsc::Receiver<ChatEvent>,
        JoinHandle<Result<(), ChatError>>,
    ) {
        let shared = Arc::new(Shared {
            nick: config.nick.to_lowercase(),
            joined: DashSet::new(),
            pending_joins: DashMap::new(),
        });
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let client = IrcClient {
            shared: Arc::clone(&shared),
            outbound: outbound_tx,
            limiter: Arc::new(SendLimiter::new(config.send_quota)),
        };
        let task = tokio::spawn(run_connection(config, shared, outbound_rx, event_tx));
        (client, event_rx, task)
    }

    pub fn nick(&self) -> &str {
        &self.shared.nick
    }

    /// Channels the server has confirmed we are in.
    pub fn joined_channels(&self) -> Vec<String> {
        self.shared.joined.iter().map(|c| c.key().clone()).collect()
    }

    fn queue(&self, command: Command) -> Result<(), ChatError> {
        self.outbound.send(command).map_err(|_| ChatError::Closed)
    }

    /// Send a private message to a user (no `#` prefix), rate limited per target.
    pub async fn send_private(&self, target: &str, text: &str) -> Result<(), ChatError> {
        // Bancho maps spaces in usernames to underscores.
        let target = target.replace(' ', "_");
        self.limiter.prune_idle();
        self.limiter.until_ready(&target).await;
        self.queue(Command::Privmsg {
            target,
            text: text.to_owned(),
        })
    }
}

#[async_trait]
impl ChatTransport for IrcClient {
    async fn join(&self, channel: &str) -> Result<(), ChatError> {
        let channel = channel.to_lowercase();
        if self.shared.joined.contains(&channel) {
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        self.shared.pending_joins.insert(channel.clone(), tx);
        self.queue(Command::Join(channel))?;
        rx.await.map_err(|_| ChatError::Closed)
    }

    async fn part(&self, channel: &str) -> Result<(), ChatError> {
        let channel = channel.to_lowercase();
        self.shared.joined.remove(&channel);
        self.shared.pending_joins.remove(&channel);
        self.limiter.remove(&format!("#{channel}"));
        self.queue(Command::Part(channel))
    }
}

#[async_trait]
impl ChatSink for IrcClient {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        let target = format!("#{}", channel.to_lowercase());
        self.limiter.until_ready(&target).await;
        self.queue(Command::Privmsg {
            target,
            text: text.to_owned(),
        })
    }
}

/// Outcome of a single session.
enum SessionEnd {
    /// Every handle was dropped; stop for good.
    Shutdown,
    /// Connection lost; reconnect.
    Lost { registered: bool },
}

async fn run_connection(
    config: IrcConfig,
    shared: Arc<Shared>,
    mut outbound: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<ChatEvent>,
) -> Result<(), ChatError> {
    let mut failures: u32 = 0;

    loop {
        let outcome = match ChatStream::connect(&config.address, config.tls).await {
            Ok(stream) => {
                info!(address = %config.address, tls = stream.is_tls(), nick = %config.nick, "Chat connection established");
                let mut framed =
                    Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));
                run_session(&config, &shared, &mut framed, &mut outbound, &events).await
            }
            Err(e) => Err(e),
        };

        shared.joined.clear();
        shared.pending_joins.clear();

        match outcome {
            Ok(SessionEnd::Shutdown) => {
                info!(address = %config.address, "Chat client shut down");
                return Ok(());
            }
            Err(e @ ChatError::LoginRejected(_)) => {
                error!(address = %config.address, error = %e, "Chat login rejected");
                return Err(e);
            }
            Ok(SessionEnd::Lost { registered }) => {
                if registered {
                    failures = 0;
                }
                warn!(address = %config.address, "Chat connection lost");
            }
            Err(e) => {
                warn!(address = %config.address, error = %e, "Chat connection failed");
            }
        }

        if events.send(ChatEvent::Disconnected).await.is_err() {
            return Ok(());
        }

        let delay = config.reconnect.backoff(failures);
        failures = failures.saturating_add(1);
        info!(?delay, "Reconnecting to chat");
        tokio::time::sleep(delay).await;
    }
}

async fn run_session(
    config: &IrcConfig,
    shared: &Shared,
    framed: &mut Framed<ChatStream, LinesCodec>,
    outbound: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::Sender<ChatEvent>,
) -> Result<SessionEnd, ChatError> {
    if let Some(password) = &config.password {
        framed.send(Command::Pass(password.clone()).to_string()).await?;
    }
    framed.send(Command::Nick(config.nick.clone()).to_string()).await?;
    if !config.capabilities.is_empty() {
        framed
            .send(Command::CapReq(config.capabilities.clone()).to_string())
            .await?;
    }

    let mut registered = false;
    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(command) => {
                    debug!(line = %command, "chat >>");
                    framed.send(command.to_string()).await?;
                }
                None => return Ok(SessionEnd::Shutdown),
            },
            line = framed.next() => match line {
                Some(Ok(raw)) => {
                    let line: IrcLine = match raw.parse() {
                        Ok(line) => line,
                        Err(e) => {
                            debug!(raw = %raw, error = %e, "Ignoring unparsable line");
                            continue;
                        }
                    };
                    match handle_line(shared, framed, line).await? {
                        Handled::Consumed => {}
                        Handled::Welcome => {
                            registered = true;
                            if events.send(ChatEvent::Connected).await.is_err() {
                                return Ok(SessionEnd::Shutdown);
                            }
                        }
                        Handled::Reconnect => return Ok(SessionEnd::Lost { registered }),
                        Handled::Forward(line) => {
                            if events.send(ChatEvent::Line(line)).await.is_err() {
                                return Ok(SessionEnd::Shutdown);
                            }
                        }
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Lost { registered }),
            },
        }
    }
}

enum Handled {
    Consumed,
    Welcome,
    Reconnect,
    Forward(IrcLine),
}

fn is_login_failure(text: &str) -> bool {
    text.contains("Login authentication failed")
        || text.contains("Improperly formatted auth")
        || text.contains("Bad password")
}

async fn handle_line(
    shared: &Shared,
    framed: &mut Framed<ChatStream, LinesCodec>,
    line: IrcLine,
) -> Result<Handled, ChatError> {
    let from_self = line
        .nick()
        .is_some_and(|nick| nick.eq_ignore_ascii_case(&shared.nick));

    match line.command.as_str() {
        "PING" => {
            let token = line.trailing().unwrap_or_default().to_owned();
            framed.send(Command::Pong(token).to_string()).await?;
            Ok(Handled::Consumed)
        }
        "001" => Ok(Handled::Welcome),
        "RECONNECT" => Ok(Handled::Reconnect),
        "464" => Err(ChatError::LoginRejected(
            line.trailing().unwrap_or("password incorrect").to_owned(),
        )),
        "NOTICE" if line.trailing().is_some_and(is_login_failure) => Err(
            ChatError::LoginRejected(line.trailing().unwrap_or_default().to_owned()),
        ),
        "JOIN" if from_self => {
            if let Some(channel) = line.param(0).map(|c| c.trim_start_matches('#').to_lowercase()) {
                debug!(channel = %channel, "join acknowledged");
                shared.joined.insert(channel.clone());
                if let Some((_, waiter)) = shared.pending_joins.remove(&channel) {
                    let _ = waiter.send(());
                }
            }
            Ok(Handled::Consumed)
        }
        "PART" if from_self => {
            if let Some(channel) = line.param(0).map(|c| c.trim_start_matches('#').to_lowercase()) {
                shared.joined.remove(&channel);
            }
            Ok(Handled::Consumed)
        }
        _ => Ok(Handled::Forward(line)),
    }
}
