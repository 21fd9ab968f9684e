//! maprelay daemon entry point.

use maprelay::chat::{ChatEvent, ChatMessage, IrcClient, IrcConfig, SendQuota};
use maprelay::commands::{CommandExecutor, serve_private_messages};
use maprelay::config::Config;
use maprelay::db::Database;
use maprelay::fleet::{FleetController, PushClient};
use maprelay::membership::ChannelMembershipController;
use maprelay::providers::{OsuApi, TwitchHelix, http_client};
use maprelay::request::{AdmissionPipeline, CooldownTracker, RequestDispatcher, RequestHandler};
use maprelay::{fleet, http, metrics, telemetry};
use std::fmt::Display;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};

/// Capabilities needed for badges, points redemptions and JOIN echoes.
const TWITCH_CAPABILITIES: [&str; 3] = ["twitch.tv/tags", "twitch.tv/commands", "twitch.tv/membership"];

/// Buffered desired sets between the local receiver and the controller.
const DESIRED_BUFFER: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Tracing is configured from the file, so load errors go to stderr.
    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("Failed to load config {config_path}: {e}");
        e
    })?;

    telemetry::init_tracing(&config.log);
    info!(
        nick = %config.bot.nick,
        testing = config.bot.testing,
        fleet = config.fleet.enabled,
        "Starting maprelay"
    );

    metrics::init();
    if let Some(port) = config.metrics.port {
        tokio::spawn(http::run_http_server(port));
        info!(port, "Prometheus HTTP server started");
    } else {
        info!("Metrics endpoint disabled");
    }

    let db = Database::new(&config.database.path).await?;
    let users = Arc::new(db.users());
    let statistics = Arc::new(db.statistics());

    let http = http_client(config.twitch.http_timeout());
    let helix = Arc::new(TwitchHelix::new(
        http.clone(),
        config.twitch.helix(),
        config.retry,
    ));
    let lookups = Arc::new(OsuApi::new(
        http.clone(),
        config.osu.client("public"),
        config.retry,
    ));
    let game_chat = Arc::new(OsuApi::new(
        http,
        config.osu.client("delegate chat.write"),
        config.retry,
    ));

    // Twitch chat connection
    let (chat, mut chat_events, chat_task) = IrcClient::spawn(IrcConfig {
        address: config.twitch.address.clone(),
        tls: config.twitch.tls,
        nick: config.bot.nick.clone(),
        password: Some(config.twitch.irc_password()),
        capabilities: TWITCH_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        send_quota: config.twitch.send_quota(),
        reconnect: config.retry,
    });
    let chat = Arc::new(chat);

    let controller = Arc::new(ChannelMembershipController::new(
        chat.clone(),
        config.membership.controller(),
    ));

    let handler = Arc::new(RequestHandler::new(
        &config.bot.nick,
        config.bot.testing,
        users.clone(),
        lookups,
        chat.clone(),
        AdmissionPipeline::new(helix.clone(), Arc::new(CooldownTracker::new())),
        RequestDispatcher::new(chat.clone(), game_chat, statistics.clone()),
    ));

    // Connection lifecycle is applied in order: forget on drop, resync on login.
    let (lifecycle_tx, mut lifecycle_rx) = mpsc::unbounded_channel::<bool>();
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            while let Some(connected) = lifecycle_rx.recv().await {
                if connected {
                    controller.resync().await;
                } else {
                    controller.forget_all().await;
                }
            }
        });
    }

    tokio::spawn(async move {
        while let Some(event) = chat_events.recv().await {
            match event {
                ChatEvent::Connected => {
                    let _ = lifecycle_tx.send(true);
                }
                ChatEvent::Disconnected => {
                    let _ = lifecycle_tx.send(false);
                }
                ChatEvent::Line(line) => {
                    let Some(message) = ChatMessage::from_line(&line) else {
                        continue;
                    };
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        handler.handle(&message).await;
                    });
                }
            }
        }
    });

    // Desired-set transport: the receiver always runs; the poller is optional.
    let listener = TcpListener::bind(&config.fleet.address).await?;
    let (desired_tx, desired_rx) = mpsc::channel(DESIRED_BUFFER);
    let receiver_task = tokio::spawn(fleet::serve(
        listener,
        config.fleet.stall_timeout(),
        desired_tx,
    ));
    tokio::spawn(Arc::clone(&controller).run(desired_rx));

    let fleet_task = if config.fleet.enabled {
        let push = PushClient::connect(&config.fleet.address).await?;
        let fleet = FleetController::new(users.clone(), helix, config.fleet.controller());
        Some(tokio::spawn(async move { fleet.run(push).await }))
    } else {
        info!("Fleet poller disabled; waiting for an external pusher");
        None
    };

    // osu! in-game commands
    if let Some(bancho) = &config.bancho {
        let (client, events, bancho_task) = IrcClient::spawn(IrcConfig {
            address: bancho.address.clone(),
            tls: bancho.tls,
            nick: bancho.nick.clone(),
            password: Some(bancho.password.clone()),
            capabilities: Vec::new(),
            send_quota: SendQuota::default(),
            reconnect: config.retry,
        });
        let executor = Arc::new(CommandExecutor::new(
            users.clone(),
            statistics.clone(),
            config.bot.registration_url.clone(),
        ));
        tokio::spawn(serve_private_messages(executor, client, events, config.bot.testing));
        tokio::spawn(async move {
            if let Err(e) = flatten(bancho_task.await) {
                error!(error = %e, "Bancho connection ended; in-game commands unavailable");
            }
        });
    } else {
        info!("No [bancho] section; in-game commands disabled");
    }

    let fleet_exit = async {
        match fleet_task {
            Some(task) => flatten(task.await),
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown requested");
            Ok(())
        }
        result = chat_task => critical("chat connection", flatten(result)),
        result = receiver_task => critical("desired-set receiver", flatten(result)),
        result = fleet_exit => critical("fleet poller", result),
    }
}

fn flatten<E: Display>(result: Result<Result<(), E>, JoinError>) -> Result<(), String> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("task panicked: {e}")),
    }
}

/// A critical task ended; exit so the supervisor restarts the process.
fn critical(name: &str, result: Result<(), String>) -> anyhow::Result<()> {
    match result {
        Ok(()) => {
            warn!(task = name, "Critical task exited");
            Err(anyhow::anyhow!("{name} exited"))
        }
        Err(e) => {
            error!(task = name, error = %e, "Critical task failed");
            Err(anyhow::anyhow!("{name} failed: {e}"))
        }
    }
}
