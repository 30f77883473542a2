use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use huddle_client::{
    MediaPolicy, RoomEvent, RtcTransportFactory, SessionConfig, SessionController, SessionHandle,
    VirtualDevices,
};
use huddle_core::utils::CHAT_HISTORY_LIMIT;
use huddle_core::{Participant, ParticipantId, RoomId};
use huddle_server::ServerConfig;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(version, about = "Multi-party room sessions over a signaling relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: SocketAddr,

        /// Chat messages kept per room for newcomers.
        #[arg(long, default_value_t = CHAT_HISTORY_LIMIT)]
        history: usize,
    },

    /// Join a room from the terminal.
    Join {
        #[arg(short, long)]
        room: String,

        /// Display name; asked for when omitted.
        #[arg(short, long)]
        name: Option<String>,

        /// Participant id; random when omitted.
        #[arg(long)]
        id: Option<String>,

        /// Relay base URL. Overrides the config file.
        #[arg(long)]
        url: Option<String>,

        /// Session settings as JSON.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Join without camera and microphone.
        #[arg(long)]
        receive_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Serve { bind, history } => serve(bind, history).await,
        Commands::Join {
            room,
            name,
            id,
            url,
            config,
            receive_only,
        } => {
            let mut session_config = match config {
                Some(path) => {
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    SessionConfig::from_json(&raw).context("Invalid session config")?
                }
                None => SessionConfig::default(),
            };
            if let Some(url) = url {
                session_config.signaling_url = url;
            }

            let name = match name {
                Some(name) => name,
                None => Input::<String>::new()
                    .with_prompt("Display name")
                    .interact_text()?,
            };
            let id = id.map(ParticipantId::from).unwrap_or_else(ParticipantId::random);

            join(session_config, RoomId::from(room), Participant::new(id, name), receive_only).await
        }
    }
}

async fn serve(bind: SocketAddr, history: usize) -> Result<()> {
    let config = ServerConfig {
        bind,
        chat_history_limit: history,
    };
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    println!("{}", format!("📡 Relay listening on {}", config.bind).green().bold());
    huddle_server::serve(listener, config).await
}

async fn join(
    mut config: SessionConfig,
    room: RoomId,
    me: Participant,
    receive_only: bool,
) -> Result<()> {
    let devices = if receive_only {
        config.media_policy = MediaPolicy::ContinueWithout;
        VirtualDevices::denying()
    } else {
        VirtualDevices::new()
    };
    let factory = RtcTransportFactory::new(config.ice_servers.clone());

    println!("{}", format!("🚀 Joining '{}' as {}...", room, me.display_name).cyan());
    let (session, mut events) =
        SessionController::join(config, room.clone(), me, Arc::new(devices), Arc::new(factory))
            .await
            .context("Failed to join room")?;

    println!("{}", format!("✨ Joined '{}'", room).green().bold());
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_line(&session, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },

            event = events.recv() => match event {
                Some(RoomEvent::Disconnected { reason }) => {
                    println!("{}", format!("❌ Disconnected: {reason}").red().bold());
                    return Ok(());
                }
                Some(event) => print_event(&session, &event),
                None => break,
            },
        }
    }

    match session.leave().await {
        Ok(report) => {
            info!(?report, "Left room");
            println!(
                "{}",
                format!(
                    "👋 Left: {} sessions closed, {} tracks released",
                    report.sessions_closed, report.tracks_released
                )
                .yellow()
            );
        }
        Err(e) => println!("{}", format!("Session already ended: {e}").yellow()),
    }
    Ok(())
}

/// Returns false when the user asked to leave.
async fn handle_line(session: &SessionHandle, line: &str) -> bool {
    match line {
        "" => {}
        "/leave" | "/quit" => return false,
        "/help" => print_help(),
        "/cam" => report_toggle("Camera", session.toggle_camera().await),
        "/mic" => report_toggle("Microphone", session.toggle_mic().await),
        "/screen" => report_toggle("Screen share", session.toggle_screen_share().await),
        "/who" => {
            let view = session.room_view();
            for p in &view.participants {
                let peer = view
                    .peer_state(&p.id)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "you".to_owned());
                println!(
                    "   {} ({}) cam:{} mic:{} screen:{} [{}]",
                    p.display_name.bold(),
                    p.id,
                    p.media_state.camera_on,
                    p.media_state.mic_on,
                    p.media_state.screen_sharing,
                    peer
                );
            }
        }
        cmd if cmd.starts_with('/') => {
            println!("{}", format!("Unknown command {cmd}, try /help").red());
        }
        text => {
            if let Err(e) = session.send_chat(text).await {
                println!("{}", format!("Failed to send: {e}").red());
            }
        }
    }
    true
}

fn report_toggle(what: &str, result: Result<bool, huddle_client::SessionError>) {
    match result {
        Ok(true) => println!("{}", format!("{what} on").green()),
        Ok(false) => println!("{}", format!("{what} off").yellow()),
        Err(e) => println!("{}", format!("{what}: {e}").red()),
    }
}

fn print_event(session: &SessionHandle, event: &RoomEvent) {
    let name_of = |id: &ParticipantId| {
        session
            .room_view()
            .participant(id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| id.to_string())
    };

    match event {
        RoomEvent::RosterReplaced { participants } => {
            println!("{}", format!("👥 {} in the room", participants.len()).cyan());
        }
        RoomEvent::ParticipantJoined(p) => {
            println!("{}", format!("➕ {} joined", p.display_name).cyan());
        }
        RoomEvent::ParticipantLeft(id) => {
            println!("{}", format!("➖ {} left", id).cyan());
        }
        RoomEvent::ChatReceived(msg) => {
            let from = if msg.from == *session.me() {
                "you".bold()
            } else {
                name_of(&msg.from).bold()
            };
            println!("[{}] {}: {}", msg.timestamp.format("%H:%M:%S"), from, msg.content);
        }
        RoomEvent::MediaStateChanged { participant, state } => {
            if participant != session.me() {
                println!(
                    "{}",
                    format!(
                        "🎛  {} cam:{} mic:{} screen:{}",
                        name_of(participant),
                        state.camera_on,
                        state.mic_on,
                        state.screen_sharing
                    )
                    .dimmed()
                );
            }
        }
        RoomEvent::PeerStateChanged { participant, state } => {
            println!("{}", format!("🔗 {}: {}", name_of(participant), state).dimmed());
        }
        RoomEvent::RemoteTrack { participant, track } => {
            println!(
                "{}",
                format!("📺 {} track from {}", track.kind, name_of(participant)).dimmed()
            );
        }
        RoomEvent::Unreachable {
            participant,
            reason,
        } => {
            println!(
                "{}",
                format!("⚠️  {} unreachable: {}", name_of(participant), reason).red()
            );
        }
        RoomEvent::Disconnected { reason } => {
            println!("{}", format!("❌ Disconnected: {reason}").red().bold());
        }
    }
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("   /cam /mic /screen   toggle camera, microphone, screen share");
    println!("   /who                list participants");
    println!("   /leave              leave the room");
    println!("   anything else       send as chat");
}
