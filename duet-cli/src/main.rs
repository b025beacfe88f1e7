use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use duet_client::{ClientEvent, ClientSessionController, ControllerCommand, Slot, WebRtcFactory};
use duet_core::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "duet", version, about = "Terminal client for duet calls")]
struct Cli {
    /// Signaling endpoint
    #[arg(long, env = "DUET_SERVER", default_value = "ws://127.0.0.1:3000/ws", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a room (a short id is generated when --room is omitted)
    Create {
        #[arg(long)]
        room: Option<String>,

        #[arg(long)]
        name: Option<String>,
    },
    /// Join an existing room
    Join {
        #[arg(long)]
        room: String,

        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duet_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let first = match cli.command {
        Commands::Create { room, name } => ControllerCommand::CreateRoom {
            room_id: room,
            display_name: resolve_name(name).await?,
        },
        Commands::Join { room, name } => ControllerCommand::JoinRoom {
            room_id: room,
            display_name: resolve_name(name).await?,
        },
    };

    let (ws, _) = tokio_tungstenite::connect_async(cli.server.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", cli.server))?;
    println!("{} {}", "Connected to".green(), cli.server.bold());
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<ClientEvent>();
    let (server_tx, server_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControllerCommand>();

    let (controller, peer_rx) =
        ClientSessionController::new(Arc::new(WebRtcFactory), out_tx, ui_tx);
    let mut controller_task = tokio::spawn(controller.run(server_rx, peer_rx, cmd_rx));

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(frame) => {
                        if server_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Unreadable server frame: {}", e),
                },
                Message::Close(_) => break,
                other => debug!("Ignoring frame {:?}", other),
            }
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = ui_rx.recv().await {
            if let Some(line) = describe(&event) {
                println!("{line}");
            }
        }
    });

    cmd_tx
        .send(first)
        .map_err(|_| anyhow::anyhow!("Session controller stopped"))?;

    let typed_quit = tokio::select! {
        res = read_commands(cmd_tx) => {
            res?;
            true
        }
        _ = &mut controller_task => false,
    };
    if typed_quit {
        let _ = controller_task.await;
    } else {
        println!("{}", "Connection to server lost.".red());
    }

    let _ = writer.await;
    reader.abort();
    let _ = printer.await;
    Ok(())
}

async fn resolve_name(name: Option<String>) -> Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }
    let prompted = tokio::task::spawn_blocking(|| {
        dialoguer::Input::<String>::new()
            .with_prompt("Your name")
            .interact_text()
    })
    .await??;
    Ok(prompted)
}

/// Tracks the local typing indicator around stdin lines.
#[derive(Debug, Default)]
struct Composer {
    typing: bool,
}

enum LineAction {
    Commands(Vec<ControllerCommand>),
    Quit,
}

impl Composer {
    /// Input for a new line has shown up.
    fn input_started(&mut self) -> Option<ControllerCommand> {
        if self.typing {
            return None;
        }
        self.typing = true;
        Some(ControllerCommand::SetTyping(true))
    }

    /// A full line was read. The indicator is cleared after whatever the line
    /// produced.
    fn line(&mut self, line: &str) -> LineAction {
        let mut commands = match line.trim() {
            "/quit" => return LineAction::Quit,
            "" => Vec::new(),
            "/leave" => vec![ControllerCommand::Leave],
            body => vec![ControllerCommand::SendChat {
                body: body.to_string(),
                file_ref: None,
            }],
        };
        if std::mem::take(&mut self.typing) {
            commands.push(ControllerCommand::SetTyping(false));
        }
        LineAction::Commands(commands)
    }
}

/// Turns stdin lines into commands until `/quit` or end of input.
async fn read_commands(cmd_tx: mpsc::UnboundedSender<ControllerCommand>) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin());
    let mut composer = Composer::default();
    loop {
        // resolves as soon as the terminal hands over any input
        if input.fill_buf().await?.is_empty() {
            break;
        }
        if let Some(cmd) = composer.input_started() {
            if cmd_tx.send(cmd).is_err() {
                break;
            }
        }

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            break;
        }
        let LineAction::Commands(commands) = composer.line(&line) else {
            break;
        };
        for cmd in commands {
            if cmd_tx.send(cmd).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn describe(event: &ClientEvent) -> Option<String> {
    let line = match event {
        ClientEvent::Connected { connection_id } => {
            format!("{} {}", "Connection id".dimmed(), connection_id.short())
        }
        ClientEvent::RoomCreated { room_id } => format!(
            "{} {} {}",
            "Room".green(),
            room_id.as_str().bold(),
            "created. Share the id so someone can join.".green()
        ),
        ClientEvent::RoomJoined {
            room_id,
            other_members,
            history,
            ..
        } => {
            let mut out = format!("{} {}", "Joined room".green(), room_id.as_str().bold());
            for member in other_members {
                out.push_str(&format!("\n  {} is here", member.display_name.as_str().cyan()));
            }
            for entry in history {
                out.push_str(&format!(
                    "\n  {} {}: {}",
                    entry.timestamp.format("%H:%M").to_string().dimmed(),
                    entry.display_name.as_str().cyan(),
                    entry.body
                ));
            }
            out
        }
        ClientEvent::Rejected { reason } => format!("{} {}", "✗".red(), reason.red()),
        ClientEvent::PeerJoined(member) => {
            format!("{} joined", member.display_name.as_str().cyan().bold())
        }
        ClientEvent::PeerLeft(member) => {
            format!("{} left", member.display_name.as_str().cyan())
        }
        ClientEvent::PeerOnline { .. } => "Call connected.".green().to_string(),
        ClientEvent::PeerOffline { state, .. } => {
            format!("{} ({:?})", "Peer is offline".yellow(), state)
        }
        ClientEvent::PeerIdentified { display_name, .. } => {
            format!("Peer is {}", display_name.as_str().cyan())
        }
        ClientEvent::ChatReceived { message, own } => {
            let name = if *own {
                "you".green().bold()
            } else {
                message.display_name.as_str().cyan().bold()
            };
            let mut out = format!(
                "{} {}: {}",
                message.timestamp.format("%H:%M").to_string().dimmed(),
                name,
                message.body
            );
            if let Some(file) = &message.file_ref {
                out.push_str(&format!(" [{}]", file.underline()));
            }
            out
        }
        ClientEvent::Typing {
            display_name,
            is_typing: true,
        } => format!("{} is typing…", display_name)
            .as_str()
            .dimmed()
            .to_string(),
        ClientEvent::Typing { .. } => return None,
        ClientEvent::LayoutChanged { primary, .. } => match primary {
            Some(Slot::Remote(_)) => "Showing remote video.".dimmed().to_string(),
            Some(Slot::Local) => "Showing local preview.".dimmed().to_string(),
            None => return None,
        },
        ClientEvent::ConnectionError { message, .. } => {
            format!("{} {}", "Peer connection error:".red(), message)
        }
        ClientEvent::Left => "Left the room.".yellow().to_string(),
    };
    Some(line)
}
