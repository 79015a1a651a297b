//! fate-chat - Terminal Surface for the Fate Reading Chat
//!
//! Drives one chat turn against the backend and prints the reply, or formats
//! local text the way the chat view would.
//!
//! # Usage
//!
//! ```bash
//! # Open a conversation from a chart
//! fate-chat start --paipan chart.json
//!
//! # Follow up in an existing conversation
//! fate-chat ask --conversation c-123 "今年事业如何？"
//! fate-chat ask --conversation c-123 --topic wealth
//!
//! # Use the non-streaming endpoint
//! fate-chat ask --conversation c-123 --no-stream "你好"
//!
//! # Format a saved reply
//! fate-chat render reply.txt
//! fate-chat render --json < reply.txt
//!
//! # Verbose logging
//! RUST_LOG=debug fate-chat start --paipan chart.json
//! ```
//!
//! # Signals
//!
//! - `Ctrl-C`: cancel the running turn

mod render;

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{debug, info, warn};

use chat_core::config::{load_config_from_path, default_config_path, ClientConfig, ConfigOverrides};
use chat_core::{
    render_reply, ChatScreen, OneShotClient, QuickTopic, RequestEnvelope, SessionError,
    SessionObserver, StreamingSession,
};

use render::{render_blocks, render_message, RenderOptions};

/// fate-chat - Chat with the fate reading assistant from a terminal
#[derive(Parser, Debug)]
#[command(name = "fate-chat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "FATE_CHAT_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Streaming endpoint (ws:// or wss://)
    #[arg(long, value_name = "URL", global = true)]
    ws_url: Option<String>,

    /// One-shot HTTP API base
    #[arg(long, value_name = "URL", global = true)]
    api_base: Option<String>,

    /// Bearer token
    #[arg(long, env = "FATE_CHAT_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "FATE_CHAT_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a new conversation from a chart payload
    Start {
        /// Chart JSON produced by the chart screen
        #[arg(long, value_name = "FILE")]
        paipan: PathBuf,

        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Send a message in an existing conversation
    Ask {
        /// Conversation id returned by `start`
        #[arg(long, value_name = "ID")]
        conversation: String,

        /// Quick-ask topic instead of a message
        /// (personality, avatar, partner_avatar, career, wealth, health, love_timing)
        #[arg(long, conflicts_with = "message")]
        topic: Option<QuickTopic>,

        /// Message text
        #[arg(required_unless_present = "topic")]
        message: Option<String>,

        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Format local text as the chat view would
    Render {
        /// Text file (stdin when omitted)
        file: Option<PathBuf>,

        /// Print the node tree as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct TurnArgs {
    /// Use the one-shot endpoint instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Treat the viewer as signed in (no redaction)
    #[arg(long)]
    authenticated: bool,

    /// Print the reply message as JSON
    #[arg(long)]
    json: bool,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("fate_chat={level},chat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn render_options() -> RenderOptions {
    let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let width = std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(80);
    RenderOptions { width, color }
}

/// Forwards session callbacks to the screen and shows progress on stderr
struct Progress<'a> {
    screen: &'a mut ChatScreen,
    live: bool,
}

impl SessionObserver for Progress<'_> {
    fn on_meta(&mut self, conversation_id: &str) {
        self.screen.on_meta(conversation_id);
    }

    fn on_reply_updated(&mut self, reply: &str) {
        if self.live {
            eprint!("\r… {} chars", reply.chars().count());
        }
        self.screen.on_reply_updated(reply);
    }

    fn on_finished(&mut self) {
        if self.live {
            eprintln!();
        }
        self.screen.on_finished();
    }

    fn on_failed(&mut self, error: &SessionError) {
        if self.live {
            eprintln!();
        }
        self.screen.on_failed(error);
    }
}

async fn run_streaming(config: &ClientConfig, screen: &mut ChatScreen, envelope: &RequestEnvelope) -> Result<()> {
    let channel = chat_core::transport::create_channel(&config.transport)
        .context("Failed to create chat channel")?;
    let mut session = StreamingSession::new(channel, config.transport.clone(), config.credentials());

    let canceller = session.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, cancelling turn");
            canceller.cancel();
        }
    });

    let mut progress = Progress {
        screen,
        live: std::io::stderr().is_terminal(),
    };
    let state = session.run(envelope, &mut progress).await?;
    debug!(?state, attempts = session.attempts(), "Streaming turn settled");
    Ok(())
}

async fn run_one_shot(config: &ClientConfig, screen: &mut ChatScreen, envelope: &RequestEnvelope) -> Result<()> {
    let client = OneShotClient::new(config.api_base.clone(), config.credentials())?;

    match envelope {
        RequestEnvelope::Start {
            paipan,
            kb_index_dir,
            kb_topk,
        } => match client.start(paipan, kb_index_dir, *kb_topk).await {
            Ok(reply) => screen.apply_start_reply(reply),
            Err(e) => screen.apply_one_shot_failure(&e),
        },
        RequestEnvelope::Send {
            conversation_id,
            message,
        } => match client.send(conversation_id, message).await {
            Ok(reply) => screen.apply_send_reply(reply),
            Err(e) => screen.apply_one_shot_failure(&e),
        },
    }
    Ok(())
}

async fn run_turn(config: &ClientConfig, turn: &TurnArgs, mut screen: ChatScreen, envelope: RequestEnvelope) -> Result<()> {
    info!(action = envelope.action(), streaming = !turn.no_stream, "Starting turn");
    if turn.no_stream {
        run_one_shot(config, &mut screen, &envelope).await?;
    } else {
        run_streaming(config, &mut screen, &envelope).await?;
    }

    let reply = screen
        .transcript()
        .last()
        .context("Transcript is empty after the turn")?;

    if turn.json {
        println!("{}", serde_json::to_string_pretty(reply)?);
    } else {
        println!("{}", render_message(reply, render_options()));
    }

    if let Some(id) = screen.conversation_id() {
        eprintln!("conversation: {id}");
    }
    if let Some(error) = screen.last_error() {
        anyhow::bail!("Turn failed: {error}");
    }
    Ok(())
}

fn load_client_config(args: &Args) -> Result<ClientConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.ws_url {
        overrides = overrides.with_ws_url(url.clone());
    }
    if let Some(ref base) = args.api_base {
        overrides = overrides.with_api_base(base.clone());
    }
    if let Some(ref token) = args.token {
        overrides = overrides.with_token(token.clone());
    }
    overrides
        .apply(&mut config)
        .context("Invalid command-line overrides")?;

    debug!(source = %config.source(), ws_url = %config.transport.ws_url, "Configuration resolved");
    Ok(config)
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    match args.command {
        Command::Render { ref file, json } => {
            let nodes = render_reply(&read_input(file.as_ref())?);
            if json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            } else {
                println!("{}", render_blocks(&nodes, render_options()));
            }
            Ok(())
        }

        Command::Start { ref paipan, ref turn } => {
            let config = load_client_config(&args)?;
            let payload: serde_json::Value = serde_json::from_str(&read_input(Some(paipan))?)
                .with_context(|| format!("{} is not valid JSON", paipan.display()))?;

            let mut screen = ChatScreen::new(config.chat_settings(), config.redaction_gate(turn.authenticated));
            let envelope = screen.begin_start(payload)?;
            run_turn(&config, turn, screen, envelope).await
        }

        Command::Ask {
            ref conversation,
            topic,
            ref message,
            ref turn,
        } => {
            let config = load_client_config(&args)?;
            let mut screen = ChatScreen::new(config.chat_settings(), config.redaction_gate(turn.authenticated))
                .with_conversation(conversation.clone());

            let envelope = match (topic, message) {
                (Some(topic), _) => screen.begin_quick_ask(topic)?,
                (None, Some(text)) => screen.begin_send(text)?,
                (None, None) => {
                    warn!("Nothing to send");
                    anyhow::bail!("Provide a message or --topic");
                }
            };
            run_turn(&config, turn, screen, envelope).await
        }
    }
}
