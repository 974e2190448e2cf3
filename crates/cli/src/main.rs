use clap::{Parser, Subcommand};
use lib::chat::{ChatSession, SubmitAction};
use lib::link::LinkEvent;
use lib::normalize::CanonicalButton;
use lib::transcript::ChatMessage;
use std::io::Write;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "converse")]
#[command(about = "Converse Copilot CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: CONVERSE_CONFIG_PATH or ~/.converse/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Chat with the template agent over its WebSocket (interactive). Type `/<n>` to pick the n-th quick reply, `/exit` to leave.
    Chat {
        /// Config file path (default: CONVERSE_CONFIG_PATH or ~/.converse/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Agent WebSocket URL (default: CONVERSE_ENDPOINT, then config, then ws://127.0.0.1:8765/ws)
        #[arg(long, short, value_name = "URL")]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("converse {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, endpoint }) => {
            if let Err(e) = run_chat(config, endpoint).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    endpoint: Option<String>,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let url = endpoint
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| lib::config::resolve_endpoint(&config));

    let mut session = ChatSession::from_config(&config.chat);
    let (link, mut events) = lib::link::spawn(url);
    let mut events_open = true;
    let mut shown = 0;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    shown = show_new(&session, shown);
    prompt()?;

    loop {
        let due = session.next_simulated_due();
        let wake = tokio::time::Instant::from_std(due.unwrap_or_else(Instant::now));
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
                    break;
                }
                let action = match pick_quick_reply(&session, input) {
                    Some(label) => session.quick_reply(&label, Instant::now()),
                    None => session.submit(input, Instant::now()),
                };
                match action {
                    SubmitAction::Ignored => prompt()?,
                    SubmitAction::Transmit(text) => {
                        if let Err(e) = link.send(text.clone()) {
                            log::warn!("send failed: {}", e);
                            session.delivery_failed(&text, Instant::now());
                        }
                    }
                    SubmitAction::Simulated { .. } => {}
                }
                if session.is_composing() {
                    println!("  ...");
                }
            }
            ev = events.recv(), if events_open => {
                match ev {
                    Some(LinkEvent::Connected) => session.set_connected(true),
                    Some(LinkEvent::Frame(raw)) => {
                        session.receive_frame(&raw);
                    }
                    Some(LinkEvent::Undelivered(text)) => {
                        session.delivery_failed(&text, Instant::now());
                    }
                    Some(LinkEvent::Closed) | Some(LinkEvent::Failed(_)) => session.set_connected(false),
                    None => {
                        events_open = false;
                        session.set_connected(false);
                    }
                }
            }
            _ = tokio::time::sleep_until(wake), if due.is_some() => {
                session.poll_simulated(Instant::now());
            }
        }
        let before = shown;
        shown = show_new(&session, shown);
        if shown != before {
            prompt()?;
        }
    }

    Ok(())
}

/// `/2` picks the second quick reply of the latest agent message.
fn pick_quick_reply(session: &ChatSession, input: &str) -> Option<String> {
    let n: usize = input.strip_prefix('/')?.parse().ok()?;
    session
        .transcript()
        .last_agent()?
        .quick_replies()
        .nth(n.checked_sub(1)?)
        .map(str::to_string)
}

/// Print agent messages appended since `shown`; returns the new count.
fn show_new(session: &ChatSession, shown: usize) -> usize {
    let messages = session.transcript().messages();
    for m in messages.iter().skip(shown).filter(|m| !m.is_user()) {
        print_agent_message(m);
    }
    messages.len()
}

fn print_agent_message(m: &ChatMessage) {
    for line in m.text.lines() {
        println!("< {}", line);
    }
    let mut reply_no = 0;
    for b in &m.buttons {
        match b {
            CanonicalButton::QuickReply { label } => {
                reply_no += 1;
                println!("  [/{}] {}", reply_no, label);
            }
            CanonicalButton::CallToAction { label, href } => {
                println!("  [link] {} -> {}", label, href);
            }
        }
    }
}

fn prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()
}
