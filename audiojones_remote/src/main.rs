use anyhow::Context;
use audiojones_remote::state::PresetCatalog;
use audiojones_remote::{ClientConfig, CommandDispatcher, Meter, RemoteClient, StateModel};
use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

const METER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "audiojones-remote", about = "Remote control for a running AudioJones instance")]
struct Args {
    /// Backend host (default: $AUDIOJONES_HOST or 127.0.0.1).
    #[arg(long)]
    host: Option<String>,

    /// Backend websocket port (default: $AUDIOJONES_WS_PORT or 8081).
    #[arg(long)]
    port: Option<u16>,

    /// Reconnect delay in milliseconds (default 2000).
    #[arg(long, value_name = "MS")]
    reconnect_ms: Option<u64>,

    /// Print meter levels once per second.
    #[arg(long, default_value_t = false)]
    meters: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Channel(i32),
    Load(String),
    Save(String),
    Delete(String),
    List,
    Reconnect,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let arg = |what: &str| {
        if rest.is_empty() {
            Err(format!("usage: {word} <{what}>"))
        } else {
            Ok(rest.to_string())
        }
    };

    let input = match word {
        "channel" | "ch" => Input::Channel(
            rest.parse()
                .map_err(|_| format!("channel mode must be a number, got {rest:?}"))?,
        ),
        "load" => Input::Load(arg("file")?),
        "save" => Input::Save(arg("name")?),
        "delete" | "rm" => Input::Delete(arg("file")?),
        "list" | "ls" => Input::List,
        "reconnect" => Input::Reconnect,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("unknown command {other:?} (try `help`)")),
    };
    Ok(Some(input))
}

async fn apply(dispatcher: &CommandDispatcher, input: Input) -> anyhow::Result<bool> {
    match input {
        Input::Channel(mode) => dispatcher.set_audio_channel(mode).await?,
        Input::Load(file) => dispatcher.load_preset(&file).await?,
        Input::Save(name) => dispatcher.save_preset(&name).await?,
        Input::Delete(file) => dispatcher.delete_preset(&file).await?,
        Input::List => dispatcher.refresh_presets().await?,
        Input::Reconnect => dispatcher.reconnect().await?,
        Input::Help => {
            eprintln!("commands: channel <0-5> | load <file> | save <name> | delete <file> | list | reconnect | quit");
        }
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

async fn render(mut state: watch::Receiver<StateModel>, meters: bool) {
    let mut last = StateModel::default();
    let mut last_meter = Instant::now();

    while state.changed().await.is_ok() {
        let now = state.borrow_and_update().clone();

        if now.status() != last.status() {
            eprintln!("[status] {}", now.status());
        }
        if now.config().audio != last.config().audio {
            eprintln!("[config] channel mode {}", now.config().audio.channel_mode);
        }
        print_presets(last.presets(), now.presets());

        if meters && now.analysis().is_some() && last_meter.elapsed() >= METER_INTERVAL {
            last_meter = Instant::now();
            let levels: Vec<String> = Meter::ALL
                .iter()
                .map(|m| format!("{} {:>3.0}%", m.label(), now.meter_percent(*m)))
                .collect();
            eprintln!("[meters] {}", levels.join("  "));
        }

        last = now;
    }
}

fn print_presets(old: &PresetCatalog, new: &PresetCatalog) {
    if new.entries != old.entries {
        eprintln!("[presets] {}", new.entries.join(", "));
    }
    if new.selected != old.selected {
        if let Some(selected) = &new.selected {
            eprintln!("[presets] selected {selected}");
        }
    }
    if new.status_message != old.status_message {
        if let Some(message) = new.status_message.as_deref().filter(|m| !m.is_empty()) {
            eprintln!("[presets] {message}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ms) = args.reconnect_ms {
        config.reconnect_delay = Duration::from_millis(ms);
    }

    let client = RemoteClient::spawn(&config).context("failed to start client")?;
    let dispatcher = client.dispatcher();
    let view = tokio::spawn(render(client.subscribe(), args.meters));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match parse_input(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };
        match apply(&dispatcher, input).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{e}"),
        }
    }

    client.shutdown().await;
    view.abort();
    Ok(())
}
