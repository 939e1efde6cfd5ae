//! Stand-in for the AudioJones websocket bridge, for driving the remote
//! without the visualizer running.

use audiojones_protocol::{
    is_valid_preset_filename, AnalysisSample, AudioPatch, ClientCommand, ConfigMessage, ConfigPatch,
    PresetStatus, ServerMessage, CHANNEL_MODE_MAX,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:8081";
const ANALYSIS_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Backend {
    config: ConfigPatch,
    presets: BTreeMap<String, ConfigPatch>,
}

impl Backend {
    fn config_message(&self) -> ServerMessage {
        ServerMessage::Config(ConfigMessage {
            preset: Some(self.config.clone()),
            audio: None,
        })
    }

    fn status(&self, success: Option<bool>, message: Option<String>) -> ServerMessage {
        ServerMessage::PresetStatus(PresetStatus {
            presets: Some(self.presets.keys().cloned().collect()),
            message,
            success,
        })
    }

    fn handle(&mut self, cmd: ClientCommand) -> Vec<ServerMessage> {
        match cmd {
            ClientCommand::SetAudioChannel { value } => {
                if !(0..=CHANNEL_MODE_MAX).contains(&value) {
                    warn!(value, "channel mode out of range");
                    return Vec::new();
                }
                self.config.audio = Some(AudioPatch {
                    channel_mode: Some(value),
                });
                vec![self.config_message()]
            }
            ClientCommand::PresetList => vec![self.status(None, None)],
            ClientCommand::PresetLoad { filename } => {
                let loaded = is_valid_preset_filename(&filename)
                    .then(|| self.presets.get(&filename).cloned())
                    .flatten();
                match loaded {
                    Some(config) => {
                        self.config = config;
                        vec![
                            self.config_message(),
                            self.status(Some(true), Some(format!("Loaded {filename}"))),
                        ]
                    }
                    None => vec![self.status(Some(false), Some("Failed to load preset".to_string()))],
                }
            }
            ClientCommand::PresetSave { name } => {
                if !is_valid_preset_filename(&name) {
                    return vec![self.status(Some(false), Some("Invalid preset name".to_string()))];
                }
                self.presets.insert(format!("{name}.json"), self.config.clone());
                vec![self.status(Some(true), Some(format!("Saved {name}")))]
            }
            ClientCommand::PresetDelete { filename } => {
                if is_valid_preset_filename(&filename) && self.presets.remove(&filename).is_some() {
                    vec![self.status(Some(true), Some(format!("Deleted {filename}")))]
                } else {
                    vec![self.status(Some(false), Some("Failed to delete preset".to_string()))]
                }
            }
        }
    }
}

fn analysis_at(t: f64) -> AnalysisSample {
    let pulse = |hz: f64, phase: f64| ((t * hz + phase).sin() * 0.5 + 0.5).max(0.0);
    AnalysisSample {
        beat: pulse(2.0 * std::f64::consts::PI * 2.0, 0.0).powi(4),
        bass: pulse(1.3, 0.0) * 2.5,
        mid: pulse(2.1, 1.0) * 1.8,
        treb: pulse(3.7, 2.0) * 1.2,
    }
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            warn!(error = %e, "failed to encode reply");
            None
        }
    }
}

async fn serve_client(stream: TcpStream, peer: SocketAddr, backend: Arc<Mutex<Backend>>) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "handshake failed");
            return;
        }
    };
    info!(%peer, "client connected");
    let (mut write, mut read) = ws.split();

    let hello = match backend.lock() {
        Ok(b) => b.config_message(),
        Err(_) => return,
    };
    if let Some(frame) = encode(&hello) {
        if write.send(frame).await.is_err() {
            return;
        }
    }

    let start = Instant::now();
    let mut ticker = time::interval(ANALYSIS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sample = ServerMessage::Analysis(analysis_at(start.elapsed().as_secs_f64()));
                if let Some(frame) = encode(&sample) {
                    if write.send(frame).await.is_err() {
                        break;
                    }
                }
            }
            msg = read.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(%peer, error = %e, "read failed");
                        break;
                    }
                };
                let cmd: ClientCommand = match serde_json::from_str(text.as_str()) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        warn!(%peer, error = %e, "ignoring unrecognized command");
                        continue;
                    }
                };
                debug!(%peer, cmd = cmd.name(), "command");
                let replies = match backend.lock() {
                    Ok(mut b) => b.handle(cmd),
                    Err(_) => break,
                };
                for reply in replies.iter().filter_map(encode) {
                    if write.send(reply).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
    info!(%peer, "client disconnected");
}

fn parse_arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let addr = parse_arg_value(&args, "--addr").unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let run_for = parse_arg_value(&args, "--run-for-ms")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis);

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    match listener.local_addr() {
        Ok(local) => println!("mock_backend listening on ws://{local}"),
        Err(_) => println!("mock_backend listening on ws://{addr}"),
    }

    let backend = Arc::new(Mutex::new(Backend::default()));
    let deadline = time::sleep(run_for.unwrap_or(Duration::MAX / 4));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_client(stream, peer, backend.clone()));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            () = &mut deadline, if run_for.is_some() => break,
        }
    }
}
