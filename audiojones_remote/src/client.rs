use crate::codec;
use crate::config::{ClientConfig, ConfigError};
use crate::connection::{ConnectionManager, Connector, Transition, WsConnector};
use crate::dispatcher::{self, CommandDispatcher};
use crate::state::StateModel;
use crate::timer::OneShot;
use audiojones_protocol::{ClientCommand, ServerMessage};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_QUEUE: usize = 256;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client actor unavailable")]
    ActorUnavailable,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) enum UiCommand {
    Connect,
    Send(ClientCommand),
    Shutdown,
}

/// Handle to a running sync client. The client task owns the connection, the
/// timers, and the only writable copy of the [`StateModel`].
pub struct RemoteClient {
    dispatcher: CommandDispatcher,
    state: watch::Receiver<StateModel>,
    task: JoinHandle<()>,
}

impl RemoteClient {
    /// Starts the client against the configured websocket endpoint and
    /// begins connecting immediately.
    pub fn spawn(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::spawn_with(config, Box::new(WsConnector))
    }

    pub fn spawn_with(config: &ClientConfig, connector: Box<dyn Connector>) -> Result<Self, ClientError> {
        let endpoint = config.endpoint()?;
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let (state_tx, state_rx) = watch::channel(StateModel::default());

        let actor = ClientActor {
            conn: ConnectionManager::new(endpoint, config.reconnect_delay, connector),
            state: state_tx,
            status_timer: OneShot::default(),
            status_ttl: config.status_ttl,
            rx,
        };
        let task = tokio::spawn(actor.run());

        Ok(Self {
            dispatcher: CommandDispatcher::new(tx),
            state: state_rx,
            task,
        })
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone()
    }

    /// Read-only view of the state model, notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<StateModel> {
        self.state.clone()
    }

    /// Tears the client down: transport closed, reconnect and status timers
    /// cancelled. Also happens when every dispatcher and this handle are dropped.
    pub async fn shutdown(self) {
        let _ = self.dispatcher.request(UiCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

struct ClientActor {
    conn: ConnectionManager,
    state: watch::Sender<StateModel>,
    status_timer: OneShot,
    status_ttl: Duration,
    rx: mpsc::Receiver<UiCommand>,
}

impl ClientActor {
    async fn run(mut self) {
        self.conn.connect();
        self.publish_status();

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(UiCommand::Connect) => self.conn.connect(),
                        Some(UiCommand::Send(cmd)) => {
                            dispatcher::submit(&mut self.conn, &self.state, cmd);
                        }
                        Some(UiCommand::Shutdown) | None => break,
                    }
                }
                transition = self.conn.next() => match transition {
                    Transition::Frame(text) => self.on_frame(&text),
                    Transition::Lost => {
                        self.state.send_if_modified(|s| s.clear_pending_selection());
                    }
                    Transition::Opened | Transition::Reconnecting => {}
                },
                () = self.status_timer.fired() => {
                    self.state.send_if_modified(|s| s.clear_status_message());
                }
            }
            self.publish_status();
        }

        info!("client shutting down");
        self.conn.shutdown();
        self.status_timer.cancel();
        self.publish_status();
    }

    fn on_frame(&mut self, text: &str) {
        let msg = match codec::decode_frame(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "discarding frame");
                return;
            }
        };

        match msg {
            ServerMessage::Analysis(sample) => {
                self.state.send_modify(|s| s.apply_analysis(sample));
            }
            ServerMessage::Config(config) => {
                debug!("config update");
                let patch = config.into_patch();
                self.state.send_modify(|s| s.apply_config(patch));
            }
            ServerMessage::PresetStatus(status) => {
                let mut message_set = false;
                self.state.send_modify(|s| message_set = s.update_presets(status));
                if message_set {
                    self.status_timer.arm(self.status_ttl);
                }
            }
            ServerMessage::Unknown => debug!("ignoring unknown message type"),
        }
    }

    fn publish_status(&mut self) {
        let status = self.conn.status();
        self.state.send_if_modified(|s| s.set_status(status));
    }
}
