use crate::client::{ClientError, UiCommand};
use crate::codec;
use crate::connection::ConnectionManager;
use crate::state::StateModel;
use audiojones_protocol::{is_valid_preset_filename, ClientCommand, CHANNEL_MODE_MAX};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Entry points the view calls on user input. Cheap to clone.
///
/// Requests are handed to the client actor, which sends them only while
/// connected; anything issued while disconnected is dropped without error.
#[derive(Clone)]
pub struct CommandDispatcher {
    tx: mpsc::Sender<UiCommand>,
}

impl CommandDispatcher {
    pub(crate) fn new(tx: mpsc::Sender<UiCommand>) -> Self {
        Self { tx }
    }

    pub async fn set_audio_channel(&self, mode: i32) -> Result<(), ClientError> {
        if !(0..=CHANNEL_MODE_MAX).contains(&mode) {
            return Err(ClientError::InvalidInput(format!(
                "channel mode {mode} outside 0..={CHANNEL_MODE_MAX}"
            )));
        }
        self.dispatch(ClientCommand::SetAudioChannel { value: mode }).await
    }

    pub async fn load_preset(&self, filename: &str) -> Result<(), ClientError> {
        let filename = checked_filename(filename)?;
        self.dispatch(ClientCommand::PresetLoad { filename }).await
    }

    pub async fn save_preset(&self, name: &str) -> Result<(), ClientError> {
        let name = checked_filename(name)?;
        self.dispatch(ClientCommand::PresetSave { name }).await
    }

    pub async fn delete_preset(&self, filename: &str) -> Result<(), ClientError> {
        let filename = checked_filename(filename)?;
        self.dispatch(ClientCommand::PresetDelete { filename }).await
    }

    pub async fn refresh_presets(&self) -> Result<(), ClientError> {
        self.dispatch(ClientCommand::PresetList).await
    }

    /// Drops the current transport (if any) and connects again right away.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.request(UiCommand::Connect).await
    }

    pub async fn dispatch(&self, cmd: ClientCommand) -> Result<(), ClientError> {
        self.request(UiCommand::Send(cmd)).await
    }

    pub(crate) async fn request(&self, cmd: UiCommand) -> Result<(), ClientError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| ClientError::ActorUnavailable)
    }
}

fn checked_filename(name: &str) -> Result<String, ClientError> {
    let name = name.trim();
    if !is_valid_preset_filename(name) {
        return Err(ClientError::InvalidInput(format!("invalid preset name {name:?}")));
    }
    Ok(name.to_string())
}

/// Encodes `cmd` and hands it to the transport. Runs on the client actor.
pub(crate) fn submit(
    conn: &mut ConnectionManager,
    state: &watch::Sender<StateModel>,
    cmd: ClientCommand,
) -> bool {
    let frame = match codec::encode_command(&cmd) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "dropping command");
            return false;
        }
    };

    if !conn.send(frame) {
        debug!(cmd = cmd.name(), "not connected, command dropped");
        return false;
    }

    if let ClientCommand::PresetLoad { filename } = cmd {
        state.send_modify(|s| s.set_pending_selection(filename));
    }
    true
}
