use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Highest channel mode index the backend accepts for `setAudioChannel`.
pub const CHANNEL_MODE_MAX: i32 = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ServerMessage {
    Analysis(AnalysisSample),
    Config(ConfigMessage),
    PresetStatus(PresetStatus),
    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

/// One analysis push. Every band must be present; a band that is `null` or
/// not a number (the backend writes NaN/Inf as `null`) reads as `NaN`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisSample {
    #[serde(deserialize_with = "band")]
    pub beat: f64,
    #[serde(deserialize_with = "band")]
    pub bass: f64,
    #[serde(deserialize_with = "band")]
    pub mid: f64,
    #[serde(deserialize_with = "band")]
    pub treb: f64,
}

/// Config push. Current servers send the nested `preset` form; older ones send
/// only the flat `audio` block.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigMessage {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub preset: Option<ConfigPatch>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioPatch>,
}

impl ConfigMessage {
    pub fn into_patch(self) -> ConfigPatch {
        match self {
            ConfigMessage {
                preset: Some(preset),
                ..
            } => preset,
            ConfigMessage { preset: None, audio } => ConfigPatch {
                audio,
                ..ConfigPatch::default()
            },
        }
    }
}

/// Preset-scoped configuration. Every field is optional: `None` means the
/// server did not send it (or sent `null`, or sent the wrong type).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioPatch>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub effects: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub waveform_count: Option<i32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub waveforms: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub spectrum: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub bands: Option<Map<String, Value>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AudioPatch {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub channel_mode: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "cmd")]
pub enum ClientCommand {
    SetAudioChannel { value: i32 },
    PresetLoad { filename: String },
    PresetSave { name: String },
    PresetDelete { filename: String },
    PresetList,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::SetAudioChannel { .. } => "setAudioChannel",
            ClientCommand::PresetLoad { .. } => "presetLoad",
            ClientCommand::PresetSave { .. } => "presetSave",
            ClientCommand::PresetDelete { .. } => "presetDelete",
            ClientCommand::PresetList => "presetList",
        }
    }
}

/// The backend refuses names that could escape its presets directory.
pub fn is_valid_preset_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

// A field of the wrong JSON type reads as absent instead of failing the frame.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn band<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().unwrap_or(f64::NAN))
}
