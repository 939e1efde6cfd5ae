use audiojones_protocol::{AnalysisSample, ConfigPatch, PresetStatus};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    /// Controls that send commands are only usable while connected.
    pub fn controls_enabled(self) -> bool {
        self == ConnectionStatus::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meter {
    Beat,
    Bass,
    Mid,
    Treb,
}

impl Meter {
    pub const ALL: [Meter; 4] = [Meter::Beat, Meter::Bass, Meter::Mid, Meter::Treb];

    /// Full-scale value: beat intensity is 0..1, normalized band energies 0..3.
    pub fn max(self) -> f64 {
        match self {
            Meter::Beat => 1.0,
            Meter::Bass | Meter::Mid | Meter::Treb => 3.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Meter::Beat => "beat",
            Meter::Bass => "bass",
            Meter::Mid => "mid",
            Meter::Treb => "treb",
        }
    }

    pub fn value(self, sample: &AnalysisSample) -> f64 {
        match self {
            Meter::Beat => sample.beat,
            Meter::Bass => sample.bass,
            Meter::Mid => sample.mid,
            Meter::Treb => sample.treb,
        }
    }

    pub fn percent(self, sample: &AnalysisSample) -> f64 {
        meter_percent(self.value(sample), self.max())
    }
}

/// Share of `max` covered by `value`, clamped to 0..=100.
pub fn meter_percent(value: f64, max: f64) -> f64 {
    if max.is_nan() || max <= 0.0 || value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max) / max * 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioConfig {
    pub channel_mode: i32,
}

/// Client copy of the server-held configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    pub audio: AudioConfig,
    pub effects: Map<String, Value>,
    pub waveform_count: i32,
    pub waveforms: Vec<Value>,
    pub spectrum: Map<String, Value>,
    pub bands: Map<String, Value>,
}

impl ConfigSnapshot {
    /// Overwrites exactly the fields the patch carries. Omitted fields keep
    /// their previous value; nothing is ever cleared by omission.
    pub fn merge(&mut self, patch: ConfigPatch) {
        let ConfigPatch {
            audio,
            effects,
            waveform_count,
            waveforms,
            spectrum,
            bands,
        } = patch;

        if let Some(channel_mode) = audio.and_then(|a| a.channel_mode) {
            self.audio.channel_mode = channel_mode;
        }
        if let Some(effects) = effects {
            self.effects = effects;
        }
        if let Some(count) = waveform_count {
            self.waveform_count = count;
        }
        if let Some(waveforms) = waveforms {
            self.waveforms = waveforms;
        }
        if let Some(spectrum) = spectrum {
            self.spectrum = spectrum;
        }
        if let Some(bands) = bands {
            self.bands = bands;
        }

        let active = usize::try_from(self.waveform_count).unwrap_or(0);
        self.waveforms.truncate(active);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetCatalog {
    pub entries: Vec<String>,
    pub selected: Option<String>,
    pub status_message: Option<String>,
    pub pending_selection: Option<String>,
}

impl PresetCatalog {
    /// Applies a `presetStatus` push. Returns true when a new status message
    /// was set, so the caller can restart its display timer.
    pub fn update(&mut self, status: PresetStatus) -> bool {
        let PresetStatus {
            presets,
            message,
            success,
        } = status;

        if let Some(presets) = presets {
            self.entries = presets;
        }
        match success {
            Some(true) => {
                if let Some(pending) = self.pending_selection.take() {
                    self.selected = Some(pending);
                }
            }
            Some(false) => self.pending_selection = None,
            None => {}
        }
        // The backend sends `"message": ""` when it has nothing to say.
        match message.filter(|m| !m.is_empty()) {
            Some(message) => {
                self.status_message = Some(message);
                true
            }
            None => false,
        }
    }
}

/// Everything the view renders from. The client actor is the only writer;
/// views hold a `watch::Receiver<StateModel>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateModel {
    status: ConnectionStatus,
    analysis: Option<AnalysisSample>,
    config: ConfigSnapshot,
    presets: PresetCatalog,
}

impl StateModel {
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn controls_enabled(&self) -> bool {
        self.status.controls_enabled()
    }

    pub fn analysis(&self) -> Option<&AnalysisSample> {
        self.analysis.as_ref()
    }

    /// Meter fill for the latest sample; 0 before the first sample arrives.
    pub fn meter_percent(&self, meter: Meter) -> f64 {
        self.analysis.as_ref().map_or(0.0, |s| meter.percent(s))
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    pub fn set_status(&mut self, status: ConnectionStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    pub fn apply_analysis(&mut self, sample: AnalysisSample) {
        self.analysis = Some(sample);
    }

    pub fn apply_config(&mut self, patch: ConfigPatch) {
        self.config.merge(patch);
    }

    pub fn update_presets(&mut self, status: PresetStatus) -> bool {
        self.presets.update(status)
    }

    pub fn set_pending_selection(&mut self, filename: String) {
        self.presets.pending_selection = Some(filename);
    }

    /// A load sent on a connection that has since been lost can no longer be
    /// answered, so its pending selection is dropped.
    pub fn clear_pending_selection(&mut self) -> bool {
        self.presets.pending_selection.take().is_some()
    }

    pub fn clear_status_message(&mut self) -> bool {
        self.presets.status_message.take().is_some()
    }
}
