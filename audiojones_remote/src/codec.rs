//! JSON framing between the client and the analysis backend.

use audiojones_protocol::{ClientCommand, ServerMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("undecodable frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode {cmd}: {source}")]
    Encode {
        cmd: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes one inbound text frame. Frames with an unrecognised `type` decode to
/// [`ServerMessage::Unknown`]; anything that is not a well-formed message is an
/// error and must be dropped by the caller.
pub fn decode_frame(text: &str) -> Result<ServerMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

pub fn encode_command(cmd: &ClientCommand) -> Result<String, CodecError> {
    serde_json::to_string(cmd).map_err(|source| CodecError::Encode {
        cmd: cmd.name(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiojones_protocol::{AnalysisSample, AudioPatch, PresetStatus};
    use serde_json::{json, Value};

    fn encoded(cmd: ClientCommand) -> Value {
        serde_json::from_str(&encode_command(&cmd).unwrap()).unwrap()
    }

    #[test]
    fn outbound_shapes_follow_command_tag() {
        assert_eq!(
            encoded(ClientCommand::PresetLoad {
                filename: "kickdrum.json".to_string()
            }),
            json!({"cmd": "presetLoad", "filename": "kickdrum.json"})
        );
        assert_eq!(
            encoded(ClientCommand::PresetSave {
                name: "live set".to_string()
            }),
            json!({"cmd": "presetSave", "name": "live set"})
        );
        assert_eq!(
            encoded(ClientCommand::PresetDelete {
                filename: "old.json".to_string()
            }),
            json!({"cmd": "presetDelete", "filename": "old.json"})
        );
        assert_eq!(
            encoded(ClientCommand::SetAudioChannel { value: 3 }),
            json!({"cmd": "setAudioChannel", "value": 3})
        );
        assert_eq!(encoded(ClientCommand::PresetList), json!({"cmd": "presetList"}));
    }

    #[test]
    fn preset_load_is_byte_exact() {
        let frame = encode_command(&ClientCommand::PresetLoad {
            filename: "kickdrum.json".to_string(),
        })
        .unwrap();
        assert_eq!(frame, r#"{"cmd":"presetLoad","filename":"kickdrum.json"}"#);
    }

    #[test]
    fn analysis_passes_values_through_unvalidated() {
        let msg = decode_frame(r#"{"type":"analysis","beat":1.5,"bass":-0.25,"mid":7,"treb":0.0}"#)
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Analysis(AnalysisSample {
                beat: 1.5,
                bass: -0.25,
                mid: 7.0,
                treb: 0.0,
            })
        );
    }

    #[test]
    fn analysis_missing_a_band_is_rejected() {
        let err = decode_frame(r#"{"type":"analysis","beat":0.5,"bass":1.0,"mid":1.0}"#);
        assert!(matches!(err, Err(CodecError::Decode(_))));
    }

    #[test]
    fn non_numeric_band_reads_as_nan() {
        let msg = decode_frame(r#"{"type":"analysis","beat":null,"bass":1.0,"mid":"x","treb":0.5}"#)
            .unwrap();
        let ServerMessage::Analysis(sample) = msg else {
            panic!("expected analysis, got {msg:?}");
        };
        assert!(sample.beat.is_nan());
        assert!(sample.mid.is_nan());
        assert_eq!(sample.bass, 1.0);
        assert_eq!(sample.treb, 0.5);
    }

    #[test]
    fn legacy_and_current_config_both_decode() {
        let legacy = decode_frame(r#"{"type":"config","audio":{"channelMode":2}}"#).unwrap();
        let ServerMessage::Config(legacy) = legacy else {
            panic!("expected config, got {legacy:?}");
        };
        let patch = legacy.into_patch();
        assert_eq!(patch.audio, Some(AudioPatch { channel_mode: Some(2) }));
        assert_eq!(patch.waveform_count, None);

        let current = decode_frame(
            r#"{"type":"config","preset":{"name":"","audio":{"channelMode":1},"waveformCount":2,
                "waveforms":[{"radius":0.3},{"radius":0.5}],"effects":{"blur":2},
                "spectrum":{"enabled":true},"bands":{"bass":1}}}"#,
        )
        .unwrap();
        let ServerMessage::Config(current) = current else {
            panic!("expected config, got {current:?}");
        };
        let patch = current.into_patch();
        assert_eq!(patch.audio, Some(AudioPatch { channel_mode: Some(1) }));
        assert_eq!(patch.waveform_count, Some(2));
        assert_eq!(patch.waveforms.map(|w| w.len()), Some(2));
        assert_eq!(patch.effects.and_then(|e| e.get("blur").cloned()), Some(json!(2)));
    }

    #[test]
    fn wrongly_typed_config_field_reads_as_absent() {
        let msg = decode_frame(
            r#"{"type":"config","preset":{"audio":{"channelMode":"two"},"waveformCount":3,"bands":null}}"#,
        )
        .unwrap();
        let ServerMessage::Config(msg) = msg else {
            panic!("expected config, got {msg:?}");
        };
        let patch = msg.into_patch();
        assert_eq!(patch.audio, Some(AudioPatch { channel_mode: None }));
        assert_eq!(patch.waveform_count, Some(3));
        assert_eq!(patch.bands, None);
    }

    #[test]
    fn preset_status_fields_are_optional() {
        assert_eq!(
            decode_frame(r#"{"type":"presetStatus"}"#).unwrap(),
            ServerMessage::PresetStatus(PresetStatus::default())
        );
        assert_eq!(
            decode_frame(r#"{"type":"presetStatus","presets":["a.json"],"message":"Saved","success":true}"#)
                .unwrap(),
            ServerMessage::PresetStatus(PresetStatus {
                presets: Some(vec!["a.json".to_string()]),
                message: Some("Saved".to_string()),
                success: Some(true),
            })
        );
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        assert_eq!(
            decode_frame(r#"{"type":"fftBins","bins":[0.1,0.2]}"#).unwrap(),
            ServerMessage::Unknown
        );
    }

    #[test]
    fn garbage_fails_closed() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"beat":1.0}"#).is_err());
        assert!(decode_frame("42").is_err());
    }
}
