use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MidiKeysError, Result};
use crate::pipeline::KeyPlan;
use crate::timing::{KeyAction, Tempo};

/// A computed key queue, detached from its MIDI file so it can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<usize>,
    #[serde(flatten)]
    pub tempo: Tempo,
    pub actions: Vec<KeyAction>,
}

impl From<&KeyPlan> for TrackScript {
    fn from(plan: &KeyPlan) -> Self {
        Self {
            track: plan.track,
            tempo: plan.tempo,
            actions: plan.actions(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    One(TrackScript),
    Many(Vec<TrackScript>),
}

/// Writes one script as an object, several as an array.
pub fn save_scripts(path: &Path, scripts: &[TrackScript]) -> Result<()> {
    let json = match scripts {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    std::fs::write(path, json).map_err(|source| MidiKeysError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_scripts(path: &Path) -> Result<Vec<TrackScript>> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            MidiKeysError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            MidiKeysError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let file: ScriptFile = serde_json::from_str(&contents)?;
    Ok(match file {
        ScriptFile::One(script) => vec![script],
        ScriptFile::Many(scripts) => scripts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{KeyPress, Modifier};

    fn script(track: Option<usize>) -> TrackScript {
        TrackScript {
            track,
            tempo: Tempo::new(480, 500_000),
            actions: vec![
                KeyAction {
                    delta_ticks: 0,
                    press: Some(KeyPress::with('a', Modifier::Shift)),
                },
                KeyAction {
                    delta_ticks: 240,
                    press: Some(KeyPress::plain('q')),
                },
            ],
        }
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(script(None)).unwrap();
        assert_eq!(json["ticksPerQuarter"], 480);
        assert_eq!(json["microsPerQuarter"], 500_000);
        assert_eq!(json["actions"][0]["press"]["modifier"], "shift");
        assert_eq!(json["actions"][1]["deltaTicks"], 240);
        assert!(json.get("track").is_none());
    }

    #[test]
    fn reads_hand_written_script_with_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.json");
        std::fs::write(
            &path,
            r#"{
                "ticksPerQuarter": 96,
                "microsPerQuarter": 600000,
                "actions": [
                    { "deltaTicks": 0, "press": { "key": "z" } },
                    { "deltaTicks": 12 },
                    { "deltaTicks": 12, "press": { "key": "c", "modifier": "control" } }
                ]
            }"#,
        )
        .unwrap();

        let scripts = load_scripts(&path).unwrap();
        assert_eq!(scripts.len(), 1);
        let actions = &scripts[0].actions;
        assert_eq!(actions[1].press, None);
        assert_eq!(actions[2].press, Some(KeyPress::with('c', Modifier::Control)));
        assert_eq!(scripts[0].tempo.micros_per_quarter, 600_000);
    }

    #[test]
    fn saves_many_as_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.json");
        let scripts = vec![script(Some(1)), script(Some(2))];
        save_scripts(&path, &scripts).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.is_array());
        assert_eq!(load_scripts(&path).unwrap(), scripts);
    }

    #[test]
    fn missing_script() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_scripts(&dir.path().join("gone.json")),
            Err(MidiKeysError::InputNotFound { .. })
        ));
    }
}
