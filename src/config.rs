use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MidiKeysError, Result};
use crate::reduce::MergeMode;
use crate::scheduler::PlaybackOptions;

pub const DEFAULT_LEAD_IN_SECS: f64 = 3.0;

/// Options that shape one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub track_index: Option<usize>,
    pub channel_filter: Option<BTreeSet<u8>>,
    pub merge_mode: MergeMode,
    pub show_timing: bool,
    pub dry_run: bool,
    pub lead_in: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            track_index: None,
            channel_filter: None,
            merge_mode: MergeMode::default(),
            show_timing: false,
            dry_run: false,
            lead_in: Duration::from_secs_f64(DEFAULT_LEAD_IN_SECS),
        }
    }
}

impl PipelineConfig {
    pub fn playback(&self) -> PlaybackOptions {
        PlaybackOptions {
            lead_in: self.lead_in,
            dry_run: self.dry_run,
        }
    }
}

/// Settings file, every field optional.
///
/// ```json
/// { "trackIndex": 1, "channelFilter": [0, 1], "mergeMode": "melody", "leadIn": 2.5 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    pub track_index: Option<usize>,
    pub channel_filter: Option<Vec<u8>>,
    pub merge_mode: Option<MergeMode>,
    pub show_timing: Option<bool>,
    pub dry_run: Option<bool>,
    pub lead_in: Option<f64>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
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
        Ok(serde_json::from_str(&contents)?)
    }

    /// Fields set in `overrides` win over fields set here.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            track_index: overrides.track_index.or(self.track_index),
            channel_filter: overrides.channel_filter.or(self.channel_filter),
            merge_mode: overrides.merge_mode.or(self.merge_mode),
            show_timing: overrides.show_timing.or(self.show_timing),
            dry_run: overrides.dry_run.or(self.dry_run),
            lead_in: overrides.lead_in.or(self.lead_in),
        }
    }

    /// Rejects channels outside 0-15 and negative lead-in times.
    pub fn into_config(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let channel_filter = match self.channel_filter {
            Some(channels) => {
                if let Some(bad) = channels.iter().find(|&&c| c > 15) {
                    return Err(MidiKeysError::InvalidConfig(format!(
                        "channel {} is outside 0-15",
                        bad
                    )));
                }
                Some(channels.into_iter().collect())
            }
            None => None,
        };

        let lead_in = match self.lead_in {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Duration::from_secs_f64(secs),
            Some(secs) => {
                return Err(MidiKeysError::InvalidConfig(format!(
                    "lead-in must be a non-negative number of seconds, got {}",
                    secs
                )))
            }
            None => defaults.lead_in,
        };

        Ok(PipelineConfig {
            track_index: self.track_index,
            channel_filter,
            merge_mode: self.merge_mode.unwrap_or(defaults.merge_mode),
            show_timing: self.show_timing.unwrap_or(defaults.show_timing),
            dry_run: self.dry_run.unwrap_or(defaults.dry_run),
            lead_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Settings::default().into_config().unwrap();
        assert_eq!(config.merge_mode, MergeMode::All);
        assert_eq!(config.lead_in, Duration::from_secs(3));
        assert!(config.track_index.is_none());
        assert!(config.channel_filter.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn command_line_overrides_file() {
        let file = Settings {
            merge_mode: Some(MergeMode::Melody),
            track_index: Some(2),
            lead_in: Some(1.0),
            ..Default::default()
        };
        let cli = Settings {
            merge_mode: Some(MergeMode::Dedupe),
            dry_run: Some(true),
            ..Default::default()
        };
        let config = file.merge(cli).into_config().unwrap();
        assert_eq!(config.merge_mode, MergeMode::Dedupe);
        assert_eq!(config.track_index, Some(2));
        assert_eq!(config.lead_in, Duration::from_secs(1));
        assert!(config.dry_run);
    }

    #[test]
    fn rejects_bad_channel() {
        let settings = Settings {
            channel_filter: Some(vec![0, 16]),
            ..Default::default()
        };
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn rejects_negative_lead_in() {
        let settings = Settings {
            lead_in: Some(-1.0),
            ..Default::default()
        };
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{ "trackIndex": 1, "channelFilter": [3, 1], "mergeMode": "track-melody+dedupe", "leadIn": 0 }}"#
        )
        .unwrap();

        let config = Settings::load(&path).unwrap().into_config().unwrap();
        assert_eq!(config.track_index, Some(1));
        assert_eq!(config.merge_mode, MergeMode::TrackMelodyDedupe);
        assert_eq!(config.lead_in, Duration::ZERO);
        let channels: Vec<u8> = config.channel_filter.unwrap().into_iter().collect();
        assert_eq!(channels, vec![1, 3]);
    }

    #[test]
    fn missing_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MidiKeysError::InputNotFound { .. }));
    }
}
