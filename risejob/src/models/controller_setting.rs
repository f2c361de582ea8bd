use rise::DryRun;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

// path to config file name.
const SETTINGS_PATH: &str = "RISE/";
const SETTINGS_FILE_NAME: &str = "JobControl.json";

// sample count handed to the time predictor
const PREDICTION_SAMPLES: u32 = 4096;

#[derive(Debug, Error)]
pub enum SettingError {
    #[error("No config directory on this platform")]
    NoConfigDir,
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed settings file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Knobs for the job controller and the console front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSetting {
    /// Sample count passed to the renderer's time predictor.
    pub prediction_samples: u32,
    /// Rendering units between two looks at the pause/cancel flags. 1 checks after every unit.
    pub checkpoint_interval: u32,
    /// Allow stop on a paused render. Off by default: a paused render must be resumed first.
    pub allow_stop_while_paused: bool,
    /// Cost model used when running without the native renderer.
    pub dry_run: DryRun,
}

impl Default for ControllerSetting {
    fn default() -> Self {
        Self {
            prediction_samples: PREDICTION_SAMPLES,
            checkpoint_interval: 1,
            allow_stop_while_paused: false,
            dry_run: DryRun::default(),
        }
    }
}

impl ControllerSetting {
    pub fn get_config_path() -> Result<PathBuf, SettingError> {
        let path = dirs::config_dir()
            .ok_or(SettingError::NoConfigDir)?
            .join(SETTINGS_PATH);
        Ok(path.join(SETTINGS_FILE_NAME))
    }

    /// Checkpoint interval clamped to something the worker can count with.
    pub fn checkpoint_interval(&self) -> u32 {
        self.checkpoint_interval.max(1)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Load from `path`, or from the user's config directory when no path is given.
    /// Anything missing or unreadable falls back to defaults, which get written back when the file did not exist.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::get_config_path() {
                Ok(path) => path,
                Err(e) => {
                    warn!("{e}, using default settings");
                    return Self::default();
                }
            },
        };

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(SettingError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                let settings = Self::default();
                match settings.save_to(&path) {
                    Ok(()) => info!("New settings created at {:?}", &path),
                    Err(e) => warn!("Unable to save new settings to {:?}: {e}", &path),
                }
                settings
            }
            Err(e) => {
                warn!("Unable to read settings {:?}: {e}, using defaults", &path);
                Self::default()
            }
        }
    }
}
