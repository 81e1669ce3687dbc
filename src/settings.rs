//! Persisted LED settings.
//!
//! Settings are kept in a TOML file in the user's home directory:
//!
//! ```toml
//! [settings]
//! back = true
//! enabled = true
//! front = true
//! mode = 5
//! side = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::{Table, Value};
use tracing::{debug, warn};

use crate::msi_gt660::Mode;

/// Settings file name inside the home directory.
pub const FILE_NAME: &str = ".gtlm.toml";

const BACK: &str = "settings.back";
const SIDE: &str = "settings.side";
const FRONT: &str = "settings.front";
const MODE: &str = "settings.mode";
const ENABLED: &str = "settings.enabled";

/// Settings store error.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unable to locate home directory")]
    NoHomeDirectory,

    #[error("unable to access {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unable to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Last applied LED configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Settings {
    pub back: bool,
    pub side: bool,
    pub front: bool,
    pub mode: Mode,
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { back: true, side: true, front: true, mode: Mode::Always, enabled: true }
    }
}

/// Key/value store backed by a TOML file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    table: Table,
    persisted: bool,
}

impl SettingsStore {
    /// Default settings file location.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::home_dir().map(|home| home.join(FILE_NAME)).ok_or(SettingsError::NoHomeDirectory)
    }

    /// Read the store from `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        let (table, persisted) = match fs::read_to_string(&path) {
            Ok(content) => (toml::from_str::<Table>(&content)?, true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No settings at {}", path.display());
                (Table::new(), false)
            },
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        Ok(Self { path, table, persisted })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value at a dotted key path.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let mut value = self.table.get(segments.next()?)?;
        for segment in segments {
            value = value.as_table()?.get(segment)?;
        }
        Some(value)
    }

    /// Store a value at a dotted key path, creating missing tables.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        set_value(&mut self.table, key, value.into());
    }

    /// Read the settings, falling back to defaults for missing or invalid keys.
    pub fn load(&self) -> Settings {
        let defaults = Settings::default();

        let mode = match self.get(MODE) {
            None => defaults.mode,
            Some(value) => match value.as_integer().and_then(|mode| u8::try_from(mode).ok()) {
                Some(mode) => Mode::try_from(mode).unwrap_or_else(|_| {
                    warn!("Ignoring unknown mode {mode} in {}", self.path.display());
                    defaults.mode
                }),
                None => {
                    warn!("Ignoring invalid {MODE} value {value} in {}", self.path.display());
                    defaults.mode
                },
            },
        };

        Settings {
            back: self.bool_or(BACK, defaults.back),
            side: self.bool_or(SIDE, defaults.side),
            front: self.bool_or(FRONT, defaults.front),
            mode,
            enabled: self.bool_or(ENABLED, defaults.enabled),
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::Boolean(value)) => *value,
            Some(value) => {
                warn!("Ignoring invalid {key} value {value} in {}", self.path.display());
                default
            },
        }
    }

    /// Write the settings to disk.
    ///
    /// Returns `false` without touching the file if nothing changed.
    pub fn save(&mut self, settings: &Settings) -> Result<bool, SettingsError> {
        let previous = self.table.clone();

        self.set(BACK, settings.back);
        self.set(SIDE, settings.side);
        self.set(FRONT, settings.front);
        self.set(MODE, i64::from(settings.mode as u8));
        self.set(ENABLED, settings.enabled);

        if self.persisted && previous == self.table {
            debug!("Settings unchanged");
            return Ok(false);
        }

        let content = toml::to_string(&self.table)?;
        fs::write(&self.path, content)
            .map_err(|source| SettingsError::Io { path: self.path.clone(), source })?;
        self.persisted = true;

        debug!("Saved settings to {}", self.path.display());

        Ok(true)
    }
}

fn set_value(table: &mut Table, key: &str, value: Value) {
    match key.split_once('.') {
        Some((head, rest)) => {
            let entry = table.entry(head).or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            if let Value::Table(child) = entry {
                set_value(child, rest, value);
            }
        },
        None => {
            table.insert(key.to_string(), value);
        },
    }
}
