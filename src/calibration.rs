// Per-motor direction calibration
//
// The store remembers, per motor, whether the physical wiring matches the
// logical "forward" convention. The session tracks the one calibration run
// that may be in progress.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::StorageError;

/// Persisted calibration values, keyed by motor index
#[derive(Debug, Default)]
pub struct CalibrationStore {
    path: Option<PathBuf>,
    entries: BTreeMap<usize, bool>,
}

impl CalibrationStore {
    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file starts empty; so does an unreadable one,
    /// with a warning, since calibration can always be redone.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(Some(entries)) => {
                info!(
                    "Loaded calibration for {} motor(s) from {}",
                    entries.len(),
                    path.display()
                );
                entries
            }
            Ok(None) => {
                info!("No calibration file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Ignoring calibration file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            entries,
        }
    }

    fn load(path: &Path) -> Result<Option<BTreeMap<usize, bool>>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Stored value for a motor, `None` if never calibrated
    pub fn get(&self, motor: usize) -> Option<bool> {
        self.entries.get(&motor).copied()
    }

    /// Record a value and rewrite the backing file
    ///
    /// The in-memory value is updated even when persisting fails.
    pub fn set(&mut self, motor: usize, is_direction_correct: bool) -> Result<(), StorageError> {
        self.entries.insert(motor, is_direction_correct);
        self.persist()
    }

    fn persist(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Calibration workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationSession {
    #[default]
    Idle,
    /// Motor is being driven forward while the operator watches it
    Testing { motor: usize },
    /// Result banner stays up until the display window has elapsed
    JustFinished {
        motor: usize,
        is_direction_correct: bool,
        finished_at: u32,
    },
}

impl CalibrationSession {
    pub fn testing_motor(&self) -> Option<usize> {
        match self {
            CalibrationSession::Testing { motor } => Some(*motor),
            _ => None,
        }
    }

    /// True if a `JustFinished` banner has been up for at least `window_ms`
    pub fn banner_elapsed(&self, now: u32, window_ms: u32) -> bool {
        match self {
            CalibrationSession::JustFinished { finished_at, .. } => {
                now.wrapping_sub(*finished_at) >= window_ms
            }
            _ => false,
        }
    }
}
