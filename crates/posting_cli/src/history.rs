use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use engine_logging::{engine_error, engine_info, engine_warn};
use posting_engine::{write_atomic, PersistError, RunRecord, RunSink};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub record: RunRecord,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryStats {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub by_platform: BTreeMap<String, usize>,
    pub by_error_type: BTreeMap<String, usize>,
}

impl HistoryStats {
    /// Percentage of successful runs, `0.0` for an empty history.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successes as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for HistoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total runs:   {}", self.total)?;
        writeln!(f, "Successful:   {}", self.successes)?;
        writeln!(f, "Failed:       {}", self.failures)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate())?;
        if !self.by_platform.is_empty() {
            writeln!(f, "By platform:")?;
            for (platform, count) in &self.by_platform {
                writeln!(f, "  {platform}: {count}")?;
            }
        }
        if !self.by_error_type.is_empty() {
            writeln!(f, "By error type:")?;
            for (error_type, count) in &self.by_error_type {
                writeln!(f, "  {error_type}: {count}")?;
            }
        }
        Ok(())
    }
}

/// Run history kept in a RON file and rewritten atomically after every record.
pub struct RonHistory {
    path: PathBuf,
    state: Mutex<HistoryFile>,
}

impl RonHistory {
    /// Load `path`. A missing file starts an empty history; an unreadable one
    /// is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(content) => match ron::from_str::<HistoryFile>(&content) {
                Ok(state) => {
                    engine_info!("Loaded {} history entries from {:?}", state.entries.len(), path);
                    state
                }
                Err(err) => {
                    engine_warn!("Failed to parse history {:?}: {}", path, err);
                    HistoryFile::default()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => HistoryFile::default(),
            Err(err) => {
                engine_warn!("Failed to read history {:?}: {}", path, err);
                HistoryFile::default()
            }
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().entries.clone()
    }

    pub fn stats(&self) -> HistoryStats {
        let state = self.lock();
        let mut stats = HistoryStats::default();
        for entry in &state.entries {
            let record = &entry.record;
            stats.total += 1;
            if record.success {
                stats.successes += 1;
            } else {
                stats.failures += 1;
                let error_type = record.error_type.as_deref().unwrap_or("unknown");
                *stats.by_error_type.entry(error_type.to_string()).or_default() += 1;
            }
            *stats.by_platform.entry(record.platform.clone()).or_default() += 1;
        }
        stats
    }

    pub fn clear(&self) -> Result<(), PersistError> {
        let mut state = self.lock();
        state.entries.clear();
        save(&self.path, &state)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryFile> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RunSink for RonHistory {
    fn record(&self, record: &RunRecord) {
        let mut state = self.lock();
        state.entries.push(HistoryEntry {
            timestamp: Utc::now(),
            record: record.clone(),
        });
        if let Err(err) = save(&self.path, &state) {
            engine_error!("Failed to write history {:?}: {}", self.path, err);
        }
    }
}

fn save(path: &Path, state: &HistoryFile) -> Result<(), PersistError> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(state, pretty)
        .map_err(|err| PersistError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    write_atomic(path, &content)
}
