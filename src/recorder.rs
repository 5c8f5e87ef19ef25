use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::info;
use serde::{Deserialize, Serialize};

use crate::drivers::TelemetryError;
use crate::types::{Sample, SessionMetadata};

/// Recording stops on its own after this long.
pub const MAX_RECORDING: Duration = Duration::from_secs(120);

/// One recorded run plus the rig metadata it was taken with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub name: String,
    pub description: String,
    pub started_at_unix: u64,
    pub strut_info: String,
    pub spring_rate: f64,
    pub damping_setting: f64,
    pub test_conditions: String,
    pub data: Vec<Sample>,
}

impl Session {
    pub fn max_force(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, s| acc.max(s.force_kg.abs()))
    }

    pub fn max_velocity(&self) -> f64 {
        self.data
            .iter()
            .fold(0.0, |acc, s| acc.max(s.velocity_mm_s.abs()))
    }

    /// Travel between the extreme positions seen.
    pub fn stroke_length(&self) -> f64 {
        let mut positions = self.data.iter().map(|s| s.position_mm);
        let Some(first) = positions.next() else {
            return 0.0;
        };
        let (lo, hi) = positions.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        hi - lo
    }

    pub fn force_vs_position(&self) -> Vec<[f64; 2]> {
        self.data.iter().map(|s| [s.position_mm, s.force_kg]).collect()
    }

    pub fn velocity_vs_time(&self) -> Vec<[f64; 2]> {
        self.data.iter().map(|s| [s.seconds(), s.velocity_mm_s]).collect()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Collects samples into a [`Session`] while recording is on.
#[derive(Debug)]
pub struct SessionRecorder {
    current: Option<Session>,
    started: Option<Instant>,
    limit: Duration,
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::with_limit(MAX_RECORDING)
    }

    pub fn with_limit(limit: Duration) -> Self {
        Self {
            current: None,
            started: None,
            limit,
        }
    }

    pub fn start(&mut self, name: &str) {
        let started_at_unix = unix_now();
        let name = if name.trim().is_empty() {
            format!("session_{started_at_unix}")
        } else {
            name.trim().to_owned()
        };
        info!("recording started: {name}");
        self.current = Some(Session {
            name,
            started_at_unix,
            ..Session::default()
        });
        self.started = Some(Instant::now());
    }

    pub fn record(&mut self, sample: &Sample) {
        if let Some(session) = &mut self.current {
            session.data.push(*sample);
        }
    }

    pub fn set_metadata(&mut self, meta: &SessionMetadata) {
        if let Some(session) = &mut self.current {
            session.description = meta.description.clone();
            session.strut_info = meta.strut_info.clone();
            session.spring_rate = meta.spring_rate;
            session.damping_setting = meta.damping_setting;
            session.test_conditions = meta.test_conditions.clone();
        }
    }

    /// Wall-clock time since `start`, while recording.
    pub fn elapsed(&self) -> Option<Duration> {
        self.current.as_ref()?;
        self.started.map(|t| t.elapsed())
    }

    pub fn limit_reached(&self) -> bool {
        self.elapsed().is_some_and(|e| e >= self.limit)
    }

    pub fn stop(&mut self) -> Option<Session> {
        self.started = None;
        let session = self.current.take()?;
        info!(
            "recording stopped: {} ({} samples)",
            session.name,
            session.data.len()
        );
        Some(session)
    }

    pub fn is_recording(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }
}

/// Writes `session` as JSON. A directory target gets `<name>.json` inside it.
pub fn save_session(session: &Session, target: &Path) -> Result<PathBuf, TelemetryError> {
    let path = if target.is_dir() {
        target.join(format!("{}.json", session.name))
    } else {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        target.to_path_buf()
    };
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, session)?;
    writer.flush()?;
    info!("saved session to {}", path.display());
    Ok(path)
}

pub fn load_session(path: &Path) -> Result<Session, TelemetryError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| TelemetryError::InvalidSession {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// `*.json` files in `dir`, oldest first.
pub fn list_sessions(dir: &Path) -> Result<Vec<PathBuf>, TelemetryError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            let modified = fs::metadata(&path)?.modified().unwrap_or(UNIX_EPOCH);
            found.push((modified, path));
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

fn export_delimited(
    session: &Session,
    path: &Path,
    header: &str,
    sep: char,
) -> Result<(), TelemetryError> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "{header}")?;
    for s in &session.data {
        writeln!(
            w,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            s.timestamp_ms, s.position_mm, s.force_kg, s.encoder_pulses, s.velocity_mm_s
        )?;
    }
    w.flush()?;
    Ok(())
}

pub fn export_csv(session: &Session, path: &Path) -> Result<(), TelemetryError> {
    export_delimited(
        session,
        path,
        "timestamp,position_mm,force_kg,encoder_pulses,velocity_mm_s",
        ',',
    )
}

/// Tab-separated text that spreadsheets open directly.
pub fn export_spreadsheet(session: &Session, path: &Path) -> Result<(), TelemetryError> {
    export_delimited(
        session,
        path,
        "Timestamp\tPosition (mm)\tForce (kg)\tEncoder (pulses)\tVelocity (mm/s)",
        '\t',
    )
}
