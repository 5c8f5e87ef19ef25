use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::drivers::{DecoderOptions, TelemetryError};

pub const DEFAULT_CONFIG_FILE: &str = "strutscope.json";
pub const CONFIG_ENV_VAR: &str = "STRUTSCOPE_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
        }
    }
}

/// Calibration constants consumed by the plots and sent to the firmware.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub load_cell_scale: f64,
    pub pot_min_raw: i32,
    pub pot_max_raw: i32,
    pub stroke_length_mm: f64,
    pub encoder_ppr: i64,
    /// Angular granularity of the polar view (3600 = 0.1°).
    pub polar_pulses_per_rev: i64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            load_cell_scale: 1.0,
            pot_min_raw: 0,
            pot_max_raw: 1023,
            stroke_length_mm: 75.0,
            encoder_ppr: 1000,
            polar_pulses_per_rev: 3600,
        }
    }
}

/// Full-scale count of the 10-bit potentiometer ADC.
pub const POT_FULL_SCALE: i32 = 1023;

impl CalibrationConfig {
    /// ADC count implied by a position over the configured stroke.
    pub fn pot_raw_for(&self, position_mm: f64) -> i32 {
        if self.stroke_length_mm <= 0.0 {
            return 0;
        }
        ((position_mm * POT_FULL_SCALE as f64 / self.stroke_length_mm) as i32).clamp(0, POT_FULL_SCALE)
    }

    pub fn capture_pot_min(&mut self, position_mm: f64) -> i32 {
        self.pot_min_raw = self.pot_raw_for(position_mm);
        self.pot_min_raw
    }

    pub fn capture_pot_max(&mut self, position_mm: f64) -> i32 {
        self.pot_max_raw = self.pot_raw_for(position_mm);
        self.pot_max_raw
    }

    /// Share of the captured min..max travel; `None` until max > min.
    pub fn travel_fraction(&self, position_mm: f64) -> Option<f64> {
        let span = self.pot_max_raw - self.pot_min_raw;
        (span > 0).then(|| (self.pot_raw_for(position_mm) - self.pot_min_raw) as f64 / span as f64)
    }

    pub fn encoder_revolutions(&self, pulses: i64) -> f64 {
        if self.encoder_ppr <= 0 {
            return 0.0;
        }
        pulses as f64 / self.encoder_ppr as f64
    }
}

/// Load-cell factor that makes `reading_kg` read as `known_kg`.
pub fn load_cell_factor(known_kg: f64, reading_kg: f64) -> Option<f64> {
    (known_kg > 0.0 && reading_kg > 0.0).then(|| known_kg / reading_kg)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub autoscale: bool,
    pub grid: bool,
    pub overlay: bool,
    pub polar: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            autoscale: true,
            grid: true,
            overlay: false,
            polar: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub accept_zero_timestamp: bool,
}

impl DecoderConfig {
    pub fn options(&self) -> DecoderOptions {
        DecoderOptions {
            accept_zero_timestamp: self.accept_zero_timestamp,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub calibration: CalibrationConfig,
    pub plot: PlotConfig,
    pub decoder: DecoderConfig,
    pub sessions_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            calibration: CalibrationConfig::default(),
            plot: PlotConfig::default(),
            decoder: DecoderConfig::default(),
            sessions_dir: PathBuf::from("sessions"),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, TelemetryError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), TelemetryError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `$STRUTSCOPE_CONFIG` or `strutscope.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring config {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "serial": { "port": "/dev/ttyACM0" }, "calibration": { "stroke_length_mm": 100.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.calibration.stroke_length_mm, 100.0);
        assert_eq!(config.calibration.polar_pulses_per_rev, 3600);
        assert!(config.plot.autoscale);
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("strutscope-config-{}.json", std::process::id()));
        let mut config = AppConfig::default();
        config.decoder.accept_zero_timestamp = true;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn broken_file_falls_back() {
        let path = std::env::temp_dir().join(format!("strutscope-broken-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_cell_factor_needs_positive_inputs() {
        assert_eq!(load_cell_factor(10.0, 4.0), Some(2.5));
        assert_eq!(load_cell_factor(10.0, 0.0), None);
        assert_eq!(load_cell_factor(-1.0, 4.0), None);
    }

    #[test]
    fn potentiometer_capture_and_travel() {
        let mut cal = CalibrationConfig::default();
        assert_eq!(cal.pot_raw_for(75.0), POT_FULL_SCALE);
        assert_eq!(cal.pot_raw_for(-5.0), 0);
        assert_eq!(cal.capture_pot_min(7.5), 102);
        assert_eq!(cal.capture_pot_max(67.5), 920);
        assert_eq!(cal.travel_fraction(7.5), Some(0.0));
        assert_eq!(cal.travel_fraction(67.5), Some(1.0));
        cal.capture_pot_max(0.0);
        assert_eq!(cal.travel_fraction(10.0), None);
    }

    #[test]
    fn encoder_revolutions_use_ppr() {
        let mut cal = CalibrationConfig::default();
        assert_eq!(cal.encoder_revolutions(2500), 2.5);
        cal.encoder_ppr = 0;
        assert_eq!(cal.encoder_revolutions(2500), 0.0);
    }
}
