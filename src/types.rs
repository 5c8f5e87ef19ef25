// src/types.rs
use serde::{Deserialize, Serialize};

use crate::drivers::SensorCommand;
use crate::recorder::Session;

/// One sensor reading. `velocity_mm_s` is derived by the estimator, never transmitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    #[serde(rename = "position")]
    pub position_mm: f64,
    #[serde(rename = "force")]
    pub force_kg: f64,
    pub encoder_pulses: i64,
    #[serde(rename = "velocity", default)]
    pub velocity_mm_s: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, position_mm: f64, force_kg: f64, encoder_pulses: i64) -> Self {
        Self {
            timestamp_ms,
            position_mm,
            force_kg,
            encoder_pulses,
            velocity_mm_s: 0.0,
        }
    }

    pub fn seconds(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }
}

// Connection mode
#[derive(PartialEq, Clone, Debug)]
pub enum ConnectionMode {
    Simulation,
    Serial { port: String, baud_rate: u32 },
}

// GUI -> engine
#[derive(Clone, Debug)]
pub enum EngineCommand {
    Connect(ConnectionMode),
    Disconnect,
    Sensor(SensorCommand),
    StartRecording(String),
    SetMetadata(SessionMetadata),
    StopRecording,
}

/// Rig details attached to the session being recorded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionMetadata {
    pub description: String,
    pub strut_info: String,
    pub spring_rate: f64,
    pub damping_setting: f64,
    pub test_conditions: String,
}

// engine -> GUI
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Log(String),
    Status(bool),
    Sample(Sample),
    RecordingStatus(bool),
    SessionFinished(Session),
}
