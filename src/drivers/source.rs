use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::TelemetryError;

/// Fire-and-forget commands understood by the sensor firmware.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorCommand {
    Tare,
    ResetEncoder,
    CalibrateLoad(f64),
}

impl fmt::Display for SensorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorCommand::Tare => write!(f, "TARE"),
            SensorCommand::ResetEncoder => write!(f, "RESET_ENCODER"),
            SensorCommand::CalibrateLoad(factor) => write!(f, "CAL_LOAD:{factor}"),
        }
    }
}

/// A byte stream of protocol lines plus an outbound line channel.
pub trait SampleSource {
    /// Reads whatever is available; `Ok(0)` means nothing yet.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TelemetryError>;
    /// Sends one line; the terminator is appended.
    fn send_line(&mut self, line: &str) -> Result<(), TelemetryError>;

    fn send_command(&mut self, command: SensorCommand) -> Result<(), TelemetryError> {
        self.send_line(&command.to_string())
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TelemetryError> {
        (**self).read_chunk(buf)
    }

    fn send_line(&mut self, line: &str) -> Result<(), TelemetryError> {
        (**self).send_line(line)
    }
}

/// In-memory source useful for tests and deterministic playback.
#[derive(Debug, Default)]
pub struct ManualSource {
    chunks: VecDeque<Vec<u8>>,
    sent: Vec<String>,
}

impl ManualSource {
    pub fn new<C: Into<Vec<u8>>>(chunks: impl IntoIterator<Item = C>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            sent: Vec::new(),
        }
    }

    pub fn sent_lines(&self) -> &[String] {
        &self.sent
    }
}

impl SampleSource for ManualSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TelemetryError> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn send_line(&mut self, line: &str) -> Result<(), TelemetryError> {
        self.sent.push(line.to_owned());
        Ok(())
    }
}

/// Names of serial ports visible to the OS.
pub fn available_ports() -> Result<Vec<String>, TelemetryError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}

/// 8N1 serial port without flow control.
pub struct SerialSource {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialSource {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, TelemetryError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(20))
            .open()?;
        info!("opened {port_name} at {baud_rate} baud");
        Ok(Self { port })
    }
}

impl SampleSource for SerialSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TelemetryError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn send_line(&mut self, line: &str) -> Result<(), TelemetryError> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }
}

const SIM_PERIOD_MS: i64 = 10;
const SIM_STROKE_MM: f64 = 75.0;
const SIM_CYCLE_MS: f64 = 2000.0;
const SIM_PULSES_PER_STEP: i64 = 36;

/// Emulated test rig: sinusoidal stroke, spring-and-damper force, spinning encoder.
///
/// Output is handed out in irregular chunk sizes so consumers see lines split
/// across reads, like a real serial port.
pub struct SimulatedSource {
    rng: StdRng,
    clock_ms: i64,
    encoder: i64,
    tare_kg: f64,
    load_scale: f64,
    outgoing: Vec<u8>,
}

impl SimulatedSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            clock_ms: 0,
            encoder: 0,
            tare_kg: 0.0,
            load_scale: 1.0,
            outgoing: Vec::new(),
        }
    }

    fn raw_force(&self, position: f64, velocity: f64) -> f64 {
        // 0.4 kg/mm spring plus light damping.
        0.4 * position + 0.02 * velocity
    }

    fn emit_line(&mut self) {
        self.clock_ms += SIM_PERIOD_MS;
        self.encoder += SIM_PULSES_PER_STEP;
        let phase = TAU * self.clock_ms as f64 / SIM_CYCLE_MS;
        let position = 0.5 * SIM_STROKE_MM * phase.sin();
        let velocity = 0.5 * SIM_STROKE_MM * phase.cos() * TAU * 1000.0 / SIM_CYCLE_MS;
        let noise: f64 = self.rng.gen_range(-0.05..0.05);
        let force = (self.raw_force(position, velocity) - self.tare_kg) * self.load_scale + noise;
        if self.rng.gen_ratio(1, 200) {
            self.outgoing.extend_from_slice(b"# heartbeat\n");
        }
        let line = format!(
            "{},{:.3},{:.3},{}\n",
            self.clock_ms, position, force, self.encoder
        );
        self.outgoing.extend_from_slice(line.as_bytes());
    }
}

impl SampleSource for SimulatedSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TelemetryError> {
        self.emit_line();
        let max = self.outgoing.len().min(buf.len());
        if max == 0 {
            return Ok(0);
        }
        let n = self.rng.gen_range(1..=max);
        buf[..n].copy_from_slice(&self.outgoing[..n]);
        self.outgoing.drain(..n);
        Ok(n)
    }

    fn send_line(&mut self, line: &str) -> Result<(), TelemetryError> {
        debug!("simulated rig received {line:?}");
        match line {
            "TARE" => {
                let phase = TAU * self.clock_ms as f64 / SIM_CYCLE_MS;
                let position = 0.5 * SIM_STROKE_MM * phase.sin();
                self.tare_kg = self.raw_force(position, 0.0);
            }
            "RESET_ENCODER" => self.encoder = 0,
            other => {
                if let Some(factor) = other
                    .strip_prefix("CAL_LOAD:")
                    .and_then(|f| f.parse::<f64>().ok())
                {
                    self.load_scale = factor;
                }
            }
        }
        Ok(())
    }
}
