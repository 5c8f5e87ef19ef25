use crate::drivers::error::TelemetryError;
use crate::drivers::protocol::{DecoderOptions, DecoderStats, LineDecoder};
use crate::drivers::source::{SampleSource, SensorCommand};
use crate::drivers::velocity::VelocityEstimator;
use crate::types::Sample;

const READ_CHUNK_BYTES: usize = 4096;

/// decode -> estimate, in arrival order.
#[derive(Debug, Default)]
pub struct Ingestor {
    decoder: LineDecoder,
    estimator: VelocityEstimator,
}

impl Ingestor {
    pub fn new(options: DecoderOptions) -> Self {
        Self {
            decoder: LineDecoder::new(options),
            estimator: VelocityEstimator::default(),
        }
    }

    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<Sample> {
        let estimator = &mut self.estimator;
        let mut out = Vec::new();
        self.decoder.feed_with(chunk, |mut sample| {
            estimator.estimate(&mut sample);
            out.push(sample);
        });
        out
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Called on (re)connect.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.estimator.reset();
    }
}

/// Source plus ingestor; the caller decides where the samples go next.
pub struct SamplePipeline<S: SampleSource> {
    source: S,
    ingestor: Ingestor,
    scratch: Vec<u8>,
}

impl<S: SampleSource> SamplePipeline<S> {
    pub fn new(source: S, options: DecoderOptions) -> Self {
        Self {
            source,
            ingestor: Ingestor::new(options),
            scratch: vec![0; READ_CHUNK_BYTES],
        }
    }

    /// Reads one chunk and returns the samples it completed.
    pub fn pump_once(&mut self) -> Result<Vec<Sample>, TelemetryError> {
        let n = self.source.read_chunk(&mut self.scratch)?;
        if n == 0 {
            return Ok(Vec::new());
        }
        Ok(self.ingestor.ingest(&self.scratch[..n]))
    }

    pub fn send_command(&mut self, command: SensorCommand) -> Result<(), TelemetryError> {
        self.source.send_command(command)
    }

    pub fn stats(&self) -> DecoderStats {
        self.ingestor.stats()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
