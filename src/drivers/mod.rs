// src/drivers/mod.rs
pub mod buffer;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod protocol;
pub mod source;
pub mod velocity;
pub use buffer::{SampleSeries, LIVE_CAPACITY};
pub use error::TelemetryError;
pub use pipeline::{Ingestor, SamplePipeline};
pub use plot::{export_frame_png, render_frame_png};
pub use protocol::{
    parse_record, DecoderOptions, DecoderStats, LineDecoder, LineOutcome, RejectReason,
};
pub use source::{
    available_ports, ManualSource, SampleSource, SensorCommand, SerialSource, SimulatedSource,
};
pub use velocity::{VelocityEstimator, VELOCITY_HISTORY_SIZE};
