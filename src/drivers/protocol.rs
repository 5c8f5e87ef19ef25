use log::{debug, warn};

use crate::types::Sample;

/// Longest unterminated tail we keep before giving up on the line.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    TooFewFields,
    /// Field at `index` (0-based) did not parse as its numeric type.
    BadField { index: usize },
    NonPositiveTimestamp,
}

/// Result of interpreting one terminated line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineOutcome {
    Sample(Sample),
    /// Blank line or `#` comment.
    Skipped,
    Rejected(RejectReason),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DecoderOptions {
    /// Admit `timestamp == 0`. Off by default so a zeroed record is treated as garbage.
    pub accept_zero_timestamp: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub accepted: u64,
    pub skipped: u64,
    pub rejected: u64,
}

/// Parses `timestamp,position,force,encoderPulses[,ignored...]`.
pub fn parse_record(line: &str, options: DecoderOptions) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return LineOutcome::Skipped;
    }
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 4 {
        return LineOutcome::Rejected(RejectReason::TooFewFields);
    }
    let Ok(timestamp_ms) = fields[0].parse::<i64>() else {
        return LineOutcome::Rejected(RejectReason::BadField { index: 0 });
    };
    let Some(position_mm) = parse_finite(fields[1]) else {
        return LineOutcome::Rejected(RejectReason::BadField { index: 1 });
    };
    let Some(force_kg) = parse_finite(fields[2]) else {
        return LineOutcome::Rejected(RejectReason::BadField { index: 2 });
    };
    let Ok(encoder_pulses) = fields[3].parse::<i64>() else {
        return LineOutcome::Rejected(RejectReason::BadField { index: 3 });
    };
    let timestamp_ok = if options.accept_zero_timestamp {
        timestamp_ms >= 0
    } else {
        timestamp_ms > 0
    };
    if !timestamp_ok {
        return LineOutcome::Rejected(RejectReason::NonPositiveTimestamp);
    }
    LineOutcome::Sample(Sample::new(
        timestamp_ms,
        position_mm,
        force_kg,
        encoder_pulses,
    ))
}

fn parse_finite(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Resumable splitter for a `\n`-terminated byte stream.
///
/// Chunk boundaries are irrelevant: bytes after the last terminator are kept
/// until the next call completes the line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
    // set after a runaway tail is dropped; cleared at the next terminator
    discarding: bool,
    options: DecoderOptions,
    stats: DecoderStats,
}

impl LineDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self {
            pending: Vec::new(),
            discarding: false,
            options,
            stats: DecoderStats::default(),
        }
    }

    /// Feeds a chunk and returns every sample completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Sample> {
        let mut out = Vec::new();
        self.feed_with(chunk, |sample| out.push(sample));
        out
    }

    pub fn feed_with(&mut self, chunk: &[u8], mut emit: impl FnMut(Sample)) {
        let mut rest = chunk;
        while let Some(newline) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(newline);
            rest = &tail[1..];
            if self.discarding {
                self.discarding = false;
                self.stats.rejected += 1;
                continue;
            }
            if self.pending.is_empty() {
                self.handle_line(head, &mut emit);
            } else {
                let mut line = std::mem::take(&mut self.pending);
                line.extend_from_slice(head);
                self.handle_line(&line, &mut emit);
            }
        }
        if self.discarding {
            return;
        }
        self.pending.extend_from_slice(rest);
        if self.pending.len() > MAX_PENDING_BYTES {
            warn!(
                "discarding {} bytes of unterminated input",
                self.pending.len()
            );
            self.pending.clear();
            self.discarding = true;
        }
    }

    fn handle_line(&mut self, raw: &[u8], emit: &mut impl FnMut(Sample)) {
        let text = String::from_utf8_lossy(raw);
        match parse_record(&text, self.options) {
            LineOutcome::Sample(sample) => {
                self.stats.accepted += 1;
                emit(sample);
            }
            LineOutcome::Skipped => self.stats.skipped += 1,
            LineOutcome::Rejected(reason) => {
                self.stats.rejected += 1;
                debug!("dropped line {:?}: {:?}", text.trim(), reason);
            }
        }
    }

    /// Bytes received after the last terminator.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.discarding = false;
        self.stats = DecoderStats::default();
    }
}
