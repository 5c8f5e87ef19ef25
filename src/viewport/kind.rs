use std::f64::consts::TAU;

use crate::config::CalibrationConfig;
use crate::types::Sample;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlotKind {
    Position,
    Force,
    Encoder,
    ForceVsPosition,
    Comparison,
}

/// Per-kind linear coordinate mapping and axis titles.
pub struct AxisSpec {
    pub title: &'static str,
    pub x_title: &'static str,
    pub y_title: &'static str,
    /// Tick labels on the x axis carry a seconds suffix.
    pub time_axis: bool,
    pub map: fn(&Sample) -> (f64, f64),
}

fn time_position(s: &Sample) -> (f64, f64) {
    (s.seconds(), s.position_mm)
}

fn time_force(s: &Sample) -> (f64, f64) {
    (s.seconds(), s.force_kg)
}

fn time_encoder(s: &Sample) -> (f64, f64) {
    (s.seconds(), s.encoder_pulses as f64)
}

fn position_force(s: &Sample) -> (f64, f64) {
    (s.position_mm, s.force_kg)
}

static AXES: [AxisSpec; 5] = [
    AxisSpec {
        title: "Position",
        x_title: "Time (s)",
        y_title: "Position (mm)",
        time_axis: true,
        map: time_position,
    },
    AxisSpec {
        title: "Force",
        x_title: "Time (s)",
        y_title: "Force (kg)",
        time_axis: true,
        map: time_force,
    },
    AxisSpec {
        title: "Encoder",
        x_title: "Time (s)",
        y_title: "Encoder (pulses)",
        time_axis: true,
        map: time_encoder,
    },
    AxisSpec {
        title: "Force vs Position",
        x_title: "Position (mm)",
        y_title: "Force (kg)",
        time_axis: false,
        map: position_force,
    },
    AxisSpec {
        title: "Comparison",
        x_title: "Time (s)",
        y_title: "Position (mm)",
        time_axis: true,
        map: time_position,
    },
];

impl PlotKind {
    pub const ALL: [PlotKind; 5] = [
        PlotKind::Position,
        PlotKind::Force,
        PlotKind::Encoder,
        PlotKind::ForceVsPosition,
        PlotKind::Comparison,
    ];

    pub fn axes(self) -> &'static AxisSpec {
        let index = match self {
            PlotKind::Position => 0,
            PlotKind::Force => 1,
            PlotKind::Encoder => 2,
            PlotKind::ForceVsPosition => 3,
            PlotKind::Comparison => 4,
        };
        &AXES[index]
    }

    pub fn supports_polar(self) -> bool {
        self == PlotKind::Comparison
    }
}

/// Angle/radius mapping for the polar comparison view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolarMapping {
    pub pulses_per_rev: i64,
    pub stroke_mm: f64,
}

impl PolarMapping {
    pub fn from_calibration(cal: &CalibrationConfig) -> Self {
        Self {
            pulses_per_rev: cal.polar_pulses_per_rev.max(1),
            stroke_mm: if cal.stroke_length_mm > 0.0 {
                cal.stroke_length_mm
            } else {
                1.0
            },
        }
    }

    /// Radians in `[0, 2π)`.
    pub fn angle(&self, s: &Sample) -> f64 {
        s.encoder_pulses.rem_euclid(self.pulses_per_rev) as f64 * TAU / self.pulses_per_rev as f64
    }

    /// Position as a fraction of the stroke, 0 at full extension and 1 at full compression.
    pub fn radius_fraction(&self, s: &Sample) -> f64 {
        (s.position_mm + self.stroke_mm / 2.0) / self.stroke_mm
    }

    pub fn map(&self, s: &Sample) -> (f64, f64) {
        (self.angle(s), self.radius_fraction(s))
    }
}

impl Default for PolarMapping {
    fn default() -> Self {
        Self::from_calibration(&CalibrationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_maps_each_kind() {
        let s = Sample::new(2500, 12.0, -3.0, 42);
        assert_eq!((PlotKind::Position.axes().map)(&s), (2.5, 12.0));
        assert_eq!((PlotKind::Force.axes().map)(&s), (2.5, -3.0));
        assert_eq!((PlotKind::Encoder.axes().map)(&s), (2.5, 42.0));
        assert_eq!((PlotKind::ForceVsPosition.axes().map)(&s), (12.0, -3.0));
        assert_eq!((PlotKind::Comparison.axes().map)(&s), (2.5, 12.0));
        assert!(!PlotKind::ForceVsPosition.axes().time_axis);
    }

    #[test]
    fn polar_angle_wraps_and_handles_negative_counts() {
        let polar = PolarMapping {
            pulses_per_rev: 3600,
            stroke_mm: 75.0,
        };
        let at = |pulses| polar.angle(&Sample::new(1, 0.0, 0.0, pulses));
        assert!((at(900) - TAU / 4.0).abs() < 1e-12);
        assert!((at(3600 + 900) - TAU / 4.0).abs() < 1e-12);
        assert!((at(-900) - 3.0 * TAU / 4.0).abs() < 1e-12);
    }

    #[test]
    fn polar_radius_spans_stroke() {
        let polar = PolarMapping {
            pulses_per_rev: 3600,
            stroke_mm: 80.0,
        };
        let r = |pos| polar.radius_fraction(&Sample::new(1, pos, 0.0, 0));
        assert_eq!(r(-40.0), 0.0);
        assert_eq!(r(0.0), 0.5);
        assert_eq!(r(40.0), 1.0);
    }
}
