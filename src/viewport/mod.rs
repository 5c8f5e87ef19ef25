//! Plot viewport: owns the plotted series, keeps the visible data range and
//! converts data to drawable geometry.
//!
//! Mutation (`append_sample`, `pan`, `zoom`, ...) is kept apart from
//! [`Viewport::render`], which only reads state and returns a [`RenderFrame`].
pub mod bounds;
pub mod colormap;
pub mod kind;
pub mod projection;
pub mod render;

use std::cell::Cell;

use log::debug;

pub use bounds::ViewBounds;
pub use colormap::{Colormap, Rgb};
pub use kind::{PlotKind, PolarMapping};
pub use projection::{LinearProjection, PixelRect, Point, PolarProjection};
pub use render::{HAlign, Primitive, RenderFrame, TextStyle, VAlign};

use crate::config::{CalibrationConfig, PlotConfig};
use crate::drivers::SampleSeries;
use crate::types::Sample;

/// Gap between the canvas edge and the plot area.
pub const MARGIN: f64 = 60.0;
/// Extra strip under the plot area for the legend.
pub const LEGEND_HEIGHT: f64 = 30.0;

/// Plot area inside a canvas.
pub fn plot_area(canvas: PixelRect) -> PixelRect {
    PixelRect::new(
        canvas.left + MARGIN,
        canvas.top + MARGIN,
        canvas.width - 2.0 * MARGIN,
        canvas.height - 2.0 * MARGIN - LEGEND_HEIGHT,
    )
}

#[derive(Clone, Debug)]
struct Overlay {
    label: String,
    series: SampleSeries,
}

pub struct Viewport {
    kind: PlotKind,
    main: SampleSeries,
    main_label: Option<String>,
    overlays: Vec<Overlay>,
    bounds: ViewBounds,
    autoscale: bool,
    overlay_mode: bool,
    polar: bool,
    grid_visible: bool,
    panning: bool,
    area: PixelRect,
    polar_mapping: PolarMapping,
    // memoised scale factors for the last area/bounds pair
    scales: Cell<Option<LinearProjection>>,
}

impl Viewport {
    pub fn new(kind: PlotKind) -> Self {
        Self {
            kind,
            main: SampleSeries::live(),
            main_label: None,
            overlays: Vec::new(),
            bounds: ViewBounds::default(),
            autoscale: true,
            overlay_mode: false,
            polar: false,
            grid_visible: true,
            panning: false,
            area: PixelRect::default(),
            polar_mapping: PolarMapping::default(),
            scales: Cell::new(None),
        }
    }

    pub fn with_config(kind: PlotKind, plot: &PlotConfig, calibration: &CalibrationConfig) -> Self {
        let mut viewport = Self::new(kind);
        viewport.autoscale = plot.autoscale;
        viewport.overlay_mode = plot.overlay;
        viewport.polar = plot.polar;
        viewport.grid_visible = plot.grid;
        viewport.polar_mapping = PolarMapping::from_calibration(calibration);
        viewport
    }

    pub fn kind(&self) -> PlotKind {
        self.kind
    }

    pub fn bounds(&self) -> ViewBounds {
        self.bounds
    }

    pub fn main_series(&self) -> &SampleSeries {
        &self.main
    }

    pub fn overlay_labels(&self) -> impl Iterator<Item = &str> {
        self.overlays.iter().map(|o| o.label.as_str())
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn autoscale(&self) -> bool {
        self.autoscale
    }

    pub fn overlay_mode(&self) -> bool {
        self.overlay_mode
    }

    pub fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    pub fn polar_requested(&self) -> bool {
        self.polar
    }

    /// Polar projection is only used by the comparison kind.
    pub fn is_polar(&self) -> bool {
        self.polar && self.kind.supports_polar()
    }

    pub fn set_calibration(&mut self, calibration: &CalibrationConfig) {
        self.polar_mapping = PolarMapping::from_calibration(calibration);
        self.after_data_change();
    }

    /// Appends to the live series, evicting the oldest sample past capacity.
    pub fn append_sample(&mut self, sample: Sample) {
        if self.main.capacity().is_none() {
            // a loaded snapshot continues as a bounded live series
            let mut live = SampleSeries::live();
            live.replace(self.main.to_vec());
            self.main = live;
        }
        self.main.push(sample);
        self.after_data_change();
    }

    /// Overlay mode adds a labelled overlay; otherwise the main series is replaced.
    pub fn replace_series(&mut self, samples: Vec<Sample>, label: &str) {
        if self.overlay_mode {
            self.overlays.push(Overlay {
                label: label.to_owned(),
                series: SampleSeries::from_samples(samples),
            });
        } else {
            self.set_main(samples, label);
        }
        self.after_data_change();
    }

    /// Drops everything plotted and shows `samples` as the main series.
    pub fn show_series(&mut self, samples: Vec<Sample>, label: &str) {
        self.overlays.clear();
        self.set_main(samples, label);
        self.after_data_change();
    }

    fn set_main(&mut self, samples: Vec<Sample>, label: &str) {
        self.main = SampleSeries::from_samples(samples);
        self.main_label = (!label.is_empty()).then(|| label.to_owned());
    }

    pub fn add_overlay(&mut self, samples: Vec<Sample>, label: &str) {
        self.overlays.push(Overlay {
            label: label.to_owned(),
            series: SampleSeries::from_samples(samples),
        });
        self.after_data_change();
    }

    pub fn clear_overlays(&mut self) {
        self.overlays.clear();
        self.scales.set(None);
    }

    pub fn clear(&mut self) {
        self.main = SampleSeries::live();
        self.main_label = None;
        self.overlays.clear();
        self.scales.set(None);
    }

    pub fn set_autoscale(&mut self, enable: bool) {
        self.autoscale = enable;
        if enable {
            self.recompute_bounds();
        }
    }

    pub fn set_overlay_mode(&mut self, enable: bool) {
        self.overlay_mode = enable;
    }

    pub fn set_polar(&mut self, enable: bool) {
        self.polar = enable;
        self.after_data_change();
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.grid_visible = visible;
    }

    /// Tells the viewport how big its canvas is; pan/zoom pixels are relative to it.
    pub fn resize(&mut self, canvas: PixelRect) {
        let area = plot_area(canvas);
        if area != self.area {
            self.area = area;
            self.scales.set(None);
        }
    }

    pub fn begin_pan(&mut self) {
        self.panning = true;
    }

    pub fn end_pan(&mut self) {
        self.panning = false;
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    /// Shifts the view so content follows a drag of `(dx, dy)` pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let Some(projection) = self.projection() else {
            return;
        };
        let (ddx, ddy) = projection.pixel_delta_to_data(dx, dy);
        self.bounds = self.bounds.translated(-ddx, -ddy);
        self.scales.set(None);
    }

    /// Zooms about a pixel; `factor > 1` zooms in. The data point under `focus`
    /// stays under `focus`.
    pub fn zoom(&mut self, focus: Point, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let Some(projection) = self.projection() else {
            return;
        };
        let (x, y) = projection.screen_to_data(focus);
        let zoomed = self.bounds.zoomed_about(x, y, factor);
        if zoomed.is_usable() {
            self.bounds = zoomed;
            self.scales.set(None);
        }
    }

    /// Linear projection for the current plot area, memoised until state changes.
    pub fn projection(&self) -> Option<LinearProjection> {
        self.projection_for(self.area)
    }

    fn projection_for(&self, area: PixelRect) -> Option<LinearProjection> {
        if let Some(cached) = self.scales.get() {
            if cached.area == area && cached.bounds == self.bounds {
                return Some(cached);
            }
        }
        let projection = LinearProjection::new(self.bounds, area)?;
        self.scales.set(Some(projection));
        Some(projection)
    }

    pub fn screen_to_data(&self, p: Point) -> Option<(f64, f64)> {
        self.projection().map(|proj| proj.screen_to_data(p))
    }

    pub fn data_to_screen(&self, x: f64, y: f64) -> Option<Point> {
        self.projection().map(|proj| proj.data_to_screen(x, y))
    }

    /// X/Y of a sample under the active plot kind and submode.
    pub fn map_sample(&self, s: &Sample) -> (f64, f64) {
        if self.is_polar() {
            self.polar_mapping.map(s)
        } else {
            (self.kind.axes().map)(s)
        }
    }

    fn visible_series(&self) -> impl Iterator<Item = &SampleSeries> {
        std::iter::once(&self.main).chain(self.overlays.iter().map(|o| &o.series))
    }

    fn after_data_change(&mut self) {
        if self.autoscale && !self.panning {
            self.recompute_bounds();
        }
        self.scales.set(None);
    }

    fn recompute_bounds(&mut self) {
        // the polar view frames itself; keep the linear bounds for when it is switched off
        if self.is_polar() {
            return;
        }
        let points = self
            .visible_series()
            .flat_map(|series| series.iter())
            .map(|s| self.map_sample(s));
        if let Some(bounds) = ViewBounds::fit(points) {
            debug!("{:?} autoscaled to {:?}", self.kind, bounds);
            self.bounds = bounds;
        }
        self.scales.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::LIVE_CAPACITY;

    fn canvas() -> PixelRect {
        PixelRect::new(0.0, 0.0, 800.0, 600.0)
    }

    fn ramp(n: i64) -> Vec<Sample> {
        (1..=n)
            .map(|i| Sample::new(i * 100, i as f64, -(i as f64), i * 10))
            .collect()
    }

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn empty_viewport_uses_default_bounds() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.set_autoscale(true);
        assert_eq!(vp.bounds(), ViewBounds::default());
        vp.resize(canvas());
        assert!(vp.projection().is_some());
    }

    #[test]
    fn autoscale_follows_appends() {
        let mut vp = Viewport::new(PlotKind::Force);
        for s in ramp(11) {
            vp.append_sample(s);
        }
        let b = vp.bounds();
        // x: 0.1..1.1 s, y: -11..-1 kg
        assert!((b.min_x - (0.1 - 0.05)).abs() < 1e-9);
        assert!((b.max_x - (1.1 + 0.05)).abs() < 1e-9);
        assert!((b.min_y - (-11.0 - 0.5)).abs() < 1e-9);
    }

    #[test]
    fn manual_bounds_survive_appends_without_autoscale() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.set_autoscale(false);
        vp.append_sample(Sample::new(5000, 99.0, 0.0, 0));
        assert_eq!(vp.bounds(), ViewBounds::default());
        vp.set_autoscale(true);
        assert!(vp.bounds().max_y > 99.0);
    }

    #[test]
    fn live_series_is_capped() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.set_autoscale(false);
        for s in ramp(LIVE_CAPACITY as i64 + 1) {
            vp.append_sample(s);
        }
        assert_eq!(vp.main_series().len(), LIVE_CAPACITY);
        assert_eq!(vp.main_series().first().map(|s| s.timestamp_ms), Some(200));
    }

    #[test]
    fn overlay_mode_appends_instead_of_replacing() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.replace_series(ramp(3), "run A");
        assert_eq!(vp.main_series().len(), 3);
        vp.set_overlay_mode(true);
        vp.replace_series(ramp(20_000), "run B");
        vp.replace_series(ramp(2), "run C");
        assert_eq!(vp.main_series().len(), 3);
        assert_eq!(vp.overlay_labels().collect::<Vec<_>>(), ["run B", "run C"]);
        // bounds cover the longest overlay
        assert!(vp.bounds().max_x > 2000.0);
        vp.clear();
        assert!(vp.main_series().is_empty());
        assert_eq!(vp.overlay_count(), 0);
    }

    #[test]
    fn round_trip_before_and_after_navigation() {
        let mut vp = Viewport::new(PlotKind::ForceVsPosition);
        vp.resize(canvas());
        for s in ramp(50) {
            vp.append_sample(s);
        }
        let p = Point::new(321.0, 222.0);
        let check = |vp: &Viewport| {
            let (x, y) = vp.screen_to_data(p).unwrap();
            let back = vp.data_to_screen(x, y).unwrap();
            assert!((back.x - p.x).abs() < 1e-6 && (back.y - p.y).abs() < 1e-6);
        };
        check(&vp);
        vp.zoom(Point::new(200.0, 300.0), 1.15);
        check(&vp);
        vp.pan(-40.0, 25.0);
        check(&vp);
    }

    #[test]
    fn zoom_keeps_point_under_cursor() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.resize(canvas());
        let focus = Point::new(250.0, 180.0);
        let before = vp.screen_to_data(focus).unwrap();
        vp.zoom(focus, 1.15);
        assert!(close(vp.screen_to_data(focus).unwrap(), before));
        vp.zoom(focus, 1.0 / 1.15);
        assert!(close(vp.screen_to_data(focus).unwrap(), before));
        assert!((vp.bounds().width() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn pan_moves_content_with_the_drag() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.resize(canvas());
        let grab = Point::new(300.0, 200.0);
        let data = vp.screen_to_data(grab).unwrap();
        vp.pan(30.0, -12.0);
        let dropped = Point::new(330.0, 188.0);
        assert!(close(vp.screen_to_data(dropped).unwrap(), data));
    }

    #[test]
    fn panning_suspends_autoscale() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.resize(canvas());
        vp.append_sample(Sample::new(100, 1.0, 0.0, 0));
        vp.begin_pan();
        vp.pan(50.0, 0.0);
        let held = vp.bounds();
        vp.append_sample(Sample::new(200, 500.0, 0.0, 0));
        assert_eq!(vp.bounds(), held);
        vp.end_pan();
        assert!(vp.autoscale());
        vp.append_sample(Sample::new(300, 2.0, 0.0, 0));
        assert!(vp.bounds().max_y > 500.0);
    }

    #[test]
    fn loaded_series_stays_bounded_under_live_appends() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.set_autoscale(false);
        vp.replace_series(ramp(1), "bench");
        assert_eq!(vp.main_series().capacity(), None);
        for i in 0..(LIVE_CAPACITY as i64 + 500) {
            vp.append_sample(Sample::new(1000 + i, 0.0, 0.0, 0));
        }
        assert_eq!(vp.main_series().len(), LIVE_CAPACITY);
        assert_eq!(vp.main_series().capacity(), Some(LIVE_CAPACITY));
        assert_eq!(
            vp.main_series().last().map(|s| s.timestamp_ms),
            Some(1000 + LIVE_CAPACITY as i64 + 499)
        );
    }

    #[test]
    fn show_series_replaces_overlays_even_in_overlay_mode() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.set_overlay_mode(true);
        vp.replace_series(ramp(4), "old overlay");
        vp.show_series(ramp(7), "loaded");
        assert_eq!(vp.overlay_count(), 0);
        assert_eq!(vp.main_series().len(), 7);
    }

    #[test]
    fn polar_round_trip_keeps_linear_bounds() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        for i in 1..=100 {
            vp.append_sample(Sample::new(i * 1000, 30.0 + i as f64, 0.0, i * 40));
        }
        let linear = vp.bounds();
        vp.set_polar(true);
        vp.append_sample(Sample::new(101_000, 131.0, 0.0, 4040));
        vp.set_autoscale(false);
        vp.set_polar(false);
        assert_eq!(vp.bounds(), linear);
        vp.set_autoscale(true);
        assert!(vp.bounds().max_x > 101.0);
    }

    #[test]
    fn polar_flag_only_applies_to_comparison() {
        let mut vp = Viewport::new(PlotKind::Position);
        vp.set_polar(true);
        assert!(!vp.is_polar());
        let s = Sample::new(1000, 5.0, 1.0, 900);
        assert_eq!(vp.map_sample(&s), (1.0, 5.0));
        let mut cmp = Viewport::new(PlotKind::Comparison);
        cmp.set_polar(true);
        assert!(cmp.is_polar());
        let (angle, radius) = cmp.map_sample(&s);
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((radius - (5.0 + 37.5) / 75.0).abs() < 1e-12);
    }
}
