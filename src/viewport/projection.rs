use crate::types::Sample;
use crate::viewport::bounds::ViewBounds;
use crate::viewport::kind::PolarMapping;

/// Pixel-space point; y grows downward.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right() && p.y >= self.top && p.y <= self.bottom()
    }
}

/// Affine data <-> pixel transform with a flipped y axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearProjection {
    pub bounds: ViewBounds,
    pub area: PixelRect,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl LinearProjection {
    /// `None` when either the area or the bounds are degenerate.
    pub fn new(bounds: ViewBounds, area: PixelRect) -> Option<Self> {
        if !area.has_area() || !bounds.is_usable() {
            return None;
        }
        Some(Self {
            bounds,
            area,
            scale_x: area.width / bounds.width(),
            scale_y: area.height / bounds.height(),
        })
    }

    pub fn data_to_screen(&self, x: f64, y: f64) -> Point {
        Point::new(
            self.area.left + (x - self.bounds.min_x) * self.scale_x,
            self.area.bottom() - (y - self.bounds.min_y) * self.scale_y,
        )
    }

    pub fn screen_to_data(&self, p: Point) -> (f64, f64) {
        (
            self.bounds.min_x + (p.x - self.area.left) / self.scale_x,
            self.bounds.min_y + (self.area.bottom() - p.y) / self.scale_y,
        )
    }

    /// Data-space displacement for a pixel displacement.
    pub fn pixel_delta_to_data(&self, dx: f64, dy: f64) -> (f64, f64) {
        (dx / self.scale_x, -dy / self.scale_y)
    }
}

/// Maps samples onto a disc centred in the plot area; 0 rad points right,
/// angles increase counter-clockwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolarProjection {
    pub mapping: PolarMapping,
    pub center: Point,
    pub max_radius: f64,
}

impl PolarProjection {
    pub fn new(mapping: PolarMapping, area: PixelRect) -> Self {
        Self {
            mapping,
            center: area.center(),
            max_radius: (area.width.min(area.height) / 2.0).max(0.0),
        }
    }

    pub fn radius_px(&self, s: &Sample) -> f64 {
        self.mapping.radius_fraction(s) * self.max_radius
    }

    pub fn polar_to_screen(&self, angle: f64, radius_px: f64) -> Point {
        Point::new(
            self.center.x + radius_px * angle.cos(),
            self.center.y - radius_px * angle.sin(),
        )
    }

    pub fn project(&self, s: &Sample) -> Point {
        self.polar_to_screen(self.mapping.angle(s), self.radius_px(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn linear_corners_and_flip() {
        let proj = LinearProjection::new(
            ViewBounds::new(0.0, 10.0, -5.0, 5.0),
            PixelRect::new(60.0, 60.0, 200.0, 100.0),
        )
        .unwrap();
        assert!(approx(proj.data_to_screen(0.0, -5.0), Point::new(60.0, 160.0)));
        assert!(approx(proj.data_to_screen(10.0, 5.0), Point::new(260.0, 60.0)));
        assert!(approx(proj.data_to_screen(5.0, 0.0), Point::new(160.0, 110.0)));
    }

    #[test]
    fn linear_round_trip() {
        let proj = LinearProjection::new(
            ViewBounds::new(-3.2, 17.9, 100.0, 101.5),
            PixelRect::new(10.0, 20.0, 640.0, 480.0),
        )
        .unwrap();
        for &(x, y) in &[(10.0, 20.0), (650.0, 500.0), (333.3, 123.4), (11.0, 499.0)] {
            let p = Point::new(x, y);
            let (dx, dy) = proj.screen_to_data(p);
            assert!(approx(proj.data_to_screen(dx, dy), p));
        }
    }

    #[test]
    fn degenerate_inputs_refuse_projection() {
        let area = PixelRect::new(0.0, 0.0, 100.0, 100.0);
        assert!(LinearProjection::new(ViewBounds::new(1.0, 1.0, 0.0, 1.0), area).is_none());
        assert!(
            LinearProjection::new(ViewBounds::default(), PixelRect::new(0.0, 0.0, 0.0, 10.0))
                .is_none()
        );
    }

    #[test]
    fn polar_quarter_turn_points_up() {
        let proj = PolarProjection::new(
            PolarMapping {
                pulses_per_rev: 3600,
                stroke_mm: 100.0,
            },
            PixelRect::new(0.0, 0.0, 200.0, 100.0),
        );
        assert_eq!(proj.max_radius, 50.0);
        let s = Sample::new(1, 50.0, 0.0, 900);
        assert!((proj.mapping.angle(&s) - FRAC_PI_2).abs() < 1e-12);
        assert!(approx(proj.project(&s), Point::new(100.0, 0.0)));
    }
}
