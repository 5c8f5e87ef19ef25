/// Fraction of the data range added on each side by autoscale.
pub const PADDING_FRACTION: f64 = 0.05;
/// Axes narrower than this are widened symmetrically.
pub const MIN_RANGE: f64 = 0.1;

/// Visible data-space rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for ViewBounds {
    /// Empty-plot framing.
    fn default() -> Self {
        Self {
            min_x: 0.0,
            max_x: 10.0,
            min_y: -10.0,
            max_y: 10.0,
        }
    }
}

impl ViewBounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Padded extent of `points`, or `None` when no finite point was seen.
    pub fn fit(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut extent: Option<Self> = None;
        for (x, y) in points {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            extent = Some(match extent {
                None => Self::new(x, x, y, y),
                Some(b) => Self::new(b.min_x.min(x), b.max_x.max(x), b.min_y.min(y), b.max_y.max(y)),
            });
        }
        extent.map(|b| b.padded())
    }

    /// Adds 5% per side, then enforces the minimum range.
    pub fn padded(self) -> Self {
        let (min_x, max_x) = pad_axis(self.min_x, self.max_x);
        let (min_y, max_y) = pad_axis(self.min_y, self.max_y);
        Self::new(min_x, max_x, min_y, max_y)
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.min_x + dx, self.max_x + dx, self.min_y + dy, self.max_y + dy)
    }

    /// Shrinks (`factor > 1`) or grows the bounds about `(x, y)`, keeping that point's
    /// relative position inside the bounds.
    pub fn zoomed_about(self, x: f64, y: f64, factor: f64) -> Self {
        let zoom_axis = |min: f64, max: f64, focus: f64| {
            let range = max - min;
            let new_range = range / factor;
            (
                focus - new_range * (focus - min) / range,
                focus + new_range * (max - focus) / range,
            )
        };
        let (min_x, max_x) = zoom_axis(self.min_x, self.max_x, x);
        let (min_y, max_y) = zoom_axis(self.min_y, self.max_y, y);
        Self::new(min_x, max_x, min_y, max_y)
    }

    pub fn is_usable(&self) -> bool {
        [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }
}

fn pad_axis(min: f64, max: f64) -> (f64, f64) {
    let pad = (max - min) * PADDING_FRACTION;
    let (mut min, mut max) = (min - pad, max + pad);
    if max - min < MIN_RANGE {
        min -= MIN_RANGE / 2.0;
        max += MIN_RANGE / 2.0;
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_pads_five_percent_each_side() {
        let b = ViewBounds::fit([(0.0, 10.0), (100.0, 30.0), (50.0, 20.0)]).unwrap();
        assert!(b.min_x < 0.0 && b.max_x > 100.0);
        assert!((b.min_x + 5.0).abs() < 1e-9);
        assert!((b.max_x - 105.0).abs() < 1e-9);
        assert!((b.min_y - 9.0).abs() < 1e-9);
        assert!((b.max_y - 31.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_is_widened() {
        let b = ViewBounds::fit([(3.0, -2.0)]).unwrap();
        assert!((b.width() - MIN_RANGE).abs() < 1e-12);
        assert!((b.height() - MIN_RANGE).abs() < 1e-12);
        assert!(((b.min_x + b.max_x) / 2.0 - 3.0).abs() < 1e-12);
        assert!(b.is_usable());
    }

    #[test]
    fn fit_ignores_non_finite_and_empty() {
        assert_eq!(ViewBounds::fit(std::iter::empty()), None);
        assert_eq!(ViewBounds::fit([(f64::NAN, 1.0)]), None);
    }

    #[test]
    fn zoom_keeps_focus_fraction() {
        let b = ViewBounds::new(0.0, 10.0, 0.0, 20.0);
        let z = b.zoomed_about(2.5, 5.0, 2.0);
        assert!((z.width() - 5.0).abs() < 1e-12);
        assert!((z.height() - 10.0).abs() < 1e-12);
        assert!(((2.5 - z.min_x) / z.width() - 0.25).abs() < 1e-12);
        let out = z.zoomed_about(2.5, 5.0, 0.5);
        assert!((out.min_x - b.min_x).abs() < 1e-12 && (out.max_y - b.max_y).abs() < 1e-12);
    }
}
