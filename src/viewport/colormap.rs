//! Perceptual colormaps used to colour polar traces by force.

/// Opaque 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
}

const VIRIDIS: [Rgb; 5] = [
    Rgb::new(68, 1, 84),
    Rgb::new(59, 82, 139),
    Rgb::new(33, 145, 140),
    Rgb::new(94, 201, 98),
    Rgb::new(253, 231, 37),
];

const CIVIDIS: [Rgb; 5] = [
    Rgb::new(0, 34, 78),
    Rgb::new(65, 77, 108),
    Rgb::new(124, 123, 120),
    Rgb::new(188, 175, 111),
    Rgb::new(254, 232, 56),
];

/// Five-stop piecewise-linear colormap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Viridis,
    Cividis,
}

impl Colormap {
    pub fn anchors(self) -> &'static [Rgb; 5] {
        match self {
            Colormap::Viridis => &VIRIDIS,
            Colormap::Cividis => &CIVIDIS,
        }
    }

    /// Colour at normalised position `t`; out-of-range and NaN clamp to the ends.
    pub fn sample(self, t: f64) -> Rgb {
        let anchors = self.anchors();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let scaled = t * 4.0;
        let segment = (scaled.floor() as usize).min(3);
        let local = scaled - segment as f64;
        let (a, b) = (anchors[segment], anchors[segment + 1]);
        Rgb::new(
            lerp_channel(a.r, b.r, local),
            lerp_channel(a.g, b.g, local),
            lerp_channel(a.b, b.b, local),
        )
    }

    /// Colour for `value` within `[min, max]`; a degenerate range yields the first anchor.
    pub fn color_for(self, value: f64, min: f64, max: f64) -> Rgb {
        if !(max > min) {
            return self.anchors()[0];
        }
        self.sample((value - min) / (max - min))
    }
}

fn lerp_channel(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_hit_first_and_last_anchor() {
        for map in [Colormap::Viridis, Colormap::Cividis] {
            assert_eq!(map.color_for(-3.0, -3.0, 9.0), map.anchors()[0]);
            assert_eq!(map.color_for(9.0, -3.0, 9.0), map.anchors()[4]);
        }
    }

    #[test]
    fn degenerate_range_returns_first_anchor() {
        assert_eq!(Colormap::Viridis.color_for(12.0, 5.0, 5.0), VIRIDIS[0]);
        assert_eq!(Colormap::Cividis.color_for(0.0, 1.0, -1.0), CIVIDIS[0]);
    }

    #[test]
    fn interior_anchors_and_midpoints() {
        assert_eq!(Colormap::Viridis.sample(0.5), VIRIDIS[2]);
        assert_eq!(Colormap::Viridis.sample(0.25), VIRIDIS[1]);
        // halfway between anchor 0 and 1
        assert_eq!(Colormap::Cividis.sample(0.125), Rgb::new(33, 56, 93));
    }

    #[test]
    fn values_outside_range_clamp() {
        assert_eq!(Colormap::Viridis.color_for(100.0, 0.0, 1.0), VIRIDIS[4]);
        assert_eq!(Colormap::Viridis.color_for(-100.0, 0.0, 1.0), VIRIDIS[0]);
        assert_eq!(Colormap::Viridis.sample(f64::NAN), VIRIDIS[0]);
    }
}
