use std::f64::consts::TAU;

use crate::drivers::SampleSeries;
use crate::types::Sample;
use crate::viewport::colormap::{Colormap, Rgb};
use crate::viewport::projection::{LinearProjection, PixelRect, Point, PolarProjection};
use crate::viewport::{plot_area, Viewport, MARGIN};

pub const BACKGROUND: Rgb = Rgb::new(250, 250, 250);
pub const GRID: Rgb = Rgb::new(220, 220, 220);
pub const AXIS: Rgb = Rgb::new(100, 100, 100);
pub const MAIN_SERIES: Rgb = Rgb::new(50, 150, 250);
pub const OVERLAY_PALETTE: [Rgb; 4] = [
    Rgb::new(255, 100, 100),
    Rgb::new(100, 255, 100),
    Rgb::new(255, 255, 100),
    Rgb::new(255, 100, 255),
];

const GRID_COLUMNS: usize = 10;
const GRID_ROWS: usize = 8;
const TICKS: usize = 5;
const LABEL_SIZE: f64 = 12.0;
const SERIES_WIDTH: f64 = 2.0;
const POLAR_RINGS: usize = 4;
const POLAR_SPOKE_DEG: usize = 30;
/// Consecutive polar points further apart than this are not joined.
const MAX_POLAR_JOIN: f64 = TAU / 12.0;
const COLORBAR_WIDTH: f64 = 120.0;
const COLORBAR_HEIGHT: f64 = 10.0;
// bar plus the label above and the range below it
const COLORBAR_ROW: f64 = COLORBAR_HEIGHT + 2.0 * LABEL_SIZE + 12.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub color: Rgb,
    pub size: f64,
    pub h_align: HAlign,
    pub v_align: VAlign,
    /// Rotated 90° counter-clockwise.
    pub vertical: bool,
}

impl TextStyle {
    fn label(h_align: HAlign, v_align: VAlign) -> Self {
        Self {
            color: AXIS,
            size: LABEL_SIZE,
            h_align,
            v_align,
            vertical: false,
        }
    }
}

/// Backend-neutral drawing command in canvas pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    FillRect {
        rect: PixelRect,
        color: Rgb,
    },
    Polyline {
        points: Vec<Point>,
        color: Rgb,
        width: f64,
    },
    Segment {
        from: Point,
        to: Point,
        color: Rgb,
        width: f64,
    },
    Circle {
        center: Point,
        radius: f64,
        color: Rgb,
        width: f64,
    },
    Dot {
        center: Point,
        radius: f64,
        color: Rgb,
    },
    Text {
        pos: Point,
        text: String,
        style: TextStyle,
    },
    /// Horizontal bar filled left-to-right with the colormap.
    GradientBar {
        rect: PixelRect,
        colormap: Colormap,
    },
}

/// Everything needed to draw one plot.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderFrame {
    pub canvas: PixelRect,
    pub plot_area: PixelRect,
    pub primitives: Vec<Primitive>,
}

impl RenderFrame {
    pub fn count(&self, pred: impl Fn(&Primitive) -> bool) -> usize {
        self.primitives.iter().filter(|p| pred(p)).count()
    }
}

impl Viewport {
    /// Draw list for `canvas`. Reads state only (the scale memo aside).
    pub fn render(&self, canvas: PixelRect) -> RenderFrame {
        let area = plot_area(canvas);
        let mut frame = RenderFrame {
            canvas,
            plot_area: area,
            primitives: vec![Primitive::FillRect {
                rect: canvas,
                color: BACKGROUND,
            }],
        };
        if !area.has_area() {
            return frame;
        }
        if self.is_polar() {
            self.render_polar(area, &mut frame.primitives);
        } else if let Some(projection) = self.projection_for(area) {
            self.render_linear(canvas, &projection, &mut frame.primitives);
        }
        frame
    }

    fn render_linear(&self, canvas: PixelRect, proj: &LinearProjection, out: &mut Vec<Primitive>) {
        let area = proj.area;
        if self.grid_visible {
            for i in 1..GRID_COLUMNS {
                let x = area.left + area.width * i as f64 / GRID_COLUMNS as f64;
                out.push(line(Point::new(x, area.top), Point::new(x, area.bottom()), GRID, 1.0));
            }
            for i in 1..GRID_ROWS {
                let y = area.top + area.height * i as f64 / GRID_ROWS as f64;
                out.push(line(Point::new(area.left, y), Point::new(area.right(), y), GRID, 1.0));
            }
        }
        let origin = Point::new(area.left, area.bottom());
        out.push(line(origin, Point::new(area.left, area.top), AXIS, 2.0));
        out.push(line(origin, Point::new(area.right(), area.bottom()), AXIS, 2.0));

        let map = self.kind.axes().map;
        let mut draw_series = |series: &SampleSeries, color: Rgb| {
            if series.len() < 2 {
                return;
            }
            let points = series
                .iter()
                .map(|s| {
                    let (x, y) = map(s);
                    proj.data_to_screen(x, y)
                })
                .collect();
            out.push(Primitive::Polyline {
                points,
                color,
                width: SERIES_WIDTH,
            });
        };
        draw_series(&self.main, MAIN_SERIES);
        for (i, overlay) in self.overlays.iter().enumerate() {
            draw_series(&overlay.series, overlay_color(i));
        }

        self.render_ticks(canvas, proj, out);
        self.render_legend(area, out);
    }

    fn render_ticks(&self, canvas: PixelRect, proj: &LinearProjection, out: &mut Vec<Primitive>) {
        let (area, b) = (proj.area, proj.bounds);
        let axes = self.kind.axes();
        for i in 0..=TICKS {
            let frac = i as f64 / TICKS as f64;
            let value = b.min_x + b.width() * frac;
            let text = if axes.time_axis {
                format!("{value:.1}s")
            } else {
                format!("{value:.1}")
            };
            out.push(Primitive::Text {
                pos: Point::new(area.left + area.width * frac, area.bottom() + 5.0),
                text,
                style: TextStyle::label(HAlign::Center, VAlign::Top),
            });
        }
        for i in 0..=TICKS {
            let frac = i as f64 / TICKS as f64;
            let value = b.min_y + b.height() * (1.0 - frac);
            out.push(Primitive::Text {
                pos: Point::new(canvas.left + MARGIN - 5.0, area.top + area.height * frac),
                text: format!("{value:.1}"),
                style: TextStyle::label(HAlign::Right, VAlign::Center),
            });
        }
        out.push(Primitive::Text {
            pos: Point::new(canvas.left + 15.0, area.center().y),
            text: axes.y_title.to_owned(),
            style: TextStyle {
                vertical: true,
                ..TextStyle::label(HAlign::Center, VAlign::Center)
            },
        });
        out.push(Primitive::Text {
            pos: Point::new(area.center().x, canvas.bottom() - 15.0),
            text: axes.x_title.to_owned(),
            style: TextStyle::label(HAlign::Center, VAlign::Center),
        });
    }

    fn render_legend(&self, area: PixelRect, out: &mut Vec<Primitive>) {
        if !self.overlay_mode || self.overlays.is_empty() {
            return;
        }
        let entries = self
            .main_label
            .iter()
            .map(|label| (label.as_str(), MAIN_SERIES))
            .chain(
                self.overlays
                    .iter()
                    .enumerate()
                    .map(|(i, o)| (o.label.as_str(), overlay_color(i))),
            );
        let mut x = area.left;
        let mut y = area.bottom() + 30.0;
        for (label, color) in entries {
            out.push(Primitive::FillRect {
                rect: PixelRect::new(x, y, 15.0, 10.0),
                color,
            });
            out.push(Primitive::Text {
                pos: Point::new(x + 20.0, y + 5.0),
                text: label.to_owned(),
                style: TextStyle::label(HAlign::Left, VAlign::Center),
            });
            x += 130.0;
            if x + 130.0 > area.right() {
                x = area.left;
                y += 20.0;
            }
        }
    }

    fn render_polar(&self, area: PixelRect, out: &mut Vec<Primitive>) {
        let proj = PolarProjection::new(self.polar_mapping, area);
        if self.grid_visible {
            for ring in 1..=POLAR_RINGS {
                out.push(Primitive::Circle {
                    center: proj.center,
                    radius: proj.max_radius * ring as f64 / POLAR_RINGS as f64,
                    color: GRID,
                    width: 1.0,
                });
            }
            for deg in (0..360).step_by(POLAR_SPOKE_DEG) {
                let angle = (deg as f64).to_radians();
                out.push(line(
                    proj.center,
                    proj.polar_to_screen(angle, proj.max_radius),
                    GRID,
                    1.0,
                ));
                out.push(Primitive::Text {
                    pos: proj.polar_to_screen(angle, proj.max_radius + 12.0),
                    text: format!("{deg}°"),
                    style: TextStyle::label(HAlign::Center, VAlign::Center),
                });
            }
        }

        let forces = self
            .visible_series()
            .flat_map(|s| s.iter())
            .map(|s| s.force_kg)
            .fold(None, |acc: Option<(f64, f64)>, f| match acc {
                None => Some((f, f)),
                Some((lo, hi)) => Some((lo.min(f), hi.max(f))),
            });
        let Some((f_min, f_max)) = forces else {
            return;
        };

        let mut series: Vec<(&SampleSeries, Colormap, &str)> = Vec::new();
        if !self.main.is_empty() {
            series.push((
                &self.main,
                Colormap::Viridis,
                self.main_label.as_deref().unwrap_or("live"),
            ));
        }
        for overlay in &self.overlays {
            if !overlay.series.is_empty() {
                series.push((&overlay.series, Colormap::Cividis, overlay.label.as_str()));
            }
        }
        for (samples, colormap, _) in &series {
            polar_trace(&proj, samples, *colormap, (f_min, f_max), out);
        }

        let mut x = area.left;
        let mut y = area.bottom() + 30.0;
        for (_, colormap, label) in &series {
            if x > area.left && x + COLORBAR_WIDTH > area.right() {
                x = area.left;
                y += COLORBAR_ROW;
            }
            let rect = PixelRect::new(x, y, COLORBAR_WIDTH, COLORBAR_HEIGHT);
            out.push(Primitive::GradientBar {
                rect,
                colormap: *colormap,
            });
            out.push(Primitive::Text {
                pos: Point::new(x + COLORBAR_WIDTH / 2.0, y - 2.0),
                text: format!("Force (kg): {label}"),
                style: TextStyle::label(HAlign::Center, VAlign::Bottom),
            });
            out.push(Primitive::Text {
                pos: Point::new(x, y + COLORBAR_HEIGHT + 2.0),
                text: format!("{f_min:.1}"),
                style: TextStyle::label(HAlign::Left, VAlign::Top),
            });
            out.push(Primitive::Text {
                pos: Point::new(x + COLORBAR_WIDTH, y + COLORBAR_HEIGHT + 2.0),
                text: format!("{f_max:.1}"),
                style: TextStyle::label(HAlign::Right, VAlign::Top),
            });
            x += COLORBAR_WIDTH + 60.0;
        }
    }
}

fn polar_trace(
    proj: &PolarProjection,
    samples: &SampleSeries,
    colormap: Colormap,
    (f_min, f_max): (f64, f64),
    out: &mut Vec<Primitive>,
) {
    let mut previous: Option<(f64, Point, &Sample, bool)> = None;
    for sample in samples.iter() {
        let angle = proj.mapping.angle(sample);
        let point = proj.project(sample);
        let mut joined = false;
        if let Some((prev_angle, prev_point, prev_sample, prev_joined)) = previous {
            if (angle - prev_angle).abs() < MAX_POLAR_JOIN {
                let force = (prev_sample.force_kg + sample.force_kg) / 2.0;
                out.push(line(
                    prev_point,
                    point,
                    colormap.color_for(force, f_min, f_max),
                    SERIES_WIDTH,
                ));
                joined = true;
            } else if !prev_joined {
                out.push(dot(prev_point, prev_sample, colormap, f_min, f_max));
            }
        }
        previous = Some((angle, point, sample, joined));
    }
    if let Some((_, point, sample, false)) = previous {
        out.push(dot(point, sample, colormap, f_min, f_max));
    }
}

fn dot(center: Point, sample: &Sample, colormap: Colormap, f_min: f64, f_max: f64) -> Primitive {
    Primitive::Dot {
        center,
        radius: SERIES_WIDTH,
        color: colormap.color_for(sample.force_kg, f_min, f_max),
    }
}

fn line(from: Point, to: Point, color: Rgb, width: f64) -> Primitive {
    Primitive::Segment {
        from,
        to,
        color,
        width,
    }
}

pub fn overlay_color(index: usize) -> Rgb {
    OVERLAY_PALETTE[index % OVERLAY_PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::PlotKind;

    fn canvas() -> PixelRect {
        PixelRect::new(0.0, 0.0, 800.0, 600.0)
    }

    fn is_polyline(p: &Primitive) -> bool {
        matches!(p, Primitive::Polyline { .. })
    }

    fn all_finite(frame: &RenderFrame) -> bool {
        let ok = |p: &Point| p.x.is_finite() && p.y.is_finite();
        frame.primitives.iter().all(|prim| match prim {
            Primitive::Polyline { points, .. } => points.iter().all(ok),
            Primitive::Segment { from, to, .. } => ok(from) && ok(to),
            Primitive::Circle { center, radius, .. } => ok(center) && radius.is_finite(),
            Primitive::Dot { center, .. } => ok(center),
            Primitive::Text { pos, .. } => ok(pos),
            Primitive::FillRect { rect, .. } | Primitive::GradientBar { rect, .. } => {
                rect.left.is_finite() && rect.width.is_finite()
            }
        })
    }

    #[test]
    fn empty_plot_renders_axes_and_labels() {
        let vp = Viewport::new(PlotKind::Position);
        let frame = vp.render(canvas());
        assert_eq!(frame.count(is_polyline), 0);
        assert!(all_finite(&frame));
        let labels: Vec<&str> = frame
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(labels.contains(&"0.0s"));
        assert!(labels.contains(&"10.0s"));
        assert!(labels.contains(&"-10.0"));
        assert!(labels.contains(&"Position (mm)"));
        assert!(labels.contains(&"Time (s)"));
    }

    #[test]
    fn series_points_land_inside_plot_area() {
        let mut vp = Viewport::new(PlotKind::ForceVsPosition);
        for i in 1..=20 {
            vp.append_sample(Sample::new(i * 10, i as f64, (i * i) as f64, 0));
        }
        let frame = vp.render(canvas());
        let Some(Primitive::Polyline { points, color, .. }) =
            frame.primitives.iter().find(|p| is_polyline(p))
        else {
            panic!("no series drawn");
        };
        assert_eq!(*color, MAIN_SERIES);
        assert_eq!(points.len(), 20);
        assert!(points.iter().all(|p| frame.plot_area.contains(*p)));
    }

    #[test]
    fn single_sample_is_not_a_line_and_stays_finite() {
        let mut vp = Viewport::new(PlotKind::Encoder);
        vp.append_sample(Sample::new(10, 0.0, 0.0, 7));
        let frame = vp.render(canvas());
        assert_eq!(frame.count(is_polyline), 0);
        assert!(all_finite(&frame));
    }

    #[test]
    fn overlay_legend_lists_labels_with_palette() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.set_overlay_mode(true);
        let run: Vec<Sample> = (1..5).map(|i| Sample::new(i * 100, i as f64, 0.0, 0)).collect();
        vp.replace_series(run.clone(), "baseline");
        vp.replace_series(run, "stiffer spring");
        let frame = vp.render(canvas());
        assert_eq!(frame.count(is_polyline), 2);
        let swatches: Vec<Rgb> = frame
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::FillRect { rect, color } if rect.width == 15.0 => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(swatches, vec![OVERLAY_PALETTE[0], OVERLAY_PALETTE[1]]);
    }

    #[test]
    fn grid_toggle() {
        let mut vp = Viewport::new(PlotKind::Force);
        let with_grid = vp.render(canvas()).primitives.len();
        vp.set_grid_visible(false);
        let without = vp.render(canvas()).primitives.len();
        assert_eq!(with_grid - without, (GRID_COLUMNS - 1) + (GRID_ROWS - 1));
    }

    #[test]
    fn tiny_canvas_only_fills_background() {
        let vp = Viewport::new(PlotKind::Force);
        let frame = vp.render(PixelRect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(frame.primitives.len(), 1);
    }

    #[test]
    fn polar_skips_wraparound_chords() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.set_polar(true);
        vp.set_grid_visible(false);
        // 10° steps through the 360° wrap: 340, 350, 0, 10 degrees
        for (i, pulses) in [3400, 3500, 3600, 3700].into_iter().enumerate() {
            vp.append_sample(Sample::new(i as i64 + 1, 0.0, i as f64, pulses));
        }
        let frame = vp.render(canvas());
        let segments: Vec<Rgb> = frame
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Segment { color, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(frame.count(|p| matches!(p, Primitive::Dot { .. })), 0);
        assert_eq!(
            frame.count(|p| matches!(p, Primitive::GradientBar { colormap: Colormap::Viridis, .. })),
            1
        );
        assert!(all_finite(&frame));
    }

    #[test]
    fn polar_colours_follow_shared_force_range() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.set_polar(true);
        vp.set_grid_visible(false);
        vp.append_sample(Sample::new(1, 0.0, 0.0, 0));
        vp.append_sample(Sample::new(2, 0.0, 0.0, 10));
        vp.add_overlay(
            vec![Sample::new(1, 0.0, 10.0, 0), Sample::new(2, 0.0, 10.0, 10)],
            "hot",
        );
        let frame = vp.render(canvas());
        let colors: Vec<Rgb> = frame
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Segment { color, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(colors, vec![Colormap::Viridis.anchors()[0], Colormap::Cividis.anchors()[4]]);
    }

    #[test]
    fn isolated_polar_point_becomes_dot() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.set_polar(true);
        vp.append_sample(Sample::new(1, 0.0, 3.0, 0));
        let frame = vp.render(canvas());
        assert_eq!(frame.count(|p| matches!(p, Primitive::Dot { .. })), 1);
        assert!(all_finite(&frame));
    }

    #[test]
    fn polar_colour_bars_wrap_inside_the_canvas() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.set_polar(true);
        vp.append_sample(Sample::new(1, 0.0, 1.0, 0));
        for i in 0..6 {
            vp.add_overlay(vec![Sample::new(1, 0.0, i as f64, 0)], &format!("run {i}"));
        }
        let frame = vp.render(canvas());
        let bars: Vec<PixelRect> = frame
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::GradientBar { rect, .. } => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(bars.len(), 7);
        assert!(bars.iter().all(|r| r.right() <= frame.plot_area.right()));
        assert!(bars.iter().any(|r| r.top > bars[0].top));
    }
}
