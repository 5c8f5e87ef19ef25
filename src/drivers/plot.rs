use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::drivers::error::TelemetryError;
use crate::viewport::{self, HAlign, PixelRect, Point, Primitive, RenderFrame, VAlign};

fn rgb(c: viewport::Rgb) -> RGBColor {
    RGBColor(c.r, c.g, c.b)
}

fn px(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

fn rect_corners(r: PixelRect) -> [(i32, i32); 2] {
    [
        px(Point::new(r.left, r.top)),
        px(Point::new(r.right(), r.bottom())),
    ]
}

/// Rasterises a viewport draw list into PNG bytes of the canvas size.
pub fn render_frame_png(frame: &RenderFrame) -> Result<Vec<u8>, TelemetryError> {
    let width = frame.canvas.width.round().max(1.0) as u32;
    let height = frame.canvas.height.round().max(1.0) as u32;
    let (ox, oy) = (frame.canvas.left, frame.canvas.top);
    let shift = |p: Point| px(Point::new(p.x - ox, p.y - oy));
    let shift_rect = |r: PixelRect| rect_corners(PixelRect::new(r.left - ox, r.top - oy, r.width, r.height));

    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;
        for primitive in &frame.primitives {
            match primitive {
                Primitive::FillRect { rect, color } => {
                    root.draw(&Rectangle::new(shift_rect(*rect), rgb(*color).filled()))?;
                }
                Primitive::Polyline {
                    points,
                    color,
                    width,
                } => {
                    let path: Vec<(i32, i32)> = points.iter().map(|p| shift(*p)).collect();
                    root.draw(&PathElement::new(
                        path,
                        rgb(*color).stroke_width(width.round() as u32),
                    ))?;
                }
                Primitive::Segment {
                    from,
                    to,
                    color,
                    width,
                } => {
                    root.draw(&PathElement::new(
                        vec![shift(*from), shift(*to)],
                        rgb(*color).stroke_width(width.round() as u32),
                    ))?;
                }
                Primitive::Circle {
                    center,
                    radius,
                    color,
                    width,
                } => {
                    root.draw(&Circle::new(
                        shift(*center),
                        radius.round() as i32,
                        rgb(*color).stroke_width(width.round() as u32),
                    ))?;
                }
                Primitive::Dot {
                    center,
                    radius,
                    color,
                } => {
                    root.draw(&Circle::new(
                        shift(*center),
                        radius.round() as i32,
                        rgb(*color).filled(),
                    ))?;
                }
                Primitive::Text { pos, text, style } => {
                    let h = match style.h_align {
                        HAlign::Left => HPos::Left,
                        HAlign::Center => HPos::Center,
                        HAlign::Right => HPos::Right,
                    };
                    let v = match style.v_align {
                        VAlign::Top => VPos::Top,
                        VAlign::Center => VPos::Center,
                        VAlign::Bottom => VPos::Bottom,
                    };
                    let mut font = FontDesc::new(FontFamily::SansSerif, style.size, FontStyle::Normal);
                    if style.vertical {
                        font = font.transform(FontTransform::Rotate270);
                    }
                    let text_style = font.color(&rgb(style.color)).pos(Pos::new(h, v));
                    root.draw(&Text::new(text.clone(), shift(*pos), text_style))?;
                }
                Primitive::GradientBar { rect, colormap } => {
                    let steps = rect.width.round().max(1.0) as usize;
                    let step_w = rect.width / steps as f64;
                    for i in 0..steps {
                        let t = (i as f64 + 0.5) / steps as f64;
                        let slice =
                            PixelRect::new(rect.left + i as f64 * step_w, rect.top, step_w, rect.height);
                        root.draw(&Rectangle::new(
                            shift_rect(slice),
                            rgb(colormap.sample(t)).filled(),
                        ))?;
                    }
                }
            }
        }
        root.present()?;
    }
    encode_png(&buffer, width, height)
}

pub fn export_frame_png(frame: &RenderFrame, path: &Path) -> Result<(), TelemetryError> {
    let bytes = render_frame_png(frame)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, TelemetryError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| TelemetryError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;
    use crate::viewport::{Colormap, PlotKind, Viewport};

    #[test]
    fn shapes_without_text_encode_to_png() {
        let frame = RenderFrame {
            canvas: PixelRect::new(0.0, 0.0, 64.0, 48.0),
            plot_area: PixelRect::new(4.0, 4.0, 56.0, 40.0),
            primitives: vec![
                Primitive::FillRect {
                    rect: PixelRect::new(0.0, 0.0, 64.0, 48.0),
                    color: viewport::Rgb::WHITE,
                },
                Primitive::Polyline {
                    points: vec![Point::new(4.0, 40.0), Point::new(30.0, 10.0), Point::new(60.0, 30.0)],
                    color: viewport::Rgb::new(50, 150, 250),
                    width: 2.0,
                },
                Primitive::Dot {
                    center: Point::new(32.0, 24.0),
                    radius: 2.0,
                    color: viewport::Rgb::BLACK,
                },
                Primitive::GradientBar {
                    rect: PixelRect::new(4.0, 40.0, 40.0, 4.0),
                    colormap: Colormap::Cividis,
                },
            ],
        };
        let png = render_frame_png(&frame).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn offset_canvas_is_shifted_to_origin() {
        let mut vp = Viewport::new(PlotKind::Comparison);
        vp.set_polar(true);
        vp.set_grid_visible(false);
        for i in 0..50 {
            vp.append_sample(Sample::new(i + 1, (i as f64).sin() * 30.0, i as f64, i * 40));
        }
        let mut frame = vp.render(PixelRect::new(100.0, 50.0, 320.0, 240.0));
        frame
            .primitives
            .retain(|p| !matches!(p, Primitive::Text { .. }));
        let png = render_frame_png(&frame).unwrap();
        assert!(!png.is_empty());
    }
}
