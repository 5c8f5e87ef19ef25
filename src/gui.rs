// src/gui.rs
use std::collections::VecDeque;
use std::f32::consts::FRAC_PI_2;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Instant;

use eframe::egui;
use egui::epaint::TextShape;
use egui::{pos2, Align, Align2, Color32, FontId, Painter, Pos2, Rect, Sense, Shape, Stroke, Vec2};
use egui_plot::{Line, Plot, PlotPoints};
use log::warn;

use crate::config::{load_cell_factor, AppConfig};
use crate::drivers::{available_ports, export_frame_png, SensorCommand};
use crate::engine;
use crate::recorder::{
    export_csv, export_spreadsheet, list_sessions, load_session, save_session, Session,
    MAX_RECORDING,
};
use crate::types::*;
use crate::viewport::{self, HAlign, PixelRect, PlotKind, Point, Primitive, RenderFrame, VAlign, Viewport};

const ZOOM_STEP: f64 = 1.15;
const LOG_LINES: usize = 8;
const VELOCITY_POINTS: usize = 2_000;
const EXPORT_CANVAS: PixelRect = PixelRect::new(0.0, 0.0, 1200.0, 800.0);

fn color(c: viewport::Rgb) -> Color32 {
    Color32::from_rgb(c.r, c.g, c.b)
}

fn to_pos2(p: Point) -> Pos2 {
    pos2(p.x as f32, p.y as f32)
}

fn to_rect(r: PixelRect) -> Rect {
    Rect::from_min_size(
        pos2(r.left as f32, r.top as f32),
        Vec2::new(r.width as f32, r.height as f32),
    )
}

fn align(h: HAlign, v: VAlign) -> Align2 {
    let h = match h {
        HAlign::Left => Align::Min,
        HAlign::Center => Align::Center,
        HAlign::Right => Align::Max,
    };
    let v = match v {
        VAlign::Top => Align::Min,
        VAlign::Center => Align::Center,
        VAlign::Bottom => Align::Max,
    };
    Align2([h, v])
}

/// Replays a viewport draw list on an egui painter.
fn paint_frame(painter: &Painter, frame: &RenderFrame) {
    for primitive in &frame.primitives {
        match primitive {
            Primitive::FillRect { rect, color: c } => {
                painter.rect_filled(to_rect(*rect), 0.0, color(*c));
            }
            Primitive::Polyline {
                points,
                color: c,
                width,
            } => {
                let points = points.iter().map(|p| to_pos2(*p)).collect();
                painter.add(Shape::line(points, Stroke::new(*width as f32, color(*c))));
            }
            Primitive::Segment {
                from,
                to,
                color: c,
                width,
            } => {
                painter.line_segment(
                    [to_pos2(*from), to_pos2(*to)],
                    Stroke::new(*width as f32, color(*c)),
                );
            }
            Primitive::Circle {
                center,
                radius,
                color: c,
                width,
            } => {
                painter.circle_stroke(
                    to_pos2(*center),
                    *radius as f32,
                    Stroke::new(*width as f32, color(*c)),
                );
            }
            Primitive::Dot {
                center,
                radius,
                color: c,
            } => {
                painter.circle_filled(to_pos2(*center), *radius as f32, color(*c));
            }
            Primitive::Text { pos, text, style } => {
                let font = FontId::proportional(style.size as f32);
                if style.vertical {
                    let galley = painter.layout_no_wrap(text.clone(), font, color(style.color));
                    let size = galley.size();
                    let p = to_pos2(*pos);
                    // rotated about its top-left corner, so shift to keep `pos` centred
                    let anchor = pos2(p.x - size.y / 2.0, p.y + size.x / 2.0);
                    painter.add(TextShape {
                        angle: -FRAC_PI_2,
                        ..TextShape::new(anchor, galley)
                    });
                } else {
                    painter.text(
                        to_pos2(*pos),
                        align(style.h_align, style.v_align),
                        text,
                        font,
                        color(style.color),
                    );
                }
            }
            Primitive::GradientBar { rect, colormap } => {
                let steps = rect.width.round().max(1.0) as usize;
                let step_w = rect.width / steps as f64;
                for i in 0..steps {
                    let t = (i as f64 + 0.5) / steps as f64;
                    let slice = PixelRect::new(
                        rect.left + i as f64 * step_w,
                        rect.top,
                        step_w,
                        rect.height,
                    );
                    painter.rect_filled(to_rect(slice), 0.0, color(colormap.sample(t)));
                }
            }
        }
    }
}

pub struct StrutScopeApp {
    config: AppConfig,
    config_path: PathBuf,

    // connection
    is_connected: bool,
    is_recording: bool,
    recording_since: Option<Instant>,
    use_simulation: bool,
    ports: Vec<String>,
    selected_port: String,

    // plots
    viewports: Vec<Viewport>,
    selected: usize,
    velocity: VecDeque<[f64; 2]>,
    last_sample: Option<Sample>,

    // calibration
    known_weight_kg: f64,

    // sessions
    session_name: String,
    metadata: SessionMetadata,
    last_session: Option<Session>,
    saved_sessions: Vec<PathBuf>,
    selected_saved: usize,

    log_messages: Vec<String>,

    rx: Receiver<EngineMessage>,
    tx_cmd: Sender<EngineCommand>,
}

impl StrutScopeApp {
    pub fn new(config: AppConfig, config_path: PathBuf) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        engine::spawn_thread(tx, rx_cmd, config.decoder.options());

        let viewports = PlotKind::ALL
            .iter()
            .map(|&kind| Viewport::with_config(kind, &config.plot, &config.calibration))
            .collect();
        let ports = available_ports().unwrap_or_else(|e| {
            warn!("port enumeration failed: {e}");
            Vec::new()
        });
        let selected_port = config
            .serial
            .port
            .clone()
            .or_else(|| ports.first().cloned())
            .unwrap_or_default();
        let saved_sessions = list_sessions(&config.sessions_dir).unwrap_or_default();

        Self {
            is_connected: false,
            is_recording: false,
            recording_since: None,
            use_simulation: config.serial.port.is_none(),
            ports,
            selected_port,
            viewports,
            selected: 0,
            velocity: VecDeque::with_capacity(VELOCITY_POINTS),
            last_sample: None,
            known_weight_kg: 1.0,
            session_name: String::new(),
            metadata: SessionMetadata::default(),
            last_session: None,
            saved_sessions,
            selected_saved: 0,
            log_messages: vec!["StrutScope ready.".to_owned()],
            config,
            config_path,
            rx,
            tx_cmd,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn send(&mut self, cmd: EngineCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            self.log("Engine is not running.");
        }
    }

    fn push_sample(&mut self, sample: Sample) {
        for vp in &mut self.viewports {
            if vp.kind() != PlotKind::Comparison {
                vp.append_sample(sample);
            }
        }
        if self.velocity.len() == VELOCITY_POINTS {
            self.velocity.pop_front();
        }
        self.velocity.push_back([sample.seconds(), sample.velocity_mm_s]);
        self.last_sample = Some(sample);
    }

    fn handle_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                EngineMessage::Log(s) => self.log(&s),
                EngineMessage::Status(b) => self.is_connected = b,
                EngineMessage::RecordingStatus(b) => {
                    self.is_recording = b;
                    self.recording_since = b.then(Instant::now);
                }
                EngineMessage::Sample(sample) => self.push_sample(sample),
                EngineMessage::SessionFinished(session) => {
                    self.log(&format!(
                        "{}: {} samples, max force {:.2} kg, stroke {:.1} mm",
                        session.name,
                        session.data.len(),
                        session.max_force(),
                        session.stroke_length()
                    ));
                    self.last_session = Some(session);
                }
            }
        }
    }

    fn save_config(&mut self) {
        if let Err(e) = self.config.save(&self.config_path) {
            self.log(&format!("Config not saved: {e}"));
        }
    }

    fn calibrate_load(&mut self) {
        let Some(reading) = self.last_sample.map(|s| s.force_kg) else {
            self.log("No reading to calibrate against.");
            return;
        };
        match load_cell_factor(self.known_weight_kg, reading) {
            Some(factor) => {
                self.send(EngineCommand::Sensor(SensorCommand::CalibrateLoad(factor)));
                self.config.calibration.load_cell_scale = factor;
                self.save_config();
            }
            None => self.log("Reading too small to calibrate."),
        }
    }

    fn save_last_session(&mut self) {
        let Some(session) = self.last_session.clone() else {
            return;
        };
        let dir = self.config.sessions_dir.clone();
        let result = fs::create_dir_all(&dir)
            .map_err(Into::into)
            .and_then(|_| save_session(&session, &dir))
            .and_then(|path| {
                export_csv(&session, &path.with_extension("csv"))?;
                export_spreadsheet(&session, &path.with_extension("tsv"))?;
                Ok(path)
            });
        match result {
            Ok(path) => {
                self.log(&format!("Saved {}", path.display()));
                self.refresh_sessions();
            }
            Err(e) => self.log(&format!("Save failed: {e}")),
        }
    }

    fn refresh_sessions(&mut self) {
        self.saved_sessions = list_sessions(&self.config.sessions_dir).unwrap_or_default();
        self.selected_saved = self
            .selected_saved
            .min(self.saved_sessions.len().saturating_sub(1));
    }

    fn read_selected_session(&mut self) -> Option<Session> {
        let path = self.saved_sessions.get(self.selected_saved)?.clone();
        match load_session(&path) {
            Ok(session) if !session.data.is_empty() => Some(session),
            Ok(_) => {
                self.log(&format!("{} has no samples.", path.display()));
                None
            }
            Err(e) => {
                self.log(&format!("Load failed: {e}"));
                None
            }
        }
    }

    /// Shows a saved session on every plot.
    fn load_selected_session(&mut self) {
        let Some(session) = self.read_selected_session() else {
            return;
        };
        for vp in &mut self.viewports {
            vp.show_series(session.data.clone(), &session.name);
        }
        self.log(&format!("Loaded {}", session.name));
        self.last_session = Some(session);
    }

    /// Adds a saved session to the comparison plot only.
    fn compare_selected_session(&mut self) {
        let Some(session) = self.read_selected_session() else {
            return;
        };
        if let Some(vp) = self
            .viewports
            .iter_mut()
            .find(|vp| vp.kind() == PlotKind::Comparison)
        {
            vp.replace_series(session.data, &session.name);
        }
        self.log(&format!("Comparing {}", session.name));
    }

    fn capture_pot(&mut self, max: bool) {
        let Some(position) = self.last_sample.map(|s| s.position_mm) else {
            self.log("No reading to capture.");
            return;
        };
        let cal = &mut self.config.calibration;
        let (which, raw) = if max {
            ("max", cal.capture_pot_max(position))
        } else {
            ("min", cal.capture_pot_min(position))
        };
        self.log(&format!("Potentiometer {which} set: {raw}"));
        self.save_config();
    }

    fn live_readouts(&self, ui: &mut egui::Ui) {
        let s = self.last_sample.unwrap_or_default();
        let cal = &self.config.calibration;
        egui::Grid::new("readouts").num_columns(2).show(ui, |ui| {
            ui.label("Position:");
            ui.label(
                egui::RichText::new(format!("{:.2} mm", s.position_mm))
                    .strong()
                    .color(Color32::LIGHT_BLUE),
            );
            ui.end_row();
            ui.label("Force:");
            ui.label(
                egui::RichText::new(format!("{:.2} kg", s.force_kg))
                    .strong()
                    .color(Color32::LIGHT_RED),
            );
            ui.end_row();
            ui.label("Encoder:");
            ui.label(
                egui::RichText::new(format!(
                    "{} pulses ({:.2} rev)",
                    s.encoder_pulses,
                    cal.encoder_revolutions(s.encoder_pulses)
                ))
                .strong()
                .color(Color32::LIGHT_GREEN),
            );
            ui.end_row();
            ui.label("Velocity:");
            ui.label(egui::RichText::new(format!("{:.2} mm/s", s.velocity_mm_s)).strong());
            ui.end_row();
            if let Some(travel) = cal.travel_fraction(s.position_mm) {
                ui.label("Travel:");
                ui.label(format!("{:.0} %", travel * 100.0));
                ui.end_row();
            }
        });
    }

    fn recording_clock(&self, ui: &mut egui::Ui) {
        let elapsed = self
            .recording_since
            .map(|t| t.elapsed())
            .unwrap_or_default()
            .min(MAX_RECORDING);
        let secs = elapsed.as_secs();
        ui.label(format!("{:02}:{:02}", secs / 60, secs % 60));
        ui.add(egui::ProgressBar::new(
            elapsed.as_secs_f32() / MAX_RECORDING.as_secs_f32(),
        ));
    }

    fn session_analysis(ui: &mut egui::Ui, session: &Session) {
        ui.label(format!(
            "{}: max force {:.2} kg, max velocity {:.1} mm/s, stroke {:.1} mm",
            session.name,
            session.max_force(),
            session.max_velocity(),
            session.stroke_length()
        ));
        Plot::new("session_fvp").height(110.0).show(ui, |plot_ui| {
            plot_ui.line(Line::new(PlotPoints::new(session.force_vs_position())).name("Force vs Position"));
        });
        Plot::new("session_vel").height(110.0).show(ui, |plot_ui| {
            plot_ui.line(Line::new(PlotPoints::new(session.velocity_vs_time())).name("Velocity"));
        });
    }

    fn export_png(&mut self) {
        let vp = &self.viewports[self.selected];
        let frame = vp.render(EXPORT_CANVAS);
        let name = vp.kind().axes().title.to_lowercase().replace(' ', "_");
        let dir = self.config.sessions_dir.clone();
        let path = dir.join(format!("{name}.png"));
        let result = fs::create_dir_all(&dir)
            .map_err(Into::into)
            .and_then(|_| export_frame_png(&frame, &path));
        match result {
            Ok(()) => self.log(&format!("Exported {}", path.display())),
            Err(e) => self.log(&format!("Export failed: {e}")),
        }
    }

    fn draw_viewport(ui: &mut egui::Ui, vp: &mut Viewport) {
        let size = ui.available_size() - Vec2::new(0.0, 150.0);
        let (response, painter) = ui.allocate_painter(size.max(Vec2::new(200.0, 200.0)), Sense::click_and_drag());
        let rect = response.rect;
        let canvas = PixelRect::new(
            rect.left() as f64,
            rect.top() as f64,
            rect.width() as f64,
            rect.height() as f64,
        );
        vp.resize(canvas);
        if vp.is_panning() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        }

        if response.drag_started() {
            vp.begin_pan();
        }
        if response.dragged() {
            let d = response.drag_delta();
            vp.pan(d.x as f64, d.y as f64);
        }
        if response.drag_released() {
            vp.end_pan();
        }
        if let Some(hover) = response.hover_pos() {
            let scroll = ui.input(|i| i.scroll_delta.y);
            if scroll != 0.0 {
                let factor = if scroll > 0.0 { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
                vp.zoom(Point::new(hover.x as f64, hover.y as f64), factor);
            }
        }

        paint_frame(&painter, &vp.render(canvas));
    }
}

impl eframe::App for StrutScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_messages();
        if self.is_connected {
            ctx.request_repaint();
        }

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::SidePanel::left("L").min_width(300.0).show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(10.0);
                ui.heading("StrutScope");
                ui.label("Strut test rig telemetry");
                ui.separator();

                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.use_simulation, true, "SIM");
                    ui.selectable_value(&mut self.use_simulation, false, "SERIAL");
                });
                if !self.use_simulation {
                    ui.horizontal(|ui| {
                        egui::ComboBox::from_id_source("port")
                            .selected_text(self.selected_port.clone())
                            .show_ui(ui, |ui| {
                                for port in &self.ports {
                                    ui.selectable_value(&mut self.selected_port, port.clone(), port);
                                }
                            });
                        if ui.button("⟳").clicked() {
                            self.ports = available_ports().unwrap_or_default();
                        }
                    });
                    ui.add(
                        egui::DragValue::new(&mut self.config.serial.baud_rate)
                            .prefix("baud ")
                            .clamp_range(1200..=2_000_000),
                    );
                }

                let btn_txt = if self.is_connected { "DISCONNECT" } else { "CONNECT" };
                if ui.button(btn_txt).clicked() {
                    if self.is_connected {
                        self.send(EngineCommand::Disconnect);
                    } else if self.use_simulation {
                        self.send(EngineCommand::Connect(ConnectionMode::Simulation));
                    } else {
                        self.config.serial.port = Some(self.selected_port.clone());
                        self.save_config();
                        self.send(EngineCommand::Connect(ConnectionMode::Serial {
                            port: self.selected_port.clone(),
                            baud_rate: self.config.serial.baud_rate,
                        }));
                    }
                }

                ui.add_space(10.0);
                ui.separator();
                ui.label("LIVE SENSOR DATA");
                self.live_readouts(ui);

                ui.add_space(10.0);
                ui.separator();
                ui.label("CALIBRATION");
                ui.horizontal(|ui| {
                    if ui.button("Tare").clicked() {
                        self.send(EngineCommand::Sensor(SensorCommand::Tare));
                    }
                    if ui.button("Reset encoder").clicked() {
                        self.send(EngineCommand::Sensor(SensorCommand::ResetEncoder));
                    }
                });
                ui.horizontal(|ui| {
                    ui.add(
                        egui::DragValue::new(&mut self.known_weight_kg)
                            .suffix(" kg")
                            .speed(0.1),
                    );
                    if ui.button("Calibrate load").clicked() {
                        self.calibrate_load();
                    }
                });
                ui.horizontal(|ui| {
                    if ui.button("Set min position").clicked() {
                        self.capture_pot(false);
                    }
                    if ui.button("Set max position").clicked() {
                        self.capture_pot(true);
                    }
                });
                ui.label(format!(
                    "Pot range: {} .. {}",
                    self.config.calibration.pot_min_raw, self.config.calibration.pot_max_raw
                ));
                if ui
                    .add(
                        egui::DragValue::new(&mut self.config.calibration.encoder_ppr)
                            .prefix("encoder PPR ")
                            .clamp_range(100..=10_000),
                    )
                    .changed()
                {
                    self.save_config();
                }
                let cal = &mut self.config.calibration;
                let mut changed = false;
                changed |= ui
                    .add(egui::DragValue::new(&mut cal.stroke_length_mm).prefix("stroke mm "))
                    .changed();
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut cal.polar_pulses_per_rev)
                            .prefix("pulses/rev ")
                            .clamp_range(1..=1_000_000),
                    )
                    .changed();
                if changed {
                    let cal = self.config.calibration.clone();
                    for vp in &mut self.viewports {
                        vp.set_calibration(&cal);
                    }
                    self.save_config();
                }

                ui.add_space(10.0);
                ui.separator();
                ui.label("RECORDING");
                ui.add(egui::TextEdit::singleline(&mut self.session_name).hint_text("session name"));
                ui.add(egui::TextEdit::singleline(&mut self.metadata.description).hint_text("description"));
                ui.add(egui::TextEdit::singleline(&mut self.metadata.strut_info).hint_text("strut"));
                ui.add(egui::DragValue::new(&mut self.metadata.spring_rate).prefix("spring "));
                ui.add(egui::DragValue::new(&mut self.metadata.damping_setting).prefix("damping "));
                ui.add(
                    egui::TextEdit::singleline(&mut self.metadata.test_conditions)
                        .hint_text("test conditions"),
                );
                if self.is_recording {
                    self.recording_clock(ui);
                }

                let rec_btn_text = if self.is_recording { "⏹ STOP" } else { "🔴 RECORD" };
                let rec_btn_col = if self.is_recording { Color32::RED } else { Color32::DARK_GRAY };
                if ui
                    .add_enabled(
                        self.is_connected || self.is_recording,
                        egui::Button::new(egui::RichText::new(rec_btn_text).color(Color32::WHITE))
                            .fill(rec_btn_col),
                    )
                    .clicked()
                {
                    if self.is_recording {
                        self.send(EngineCommand::SetMetadata(self.metadata.clone()));
                        self.send(EngineCommand::StopRecording);
                    } else {
                        self.send(EngineCommand::StartRecording(self.session_name.clone()));
                        // the engine may stop on its own at the time limit
                        self.send(EngineCommand::SetMetadata(self.metadata.clone()));
                    }
                }
                if ui
                    .add_enabled(self.last_session.is_some(), egui::Button::new("Save last session"))
                    .clicked()
                {
                    self.save_last_session();
                }

                ui.add_space(10.0);
                ui.separator();
                ui.label("SESSIONS");
                ui.horizontal(|ui| {
                    let current = self
                        .saved_sessions
                        .get(self.selected_saved)
                        .and_then(|p| p.file_stem())
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    egui::ComboBox::from_id_source("sessions")
                        .selected_text(current)
                        .show_ui(ui, |ui| {
                            for (i, path) in self.saved_sessions.iter().enumerate() {
                                let label = path
                                    .file_stem()
                                    .map(|s| s.to_string_lossy().into_owned())
                                    .unwrap_or_default();
                                ui.selectable_value(&mut self.selected_saved, i, label);
                            }
                        });
                    if ui.button("⟳").clicked() {
                        self.refresh_sessions();
                    }
                });
                ui.horizontal(|ui| {
                    if ui.button("Load session").clicked() {
                        self.load_selected_session();
                    }
                    if ui.button("Add to comparison").clicked() {
                        self.compare_selected_session();
                    }
                });
                if let Some(session) = &self.last_session {
                    egui::CollapsingHeader::new("Session analysis").show(ui, |ui| {
                        Self::session_analysis(ui, session);
                    });
                }

                ui.add_space(10.0);
                egui::ScrollArea::vertical()
                    .id_source("log")
                    .max_height(120.0)
                    .show(ui, |ui| {
                        for m in &self.log_messages {
                            ui.monospace(m);
                        }
                    });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for (i, kind) in PlotKind::ALL.iter().enumerate() {
                    ui.selectable_value(&mut self.selected, i, kind.axes().title);
                }
            });

            let mut export = false;
            ui.horizontal(|ui| {
                let vp = &mut self.viewports[self.selected];
                let mut autoscale = vp.autoscale();
                if ui.checkbox(&mut autoscale, "Auto scale").changed() {
                    vp.set_autoscale(autoscale);
                }
                let mut overlay = vp.overlay_mode();
                if ui.checkbox(&mut overlay, "Overlay").changed() {
                    vp.set_overlay_mode(overlay);
                }
                let mut polar = vp.polar_requested();
                if ui
                    .add_enabled(vp.kind().supports_polar(), egui::Checkbox::new(&mut polar, "Polar"))
                    .changed()
                {
                    vp.set_polar(polar);
                }
                let mut grid = vp.grid_visible();
                if ui.checkbox(&mut grid, "Grid").changed() {
                    vp.set_grid_visible(grid);
                }
                if ui.button("Clear").clicked() {
                    vp.clear();
                }
                if ui.button("Clear overlays").clicked() {
                    vp.clear_overlays();
                }
                export = ui.button("Export PNG").clicked();
            });
            if export {
                self.export_png();
            }

            Self::draw_viewport(ui, &mut self.viewports[self.selected]);

            let points: Vec<[f64; 2]> = self.velocity.iter().copied().collect();
            Plot::new("velocity")
                .height(130.0)
                .auto_bounds_x()
                .auto_bounds_y()
                .show(ui, |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::new(points))
                            .name("Velocity (mm/s)")
                            .color(Color32::from_rgb(255, 150, 50)),
                    );
                });
        });
    }
}
