// src/engine.rs
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::drivers::{
    DecoderOptions, SamplePipeline, SampleSource, SerialSource, SimulatedSource, TelemetryError,
};
use crate::recorder::SessionRecorder;
use crate::types::*;

type Link = SamplePipeline<Box<dyn SampleSource + Send>>;

fn open_source(mode: &ConnectionMode) -> Result<Box<dyn SampleSource + Send>> {
    match mode {
        ConnectionMode::Simulation => {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            Ok(Box::new(SimulatedSource::new(seed)))
        }
        ConnectionMode::Serial { port, baud_rate } => {
            let source = SerialSource::open(port, *baud_rate)
                .with_context(|| format!("failed to open serial port {port}"))?;
            Ok(Box::new(source))
        }
    }
}

/// Background ingestion loop: owns the connection and the recorder, forwards
/// every enriched sample to the GUI.
pub fn spawn_thread(
    tx: Sender<EngineMessage>,
    rx_cmd: Receiver<EngineCommand>,
    options: DecoderOptions,
) -> thread::JoinHandle<()> {
    spawn_with_recorder(tx, rx_cmd, options, SessionRecorder::new())
}

fn spawn_with_recorder(
    tx: Sender<EngineMessage>,
    rx_cmd: Receiver<EngineCommand>,
    options: DecoderOptions,
    mut recorder: SessionRecorder,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        tx.send(EngineMessage::Log("Engine ready.".to_owned())).ok();
        let mut link: Option<Link> = None;

        let finish_recording = |recorder: &mut SessionRecorder| {
            if let Some(session) = recorder.stop() {
                tx.send(EngineMessage::SessionFinished(session)).ok();
                tx.send(EngineMessage::RecordingStatus(false)).ok();
            }
        };

        loop {
            // 1. commands
            loop {
                let cmd = match rx_cmd.try_recv() {
                    Ok(cmd) => cmd,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("command channel closed, engine stopping");
                        finish_recording(&mut recorder);
                        return;
                    }
                };
                match cmd {
                    EngineCommand::Connect(mode) => match open_source(&mode) {
                        Ok(source) => {
                            // fresh pipeline = fresh decoder tail and velocity state
                            link = Some(SamplePipeline::new(source, options));
                            info!("connected: {mode:?}");
                            tx.send(EngineMessage::Status(true)).ok();
                            tx.send(EngineMessage::Log(format!("Connected ({mode:?})")))
                                .ok();
                        }
                        Err(e) => {
                            warn!("{e:#}");
                            tx.send(EngineMessage::Log(format!("Connect failed: {e:#}")))
                                .ok();
                        }
                    },
                    EngineCommand::Disconnect => {
                        if let Some(old) = link.take() {
                            info!("disconnected, decoder stats {:?}", old.stats());
                        }
                        finish_recording(&mut recorder);
                        tx.send(EngineMessage::Status(false)).ok();
                    }
                    EngineCommand::Sensor(command) => {
                        let result = match &mut link {
                            Some(pipeline) => pipeline.send_command(command),
                            None => Err(TelemetryError::NotConnected),
                        };
                        let text = match result {
                            Ok(()) => format!("Sent {command}"),
                            Err(e) => format!("{command} failed: {e}"),
                        };
                        tx.send(EngineMessage::Log(text)).ok();
                    }
                    EngineCommand::StartRecording(name) => {
                        recorder.start(&name);
                        tx.send(EngineMessage::RecordingStatus(true)).ok();
                    }
                    EngineCommand::SetMetadata(meta) => recorder.set_metadata(&meta),
                    EngineCommand::StopRecording => finish_recording(&mut recorder),
                }
            }

            // 2. data
            let Some(pipeline) = &mut link else {
                thread::sleep(Duration::from_millis(50));
                continue;
            };
            match pipeline.pump_once() {
                Ok(samples) => {
                    for sample in samples {
                        recorder.record(&sample);
                        tx.send(EngineMessage::Sample(sample)).ok();
                    }
                    if recorder.limit_reached() {
                        info!("recording limit reached");
                        tx.send(EngineMessage::Log("Recording limit reached.".to_owned()))
                            .ok();
                        finish_recording(&mut recorder);
                    }
                }
                Err(e) => {
                    warn!("read failed, dropping connection: {e}");
                    link = None;
                    finish_recording(&mut recorder);
                    tx.send(EngineMessage::Log(format!("Disconnected: {e}"))).ok();
                    tx.send(EngineMessage::Status(false)).ok();
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
    })
}
