// src/main.rs
mod config;
mod drivers;
mod engine;
mod export;
mod service;
mod types;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;
use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use crate::config::MeasureConfig;
use crate::drivers::{Harmonic, MeasureEvent};
use crate::types::{Command, Message};
const REPLY_TIMEOUT: Duration = Duration::from_secs(600);
fn load_config() -> Result<MeasureConfig> {
    match std::env::args().nth(1) {
        Some(path) => MeasureConfig::load(Path::new(&path)),
        None => {
            info!("no config file given, using defaults");
            Ok(MeasureConfig::default())
        }
    }
}
/// Blocks until `done` accepts a message, logging everything seen on the way.
fn wait_for(rx: &Receiver<Message>, done: impl Fn(&Message) -> bool) -> Result<Message> {
    loop {
        let msg = rx
            .recv_timeout(REPLY_TIMEOUT)
            .context("measurement engine stopped answering")?;
        match &msg {
            Message::Log(text) => info!("{text}"),
            Message::Rejected(reason) => warn!("rejected: {reason}"),
            Message::Event(MeasureEvent::CodeMeasured { target, code, point }) => {
                info!("{target:?} code {code}: {} points", point.len())
            }
            Message::Event(MeasureEvent::Failed(reason)) => error!("measurement failed: {reason}"),
            Message::Event(event) => info!("{event:?}"),
            Message::Connected(found) => info!("instruments found: {found}"),
            Message::Exported { files } => {
                for file in files {
                    info!("saved {}", file.display());
                }
            }
        }
        if matches!(msg, Message::Rejected(_) | Message::Event(MeasureEvent::Failed(_))) {
            bail!("engine refused the request");
        }
        if done(&msg) {
            return Ok(msg);
        }
    }
}
fn run(config: MeasureConfig, tx_cmd: &Sender<Command>, rx: &Receiver<Message>) -> Result<()> {
    tx_cmd.send(Command::FindInstruments(config.mode))?;
    if !matches!(wait_for(rx, |m| matches!(m, Message::Connected(_)))?, Message::Connected(true)) {
        bail!("no instruments available in {:?} mode", config.mode);
    }
    tx_cmd.send(Command::Sweep)?;
    let done = wait_for(rx, |m| {
        matches!(
            m,
            Message::Event(MeasureEvent::StatsReady | MeasureEvent::Cancelled { .. })
        )
    })?;
    if !matches!(done, Message::Event(MeasureEvent::StatsReady)) {
        bail!("sweep was cancelled");
    }
    for harmonic in Harmonic::ALL {
        tx_cmd.send(Command::MeasureHarmonic(harmonic.order()))?;
        wait_for(rx, |m| {
            matches!(m, Message::Event(MeasureEvent::HarmonicMeasured(h)) if *h == harmonic)
        })?;
    }
    tx_cmd.send(Command::Export)?;
    wait_for(rx, |m| matches!(m, Message::Exported { .. }))?;
    Ok(())
}
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = load_config()?;
    config.validate()?;
    let (tx_cmd, rx_cmd) = channel();
    let (tx_msg, rx_msg) = channel();
    let engine = engine::spawn_thread(config.clone(), tx_msg, rx_cmd);
    let result = run(config, &tx_cmd, &rx_msg);
    tx_cmd.send(Command::Shutdown).ok();
    if engine.join().is_err() {
        error!("measurement engine panicked");
    }
    result
}
