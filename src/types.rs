// src/types.rs
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::drivers::MeasureEvent;

// Which driver variant discovery should build
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub enum ConnectionMode {
    #[default]
    Simulation,
    Hardware,
}

// Commands sent into the engine thread
#[derive(Clone, Debug)]
pub enum Command {
    FindInstruments(ConnectionMode),
    SetCutoffOffset(f64),
    SetHarmonic(u8),
    SetCode(u8),
    SetAnalyzerAddress(String),
    Sweep,
    MeasureHarmonic(u8),
    MeasureSingle,
    ProcessHarmonic(u8),
    Cancel,
    Export,
    Shutdown,
}

// Messages sent back from the engine thread
#[derive(Clone, Debug)]
pub enum Message {
    Log(String),
    Connected(bool),
    Event(MeasureEvent),
    Rejected(String),
    Exported { files: Vec<PathBuf> },
}
