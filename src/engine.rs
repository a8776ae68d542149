// src/engine.rs
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use log::{info, warn};
use crate::config::MeasureConfig;
use crate::drivers::SweepError;
use crate::service::MeasurementService;
use crate::types::*;

pub fn spawn_thread(config: MeasureConfig, tx: Sender<Message>, rx_cmd: Receiver<Command>) -> JoinHandle<()> {
    thread::spawn(move || {
        tx.send(Message::Log("Measurement engine ready.".to_owned())).ok();

        let (ev_tx, ev_rx) = channel();
        let mut service = MeasurementService::new(config, ev_tx);

        loop {
            // 1. forward everything the worker emitted, in order
            for event in ev_rx.try_iter() {
                tx.send(Message::Event(event)).ok();
            }

            // 2. handle at most one command, waking up regularly to keep events flowing
            let cmd = match rx_cmd.recv_timeout(Duration::from_millis(20)) {
                Ok(cmd) => cmd,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let result: Result<(), SweepError> = match cmd {
                Command::FindInstruments(mode) => service.set_mode(mode).map(|_| {
                    let found = service.find_instruments();
                    if found {
                        let programmer = service.programmer_name().unwrap_or_default();
                        let analyzer = service.analyzer_name().unwrap_or_default();
                        tx.send(Message::Log(format!("programmer: {programmer}, analyzer: {analyzer}"))).ok();
                    }
                    tx.send(Message::Connected(found)).ok();
                }),
                Command::SetCutoffOffset(v) => {
                    service.set_cutoff_offset_db(v);
                    Ok(())
                }
                Command::SetHarmonic(n) => service.set_harmonic(n),
                Command::SetCode(code) => service.set_code(code),
                Command::SetAnalyzerAddress(addr) => service.set_analyzer_address(&addr),
                Command::Sweep => service.start_sweep(),
                Command::MeasureHarmonic(n) => service.start_harmonic(n),
                Command::MeasureSingle => service.start_single(),
                Command::ProcessHarmonic(n) => service.process_harmonic(n).map(|deltas| {
                    tx.send(Message::Log(format!("harmonic x{n} deltas: {deltas:?}"))).ok();
                }),
                Command::Cancel => {
                    service.cancel();
                    Ok(())
                }
                Command::Export => service.export().map(|files| {
                    tx.send(Message::Exported { files }).ok();
                }),
                Command::Shutdown => break,
            };
            if let Err(err) = result {
                warn!("command rejected: {err}");
                tx.send(Message::Rejected(err.to_string())).ok();
            }
        }

        info!("engine shutting down");
        service.cancel();
        service.wait();
        drop(service);
        for event in ev_rx.try_iter() {
            tx.send(Message::Event(event)).ok();
        }
    })
}
