use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use log::{error, info, warn};
use crate::config::{validate_analyzer_address, MeasureConfig};
use crate::drivers::{
    measure_single, Code, Harmonic, InstrumentHandle, InstrumentManager, MeasureEvent,
    MeasurementSession, SweepError, SweepOutcome, SweepRunner, SweepTarget,
};
use crate::export;
use crate::types::ConnectionMode;
/// Clears the in-flight slot when the job that claimed it ends, even by panic.
struct InFlight(Arc<AtomicBool>);
impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
/// Owns the instruments and the measurement session, and runs one job at a time off-thread.
///
/// The running job holds the session write lock for its whole duration;
/// readers should wait for the completion event before reading.
pub struct MeasurementService {
    config: MeasureConfig,
    manager: InstrumentManager,
    instruments: Arc<Mutex<Option<InstrumentHandle>>>,
    session: Arc<RwLock<MeasurementSession>>,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    events: Sender<MeasureEvent>,
    worker: Option<JoinHandle<()>>,
    names: Option<(String, String)>,
}
impl MeasurementService {
    pub fn new(config: MeasureConfig, events: Sender<MeasureEvent>) -> Self {
        let session = MeasurementSession::new(config.cutoff_offset_db);
        Self {
            config,
            manager: InstrumentManager::new(),
            instruments: Arc::new(Mutex::new(None)),
            session: Arc::new(RwLock::new(session)),
            busy: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            events,
            worker: None,
            names: None,
        }
    }
    pub fn config(&self) -> &MeasureConfig {
        &self.config
    }
    /// Hardware drivers are registered here before switching to hardware mode.
    pub fn manager_mut(&mut self) -> &mut InstrumentManager {
        &mut self.manager
    }
    pub fn find_instruments(&mut self) -> bool {
        info!("find instruments");
        let Ok(_slot) = self.claim() else {
            warn!("cannot search for instruments while a measurement is running");
            return false;
        };
        let found = self.manager.find(
            self.config.mode,
            &self.config.analyzer_address,
            self.config.settle(),
        );
        match found {
            Ok(handle) => {
                self.install(handle);
                true
            }
            Err(err) => {
                warn!("{err}");
                *lock(&self.instruments) = None;
                self.names = None;
                false
            }
        }
    }
    /// Installs an already built instrument pair, bypassing discovery.
    pub fn install(&mut self, handle: InstrumentHandle) {
        self.names = Some((handle.programmer_name(), handle.analyzer_name()));
        *lock(&self.instruments) = Some(handle);
    }
    pub fn can_measure(&self) -> bool {
        self.names.is_some()
    }
    pub fn programmer_name(&self) -> Option<&str> {
        self.names.as_ref().map(|(p, _)| p.as_str())
    }
    pub fn analyzer_name(&self) -> Option<&str> {
        self.names.as_ref().map(|(_, a)| a.as_str())
    }
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
    /// Switches the driver variant used by the next discovery.
    pub fn set_mode(&mut self, mode: ConnectionMode) -> Result<(), SweepError> {
        let _slot = self.claim()?;
        self.config.mode = mode;
        let max = self.config.effective_max_code();
        if self.config.code > max {
            warn!("code {} is outside the {mode:?} range, using {max}", self.config.code);
            self.config.code = max;
        }
        Ok(())
    }
    pub fn cutoff_offset_db(&self) -> f64 {
        self.config.cutoff_offset_db
    }
    /// Takes effect on the next sweep.
    pub fn set_cutoff_offset_db(&mut self, value: f64) {
        self.config.cutoff_offset_db = value;
    }
    pub fn set_harmonic(&mut self, value: u8) -> Result<(), SweepError> {
        Harmonic::try_from(value)?;
        self.config.harmonic = value;
        Ok(())
    }
    pub fn set_code(&mut self, code: Code) -> Result<(), SweepError> {
        let max = self.config.effective_max_code();
        if code > max {
            return Err(SweepError::CodeOutOfRange { code, max });
        }
        self.config.code = code;
        Ok(())
    }
    /// Used by the next discovery; an invalid address leaves the current one in place.
    pub fn set_analyzer_address(&mut self, address: &str) -> Result<(), SweepError> {
        validate_analyzer_address(address)?;
        info!("set analyzer address {address}");
        self.config.analyzer_address = address.to_owned();
        Ok(())
    }
    pub fn read_session(&self) -> RwLockReadGuard<'_, MeasurementSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }
    pub fn start_sweep(&mut self) -> Result<(), SweepError> {
        info!("run measurement, cutoff={}", self.config.cutoff_offset_db);
        let slot = self.claim_connected()?;
        let offset = self.config.cutoff_offset_db;
        let max_code = self.config.effective_max_code();
        self.spawn(
            slot,
            move |handle, session, events, cancel| {
                session.set_cutoff_offset_db(offset);
                let outcome =
                    SweepRunner::new(max_code, events, cancel).run(handle, session, SweepTarget::Baseline)?;
                if let SweepOutcome::Cancelled(_) = outcome {
                    return Ok(None);
                }
                info!("process stats");
                let stats = session.compute_stats()?;
                info!(
                    "stats ready: {} codes, cutoff level {:.2} dB",
                    stats.codes.len(),
                    stats.cutoff_amplitude
                );
                Ok(Some(MeasureEvent::StatsReady))
            },
        )
    }
    pub fn start_harmonic(&mut self, order: u8) -> Result<(), SweepError> {
        let harmonic = Harmonic::try_from(order)?;
        info!(
            "run harmonic measurement, cutoff={}, harmonic={order}",
            self.config.cutoff_offset_db
        );
        let slot = self.claim_connected()?;
        if !self.read_session().has_baseline() {
            return Err(SweepError::BaselineMissing);
        }
        let max_code = self.config.effective_max_code();
        self.spawn(
            slot,
            move |handle, session, events, cancel| {
                let outcome = SweepRunner::new(max_code, events, cancel).run(
                    handle,
                    session,
                    SweepTarget::Harmonic(harmonic),
                )?;
                if let SweepOutcome::Cancelled(_) = outcome {
                    return Ok(None);
                }
                session.process_harmonic(harmonic)?;
                Ok(Some(MeasureEvent::HarmonicMeasured(harmonic)))
            },
        )
    }
    pub fn start_single(&mut self) -> Result<(), SweepError> {
        let harmonic = Harmonic::try_from(self.config.harmonic)?;
        let code = self.config.code;
        let slot = self.claim_connected()?;
        self.spawn(
            slot,
            move |handle, session, _events, _cancel| {
                let point = measure_single(handle, session, code, harmonic)?;
                Ok(Some(MeasureEvent::SinglePointMeasured { code, point }))
            },
        )
    }
    pub fn process_harmonic(&mut self, order: u8) -> Result<Vec<f64>, SweepError> {
        let harmonic = Harmonic::try_from(order)?;
        info!("processing harmonic stats, harmonic={order}");
        let _slot = self.claim()?;
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        session.process_harmonic(harmonic).map(<[f64]>::to_vec)
    }
    /// Asks the running job to stop before its next code.
    pub fn cancel(&self) {
        if self.is_running() {
            info!("cancel requested");
            self.cancel.store(true, Ordering::SeqCst);
        }
    }
    /// Blocks until the current job has finished.
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("measurement worker panicked");
            }
        }
    }
    pub fn export(&self) -> Result<Vec<PathBuf>, SweepError> {
        let _slot = self.claim()?;
        let session = self.read_session();
        let mut files = export::export_tables(&session, &self.config.export_dir)?;
        files.extend(export::export_charts(&session, &self.config.image_dir)?);
        Ok(files)
    }
    fn claim(&self) -> Result<InFlight, SweepError> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| InFlight(Arc::clone(&self.busy)))
            .map_err(|_| SweepError::AlreadyRunning)
    }
    fn claim_connected(&self) -> Result<InFlight, SweepError> {
        if !self.can_measure() {
            return Err(SweepError::NotConnected);
        }
        self.claim()
    }
    fn spawn<F>(&mut self, slot: InFlight, job: F) -> Result<(), SweepError>
    where
        F: FnOnce(
                &mut InstrumentHandle,
                &mut MeasurementSession,
                &Sender<MeasureEvent>,
                &AtomicBool,
            ) -> Result<Option<MeasureEvent>, SweepError>
            + Send
            + 'static,
    {
        // reap the previous worker
        self.wait();
        self.cancel.store(false, Ordering::SeqCst);
        let instruments = Arc::clone(&self.instruments);
        let session = Arc::clone(&self.session);
        let cancel = Arc::clone(&self.cancel);
        let events = self.events.clone();
        let worker = thread::Builder::new()
            .name("measurement".into())
            .spawn(move || {
                let result = {
                    let mut instruments = lock(&instruments);
                    let mut session = session.write().unwrap_or_else(PoisonError::into_inner);
                    match instruments.as_mut() {
                        Some(handle) => job(handle, &mut *session, &events, &*cancel),
                        None => Err(SweepError::NotConnected),
                    }
                };
                drop(slot);
                let completion = match result {
                    Ok(event) => event,
                    Err(err) => {
                        error!("measurement failed: {err}");
                        Some(MeasureEvent::Failed(err.to_string()))
                    }
                };
                if let Some(event) = completion {
                    events.send(event).ok();
                }
            })
            .map_err(|err| SweepError::Instrument(format!("failed to start worker: {err}")))?;
        self.worker = Some(worker);
        Ok(())
    }
}
impl Drop for MeasurementService {
    fn drop(&mut self) {
        self.cancel();
        self.wait();
    }
}
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
