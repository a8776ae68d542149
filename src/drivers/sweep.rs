use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use log::{info, warn};
use crate::drivers::{
    Code, Harmonic, InstrumentHandle, MeasureGuard, MeasurementSession, SweepError, SweepPoint,
};
/// Where a sweep stores its series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepTarget {
    Baseline,
    Harmonic(Harmonic),
}
/// Notifications emitted while measuring, in the order they happen.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasureEvent {
    CodeMeasured {
        target: SweepTarget,
        code: Code,
        point: SweepPoint,
    },
    SweepFinished {
        target: SweepTarget,
        codes: usize,
    },
    StatsReady,
    HarmonicMeasured(Harmonic),
    SinglePointMeasured {
        code: Code,
        point: SweepPoint,
    },
    Cancelled {
        target: SweepTarget,
        codes: usize,
    },
    Failed(String),
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Running,
    Finished,
    Cancelled,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(usize),
    Cancelled(usize),
}
/// Walks the code range once, one measurement at a time.
///
/// Statistics are left to whoever observes `SweepFinished`.
pub struct SweepRunner<'a> {
    codes: RangeInclusive<Code>,
    events: &'a Sender<MeasureEvent>,
    cancel: &'a AtomicBool,
    state: SweepState,
}
impl<'a> SweepRunner<'a> {
    pub fn new(max_code: Code, events: &'a Sender<MeasureEvent>, cancel: &'a AtomicBool) -> Self {
        Self {
            codes: 0..=max_code,
            events,
            cancel,
            state: SweepState::Idle,
        }
    }
    pub fn state(&self) -> SweepState {
        self.state
    }
    pub fn run(
        &mut self,
        handle: &mut InstrumentHandle,
        session: &mut MeasurementSession,
        target: SweepTarget,
    ) -> Result<SweepOutcome, SweepError> {
        info!("start measurement task, target={target:?}");
        match target {
            SweepTarget::Baseline => session.clear(),
            SweepTarget::Harmonic(harmonic) => session.clear_harmonic(harmonic),
        }
        self.state = SweepState::Running;
        let mut measured = 0;
        {
            let mut guard = handle.acquire()?;
            for code in self.codes.clone() {
                if self.cancel.load(Ordering::SeqCst) {
                    warn!("measurement cancelled after {measured} codes");
                    self.state = SweepState::Cancelled;
                    break;
                }
                let point = measure_code(&mut guard, code);
                match target {
                    SweepTarget::Baseline => session.record_point(code, point.clone()),
                    SweepTarget::Harmonic(harmonic) => {
                        session.record_harmonic(harmonic, point.amplitudes.clone())
                    }
                }
                measured += 1;
                self.events
                    .send(MeasureEvent::CodeMeasured {
                        target,
                        code,
                        point,
                    })
                    .ok();
            }
        }
        if self.state == SweepState::Cancelled {
            self.events
                .send(MeasureEvent::Cancelled {
                    target,
                    codes: measured,
                })
                .ok();
            return Ok(SweepOutcome::Cancelled(measured));
        }
        info!("end measurement task");
        self.state = SweepState::Finished;
        self.events
            .send(MeasureEvent::SweepFinished {
                target,
                codes: measured,
            })
            .ok();
        Ok(SweepOutcome::Completed(measured))
    }
}
/// Loads one code, waits for the filter to settle and reads the analyzer.
///
/// Any per-code failure degrades to an empty point.
pub fn measure_code(guard: &mut MeasureGuard<'_>, code: Code) -> SweepPoint {
    info!("measure: code={code:03}, bin={code:07b}");
    if !guard.set_code(code) {
        warn!("{}", SweepError::SetCodeFailed { code });
        return SweepPoint::empty();
    }
    thread::sleep(guard.settle());
    let parsed = guard
        .measure(code)
        .and_then(|raw| SweepPoint::from_raw(&raw));
    match parsed {
        Ok(point) => point,
        Err(err) => {
            warn!("code {code}: {err}");
            SweepPoint::empty()
        }
    }
}
/// Measures one code outside of any sweep and publishes it as the last measurement.
pub fn measure_single(
    handle: &mut InstrumentHandle,
    session: &mut MeasurementSession,
    code: Code,
    harmonic: Harmonic,
) -> Result<SweepPoint, SweepError> {
    info!("measure harmonic={}, code={code}", harmonic.order());
    let point = {
        let mut guard = handle.acquire()?;
        measure_code(&mut guard, code)
    };
    session.record_single(code, point.clone());
    Ok(point)
}
