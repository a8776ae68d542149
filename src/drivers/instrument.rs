use std::fmt;
use std::time::Duration;
use log::{debug, info, warn};
use crate::drivers::{Code, RawMeasurement, SweepError};
use crate::types::ConnectionMode;
/// Device that loads a filter code into the tunable filter.
pub trait Programmer: Send {
    /// Returns `false` when the hardware did not accept the code.
    fn set_code(&mut self, code: Code) -> bool;
    fn name(&self) -> String;
}
/// Network analyzer returning raw delimited sweep payloads.
pub trait Analyzer: Send {
    fn init_instrument(&mut self) -> Result<(), SweepError>;
    fn finish(&mut self) -> Result<(), SweepError>;
    /// Blocking sweep of the currently loaded code.
    fn measure(&mut self, code: Code) -> Result<RawMeasurement, SweepError>;
    fn name(&self) -> String;
}
/// Programmer and analyzer pair selected once at discovery time.
pub struct InstrumentHandle {
    programmer: Box<dyn Programmer>,
    analyzer: Box<dyn Analyzer>,
    settle: Duration,
}
impl fmt::Debug for InstrumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentHandle")
            .field("programmer", &self.programmer.name())
            .field("analyzer", &self.analyzer.name())
            .field("settle", &self.settle)
            .finish()
    }
}
impl InstrumentHandle {
    pub fn new(
        programmer: Box<dyn Programmer>,
        analyzer: Box<dyn Analyzer>,
        settle: Duration,
    ) -> Self {
        Self {
            programmer,
            analyzer,
            settle,
        }
    }
    pub fn programmer_name(&self) -> String {
        self.programmer.name()
    }
    pub fn analyzer_name(&self) -> String {
        self.analyzer.name()
    }
    pub fn settle(&self) -> Duration {
        self.settle
    }
    /// Arms the analyzer for one operation; it is disarmed when the guard drops.
    pub fn acquire(&mut self) -> Result<MeasureGuard<'_>, SweepError> {
        debug!("acquire analyzer context");
        self.analyzer.init_instrument()?;
        Ok(MeasureGuard { handle: self })
    }
}
/// Scoped access to an armed instrument pair.
pub struct MeasureGuard<'a> {
    handle: &'a mut InstrumentHandle,
}
impl MeasureGuard<'_> {
    pub fn set_code(&mut self, code: Code) -> bool {
        self.handle.programmer.set_code(code)
    }
    pub fn measure(&mut self, code: Code) -> Result<RawMeasurement, SweepError> {
        self.handle.analyzer.measure(code)
    }
    pub fn settle(&self) -> Duration {
        self.handle.settle
    }
}
impl Drop for MeasureGuard<'_> {
    fn drop(&mut self) {
        debug!("exit analyzer context");
        if let Err(err) = self.handle.analyzer.finish() {
            warn!("failed to release analyzer: {err}");
        }
    }
}
pub type DriverPair = (Box<dyn Programmer>, Box<dyn Analyzer>);
/// Builds a fresh hardware driver pair for the given analyzer address.
pub type DriverFactory = Box<dyn Fn(&str) -> DriverPair + Send>;
/// Picks the driver variant for a connection mode.
///
/// Port probing is left to the hardware drivers themselves; hardware mode
/// only succeeds when a driver factory has been registered. The factory is
/// kept, so discovery can be repeated.
#[derive(Default)]
pub struct InstrumentManager {
    hardware: Option<DriverFactory>,
    available_ports: Vec<String>,
}
impl InstrumentManager {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register_hardware<F>(&mut self, factory: F)
    where
        F: Fn(&str) -> DriverPair + Send + 'static,
    {
        self.hardware = Some(Box::new(factory));
    }
    fn find_ports(&mut self) {
        self.available_ports = match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(err) => {
                warn!("serial port enumeration failed: {err}");
                Vec::new()
            }
        };
        info!("available ports: {}", self.available_ports.join(" "));
    }
    pub fn find(
        &mut self,
        mode: ConnectionMode,
        analyzer_address: &str,
        settle: Duration,
    ) -> Result<InstrumentHandle, SweepError> {
        self.find_ports();
        let (programmer, analyzer): DriverPair = match mode {
            ConnectionMode::Simulation => (
                Box::new(crate::drivers::MockProgrammer::new()),
                Box::new(crate::drivers::MockAnalyzer::new(analyzer_address)),
            ),
            ConnectionMode::Hardware => match &self.hardware {
                Some(factory) => factory(analyzer_address),
                None => return Err(SweepError::InstrumentNotFound),
            },
        };
        info!("programmer: {}", programmer.name());
        info!("analyzer: {}", analyzer.name());
        Ok(InstrumentHandle::new(programmer, analyzer, settle))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MockProgrammer, ScriptedAnalyzer};
    #[test]
    fn guard_arms_and_disarms_analyzer_once() {
        let analyzer = ScriptedAnalyzer::new(vec![]);
        let counters = analyzer.counters();
        let mut handle = InstrumentHandle::new(
            Box::new(MockProgrammer::new()),
            Box::new(analyzer),
            Duration::ZERO,
        );
        {
            let mut guard = handle.acquire().unwrap();
            assert!(guard.set_code(3));
            assert!(guard.set_code(4));
        }
        assert_eq!(counters.snapshot(), (1, 1));
    }
    #[test]
    fn hardware_without_drivers_is_not_found() {
        let mut manager = InstrumentManager::new();
        let err = manager
            .find(ConnectionMode::Hardware, "TCPIP::192.168.0.3::INSTR", Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, SweepError::InstrumentNotFound));
    }
    #[test]
    fn registered_hardware_is_selected_on_every_discovery() {
        let mut manager = InstrumentManager::new();
        manager.register_hardware(|_address: &str| -> DriverPair {
            (
                Box::new(MockProgrammer::new()),
                Box::new(ScriptedAnalyzer::new(vec![])),
            )
        });
        for _ in 0..2 {
            let handle = manager
                .find(ConnectionMode::Hardware, "TCPIP::192.168.0.3::INSTR", Duration::ZERO)
                .unwrap();
            assert_eq!(handle.analyzer_name(), "Scripted analyzer");
        }
    }
    #[test]
    fn factory_receives_analyzer_address() {
        let mut manager = InstrumentManager::new();
        manager.register_hardware(|address: &str| -> DriverPair {
            (
                Box::new(MockProgrammer::new()),
                Box::new(crate::drivers::MockAnalyzer::new(address)),
            )
        });
        let handle = manager
            .find(ConnectionMode::Hardware, "TCPIP::10.0.0.7::INSTR", Duration::ZERO)
            .unwrap();
        assert!(handle.analyzer_name().ends_with("TCPIP::10.0.0.7::INSTR"));
    }
}
