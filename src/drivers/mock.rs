use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::{Analyzer, Code, Programmer, RawMeasurement, SweepError};
/// Programmer stand-in that accepts every code except the ones it is told to reject.
#[derive(Clone, Debug, Default)]
pub struct MockProgrammer {
    rejected: HashSet<Code>,
    current: Option<Code>,
}
impl MockProgrammer {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn rejecting(codes: impl IntoIterator<Item = Code>) -> Self {
        Self {
            rejected: codes.into_iter().collect(),
            current: None,
        }
    }
    pub fn current(&self) -> Option<Code> {
        self.current
    }
}
impl Programmer for MockProgrammer {
    fn set_code(&mut self, code: Code) -> bool {
        if self.rejected.contains(&code) {
            return false;
        }
        self.current = Some(code);
        true
    }
    fn name(&self) -> String {
        "Arduino SPI mock".to_owned()
    }
}
/// Synthetic analyzer modelling a third-order low-pass whose cutoff falls as the code grows.
pub struct MockAnalyzer {
    address: String,
    points: usize,
    start_hz: f64,
    stop_hz: f64,
    seed: u64,
}
impl MockAnalyzer {
    const ORDER: i32 = 3;
    const TOP_CUTOFF_HZ: f64 = 60.0e6;
    const NOISE_DB: f64 = 0.05;
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_owned(),
            points: 201,
            start_hz: 100.0e3,
            stop_hz: 1.0e9,
            seed: 0x5eed,
        }
    }
    pub fn with_points(mut self, points: usize) -> Self {
        self.points = points.max(2);
        self
    }
    pub fn cutoff_hz(code: Code) -> f64 {
        Self::TOP_CUTOFF_HZ / (1.0 + f64::from(code) * 0.25)
    }
    fn frequencies(&self) -> Vec<f64> {
        let ratio = (self.stop_hz / self.start_hz).ln();
        (0..self.points)
            .map(|i| {
                let t = i as f64 / (self.points - 1) as f64;
                (self.start_hz * (ratio * t).exp()).round()
            })
            .collect()
    }
}
impl Analyzer for MockAnalyzer {
    fn init_instrument(&mut self) -> Result<(), SweepError> {
        debug!("mock analyzer {} armed", self.address);
        Ok(())
    }
    fn finish(&mut self) -> Result<(), SweepError> {
        debug!("mock analyzer {} released", self.address);
        Ok(())
    }
    fn measure(&mut self, code: Code) -> Result<RawMeasurement, SweepError> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ u64::from(code));
        let cutoff = Self::cutoff_hz(code);
        let freqs = self.frequencies();
        let mut amp_tokens = Vec::with_capacity(freqs.len() * 2);
        for f in &freqs {
            let ratio = f / cutoff;
            let gain_db = -10.0 * (1.0 + ratio.powi(2 * Self::ORDER)).log10();
            let noise = rng.gen_range(-Self::NOISE_DB..Self::NOISE_DB);
            let phase_deg = -f64::from(Self::ORDER) * ratio.atan().to_degrees();
            amp_tokens.push(format!("{:.4}", gain_db + noise));
            amp_tokens.push(format!("{phase_deg:.3}"));
        }
        let freq_field = freqs
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Ok(RawMeasurement::new(freq_field, amp_tokens.join(",")))
    }
    fn name(&self) -> String {
        format!("Obzor-304 mock at {}", self.address)
    }
}
/// Shared init/finish counters, readable after the analyzer moved into a handle.
#[derive(Clone, Debug, Default)]
pub struct LifecycleCounters {
    inits: Arc<AtomicUsize>,
    finishes: Arc<AtomicUsize>,
}
impl LifecycleCounters {
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.inits.load(Ordering::SeqCst),
            self.finishes.load(Ordering::SeqCst),
        )
    }
}
/// Replays canned payloads in order; useful for tests and deterministic playback.
pub struct ScriptedAnalyzer {
    queue: VecDeque<RawMeasurement>,
    counters: LifecycleCounters,
}
impl ScriptedAnalyzer {
    pub fn new(payloads: impl IntoIterator<Item = RawMeasurement>) -> Self {
        Self {
            queue: payloads.into_iter().collect(),
            counters: LifecycleCounters::default(),
        }
    }
    pub fn counters(&self) -> LifecycleCounters {
        self.counters.clone()
    }
}
impl Analyzer for ScriptedAnalyzer {
    fn init_instrument(&mut self) -> Result<(), SweepError> {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn finish(&mut self) -> Result<(), SweepError> {
        self.counters.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn measure(&mut self, code: Code) -> Result<RawMeasurement, SweepError> {
        self.queue
            .pop_front()
            .ok_or_else(|| SweepError::Instrument(format!("no scripted payload left for code {code}")))
    }
    fn name(&self) -> String {
        "Scripted analyzer".to_owned()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SweepPoint;
    #[test]
    fn mock_response_parses_and_rolls_off() {
        let mut analyzer = MockAnalyzer::new("TCPIP::192.168.0.3::INSTR").with_points(64);
        let raw = analyzer.measure(10).unwrap();
        let point = SweepPoint::from_raw(&raw).unwrap();
        assert_eq!(point.frequencies.len(), 64);
        assert_eq!(point.amplitudes.len(), 64);
        let first = point.amplitudes[0];
        let last = point.amplitudes[63];
        assert!(first > -1.0);
        assert!(last < first - 20.0);
    }
    #[test]
    fn mock_measurement_is_deterministic_per_code() {
        let mut analyzer = MockAnalyzer::new("addr");
        assert_eq!(analyzer.measure(7).unwrap(), analyzer.measure(7).unwrap());
    }
    #[test]
    fn higher_codes_have_lower_cutoff() {
        assert!(MockAnalyzer::cutoff_hz(0) > MockAnalyzer::cutoff_hz(1));
        assert!(MockAnalyzer::cutoff_hz(1) > MockAnalyzer::cutoff_hz(127));
    }
    #[test]
    fn rejecting_programmer_refuses_listed_codes() {
        let mut programmer = MockProgrammer::rejecting([2]);
        assert!(programmer.set_code(1));
        assert!(!programmer.set_code(2));
        assert_eq!(programmer.current(), Some(1));
    }
    #[test]
    fn scripted_analyzer_runs_dry() {
        let mut analyzer = ScriptedAnalyzer::new(vec![RawMeasurement::new("1", "0,0")]);
        assert!(analyzer.measure(0).is_ok());
        assert!(matches!(analyzer.measure(1), Err(SweepError::Instrument(_))));
    }
}
