use std::collections::BTreeMap;
use std::fmt;
use crate::drivers::stats::{compute_stats, harmonic_deltas, StatsResult, DEFAULT_CUTOFF_OFFSET_DB};
use crate::drivers::{Code, SweepError, SweepPoint};
/// Harmonic order of a suppression sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Harmonic {
    Second,
    Third,
}
impl Harmonic {
    pub const ALL: [Harmonic; 2] = [Harmonic::Second, Harmonic::Third];
    pub fn order(self) -> u8 {
        match self {
            Harmonic::Second => 2,
            Harmonic::Third => 3,
        }
    }
}
impl TryFrom<u8> for Harmonic {
    type Error = SweepError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Harmonic::Second),
            3 => Ok(Harmonic::Third),
            other => Err(SweepError::InvalidHarmonic(other)),
        }
    }
}
impl fmt::Display for Harmonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.order())
    }
}
/// Accumulated measurement state shared by sweeps, harmonic sweeps and single points.
///
/// Points are stored in code order, one per measured code. Derived values
/// (stats, harmonic deltas) are recomputed from the stored series and never
/// edited directly.
#[derive(Clone, Debug)]
pub struct MeasurementSession {
    codes: Vec<Code>,
    points: Vec<SweepPoint>,
    last_code: Option<Code>,
    last: SweepPoint,
    harmonics: BTreeMap<Harmonic, Vec<Vec<f64>>>,
    harmonic_deltas: BTreeMap<Harmonic, Vec<f64>>,
    stats: Option<StatsResult>,
    cutoff_offset_db: f64,
}
impl Default for MeasurementSession {
    fn default() -> Self {
        Self::new(DEFAULT_CUTOFF_OFFSET_DB)
    }
}
impl MeasurementSession {
    pub fn new(cutoff_offset_db: f64) -> Self {
        Self {
            codes: Vec::new(),
            points: Vec::new(),
            last_code: None,
            last: SweepPoint::empty(),
            harmonics: BTreeMap::new(),
            harmonic_deltas: BTreeMap::new(),
            stats: None,
            cutoff_offset_db,
        }
    }
    /// Empties every series ahead of a new full sweep.
    pub fn clear(&mut self) {
        self.codes.clear();
        self.points.clear();
        self.last_code = None;
        self.last = SweepPoint::empty();
        self.harmonics.clear();
        self.harmonic_deltas.clear();
        self.stats = None;
    }
    pub fn record_point(&mut self, code: Code, point: SweepPoint) {
        self.last_code = Some(code);
        self.last = point.clone();
        self.codes.push(code);
        self.points.push(point);
    }
    /// Stores a single-point result without touching the accumulated sweep.
    pub fn record_single(&mut self, code: Code, point: SweepPoint) {
        self.last_code = Some(code);
        self.last = point;
    }
    pub fn clear_harmonic(&mut self, harmonic: Harmonic) {
        self.harmonics.remove(&harmonic);
        self.harmonic_deltas.remove(&harmonic);
    }
    pub fn record_harmonic(&mut self, harmonic: Harmonic, amplitudes: Vec<f64>) {
        self.harmonics.entry(harmonic).or_default().push(amplitudes);
    }
    pub fn compute_stats(&mut self) -> Result<&StatsResult, SweepError> {
        let stats = compute_stats(&self.points, self.cutoff_offset_db)?;
        Ok(self.stats.insert(stats))
    }
    /// Recomputes suppression deltas of one harmonic against the baseline sweep.
    ///
    /// Expects the baseline and the harmonic sweep to cover the same codes;
    /// when they differ the shorter one bounds the result.
    pub fn process_harmonic(&mut self, harmonic: Harmonic) -> Result<&[f64], SweepError> {
        if !self.has_baseline() {
            return Err(SweepError::BaselineMissing);
        }
        let baseline: Vec<Vec<f64>> = self.points.iter().map(|p| p.amplitudes.clone()).collect();
        let series = self.harmonics.get(&harmonic).map(Vec::as_slice).unwrap_or(&[]);
        let deltas = harmonic_deltas(&baseline, series);
        self.harmonic_deltas.insert(harmonic, deltas);
        Ok(self.harmonic_deltas(harmonic))
    }
    pub fn has_baseline(&self) -> bool {
        self.points.iter().any(|p| !p.amplitudes.is_empty())
    }
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn codes(&self) -> &[Code] {
        &self.codes
    }
    pub fn points(&self) -> &[SweepPoint] {
        &self.points
    }
    pub fn frequencies_by_code(&self) -> Vec<&[f64]> {
        self.points.iter().map(|p| p.frequencies.as_slice()).collect()
    }
    pub fn amplitudes_by_code(&self) -> Vec<&[f64]> {
        self.points.iter().map(|p| p.amplitudes.as_slice()).collect()
    }
    pub fn last_code(&self) -> Option<Code> {
        self.last_code
    }
    pub fn last_frequencies(&self) -> &[f64] {
        &self.last.frequencies
    }
    pub fn last_amplitudes(&self) -> &[f64] {
        &self.last.amplitudes
    }
    pub fn stats(&self) -> Option<&StatsResult> {
        self.stats.as_ref()
    }
    pub fn harmonic_series(&self, harmonic: Harmonic) -> &[Vec<f64>] {
        self.harmonics.get(&harmonic).map(Vec::as_slice).unwrap_or(&[])
    }
    pub fn harmonic_deltas(&self, harmonic: Harmonic) -> &[f64] {
        self.harmonic_deltas
            .get(&harmonic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
    pub fn cutoff_offset_db(&self) -> f64 {
        self.cutoff_offset_db
    }
    pub fn set_cutoff_offset_db(&mut self, value: f64) {
        self.cutoff_offset_db = value;
    }
    /// Threshold amplitude of the last stats pass.
    pub fn cutoff_amplitude(&self) -> Option<f64> {
        self.stats.as_ref().map(|s| s.cutoff_amplitude)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn point(amps: &[f64]) -> SweepPoint {
        SweepPoint {
            frequencies: (1..=amps.len()).map(|f| f as f64 * 10.0).collect(),
            amplitudes: amps.to_vec(),
        }
    }
    #[test]
    fn recorded_series_stay_aligned() {
        let mut session = MeasurementSession::default();
        session.record_point(0, point(&[-1.0, -2.0]));
        session.record_point(1, SweepPoint::empty());
        session.record_point(2, point(&[-3.0, -9.0, -12.0]));
        assert_eq!(session.len(), 3);
        assert_eq!(session.frequencies_by_code().len(), 3);
        assert_eq!(session.amplitudes_by_code().len(), 3);
        assert_eq!(session.codes(), &[0, 1, 2]);
        assert_eq!(session.last_code(), Some(2));
        assert_eq!(session.last_amplitudes(), &[-3.0, -9.0, -12.0]);
    }
    #[test]
    fn single_point_leaves_sweep_untouched() {
        let mut session = MeasurementSession::default();
        session.record_point(0, point(&[-1.0]));
        session.record_single(9, point(&[-4.0, -5.0]));
        assert_eq!(session.len(), 1);
        assert_eq!(session.last_code(), Some(9));
        assert_eq!(session.last_amplitudes(), &[-4.0, -5.0]);
    }
    #[test]
    fn clear_empties_everything_but_the_offset() {
        let mut session = MeasurementSession::new(-3.0);
        session.record_point(0, point(&[-1.0, -8.0]));
        session.record_harmonic(Harmonic::Second, vec![-30.0]);
        session.compute_stats().unwrap();
        session.clear();
        assert!(session.is_empty());
        assert!(session.stats().is_none());
        assert!(session.harmonic_series(Harmonic::Second).is_empty());
        assert!(session.last_frequencies().is_empty());
        assert_eq!(session.cutoff_offset_db(), -3.0);
    }
    #[test]
    fn harmonic_deltas_need_a_baseline() {
        let mut session = MeasurementSession::default();
        session.record_harmonic(Harmonic::Third, vec![-40.0]);
        assert!(matches!(
            session.process_harmonic(Harmonic::Third),
            Err(SweepError::BaselineMissing)
        ));
    }
    #[test]
    fn harmonic_deltas_against_baseline() {
        let mut session = MeasurementSession::default();
        session.record_point(0, point(&[-1.0, -6.0]));
        session.record_point(1, point(&[-2.0, -7.0]));
        session.record_harmonic(Harmonic::Second, vec![-31.0, -40.0]);
        session.record_harmonic(Harmonic::Second, vec![-42.0]);
        let deltas = session.process_harmonic(Harmonic::Second).unwrap().to_vec();
        assert_eq!(deltas, vec![30.0, 40.0]);
        assert_eq!(session.harmonic_deltas(Harmonic::Second), &[30.0, 40.0]);
        assert!(session.harmonic_deltas(Harmonic::Third).is_empty());
    }
    #[test]
    fn harmonic_order_parsing() {
        assert_eq!(Harmonic::try_from(2).unwrap(), Harmonic::Second);
        assert_eq!(Harmonic::try_from(3).unwrap().to_string(), "x3");
        assert!(matches!(Harmonic::try_from(1), Err(SweepError::InvalidHarmonic(1))));
    }
}
