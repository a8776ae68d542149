use log::warn;
use serde::Serialize;
use crate::drivers::{SweepError, SweepPoint};
/// Default cutoff level relative to the global peak (a -6 dB point).
pub const DEFAULT_CUTOFF_OFFSET_DB: f64 = -6.0;
/// Cutoff, delta and harmonic-loss statistics derived from a finished sweep.
///
/// `cutoff_freqs` is exposed in reverse measurement order while the loss
/// series keep ascending code order. Plot and export consumers rely on both
/// orders as they are; `delta_series` is taken over the reversed cutoffs.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatsResult {
    pub cutoff_offset_db: f64,
    pub cutoff_amplitude: f64,
    pub codes: Vec<usize>,
    pub cutoff_freqs: Vec<f64>,
    pub loss_double_freq: Vec<f64>,
    pub loss_triple_freq: Vec<f64>,
    pub delta_codes: Vec<usize>,
    pub delta_series: Vec<f64>,
}
/// Index of the first value closest to `target`.
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values.iter().enumerate() {
        let distance = (target - value).abs();
        match best {
            Some((_, best_distance)) if !(distance < best_distance) => {}
            _ if distance.is_nan() => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}
pub fn max_value(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}
pub fn compute_stats(points: &[SweepPoint], cutoff_offset_db: f64) -> Result<StatsResult, SweepError> {
    let global_max = points
        .iter()
        .filter_map(|p| max_value(&p.amplitudes))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        .ok_or(SweepError::EmptySession)?;
    let cutoff_amplitude = global_max + cutoff_offset_db;
    let mut cutoff_freqs = Vec::with_capacity(points.len());
    let mut loss_double_freq = Vec::with_capacity(points.len());
    let mut loss_triple_freq = Vec::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        match code_stats(index, point, cutoff_amplitude) {
            Ok((cutoff, double, triple)) => {
                cutoff_freqs.push(cutoff);
                loss_double_freq.push(double);
                loss_triple_freq.push(triple);
            }
            Err(err) => {
                warn!("skipping stats: {err}");
                cutoff_freqs.push(f64::NAN);
                loss_double_freq.push(f64::NAN);
                loss_triple_freq.push(f64::NAN);
            }
        }
    }
    cutoff_freqs.reverse();
    let delta_series: Vec<f64> = cutoff_freqs
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();
    Ok(StatsResult {
        cutoff_offset_db,
        cutoff_amplitude,
        codes: (0..cutoff_freqs.len()).collect(),
        delta_codes: (0..delta_series.len()).collect(),
        cutoff_freqs,
        loss_double_freq,
        loss_triple_freq,
        delta_series,
    })
}
/// Cutoff frequency and losses at twice and three times the cutoff for one code.
fn code_stats(
    index: usize,
    point: &SweepPoint,
    cutoff_amplitude: f64,
) -> Result<(f64, f64, f64), SweepError> {
    let len = point.len();
    let freqs = &point.frequencies[..len];
    let amps = &point.amplitudes[..len];
    let empty = || SweepError::EmptySeries { index };
    let cutoff_idx = nearest_index(amps, cutoff_amplitude).ok_or_else(empty)?;
    let cutoff_freq = freqs[cutoff_idx];
    let amp_max = max_value(amps).ok_or_else(empty)?;
    let double_idx = nearest_index(freqs, cutoff_freq * 2.0).ok_or_else(empty)?;
    let triple_idx = nearest_index(freqs, cutoff_freq * 3.0).ok_or_else(empty)?;
    Ok((
        cutoff_freq,
        amp_max - amps[double_idx],
        amp_max - amps[triple_idx],
    ))
}
/// Per-code suppression of a harmonic: peak of the baseline minus peak of the harmonic.
///
/// Pairs are zipped, so the result is as long as the shorter input. Codes
/// where either side has no samples yield NaN.
pub fn harmonic_deltas(baseline: &[Vec<f64>], harmonic: &[Vec<f64>]) -> Vec<f64> {
    baseline
        .iter()
        .zip(harmonic)
        .map(|(x1, xn)| match (max_value(x1), max_value(xn)) {
            (Some(a), Some(b)) => a - b,
            _ => f64::NAN,
        })
        .collect()
}
