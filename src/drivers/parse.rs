use serde::Serialize;
use crate::drivers::SweepError;
/// Raw analyzer payload for one code: comma separated frequency and amplitude fields.
///
/// The amplitude field interleaves two channels; only even positions carry
/// the amplitude in dB.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawMeasurement {
    pub freq_field: String,
    pub amp_field: String,
}
impl RawMeasurement {
    pub fn new(freq_field: impl Into<String>, amp_field: impl Into<String>) -> Self {
        Self {
            freq_field: freq_field.into(),
            amp_field: amp_field.into(),
        }
    }
}
/// Parsed response of one code, frequencies and amplitudes co-indexed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SweepPoint {
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
}
impl SweepPoint {
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty() && self.amplitudes.is_empty()
    }
    pub fn len(&self) -> usize {
        self.frequencies.len().min(self.amplitudes.len())
    }
    /// Parses both fields of a raw payload; they must describe the same number of samples.
    pub fn from_raw(raw: &RawMeasurement) -> Result<Self, SweepError> {
        let frequencies = parse_frequencies(&raw.freq_field)?;
        let amplitudes = parse_amplitudes(&raw.amp_field)?;
        if frequencies.len() != amplitudes.len() {
            return Err(SweepError::LengthMismatch {
                frequencies: frequencies.len(),
                amplitudes: amplitudes.len(),
            });
        }
        Ok(Self {
            frequencies,
            amplitudes,
        })
    }
}
pub fn parse_frequencies(field: &str) -> Result<Vec<f64>, SweepError> {
    field
        .split(',')
        .map(|token| parse_token("frequency", token))
        .collect()
}
pub fn parse_amplitudes(field: &str) -> Result<Vec<f64>, SweepError> {
    field
        .split(',')
        .step_by(2)
        .map(|token| parse_token("amplitude", token))
        .collect()
}
fn parse_token(field: &'static str, token: &str) -> Result<f64, SweepError> {
    token.trim().parse::<f64>().map_err(|_| SweepError::Parse {
        field,
        token: token.to_string(),
    })
}
