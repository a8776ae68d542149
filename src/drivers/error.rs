use thiserror::Error;
use crate::drivers::Code;
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("instruments not found, check the connection")]
    InstrumentNotFound,
    #[error("instruments are not connected; run discovery first")]
    NotConnected,
    #[error("programmer rejected code {code}")]
    SetCodeFailed { code: Code },
    #[error("malformed {field} field: {token:?} is not a number")]
    Parse { field: &'static str, token: String },
    #[error("payload has {frequencies} frequencies but {amplitudes} amplitudes")]
    LengthMismatch { frequencies: usize, amplitudes: usize },
    #[error("no codes have been measured yet")]
    EmptySession,
    #[error("series {index} has no samples")]
    EmptySeries { index: usize },
    #[error("a measurement is already running")]
    AlreadyRunning,
    #[error("invalid analyzer address: {0}")]
    InvalidAddress(String),
    #[error("harmonic order must be 2 or 3, got {0}")]
    InvalidHarmonic(u8),
    #[error("code {code} is outside 0..={max}")]
    CodeOutOfRange { code: Code, max: Code },
    #[error("a baseline sweep must be measured before harmonics")]
    BaselineMissing,
    #[error("instrument error: {0}")]
    Instrument(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("failed to export: {0}")]
    Export(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for SweepError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        SweepError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for SweepError {
    fn from(value: image::ImageError) -> Self {
        SweepError::Plot(value.to_string())
    }
}
impl From<csv::Error> for SweepError {
    fn from(value: csv::Error) -> Self {
        SweepError::Export(value.to_string())
    }
}
impl From<std::io::Error> for SweepError {
    fn from(value: std::io::Error) -> Self {
        SweepError::Export(value.to_string())
    }
}
impl From<serde_json::Error> for SweepError {
    fn from(value: serde_json::Error) -> Self {
        SweepError::Export(value.to_string())
    }
}
