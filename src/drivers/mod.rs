// src/drivers/mod.rs
pub mod error;
pub mod instrument;
pub mod mock;
pub mod parse;
pub mod plot;
pub mod session;
pub mod stats;
pub mod sweep;
/// Filter control register value.
pub type Code = u8;
/// Highest register value of the production programmer.
pub const MAXREG: Code = 127;
pub use error::SweepError;
pub use instrument::{Analyzer, InstrumentHandle, InstrumentManager, MeasureGuard, Programmer};
pub use mock::{LifecycleCounters, MockAnalyzer, MockProgrammer, ScriptedAnalyzer};
pub use parse::{parse_amplitudes, parse_frequencies, RawMeasurement, SweepPoint};
pub use plot::{render_chart_png, render_response_png, response_bounds, ChartSeries, PlotStyle};
pub use session::{Harmonic, MeasurementSession};
pub use stats::{compute_stats, harmonic_deltas, StatsResult, DEFAULT_CUTOFF_OFFSET_DB};
pub use sweep::{measure_single, MeasureEvent, SweepOutcome, SweepRunner, SweepState, SweepTarget};
