use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::drivers::{Code, Harmonic, SweepError, DEFAULT_CUTOFF_OFFSET_DB, MAXREG};
use crate::types::ConnectionMode;
pub const DEFAULT_ANALYZER_ADDRESS: &str = "TCPIP::192.168.0.3::INSTR";
static ANALYZER_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    let octet = r"([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])";
    Regex::new(&format!(r"^TCPIP::({octet}\.){{3}}{octet}::INSTR$"))
        .expect("analyzer address pattern is valid")
});
pub fn validate_analyzer_address(address: &str) -> Result<(), SweepError> {
    if ANALYZER_ADDRESS.is_match(address) {
        Ok(())
    } else {
        Err(SweepError::InvalidAddress(address.to_owned()))
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Cutoff level relative to the global peak, in dB.
    pub cutoff_offset_db: f64,
    pub harmonic: u8,
    pub code: Code,
    pub max_code: Code,
    /// The simulated backend only sweeps `0..=mock_max_code`.
    pub mock_max_code: Code,
    pub settle_ms: u64,
    pub analyzer_address: String,
    pub mode: ConnectionMode,
    pub export_dir: PathBuf,
    pub image_dir: PathBuf,
}
impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            cutoff_offset_db: DEFAULT_CUTOFF_OFFSET_DB,
            harmonic: 2,
            code: 0,
            max_code: MAXREG,
            mock_max_code: 4,
            settle_ms: 700,
            analyzer_address: DEFAULT_ANALYZER_ADDRESS.to_owned(),
            mode: ConnectionMode::Simulation,
            export_dir: PathBuf::from("excel"),
            image_dir: PathBuf::from("image"),
        }
    }
}
impl MeasureConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<(), SweepError> {
        validate_analyzer_address(&self.analyzer_address)?;
        Harmonic::try_from(self.harmonic)?;
        if self.code > self.effective_max_code() {
            return Err(SweepError::CodeOutOfRange {
                code: self.code,
                max: self.effective_max_code(),
            });
        }
        Ok(())
    }
    /// Last code swept for the configured connection mode.
    pub fn effective_max_code(&self) -> Code {
        match self.mode {
            ConnectionMode::Simulation => self.mock_max_code.min(self.max_code),
            ConnectionMode::Hardware => self.max_code,
        }
    }
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn address_pattern_accepts_dotted_quads_only() {
        assert!(validate_analyzer_address("TCPIP::192.168.0.3::INSTR").is_ok());
        assert!(validate_analyzer_address("TCPIP::255.0.10.199::INSTR").is_ok());
        for bad in [
            "TCPIP::256.1.1.1::INSTR",
            "TCPIP::192.168.0::INSTR",
            "TCPIP::192.168.00.3::INSTR",
            "192.168.0.3",
            "TCPIP::192.168.0.3::INSTR ",
        ] {
            assert!(
                matches!(validate_analyzer_address(bad), Err(SweepError::InvalidAddress(_))),
                "{bad} should be rejected"
            );
        }
    }
    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: MeasureConfig =
            serde_json::from_str(r#"{"cutoff_offset_db": -3.0, "mode": "Hardware"}"#).unwrap();
        assert_eq!(config.cutoff_offset_db, -3.0);
        assert_eq!(config.mode, ConnectionMode::Hardware);
        assert_eq!(config.settle_ms, 700);
        assert_eq!(config.effective_max_code(), MAXREG);
    }
    #[test]
    fn simulation_sweeps_reduced_range() {
        let config = MeasureConfig::default();
        assert_eq!(config.effective_max_code(), 4);
        assert!(config.validate().is_ok());
    }
    #[test]
    fn out_of_range_code_and_harmonic_are_rejected() {
        let config = MeasureConfig {
            code: 9,
            ..MeasureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SweepError::CodeOutOfRange { code: 9, max: 4 })
        ));
        let config = MeasureConfig {
            harmonic: 5,
            ..MeasureConfig::default()
        };
        assert!(matches!(config.validate(), Err(SweepError::InvalidHarmonic(5))));
    }
    #[test]
    fn load_reads_json_file() {
        let path = std::env::temp_dir().join(format!("lpf-sweep-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"settle_ms": 0, "harmonic": 3}"#).unwrap();
        let config = MeasureConfig::load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config.settle(), Duration::ZERO);
        assert_eq!(config.harmonic, 3);
    }
}
