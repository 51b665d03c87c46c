//! Process conditions of a sintering run.

use serde::{Deserialize, Serialize};
use sinter_types::constants::GAS_CONSTANT;
use sinter_types::{SinterError, SinterResult};

/// Thermal schedule of a run: isothermal hold for `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessConditions {
    /// Absolute temperature (K).
    pub temperature: f64,
    /// Simulated time span (s). The run ends at `start + duration`.
    pub duration: f64,
    /// Gas constant (J/(mol·K)).
    #[serde(default = "default_gas_constant")]
    pub gas_constant: f64,
}

fn default_gas_constant() -> f64 {
    GAS_CONSTANT
}

impl ProcessConditions {
    pub fn new(temperature: f64, duration: f64) -> Self {
        Self {
            temperature,
            duration,
            gas_constant: GAS_CONSTANT,
        }
    }

    /// `R·T` in J/mol.
    pub fn thermal_energy(&self) -> f64 {
        self.gas_constant * self.temperature
    }

    /// Checks temperature and gas constant. A negative duration is allowed
    /// and yields a run that records only its initial state.
    pub fn validate(&self) -> SinterResult<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(SinterError::InvalidConfig(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        if !self.gas_constant.is_finite() || self.gas_constant <= 0.0 {
            return Err(SinterError::InvalidConfig(format!(
                "gas constant must be positive, got {}",
                self.gas_constant
            )));
        }
        if !self.duration.is_finite() {
            return Err(SinterError::InvalidConfig(format!(
                "duration must be finite, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

impl Default for ProcessConditions {
    fn default() -> Self {
        Self::new(1600.0, 3600.0)
    }
}
