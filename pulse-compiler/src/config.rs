// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How channel phases are referenced.
///
/// `Zero` keeps every registration at its absolute position; `Trigger`
/// re-centers the whole sequence around the primary trigger position so
/// carrier phases are aligned to the trigger instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseAlignment {
    Zero,
    Trigger,
}

/// Injected compiler configuration.
///
/// Never a process-wide singleton: the owning [`Sequence`](crate::Sequence)
/// holds a value and detects out-of-band mutation through the version
/// counter. Every mutation validates; an invalid update is rejected and the
/// prior value retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    sample_rate: f64,
    phase_alignment: PhaseAlignment,
    trigger_delay: i64,
    #[serde(skip)]
    version: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            sample_rate: 2.4e9,
            phase_alignment: PhaseAlignment::Trigger,
            trigger_delay: 0,
            version: 0,
        }
    }
}

impl Configuration {
    pub fn new(
        sample_rate: f64,
        phase_alignment: PhaseAlignment,
        trigger_delay: i64,
    ) -> Result<Self> {
        validate_sample_rate(sample_rate)?;
        validate_trigger_delay(trigger_delay)?;
        Ok(Self {
            sample_rate,
            phase_alignment,
            trigger_delay,
            version: 0,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn phase_alignment(&self) -> PhaseAlignment {
        self.phase_alignment
    }

    pub fn trigger_delay(&self) -> i64 {
        self.trigger_delay
    }

    /// Bumped on every successful mutation; callers compare across calls to
    /// detect configuration changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        validate_sample_rate(sample_rate)?;
        self.sample_rate = sample_rate;
        self.version += 1;
        Ok(())
    }

    pub fn set_phase_alignment(&mut self, phase_alignment: PhaseAlignment) {
        self.phase_alignment = phase_alignment;
        self.version += 1;
    }

    pub fn set_trigger_delay(&mut self, trigger_delay: i64) -> Result<()> {
        validate_trigger_delay(trigger_delay)?;
        self.trigger_delay = trigger_delay;
        self.version += 1;
        Ok(())
    }
}

fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "sampling frequency must be a positive finite number, got {sample_rate}"
        )));
    }
    Ok(())
}

fn validate_trigger_delay(trigger_delay: i64) -> Result<()> {
    if trigger_delay < 0 {
        return Err(Error::InvalidConfiguration(format!(
            "trigger delay must be a non-negative sample count, got {trigger_delay}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.sample_rate(), 2.4e9);
        assert_eq!(config.phase_alignment(), PhaseAlignment::Trigger);
        assert_eq!(config.trigger_delay(), 0);
    }

    #[test]
    fn test_invalid_update_retains_prior_value() {
        let mut config = Configuration::default();
        assert!(config.set_sample_rate(0.0).is_err());
        assert!(config.set_sample_rate(-1.0).is_err());
        assert!(config.set_sample_rate(f64::NAN).is_err());
        assert_eq!(config.sample_rate(), 2.4e9);
        assert_eq!(config.version(), 0);

        assert!(config.set_trigger_delay(-5).is_err());
        assert_eq!(config.trigger_delay(), 0);
    }

    #[test]
    fn test_version_counter() {
        let mut config = Configuration::default();
        config.set_sample_rate(1.8e9).unwrap();
        config.set_phase_alignment(PhaseAlignment::Zero);
        config.set_trigger_delay(32).unwrap();
        assert_eq!(config.version(), 3);
    }
}
