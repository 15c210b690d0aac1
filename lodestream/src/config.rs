use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Scheduler configuration, deserializable from JSON. Every field defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrency cap of the Download pool; kept low to bound outstanding
    /// network connections.
    pub download_slots: usize,
    /// Concurrency cap of the Load pool; near available parallelism.
    pub load_slots: usize,
    pub strategy: StrategyConfig,
    pub cadence: CadenceConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            download_slots: 4,
            load_slots: std::thread::available_parallelism().map_or(2, |n| n.get()),
            strategy: StrategyConfig::default(),
            cadence: CadenceConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::ConfigValidation(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that parse but cannot run.
    pub fn validate(&self) -> Result<(), Error> {
        self.cadence.validate()
    }
}

/// Selects a scoring strategy by name. The `weighted` strategy additionally
/// requires a flat metric-name to weight map covering the exact key set.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "fixed".to_owned(),
            weights: None,
        }
    }
}

/// Adaptive poll cadence: a tick that took `T` schedules the next one after
/// `clamp(T * backoff, min, max)`, so the scheduler self-throttles under
/// load without starving dispatch when idle.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: f64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 100,
            max_delay_ms: 1000,
            backoff: 2.0,
        }
    }
}

impl CadenceConfig {
    /// An inverted delay range or degenerate backoff would make
    /// [`CadenceConfig::delay_after`] panic on the first tick.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(Error::ConfigValidation(format!(
                "cadence min_delay_ms {} exceeds max_delay_ms {}",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if !self.backoff.is_finite() || self.backoff <= 0.0 {
            return Err(Error::ConfigValidation(format!(
                "cadence backoff must be finite and positive, got {}",
                self.backoff
            )));
        }
        Ok(())
    }

    pub fn delay_after(&self, elapsed: Duration) -> Duration {
        let scaled = elapsed.as_secs_f64() * self.backoff * 1000.0;
        Duration::from_millis((scaled as u64).clamp(self.min_delay_ms, self.max_delay_ms))
    }
}
