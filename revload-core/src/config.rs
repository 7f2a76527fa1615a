use crate::constants::*;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Load profile has no stages.")]
    EmptyProfile,

    #[error("Load profile has zero total duration.")]
    ZeroDuration,

    #[error("Stage {index} has an invalid target rate {target}.")]
    InvalidTarget { index: usize, target: f64 },

    #[error("Threshold `{name}` must be a rate within [0, 1], got {value}.")]
    InvalidRate { name: &'static str, value: f64 },

    #[error("Latency threshold must be non-zero.")]
    ZeroLatency,

    #[error("Maximum virtual users must be non-zero.")]
    ZeroVus,

    #[error("Base URL is empty.")]
    EmptyBaseUrl,

    #[error("Invalid stage `{0}`, expected `<duration>:<rate>` (e.g. `20s:5`).")]
    StageFormat(String),

    #[error("Invalid stage duration: {0}")]
    StageDuration(#[from] humantime::DurationError),
}

/// One window of the ramp profile.
///
/// The target iteration rate is approached linearly from the previous stage's target over
/// `duration`; a stage with the same target as its predecessor is a hold.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub target: f64,
}

impl Stage {
    pub fn new(duration: Duration, target: f64) -> Self {
        Self { duration, target }
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    /// Parses `20s:5`, `1m30s:7.5`, etc.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::StageFormat(s.to_string()))?;
        let duration = humantime::parse_duration(duration.trim())?;
        let target = target
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::StageFormat(s.to_string()))?;
        Ok(Self { duration, target })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    pub stages: Vec<Stage>,
}

impl Default for LoadProfile {
    /// Warm to 5/s over 20s, hold 30s, ramp to 10/s over 20s, hold 20s.
    fn default() -> Self {
        Self {
            stages: vec![
                Stage::new(Duration::from_secs(20), 5.),
                Stage::new(Duration::from_secs(30), 5.),
                Stage::new(Duration::from_secs(20), 10.),
                Stage::new(Duration::from_secs(20), 10.),
            ],
        }
    }
}

impl LoadProfile {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Target iteration rate at `elapsed`, or `None` once the profile has finished.
    pub fn target_at(&self, elapsed: Duration) -> Option<f64> {
        let mut start_target = 0.;
        let mut remaining = elapsed;
        for stage in &self.stages {
            if remaining < stage.duration {
                let progress = remaining.as_secs_f64() / stage.duration.as_secs_f64();
                return Some(start_target + (stage.target - start_target) * progress);
            }
            remaining -= stage.duration;
            start_target = stage.target;
        }
        None
    }

    /// The index of the stage active at `elapsed`.
    pub fn stage_at(&self, elapsed: Duration) -> Option<usize> {
        let mut end = Duration::ZERO;
        for (idx, stage) in self.stages.iter().enumerate() {
            end += stage.duration;
            if elapsed < end {
                return Some(idx);
            }
        }
        None
    }

    pub fn peak_target(&self) -> f64 {
        self.stages.iter().map(|s| s.target).fold(0., f64::max)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::EmptyProfile);
        }
        if self.total_duration().is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        for (index, stage) in self.stages.iter().enumerate() {
            if !stage.target.is_finite() || stage.target < 0. {
                return Err(ConfigError::InvalidTarget {
                    index,
                    target: stage.target,
                });
            }
        }
        Ok(())
    }
}

/// Pass/fail bounds evaluated once at the end of a run. Every comparison is strict.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub p95_latency: Duration,
    pub max_failed_no_404_rate: f64,
    pub max_real_error_rate: f64,
    pub max_error_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            p95_latency: DEFAULT_LATENCY_BUDGET,
            max_failed_no_404_rate: DEFAULT_MAX_RATE,
            max_real_error_rate: DEFAULT_MAX_RATE,
            max_error_rate: DEFAULT_MAX_RATE,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.p95_latency.is_zero() {
            return Err(ConfigError::ZeroLatency);
        }
        for (name, value) in [
            ("http_req_failed_no_404", self.max_failed_no_404_rate),
            ("real_errors", self.max_real_error_rate),
            ("errors", self.max_error_rate),
        ] {
            if !(0. ..=1.).contains(&value) {
                return Err(ConfigError::InvalidRate { name, value });
            }
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub base_url: String,
    pub profile: LoadProfile,
    pub thresholds: Thresholds,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub iteration_pause: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub graceful_stop: Duration,
    pub max_vus: usize,
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: LoadProfile::default(),
            thresholds: Thresholds::default(),
            iteration_pause: DEFAULT_ITERATION_PAUSE,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            max_vus: DEFAULT_MAX_VUS,
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if self.max_vus == 0 {
            return Err(ConfigError::ZeroVus);
        }
        self.profile.validate()?;
        self.thresholds.validate()
    }
}
