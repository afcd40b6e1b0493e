//! Configuration for enrollment and lotteries

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Enrollment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Lottery configuration
    pub lottery: LotteryConfig,

    /// Grading configuration
    pub grading: GradingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "enrollment-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            lottery: LotteryConfig::default(),
            grading: GradingConfig::default(),
        }
    }
}

/// Lottery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryConfig {
    /// Fixed RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,

    /// Upper bound for one course inside a college batch (milliseconds)
    pub course_timeout_ms: u64,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            seed: None,
            course_timeout_ms: 30_000,
        }
    }
}

/// Grading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Lowest score that counts as a pass for prerequisites
    pub pass_mark: Decimal,

    /// Highest score that may be recorded
    pub max_score: Decimal,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            pass_mark: Decimal::from(60),
            max_score: Decimal::from(100),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(seed) = std::env::var("ENROLLMENT_LOTTERY_SEED") {
            let seed = seed
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid lottery seed: {}", e)))?;
            config.lottery.seed = Some(seed);
        }

        if let Ok(timeout) = std::env::var("ENROLLMENT_COURSE_TIMEOUT_MS") {
            config.lottery.course_timeout_ms = timeout
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid course timeout: {}", e)))?;
        }

        if let Ok(pass_mark) = std::env::var("ENROLLMENT_PASS_MARK") {
            config.grading.pass_mark = pass_mark
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid pass mark: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> crate::Result<()> {
        if self.grading.pass_mark < Decimal::ZERO || self.grading.pass_mark > self.grading.max_score {
            return Err(crate::Error::Config(format!(
                "Pass mark {} outside [0, {}]",
                self.grading.pass_mark, self.grading.max_score
            )));
        }
        if self.lottery.course_timeout_ms == 0 {
            return Err(crate::Error::Config(
                "Course timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
