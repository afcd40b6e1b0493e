//! Campus Enrollment Core
//!
//! Enrollment ledger and seat lottery for capacity-limited courses.
//!
//! # Architecture
//!
//! - **Directory**: reference data (colleges, courses, people, scores) behind a trait
//! - **Ledger**: one enrollment per (student, course), Requested → Granted | Denied
//! - **Prerequisites**: evaluated against live scores at request time
//! - **Lottery**: uniform shuffle-and-slice per course, committed atomically
//! - **Scoped locks**: per-pair for requests, per-course for lotteries

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - At most one enrollment per (student, course) pair
//! - Granted enrollments per course never exceed capacity
//! - Granted and Denied are terminal; only Requested records are drawn
//! - `status` and `lottery_outcome` always move together

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod directory;
pub mod locks;
pub mod prerequisite;
pub mod ledger;
pub mod lottery;
pub mod scores;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    College, CollegeId, Course, CourseId, CourseStatus, Enrollment, EnrollmentId,
    EnrollmentStatus, LotteryOutcome, Score, Student, StudentId, Teacher, TeacherId, UserId,
};
pub use directory::{Directory, InMemoryDirectory};
pub use ledger::EnrollmentLedger;
pub use lottery::{CollegeLotteryReport, CourseFailure, LotteryEngine, LotteryReport};
pub use prerequisite::PrerequisiteEvaluator;
pub use scores::ScoreBook;
pub use config::Config;
pub use metrics::Metrics;

use std::sync::Arc;

/// Wired-up enrollment components sharing one directory
#[derive(Debug)]
pub struct Engine {
    /// Enrollment ledger
    pub ledger: Arc<EnrollmentLedger>,

    /// Lottery engine
    pub lottery: Arc<LotteryEngine>,

    /// Prerequisite evaluator (also edits prerequisite lists)
    pub prerequisites: Arc<PrerequisiteEvaluator>,

    /// Score entry
    pub scores: Arc<ScoreBook>,

    /// Metrics
    pub metrics: Metrics,

    /// Configuration
    pub config: Config,
}

impl Engine {
    /// Build all components from configuration
    pub fn open(config: Config, directory: Arc<dyn Directory>) -> Result<Self> {
        config.validate()?;

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        let ledger = Arc::new(EnrollmentLedger::new(
            directory.clone(),
            PrerequisiteEvaluator::new(directory.clone(), config.grading.pass_mark),
            metrics.clone(),
        ));
        let lottery = Arc::new(LotteryEngine::new(ledger.clone(), &config.lottery));
        let prerequisites = Arc::new(PrerequisiteEvaluator::new(
            directory,
            config.grading.pass_mark,
        ));
        let scores = Arc::new(ScoreBook::new(ledger.clone(), config.grading.max_score));

        tracing::info!(
            "{} {} ready (pass mark {})",
            config.service_name,
            config.service_version,
            config.grading.pass_mark
        );

        Ok(Self {
            ledger,
            lottery,
            prerequisites,
            scores,
            metrics,
            config,
        })
    }
}
