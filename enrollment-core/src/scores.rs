//! Score entry
//!
//! A score can only be recorded for a student whose enrollment in the course
//! was granted. Values must lie in `[0, max_score]`. Entry for a pair runs
//! under that pair's lock, so a duplicate first entry is always a `Conflict`.

use crate::{
    ledger::EnrollmentLedger,
    types::{CourseId, EnrollmentStatus, Score, StudentId},
    Error, Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Score book
#[derive(Debug)]
pub struct ScoreBook {
    ledger: Arc<EnrollmentLedger>,
    max_score: Decimal,
}

impl ScoreBook {
    /// Create score book over a ledger
    pub fn new(ledger: Arc<EnrollmentLedger>, max_score: Decimal) -> Self {
        Self { ledger, max_score }
    }

    fn check_range(&self, value: Decimal) -> Result<()> {
        if value < Decimal::ZERO || value > self.max_score {
            return Err(Error::InvalidInput(format!(
                "score {} outside [0, {}]",
                value, self.max_score
            )));
        }
        Ok(())
    }

    /// Record the first score for a student in a course
    pub async fn record_score(&self, student_id: StudentId, course_id: CourseId, value: Decimal) -> Result<Score> {
        self.check_range(value)?;
        let _guard = self.ledger.locks().lock_pair(student_id, course_id).await;

        let directory = self.ledger.directory();
        if directory.student(student_id).await?.is_none() {
            return Err(Error::not_found("student", student_id));
        }
        if directory.course(course_id).await?.is_none() {
            return Err(Error::not_found("course", course_id));
        }

        let enrollment = self.ledger.find(student_id, course_id).ok_or_else(|| {
            Error::not_found("enrollment", format!("student {} / course {}", student_id, course_id))
        })?;
        if enrollment.status() != EnrollmentStatus::Granted {
            return Err(Error::InvalidState(format!(
                "enrollment {} is {}, scores need a granted seat",
                enrollment.id,
                enrollment.status()
            )));
        }

        if directory.score(student_id, course_id).await?.is_some() {
            return Err(Error::Conflict(format!(
                "score already recorded for student {} in course {}",
                student_id, course_id
            )));
        }

        let now = Utc::now();
        let score = Score {
            student_id,
            course_id,
            value,
            created_at: now,
            updated_at: now,
        };
        directory.put_score(score.clone()).await?;
        self.ledger.metrics().scores_recorded_total.inc();
        tracing::info!(
            "Recorded score {} for student {} in course {}",
            value,
            student_id,
            course_id
        );

        Ok(score)
    }

    /// Overwrite an existing score
    pub async fn update_score(&self, student_id: StudentId, course_id: CourseId, value: Decimal) -> Result<Score> {
        self.check_range(value)?;
        let _guard = self.ledger.locks().lock_pair(student_id, course_id).await;

        let directory = self.ledger.directory();
        let mut score = directory
            .score(student_id, course_id)
            .await?
            .ok_or_else(|| Error::not_found("score", format!("student {} / course {}", student_id, course_id)))?;

        let previous = score.value;
        score.value = value;
        score.updated_at = Utc::now();
        directory.put_score(score.clone()).await?;
        self.ledger.metrics().scores_recorded_total.inc();
        tracing::info!(
            "Updated score for student {} in course {}: {} -> {}",
            student_id,
            course_id,
            previous,
            value
        );

        Ok(score)
    }
}
