//! Seat lottery
//!
//! A lottery resolves a course's pending requests into grants and denials:
//!
//! 1. **Snapshot**: take the course lock, load the course and its Requested
//!    enrollments
//! 2. **Seats**: `capacity - granted`, clamped at zero
//! 3. **Partition**: one uniform shuffle; the first `seats` entries win
//! 4. **Commit**: a single atomic transition of every pending record
//!
//! Granted and Denied records are never revisited, so re-running a lottery
//! with nothing pending is a no-op.

use crate::{
    config::LotteryConfig,
    ledger::EnrollmentLedger,
    types::{CollegeId, CourseId, Enrollment, EnrollmentId, EnrollmentStatus},
    Error, Result,
};
use parking_lot::Mutex;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Duration;

/// Split `pending` into `(granted, denied)` with at most `seats` grants.
///
/// Every permutation of `pending` is equally likely, so each entry wins with
/// probability `min(seats, n) / n`.
pub fn partition<T, R: Rng + ?Sized>(mut pending: Vec<T>, seats: usize, rng: &mut R) -> (Vec<T>, Vec<T>) {
    pending.shuffle(rng);
    let cut = seats.min(pending.len());
    let denied = pending.split_off(cut);
    (pending, denied)
}

/// Result of one course lottery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryReport {
    /// Course
    pub course_id: CourseId,
    /// Course capacity
    pub capacity: u32,
    /// Seats that were open before this run
    pub available_seats: u32,
    /// Enrollments granted by this run
    pub granted: Vec<EnrollmentId>,
    /// Enrollments denied by this run
    pub denied: Vec<EnrollmentId>,
}

impl LotteryReport {
    /// Whether this run changed anything
    pub fn is_noop(&self) -> bool {
        self.granted.is_empty() && self.denied.is_empty()
    }
}

/// A course that failed inside a college batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseFailure {
    /// Course
    pub course_id: CourseId,
    /// Course code
    pub course_code: String,
    /// Stable error code
    pub code: String,
    /// Error message
    pub message: String,
}

/// Result of a college batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollegeLotteryReport {
    /// College
    pub college_id: CollegeId,
    /// Courses that completed
    pub completed: Vec<LotteryReport>,
    /// Courses that failed
    pub failures: Vec<CourseFailure>,
}

impl CollegeLotteryReport {
    /// Whether every course completed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lottery engine
pub struct LotteryEngine {
    ledger: Arc<EnrollmentLedger>,
    rng: Mutex<StdRng>,
    course_timeout: Duration,
}

impl LotteryEngine {
    /// Create engine over a ledger
    pub fn new(ledger: Arc<EnrollmentLedger>, config: &LotteryConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            ledger,
            rng: Mutex::new(rng),
            course_timeout: Duration::from_millis(config.course_timeout_ms),
        }
    }

    /// Run the lottery for one course
    pub async fn run_lottery(&self, course_id: CourseId) -> Result<LotteryReport> {
        let _guard = self.ledger.locks().lock_course(course_id).await;

        let course = self
            .ledger
            .directory()
            .course(course_id)
            .await?
            .ok_or_else(|| Error::not_found("course", course_id))?;

        let pending: Vec<Enrollment> = self.ledger.list_pending_by_course(course_id);
        let already_granted = self
            .ledger
            .count_by_course_and_status(course_id, EnrollmentStatus::Granted);
        let available_seats = (course.capacity as usize).saturating_sub(already_granted);

        if pending.is_empty() {
            tracing::info!("Course {} has no pending requests", course.code);
            return Ok(LotteryReport {
                course_id,
                capacity: course.capacity,
                available_seats: available_seats as u32,
                granted: vec![],
                denied: vec![],
            });
        }

        let ids: Vec<EnrollmentId> = pending.iter().map(|e| e.id).collect();
        let (granted, denied) = {
            let mut rng = self.rng.lock();
            partition(ids, available_seats, &mut *rng)
        };

        self.ledger
            .commit_lottery_outcome(course_id, course.capacity, &granted, &denied)?;

        tracing::info!(
            "Lottery for course {} complete: {} granted, {} denied ({} seats open)",
            course.code,
            granted.len(),
            denied.len(),
            available_seats
        );

        Ok(LotteryReport {
            course_id,
            capacity: course.capacity,
            available_seats: available_seats as u32,
            granted,
            denied,
        })
    }

    /// Run the lottery for every enabled course of a college.
    ///
    /// Courses are processed independently; a failure or timeout on one is
    /// recorded in the report and the batch moves on. Only a failure to list
    /// the college's courses fails the whole call.
    pub async fn run_college_lottery(&self, college_id: CollegeId) -> Result<CollegeLotteryReport> {
        let courses = self
            .ledger
            .directory()
            .courses_by_college(college_id)
            .await?;

        let mut report = CollegeLotteryReport {
            college_id,
            completed: Vec::new(),
            failures: Vec::new(),
        };

        for course in courses.into_iter().filter(|c| c.is_enabled()) {
            let outcome = tokio::time::timeout(self.course_timeout, self.run_lottery(course.id))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Unavailable(format!(
                        "lottery timed out after {:?}",
                        self.course_timeout
                    )))
                });

            match outcome {
                Ok(course_report) => report.completed.push(course_report),
                Err(e) => {
                    tracing::error!("Lottery for course {} failed: {}", course.code, e);
                    report.failures.push(CourseFailure {
                        course_id: course.id,
                        course_code: course.code.clone(),
                        code: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "College {} lottery batch complete: {} courses drawn, {} failed",
            college_id,
            report.completed.len(),
            report.failures.len()
        );

        Ok(report)
    }
}

impl std::fmt::Debug for LotteryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotteryEngine")
            .field("course_timeout", &self.course_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::metrics::Metrics;
    use crate::prerequisite::PrerequisiteEvaluator;
    use crate::types::{Course, CourseStatus, Student, StudentId, TeacherId, UserId};
    use rust_decimal::Decimal;

    struct Fixture {
        directory: Arc<InMemoryDirectory>,
        ledger: Arc<EnrollmentLedger>,
        engine: LotteryEngine,
        college: CollegeId,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        let evaluator = PrerequisiteEvaluator::new(directory.clone(), Decimal::from(60));
        let ledger = Arc::new(EnrollmentLedger::new(
            directory.clone(),
            evaluator,
            Metrics::new().unwrap(),
        ));
        let config = LotteryConfig {
            seed: Some(42),
            course_timeout_ms: 1_000,
        };
        Fixture {
            directory,
            engine: LotteryEngine::new(ledger.clone(), &config),
            ledger,
            college: CollegeId::new(),
        }
    }

    impl Fixture {
        fn course(&self, capacity: u32, status: CourseStatus) -> CourseId {
            let id = CourseId::new();
            self.directory.insert_course(Course {
                id,
                code: format!("C-{}", id),
                name: "Course".to_string(),
                credits: 3,
                capacity,
                status,
                college_id: self.college,
                teacher_id: TeacherId::new(),
                prerequisites: vec![],
            });
            id
        }

        async fn enroll(&self, course: CourseId, count: usize) {
            for _ in 0..count {
                let id = StudentId::new();
                self.directory.insert_student(Student {
                    id,
                    student_no: format!("S-{}", id),
                    college_id: self.college,
                    user_id: UserId::new(),
                });
                self.ledger.request_enrollment(id, course).await.unwrap();
            }
        }

        fn count(&self, course: CourseId, status: EnrollmentStatus) -> usize {
            self.ledger.count_by_course_and_status(course, status)
        }
    }

    #[test]
    fn test_partition_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let (granted, denied) = partition((0..5).collect::<Vec<_>>(), 2, &mut rng);
        assert_eq!(granted.len(), 2);
        assert_eq!(denied.len(), 3);

        let (granted, denied) = partition((0..3).collect::<Vec<_>>(), 10, &mut rng);
        assert_eq!(granted.len(), 3);
        assert!(denied.is_empty());

        let (granted, denied) = partition((0..3).collect::<Vec<_>>(), 0, &mut rng);
        assert!(granted.is_empty());
        assert_eq!(denied.len(), 3);
    }

    #[tokio::test]
    async fn test_oversubscribed_course() {
        let fx = fixture();
        let course = fx.course(2, CourseStatus::Enabled);
        fx.enroll(course, 5).await;

        let report = fx.engine.run_lottery(course).await.unwrap();
        assert_eq!(report.granted.len(), 2);
        assert_eq!(report.denied.len(), 3);
        assert_eq!(fx.count(course, EnrollmentStatus::Requested), 0);
        assert_eq!(fx.count(course, EnrollmentStatus::Granted), 2);

        // Nothing left to draw
        let rerun = fx.engine.run_lottery(course).await.unwrap();
        assert!(rerun.is_noop());
        assert_eq!(fx.count(course, EnrollmentStatus::Granted), 2);
        assert_eq!(fx.count(course, EnrollmentStatus::Denied), 3);
    }

    #[tokio::test]
    async fn test_partial_rerun_respects_existing_grants() {
        let fx = fixture();
        let course = fx.course(3, CourseStatus::Enabled);
        fx.enroll(course, 2).await;
        fx.engine.run_lottery(course).await.unwrap();
        assert_eq!(fx.count(course, EnrollmentStatus::Granted), 2);

        fx.enroll(course, 4).await;
        let report = fx.engine.run_lottery(course).await.unwrap();
        assert_eq!(report.available_seats, 1);
        assert_eq!(report.granted.len(), 1);
        assert_eq!(report.denied.len(), 3);
        assert_eq!(fx.count(course, EnrollmentStatus::Granted), 3);
    }

    #[tokio::test]
    async fn test_full_course_denies_everyone() {
        let fx = fixture();
        let course = fx.course(1, CourseStatus::Enabled);
        fx.enroll(course, 1).await;
        fx.engine.run_lottery(course).await.unwrap();

        fx.enroll(course, 3).await;
        let report = fx.engine.run_lottery(course).await.unwrap();
        assert_eq!(report.available_seats, 0);
        assert!(report.granted.is_empty());
        assert_eq!(report.denied.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_course() {
        let fx = fixture();
        let err = fx.engine.run_lottery(CourseId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_college_batch_skips_disabled_courses() {
        let fx = fixture();
        let a = fx.course(1, CourseStatus::Enabled);
        let b = fx.course(5, CourseStatus::Enabled);
        let closed = fx.course(1, CourseStatus::Disabled);
        fx.enroll(a, 3).await;
        fx.enroll(b, 2).await;

        let report = fx.engine.run_college_lottery(fx.college).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.completed.len(), 2);
        assert!(report.completed.iter().all(|r| r.course_id != closed));
        assert_eq!(fx.count(a, EnrollmentStatus::Granted), 1);
        assert_eq!(fx.count(b, EnrollmentStatus::Granted), 2);
    }

    #[tokio::test]
    async fn test_college_batch_collects_failures() {
        let fx = fixture();
        let a = fx.course(1, CourseStatus::Enabled);
        let b = fx.course(1, CourseStatus::Enabled);
        fx.enroll(a, 2).await;
        fx.enroll(b, 2).await;

        // Hold course `a` so its lottery cannot start in time
        let _held = fx.ledger.locks().lock_course(a).await;
        let config = LotteryConfig {
            seed: Some(7),
            course_timeout_ms: 20,
        };
        let engine = LotteryEngine::new(fx.ledger.clone(), &config);

        let report = engine.run_college_lottery(fx.college).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].course_id, a);
        assert_eq!(report.failures[0].code, "unavailable");
        assert_eq!(report.completed.len(), 1);
        assert_eq!(fx.count(a, EnrollmentStatus::Requested), 2);
        assert_eq!(fx.count(b, EnrollmentStatus::Granted), 1);
    }
}
