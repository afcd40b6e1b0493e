//! Enrollment ledger
//!
//! Owns the set of enrollment records and their state transitions. Requests
//! and withdrawals are serialized per (student, course) pair; lottery
//! outcomes arrive through [`EnrollmentLedger::commit_lottery_outcome`],
//! which only the lottery engine calls.
//!
//! # Example
//!
//! ```no_run
//! use enrollment_core::{Config, Engine, InMemoryDirectory};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> enrollment_core::Result<()> {
//!     let directory = Arc::new(InMemoryDirectory::new());
//!     let engine = Engine::open(Config::default(), directory)?;
//!
//!     // let enrollment = engine.ledger.request_enrollment(student_id, course_id).await?;
//!     // let outcome = engine.lottery.run_lottery(course_id).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    directory::Directory,
    locks::LockTable,
    metrics::Metrics,
    prerequisite::PrerequisiteEvaluator,
    storage::EnrollmentStore,
    types::{CourseId, Enrollment, EnrollmentId, EnrollmentStatus, StudentId},
    Error, Result,
};
use std::sync::Arc;

/// Enrollment ledger
pub struct EnrollmentLedger {
    /// Reference data
    directory: Arc<dyn Directory>,

    /// Enrollment records
    store: EnrollmentStore,

    /// Per-pair and per-course exclusion
    locks: LockTable,

    /// Prerequisite checks for new requests
    prerequisites: PrerequisiteEvaluator,

    /// Counters
    metrics: Metrics,
}

impl EnrollmentLedger {
    /// Create ledger over a directory
    pub fn new(directory: Arc<dyn Directory>, prerequisites: PrerequisiteEvaluator, metrics: Metrics) -> Self {
        Self {
            directory,
            store: EnrollmentStore::new(),
            locks: LockTable::new(),
            prerequisites,
            metrics,
        }
    }

    /// Request a seat for a student in a course.
    ///
    /// Checks, in order: student exists, course exists, course enabled, no
    /// record for the pair, prerequisites satisfied. Creates a
    /// Requested/Pending enrollment.
    pub async fn request_enrollment(&self, student_id: StudentId, course_id: CourseId) -> Result<Enrollment> {
        let _guard = self.locks.lock_pair(student_id, course_id).await;

        let student = self
            .directory
            .student(student_id)
            .await?
            .ok_or_else(|| Error::not_found("student", student_id))?;
        let course = self
            .directory
            .course(course_id)
            .await?
            .ok_or_else(|| Error::not_found("course", course_id))?;

        if !course.is_enabled() {
            return Err(Error::InvalidState(format!(
                "course {} is disabled",
                course.code
            )));
        }

        if let Some(existing) = self.store.get_by_pair(student_id, course_id) {
            return Err(Error::Conflict(format!(
                "student {} already has enrollment {} in course {}",
                student.student_no, existing.id, course.code
            )));
        }

        if !self.prerequisites.is_satisfied_for(student_id, &course).await? {
            return Err(Error::PrerequisiteUnmet {
                course_id: course_id.to_string(),
            });
        }

        let enrollment = self.store.insert_requested(student_id, course_id)?;
        self.metrics.requests_total.inc();
        tracing::info!(
            "Student {} requested course {} (enrollment {})",
            student.student_no,
            course.code,
            enrollment.id
        );

        Ok(enrollment)
    }

    /// Withdraw a request. Granted enrollments are terminal and stay put.
    pub async fn withdraw_enrollment(&self, student_id: StudentId, course_id: CourseId) -> Result<()> {
        let _guard = self.locks.lock_pair(student_id, course_id).await;

        let removed = self.store.remove_unless_granted(student_id, course_id)?;
        self.metrics.withdrawals_total.inc();
        tracing::info!(
            "Withdrew enrollment {}: student {} / course {}",
            removed.id,
            student_id,
            course_id
        );

        Ok(())
    }

    /// Get the enrollment for a pair, if any
    pub fn find(&self, student_id: StudentId, course_id: CourseId) -> Option<Enrollment> {
        self.store.get_by_pair(student_id, course_id)
    }

    /// Get enrollment by id
    pub fn get(&self, id: EnrollmentId) -> Result<Enrollment> {
        self.store.get(id)
    }

    /// All enrollments of a student, in creation order
    pub fn list_by_student(&self, student_id: StudentId) -> Vec<Enrollment> {
        self.store.list_by_student(student_id)
    }

    /// All enrollments for a course, in creation order
    pub fn list_by_course(&self, course_id: CourseId) -> Vec<Enrollment> {
        self.store.list_by_course(course_id)
    }

    /// Granted enrollments for a course
    pub fn list_granted_by_course(&self, course_id: CourseId) -> Vec<Enrollment> {
        self.store
            .list_by_course_and_status(course_id, EnrollmentStatus::Granted)
    }

    /// Requested enrollments for a course (the lottery's pending set)
    pub fn list_pending_by_course(&self, course_id: CourseId) -> Vec<Enrollment> {
        self.store
            .list_by_course_and_status(course_id, EnrollmentStatus::Requested)
    }

    /// Count enrollments for a course in a given status
    pub fn count_by_course_and_status(&self, course_id: CourseId, status: EnrollmentStatus) -> usize {
        self.store.count_by_course_and_status(course_id, status)
    }

    /// Atomically move Requested enrollments of a course to Granted / Denied.
    ///
    /// Fails with `InvalidState` if any id is not a Requested enrollment of
    /// this course, or if the grants would exceed `capacity`.
    pub(crate) fn commit_lottery_outcome(
        &self,
        course_id: CourseId,
        capacity: u32,
        granted: &[EnrollmentId],
        denied: &[EnrollmentId],
    ) -> Result<()> {
        self.store.commit_outcome(course_id, capacity, granted, denied)?;
        self.metrics.record_lottery(granted.len(), denied.len());
        Ok(())
    }

    pub(crate) fn locks(&self) -> &LockTable {
        &self.locks
    }

    pub(crate) fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl std::fmt::Debug for EnrollmentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentLedger")
            .field("store", &self.store)
            .field("prerequisites", &self.prerequisites)
            .finish_non_exhaustive()
    }
}
