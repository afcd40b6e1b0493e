//! Authorization gate
//!
//! Every entry point resolves its scope predicate first and only then calls
//! into the engine. A denial returns [`Error::Forbidden`] before any engine
//! call is made, so nothing is written on the denied path.

use crate::error::{Error, Result};
use crate::scope::{Actor, ScopeResolver};
use enrollment_core::{
    CollegeId, CollegeLotteryReport, CourseId, Directory, Engine, Enrollment, EnrollmentLedger,
    EnrollmentStatus, LotteryEngine, LotteryReport, PrerequisiteEvaluator, Score, ScoreBook,
    StudentId, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Scope names carried by `Forbidden`
pub mod scopes {
    /// Edit a course
    pub const MANAGE_COURSE: &str = "manage_course";
    /// Read a course roster
    pub const VIEW_COURSE_ROSTER: &str = "view_course_roster";
    /// Draw one course
    pub const RUN_COURSE_LOTTERY: &str = "run_course_lottery";
    /// Draw a whole college
    pub const RUN_COLLEGE_LOTTERY: &str = "run_college_lottery";
    /// Enter or change scores
    pub const INPUT_SCORE: &str = "input_score";
    /// Read a student's records
    pub const VIEW_STUDENT: &str = "view_student";
    /// Request or withdraw an enrollment
    pub const MANAGE_ENROLLMENT: &str = "manage_enrollment";
    /// Message another principal
    pub const MESSAGE: &str = "message";
}

/// Gated facade over the enrollment engine
pub struct AuthorizationGate {
    scopes: ScopeResolver,
    ledger: Arc<EnrollmentLedger>,
    lottery: Arc<LotteryEngine>,
    prerequisites: Arc<PrerequisiteEvaluator>,
    scores: Arc<ScoreBook>,
}

impl AuthorizationGate {
    /// Wrap an engine; `directory` must be the one the engine was opened with
    pub fn new(directory: Arc<dyn Directory>, engine: &Engine) -> Self {
        Self {
            scopes: ScopeResolver::new(directory, engine.ledger.clone()),
            ledger: engine.ledger.clone(),
            lottery: engine.lottery.clone(),
            prerequisites: engine.prerequisites.clone(),
            scores: engine.scores.clone(),
        }
    }

    /// Underlying resolver, for callers that only need a yes/no answer
    pub fn scopes(&self) -> &ScopeResolver {
        &self.scopes
    }

    fn require(
        &self,
        actor: &Actor,
        allowed: bool,
        resource: impl FnOnce() -> String,
        required_scope: &'static str,
    ) -> Result<()> {
        if allowed {
            return Ok(());
        }

        let resource = resource();
        tracing::warn!(
            "Denied {} on {} for user {} ({:?})",
            required_scope,
            resource,
            actor.user_id,
            actor.role
        );
        Err(Error::Forbidden {
            resource,
            required_scope,
        })
    }

    /// Request a seat in `course_id` for `student_id`
    pub async fn request_enrollment(
        &self,
        actor: &Actor,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Enrollment> {
        let allowed = self
            .scopes
            .can_manage_enrollment(actor, student_id, course_id)
            .await?;
        self.require(
            actor,
            allowed,
            || format!("enrollment {}/{}", student_id, course_id),
            scopes::MANAGE_ENROLLMENT,
        )?;

        Ok(self.ledger.request_enrollment(student_id, course_id).await?)
    }

    /// Withdraw a pending or denied enrollment
    pub async fn withdraw_enrollment(
        &self,
        actor: &Actor,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<()> {
        let allowed = self
            .scopes
            .can_manage_enrollment(actor, student_id, course_id)
            .await?;
        self.require(
            actor,
            allowed,
            || format!("enrollment {}/{}", student_id, course_id),
            scopes::MANAGE_ENROLLMENT,
        )?;

        Ok(self.ledger.withdraw_enrollment(student_id, course_id).await?)
    }

    /// A student's enrollments
    pub async fn list_by_student(&self, actor: &Actor, student_id: StudentId) -> Result<Vec<Enrollment>> {
        let allowed = self.scopes.can_view_student(actor, student_id).await?;
        self.require(
            actor,
            allowed,
            || format!("student {}", student_id),
            scopes::VIEW_STUDENT,
        )?;

        Ok(self.ledger.list_by_student(student_id))
    }

    /// A course's enrollments in request order
    pub async fn list_by_course(&self, actor: &Actor, course_id: CourseId) -> Result<Vec<Enrollment>> {
        self.require_roster(actor, course_id).await?;
        Ok(self.ledger.list_by_course(course_id))
    }

    /// A course's granted enrollments
    pub async fn list_granted_by_course(&self, actor: &Actor, course_id: CourseId) -> Result<Vec<Enrollment>> {
        self.require_roster(actor, course_id).await?;
        Ok(self.ledger.list_granted_by_course(course_id))
    }

    /// Count a course's enrollments in one status
    pub async fn count_by_course_and_status(
        &self,
        actor: &Actor,
        course_id: CourseId,
        status: EnrollmentStatus,
    ) -> Result<usize> {
        self.require_roster(actor, course_id).await?;
        Ok(self.ledger.count_by_course_and_status(course_id, status))
    }

    async fn require_roster(&self, actor: &Actor, course_id: CourseId) -> Result<()> {
        let allowed = self.scopes.can_view_course_roster(actor, course_id).await?;
        self.require(
            actor,
            allowed,
            || format!("course {}", course_id),
            scopes::VIEW_COURSE_ROSTER,
        )
    }

    /// Draw one course
    pub async fn run_lottery(&self, actor: &Actor, course_id: CourseId) -> Result<LotteryReport> {
        let allowed = self.scopes.can_run_course_lottery(actor, course_id).await?;
        self.require(
            actor,
            allowed,
            || format!("course {}", course_id),
            scopes::RUN_COURSE_LOTTERY,
        )?;

        Ok(self.lottery.run_lottery(course_id).await?)
    }

    /// Draw every enabled course of a college
    pub async fn run_college_lottery(
        &self,
        actor: &Actor,
        college_id: CollegeId,
    ) -> Result<CollegeLotteryReport> {
        let allowed = self.scopes.can_run_college_lottery(actor, college_id).await?;
        self.require(
            actor,
            allowed,
            || format!("college {}", college_id),
            scopes::RUN_COLLEGE_LOTTERY,
        )?;

        Ok(self.lottery.run_college_lottery(college_id).await?)
    }

    /// Replace a course's prerequisite list
    pub async fn set_prerequisites(
        &self,
        actor: &Actor,
        course_id: CourseId,
        prerequisite_ids: Vec<CourseId>,
    ) -> Result<()> {
        let allowed = self.scopes.can_manage_course(actor, course_id).await?;
        self.require(
            actor,
            allowed,
            || format!("course {}", course_id),
            scopes::MANAGE_COURSE,
        )?;

        Ok(self
            .prerequisites
            .set_prerequisites(course_id, prerequisite_ids)
            .await?)
    }

    /// Enter a first score for a granted enrollment
    pub async fn record_score(
        &self,
        actor: &Actor,
        student_id: StudentId,
        course_id: CourseId,
        value: Decimal,
    ) -> Result<Score> {
        self.require_score_input(actor, course_id).await?;
        Ok(self.scores.record_score(student_id, course_id, value).await?)
    }

    /// Overwrite an existing score
    pub async fn update_score(
        &self,
        actor: &Actor,
        student_id: StudentId,
        course_id: CourseId,
        value: Decimal,
    ) -> Result<Score> {
        self.require_score_input(actor, course_id).await?;
        Ok(self.scores.update_score(student_id, course_id, value).await?)
    }

    async fn require_score_input(&self, actor: &Actor, course_id: CourseId) -> Result<()> {
        let allowed = self.scopes.can_input_score(actor, course_id).await?;
        self.require(
            actor,
            allowed,
            || format!("course {}", course_id),
            scopes::INPUT_SCORE,
        )
    }

    /// Check that `actor` may message `target`. Delivery is the caller's concern.
    pub async fn authorize_message(&self, actor: &Actor, target: UserId) -> Result<()> {
        let allowed = self.scopes.can_message(actor, target).await?;
        self.require(
            actor,
            allowed,
            || format!("user {}", target),
            scopes::MESSAGE,
        )
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
