//! Scope resolution
//!
//! Decides whether an actor's role and organizational membership cover a
//! target. Rules, first match wins:
//!
//! 1. `SystemAdmin` - always
//! 2. `CollegeAdmin(c)` - target owned by college `c`
//! 3. `Teacher(t)` - a course taught by `t`, or a student/enrollment/score in
//!    such a course
//! 4. `Student(s)` - targets about `s` itself, or messaging a teacher of a
//!    course `s` is enrolled in
//! 5. otherwise denied
//!
//! Lookup misses deny (`Ok(false)`). An unreachable directory is reported as
//! `Err(Unavailable)` so callers can retry instead of seeing a spurious denial.

use enrollment_core::{
    CollegeId, Course, CourseId, Directory, EnrollmentLedger, Result, StudentId, TeacherId, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role with the organizational anchor that scopes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Unrestricted
    SystemAdmin,
    /// Administrator of one college
    CollegeAdmin(CollegeId),
    /// Teacher record the actor is linked to
    Teacher(TeacherId),
    /// Student record the actor is linked to
    Student(StudentId),
}

/// Authenticated caller, as supplied by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Authentication principal
    pub user_id: UserId,
    /// Role and scope anchor
    pub role: Role,
}

impl Actor {
    /// Create actor
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Scope resolver
pub struct ScopeResolver {
    directory: Arc<dyn Directory>,
    ledger: Arc<EnrollmentLedger>,
}

impl ScopeResolver {
    /// Create resolver over a directory and the enrollment ledger
    pub fn new(directory: Arc<dyn Directory>, ledger: Arc<EnrollmentLedger>) -> Self {
        Self { directory, ledger }
    }

    /// Shared rule for course-scoped operations
    async fn covers_course(&self, actor: &Actor, course_id: CourseId) -> Result<bool> {
        if actor.role == Role::SystemAdmin {
            return Ok(true);
        }

        let Some(course) = self.directory.course(course_id).await? else {
            return Ok(false);
        };

        Ok(match actor.role {
            Role::SystemAdmin => true,
            Role::CollegeAdmin(college_id) => course.college_id == college_id,
            Role::Teacher(teacher_id) => course.teacher_id == teacher_id,
            Role::Student(_) => false,
        })
    }

    /// Whether `student_id` has an enrollment in any course taught by `teacher_id`
    async fn teaches_student(&self, teacher_id: TeacherId, student_id: StudentId) -> Result<bool> {
        let courses: Vec<Course> = self.directory.courses_by_teacher(teacher_id).await?;
        Ok(courses
            .iter()
            .any(|course| self.ledger.find(student_id, course.id).is_some()))
    }

    /// Edit a course (capacity, teacher, prerequisites)
    pub async fn can_manage_course(&self, actor: &Actor, course_id: CourseId) -> Result<bool> {
        self.covers_course(actor, course_id).await
    }

    /// List a course's enrollments
    pub async fn can_view_course_roster(&self, actor: &Actor, course_id: CourseId) -> Result<bool> {
        self.covers_course(actor, course_id).await
    }

    /// Draw the lottery for one course
    pub async fn can_run_course_lottery(&self, actor: &Actor, course_id: CourseId) -> Result<bool> {
        self.covers_course(actor, course_id).await
    }

    /// Enter or change scores for a course
    pub async fn can_input_score(&self, actor: &Actor, course_id: CourseId) -> Result<bool> {
        self.covers_course(actor, course_id).await
    }

    /// Draw the lottery for every course of a college
    pub async fn can_run_college_lottery(&self, actor: &Actor, college_id: CollegeId) -> Result<bool> {
        match actor.role {
            Role::SystemAdmin => Ok(true),
            Role::CollegeAdmin(own) => {
                Ok(own == college_id && self.directory.college(college_id).await?.is_some())
            }
            Role::Teacher(_) | Role::Student(_) => Ok(false),
        }
    }

    /// Read a student's record, enrollments or scores
    pub async fn can_view_student(&self, actor: &Actor, student_id: StudentId) -> Result<bool> {
        match actor.role {
            Role::SystemAdmin => Ok(true),
            Role::CollegeAdmin(college_id) => Ok(self
                .directory
                .student(student_id)
                .await?
                .is_some_and(|s| s.college_id == college_id)),
            Role::Teacher(teacher_id) => {
                if self.directory.student(student_id).await?.is_none() {
                    return Ok(false);
                }
                self.teaches_student(teacher_id, student_id).await
            }
            Role::Student(own) => Ok(own == student_id),
        }
    }

    /// Request or withdraw an enrollment of `student_id` in `course_id`.
    ///
    /// A college admin needs both the student and the course in its college.
    pub async fn can_manage_enrollment(
        &self,
        actor: &Actor,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool> {
        if actor.role == Role::SystemAdmin {
            return Ok(true);
        }

        let Some(student) = self.directory.student(student_id).await? else {
            return Ok(false);
        };
        let Some(course) = self.directory.course(course_id).await? else {
            return Ok(false);
        };

        Ok(match actor.role {
            Role::SystemAdmin => true,
            Role::CollegeAdmin(college_id) => {
                student.college_id == college_id && course.college_id == college_id
            }
            Role::Teacher(teacher_id) => course.teacher_id == teacher_id,
            Role::Student(own) => own == student.id,
        })
    }

    /// Send a message to another principal
    pub async fn can_message(&self, actor: &Actor, target: UserId) -> Result<bool> {
        match actor.role {
            Role::SystemAdmin => Ok(true),
            Role::CollegeAdmin(college_id) => {
                if let Some(teacher) = self.directory.teacher_by_user(target).await? {
                    return Ok(teacher.college_id == college_id);
                }
                Ok(self
                    .directory
                    .student_by_user(target)
                    .await?
                    .is_some_and(|s| s.college_id == college_id))
            }
            Role::Teacher(teacher_id) => match self.directory.student_by_user(target).await? {
                Some(student) => self.teaches_student(teacher_id, student.id).await,
                None => Ok(false),
            },
            Role::Student(student_id) => match self.directory.teacher_by_user(target).await? {
                Some(teacher) => self.teaches_student(teacher.id, student_id).await,
                None => Ok(false),
            },
        }
    }
}

impl std::fmt::Debug for ScopeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolver").finish_non_exhaustive()
    }
}
