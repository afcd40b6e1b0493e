//! Directory contract for reference data
//!
//! Colleges, courses, teachers, students and scores are owned by an external
//! store. The enrollment core only reads them, except for course
//! prerequisites and score entry, which go through [`Directory::set_prerequisites`]
//! and [`Directory::put_score`].

use crate::{
    types::{College, CollegeId, Course, CourseId, Score, Student, StudentId, Teacher, TeacherId, UserId},
    Error, Result,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lookups the core performs against the reference-data store.
///
/// Lookups return `Ok(None)` for a miss and `Err(Error::Unavailable)` when
/// the backend cannot be reached.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Get college by id
    async fn college(&self, id: CollegeId) -> Result<Option<College>>;

    /// Get course by id
    async fn course(&self, id: CourseId) -> Result<Option<Course>>;

    /// Get teacher by id
    async fn teacher(&self, id: TeacherId) -> Result<Option<Teacher>>;

    /// Get student by id
    async fn student(&self, id: StudentId) -> Result<Option<Student>>;

    /// Get the recorded score for a student in a course
    async fn score(&self, student_id: StudentId, course_id: CourseId) -> Result<Option<Score>>;

    /// Resolve the teacher linked to an authentication principal
    async fn teacher_by_user(&self, user_id: UserId) -> Result<Option<Teacher>>;

    /// Resolve the student linked to an authentication principal
    async fn student_by_user(&self, user_id: UserId) -> Result<Option<Student>>;

    /// All courses taught by a teacher
    async fn courses_by_teacher(&self, teacher_id: TeacherId) -> Result<Vec<Course>>;

    /// All courses owned by a college
    async fn courses_by_college(&self, college_id: CollegeId) -> Result<Vec<Course>>;

    /// Replace a course's prerequisite list
    async fn set_prerequisites(&self, course_id: CourseId, prerequisites: Vec<CourseId>) -> Result<()>;

    /// Insert or overwrite a score
    async fn put_score(&self, score: Score) -> Result<()>;
}

/// In-memory directory backed by concurrent maps.
///
/// Used for embedding and tests. [`InMemoryDirectory::set_offline`] makes
/// every call fail with `Unavailable`.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    colleges: DashMap<CollegeId, College>,
    courses: DashMap<CourseId, Course>,
    teachers: DashMap<TeacherId, Teacher>,
    students: DashMap<StudentId, Student>,
    scores: DashMap<(StudentId, CourseId), Score>,
    teachers_by_user: DashMap<UserId, TeacherId>,
    students_by_user: DashMap<UserId, StudentId>,
    offline: AtomicBool,
}

impl InMemoryDirectory {
    /// Create empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a college
    pub fn insert_college(&self, college: College) {
        self.colleges.insert(college.id, college);
    }

    /// Insert or replace a course
    pub fn insert_course(&self, course: Course) {
        self.courses.insert(course.id, course);
    }

    /// Insert or replace a teacher
    pub fn insert_teacher(&self, teacher: Teacher) {
        self.teachers_by_user.insert(teacher.user_id, teacher.id);
        self.teachers.insert(teacher.id, teacher);
    }

    /// Insert or replace a student
    pub fn insert_student(&self, student: Student) {
        self.students_by_user.insert(student.user_id, student.id);
        self.students.insert(student.id, student);
    }

    /// Insert or replace a score
    pub fn insert_score(&self, score: Score) {
        self.scores.insert((score.student_id, score.course_id), score);
    }

    /// Remove a course
    pub fn remove_course(&self, id: CourseId) {
        self.courses.remove(&id);
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("directory offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn college(&self, id: CollegeId) -> Result<Option<College>> {
        self.ensure_online()?;
        Ok(self.colleges.get(&id).map(|c| c.value().clone()))
    }

    async fn course(&self, id: CourseId) -> Result<Option<Course>> {
        self.ensure_online()?;
        Ok(self.courses.get(&id).map(|c| c.value().clone()))
    }

    async fn teacher(&self, id: TeacherId) -> Result<Option<Teacher>> {
        self.ensure_online()?;
        Ok(self.teachers.get(&id).map(|t| t.value().clone()))
    }

    async fn student(&self, id: StudentId) -> Result<Option<Student>> {
        self.ensure_online()?;
        Ok(self.students.get(&id).map(|s| s.value().clone()))
    }

    async fn score(&self, student_id: StudentId, course_id: CourseId) -> Result<Option<Score>> {
        self.ensure_online()?;
        Ok(self
            .scores
            .get(&(student_id, course_id))
            .map(|s| s.value().clone()))
    }

    async fn teacher_by_user(&self, user_id: UserId) -> Result<Option<Teacher>> {
        self.ensure_online()?;
        Ok(self
            .teachers_by_user
            .get(&user_id)
            .and_then(|id| self.teachers.get(id.value()).map(|t| t.value().clone())))
    }

    async fn student_by_user(&self, user_id: UserId) -> Result<Option<Student>> {
        self.ensure_online()?;
        Ok(self
            .students_by_user
            .get(&user_id)
            .and_then(|id| self.students.get(id.value()).map(|s| s.value().clone())))
    }

    async fn courses_by_teacher(&self, teacher_id: TeacherId) -> Result<Vec<Course>> {
        self.ensure_online()?;
        let mut courses: Vec<Course> = self
            .courses
            .iter()
            .filter(|c| c.value().teacher_id == teacher_id)
            .map(|c| c.value().clone())
            .collect();
        courses.sort_by_key(|c| c.id);
        Ok(courses)
    }

    async fn courses_by_college(&self, college_id: CollegeId) -> Result<Vec<Course>> {
        self.ensure_online()?;
        let mut courses: Vec<Course> = self
            .courses
            .iter()
            .filter(|c| c.value().college_id == college_id)
            .map(|c| c.value().clone())
            .collect();
        courses.sort_by_key(|c| c.id);
        Ok(courses)
    }

    async fn set_prerequisites(&self, course_id: CourseId, prerequisites: Vec<CourseId>) -> Result<()> {
        self.ensure_online()?;
        let mut course = self
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| Error::not_found("course", course_id))?;
        course.prerequisites = prerequisites;
        Ok(())
    }

    async fn put_score(&self, score: Score) -> Result<()> {
        self.ensure_online()?;
        self.insert_score(score);
        Ok(())
    }
}

/// Directory that yields to the scheduler before every call, so concurrent
/// tasks interleave at each await point
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    pub(crate) struct YieldingDirectory(pub(crate) Arc<InMemoryDirectory>);

    #[async_trait]
    impl Directory for YieldingDirectory {
        async fn college(&self, id: CollegeId) -> Result<Option<College>> {
            tokio::task::yield_now().await;
            self.0.college(id).await
        }

        async fn course(&self, id: CourseId) -> Result<Option<Course>> {
            tokio::task::yield_now().await;
            self.0.course(id).await
        }

        async fn teacher(&self, id: TeacherId) -> Result<Option<Teacher>> {
            tokio::task::yield_now().await;
            self.0.teacher(id).await
        }

        async fn student(&self, id: StudentId) -> Result<Option<Student>> {
            tokio::task::yield_now().await;
            self.0.student(id).await
        }

        async fn score(&self, student_id: StudentId, course_id: CourseId) -> Result<Option<Score>> {
            tokio::task::yield_now().await;
            self.0.score(student_id, course_id).await
        }

        async fn teacher_by_user(&self, user_id: UserId) -> Result<Option<Teacher>> {
            tokio::task::yield_now().await;
            self.0.teacher_by_user(user_id).await
        }

        async fn student_by_user(&self, user_id: UserId) -> Result<Option<Student>> {
            tokio::task::yield_now().await;
            self.0.student_by_user(user_id).await
        }

        async fn courses_by_teacher(&self, teacher_id: TeacherId) -> Result<Vec<Course>> {
            tokio::task::yield_now().await;
            self.0.courses_by_teacher(teacher_id).await
        }

        async fn courses_by_college(&self, college_id: CollegeId) -> Result<Vec<Course>> {
            tokio::task::yield_now().await;
            self.0.courses_by_college(college_id).await
        }

        async fn set_prerequisites(&self, course_id: CourseId, prerequisites: Vec<CourseId>) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.set_prerequisites(course_id, prerequisites).await
        }

        async fn put_score(&self, score: Score) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.put_score(score).await
        }
    }
}
