//! Prerequisite evaluation
//!
//! A course's prerequisites are satisfied when the student has a recorded
//! score at or above the pass mark for every prerequisite course. Scores
//! change over time, so nothing here is cached.

use crate::{
    directory::Directory,
    types::{Course, CourseId, StudentId},
    Error, Result,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Prerequisite evaluator
pub struct PrerequisiteEvaluator {
    directory: Arc<dyn Directory>,
    pass_mark: Decimal,
    /// Serializes edits so the cycle check and the write see the same graph
    edits: Mutex<()>,
}

impl PrerequisiteEvaluator {
    /// Create new evaluator
    pub fn new(directory: Arc<dyn Directory>, pass_mark: Decimal) -> Self {
        Self {
            directory,
            pass_mark,
            edits: Mutex::new(()),
        }
    }

    /// Pass mark in use
    pub fn pass_mark(&self) -> Decimal {
        self.pass_mark
    }

    /// Check whether the student meets every prerequisite of the course
    pub async fn is_satisfied(&self, student_id: StudentId, course_id: CourseId) -> Result<bool> {
        let course = self
            .directory
            .course(course_id)
            .await?
            .ok_or_else(|| Error::not_found("course", course_id))?;
        self.is_satisfied_for(student_id, &course).await
    }

    /// Same as [`is_satisfied`](Self::is_satisfied) for an already loaded course
    pub async fn is_satisfied_for(&self, student_id: StudentId, course: &Course) -> Result<bool> {
        for prerequisite in &course.prerequisites {
            let passed = self
                .directory
                .score(student_id, *prerequisite)
                .await?
                .is_some_and(|score| score.value >= self.pass_mark);

            if !passed {
                tracing::debug!(
                    "Student {} misses prerequisite {} of course {}",
                    student_id,
                    prerequisite,
                    course.code
                );
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Replace a course's prerequisite list.
    ///
    /// Edits made through one evaluator are applied one at a time. Every referenced course must exist. Lists that would make the course
    /// (directly or transitively) its own prerequisite are rejected with
    /// `InvalidState`. Duplicates are dropped, keeping first occurrence.
    pub async fn set_prerequisites(&self, course_id: CourseId, prerequisite_ids: Vec<CourseId>) -> Result<()> {
        let _edit = self.edits.lock().await;

        if self.directory.course(course_id).await?.is_none() {
            return Err(Error::not_found("course", course_id));
        }

        let mut seen = HashSet::new();
        let proposed: Vec<CourseId> = prerequisite_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        // Load the part of the graph reachable from the proposed list
        let mut edges: HashMap<CourseId, Vec<CourseId>> = HashMap::new();
        let mut frontier = proposed.clone();
        while let Some(id) = frontier.pop() {
            if edges.contains_key(&id) {
                continue;
            }
            let course = self
                .directory
                .course(id)
                .await?
                .ok_or_else(|| Error::not_found("course", id))?;
            frontier.extend(course.prerequisites.iter().copied());
            edges.insert(id, course.prerequisites);
        }

        if introduces_cycle(course_id, &proposed, &edges) {
            return Err(Error::InvalidState(format!(
                "prerequisites of course {} would form a cycle",
                course_id
            )));
        }

        let count = proposed.len();
        self.directory.set_prerequisites(course_id, proposed).await?;
        tracing::info!("Set {} prerequisites on course {}", count, course_id);
        Ok(())
    }
}

impl std::fmt::Debug for PrerequisiteEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrerequisiteEvaluator")
            .field("pass_mark", &self.pass_mark)
            .finish_non_exhaustive()
    }
}

/// Check whether replacing `course_id`'s prerequisites with `proposed` would
/// close a cycle in the prerequisite graph.
///
/// `edges` is the current graph (course -> its prerequisites).
pub fn introduces_cycle(
    course_id: CourseId,
    proposed: &[CourseId],
    edges: &HashMap<CourseId, Vec<CourseId>>,
) -> bool {
    let mut stack: Vec<CourseId> = proposed.to_vec();
    let mut visited = HashSet::new();

    while let Some(current) = stack.pop() {
        if current == course_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = edges.get(&current) {
            stack.extend(next.iter().copied());
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::types::{CollegeId, CourseStatus, Score, TeacherId};
    use chrono::Utc;

    fn course(prerequisites: Vec<CourseId>) -> Course {
        Course {
            id: CourseId::new(),
            code: "CS201".to_string(),
            name: "Data Structures".to_string(),
            credits: 4,
            capacity: 30,
            status: CourseStatus::Enabled,
            college_id: CollegeId::new(),
            teacher_id: TeacherId::new(),
            prerequisites,
        }
    }

    fn score(student_id: StudentId, course_id: CourseId, value: i64) -> Score {
        Score {
            student_id,
            course_id,
            value: Decimal::from(value),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_no_prerequisites_is_satisfied() {
        let directory = Arc::new(InMemoryDirectory::new());
        let target = course(vec![]);
        directory.insert_course(target.clone());

        let evaluator = PrerequisiteEvaluator::new(directory, Decimal::from(60));
        assert!(evaluator.is_satisfied(StudentId::new(), target.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let directory = Arc::new(InMemoryDirectory::new());
        let (p1, p2) = (CourseId::new(), CourseId::new());
        let target = course(vec![p1, p2]);
        directory.insert_course(target.clone());
        let student = StudentId::new();

        let evaluator = PrerequisiteEvaluator::new(directory.clone(), Decimal::from(60));

        // Missing score
        directory.insert_score(score(student, p1, 60));
        assert!(!evaluator.is_satisfied(student, target.id).await.unwrap());

        // Failing score
        directory.insert_score(score(student, p2, 59));
        assert!(!evaluator.is_satisfied(student, target.id).await.unwrap());

        // Grades change; the answer follows
        directory.insert_score(score(student, p2, 75));
        assert!(evaluator.is_satisfied(student, target.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_course_is_not_found() {
        let evaluator = PrerequisiteEvaluator::new(Arc::new(InMemoryDirectory::new()), Decimal::from(60));
        let err = evaluator
            .is_satisfied(StudentId::new(), CourseId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_set_prerequisites() {
        let directory = Arc::new(InMemoryDirectory::new());
        let base = course(vec![]);
        let advanced = course(vec![]);
        directory.insert_course(base.clone());
        directory.insert_course(advanced.clone());

        let evaluator = PrerequisiteEvaluator::new(directory.clone(), Decimal::from(60));
        evaluator
            .set_prerequisites(advanced.id, vec![base.id, base.id])
            .await
            .unwrap();
        let stored = directory.course(advanced.id).await.unwrap().unwrap();
        assert_eq!(stored.prerequisites, vec![base.id]);

        // base -> advanced would close the loop
        let err = evaluator
            .set_prerequisites(base.id, vec![advanced.id])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let err = evaluator
            .set_prerequisites(base.id, vec![CourseId::new()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_cycle_detection() {
        let (a, b, c) = (CourseId::new(), CourseId::new(), CourseId::new());
        let mut edges = HashMap::new();
        edges.insert(b, vec![c]);
        edges.insert(c, vec![a]);

        assert!(introduces_cycle(a, &[a], &edges));
        assert!(introduces_cycle(a, &[b], &edges));
        assert!(!introduces_cycle(c, &[b], &HashMap::new()));
    }

    #[tokio::test]
    async fn test_concurrent_edits_cannot_close_a_cycle() {
        use crate::directory::testing::YieldingDirectory;

        let inner = Arc::new(InMemoryDirectory::new());
        let (a, b) = (course(vec![]), course(vec![]));
        inner.insert_course(a.clone());
        inner.insert_course(b.clone());

        let directory = Arc::new(YieldingDirectory(inner.clone()));
        let evaluator = PrerequisiteEvaluator::new(directory, Decimal::from(60));

        let (first, second) = tokio::join!(
            evaluator.set_prerequisites(a.id, vec![b.id]),
            evaluator.set_prerequisites(b.id, vec![a.id]),
        );
        assert!(first.is_ok() != second.is_ok());
        let rejected = first.err().or(second.err()).unwrap();
        assert!(matches!(rejected, Error::InvalidState(_)));

        let a_prereqs = inner.course(a.id).await.unwrap().unwrap().prerequisites;
        let b_prereqs = inner.course(b.id).await.unwrap().unwrap().prerequisites;
        assert!(a_prereqs.is_empty() || b_prereqs.is_empty());
    }
}
