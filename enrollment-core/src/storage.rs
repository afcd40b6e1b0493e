//! Enrollment storage
//!
//! # Layout
//!
//! - `records` - Enrollment arena (key: enrollment_id)
//! - `by_pair` - Unique index (key: student_id || course_id)
//! - `by_course` - Secondary index for roster and lottery scans
//! - `by_student` - Secondary index for per-student listings
//!
//! All indices live behind one `RwLock`, so every write (insert, delete, bulk
//! lottery commit) is applied atomically or not at all.

use crate::{
    error::{Error, Result},
    types::{CourseId, Enrollment, EnrollmentId, EnrollmentStatus, StudentId},
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<EnrollmentId, Enrollment>,
    by_pair: HashMap<(StudentId, CourseId), EnrollmentId>,
    by_course: HashMap<CourseId, HashSet<EnrollmentId>>,
    by_student: HashMap<StudentId, HashSet<EnrollmentId>>,
    next_sequence: u64,
}

impl Tables {
    fn collect<'a>(&self, ids: impl Iterator<Item = &'a EnrollmentId>) -> Vec<Enrollment> {
        let mut out: Vec<Enrollment> = ids
            .filter_map(|id| self.records.get(id).cloned())
            .collect();
        out.sort_by_key(|e| e.sequence);
        out
    }
}

/// In-memory enrollment store
#[derive(Debug, Default)]
pub struct EnrollmentStore {
    tables: RwLock<Tables>,
}

impl EnrollmentStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new Requested enrollment for the pair.
    ///
    /// Fails with `Conflict` if any record already exists for the pair.
    pub fn insert_requested(&self, student_id: StudentId, course_id: CourseId) -> Result<Enrollment> {
        let mut tables = self.tables.write();

        if let Some(existing) = tables.by_pair.get(&(student_id, course_id)) {
            return Err(Error::Conflict(format!(
                "enrollment {} already exists for student {} in course {}",
                existing, student_id, course_id
            )));
        }

        let sequence = tables.next_sequence;
        tables.next_sequence += 1;

        let enrollment = Enrollment::requested(student_id, course_id, sequence);
        let id = enrollment.id;

        tables.by_pair.insert((student_id, course_id), id);
        tables.by_course.entry(course_id).or_default().insert(id);
        tables.by_student.entry(student_id).or_default().insert(id);
        tables.records.insert(id, enrollment.clone());

        Ok(enrollment)
    }

    /// Get the enrollment for a (student, course) pair
    pub fn get_by_pair(&self, student_id: StudentId, course_id: CourseId) -> Option<Enrollment> {
        let tables = self.tables.read();
        tables
            .by_pair
            .get(&(student_id, course_id))
            .and_then(|id| tables.records.get(id).cloned())
    }

    /// Get enrollment by id
    pub fn get(&self, id: EnrollmentId) -> Result<Enrollment> {
        self.tables
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("enrollment", id))
    }

    /// Delete the enrollment for a pair unless it is Granted.
    ///
    /// The status check and the delete happen under the same write guard.
    pub fn remove_unless_granted(&self, student_id: StudentId, course_id: CourseId) -> Result<Enrollment> {
        let mut tables = self.tables.write();

        let id = *tables.by_pair.get(&(student_id, course_id)).ok_or_else(|| {
            Error::not_found("enrollment", format!("student {} / course {}", student_id, course_id))
        })?;

        let status = tables
            .records
            .get(&id)
            .map(|e| e.status())
            .ok_or_else(|| Error::not_found("enrollment", id))?;

        if status == EnrollmentStatus::Granted {
            return Err(Error::InvalidState(format!(
                "enrollment {} is granted and cannot be withdrawn",
                id
            )));
        }

        tables.by_pair.remove(&(student_id, course_id));
        if let Some(ids) = tables.by_course.get_mut(&course_id) {
            ids.remove(&id);
        }
        if let Some(ids) = tables.by_student.get_mut(&student_id) {
            ids.remove(&id);
        }
        tables
            .records
            .remove(&id)
            .ok_or_else(|| Error::not_found("enrollment", id))
    }

    /// All enrollments of a student, in creation order
    pub fn list_by_student(&self, student_id: StudentId) -> Vec<Enrollment> {
        let tables = self.tables.read();
        match tables.by_student.get(&student_id) {
            Some(ids) => tables.collect(ids.iter()),
            None => Vec::new(),
        }
    }

    /// All enrollments for a course, in creation order
    pub fn list_by_course(&self, course_id: CourseId) -> Vec<Enrollment> {
        let tables = self.tables.read();
        match tables.by_course.get(&course_id) {
            Some(ids) => tables.collect(ids.iter()),
            None => Vec::new(),
        }
    }

    /// Enrollments for a course with the given status, in creation order
    pub fn list_by_course_and_status(&self, course_id: CourseId, status: EnrollmentStatus) -> Vec<Enrollment> {
        self.list_by_course(course_id)
            .into_iter()
            .filter(|e| e.status() == status)
            .collect()
    }

    /// Count enrollments for a course with the given status
    pub fn count_by_course_and_status(&self, course_id: CourseId, status: EnrollmentStatus) -> usize {
        let tables = self.tables.read();
        tables.by_course.get(&course_id).map_or(0, |ids| {
            ids.iter()
                .filter_map(|id| tables.records.get(id))
                .filter(|e| e.status() == status)
                .count()
        })
    }

    /// Move a set of Requested enrollments to Granted and another to Denied.
    ///
    /// Every id is validated before anything is written: each must exist,
    /// belong to `course_id`, be Requested, and appear only once across both
    /// sets. Any violation is `InvalidState` and nothing changes. The grant set must also fit in
    /// the seats left by already-Granted records.
    pub fn commit_outcome(
        &self,
        course_id: CourseId,
        capacity: u32,
        granted: &[EnrollmentId],
        denied: &[EnrollmentId],
    ) -> Result<()> {
        let mut tables = self.tables.write();

        let mut seen = HashSet::with_capacity(granted.len() + denied.len());
        for id in granted.iter().chain(denied.iter()) {
            if !seen.insert(*id) {
                return Err(Error::InvalidState(format!(
                    "enrollment {} appears more than once in lottery outcome",
                    id
                )));
            }

            let requested = tables.records.get(id).is_some_and(|record| {
                record.course_id == course_id && record.status() == EnrollmentStatus::Requested
            });
            if !requested {
                return Err(Error::InvalidState(format!(
                    "enrollment {} is not a requested enrollment of course {}",
                    id, course_id
                )));
            }
        }

        let already_granted = tables.by_course.get(&course_id).map_or(0, |ids| {
            ids.iter()
                .filter_map(|id| tables.records.get(id))
                .filter(|e| e.status() == EnrollmentStatus::Granted)
                .count()
        });
        if already_granted + granted.len() > capacity as usize {
            return Err(Error::InvalidState(format!(
                "granting {} seats would exceed capacity {} of course {} ({} already granted)",
                granted.len(),
                capacity,
                course_id,
                already_granted
            )));
        }

        let now = Utc::now();
        for id in granted {
            if let Some(record) = tables.records.get_mut(id) {
                record.transition(EnrollmentStatus::Granted, now);
            }
        }
        for id in denied {
            if let Some(record) = tables.records.get_mut(id) {
                record.transition(EnrollmentStatus::Denied, now);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_unique_per_pair() {
        let store = EnrollmentStore::new();
        let (student, course) = (StudentId::new(), CourseId::new());

        store.insert_requested(student, course).unwrap();
        let err = store.insert_requested(student, course).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.list_by_course(course).len(), 1);
    }

    #[test]
    fn test_listing_is_creation_ordered() {
        let store = EnrollmentStore::new();
        let course = CourseId::new();
        let students: Vec<StudentId> = (0..5).map(|_| StudentId::new()).collect();
        for s in &students {
            store.insert_requested(*s, course).unwrap();
        }

        let listed: Vec<StudentId> = store.list_by_course(course).iter().map(|e| e.student_id).collect();
        assert_eq!(listed, students);
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let store = EnrollmentStore::new();
        let course = CourseId::new();
        let a = store.insert_requested(StudentId::new(), course).unwrap();
        let b = store.insert_requested(StudentId::new(), course).unwrap();
        let foreign = store.insert_requested(StudentId::new(), CourseId::new()).unwrap();

        let err = store
            .commit_outcome(course, 5, &[a.id], &[b.id, foreign.id])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(
            store.count_by_course_and_status(course, EnrollmentStatus::Requested),
            2
        );
    }

    #[test]
    fn test_commit_rejects_overbooking() {
        let store = EnrollmentStore::new();
        let course = CourseId::new();
        let a = store.insert_requested(StudentId::new(), course).unwrap();
        let b = store.insert_requested(StudentId::new(), course).unwrap();

        assert!(store.commit_outcome(course, 1, &[a.id, b.id], &[]).is_err());
        store.commit_outcome(course, 1, &[a.id], &[b.id]).unwrap();
        assert_eq!(store.get(a.id).unwrap().status(), EnrollmentStatus::Granted);
        assert_eq!(store.get(b.id).unwrap().status(), EnrollmentStatus::Denied);
    }

    #[test]
    fn test_commit_rejects_unknown_and_repeated_ids() {
        let store = EnrollmentStore::new();
        let course = CourseId::new();
        let a = store.insert_requested(StudentId::new(), course).unwrap();

        let err = store
            .commit_outcome(course, 5, &[a.id], &[EnrollmentId::new()])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let err = store.commit_outcome(course, 5, &[a.id], &[a.id]).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(store.get(a.id).unwrap().status(), EnrollmentStatus::Requested);
    }

    #[test]
    fn test_commit_rejects_terminal_records() {
        let store = EnrollmentStore::new();
        let course = CourseId::new();
        let a = store.insert_requested(StudentId::new(), course).unwrap();
        store.commit_outcome(course, 1, &[], &[a.id]).unwrap();

        let err = store.commit_outcome(course, 1, &[a.id], &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_remove_unless_granted() {
        let store = EnrollmentStore::new();
        let (student, course) = (StudentId::new(), CourseId::new());
        let e = store.insert_requested(student, course).unwrap();
        store.commit_outcome(course, 1, &[e.id], &[]).unwrap();

        let err = store.remove_unless_granted(student, course).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(store.get_by_pair(student, course).is_some());

        let other = StudentId::new();
        store.insert_requested(other, course).unwrap();
        store.remove_unless_granted(other, course).unwrap();
        assert!(store.get_by_pair(other, course).is_none());
        assert!(store.list_by_student(other).is_empty());
    }
}
