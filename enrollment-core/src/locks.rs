//! Scoped exclusion for enrollment operations
//!
//! - Each course has a `RwLock`. Requests and withdrawals hold it shared; a
//!   lottery holds it exclusively for its load-partition-commit sequence, so
//!   requests either finish before the snapshot or wait for the commit.
//! - Each (student, course) pair has a `Mutex`, so at most one request or
//!   withdrawal per pair is in flight.
//!
//! Locks are created on first use and removed once no guard or waiter holds
//! them. Unrelated courses never share a lock.

use crate::types::{CourseId, StudentId};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

type CourseLocks = Arc<DashMap<CourseId, Arc<RwLock<()>>>>;
type PairLocks = Arc<DashMap<(StudentId, CourseId), Arc<Mutex<()>>>>;

/// Drop the map entry for `key` if the map holds the only handle to it
fn prune<K: Eq + Hash, L>(map: &DashMap<K, Arc<L>>, key: &K) {
    map.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
}

/// Guard held while a single pair is being mutated
#[derive(Debug)]
pub struct PairGuard {
    key: (StudentId, CourseId),
    course: Option<OwnedRwLockReadGuard<()>>,
    pair: Option<OwnedMutexGuard<()>>,
    courses: CourseLocks,
    pairs: PairLocks,
}

impl Drop for PairGuard {
    fn drop(&mut self) {
        // Release before pruning so the strong count reflects waiters only
        drop(self.pair.take());
        drop(self.course.take());
        prune(&self.pairs, &self.key);
        prune(&self.courses, &self.key.1);
    }
}

/// Guard held while a course lottery runs
#[derive(Debug)]
pub struct CourseGuard {
    course_id: CourseId,
    course: Option<OwnedRwLockWriteGuard<()>>,
    courses: CourseLocks,
}

impl Drop for CourseGuard {
    fn drop(&mut self) {
        drop(self.course.take());
        prune(&self.courses, &self.course_id);
    }
}

/// Lock table populated on demand and pruned as guards are released
#[derive(Debug, Default)]
pub struct LockTable {
    courses: CourseLocks,
    pairs: PairLocks,
}

impl LockTable {
    /// Create empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    fn course_lock(&self, course_id: CourseId) -> Arc<RwLock<()>> {
        self.courses
            .entry(course_id)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .value()
            .clone()
    }

    fn pair_lock(&self, student_id: StudentId, course_id: CourseId) -> Arc<Mutex<()>> {
        self.pairs
            .entry((student_id, course_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Lock one (student, course) pair, sharing the course with other pairs
    pub async fn lock_pair(&self, student_id: StudentId, course_id: CourseId) -> PairGuard {
        let course = self.course_lock(course_id).read_owned().await;
        let pair = self.pair_lock(student_id, course_id).lock_owned().await;
        PairGuard {
            key: (student_id, course_id),
            course: Some(course),
            pair: Some(pair),
            courses: self.courses.clone(),
            pairs: self.pairs.clone(),
        }
    }

    /// Lock a whole course exclusively
    pub async fn lock_course(&self, course_id: CourseId) -> CourseGuard {
        CourseGuard {
            course_id,
            course: Some(self.course_lock(course_id).write_owned().await),
            courses: self.courses.clone(),
        }
    }

    /// Number of courses with a lock allocated
    pub fn tracked_courses(&self) -> usize {
        self.courses.len()
    }

    /// Number of pairs with a lock allocated
    pub fn tracked_pairs(&self) -> usize {
        self.pairs.len()
    }
}
