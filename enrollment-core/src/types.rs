//! Core types for enrollment
//!
//! Entities reference each other by id only. Relationships are resolved
//! through explicit [`Directory`](crate::directory::Directory) lookups, never
//! through embedded object graphs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new time-ordered id
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// College identifier
    CollegeId
);
entity_id!(
    /// Course identifier
    CourseId
);
entity_id!(
    /// Teacher identifier
    TeacherId
);
entity_id!(
    /// Student identifier
    StudentId
);
entity_id!(
    /// Enrollment identifier
    EnrollmentId
);
entity_id!(
    /// Authentication principal behind a student, teacher or administrator
    UserId
);

/// College
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct College {
    /// College ID
    pub id: CollegeId,
    /// Display name
    pub name: String,
    /// Unique college code
    pub code: String,
}

/// Course availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CourseStatus {
    /// Not open for enrollment
    Disabled = 0,
    /// Open for enrollment
    Enabled = 1,
}

/// Course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Course ID
    pub id: CourseId,
    /// Unique course code
    pub code: String,
    /// Display name
    pub name: String,
    /// Credit count
    pub credits: u32,
    /// Seat capacity (at least 1)
    pub capacity: u32,
    /// Availability
    pub status: CourseStatus,
    /// Owning college
    pub college_id: CollegeId,
    /// Owning teacher
    pub teacher_id: TeacherId,
    /// Prerequisite courses, in declaration order
    pub prerequisites: Vec<CourseId>,
}

impl Course {
    /// Whether the course accepts enrollment requests
    pub fn is_enabled(&self) -> bool {
        self.status == CourseStatus::Enabled
    }
}

/// Student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Student ID
    pub id: StudentId,
    /// Unique student number
    pub student_no: String,
    /// Owning college
    pub college_id: CollegeId,
    /// Linked authentication principal
    pub user_id: UserId,
}

/// Teacher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    /// Teacher ID
    pub id: TeacherId,
    /// Unique teacher number
    pub teacher_no: String,
    /// Owning college
    pub college_id: CollegeId,
    /// Linked authentication principal
    pub user_id: UserId,
}

/// Recorded grade for a student in a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    /// Student
    pub student_id: StudentId,
    /// Course
    pub course_id: CourseId,
    /// Grade in [0, 100]
    pub value: Decimal,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Enrollment status (primary lifecycle state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnrollmentStatus {
    /// Waiting for a lottery
    Requested = 1,
    /// Seat allocated (terminal)
    Granted = 2,
    /// Seat refused (terminal)
    Denied = 3,
}

impl EnrollmentStatus {
    /// Lottery outcome that always accompanies this status
    pub fn lottery_outcome(&self) -> LotteryOutcome {
        match self {
            EnrollmentStatus::Requested => LotteryOutcome::Pending,
            EnrollmentStatus::Granted => LotteryOutcome::Won,
            EnrollmentStatus::Denied => LotteryOutcome::Lost,
        }
    }

    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrollmentStatus::Granted | EnrollmentStatus::Denied)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnrollmentStatus::Requested => "requested",
            EnrollmentStatus::Granted => "granted",
            EnrollmentStatus::Denied => "denied",
        };
        f.write_str(name)
    }
}

/// Lottery outcome recorded on an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LotteryOutcome {
    /// Not drawn yet
    Pending = 0,
    /// Drawn and won
    Won = 1,
    /// Drawn and lost
    Lost = 2,
}

/// A student's request for, or allocation of, a seat in a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    /// Enrollment ID
    pub id: EnrollmentId,
    /// Student
    pub student_id: StudentId,
    /// Course
    pub course_id: CourseId,
    /// Lifecycle status
    status: EnrollmentStatus,
    /// Lottery outcome, kept in lockstep with `status`
    lottery_outcome: LotteryOutcome,
    /// Insertion sequence, used for stable listing order
    pub sequence: u64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a fresh Requested/Pending enrollment
    pub fn requested(student_id: StudentId, course_id: CourseId, sequence: u64) -> Self {
        let now = Utc::now();
        Self {
            id: EnrollmentId::new(),
            student_id,
            course_id,
            status: EnrollmentStatus::Requested,
            lottery_outcome: LotteryOutcome::Pending,
            sequence,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current status
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    /// Current lottery outcome
    pub fn lottery_outcome(&self) -> LotteryOutcome {
        self.lottery_outcome
    }

    /// Move to a new status, updating the lottery outcome with it
    pub(crate) fn transition(&mut self, status: EnrollmentStatus, at: DateTime<Utc>) {
        self.status = status;
        self.lottery_outcome = status.lottery_outcome();
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_outcome_lockstep() {
        let mut enrollment = Enrollment::requested(StudentId::new(), CourseId::new(), 0);
        assert_eq!(enrollment.status(), EnrollmentStatus::Requested);
        assert_eq!(enrollment.lottery_outcome(), LotteryOutcome::Pending);

        enrollment.transition(EnrollmentStatus::Granted, Utc::now());
        assert_eq!(enrollment.lottery_outcome(), LotteryOutcome::Won);

        enrollment.transition(EnrollmentStatus::Denied, Utc::now());
        assert_eq!(enrollment.lottery_outcome(), LotteryOutcome::Lost);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!EnrollmentStatus::Requested.is_terminal());
        assert!(EnrollmentStatus::Granted.is_terminal());
        assert!(EnrollmentStatus::Denied.is_terminal());
    }

    #[test]
    fn test_ids_are_distinct() {
        assert_ne!(CourseId::new(), CourseId::new());
    }
}
