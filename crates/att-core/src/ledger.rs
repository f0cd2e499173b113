//! The durable student/attendance ledger interface.
//!
//! The ledger is the system of record: it outlives every session and is the
//! only place finalized attendance lives. This module defines the data the
//! engine reads and writes plus the [`Ledger`] trait the engine calls through,
//! so the same lifecycle and reconciliation code runs against the SQLite
//! store or an in-memory test double.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AttendanceStatus, Matricule, Role};

/// Errors surfaced by ledger implementations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A write hit an existing record for the same de-duplication key.
    ///
    /// The reconciliation engine checks for existing records before writing,
    /// so implementations returning this are reporting a bug upstream, not a
    /// user-facing condition.
    #[error("attendance already recorded for {matricule} in {course} at {scheduled_at}")]
    DuplicateAttendance {
        matricule: String,
        course: String,
        scheduled_at: DateTime<Utc>,
    },

    /// The underlying storage failed. Fatal; propagated undisguised.
    #[error("ledger storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    /// Wraps an arbitrary storage-layer error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// A registered student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub matricule: Matricule,
    pub name: String,
    /// Class/year grouping; all students of a level share one session.
    pub level: i64,
    pub email: String,
    pub phone: String,
    pub specialty: String,
    pub role: Role,
    /// Reference picture path for the biometric collaborator.
    pub picture: Option<String>,
}

impl Student {
    /// The actor identity this student presents to the session engine.
    #[must_use]
    pub fn actor(&self) -> crate::types::Actor {
        crate::types::Actor::new(self.matricule.clone(), self.role, self.level)
    }
}

/// An attendance record awaiting insertion (no id yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendance {
    pub matricule: Matricule,
    pub course: String,
    /// The course session's timetabled date-time, not the write time.
    pub scheduled_at: DateTime<Utc>,
    pub qr_scanned: bool,
    pub biometric_verified: bool,
    pub status: AttendanceStatus,
    pub lecture_description: String,
}

impl NewAttendance {
    /// Attaches the storage-assigned id, producing the durable record.
    #[must_use]
    pub fn with_id(self, id: i64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            matricule: self.matricule,
            course: self.course,
            scheduled_at: self.scheduled_at,
            qr_scanned: self.qr_scanned,
            biometric_verified: self.biometric_verified,
            status: self.status,
            lecture_description: self.lecture_description,
        }
    }
}

/// A finalized attendance record.
///
/// At most one record exists per (matricule, course, `scheduled_at`) triple.
/// That key is enforced by the reconciliation engine's lookup plus the
/// [`LedgerError::DuplicateAttendance`] guard, deliberately not by a storage
/// UNIQUE constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Storage-assigned, monotonically unique.
    pub id: i64,
    pub matricule: Matricule,
    pub course: String,
    pub scheduled_at: DateTime<Utc>,
    pub qr_scanned: bool,
    pub biometric_verified: bool,
    pub status: AttendanceStatus,
    pub lecture_description: String,
}

/// Durable store of students and finalized attendance.
///
/// This trait lets the session engine run against different backing stores
/// (the SQLite database, or in-memory fixtures in tests). Reads take `&self`,
/// writes `&mut self`; implementations are not required to be thread-safe.
pub trait Ledger {
    /// Looks up a student by matricule.
    fn get_student(&self, matricule: &Matricule) -> Result<Option<Student>, LedgerError>;

    /// Returns all students registered at the given level.
    fn list_students_by_level(&self, level: i64) -> Result<Vec<Student>, LedgerError>;

    /// Looks up an attendance record by its de-duplication key.
    fn find_attendance(
        &self,
        matricule: &Matricule,
        course: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, LedgerError>;

    /// Inserts a single attendance record.
    ///
    /// Implementations must reject a write whose de-duplication key already
    /// exists with [`LedgerError::DuplicateAttendance`].
    fn insert_attendance(&mut self, record: NewAttendance)
    -> Result<AttendanceRecord, LedgerError>;

    /// Inserts a batch of attendance records atomically.
    ///
    /// Either every record is written or none is; a duplicate key anywhere in
    /// the batch aborts the whole batch.
    fn insert_attendance_batch(
        &mut self,
        records: Vec<NewAttendance>,
    ) -> Result<Vec<AttendanceRecord>, LedgerError>;

    /// Increments the level of every student below `level_ceiling`.
    ///
    /// Returns the number of students promoted.
    fn promote_all(&mut self, level_ceiling: i64) -> Result<usize, LedgerError>;
}
