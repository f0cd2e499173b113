//! Session engine error taxonomy.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::types::{Matricule, Role};

/// Errors returned by session lifecycle, check-in, and reconciliation calls.
///
/// Every variant except [`SessionError::Ledger`] is an expected, recoverable
/// rejection: the caller retries with a new action (re-scan, close first,
/// and so on). `Ledger` wraps storage failures, which are fatal and pass
/// through undisguised.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Only delegates may open sessions.
    #[error("{matricule} has role {role}, only a delegate can open a session")]
    DelegateRequired { matricule: Matricule, role: Role },

    /// A session is already open for this level.
    #[error("a session is already active for level {level}")]
    SessionAlreadyActive { level: i64 },

    /// No session is open for this level.
    #[error("no active session for level {level}")]
    NoActiveSession { level: i64 },

    /// The student belongs to a different level than the session.
    #[error("session is for level {session_level}, student is level {student_level}")]
    LevelMismatch {
        session_level: i64,
        student_level: i64,
    },

    /// The session's check-in window has closed.
    #[error("the check-in window closed at {expired_at}")]
    SessionExpired { expired_at: DateTime<Utc> },

    /// This student already completed the QR phase in this session.
    #[error("{matricule} has already checked in")]
    AlreadyCheckedIn { matricule: Matricule },

    /// The matricule has no ledger row, or is not tracked by the session.
    #[error("student {matricule} not found")]
    StudentNotFound { matricule: Matricule },

    /// Biometric verification was attempted before the QR scan.
    #[error("{matricule} must scan the QR code before biometric verification")]
    QrScanRequired { matricule: Matricule },

    /// Internal de-duplication guard. Surfacing this means the reconciliation
    /// engine skipped its existence check, which is a bug, not a user error.
    #[error("duplicate attendance record for {matricule} in {course} at {scheduled_at}")]
    DuplicateAttendanceRecord {
        matricule: String,
        course: String,
        scheduled_at: DateTime<Utc>,
    },

    /// Ledger storage failure.
    #[error("ledger failure: {0}")]
    Ledger(#[source] LedgerError),
}

// Not derived via #[from]: duplicate-key reports keep their own variant so
// callers can tell a reconciliation bug from a storage outage.
impl From<LedgerError> for SessionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateAttendance {
                matricule,
                course,
                scheduled_at,
            } => Self::DuplicateAttendanceRecord {
                matricule,
                course,
                scheduled_at,
            },
            storage @ LedgerError::Storage(_) => Self::Ledger(storage),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn duplicate_ledger_error_maps_to_duplicate_variant() {
        let err = LedgerError::DuplicateAttendance {
            matricule: "STU001".to_string(),
            course: "DB101".to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
        };

        let session_err = SessionError::from(err);
        assert!(matches!(
            session_err,
            SessionError::DuplicateAttendanceRecord { .. }
        ));
    }

    #[test]
    fn storage_ledger_error_stays_fatal() {
        let err = LedgerError::storage(std::io::Error::other("disk gone"));
        let session_err = SessionError::from(err);
        assert!(matches!(session_err, SessionError::Ledger(_)));
    }

    #[test]
    fn messages_are_human_readable() {
        let err = SessionError::SessionAlreadyActive { level: 2 };
        assert_eq!(err.to_string(), "a session is already active for level 2");

        let err = SessionError::LevelMismatch {
            session_level: 2,
            student_level: 3,
        };
        assert_eq!(
            err.to_string(),
            "session is for level 2, student is level 3"
        );
    }
}
