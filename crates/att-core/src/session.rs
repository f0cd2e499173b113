//! Ephemeral session state: one attendance window per level.
//!
//! A [`Session`] exists only while attendance is being taken. It is created
//! by a delegate, mutated as students check in, and drained into the ledger
//! by the reconciliation engine when closed. Nothing here is durable on its
//! own; callers that need sessions to survive a process restart serialize
//! the [`SessionStore`] to a side-channel (the CLI keeps a JSON state file).
//!
//! # Thread Safety
//!
//! The store is `Send` but not `Sync`: every operation assumes the
//! single-writer, request-per-action model. Callers that share a store
//! across threads must wrap it in a `Mutex` and serialize whole operations.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Matricule;

/// A student's in-progress check-in state within an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckinProgress {
    /// Set once the QR phase succeeds; never reverts within a session.
    pub qr_scanned: bool,
    /// Set once the biometric phase succeeds; never reverts within a session.
    pub biometric_verified: bool,
    /// Wall-clock time of the successful QR scan.
    pub qr_scanned_at: Option<DateTime<Utc>>,
}

impl CheckinProgress {
    /// Whether both presence factors are satisfied.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.qr_scanned && self.biometric_verified
    }
}

/// An open attendance window for one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Random id used in logs and state files.
    pub session_id: String,
    pub course: String,
    /// Timetabled date of the course session.
    pub scheduled_date: NaiveDate,
    /// Timetabled start time of the course session.
    pub scheduled_time: NaiveTime,
    pub lecture_description: String,
    /// Matricule of the delegate who opened the session.
    pub delegate: Matricule,
    pub level: i64,
    pub opened_at: DateTime<Utc>,
    /// End of the check-in window; the session itself outlives it.
    pub expires_at: DateTime<Utc>,
    /// Check-in progress per enrolled student, excluding the delegate.
    ///
    /// Ordered map so snapshots and reconciliation walk students in a stable
    /// order.
    pub progress: BTreeMap<Matricule, CheckinProgress>,
}

impl Session {
    /// The course session's timetabled date-time, the de-duplication key's
    /// time component.
    #[must_use]
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.scheduled_date, self.scheduled_time).and_utc()
    }

    /// Whether the check-in window has closed at `now`.
    ///
    /// The boundary is inclusive: a check-in at exactly `expires_at` is still
    /// accepted.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Read-only view for rendering.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            course: self.course.clone(),
            level: self.level,
            expires_at: self.expires_at,
            progress: self
                .progress
                .iter()
                .map(|(matricule, progress)| StudentProgress {
                    matricule: matricule.clone(),
                    qr_scanned: progress.qr_scanned,
                    biometric_verified: progress.biometric_verified,
                    qr_scanned_at: progress.qr_scanned_at,
                })
                .collect(),
        }
    }
}

/// One student's row in a [`SessionSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProgress {
    pub matricule: Matricule,
    pub qr_scanned: bool,
    pub biometric_verified: bool,
    pub qr_scanned_at: Option<DateTime<Utc>>,
}

/// Read-only session view exposed to rendering layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub course: String,
    pub level: i64,
    pub expires_at: DateTime<Utc>,
    pub progress: Vec<StudentProgress>,
}

/// Holds at most one active [`Session`] per level.
///
/// The store is a dumb map; the lifecycle controller owns the exclusivity
/// rule and rejects a second open for a level rather than replacing the
/// session already there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStore {
    sessions: BTreeMap<i64, Session>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active session for a level, if any.
    #[must_use]
    pub fn active(&self, level: i64) -> Option<&Session> {
        self.sessions.get(&level)
    }

    pub fn active_mut(&mut self, level: i64) -> Option<&mut Session> {
        self.sessions.get_mut(&level)
    }

    /// Installs a session under its level, returning any session it displaced.
    pub fn insert(&mut self, session: Session) -> Option<Session> {
        self.sessions.insert(session.level, session)
    }

    /// Removes and returns the session for a level.
    pub fn remove(&mut self, level: i64) -> Option<Session> {
        self.sessions.remove(&level)
    }

    /// Iterates active sessions in level order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
