//! Session lifecycle control.
//!
//! The controller owns the [`SessionStore`] and is the only writer to it:
//! it enforces one active session per level, seeds the roster at open,
//! routes check-ins to the processor, and hands closing sessions to the
//! reconciliation engine. Ledger access goes through the [`Ledger`] trait so
//! the same controller drives the SQLite store and test fixtures.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::biometric::{BiometricVerifier, FaceSample};
use crate::checkin;
use crate::error::SessionError;
use crate::ledger::{Ledger, NewAttendance};
use crate::reconcile::{self, FinalizeSummary};
use crate::session::{CheckinProgress, Session, SessionSnapshot, SessionStore};
use crate::types::{Actor, AttendanceStatus, Matricule, Role};

/// Controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long after opening check-ins are accepted.
    /// Default: 30 minutes.
    pub validity_window_mins: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validity_window_mins: 30,
        }
    }
}

/// What a delegate supplies when opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub course: String,
    /// Timetabled date of the course session.
    pub date: NaiveDate,
    /// Timetabled start time of the course session.
    pub time: NaiveTime,
    pub lecture_description: String,
}

/// Why a session was closed, for the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Explicit,
    Logout,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Logout => "logout",
        })
    }
}

/// The session lifecycle state machine.
#[derive(Debug)]
pub struct SessionController {
    store: SessionStore,
    config: SessionConfig,
}

impl SessionController {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_store(config, SessionStore::new())
    }

    /// Resumes control over a previously persisted store.
    #[must_use]
    pub fn with_store(config: SessionConfig, store: SessionStore) -> Self {
        Self { store, config }
    }

    /// The underlying store, read-only.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Releases the store, e.g. to persist it between invocations.
    #[must_use]
    pub fn into_store(self) -> SessionStore {
        self.store
    }

    /// Opens a session for the actor's level and returns a copy of it.
    ///
    /// Preconditions: the actor is a delegate, and no session is active for
    /// their level. On success the level's roster (minus the actor) is
    /// seeded with blank progress, and the actor immediately receives a
    /// `present` attendance record unless one already exists for the same
    /// (matricule, course, scheduled date-time) key.
    pub fn open_session<L: Ledger>(
        &mut self,
        ledger: &mut L,
        actor: &Actor,
        request: OpenSession,
    ) -> Result<Session, SessionError> {
        self.open_session_at(ledger, actor, request, Utc::now())
    }

    pub(crate) fn open_session_at<L: Ledger>(
        &mut self,
        ledger: &mut L,
        actor: &Actor,
        request: OpenSession,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        if actor.role != Role::Delegate {
            return Err(SessionError::DelegateRequired {
                matricule: actor.matricule.clone(),
                role: actor.role,
            });
        }
        if self.store.active(actor.level).is_some() {
            return Err(SessionError::SessionAlreadyActive { level: actor.level });
        }

        let roster = ledger.list_students_by_level(actor.level)?;
        let mut progress = BTreeMap::new();
        for student in &roster {
            if student.matricule == actor.matricule {
                continue;
            }
            progress.insert(student.matricule.clone(), CheckinProgress::default());
        }

        let scheduled_at = NaiveDateTime::new(request.date, request.time).and_utc();

        // Auto-attendance for the opener, guarded by the de-duplication key.
        if ledger
            .find_attendance(&actor.matricule, &request.course, scheduled_at)?
            .is_some()
        {
            debug!(
                matricule = %actor.matricule,
                course = %request.course,
                "delegate already recorded for this course session, auto-present skipped"
            );
        } else {
            ledger.insert_attendance(NewAttendance {
                matricule: actor.matricule.clone(),
                course: request.course.clone(),
                scheduled_at,
                qr_scanned: true,
                biometric_verified: true,
                status: AttendanceStatus::Present,
                lecture_description: request.lecture_description.clone(),
            })?;
        }

        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            course: request.course,
            scheduled_date: request.date,
            scheduled_time: request.time,
            lecture_description: request.lecture_description,
            delegate: actor.matricule.clone(),
            level: actor.level,
            opened_at: now,
            expires_at: now + Duration::minutes(self.config.validity_window_mins),
            progress,
        };
        info!(
            session_id = %session.session_id,
            course = %session.course,
            level = session.level,
            students = session.progress.len(),
            expires_at = %session.expires_at,
            "session opened"
        );
        self.store.insert(session.clone());
        Ok(session)
    }

    /// Records a student's QR scan against their level's active session.
    pub fn submit_checkin<L: Ledger>(
        &mut self,
        ledger: &L,
        matricule: &Matricule,
    ) -> Result<(), SessionError> {
        self.submit_checkin_at(ledger, matricule, Utc::now())
    }

    pub(crate) fn submit_checkin_at<L: Ledger>(
        &mut self,
        ledger: &L,
        matricule: &Matricule,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let student =
            ledger
                .get_student(matricule)?
                .ok_or_else(|| SessionError::StudentNotFound {
                    matricule: matricule.clone(),
                })?;
        let Some(session) = self.store.active_mut(student.level) else {
            return Err(SessionError::NoActiveSession {
                level: student.level,
            });
        };
        checkin::submit_qr(session, &student, now)
    }

    /// Runs the biometric phase for a student who already scanned.
    ///
    /// The reference sample comes from the caller (it owns the picture
    /// store); the verdict comes from the injected verifier.
    pub fn submit_biometric<L: Ledger, V: BiometricVerifier>(
        &mut self,
        ledger: &L,
        verifier: &V,
        matricule: &Matricule,
        captured: &FaceSample,
        reference: &FaceSample,
    ) -> Result<bool, SessionError> {
        self.submit_biometric_at(ledger, verifier, matricule, captured, reference, Utc::now())
    }

    pub(crate) fn submit_biometric_at<L: Ledger, V: BiometricVerifier>(
        &mut self,
        ledger: &L,
        verifier: &V,
        matricule: &Matricule,
        captured: &FaceSample,
        reference: &FaceSample,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionError> {
        let student =
            ledger
                .get_student(matricule)?
                .ok_or_else(|| SessionError::StudentNotFound {
                    matricule: matricule.clone(),
                })?;
        let Some(session) = self.store.active_mut(student.level) else {
            return Err(SessionError::NoActiveSession {
                level: student.level,
            });
        };
        checkin::submit_biometric(session, &student, verifier, captured, reference, now)
    }

    /// Explicitly closes the actor's session, reconciling it into the ledger.
    ///
    /// Returns `Ok(None)` when the actor owns no active session; closing
    /// nothing is a no-op, not an error. On a ledger failure the session
    /// stays in the store so the close can be retried.
    pub fn close_session<L: Ledger>(
        &mut self,
        ledger: &mut L,
        actor: &Actor,
    ) -> Result<Option<FinalizeSummary>, SessionError> {
        self.close(ledger, actor, CloseReason::Explicit)
    }

    /// Implicit close triggered by the owning delegate's logout.
    pub fn close_for_logout<L: Ledger>(
        &mut self,
        ledger: &mut L,
        actor: &Actor,
    ) -> Result<Option<FinalizeSummary>, SessionError> {
        self.close(ledger, actor, CloseReason::Logout)
    }

    fn close<L: Ledger>(
        &mut self,
        ledger: &mut L,
        actor: &Actor,
        reason: CloseReason,
    ) -> Result<Option<FinalizeSummary>, SessionError> {
        let Some(session) = self.store.active(actor.level) else {
            debug!(level = actor.level, "no active session to close");
            return Ok(None);
        };
        if session.delegate != actor.matricule {
            // Not this actor's session to close; same no-op as having none.
            debug!(
                level = actor.level,
                actor = %actor.matricule,
                owner = %session.delegate,
                "close requested by non-owner, ignoring"
            );
            return Ok(None);
        }

        let summary = reconcile::finalize(ledger, session, &session.delegate)?;
        info!(
            session_id = %session.session_id,
            course = %session.course,
            level = session.level,
            %reason,
            written = summary.written(),
            "session closed"
        );
        self.store.remove(actor.level);
        Ok(Some(summary))
    }

    /// Read-only view of the active session for a level, if any.
    #[must_use]
    pub fn snapshot(&self, level: i64) -> Option<SessionSnapshot> {
        self.store.active(level).map(Session::snapshot)
    }
}
