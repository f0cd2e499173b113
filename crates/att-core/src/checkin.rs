//! Check-in processing against an open session.
//!
//! Check-in is two-phase: the QR scan proves the student is in the room
//! looking at the projected code, then biometric verification proves the
//! scanner is the student. Both phases validate against the same session
//! gates; final `present` status requires both flags (see `reconcile`).
//!
//! Validation order for the QR phase: level match, expiry, roster
//! membership, then the already-checked-in guard. The no-active-session
//! check happens in the lifecycle controller before the session is handed
//! here.

use chrono::{DateTime, Utc};

use crate::biometric::{BiometricVerifier, FaceSample};
use crate::error::SessionError;
use crate::ledger::Student;
use crate::session::Session;

/// Applies a student's QR scan to the session.
///
/// On success sets the QR-scanned flag and records the scan time. The flag
/// is monotonic: a second scan for the same student is rejected with
/// [`SessionError::AlreadyCheckedIn`] and never resets the first scan's
/// timestamp.
pub fn submit_qr(
    session: &mut Session,
    student: &Student,
    now: DateTime<Utc>,
) -> Result<(), SessionError> {
    if student.level != session.level {
        return Err(SessionError::LevelMismatch {
            session_level: session.level,
            student_level: student.level,
        });
    }
    if session.is_expired(now) {
        return Err(SessionError::SessionExpired {
            expired_at: session.expires_at,
        });
    }

    // The roster is snapshotted at open; a student registered afterwards is
    // not tracked by this session.
    let Some(progress) = session.progress.get_mut(&student.matricule) else {
        return Err(SessionError::StudentNotFound {
            matricule: student.matricule.clone(),
        });
    };
    if progress.qr_scanned {
        return Err(SessionError::AlreadyCheckedIn {
            matricule: student.matricule.clone(),
        });
    }

    progress.qr_scanned = true;
    progress.qr_scanned_at = Some(now);
    tracing::info!(
        matricule = %student.matricule,
        course = %session.course,
        "QR check-in recorded"
    );
    Ok(())
}

/// Applies a student's biometric verification attempt to the session.
///
/// Returns the verdict. `true` sets the biometric flag; once set it stays
/// set and later attempts short-circuit without consulting the verifier.
/// `false` leaves progress untouched, so the student may retry.
pub fn submit_biometric<V: BiometricVerifier>(
    session: &mut Session,
    student: &Student,
    verifier: &V,
    captured: &FaceSample,
    reference: &FaceSample,
    now: DateTime<Utc>,
) -> Result<bool, SessionError> {
    if student.level != session.level {
        return Err(SessionError::LevelMismatch {
            session_level: session.level,
            student_level: student.level,
        });
    }
    if session.is_expired(now) {
        return Err(SessionError::SessionExpired {
            expired_at: session.expires_at,
        });
    }

    let Some(progress) = session.progress.get_mut(&student.matricule) else {
        return Err(SessionError::StudentNotFound {
            matricule: student.matricule.clone(),
        });
    };
    if !progress.qr_scanned {
        return Err(SessionError::QrScanRequired {
            matricule: student.matricule.clone(),
        });
    }
    if progress.biometric_verified {
        tracing::debug!(matricule = %student.matricule, "biometric already verified");
        return Ok(true);
    }

    let verified = verifier.verify(captured, reference);
    if verified {
        progress.biometric_verified = true;
        tracing::info!(
            matricule = %student.matricule,
            course = %session.course,
            "biometric verification succeeded"
        );
    } else {
        tracing::debug!(
            matricule = %student.matricule,
            "biometric verification rejected, student may retry"
        );
    }
    Ok(verified)
}
