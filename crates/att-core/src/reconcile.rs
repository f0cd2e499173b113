//! Reconciliation: draining session progress into the ledger.
//!
//! Finalize walks the snapshot of per-student progress taken when it is
//! entered and writes one attendance record per student that does not
//! already have one for the session's de-duplication key. A check-in racing
//! with close may land after the snapshot and be lost; that race is
//! accepted, not handled (the single-writer model makes it unreachable in
//! practice).

use tracing::{debug, info};

use crate::error::SessionError;
use crate::ledger::{Ledger, NewAttendance};
use crate::session::Session;
use crate::types::{AttendanceStatus, Matricule};

/// Outcome counts from one finalize pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinalizeSummary {
    /// Records written with `present` status.
    pub present: usize,
    /// Records written with `absent` status.
    pub absent: usize,
    /// Students skipped because a record already existed.
    pub skipped: usize,
}

impl FinalizeSummary {
    /// Total records written by this pass.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.present + self.absent
    }
}

/// Converts session progress into durable attendance records.
///
/// For every tracked student except `exclude`: if the ledger already holds a
/// record for (student, course, scheduled date-time) it is left untouched;
/// otherwise a record is written — `present` only when both check-in flags
/// are true, `absent` otherwise, always carrying the actual flag values and
/// the lecture description. All writes commit as one atomic batch, which
/// together with the existence check makes re-running finalize over the same
/// session a no-op for already-written students.
pub fn finalize<L: Ledger>(
    ledger: &mut L,
    session: &Session,
    exclude: &Matricule,
) -> Result<FinalizeSummary, SessionError> {
    let scheduled_at = session.scheduled_at();
    let mut summary = FinalizeSummary::default();
    let mut batch: Vec<NewAttendance> = Vec::new();

    for (matricule, progress) in &session.progress {
        if matricule == exclude {
            continue;
        }

        if let Some(existing) = ledger.find_attendance(matricule, &session.course, scheduled_at)? {
            debug!(
                matricule = %matricule,
                record_id = existing.id,
                "attendance already recorded, leaving untouched"
            );
            summary.skipped += 1;
            continue;
        }

        let status = if progress.is_complete() {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        };
        match status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
        }

        batch.push(NewAttendance {
            matricule: matricule.clone(),
            course: session.course.clone(),
            scheduled_at,
            qr_scanned: progress.qr_scanned,
            biometric_verified: progress.biometric_verified,
            status,
            lecture_description: session.lecture_description.clone(),
        });
    }

    if !batch.is_empty() {
        ledger.insert_attendance_batch(batch)?;
    }

    info!(
        session_id = %session.session_id,
        course = %session.course,
        level = session.level,
        present = summary.present,
        absent = summary.absent,
        skipped = summary.skipped,
        "session finalized"
    );
    Ok(summary)
}
