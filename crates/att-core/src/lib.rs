//! Core domain logic for the attendance tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Session lifecycle: opening, validating, and closing timed attendance
//!   windows, one per class level
//! - Check-in: the two-phase QR + biometric presence proof
//! - Reconciliation: draining session progress into durable, de-duplicated
//!   attendance records

pub mod biometric;
pub mod checkin;
pub mod controller;
mod error;
pub mod ledger;
pub mod qr;
pub mod reconcile;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use biometric::{AlwaysReject, BiometricVerifier, Deterministic, FaceSample};
pub use controller::{OpenSession, SessionConfig, SessionController};
pub use error::SessionError;
pub use ledger::{AttendanceRecord, Ledger, LedgerError, NewAttendance, Student};
pub use qr::{QrError, QrPayload};
pub use reconcile::FinalizeSummary;
pub use session::{CheckinProgress, Session, SessionSnapshot, SessionStore, StudentProgress};
pub use types::{Actor, AttendanceStatus, Matricule, Role, ValidationError};
