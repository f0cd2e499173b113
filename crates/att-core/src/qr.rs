//! QR token payload codec.
//!
//! Tokens are plain strings of the form `{matricule}-{course}-{timestamp}`
//! with the timestamp compacted to `YYYYMMDDHHMMSS`. Rendering the string
//! into an actual QR image is a downstream concern; this module only encodes
//! and decodes the payload. Decoding recovers the matricule for check-in and
//! performs no authenticity check.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::types::{Matricule, ValidationError};

/// Compact timestamp layout used inside tokens.
const TOKEN_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Errors from decoding a QR token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QrError {
    /// The token does not have the `matricule-course-timestamp` shape.
    #[error("malformed QR token: {token:?}")]
    Malformed { token: String },

    /// The leading segment is not a valid matricule.
    #[error("invalid matricule in QR token: {0}")]
    Matricule(#[from] ValidationError),

    /// The trailing segment is not a `YYYYMMDDHHMMSS` timestamp.
    #[error("invalid timestamp in QR token: {value:?}")]
    Timestamp { value: String },
}

/// Decoded contents of a QR check-in token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub matricule: Matricule,
    pub course: String,
    /// Timestamp segment binding the token to one course session.
    pub issued_at: DateTime<Utc>,
}

impl QrPayload {
    pub fn new(matricule: Matricule, course: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            matricule,
            course: course.into(),
            issued_at,
        }
    }

    /// Renders the token string.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}-{}-{}",
            self.matricule,
            self.course,
            self.issued_at.format(TOKEN_TIME_FORMAT)
        )
    }

    /// Parses a token string.
    ///
    /// The matricule is split off at the first `-` and the timestamp at the
    /// last, so course labels may themselves contain dashes. Matricules
    /// cannot (validation forbids it), which is what makes the split
    /// unambiguous.
    pub fn decode(token: &str) -> Result<Self, QrError> {
        let malformed = || QrError::Malformed {
            token: token.to_string(),
        };

        let (matricule, rest) = token.split_once('-').ok_or_else(malformed)?;
        let (course, timestamp) = rest.rsplit_once('-').ok_or_else(malformed)?;
        if course.is_empty() {
            return Err(malformed());
        }

        let issued_at = NaiveDateTime::parse_from_str(timestamp, TOKEN_TIME_FORMAT)
            .map_err(|_| QrError::Timestamp {
                value: timestamp.to_string(),
            })?
            .and_utc();

        Ok(Self {
            matricule: Matricule::new(matricule)?,
            course: course.to_string(),
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn encode_matches_wire_shape() {
        let payload = QrPayload::new(
            Matricule::new("STU001").unwrap(),
            "DB101",
            Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
        );
        assert_eq!(payload.encode(), "STU001-DB101-20240201100000");
    }

    #[test]
    fn decode_recovers_fields() {
        let payload = QrPayload::decode("STU001-DB101-20240201100000").unwrap();
        assert_eq!(payload.matricule.as_str(), "STU001");
        assert_eq!(payload.course, "DB101");
        assert_eq!(
            payload.issued_at,
            Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn decode_allows_dashes_in_course() {
        let payload = QrPayload::decode("STU001-INTRO-TO-DB-20240201100000").unwrap();
        assert_eq!(payload.course, "INTRO-TO-DB");
        assert_eq!(payload.matricule.as_str(), "STU001");
    }

    #[test]
    fn decode_rejects_malformed_tokens() {
        assert!(matches!(
            QrPayload::decode("no_separators_here"),
            Err(QrError::Malformed { .. })
        ));
        assert!(matches!(
            QrPayload::decode("STU001-20240201100000"),
            Err(QrError::Malformed { .. })
        ));
        assert!(matches!(
            QrPayload::decode("STU001--20240201100000"),
            Err(QrError::Malformed { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_timestamp() {
        assert!(matches!(
            QrPayload::decode("STU001-DB101-yesterday"),
            Err(QrError::Timestamp { .. })
        ));
    }
}
