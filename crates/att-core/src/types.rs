//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The matricule contained characters outside `[A-Za-z0-9]`.
    #[error("matricule must be alphanumeric, got {value:?}")]
    InvalidMatricule { value: String },

    /// Invalid role value.
    #[error("invalid role: {value}")]
    InvalidRole { value: String },

    /// Invalid attendance status value.
    #[error("invalid attendance status: {value}")]
    InvalidStatus { value: String },
}

/// A validated student enrollment code.
///
/// Matricules must be non-empty and strictly alphanumeric. The character
/// restriction matters: the QR token format uses `-` as its field separator,
/// so a matricule containing one would produce undecodable tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Matricule(String);

impl Matricule {
    /// Creates a new matricule after validation.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.is_empty() {
            return Err(ValidationError::Empty { field: "matricule" });
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidMatricule { value: code });
        }
        Ok(Self(code))
    }

    /// Returns the matricule as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Matricule {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Matricule> for String {
    fn from(code: Matricule) -> Self {
        code.0
    }
}

impl fmt::Display for Matricule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Matricule {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Role of an actor in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular student who checks in against sessions.
    #[default]
    Student,
    /// A class delegate who opens and closes sessions for their level.
    Delegate,
    /// An administrator managing the registry.
    Admin,
}

impl Role {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Delegate => "delegate",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "delegate" => Ok(Self::Delegate),
            "admin" => Ok(Self::Admin),
            _ => Err(ValidationError::InvalidRole {
                value: s.to_string(),
            }),
        }
    }
}

/// Final status of a reconciled attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            _ => Err(ValidationError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// An authenticated actor, as provided by the identity layer.
///
/// The core never authenticates anyone; callers hand it an actor that has
/// already passed whatever identity checks apply upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub matricule: Matricule,
    pub role: Role,
    /// Class/year grouping the actor belongs to.
    pub level: i64,
}

impl Actor {
    pub fn new(matricule: Matricule, role: Role, level: i64) -> Self {
        Self {
            matricule,
            role,
            level,
        }
    }
}
