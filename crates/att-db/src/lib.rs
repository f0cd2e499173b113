//! SQLite storage layer for the attendance tracker.
//!
//! Provides persistence for the student registry and finalized attendance
//! records using `rusqlite`, and implements the `att_core::Ledger` trait so
//! the session engine can run against it.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. A `Database` instance can be moved between threads but cannot
//! be shared across threads without external synchronization (e.g. a
//! `Mutex<Database>`).
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format (e.g.,
//! `2024-02-01T10:00:00.000Z`). Lexicographic ordering matches chronological
//! ordering, values stay human-readable, and everything is UTC. Lookups by
//! the attendance de-duplication key compare these strings for equality, so
//! every write goes through the same formatter.
//!
//! ## De-duplication
//!
//! At most one attendance row should exist per (matricule, course,
//! `scheduled_at`). That rule belongs to the reconciliation engine and the
//! pre-insert guard here, deliberately not to a UNIQUE constraint: the index
//! on the key only serves lookups.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use thiserror::Error;

use att_core::ledger::{AttendanceRecord, Ledger, LedgerError, NewAttendance, Student};
use att_core::types::{AttendanceStatus, Matricule, Role};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored attendance timestamp.
    #[error("invalid timestamp for attendance {record_id}: {timestamp}")]
    TimestampParse {
        record_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value failed domain validation on the way out.
    #[error("invalid stored value in {column}: {message}")]
    InvalidColumn {
        column: &'static str,
        message: String,
    },
    /// Insert of a student whose matricule is already registered.
    #[error("student already registered: {matricule}")]
    StudentExists { matricule: String },
    /// An operation referenced a student that is not registered.
    #[error("student not found: {matricule}")]
    StudentNotFound { matricule: String },
    /// An operation referenced an attendance record that does not exist.
    #[error("attendance record not found: {id}")]
    AttendanceNotFound { id: i64 },
    /// A write hit an existing record for the same de-duplication key.
    #[error("attendance already recorded for {matricule} in {course} at {scheduled_at}")]
    DuplicateAttendance {
        matricule: String,
        course: String,
        scheduled_at: DateTime<Utc>,
    },
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateAttendance {
                matricule,
                course,
                scheduled_at,
            } => Self::DuplicateAttendance {
                matricule,
                course,
                scheduled_at,
            },
            other => Self::storage(other),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Filters for browsing attendance history. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub matricule: Option<Matricule>,
    pub level: Option<i64>,
    pub course: Option<String>,
}

/// An attendance record joined with the student it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEntry {
    pub record: AttendanceRecord,
    pub student_name: String,
    pub level: i64,
}

/// Registry totals for the status overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerCounts {
    pub students: i64,
    pub delegates: i64,
    pub attendance: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS students (
                matricule TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                level INTEGER NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL DEFAULT '',
                specialty TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL DEFAULT 'student',
                picture TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_students_level ON students(level);

            -- Attendance table: finalized records only
            -- scheduled_at: ISO 8601, the course session's timetabled time
            -- (matricule, course, scheduled_at) is the de-duplication key;
            -- the index serves lookups and is intentionally not UNIQUE
            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                matricule TEXT NOT NULL,
                course TEXT NOT NULL,
                scheduled_at TEXT NOT NULL,
                qr_scanned INTEGER NOT NULL DEFAULT 0,
                biometric_verified INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                lecture_description TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (matricule) REFERENCES students(matricule) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_attendance_key
                ON attendance(matricule, course, scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_attendance_course ON attendance(course);
            CREATE INDEX IF NOT EXISTS idx_attendance_scheduled ON attendance(scheduled_at);
            ",
        )?;
        Ok(())
    }

    /// Registers a new student.
    pub fn insert_student(&mut self, student: &Student) -> Result<(), DbError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM students WHERE matricule = ?",
                [student.matricule.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(DbError::StudentExists {
                matricule: student.matricule.to_string(),
            });
        }

        self.conn.execute(
            "
            INSERT INTO students (matricule, name, level, email, phone, specialty, role, picture)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                student.matricule.as_str(),
                student.name,
                student.level,
                student.email,
                student.phone,
                student.specialty,
                student.role.as_str(),
                student.picture,
            ],
        )?;
        tracing::debug!(matricule = %student.matricule, level = student.level, "student registered");
        Ok(())
    }

    /// Looks up a student by matricule.
    pub fn get_student(&self, matricule: &Matricule) -> Result<Option<Student>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT matricule, name, level, email, phone, specialty, role, picture
                FROM students
                WHERE matricule = ?
                ",
                [matricule.as_str()],
                student_row,
            )
            .optional()?;
        row.map(student_from_row).transpose()
    }

    /// Lists students, optionally restricted to one level, ordered by level
    /// then matricule.
    pub fn list_students(&self, level: Option<i64>) -> Result<Vec<Student>, DbError> {
        let mut sql = String::from(
            "
            SELECT matricule, name, level, email, phone, specialty, role, picture
            FROM students
            ",
        );
        let mut params_vec: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(level) = level {
            sql.push_str("WHERE level = ?\n");
            params_vec.push(level.into());
        }
        sql.push_str("ORDER BY level ASC, matricule ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params_vec), student_row)?;
        let mut students = Vec::new();
        for row in rows {
            students.push(student_from_row(row?)?);
        }
        Ok(students)
    }

    /// Rewrites every mutable field of a student row.
    pub fn update_student(&mut self, student: &Student) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "
            UPDATE students
            SET name = ?, level = ?, email = ?, phone = ?, specialty = ?, role = ?, picture = ?
            WHERE matricule = ?
            ",
            params![
                student.name,
                student.level,
                student.email,
                student.phone,
                student.specialty,
                student.role.as_str(),
                student.picture,
                student.matricule.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(DbError::StudentNotFound {
                matricule: student.matricule.to_string(),
            });
        }
        Ok(())
    }

    /// Changes a student's role, e.g. appointing a level delegate.
    pub fn set_role(&mut self, matricule: &Matricule, role: Role) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE students SET role = ? WHERE matricule = ?",
            params![role.as_str(), matricule.as_str()],
        )?;
        if updated == 0 {
            return Err(DbError::StudentNotFound {
                matricule: matricule.to_string(),
            });
        }
        tracing::info!(matricule = %matricule, role = %role, "role changed");
        Ok(())
    }

    /// Removes a student and, via the foreign key cascade, their attendance.
    pub fn delete_student(&mut self, matricule: &Matricule) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM students WHERE matricule = ?",
            [matricule.as_str()],
        )?;
        if deleted == 0 {
            return Err(DbError::StudentNotFound {
                matricule: matricule.to_string(),
            });
        }
        tracing::info!(matricule = %matricule, "student removed");
        Ok(())
    }

    /// Promotes every student below the ceiling by one level.
    ///
    /// Returns the number of students promoted.
    pub fn promote_all(&mut self, level_ceiling: i64) -> Result<usize, DbError> {
        let promoted = self.conn.execute(
            "UPDATE students SET level = level + 1 WHERE level < ?",
            [level_ceiling],
        )?;
        tracing::info!(promoted, level_ceiling, "promotion applied");
        Ok(promoted)
    }

    /// Looks up an attendance record by its de-duplication key.
    pub fn find_attendance(
        &self,
        matricule: &Matricule,
        course: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, matricule, course, scheduled_at, qr_scanned, biometric_verified,
                       status, lecture_description
                FROM attendance
                WHERE matricule = ? AND course = ? AND scheduled_at = ?
                ",
                params![
                    matricule.as_str(),
                    course,
                    format_timestamp(scheduled_at)
                ],
                attendance_row,
            )
            .optional()?;
        row.map(record_from_row).transpose()
    }

    /// Inserts one attendance record, guarding the de-duplication key.
    pub fn insert_attendance(
        &mut self,
        record: NewAttendance,
    ) -> Result<AttendanceRecord, DbError> {
        let tx = self.conn.transaction()?;
        let scheduled = format_timestamp(record.scheduled_at);

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM attendance WHERE matricule = ? AND course = ? AND scheduled_at = ?",
                params![record.matricule.as_str(), record.course, scheduled],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(DbError::DuplicateAttendance {
                matricule: record.matricule.to_string(),
                course: record.course,
                scheduled_at: record.scheduled_at,
            });
        }

        tx.execute(
            "
            INSERT INTO attendance
            (matricule, course, scheduled_at, qr_scanned, biometric_verified, status, lecture_description)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                record.matricule.as_str(),
                record.course,
                scheduled,
                record.qr_scanned,
                record.biometric_verified,
                record.status.as_str(),
                record.lecture_description,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(record.with_id(id))
    }

    /// Inserts a batch of attendance records in one transaction.
    ///
    /// A duplicate key anywhere in the batch aborts the whole batch; nothing
    /// is committed.
    pub fn insert_attendance_batch(
        &mut self,
        records: Vec<NewAttendance>,
    ) -> Result<Vec<AttendanceRecord>, DbError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let tx = self.conn.transaction()?;
        let mut inserted = Vec::with_capacity(records.len());
        {
            let mut exists_stmt = tx.prepare(
                "SELECT id FROM attendance WHERE matricule = ? AND course = ? AND scheduled_at = ?",
            )?;
            let mut insert_stmt = tx.prepare(
                "
                INSERT INTO attendance
                (matricule, course, scheduled_at, qr_scanned, biometric_verified, status, lecture_description)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for record in records {
                let scheduled = format_timestamp(record.scheduled_at);
                let existing: Option<i64> = exists_stmt
                    .query_row(
                        params![record.matricule.as_str(), record.course, scheduled],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_some() {
                    // Dropping the transaction rolls back the whole batch.
                    return Err(DbError::DuplicateAttendance {
                        matricule: record.matricule.to_string(),
                        course: record.course,
                        scheduled_at: record.scheduled_at,
                    });
                }
                insert_stmt.execute(params![
                    record.matricule.as_str(),
                    record.course,
                    scheduled,
                    record.qr_scanned,
                    record.biometric_verified,
                    record.status.as_str(),
                    record.lecture_description,
                ])?;
                let id = tx.last_insert_rowid();
                inserted.push(record.with_id(id));
            }
        }
        tx.commit()?;
        tracing::debug!(count = inserted.len(), "attendance batch committed");
        Ok(inserted)
    }

    /// Lists attendance joined with student names, newest first.
    pub fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceEntry>, DbError> {
        let mut sql = String::from(
            "
            SELECT a.id, a.matricule, a.course, a.scheduled_at, a.qr_scanned,
                   a.biometric_verified, a.status, a.lecture_description,
                   s.name, s.level
            FROM attendance a
            JOIN students s ON s.matricule = a.matricule
            ",
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut params_vec: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(matricule) = &filter.matricule {
            clauses.push("a.matricule = ?");
            params_vec.push(matricule.to_string().into());
        }
        if let Some(level) = filter.level {
            clauses.push("s.level = ?");
            params_vec.push(level.into());
        }
        if let Some(course) = &filter.course {
            clauses.push("a.course = ?");
            params_vec.push(course.clone().into());
        }
        if !clauses.is_empty() {
            sql.push_str("WHERE ");
            sql.push_str(&clauses.join(" AND "));
            sql.push('\n');
        }
        sql.push_str("ORDER BY a.scheduled_at DESC, a.matricule ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params_vec), |row| {
            let record = attendance_row(row)?;
            let student_name: String = row.get(8)?;
            let level: i64 = row.get(9)?;
            Ok((record, student_name, level))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (raw, student_name, level) = row?;
            entries.push(AttendanceEntry {
                record: record_from_row(raw)?,
                student_name,
                level,
            });
        }
        Ok(entries)
    }

    /// Deletes one attendance record by id.
    pub fn delete_attendance(&mut self, id: i64) -> Result<(), DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM attendance WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(DbError::AttendanceNotFound { id });
        }
        tracing::info!(id, "attendance record deleted");
        Ok(())
    }

    /// Registry totals for the status overview.
    pub fn counts(&self) -> Result<LedgerCounts, DbError> {
        let students: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        let delegates: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM students WHERE role = 'delegate'",
            [],
            |row| row.get(0),
        )?;
        let attendance: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;
        Ok(LedgerCounts {
            students,
            delegates,
            attendance,
        })
    }
}

impl Ledger for Database {
    fn get_student(&self, matricule: &Matricule) -> Result<Option<Student>, LedgerError> {
        Ok(Database::get_student(self, matricule)?)
    }

    fn list_students_by_level(&self, level: i64) -> Result<Vec<Student>, LedgerError> {
        Ok(self.list_students(Some(level))?)
    }

    fn find_attendance(
        &self,
        matricule: &Matricule,
        course: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        Ok(Database::find_attendance(self, matricule, course, scheduled_at)?)
    }

    fn insert_attendance(
        &mut self,
        record: NewAttendance,
    ) -> Result<AttendanceRecord, LedgerError> {
        Ok(Database::insert_attendance(self, record)?)
    }

    fn insert_attendance_batch(
        &mut self,
        records: Vec<NewAttendance>,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        Ok(Database::insert_attendance_batch(self, records)?)
    }

    fn promote_all(&mut self, level_ceiling: i64) -> Result<usize, LedgerError> {
        Ok(Database::promote_all(self, level_ceiling)?)
    }
}

/// Raw student row before domain validation.
#[derive(Debug)]
struct StudentRow {
    matricule: String,
    name: String,
    level: i64,
    email: String,
    phone: String,
    specialty: String,
    role: String,
    picture: Option<String>,
}

fn student_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        matricule: row.get(0)?,
        name: row.get(1)?,
        level: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        specialty: row.get(5)?,
        role: row.get(6)?,
        picture: row.get(7)?,
    })
}

fn student_from_row(row: StudentRow) -> Result<Student, DbError> {
    let StudentRow {
        matricule,
        name,
        level,
        email,
        phone,
        specialty,
        role,
        picture,
    } = row;
    let matricule = Matricule::new(matricule).map_err(|e| DbError::InvalidColumn {
        column: "students.matricule",
        message: e.to_string(),
    })?;
    let role = role.parse::<Role>().map_err(|e| DbError::InvalidColumn {
        column: "students.role",
        message: e.to_string(),
    })?;
    Ok(Student {
        matricule,
        name,
        level,
        email,
        phone,
        specialty,
        role,
        picture,
    })
}

/// Raw attendance row before domain validation.
#[derive(Debug)]
struct AttendanceRow {
    id: i64,
    matricule: String,
    course: String,
    scheduled_at: String,
    qr_scanned: bool,
    biometric_verified: bool,
    status: String,
    lecture_description: String,
}

fn attendance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRow> {
    Ok(AttendanceRow {
        id: row.get(0)?,
        matricule: row.get(1)?,
        course: row.get(2)?,
        scheduled_at: row.get(3)?,
        qr_scanned: row.get(4)?,
        biometric_verified: row.get(5)?,
        status: row.get(6)?,
        lecture_description: row.get(7)?,
    })
}

fn record_from_row(row: AttendanceRow) -> Result<AttendanceRecord, DbError> {
    let AttendanceRow {
        id,
        matricule,
        course,
        scheduled_at,
        qr_scanned,
        biometric_verified,
        status,
        lecture_description,
    } = row;
    let scheduled_at = parse_timestamp(&scheduled_at, id)?;
    let matricule = Matricule::new(matricule).map_err(|e| DbError::InvalidColumn {
        column: "attendance.matricule",
        message: e.to_string(),
    })?;
    let status = status
        .parse::<AttendanceStatus>()
        .map_err(|e| DbError::InvalidColumn {
            column: "attendance.status",
            message: e.to_string(),
        })?;
    Ok(AttendanceRecord {
        id,
        matricule,
        course,
        scheduled_at,
        qr_scanned,
        biometric_verified,
        status,
        lecture_description,
    })
}

fn parse_timestamp(timestamp: &str, record_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
