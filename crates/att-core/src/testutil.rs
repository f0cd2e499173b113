//! In-memory ledger and fixtures shared across engine tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::ledger::{AttendanceRecord, Ledger, LedgerError, NewAttendance, Student};
use crate::types::{Matricule, Role};

/// A `Ledger` backed by plain collections.
///
/// `fail_writes` turns every write into a storage error, for exercising the
/// fatal-propagation paths.
#[derive(Debug, Default)]
pub(crate) struct MemoryLedger {
    students: BTreeMap<Matricule, Student>,
    records: Vec<AttendanceRecord>,
    next_id: i64,
    pub(crate) fail_writes: bool,
}

impl MemoryLedger {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub(crate) fn with_students(students: impl IntoIterator<Item = Student>) -> Self {
        let mut ledger = Self::new();
        for student in students {
            ledger.add_student(student);
        }
        ledger
    }

    pub(crate) fn add_student(&mut self, student: Student) {
        self.students.insert(student.matricule.clone(), student);
    }

    pub(crate) fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub(crate) fn record_for(&self, matricule: &str) -> Option<&AttendanceRecord> {
        self.records
            .iter()
            .find(|r| r.matricule.as_str() == matricule)
    }

    fn is_duplicate<'a>(
        &'a self,
        staged: &'a [AttendanceRecord],
        new: &NewAttendance,
    ) -> Option<&'a AttendanceRecord> {
        self.records.iter().chain(staged.iter()).find(|r| {
            r.matricule == new.matricule
                && r.course == new.course
                && r.scheduled_at == new.scheduled_at
        })
    }

    fn storage_failure() -> LedgerError {
        LedgerError::storage(std::io::Error::other("simulated storage failure"))
    }
}

impl Ledger for MemoryLedger {
    fn get_student(&self, matricule: &Matricule) -> Result<Option<Student>, LedgerError> {
        Ok(self.students.get(matricule).cloned())
    }

    fn list_students_by_level(&self, level: i64) -> Result<Vec<Student>, LedgerError> {
        Ok(self
            .students
            .values()
            .filter(|s| s.level == level)
            .cloned()
            .collect())
    }

    fn find_attendance(
        &self,
        matricule: &Matricule,
        course: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        Ok(self
            .records
            .iter()
            .find(|r| {
                r.matricule == *matricule && r.course == course && r.scheduled_at == scheduled_at
            })
            .cloned())
    }

    fn insert_attendance(
        &mut self,
        record: NewAttendance,
    ) -> Result<AttendanceRecord, LedgerError> {
        let mut inserted = self.insert_attendance_batch(vec![record])?;
        Ok(inserted.remove(0))
    }

    fn insert_attendance_batch(
        &mut self,
        records: Vec<NewAttendance>,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        if self.fail_writes {
            return Err(Self::storage_failure());
        }

        let mut staged: Vec<AttendanceRecord> = Vec::with_capacity(records.len());
        for new in records {
            if let Some(existing) = self.is_duplicate(&staged, &new) {
                return Err(LedgerError::DuplicateAttendance {
                    matricule: existing.matricule.to_string(),
                    course: existing.course.clone(),
                    scheduled_at: existing.scheduled_at,
                });
            }
            let id = self.next_id;
            self.next_id += 1;
            staged.push(new.with_id(id));
        }

        self.records.extend(staged.iter().cloned());
        Ok(staged)
    }

    fn promote_all(&mut self, level_ceiling: i64) -> Result<usize, LedgerError> {
        if self.fail_writes {
            return Err(Self::storage_failure());
        }

        let mut promoted = 0;
        for student in self.students.values_mut() {
            if student.level < level_ceiling {
                student.level += 1;
                promoted += 1;
            }
        }
        Ok(promoted)
    }
}

/// Builds a student row with placeholder contact details.
pub(crate) fn student(code: &str, name: &str, level: i64, role: Role) -> Student {
    Student {
        matricule: Matricule::new(code).unwrap(),
        name: name.to_string(),
        level,
        email: format!("{}@example.edu", code.to_lowercase()),
        phone: "600000000".to_string(),
        specialty: "Software Engineering".to_string(),
        role,
        picture: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::AttendanceStatus;

    fn new_record(code: &str) -> NewAttendance {
        NewAttendance {
            matricule: Matricule::new(code).unwrap(),
            course: "DB101".to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
            qr_scanned: false,
            biometric_verified: false,
            status: AttendanceStatus::Absent,
            lecture_description: String::new(),
        }
    }

    #[test]
    fn batch_rejects_duplicates_without_partial_writes() {
        let mut ledger = MemoryLedger::new();
        ledger.insert_attendance(new_record("STU001")).unwrap();

        let err = ledger
            .insert_attendance_batch(vec![new_record("STU002"), new_record("STU001")])
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAttendance { .. }));

        // STU002 must not have been committed by the failed batch.
        assert_eq!(ledger.records().len(), 1);
        assert!(ledger.record_for("STU002").is_none());
    }

    #[test]
    fn promote_all_respects_ceiling() {
        let mut ledger = MemoryLedger::with_students([
            student("STU001", "A", 1, Role::Student),
            student("STU002", "B", 3, Role::Student),
            student("STU003", "C", 4, Role::Student),
        ]);

        let promoted = ledger.promote_all(4).unwrap();
        assert_eq!(promoted, 2);

        let levels: Vec<i64> = ["STU001", "STU002", "STU003"]
            .iter()
            .map(|code| {
                ledger
                    .get_student(&Matricule::new(*code).unwrap())
                    .unwrap()
                    .unwrap()
                    .level
            })
            .collect();
        assert_eq!(levels, vec![2, 4, 4]);
    }
}
