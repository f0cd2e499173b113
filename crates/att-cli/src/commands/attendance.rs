//! Attendance history commands.

use std::io::Write;

use anyhow::{Context, Result};
use att_core::Matricule;
use att_db::{AttendanceFilter, Database};
use chrono::SecondsFormat;
use clap::Args;

use crate::Config;

#[derive(Debug, Args)]
pub struct ListRecordsArgs {
    /// Only records for this student.
    #[arg(long)]
    pub matricule: Option<String>,
    /// Only records for students at this level.
    #[arg(long)]
    pub level: Option<i64>,
    /// Only records for this course.
    #[arg(long)]
    pub course: Option<String>,
    /// Output as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Id of the record to delete.
    pub id: i64,
}

pub fn list<W: Write>(writer: &mut W, args: &ListRecordsArgs, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let filter = AttendanceFilter {
        matricule: args
            .matricule
            .as_deref()
            .map(Matricule::new)
            .transpose()?,
        level: args.level,
        course: args.course.clone(),
    };
    let entries = db.list_attendance(&filter)?;

    if args.json {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "id": entry.record.id,
                    "matricule": entry.record.matricule.as_str(),
                    "name": entry.student_name,
                    "level": entry.level,
                    "course": entry.record.course,
                    "scheduled_at": entry
                        .record
                        .scheduled_at
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                    "qr_scanned": entry.record.qr_scanned,
                    "biometric_verified": entry.record.biometric_verified,
                    "status": entry.record.status.as_str(),
                    "lecture_description": entry.record.lecture_description,
                })
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&items)?)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(writer, "No attendance records.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<5} {:<12} {:<20} {:<10} {:<21} STATUS",
        "ID", "MATRICULE", "NAME", "COURSE", "SCHEDULED"
    )?;
    for entry in &entries {
        let scheduled = entry
            .record
            .scheduled_at
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        writeln!(
            writer,
            "{:<5} {:<12} {:<20} {:<10} {:<21} {}",
            entry.record.id,
            entry.record.matricule.as_str(),
            entry.student_name,
            entry.record.course,
            scheduled,
            entry.record.status.as_str()
        )?;
    }
    Ok(())
}

pub fn delete<W: Write>(writer: &mut W, args: &DeleteArgs, config: &Config) -> Result<()> {
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    db.delete_attendance(args.id)?;
    writeln!(writer, "Deleted attendance record {}", args.id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use att_core::{AttendanceStatus, NewAttendance, Role, Student};
    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;

    use super::*;

    fn test_config(temp: &tempfile::TempDir) -> Config {
        Config {
            database_path: temp.path().join("att.db"),
            state_dir: temp.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn seed_records(config: &Config) {
        let mut db = Database::open(&config.database_path).unwrap();
        for (code, name, level) in [
            ("STU001", "Alice Atangana", 1),
            ("STU002", "Brian Bekolo", 2),
        ] {
            db.insert_student(&Student {
                matricule: Matricule::new(code).unwrap(),
                name: name.to_string(),
                level,
                email: format!("{}@example.edu", code.to_lowercase()),
                phone: "655000000".to_string(),
                specialty: "Software Engineering".to_string(),
                role: Role::Student,
                picture: None,
            })
            .unwrap();
        }

        for (code, course, hour, status) in [
            ("STU001", "DB101", 10, AttendanceStatus::Present),
            ("STU002", "NET202", 12, AttendanceStatus::Absent),
        ] {
            db.insert_attendance(NewAttendance {
                matricule: Matricule::new(code).unwrap(),
                course: course.to_string(),
                scheduled_at: Utc.with_ymd_and_hms(2024, 2, 1, hour, 0, 0).unwrap(),
                qr_scanned: status == AttendanceStatus::Present,
                biometric_verified: status == AttendanceStatus::Present,
                status,
                lecture_description: String::new(),
            })
            .unwrap();
        }
    }

    #[test]
    fn list_renders_table_newest_first() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        seed_records(&config);

        let mut output = Vec::new();
        let args = ListRecordsArgs {
            matricule: None,
            level: None,
            course: None,
            json: false,
        };
        list(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        ID    MATRICULE    NAME                 COURSE     SCHEDULED             STATUS
        2     STU002       Brian Bekolo         NET202     2024-02-01T12:00:00Z  absent
        1     STU001       Alice Atangana       DB101      2024-02-01T10:00:00Z  present
        ");
    }

    #[test]
    fn list_filters_by_course() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        seed_records(&config);

        let mut output = Vec::new();
        let args = ListRecordsArgs {
            matricule: None,
            level: None,
            course: Some("DB101".to_string()),
            json: false,
        };
        list(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("STU001"));
        assert!(!output.contains("STU002"));
    }

    #[test]
    fn list_json_carries_flags() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        seed_records(&config);

        let mut output = Vec::new();
        let args = ListRecordsArgs {
            matricule: Some("STU001".to_string()),
            level: None,
            course: None,
            json: true,
        };
        list(&mut output, &args, &config).unwrap();

        let items: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["matricule"], "STU001");
        assert_eq!(items[0]["status"], "present");
        assert_eq!(items[0]["qr_scanned"], true);
        assert_eq!(items[0]["scheduled_at"], "2024-02-01T10:00:00Z");
    }

    #[test]
    fn list_empty_database() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        Database::open(&config.database_path).unwrap();

        let mut output = Vec::new();
        let args = ListRecordsArgs {
            matricule: None,
            level: None,
            course: None,
            json: false,
        };
        list(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"No attendance records.");
    }

    #[test]
    fn delete_removes_record() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        seed_records(&config);

        let mut output = Vec::new();
        let args = DeleteArgs { id: 1 };
        delete(&mut output, &args, &config).unwrap();

        let db = Database::open(&config.database_path).unwrap();
        assert_eq!(db.counts().unwrap().attendance, 1);
    }

    #[test]
    fn delete_unknown_id_fails() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        Database::open(&config.database_path).unwrap();

        let args = DeleteArgs { id: 42 };
        let err = delete(&mut Vec::new(), &args, &config).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
