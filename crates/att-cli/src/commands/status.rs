//! Status command for showing registry counts and active sessions.

use std::io::Write;

use anyhow::{Context, Result};
use att_db::Database;
use chrono::{SecondsFormat, Utc};

use crate::Config;
use crate::store;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let counts = db.counts()?;
    let sessions = store::load(&config.session_store_path())?;

    writeln!(writer, "Attendance tracker status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(
        writer,
        "Students: {} ({} delegates)",
        counts.students, counts.delegates
    )?;
    writeln!(writer, "Attendance records: {}", counts.attendance)?;

    if sessions.is_empty() {
        writeln!(writer, "No active sessions.")?;
        return Ok(());
    }

    // Expiry never closes a session on its own, so flag the ones whose
    // check-in window has already passed.
    let now = Utc::now();
    writeln!(writer, "Active sessions:")?;
    for session in sessions.iter() {
        let expired = if session.is_expired(now) { " [expired]" } else { "" };
        writeln!(
            writer,
            "- level {}: {} until {} (opened by {}){expired}",
            session.level,
            session.course,
            session.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            session.delegate
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use att_core::{Matricule, Role, Session, SessionStore, Student};
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use insta::assert_snapshot;

    use super::*;

    fn test_config(temp: &tempfile::TempDir) -> Config {
        Config {
            database_path: temp.path().join("att.db"),
            state_dir: temp.path().to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn status_reports_counts_without_sessions() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        let mut db = Database::open(&config.database_path).unwrap();
        db.insert_student(&Student {
            matricule: Matricule::new("STU001").unwrap(),
            name: "Diane Delegate".to_string(),
            level: 1,
            email: "stu001@example.edu".to_string(),
            phone: "655000000".to_string(),
            specialty: "Software Engineering".to_string(),
            role: Role::Delegate,
            picture: None,
        })
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&config.database_path.display().to_string(), "[TEMP]/att.db");
        assert_snapshot!(output, @r"
        Attendance tracker status
        Database: [TEMP]/att.db
        Students: 1 (1 delegates)
        Attendance records: 0
        No active sessions.
        ");
    }

    #[test]
    fn status_lists_active_sessions() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        Database::open(&config.database_path).unwrap();

        let mut sessions = SessionStore::new();
        sessions.insert(Session {
            session_id: "test-session".to_string(),
            course: "DB101".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            lecture_description: String::new(),
            delegate: Matricule::new("STU001").unwrap(),
            level: 1,
            opened_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 30, 0).unwrap(),
            progress: BTreeMap::new(),
        });
        sessions.insert(Session {
            session_id: "test-session-2".to_string(),
            course: "NET205".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            lecture_description: String::new(),
            delegate: Matricule::new("STU009").unwrap(),
            level: 2,
            opened_at: Utc.with_ymd_and_hms(2099, 1, 1, 9, 0, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2099, 1, 1, 9, 30, 0).unwrap(),
            progress: BTreeMap::new(),
        });
        store::save(&config.session_store_path(), &sessions).unwrap();

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&config.database_path.display().to_string(), "[TEMP]/att.db");
        assert_snapshot!(output, @r"
        Attendance tracker status
        Database: [TEMP]/att.db
        Students: 0 (0 delegates)
        Attendance records: 0
        Active sessions:
        - level 1: DB101 until 2024-02-01T10:30:00Z (opened by STU001) [expired]
        - level 2: NET205 until 2099-01-01T09:30:00Z (opened by STU009)
        ");
    }
}
