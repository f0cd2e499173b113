//! Init command for creating the database and state directory.

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use att_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    if let Some(parent) = config.database_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("failed to create {}", config.state_dir.display()))?;

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let counts = db.counts()?;

    writeln!(writer, "Database:      {}", config.database_path.display())?;
    writeln!(
        writer,
        "Session state: {}",
        config.session_store_path().display()
    )?;
    writeln!(writer, "Students:      {}", counts.students)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn init_creates_database_and_reports_paths() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("data").join("att.db"),
            state_dir: temp.path().join("state"),
            ..Config::default()
        };

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        assert!(config.database_path.exists());
        assert!(config.state_dir.exists());

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&temp.path().display().to_string(), "[TEMP]");
        assert_snapshot!(output, @r"
        Database:      [TEMP]/data/att.db
        Session state: [TEMP]/state/sessions.json
        Students:      0
        ");
    }

    #[test]
    fn init_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("att.db"),
            state_dir: temp.path().to_path_buf(),
            ..Config::default()
        };

        run(&mut Vec::new(), &config).unwrap();
        run(&mut Vec::new(), &config).unwrap();
    }
}
