//! Promote command for advancing students to the next level.

use std::io::Write;

use anyhow::{Context, Result};
use att_db::Database;
use clap::Args;

use crate::Config;

#[derive(Debug, Args)]
pub struct PromoteArgs {
    /// Highest level to raise students to; defaults to the configured ceiling.
    #[arg(long)]
    pub ceiling: Option<i64>,
}

pub fn run<W: Write>(writer: &mut W, args: &PromoteArgs, config: &Config) -> Result<()> {
    let ceiling = args.ceiling.unwrap_or(config.promotion_ceiling);
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let promoted = db.promote_all(ceiling)?;
    writeln!(
        writer,
        "Promoted {promoted} students below level {ceiling}."
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use att_core::{Matricule, Role, Student};
    use insta::assert_snapshot;

    use super::*;

    fn test_config(temp: &tempfile::TempDir) -> Config {
        Config {
            database_path: temp.path().join("att.db"),
            state_dir: temp.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn seed(config: &Config, levels: &[i64]) {
        let mut db = Database::open(&config.database_path).unwrap();
        for (i, level) in levels.iter().enumerate() {
            db.insert_student(&Student {
                matricule: Matricule::new(format!("STU{i:03}")).unwrap(),
                name: format!("Student {i}"),
                level: *level,
                email: format!("stu{i:03}@example.edu"),
                phone: "655000000".to_string(),
                specialty: "Software Engineering".to_string(),
                role: Role::Student,
                picture: None,
            })
            .unwrap();
        }
    }

    #[test]
    fn promote_respects_ceiling() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        seed(&config, &[1, 3, 4]);

        let mut output = Vec::new();
        let args = PromoteArgs { ceiling: None };
        run(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"Promoted 2 students below level 4.");

        let db = Database::open(&config.database_path).unwrap();
        let levels: Vec<i64> = db
            .list_students(None)
            .unwrap()
            .iter()
            .map(|s| s.level)
            .collect();
        assert_eq!(levels, vec![2, 4, 4]);
    }

    #[test]
    fn promote_with_explicit_ceiling() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(&temp);
        seed(&config, &[1, 2]);

        let mut output = Vec::new();
        let args = PromoteArgs { ceiling: Some(2) };
        run(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"Promoted 1 students below level 2.");
    }
}
