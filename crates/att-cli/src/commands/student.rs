//! Student registry commands.

use std::io::Write;

use anyhow::{Context, Result, bail};
use att_core::{Matricule, Role, Student};
use att_db::Database;
use clap::Args;

use crate::Config;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Enrollment code, alphanumeric.
    pub matricule: String,
    /// Full name.
    #[arg(long)]
    pub name: String,
    /// Class/year grouping the student belongs to.
    #[arg(long)]
    pub level: i64,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub specialty: String,
    /// Reference picture path for biometric verification.
    #[arg(long)]
    pub picture: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show students at this level.
    #[arg(long)]
    pub level: Option<i64>,
    /// Output as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Enrollment code of the student to update.
    pub matricule: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub level: Option<i64>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub specialty: Option<String>,
    #[arg(long)]
    pub picture: Option<String>,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Enrollment code of the student to remove.
    pub matricule: String,
}

#[derive(Debug, Args)]
pub struct AssignDelegateArgs {
    /// Enrollment code of the student to appoint.
    pub matricule: String,
}

pub fn add<W: Write>(writer: &mut W, args: &AddArgs, config: &Config) -> Result<()> {
    let matricule = Matricule::new(args.matricule.as_str())?;
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let student = Student {
        matricule,
        name: args.name.clone(),
        level: args.level,
        email: args.email.clone(),
        phone: args.phone.clone(),
        specialty: args.specialty.clone(),
        role: Role::Student,
        picture: args.picture.clone(),
    };
    db.insert_student(&student)?;

    writeln!(
        writer,
        "Registered {} ({}) at level {}",
        student.name, student.matricule, student.level
    )?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, args: &ListArgs, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let students = db.list_students(args.level)?;

    if args.json {
        let json = serde_json::to_string_pretty(&students)?;
        writeln!(writer, "{json}")?;
        return Ok(());
    }

    if students.is_empty() {
        writeln!(writer, "No students registered.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<12} {:<24} {:<6} {:<10} EMAIL",
        "MATRICULE", "NAME", "LEVEL", "ROLE"
    )?;
    for student in &students {
        writeln!(
            writer,
            "{:<12} {:<24} {:<6} {:<10} {}",
            student.matricule.as_str(),
            student.name,
            student.level,
            student.role.as_str(),
            student.email
        )?;
    }
    Ok(())
}

pub fn update<W: Write>(writer: &mut W, args: &UpdateArgs, config: &Config) -> Result<()> {
    let matricule = Matricule::new(args.matricule.as_str())?;
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let Some(mut student) = db.get_student(&matricule)? else {
        bail!("student not found: {matricule}");
    };
    if let Some(name) = &args.name {
        student.name = name.clone();
    }
    if let Some(level) = args.level {
        student.level = level;
    }
    if let Some(email) = &args.email {
        student.email = email.clone();
    }
    if let Some(phone) = &args.phone {
        student.phone = phone.clone();
    }
    if let Some(specialty) = &args.specialty {
        student.specialty = specialty.clone();
    }
    if let Some(picture) = &args.picture {
        student.picture = Some(picture.clone());
    }
    db.update_student(&student)?;

    writeln!(writer, "Updated {}", student.matricule)?;
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, args: &RemoveArgs, config: &Config) -> Result<()> {
    let matricule = Matricule::new(args.matricule.as_str())?;
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    db.delete_student(&matricule)?;

    writeln!(writer, "Removed {matricule} and their attendance records")?;
    Ok(())
}

/// Appoints a student as their level's delegate, demoting any current one.
pub fn assign_delegate<W: Write>(
    writer: &mut W,
    args: &AssignDelegateArgs,
    config: &Config,
) -> Result<()> {
    let matricule = Matricule::new(args.matricule.as_str())?;
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let Some(student) = db.get_student(&matricule)? else {
        bail!("student not found: {matricule}");
    };

    let peers = db.list_students(Some(student.level))?;
    for peer in peers {
        if peer.role == Role::Delegate && peer.matricule != student.matricule {
            db.set_role(&peer.matricule, Role::Student)?;
            writeln!(writer, "Demoted previous delegate {}", peer.matricule)?;
        }
    }

    db.set_role(&student.matricule, Role::Delegate)?;
    writeln!(
        writer,
        "{} is now the delegate for level {}",
        student.matricule, student.level
    )?;
    Ok(())
}
