//! Session lifecycle commands.
//!
//! Every mutating command follows the same shape: take the store lock, load
//! the persisted sessions, run the controller, and write the store back only
//! when the operation succeeded.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use att_core::{
    AlwaysReject, Deterministic, FaceSample, Matricule, OpenSession, QrPayload, Session,
    SessionController,
};
use att_db::Database;
use att_notify::SessionNotice;
use chrono::{NaiveDate, NaiveTime, SecondsFormat};
use clap::Args;
use tracing::warn;

use crate::Config;
use crate::store;

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Matricule of the delegate opening the session.
    pub delegate: String,
    /// Course code the session covers.
    #[arg(long)]
    pub course: String,
    /// Timetabled date, YYYY-MM-DD.
    #[arg(long)]
    pub date: String,
    /// Timetabled start time, HH:MM.
    #[arg(long)]
    pub time: String,
    /// Lecture description stored on every record.
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Args)]
pub struct CheckinArgs {
    /// Matricule of the student checking in.
    #[arg(long)]
    pub matricule: Option<String>,
    /// Scanned QR token; the matricule is recovered from it.
    #[arg(long, conflicts_with = "matricule")]
    pub token: Option<String>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Matricule of the student verifying.
    #[arg(long)]
    pub matricule: String,
    /// Path to the captured face sample.
    #[arg(long)]
    pub sample: PathBuf,
}

#[derive(Debug, Args)]
pub struct CloseArgs {
    /// Matricule of the delegate closing their session.
    pub delegate: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Level whose active session to display.
    #[arg(long)]
    pub level: i64,
}

pub fn open<W: Write>(writer: &mut W, args: &OpenArgs, config: &Config) -> Result<()> {
    let matricule = Matricule::new(args.delegate.as_str())?;
    let date = NaiveDate::parse_from_str(&args.date, "%Y-%m-%d")
        .with_context(|| format!("invalid date {:?}, expected YYYY-MM-DD", args.date))?;
    let time = NaiveTime::parse_from_str(&args.time, "%H:%M")
        .with_context(|| format!("invalid time {:?}, expected HH:MM", args.time))?;

    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let Some(delegate) = db.get_student(&matricule)? else {
        bail!("student not found: {matricule}");
    };

    let store_path = config.session_store_path();
    let _guard = store::lock(&store_path)?;
    let mut controller =
        SessionController::with_store(config.session_config(), store::load(&store_path)?);
    let session = controller.open_session(
        &mut db,
        &delegate.actor(),
        OpenSession {
            course: args.course.clone(),
            date,
            time,
            lecture_description: args.description.clone(),
        },
    )?;
    store::save(&store_path, controller.store())?;

    writeln!(
        writer,
        "Opened {} for level {}: {} students tracked, check-in window {} min.",
        session.course,
        session.level,
        session.progress.len(),
        config.validity_window_mins
    )?;
    writeln!(writer, "Check-in tokens:")?;
    for student in session.progress.keys() {
        let token =
            QrPayload::new(student.clone(), session.course.clone(), session.scheduled_at())
                .encode();
        writeln!(writer, "  {token}")?;
    }

    notify_opened(config, &session);
    Ok(())
}

pub fn checkin<W: Write>(writer: &mut W, args: &CheckinArgs, config: &Config) -> Result<()> {
    let matricule = match (&args.matricule, &args.token) {
        (Some(code), None) => Matricule::new(code.as_str())?,
        (None, Some(token)) => QrPayload::decode(token)?.matricule,
        _ => bail!("provide either --matricule or --token"),
    };

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let store_path = config.session_store_path();
    let _guard = store::lock(&store_path)?;
    let mut controller =
        SessionController::with_store(config.session_config(), store::load(&store_path)?);
    controller.submit_checkin(&db, &matricule)?;
    store::save(&store_path, controller.store())?;

    writeln!(writer, "{matricule} checked in. Awaiting biometric verification.")?;
    Ok(())
}

pub fn verify<W: Write>(writer: &mut W, args: &VerifyArgs, config: &Config) -> Result<()> {
    let matricule = Matricule::new(args.matricule.as_str())?;
    let captured = FaceSample::new(
        fs::read(&args.sample)
            .with_context(|| format!("failed to read {}", args.sample.display()))?,
    );

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let Some(student) = db.get_student(&matricule)? else {
        bail!("student not found: {matricule}");
    };
    let reference = match student.picture.as_deref() {
        Some(path) => {
            FaceSample::new(fs::read(path).with_context(|| format!("failed to read {path}"))?)
        }
        None => FaceSample::empty(),
    };

    let store_path = config.session_store_path();
    let _guard = store::lock(&store_path)?;
    let mut controller =
        SessionController::with_store(config.session_config(), store::load(&store_path)?);
    let verified = match config.biometric_override {
        Some(forced) => controller.submit_biometric(
            &db,
            &Deterministic(forced),
            &matricule,
            &captured,
            &reference,
        )?,
        None => {
            controller.submit_biometric(&db, &AlwaysReject, &matricule, &captured, &reference)?
        }
    };
    store::save(&store_path, controller.store())?;

    if verified {
        writeln!(writer, "Biometric verified for {matricule}.")?;
    } else {
        writeln!(writer, "Biometric rejected for {matricule}. Retry with a new sample.")?;
    }
    Ok(())
}

pub fn close<W: Write>(writer: &mut W, args: &CloseArgs, config: &Config) -> Result<()> {
    let matricule = Matricule::new(args.delegate.as_str())?;
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let Some(delegate) = db.get_student(&matricule)? else {
        bail!("student not found: {matricule}");
    };

    let store_path = config.session_store_path();
    let _guard = store::lock(&store_path)?;
    let mut controller =
        SessionController::with_store(config.session_config(), store::load(&store_path)?);

    // On a reconciliation failure the store file is left untouched, so the
    // session survives for a retry.
    let Some(summary) = controller.close_session(&mut db, &delegate.actor())? else {
        writeln!(writer, "No active session owned by {matricule}.")?;
        return Ok(());
    };
    store::save(&store_path, controller.store())?;

    writeln!(
        writer,
        "Session closed: {} present, {} absent, {} already recorded.",
        summary.present, summary.absent, summary.skipped
    )?;
    Ok(())
}

pub fn show<W: Write>(writer: &mut W, args: &ShowArgs, config: &Config) -> Result<()> {
    let store = store::load(&config.session_store_path())?;
    let Some(session) = store.active(args.level) else {
        writeln!(writer, "No active session for level {}.", args.level)?;
        return Ok(());
    };

    writeln!(writer, "{} (level {})", session.course, session.level)?;
    writeln!(writer, "Delegate:  {}", session.delegate)?;
    writeln!(
        writer,
        "Scheduled: {}",
        session
            .scheduled_at()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    writeln!(
        writer,
        "Expires:   {}",
        session.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    if !session.lecture_description.is_empty() {
        writeln!(writer, "Lecture:   {}", session.lecture_description)?;
    }

    writeln!(writer)?;
    writeln!(writer, "{:<12} {:<4} BIOMETRIC", "MATRICULE", "QR")?;
    for (student, progress) in &session.progress {
        let qr = if progress.qr_scanned { "yes" } else { "no" };
        let biometric = if progress.biometric_verified { "yes" } else { "no" };
        writeln!(writer, "{:<12} {qr:<4} {biometric}", student.as_str())?;
    }
    Ok(())
}

/// Posts the session-opened notice when a webhook is configured.
///
/// Delivery failures are logged and swallowed; the session is already open.
fn notify_opened(config: &Config, session: &Session) {
    let Some(url) = config.webhook_url.as_deref() else {
        return;
    };
    let notice = SessionNotice {
        course: session.course.clone(),
        level: session.level,
        scheduled_at: session
            .scheduled_at()
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        expires_at: session.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        delegate: session.delegate.clone(),
        lecture_description: session.lecture_description.clone(),
    };
    if let Err(err) = deliver(url, &notice) {
        warn!("failed to deliver session-opened notice: {err:#}");
    }
}

fn deliver(url: &str, notice: &SessionNotice) -> Result<()> {
    let client = att_notify::Client::new(url).context("failed to create webhook client")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    runtime.block_on(client.send_session_opened(notice))?;
    Ok(())
}
