//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::attendance::{DeleteArgs, ListRecordsArgs};
use crate::commands::promote::PromoteArgs;
use crate::commands::session::{CheckinArgs, CloseArgs, OpenArgs, ShowArgs, VerifyArgs};
use crate::commands::student::{AddArgs, AssignDelegateArgs, ListArgs, RemoveArgs, UpdateArgs};

/// QR + biometric attendance tracker.
///
/// Level delegates open timed check-in sessions; students prove presence in
/// two phases (QR scan, then biometric verification); closing a session
/// reconciles the progress into durable attendance records.
#[derive(Debug, Parser)]
#[command(name = "att", version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize the database and show where state lives.
    Init,

    /// Manage the student registry.
    Student {
        #[command(subcommand)]
        action: StudentAction,
    },

    /// Open, drive, and close check-in sessions.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Browse or delete finalized attendance records.
    Attendance {
        #[command(subcommand)]
        action: AttendanceAction,
    },

    /// Promote every student below the level ceiling.
    Promote(PromoteArgs),

    /// Show registry counts and active sessions.
    Status,
}

/// Student registry operations.
#[derive(Debug, Subcommand)]
pub enum StudentAction {
    /// Register a student.
    Add(AddArgs),
    /// List students, optionally one level.
    List(ListArgs),
    /// Update a registered student's details.
    Update(UpdateArgs),
    /// Remove a student and their attendance records.
    Remove(RemoveArgs),
    /// Appoint a student as their level's delegate.
    AssignDelegate(AssignDelegateArgs),
}

/// Session lifecycle operations.
#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// Open a check-in session for the delegate's level.
    Open(OpenArgs),
    /// Record a student's QR check-in.
    Checkin(CheckinArgs),
    /// Run the biometric phase for a checked-in student.
    Verify(VerifyArgs),
    /// Close a session and write attendance records.
    Close(CloseArgs),
    /// Show an active session's progress.
    Show(ShowArgs),
}

/// Finalized record operations.
#[derive(Debug, Subcommand)]
pub enum AttendanceAction {
    /// List finalized attendance records.
    List(ListRecordsArgs),
    /// Delete a record by id.
    Delete(DeleteArgs),
}
