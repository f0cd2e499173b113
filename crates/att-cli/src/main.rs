use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use att_cli::commands::{attendance, init, promote, session, status, student};
use att_cli::{AttendanceAction, Cli, Commands, Config, SessionAction, StudentAction};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = match cli.verbose {
        0 => EnvFilter::from_default_env(),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Init) => {
            let config = load_config(cli.config.as_deref())?;
            init::run(&mut stdout, &config)?;
        }
        Some(Commands::Student { action }) => {
            let config = load_config(cli.config.as_deref())?;
            match action {
                StudentAction::Add(args) => student::add(&mut stdout, args, &config)?,
                StudentAction::List(args) => student::list(&mut stdout, args, &config)?,
                StudentAction::Update(args) => student::update(&mut stdout, args, &config)?,
                StudentAction::Remove(args) => student::remove(&mut stdout, args, &config)?,
                StudentAction::AssignDelegate(args) => {
                    student::assign_delegate(&mut stdout, args, &config)?;
                }
            }
        }
        Some(Commands::Session { action }) => {
            let config = load_config(cli.config.as_deref())?;
            match action {
                SessionAction::Open(args) => session::open(&mut stdout, args, &config)?,
                SessionAction::Checkin(args) => session::checkin(&mut stdout, args, &config)?,
                SessionAction::Verify(args) => session::verify(&mut stdout, args, &config)?,
                SessionAction::Close(args) => session::close(&mut stdout, args, &config)?,
                SessionAction::Show(args) => session::show(&mut stdout, args, &config)?,
            }
        }
        Some(Commands::Attendance { action }) => {
            let config = load_config(cli.config.as_deref())?;
            match action {
                AttendanceAction::List(args) => attendance::list(&mut stdout, args, &config)?,
                AttendanceAction::Delete(args) => attendance::delete(&mut stdout, args, &config)?,
            }
        }
        Some(Commands::Promote(args)) => {
            let config = load_config(cli.config.as_deref())?;
            promote::run(&mut stdout, args, &config)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            status::run(&mut stdout, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
