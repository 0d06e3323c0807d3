// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Months, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use roll_call::{
    day_range, default_export_name, open_session, AttendanceStatus, Config, Session, SessionEvent,
    Severity,
};

#[derive(Parser)]
#[command(name = "roll-call")]
#[command(about = "Weighted classroom roll call with attendance history", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./roll-call.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive roll call (default)
    Tui,
    /// Replace the roster with a .csv/.txt list, one name per line
    Import { file: PathBuf },
    /// Pick one student now, optionally recording an outcome
    Roll {
        /// present, late or absent
        #[arg(long)]
        mark: Option<AttendanceStatus>,
    },
    /// Show attendance statistics
    Stats,
    /// List recent attendance records
    Records {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Export records to CSV (defaults to the last month)
    Export {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete every attendance record and zero all counters
    Clear {
        /// Confirm the irreversible clear
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let command = cli.command.unwrap_or(Commands::Tui);

    // The TUI owns the terminal, so its logs go to a file
    let log_file = matches!(command, Commands::Tui).then(|| config.log_path());
    init_tracing(log_file.as_deref())?;

    run_command(&config, command)
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let default_level = if log_file.is_some() { "roll_call=info" } else { "roll_call=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn run_command(config: &Config, command: Commands) -> Result<()> {
    let mut session = open_session(config)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    match command {
        Commands::Tui => run_ui_mode(session, config)?,
        Commands::Import { file } => {
            println!("📂 Importing roster from {}", file.display());
            let imported = session.import_roster_file(&file);
            print_events(&mut session);
            imported?;
        }
        Commands::Roll { mark } => {
            let now = Instant::now();
            if session.start_roll(now) {
                session.tick(now + session.settings().reveal_delay);
            }
            if let Some(entry) = session.current() {
                println!("🎯 {}", entry.student.name);
            }
            if let Some(status) = mark {
                session.mark_attendance(status);
            }
            print_events(&mut session);
        }
        Commands::Stats => {
            let stats = session.stats();
            println!("📊 Attendance statistics");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("Students:        {}", stats.student_count);
            println!("Total rolls:     {}", stats.total_rolls);
            println!("Attendance rate: {}%", stats.attendance_rate);
            println!("Late rate:       {}%", stats.late_rate);
            println!("Absent rate:     {}%", stats.absent_rate);
            print_events(&mut session);
        }
        Commands::Records { from, to, limit } => {
            let (start, end) = resolve_range(from, to);
            let records = session.recent_records(start, end, limit);
            if records.is_empty() {
                println!("No records.");
            }
            for record in records {
                println!(
                    "{}  {:<24} {}",
                    record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    record.student_name,
                    record.status.badge()
                );
            }
            print_events(&mut session);
        }
        Commands::Export { from, to, out } => {
            let (start, end) = resolve_range(
                Some(from.unwrap_or_else(one_month_ago)),
                Some(to.unwrap_or_else(today)),
            );
            let out = out.unwrap_or_else(|| config.export_dir.join(default_export_name(today())));
            session.export_range(start, end, &out);
            print_events(&mut session);
        }
        Commands::Clear { yes } => {
            if !yes {
                anyhow::bail!("Refusing to clear all records without --yes");
            }
            session.clear_all();
            print_events(&mut session);
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn one_month_ago() -> NaiveDate {
    let today = today();
    today.checked_sub_months(Months::new(1)).unwrap_or(today)
}

fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (
        from.map(|day| day_range(day, day).0),
        to.map(|day| day_range(day, day).1),
    )
}

fn print_events<R: rand::Rng>(session: &mut Session<R>) {
    for event in session.drain_events() {
        if let SessionEvent::Notification { message, severity } = event {
            match severity {
                Severity::Info => println!("  {}", message),
                Severity::Success => println!("✓ {}", message),
                Severity::Warning => eprintln!("⚠️  {}", message),
                Severity::Error => eprintln!("❌ {}", message),
            }
        }
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(session: Session<StdRng>, config: &Config) -> Result<()> {
    let mut app = ui::App::new(session, config.clone());
    ui::run_ui(&mut app)?;

    println!("✅ Roll call closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_session: Session<StdRng>, _config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin roll-call-server --features server");
    std::process::exit(1);
}
