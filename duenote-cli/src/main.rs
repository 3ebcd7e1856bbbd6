use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use duenote_core::time::{format_local, is_future, parse_local_datetime_to_utc};
use duenote_core::{
    Assignment, AssignmentSource, Category, NotificationEngine, NotificationSettings,
    NotificationTransport, SettingsStore,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod state;
mod store;

use config::Config;
use store::{FileSettingsStore, FileTransport, JsonAssignmentSource};

type Engine = NotificationEngine<FileTransport, FileSettingsStore>;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("DUENOTE_BUILD_SHA"), ")");
const DISPLAY_FMT: &str = "%a %Y-%m-%d %H:%M %Z";

#[derive(Parser, Debug)]
#[command(name = "duenote", version, long_version = LONG_VERSION, about = "Assignment notification scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct SnapshotArgs {
    /// Assignments JSON file (default: from config.toml)
    #[arg(long)]
    assignments: Option<PathBuf>,

    /// Pretend it is this local time, "YYYY-MM-DD HH:MM" in the settings timezone
    #[arg(long)]
    now: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write default config, settings and an empty assignments file under ~/.duenote
    Init,

    /// Show what would be scheduled, without touching the ledger
    Preview {
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },

    /// Bring the ledger in line with the assignments file
    Reconcile {
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },

    /// Rebuild the daily digest
    Digest {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        /// Fire a few seconds from now instead of at the notification time
        #[arg(long, default_value_t = false)]
        immediately: bool,
    },

    /// List scheduled notifications
    Scheduled,

    /// Cancel every notification of one assignment
    Cancel {
        #[arg(long)]
        assignment: String,
    },

    /// Cancel everything, digest included
    CancelAll,

    /// Notification settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    Enable,
    Disable,

    /// Local time for daily reminders and the digest (HH:MM)
    Time { time: String },

    /// IANA timezone, e.g. America/Chicago
    Timezone { timezone: String },

    /// Days before the due date to start reminding for a category
    Lead {
        #[arg(long)]
        category: Category,
        #[arg(long)]
        days: u32,
    },

    /// Toggle daily reminders (exam, test, quiz)
    Daily {
        #[arg(long)]
        category: Category,
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    init_tracing(&cfg);

    let home = state::ensure_duenote_home()?;
    let engine = Engine::new(
        FileTransport::new(cfg.ledger_path(&home)),
        FileSettingsStore::new(state::settings_path()?),
    );

    match cli.command {
        Command::Init => init(&engine, &cfg, &home).await?,

        Command::Preview { snapshot } => {
            let (assignments, now, tz) = load_snapshot(&engine, &cfg, &home, &snapshot).await?;
            preview(&engine, &assignments, now, tz).await;
        }

        Command::Reconcile { snapshot } => {
            let (assignments, now, _) = load_snapshot(&engine, &cfg, &home, &snapshot).await?;
            let report = engine.reconcile(&assignments, now).await;
            println!("{report}");
        }

        Command::Digest { snapshot, immediately } => {
            let (assignments, now, tz) = load_snapshot(&engine, &cfg, &home, &snapshot).await?;
            match engine.build_and_schedule_digest(&assignments, immediately, now).await {
                Some(at) => println!("Digest scheduled for {}", format_local(at, tz, DISPLAY_FMT)),
                None => println!("Nothing due in the next two weeks; digest cancelled"),
            }
        }

        Command::Scheduled => {
            let tz = engine.current_settings().await.tz_or_utc();
            list_scheduled(&engine, tz).await?;
        }

        Command::Cancel { assignment } => {
            let n = engine.cancel_for_assignment(&assignment).await;
            println!("Cancelled {n} slot(s) for {assignment}");
        }

        Command::CancelAll => {
            engine.clear_all().await?;
            println!("All scheduled notifications cancelled");
        }

        Command::Settings { command } => settings(&engine, &cfg, &home, command).await?,
    }

    Ok(())
}

fn init_tracing(cfg: &Config) {
    let filter = ["DUENOTE_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| cfg.log_filter.clone());
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn init(engine: &Engine, cfg: &Config, home: &Path) -> Result<()> {
    config::init_config()?;

    // Seeds defaults when nothing is stored yet.
    let settings = engine.current_settings().await;
    println!(
        "Notifications {} at {} ({})",
        if settings.enabled { "enabled" } else { "disabled" },
        settings.notification_time.format("%H:%M"),
        settings.timezone
    );

    let assignments = cfg.assignments_path(home);
    if !assignments.exists() {
        tokio::fs::write(&assignments, "[]\n")
            .await
            .with_context(|| format!("write {}", assignments.display()))?;
        println!("Wrote {}", assignments.display());
    }
    Ok(())
}

async fn load_snapshot(
    engine: &Engine,
    cfg: &Config,
    home: &Path,
    args: &SnapshotArgs,
) -> Result<(Vec<Assignment>, DateTime<Utc>, Tz)> {
    let tz = engine.current_settings().await.tz_or_utc();
    let now = match &args.now {
        Some(local) => parse_local_datetime_to_utc(local, tz)?,
        None => Utc::now(),
    };
    let path = args.assignments.clone().unwrap_or_else(|| cfg.assignments_path(home));
    let assignments = JsonAssignmentSource::new(&path)
        .get_assignments()
        .await
        .context("load assignments (run `duenote init` or pass --assignments)")?;
    tracing::debug!(count = assignments.len(), path = %path.display(), "assignments loaded");
    Ok((assignments, now, tz))
}

async fn preview(engine: &Engine, assignments: &[Assignment], now: DateTime<Utc>, tz: Tz) {
    println!("# Preview as of {}\n", format_local(now, tz, DISPLAY_FMT));

    for a in assignments {
        if !a.is_active(now) {
            let why = if a.is_completed { "completed" } else { "overdue" };
            println!("- {} [{}]: {why}, nothing scheduled", a.title, a.category);
            continue;
        }
        let candidates = engine.preview(a, now).await;
        println!("- {} [{}] due {}", a.title, a.category, format_local(a.due_date, tz, DISPLAY_FMT));
        if candidates.is_empty() {
            println!("    (no reminders)");
        }
        for c in candidates {
            let marker = if is_future(c.fire_at, now) { " " } else { "x" };
            println!(
                "  {marker} {:<18} {}  {}",
                c.kind,
                format_local(c.fire_at, tz, DISPLAY_FMT),
                c.title
            );
        }
    }

    println!();
    match engine.preview_digest(assignments, now).await {
        Some(d) => println!("## {}\n{}", d.title, d.body),
        None => println!("## No digest: nothing inside its reminder window"),
    }
}

async fn list_scheduled(engine: &Engine, tz: Tz) -> Result<()> {
    let mut entries = engine.transport().list_scheduled().await?;
    if entries.is_empty() {
        println!("Nothing scheduled ({})", engine.transport().path().display());
        return Ok(());
    }
    entries.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.identifier.cmp(&b.identifier)));
    for e in entries {
        let channel = e.channel.map(|c| c.id()).unwrap_or("-");
        let importance = e.importance.map(|i| format!("/{i:?}").to_lowercase()).unwrap_or_default();
        println!(
            "{}  {:<32} [{channel}{importance}] {}",
            format_local(e.fire_at, tz, DISPLAY_FMT),
            e.identifier,
            e.content.title
        );
    }
    Ok(())
}

async fn settings(engine: &Engine, cfg: &Config, home: &Path, command: SettingsCommand) -> Result<()> {
    let mut s = engine.current_settings().await;

    match command {
        SettingsCommand::Show => {
            print_settings(&s);
            return Ok(());
        }
        SettingsCommand::Enable => s.enabled = true,
        SettingsCommand::Disable => s.enabled = false,
        SettingsCommand::Time { time } => {
            s.notification_time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .with_context(|| format!("invalid time '{time}', expected HH:MM"))?;
        }
        SettingsCommand::Timezone { timezone } => {
            let tz: Tz = timezone
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown timezone '{timezone}'"))?;
            s.timezone = tz.name().to_string();
        }
        SettingsCommand::Lead { category, days } => s.set_lead_days(category, days),
        SettingsCommand::Daily { category, on, off } => {
            if on == off {
                bail!("pass exactly one of --on or --off");
            }
            if !s.set_daily_enabled(category, on) {
                bail!("{category} has no daily reminder mode (only exam, test, quiz)");
            }
        }
    }

    // Converge the ledger when the assignments are readable; otherwise just save.
    let source = JsonAssignmentSource::new(cfg.assignments_path(home));
    match source.get_assignments().await {
        Ok(assignments) => {
            let report = engine.update_settings(&s, &assignments, Utc::now()).await?;
            println!("Settings saved; {report}");
        }
        Err(e) => {
            tracing::warn!(error = %e, "assignments unavailable; ledger not reconciled");
            engine.settings_store().save_notification_settings(&s).await?;
            println!("Settings saved");
        }
    }
    Ok(())
}

fn print_settings(s: &NotificationSettings) {
    println!("enabled            {}", s.enabled);
    println!("notification_time  {}", s.notification_time.format("%H:%M"));
    println!("timezone           {}", s.timezone);
    println!("\nlead days:");
    for c in Category::ALL {
        let daily = match c {
            Category::Exam | Category::Test | Category::Quiz => {
                if s.daily_enabled(c) { "  (daily on)" } else { "  (daily off)" }
            }
            _ => "",
        };
        println!("  {:<13} {}{daily}", c.to_string(), s.lead_days(c));
    }
}
