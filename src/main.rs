mod config;
mod error;
mod gh;
mod registry;
mod repos;
mod scheduler;
mod store;
mod timer;
mod tui;

use anyhow::Result;
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use gh::{GhCli, PrForm};
use scheduler::Scheduler;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "pr-scheduler",
    version = env!("PR_SCHEDULER_VERSION_STRING"),
    about = "Create GitHub pull requests immediately or on a schedule via the gh CLI"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a pull request right now
    Create(FormArgs),
    /// Schedule a pull request for a future time
    Schedule {
        #[command(flatten)]
        form: FormArgs,
        /// Local time to fire at, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        at: String,
    },
    /// List scheduled pull requests
    List,
    /// Cancel a scheduled pull request by id
    Cancel { id: u64 },
    /// Stay in the foreground and fire schedules as they come due
    Run {
        /// Fire whatever is already due, then exit
        #[arg(long)]
        once: bool,
    },
    /// Show or change settings
    Config {
        /// Root directory the repo picker scans for working copies
        #[arg(long)]
        repos_root: Option<String>,
        /// Default base branch prefilled in the form
        #[arg(long)]
        default_base: Option<String>,
    },
}

/// All fields optional on the command line; blank ones are reported
/// together by validation, the same as in the TUI form.
#[derive(Args, Debug, Default)]
struct FormArgs {
    /// Path to the local git working copy
    #[arg(long)]
    repo_path: Option<String>,
    /// Origin repository, "org/repo"
    #[arg(long)]
    repo: Option<String>,
    /// Forked account username
    #[arg(long)]
    user: Option<String>,
    /// Branch on the fork containing the changes
    #[arg(long)]
    branch: Option<String>,
    /// Base branch on the origin repository
    #[arg(long)]
    base: Option<String>,
    /// PR title
    #[arg(long)]
    title: Option<String>,
    /// PR body
    #[arg(long, default_value = "")]
    body: String,
}

impl FormArgs {
    fn into_form(self, default_base: &str) -> PrForm {
        PrForm {
            local_path: self.repo_path.unwrap_or_default(),
            repo: self.repo.unwrap_or_default(),
            fork_user: self.user.unwrap_or_default(),
            fork_branch: self.branch.unwrap_or_default(),
            base: self.base.unwrap_or_else(|| default_base.to_string()),
            title: self.title.unwrap_or_default(),
            body: self.body,
        }
    }
}

fn load_scheduler() -> Scheduler<GhCli> {
    let path = store::state_path();
    let (state, warning) = store::load_state(&path);
    if let Some(warning) = warning {
        eprintln!("Warning: {warning} - using default settings.");
    }
    Scheduler::new(state, path, GhCli, Utc::now())
}

fn report_missed(scheduler: &Scheduler<GhCli>) {
    for id in scheduler.missed_on_load() {
        if let Some(record) = scheduler.pending().find(|r| r.id == *id) {
            println!(
                "Missed while not running: #{} \"{}\" was due {}",
                record.id,
                record.title,
                record
                    .scheduled_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
            );
        }
    }
}

fn drain_warning(scheduler: &mut Scheduler<GhCli>) {
    if let Some(warning) = scheduler.take_persist_warning() {
        eprintln!("Warning: {warning}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config();
    let mut scheduler = load_scheduler();

    match cli.command {
        None => {
            let username = gh::get_current_user()?;
            println!("Authenticated as: {}\n", username);
            tui::run(scheduler, &cfg, &username)?;
        }
        Some(Command::Create(args)) => {
            let form = args.into_form(&cfg.default_base);
            let result = scheduler.create_now(&form);
            drain_warning(&mut scheduler);
            result?;
            println!("Pull request created successfully!");
        }
        Some(Command::Schedule { form, at }) => {
            let form = form.into_form(&cfg.default_base);
            let when = tui::parse_when(&at).map_err(|msg| anyhow::anyhow!(msg))?;
            let id = scheduler.schedule(&form, when, Utc::now());
            drain_warning(&mut scheduler);
            let id = id?;
            println!(
                "PR #{id} scheduled for {}",
                when.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            );
            println!("Note: schedules fire only while `pr-scheduler` (or `pr-scheduler run`) is running.");
        }
        Some(Command::List) => {
            report_missed(&scheduler);
            if scheduler.pending_count() == 0 {
                println!("No PRs scheduled.");
            }
            let now = Utc::now();
            for record in scheduler.pending() {
                let missed = if record.is_missed(now) { "  [missed]" } else { "" };
                println!(
                    "#{:<4} {:<42} {}{missed}",
                    record.id,
                    record.title,
                    record
                        .scheduled_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M")
                );
            }
        }
        Some(Command::Cancel { id }) => {
            if scheduler.cancel(id) {
                drain_warning(&mut scheduler);
                println!("PR #{id} cancelled successfully");
            } else {
                anyhow::bail!("No scheduled PR with id #{id}");
            }
        }
        Some(Command::Run { once }) => {
            report_missed(&scheduler);
            println!("Watching {} scheduled PRs.", scheduler.pending_count());
            loop {
                for report in scheduler.tick(Utc::now()) {
                    println!("{}", report.message());
                }
                drain_warning(&mut scheduler);
                if once || scheduler.next_deadline().is_none() {
                    break;
                }
                thread::sleep(Duration::from_secs(1));
            }
        }
        Some(Command::Config {
            repos_root,
            default_base,
        }) => {
            let mut cfg = cfg;
            if let Some(root) = repos_root {
                cfg.repos_root = Some(root);
            }
            if let Some(base) = default_base {
                cfg.default_base = base;
            }
            config::save_config(&cfg)?;
            println!("Config file: {}", config::config_path().display());
            println!(
                "repos_root: {}",
                cfg.repos_root.as_deref().unwrap_or("(not set)")
            );
            println!("default_base: {}", cfg.default_base);
        }
    }

    Ok(())
}
