use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use revise_core::{
    generate, move_entry, move_event, AcquisitionError, CandidateSchedule, CandidateSource, ConstraintSet,
    GenerationBrief, PlanningRequest, ScheduleError,
};
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod llm;
mod schedule_lock;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "revise",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("REVISE_BUILD_SHA"), ")"),
    about = "Revision timetable generator"
)]
struct Cli {
    /// Only log errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Log debug detail (overridden by REVISE_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the generation brief for a planning request
    Brief {
        /// Planning request JSON
        #[arg(long)]
        request: PathBuf,

        /// Print the structured brief instead of the prompt text
        #[arg(long)]
        json: bool,
    },

    /// Generate a timetable (from a candidate file, or the configured LLM)
    Generate {
        #[arg(long)]
        request: PathBuf,

        /// Use this candidate payload instead of calling the LLM
        #[arg(long)]
        candidate: Option<PathBuf>,

        /// Where to write the schedule (default: ~/.revise/schedule.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate a candidate payload and print the rejection ledger
    Validate {
        #[arg(long)]
        request: PathBuf,

        #[arg(long)]
        candidate: PathBuf,
    },

    /// Move one schedule entry, or one blocked event, to another day
    Move {
        /// Schedule JSON (default: ~/.revise/schedule.json)
        #[arg(long)]
        schedule: Option<PathBuf>,

        /// Entry id, e.g. session-2024-03-12-0
        #[arg(long, required_unless_present = "event", conflicts_with = "event")]
        entry: Option<String>,

        /// Blocked event id; rewrites that event inside --request
        #[arg(long, requires = "request")]
        event: Option<String>,

        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Planning request, to check the target day against blocked events
        /// (or, with --event, the file whose event is moved)
        #[arg(long)]
        request: Option<PathBuf>,
    },

    /// Manage ~/.revise/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Command::Brief { request, json } => {
            let req = load_request(&request)?;
            let set = ConstraintSet::build(&req)?;
            let brief = GenerationBrief::compile(&set);
            if json {
                println!("{}", serde_json::to_string_pretty(&brief)?);
            } else {
                println!("{}", brief.render_prompt());
            }
        }

        Command::Generate {
            request,
            candidate,
            out,
        } => {
            let req = load_request(&request)?;
            let source: Box<dyn CandidateSource> = match candidate {
                Some(path) => Box::new(FileSource::open(&path)?),
                None => Box::new(llm::LlmSource::from_config(&config::load_config()?.llm)?),
            };
            run_generate(&req, source.as_ref(), out).await?;
        }

        Command::Validate { request, candidate } => {
            let req = load_request(&request)?;
            let set = ConstraintSet::build(&req)?;
            let raw = fs::read_to_string(&candidate)
                .with_context(|| format!("read {}", candidate.display()))?;
            let parsed = CandidateSchedule::parse(&raw)?;
            let outcome = revise_core::validate(&parsed, &set);

            println!("Kept {} of {} entries", outcome.kept(), parsed.entry_count());
            print!("{}", outcome.ledger);
            for ex in &set.excluded_homework {
                println!("Not schedulable: {} (due {}, {:?})", ex.title, ex.due_date, ex.reason);
            }
        }

        Command::Move {
            event: Some(event_id),
            to,
            request: Some(request),
            ..
        } => move_request_event(&request, &event_id, to).await?,

        Command::Move {
            schedule,
            entry,
            to,
            request,
            ..
        } => {
            let entry = entry.context("--entry or --event is required")?;
            let path = match schedule {
                Some(p) => p,
                None => state::schedule_path()?,
            };
            let blocked = match request {
                Some(r) => ConstraintSet::build(&load_request(&r)?)?.blocked,
                None => Vec::new(),
            };

            let outcome = state::update_schedule(&path, |mut current| {
                revise_core::reconcile::normalize_order(&mut current);
                let outcome = move_entry(&current, &entry, to, &blocked)?;
                Ok((outcome.schedule.clone(), outcome))
            })
            .await?;

            println!("Moved {entry}: {} -> {}", outcome.from, outcome.to);
            for w in &outcome.warnings {
                println!("warning: {w}");
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("REVISE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Read a request, falling back to the configured timezone when it names none.
fn load_request(path: &Path) -> Result<PlanningRequest> {
    let mut req = state::read_request(path)?;
    if req.preferences.timezone.is_none() {
        req.preferences.timezone = Some(config::load_config()?.planner.timezone);
    }
    Ok(req)
}

async fn move_request_event(path: &Path, event_id: &str, to: NaiveDate) -> Result<()> {
    let req = load_request(path)?;
    let tz_name = req
        .preferences
        .timezone
        .as_deref()
        .unwrap_or(revise_core::constraints::DEFAULT_TIMEZONE);
    let tz = revise_core::time::parse_timezone(tz_name)
        .with_context(|| format!("unknown timezone '{tz_name}'"))?;
    let event = req
        .events
        .iter()
        .find(|e| e.id == event_id)
        .with_context(|| format!("no event '{event_id}' in {}", path.display()))?;

    let moved = move_event(event, to, tz)?;
    state::replace_event(path, &moved).await?;

    println!("Moved event {}: {} -> {}", event.title, event.start_time, moved.start_time);
    Ok(())
}

/// Candidate payload saved to disk, e.g. a previous generator response.
struct FileSource {
    raw: String,
}

impl FileSource {
    fn open(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Ok(Self { raw })
    }
}

impl CandidateSource for FileSource {
    fn acquire(&self, _brief: &GenerationBrief) -> std::result::Result<String, AcquisitionError> {
        Ok(self.raw.clone())
    }
}

async fn run_generate(
    req: &PlanningRequest,
    source: &dyn CandidateSource,
    out: Option<PathBuf>,
) -> Result<()> {
    let generation = match generate(req, source) {
        Ok(g) => g,
        Err(ScheduleError::EmptyResult { ledger }) => {
            eprint!("{ledger}");
            bail!("no usable sessions survived validation; nothing written");
        }
        Err(e) => return Err(e.into()),
    };

    let path = match out {
        Some(p) => p,
        None => state::schedule_path()?,
    };
    {
        let _lock = schedule_lock::acquire(&path).await?;
        state::write_schedule(&path, &generation.schedule)?;
    }

    println!(
        "Wrote {} sessions over {} days to {}",
        generation.schedule.entry_count(),
        generation.schedule.0.len(),
        path.display()
    );
    println!("{}", generation.ledger.summary());
    for ex in &generation.excluded_homework {
        println!("Not schedulable: {} (due {}, {:?})", ex.title, ex.due_date, ex.reason);
    }
    Ok(())
}
