use std::fmt;
use std::sync::Arc;

use services::{
    AnswerState, AppServices, Clock, DashboardSummary, QuizView, SessionPhase, SessionState,
    StaticIdentity,
};
use speakup_core::model::{Exercise, LevelTier, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://speakup.sqlite3?mode=rwc";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidUserId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    Status,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "status" => Some(Self::Status),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

struct Args {
    command: Command,
    db_url: String,
    user_id: Option<UserId>,
    json: bool,
}

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("SPEAKUP_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.to_owned(), normalize_sqlite_url);
        let mut user_id = std::env::var("SPEAKUP_USER_ID")
            .ok()
            .and_then(|raw| UserId::parse(&raw).ok());
        let mut json = false;

        let mut args = argv.into_iter().peekable();
        let command = match args.peek().map(String::as_str) {
            None => Command::Quiz,
            Some(first) if first.starts_with('-') => Command::Quiz,
            Some(first) => {
                let command = Command::from_arg(first)
                    .ok_or_else(|| ArgsError::UnknownCommand(first.to_owned()))?;
                args.next();
                command
            }
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    let parsed = UserId::parse(&value)
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--json" => json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            command,
            db_url,
            user_id,
            json,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  speakup [quiz]  [--db <sqlite_url>] [--user <id>]");
    eprintln!("  speakup status  [--db <sqlite_url>] [--user <id>] [--json]");
    eprintln!("  speakup seed    [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SPEAKUP_DB_URL, SPEAKUP_USER_ID, RUST_LOG");
}

/// Accept bare paths and `sqlite:` URLs; always allow creating the file.
fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" {
        return trimmed.to_owned();
    }

    let url = if trimmed.starts_with("sqlite:") {
        trimmed.to_owned()
    } else {
        format!("sqlite://{trimmed}")
    };
    if url.contains('?') {
        url
    } else {
        format!("{url}?mode=rwc")
    }
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn settled(
    rx: &mut watch::Receiver<SessionState>,
) -> Result<SessionState, Box<dyn std::error::Error>> {
    let state = rx.wait_for(|state| !state.is_loading()).await?;
    Ok((*state).clone())
}

async fn run_quiz(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let engine = services.engine();
    let mut rx = engine.subscribe();
    services.start_session().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_tier: Option<LevelTier> = None;

    loop {
        let state = settled(&mut rx).await?;
        let view = QuizView::from_state(&state);

        if let Some(message) = &view.error_message {
            eprintln!("! {message}");
            engine.acknowledge_error();
        }
        if let Some(projection) = &view.projection {
            if last_tier.is_some_and(|tier| projection.tier > tier) {
                println!("*** Level up! You are now at {} ***", projection.level_label);
            }
            last_tier = Some(projection.tier);
        }

        match view.phase {
            SessionPhase::Error => break,
            SessionPhase::Finished => print_finished(&view),
            SessionPhase::Active | SessionPhase::Loading => {
                if view.exercise.is_none() {
                    println!(
                        "No exercises for level {} yet. Run `speakup seed` first.",
                        view.level_label()
                    );
                    break;
                }
                if view.answer.is_idle() {
                    print_exercise(&view);
                } else {
                    println!("(Enter or n for next)");
                }
            }
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match (view.phase, line.trim()) {
            (_, "q") => break,
            (_, "r") => engine.restart(),
            (SessionPhase::Finished, _) => {}
            (_, "" | "n") if !view.answer.is_idle() => {
                // A progress push may already have moved on to the next exercise.
                if !engine.snapshot().answer().is_idle() {
                    engine.advance();
                }
            }
            (_, input) => match input.parse::<usize>() {
                Ok(choice) if choice >= 1 => {
                    let commit = engine.submit_answer(choice - 1);
                    if let Some(exercise) = &view.exercise {
                        print_feedback(exercise, engine.snapshot().answer());
                    }
                    if let Some(commit) = commit {
                        if let Err(err) = commit.await? {
                            tracing::debug!(error = %err, "answer not saved");
                        }
                    }
                }
                _ => println!("Keys: option number to answer | Enter/n next | r restart | q quit"),
            },
        }
    }

    engine.shutdown().await;
    Ok(())
}

fn print_exercise(view: &QuizView) {
    let Some(exercise) = &view.exercise else {
        return;
    };
    println!();
    if let Some(projection) = &view.projection {
        println!(
            "[{}] {} XP | level {}% | exercise {} of {}",
            projection.level_label,
            projection.xp_points,
            projection.percent(),
            view.position,
            view.pending_total
        );
    }
    println!("{}", exercise.prompt());
    for (index, option) in exercise.options().iter().enumerate() {
        println!("  {}. {option}", index + 1);
    }
}

fn print_feedback(exercise: &Exercise, answer: &AnswerState) {
    match answer {
        AnswerState::Idle => {}
        AnswerState::Correct { explanation } => println!("Correct! {explanation}"),
        AnswerState::Wrong {
            selected_index,
            explanation,
        } => println!(
            "Not quite: you chose {}, the answer is {}. {explanation}",
            selected_index + 1,
            exercise.correct_option_index() + 1
        ),
    }
}

fn print_finished(view: &QuizView) {
    let xp = view.projection.as_ref().map_or(0, |p| p.xp_points);
    println!();
    println!(
        "You finished every exercise in level {}. Total XP: {xp}",
        view.level_label()
    );
    println!("(r to replay, q to quit)");
}

async fn run_status(services: &AppServices, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let engine = services.engine();
    let mut rx = engine.subscribe();
    services.start_session().await?;

    let state = settled(&mut rx).await?;
    engine.shutdown().await;

    if let Some(message) = state.error_message() {
        return Err(message.into());
    }
    let Some(summary) = DashboardSummary::from_state(&state) else {
        return Err("no progress loaded".into());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("Level:    {} (tier {})", summary.level_label, summary.tier);
    println!("XP:       {}", summary.xp_points);
    println!(
        "Progress: {:.0}% ({} of {} minutes)",
        summary.level_progress_ratio * 100.0,
        summary.completed_minutes,
        summary.total_minutes
    );
    Ok(())
}

async fn run_seed(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let engine = services.engine();
    engine.seed_catalog().await?;
    engine.shutdown().await;
    println!("Starter catalog written.");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let identity = Arc::new(match args.user_id {
        Some(user_id) => StaticIdentity::signed_in(user_id),
        None => StaticIdentity::signed_out(),
    });
    let services = AppServices::new_sqlite(&args.db_url, Clock::default(), identity).await?;
    tracing::info!(db = args.db_url.as_str(), command = ?args.command, "starting");

    match args.command {
        Command::Quiz => run_quiz(&services).await,
        Command::Status => run_status(&services, args.json).await,
        Command::Seed => run_seed(&services).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn defaults_to_quiz() {
        let args = Args::parse(argv(&["--user", "ana"])).unwrap();
        assert_eq!(args.command, Command::Quiz);
        assert_eq!(args.user_id.unwrap().as_str(), "ana");
    }

    #[test]
    fn parses_subcommand_and_db() {
        let args = Args::parse(argv(&["status", "--db", "data/app.db"])).unwrap();
        assert_eq!(args.command, Command::Status);
        assert_eq!(args.db_url, "sqlite://data/app.db?mode=rwc");
        assert!(!args.json);

        let args = Args::parse(argv(&["status", "--json"])).unwrap();
        assert!(args.json);
    }

    #[test]
    fn rejects_blank_user_and_unknown_command() {
        assert!(matches!(
            Args::parse(argv(&["--user", "  "])),
            Err(ArgsError::InvalidUserId { .. })
        ));
        assert!(matches!(
            Args::parse(argv(&["teach"])),
            Err(ArgsError::UnknownCommand(_))
        ));
        assert!(matches!(
            Args::parse(argv(&["--db"])),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
    }

    #[test]
    fn keeps_explicit_sqlite_urls() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite://x.db?mode=ro".into()),
            "sqlite://x.db?mode=ro"
        );
    }
}
