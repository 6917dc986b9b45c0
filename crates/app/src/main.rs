use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exam_core::bank::fallback_questions;
use exam_core::exam::ExamState;
use exam_core::model::OptionLabel;
use services::{
    Clock, ExamAction, ExamLoopService, ExamSession, QuestionBankService, QuestionSource,
    SessionStore,
};
use storage::repository::Storage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod console;

use console::Command as Input;

const DEFAULT_DB_URL: &str = "sqlite://exam_session.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidQuestionsPath { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidQuestionsPath { raw } => {
                write!(f, "invalid --questions value: {raw}")
            }
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

struct Args {
    db_url: String,
    questions_path: PathBuf,
    fresh: bool,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- exam  [--questions <path>] [--db <sqlite_url>] [--fresh]");
    eprintln!("  cargo run -p app -- check <path>");
    eprintln!();
    eprintln!("Defaults for exam:");
    eprintln!("  --questions {}", services::bank_service::DEFAULT_QUESTIONS_PATH);
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_QUESTIONS_PATH, EXAM_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Exam,
    Check,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "exam" => Some(Self::Exam),
            "check" => Some(Self::Check),
            _ => None,
        }
    }
}

impl Args {
    fn parse_exam(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut questions_path = std::env::var("EXAM_QUESTIONS_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(
                || PathBuf::from(services::bank_service::DEFAULT_QUESTIONS_PATH),
                PathBuf::from,
            );
        let mut fresh = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--questions" => {
                    let value = require_value(args, "--questions")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidQuestionsPath { raw: value });
                    }
                    questions_path = PathBuf::from(value);
                }
                "--fresh" => fresh = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            questions_path,
            fresh,
        })
    }

    fn parse_check(args: &mut impl Iterator<Item = String>) -> Result<PathBuf, ArgsError> {
        let path = require_value(args, "check")?;
        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(PathBuf::from(path))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Open the session database, or keep the session in memory if that fails.
async fn open_storage(db_url: &str) -> Storage {
    let opened = match prepare_sqlite_file(db_url) {
        Ok(()) => Storage::sqlite(db_url).await.map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    };
    match opened {
        Ok(storage) => {
            info!(db = db_url, "opened session database");
            storage
        }
        Err(err) => {
            warn!(db = db_url, error = %err, "session database unavailable; progress will not be saved");
            Storage::in_memory()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let loaded = QuestionBankService::new(path).parse_upload(
        &bytes,
        QuestionSource::File(path.to_path_buf()),
    )?;
    let exam = ExamState::new(loaded.questions)?;
    println!("{}: {} usable questions", path.display(), exam.len());
    for (topic, count) in exam.topic_counts() {
        println!("  {topic}: {count}");
    }
    Ok(())
}

/// Warning about an unusable question file. A restored session never used that file.
fn fallback_notice(questions_path: &Path, reason: Option<&str>, restored: bool) -> Option<String> {
    if restored {
        return None;
    }
    reason.map(|reason| {
        format!(
            "Could not use {}: {reason}. Using the built-in questions.",
            questions_path.display()
        )
    })
}

async fn run_exam(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let bank = QuestionBankService::new(&args.questions_path);
    let storage = open_storage(&args.db_url).await;
    let store = SessionStore::new(Clock::system(), Arc::clone(&storage.snapshots));
    let exam_loop = ExamLoopService::new(store);

    let loaded = bank.load_default();
    let fallback_reason = loaded.fallback_reason.as_ref().map(ToString::to_string);

    let mut session = if args.fresh {
        exam_loop.store().clear().await;
        exam_loop.start(loaded).await?
    } else {
        exam_loop.resume_or_start(loaded).await?
    };
    if let Some(notice) = fallback_notice(
        bank.questions_path(),
        fallback_reason.as_deref(),
        session.is_restored(),
    ) {
        eprintln!("{notice}");
    }

    let mut out = io::stdout();
    console::render_header(&mut out, &session)?;
    console::render_current(&mut out, session.exam())?;
    writeln!(out, "Type `help` for commands.")?;

    let mut lines = io::stdin().lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let input = match Input::parse(&line?) {
            Ok(input) => input,
            Err(err) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };

        let action = match input {
            Input::Quit => break,
            Input::Help => {
                console::print_help(&mut out)?;
                continue;
            }
            Input::Status => {
                console::render_status(&mut out, &session.exam().progress())?;
                continue;
            }
            Input::Review => {
                match session.exam().results() {
                    Some(results) => console::render_results(&mut out, &results)?,
                    None => writeln!(out, "Finish the exam to see the review.")?,
                }
                continue;
            }
            Input::Answer(raw) => match OptionLabel::new(&raw) {
                Some(label) => ExamAction::Submit(label),
                None => {
                    writeln!(out, "Choose one of the listed options.")?;
                    continue;
                }
            },
            Input::Next => ExamAction::Next,
            Input::Previous => ExamAction::Previous,
            Input::Retry => ExamAction::Retry,
            Input::Finish => ExamAction::Finish,
            Input::Restart => ExamAction::Restart,
            Input::Shuffle => ExamAction::Shuffle,
            Input::BuiltIn => ExamAction::Replace {
                questions: fallback_questions(),
                source_name: None,
            },
            Input::Load { path, keep } => match load_replacement(&bank, &path, keep) {
                Ok(action) => action,
                Err(err) => {
                    writeln!(out, "Could not load {path}: {err}. Keeping the current exam.")?;
                    continue;
                }
            },
        };

        apply(&exam_loop, &mut session, action, &mut out).await?;
    }

    Ok(())
}

fn load_replacement(
    bank: &QuestionBankService,
    path: &str,
    keep: bool,
) -> Result<ExamAction, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let name = Path::new(path)
        .file_name()
        .map_or_else(|| path.to_owned(), |name| name.to_string_lossy().into_owned());
    let loaded = bank.parse_upload(&bytes, QuestionSource::Upload { name })?;
    if keep {
        bank.store_source(&bytes)?;
    }
    Ok(ExamAction::Replace {
        source_name: loaded.source.name(),
        questions: loaded.questions,
    })
}

async fn apply(
    exam_loop: &ExamLoopService,
    session: &mut ExamSession,
    action: ExamAction,
    out: &mut impl Write,
) -> io::Result<()> {
    let replaced = matches!(action, ExamAction::Replace { .. });
    match exam_loop.apply(session, action).await {
        Ok(outcome) => {
            console::render_outcome(out, &outcome)?;
            if replaced {
                console::render_header(out, session)?;
            }
            console::render_current(out, session.exam())
        }
        Err(err) => writeln!(out, "Not now: {err}"),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means `exam`.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Exam,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Exam,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    init_tracing();

    let mut iter = argv.into_iter();
    match cmd {
        Command::Exam => {
            let parsed = Args::parse_exam(&mut iter).inspect_err(|e| {
                eprintln!("{e}");
                print_usage();
            })?;
            run_exam(parsed).await
        }
        Command::Check => {
            let path = Args::parse_check(&mut iter).inspect_err(|e| {
                eprintln!("{e}");
                print_usage();
            })?;
            check(&path)
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite://already/set.db".into()),
            "sqlite://already/set.db"
        );
        let normalized = normalize_sqlite_url("sqlite:exam.db".into());
        assert!(normalized.starts_with("sqlite://"));
        assert!(normalized.ends_with("exam.db"));
    }

    #[test]
    fn check_requires_exactly_one_path() {
        let mut none = Vec::<String>::new().into_iter();
        assert!(matches!(
            Args::parse_check(&mut none),
            Err(ArgsError::MissingValue { flag: "check" })
        ));
        let mut two = vec!["a.json".to_string(), "b.json".to_string()].into_iter();
        assert!(matches!(
            Args::parse_check(&mut two),
            Err(ArgsError::UnknownArg(extra)) if extra == "b.json"
        ));
    }

    #[test]
    fn fallback_notice_is_skipped_for_restored_sessions() {
        let path = Path::new("bank.json");
        assert_eq!(fallback_notice(path, Some("bad json"), true), None);
        assert_eq!(fallback_notice(path, None, false), None);
        assert_eq!(
            fallback_notice(path, Some("bad json"), false).as_deref(),
            Some("Could not use bank.json: bad json. Using the built-in questions.")
        );
    }

    #[test]
    fn missing_database_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("exam.sqlite3");
        let url = format!("sqlite://{}", db.display());
        prepare_sqlite_file(&url).unwrap();
        assert!(db.exists());
        assert!(prepare_sqlite_file("postgres://nope").is_err());
    }
}
