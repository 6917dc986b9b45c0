//! Line-oriented driver: parses typed commands and prints exam state.

use std::fmt;
use std::io::{self, Write};

use exam_core::exam::{ExamProgress, ExamState};
use exam_core::report::ExamResults;
use services::{ActionOutcome, ExamSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Answer(String),
    Next,
    Previous,
    Retry,
    Finish,
    Restart,
    Shuffle,
    Load { path: String, keep: bool },
    BuiltIn,
    Status,
    Review,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandError {
    Blank,
    MissingArgument { command: &'static str },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Blank => write!(f, "type a command, or `help`"),
            CommandError::MissingArgument { command } => write!(f, "{command} requires a value"),
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    /// Parse one input line. A bare word that is not a command is taken as an answer label.
    ///
    /// Commands are full words only, so single-letter labels such as `A` or `Q` always answer.
    pub(crate) fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(CommandError::Blank);
        };
        let rest = words.collect::<Vec<_>>().join(" ");
        let argument = |command: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument { command })
            } else {
                Ok(rest.clone())
            }
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "answer" => Self::Answer(argument("answer")?),
            "next" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "retry" => Self::Retry,
            "finish" => Self::Finish,
            "restart" | "reset" => Self::Restart,
            "shuffle" => Self::Shuffle,
            "load" => Self::Load {
                path: argument("load")?,
                keep: false,
            },
            "keep" => Self::Load {
                path: argument("keep")?,
                keep: true,
            },
            "builtin" => Self::BuiltIn,
            "status" => Self::Status,
            "review" => Self::Review,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Answer(line.trim().to_owned()),
        };
        Ok(command)
    }
}

pub(crate) fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  <label> | answer <label>   submit an answer (e.g. `B`)")?;
    writeln!(out, "  next | prev                move between questions")?;
    writeln!(out, "  retry                      reopen the current question")?;
    writeln!(out, "  finish                     finish from the last question")?;
    writeln!(out, "  restart | reset | shuffle  start over / reorder questions")?;
    writeln!(out, "  load <path>                use another question file")?;
    writeln!(out, "  keep <path>                use it and store it as the local file")?;
    writeln!(out, "  builtin                    switch to the built-in questions")?;
    writeln!(out, "  status | review | quit")
}

pub(crate) fn render_header(out: &mut impl Write, session: &ExamSession) -> io::Result<()> {
    let exam = session.exam();
    let source = session.source_name().unwrap_or("built-in questions");
    writeln!(out, "Exam: {} questions from {source}", exam.len())?;
    for (topic, count) in exam.topic_counts() {
        writeln!(out, "  • {topic}: {count}")?;
    }
    if session.is_restored() {
        writeln!(out, "Resumed your saved progress.")?;
    }
    Ok(())
}

pub(crate) fn render_status(out: &mut impl Write, progress: &ExamProgress) -> io::Result<()> {
    writeln!(
        out,
        "Score {}/{} · accuracy {:.1}% · {:.0}% of {} questions done",
        progress.score,
        progress.attempted,
        progress.accuracy * 100.0,
        progress.progress * 100.0,
        progress.total
    )
}

pub(crate) fn render_outcome(out: &mut impl Write, outcome: &ActionOutcome) -> io::Result<()> {
    if !outcome.persisted {
        writeln!(out, "(progress could not be saved; continuing without saving)")?;
    }
    Ok(())
}

/// Print the current question, or the results once the exam is over.
pub(crate) fn render_current(out: &mut impl Write, exam: &ExamState) -> io::Result<()> {
    if let Some(results) = exam.results() {
        return render_results(out, &results);
    }

    let question = exam.current_question();
    writeln!(out)?;
    writeln!(out, "Question {} of {}", exam.current_index() + 1, exam.len())?;
    write!(out, "Topic: {}", question.topic())?;
    if let Some(page) = question.page() {
        write!(out, " · Reference: page {page}")?;
    }
    writeln!(out)?;
    writeln!(out, "{}", question.text())?;

    let chosen = exam.preselected();
    for option in question.options() {
        let label = option.label();
        let marker = if exam.answered_current() && question.is_correct(label) {
            "✔"
        } else if exam.answered_current() && chosen == Some(label) {
            "✘"
        } else if chosen == Some(label) {
            "›"
        } else {
            " "
        };
        writeln!(out, " {marker} {label}. {}", option.text())?;
    }

    if exam.answered_current() {
        match chosen {
            Some(label) if question.is_correct(label) => writeln!(out, "Correct!")?,
            _ => writeln!(
                out,
                "Incorrect. The correct answer is {}.",
                question.correct_answer()
            )?,
        }
        match question.explanation() {
            Some(explanation) => writeln!(out, "Explanation: {explanation}")?,
            None => writeln!(out, "No explanation available for this question.")?,
        }
        if exam.is_last() {
            writeln!(out, "Type `finish` to complete the exam.")?;
        }
    }
    Ok(())
}

pub(crate) fn render_results(out: &mut impl Write, results: &ExamResults) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Exam completed: {} ({:.1}%)",
        results.score_line(),
        results.percentage
    )?;
    writeln!(out, "{}", results.band.message())?;
    for review in &results.reviews {
        let verdict = if review.is_correct { "✔" } else { "✘" };
        writeln!(out, "{verdict} Q{}: {}", review.index + 1, review.text)?;
        match (&review.chosen, &review.chosen_text) {
            (Some(label), Some(text)) => writeln!(out, "    your answer: {label}. {text}")?,
            _ => writeln!(out, "    your answer: not answered")?,
        }
        writeln!(
            out,
            "    correct answer: {}. {}",
            review.correct_answer, review.correct_text
        )?;
        if let Some(explanation) = &review.explanation {
            writeln!(out, "    {explanation}")?;
        }
    }
    writeln!(out, "Type `restart` to take the exam again.")
}
