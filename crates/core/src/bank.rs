//! Question bank normalization.
//!
//! Question files come in many shapes: a bare array, an object with a well-known key, or an
//! object holding the list under some arbitrary key. This module finds the list, validates
//! each record and reports what it had to drop.

use std::borrow::Cow;

use serde_json::Value;
use thiserror::Error;

use crate::model::{Question, QuestionDraft, QuestionError, QuestionId};

/// Keys searched, in priority order, when the document is an object.
pub const KNOWN_QUESTION_KEYS: [&str; 7] = [
    "programming_languages_exam_questions",
    "chemistry_questions",
    "questions",
    "quiz_questions",
    "exam_questions",
    "question_bank",
    "items",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("question data is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no question list found in the document")]
    NoQuestionsFound,

    #[error("question list contained no valid questions ({rejected} rejected)")]
    NoValidQuestions { rejected: usize },
}

/// Text encoding that was used to read a question file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// A record that looked like a question but failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedQuestion {
    pub index: usize,
    pub reason: QuestionError,
}

/// Result of normalizing a document: accepted questions plus dropped records.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBank {
    pub questions: Vec<Question>,
    pub rejected: Vec<RejectedQuestion>,
    pub encoding: TextEncoding,
}

/// Decode raw bytes as UTF-8, falling back to Latin-1.
///
/// A leading UTF-8 byte order mark is skipped. Latin-1 maps every byte to a character, so
/// decoding itself never fails; garbage surfaces later as a JSON error.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, TextEncoding) {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), TextEncoding::Utf8),
        Err(_) => (
            Cow::Owned(bytes.iter().copied().map(char::from).collect()),
            TextEncoding::Latin1,
        ),
    }
}

/// Decode and normalize a question file.
///
/// # Errors
///
/// Returns `LoadError::Decode` for text that is not JSON, and the errors of
/// [`normalize_with_report`] otherwise.
pub fn parse_bytes(bytes: &[u8]) -> Result<NormalizedBank, LoadError> {
    let (text, encoding) = decode_text(bytes);
    let value: Value = serde_json::from_str(&text)?;
    let mut bank = normalize_with_report(&value)?;
    bank.encoding = encoding;
    Ok(bank)
}

/// Extract the validated question list from a JSON document.
///
/// # Errors
///
/// Returns `LoadError::NoQuestionsFound` if no candidate list exists, or
/// `LoadError::NoValidQuestions` if every record in it was rejected.
pub fn normalize(raw: &Value) -> Result<Vec<Question>, LoadError> {
    normalize_with_report(raw).map(|bank| bank.questions)
}

/// Like [`normalize`], but also reports which records were dropped and why.
///
/// # Errors
///
/// See [`normalize`].
pub fn normalize_with_report(raw: &Value) -> Result<NormalizedBank, LoadError> {
    let items = find_question_list(raw).ok_or(LoadError::NoQuestionsFound)?;

    let mut questions = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match QuestionDraft::from_json(item).and_then(QuestionDraft::validate) {
            Ok(question) => questions.push(question),
            Err(reason) => rejected.push(RejectedQuestion { index, reason }),
        }
    }

    if questions.is_empty() {
        return Err(LoadError::NoValidQuestions {
            rejected: rejected.len(),
        });
    }

    Ok(NormalizedBank {
        questions,
        rejected,
        encoding: TextEncoding::Utf8,
    })
}

/// Shape check: an object carrying a prompt, `options` and `correct_answer`.
///
/// Only key presence is checked; field contents are validated when the question is built.
#[must_use]
pub fn is_question_shape(value: &Value) -> bool {
    let Value::Object(record) = value else {
        return false;
    };
    (record.contains_key("question") || record.contains_key("text"))
        && record.contains_key("options")
        && record.contains_key("correct_answer")
}

fn as_question_list(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) if items.first().is_some_and(is_question_shape) => Some(items),
        _ => None,
    }
}

fn find_question_list(raw: &Value) -> Option<&Vec<Value>> {
    match raw {
        Value::Array(_) => as_question_list(raw),
        Value::Object(map) => KNOWN_QUESTION_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(as_question_list)
            .or_else(|| map.values().find_map(as_question_list)),
        _ => None,
    }
}

/// Built-in question set used when no usable question file is available.
#[must_use]
pub fn fallback_questions() -> Vec<Question> {
    [
        QuestionDraft::new(
            "Which category of programming languages achieves its effect by changing the value \
             of variables through assignment statements?",
            [
                ("A", "Functional Languages"),
                ("B", "Logic Programming Languages"),
                ("C", "Imperative Languages"),
                ("D", "Object-Oriented Languages"),
            ],
            "C",
        )
        .with_id(QuestionId::Number(1))
        .with_topic("Language Categories")
        .with_page(1)
        .with_explanation(
            "Imperative languages work by changing program state through assignment \
             statements and commands.",
        ),
        QuestionDraft::new(
            "Which of the following is a key characteristic of functional programming?",
            [
                ("A", "Mutable state"),
                ("B", "Side effects"),
                ("C", "Immutable data"),
                ("D", "Class inheritance"),
            ],
            "C",
        )
        .with_id(QuestionId::Number(2))
        .with_topic("Functional Programming")
        .with_page(2)
        .with_explanation("Functional programming emphasizes immutable data and avoiding side effects."),
    ]
    .into_iter()
    .filter_map(|draft| draft.validate().ok())
    .collect()
}
