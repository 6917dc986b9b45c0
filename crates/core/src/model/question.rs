use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::{OptionLabel, QuestionId};

/// Topic assigned to questions that do not name one.
pub const DEFAULT_TOPIC: &str = "General";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question record is not an object")]
    NotAnObject,

    #[error("question text is missing or blank")]
    MissingText,

    #[error("options must be a non-empty mapping")]
    MissingOptions,

    #[error("option label must not be blank")]
    BlankOptionLabel,

    #[error("duplicate option label: {0}")]
    DuplicateOptionLabel(String),

    #[error("option {label} has no usable text")]
    InvalidOptionText { label: String },

    #[error("correct_answer is missing")]
    MissingCorrectAnswer,

    #[error("correct_answer {0} is not one of the options")]
    UnknownCorrectAnswer(String),
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated option as read from a question file or snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDraft {
    pub label: String,
    pub text: String,
}

/// Unvalidated question. Call [`QuestionDraft::validate`] to obtain a [`Question`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default)]
    pub id: Option<QuestionId>,
    #[serde(default)]
    pub topic: Option<String>,
    pub text: String,
    pub options: Vec<OptionDraft>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
}

impl QuestionDraft {
    pub fn new<L, T>(
        text: impl Into<String>,
        options: impl IntoIterator<Item = (L, T)>,
        correct_answer: impl Into<String>,
    ) -> Self
    where
        L: Into<String>,
        T: Into<String>,
    {
        Self {
            text: text.into(),
            options: options
                .into_iter()
                .map(|(label, text)| OptionDraft {
                    label: label.into(),
                    text: text.into(),
                })
                .collect(),
            correct_answer: correct_answer.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: QuestionId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    /// Read a draft out of a question-file record.
    ///
    /// The prompt is taken from `question`, or `text` when `question` is absent.
    /// Option texts and `correct_answer` may be strings or plain scalars.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when a required field is missing or has an unusable shape.
    pub fn from_json(value: &Value) -> Result<Self, QuestionError> {
        let Value::Object(record) = value else {
            return Err(QuestionError::NotAnObject);
        };

        let text = record
            .get("question")
            .or_else(|| record.get("text"))
            .and_then(Value::as_str)
            .ok_or(QuestionError::MissingText)?
            .to_owned();

        let Some(Value::Object(raw_options)) = record.get("options") else {
            return Err(QuestionError::MissingOptions);
        };
        let mut options = Vec::with_capacity(raw_options.len());
        for (label, raw_text) in raw_options {
            let text = scalar_text(raw_text).ok_or_else(|| QuestionError::InvalidOptionText {
                label: label.clone(),
            })?;
            options.push(OptionDraft {
                label: label.clone(),
                text,
            });
        }

        let correct_answer = record
            .get("correct_answer")
            .and_then(scalar_text)
            .ok_or(QuestionError::MissingCorrectAnswer)?;

        Ok(Self {
            id: record.get("id").and_then(QuestionId::from_json),
            topic: record.get("topic").and_then(Value::as_str).map(str::to_owned),
            text,
            options,
            correct_answer,
            explanation: record
                .get("explanation")
                .and_then(Value::as_str)
                .map(str::to_owned),
            page: record.get("page").and_then(page_number),
        })
    }

    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank, options are empty, labels are blank or
    /// duplicated, or `correct_answer` does not name one of the options.
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.text.trim().is_empty() {
            return Err(QuestionError::MissingText);
        }
        if self.options.is_empty() {
            return Err(QuestionError::MissingOptions);
        }

        let mut options: Vec<AnswerOption> = Vec::with_capacity(self.options.len());
        for draft in self.options {
            let label = OptionLabel::new(&draft.label).ok_or(QuestionError::BlankOptionLabel)?;
            if options.iter().any(|existing| existing.label == label) {
                return Err(QuestionError::DuplicateOptionLabel(label.to_string()));
            }
            options.push(AnswerOption {
                label,
                text: draft.text,
            });
        }

        let correct_answer =
            OptionLabel::new(&self.correct_answer).ok_or(QuestionError::MissingCorrectAnswer)?;
        if !options.iter().any(|option| option.label == correct_answer) {
            return Err(QuestionError::UnknownCorrectAnswer(correct_answer.to_string()));
        }

        Ok(Question {
            id: self.id,
            topic: normalize_optional(self.topic).unwrap_or_else(|| DEFAULT_TOPIC.to_owned()),
            text: self.text,
            options,
            correct_answer,
            explanation: normalize_optional(self.explanation),
            page: self.page,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    label: OptionLabel,
    text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn label(&self) -> &OptionLabel {
        &self.label
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A validated multiple-choice question.
///
/// `correct_answer` always names one of `options`; options keep their file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft")]
pub struct Question {
    id: Option<QuestionId>,
    topic: String,
    text: String,
    options: Vec<AnswerOption>,
    correct_answer: OptionLabel,
    explanation: Option<String>,
    page: Option<i64>,
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl Question {
    #[must_use]
    pub fn id(&self) -> Option<&QuestionId> {
        self.id.as_ref()
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &OptionLabel {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn page(&self) -> Option<i64> {
        self.page
    }

    #[must_use]
    pub fn has_option(&self, label: &OptionLabel) -> bool {
        self.options.iter().any(|option| &option.label == label)
    }

    #[must_use]
    pub fn option_text(&self, label: &OptionLabel) -> Option<&str> {
        self.options
            .iter()
            .find(|option| &option.label == label)
            .map(AnswerOption::text)
    }

    #[must_use]
    pub fn is_correct(&self, label: &OptionLabel) -> bool {
        &self.correct_answer == label
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn page_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
