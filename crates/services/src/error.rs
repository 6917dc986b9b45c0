//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::bank::LoadError;
use exam_core::exam::ExamError;

/// Errors emitted by `QuestionBankService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankServiceError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("could not access question file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors emitted by exam sessions.
///
/// Persistence failures never show up here: they are logged and reported through
/// `ActionOutcome::persisted` instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamServiceError {
    #[error(transparent)]
    Exam(#[from] ExamError),
}
