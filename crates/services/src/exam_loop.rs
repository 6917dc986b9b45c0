use exam_core::exam::{ExamProgress, ExamState};
use exam_core::model::{OptionLabel, Question};
use tracing::info;

use crate::bank_service::LoadedQuestions;
use crate::error::ExamServiceError;
use crate::session_store::SessionStore;

/// The running exam plus where its questions came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamSession {
    exam: ExamState,
    source_name: Option<String>,
    restored: bool,
}

impl ExamSession {
    #[must_use]
    pub fn exam(&self) -> &ExamState {
        &self.exam
    }

    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// True if this session was resumed from a saved snapshot.
    #[must_use]
    pub fn is_restored(&self) -> bool {
        self.restored
    }
}

/// A user request against the running exam.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamAction {
    Submit(OptionLabel),
    Next,
    Previous,
    Retry,
    Finish,
    /// Start over with the same questions.
    Restart,
    Shuffle,
    /// Start over with a new question set.
    Replace {
        questions: Vec<Question>,
        source_name: Option<String>,
    },
}

/// Result of applying an [`ExamAction`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Set for `Submit`: whether the answer was correct.
    pub correct: Option<bool>,
    pub progress: ExamProgress,
    /// False when the snapshot could not be written; the exam continues in memory.
    pub persisted: bool,
}

/// Drives an exam and saves a snapshot after every successful transition.
#[derive(Clone)]
pub struct ExamLoopService {
    store: SessionStore,
}

impl ExamLoopService {
    #[must_use]
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resume a fresh saved exam if there is one, otherwise start over `loaded`.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Exam` if a new exam has to be started and `loaded` is empty.
    pub async fn resume_or_start(
        &self,
        loaded: LoadedQuestions,
    ) -> Result<ExamSession, ExamServiceError> {
        if let Some((exam, source_name)) = self.store.restore().await {
            return Ok(ExamSession {
                exam,
                source_name,
                restored: true,
            });
        }
        self.start(loaded).await
    }

    /// Start a new exam over `loaded`, replacing any saved one.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Exam` if `loaded` holds no questions.
    pub async fn start(&self, loaded: LoadedQuestions) -> Result<ExamSession, ExamServiceError> {
        let exam = ExamState::new(loaded.questions)?;
        let session = ExamSession {
            exam,
            source_name: loaded.source.name(),
            restored: false,
        };
        info!(total = session.exam.len(), source = ?session.source_name, "started exam");
        self.store
            .save_best_effort(&session.exam, session.source_name())
            .await;
        Ok(session)
    }

    /// Apply `action` to the session and persist the new state.
    ///
    /// On error the session is left unchanged and nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Exam` if the action is not allowed in the current state.
    pub async fn apply(
        &self,
        session: &mut ExamSession,
        action: ExamAction,
    ) -> Result<ActionOutcome, ExamServiceError> {
        let exam = &mut session.exam;
        let mut correct = None;
        match action {
            ExamAction::Submit(label) => correct = Some(exam.submit_answer(label)?),
            ExamAction::Next => exam.next()?,
            ExamAction::Previous => exam.previous()?,
            ExamAction::Retry => exam.retry()?,
            ExamAction::Finish => {
                exam.finish()?;
                info!(score = exam.score(), total = exam.len(), "exam completed");
            }
            ExamAction::Restart => exam.reset(None)?,
            ExamAction::Shuffle => exam.shuffle(&mut rand::rng())?,
            ExamAction::Replace {
                questions,
                source_name,
            } => {
                exam.reset(Some(questions))?;
                session.source_name = source_name;
            }
        }

        let persisted = self
            .store
            .save_best_effort(&session.exam, session.source_name())
            .await;
        Ok(ActionOutcome {
            correct,
            progress: session.exam.progress(),
            persisted,
        })
    }
}
