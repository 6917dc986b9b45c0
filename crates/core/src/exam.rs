use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::model::{ExamSnapshot, OptionLabel, Question};
use crate::report::{ExamResults, QuestionReview};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A transition was requested outside its allowed state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("no questions available for the exam")]
    Empty,

    #[error("option {label} is not offered by the current question")]
    InvalidLabel { label: String },

    #[error("current question has already been answered")]
    AlreadyAnswered,

    #[error("current question has not been answered yet")]
    NotAnswered,

    #[error("already at the first question")]
    AtFirstQuestion,

    #[error("already at the last question")]
    AtLastQuestion,

    #[error("the exam can only be finished from the last question")]
    NotAtLastQuestion,

    #[error("exam already completed")]
    Completed,

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Coarse state of an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    InProgress { index: usize, answered: bool },
    Completed,
}

/// Aggregated progress numbers, useful for status lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamProgress {
    pub total: usize,
    pub attempted: usize,
    pub score: usize,
    /// `score / attempted`, or `0.0` before any answer.
    pub accuracy: f64,
    /// Fraction of questions attempted; `1.0` once the exam is completed.
    pub progress: f64,
    pub is_complete: bool,
}

/// Linear multiple-choice exam over a fixed question sequence.
///
/// The score is never stored: it is derived from the recorded answers, so revisiting
/// and re-answering a question cannot make it drift.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamState {
    questions: Vec<Question>,
    current: usize,
    answers: Vec<Option<OptionLabel>>,
    answered_current: bool,
    completed: bool,
}

impl ExamState {
    /// Start an exam at the first question.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Empty` if no questions are provided.
    pub fn new(questions: Vec<Question>) -> Result<Self, ExamError> {
        if questions.is_empty() {
            return Err(ExamError::Empty);
        }
        let answers = vec![None; questions.len()];
        Ok(Self {
            questions,
            current: 0,
            answers,
            answered_current: false,
            completed: false,
        })
    }

    /// Rehydrate an exam from a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::InvalidSnapshot` if the snapshot is internally inconsistent.
    pub fn from_snapshot(snapshot: ExamSnapshot) -> Result<Self, ExamError> {
        let invalid = |reason: &str| ExamError::InvalidSnapshot(reason.to_owned());

        if snapshot.questions.is_empty() {
            return Err(invalid("no questions"));
        }
        if snapshot.user_answers.len() != snapshot.questions.len() {
            return Err(invalid("answers do not line up with questions"));
        }
        if snapshot.current_index >= snapshot.questions.len() {
            return Err(invalid("current index out of range"));
        }
        let labels_valid = snapshot
            .questions
            .iter()
            .zip(&snapshot.user_answers)
            .all(|(question, answer)| answer.as_ref().is_none_or(|label| question.has_option(label)));
        if !labels_valid {
            return Err(invalid("recorded answer is not an option of its question"));
        }
        if snapshot.answered_current && snapshot.user_answers[snapshot.current_index].is_none() {
            return Err(invalid("current question marked answered without an answer"));
        }
        let last = snapshot.questions.len() - 1;
        if snapshot.completed && (snapshot.current_index != last || !snapshot.answered_current) {
            return Err(invalid("completed exam must rest on the answered last question"));
        }

        let state = Self {
            questions: snapshot.questions,
            current: snapshot.current_index,
            answers: snapshot.user_answers,
            answered_current: snapshot.answered_current,
            completed: snapshot.completed,
        };
        if state.score() != snapshot.score {
            return Err(invalid("stored score does not match recorded answers"));
        }
        Ok(state)
    }

    /// Capture the current state for persistence.
    #[must_use]
    pub fn snapshot(&self, source_name: Option<String>, saved_at: DateTime<Utc>) -> ExamSnapshot {
        ExamSnapshot {
            questions: self.questions.clone(),
            current_index: self.current,
            score: self.score(),
            answered_current: self.answered_current,
            user_answers: self.answers.clone(),
            completed: self.completed,
            topic_counts: self.topic_counts(),
            source_name,
            saved_at,
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false: an exam cannot be built without questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn answered_current(&self) -> bool {
        self.answered_current
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    #[must_use]
    pub fn phase(&self) -> ExamPhase {
        if self.completed {
            ExamPhase::Completed
        } else {
            ExamPhase::InProgress {
                index: self.current,
                answered: self.answered_current,
            }
        }
    }

    #[must_use]
    pub fn user_answers(&self) -> &[Option<OptionLabel>] {
        &self.answers
    }

    /// Answer previously recorded for the current question, if any.
    ///
    /// After `next`, `previous` or `retry` this is the pre-selection to offer the user.
    #[must_use]
    pub fn preselected(&self) -> Option<&OptionLabel> {
        self.answers[self.current].as_ref()
    }

    #[must_use]
    pub fn score(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(question, answer)| {
                answer.as_ref().is_some_and(|label| question.is_correct(label))
            })
            .count()
    }

    /// Number of questions with a recorded answer.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.answers.iter().filter(|answer| answer.is_some()).count()
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.score(), self.attempted())
    }

    #[must_use]
    pub fn topic_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for question in &self.questions {
            *counts.entry(question.topic().to_owned()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn progress(&self) -> ExamProgress {
        let total = self.len();
        let attempted = self.attempted();
        ExamProgress {
            total,
            attempted,
            score: self.score(),
            accuracy: self.accuracy(),
            progress: if self.completed {
                1.0
            } else {
                ratio(attempted, total)
            },
            is_complete: self.completed,
        }
    }

    /// Final results; `None` until the exam is finished.
    #[must_use]
    pub fn results(&self) -> Option<ExamResults> {
        if !self.completed {
            return None;
        }
        let reviews = self
            .questions
            .iter()
            .zip(&self.answers)
            .enumerate()
            .map(|(index, (question, answer))| QuestionReview::new(index, question, answer.as_ref()))
            .collect();
        Some(ExamResults::new(self.score(), self.len(), reviews))
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Record an answer for the current question. Returns whether it was correct.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::AlreadyAnswered` if the question was submitted in this viewing,
    /// or `ExamError::InvalidLabel` if the label is not one of its options.
    pub fn submit_answer(&mut self, label: OptionLabel) -> Result<bool, ExamError> {
        self.ensure_in_progress()?;
        if self.answered_current {
            return Err(ExamError::AlreadyAnswered);
        }
        let question = &self.questions[self.current];
        if !question.has_option(&label) {
            return Err(ExamError::InvalidLabel {
                label: label.to_string(),
            });
        }

        let correct = question.is_correct(&label);
        self.answers[self.current] = Some(label);
        self.answered_current = true;
        Ok(correct)
    }

    /// Move to the next question.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotAnswered` before the current question is answered, or
    /// `ExamError::AtLastQuestion` on the last question.
    pub fn next(&mut self) -> Result<(), ExamError> {
        self.ensure_in_progress()?;
        if !self.answered_current {
            return Err(ExamError::NotAnswered);
        }
        if self.is_last() {
            return Err(ExamError::AtLastQuestion);
        }
        self.current += 1;
        self.answered_current = false;
        Ok(())
    }

    /// Move back one question.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::AtFirstQuestion` on the first question.
    pub fn previous(&mut self) -> Result<(), ExamError> {
        self.ensure_in_progress()?;
        if self.current == 0 {
            return Err(ExamError::AtFirstQuestion);
        }
        self.current -= 1;
        self.answered_current = self.answers[self.current].is_some();
        Ok(())
    }

    /// Reopen the current question for another attempt.
    ///
    /// The recorded answer stays in place until it is overwritten by the next submission.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotAnswered` if the current question is still open.
    pub fn retry(&mut self) -> Result<(), ExamError> {
        self.ensure_in_progress()?;
        if !self.answered_current {
            return Err(ExamError::NotAnswered);
        }
        self.answered_current = false;
        Ok(())
    }

    /// Complete the exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotAnswered` if the last question is still open, or
    /// `ExamError::NotAtLastQuestion` when called elsewhere.
    pub fn finish(&mut self) -> Result<(), ExamError> {
        self.ensure_in_progress()?;
        if !self.answered_current {
            return Err(ExamError::NotAnswered);
        }
        if !self.is_last() {
            return Err(ExamError::NotAtLastQuestion);
        }
        self.completed = true;
        Ok(())
    }

    /// Start over, optionally with a different question set.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Empty` if `questions` is `Some` but empty; the state is left untouched.
    pub fn reset(&mut self, questions: Option<Vec<Question>>) -> Result<(), ExamError> {
        if let Some(questions) = questions {
            if questions.is_empty() {
                return Err(ExamError::Empty);
            }
            self.questions = questions;
        }
        self.answers = vec![None; self.questions.len()];
        self.current = 0;
        self.answered_current = false;
        self.completed = false;
        Ok(())
    }

    /// Randomly reorder the questions and return to the first one.
    ///
    /// Recorded answers move together with their questions.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Completed` once the exam is finished.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ExamError> {
        self.ensure_in_progress()?;
        let mut paired: Vec<_> = std::mem::take(&mut self.questions)
            .into_iter()
            .zip(std::mem::take(&mut self.answers))
            .collect();
        paired.shuffle(rng);
        let (questions, answers): (Vec<_>, Vec<_>) = paired.into_iter().unzip();
        self.questions = questions;
        self.answers = answers;
        self.current = 0;
        self.answered_current = false;
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), ExamError> {
        if self.completed {
            Err(ExamError::Completed)
        } else {
            Ok(())
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionDraft;
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn label(raw: &str) -> OptionLabel {
        OptionLabel::new(raw).unwrap()
    }

    fn build_question(text: &str, correct: &str, topic: &str) -> Question {
        QuestionDraft::new(text, [("A", "alpha"), ("B", "beta"), ("C", "gamma")], correct)
            .with_topic(topic)
            .validate()
            .unwrap()
    }

    fn build_exam(n: usize) -> ExamState {
        let questions = (0..n)
            .map(|i| build_question(&format!("Q{i}"), "A", if i % 2 == 0 { "Even" } else { "Odd" }))
            .collect();
        ExamState::new(questions).unwrap()
    }

    fn assert_score_invariant(exam: &ExamState) {
        let expected = exam
            .questions()
            .iter()
            .zip(exam.user_answers())
            .filter(|(q, a)| a.as_ref() == Some(q.correct_answer()))
            .count();
        assert_eq!(exam.score(), expected);
    }

    #[test]
    fn empty_exam_returns_error() {
        assert_eq!(ExamState::new(Vec::new()).unwrap_err(), ExamError::Empty);
    }

    #[test]
    fn fresh_exam_starts_in_progress_at_zero() {
        let exam = build_exam(3);
        assert_eq!(
            exam.phase(),
            ExamPhase::InProgress {
                index: 0,
                answered: false
            }
        );
        assert_eq!(exam.score(), 0);
        assert_eq!(exam.attempted(), 0);
        assert_eq!(exam.accuracy(), 0.0);
    }

    #[test]
    fn two_question_walkthrough_scores_one_of_two() {
        let mut exam = build_exam(2);

        assert!(exam.submit_answer(label("A")).unwrap());
        assert_eq!(exam.score(), 1);
        assert!(exam.answered_current());

        exam.next().unwrap();
        assert_eq!(exam.current_index(), 1);
        assert!(!exam.answered_current());

        assert!(!exam.submit_answer(label("B")).unwrap());
        assert_eq!(exam.score(), 1);

        exam.finish().unwrap();
        assert!(exam.is_completed());
        let results = exam.results().unwrap();
        assert_eq!(results.score_line(), "1/2");
    }

    #[test]
    fn double_submit_fails_and_leaves_state_unchanged() {
        let mut exam = build_exam(2);
        exam.submit_answer(label("B")).unwrap();
        let before = exam.clone();

        assert_eq!(
            exam.submit_answer(label("A")).unwrap_err(),
            ExamError::AlreadyAnswered
        );
        assert_eq!(exam, before);
        assert_eq!(exam.score(), 0);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut exam = build_exam(1);
        let err = exam.submit_answer(label("Z")).unwrap_err();
        assert_eq!(err, ExamError::InvalidLabel { label: "Z".into() });
        assert!(!exam.answered_current());
    }

    #[test]
    fn boundaries_fail_loudly() {
        let mut exam = build_exam(2);
        assert_eq!(exam.previous().unwrap_err(), ExamError::AtFirstQuestion);
        assert_eq!(exam.next().unwrap_err(), ExamError::NotAnswered);
        assert_eq!(exam.finish().unwrap_err(), ExamError::NotAnswered);
        assert_eq!(exam.retry().unwrap_err(), ExamError::NotAnswered);

        exam.submit_answer(label("A")).unwrap();
        assert_eq!(exam.finish().unwrap_err(), ExamError::NotAtLastQuestion);
        exam.next().unwrap();
        exam.submit_answer(label("A")).unwrap();
        assert_eq!(exam.next().unwrap_err(), ExamError::AtLastQuestion);
    }

    #[test]
    fn previous_restores_answered_flag_from_recorded_answers() {
        let mut exam = build_exam(3);
        exam.submit_answer(label("A")).unwrap();
        exam.next().unwrap();
        exam.previous().unwrap();
        assert_eq!(exam.current_index(), 0);
        assert!(exam.answered_current());

        exam.next().unwrap();
        exam.submit_answer(label("C")).unwrap();
        exam.next().unwrap();
        assert!(!exam.answered_current());
        exam.previous().unwrap();
        assert!(exam.answered_current());
        assert_eq!(exam.preselected(), Some(&label("C")));
    }

    #[test]
    fn next_offers_recorded_answer_as_preselection_without_rescoring() {
        let mut exam = build_exam(2);
        exam.submit_answer(label("A")).unwrap();
        exam.next().unwrap();
        exam.submit_answer(label("A")).unwrap();
        exam.previous().unwrap();
        exam.next().unwrap();

        assert!(!exam.answered_current());
        assert_eq!(exam.preselected(), Some(&label("A")));
        assert_eq!(exam.score(), 2);
    }

    #[test]
    fn retry_does_not_double_count() {
        let mut exam = build_exam(1);
        exam.submit_answer(label("A")).unwrap();
        exam.retry().unwrap();
        assert_eq!(exam.preselected(), Some(&label("A")));

        exam.submit_answer(label("A")).unwrap();
        assert_eq!(exam.score(), 1);

        exam.retry().unwrap();
        exam.submit_answer(label("B")).unwrap();
        assert_eq!(exam.score(), 0);
        assert_eq!(exam.attempted(), 1);
        assert_score_invariant(&exam);
    }

    #[test]
    fn completed_exam_rejects_everything_but_reset() {
        let mut exam = build_exam(1);
        exam.submit_answer(label("A")).unwrap();
        exam.finish().unwrap();

        assert_eq!(exam.finish().unwrap_err(), ExamError::Completed);
        assert_eq!(exam.retry().unwrap_err(), ExamError::Completed);
        assert_eq!(
            exam.submit_answer(label("A")).unwrap_err(),
            ExamError::Completed
        );
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(exam.shuffle(&mut rng).unwrap_err(), ExamError::Completed);

        exam.reset(None).unwrap();
        assert!(!exam.is_completed());
        assert_eq!(exam.attempted(), 0);
        assert_eq!(exam.len(), 1);
    }

    #[test]
    fn reset_with_empty_replacement_keeps_state() {
        let mut exam = build_exam(2);
        exam.submit_answer(label("A")).unwrap();
        let before = exam.clone();
        assert_eq!(exam.reset(Some(Vec::new())).unwrap_err(), ExamError::Empty);
        assert_eq!(exam, before);
    }

    #[test]
    fn reset_replaces_questions() {
        let mut exam = build_exam(2);
        exam.submit_answer(label("A")).unwrap();
        exam.reset(Some(vec![build_question("Other", "B", "New")])).unwrap();
        assert_eq!(exam.len(), 1);
        assert_eq!(exam.user_answers(), &[None]);
        assert_eq!(exam.current_question().text(), "Other");
    }

    #[test]
    fn shuffle_carries_answers_with_questions() {
        let mut exam = build_exam(6);
        exam.submit_answer(label("A")).unwrap();
        exam.next().unwrap();
        exam.submit_answer(label("B")).unwrap();
        exam.next().unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        exam.shuffle(&mut rng).unwrap();

        assert_eq!(exam.current_index(), 0);
        assert!(!exam.answered_current());
        assert_eq!(exam.score(), 1);
        assert_eq!(exam.attempted(), 2);
        for (question, answer) in exam.questions().iter().zip(exam.user_answers()) {
            match question.text() {
                "Q0" => assert_eq!(answer, &Some(label("A"))),
                "Q1" => assert_eq!(answer, &Some(label("B"))),
                _ => assert_eq!(answer, &None),
            }
        }
        assert_score_invariant(&exam);
    }

    #[test]
    fn topic_counts_follow_questions() {
        let exam = build_exam(3);
        let counts = exam.topic_counts();
        assert_eq!(counts.get("Even"), Some(&2));
        assert_eq!(counts.get("Odd"), Some(&1));
    }

    #[test]
    fn progress_uses_attempted_answers_not_position() {
        let mut exam = build_exam(4);
        exam.submit_answer(label("A")).unwrap();
        exam.next().unwrap();
        exam.submit_answer(label("B")).unwrap();
        exam.previous().unwrap();

        let progress = exam.progress();
        assert_eq!(progress.attempted, 2);
        assert_eq!(progress.score, 1);
        assert!((progress.accuracy - 0.5).abs() < f64::EPSILON);
        assert!((progress.progress - 0.5).abs() < f64::EPSILON);
        assert!(!progress.is_complete);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut exam = build_exam(3);
        exam.submit_answer(label("A")).unwrap();
        exam.next().unwrap();
        exam.submit_answer(label("C")).unwrap();

        let snapshot = exam.snapshot(Some("bank.json".into()), fixed_now());
        assert_eq!(snapshot.score, 1);
        assert_eq!(snapshot.topic_counts.get("Even"), Some(&2));

        let restored = ExamState::from_snapshot(snapshot).unwrap();
        assert_eq!(restored, exam);
    }

    #[test]
    fn inconsistent_snapshots_are_rejected() {
        let exam = build_exam(2);

        let mut snapshot = exam.snapshot(None, fixed_now());
        snapshot.score = 2;
        assert!(matches!(
            ExamState::from_snapshot(snapshot),
            Err(ExamError::InvalidSnapshot(_))
        ));

        let mut snapshot = exam.snapshot(None, fixed_now());
        snapshot.current_index = 5;
        assert!(matches!(
            ExamState::from_snapshot(snapshot),
            Err(ExamError::InvalidSnapshot(_))
        ));

        let mut snapshot = exam.snapshot(None, fixed_now());
        snapshot.user_answers.pop();
        assert!(matches!(
            ExamState::from_snapshot(snapshot),
            Err(ExamError::InvalidSnapshot(_))
        ));

        let mut snapshot = exam.snapshot(None, fixed_now());
        snapshot.user_answers[0] = Some(label("Z"));
        assert!(matches!(
            ExamState::from_snapshot(snapshot),
            Err(ExamError::InvalidSnapshot(_))
        ));

        let mut answered = build_exam(2);
        answered.submit_answer(label("A")).unwrap();
        let mut snapshot = answered.snapshot(None, fixed_now());
        snapshot.completed = true;
        assert!(matches!(
            ExamState::from_snapshot(snapshot),
            Err(ExamError::InvalidSnapshot(_))
        ));

        answered.next().unwrap();
        let mut snapshot = answered.snapshot(None, fixed_now());
        snapshot.completed = true;
        assert!(matches!(
            ExamState::from_snapshot(snapshot),
            Err(ExamError::InvalidSnapshot(_))
        ));

        answered.submit_answer(label("A")).unwrap();
        answered.finish().unwrap();
        let restored = ExamState::from_snapshot(answered.snapshot(None, fixed_now())).unwrap();
        assert!(restored.is_completed());
    }

    #[test]
    fn score_invariant_holds_along_a_long_walk() {
        let mut exam = build_exam(4);
        let picks = ["A", "B", "C", "A"];
        for (i, pick) in picks.iter().enumerate() {
            exam.submit_answer(label(pick)).unwrap();
            assert_score_invariant(&exam);
            if i + 1 < picks.len() {
                exam.next().unwrap();
            }
        }
        exam.previous().unwrap();
        exam.retry().unwrap();
        exam.submit_answer(label("A")).unwrap();
        assert_score_invariant(&exam);
        assert_eq!(exam.score(), 3);
    }
}
