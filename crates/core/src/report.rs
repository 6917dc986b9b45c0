use crate::model::{OptionLabel, Question};

/// Coarse rating of a finished exam by percentage score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    Outstanding,
    Excellent,
    VeryGood,
    Good,
    KeepStudying,
}

impl PerformanceBand {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Outstanding
        } else if percentage >= 80.0 {
            Self::Excellent
        } else if percentage >= 70.0 {
            Self::VeryGood
        } else if percentage >= 60.0 {
            Self::Good
        } else {
            Self::KeepStudying
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Outstanding => "Outstanding! Expert level.",
            Self::Excellent => "Excellent! Strong understanding of the concepts.",
            Self::VeryGood => "Very good! Solid knowledge base.",
            Self::Good => "Good! Review the challenging topics.",
            Self::KeepStudying => "Keep studying! Focus on the fundamentals.",
        }
    }
}

/// Per-question line of the final review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub index: usize,
    pub topic: String,
    pub text: String,
    pub page: Option<i64>,
    pub chosen: Option<OptionLabel>,
    pub chosen_text: Option<String>,
    pub correct_answer: OptionLabel,
    pub correct_text: String,
    pub explanation: Option<String>,
    pub is_correct: bool,
}

impl QuestionReview {
    pub(crate) fn new(index: usize, question: &Question, chosen: Option<&OptionLabel>) -> Self {
        let correct_answer = question.correct_answer().clone();
        Self {
            index,
            topic: question.topic().to_owned(),
            text: question.text().to_owned(),
            page: question.page(),
            chosen: chosen.cloned(),
            chosen_text: chosen
                .and_then(|label| question.option_text(label))
                .map(str::to_owned),
            correct_text: question
                .option_text(&correct_answer)
                .unwrap_or_default()
                .to_owned(),
            correct_answer,
            explanation: question.explanation().map(str::to_owned),
            is_correct: chosen.is_some_and(|label| question.is_correct(label)),
        }
    }
}

/// Outcome of a completed exam.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamResults {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
    pub band: PerformanceBand,
    pub reviews: Vec<QuestionReview>,
}

impl ExamResults {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn new(score: usize, total: usize, reviews: Vec<QuestionReview>) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            score as f64 * 100.0 / total as f64
        };
        Self {
            score,
            total,
            percentage,
            band: PerformanceBand::from_percentage(percentage),
            reviews,
        }
    }

    /// Score formatted as `"correct/total"`.
    #[must_use]
    pub fn score_line(&self) -> String {
        format!("{}/{}", self.score, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionDraft;

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(PerformanceBand::from_percentage(100.0), PerformanceBand::Outstanding);
        assert_eq!(PerformanceBand::from_percentage(90.0), PerformanceBand::Outstanding);
        assert_eq!(PerformanceBand::from_percentage(85.0), PerformanceBand::Excellent);
        assert_eq!(PerformanceBand::from_percentage(70.0), PerformanceBand::VeryGood);
        assert_eq!(PerformanceBand::from_percentage(60.0), PerformanceBand::Good);
        assert_eq!(PerformanceBand::from_percentage(59.9), PerformanceBand::KeepStudying);
    }

    #[test]
    fn review_describes_unanswered_question() {
        let question = QuestionDraft::new("Q?", [("A", "x"), ("B", "y")], "B")
            .with_explanation("why")
            .validate()
            .unwrap();
        let review = QuestionReview::new(0, &question, None);

        assert_eq!(review.chosen, None);
        assert_eq!(review.chosen_text, None);
        assert_eq!(review.correct_text, "y");
        assert_eq!(review.explanation.as_deref(), Some("why"));
        assert!(!review.is_correct);
    }

    #[test]
    fn results_compute_percentage() {
        let results = ExamResults::new(3, 4, Vec::new());
        assert_eq!(results.score_line(), "3/4");
        assert!((results.percentage - 75.0).abs() < f64::EPSILON);
        assert_eq!(results.band, PerformanceBand::VeryGood);
    }
}
