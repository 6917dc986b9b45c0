use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{OptionLabel, Question};

/// Serializable copy of an exam in progress.
///
/// `score` and `topic_counts` are stored for readers of the raw payload; they are
/// recomputed and cross-checked when the snapshot is restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSnapshot {
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub score: usize,
    pub answered_current: bool,
    pub user_answers: Vec<Option<OptionLabel>>,
    pub completed: bool,
    pub topic_counts: BTreeMap<String, usize>,
    pub source_name: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl ExamSnapshot {
    /// Returns true if the snapshot was saved no longer than `window` before `now`.
    ///
    /// Snapshots stamped in the future (clock skew) are treated as fresh.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.saved_at) <= window
    }
}
