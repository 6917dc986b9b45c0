mod ids;
mod question;
mod snapshot;

pub use ids::{OptionLabel, ParseLabelError, QuestionId};
pub use question::{
    AnswerOption, DEFAULT_TOPIC, OptionDraft, Question, QuestionDraft, QuestionError,
};
pub use snapshot::ExamSnapshot;
