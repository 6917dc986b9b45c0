#![forbid(unsafe_code)]

pub mod bank_service;
pub mod error;
pub mod exam_loop;
pub mod session_store;

pub use exam_core::Clock;

pub use bank_service::{LoadedQuestions, QuestionBankService, QuestionSource};
pub use error::{BankServiceError, ExamServiceError};
pub use exam_loop::{ActionOutcome, ExamAction, ExamLoopService, ExamSession};
pub use session_store::SessionStore;
