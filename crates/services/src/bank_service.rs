use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use exam_core::bank::{self, LoadError, NormalizedBank, TextEncoding};
use exam_core::model::Question;
use tracing::{debug, info, warn};

use crate::error::BankServiceError;

/// Default location of the local question file.
pub const DEFAULT_QUESTIONS_PATH: &str = "programming_questions.json";

/// Name recorded for question sets pasted as text.
pub const PASTED_SOURCE_NAME: &str = "pasted_json.json";

/// Where the active question set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionSource {
    /// The configured local question file.
    File(PathBuf),
    /// A file supplied by the user at runtime.
    Upload { name: String },
    /// JSON text pasted directly.
    Pasted,
    /// The built-in fallback set.
    BuiltIn,
}

impl QuestionSource {
    /// Name recorded in saved sessions; `None` for the built-in set.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match self {
            Self::File(path) => Some(path.display().to_string()),
            Self::Upload { name } => Some(name.clone()),
            Self::Pasted => Some(PASTED_SOURCE_NAME.to_owned()),
            Self::BuiltIn => None,
        }
    }
}

/// A usable question set together with its origin.
#[derive(Debug)]
pub struct LoadedQuestions {
    pub questions: Vec<Question>,
    pub source: QuestionSource,
    /// Why the requested source was replaced by the built-in set, if it was.
    pub fallback_reason: Option<BankServiceError>,
}

impl LoadedQuestions {
    #[must_use]
    pub fn built_in() -> Self {
        Self {
            questions: bank::fallback_questions(),
            source: QuestionSource::BuiltIn,
            fallback_reason: None,
        }
    }

    fn fallback(reason: BankServiceError) -> Self {
        Self {
            fallback_reason: Some(reason),
            ..Self::built_in()
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == QuestionSource::BuiltIn
    }
}

/// Loads question sets from files, uploads and pasted text.
///
/// Loading the configured file never fails: any problem is logged and the built-in
/// question set is returned instead.
#[derive(Debug, Clone)]
pub struct QuestionBankService {
    questions_path: PathBuf,
}

impl Default for QuestionBankService {
    fn default() -> Self {
        Self::new(DEFAULT_QUESTIONS_PATH)
    }
}

impl QuestionBankService {
    #[must_use]
    pub fn new(questions_path: impl Into<PathBuf>) -> Self {
        Self {
            questions_path: questions_path.into(),
        }
    }

    #[must_use]
    pub fn questions_path(&self) -> &Path {
        &self.questions_path
    }

    /// Load the configured question file, or the built-in set if it is missing or unusable.
    #[must_use]
    pub fn load_default(&self) -> LoadedQuestions {
        let path = self.questions_path.as_path();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no local question file, using built-in questions");
                return LoadedQuestions::built_in();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read question file");
                return LoadedQuestions::fallback(err.into());
            }
        };

        self.load_or_fallback(&bytes, QuestionSource::File(path.to_path_buf()))
    }

    /// Parse a user-supplied question set.
    ///
    /// Unlike [`Self::load_default`] this does not fall back: the caller keeps its current
    /// exam when the upload is unusable.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Load` if the bytes are not a usable question document.
    pub fn parse_upload(
        &self,
        bytes: &[u8],
        source: QuestionSource,
    ) -> Result<LoadedQuestions, BankServiceError> {
        match bank::parse_bytes(bytes) {
            Ok(parsed) => Ok(accept(parsed, source)),
            Err(err) => {
                warn!(source = ?source.name(), error = %err, "rejected question source");
                Err(err.into())
            }
        }
    }

    /// Parse pasted JSON text.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Load` if the text is not a usable question document.
    pub fn parse_pasted(&self, text: &str) -> Result<LoadedQuestions, BankServiceError> {
        self.parse_upload(text.as_bytes(), QuestionSource::Pasted)
    }

    /// Parse `bytes`, substituting the built-in set on any load error.
    #[must_use]
    pub fn load_or_fallback(&self, bytes: &[u8], source: QuestionSource) -> LoadedQuestions {
        match self.parse_upload(bytes, source) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!("falling back to built-in questions");
                LoadedQuestions::fallback(err)
            }
        }
    }

    /// Write an accepted upload to the configured question path so it loads next time.
    ///
    /// The bytes are validated first; an unusable document is never written.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Load` for unusable documents, `BankServiceError::Io` if the
    /// file cannot be written.
    pub fn store_source(&self, bytes: &[u8]) -> Result<(), BankServiceError> {
        bank::parse_bytes(bytes).map_err(|err: LoadError| {
            warn!(error = %err, "refusing to store unusable question file");
            err
        })?;
        if let Some(parent) = self
            .questions_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.questions_path, bytes)?;
        info!(path = %self.questions_path.display(), "stored question file");
        Ok(())
    }
}

fn accept(parsed: NormalizedBank, source: QuestionSource) -> LoadedQuestions {
    for rejected in &parsed.rejected {
        debug!(index = rejected.index, reason = %rejected.reason, "dropped invalid question");
    }
    if !parsed.rejected.is_empty() {
        warn!(
            dropped = parsed.rejected.len(),
            kept = parsed.questions.len(),
            "some questions were invalid and skipped"
        );
    }
    if parsed.encoding == TextEncoding::Latin1 {
        info!(source = ?source.name(), "question source is not UTF-8, read as Latin-1");
    }
    info!(count = parsed.questions.len(), source = ?source.name(), "loaded questions");

    LoadedQuestions {
        questions: parsed.questions,
        source,
        fallback_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_QUESTION: &str =
        r#"{"questions":[{"question":"Q1?","options":{"A":"x","B":"y"},"correct_answer":"A"}]}"#;

    #[test]
    fn missing_file_uses_built_in_set_without_reason() {
        let dir = tempfile::tempdir().unwrap();
        let service = QuestionBankService::new(dir.path().join("absent.json"));

        let loaded = service.load_default();
        assert!(loaded.is_fallback());
        assert!(loaded.fallback_reason.is_none());
        assert_eq!(loaded.questions.len(), 2);
    }

    #[test]
    fn local_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        fs::write(&path, ONE_QUESTION).unwrap();

        let loaded = QuestionBankService::new(&path).load_default();
        assert_eq!(loaded.source, QuestionSource::File(path));
        assert_eq!(loaded.questions.len(), 1);
    }

    #[test]
    fn undecodable_bytes_fall_back_to_built_in_set() {
        let service = QuestionBankService::default();
        let loaded = service.load_or_fallback(
            &[0xFF, 0xFE, 0x00, 0x9C],
            QuestionSource::Upload {
                name: "broken.json".into(),
            },
        );

        assert!(loaded.is_fallback());
        assert!(matches!(
            loaded.fallback_reason,
            Some(BankServiceError::Load(LoadError::Decode(_)))
        ));
        assert_eq!(loaded.questions, bank::fallback_questions());
    }

    #[test]
    fn structurally_empty_document_falls_back() {
        let loaded = QuestionBankService::default()
            .load_or_fallback(br#"{"questions": []}"#, QuestionSource::Pasted);
        assert!(matches!(
            loaded.fallback_reason,
            Some(BankServiceError::Load(LoadError::NoQuestionsFound))
        ));
    }

    #[test]
    fn pasted_text_keeps_pasted_source() {
        let loaded = QuestionBankService::default()
            .parse_pasted(ONE_QUESTION)
            .unwrap();
        assert_eq!(loaded.source, QuestionSource::Pasted);
        assert_eq!(loaded.source.name().as_deref(), Some(PASTED_SOURCE_NAME));
    }

    #[test]
    fn upload_errors_are_returned_not_replaced() {
        let err = QuestionBankService::default()
            .parse_upload(b"[]", QuestionSource::Pasted)
            .unwrap_err();
        assert!(matches!(err, BankServiceError::Load(LoadError::NoQuestionsFound)));
    }

    #[test]
    fn store_source_writes_only_valid_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bank.json");
        let service = QuestionBankService::new(&path);

        assert!(service.store_source(b"not json").is_err());
        assert!(!path.exists());

        service.store_source(ONE_QUESTION.as_bytes()).unwrap();
        let reloaded = service.load_default();
        assert!(!reloaded.is_fallback());
        assert_eq!(reloaded.questions[0].text(), "Q1?");
    }
}
