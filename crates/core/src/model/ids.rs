use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Opaque identifier carried by a question.
///
/// Question files use integers or strings; any other scalar is kept as its JSON text.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(i64),
    Text(String),
}

impl QuestionId {
    /// Build an id from a raw JSON value. `null` means "no id".
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => Some(
                n.as_i64()
                    .map_or_else(|| Self::Text(n.to_string()), Self::Number),
            ),
            Value::String(s) => Some(Self::Text(s.clone())),
            other => Some(Self::Text(other.to_string())),
        }
    }
}

/// Short label identifying an answer option, e.g. `"A"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionLabel(String);

impl OptionLabel {
    /// Creates a label, trimming surrounding whitespace.
    ///
    /// Returns `None` for blank input.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({self})")
    }
}

impl fmt::Debug for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionLabel({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an option label from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLabelError;

impl fmt::Display for ParseLabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option label must not be blank")
    }
}

impl std::error::Error for ParseLabelError {}

impl FromStr for OptionLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or(ParseLabelError)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_id_from_integer_and_string() {
        assert_eq!(QuestionId::from_json(&json!(7)), Some(QuestionId::Number(7)));
        assert_eq!(
            QuestionId::from_json(&json!("q-7")),
            Some(QuestionId::Text("q-7".into()))
        );
        assert_eq!(QuestionId::from_json(&Value::Null), None);
    }

    #[test]
    fn question_id_keeps_other_scalars_as_text() {
        assert_eq!(
            QuestionId::from_json(&json!(1.5)),
            Some(QuestionId::Text("1.5".into()))
        );
        assert_eq!(
            QuestionId::from_json(&json!(true)),
            Some(QuestionId::Text("true".into()))
        );
    }

    #[test]
    fn label_trims_and_rejects_blank() {
        let label: OptionLabel = " B ".parse().unwrap();
        assert_eq!(label.as_str(), "B");
        assert!("   ".parse::<OptionLabel>().is_err());
    }

    #[test]
    fn question_id_serializes_untagged() {
        let encoded = serde_json::to_string(&QuestionId::Number(3)).unwrap();
        assert_eq!(encoded, "3");
        let decoded: QuestionId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(decoded, QuestionId::Text("abc".into()));
    }
}
