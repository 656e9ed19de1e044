use cedar_policy::ParseErrors;
use pest::error::InputLocation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cedar::Rule;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyError {
    #[error("parse error at {position} near '{lexeme}': {message}")]
    Parse {
        position: usize,
        lexeme: String,
        message: String,
    },

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("unsupported expression shape: {0}")]
    UnsupportedShape(String),

    #[error("no name mapping for attribute: {0}")]
    NameMappingMissing(String),

    #[error("policy store error: {0}")]
    Io(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("rejected by the Cedar parser: {0}")]
    CedarValidation(String),
}

impl PolicyError {
    pub(crate) fn parse(
        position: usize,
        lexeme: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        PolicyError::Parse {
            position,
            lexeme: lexeme.into(),
            message: message.into(),
        }
    }

    /// Byte offset of a parse failure, `None` for every other kind.
    pub fn position(&self) -> Option<usize> {
        match self {
            PolicyError::Parse { position, .. } => Some(*position),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::InvalidFormat(err.to_string())
    }
}

impl From<ParseErrors> for PolicyError {
    fn from(err: ParseErrors) -> Self {
        PolicyError::CedarValidation(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PolicyError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PolicyError::Io(err.to_string())
    }
}

impl From<pest::error::Error<Rule>> for PolicyError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let position = match err.location {
            InputLocation::Pos(pos) => pos,
            InputLocation::Span((start, _)) => start,
        };
        let lexeme = err
            .line()
            .chars()
            .skip(column_of(&err).saturating_sub(1))
            .take_while(|c| !c.is_whitespace())
            .collect::<String>();
        PolicyError::Parse {
            position,
            lexeme,
            message: err.variant.message().into_owned(),
        }
    }
}

fn column_of(err: &pest::error::Error<Rule>) -> usize {
    match err.line_col {
        pest::error::LineColLocation::Pos((_, col)) => col,
        pest::error::LineColLocation::Span((_, col), _) => col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = PolicyError::parse(7, "eq", "missing value");
        assert_eq!(
            err.to_string(),
            "parse error at 7 near 'eq': missing value"
        );
        assert_eq!(err.position(), Some(7));
    }

    #[test]
    fn test_position_only_for_parse_errors() {
        assert_eq!(PolicyError::Io("gone".to_string()).position(), None);
    }

    #[test]
    fn test_json_error_is_invalid_format() {
        let err: PolicyError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, PolicyError::InvalidFormat(_)));
    }

    #[test]
    fn test_error_serialization() {
        let err = PolicyError::UnsupportedShape("value path".to_string());
        let serialized = serde_json::to_value(&err).unwrap();
        let deserialized: PolicyError = serde_json::from_value(serialized).unwrap();
        assert_eq!(err, deserialized);
    }
}
