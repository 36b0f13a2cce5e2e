use serde::{Deserialize, Serialize};
use std::fmt;

/// A formula lex or parse error, with the character offset at which it
/// was detected (when known).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ParseError {
    pub fn at(position: usize, message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn eof(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            position: None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} (at offset {})", self.message, pos),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}
