use crate::lib::scanner::Token;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoxError {
    #[error("Syntax error on line {line}:{line_pos}: {message}")]
    Syntax {
        line: usize,
        line_pos: usize,
        message: String,
    },

    #[error("Parse error on line {line}{location}: {message}")]
    Parse {
        line: usize,
        location: String,
        message: String,
    },

    #[error("Undefined variable '{}'.", .name.lexeme)]
    UndefinedVariable { name: Token },

    #[error("{message}")]
    Type { message: String, at: Token },

    #[error("Expected {expected} arguments but got {actual}.")]
    Arity {
        expected: usize,
        actual: usize,
        at: Token,
    },

    #[error("{message}")]
    Native { message: String, at: Token },

    #[error("Failed to write to output: {0}")]
    Io(#[from] std::io::Error),
}

impl LoxError {
    /// Source line the error is attributed to, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Syntax { line, .. } | LoxError::Parse { line, .. } => Some(*line),
            LoxError::UndefinedVariable { name } => Some(name.line),
            LoxError::Type { at, .. }
            | LoxError::Arity { at, .. }
            | LoxError::Native { at, .. } => Some(at.line),
            LoxError::Io(_) => None,
        }
    }

    pub fn type_error(at: &Token, message: &str) -> Self {
        LoxError::Type {
            message: message.to_owned(),
            at: at.clone(),
        }
    }
}
