use crate::lib::err::LoxError;
use crate::lib::scanner::{Token, TokenType};
use std::fmt;
use tracing::warn;

/// One reported problem, rendered as `[line N] Error<location>: message`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: usize,
    pub location: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error{}: {}", self.line, self.location, self.message)
    }
}

/// Collects static (scan/parse) and runtime diagnostics for one run.
///
/// The scanner and parser take it by `&mut` and keep going after reporting;
/// the caller checks `had_error` before handing statements to the
/// interpreter.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, line: usize, location: &str, message: &str) {
        warn!(line, location, reason = message, "Static error reported");
        self.entries.push(Diagnostic {
            line,
            location: location.to_owned(),
            message: message.to_owned(),
        });
        self.had_error = true;
    }

    pub fn error_at(&mut self, token: &Token, message: &str) {
        self.report(token.line, &location_of(token), message);
    }

    pub fn runtime_error(&mut self, err: &LoxError) {
        warn!(%err, "Runtime error reported");
        self.entries.push(Diagnostic {
            line: err.line().unwrap_or(0),
            location: String::new(),
            message: err.to_string(),
        });
        self.had_runtime_error = true;
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Hands back everything reported so far and clears the list, leaving the
    /// error flags untouched.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.had_error = false;
        self.had_runtime_error = false;
    }
}

/// The `<location>` part of a diagnostic for an error found at `token`.
pub fn location_of(token: &Token) -> String {
    match token.token_type {
        TokenType::Eof => " at end".to_owned(),
        _ => format!(" at '{}'", token.lexeme),
    }
}
