use crate::lib::ast::LiteralValue;
use crate::lib::diagnostics::Diagnostics;
use crate::lib::err::LoxError;
use crate::lib::object::Number;
use phf::phf_map;
use std::iter::Peekable;
use std::str::Chars;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Single Character Tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals
    Identifier,
    Str,
    Numeric,

    // Keywords
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Eof,
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "fun" => TokenType::Fun,
    "for" => TokenType::For,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    /// Only set for `Str` and `Numeric` tokens.
    pub literal: Option<LiteralValue>,
    pub line: usize,
    pub line_pos: usize,
}

#[derive(Debug)]
struct Scanner<'a> {
    source: &'a str,
    chars: Peekable<Chars<'a>>,
    // Byte offsets into `source`.
    start: usize,
    current: usize,
    line: usize,
    line_pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Scanner {
            source,
            chars: source.chars().peekable(),
            start: 0,
            current: 0,
            line: 1,
            line_pos: 0,
            tokens: Vec::new(),
        }
    }

    fn is_finished(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.current += c.len_utf8();
        self.line_pos += 1;
        Some(c)
    }

    fn peek_match(&mut self, val: char) -> bool {
        matches!(self.chars.peek(), Some(v) if *v == val)
    }

    /// Looks one character past the next one without consuming anything.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn match_next(&mut self, val: char) -> bool {
        if self.peek_match(val) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn newline(&mut self) {
        self.line += 1;
        self.line_pos = 0;
    }

    fn lexeme(&self) -> &'a str {
        &self.source[self.start..self.current]
    }

    fn add_token(&mut self, token_type: TokenType, literal: Option<LiteralValue>, line_pos: usize) {
        let token = Token {
            token_type,
            lexeme: self.lexeme().to_owned(),
            literal,
            line: self.line,
            line_pos,
        };
        debug!(?token.token_type, token.line, token.line_pos, token.lexeme = token.lexeme.as_str());
        self.tokens.push(token);
    }

    fn syntax_error(&self, message: &str) -> LoxError {
        LoxError::Syntax {
            line: self.line,
            line_pos: self.line_pos,
            message: message.to_owned(),
        }
    }

    #[instrument(skip(self))]
    fn scan_next(&mut self) -> Result<(), LoxError> {
        self.start = self.current;
        let c = match self.advance() {
            Some(v) => v,
            None => return Ok(()),
        };
        let line_pos = self.line_pos;
        let token_type = match c {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            ',' => TokenType::Comma,
            '.' => TokenType::Dot,
            '-' => TokenType::Minus,
            '+' => TokenType::Plus,
            ';' => TokenType::Semicolon,
            '*' => TokenType::Star,
            '!' => {
                if self.match_next('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                }
            }
            '=' => {
                if self.match_next('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                }
            }
            '<' => {
                if self.match_next('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                }
            }
            '>' => {
                if self.match_next('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }
            '/' => {
                if self.match_next('/') {
                    self.consume_comment();
                    return Ok(());
                }
                TokenType::Slash
            }
            '#' => {
                self.consume_comment();
                return Ok(());
            }
            ' ' | '\r' | '\t' => return Ok(()),
            '\n' => {
                self.newline();
                return Ok(());
            }
            '"' => return self.consume_string(line_pos),
            default if is_numeric(default) => return self.consume_numeric(line_pos),
            default if is_alpha(default) => {
                self.consume_identifier_or_keyword(line_pos);
                return Ok(());
            }
            _ => {
                let mut b = [0; 4];
                let charstr = c.encode_utf8(&mut b);
                error!(character = &*charstr, line_pos, line = self.line, "Unknown Token");
                return Err(self.syntax_error("Unexpected character."));
            }
        };
        self.add_token(token_type, None, line_pos);
        Ok(())
    }

    /// Skips to the end of the line; the newline itself is left for `scan_next`.
    fn consume_comment(&mut self) {
        while !self.is_finished() && !self.peek_match('\n') {
            self.advance();
        }
    }

    fn consume_string(&mut self, line_pos: usize) -> Result<(), LoxError> {
        while let Some(&v) = self.chars.peek() {
            if v == '"' {
                break;
            }
            self.advance();
            if v == '\n' {
                self.newline();
            }
        }
        if self.is_finished() {
            return Err(self.syntax_error("Unterminated string."));
        }
        // Closing double-quote
        self.advance();
        let content = &self.source[self.start + 1..self.current - 1];
        self.add_token(TokenType::Str, Some(LiteralValue::String(content.to_owned())), line_pos);
        Ok(())
    }

    fn consume_digits(&mut self) {
        while matches!(self.chars.peek(), Some(v) if is_numeric(*v)) {
            self.advance();
        }
    }

    fn consume_numeric(&mut self, line_pos: usize) -> Result<(), LoxError> {
        self.consume_digits();
        let is_float =
            self.peek_match('.') && matches!(self.peek_second(), Some(v) if is_numeric(v));
        if is_float {
            self.advance();
            self.consume_digits();
        }
        let text = self.lexeme();
        let number = if is_float {
            text.parse::<f64>().map(Number::Float)
        } else {
            // Digit runs too long for an i64 fall back to a float.
            match text.parse::<i64>() {
                Ok(v) => Ok(Number::Integer(v)),
                Err(_) => text.parse::<f64>().map(Number::Float),
            }
        };
        match number {
            Ok(v) => {
                self.add_token(TokenType::Numeric, Some(LiteralValue::Number(v)), line_pos);
                Ok(())
            }
            Err(why) => Err(self.syntax_error(&format!("Failed to parse numeric: {}", why))),
        }
    }

    fn consume_identifier_or_keyword(&mut self, line_pos: usize) {
        while matches!(self.chars.peek(), Some(v) if is_alpha_numeric(*v)) {
            self.advance();
        }
        let token_type = match KEYWORDS.get(self.lexeme()).cloned() {
            Some(t) => t,
            None => TokenType::Identifier,
        };
        self.add_token(token_type, None, line_pos);
    }
}

/// Turns source text into tokens, always ending with a single `Eof`.
///
/// Problems are reported to `diagnostics` and scanning carries on; the
/// offending characters produce no token.
#[instrument(skip(source, diagnostics))]
pub fn scan(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut scanner = Scanner::new(source);
    while !scanner.is_finished() {
        match scanner.scan_next() {
            Ok(()) => continue,
            Err(LoxError::Syntax { line, message, .. }) => diagnostics.report(line, "", &message),
            Err(other) => diagnostics.report(scanner.line, "", &other.to_string()),
        }
    }
    scanner.tokens.push(Token {
        token_type: TokenType::Eof,
        lexeme: String::new(),
        literal: None,
        line: scanner.line,
        line_pos: scanner.line_pos,
    });
    info!(count = scanner.tokens.len(), "Finished scanning tokens");
    scanner.tokens
}

fn is_numeric(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_alpha_numeric(c: char) -> bool {
    is_alpha(c) || is_numeric(c)
}
