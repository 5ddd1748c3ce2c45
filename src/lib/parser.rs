use crate::lib::ast::{Expr, FunctionDecl, LiteralValue, Stmt};
use crate::lib::diagnostics::{location_of, Diagnostics};
use crate::lib::err::LoxError;
use crate::lib::scanner::{Token, TokenType};
use std::rc::Rc;
use tracing::{debug, info, instrument};

const MAX_ARGS: usize = 255;

struct Parser<'t, 'd> {
    tokens: &'t [Token],
    current_idx: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'t, 'd> Parser<'t, 'd> {
    fn new(tokens: &'t [Token], diagnostics: &'d mut Diagnostics) -> Self {
        Parser {
            tokens,
            current_idx: 0,
            diagnostics,
        }
    }

    // `tokens` is never empty while parsing, see `parse`.
    fn peek(&self) -> &'t Token {
        let tokens = self.tokens;
        match tokens.get(self.current_idx) {
            Some(t) => t,
            None => &tokens[tokens.len() - 1],
        }
    }

    fn previous(&self) -> &'t Token {
        let tokens = self.tokens;
        &tokens[self.current_idx.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.current_idx >= self.tokens.len() || self.peek().token_type == TokenType::Eof
    }

    fn check(&self, expected: &TokenType) -> bool {
        !self.is_at_end() && &self.peek().token_type == expected
    }

    fn advance(&mut self) -> &'t Token {
        if !self.is_at_end() {
            self.current_idx += 1;
        }
        self.previous()
    }

    fn match_advance(&mut self, expected: &[TokenType]) -> bool {
        if expected.iter().any(|t| self.check(t)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, expected: &TokenType, message: &str) -> Result<&'t Token, LoxError> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn error(&self, token: &Token, message: &str) -> LoxError {
        LoxError::Parse {
            line: token.line,
            location: location_of(token),
            message: message.to_owned(),
        }
    }

    fn report(&mut self, err: LoxError) {
        match err {
            LoxError::Parse {
                line,
                location,
                message,
            } => self.diagnostics.report(line, &location, &message),
            other => {
                let line = self.peek().line;
                self.diagnostics.report(line, "", &other.to_string())
            }
        }
    }

    /// Skips tokens until a likely statement boundary: just past a `;`, or
    /// right before a keyword that starts a statement.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }
            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_advance(&[TokenType::Fun]) {
            self.function()
        } else if self.match_advance(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(err) => {
                debug!(%err, "Recovering from parse error");
                self.report(err);
                self.synchronize();
                None
            }
        }
    }

    fn function(&mut self) -> Result<Stmt, LoxError> {
        let name = self.consume(&TokenType::Identifier, "Expect function name.")?.clone();
        self.consume(&TokenType::LeftParen, "Expect '(' after function name.")?;
        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let token = self.peek();
                    self.diagnostics.error_at(token, "Can't have more than 255 parameters.");
                }
                let param = self.consume(&TokenType::Identifier, "Expect parameter name.")?;
                params.push(param.clone());
                if !self.match_advance(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(&TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(&TokenType::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block()?;
        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn var_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name = self.consume(&TokenType::Identifier, "Expect variable name.")?.clone();
        let initializer = if self.match_advance(&[TokenType::Equal]) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.consume(&TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var(name, initializer))
    }

    fn statement(&mut self) -> Result<Stmt, LoxError> {
        if self.match_advance(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_advance(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_advance(&[TokenType::Print]) {
            let value = self.expression()?;
            self.consume(&TokenType::Semicolon, "Expect ';' after value.")?;
            Ok(Stmt::Print(Box::new(value)))
        } else if self.match_advance(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_advance(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_advance(&[TokenType::LeftBrace]) {
            Ok(Stmt::Block(self.block()?))
        } else {
            let expr = self.expression()?;
            self.consume(&TokenType::Semicolon, "Expect ';' after expression.")?;
            Ok(Stmt::Expression(Box::new(expr)))
        }
    }

    /// `for` has no node of its own: it becomes
    /// `{ initializer; while (condition) { body; increment; } }`.
    fn for_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer = if self.match_advance(&[TokenType::Semicolon]) {
            None
        } else if self.match_advance(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            let expr = self.expression()?;
            self.consume(&TokenType::Semicolon, "Expect ';' after expression.")?;
            Some(Stmt::Expression(Box::new(expr)))
        };
        let condition = if self.check(&TokenType::Semicolon) {
            Expr::Literal(LiteralValue::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume(&TokenType::Semicolon, "Expect ';' after loop condition.")?;
        let increment = if self.check(&TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(&TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(Box::new(increment))]);
        }
        let mut desugared = Stmt::While(Box::new(condition), Box::new(body));
        if let Some(initializer) = initializer {
            desugared = Stmt::Block(vec![initializer, desugared]);
        }
        Ok(desugared)
    }

    fn if_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = self.statement()?;
        // Greedy: an `else` belongs to the innermost `if`.
        let else_branch = if self.match_advance(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If(Box::new(condition), Box::new(then_branch), else_branch))
    }

    fn return_statement(&mut self) -> Result<Stmt, LoxError> {
        let keyword = self.previous().clone();
        let value = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.consume(&TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return(keyword, value))
    }

    fn while_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(Stmt::While(Box::new(condition), Box::new(body)))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, LoxError> {
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(&TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression(&mut self) -> Result<Expr, LoxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, LoxError> {
        let expr = self.or()?;
        if self.match_advance(&[TokenType::Equal]) {
            let equals = self.previous();
            let value = self.assignment()?;
            if let Expr::Variable(name) = expr {
                return Ok(Expr::Assign(name, Box::new(value)));
            }
            self.diagnostics.error_at(equals, "Invalid assignment target.");
            return Ok(value);
        }
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.and()?;
        while self.match_advance(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.equality()?;
        while self.match_advance(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    /// One left-associative binary precedence level.
    fn binary(
        &mut self,
        operators: &[TokenType],
        operand: fn(&mut Self) -> Result<Expr, LoxError>,
    ) -> Result<Expr, LoxError> {
        let mut expr = operand(self)?;
        while self.match_advance(operators) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LoxError> {
        self.binary(&[TokenType::BangEqual, TokenType::EqualEqual], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, LoxError> {
        self.binary(
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, LoxError> {
        self.binary(&[TokenType::Minus, TokenType::Plus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, LoxError> {
        self.binary(&[TokenType::Slash, TokenType::Star], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, LoxError> {
        if self.match_advance(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            Ok(Expr::Unary(operator, Box::new(right)))
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.primary()?;
        while self.match_advance(&[TokenType::LeftParen]) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, LoxError> {
        let mut arguments = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    let token = self.peek();
                    self.diagnostics.error_at(token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.match_advance(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(&TokenType::RightParen, "Expect ')' after arguments.")?.clone();
        Ok(Expr::Call(Box::new(callee), paren, arguments))
    }

    fn primary(&mut self) -> Result<Expr, LoxError> {
        if self.match_advance(&[TokenType::False]) {
            return Ok(Expr::Literal(LiteralValue::Boolean(false)));
        }
        if self.match_advance(&[TokenType::True]) {
            return Ok(Expr::Literal(LiteralValue::Boolean(true)));
        }
        if self.match_advance(&[TokenType::Nil]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }
        if self.match_advance(&[TokenType::Numeric, TokenType::Str]) {
            let t = self.previous();
            return match &t.literal {
                Some(value) => Ok(Expr::Literal(value.clone())),
                None => Err(self.error(t, "Expect literal value.")),
            };
        }
        if self.match_advance(&[TokenType::Identifier]) {
            return Ok(Expr::Variable(self.previous().clone()));
        }
        if self.match_advance(&[TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.consume(&TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }
        Err(self.error(self.peek(), "Expect expression."))
    }
}

/// Parses a whole program. Every declaration that fails is reported to
/// `diagnostics` and skipped, so the result holds only the well-formed ones.
#[instrument(skip_all, fields(count = tokens.len()))]
pub fn parse(tokens: &[Token], diagnostics: &mut Diagnostics) -> Vec<Stmt> {
    let mut statements = Vec::new();
    if tokens.is_empty() {
        return statements;
    }
    let mut parser = Parser::new(tokens, diagnostics);
    while !parser.is_at_end() {
        if let Some(stmt) = parser.declaration() {
            statements.push(stmt);
        }
    }
    info!(count = statements.len(), "Finished parsing statements");
    statements
}
