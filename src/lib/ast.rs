use crate::lib::err::LoxError;
use crate::lib::object::Number;
use crate::lib::scanner::Token;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Expr {
    Assign(Token, Box<Expr>),
    Binary(Box<Expr>, Token, Box<Expr>),
    /// Callee, closing paren (for error locations), arguments.
    Call(Box<Expr>, Token, Vec<Expr>),
    Grouping(Box<Expr>),
    Literal(LiteralValue),
    Logical(Box<Expr>, Token, Box<Expr>),
    Unary(Token, Box<Expr>),
    Variable(Token),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Boolean(bool),
    Nil,
    Number(Number),
    String(String),
}

impl Expr {
    pub fn accept<T>(&self, visitor: &mut dyn ExprVisitor<T>) -> Result<T, LoxError> {
        match self {
            Expr::Assign(name, value) => visitor.visit_assign_expr(name, value),
            Expr::Binary(left, operator, right) => visitor.visit_binary_expr(left, operator, right),
            Expr::Call(callee, paren, arguments) => {
                visitor.visit_call_expr(callee, paren, arguments)
            }
            Expr::Grouping(expression) => visitor.visit_grouping_expr(expression),
            Expr::Literal(literal_value) => visitor.visit_literal_expr(literal_value),
            Expr::Logical(left, operator, right) => {
                visitor.visit_logical_expr(left, operator, right)
            }
            Expr::Unary(operator, right) => visitor.visit_unary_expr(operator, right),
            Expr::Variable(name) => visitor.visit_variable_expr(name),
        }
    }
}

pub trait ExprVisitor<T> {
    fn visit_assign_expr(&mut self, name: &Token, value: &Expr) -> Result<T, LoxError>;
    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<T, LoxError>;
    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<T, LoxError>;
    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<T, LoxError>;
    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<T, LoxError>;
    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<T, LoxError>;
    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<T, LoxError>;
    fn visit_variable_expr(&mut self, name: &Token) -> Result<T, LoxError>;
}

/// A `fun` declaration. Shared between the statement tree and every function
/// value created from it, so closures outlive the statements they came from.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Expression(Box<Expr>),
    Function(Rc<FunctionDecl>),
    If(Box<Expr>, Box<Stmt>, Option<Box<Stmt>>),
    Print(Box<Expr>),
    /// The `return` keyword (for error locations) and the optional value.
    Return(Token, Option<Box<Expr>>),
    Var(Token, Option<Box<Expr>>),
    While(Box<Expr>, Box<Stmt>),
}

impl Stmt {
    pub fn accept<T>(&self, visitor: &mut dyn StmtVisitor<T>) -> Result<T, LoxError> {
        match self {
            Stmt::Block(statements) => visitor.visit_block_stmt(statements),
            Stmt::Expression(expression) => visitor.visit_expression_stmt(expression),
            Stmt::Function(declaration) => visitor.visit_function_stmt(declaration),
            Stmt::If(condition, then_branch, else_branch) => {
                visitor.visit_if_stmt(condition, then_branch, else_branch.as_deref())
            }
            Stmt::Print(expression) => visitor.visit_print_stmt(expression),
            Stmt::Return(keyword, value) => visitor.visit_return_stmt(keyword, value.as_deref()),
            Stmt::Var(name, initializer) => visitor.visit_var_stmt(name, initializer.as_deref()),
            Stmt::While(condition, body) => visitor.visit_while_stmt(condition, body),
        }
    }
}

pub trait StmtVisitor<T> {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<T, LoxError>;
    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<T, LoxError>;
    fn visit_function_stmt(&mut self, declaration: &Rc<FunctionDecl>) -> Result<T, LoxError>;
    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<T, LoxError>;
    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<T, LoxError>;
    fn visit_return_stmt(&mut self, keyword: &Token, value: Option<&Expr>) -> Result<T, LoxError>;
    fn visit_var_stmt(&mut self, name: &Token, initializer: Option<&Expr>) -> Result<T, LoxError>;
    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<T, LoxError>;
}
