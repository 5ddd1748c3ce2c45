use crate::lib::{
    ast::{Expr, ExprVisitor, FunctionDecl, LiteralValue, Stmt, StmtVisitor},
    err::LoxError,
    object::Number,
    scanner::Token,
};
use std::rc::Rc;

/// Renders syntax trees as s-expressions, e.g. `(print (+ 1 2))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&mut self, statement: &Stmt) -> Result<String, LoxError> {
        statement.accept(self)
    }

    pub fn print_program(&mut self, statements: &[Stmt]) -> Result<String, LoxError> {
        let mut lines = Vec::with_capacity(statements.len());
        for stmt in statements {
            lines.push(self.print(stmt)?);
        }
        Ok(lines.join("\n"))
    }

    fn expr(&mut self, expression: &Expr) -> Result<String, LoxError> {
        expression.accept(self)
    }

    fn parenthesize(&mut self, name: &str, exprs: &[&Expr]) -> Result<String, LoxError> {
        let mut output = format!("({}", name);
        for expr in exprs {
            output.push(' ');
            output.push_str(&self.expr(expr)?);
        }
        output.push(')');
        Ok(output)
    }

    fn parenthesize_stmts(&mut self, head: &str, statements: &[Stmt]) -> Result<String, LoxError> {
        let mut output = format!("({}", head);
        for stmt in statements {
            output.push(' ');
            output.push_str(&self.print(stmt)?);
        }
        output.push(')');
        Ok(output)
    }
}

impl ExprVisitor<String> for AstPrinter {
    fn visit_assign_expr(&mut self, name: &Token, value: &Expr) -> Result<String, LoxError> {
        Ok(format!("(= {} {})", name.lexeme, self.expr(value)?))
    }

    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<String, LoxError> {
        self.parenthesize(&operator.lexeme, &[left, right])
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        _paren: &Token,
        arguments: &[Expr],
    ) -> Result<String, LoxError> {
        let mut exprs = vec![callee];
        exprs.extend(arguments.iter());
        self.parenthesize("call", &exprs)
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<String, LoxError> {
        self.parenthesize("group", &[expression])
    }

    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<String, LoxError> {
        let stringified = match value {
            LiteralValue::Boolean(v) => format!("{}", v),
            LiteralValue::Nil => String::from("nil"),
            LiteralValue::Number(Number::Integer(v)) => format!("{}", v),
            // Debug keeps the `.0`, so integer and float literals stay distinct.
            LiteralValue::Number(Number::Float(v)) => format!("{:?}", v),
            LiteralValue::String(v) => format!("\"{}\"", v),
        };
        Ok(stringified)
    }

    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<String, LoxError> {
        self.parenthesize(&operator.lexeme, &[left, right])
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<String, LoxError> {
        self.parenthesize(&operator.lexeme, &[right])
    }

    fn visit_variable_expr(&mut self, name: &Token) -> Result<String, LoxError> {
        Ok(name.lexeme.clone())
    }
}

impl StmtVisitor<String> for AstPrinter {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<String, LoxError> {
        self.parenthesize_stmts("block", statements)
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<String, LoxError> {
        self.parenthesize(";", &[expression])
    }

    fn visit_function_stmt(&mut self, declaration: &Rc<FunctionDecl>) -> Result<String, LoxError> {
        let params = declaration
            .params
            .iter()
            .map(|p| p.lexeme.as_str())
            .collect::<Vec<&str>>()
            .join(" ");
        let head = format!("fun {} ({})", declaration.name.lexeme, params);
        self.parenthesize_stmts(&head, &declaration.body)
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<String, LoxError> {
        let condition = self.expr(condition)?;
        let then_str = self.print(then_branch)?;
        match else_branch {
            Some(v) => Ok(format!("(if-else {} {} {})", condition, then_str, self.print(v)?)),
            None => Ok(format!("(if {} {})", condition, then_str)),
        }
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<String, LoxError> {
        self.parenthesize("print", &[expression])
    }

    fn visit_return_stmt(
        &mut self,
        _keyword: &Token,
        value: Option<&Expr>,
    ) -> Result<String, LoxError> {
        match value {
            Some(v) => self.parenthesize("return", &[v]),
            None => Ok("(return)".to_owned()),
        }
    }

    fn visit_var_stmt(
        &mut self,
        name: &Token,
        initializer: Option<&Expr>,
    ) -> Result<String, LoxError> {
        match initializer {
            Some(v) => Ok(format!("(var {} = {})", name.lexeme, self.expr(v)?)),
            None => Ok(format!("(var {})", name.lexeme)),
        }
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<String, LoxError> {
        Ok(format!("(while {} {})", self.expr(condition)?, self.print(body)?))
    }
}
