use crate::lib::{
    ast::{Expr, ExprVisitor, FunctionDecl, LiteralValue, Stmt, StmtVisitor},
    environment::Environment,
    err::LoxError,
    function::{natives, Callable, LoxFunction},
    object::{Number, Object},
    scanner::{Token, TokenType},
};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use tracing::{debug, info, instrument};

/// How a statement finished. `Return` unwinds statement execution up to the
/// nearest function call, which consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Object),
}

pub struct Interpreter<W: Write> {
    out: W,
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        for native in natives() {
            debug!(name = native.name, "Defining native function");
            let name = native.name;
            globals
                .borrow_mut()
                .define(name, Object::Callable(Rc::new(Callable::Native(native))));
        }
        Interpreter {
            out,
            environment: globals.clone(),
            globals,
        }
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn evaluate(&mut self, expression: &Expr) -> Result<Object, LoxError> {
        expression.accept(self)
    }

    pub fn execute(&mut self, statement: &Stmt) -> Result<Flow, LoxError> {
        statement.accept(self)
    }

    /// Runs a program in the global scope. The first runtime error aborts the
    /// remaining statements and is handed back to the caller.
    #[instrument(skip_all, fields(count = statements.len()))]
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        self.environment = self.globals.clone();
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                debug!(%value, "Top-level return stops the program");
                break;
            }
        }
        self.out.flush()?;
        info!("Finished interpreting");
        Ok(())
    }

    /// Executes `statements` with `environment` as the current scope. The
    /// previous scope is restored however the block exits.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Environment,
    ) -> Result<Flow, LoxError> {
        let previous = std::mem::replace(&mut self.environment, Rc::new(RefCell::new(environment)));
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow, LoxError> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn write(&mut self, value: &str) -> Result<(), LoxError> {
        writeln!(self.out, "{}", value)?;
        Ok(())
    }
}

impl<W: Write> ExprVisitor<Object> for Interpreter<W> {
    fn visit_assign_expr(&mut self, name: &Token, value: &Expr) -> Result<Object, LoxError> {
        let value = self.evaluate(value)?;
        self.environment.borrow_mut().assign(name, value.clone())?;
        Ok(value)
    }

    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        op: &Token,
        right: &Expr,
    ) -> Result<Object, LoxError> {
        let left_eval = self.evaluate(left)?;
        let right_eval = self.evaluate(right)?;

        let object = match &op.token_type {
            TokenType::Plus => match (&left_eval, &right_eval) {
                (Object::Number(l), Object::Number(r)) => Object::Number(l.add(*r)),
                (Object::String(l), Object::String(r)) => Object::String(format!("{}{}", l, r)),
                _ => {
                    return Err(LoxError::type_error(
                        op,
                        "Operands must be two numbers or two strings.",
                    ))
                }
            },
            TokenType::Minus => {
                let (l, r) = number_operands(op, &left_eval, &right_eval)?;
                Object::Number(l.sub(r))
            }
            TokenType::Star => {
                let (l, r) = number_operands(op, &left_eval, &right_eval)?;
                Object::Number(l.mul(r))
            }
            TokenType::Slash => {
                let (l, r) = number_operands(op, &left_eval, &right_eval)?;
                match l.div(r) {
                    Some(v) => Object::Number(v),
                    None => return Err(LoxError::type_error(op, "Division by zero.")),
                }
            }
            TokenType::Greater => {
                let (l, r) = number_operands(op, &left_eval, &right_eval)?;
                Object::Boolean(l > r)
            }
            TokenType::GreaterEqual => {
                let (l, r) = number_operands(op, &left_eval, &right_eval)?;
                Object::Boolean(l >= r)
            }
            TokenType::Less => {
                let (l, r) = number_operands(op, &left_eval, &right_eval)?;
                Object::Boolean(l < r)
            }
            TokenType::LessEqual => {
                let (l, r) = number_operands(op, &left_eval, &right_eval)?;
                Object::Boolean(l <= r)
            }
            TokenType::EqualEqual => Object::Boolean(left_eval == right_eval),
            TokenType::BangEqual => Object::Boolean(left_eval != right_eval),
            _ => return Err(LoxError::type_error(op, "Unsupported binary operator.")),
        };
        Ok(object)
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<Object, LoxError> {
        let callee = self.evaluate(callee)?;
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }
        let function = match callee {
            Object::Callable(function) => function,
            _ => {
                return Err(LoxError::type_error(
                    paren,
                    "Can only call functions and classes.",
                ))
            }
        };
        if args.len() != function.arity() {
            return Err(LoxError::Arity {
                expected: function.arity(),
                actual: args.len(),
                at: paren.clone(),
            });
        }
        debug!(%function, args = args.len(), "Calling");
        function.call(self, args, paren)
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<Object, LoxError> {
        self.evaluate(expression)
    }

    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<Object, LoxError> {
        Ok(Object::from(value))
    }

    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Object, LoxError> {
        let left_eval = self.evaluate(left)?;
        let short_circuits = match operator.token_type {
            TokenType::Or => left_eval.is_truthy(),
            _ => !left_eval.is_truthy(),
        };
        if short_circuits {
            Ok(left_eval)
        } else {
            self.evaluate(right)
        }
    }

    fn visit_unary_expr(&mut self, op: &Token, right: &Expr) -> Result<Object, LoxError> {
        let right_eval = self.evaluate(right)?;
        match &op.token_type {
            TokenType::Minus => match right_eval {
                Object::Number(r) => Ok(Object::Number(r.neg())),
                _ => Err(LoxError::type_error(op, "Operand must be a number.")),
            },
            TokenType::Bang => Ok(Object::Boolean(!right_eval.is_truthy())),
            _ => Err(LoxError::type_error(op, "Unsupported unary operator.")),
        }
    }

    fn visit_variable_expr(&mut self, name: &Token) -> Result<Object, LoxError> {
        self.environment.borrow().get(name)
    }
}

impl<W: Write> StmtVisitor<Flow> for Interpreter<W> {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<Flow, LoxError> {
        let environment = Environment::new_enclosed(self.environment.clone());
        self.execute_block(statements, environment)
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<Flow, LoxError> {
        self.evaluate(expression)?;
        Ok(Flow::Normal)
    }

    fn visit_function_stmt(&mut self, declaration: &Rc<FunctionDecl>) -> Result<Flow, LoxError> {
        let function = LoxFunction::new(declaration.clone(), self.environment.clone());
        self.environment.borrow_mut().define(
            &declaration.name.lexeme,
            Object::Callable(Rc::new(Callable::Lox(function))),
        );
        Ok(Flow::Normal)
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<Flow, LoxError> {
        if self.evaluate(condition)?.is_truthy() {
            self.execute(then_branch)
        } else {
            match else_branch {
                Some(branch_stmt) => self.execute(branch_stmt),
                None => Ok(Flow::Normal),
            }
        }
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<Flow, LoxError> {
        let value = self.evaluate(expression)?;
        self.write(&value.to_string())?;
        Ok(Flow::Normal)
    }

    fn visit_return_stmt(
        &mut self,
        _keyword: &Token,
        value: Option<&Expr>,
    ) -> Result<Flow, LoxError> {
        let value = match value {
            Some(expression) => self.evaluate(expression)?,
            None => Object::Nil,
        };
        Ok(Flow::Return(value))
    }

    fn visit_var_stmt(
        &mut self,
        name: &Token,
        initializer: Option<&Expr>,
    ) -> Result<Flow, LoxError> {
        let value = match initializer {
            Some(expression) => self.evaluate(expression)?,
            None => Object::Nil,
        };
        self.environment.borrow_mut().define(&name.lexeme, value);
        Ok(Flow::Normal)
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<Flow, LoxError> {
        while self.evaluate(condition)?.is_truthy() {
            if let Flow::Return(value) = self.execute(body)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }
}

fn number_operands(
    op: &Token,
    left: &Object,
    right: &Object,
) -> Result<(Number, Number), LoxError> {
    match (left, right) {
        (Object::Number(l), Object::Number(r)) => Ok((*l, *r)),
        _ => Err(LoxError::type_error(op, "Operands must be numbers.")),
    }
}

#[cfg(test)]
mod tests {
    use crate::lib::{diagnostics::Diagnostics, parser::parse, scanner::scan};

    use super::*;
    use anyhow::{bail, Result};

    fn parse_statements(src: &str) -> Result<Vec<Stmt>> {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan(src, &mut diagnostics);
        let statements = parse(&tokens, &mut diagnostics);
        if diagnostics.had_error() {
            bail!("Static errors: {:?}", diagnostics.entries());
        }
        Ok(statements)
    }

    struct InterpreterTest {
        result: Result<(), LoxError>,
        out: Vec<u8>,
    }

    impl InterpreterTest {
        fn from_src(src: &str) -> Result<Self> {
            let statements = parse_statements(src)?;
            let mut out: Vec<u8> = Vec::new();
            let result = Interpreter::new(&mut out).interpret(&statements);
            Ok(InterpreterTest { result, out })
        }

        fn output(&self) -> Result<String> {
            Ok(String::from_utf8(self.out.clone())?)
        }

        fn assert_output(self, expected_output: &str) -> Result<()> {
            if let Err(why) = &self.result {
                bail!("Unexpected runtime error: {}", why);
            }
            assert_eq!(self.output()?, expected_output);
            Ok(())
        }

        fn assert_err(self, message: &str) -> Result<LoxError> {
            match self.result {
                Ok(()) => bail!("{} [Output: {:?}]", message, self.output()?),
                Err(why) => Ok(why),
            }
        }
    }

    fn ident(name: &str) -> Token {
        Token {
            token_type: TokenType::Identifier,
            lexeme: name.to_owned(),
            literal: None,
            line: 1,
            line_pos: 1,
        }
    }

    fn eval(src: &str) -> Result<Object> {
        let statements = parse_statements(&format!("{};", src))?;
        let mut interpreter = Interpreter::new(Vec::new());
        match statements.first() {
            Some(Stmt::Expression(expr)) => Ok(interpreter.evaluate(expr)?),
            other => bail!("Expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_small_print_script() -> Result<()> {
        let src = r#"
        print 150.5 * 2;
        print "test" + "ing";
        print 1 + 2;
        print 1 == 0;
        print nil;
        "#;
        InterpreterTest::from_src(src)?.assert_output("301\ntesting\n3\nfalse\nnil\n")
    }

    #[test]
    fn test_integer_and_float_arithmetic() -> Result<()> {
        assert!(matches!(eval("1 + 2")?, Object::Number(Number::Integer(3))));
        assert!(matches!(eval("1 + 2.0")?, Object::Number(Number::Float(v)) if v == 3.0));
        assert!(matches!(eval("7 / 2")?, Object::Number(Number::Integer(3))));
        assert!(matches!(eval("-3")?, Object::Number(Number::Float(v)) if v == -3.0));
        assert_eq!(eval("2 * (3 + 4) - 1")?, Object::Number(Number::Integer(13)));
        Ok(())
    }

    #[test]
    fn test_integer_overflow_promotes_to_float() -> Result<()> {
        assert!(matches!(eval("9223372036854775807 + 1")?, Object::Number(Number::Float(_))));
        assert!(matches!(eval("99999999999999999999")?, Object::Number(Number::Float(_))));
        InterpreterTest::from_src("print 9223372036854775807 + 1; print 99999999999999999999;")?
            .assert_output("9223372036854775808\n100000000000000000000\n")
    }

    #[test]
    fn test_division_floors_integers_only() -> Result<()> {
        InterpreterTest::from_src("print (0 - 7) / 2; print 7 / (0 - 2); print -7 / 2;")?
            .assert_output("-4\n-4\n-3.5\n")
    }

    #[test]
    fn test_string_concatenation() -> Result<()> {
        assert_eq!(eval("\"a\" + \"b\"")?, Object::String("ab".to_owned()));
        let err = InterpreterTest::from_src("print \"a\" + 1;")?.assert_err("mixed + must fail")?;
        assert!(matches!(err, LoxError::Type { .. }));
        assert_eq!(err.to_string(), "Operands must be two numbers or two strings.");
        Ok(())
    }

    #[test]
    fn test_type_errors() -> Result<()> {
        let err = InterpreterTest::from_src("-\"x\";")?.assert_err("negating a string must fail")?;
        assert_eq!(err.to_string(), "Operand must be a number.");
        let err = InterpreterTest::from_src("\n1 < \"2\";")?
            .assert_err("comparing mixed must fail")?;
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.to_string(), "Operands must be numbers.");
        let err = InterpreterTest::from_src("1 / 0;")?
            .assert_err("integer division by zero must fail")?;
        assert_eq!(err.to_string(), "Division by zero.");
        Ok(())
    }

    #[test]
    fn test_truthiness() -> Result<()> {
        InterpreterTest::from_src("print !nil; print !false; print !0; print !\"\";")?
            .assert_output("true\ntrue\nfalse\nfalse\n")
    }

    #[test]
    fn test_equality() -> Result<()> {
        let src = r#"
        print nil == nil;
        print 1 == 1.0;
        print "a" == "a";
        print 0 == false;
        print "1" != 1;
        print clock == clock;
        "#;
        InterpreterTest::from_src(src)?.assert_output("true\ntrue\ntrue\nfalse\ntrue\ntrue\n")
    }

    #[test]
    fn test_logical_short_circuit() -> Result<()> {
        let src = r#"
        fun sideEffect() { print "called"; return true; }
        print false and sideEffect();
        print true or sideEffect();
        print nil or "right";
        print 1 and 2;
        "#;
        InterpreterTest::from_src(src)?.assert_output("false\ntrue\nright\n2\n")
    }

    #[test]
    fn test_block_scoping() -> Result<()> {
        InterpreterTest::from_src("var a = 1; { a = 2; } print a;")?.assert_output("2\n")?;
        InterpreterTest::from_src("var a = 1; { var a = 3; print a; } print a;")?
            .assert_output("3\n1\n")?;
        let err = InterpreterTest::from_src("{ var inner = 1; } print inner;")?
            .assert_err("block local must not leak")?;
        assert_eq!(err.to_string(), "Undefined variable 'inner'.");
        Ok(())
    }

    #[test]
    fn test_assignment_is_an_expression() -> Result<()> {
        InterpreterTest::from_src("var a; var b; a = b = 3; print a; print b;")?
            .assert_output("3\n3\n")
    }

    #[test]
    fn test_assign_to_undefined_fails() -> Result<()> {
        let err = InterpreterTest::from_src("ghost = 1;")?.assert_err("assign must not define")?;
        assert!(matches!(err, LoxError::UndefinedVariable { .. }));
        Ok(())
    }

    #[test]
    fn test_if_else() -> Result<()> {
        let src = r#"
        if (true) print "then"; else print "else";
        if (nil) print "then"; else print "else";
        if (false) print "skipped";
        if (true) if (false) print "inner"; else print "dangling";
        "#;
        InterpreterTest::from_src(src)?.assert_output("then\nelse\ndangling\n")
    }

    #[test]
    fn test_while_and_for() -> Result<()> {
        InterpreterTest::from_src("var i = 0; while (i < 3) { print i; i = i + 1; }")?
            .assert_output("0\n1\n2\n")?;
        InterpreterTest::from_src("while (false) print 1; print \"done\";")?
            .assert_output("done\n")?;
        InterpreterTest::from_src("for (var i = 0; i < 3; i = i + 1) print i;")?
            .assert_output("0\n1\n2\n")?;
        let err = InterpreterTest::from_src("for (var i = 0; i < 1; i = i + 1) {} print i;")?
            .assert_err("loop variable must not leak")?;
        assert!(matches!(err, LoxError::UndefinedVariable { .. }));
        Ok(())
    }

    #[test]
    fn test_closures_are_independent() -> Result<()> {
        let src = r#"
        fun makeCounter() {
            var count = 0;
            fun counter() {
                count = count + 1;
                return count;
            }
            return counter;
        }
        var first = makeCounter();
        var second = makeCounter();
        print first();
        print first();
        print second();
        print first();
        "#;
        InterpreterTest::from_src(src)?.assert_output("1\n2\n1\n3\n")
    }

    #[test]
    fn test_closures_compare_by_identity() -> Result<()> {
        let src = r#"
        fun makeCounter() {
            fun counter() {}
            return counter;
        }
        var counter = makeCounter();
        print makeCounter() == makeCounter();
        print counter == counter;
        print counter != makeCounter();
        "#;
        InterpreterTest::from_src(src)?.assert_output("false\ntrue\ntrue\n")
    }

    #[test]
    fn test_closure_captures_declaration_scope() -> Result<()> {
        let src = r#"
        var a = "global";
        fun show() { print a; }
        fun caller() { var a = "local"; show(); }
        caller();
        "#;
        InterpreterTest::from_src(src)?.assert_output("global\n")
    }

    #[test]
    fn test_recursion_and_return() -> Result<()> {
        let src = r#"
        fun factorial(n) {
            if (n <= 1) return 1;
            return n * factorial(n - 1);
        }
        print factorial(5);
        fun early() { while (true) { return "out"; } }
        print early();
        fun nothing() { return; }
        print nothing();
        fun fallsOff() {}
        print fallsOff();
        "#;
        InterpreterTest::from_src(src)?.assert_output("120\nout\nnil\nnil\n")
    }

    #[test]
    fn test_arity_error() -> Result<()> {
        let err = InterpreterTest::from_src("fun add(a, b) { return a + b; }\nadd(1);")?
            .assert_err("wrong arity must fail")?;
        match err {
            LoxError::Arity { expected, actual, at } => {
                assert_eq!((expected, actual), (2, 1));
                assert_eq!(at.line, 2);
            }
            other => bail!("Expected arity error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_calling_non_callable() -> Result<()> {
        let err = InterpreterTest::from_src("\"text\"();")?.assert_err("strings are not callable")?;
        assert_eq!(err.to_string(), "Can only call functions and classes.");
        Ok(())
    }

    #[test]
    fn test_chained_calls_and_function_display() -> Result<()> {
        let src = r#"
        fun outer() { fun inner() { return "inner"; } return inner; }
        print outer()();
        print outer;
        print clock;
        "#;
        InterpreterTest::from_src(src)?.assert_output("inner\n<fn outer>\n<native fn>\n")
    }

    #[test]
    fn test_clock_native() -> Result<()> {
        match eval("clock()")? {
            Object::Number(Number::Float(v)) => assert!(v > 0.0),
            other => bail!("clock returned {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_natives_stay_reachable_from_nested_scopes() -> Result<()> {
        let interpreter = Interpreter::new(Vec::new());
        match interpreter.globals.borrow().get(&ident("clock"))? {
            Object::Callable(function) => assert_eq!(function.arity(), 0),
            other => bail!("clock is not callable: {:?}", other),
        }
        InterpreterTest::from_src("{ { fun f() { return clock() > 0; } print f(); } }")?
            .assert_output("true\n")
    }

    #[test]
    fn test_runtime_error_aborts_program() -> Result<()> {
        let test = InterpreterTest::from_src("print 1; print nil + 1; print 2;")?;
        assert_eq!(test.output()?, "1\n");
        test.assert_err("nil + 1 must fail")?;
        Ok(())
    }

    #[test]
    fn test_scope_restored_after_error() -> Result<()> {
        let mut out: Vec<u8> = Vec::new();
        let mut interpreter = Interpreter::new(&mut out);
        let failing =
            parse_statements("var outer = 1; { var inner = 2; fun f() { return nil + 1; } f(); }")?;
        if interpreter.interpret(&failing).is_ok() {
            bail!("Expected the block to fail");
        }
        let after = parse_statements("print outer; var later = 3; print later;")?;
        interpreter.interpret(&after)?;
        let inner = parse_statements("print inner;")?;
        if interpreter.interpret(&inner).is_ok() {
            bail!("Block scope leaked past an error");
        }
        drop(interpreter);
        assert_eq!(String::from_utf8(out)?, "1\n3\n");
        Ok(())
    }

    #[test]
    fn test_interpret_starts_in_global_scope() -> Result<()> {
        let mut interpreter = Interpreter::new(Vec::new());
        let mut stray = Environment::new_enclosed(interpreter.globals.clone());
        stray.define("stray", Object::Nil);
        interpreter.environment = Rc::new(RefCell::new(stray));

        interpreter.interpret(&parse_statements("var kept = 1;")?)?;
        assert_eq!(
            interpreter.globals.borrow().get(&ident("kept"))?,
            Object::Number(Number::Integer(1))
        );
        if interpreter.interpret(&parse_statements("print stray;")?).is_ok() {
            bail!("A leftover inner scope was visible to the next program");
        }
        Ok(())
    }

    #[test]
    fn test_top_level_return_stops_program() -> Result<()> {
        InterpreterTest::from_src("print 1; return; print 2;")?.assert_output("1\n")
    }
}
