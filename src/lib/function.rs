use crate::lib::ast::FunctionDecl;
use crate::lib::environment::Environment;
use crate::lib::err::LoxError;
use crate::lib::interpreter::{Flow, Interpreter};
use crate::lib::object::{Number, Object};
use crate::lib::scanner::Token;
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};

/// Anything a call expression can invoke.
#[derive(Debug)]
pub enum Callable {
    Native(NativeFunction),
    Lox(LoxFunction),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Lox(function) => function.declaration.params.len(),
        }
    }

    /// Invokes with already-evaluated arguments. The caller has checked the
    /// arity; `paren` locates errors raised by natives.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Object>,
        paren: &Token,
    ) -> Result<Object, LoxError> {
        match self {
            Callable::Native(native) => {
                (native.func)(&arguments).map_err(|message| LoxError::Native {
                    message,
                    at: paren.clone(),
                })
            }
            Callable::Lox(function) => function.call(interpreter, arguments),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "<native fn>"),
            Callable::Lox(function) => write!(f, "<fn {}>", function.declaration.name.lexeme),
        }
    }
}

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Object]) -> Result<Object, String>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// A user-defined function together with the scope it was declared in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Rc<RefCell<Environment>>) -> Self {
        LoxFunction { declaration, closure }
    }

    #[instrument(skip_all, fields(name = self.declaration.name.lexeme.as_str()))]
    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxError> {
        let mut environment = Environment::new_enclosed(self.closure.clone());
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }
        let value = match interpreter.execute_block(&self.declaration.body, environment)? {
            Flow::Return(value) => value,
            Flow::Normal => Object::Nil,
        };
        debug!(%value, "Function returned");
        Ok(value)
    }
}

// The closure can (and usually does) contain this function, so only the name
// is printed.
impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.declaration.name.lexeme)
            .finish_non_exhaustive()
    }
}

/// Host functions registered in the global scope of every interpreter.
pub fn natives() -> Vec<NativeFunction> {
    vec![NativeFunction {
        name: "clock",
        arity: 0,
        func: clock,
    }]
}

fn clock(_arguments: &[Object]) -> Result<Object, String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|why| format!("Clock error: {}", why))?;
    Ok(Object::Number(Number::Float(elapsed.as_secs_f64())))
}
