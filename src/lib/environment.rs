use crate::lib::err::LoxError;
use crate::lib::object::Object;
use crate::lib::scanner::Token;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope. Scopes are shared: a closure keeps its defining scope
/// (and everything it encloses) alive after the call that made it returns.
#[derive(Debug, Default)]
pub struct Environment {
    enclosing: Option<Rc<RefCell<Environment>>>,
    values: HashMap<String, Object>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn new_enclosed(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            enclosing: Some(enclosing),
            values: HashMap::new(),
        }
    }

    /// Binds `name` in this scope, replacing any previous binding here.
    pub fn define(&mut self, name: &str, value: Object) {
        self.values.insert(name.to_owned(), value);
    }

    /// Mutates the nearest existing binding; never creates one.
    pub fn assign(&mut self, token: &Token, value: Object) -> Result<(), LoxError> {
        if let Some(v) = self.values.get_mut(&token.lexeme) {
            *v = value;
            Ok(())
        } else if let Some(env) = &self.enclosing {
            env.borrow_mut().assign(token, value)
        } else {
            Err(gen_undef_error(token))
        }
    }

    pub fn get(&self, token: &Token) -> Result<Object, LoxError> {
        if let Some(v) = self.values.get(&token.lexeme) {
            Ok(v.clone())
        } else if let Some(env) = &self.enclosing {
            env.borrow().get(token)
        } else {
            Err(gen_undef_error(token))
        }
    }
}

fn gen_undef_error(token: &Token) -> LoxError {
    LoxError::UndefinedVariable { name: token.clone() }
}
