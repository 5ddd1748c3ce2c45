pub mod ast;
pub mod diagnostics;
pub mod environment;
pub mod err;
pub mod function;
pub mod interpreter;
pub mod lox;
pub mod object;
pub mod parser;
pub mod printer;
pub mod scanner;
