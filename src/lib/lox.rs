use crate::lib::{
    ast::Stmt,
    diagnostics::{Diagnostic, Diagnostics},
    err::LoxError,
    interpreter::Interpreter,
    parser::parse,
    printer::AstPrinter,
    scanner::scan,
};
use std::io::Write;
use tracing::{error, info, instrument};

/// Exit status after a scan or parse error (`EX_DATAERR`).
pub const EXIT_STATIC_ERROR: i32 = 65;
/// Exit status after an uncaught runtime error (`EX_SOFTWARE`).
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Scanner, parser and interpreter wired together. One `Lox` keeps its
/// interpreter (and so its globals) across `run` calls.
pub struct Lox<W: Write> {
    interpreter: Interpreter<W>,
    diagnostics: Diagnostics,
    print_ast: bool,
}

impl<W: Write> Lox<W> {
    pub fn new(out: W) -> Self {
        Lox {
            interpreter: Interpreter::new(out),
            diagnostics: Diagnostics::new(),
            print_ast: false,
        }
    }

    /// Also write each parsed program, as s-expressions, before running it.
    pub fn print_ast(mut self, enabled: bool) -> Self {
        self.print_ast = enabled;
        self
    }

    /// Scans, parses and, when that produced no errors, interprets `source`.
    /// Problems end up in the diagnostics rather than the return value.
    #[instrument(skip_all, fields(len = source.len()))]
    pub fn run(&mut self, source: &str) {
        let tokens = scan(source, &mut self.diagnostics);
        let statements = parse(&tokens, &mut self.diagnostics);
        if self.diagnostics.had_error() {
            info!("Skipping interpretation after static errors");
            return;
        }
        if self.print_ast && !statements.is_empty() {
            if let Err(err) = self.write_ast(&statements) {
                self.diagnostics.runtime_error(&err);
                return;
            }
        }
        if let Err(err) = self.interpreter.interpret(&statements) {
            error!(%err, "Runtime error");
            self.diagnostics.runtime_error(&err);
        }
    }

    fn write_ast(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        let rendered = AstPrinter.print_program(statements)?;
        writeln!(self.interpreter.out(), "{}", rendered)?;
        Ok(())
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain()
    }

    /// Forgets earlier errors; the REPL calls this after every line.
    pub fn reset(&mut self) {
        self.diagnostics.reset();
    }

    pub fn exit_code(&self) -> i32 {
        if self.diagnostics.had_error() {
            EXIT_STATIC_ERROR
        } else if self.diagnostics.had_runtime_error() {
            EXIT_RUNTIME_ERROR
        } else {
            0
        }
    }
}
