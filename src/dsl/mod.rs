//! Script compiler: source text → tokens → AST → bytecode units.

pub mod ast;
pub mod bytecode;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;
pub mod vm;

use std::sync::Arc;

pub use ast::*;
pub use compile::{CompiledProgram, CompiledScript, HotkeyBinding, LoadEffect};
pub use error::{CompileError, LexError, ParseError, RuntimeError, ScriptError};
pub use token::{Position, Token, TokenKind};
pub use value::Value;
pub use vm::{CompiledUnit, ExecutionResult};

use crate::builtins::BuiltinTable;
use compile::compile_program;

/// The script compiler.
///
/// Each stage is all-or-nothing: the first error aborts and nothing is
/// produced for the remainder of the script.
pub struct Compiler;

impl Compiler {
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
        lexer::tokenize(source)
    }

    /// Parse source into a Program AST.
    pub fn parse(source: &str) -> Result<Program, ScriptError> {
        let tokens = lexer::tokenize(source)?;
        Ok(parser::parse(tokens)?)
    }

    /// Compile without running anything.
    pub fn check(
        source: &str,
        builtins: &Arc<BuiltinTable>,
    ) -> Result<CompiledProgram, ScriptError> {
        let program = Self::parse(source)?;
        Ok(compile_program(&program, Arc::clone(builtins))?)
    }

    /// Compile, then run the load-time units.
    ///
    /// The returned script lists the load effects already executed and the
    /// hotkey bindings waiting to be registered.
    pub fn compile(
        source: &str,
        builtins: &Arc<BuiltinTable>,
    ) -> Result<CompiledScript, ScriptError> {
        let program = Self::check(source, builtins)?;
        Ok(program.load()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::ParamType;
    use crate::builtins::BuiltinSymbol;
    use crate::dsl::error::CompileErrorKind;

    fn builtins() -> Arc<BuiltinTable> {
        let mut table = BuiltinTable::new();
        table.register("send", 1, |_| Ok(Value::Unit));
        table.register_symbol(BuiltinSymbol::new(
            "text.len",
            vec![ParamType::String],
            |args| Ok(Value::Number(args[0].to_string().len() as f64)),
        ));
        Arc::new(table)
    }

    #[test]
    fn compile_runs_lets_and_returns_bindings() {
        let script = Compiler::compile(
            "let n = text.len(\"four\")\nCtrl+Alt+t => send(n)\nF12 => send(\"x\")",
            &builtins(),
        )
        .unwrap();
        assert_eq!(script.effects.len(), 1);
        assert_eq!(script.effects[0].value, Value::Number(4.0));
        assert_eq!(script.bindings.len(), 2);
        assert_eq!(script.bindings[1].pattern.to_string(), "F12");
    }

    #[test]
    fn each_stage_error_is_wrapped() {
        let b = builtins();
        assert!(matches!(
            Compiler::compile("send(\"x)", &b),
            Err(ScriptError::Lex(_))
        ));
        assert!(matches!(
            Compiler::compile("let = 1", &b),
            Err(ScriptError::Parse(_))
        ));
        let err = Compiler::compile("nope()", &b).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Compile(CompileError {
                kind: CompileErrorKind::UnknownSymbol { .. },
                ..
            })
        ));
        assert!(matches!(
            Compiler::compile("let x = 1 / 0", &b),
            Err(ScriptError::Runtime(_))
        ));
    }

    #[test]
    fn check_does_not_execute() {
        let program = Compiler::check("let x = 1 / 0", &builtins()).unwrap();
        assert_eq!(program.top_level.len(), 1);
    }
}
