//! Code generator: lowers a [`Program`] AST into bytecode units.
//!
//! Every call target is resolved against the [`BuiltinTable`] by qualified
//! name, with arity and literal argument types checked here so that a script
//! either compiles completely or not at all. Top-level `let` bindings get a
//! global slot; `let` inside a block gets a per-invocation local slot.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::ast::*;
use super::bytecode::{Chunk, Op};
use super::error::{CompileError, CompileErrorKind, RuntimeError, ValueType};
use super::token::Position;
use super::value::Value;
use super::vm::{CompiledUnit, Env};
use crate::builtins::{BuiltinId, BuiltinSymbol, BuiltinTable, ExecMode, ParamType};
use crate::hotkey::HotkeyPattern;

/// Output of [`compile_program`]: units ready to load, nothing executed yet.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    /// One unit per top-level executable statement, in source order.
    pub top_level: Vec<CompiledUnit>,
    pub hotkeys: Vec<(HotkeyPattern, CompiledUnit)>,
}

/// Result of one top-level unit executed at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadEffect {
    pub position: Position,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct HotkeyBinding {
    pub pattern: HotkeyPattern,
    pub unit: CompiledUnit,
}

/// A loaded script: load-time effects already ran, bindings await registration.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub effects: Vec<LoadEffect>,
    pub bindings: Vec<HotkeyBinding>,
}

impl CompiledProgram {
    /// Run the top-level units in source order.
    pub fn load(self) -> Result<CompiledScript, RuntimeError> {
        let mut effects = Vec::with_capacity(self.top_level.len());
        for unit in &self.top_level {
            let value = unit.call()?;
            effects.push(LoadEffect {
                position: unit.position(),
                value,
            });
        }

        let bindings = self
            .hotkeys
            .into_iter()
            .map(|(pattern, unit)| HotkeyBinding { pattern, unit })
            .collect();

        Ok(CompiledScript { effects, bindings })
    }
}

/// Compile a Program AST against `builtins`.
pub fn compile_program(
    program: &Program,
    builtins: Arc<BuiltinTable>,
) -> Result<CompiledProgram, CompileError> {
    check_duplicate_hotkeys(program)?;

    let mut codegen = CodeGen::new(&builtins);
    let mut top_level = Vec::new();
    let mut hotkeys = Vec::new();

    for stmt in &program.statements {
        match &stmt.kind {
            StmtKind::Hotkey { pattern, body } => {
                let mut unit = UnitBuilder::default();
                match body {
                    Body::Expr(expr) => {
                        codegen.expr(expr, &mut unit)?;
                        unit.chunk.emit(Op::SetResult, expr.pos);
                    }
                    Body::Block(block) => codegen.block(block, &mut unit)?,
                }
                hotkeys.push((pattern.clone(), unit.finish(), stmt.pos));
            }
            StmtKind::Let { name, value } => {
                let mut unit = UnitBuilder::default();
                codegen.expr(value, &mut unit)?;
                let slot = codegen.declare_global(name);
                unit.chunk.emit(Op::StoreGlobal(slot), stmt.pos);
                top_level.push((unit.finish(), stmt.pos));
            }
            _ => {
                let mut unit = UnitBuilder::default();
                codegen.stmt(stmt, &mut unit)?;
                top_level.push((unit.finish(), stmt.pos));
            }
        }
    }

    let env = Arc::new(Env::new(Arc::clone(&builtins), codegen.global_count));
    let wrap = |chunk: Chunk, pos: Position| CompiledUnit::new(chunk, Arc::clone(&env), pos);

    let top_level: Vec<CompiledUnit> = top_level
        .into_iter()
        .map(|(chunk, pos)| wrap(chunk, pos))
        .collect();
    let hotkeys: Vec<(HotkeyPattern, CompiledUnit)> = hotkeys
        .into_iter()
        .map(|(pattern, chunk, pos)| (pattern, wrap(chunk, pos)))
        .collect();

    debug!(
        units = top_level.len(),
        hotkeys = hotkeys.len(),
        globals = codegen.global_count,
        "compiled program"
    );

    Ok(CompiledProgram { top_level, hotkeys })
}

fn check_duplicate_hotkeys(program: &Program) -> Result<(), CompileError> {
    let mut seen: HashMap<&HotkeyPattern, Position> = HashMap::new();
    for (pattern, _, pos) in program.hotkeys() {
        if let Some(&first) = seen.get(pattern) {
            return Err(CompileError::new(
                CompileErrorKind::DuplicateHotkey {
                    pattern: pattern.clone(),
                    first,
                },
                pos,
            ));
        }
        seen.insert(pattern, pos);
    }
    Ok(())
}

/// Chunk under construction plus its visible locals.
#[derive(Default)]
struct UnitBuilder {
    chunk: Chunk,
    /// Visible locals, innermost last.
    scope: Vec<(String, usize)>,
}

impl UnitBuilder {
    fn declare_local(&mut self, name: &str) -> usize {
        let slot = self.chunk.locals;
        self.chunk.locals += 1;
        self.scope.push((name.to_string(), slot));
        slot
    }

    fn local(&self, name: &str) -> Option<usize> {
        self.scope
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|&(_, slot)| slot)
    }

    fn finish(self) -> Chunk {
        self.chunk
    }
}

struct CodeGen<'a> {
    builtins: &'a BuiltinTable,
    /// Globals declared so far, latest last so shadowing wins.
    globals: Vec<(String, usize)>,
    global_count: usize,
}

impl<'a> CodeGen<'a> {
    fn new(builtins: &'a BuiltinTable) -> Self {
        Self {
            builtins,
            globals: Vec::new(),
            global_count: 0,
        }
    }

    fn declare_global(&mut self, name: &str) -> usize {
        let slot = self.global_count;
        self.global_count += 1;
        self.globals.push((name.to_string(), slot));
        slot
    }

    fn global(&self, name: &str) -> Option<usize> {
        self.globals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|&(_, slot)| slot)
    }

    fn is_variable(&self, name: &str, unit: &UnitBuilder) -> bool {
        unit.local(name).is_some() || self.global(name).is_some()
    }

    /// A statement inside a unit. `let` here declares a local.
    fn stmt(&self, stmt: &Stmt, unit: &mut UnitBuilder) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                self.expr(value, unit)?;
                let slot = unit.declare_local(name);
                unit.chunk.emit(Op::StoreLocal(slot), stmt.pos);
            }
            StmtKind::Hotkey { pattern, .. } => {
                return Err(CompileError::new(
                    CompileErrorKind::NestedHotkey {
                        pattern: pattern.clone(),
                    },
                    stmt.pos,
                ));
            }
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.expr(condition, unit)?;
                let to_else = unit.chunk.emit(Op::JumpIfFalse(0), stmt.pos);
                self.block(then_block, unit)?;
                match else_block {
                    Some(block) => {
                        let to_end = unit.chunk.emit(Op::Jump(0), stmt.pos);
                        unit.chunk.patch_jump(to_else);
                        self.block(block, unit)?;
                        unit.chunk.patch_jump(to_end);
                    }
                    None => unit.chunk.patch_jump(to_else),
                }
            }
            StmtKind::Expr(expr) => {
                self.expr(expr, unit)?;
                unit.chunk.emit(Op::SetResult, stmt.pos);
            }
        }
        Ok(())
    }

    fn block(&self, block: &Block, unit: &mut UnitBuilder) -> Result<(), CompileError> {
        let depth = unit.scope.len();
        for stmt in &block.statements {
            self.stmt(stmt, unit)?;
        }
        unit.scope.truncate(depth);
        Ok(())
    }

    /// Emit code leaving exactly one value on the stack.
    fn expr(&self, expr: &Expr, unit: &mut UnitBuilder) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::NumberLiteral(n) => {
                unit.chunk.emit(Op::Constant(Value::Number(*n)), expr.pos);
            }
            ExprKind::StringLiteral(s) => {
                unit.chunk.emit(Op::Constant(Value::Str(s.clone())), expr.pos);
            }
            ExprKind::Identifier(name) => {
                if let Some(slot) = unit.local(name) {
                    unit.chunk.emit(Op::LoadLocal(slot), expr.pos);
                } else if let Some(slot) = self.global(name) {
                    unit.chunk.emit(Op::LoadGlobal(slot), expr.pos);
                } else {
                    self.call(name, None, &[], expr.pos, unit)?;
                }
            }
            ExprKind::MemberAccess { .. } => {
                let name = expr
                    .qualified_name()
                    .ok_or_else(|| CompileError::new(CompileErrorKind::NotCallable, expr.pos))?;
                self.call(&name, None, &[], expr.pos, unit)?;
            }
            ExprKind::Call { callee, args } => {
                let name = self.callee_name(callee, unit)?;
                self.call(&name, None, args, expr.pos, unit)?;
            }
            ExprKind::Pipe { input, stage } => {
                let (name, args) = match &stage.kind {
                    ExprKind::Call { callee, args } => {
                        (self.callee_name(callee, unit)?, args.as_slice())
                    }
                    _ => (self.callee_name(stage, unit)?, &[][..]),
                };
                self.call(&name, Some(input.as_ref()), args, stage.pos, unit)?;
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left, unit)?;
                self.expr(right, unit)?;
                unit.chunk.emit(Op::Binary(*op), expr.pos);
            }
            ExprKind::Negate(inner) => {
                self.expr(inner, unit)?;
                unit.chunk.emit(Op::Negate, expr.pos);
            }
        }
        Ok(())
    }

    /// Name of a call target. Variables are values, not functions.
    fn callee_name(&self, callee: &Expr, unit: &UnitBuilder) -> Result<String, CompileError> {
        let not_callable = || CompileError::new(CompileErrorKind::NotCallable, callee.pos);
        let name = callee.qualified_name().ok_or_else(not_callable)?;
        if matches!(callee.kind, ExprKind::Identifier(_)) && self.is_variable(&name, unit) {
            return Err(not_callable());
        }
        Ok(name)
    }

    /// Emit a builtin call. `piped` becomes argument 0 ahead of `args`.
    fn call(
        &self,
        name: &str,
        piped: Option<&Expr>,
        args: &[Expr],
        pos: Position,
        unit: &mut UnitBuilder,
    ) -> Result<(), CompileError> {
        let (id, symbol) = self.resolve(name, pos)?;
        let all: Vec<&Expr> = piped.into_iter().chain(args.iter()).collect();

        if all.len() != symbol.arity() {
            return Err(CompileError::new(
                CompileErrorKind::ArityMismatch {
                    name: name.to_string(),
                    expected: symbol.arity(),
                    found: all.len(),
                },
                pos,
            ));
        }
        for (param, arg) in symbol.params.iter().zip(&all) {
            check_literal(*param, arg)?;
        }

        for arg in &all {
            self.expr(arg, unit)?;
        }
        if symbol.mode == ExecMode::Blocking {
            unit.chunk.blocking = true;
        }
        unit.chunk.emit(
            Op::Call {
                builtin: id,
                argc: all.len(),
            },
            pos,
        );
        Ok(())
    }

    fn resolve(
        &self,
        name: &str,
        pos: Position,
    ) -> Result<(BuiltinId, &'a BuiltinSymbol), CompileError> {
        self.builtins
            .lookup(name)
            .ok_or_else(|| CompileError::unknown_symbol(name, pos))
    }
}

/// Static type check for a literal argument.
fn check_literal(param: ParamType, arg: &Expr) -> Result<(), CompileError> {
    let mismatch = |expected: ValueType, found: ValueType| -> Result<(), CompileError> {
        Err(CompileError::new(
            CompileErrorKind::TypeMismatch { expected, found },
            arg.pos,
        ))
    };
    match (param, &arg.kind) {
        (ParamType::Integer, ExprKind::NumberLiteral(n)) if n.fract() != 0.0 => {
            mismatch(ValueType::Integer, ValueType::Number)
        }
        (ParamType::String, ExprKind::NumberLiteral(_)) => {
            mismatch(ValueType::String, ValueType::Number)
        }
        (ParamType::Number | ParamType::Integer, ExprKind::StringLiteral(_)) => {
            let expected = param.expected().unwrap_or(ValueType::Number);
            mismatch(expected, ValueType::String)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{lexer, parser};
    use pretty_assertions::assert_eq;

    fn builtins() -> Arc<BuiltinTable> {
        let mut table = BuiltinTable::new();
        table.register("send", 1, |_| Ok(Value::Unit));
        table.register("clipboard.get", 0, |_| Ok(Value::from("clip")));
        table.register_symbol(BuiltinSymbol::new(
            "text.upper",
            vec![ParamType::String],
            |args| Ok(Value::from(args[0].to_string().to_uppercase())),
        ));
        table.register_symbol(BuiltinSymbol::new(
            "repeat",
            vec![ParamType::String, ParamType::Integer],
            |_| Ok(Value::Unit),
        ));
        table.register_symbol(
            BuiltinSymbol::new("sleep", vec![ParamType::Integer], |_| Ok(Value::Unit)).blocking(),
        );
        Arc::new(table)
    }

    fn compile(src: &str) -> Result<CompiledProgram, CompileError> {
        let program = parser::parse(lexer::tokenize(src).unwrap()).unwrap();
        compile_program(&program, builtins())
    }

    fn kind(src: &str) -> CompileErrorKind {
        compile(src).unwrap_err().kind
    }

    #[test]
    fn hotkey_binding_calls_send() {
        let program = compile(r#"Ctrl+Alt+t => send("hello")"#).unwrap();
        assert!(program.top_level.is_empty());
        assert_eq!(program.hotkeys.len(), 1);
        let (pattern, unit) = &program.hotkeys[0];
        assert_eq!(pattern.to_string(), "Ctrl+Alt+t");
        assert_eq!(
            unit.chunk().ops,
            vec![
                Op::Constant(Value::from("hello")),
                Op::Call {
                    builtin: BuiltinId(0),
                    argc: 1
                },
                Op::SetResult,
            ]
        );
    }

    #[test]
    fn unknown_symbol_reported_with_position() {
        let err = compile("let a = 1\nfoo.bar()").unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::UnknownSymbol {
                name: "foo.bar".into()
            }
        );
        assert_eq!(err.position, Position::new(2, 1));
    }

    #[test]
    fn arity_mismatch() {
        assert_eq!(
            kind(r#"send("a", "b")"#),
            CompileErrorKind::ArityMismatch {
                name: "send".into(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn pipe_counts_piped_argument() {
        let program = compile("clipboard.get() | text.upper").unwrap();
        let ops = &program.top_level[0].chunk().ops;
        assert_eq!(
            ops[..2].to_vec(),
            vec![
                Op::Call {
                    builtin: BuiltinId(1),
                    argc: 0
                },
                Op::Call {
                    builtin: BuiltinId(2),
                    argc: 1
                },
            ]
        );

        assert_eq!(
            kind("clipboard.get() | send(1)"),
            CompileErrorKind::ArityMismatch {
                name: "send".into(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn integer_param_rejects_fractional_literal() {
        let err = compile(r#"repeat("x", 2.5)"#).unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::TypeMismatch {
                expected: ValueType::Integer,
                found: ValueType::Number
            }
        );
        assert_eq!(err.position, Position::new(1, 13));
        assert!(compile(r#"repeat("x", 2)"#).is_ok());
    }

    #[test]
    fn string_param_rejects_number_literal() {
        assert_eq!(
            kind("text.upper(3)"),
            CompileErrorKind::TypeMismatch {
                expected: ValueType::String,
                found: ValueType::Number
            }
        );
    }

    #[test]
    fn lets_resolve_to_globals_in_order() {
        let program = compile("let x = 5\nlet y = x * 2\nF1 => send(y)").unwrap();
        assert_eq!(program.top_level.len(), 2);
        assert_eq!(
            program.top_level[1].chunk().ops,
            vec![
                Op::LoadGlobal(0),
                Op::Constant(Value::Number(2.0)),
                Op::Binary(crate::dsl::token::BinaryOp::Mul),
                Op::StoreGlobal(1),
            ]
        );
    }

    #[test]
    fn later_let_is_not_visible_earlier() {
        assert_eq!(
            kind("F1 => send(x)\nlet x = 1"),
            CompileErrorKind::UnknownSymbol { name: "x".into() }
        );
    }

    #[test]
    fn block_locals_are_scoped() {
        let program = compile("F2 => {\n  let a = 1\n  send(a)\n}").unwrap();
        assert_eq!(program.hotkeys[0].1.chunk().locals, 1);

        assert_eq!(
            kind("F2 => {\n if (1) { let a = 1 }\n send(a)\n}"),
            CompileErrorKind::UnknownSymbol { name: "a".into() }
        );
    }

    #[test]
    fn duplicate_hotkey_rejected() {
        let err = compile("Ctrl+a => send(1)\nCtrl+A => send(2)").unwrap_err();
        assert!(matches!(
            err.kind,
            CompileErrorKind::DuplicateHotkey { first, .. } if first == Position::new(1, 1)
        ));
        assert_eq!(err.position, Position::new(2, 1));
    }

    #[test]
    fn nested_hotkey_rejected() {
        assert!(matches!(
            kind("F3 => {\n  F4 => send(1)\n}"),
            CompileErrorKind::NestedHotkey { .. }
        ));
    }

    #[test]
    fn calling_a_variable_is_not_callable() {
        assert_eq!(kind("let f = 1\nf()"), CompileErrorKind::NotCallable);
        assert_eq!(kind("1 | 2"), CompileErrorKind::NotCallable);
    }

    #[test]
    fn blocking_builtin_marks_unit() {
        let program = compile("F5 => sleep(10)\nF6 => send(1)").unwrap();
        assert!(program.hotkeys[0].1.is_blocking());
        assert!(!program.hotkeys[1].1.is_blocking());
    }

    #[test]
    fn if_else_lowers_to_jumps() {
        let program = compile("if (1) { send(1) } else { send(2) }").unwrap();
        let ops = &program.top_level[0].chunk().ops;
        assert!(matches!(ops[1], Op::JumpIfFalse(6)));
        assert!(matches!(ops[5], Op::Jump(9)));
    }

    #[test]
    fn load_runs_top_level_in_order() {
        let script = compile("let x = 2\nx + 3\nF1 => send(x)")
            .unwrap()
            .load()
            .unwrap();
        let values: Vec<Value> = script.effects.iter().map(|e| e.value.clone()).collect();
        assert_eq!(values, vec![Value::Number(2.0), Value::Number(5.0)]);
        assert_eq!(script.bindings.len(), 1);
    }
}
