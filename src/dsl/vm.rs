//! Stack interpreter for compiled units.
//!
//! Each invocation gets a fresh operand stack and local slots. Globals live
//! in the shared [`Env`] and are written exactly once, at load time.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use super::bytecode::{Chunk, Op};
use super::error::RuntimeError;
use super::token::{BinaryOp, Position};
use super::value::Value;
use crate::builtins::{BuiltinSymbol, BuiltinTable};

/// Outcome of invoking a compiled unit.
pub type ExecutionResult = Result<Value, RuntimeError>;

/// Per-script environment shared by every unit compiled from it.
#[derive(Debug)]
pub struct Env {
    builtins: Arc<BuiltinTable>,
    globals: Vec<OnceLock<Value>>,
}

impl Env {
    pub fn new(builtins: Arc<BuiltinTable>, globals: usize) -> Self {
        Self {
            builtins,
            globals: (0..globals).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn global(&self, slot: usize) -> Option<&Value> {
        self.globals.get(slot).and_then(OnceLock::get)
    }
}

/// A zero-argument executable produced from one statement.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    chunk: Arc<Chunk>,
    env: Arc<Env>,
    pos: Position,
}

impl CompiledUnit {
    pub fn new(chunk: Chunk, env: Arc<Env>, pos: Position) -> Self {
        Self {
            chunk: Arc::new(chunk),
            env,
            pos,
        }
    }

    pub fn call(&self) -> ExecutionResult {
        execute(&self.chunk, &self.env)
    }

    /// Source position of the statement this unit was lowered from.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// True when the unit calls a blocking builtin.
    pub fn is_blocking(&self) -> bool {
        self.chunk.blocking
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }
}

fn pop(stack: &mut Vec<Value>, pos: Position) -> Result<Value, RuntimeError> {
    stack
        .pop()
        .ok_or_else(|| RuntimeError::new("operand stack underflow", pos))
}

fn execute(chunk: &Chunk, env: &Env) -> ExecutionResult {
    let mut stack: Vec<Value> = Vec::with_capacity(8);
    let mut locals = vec![Value::Unit; chunk.locals];
    let mut result = Value::Unit;
    let mut ip = 0;

    while let Some(op) = chunk.ops.get(ip) {
        let pos = chunk.positions.get(ip).copied().unwrap_or_default();
        ip += 1;

        match op {
            Op::Constant(value) => stack.push(value.clone()),
            Op::LoadGlobal(slot) => {
                let value = env
                    .global(*slot)
                    .cloned()
                    .ok_or_else(|| RuntimeError::new("variable read before it was bound", pos))?;
                stack.push(value);
            }
            Op::StoreGlobal(slot) => {
                let value = pop(&mut stack, pos)?;
                let cell = env
                    .globals
                    .get(*slot)
                    .ok_or_else(|| RuntimeError::new("no such global slot", pos))?;
                cell.set(value.clone())
                    .map_err(|_| RuntimeError::new("binding is already initialized", pos))?;
                result = value;
            }
            Op::LoadLocal(slot) => {
                let value = locals.get(*slot).cloned().unwrap_or_default();
                stack.push(value);
            }
            Op::StoreLocal(slot) => {
                let value = pop(&mut stack, pos)?;
                if let Some(cell) = locals.get_mut(*slot) {
                    *cell = value.clone();
                }
                result = value;
            }
            Op::Binary(op) => {
                let right = pop(&mut stack, pos)?;
                let left = pop(&mut stack, pos)?;
                stack.push(binary(*op, left, right, pos)?);
            }
            Op::Negate => match pop(&mut stack, pos)? {
                Value::Number(n) => stack.push(Value::Number(-n)),
                other => {
                    return Err(RuntimeError::new(
                        format!("cannot negate a {}", other.value_type()),
                        pos,
                    ))
                }
            },
            Op::Call { builtin, argc } => {
                let symbol = env
                    .builtins
                    .get(*builtin)
                    .ok_or_else(|| RuntimeError::new("unresolved builtin", pos))?;
                let split = stack
                    .len()
                    .checked_sub(*argc)
                    .ok_or_else(|| RuntimeError::new("operand stack underflow", pos))?;
                let args = stack.split_off(split);

                for (i, (param, arg)) in symbol.params.iter().zip(&args).enumerate() {
                    if !param.accepts(arg) {
                        let expected = param.expected().map_or("value".to_string(), |t| t.to_string());
                        return Err(RuntimeError::new(
                            format!(
                                "{}: argument {} expected {}, found {}",
                                symbol.name,
                                i + 1,
                                expected,
                                arg.value_type()
                            ),
                            pos,
                        ));
                    }
                }

                stack.push(invoke(symbol, &args, pos)?);
            }
            Op::Jump(target) => ip = *target,
            Op::JumpIfFalse(target) => {
                if !pop(&mut stack, pos)?.is_truthy() {
                    ip = *target;
                }
            }
            Op::SetResult => result = pop(&mut stack, pos)?,
        }
    }

    Ok(result)
}

/// Run a native builtin. A panic inside it becomes a runtime error at the call site.
fn invoke(symbol: &BuiltinSymbol, args: &[Value], pos: Position) -> ExecutionResult {
    match panic::catch_unwind(AssertUnwindSafe(|| symbol.invoke(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(RuntimeError::new(format!("{}: {}", symbol.name, e), pos)),
        Err(payload) => Err(RuntimeError::new(
            format!("{} panicked: {}", symbol.name, panic_message(payload.as_ref())),
            pos,
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, pos: Position) -> ExecutionResult {
    if op == BinaryOp::Add && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_))) {
        return Ok(Value::Str(format!("{left}{right}")));
    }

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        return Err(RuntimeError::new(
            format!(
                "cannot apply '{}' to {} and {}",
                op.symbol(),
                left.value_type(),
                right.value_type()
            ),
            pos,
        ));
    };
    let (a, b) = (*a, *b);

    let n = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
            return Err(RuntimeError::new("division by zero", pos));
        }
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
    };
    Ok(Value::Number(n))
}
