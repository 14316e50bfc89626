//! Bytecode for compiled units.
//!
//! A [`Chunk`] is a flat op list with a parallel position table, one entry
//! per op, so runtime errors can point back at source.

use super::token::{BinaryOp, Position};
use super::value::Value;
use crate::builtins::BuiltinId;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Constant(Value),
    LoadGlobal(usize),
    /// Pop into a global slot (written once) and the result register.
    StoreGlobal(usize),
    LoadLocal(usize),
    /// Pop into a local slot and the result register.
    StoreLocal(usize),
    Binary(BinaryOp),
    Negate,
    /// Pop `argc` arguments (first argument deepest) and push the return value.
    Call { builtin: BuiltinId, argc: usize },
    Jump(usize),
    /// Pop the condition; jump when it is falsy.
    JumpIfFalse(usize),
    /// Pop into the result register.
    SetResult,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub ops: Vec<Op>,
    pub positions: Vec<Position>,
    /// Local slots one invocation needs.
    pub locals: usize,
    /// True when any call targets a blocking builtin.
    pub blocking: bool,
}

impl Chunk {
    pub fn emit(&mut self, op: Op, pos: Position) -> usize {
        self.ops.push(op);
        self.positions.push(pos);
        self.ops.len() - 1
    }

    /// Point the jump at `at` to the next op to be emitted.
    pub fn patch_jump(&mut self, at: usize) {
        let target = self.ops.len();
        match &mut self.ops[at] {
            Op::Jump(t) | Op::JumpIfFalse(t) => *t = target,
            other => debug_assert!(false, "patching non-jump op {other:?}"),
        }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
