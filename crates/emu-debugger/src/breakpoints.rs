//! Breakpoints with optional compiled conditions.
//!
//! Breakpoints are grouped by the access class they watch so the hot path
//! scans only the relevant group. Conditions arrive pre-compiled to RPN;
//! evaluation runs on a fixed stack with no allocation, and any malformed
//! program simply evaluates to false.

use std::ops::RangeInclusive;

use emu_core::{AddressInfo, MemoryOperation, MemoryType};

/// One operation of a compiled condition program.
///
/// Operand ops push a machine value; the rest pop two (or one, for `Not`)
/// and push the result. Comparisons and logic push 1 or 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpnOp {
    Push(i64),
    A,
    X,
    Y,
    S,
    P,
    Pc,
    /// Address of the access being tested.
    Address,
    /// Value of the access being tested.
    Value,
    Scanline,
    Add,
    Sub,
    Mul,
    /// Division by zero yields 0.
    Div,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
}

/// Machine state a condition is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalContext {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub pc: u16,
    pub address: u16,
    pub value: u8,
    pub scanline: u16,
}

/// A compiled condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpnProgram {
    ops: Vec<RpnOp>,
}

impl RpnProgram {
    #[must_use]
    pub fn new(ops: Vec<RpnOp>) -> Self {
        Self { ops }
    }

    /// Run the program. Stack underflow or overflow aborts to false; the
    /// result is the truth value of the top of stack.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        let mut stack = [0i64; 16];
        let mut top = 0usize;

        for &op in &self.ops {
            let value = match op {
                RpnOp::Push(v) => v,
                RpnOp::A => i64::from(ctx.a),
                RpnOp::X => i64::from(ctx.x),
                RpnOp::Y => i64::from(ctx.y),
                RpnOp::S => i64::from(ctx.s),
                RpnOp::P => i64::from(ctx.p),
                RpnOp::Pc => i64::from(ctx.pc),
                RpnOp::Address => i64::from(ctx.address),
                RpnOp::Value => i64::from(ctx.value),
                RpnOp::Scanline => i64::from(ctx.scanline),
                RpnOp::Not => {
                    if top < 1 {
                        return false;
                    }
                    top -= 1;
                    i64::from(stack[top] == 0)
                }
                _ => {
                    if top < 2 {
                        return false;
                    }
                    let b = stack[top - 1];
                    let a = stack[top - 2];
                    top -= 2;
                    match op {
                        RpnOp::Add => a.wrapping_add(b),
                        RpnOp::Sub => a.wrapping_sub(b),
                        RpnOp::Mul => a.wrapping_mul(b),
                        RpnOp::Div => {
                            if b == 0 {
                                0
                            } else {
                                a.wrapping_div(b)
                            }
                        }
                        RpnOp::BitAnd => a & b,
                        RpnOp::BitOr => a | b,
                        RpnOp::BitXor => a ^ b,
                        RpnOp::Shl => a.wrapping_shl(b as u32),
                        RpnOp::Shr => a.wrapping_shr(b as u32),
                        RpnOp::Eq => i64::from(a == b),
                        RpnOp::NotEq => i64::from(a != b),
                        RpnOp::Lt => i64::from(a < b),
                        RpnOp::LtEq => i64::from(a <= b),
                        RpnOp::Gt => i64::from(a > b),
                        RpnOp::GtEq => i64::from(a >= b),
                        RpnOp::And => i64::from(a != 0 && b != 0),
                        RpnOp::Or => i64::from(a != 0 || b != 0),
                        _ => return false,
                    }
                }
            };
            if top == stack.len() {
                return false;
            }
            stack[top] = value;
            top += 1;
        }

        top >= 1 && stack[top - 1] != 0
    }
}

/// One breakpoint.
///
/// The address range is relative (CPU-visible) or absolute depending on
/// `memory_type`; absolute breakpoints keep matching through bank switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: u32,
    pub memory_type: MemoryType,
    pub start: u32,
    pub end: u32,
    pub on_exec: bool,
    pub on_read: bool,
    pub on_write: bool,
    pub enabled: bool,
    /// Log a debug event instead of stopping execution.
    pub mark_only: bool,
    /// Skip accesses whose value the CPU discards.
    pub ignore_dummy: bool,
    pub condition: Option<RpnProgram>,
}

impl Breakpoint {
    /// An enabled breakpoint over `range` with no triggers armed yet.
    #[must_use]
    pub fn new(id: u32, memory_type: MemoryType, range: RangeInclusive<u32>) -> Self {
        Self {
            id,
            memory_type,
            start: *range.start(),
            end: *range.end(),
            on_exec: false,
            on_read: false,
            on_write: false,
            enabled: true,
            mark_only: false,
            ignore_dummy: false,
            condition: None,
        }
    }

    fn matches(&self, op: MemoryOperation, abs: Option<AddressInfo>) -> bool {
        if self.memory_type.is_relative() {
            let addr = u32::from(op.address);
            self.start <= addr && addr <= self.end
        } else {
            abs.is_some_and(|abs| {
                abs.memory_type == self.memory_type
                    && self.start <= abs.address
                    && abs.address <= self.end
            })
        }
    }
}

/// The active breakpoint set, grouped by access class.
#[derive(Debug, Default)]
pub struct Breakpoints {
    exec: Vec<Breakpoint>,
    read: Vec<Breakpoint>,
    write: Vec<Breakpoint>,
}

impl Breakpoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set.
    pub fn set(&mut self, breakpoints: &[Breakpoint]) {
        self.exec.clear();
        self.read.clear();
        self.write.clear();
        for bp in breakpoints {
            if bp.on_exec {
                self.exec.push(bp.clone());
            }
            if bp.on_read {
                self.read.push(bp.clone());
            }
            if bp.on_write {
                self.write.push(bp.clone());
            }
        }
    }

    /// True when any breakpoint is set; lets callers skip building an
    /// [`EvalContext`] per access.
    #[must_use]
    pub fn has_any(&self) -> bool {
        !self.exec.is_empty() || !self.read.is_empty() || !self.write.is_empty()
    }

    /// Test one access. Returns the first matching breakpoint; the caller
    /// decides between stopping and logging based on `mark_only`.
    #[must_use]
    pub fn check(
        &self,
        op: MemoryOperation,
        abs: Option<AddressInfo>,
        ctx: &EvalContext,
    ) -> Option<&Breakpoint> {
        // Opcode and operand fetches are reads too; they belong to the
        // execute group.
        let group = if op.op_type.is_exec() {
            &self.exec
        } else if op.op_type.is_read() {
            &self.read
        } else if op.op_type.is_write() {
            &self.write
        } else {
            return None;
        };

        group.iter().find(|bp| {
            bp.enabled
                && !(bp.ignore_dummy && op.op_type.is_dummy())
                && bp.matches(op, abs)
                && bp.condition.as_ref().is_none_or(|cond| cond.evaluate(ctx))
        })
    }
}
