//! Input to the native code path
//!
//! A body is a flat list of unary statements over temps. Stack-slot temps
//! live in the frame as boxed `RawValue` words; physical-register temps hold
//! an unboxed `i32` (or 0/1 for booleans) and never escape the body.

use std::fmt;

/// Static type the compiler proved for a temp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrType {
    #[default]
    Unknown,
    Bool,
    SInt32,
    UInt32,
    Double,
    /// Any value
    Var,
}

impl IrType {
    /// Types an unboxed register can carry
    #[inline]
    pub const fn fits_register(self) -> bool {
        matches!(self, IrType::Bool | IrType::SInt32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempKind {
    PhysicalRegister,
    StackSlot,
}

/// A virtual operand
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Temp {
    pub index: u32,
    pub kind: TempKind,
    pub ty: IrType,
}

impl Temp {
    pub const fn slot(index: u32, ty: IrType) -> Self {
        Temp {
            index,
            kind: TempKind::StackSlot,
            ty,
        }
    }

    pub const fn register(index: u32, ty: IrType) -> Self {
        Temp {
            index,
            kind: TempKind::PhysicalRegister,
            ty,
        }
    }

    #[inline]
    pub const fn is_register(&self) -> bool {
        matches!(self.kind, TempKind::PhysicalRegister)
    }
}

impl fmt::Debug for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_register() { "%r" } else { "$" };
        write!(f, "{prefix}{}:{:?}", self.index, self.ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    UMinus,
    UPlus,
    Compl,
    Increment,
    Decrement,
}

impl UnaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::UMinus => "uminus",
            UnaryOp::UPlus => "uplus",
            UnaryOp::Compl => "compl",
            UnaryOp::Increment => "increment",
            UnaryOp::Decrement => "decrement",
        }
    }
}

/// `target = op source`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryStmt {
    pub op: UnaryOp,
    pub source: Temp,
    pub target: Temp,
}

impl UnaryStmt {
    pub const fn new(op: UnaryOp, source: Temp, target: Temp) -> Self {
        UnaryStmt { op, source, target }
    }
}
