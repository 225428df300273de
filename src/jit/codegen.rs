//! Function-level code generation
//!
//! Generated code has the C signature
//! `extern "C" fn(engine: *mut Engine, frame: *mut RawValue) -> u32`.
//! The engine pointer stays in `rbx` and the frame base in `r12`; register
//! temps live in the callee-saved `r13`..`r15`, so they survive helper
//! calls. A non-zero return value means a helper threw.

use crate::error::JitError;
use crate::jit::assembler::{AssembledCode, Assembler, Cond, Inst, Label, Reg};
use crate::jit::helpers::RuntimeHelper;
use crate::jit::ir::{IrType, Temp, UnaryOp, UnaryStmt};
use crate::jit::unop::Unop;
use crate::value::RawValue;

pub const ENGINE_REGISTER: Reg = Reg::Rbx;
pub const FRAME_REGISTER: Reg = Reg::R12;
pub const SCRATCH_REGISTER: Reg = Reg::Rcx;

/// Registers available to register temps, by temp index
pub const TEMP_REGISTERS: [Reg; 3] = [Reg::R13, Reg::R14, Reg::R15];

/// Pushed by the prologue, in order
pub const SAVED_REGISTERS: [Reg; 5] = [Reg::Rbx, Reg::R12, Reg::R13, Reg::R14, Reg::R15];

/// Frame words used by a body
///
/// Stack-slot temps come first, followed by two scratch words used to box
/// a register operand and to receive a helper's result for a register
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub slots: u32,
}

impl FrameLayout {
    fn of(body: &[UnaryStmt]) -> Self {
        let slots = body
            .iter()
            .flat_map(|s| [s.source, s.target])
            .filter(|t| !t.is_register())
            .map(|t| t.index + 1)
            .max()
            .unwrap_or(0);
        FrameLayout { slots }
    }

    /// Words the caller must provide
    #[inline]
    pub const fn words(&self) -> u32 {
        self.slots + 2
    }

    #[inline]
    const fn operand_scratch(&self) -> u32 {
        self.slots
    }

    #[inline]
    const fn result_scratch(&self) -> u32 {
        self.slots + 1
    }
}

#[inline]
const fn disp(word: u32) -> i32 {
    (word * 8) as i32
}

/// Output of `compile_body`
#[derive(Debug, Clone)]
pub struct CompiledBody {
    pub code: AssembledCode,
    pub frame: FrameLayout,
}

/// Assembler plus the frame conventions the unary selector relies on
pub struct CodeGen {
    asm: Assembler,
    frame: FrameLayout,
    exit: Label,
}

impl CodeGen {
    fn new(frame: FrameLayout) -> Self {
        let mut asm = Assembler::new();
        let exit = asm.new_label();
        for reg in SAVED_REGISTERS {
            asm.emit(Inst::Push(reg));
        }
        asm.emit(Inst::Mov64 { dst: ENGINE_REGISTER, src: Reg::Rdi });
        asm.emit(Inst::Mov64 { dst: FRAME_REGISTER, src: Reg::Rsi });
        CodeGen { asm, frame, exit }
    }

    fn finish(mut self) -> Result<AssembledCode, JitError> {
        self.emit(Inst::Xor32 { dst: Reg::Rax, src: Reg::Rax });
        self.asm.bind(self.exit);
        for reg in SAVED_REGISTERS.iter().rev() {
            self.asm.emit(Inst::Pop(*reg));
        }
        self.asm.emit(Inst::Ret);
        self.asm.finish()
    }

    #[inline]
    pub fn emit(&mut self, inst: Inst) {
        self.asm.emit(inst);
    }

    pub fn new_label(&mut self) -> Label {
        self.asm.new_label()
    }

    pub fn bind(&mut self, label: Label) {
        self.asm.bind(label);
    }

    /// Register backing a register temp
    pub fn register(&self, temp: Temp) -> Reg {
        debug_assert!(temp.is_register());
        TEMP_REGISTERS[temp.index as usize]
    }

    /// A register holding `source` as an unboxed int32, loading into `scratch` if needed
    pub fn to_int32_register(&mut self, source: Temp, scratch: Reg) -> Reg {
        if source.is_register() {
            return self.register(source);
        }
        self.emit(Inst::Load32 {
            dst: scratch,
            base: FRAME_REGISTER,
            disp: disp(source.index),
        });
        scratch
    }

    /// `mov dst, src` unless they already coincide
    pub fn move32(&mut self, src: Reg, dst: Reg) {
        if src != dst {
            self.emit(Inst::Mov32 { dst, src });
        }
    }

    pub fn store_int32(&mut self, reg: Reg, target: Temp) {
        self.store_boxed(reg, RawValue::TAG_INTEGER, disp(target.index));
    }

    pub fn store_bool(&mut self, reg: Reg, target: Temp) {
        self.store_boxed(reg, RawValue::TAG_BOOLEAN, disp(target.index));
    }

    /// Box the low 32 bits of `reg` with `tag` into the frame word at `offset`
    fn store_boxed(&mut self, reg: Reg, tag: u64, offset: i32) {
        self.emit(Inst::Mov32 { dst: Reg::Rax, src: reg });
        self.emit(Inst::MovImm64 { dst: Reg::Rdx, imm: RawValue::tag_bits(tag) });
        self.emit(Inst::Or64 { dst: Reg::Rax, src: Reg::Rdx });
        self.emit(Inst::Store64 { base: FRAME_REGISTER, disp: offset, src: Reg::Rax });
    }

    /// Call `helper` with a pointer to `source`, writing `target`
    pub fn generate_runtime_call(&mut self, helper: RuntimeHelper, source: Temp, target: Temp) {
        let operand = if source.is_register() {
            let reg = self.register(source);
            let tag = match source.ty {
                IrType::Bool => RawValue::TAG_BOOLEAN,
                _ => RawValue::TAG_INTEGER,
            };
            let offset = disp(self.frame.operand_scratch());
            self.store_boxed(reg, tag, offset);
            offset
        } else {
            disp(source.index)
        };
        let result = if target.is_register() {
            disp(self.frame.result_scratch())
        } else {
            disp(target.index)
        };

        self.emit(Inst::Mov64 { dst: Reg::Rdi, src: ENGINE_REGISTER });
        self.emit(Inst::Lea { dst: Reg::Rsi, base: FRAME_REGISTER, disp: result });
        self.emit(Inst::Lea { dst: Reg::Rdx, base: FRAME_REGISTER, disp: operand });
        self.emit(Inst::MovImm64 { dst: Reg::Rax, imm: helper.address() });
        self.emit(Inst::Call(Reg::Rax));
        self.emit(Inst::Test32 { dst: Reg::Rax, src: Reg::Rax });
        self.emit(Inst::Jcc(Cond::NotZero, self.exit));

        if target.is_register() {
            let reg = self.register(target);
            self.emit(Inst::Load32 { dst: reg, base: FRAME_REGISTER, disp: result });
        }
    }
}

/// Check the body against the register conventions
///
/// Register temps carry unboxed `Bool`/`SInt32` values, so only operators
/// whose result type is closed over that (`Not` into `Bool`, `Compl` into
/// `SInt32`) may target one, and a register must be written before it is
/// read.
fn validate(body: &[UnaryStmt]) -> Result<(), JitError> {
    let mut defined = [false; TEMP_REGISTERS.len()];
    for (i, stmt) in body.iter().enumerate() {
        let invalid = |what: String| Err(JitError::InvalidIr(format!("statement {i}: {what}")));
        for temp in [stmt.source, stmt.target] {
            if temp.is_register() && temp.index as usize >= TEMP_REGISTERS.len() {
                return invalid(format!("no register for {temp:?}"));
            }
        }
        let source = stmt.source;
        if source.is_register() {
            if !source.ty.fits_register() {
                return invalid(format!("{source:?} cannot live in a register"));
            }
            if !defined[source.index as usize] {
                return invalid(format!("{source:?} read before it is written"));
            }
        }
        let target = stmt.target;
        if target.is_register() {
            let ok = matches!(
                (stmt.op, target.ty),
                (UnaryOp::Not, IrType::Bool) | (UnaryOp::Compl, IrType::SInt32)
            );
            if !ok {
                return invalid(format!("{} cannot produce {target:?}", stmt.op.name()));
            }
            defined[target.index as usize] = true;
        }
    }
    Ok(())
}

/// Generate code for a body of unary statements
pub fn compile_body(body: &[UnaryStmt]) -> Result<CompiledBody, JitError> {
    validate(body)?;
    let frame = FrameLayout::of(body);
    let mut cg = CodeGen::new(frame);
    for stmt in body {
        Unop::new(&mut cg, stmt.op).generate(stmt.source, stmt.target);
    }
    Ok(CompiledBody {
        code: cg.finish()?,
        frame,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let body = [
            UnaryStmt::new(UnaryOp::Compl, Temp::slot(3, IrType::SInt32), Temp::register(0, IrType::SInt32)),
            UnaryStmt::new(UnaryOp::UMinus, Temp::register(0, IrType::SInt32), Temp::slot(1, IrType::Var)),
        ];
        let frame = FrameLayout::of(&body);
        assert_eq!(frame.slots, 4);
        assert_eq!(frame.words(), 6);
    }

    #[test]
    fn test_prologue_and_epilogue() {
        let body = [UnaryStmt::new(UnaryOp::UPlus, Temp::slot(0, IrType::Var), Temp::slot(1, IrType::Var))];
        let compiled = compile_body(&body).unwrap();
        let insts = &compiled.code.insts;
        assert_eq!(insts[0], Inst::Push(Reg::Rbx));
        assert_eq!(insts[4], Inst::Push(Reg::R15));
        assert_eq!(insts.last(), Some(&Inst::Ret));
        assert_eq!(compiled.code.bytes.first(), Some(&0x53));
        assert_eq!(compiled.code.bytes.last(), Some(&0xC3));
    }

    #[test]
    fn test_validation() {
        let read_undefined = [UnaryStmt::new(
            UnaryOp::Not,
            Temp::register(1, IrType::Bool),
            Temp::slot(0, IrType::Bool),
        )];
        assert!(matches!(compile_body(&read_undefined), Err(JitError::InvalidIr(_))));

        let double_in_register = [UnaryStmt::new(
            UnaryOp::UMinus,
            Temp::slot(0, IrType::SInt32),
            Temp::register(0, IrType::SInt32),
        )];
        assert!(matches!(compile_body(&double_in_register), Err(JitError::InvalidIr(_))));

        let no_such_register = [UnaryStmt::new(
            UnaryOp::Compl,
            Temp::slot(0, IrType::SInt32),
            Temp::register(7, IrType::SInt32),
        )];
        assert!(matches!(compile_body(&no_such_register), Err(JitError::InvalidIr(_))));
    }
}
