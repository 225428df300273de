//! Unary operator selection
//!
//! Selection is driven only by the static types of the temps. Every fast
//! path computes exactly what the generic helper would for the inputs it
//! handles; anything else calls the helper.

use crate::jit::assembler::{Cond, Inst};
use crate::jit::codegen::{CodeGen, SCRATCH_REGISTER};
use crate::jit::helpers::RuntimeHelper;
use crate::jit::ir::{IrType, Temp, UnaryOp};

pub struct Unop<'a> {
    cg: &'a mut CodeGen,
    op: UnaryOp,
}

impl<'a> Unop<'a> {
    pub fn new(cg: &'a mut CodeGen, op: UnaryOp) -> Self {
        Unop { cg, op }
    }

    pub fn generate(&mut self, source: Temp, target: Temp) {
        let helper = match self.op {
            UnaryOp::Not => return self.generate_not(source, target),
            UnaryOp::UMinus => return self.generate_u_minus(source, target),
            UnaryOp::Compl => return self.generate_compl(source, target),
            UnaryOp::UPlus => RuntimeHelper::UPlus,
            UnaryOp::Increment => RuntimeHelper::Increment,
            UnaryOp::Decrement => RuntimeHelper::Decrement,
        };
        self.cg.generate_runtime_call(helper, source, target);
    }

    /// Target register for a fast path: the temp's own register, or scratch
    fn target_register(&self, target: Temp) -> crate::jit::assembler::Reg {
        if target.is_register() {
            self.cg.register(target)
        } else {
            SCRATCH_REGISTER
        }
    }

    /// `-x` for an int32 `x`
    ///
    /// `-0` and `-(-2^31)` are not int32 results, so 0 and `i32::MIN` (the
    /// two values whose low 31 bits are all clear) take the helper.
    fn generate_u_minus(&mut self, source: Temp, target: Temp) {
        if source.ty != IrType::SInt32 || target.is_register() {
            self.cg.generate_runtime_call(RuntimeHelper::UMinus, source, target);
            return;
        }
        let slow = self.cg.new_label();
        let done = self.cg.new_label();
        let reg = SCRATCH_REGISTER;
        let s = self.cg.to_int32_register(source, reg);
        self.cg.move32(s, reg);
        self.cg.emit(Inst::TestImm32 { dst: reg, imm: 0x7FFF_FFFF });
        self.cg.emit(Inst::Jcc(Cond::Zero, slow));
        self.cg.emit(Inst::Neg32(reg));
        self.cg.store_int32(reg, target);
        self.cg.emit(Inst::Jmp(done));
        self.cg.bind(slow);
        self.cg.generate_runtime_call(RuntimeHelper::UMinus, source, target);
        self.cg.bind(done);
    }

    fn generate_not(&mut self, source: Temp, target: Temp) {
        match source.ty {
            IrType::Bool => {
                let t = self.target_register(target);
                let s = self.cg.to_int32_register(source, t);
                self.cg.move32(s, t);
                self.cg.emit(Inst::XorImm32 { dst: t, imm: 1 });
                if !target.is_register() {
                    self.cg.store_bool(t, target);
                }
            }
            IrType::SInt32 => {
                let t = self.target_register(target);
                let s = self.cg.to_int32_register(source, SCRATCH_REGISTER);
                self.cg.emit(Inst::CmpImm32 { dst: s, imm: 0 });
                self.cg.emit(Inst::Sete(t));
                self.cg.emit(Inst::Movzx8 { dst: t, src: t });
                if !target.is_register() {
                    self.cg.store_bool(t, target);
                }
            }
            _ => self.cg.generate_runtime_call(RuntimeHelper::UNot, source, target),
        }
    }

    fn generate_compl(&mut self, source: Temp, target: Temp) {
        if source.ty != IrType::SInt32 {
            self.cg.generate_runtime_call(RuntimeHelper::Complement, source, target);
            return;
        }
        let t = self.target_register(target);
        let s = self.cg.to_int32_register(source, t);
        self.cg.move32(s, t);
        self.cg.emit(Inst::Not32(t));
        if !target.is_register() {
            self.cg.store_int32(t, target);
        }
    }
}
