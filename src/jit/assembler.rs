//! Minimal x86-64 assembler
//!
//! Instructions are collected as `Inst` values and encoded in two passes:
//! the first fixes every instruction's offset (all branches use rel32, so
//! sizes do not depend on targets), the second writes the bytes.

use crate::error::JitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Reg {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    const fn low(self) -> u8 {
        self.code() & 7
    }

    #[inline]
    const fn ext(self) -> u8 {
        self.code() >> 3
    }

    /// Needs a REX prefix to name its low byte (spl, bpl, sil, dil, r8b..)
    #[inline]
    const fn byte_needs_rex(self) -> bool {
        self.code() >= 4
    }

    /// DWARF register number
    pub const fn dwarf(self) -> u8 {
        match self {
            Reg::Rax => 0,
            Reg::Rdx => 1,
            Reg::Rcx => 2,
            Reg::Rbx => 3,
            Reg::Rsi => 4,
            Reg::Rdi => 5,
            Reg::Rbp => 6,
            Reg::Rsp => 7,
            other => other.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Zero,
    NotZero,
}

impl Cond {
    const fn code(self) -> u8 {
        match self {
            Cond::Zero => 0x4,
            Cond::NotZero => 0x5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// One machine instruction; 32-bit forms zero the upper half of the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    Push(Reg),
    Pop(Reg),
    Ret,
    /// `mov dst, src` (64-bit)
    Mov64 { dst: Reg, src: Reg },
    /// `mov dst, src` (32-bit)
    Mov32 { dst: Reg, src: Reg },
    /// `movabs dst, imm`
    MovImm64 { dst: Reg, imm: u64 },
    /// `mov dst32, [base + disp]`
    Load32 { dst: Reg, base: Reg, disp: i32 },
    /// `mov [base + disp], src64`
    Store64 { base: Reg, disp: i32, src: Reg },
    /// `lea dst, [base + disp]`
    Lea { dst: Reg, base: Reg, disp: i32 },
    /// `or dst, src` (64-bit)
    Or64 { dst: Reg, src: Reg },
    /// `xor dst, src` (32-bit)
    Xor32 { dst: Reg, src: Reg },
    XorImm32 { dst: Reg, imm: u32 },
    Test32 { dst: Reg, src: Reg },
    TestImm32 { dst: Reg, imm: u32 },
    CmpImm32 { dst: Reg, imm: u32 },
    Neg32(Reg),
    Not32(Reg),
    /// `sete dst8`
    Sete(Reg),
    /// `movzx dst32, src8`
    Movzx8 { dst: Reg, src: Reg },
    /// `call reg`
    Call(Reg),
    Jcc(Cond, Label),
    Jmp(Label),
    Bind(Label),
}

/// Encoded machine code plus the instruction list it came from
#[derive(Debug, Clone)]
pub struct AssembledCode {
    pub bytes: Vec<u8>,
    pub insts: Vec<Inst>,
}

#[derive(Debug, Default)]
pub struct Assembler {
    insts: Vec<Inst>,
    labels: u32,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;
        label
    }

    #[inline]
    pub fn emit(&mut self, inst: Inst) {
        self.insts.push(inst);
    }

    pub fn bind(&mut self, label: Label) {
        self.emit(Inst::Bind(label));
    }

    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// Encode every instruction, resolving labels
    pub fn finish(self) -> Result<AssembledCode, JitError> {
        let mut targets: Vec<Option<usize>> = vec![None; self.labels as usize];
        let mut scratch = Vec::with_capacity(16);
        let mut offset = 0;
        for inst in &self.insts {
            if let Inst::Bind(label) = inst {
                targets[label.0 as usize] = Some(offset);
            }
            scratch.clear();
            encode(&mut scratch, *inst, |_| Some(0))?;
            offset += scratch.len();
        }

        let mut bytes = Vec::with_capacity(offset);
        for inst in &self.insts {
            encode(&mut bytes, *inst, |label| targets[label.0 as usize])?;
        }
        debug_assert_eq!(bytes.len(), offset);
        Ok(AssembledCode {
            bytes,
            insts: self.insts,
        })
    }
}

#[inline]
const fn rex(w: bool, r: u8, x: u8, b: u8) -> u8 {
    0x40 | ((w as u8) << 3) | (r << 2) | (x << 1) | b
}

#[inline]
const fn modrm_reg(reg: u8, rm: Reg) -> u8 {
    0xC0 | ((reg & 7) << 3) | rm.low()
}

/// ModRM (+SIB) and disp32 for `[base + disp]`
fn mem_operand(out: &mut Vec<u8>, reg: Reg, base: Reg, disp: i32) {
    out.push(0x80 | (reg.low() << 3) | base.low());
    if base.low() == Reg::Rsp.low() {
        // rsp/r12 as base needs a SIB byte
        out.push(0x24);
    }
    out.extend_from_slice(&disp.to_le_bytes());
}

/// Optional REX for 32-bit forms
fn rex_opt(out: &mut Vec<u8>, r: u8, b: u8) {
    if r | b != 0 {
        out.push(rex(false, r, 0, b));
    }
}

fn rel32(out: &mut Vec<u8>, target: Option<usize>) -> Result<(), JitError> {
    let target = target.ok_or_else(|| JitError::InvalidIr("branch to an unbound label".to_string()))?;
    let next = out.len() + 4;
    let rel = i32::try_from(target as i64 - next as i64)
        .map_err(|_| JitError::InvalidIr("branch displacement overflow".to_string()))?;
    out.extend_from_slice(&rel.to_le_bytes());
    Ok(())
}

fn group_f7(out: &mut Vec<u8>, ext: u8, dst: Reg) {
    rex_opt(out, 0, dst.ext());
    out.push(0xF7);
    out.push(modrm_reg(ext, dst));
}

fn group_81(out: &mut Vec<u8>, ext: u8, dst: Reg, imm: u32) {
    rex_opt(out, 0, dst.ext());
    out.push(0x81);
    out.push(modrm_reg(ext, dst));
    out.extend_from_slice(&imm.to_le_bytes());
}

fn encode(
    out: &mut Vec<u8>,
    inst: Inst,
    resolve: impl Fn(Label) -> Option<usize>,
) -> Result<(), JitError> {
    match inst {
        Inst::Push(r) => {
            rex_opt(out, 0, r.ext());
            out.push(0x50 + r.low());
        }
        Inst::Pop(r) => {
            rex_opt(out, 0, r.ext());
            out.push(0x58 + r.low());
        }
        Inst::Ret => out.push(0xC3),
        Inst::Mov64 { dst, src } => {
            out.extend_from_slice(&[rex(true, src.ext(), 0, dst.ext()), 0x89, modrm_reg(src.code(), dst)]);
        }
        Inst::Mov32 { dst, src } => {
            rex_opt(out, src.ext(), dst.ext());
            out.extend_from_slice(&[0x89, modrm_reg(src.code(), dst)]);
        }
        Inst::MovImm64 { dst, imm } => {
            out.extend_from_slice(&[rex(true, 0, 0, dst.ext()), 0xB8 + dst.low()]);
            out.extend_from_slice(&imm.to_le_bytes());
        }
        Inst::Load32 { dst, base, disp } => {
            rex_opt(out, dst.ext(), base.ext());
            out.push(0x8B);
            mem_operand(out, dst, base, disp);
        }
        Inst::Store64 { base, disp, src } => {
            out.extend_from_slice(&[rex(true, src.ext(), 0, base.ext()), 0x89]);
            mem_operand(out, src, base, disp);
        }
        Inst::Lea { dst, base, disp } => {
            out.extend_from_slice(&[rex(true, dst.ext(), 0, base.ext()), 0x8D]);
            mem_operand(out, dst, base, disp);
        }
        Inst::Or64 { dst, src } => {
            out.extend_from_slice(&[rex(true, src.ext(), 0, dst.ext()), 0x09, modrm_reg(src.code(), dst)]);
        }
        Inst::Xor32 { dst, src } => {
            rex_opt(out, src.ext(), dst.ext());
            out.extend_from_slice(&[0x31, modrm_reg(src.code(), dst)]);
        }
        Inst::Test32 { dst, src } => {
            rex_opt(out, src.ext(), dst.ext());
            out.extend_from_slice(&[0x85, modrm_reg(src.code(), dst)]);
        }
        Inst::XorImm32 { dst, imm } => group_81(out, 6, dst, imm),
        Inst::CmpImm32 { dst, imm } => group_81(out, 7, dst, imm),
        Inst::TestImm32 { dst, imm } => {
            group_f7(out, 0, dst);
            out.extend_from_slice(&imm.to_le_bytes());
        }
        Inst::Neg32(r) => group_f7(out, 3, r),
        Inst::Not32(r) => group_f7(out, 2, r),
        Inst::Sete(r) => {
            if r.byte_needs_rex() {
                out.push(rex(false, 0, 0, r.ext()));
            }
            out.extend_from_slice(&[0x0F, 0x94, modrm_reg(0, r)]);
        }
        Inst::Movzx8 { dst, src } => {
            if dst.ext() != 0 || src.byte_needs_rex() {
                out.push(rex(false, dst.ext(), 0, src.ext()));
            }
            out.extend_from_slice(&[0x0F, 0xB6, modrm_reg(dst.code(), src)]);
        }
        Inst::Call(r) => {
            rex_opt(out, 0, r.ext());
            out.extend_from_slice(&[0xFF, modrm_reg(2, r)]);
        }
        Inst::Jcc(cond, label) => {
            out.extend_from_slice(&[0x0F, 0x80 | cond.code()]);
            rel32(out, resolve(label))?;
        }
        Inst::Jmp(label) => {
            out.push(0xE9);
            rel32(out, resolve(label))?;
        }
        Inst::Bind(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(inst: Inst) -> Vec<u8> {
        let mut out = Vec::new();
        encode(&mut out, inst, |_| Some(0)).unwrap();
        out
    }

    #[test]
    fn test_encodings() {
        assert_eq!(bytes(Inst::Push(Reg::Rbx)), [0x53]);
        assert_eq!(bytes(Inst::Push(Reg::R12)), [0x41, 0x54]);
        assert_eq!(bytes(Inst::Pop(Reg::R15)), [0x41, 0x5F]);
        assert_eq!(bytes(Inst::Mov64 { dst: Reg::Rbx, src: Reg::Rdi }), [0x48, 0x89, 0xFB]);
        assert_eq!(bytes(Inst::Mov64 { dst: Reg::R12, src: Reg::Rsi }), [0x49, 0x89, 0xF4]);
        assert_eq!(bytes(Inst::Mov32 { dst: Reg::Rax, src: Reg::Rcx }), [0x89, 0xC8]);
        assert_eq!(
            bytes(Inst::Load32 { dst: Reg::Rcx, base: Reg::R12, disp: 8 }),
            [0x41, 0x8B, 0x8C, 0x24, 0x08, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            bytes(Inst::Lea { dst: Reg::Rdx, base: Reg::R12, disp: 16 }),
            [0x49, 0x8D, 0x94, 0x24, 0x10, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            bytes(Inst::Store64 { base: Reg::R12, disp: 0, src: Reg::Rax }),
            [0x49, 0x89, 0x84, 0x24, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(bytes(Inst::Or64 { dst: Reg::Rax, src: Reg::Rdx }), [0x48, 0x09, 0xD0]);
        assert_eq!(bytes(Inst::Xor32 { dst: Reg::Rax, src: Reg::Rax }), [0x31, 0xC0]);
        assert_eq!(bytes(Inst::Test32 { dst: Reg::Rax, src: Reg::Rax }), [0x85, 0xC0]);
        assert_eq!(bytes(Inst::Neg32(Reg::Rcx)), [0xF7, 0xD9]);
        assert_eq!(bytes(Inst::Not32(Reg::Rcx)), [0xF7, 0xD1]);
        assert_eq!(bytes(Inst::Not32(Reg::R13)), [0x41, 0xF7, 0xD5]);
        assert_eq!(bytes(Inst::XorImm32 { dst: Reg::Rcx, imm: 1 }), [0x81, 0xF1, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(
            bytes(Inst::TestImm32 { dst: Reg::Rcx, imm: 0x7FFF_FFFF }),
            [0xF7, 0xC1, 0xFF, 0xFF, 0xFF, 0x7F]
        );
        assert_eq!(bytes(Inst::CmpImm32 { dst: Reg::Rcx, imm: 0 }), [0x81, 0xF9, 0, 0, 0, 0]);
        assert_eq!(bytes(Inst::Sete(Reg::Rcx)), [0x0F, 0x94, 0xC1]);
        assert_eq!(bytes(Inst::Sete(Reg::R14)), [0x41, 0x0F, 0x94, 0xC6]);
        assert_eq!(bytes(Inst::Movzx8 { dst: Reg::Rcx, src: Reg::Rcx }), [0x0F, 0xB6, 0xC9]);
        assert_eq!(bytes(Inst::Movzx8 { dst: Reg::R14, src: Reg::R14 }), [0x45, 0x0F, 0xB6, 0xF6]);
        assert_eq!(bytes(Inst::Call(Reg::Rax)), [0xFF, 0xD0]);
        let mut movabs = vec![0x48, 0xBA];
        movabs.extend_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(bytes(Inst::MovImm64 { dst: Reg::Rdx, imm: 0x1122_3344_5566_7788 }), movabs);
    }

    #[test]
    fn test_label_patching() {
        let mut asm = Assembler::new();
        let skip = asm.new_label();
        let back = asm.new_label();
        asm.bind(back);
        asm.emit(Inst::Jcc(Cond::Zero, skip));
        asm.emit(Inst::Ret);
        asm.bind(skip);
        asm.emit(Inst::Jmp(back));
        let code = asm.finish().unwrap();
        // jz +1 over the ret, then jmp back to offset 0 from offset 12
        assert_eq!(
            code.bytes,
            [0x0F, 0x84, 0x01, 0x00, 0x00, 0x00, 0xC3, 0xE9, 0xF4, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_unbound_label() {
        let mut asm = Assembler::new();
        let nowhere = asm.new_label();
        asm.emit(Inst::Jmp(nowhere));
        assert!(matches!(asm.finish(), Err(JitError::InvalidIr(_))));
    }
}
