//! Instruction-level interpreter for generated code
//!
//! Runs an `Inst` list against a frame without mapping anything
//! executable. Helper calls are resolved by address and dispatched to the
//! runtime directly; caller-saved registers are clobbered across calls and
//! callee-saved registers are checked on return.

use rustc_hash::FxHashMap;

use crate::engine::Engine;
use crate::jit::assembler::{Cond, Inst, Reg};
use crate::jit::codegen::SAVED_REGISTERS;
use crate::jit::helpers::{RuntimeHelper, STATUS_EXCEPTION, STATUS_OK};
use crate::value::RawValue;

const FRAME_BASE: u64 = 0x0000_7000_0000_0000;
const ENGINE_TOKEN: u64 = 0x0000_0000_E261_E000;
const CLOBBERED: [Reg; 9] = [
    Reg::Rcx,
    Reg::Rdx,
    Reg::Rsi,
    Reg::Rdi,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
    Reg::Rbp,
];

pub struct Machine {
    regs: [u64; 16],
    zf: bool,
    stack: Vec<u64>,
}

impl Machine {
    pub fn new() -> Self {
        let mut regs = [0; 16];
        for (i, r) in regs.iter_mut().enumerate() {
            *r = 0xDEAD_BEEF_0000_0000 | i as u64;
        }
        Machine {
            regs,
            zf: false,
            stack: Vec::new(),
        }
    }

    fn reg(&self, r: Reg) -> u64 {
        self.regs[r.code() as usize]
    }

    fn set(&mut self, r: Reg, v: u64) {
        self.regs[r.code() as usize] = v;
    }

    fn set32(&mut self, r: Reg, v: u32) {
        self.set(r, v as u64);
        self.zf = v == 0;
    }

    fn word(&self, base: Reg, disp: i32) -> usize {
        let addr = self.reg(base).wrapping_add(disp as i64 as u64);
        assert!(addr >= FRAME_BASE && (addr - FRAME_BASE) % 8 == 0, "bad frame address {addr:#x}");
        ((addr - FRAME_BASE) / 8) as usize
    }

    /// Run the body; returns the status left in `eax`
    pub fn run(&mut self, insts: &[Inst], engine: &mut Engine, frame: &mut [RawValue]) -> u32 {
        let labels: FxHashMap<_, _> = insts
            .iter()
            .enumerate()
            .filter_map(|(i, inst)| match inst {
                Inst::Bind(label) => Some((*label, i)),
                _ => None,
            })
            .collect();
        self.set(Reg::Rdi, ENGINE_TOKEN);
        self.set(Reg::Rsi, FRAME_BASE);
        let saved: Vec<u64> = SAVED_REGISTERS.iter().map(|r| self.reg(*r)).collect();

        let mut pc = 0;
        loop {
            let inst = insts[pc];
            pc += 1;
            match inst {
                Inst::Push(r) => self.stack.push(self.reg(r)),
                Inst::Pop(r) => {
                    let v = self.stack.pop().expect("pop from an empty stack");
                    self.set(r, v);
                }
                Inst::Ret => break,
                Inst::Mov64 { dst, src } => self.set(dst, self.reg(src)),
                Inst::Mov32 { dst, src } => self.set(dst, self.reg(src) as u32 as u64),
                Inst::MovImm64 { dst, imm } => self.set(dst, imm),
                Inst::Load32 { dst, base, disp } => {
                    let v = frame[self.word(base, disp)].0 as u32;
                    self.set(dst, v as u64);
                }
                Inst::Store64 { base, disp, src } => {
                    let index = self.word(base, disp);
                    frame[index] = RawValue(self.reg(src));
                }
                Inst::Lea { dst, base, disp } => {
                    self.set(dst, self.reg(base).wrapping_add(disp as i64 as u64));
                }
                Inst::Or64 { dst, src } => {
                    let v = self.reg(dst) | self.reg(src);
                    self.set(dst, v);
                    self.zf = v == 0;
                }
                Inst::Xor32 { dst, src } => self.set32(dst, self.reg(dst) as u32 ^ self.reg(src) as u32),
                Inst::XorImm32 { dst, imm } => self.set32(dst, self.reg(dst) as u32 ^ imm),
                Inst::Test32 { dst, src } => self.zf = self.reg(dst) as u32 & self.reg(src) as u32 == 0,
                Inst::TestImm32 { dst, imm } => self.zf = self.reg(dst) as u32 & imm == 0,
                Inst::CmpImm32 { dst, imm } => self.zf = self.reg(dst) as u32 == imm,
                Inst::Neg32(r) => self.set32(r, (self.reg(r) as u32).wrapping_neg()),
                Inst::Not32(r) => self.set(r, !(self.reg(r) as u32) as u64),
                Inst::Sete(r) => self.set(r, (self.reg(r) & !0xFF) | self.zf as u64),
                Inst::Movzx8 { dst, src } => self.set(dst, self.reg(src) & 0xFF),
                Inst::Call(r) => {
                    let helper = RuntimeHelper::from_address(self.reg(r)).expect("call to an unknown address");
                    assert_eq!(self.reg(Reg::Rdi), ENGINE_TOKEN, "engine not passed to helper");
                    let result = self.word(Reg::Rsi, 0);
                    let operand = frame[self.word(Reg::Rdx, 0)].decode();
                    let status = match helper.apply(engine, operand) {
                        Ok(v) => {
                            frame[result] = RawValue::encode(v);
                            STATUS_OK
                        }
                        Err(_) => {
                            frame[result] = RawValue::UNDEFINED;
                            STATUS_EXCEPTION
                        }
                    };
                    for r in CLOBBERED {
                        self.set(r, 0xBAD0_BAD0_BAD0_BAD0);
                    }
                    self.set(Reg::Rax, status as u64);
                }
                Inst::Jcc(cond, label) => {
                    let taken = match cond {
                        Cond::Zero => self.zf,
                        Cond::NotZero => !self.zf,
                    };
                    if taken {
                        pc = labels[&label];
                    }
                }
                Inst::Jmp(label) => pc = labels[&label],
                Inst::Bind(_) => {}
            }
        }

        assert!(self.stack.is_empty(), "unbalanced stack");
        for (r, v) in SAVED_REGISTERS.iter().zip(saved) {
            assert_eq!(self.reg(*r), v, "{r:?} not restored");
        }
        self.reg(Reg::Rax) as u32
    }
}
