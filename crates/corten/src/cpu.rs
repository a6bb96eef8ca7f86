//! The Corten-32 processor: register file, PSTATE, and the cycle-stepped
//! fetch/decode/execute loop.
//!
//! Each step fetches the word at PC, advances PC by 4 before executing,
//! tests the instruction's condition field against PSTATE (a false
//! predicate makes the instruction a no-op), applies the barrel shifter to
//! register second operands, executes, and updates the N/Z/C/V flags when
//! the S bit asks for it.  Faults stop the loop and surface to the caller.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Fault;
use crate::isa::{
    bits, branch_offset, cond_of, set_bit, test_bit, C_FLAG, FormatO, FormatO2, N_FLAG,
    NUM_REGS, Opcode, Operand2, ShiftKind, V_FLAG, Z_FLAG, LR,
};
use crate::mem::{MemoryRegion, SystemBus};

/// The emulator: sixteen 32-bit registers, a program counter, the PSTATE
/// word, and the system bus.
#[derive(Debug, Clone)]
pub struct Emulator32 {
    regs: [u32; NUM_REGS],
    pc: u32,
    pstate: u32,
    /// The memory bus; exclusively owned, but open for drivers and tests
    /// to seed images and inspect side effects.
    pub bus: SystemBus,
    pub(crate) console: Vec<String>,
    pub(crate) halted: bool,
}

impl Emulator32 {
    /// A processor wired to the given bus, with all registers, PC, and
    /// PSTATE cleared.
    #[must_use]
    pub fn new(bus: SystemBus) -> Self {
        Self {
            regs: [0; NUM_REGS],
            pc: 0,
            pstate: 0,
            bus,
            console: Vec::new(),
            halted: false,
        }
    }

    /// Convenience construction with a single 64 KiB RAM region at 0.
    #[must_use]
    pub fn with_default_memory() -> Self {
        let mut bus = SystemBus::new();
        bus.add_region(MemoryRegion::ram(0x0000, 0xFFFF));
        Self::new(bus)
    }

    /// Read a general register.
    #[must_use]
    pub fn read_reg(&self, id: u8) -> u32 {
        self.regs[(id as usize) % NUM_REGS]
    }

    /// Write a general register.
    pub fn write_reg(&mut self, id: u8, value: u32) {
        self.regs[(id as usize) % NUM_REGS] = value;
    }

    /// Current program counter.
    #[must_use]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Set the program counter.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// The packed PSTATE word.
    #[must_use]
    pub fn pstate(&self) -> u32 {
        self.pstate
    }

    /// Test one PSTATE flag bit ([`N_FLAG`], [`Z_FLAG`], [`C_FLAG`],
    /// [`V_FLAG`]).
    #[must_use]
    pub fn flag(&self, bit: u32) -> bool {
        test_bit(self.pstate, bit)
    }

    /// Set all four condition flags at once.
    pub fn set_nzcv(&mut self, n: bool, z: bool, c: bool, v: bool) {
        let mut p = self.pstate;
        p = set_bit(p, N_FLAG, n);
        p = set_bit(p, Z_FLAG, z);
        p = set_bit(p, C_FLAG, c);
        p = set_bit(p, V_FLAG, v);
        self.pstate = p;
    }

    /// Whether a `hlt` (or `emu_err`) stopped the machine.
    #[must_use]
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Drain the console transcript produced by SWI print services.
    pub fn take_console(&mut self) -> Vec<String> {
        core::mem::take(&mut self.console)
    }

    /// Load a flat binary of big-endian instruction words at `base` and
    /// point PC at it.
    ///
    /// # Errors
    ///
    /// Propagates bus faults if the image does not fit its region.
    pub fn load_image(&mut self, image: &[u8], base: u32) -> Result<(), Fault> {
        self.bus.load_image(image, base)?;
        self.pc = base;
        Ok(())
    }

    /// Execute at most `steps` instructions; returns how many ran.
    ///
    /// The loop stops early when the machine halts.  A fault aborts the
    /// loop and is surfaced to the caller with PC still pointing past the
    /// faulting instruction.
    ///
    /// # Errors
    ///
    /// The first [`Fault`] raised by a fetch, execute, or SWI service.
    pub fn run(&mut self, steps: u32) -> Result<u32, Fault> {
        let mut executed = 0;
        while executed < steps && !self.halted {
            let fetch_pc = self.pc;
            let word = self.bus.read_word(fetch_pc)?;
            self.pc = self.pc.wrapping_add(4);
            self.step(word, fetch_pc)?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Decode and execute one fetched word.
    fn step(&mut self, word: u32, fetch_pc: u32) -> Result<(), Fault> {
        let op = Opcode::from_bits(bits(word, 26, 6)).ok_or(Fault::InvalidOpcode {
            word,
            pc: fetch_pc,
        })?;

        // Conditional execution: a false predicate is a no-op.
        if !cond_of(word).holds(self.pstate) {
            return Ok(());
        }

        match op {
            Opcode::Hlt => {
                self.halted = true;
                Ok(())
            }

            Opcode::Add
            | Opcode::Sub
            | Opcode::Rsb
            | Opcode::Adc
            | Opcode::Sbc
            | Opcode::Rsc
            | Opcode::Cmp
            | Opcode::Cmn => self.exec_arith(op, word),

            Opcode::And
            | Opcode::Orr
            | Opcode::Eor
            | Opcode::Bic
            | Opcode::Mov
            | Opcode::Mvn
            | Opcode::Tst
            | Opcode::Teq => {
                self.exec_logical(op, word);
                Ok(())
            }

            Opcode::Mul => {
                self.exec_mul(word);
                Ok(())
            }

            Opcode::Umull | Opcode::Smull => {
                self.exec_mull(op, word);
                Ok(())
            }

            Opcode::Ldr | Opcode::Ldrb | Opcode::Ldrh | Opcode::Str | Opcode::Strb
            | Opcode::Strh => self.exec_mem(op, word),

            Opcode::B | Opcode::Bl => {
                let offset = branch_offset(word);
                if op == Opcode::Bl {
                    self.regs[LR as usize] = self.pc;
                }
                self.pc = self.pc.wrapping_add((offset as u32) << 2);
                Ok(())
            }

            Opcode::Bx => {
                let f = FormatO::decode(word);
                self.pc = self.regs[f.rd as usize];
                Ok(())
            }

            Opcode::Swi => self.exec_swi(word),
        }
    }

    /// Resolve a second operand through the barrel shifter, producing the
    /// value and the shifter carry-out.
    fn operand2(&self, op2: Operand2) -> (u32, bool) {
        match op2 {
            Operand2::Imm(imm) => (imm, self.flag(C_FLAG)),
            Operand2::Reg { rm, shift, amount } => {
                Self::barrel_shift(shift, self.regs[rm as usize], amount, self.flag(C_FLAG))
            }
        }
    }

    /// Pre-ALU shift of the register operand.  Amount 0 passes the value
    /// through with the current carry as the shifter carry-out.
    fn barrel_shift(kind: ShiftKind, value: u32, amount: u8, carry_in: bool) -> (u32, bool) {
        if amount == 0 {
            return (value, carry_in);
        }
        let amount = u32::from(amount);
        match kind {
            ShiftKind::Lsl => (value << amount, test_bit(value, 32 - amount)),
            ShiftKind::Lsr => (value >> amount, test_bit(value, amount - 1)),
            ShiftKind::Asr => (
                ((value as i32) >> amount) as u32,
                test_bit(value, amount - 1),
            ),
            ShiftKind::Ror => {
                let rotated = value.rotate_right(amount);
                (rotated, test_bit(rotated, 31))
            }
        }
    }

    /// Additive ALU group.  Subtraction is modeled as `a + !b + 1`, so the
    /// carry-out is the not-borrow; `rsc` keeps its own borrow convention.
    fn exec_arith(&mut self, op: Opcode, word: u32) -> Result<(), Fault> {
        let f = FormatO::decode(word);
        let (op2, _) = self.operand2(f.op2);
        let rn = self.regs[f.rn as usize];
        let c = u32::from(self.flag(C_FLAG));

        let (result, carry, overflow) = match op {
            Opcode::Add | Opcode::Cmn => Self::add_with_carry(rn, op2, 0),
            Opcode::Adc => Self::add_with_carry(rn, op2, c),
            Opcode::Sub | Opcode::Cmp => Self::add_with_carry(rn, !op2, 1),
            Opcode::Sbc => Self::add_with_carry(rn, !op2, c),
            Opcode::Rsb => Self::add_with_carry(op2, !rn, 1),
            Opcode::Rsc => Self::rsc(op2, rn, c),
            _ => unreachable!("non-arithmetic opcode in exec_arith"),
        };

        let compare_only = matches!(op, Opcode::Cmp | Opcode::Cmn);
        if !compare_only {
            self.regs[f.rd as usize] = result;
        }
        if f.s || compare_only {
            self.set_nzcv(test_bit(result, 31), result == 0, carry, overflow);
        }
        Ok(())
    }

    /// `a + b + carry_in` with carry-out and signed overflow.
    fn add_with_carry(a: u32, b: u32, carry_in: u32) -> (u32, bool, bool) {
        let wide = u64::from(a) + u64::from(b) + u64::from(carry_in);
        let result = wide as u32;
        let carry = wide >> 32 != 0;
        let signed = i64::from(a as i32) + i64::from(b as i32) + i64::from(carry_in);
        let overflow = signed != i64::from(result as i32);
        (result, carry, overflow)
    }

    /// Reverse subtract with carry: `op2 - rn - C`.  The carry flag
    /// reports the borrow itself (set iff `op2 < rn + C` unsigned).
    fn rsc(op2: u32, rn: u32, c: u32) -> (u32, bool, bool) {
        let wide = u64::from(op2) + u64::from(!rn) + u64::from(1 - c);
        let result = wide as u32;
        let borrow = u64::from(op2) < u64::from(rn) + u64::from(c);
        let signed = i64::from(op2 as i32) - i64::from(rn as i32) - i64::from(c);
        let overflow = signed != i64::from(result as i32);
        (result, borrow, overflow)
    }

    /// Logical group: N/Z from the result, C from the shifter carry-out,
    /// V untouched.
    fn exec_logical(&mut self, op: Opcode, word: u32) {
        let f = FormatO::decode(word);
        let (op2, shifter_carry) = self.operand2(f.op2);
        let rn = self.regs[f.rn as usize];

        let result = match op {
            Opcode::And | Opcode::Tst => rn & op2,
            Opcode::Orr => rn | op2,
            Opcode::Eor | Opcode::Teq => rn ^ op2,
            Opcode::Bic => rn & !op2,
            Opcode::Mov => op2,
            Opcode::Mvn => !op2,
            _ => unreachable!("non-logical opcode in exec_logical"),
        };

        let compare_only = matches!(op, Opcode::Tst | Opcode::Teq);
        if !compare_only {
            self.regs[f.rd as usize] = result;
        }
        if f.s || compare_only {
            let mut p = self.pstate;
            p = set_bit(p, N_FLAG, test_bit(result, 31));
            p = set_bit(p, Z_FLAG, result == 0);
            p = set_bit(p, C_FLAG, shifter_carry);
            self.pstate = p;
        }
    }

    /// 32-bit multiply; keeps the low word, N/Z from it, C/V untouched.
    fn exec_mul(&mut self, word: u32) {
        let f = FormatO::decode(word);
        let (op2, _) = self.operand2(f.op2);
        let result = self.regs[f.rn as usize].wrapping_mul(op2);
        self.regs[f.rd as usize] = result;
        if f.s {
            let mut p = self.pstate;
            p = set_bit(p, N_FLAG, test_bit(result, 31));
            p = set_bit(p, Z_FLAG, result == 0);
            self.pstate = p;
        }
    }

    /// Extended multiplies: 64-bit product split across `rd_lo`/`rd_hi`.
    /// With S set, N mirrors bit 63 and Z the whole product; C and V are
    /// preserved.
    fn exec_mull(&mut self, op: Opcode, word: u32) {
        let f = FormatO2::decode(word);
        let rn = self.regs[f.rn as usize];
        let rm = self.regs[f.rm as usize];
        let product: u64 = match op {
            Opcode::Umull => u64::from(rn) * u64::from(rm),
            Opcode::Smull => (i64::from(rn as i32) * i64::from(rm as i32)) as u64,
            _ => unreachable!("non-multiply opcode in exec_mull"),
        };
        self.regs[f.rd_lo as usize] = product as u32;
        self.regs[f.rd_hi as usize] = (product >> 32) as u32;
        if f.s {
            let mut p = self.pstate;
            p = set_bit(p, N_FLAG, product >> 63 != 0);
            p = set_bit(p, Z_FLAG, product == 0);
            self.pstate = p;
        }
    }

    /// Loads and stores: address = rn + operand2.
    fn exec_mem(&mut self, op: Opcode, word: u32) -> Result<(), Fault> {
        let f = FormatO::decode(word);
        let (op2, _) = self.operand2(f.op2);
        let addr = self.regs[f.rn as usize].wrapping_add(op2);
        match op {
            Opcode::Ldr => self.regs[f.rd as usize] = self.bus.read(addr, 4)?,
            Opcode::Ldrh => self.regs[f.rd as usize] = self.bus.read(addr, 2)?,
            Opcode::Ldrb => self.regs[f.rd as usize] = self.bus.read(addr, 1)?,
            Opcode::Str => self.bus.write(addr, self.regs[f.rd as usize], 4)?,
            Opcode::Strh => self.bus.write(addr, self.regs[f.rd as usize], 2)?,
            Opcode::Strb => self.bus.write(addr, self.regs[f.rd as usize], 1)?,
            _ => unreachable!("non-memory opcode in exec_mem"),
        }
        Ok(())
    }
}
