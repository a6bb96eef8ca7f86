//! Software-interrupt services.
//!
//! `swi` reads the request number from the [`NR`](crate::isa::NR) register
//! and up to six arguments from `x0..x5`.  Print services append lines to
//! the emulator's console transcript (drained with
//! [`Emulator32::take_console`]); the driver decides where that text goes.
//! Assertion services raise [`Fault::AssertionFailed`] and halt execution.
//!
//! | id   | service     | arguments                                  |
//! |------|-------------|--------------------------------------------|
//! | 1000 | emu_print   | —                                          |
//! | 1001 | emu_printr  | reg_id                                     |
//! | 1002 | emu_printm  | addr, size, little_endian                  |
//! | 1003 | emu_printp  | —                                          |
//! | 1010 | emu_assertr | reg_id, min, max                           |
//! | 1011 | emu_assertm | addr, size, little_endian, min, max        |
//! | 1012 | emu_assertp | pstate_bit, expected                       |
//! | 1020 | emu_log     | addr of NUL-terminated string              |
//! | 1021 | emu_err     | addr of NUL-terminated string; halts       |
//!
//! Higher ids are reserved for host file/IO syscalls.

use alloc::format;
use alloc::string::String;

use crate::cpu::Emulator32;
use crate::error::Fault;
use crate::isa::{test_bit, C_FLAG, N_FLAG, NR, NUM_REGS, V_FLAG, Z_FLAG};

/// Guard against scanning forever when a string argument has no NUL.
const MAX_STRING_LEN: u32 = 1 << 16;

impl Emulator32 {
    /// Dispatch a software interrupt.  The condition field was already
    /// tested by the main loop.
    pub(crate) fn exec_swi(&mut self, _word: u32) -> Result<(), Fault> {
        let id = self.read_reg(NR);
        let a0 = self.read_reg(0);
        let a1 = self.read_reg(1);
        let a2 = self.read_reg(2);
        let a3 = self.read_reg(3);
        let a4 = self.read_reg(4);

        match id {
            1000 => {
                self.emu_print();
                Ok(())
            }
            1001 => self.emu_printr(a0),
            1002 => self.emu_printm(a0, a1, a2 != 0),
            1003 => {
                self.emu_printp();
                Ok(())
            }
            1010 => self.emu_assertr(a0, a1, a2),
            1011 => self.emu_assertm(a0, a1, a2 != 0, a3, a4),
            1012 => self.emu_assertp(a0, a1 != 0),
            1020 => self.emu_log(a0),
            1021 => self.emu_err(a0),
            _ => Err(Fault::InvalidSyscall { id }),
        }
    }

    fn checked_reg(&self, id: u32) -> Result<u32, Fault> {
        if id >= NUM_REGS as u32 {
            return Err(Fault::InvalidRegister { id });
        }
        Ok(self.read_reg(id as u8))
    }

    /// Assemble `size` bytes at `addr`; with `little_endian` the byte at
    /// `addr` is least significant.
    fn read_span(&self, addr: u32, size: u32, little_endian: bool) -> Result<u32, Fault> {
        let mut value: u32 = 0;
        if little_endian {
            for i in (0..size).rev() {
                value = (value << 8) | self.bus.read_byte(addr.wrapping_add(i))?;
            }
        } else {
            for i in 0..size {
                value = (value << 8) | self.bus.read_byte(addr.wrapping_add(i))?;
            }
        }
        Ok(value)
    }

    fn read_cstring(&self, addr: u32) -> Result<String, Fault> {
        let mut text = String::new();
        let mut offset = 0;
        loop {
            let byte = self.bus.read_byte(addr.wrapping_add(offset))?;
            if byte == 0 {
                return Ok(text);
            }
            text.push(byte as u8 as char);
            offset += 1;
            if offset > MAX_STRING_LEN {
                return Err(Fault::AssertionFailed {
                    msg: format!("unterminated string at {addr:#010x}"),
                });
            }
        }
    }

    fn pstate_line(&self) -> String {
        format!(
            "PSTATE: N={},Z={},C={},V={}",
            u32::from(self.flag(N_FLAG)),
            u32::from(self.flag(Z_FLAG)),
            u32::from(self.flag(C_FLAG)),
            u32::from(self.flag(V_FLAG)),
        )
    }

    /// 1000: dump registers, PC, and PSTATE.
    fn emu_print(&mut self) {
        for id in 0..NUM_REGS as u8 {
            let line = format!("REG: x{} = {:#010x}", id, self.read_reg(id));
            self.console.push(line);
        }
        let line = format!("PC: {:#010x}", self.pc());
        self.console.push(line);
        let pstate = self.pstate_line();
        self.console.push(pstate);
    }

    /// 1001: print one register.
    fn emu_printr(&mut self, reg_id: u32) -> Result<(), Fault> {
        let value = self.checked_reg(reg_id)?;
        self.console.push(format!("REG: x{reg_id} = {value:#010x}"));
        Ok(())
    }

    /// 1002: print a value in memory.
    fn emu_printm(&mut self, addr: u32, size: u32, little_endian: bool) -> Result<(), Fault> {
        let value = self.read_span(addr, size, little_endian)?;
        self.console.push(format!("MEM: {addr:#010x} = {value:#x}"));
        Ok(())
    }

    /// 1003: print the condition flags.
    fn emu_printp(&mut self) {
        let line = self.pstate_line();
        self.console.push(line);
    }

    /// 1010: halt unless `min <= reg <= max` (unsigned).
    fn emu_assertr(&mut self, reg_id: u32, min: u32, max: u32) -> Result<(), Fault> {
        let value = self.checked_reg(reg_id)?;
        if value < min || value > max {
            return Err(Fault::AssertionFailed {
                msg: format!("expected x{reg_id} in [{min}, {max}], got {value}"),
            });
        }
        Ok(())
    }

    /// 1011: halt unless the memory value is within bounds (unsigned).
    fn emu_assertm(
        &mut self,
        addr: u32,
        size: u32,
        little_endian: bool,
        min: u32,
        max: u32,
    ) -> Result<(), Fault> {
        let value = self.read_span(addr, size, little_endian)?;
        if value < min || value > max {
            return Err(Fault::AssertionFailed {
                msg: format!(
                    "expected value at {addr:#010x} in [{min}, {max}], got {value}"
                ),
            });
        }
        Ok(())
    }

    /// 1012: halt unless the named PSTATE bit has the expected value.
    fn emu_assertp(&mut self, pstate_bit: u32, expected: bool) -> Result<(), Fault> {
        if pstate_bit > 31 {
            return Err(Fault::InvalidRegister { id: pstate_bit });
        }
        let value = test_bit(self.pstate(), pstate_bit);
        if value != expected {
            return Err(Fault::AssertionFailed {
                msg: format!(
                    "expected PSTATE bit {pstate_bit} to be {}, got {}",
                    u32::from(expected),
                    u32::from(value)
                ),
            });
        }
        Ok(())
    }

    /// 1020: print a NUL-terminated string from memory.
    fn emu_log(&mut self, addr: u32) -> Result<(), Fault> {
        let text = self.read_cstring(addr)?;
        self.console.push(text);
        Ok(())
    }

    /// 1021: print a NUL-terminated error string and halt.
    fn emu_err(&mut self, addr: u32) -> Result<(), Fault> {
        let text = self.read_cstring(addr)?;
        self.console.push(text);
        self.halted = true;
        Ok(())
    }
}
