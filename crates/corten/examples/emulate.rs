//! Emulator example — hand-encode a short program and step it.
//!
//! Run with: `cargo run --example emulate`

use corten::isa::{format_o, format_swi, Cond, Opcode, Operand2, ShiftKind, NR};
use corten::Emulator32;

fn main() {
    // x1 = 6; x2 = 7; x3 = x1 * x2; print x3; halt.
    let program = [
        format_o(Opcode::Mov, Cond::Al, false, 1, 0, Operand2::Imm(6)),
        format_o(Opcode::Mov, Cond::Al, false, 2, 0, Operand2::Imm(7)),
        format_o(
            Opcode::Mul,
            Cond::Al,
            true,
            3,
            1,
            Operand2::Reg {
                rm: 2,
                shift: ShiftKind::Lsl,
                amount: 0,
            },
        ),
        // emu_printr(reg_id = 3)
        format_o(Opcode::Mov, Cond::Al, false, NR, 0, Operand2::Imm(1001)),
        format_o(Opcode::Mov, Cond::Al, false, 0, 0, Operand2::Imm(3)),
        format_swi(Cond::Al, 0),
        format_o(Opcode::Hlt, Cond::Al, false, 0, 0, Operand2::Imm(0)),
    ];
    let image: Vec<u8> = program.iter().flat_map(|w| w.to_be_bytes()).collect();

    let mut cpu = Emulator32::with_default_memory();
    cpu.load_image(&image, 0).expect("image fits in RAM");

    match cpu.run(program.len() as u32) {
        Ok(steps) => {
            println!("executed {steps} instruction(s), halted = {}", cpu.halted());
            for line in cpu.take_console() {
                println!("{line}");
            }
        }
        Err(fault) => eprintln!("fault: {fault}"),
    }
}
