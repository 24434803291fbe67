use emu65x::machine::Machine;
use emu65x::opcode::{BRK, XTOP3, XTOP3_MATH};
use std::error::Error;
use std::io;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut machine = Machine::new();
    #[rustfmt::skip]
    machine.load_program(0x0300, &[
        XTOP3, 0x40,                            // xor.l %x0, %x0
        XTOP3_MATH, 0x80, 0xEF, 0xBE, 0xAD, 0xDE, // add.l %x0, #$deadbeef
        XTOP3, 0x08,                            // tr.l %x1, %x0
        BRK,
    ]);
    machine.cpu.tracing = true;
    machine.cpu.reset();
    machine.cpu.execute_until_break();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    machine.memory.borrow().dump(&mut out, 0, 0x0000, 16, 8)?;
    let sp = machine.cpu.sp;
    if sp < 0x1FF {
        machine
            .memory
            .borrow()
            .dump(&mut out, machine.cpu.ss, sp + 1, 1, (0x1FF - sp) as usize)?;
    }
    machine.cpu.dump_regs(&mut out)?;
    Ok(())
}
