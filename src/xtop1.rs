//! 8-bit extension family: register transfer (0xF2), segment transfer
//! (0xF7), add/sub (0xD2) and store (0xFA). Each opcode is followed by one
//! sub-decode byte laid out as sub-op (7..6) | dst (5..3) | src (2..0).

use crate::bits::bits;
use crate::cpu::Cpu;
use crate::flags::{ProcessorStatus, Width};
use crate::opcode::{XTOP1, XTOP1_TRX};

/// Register transfer. A self-referencing transfer negates the register
/// instead of copying it. No flags are touched at this width.
pub fn decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let subop = bits(xop, 7, 6);
    let rd = bits(xop, 5, 3);
    let rs = bits(xop, 2, 0);
    match subop {
        0 => {
            let vs = cpu.register8(rs);
            let res = if rs == rd { !vs } else { vs };
            cpu.set_register8(rd, res);
            cpu.cycle();
        }
        1 => {
            // Register/segment transfer slot: the fields decode but the
            // operation performs no mutation
            let _dir = bits(xop, 2, 2);
            let _segsel = bits(xop, 1, 0);
        }
        _ => cpu.illegal_extended_opcode(XTOP1, xop),
    }
}

/// Bidirectional transfer between an 8-bit register and a segment
/// selector. Bit 7 must be clear; bit 6 picks the direction (0 moves the
/// register into the selector, 1 reads it back); bits 2..0 select PS, DS
/// or SS.
pub fn trx_decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let subop = bits(xop, 7, 7);
    let dir = bits(xop, 6, 6);
    let d8r = bits(xop, 5, 3);
    let segr = bits(xop, 2, 0);
    if subop != 0 {
        cpu.illegal_extended_opcode(XTOP1_TRX, xop);
        return;
    }
    match segr {
        0 => {
            if dir != 0 {
                let ps = cpu.ps;
                cpu.set_register8(d8r, ps);
            } else {
                cpu.ps = cpu.register8(d8r);
            }
        }
        1 => {
            if dir != 0 {
                let ds = cpu.ds;
                cpu.set_register8(d8r, ds);
            } else {
                cpu.ds = cpu.register8(d8r);
            }
        }
        2 => {
            if dir != 0 {
                let ss = cpu.ss;
                cpu.set_register8(d8r, ss);
            } else {
                cpu.ss = cpu.register8(d8r);
            }
        }
        _ => cpu.illegal_extended_opcode(XTOP1_TRX, xop),
    }
}

/// Add/sub: constant-flag (7) | op-flag (6, 0 add / 1 sub) | dst | src.
/// When the constant flag is set an 8-bit immediate follows. A
/// self-referencing source folds the operation to dst op constant.
pub fn math_decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let const_flag = bits(xop, 7, 7);
    let f = bits(xop, 6, 6);
    let rd = bits(xop, 5, 3);
    let rs = bits(xop, 2, 0);
    let vd = cpu.register8(rd);
    let vs = cpu.register8(rs);
    let con = if const_flag != 0 { cpu.fetch_byte() } else { 0 };
    let res = if f == 0 {
        if rs == rd {
            vd.wrapping_add(con)
        } else {
            vd.wrapping_add(vs).wrapping_add(con)
        }
    } else {
        if rs == rd {
            vd.wrapping_sub(con)
        } else {
            vd.wrapping_sub(vs).wrapping_sub(con)
        }
    };
    cpu.set_register8(rd, res);
    cpu.p.set_flags(
        ProcessorStatus::NEGATIVE
            | ProcessorStatus::ZERO
            | ProcessorStatus::CARRY
            | ProcessorStatus::OVERFLOW,
        Width::W8,
        res as u32,
        vd as u32,
    );
    cpu.cycle();
}

/// Store a register: mode (7..6) | index (5..3) | src (2..0).
/// Mode 0 takes a zero-page offset in DS, 1 a word offset in DS, 2 a word
/// offset plus an explicit segment byte, 3 a signed displacement off the
/// stack pointer in SS. When the index register differs from the source
/// its value is added as a signed 8-bit displacement.
pub fn stor_decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let addr_mode = bits(xop, 7, 6);
    let ri = bits(xop, 5, 3);
    let rs = bits(xop, 2, 0);
    let mut seg = cpu.ds;
    let mut addr;
    match addr_mode {
        0 => {
            addr = cpu.fetch_byte() as u16;
        }
        1 => {
            addr = cpu.fetch_word();
        }
        2 => {
            addr = cpu.fetch_word();
            seg = cpu.fetch_byte();
        }
        _ => {
            seg = cpu.ss;
            let off = cpu.fetch_byte() as i8;
            addr = cpu.sp.wrapping_add(off as u16);
            cpu.cycle();
        }
    }
    if ri != rs {
        let index = cpu.register8(ri) as i8;
        addr = addr.wrapping_add(index as u16);
        cpu.cycle();
    }
    let value = cpu.register8(rs);
    cpu.write_byte(seg, addr, value);
}
