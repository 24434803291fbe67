//! 32-bit extension family: register/logic ops (0xF4), add/sub (0xD4) and
//! store (0xFC), operating on the full x0..x7 slots.

use crate::bits::bits;
use crate::cpu::Cpu;
use crate::flags::{ProcessorStatus, Width};
use crate::opcode::XTOP3;

/// Transfer and bitwise ops at 32 bits; sub-op 0 copies (negating on
/// self-reference), 1 is XOR, 2 is AND, 3 is OR
pub fn decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let subop = bits(xop, 7, 6);
    let rd = bits(xop, 5, 3);
    let rs = bits(xop, 2, 0);
    let vs = cpu.register32(rs);
    let res = match subop {
        0 => {
            if rs == rd {
                !vs
            } else {
                vs
            }
        }
        1 => cpu.register32(rd) ^ vs,
        2 => cpu.register32(rd) & vs,
        3 => cpu.register32(rd) | vs,
        _ => {
            cpu.illegal_extended_opcode(XTOP3, xop);
            return;
        }
    };
    cpu.set_register32(rd, res);
    cpu.p.set_flags(
        ProcessorStatus::NEGATIVE | ProcessorStatus::ZERO,
        Width::W32,
        res,
        0,
    );
    cpu.cycle();
}

/// Add/sub with an optional 32-bit little-endian immediate; a
/// self-referencing source folds to dst op constant
pub fn math_decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let const_flag = bits(xop, 7, 7);
    let f = bits(xop, 6, 6);
    let rd = bits(xop, 5, 3);
    let rs = bits(xop, 2, 0);
    let vd = cpu.register32(rd);
    let vs = cpu.register32(rs);
    let con = if const_flag != 0 { cpu.fetch_long() } else { 0 };
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
    cpu.set_register32(rd, res);
    cpu.p.set_flags(
        ProcessorStatus::NEGATIVE
            | ProcessorStatus::ZERO
            | ProcessorStatus::CARRY
            | ProcessorStatus::OVERFLOW,
        Width::W32,
        res,
        vd,
    );
    cpu.cycle();
}

/// Store a 32-bit register little-endian; operand layout shared with the
/// 8-bit store family, index displacement truncated to signed 8 bits
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
        let index = cpu.register32(ri) as u8 as i8;
        addr = addr.wrapping_add(index as u16);
        cpu.cycle();
    }
    let value = cpu.register32(rs);
    cpu.write_long(seg, addr, value);
}
