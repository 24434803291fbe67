//! 16-bit extension family: register/logic ops (0xF3), add/sub (0xD3) and
//! store (0xFB). Sub-decode byte layout matches the 8-bit family; register
//! selectors address the w0..w7 halves of the register file.

use crate::bits::bits;
use crate::cpu::Cpu;
use crate::flags::{ProcessorStatus, Width};
use crate::opcode::XTOP2;

/// Transfer and bitwise ops. Sub-op 0 copies (negating on
/// self-reference), 1 is XOR, 2 is AND, 3 is OR; all set N/Z at 16 bits.
pub fn decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let subop = bits(xop, 7, 6);
    let rd = bits(xop, 5, 3);
    let rs = bits(xop, 2, 0);
    let vs = cpu.register16(rs);
    let res = match subop {
        0 => {
            if rs == rd {
                !vs
            } else {
                vs
            }
        }
        1 => cpu.register16(rd) ^ vs,
        2 => cpu.register16(rd) & vs,
        3 => cpu.register16(rd) | vs,
        _ => {
            cpu.illegal_extended_opcode(XTOP2, xop);
            return;
        }
    };
    cpu.set_register16(rd, res);
    cpu.p.set_flags(
        ProcessorStatus::NEGATIVE | ProcessorStatus::ZERO,
        Width::W16,
        res as u32,
        0,
    );
    cpu.cycle();
}

/// Add/sub with an optional 16-bit little-endian immediate; a
/// self-referencing source folds to dst op constant
pub fn math_decode_and_execute(cpu: &mut Cpu) {
    let xop = cpu.fetch_byte();
    let const_flag = bits(xop, 7, 7);
    let f = bits(xop, 6, 6);
    let rd = bits(xop, 5, 3);
    let rs = bits(xop, 2, 0);
    let vd = cpu.register16(rd);
    let vs = cpu.register16(rs);
    let con = if const_flag != 0 { cpu.fetch_word() } else { 0 };
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
    cpu.set_register16(rd, res);
    cpu.p.set_flags(
        ProcessorStatus::NEGATIVE
            | ProcessorStatus::ZERO
            | ProcessorStatus::CARRY
            | ProcessorStatus::OVERFLOW,
        Width::W16,
        res as u32,
        vd as u32,
    );
    cpu.cycle();
}

/// Store a 16-bit register little-endian; operand layout shared with the
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
        let index = cpu.register16(ri) as u8 as i8;
        addr = addr.wrapping_add(index as u16);
        cpu.cycle();
    }
    let value = cpu.register16(rs);
    cpu.write_word(seg, addr, value);
}

#[cfg(test)]
mod tests {
    use crate::cpu::{Cpu, ProcessorState, RESET_VECTOR};
    use crate::flags::ProcessorStatus;
    use crate::memory::Memory;
    use crate::opcode::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup(program: &[u8]) -> Cpu {
        let memory = Rc::new(RefCell::new(Memory::new()));
        memory.borrow_mut().program(0, RESET_VECTOR, &[0x00, 0x03]);
        memory.borrow_mut().program(0, 0x0300, program);
        let mut cpu = Cpu::new(memory);
        cpu.reset();
        cpu
    }

    #[test]
    fn test_transfer_copies_word() {
        // w3 <- w1
        let mut cpu = setup(&[XTOP2, 0b00_011_001]);
        cpu.set_register16(1, 0x1234);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(3), 0x1234);
        assert_eq!(cpu.op_cycles, 3);
    }

    #[test]
    fn test_transfer_to_self_negates_and_sets_n() {
        let mut cpu = setup(&[XTOP2, 0b00_010_010]);
        cpu.set_register16(2, 0x00FF);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(2), 0xFF00);
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
        assert!(!cpu.p.contains(ProcessorStatus::ZERO));
    }

    #[test]
    fn test_xor_and_or() {
        let mut cpu = setup(&[
            XTOP2,
            0b01_001_010, // w1 ^= w2
            XTOP2,
            0b10_001_011, // w1 &= w3
            XTOP2,
            0b11_001_100, // w1 |= w4
        ]);
        cpu.set_register16(1, 0xF0F0);
        cpu.set_register16(2, 0x0FF0);
        cpu.set_register16(3, 0xFF00);
        cpu.set_register16(4, 0x0001);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(1), 0xFF00);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(1), 0xFF00);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(1), 0xFF01);
    }

    #[test]
    fn test_xor_self_zeroes_and_sets_z() {
        let mut cpu = setup(&[XTOP2, 0b01_010_010]);
        cpu.set_register16(2, 0xBEEF);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(2), 0);
        assert!(cpu.p.contains(ProcessorStatus::ZERO));
    }

    #[test]
    fn test_math_add_word_constant() {
        // w1 += 0xBEEF
        let mut cpu = setup(&[XTOP2_MATH, 0b10_001_001, 0xEF, 0xBE]);
        cpu.set_register16(1, 0x0001);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(1), 0xBEF0);
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
        // op + sub-byte + two constant bytes + execute
        assert_eq!(cpu.op_cycles, 5);
    }

    #[test]
    fn test_math_add_word_carry_truncates_at_16() {
        let mut cpu = setup(&[XTOP2_MATH, 0b10_001_001, 0x01, 0x00]);
        cpu.set_register16(1, 0xFFFF);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(1), 0x0000);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
        assert!(cpu.p.contains(ProcessorStatus::ZERO));
    }

    #[test]
    fn test_math_sub_registers() {
        // w1 -= w2
        let mut cpu = setup(&[XTOP2_MATH, 0b01_001_010]);
        cpu.set_register16(1, 0x2000);
        cpu.set_register16(2, 0x0800);
        cpu.execute_next_instruction();
        assert_eq!(cpu.register16(1), 0x1800);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
    }

    #[test]
    fn test_capability_gate_blocks_family() {
        let mut cpu = setup(&[XTOP2, 0b00_001_010]);
        cpu.allow_65x02 = false;
        cpu.ignore_illegal_instructions = false;
        cpu.allow_halting = true;
        cpu.execute_next_instruction();
        assert_eq!(cpu.state, ProcessorState::Halt);
    }

    #[test]
    fn test_stor_absolute_writes_little_endian() {
        // st w2, DS:0x2000
        let mut cpu = setup(&[XTOP2_STOR, 0b01_010_010, 0x00, 0x20]);
        cpu.set_register16(2, 0xBEEF);
        cpu.execute_next_instruction();
        assert_eq!(cpu.memory.borrow().read(0, 0x2000), 0xEF);
        assert_eq!(cpu.memory.borrow().read(0, 0x2001), 0xBE);
    }

    #[test]
    fn test_stor_zero_page_with_index() {
        let mut cpu = setup(&[XTOP2_STOR, 0b00_011_010, 0x30]);
        cpu.set_register16(2, 0x1234);
        cpu.set_register16(3, 0x0004);
        cpu.execute_next_instruction();
        assert_eq!(cpu.memory.borrow().read(0, 0x0034), 0x34);
        assert_eq!(cpu.memory.borrow().read(0, 0x0035), 0x12);
    }

    #[test]
    fn test_stor_index_truncates_to_signed_byte() {
        // w3 = 0x01FF indexes as -1
        let mut cpu = setup(&[XTOP2_STOR, 0b01_011_010, 0x00, 0x20]);
        cpu.set_register16(2, 0x5678);
        cpu.set_register16(3, 0x01FF);
        cpu.execute_next_instruction();
        assert_eq!(cpu.memory.borrow().read(0, 0x1FFF), 0x78);
        assert_eq!(cpu.memory.borrow().read(0, 0x2000), 0x56);
    }

    #[test]
    fn test_stor_stack_relative() {
        let mut cpu = setup(&[XTOP2_STOR, 0b11_010_010, 0xFE]);
        cpu.set_register16(2, 0xCAFE);
        cpu.execute_next_instruction();
        assert_eq!(cpu.memory.borrow().read(0, 0x1FD), 0xFE);
        assert_eq!(cpu.memory.borrow().read(0, 0x1FE), 0xCA);
    }
}
