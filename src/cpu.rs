use crate::flags::{ProcessorStatus, Width};
use crate::memory::Memory;
use crate::opcode::{self, *};
use crate::{xtop1, xtop2, xtop3};
use log::{trace, warn};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Processor execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Reset,
    Halt,
    Normal,
}

/// 65X02 CPU: the classic 6502 register set widened into a file of eight
/// 32-bit registers, with segment-register addressing on top of a 256-bank
/// memory model.
pub struct Cpu {
    /// Execution state; a freshly constructed CPU sits in Reset
    pub state: ProcessorState,
    /// Program counter (offset within the code segment)
    pub pc: u16,
    /// Stack pointer (offset within the stack segment, 0x100..=0x1FF)
    pub sp: u16,
    /// Status register
    pub p: ProcessorStatus,
    /// General-purpose register file. The 8- and 16-bit register views are
    /// byte/half lanes of these slots; A, X and Y are 8-bit registers 1, 3
    /// and 5.
    pub regs: [u32; 8],
    /// Code (program) segment selector
    pub ps: u8,
    /// Data segment selector
    pub ds: u8,
    /// Stack segment selector
    pub ss: u8,
    /// Segment/PC captured at the last fetch, for illegal-instruction reports
    pub op_seg: u8,
    pub op_pc: u16,
    /// Last fetched opcode byte
    pub op: u8,
    /// Cycles consumed by the last executed instruction
    pub op_cycles: u64,
    /// Verbose per-step logging via log::trace!
    pub tracing: bool,
    /// Treat illegal instructions as silent no-ops
    pub ignore_illegal_instructions: bool,
    /// When not ignoring, halt on illegal instructions instead of rebooting
    pub allow_halting: bool,
    /// Halt after executing BRK
    pub halt_on_brk: bool,
    /// Enable the 65C02 opcode subset (BRA, STZ)
    pub allow_65c02: bool,
    /// Enable the 65X02 extension opcodes
    pub allow_65x02: bool,
    /// Total cycles since init
    pub cycles: u64,
    /// Memory
    pub memory: Rc<RefCell<Memory>>,
}

impl Cpu {
    /// Create a new CPU in the Reset state
    pub fn new(memory: Rc<RefCell<Memory>>) -> Self {
        Self {
            state: ProcessorState::Reset,
            pc: 0,
            sp: 0x1FF,
            p: ProcessorStatus::default(),
            regs: [0; 8],
            ps: 0,
            ds: 0,
            ss: 0,
            op_seg: 0,
            op_pc: 0,
            op: 0,
            op_cycles: 0,
            tracing: false,
            ignore_illegal_instructions: true,
            allow_halting: false,
            halt_on_brk: false,
            allow_65c02: true,
            allow_65x02: true,
            cycles: 0,
            memory,
        }
    }

    /// Zero registers, flags, segment selectors and the cycle counter, and
    /// force the Reset state. The PC is not touched here; `reset` loads it
    /// from the reset vector.
    pub fn init(&mut self) {
        self.state = ProcessorState::Reset;
        self.sp = 0x1FF;
        self.regs = [0; 8];
        self.p = ProcessorStatus::default();
        self.ps = 0;
        self.ds = 0;
        self.ss = 0;
        self.cycles = 0;
    }

    /// Full reset: re-init, load the PC from the reset vector at 00:FFFC
    /// and enter the Normal state
    pub fn reset(&mut self) {
        self.init();
        let resetv = self.read_word(0, RESET_VECTOR);
        if self.tracing {
            trace!("Reset vector: 00:{:04X}", resetv);
        }
        self.pc = resetv;
        self.ps = 0;
        self.ds = 0;
        self.ss = 0;
        self.state = ProcessorState::Normal;
        if self.tracing {
            trace!("CPU: NORMAL @ {:02X}:{:04X}", self.ps, self.pc);
        }
    }

    /// Step repeatedly until the state leaves Normal. Un-halts a halted CPU
    /// first and forces the halt-on-BRK policy for the duration, so a BRK in
    /// the program stops the loop.
    pub fn execute_until_break(&mut self) {
        let old_halt_on_brk = self.halt_on_brk;
        if self.state == ProcessorState::Halt {
            self.state = ProcessorState::Normal;
        }
        self.halt_on_brk = true;
        loop {
            self.execute_next_instruction();
            if self.state != ProcessorState::Normal {
                break;
            }
        }
        if self.tracing {
            if self.op == BRK {
                trace!("Stopping on BRK");
            } else if self.state == ProcessorState::Halt {
                trace!("CPU is halted");
            } else if self.state == ProcessorState::Reset {
                trace!("CPU was reset");
            } else {
                trace!("Stopped for unknown reason.");
            }
        }
        self.halt_on_brk = old_halt_on_brk;
    }

    /// Execute one step of the state machine. In Reset this performs the
    /// reset and returns without executing an opcode; in Halt it does
    /// nothing; in Normal it fetches, decodes and executes one instruction
    /// and records its cycle count.
    pub fn execute_next_instruction(&mut self) {
        match self.state {
            ProcessorState::Reset => {
                self.reset();
            }
            ProcessorState::Halt => {
                if self.tracing {
                    trace!("CPU:HALT");
                }
            }
            ProcessorState::Normal => {
                self.op_seg = self.ps;
                self.op_pc = self.pc;
                let start = self.cycles;
                let op = self.fetch_byte();
                self.op = op;
                if self.tracing {
                    match opcode::lookup(op) {
                        Some(entry) => trace!("OP={:02X} {}", op, entry.name()),
                        None => trace!("OP={:02X}", op),
                    }
                }
                self.decode_and_execute(op);
                self.op_cycles = self.cycles - start;
                if self.tracing {
                    trace!(
                        "PC={:04X} SP={:04X} A={:02X} X={:02X} Y={:02X} P={:02X} ({:08b})",
                        self.pc,
                        self.sp,
                        self.a(),
                        self.x(),
                        self.y(),
                        self.p.as_byte(),
                        self.p.as_byte()
                    );
                }
            }
        }
    }

    /// Resolve an illegal instruction according to the configured policy
    fn illegal_instruction(&mut self) {
        if !self.ignore_illegal_instructions {
            self.state = if self.allow_halting {
                ProcessorState::Halt
            } else {
                ProcessorState::Reset
            };
        }
    }

    /// Report and resolve an unrecognized or capability-gated opcode byte
    pub fn illegal_opcode(&mut self, inst: u8) {
        warn!(
            "{:02X}:{:04X}={:02X} ILLEGAL INSTRUCTION",
            self.op_seg, self.op_pc, inst
        );
        self.illegal_instruction();
    }

    /// Report and resolve an extension opcode with an unrecognized sub-byte
    pub fn illegal_extended_opcode(&mut self, inst0: u8, inst1: u8) {
        warn!(
            "{:02X}:{:04X}={:02X} {:02X} ILLEGAL INSTRUCTION",
            self.op_seg, self.op_pc, inst0, inst1
        );
        self.illegal_instruction();
    }

    /// Capability gate for the 65C02/65X02 opcode spaces. Returns false
    /// (after raising an illegal instruction) when the set is disabled.
    fn check_mode(&mut self, allowed: bool, op: u8) -> bool {
        if !allowed {
            self.illegal_opcode(op);
        }
        allowed
    }

    fn decode_and_execute(&mut self, op: u8) {
        match op {
            ADC_IMM => {
                let value = self.fetch_byte();
                self.adc(value);
            }
            ADC_ZP | ADC_ZPX => {
                let addr = if op == ADC_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.adc(value);
            }
            ADC_ABS | ADC_ABSX | ADC_ABSY => {
                let index = self.abs_index(op, ADC_ABSX, ADC_ABSY);
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.adc(value);
            }
            ADC_INDX => {
                let addr = self.fetch_ind_x();
                let value = self.read_byte(self.ds, addr);
                self.adc(value);
            }
            ADC_INDY => {
                let addr = self.fetch_ind_y_read();
                let value = self.read_byte(self.ds, addr);
                self.adc(value);
            }

            AND_IMM => {
                let value = self.fetch_byte();
                self.and(value);
            }
            AND_ZP | AND_ZPX => {
                let addr = if op == AND_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.and(value);
            }
            AND_ABS | AND_ABSX | AND_ABSY => {
                let index = self.abs_index(op, AND_ABSX, AND_ABSY);
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.and(value);
            }
            AND_INDX => {
                let addr = self.fetch_ind_x();
                let value = self.read_byte(self.ds, addr);
                self.and(value);
            }
            AND_INDY => {
                let addr = self.fetch_ind_y_read();
                let value = self.read_byte(self.ds, addr);
                self.and(value);
            }

            ASL_ACC => {
                self.cycle();
                let res = self.asl(self.a());
                self.set_a(res);
            }
            ASL_ZP | ASL_ZPX => {
                let addr = if op == ASL_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.asl(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }
            ASL_ABS | ASL_ABSX => {
                let addr = if op == ASL_ABSX {
                    self.fetch_abs_indexed_write(self.x())
                } else {
                    self.fetch_abs()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.asl(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }

            BCC => {
                let rel = self.fetch_byte() as i8;
                let cond = !self.p.contains(ProcessorStatus::CARRY);
                self.branch_relative8_if(rel, cond);
            }
            BCS => {
                let rel = self.fetch_byte() as i8;
                let cond = self.p.contains(ProcessorStatus::CARRY);
                self.branch_relative8_if(rel, cond);
            }
            BEQ => {
                let rel = self.fetch_byte() as i8;
                let cond = self.p.contains(ProcessorStatus::ZERO);
                self.branch_relative8_if(rel, cond);
            }
            BNE => {
                let rel = self.fetch_byte() as i8;
                let cond = !self.p.contains(ProcessorStatus::ZERO);
                self.branch_relative8_if(rel, cond);
            }
            BMI => {
                let rel = self.fetch_byte() as i8;
                let cond = self.p.contains(ProcessorStatus::NEGATIVE);
                self.branch_relative8_if(rel, cond);
            }
            BPL => {
                let rel = self.fetch_byte() as i8;
                let cond = !self.p.contains(ProcessorStatus::NEGATIVE);
                self.branch_relative8_if(rel, cond);
            }
            BVC => {
                let rel = self.fetch_byte() as i8;
                let cond = !self.p.contains(ProcessorStatus::OVERFLOW);
                self.branch_relative8_if(rel, cond);
            }
            BVS => {
                let rel = self.fetch_byte() as i8;
                let cond = self.p.contains(ProcessorStatus::OVERFLOW);
                self.branch_relative8_if(rel, cond);
            }

            BIT_ZP => {
                let addr = self.fetch_zp();
                let value = self.read_byte(self.ds, addr);
                self.bit(value);
            }
            BIT_ABS => {
                let addr = self.fetch_abs();
                let value = self.read_byte(self.ds, addr);
                self.bit(value);
            }

            BRK => {
                // Return address skips the signature byte after the opcode
                let ret = self.op_pc.wrapping_add(2);
                self.push_byte((ret >> 8) as u8);
                self.push_byte((ret & 0xFF) as u8);
                let status = self.p.as_byte();
                self.push_byte(status);
                let addr = self.read_word(0, IRQ_VECTOR);
                self.p.insert(ProcessorStatus::INTERRUPT);
                self.ps = 0;
                self.ds = 0;
                self.ss = 0;
                self.pc = addr;
                if self.halt_on_brk {
                    self.state = ProcessorState::Halt;
                }
            }

            CLC => {
                self.p.remove(ProcessorStatus::CARRY);
                self.cycle();
            }
            CLD => {
                self.p.remove(ProcessorStatus::DECIMAL);
                self.cycle();
            }
            CLI => {
                self.p.remove(ProcessorStatus::INTERRUPT);
                self.cycle();
            }
            CLV => {
                self.p.remove(ProcessorStatus::OVERFLOW);
                self.cycle();
            }

            CMP_IMM => {
                let value = self.fetch_byte();
                let a = self.a();
                self.compare(a, value);
            }
            CMP_ZP | CMP_ZPX => {
                let addr = if op == CMP_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                let a = self.a();
                self.compare(a, value);
            }
            CMP_ABS | CMP_ABSX | CMP_ABSY => {
                let index = self.abs_index(op, CMP_ABSX, CMP_ABSY);
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                let a = self.a();
                self.compare(a, value);
            }
            CMP_INDX => {
                let addr = self.fetch_ind_x();
                let value = self.read_byte(self.ds, addr);
                let a = self.a();
                self.compare(a, value);
            }
            CMP_INDY => {
                let addr = self.fetch_ind_y_read();
                let value = self.read_byte(self.ds, addr);
                let a = self.a();
                self.compare(a, value);
            }

            CPX_IMM => {
                let value = self.fetch_byte();
                let x = self.x();
                self.compare(x, value);
            }
            CPX_ZP => {
                let addr = self.fetch_zp();
                let value = self.read_byte(self.ds, addr);
                let x = self.x();
                self.compare(x, value);
            }
            CPX_ABS => {
                let addr = self.fetch_abs();
                let value = self.read_byte(self.ds, addr);
                let x = self.x();
                self.compare(x, value);
            }

            CPY_IMM => {
                let value = self.fetch_byte();
                let y = self.y();
                self.compare(y, value);
            }
            CPY_ZP => {
                let addr = self.fetch_zp();
                let value = self.read_byte(self.ds, addr);
                let y = self.y();
                self.compare(y, value);
            }
            CPY_ABS => {
                let addr = self.fetch_abs();
                let value = self.read_byte(self.ds, addr);
                let y = self.y();
                self.compare(y, value);
            }

            DEC_ZP | DEC_ZPX => {
                let addr = if op == DEC_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                let res = value.wrapping_sub(1);
                self.cycle();
                self.write_byte(self.ds, addr, res);
                self.set_nz8(res);
            }
            DEC_ABS | DEC_ABSX => {
                let addr = if op == DEC_ABSX {
                    self.fetch_abs_indexed_write(self.x())
                } else {
                    self.fetch_abs()
                };
                let value = self.read_byte(self.ds, addr);
                let res = value.wrapping_sub(1);
                self.cycle();
                self.write_byte(self.ds, addr, res);
                self.set_nz8(res);
            }
            DEX => {
                let res = self.x().wrapping_sub(1);
                self.cycle();
                self.set_x(res);
                self.set_nz8(res);
            }
            DEY => {
                let res = self.y().wrapping_sub(1);
                self.cycle();
                self.set_y(res);
                self.set_nz8(res);
            }

            EOR_IMM => {
                let value = self.fetch_byte();
                self.eor(value);
            }
            EOR_ZP | EOR_ZPX => {
                let addr = if op == EOR_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.eor(value);
            }
            EOR_ABS | EOR_ABSX | EOR_ABSY => {
                let index = self.abs_index(op, EOR_ABSX, EOR_ABSY);
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.eor(value);
            }
            EOR_INDX => {
                let addr = self.fetch_ind_x();
                let value = self.read_byte(self.ds, addr);
                self.eor(value);
            }
            EOR_INDY => {
                let addr = self.fetch_ind_y_read();
                let value = self.read_byte(self.ds, addr);
                self.eor(value);
            }

            INC_ZP | INC_ZPX => {
                let addr = if op == INC_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                let res = value.wrapping_add(1);
                self.cycle();
                self.write_byte(self.ds, addr, res);
                self.set_nz8(res);
            }
            INC_ABS | INC_ABSX => {
                let addr = if op == INC_ABSX {
                    self.fetch_abs_indexed_write(self.x())
                } else {
                    self.fetch_abs()
                };
                let value = self.read_byte(self.ds, addr);
                let res = value.wrapping_add(1);
                self.cycle();
                self.write_byte(self.ds, addr, res);
                self.set_nz8(res);
            }
            INX => {
                let res = self.x().wrapping_add(1);
                self.cycle();
                self.set_x(res);
                self.set_nz8(res);
            }
            INY => {
                let res = self.y().wrapping_add(1);
                self.cycle();
                self.set_y(res);
                self.set_nz8(res);
            }

            JMP_ABS => {
                self.pc = self.fetch_word();
            }
            JMP_IND => {
                let ptr = self.fetch_word();
                let lo = self.read_byte(self.ps, ptr) as u16;
                let hi = self.read_byte(self.ps, ptr.wrapping_add(1)) as u16;
                self.pc = hi << 8 | lo;
            }

            JSR => {
                let addr = self.fetch_word();
                // Push the address of the last operand byte; RTS adds 1
                let ret = self.pc.wrapping_sub(1);
                self.push_byte((ret >> 8) as u8);
                self.push_byte((ret & 0xFF) as u8);
                self.cycle();
                self.pc = addr;
            }

            LDA_IMM => {
                let value = self.fetch_byte();
                self.set_a(value);
                self.set_nz8(value);
            }
            LDA_ZP | LDA_ZPX => {
                let addr = if op == LDA_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.set_a(value);
                self.set_nz8(value);
            }
            LDA_ABS | LDA_ABSX | LDA_ABSY => {
                let index = self.abs_index(op, LDA_ABSX, LDA_ABSY);
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.set_a(value);
                self.set_nz8(value);
            }
            LDA_INDX => {
                let addr = self.fetch_ind_x();
                let value = self.read_byte(self.ds, addr);
                self.set_a(value);
                self.set_nz8(value);
            }
            LDA_INDY => {
                let addr = self.fetch_ind_y_read();
                let value = self.read_byte(self.ds, addr);
                self.set_a(value);
                self.set_nz8(value);
            }

            LDX_IMM => {
                let value = self.fetch_byte();
                self.set_x(value);
                self.set_nz8(value);
            }
            LDX_ZP | LDX_ZPY => {
                let addr = if op == LDX_ZPY {
                    self.fetch_zp_indexed(self.y())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.set_x(value);
                self.set_nz8(value);
            }
            LDX_ABS | LDX_ABSY => {
                let index = if op == LDX_ABSY { self.y() } else { 0 };
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.set_x(value);
                self.set_nz8(value);
            }

            LDY_IMM => {
                let value = self.fetch_byte();
                self.set_y(value);
                self.set_nz8(value);
            }
            LDY_ZP | LDY_ZPX => {
                let addr = if op == LDY_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.set_y(value);
                self.set_nz8(value);
            }
            LDY_ABS | LDY_ABSX => {
                let index = if op == LDY_ABSX { self.x() } else { 0 };
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.set_y(value);
                self.set_nz8(value);
            }

            LSR_ACC => {
                self.cycle();
                let res = self.lsr(self.a());
                self.set_a(res);
            }
            LSR_ZP | LSR_ZPX => {
                let addr = if op == LSR_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.lsr(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }
            LSR_ABS | LSR_ABSX => {
                let addr = if op == LSR_ABSX {
                    self.fetch_abs_indexed_write(self.x())
                } else {
                    self.fetch_abs()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.lsr(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }

            NOP => {
                self.cycle();
            }

            ORA_IMM => {
                let value = self.fetch_byte();
                self.ora(value);
            }
            ORA_ZP | ORA_ZPX => {
                let addr = if op == ORA_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.ora(value);
            }
            ORA_ABS | ORA_ABSX | ORA_ABSY => {
                let index = self.abs_index(op, ORA_ABSX, ORA_ABSY);
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.ora(value);
            }
            ORA_INDX => {
                let addr = self.fetch_ind_x();
                let value = self.read_byte(self.ds, addr);
                self.ora(value);
            }
            ORA_INDY => {
                let addr = self.fetch_ind_y_read();
                let value = self.read_byte(self.ds, addr);
                self.ora(value);
            }

            PHA => {
                let a = self.a();
                self.push_byte(a);
                self.cycle();
            }
            PHP => {
                let status = self.p.as_byte();
                self.push_byte(status);
                self.cycle();
            }
            PLA => {
                let value = self.pop_byte();
                self.cycle();
                self.set_a(value);
                self.set_nz8(value);
            }
            PLP => {
                let value = self.pop_byte();
                self.cycle();
                self.p.set_byte(value);
            }

            ROL_ACC => {
                self.cycle();
                let res = self.rol(self.a());
                self.set_a(res);
            }
            ROL_ZP | ROL_ZPX => {
                let addr = if op == ROL_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.rol(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }
            ROL_ABS | ROL_ABSX => {
                let addr = if op == ROL_ABSX {
                    self.fetch_abs_indexed_write(self.x())
                } else {
                    self.fetch_abs()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.rol(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }

            ROR_ACC => {
                self.cycle();
                let res = self.ror(self.a());
                self.set_a(res);
            }
            ROR_ZP | ROR_ZPX => {
                let addr = if op == ROR_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.ror(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }
            ROR_ABS | ROR_ABSX => {
                let addr = if op == ROR_ABSX {
                    self.fetch_abs_indexed_write(self.x())
                } else {
                    self.fetch_abs()
                };
                let value = self.read_byte(self.ds, addr);
                let res = self.ror(value);
                self.cycle();
                self.write_byte(self.ds, addr, res);
            }

            RTI => {
                let status = self.pop_byte();
                let lo = self.pop_byte() as u16;
                let hi = self.pop_byte() as u16;
                self.p.set_byte(status);
                self.pc = hi << 8 | lo;
                self.cycle();
                self.cycle();
            }
            RTS => {
                let lo = self.pop_byte() as u16;
                let hi = self.pop_byte() as u16;
                self.pc = (hi << 8 | lo).wrapping_add(1);
                self.cycle();
                self.cycle();
            }

            SBC_IMM => {
                let value = self.fetch_byte();
                self.sbc(value);
            }
            SBC_ZP | SBC_ZPX => {
                let addr = if op == SBC_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let value = self.read_byte(self.ds, addr);
                self.sbc(value);
            }
            SBC_ABS | SBC_ABSX | SBC_ABSY => {
                let index = self.abs_index(op, SBC_ABSX, SBC_ABSY);
                let addr = self.fetch_abs_indexed_read(index);
                let value = self.read_byte(self.ds, addr);
                self.sbc(value);
            }
            SBC_INDX => {
                let addr = self.fetch_ind_x();
                let value = self.read_byte(self.ds, addr);
                self.sbc(value);
            }
            SBC_INDY => {
                let addr = self.fetch_ind_y_read();
                let value = self.read_byte(self.ds, addr);
                self.sbc(value);
            }

            SEC => {
                self.p.insert(ProcessorStatus::CARRY);
                self.cycle();
            }
            SED => {
                self.p.insert(ProcessorStatus::DECIMAL);
                self.cycle();
            }
            SEI => {
                self.p.insert(ProcessorStatus::INTERRUPT);
                self.cycle();
            }

            STA_ZP | STA_ZPX => {
                let addr = if op == STA_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let a = self.a();
                self.write_byte(self.ds, addr, a);
            }
            STA_ABS => {
                let addr = self.fetch_abs();
                let a = self.a();
                self.write_byte(self.ds, addr, a);
            }
            STA_ABSX | STA_ABSY => {
                let index = if op == STA_ABSX { self.x() } else { self.y() };
                let addr = self.fetch_abs_indexed_write(index);
                let a = self.a();
                self.write_byte(self.ds, addr, a);
            }
            STA_INDX => {
                let addr = self.fetch_ind_x();
                let a = self.a();
                self.write_byte(self.ds, addr, a);
            }
            STA_INDY => {
                let addr = self.fetch_ind_y_write();
                let a = self.a();
                self.write_byte(self.ds, addr, a);
            }

            STX_ZP | STX_ZPY => {
                let addr = if op == STX_ZPY {
                    self.fetch_zp_indexed(self.y())
                } else {
                    self.fetch_zp()
                };
                let x = self.x();
                self.write_byte(self.ds, addr, x);
            }
            STX_ABS => {
                let addr = self.fetch_abs();
                let x = self.x();
                self.write_byte(self.ds, addr, x);
            }

            STY_ZP | STY_ZPX => {
                let addr = if op == STY_ZPX {
                    self.fetch_zp_indexed(self.x())
                } else {
                    self.fetch_zp()
                };
                let y = self.y();
                self.write_byte(self.ds, addr, y);
            }
            STY_ABS => {
                let addr = self.fetch_abs();
                let y = self.y();
                self.write_byte(self.ds, addr, y);
            }

            TAX => {
                self.cycle();
                let a = self.a();
                self.set_x(a);
            }
            TAY => {
                self.cycle();
                let a = self.a();
                self.set_y(a);
            }
            TSX => {
                self.cycle();
                let sp = (self.sp & 0xFF) as u8;
                self.set_x(sp);
            }
            TXA => {
                self.cycle();
                let x = self.x();
                self.set_a(x);
            }
            TXS => {
                self.cycle();
                self.sp = 0x100 | self.x() as u16;
            }
            TYA => {
                self.cycle();
                let y = self.y();
                self.set_a(y);
            }

            BRA => {
                if self.check_mode(self.allow_65c02, op) {
                    let rel = self.fetch_byte() as i8;
                    self.branch_relative8_if(rel, true);
                }
            }

            STZ_ZP | STZ_ZPX => {
                if self.check_mode(self.allow_65c02, op) {
                    let addr = if op == STZ_ZPX {
                        self.fetch_zp_indexed(self.x())
                    } else {
                        self.fetch_zp()
                    };
                    self.write_byte(self.ds, addr, 0);
                }
            }
            STZ_ABS | STZ_ABSX => {
                if self.check_mode(self.allow_65c02, op) {
                    let addr = if op == STZ_ABSX {
                        self.fetch_abs_indexed_write(self.x())
                    } else {
                        self.fetch_abs()
                    };
                    self.write_byte(self.ds, addr, 0);
                }
            }

            XTOP1 => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop1::decode_and_execute(self);
                }
            }
            XTOP2 => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop2::decode_and_execute(self);
                }
            }
            XTOP3 => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop3::decode_and_execute(self);
                }
            }
            XTOP1_TRX => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop1::trx_decode_and_execute(self);
                }
            }
            XTOP1_MATH => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop1::math_decode_and_execute(self);
                }
            }
            XTOP2_MATH => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop2::math_decode_and_execute(self);
                }
            }
            XTOP3_MATH => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop3::math_decode_and_execute(self);
                }
            }
            XTOP1_STOR => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop1::stor_decode_and_execute(self);
                }
            }
            XTOP2_STOR => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop2::stor_decode_and_execute(self);
                }
            }
            XTOP3_STOR => {
                if self.check_mode(self.allow_65x02, op) {
                    xtop3::stor_decode_and_execute(self);
                }
            }

            _ => {
                self.illegal_opcode(op);
            }
        }
    }

    // Register file views.
    //
    // Little endianness and register value mapping within one 32-bit slot:
    // | d0 | d1 | d2 | d3 |
    // | EF | BE | AD | DE |
    // |   w0    |   w1    |   w0 = 0xBEEF, w1 = 0xDEAD
    // |        x0         |   x0 = 0xDEADBEEF

    /// Accumulator: 8-bit register 1
    pub fn a(&self) -> u8 {
        self.register8(1)
    }
    /// X: 8-bit register 3
    pub fn x(&self) -> u8 {
        self.register8(3)
    }
    /// Y: 8-bit register 5
    pub fn y(&self) -> u8 {
        self.register8(5)
    }
    pub fn set_a(&mut self, v: u8) {
        self.set_register8(1, v);
    }
    pub fn set_x(&mut self, v: u8) {
        self.set_register8(3, v);
    }
    pub fn set_y(&mut self, v: u8) {
        self.set_register8(5, v);
    }

    /// Read byte lane `sel % 4` of slot `sel / 4`
    pub fn register8(&self, sel: u8) -> u8 {
        let slot = (sel / 4) as usize;
        let shift = (sel % 4) * 8;
        (self.regs[slot] >> shift) as u8
    }

    pub fn set_register8(&mut self, sel: u8, val: u8) {
        let slot = (sel / 4) as usize;
        let shift = (sel % 4) as u32 * 8;
        self.regs[slot] = (self.regs[slot] & !(0xFF << shift)) | ((val as u32) << shift);
    }

    /// Read half `sel % 2` of slot `sel / 2`
    pub fn register16(&self, sel: u8) -> u16 {
        let slot = (sel / 2) as usize;
        let shift = (sel % 2) * 16;
        (self.regs[slot] >> shift) as u16
    }

    pub fn set_register16(&mut self, sel: u8, val: u16) {
        let slot = (sel / 2) as usize;
        let shift = (sel % 2) as u32 * 16;
        self.regs[slot] = (self.regs[slot] & !(0xFFFF << shift)) | ((val as u32) << shift);
    }

    pub fn register32(&self, sel: u8) -> u32 {
        self.regs[sel as usize]
    }

    pub fn set_register32(&mut self, sel: u8, val: u32) {
        self.regs[sel as usize] = val;
    }

    // Memory and stack primitives. Every byte access costs one cycle.

    pub fn cycle(&mut self) {
        self.cycles += 1;
    }

    pub fn read_byte(&mut self, seg: u8, addr: u16) -> u8 {
        let data = self.memory.borrow().read(seg, addr);
        if self.tracing {
            trace!("  read {:02X}:{:04X}={:02X}", seg, addr, data);
        }
        self.cycle();
        data
    }

    pub fn read_word(&mut self, seg: u8, addr: u16) -> u16 {
        let lo = self.read_byte(seg, addr) as u16;
        let hi = self.read_byte(seg, addr.wrapping_add(1)) as u16;
        hi << 8 | lo
    }

    pub fn read_long(&mut self, seg: u8, addr: u16) -> u32 {
        let mut data = self.read_byte(seg, addr) as u32;
        data |= (self.read_byte(seg, addr.wrapping_add(1)) as u32) << 8;
        data |= (self.read_byte(seg, addr.wrapping_add(2)) as u32) << 16;
        data |= (self.read_byte(seg, addr.wrapping_add(3)) as u32) << 24;
        data
    }

    pub fn write_byte(&mut self, seg: u8, addr: u16, byte: u8) {
        self.memory.borrow_mut().write(seg, addr, byte);
        if self.tracing {
            trace!("  wrote {:02X}:{:04X}={:02X}", seg, addr, byte);
        }
        self.cycle();
    }

    pub fn write_word(&mut self, seg: u8, addr: u16, word: u16) {
        self.write_byte(seg, addr, (word & 0xFF) as u8);
        self.write_byte(seg, addr.wrapping_add(1), (word >> 8) as u8);
    }

    pub fn write_long(&mut self, seg: u8, addr: u16, word: u32) {
        self.write_byte(seg, addr, word as u8);
        self.write_byte(seg, addr.wrapping_add(1), (word >> 8) as u8);
        self.write_byte(seg, addr.wrapping_add(2), (word >> 16) as u8);
        self.write_byte(seg, addr.wrapping_add(3), (word >> 24) as u8);
    }

    /// Fetch one byte at (PS, PC) and advance the PC
    pub fn fetch_byte(&mut self) -> u8 {
        let byte = self.read_byte(self.ps, self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    pub fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        hi << 8 | lo
    }

    pub fn fetch_long(&mut self) -> u32 {
        let mut data = self.fetch_byte() as u32;
        data |= (self.fetch_byte() as u32) << 8;
        data |= (self.fetch_byte() as u32) << 16;
        data |= (self.fetch_byte() as u32) << 24;
        data
    }

    /// Push a byte at (SS, SP); the SP wraps within its low byte so the
    /// stack stays inside 0x100..=0x1FF of the stack segment
    pub fn push_byte(&mut self, byte: u8) {
        let ss = self.ss;
        let sp = self.sp;
        self.write_byte(ss, sp, byte);
        self.sp = (self.sp.wrapping_sub(1) & 0xFF) | 0x100;
    }

    pub fn pop_byte(&mut self) -> u8 {
        self.sp = (self.sp.wrapping_add(1) & 0xFF) | 0x100;
        let ss = self.ss;
        let sp = self.sp;
        self.read_byte(ss, sp)
    }

    // Addressing-mode resolution

    fn fetch_zp(&mut self) -> u16 {
        self.fetch_byte() as u16
    }

    /// Zero-page indexed: the index add wraps within the zero page and
    /// costs one internal cycle
    fn fetch_zp_indexed(&mut self, index: u8) -> u16 {
        let zp = self.fetch_byte().wrapping_add(index);
        self.cycle();
        zp as u16
    }

    fn fetch_abs(&mut self) -> u16 {
        self.fetch_word()
    }

    /// Absolute indexed for read ops: one extra cycle only when the indexed
    /// address crosses a page boundary
    fn fetch_abs_indexed_read(&mut self, index: u8) -> u16 {
        let base = self.fetch_word();
        let addr = base.wrapping_add(index as u16);
        if Self::page_crossed(base, addr) {
            self.cycle();
        }
        addr
    }

    /// Absolute indexed for stores and read-modify-write ops: the index add
    /// always costs one internal cycle
    fn fetch_abs_indexed_write(&mut self, index: u8) -> u16 {
        let base = self.fetch_word();
        let addr = base.wrapping_add(index as u16);
        self.cycle();
        addr
    }

    /// (zp,X): add X to the zero-page pointer (one internal cycle), then
    /// read the 16-bit target through the data segment
    fn fetch_ind_x(&mut self) -> u16 {
        let zp = self.fetch_byte().wrapping_add(self.x());
        self.cycle();
        let lo = self.read_byte(self.ds, zp as u16) as u16;
        let hi = self.read_byte(self.ds, zp as u16 + 1) as u16;
        hi << 8 | lo
    }

    /// (zp),Y for read ops: page-cross penalty only
    fn fetch_ind_y_read(&mut self) -> u16 {
        let zp = self.fetch_byte();
        let lo = self.read_byte(self.ds, zp as u16) as u16;
        let hi = self.read_byte(self.ds, zp as u16 + 1) as u16;
        let base = hi << 8 | lo;
        let addr = base.wrapping_add(self.y() as u16);
        if Self::page_crossed(base, addr) {
            self.cycle();
        }
        addr
    }

    /// (zp),Y for stores: the index add always costs one internal cycle
    fn fetch_ind_y_write(&mut self) -> u16 {
        let zp = self.fetch_byte();
        let lo = self.read_byte(self.ds, zp as u16) as u16;
        let hi = self.read_byte(self.ds, zp as u16 + 1) as u16;
        let base = hi << 8 | lo;
        let addr = base.wrapping_add(self.y() as u16);
        self.cycle();
        addr
    }

    /// Index value for the shared ABS/ABSX/ABSY arms
    fn abs_index(&self, op: u8, absx: u8, absy: u8) -> u8 {
        if op == absx {
            self.x()
        } else if op == absy {
            self.y()
        } else {
            0
        }
    }

    fn page_crossed(addr1: u16, addr2: u16) -> bool {
        addr1 & 0xFF00 != addr2 & 0xFF00
    }

    /// Taken branches cost an extra cycle when the target lands on a
    /// different page than the instruction after the operand
    pub fn branch_relative8_if(&mut self, rel: i8, cond: bool) {
        if cond {
            let new_pc = self.pc.wrapping_add(rel as u16);
            if Self::page_crossed(new_pc, self.pc) {
                self.cycle();
            }
            self.pc = new_pc;
        }
    }

    // Instruction bodies shared between addressing modes

    fn set_nz8(&mut self, value: u8) {
        self.p.set_flags(
            ProcessorStatus::NEGATIVE | ProcessorStatus::ZERO,
            Width::W8,
            value as u32,
            0,
        );
    }

    fn adc(&mut self, value: u8) {
        let a = self.a();
        let carry = self.p.contains(ProcessorStatus::CARRY) as u32;
        let sum = a as u32 + value as u32 + carry;
        self.set_a(sum as u8);
        self.p.set_flags(
            ProcessorStatus::NEGATIVE
                | ProcessorStatus::ZERO
                | ProcessorStatus::CARRY
                | ProcessorStatus::OVERFLOW,
            Width::W8,
            sum,
            a as u32,
        );
    }

    fn sbc(&mut self, value: u8) {
        let a = self.a();
        let borrow = !self.p.contains(ProcessorStatus::CARRY) as u32;
        let diff = (a as u32).wrapping_sub(value as u32).wrapping_sub(borrow);
        self.set_a(diff as u8);
        self.p.set_flags(
            ProcessorStatus::NEGATIVE
                | ProcessorStatus::ZERO
                | ProcessorStatus::CARRY
                | ProcessorStatus::OVERFLOW,
            Width::W8,
            diff,
            a as u32,
        );
    }

    fn compare(&mut self, reg: u8, value: u8) {
        let res = reg.wrapping_sub(value);
        self.p.set_flags(
            ProcessorStatus::NEGATIVE | ProcessorStatus::ZERO | ProcessorStatus::CARRY,
            Width::W8,
            res as u32,
            reg as u32,
        );
    }

    fn and(&mut self, value: u8) {
        let res = self.a() & value;
        self.set_a(res);
        self.set_nz8(res);
    }

    fn ora(&mut self, value: u8) {
        let res = self.a() | value;
        self.set_a(res);
        self.set_nz8(res);
    }

    fn eor(&mut self, value: u8) {
        let res = self.a() ^ value;
        self.set_a(res);
        self.set_nz8(res);
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.p.set(ProcessorStatus::CARRY, value & 0x80 != 0);
        let res = value << 1;
        self.set_nz8(res);
        res
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.p.set(ProcessorStatus::CARRY, value & 0x01 != 0);
        let res = value >> 1;
        self.set_nz8(res);
        res
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = self.p.contains(ProcessorStatus::CARRY) as u8;
        self.p.set(ProcessorStatus::CARRY, value & 0x80 != 0);
        let res = value << 1 | carry_in;
        self.set_nz8(res);
        res
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = self.p.contains(ProcessorStatus::CARRY);
        self.p.set(ProcessorStatus::CARRY, value & 0x01 != 0);
        let res = value >> 1 | if carry_in { 0x80 } else { 0 };
        self.set_nz8(res);
        res
    }

    fn bit(&mut self, value: u8) {
        self.p.set(ProcessorStatus::NEGATIVE, value & 0x80 != 0);
        self.p.set(ProcessorStatus::OVERFLOW, value & 0x40 != 0);
        self.p.set(ProcessorStatus::ZERO, self.a() & value == 0);
    }

    /// Write the register/flag state to `w`, including the d/w/x views of
    /// the register file. Diagnostic output only.
    pub fn dump_regs<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "PC={:02X}:{:04X} SP={:02X}:{:04X} A={:02X} X={:02X} Y={:02X} P={:02X} ({:08b})",
            self.ps,
            self.pc,
            self.ss,
            self.sp,
            self.a(),
            self.x(),
            self.y(),
            self.p.as_byte(),
            self.p.as_byte()
        )?;
        for i in 0..8 {
            if i > 0 {
                write!(w, " ")?;
            }
            write!(w, "d{}={:02X}", i, self.register8(i))?;
        }
        writeln!(w)?;
        for i in 0..8 {
            if i > 0 {
                write!(w, " ")?;
            }
            write!(w, "w{}={:04X}", i, self.register16(i))?;
        }
        writeln!(w)?;
        for i in 0..8 {
            if i > 0 {
                write!(w, " ")?;
            }
            write!(w, "x{}={:08X}", i, self.register32(i))?;
        }
        writeln!(w)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Load a program at 00:0300 with all three vectors pointing at it, and
    // reset the CPU so the PC lands on the first byte.
    pub fn setup(program: &[u8]) -> Cpu {
        let memory = Rc::new(RefCell::new(Memory::new()));
        memory
            .borrow_mut()
            .program(0, NMI_VECTOR, &[0x00, 0x03, 0x00, 0x03, 0x00, 0x03]);
        memory.borrow_mut().program(0, 0x0300, program);
        let mut cpu = Cpu::new(memory);
        cpu.allow_65c02 = false;
        cpu.allow_65x02 = false;
        cpu.reset();
        cpu
    }

    pub fn step(cpu: &mut Cpu, n: usize) {
        for _ in 0..n {
            cpu.execute_next_instruction();
        }
    }

    #[test]
    fn test_reset_loads_vector_and_clears_state() {
        let mut cpu = setup(&[NOP]);
        cpu.p = ProcessorStatus::NEGATIVE | ProcessorStatus::CARRY;
        cpu.ds = 0x12;
        cpu.ss = 0x34;
        cpu.reset();
        assert_eq!(cpu.pc, 0x0300);
        assert_eq!(cpu.p, ProcessorStatus::default());
        assert_eq!(cpu.ps, 0);
        assert_eq!(cpu.ds, 0);
        assert_eq!(cpu.ss, 0);
        assert_eq!(cpu.sp, 0x1FF);
        assert_eq!(cpu.state, ProcessorState::Normal);
    }

    #[test]
    fn test_step_in_reset_state_only_resets() {
        let mut cpu = setup(&[LDA_IMM, 0x11]);
        cpu.state = ProcessorState::Reset;
        cpu.execute_next_instruction();
        // The reset step does not execute an opcode
        assert_eq!(cpu.state, ProcessorState::Normal);
        assert_eq!(cpu.pc, 0x0300);
        assert_eq!(cpu.a(), 0);
    }

    #[test]
    fn test_step_in_halt_state_is_inert() {
        let mut cpu = setup(&[NOP]);
        cpu.state = ProcessorState::Halt;
        let cycles = cpu.cycles;
        cpu.execute_next_instruction();
        assert_eq!(cpu.state, ProcessorState::Halt);
        assert_eq!(cpu.cycles, cycles);
        assert_eq!(cpu.pc, 0x0300);
    }

    #[test]
    fn test_adc_immediate() {
        let mut cpu = setup(&[LDA_IMM, 0x40, ADC_IMM, 0x20]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x60);
        assert!(!cpu.p.contains(ProcessorStatus::CARRY));
        assert!(!cpu.p.contains(ProcessorStatus::ZERO));
        assert!(!cpu.p.contains(ProcessorStatus::NEGATIVE));
        assert_eq!(cpu.op_cycles, 2);
    }

    #[test]
    fn test_adc_immediate_with_carry_in() {
        let mut cpu = setup(&[SEC, ADC_IMM, 0x20]);
        cpu.set_a(0x10);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x31);
    }

    #[test]
    fn test_adc_immediate_carry_out_and_zero() {
        let mut cpu = setup(&[LDA_IMM, 0xFF, ADC_IMM, 0x01]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x00);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
        assert!(cpu.p.contains(ProcessorStatus::ZERO));
    }

    #[test]
    fn test_adc_overflow_stays_clear() {
        // Signed overflow is not computed; V always clears
        let mut cpu = setup(&[LDA_IMM, 0x50, ADC_IMM, 0x50]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0xA0);
        assert!(!cpu.p.contains(ProcessorStatus::OVERFLOW));
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
    }

    #[test]
    fn test_adc_zero_page() {
        let mut cpu = setup(&[LDA_IMM, 0x40, ADC_ZP, 0x01]);
        cpu.memory.borrow_mut().write(0, 0x01, 0x60);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0xA0);
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
        assert_eq!(cpu.op_cycles, 3);
    }

    #[test]
    fn test_adc_zero_page_x() {
        let mut cpu = setup(&[LDA_IMM, 0x40, LDX_IMM, 0x01, ADC_ZPX, 0x00]);
        cpu.memory.borrow_mut().write(0, 0x01, 0x60);
        step(&mut cpu, 3);
        assert_eq!(cpu.a(), 0xA0);
        assert_eq!(cpu.op_cycles, 4);
    }

    #[test]
    fn test_adc_absolute() {
        let mut cpu = setup(&[LDA_IMM, 0x40, ADC_ABS, 0x00, 0x20]);
        cpu.memory.borrow_mut().write(0, 0x2000, 0x60);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0xA0);
        assert_eq!(cpu.op_cycles, 4);
    }

    #[test]
    fn test_adc_absolute_x() {
        let mut cpu = setup(&[LDA_IMM, 0x40, LDX_IMM, 0x01, ADC_ABSX, 0x00, 0x20]);
        cpu.memory.borrow_mut().write(0, 0x2001, 0x60);
        step(&mut cpu, 3);
        assert_eq!(cpu.a(), 0xA0);
        assert_eq!(cpu.op_cycles, 4);
    }

    #[test]
    fn test_adc_absolute_x_page_cross() {
        let mut cpu = setup(&[LDA_IMM, 0x40, LDX_IMM, 0x02, ADC_ABSX, 0xFF, 0x20]);
        cpu.memory.borrow_mut().write(0, 0x2101, 0x60);
        step(&mut cpu, 3);
        assert_eq!(cpu.a(), 0xA0);
        assert_eq!(cpu.op_cycles, 5);
    }

    #[test]
    fn test_adc_indirect_x() {
        let mut cpu = setup(&[LDA_IMM, 0x40, LDX_IMM, 0x01, ADC_INDX, 0x3F]);
        cpu.memory.borrow_mut().write(0, 0x40, 0x00);
        cpu.memory.borrow_mut().write(0, 0x41, 0x20);
        cpu.memory.borrow_mut().write(0, 0x2000, 0x60);
        step(&mut cpu, 3);
        assert_eq!(cpu.a(), 0xA0);
        assert_eq!(cpu.op_cycles, 6);
    }

    #[test]
    fn test_adc_indirect_y() {
        let mut cpu = setup(&[LDA_IMM, 0x40, LDY_IMM, 0x02, ADC_INDY, 0x40]);
        cpu.memory.borrow_mut().write(0, 0x40, 0x00);
        cpu.memory.borrow_mut().write(0, 0x41, 0x20);
        cpu.memory.borrow_mut().write(0, 0x2002, 0x60);
        step(&mut cpu, 3);
        assert_eq!(cpu.a(), 0xA0);
        assert_eq!(cpu.op_cycles, 5);
    }

    #[test]
    fn test_sbc_immediate() {
        let mut cpu = setup(&[SEC, LDA_IMM, 0x60, SBC_IMM, 0x40]);
        step(&mut cpu, 3);
        assert_eq!(cpu.a(), 0x20);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
    }

    #[test]
    fn test_sbc_immediate_borrow() {
        let mut cpu = setup(&[SEC, LDA_IMM, 0x40, SBC_IMM, 0x60]);
        step(&mut cpu, 3);
        assert_eq!(cpu.a(), 0xE0);
        assert!(!cpu.p.contains(ProcessorStatus::CARRY));
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
    }

    #[test]
    fn test_cmp_immediate_equal() {
        let mut cpu = setup(&[LDA_IMM, 0x40, CMP_IMM, 0x40]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x40);
        assert!(cpu.p.contains(ProcessorStatus::ZERO));
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
    }

    #[test]
    fn test_cmp_immediate_greater() {
        let mut cpu = setup(&[LDA_IMM, 0x40, CMP_IMM, 0x20]);
        step(&mut cpu, 2);
        assert!(!cpu.p.contains(ProcessorStatus::ZERO));
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
    }

    #[test]
    fn test_cmp_immediate_less() {
        let mut cpu = setup(&[LDA_IMM, 0x20, CMP_IMM, 0x40]);
        step(&mut cpu, 2);
        assert!(!cpu.p.contains(ProcessorStatus::CARRY));
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
    }

    #[test]
    fn test_logical_ops() {
        let mut cpu = setup(&[LDA_IMM, 0xF0, AND_IMM, 0x3C, ORA_IMM, 0x01, EOR_IMM, 0xFF]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x30);
        step(&mut cpu, 1);
        assert_eq!(cpu.a(), 0x31);
        step(&mut cpu, 1);
        assert_eq!(cpu.a(), 0xCE);
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
    }

    #[test]
    fn test_asl_accumulator_sets_carry() {
        let mut cpu = setup(&[LDA_IMM, 0x81, ASL_ACC]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x02);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
        assert_eq!(cpu.op_cycles, 2);
    }

    #[test]
    fn test_lsr_accumulator_stores_result() {
        let mut cpu = setup(&[LDA_IMM, 0x03, LSR_ACC]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x01);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
        assert!(!cpu.p.contains(ProcessorStatus::NEGATIVE));
    }

    #[test]
    fn test_rol_ror_round_trip_through_carry() {
        let mut cpu = setup(&[LDA_IMM, 0x80, ROL_ACC, ROL_ACC]);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x00);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
        step(&mut cpu, 1);
        // Carry rotates back in
        assert_eq!(cpu.a(), 0x01);
        assert!(!cpu.p.contains(ProcessorStatus::CARRY));
    }

    #[test]
    fn test_asl_zero_page_rmw_cycles() {
        let mut cpu = setup(&[ASL_ZP, 0x10]);
        cpu.memory.borrow_mut().write(0, 0x10, 0x40);
        step(&mut cpu, 1);
        assert_eq!(cpu.memory.borrow().read(0, 0x10), 0x80);
        assert_eq!(cpu.op_cycles, 5);
    }

    #[test]
    fn test_inc_dec_memory() {
        let mut cpu = setup(&[INC_ZP, 0x10, DEC_ZP, 0x10, DEC_ZP, 0x10]);
        step(&mut cpu, 2);
        assert_eq!(cpu.memory.borrow().read(0, 0x10), 0x00);
        assert!(cpu.p.contains(ProcessorStatus::ZERO));
        step(&mut cpu, 1);
        assert_eq!(cpu.memory.borrow().read(0, 0x10), 0xFF);
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
    }

    #[test]
    fn test_bit_copies_high_bits() {
        let mut cpu = setup(&[LDA_IMM, 0x01, BIT_ZP, 0x10]);
        cpu.memory.borrow_mut().write(0, 0x10, 0xC0);
        step(&mut cpu, 2);
        assert!(cpu.p.contains(ProcessorStatus::NEGATIVE));
        assert!(cpu.p.contains(ProcessorStatus::OVERFLOW));
        assert!(cpu.p.contains(ProcessorStatus::ZERO));
    }

    #[test]
    fn test_branch_not_taken_costs_operand_only() {
        let mut cpu = setup(&[BNE, 0x10]);
        cpu.p.insert(ProcessorStatus::ZERO);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0302);
        assert_eq!(cpu.op_cycles, 2);
    }

    #[test]
    fn test_branch_taken_same_page() {
        let mut cpu = setup(&[BEQ, 0x10]);
        cpu.p.insert(ProcessorStatus::ZERO);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0312);
        assert_eq!(cpu.op_cycles, 2);
    }

    #[test]
    fn test_branch_taken_page_cross_costs_extra_cycle() {
        let mut cpu = setup(&[BEQ, 0x7F]);
        cpu.p.insert(ProcessorStatus::ZERO);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0381);
        assert_eq!(cpu.op_cycles, 2);

        let mut cpu = setup(&[BEQ, 0x80]);
        cpu.p.insert(ProcessorStatus::ZERO);
        step(&mut cpu, 1);
        // Backwards across the page boundary
        assert_eq!(cpu.pc, 0x0282);
        assert_eq!(cpu.op_cycles, 3);
    }

    #[test]
    fn test_branch_predicates() {
        // BCC taken on carry clear
        let mut cpu = setup(&[BCC, 0x02]);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0304);
        // BCS not taken on carry clear
        let mut cpu = setup(&[BCS, 0x02]);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0302);
        // BMI taken on negative
        let mut cpu = setup(&[LDA_IMM, 0x80, BMI, 0x02]);
        step(&mut cpu, 2);
        assert_eq!(cpu.pc, 0x0306);
        // BPL not taken on negative
        let mut cpu = setup(&[LDA_IMM, 0x80, BPL, 0x02]);
        step(&mut cpu, 2);
        assert_eq!(cpu.pc, 0x0304);
        // BVC taken while overflow stays clear
        let mut cpu = setup(&[BVC, 0x02]);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0304);
    }

    #[test]
    fn test_jmp_absolute() {
        let mut cpu = setup(&[JMP_ABS, 0x00, 0x40]);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x4000);
    }

    #[test]
    fn test_jmp_indirect_reads_full_word() {
        let mut cpu = setup(&[JMP_IND, 0x00, 0x20]);
        cpu.memory.borrow_mut().write(0, 0x2000, 0x34);
        cpu.memory.borrow_mut().write(0, 0x2001, 0x12);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn test_jsr_rts_round_trip() {
        let mut cpu = setup(&[JSR, 0x00, 0x40]);
        cpu.memory.borrow_mut().write(0, 0x4000, RTS);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x4000);
        assert_eq!(cpu.sp, 0x1FD);
        // The last operand byte of the JSR is at 0x0302
        assert_eq!(cpu.memory.borrow().read(0, 0x1FF), 0x03);
        assert_eq!(cpu.memory.borrow().read(0, 0x1FE), 0x02);
        assert_eq!(cpu.op_cycles, 6);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0303);
        assert_eq!(cpu.sp, 0x1FF);
        assert_eq!(cpu.op_cycles, 5);
    }

    #[test]
    fn test_stack_push_pop() {
        let mut cpu = setup(&[LDA_IMM, 0x42, PHA, LDA_IMM, 0x00, PLA]);
        step(&mut cpu, 3);
        assert_eq!(cpu.sp, 0x1FE);
        assert_eq!(cpu.memory.borrow().read(0, 0x1FF), 0x42);
        assert_eq!(cpu.a(), 0x00);
        step(&mut cpu, 1);
        assert_eq!(cpu.a(), 0x42);
        assert_eq!(cpu.sp, 0x1FF);
    }

    #[test]
    fn test_stack_uses_stack_segment() {
        let mut cpu = setup(&[LDA_IMM, 0x42, PHA]);
        cpu.ss = 0x05;
        step(&mut cpu, 2);
        assert_eq!(cpu.memory.borrow().read(0x05, 0x1FF), 0x42);
        assert_eq!(cpu.memory.borrow().read(0x00, 0x1FF), 0x00);
    }

    #[test]
    fn test_php_plp_round_trip() {
        let mut cpu = setup(&[SEC, PHP, CLC, PLP]);
        step(&mut cpu, 3);
        assert!(!cpu.p.contains(ProcessorStatus::CARRY));
        step(&mut cpu, 1);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
    }

    #[test]
    fn test_txs_tsx() {
        let mut cpu = setup(&[LDX_IMM, 0x80, TXS, LDX_IMM, 0x00, TSX]);
        step(&mut cpu, 2);
        assert_eq!(cpu.sp, 0x180);
        step(&mut cpu, 2);
        assert_eq!(cpu.x(), 0x80);
    }

    #[test]
    fn test_transfers() {
        let mut cpu = setup(&[LDA_IMM, 0x7A, TAX, TAY, LDA_IMM, 0x00, TXA]);
        step(&mut cpu, 3);
        assert_eq!(cpu.x(), 0x7A);
        assert_eq!(cpu.y(), 0x7A);
        step(&mut cpu, 2);
        assert_eq!(cpu.a(), 0x7A);
    }

    #[test]
    fn test_flag_set_clear_ops() {
        let mut cpu = setup(&[SEC, SED, SEI, CLC, CLD, CLI]);
        step(&mut cpu, 3);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
        assert!(cpu.p.contains(ProcessorStatus::DECIMAL));
        assert!(cpu.p.contains(ProcessorStatus::INTERRUPT));
        step(&mut cpu, 3);
        assert_eq!(cpu.p, ProcessorStatus::default());
    }

    #[test]
    fn test_sta_variants() {
        let mut cpu = setup(&[
            LDA_IMM, 0x55, STA_ZP, 0x10, STA_ABS, 0x00, 0x20, LDX_IMM, 0x01, STA_ABSX, 0x00, 0x21,
        ]);
        step(&mut cpu, 4);
        assert_eq!(cpu.memory.borrow().read(0, 0x10), 0x55);
        assert_eq!(cpu.memory.borrow().read(0, 0x2000), 0x55);
        step(&mut cpu, 1);
        assert_eq!(cpu.memory.borrow().read(0, 0x2101), 0x55);
        assert_eq!(cpu.op_cycles, 5);
    }

    #[test]
    fn test_sta_indirect_y_indexes_with_y() {
        let mut cpu = setup(&[LDA_IMM, 0x66, LDY_IMM, 0x04, STA_INDY, 0x40]);
        cpu.memory.borrow_mut().write(0, 0x40, 0x00);
        cpu.memory.borrow_mut().write(0, 0x41, 0x20);
        step(&mut cpu, 3);
        assert_eq!(cpu.memory.borrow().read(0, 0x2004), 0x66);
    }

    #[test]
    fn test_loads_and_stores_use_data_segment() {
        let mut cpu = setup(&[LDA_IMM, 0x99, STA_ABS, 0x00, 0x40, LDA_ABS, 0x00, 0x50]);
        cpu.ds = 0x07;
        cpu.memory.borrow_mut().write(0x07, 0x5000, 0x33);
        step(&mut cpu, 2);
        assert_eq!(cpu.memory.borrow().read(0x07, 0x4000), 0x99);
        assert_eq!(cpu.memory.borrow().read(0x00, 0x4000), 0x00);
        step(&mut cpu, 1);
        assert_eq!(cpu.a(), 0x33);
    }

    #[test]
    fn test_nop_changes_only_pc_and_cycles() {
        let mut cpu = setup(&[NOP, NOP, NOP]);
        cpu.set_a(0x12);
        cpu.p.insert(ProcessorStatus::CARRY);
        let regs = cpu.regs;
        let p = cpu.p;
        let sp = cpu.sp;
        for i in 1..=3u16 {
            cpu.execute_next_instruction();
            assert_eq!(cpu.pc, 0x0300 + i);
            assert_eq!(cpu.op_cycles, 2);
            assert_eq!(cpu.regs, regs);
            assert_eq!(cpu.p, p);
            assert_eq!(cpu.sp, sp);
        }
    }

    #[test]
    fn test_brk_pushes_and_vectors() {
        let mut cpu = setup(&[BRK]);
        step(&mut cpu, 1);
        // Return address 0x0302 then the status byte
        assert_eq!(cpu.sp, 0x1FC);
        assert_eq!(cpu.memory.borrow().read(0, 0x1FF), 0x03);
        assert_eq!(cpu.memory.borrow().read(0, 0x1FE), 0x02);
        assert_eq!(cpu.memory.borrow().read(0, 0x1FD), 0x20); // flags clear, bit 5 set
        assert!(cpu.p.contains(ProcessorStatus::INTERRUPT));
        assert_eq!(cpu.ps, 0);
        assert_eq!(cpu.ds, 0);
        assert_eq!(cpu.ss, 0);
        assert_eq!(cpu.pc, 0x0300);
        assert_eq!(cpu.state, ProcessorState::Normal);
        assert_eq!(cpu.op_cycles, 6);
    }

    #[test]
    fn test_brk_halts_when_configured() {
        let mut cpu = setup(&[BRK]);
        cpu.halt_on_brk = true;
        step(&mut cpu, 1);
        assert_eq!(cpu.state, ProcessorState::Halt);
    }

    #[test]
    fn test_brk_clears_segments() {
        let mut cpu = setup(&[BRK]);
        cpu.ds = 0x11;
        cpu.ss = 0x22;
        // Stack writes land in segment 0x22 before the selectors clear
        step(&mut cpu, 1);
        assert_eq!(cpu.memory.borrow().read(0x22, 0x1FF), 0x03);
        assert_eq!(cpu.ds, 0);
        assert_eq!(cpu.ss, 0);
    }

    #[test]
    fn test_rti_restores_status_and_pc() {
        let mut cpu = setup(&[BRK]);
        cpu.p.insert(ProcessorStatus::CARRY);
        step(&mut cpu, 1);
        // BRK vectored back to 0x0300; replace it with RTI and return
        cpu.memory.borrow_mut().write(0, 0x0300, RTI);
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0302);
        assert!(cpu.p.contains(ProcessorStatus::CARRY));
        assert!(!cpu.p.contains(ProcessorStatus::INTERRUPT));
        assert_eq!(cpu.sp, 0x1FF);
    }

    #[test]
    fn test_execute_until_break_stops_on_brk() {
        let mut cpu = setup(&[LDA_IMM, 0x01, BRK]);
        cpu.execute_until_break();
        assert_eq!(cpu.a(), 0x01);
        assert_eq!(cpu.state, ProcessorState::Halt);
        // The forced halt-on-BRK policy is restored afterwards
        assert!(!cpu.halt_on_brk);
    }

    #[test]
    fn test_execute_until_break_unhalts_first() {
        let mut cpu = setup(&[BRK]);
        cpu.state = ProcessorState::Halt;
        cpu.execute_until_break();
        assert_eq!(cpu.state, ProcessorState::Halt);
        assert_eq!(cpu.pc, 0x0300); // the BRK at 0x0300 ran and vectored back
    }

    #[test]
    fn test_illegal_instruction_ignored() {
        let mut cpu = setup(&[0x02, NOP]);
        cpu.set_a(0x42);
        step(&mut cpu, 1);
        assert_eq!(cpu.state, ProcessorState::Normal);
        assert_eq!(cpu.a(), 0x42);
        assert_eq!(cpu.op_cycles, 1);
        assert_eq!(cpu.pc, 0x0301);
    }

    #[test]
    fn test_illegal_instruction_halts() {
        let mut cpu = setup(&[0x02]);
        cpu.ignore_illegal_instructions = false;
        cpu.allow_halting = true;
        step(&mut cpu, 1);
        assert_eq!(cpu.state, ProcessorState::Halt);
        assert_eq!(cpu.op_seg, 0);
        assert_eq!(cpu.op_pc, 0x0300);
    }

    #[test]
    fn test_illegal_instruction_resets() {
        let mut cpu = setup(&[0x02]);
        cpu.ignore_illegal_instructions = false;
        cpu.allow_halting = false;
        step(&mut cpu, 1);
        assert_eq!(cpu.state, ProcessorState::Reset);
        // The next step reboots the machine
        step(&mut cpu, 1);
        assert_eq!(cpu.state, ProcessorState::Normal);
        assert_eq!(cpu.pc, 0x0300);
    }

    #[test]
    fn test_65c02_gating() {
        let mut cpu = setup(&[BRA, 0x02]);
        cpu.ignore_illegal_instructions = false;
        cpu.allow_halting = true;
        step(&mut cpu, 1);
        assert_eq!(cpu.state, ProcessorState::Halt);

        let mut cpu = setup(&[BRA, 0x02]);
        cpu.allow_65c02 = true;
        step(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x0304);
        assert_eq!(cpu.state, ProcessorState::Normal);
    }

    #[test]
    fn test_65x02_gating() {
        let mut cpu = setup(&[XTOP1, 0x08]);
        cpu.ignore_illegal_instructions = false;
        cpu.allow_halting = true;
        step(&mut cpu, 1);
        assert_eq!(cpu.state, ProcessorState::Halt);
    }

    #[test]
    fn test_stz_writes_zero() {
        let mut cpu = setup(&[STZ_ZP, 0x10, STZ_ABS, 0x00, 0x20]);
        cpu.allow_65c02 = true;
        cpu.memory.borrow_mut().write(0, 0x10, 0xAA);
        cpu.memory.borrow_mut().write(0, 0x2000, 0xBB);
        step(&mut cpu, 2);
        assert_eq!(cpu.memory.borrow().read(0, 0x10), 0x00);
        assert_eq!(cpu.memory.borrow().read(0, 0x2000), 0x00);
    }

    #[test]
    fn test_register8_views_alias_slots() {
        let memory = Rc::new(RefCell::new(Memory::new()));
        let mut cpu = Cpu::new(memory);
        cpu.set_register32(0, 0xDEAD_BEEF);
        assert_eq!(cpu.register8(0), 0xEF);
        assert_eq!(cpu.register8(1), 0xBE);
        assert_eq!(cpu.register8(2), 0xAD);
        assert_eq!(cpu.register8(3), 0xDE);
        assert_eq!(cpu.register16(0), 0xBEEF);
        assert_eq!(cpu.register16(1), 0xDEAD);
        // A and X are lanes 1 and 3 of slot 0
        assert_eq!(cpu.a(), 0xBE);
        assert_eq!(cpu.x(), 0xDE);
    }

    #[test]
    fn test_register8_writes_do_not_disturb_neighbors() {
        let memory = Rc::new(RefCell::new(Memory::new()));
        let mut cpu = Cpu::new(memory);
        cpu.set_register32(1, 0x1122_3344);
        cpu.set_register8(6, 0xFF); // slot 1, lane 2
        assert_eq!(cpu.register32(1), 0x11FF_3344);
        cpu.set_register16(3, 0xAAAA); // slot 1, high half
        assert_eq!(cpu.register32(1), 0xAAAA_3344);
    }

    #[test]
    fn test_y_is_slot_one_lane_one() {
        let memory = Rc::new(RefCell::new(Memory::new()));
        let mut cpu = Cpu::new(memory);
        cpu.set_y(0x77);
        assert_eq!(cpu.register32(1), 0x0000_7700);
        assert_eq!(cpu.register8(5), 0x77);
    }

    #[test]
    fn test_dump_regs_layout() {
        let memory = Rc::new(RefCell::new(Memory::new()));
        let mut cpu = Cpu::new(memory);
        cpu.set_register32(0, 0xDEAD_BEEF);
        let mut out = Vec::new();
        cpu.dump_regs(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("d0=EF d1=BE d2=AD d3=DE"));
        assert!(text.contains("w0=BEEF w1=DEAD"));
        assert!(text.contains("x0=DEADBEEF"));
    }
}
