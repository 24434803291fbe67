/// Which instruction set an opcode belongs to. The 65C02 and 65X02 sets
/// are gated by capability flags on the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionSet {
    Standard,
    C02,
    X02,
}

/// An opcode byte with its mnemonic and addressing mode, used for tracing
/// and diagnostics. Execution dispatches on the raw byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// The opcode byte value
    pub code: u8,
    /// The instruction mnemonic (e.g., "ADC", "LDA")
    pub mnemonic: &'static str,
    /// The addressing mode (e.g., "IMM", "ABS", "ZP"); "XOP" marks the
    /// extension opcodes that carry their own sub-decode byte
    pub mode: &'static str,
    /// The instruction set the opcode belongs to
    pub set: InstructionSet,
}

impl OpCode {
    pub const fn new(code: u8, mnemonic: &'static str, mode: &'static str, set: InstructionSet) -> Self {
        Self {
            code,
            mnemonic,
            mode,
            set,
        }
    }

    /// Full instruction name (e.g., "ADC_IMM")
    pub fn name(&self) -> String {
        format!("{}_{}", self.mnemonic, self.mode)
    }
}

// Opcode constants for use in match patterns
pub const BRK: u8 = 0x00;
pub const ORA_INDX: u8 = 0x01;
pub const ORA_ZP: u8 = 0x05;
pub const ASL_ZP: u8 = 0x06;
pub const PHP: u8 = 0x08;
pub const ORA_IMM: u8 = 0x09;
pub const ASL_ACC: u8 = 0x0A;
pub const ORA_ABS: u8 = 0x0D;
pub const ASL_ABS: u8 = 0x0E;
pub const BPL: u8 = 0x10;
pub const ORA_INDY: u8 = 0x11;
pub const ORA_ZPX: u8 = 0x15;
pub const ASL_ZPX: u8 = 0x16;
pub const CLC: u8 = 0x18;
pub const ORA_ABSY: u8 = 0x19;
pub const ORA_ABSX: u8 = 0x1D;
pub const ASL_ABSX: u8 = 0x1E;
pub const JSR: u8 = 0x20;
pub const AND_INDX: u8 = 0x21;
pub const BIT_ZP: u8 = 0x24;
pub const AND_ZP: u8 = 0x25;
pub const ROL_ZP: u8 = 0x26;
pub const PLP: u8 = 0x28;
pub const AND_IMM: u8 = 0x29;
pub const ROL_ACC: u8 = 0x2A;
pub const BIT_ABS: u8 = 0x2C;
pub const AND_ABS: u8 = 0x2D;
pub const ROL_ABS: u8 = 0x2E;
pub const BMI: u8 = 0x30;
pub const AND_INDY: u8 = 0x31;
pub const AND_ZPX: u8 = 0x35;
pub const ROL_ZPX: u8 = 0x36;
pub const SEC: u8 = 0x38;
pub const AND_ABSY: u8 = 0x39;
pub const AND_ABSX: u8 = 0x3D;
pub const ROL_ABSX: u8 = 0x3E;
pub const RTI: u8 = 0x40;
pub const EOR_INDX: u8 = 0x41;
pub const EOR_ZP: u8 = 0x45;
pub const LSR_ZP: u8 = 0x46;
pub const PHA: u8 = 0x48;
pub const EOR_IMM: u8 = 0x49;
pub const LSR_ACC: u8 = 0x4A;
pub const JMP_ABS: u8 = 0x4C;
pub const EOR_ABS: u8 = 0x4D;
pub const LSR_ABS: u8 = 0x4E;
pub const BVC: u8 = 0x50;
pub const EOR_INDY: u8 = 0x51;
pub const EOR_ZPX: u8 = 0x55;
pub const LSR_ZPX: u8 = 0x56;
pub const CLI: u8 = 0x58;
pub const EOR_ABSY: u8 = 0x59;
pub const EOR_ABSX: u8 = 0x5D;
pub const LSR_ABSX: u8 = 0x5E;
pub const RTS: u8 = 0x60;
pub const ADC_INDX: u8 = 0x61;
pub const STZ_ZP: u8 = 0x64;
pub const ADC_ZP: u8 = 0x65;
pub const ROR_ZP: u8 = 0x66;
pub const PLA: u8 = 0x68;
pub const ADC_IMM: u8 = 0x69;
pub const ROR_ACC: u8 = 0x6A;
pub const JMP_IND: u8 = 0x6C;
pub const ADC_ABS: u8 = 0x6D;
pub const ROR_ABS: u8 = 0x6E;
pub const BVS: u8 = 0x70;
pub const ADC_INDY: u8 = 0x71;
pub const STZ_ZPX: u8 = 0x74;
pub const ADC_ZPX: u8 = 0x75;
pub const ROR_ZPX: u8 = 0x76;
pub const SEI: u8 = 0x78;
pub const ADC_ABSY: u8 = 0x79;
pub const ADC_ABSX: u8 = 0x7D;
pub const ROR_ABSX: u8 = 0x7E;
pub const BRA: u8 = 0x80;
pub const STA_INDX: u8 = 0x81;
pub const STY_ZP: u8 = 0x84;
pub const STA_ZP: u8 = 0x85;
pub const STX_ZP: u8 = 0x86;
pub const DEY: u8 = 0x88;
pub const TXA: u8 = 0x8A;
pub const STY_ABS: u8 = 0x8C;
pub const STA_ABS: u8 = 0x8D;
pub const STX_ABS: u8 = 0x8E;
pub const BCC: u8 = 0x90;
pub const STA_INDY: u8 = 0x91;
pub const STY_ZPX: u8 = 0x94;
pub const STA_ZPX: u8 = 0x95;
pub const STX_ZPY: u8 = 0x96;
pub const TYA: u8 = 0x98;
pub const STA_ABSY: u8 = 0x99;
pub const TXS: u8 = 0x9A;
pub const STZ_ABS: u8 = 0x9C;
pub const STA_ABSX: u8 = 0x9D;
pub const STZ_ABSX: u8 = 0x9E;
pub const LDY_IMM: u8 = 0xA0;
pub const LDA_INDX: u8 = 0xA1;
pub const LDX_IMM: u8 = 0xA2;
pub const LDY_ZP: u8 = 0xA4;
pub const LDA_ZP: u8 = 0xA5;
pub const LDX_ZP: u8 = 0xA6;
pub const TAY: u8 = 0xA8;
pub const LDA_IMM: u8 = 0xA9;
pub const TAX: u8 = 0xAA;
pub const LDY_ABS: u8 = 0xAC;
pub const LDA_ABS: u8 = 0xAD;
pub const LDX_ABS: u8 = 0xAE;
pub const BCS: u8 = 0xB0;
pub const LDA_INDY: u8 = 0xB1;
pub const LDY_ZPX: u8 = 0xB4;
pub const LDA_ZPX: u8 = 0xB5;
pub const LDX_ZPY: u8 = 0xB6;
pub const CLV: u8 = 0xB8;
pub const LDA_ABSY: u8 = 0xB9;
pub const TSX: u8 = 0xBA;
pub const LDY_ABSX: u8 = 0xBC;
pub const LDA_ABSX: u8 = 0xBD;
pub const LDX_ABSY: u8 = 0xBE;
pub const CPY_IMM: u8 = 0xC0;
pub const CMP_INDX: u8 = 0xC1;
pub const CPY_ZP: u8 = 0xC4;
pub const CMP_ZP: u8 = 0xC5;
pub const DEC_ZP: u8 = 0xC6;
pub const INY: u8 = 0xC8;
pub const CMP_IMM: u8 = 0xC9;
pub const DEX: u8 = 0xCA;
pub const CPY_ABS: u8 = 0xCC;
pub const CMP_ABS: u8 = 0xCD;
pub const DEC_ABS: u8 = 0xCE;
pub const BNE: u8 = 0xD0;
pub const CMP_INDY: u8 = 0xD1;
pub const XTOP1_MATH: u8 = 0xD2;
pub const XTOP2_MATH: u8 = 0xD3;
pub const XTOP3_MATH: u8 = 0xD4;
pub const CMP_ZPX: u8 = 0xD5;
pub const DEC_ZPX: u8 = 0xD6;
pub const CLD: u8 = 0xD8;
pub const CMP_ABSY: u8 = 0xD9;
pub const CMP_ABSX: u8 = 0xDD;
pub const DEC_ABSX: u8 = 0xDE;
pub const CPX_IMM: u8 = 0xE0;
pub const SBC_INDX: u8 = 0xE1;
pub const CPX_ZP: u8 = 0xE4;
pub const SBC_ZP: u8 = 0xE5;
pub const INC_ZP: u8 = 0xE6;
pub const INX: u8 = 0xE8;
pub const SBC_IMM: u8 = 0xE9;
pub const NOP: u8 = 0xEA;
pub const CPX_ABS: u8 = 0xEC;
pub const SBC_ABS: u8 = 0xED;
pub const INC_ABS: u8 = 0xEE;
pub const BEQ: u8 = 0xF0;
pub const SBC_INDY: u8 = 0xF1;
pub const XTOP1: u8 = 0xF2;
pub const XTOP2: u8 = 0xF3;
pub const XTOP3: u8 = 0xF4;
pub const SBC_ZPX: u8 = 0xF5;
pub const INC_ZPX: u8 = 0xF6;
pub const XTOP1_TRX: u8 = 0xF7;
pub const SED: u8 = 0xF8;
pub const SBC_ABSY: u8 = 0xF9;
pub const XTOP1_STOR: u8 = 0xFA;
pub const XTOP2_STOR: u8 = 0xFB;
pub const XTOP3_STOR: u8 = 0xFC;
pub const SBC_ABSX: u8 = 0xFD;
pub const INC_ABSX: u8 = 0xFE;

use InstructionSet::{C02, Standard, X02};

// Complete opcode table: standard 6502, the 65C02 subset, and the 65X02
// extension space
pub static OPCODE_TABLE: &[OpCode] = &[
    OpCode::new(BRK, "BRK", "IMP", Standard),
    OpCode::new(ORA_INDX, "ORA", "INDX", Standard),
    OpCode::new(ORA_ZP, "ORA", "ZP", Standard),
    OpCode::new(ASL_ZP, "ASL", "ZP", Standard),
    OpCode::new(PHP, "PHP", "IMP", Standard),
    OpCode::new(ORA_IMM, "ORA", "IMM", Standard),
    OpCode::new(ASL_ACC, "ASL", "ACC", Standard),
    OpCode::new(ORA_ABS, "ORA", "ABS", Standard),
    OpCode::new(ASL_ABS, "ASL", "ABS", Standard),
    OpCode::new(BPL, "BPL", "REL", Standard),
    OpCode::new(ORA_INDY, "ORA", "INDY", Standard),
    OpCode::new(ORA_ZPX, "ORA", "ZPX", Standard),
    OpCode::new(ASL_ZPX, "ASL", "ZPX", Standard),
    OpCode::new(CLC, "CLC", "IMP", Standard),
    OpCode::new(ORA_ABSY, "ORA", "ABSY", Standard),
    OpCode::new(ORA_ABSX, "ORA", "ABSX", Standard),
    OpCode::new(ASL_ABSX, "ASL", "ABSX", Standard),
    OpCode::new(JSR, "JSR", "ABS", Standard),
    OpCode::new(AND_INDX, "AND", "INDX", Standard),
    OpCode::new(BIT_ZP, "BIT", "ZP", Standard),
    OpCode::new(AND_ZP, "AND", "ZP", Standard),
    OpCode::new(ROL_ZP, "ROL", "ZP", Standard),
    OpCode::new(PLP, "PLP", "IMP", Standard),
    OpCode::new(AND_IMM, "AND", "IMM", Standard),
    OpCode::new(ROL_ACC, "ROL", "ACC", Standard),
    OpCode::new(BIT_ABS, "BIT", "ABS", Standard),
    OpCode::new(AND_ABS, "AND", "ABS", Standard),
    OpCode::new(ROL_ABS, "ROL", "ABS", Standard),
    OpCode::new(BMI, "BMI", "REL", Standard),
    OpCode::new(AND_INDY, "AND", "INDY", Standard),
    OpCode::new(AND_ZPX, "AND", "ZPX", Standard),
    OpCode::new(ROL_ZPX, "ROL", "ZPX", Standard),
    OpCode::new(SEC, "SEC", "IMP", Standard),
    OpCode::new(AND_ABSY, "AND", "ABSY", Standard),
    OpCode::new(AND_ABSX, "AND", "ABSX", Standard),
    OpCode::new(ROL_ABSX, "ROL", "ABSX", Standard),
    OpCode::new(RTI, "RTI", "IMP", Standard),
    OpCode::new(EOR_INDX, "EOR", "INDX", Standard),
    OpCode::new(EOR_ZP, "EOR", "ZP", Standard),
    OpCode::new(LSR_ZP, "LSR", "ZP", Standard),
    OpCode::new(PHA, "PHA", "IMP", Standard),
    OpCode::new(EOR_IMM, "EOR", "IMM", Standard),
    OpCode::new(LSR_ACC, "LSR", "ACC", Standard),
    OpCode::new(JMP_ABS, "JMP", "ABS", Standard),
    OpCode::new(EOR_ABS, "EOR", "ABS", Standard),
    OpCode::new(LSR_ABS, "LSR", "ABS", Standard),
    OpCode::new(BVC, "BVC", "REL", Standard),
    OpCode::new(EOR_INDY, "EOR", "INDY", Standard),
    OpCode::new(EOR_ZPX, "EOR", "ZPX", Standard),
    OpCode::new(LSR_ZPX, "LSR", "ZPX", Standard),
    OpCode::new(CLI, "CLI", "IMP", Standard),
    OpCode::new(EOR_ABSY, "EOR", "ABSY", Standard),
    OpCode::new(EOR_ABSX, "EOR", "ABSX", Standard),
    OpCode::new(LSR_ABSX, "LSR", "ABSX", Standard),
    OpCode::new(RTS, "RTS", "IMP", Standard),
    OpCode::new(ADC_INDX, "ADC", "INDX", Standard),
    OpCode::new(STZ_ZP, "STZ", "ZP", C02),
    OpCode::new(ADC_ZP, "ADC", "ZP", Standard),
    OpCode::new(ROR_ZP, "ROR", "ZP", Standard),
    OpCode::new(PLA, "PLA", "IMP", Standard),
    OpCode::new(ADC_IMM, "ADC", "IMM", Standard),
    OpCode::new(ROR_ACC, "ROR", "ACC", Standard),
    OpCode::new(JMP_IND, "JMP", "IND", Standard),
    OpCode::new(ADC_ABS, "ADC", "ABS", Standard),
    OpCode::new(ROR_ABS, "ROR", "ABS", Standard),
    OpCode::new(BVS, "BVS", "REL", Standard),
    OpCode::new(ADC_INDY, "ADC", "INDY", Standard),
    OpCode::new(STZ_ZPX, "STZ", "ZPX", C02),
    OpCode::new(ADC_ZPX, "ADC", "ZPX", Standard),
    OpCode::new(ROR_ZPX, "ROR", "ZPX", Standard),
    OpCode::new(SEI, "SEI", "IMP", Standard),
    OpCode::new(ADC_ABSY, "ADC", "ABSY", Standard),
    OpCode::new(ADC_ABSX, "ADC", "ABSX", Standard),
    OpCode::new(ROR_ABSX, "ROR", "ABSX", Standard),
    OpCode::new(BRA, "BRA", "REL", C02),
    OpCode::new(STA_INDX, "STA", "INDX", Standard),
    OpCode::new(STY_ZP, "STY", "ZP", Standard),
    OpCode::new(STA_ZP, "STA", "ZP", Standard),
    OpCode::new(STX_ZP, "STX", "ZP", Standard),
    OpCode::new(DEY, "DEY", "IMP", Standard),
    OpCode::new(TXA, "TXA", "IMP", Standard),
    OpCode::new(STY_ABS, "STY", "ABS", Standard),
    OpCode::new(STA_ABS, "STA", "ABS", Standard),
    OpCode::new(STX_ABS, "STX", "ABS", Standard),
    OpCode::new(BCC, "BCC", "REL", Standard),
    OpCode::new(STA_INDY, "STA", "INDY", Standard),
    OpCode::new(STY_ZPX, "STY", "ZPX", Standard),
    OpCode::new(STA_ZPX, "STA", "ZPX", Standard),
    OpCode::new(STX_ZPY, "STX", "ZPY", Standard),
    OpCode::new(TYA, "TYA", "IMP", Standard),
    OpCode::new(STA_ABSY, "STA", "ABSY", Standard),
    OpCode::new(TXS, "TXS", "IMP", Standard),
    OpCode::new(STZ_ABS, "STZ", "ABS", C02),
    OpCode::new(STA_ABSX, "STA", "ABSX", Standard),
    OpCode::new(STZ_ABSX, "STZ", "ABSX", C02),
    OpCode::new(LDY_IMM, "LDY", "IMM", Standard),
    OpCode::new(LDA_INDX, "LDA", "INDX", Standard),
    OpCode::new(LDX_IMM, "LDX", "IMM", Standard),
    OpCode::new(LDY_ZP, "LDY", "ZP", Standard),
    OpCode::new(LDA_ZP, "LDA", "ZP", Standard),
    OpCode::new(LDX_ZP, "LDX", "ZP", Standard),
    OpCode::new(TAY, "TAY", "IMP", Standard),
    OpCode::new(LDA_IMM, "LDA", "IMM", Standard),
    OpCode::new(TAX, "TAX", "IMP", Standard),
    OpCode::new(LDY_ABS, "LDY", "ABS", Standard),
    OpCode::new(LDA_ABS, "LDA", "ABS", Standard),
    OpCode::new(LDX_ABS, "LDX", "ABS", Standard),
    OpCode::new(BCS, "BCS", "REL", Standard),
    OpCode::new(LDA_INDY, "LDA", "INDY", Standard),
    OpCode::new(LDY_ZPX, "LDY", "ZPX", Standard),
    OpCode::new(LDA_ZPX, "LDA", "ZPX", Standard),
    OpCode::new(LDX_ZPY, "LDX", "ZPY", Standard),
    OpCode::new(CLV, "CLV", "IMP", Standard),
    OpCode::new(LDA_ABSY, "LDA", "ABSY", Standard),
    OpCode::new(TSX, "TSX", "IMP", Standard),
    OpCode::new(LDY_ABSX, "LDY", "ABSX", Standard),
    OpCode::new(LDA_ABSX, "LDA", "ABSX", Standard),
    OpCode::new(LDX_ABSY, "LDX", "ABSY", Standard),
    OpCode::new(CPY_IMM, "CPY", "IMM", Standard),
    OpCode::new(CMP_INDX, "CMP", "INDX", Standard),
    OpCode::new(CPY_ZP, "CPY", "ZP", Standard),
    OpCode::new(CMP_ZP, "CMP", "ZP", Standard),
    OpCode::new(DEC_ZP, "DEC", "ZP", Standard),
    OpCode::new(INY, "INY", "IMP", Standard),
    OpCode::new(CMP_IMM, "CMP", "IMM", Standard),
    OpCode::new(DEX, "DEX", "IMP", Standard),
    OpCode::new(CPY_ABS, "CPY", "ABS", Standard),
    OpCode::new(CMP_ABS, "CMP", "ABS", Standard),
    OpCode::new(DEC_ABS, "DEC", "ABS", Standard),
    OpCode::new(BNE, "BNE", "REL", Standard),
    OpCode::new(CMP_INDY, "CMP", "INDY", Standard),
    OpCode::new(XTOP1_MATH, "XTOP1_MATH", "XOP", X02),
    OpCode::new(XTOP2_MATH, "XTOP2_MATH", "XOP", X02),
    OpCode::new(XTOP3_MATH, "XTOP3_MATH", "XOP", X02),
    OpCode::new(CMP_ZPX, "CMP", "ZPX", Standard),
    OpCode::new(DEC_ZPX, "DEC", "ZPX", Standard),
    OpCode::new(CLD, "CLD", "IMP", Standard),
    OpCode::new(CMP_ABSY, "CMP", "ABSY", Standard),
    OpCode::new(CMP_ABSX, "CMP", "ABSX", Standard),
    OpCode::new(DEC_ABSX, "DEC", "ABSX", Standard),
    OpCode::new(CPX_IMM, "CPX", "IMM", Standard),
    OpCode::new(SBC_INDX, "SBC", "INDX", Standard),
    OpCode::new(CPX_ZP, "CPX", "ZP", Standard),
    OpCode::new(SBC_ZP, "SBC", "ZP", Standard),
    OpCode::new(INC_ZP, "INC", "ZP", Standard),
    OpCode::new(INX, "INX", "IMP", Standard),
    OpCode::new(SBC_IMM, "SBC", "IMM", Standard),
    OpCode::new(NOP, "NOP", "IMP", Standard),
    OpCode::new(CPX_ABS, "CPX", "ABS", Standard),
    OpCode::new(SBC_ABS, "SBC", "ABS", Standard),
    OpCode::new(INC_ABS, "INC", "ABS", Standard),
    OpCode::new(BEQ, "BEQ", "REL", Standard),
    OpCode::new(SBC_INDY, "SBC", "INDY", Standard),
    OpCode::new(XTOP1, "XTOP1", "XOP", X02),
    OpCode::new(XTOP2, "XTOP2", "XOP", X02),
    OpCode::new(XTOP3, "XTOP3", "XOP", X02),
    OpCode::new(SBC_ZPX, "SBC", "ZPX", Standard),
    OpCode::new(INC_ZPX, "INC", "ZPX", Standard),
    OpCode::new(XTOP1_TRX, "XTOP1_TRX", "XOP", X02),
    OpCode::new(SED, "SED", "IMP", Standard),
    OpCode::new(SBC_ABSY, "SBC", "ABSY", Standard),
    OpCode::new(XTOP1_STOR, "XTOP1_STOR", "XOP", X02),
    OpCode::new(XTOP2_STOR, "XTOP2_STOR", "XOP", X02),
    OpCode::new(XTOP3_STOR, "XTOP3_STOR", "XOP", X02),
    OpCode::new(SBC_ABSX, "SBC", "ABSX", Standard),
    OpCode::new(INC_ABSX, "INC", "ABSX", Standard),
];

/// Lookup an opcode by its byte value
pub fn lookup(code: u8) -> Option<&'static OpCode> {
    OPCODE_TABLE.iter().find(|op| op.code == code)
}
