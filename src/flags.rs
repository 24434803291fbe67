use bitflags::bitflags;

bitflags! {
    /// Processor status flags
    /// Bit 7: N (Negative)
    /// Bit 6: V (Overflow)
    /// Bit 5: unused, always reads as 1
    /// Bit 4: B (Break)
    /// Bit 3: D (Decimal)
    /// Bit 2: I (Interrupt disable)
    /// Bit 1: Z (Zero)
    /// Bit 0: C (Carry)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProcessorStatus: u8 {
        const CARRY = 1;
        const ZERO = 1 << 1;
        const INTERRUPT = 1 << 2;
        const DECIMAL = 1 << 3;
        const BREAK = 1 << 4;
        const OVERFLOW = 1 << 6;
        const NEGATIVE = 1 << 7;
    }
}

/// Operand width used when recomputing flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    W8,
    W16,
    W32,
}

impl Width {
    /// Mask selecting the low `width` bits of a result
    pub fn mask(self) -> u32 {
        match self {
            Width::W8 => 0xFF,
            Width::W16 => 0xFFFF,
            Width::W32 => 0xFFFF_FFFF,
        }
    }

    /// Mask selecting the sign bit at this width
    pub fn sign_bit(self) -> u32 {
        match self {
            Width::W8 => 0x80,
            Width::W16 => 0x8000,
            Width::W32 => 0x8000_0000,
        }
    }
}

impl ProcessorStatus {
    /// Serialize to the historical flag byte; bit 5 always reads as 1
    pub fn as_byte(self) -> u8 {
        self.bits() | 0x20
    }

    /// Load from a flag byte; bit 5 has no storage and is ignored
    pub fn set_byte(&mut self, byte: u8) {
        *self = ProcessorStatus::from_bits_truncate(byte);
    }

    /// Recompute the flags in `selected` from `result` at the given width.
    /// `result` is truncated to the width first; `baseline` is the value the
    /// caller compares against for carry/borrow detection.
    pub fn set_flags(&mut self, selected: ProcessorStatus, width: Width, result: u32, baseline: u32) {
        let truncated = result & width.mask();
        if selected.contains(ProcessorStatus::ZERO) {
            self.set(ProcessorStatus::ZERO, truncated == 0);
        }
        if selected.contains(ProcessorStatus::NEGATIVE) {
            self.set(ProcessorStatus::NEGATIVE, truncated & width.sign_bit() != 0);
        }
        if selected.contains(ProcessorStatus::CARRY) {
            self.set(ProcessorStatus::CARRY, truncated < baseline);
        }
        if selected.contains(ProcessorStatus::OVERFLOW) {
            // TODO: signed overflow is not computed yet; V always clears
            self.set(ProcessorStatus::OVERFLOW, false);
        }
    }
}
