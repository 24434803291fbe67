use std::io::{self, Write};

/// Size of a single memory segment (64KB)
pub const SEGMENT_SIZE: usize = 64 * 1024;
/// Number of independently addressed segments
pub const NUM_SEGMENTS: usize = 256;

/// One 64KB bank of RAM, zero-initialized
pub struct Segment {
    data: Vec<u8>,
}

impl Segment {
    fn new() -> Self {
        Self {
            data: vec![0; SEGMENT_SIZE],
        }
    }

    /// Clear the segment back to all zeroes
    pub fn init(&mut self) {
        self.data.fill(0);
    }
}

/// Segmented memory: 256 banks of 64KB, addressed by (segment, offset)
/// pairs. Every address is valid by construction; the 8-bit segment
/// selector and 16-bit offset cannot go out of range.
pub struct Memory {
    segments: Vec<Segment>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Create a new memory instance with all segments zeroed
    pub fn new() -> Self {
        Self {
            segments: (0..NUM_SEGMENTS).map(|_| Segment::new()).collect(),
        }
    }

    /// Re-zero the given segments
    pub fn init_segments(&mut self, segments: &[u8]) {
        for &seg in segments {
            self.segments[seg as usize].init();
        }
    }

    /// Read a byte from (segment, offset)
    pub fn read(&self, seg: u8, addr: u16) -> u8 {
        self.segments[seg as usize].data[addr as usize]
    }

    /// Write a byte to (segment, offset), unconditionally
    pub fn write(&mut self, seg: u8, addr: u16, byte: u8) {
        self.segments[seg as usize].data[addr as usize] = byte;
    }

    /// Bulk-load a byte sequence starting at (segment, offset). The offset
    /// advances per byte with 16-bit wraparound; returns the offset just
    /// past the last byte written.
    pub fn program(&mut self, seg: u8, addr: u16, bytes: &[u8]) -> u16 {
        let mut a = addr;
        for &byte in bytes {
            self.segments[seg as usize].data[a as usize] = byte;
            a = a.wrapping_add(1);
        }
        a
    }

    /// Write a hex grid of `count` rows of `width` bytes starting at
    /// (segment, offset). Diagnostic output only.
    pub fn dump<W: Write>(
        &self,
        w: &mut W,
        seg: u8,
        addr: u16,
        width: usize,
        count: usize,
    ) -> io::Result<()> {
        let mut a = addr;
        for _ in 0..count {
            write!(w, "{:02X}:{:04X} : ", seg, a)?;
            for j in 0..width {
                if j > 0 && j % 8 == 0 {
                    write!(w, " ")?;
                }
                write!(w, "{:02X}", self.read(seg, a))?;
                if j < width - 1 {
                    write!(w, " ")?;
                }
                a = a.wrapping_add(1);
            }
            writeln!(w)?;
        }
        Ok(())
    }
}
