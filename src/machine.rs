use crate::cpu;
use crate::memory;
use std::cell::RefCell;
use std::rc::Rc;

/// A CPU wired to its memory
pub struct Machine {
    pub memory: Rc<RefCell<memory::Memory>>,
    pub cpu: cpu::Cpu,
}

impl Machine {
    pub fn new() -> Self {
        let memory = Rc::new(RefCell::new(memory::Memory::new()));
        let cpu = cpu::Cpu::new(memory.clone());
        Self { memory, cpu }
    }

    /// Load a program into segment 0 and point all three vectors at it
    pub fn load_program(&mut self, addr: u16, bytes: &[u8]) {
        let lo = (addr & 0xFF) as u8;
        let hi = (addr >> 8) as u8;
        let mut memory = self.memory.borrow_mut();
        memory.program(0, cpu::NMI_VECTOR, &[lo, hi, lo, hi, lo, hi]);
        memory.program(0, addr, bytes);
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
