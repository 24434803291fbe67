pub mod bits;
pub mod cpu;
pub mod flags;
pub mod machine;
pub mod memory;
pub mod opcode;
pub mod xtop1;
pub mod xtop2;
pub mod xtop3;
