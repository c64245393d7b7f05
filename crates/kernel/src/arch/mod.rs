//! Architecture-specific code. One target: 32-bit protected-mode x86.

pub mod x86;
