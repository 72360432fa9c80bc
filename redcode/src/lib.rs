//! Representations for the Redcode assembly language used in CoreWar
//!
//! Covers the instruction set and addressing modes of the ICWS '94 draft
//! standard, the modifier defaulting rules used when a source file omits
//! `.modifier` suffixes, and the assembled-program container produced by an
//! assembler and consumed by a simulator.
//!
//! See also the ['94 ICWS draft](https://corewar.co.uk/standards/icws94.txt)

#![deny(clippy::all, clippy::cargo)]
#![warn(
    clippy::pedantic,
    clippy::nursery,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::todo,
    clippy::unimplemented
)]

/// Instruction, opcode, modifier, and addressing mode types
mod instruction;
pub use crate::instruction::*;

/// Assembly-time instruction forms with signed, unnormalized fields
mod relaxed;
pub use crate::relaxed::*;

/// Assembled warriors: instruction vector, start offset, labels, metadata
mod program;
pub use crate::program::*;
