//! An assembler for CoreWar's Redcode '94 assembly language.
//!
//! Source text goes in, a position-independent [`redcode::Program`] comes
//! out.  The assembler resolves labels PC-relative, substitutes `EQU`
//! constants textually, unrolls `FOR`/`ROF` loops, evaluates arithmetic and
//! boolean expressions, and fills in omitted instruction modifiers with the
//! ICWS '94 defaults.
//!
//! ```
//! let source = "
//! ;redcode-94
//! ;name Dwarf
//! step EQU 4
//!        ADD.AB #step, target
//!        MOV.AB #0,    @target
//!        JMP    $-2
//! target DAT    #0,    #0
//!        END
//! ";
//! let program = redcode_asm::assemble("dwarf.red", source).unwrap();
//! assert_eq!(program.len(), 4);
//! assert_eq!(program.metadata.name.as_deref(), Some("Dwarf"));
//! ```

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

/// Structured assembly errors with source locations
mod error;
pub use error::{AsmError, AsmErrorKind};

/// Expression trees, their nom grammar, and evaluation
mod expr;
pub use expr::{BinOp, Expr, ExprError, UnaryOp};

/// Small nom parsers for identifiers, numbers, modes, and mnemonics
mod primitives;

/// Per-line grammar: labels, pseudo-ops, and instructions
mod line_parser;

/// Scanning state machine: preamble, comments, `EQU`, and `FOR`/`ROF`
mod scanner;

/// The assembly driver and label-resolution post-pass
mod assembler;
pub use assembler::assemble;
