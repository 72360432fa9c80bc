//! # Nougat-Core
//!
//! A Memory Array Redcode Simulator (MARS) for the CoreWar programming
//! game: a circular core of instructions, an executor implementing the
//! ICWS '94 opcode semantics, and a round scheduler that steps each live
//! warrior one instruction per cycle.
//!
//! The simulation is single-threaded and cooperative at cycle
//! granularity: within one instruction no other process can observe an
//! intermediate state, and [`Mars::step_cycle`] gives hosts a cancellation
//! point between cycles.  Rounds share no state; run independent rounds on
//! their own [`Mars`] values to parallelize a battle.
//!
//! ```
//! use nougat_core::{Mars, MarsConfig, Outcome};
//!
//! let dwarf = redcode_asm::assemble(
//!     "dwarf.red",
//!     "
//!     ;redcode-94
//!     ;name Dwarf
//!     step   EQU 4
//!            ADD.AB #step, target
//!            MOV.AB #0,    @target
//!            JMP    $-2
//!     target DAT    #0,    #0
//!     ",
//! )
//! .unwrap();
//!
//! let mut mars = Mars::new(MarsConfig::default()).unwrap();
//! mars.load(&dwarf, 0).unwrap();
//! let result = mars.run();
//! // alone in the core, the dwarf bombs away until the cycle budget
//! assert_eq!(result.outcome, Outcome::Draw { survivors: vec![1] });
//! ```

#![deny(clippy::all, clippy::cargo)]
#![warn(
    clippy::pedantic,
    clippy::nursery,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::todo,
    clippy::unimplemented
)]
#![allow(clippy::multiple_crate_versions)]

/// Circular instruction memory with ownership tags and access windows
mod core_memory;
pub use core_memory::{
    Cell, Core, CoreAddr, CoreError, FieldSel, Pid, DEFAULT_CORE_SIZE,
};

/// Operand resolution with pre-decrement and post-increment side effects
mod operands;
pub use operands::{Operand, OperandSlot};

/// Per-opcode execution semantics
mod execution;
pub use execution::execute;

/// Capped per-warrior FIFO of program counters
mod processes;
pub use processes::ProcessQueue;

/// Round scheduling: loading, placement, the cycle loop, and outcomes
mod scheduler;
pub use scheduler::{
    Mars, MarsConfig, MarsError, Outcome, RoundResult, DEFAULT_MAX_CYCLES,
    DEFAULT_MAX_LENGTH, DEFAULT_MAX_PROCESSES, DEFAULT_MIN_DISTANCE,
};

/// Push-style execution observers and trace export
mod tracer;
pub use tracer::{
    RecordingTracer, TraceRecord, Tracer, DEFAULT_TRACE_CAPACITY,
};
