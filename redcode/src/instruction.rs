use core::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Field values are positive offsets from the address of their own cell,
/// stored and interpreted modulo the core size.
pub type FieldValue = u32;

/// The opcode portion of a Redcode '94 instruction.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum Opcode {
    /// Remove the executing process from its warrior's queue
    Dat,
    /// Copy fields (or the whole instruction) from the A-target into the
    /// B-target
    Mov,
    /// Add A-value fields into the B-target
    Add,
    /// Subtract A-value fields from the B-target
    Sub,
    /// Multiply B-target fields by A-value fields
    Mul,
    /// Divide B-target fields by A-value fields.  A zero divisor leaves the
    /// corresponding field unmodified and terminates the process once every
    /// selected field has been attempted.
    Div,
    /// Remainder of B-target fields divided by A-value fields, with the same
    /// zero-divisor behavior as [`Opcode::Div`]
    Mod,
    /// Queue the A-pointer unconditionally
    Jmp,
    /// Queue the A-pointer if the B-value is zero
    Jmz,
    /// Queue the A-pointer if the B-value is nonzero
    Jmn,
    /// Decrement the B-target, then queue the A-pointer if the decremented
    /// B-value is nonzero
    Djn,
    /// Queue the next instruction, then also queue the A-pointer (a fork).
    /// When the queue is at capacity only the next instruction survives.
    Spl,
    /// Skip the next instruction if every compared A-value field is less
    /// than its B-value counterpart
    Slt,
    /// Skip the next instruction if the compared values are equal.  `CMP` is
    /// the '88 mnemonic for [`Opcode::Seq`] and executes identically.
    Cmp,
    /// Skip the next instruction if the compared values are equal
    Seq,
    /// Skip the next instruction if any compared field pair differs
    Sne,
    /// Queue the next instruction and do nothing else
    Nop,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The Debug identifier of a variant is its mnemonic
        write!(f, "{self:?}")
    }
}

/// The `.modifier` suffix selecting which instruction fields an opcode
/// reads and writes.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum Modifier {
    /// A-number of the A-instruction combines with the A-number of the
    /// B-instruction; writes land in the B-target's A-number
    A,
    /// B-number with B-number; writes land in the B-target's B-number
    B,
    /// A-number of the A-instruction against the B-number of the
    /// B-instruction; writes land in the B-target's B-number
    AB,
    /// B-number of the A-instruction against the A-number of the
    /// B-instruction; writes land in the B-target's A-number
    BA,
    /// Both numbers pairwise: A with A, B with B
    F,
    /// Both numbers crosswise: A with B, B with A
    X,
    /// The whole instruction.  Opcodes without whole-instruction semantics
    /// treat `I` as [`Modifier::F`].
    I,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The Debug identifier of a variant is its mnemonic
        write!(f, "{self:?}")
    }
}

/// The addressing mode applied to one operand of an instruction.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum AddrMode {
    /// `#`: the operand is data; its pointer is the executing instruction
    /// itself
    Immediate,
    /// `$`: the field is an offset from the program counter
    Direct,
    /// `*`: the field points at an instruction whose A-number supplies the
    /// secondary offset
    IndirectA,
    /// `@`: the field points at an instruction whose B-number supplies the
    /// secondary offset
    IndirectB,
    /// `{`: as `*`, but the intermediate A-number is decremented before use
    PredecA,
    /// `<`: as `@`, but the intermediate B-number is decremented before use
    PredecB,
    /// `}`: as `*`, but the intermediate A-number is incremented after the
    /// operation completes
    PostincA,
    /// `>`: as `@`, but the intermediate B-number is incremented after the
    /// operation completes
    PostincB,
}

impl fmt::Display for AddrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Immediate => write!(f, "#"),
            Self::Direct => write!(f, "$"),
            Self::IndirectA => write!(f, "*"),
            Self::IndirectB => write!(f, "@"),
            // "{{" is the escaped form of "{"
            Self::PredecA => write!(f, "{{"),
            Self::PredecB => write!(f, "<"),
            // "}}" is the escaped form of "}"
            Self::PostincA => write!(f, "}}"),
            Self::PostincB => write!(f, ">"),
        }
    }
}

/// A Redcode instruction: opcode, modifier, and both addressing modes,
/// without field values.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// The opcode portion, e.g. `DAT` or `JMP`
    pub opcode: Opcode,
    /// The modifier portion, e.g. `.BA` or `.X`
    pub modifier: Modifier,
    /// The addressing mode of the A operand
    pub a_addr_mode: AddrMode,
    /// The addressing mode of the B operand
    pub b_addr_mode: AddrMode,
}

impl Default for Instruction {
    /// The ICWS '94 initial core instruction is `DAT.F $0, $0`.
    fn default() -> Self {
        Self {
            opcode: Opcode::Dat,
            modifier: Modifier::F,
            a_addr_mode: AddrMode::Direct,
            b_addr_mode: AddrMode::Direct,
        }
    }
}

/// An instruction together with its two field values, as stored in a core
/// cell.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct CompleteInstruction {
    /// The opcode, modifier, and modes used by this instruction
    pub instr: Instruction,
    /// The A-field, folded into `[0, core_size)`
    pub a_field: FieldValue,
    /// The B-field, folded into `[0, core_size)`
    pub b_field: FieldValue,
}

impl fmt::Display for CompleteInstruction {
    /// Formats an instruction in '94 source syntax.
    ///
    /// ```
    /// # use redcode::*;
    /// let a = CompleteInstruction {
    ///     instr: Instruction {
    ///         opcode: Opcode::Add,
    ///         modifier: Modifier::AB,
    ///         a_addr_mode: AddrMode::Immediate,
    ///         b_addr_mode: AddrMode::Direct,
    ///     },
    ///     a_field: 16,
    ///     b_field: 32,
    /// };
    ///
    /// assert_eq!(a.to_string(), "Add.AB #16, $32");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} {}{}, {}{}",
            self.instr.opcode,
            self.instr.modifier,
            self.instr.a_addr_mode,
            self.a_field,
            self.instr.b_addr_mode,
            self.b_field
        )
    }
}

/// Determine the modifier a '94 assembler assigns when the source omits the
/// `.modifier` suffix.
///
/// The table is keyed on the opcode and on whether either addressing mode is
/// immediate.
#[must_use]
pub const fn default_modifiers(
    op: Opcode,
    a_mode: AddrMode,
    b_mode: AddrMode,
) -> Modifier {
    #[allow(clippy::match_same_arms)]
    match (op, a_mode, b_mode) {
        // Dat and Nop always default to .F
        (Opcode::Dat | Opcode::Nop, ..) => Modifier::F,
        // Mov and the equality skips:
        // .AB if the A-mode is immediate, .B if only the B-mode is
        // immediate, and .I when neither is
        (
            Opcode::Mov | Opcode::Cmp | Opcode::Seq | Opcode::Sne,
            AddrMode::Immediate,
            _,
        ) => Modifier::AB,
        (
            Opcode::Mov | Opcode::Cmp | Opcode::Seq | Opcode::Sne,
            _,
            AddrMode::Immediate,
        ) => Modifier::B,
        (Opcode::Mov | Opcode::Cmp | Opcode::Seq | Opcode::Sne, ..) => {
            Modifier::I
        }
        // Arithmetic: as above, but .F when neither mode is immediate
        (
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod,
            AddrMode::Immediate,
            _,
        ) => Modifier::AB,
        (
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod,
            _,
            AddrMode::Immediate,
        ) => Modifier::B,
        (
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod,
            ..,
        ) => Modifier::F,
        // Slt: .AB for an immediate A-mode, otherwise .B
        (Opcode::Slt, AddrMode::Immediate, _) => Modifier::AB,
        (Opcode::Slt, ..) => Modifier::B,
        // The jumps and Spl are always .B
        (
            Opcode::Jmp | Opcode::Jmz | Opcode::Jmn | Opcode::Djn | Opcode::Spl,
            ..,
        ) => Modifier::B,
    }
}

/// Utilities for enumerating every valid Redcode instruction.
pub mod test_utils {
    use super::{AddrMode, Instruction, Modifier, Opcode};

    /// Every '94 opcode
    pub const OPCODES: [Opcode; 17] = [
        Opcode::Dat,
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Jmp,
        Opcode::Jmz,
        Opcode::Jmn,
        Opcode::Djn,
        Opcode::Spl,
        Opcode::Slt,
        Opcode::Cmp,
        Opcode::Seq,
        Opcode::Sne,
        Opcode::Nop,
    ];

    /// Every '94 modifier
    pub const MODIFIERS: [Modifier; 7] = [
        Modifier::A,
        Modifier::B,
        Modifier::AB,
        Modifier::BA,
        Modifier::F,
        Modifier::X,
        Modifier::I,
    ];

    /// Every '94 addressing mode
    pub const ADDR_MODES: [AddrMode; 8] = [
        AddrMode::Immediate,
        AddrMode::Direct,
        AddrMode::IndirectA,
        AddrMode::IndirectB,
        AddrMode::PredecA,
        AddrMode::PredecB,
        AddrMode::PostincA,
        AddrMode::PostincB,
    ];

    /// Iterate over every valid '94 instruction
    pub fn all_instructions() -> impl Iterator<Item = Instruction> {
        itertools::iproduct!(
            OPCODES.iter(),
            MODIFIERS.iter(),
            ADDR_MODES.iter(),
            ADDR_MODES.iter()
        )
        .map(|(o, m, a, b)| Instruction {
            opcode: *o,
            modifier: *m,
            a_addr_mode: *a,
            b_addr_mode: *b,
        })
    }
}
