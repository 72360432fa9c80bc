use core::fmt;

use crate::{CompleteInstruction, FieldValue, Instruction};

/// A [`CompleteInstruction`] whose fields may be negative or larger than the
/// core size.
///
/// Assemblers produce these: labels resolve to signed offsets relative to
/// the instruction's own address, and the core size needed to fold them may
/// not be known until load time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct RelaxedCompleteInstruction {
    /// The opcode, modifier, and modes used by this instruction
    pub instr: Instruction,
    /// The A-field, interpreted modulo the core size
    pub a_field: i32,
    /// The B-field, interpreted modulo the core size
    pub b_field: i32,
}

impl RelaxedCompleteInstruction {
    /// Convert into a [`CompleteInstruction`] by folding both fields modulo
    /// `core_size`.
    #[must_use]
    pub fn normalize(&self, core_size: u32) -> CompleteInstruction {
        CompleteInstruction {
            instr: self.instr,
            a_field: normalize(i64::from(self.a_field), core_size),
            b_field: normalize(i64::from(self.b_field), core_size),
        }
    }
}

impl fmt::Display for RelaxedCompleteInstruction {
    /// Formats the instruction in '94 source syntax with signed fields,
    /// e.g. `Jmp.B $-2, #0`.
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

/// Fold a value into a core offset in `[0, core_size)` using Euclidean
/// modulo, so negative offsets wrap to the top of the core.
///
/// # Panics
///
/// Panics if `core_size` is zero or does not fit an `i64` field offset.
#[must_use]
pub fn normalize(value: i64, core_size: u32) -> FieldValue {
    assert!(core_size > 0, "core size must be nonzero");
    let size = i64::from(core_size);
    let folded = value.rem_euclid(size);
    // rem_euclid of a positive modulus is always in [0, size)
    FieldValue::try_from(folded).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AddrMode, Modifier, Opcode};

    #[test]
    fn normalize_folds_negative_and_oversized_fields() {
        let i = RelaxedCompleteInstruction {
            instr: Instruction::default(),
            a_field: -10,
            b_field: 20,
        };
        let normalized = i.normalize(15);
        assert_eq!(normalized.a_field, 5);
        assert_eq!(normalized.b_field, 5);
    }

    #[test]
    fn normalize_is_idempotent() {
        for v in [-16_000, -8000, -1, 0, 1, 7999, 8000, 16_001] {
            let once = normalize(v, 8000);
            let twice = normalize(i64::from(once), 8000);
            assert_eq!(once, twice);
            assert!(once < 8000);
        }
    }

    #[test]
    #[should_panic = "core size must be nonzero"]
    fn normalize_with_zero_core_size() {
        let _ = normalize(1, 0);
    }

    #[test]
    fn relaxed_display_keeps_sign() {
        let i = RelaxedCompleteInstruction {
            instr: Instruction {
                opcode: Opcode::Jmp,
                modifier: Modifier::B,
                a_addr_mode: AddrMode::Direct,
                b_addr_mode: AddrMode::Immediate,
            },
            a_field: -2,
            b_field: 0,
        };
        assert_eq!(i.to_string(), "Jmp.B $-2, #0");
    }
}
