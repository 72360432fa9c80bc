use core::fmt;
use std::collections::BTreeMap;

use crate::RelaxedCompleteInstruction;

/// Descriptive information collected from a warrior's special comments.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Metadata {
    /// From the `;name` comment
    pub name: Option<String>,
    /// From the `;author` comment
    pub author: Option<String>,
    /// Every `;strategy` comment, in source order
    pub strategies: Vec<String>,
}

/// An assembled, position-independent warrior.
///
/// Fields are signed offsets relative to each instruction's own address, so
/// a program can be placed anywhere in a core of any size.  The label table
/// records where each source label landed, for debuggers and for
/// pretty-printing diagnostics; execution never consults it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    /// The assembled instructions, in source order
    pub code: Vec<RelaxedCompleteInstruction>,
    /// Offset into the program where execution begins, from `ORG` or
    /// `END <expr>`
    pub start: i32,
    /// Source label name to instruction offset
    pub labels: BTreeMap<String, i32>,
    /// Name, author, and strategy comments
    pub metadata: Metadata,
}

impl Program {
    /// Number of instructions in the program.
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the program contains no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Display for Program {
    /// Pretty-prints the program as assembled '94 source.
    ///
    /// The output carries the metadata comments, an `ORG`, and one fully
    /// resolved instruction per line.  Re-assembling the output yields a
    /// program with an identical instruction vector and start offset
    /// (labels are already resolved into offsets and are not reproduced).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.metadata.name {
            writeln!(f, ";name {name}")?;
        }
        if let Some(author) = &self.metadata.author {
            writeln!(f, ";author {author}")?;
        }
        for strategy in &self.metadata.strategies {
            writeln!(f, ";strategy {strategy}")?;
        }
        writeln!(f, "ORG {}", self.start)?;
        for instr in &self.code {
            writeln!(f, "{instr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AddrMode, Instruction, Modifier, Opcode};

    #[test]
    fn display_prints_metadata_org_and_code() {
        let program = Program {
            code: vec![RelaxedCompleteInstruction {
                instr: Instruction {
                    opcode: Opcode::Mov,
                    modifier: Modifier::I,
                    a_addr_mode: AddrMode::Direct,
                    b_addr_mode: AddrMode::Direct,
                },
                a_field: 0,
                b_field: 1,
            }],
            start: 0,
            labels: BTreeMap::new(),
            metadata: Metadata {
                name: Some("Imp".into()),
                author: Some("A. K. Dewdney".into()),
                strategies: vec!["march forward".into()],
            },
        };
        let printed = program.to_string();
        assert_eq!(
            printed,
            ";name Imp\n;author A. K. Dewdney\n;strategy march forward\n\
             ORG 0\nMov.I $0, $1\n"
        );
    }
}
