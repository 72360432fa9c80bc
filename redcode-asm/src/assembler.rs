use std::collections::BTreeMap;

use redcode::{Program, RelaxedCompleteInstruction};

use crate::{
    error::{AsmError, AsmErrorKind},
    expr::{Expr, ExprError},
    line_parser::InstrStmt,
    scanner::{ScannedStatement, Scanner},
};

/// Assemble Redcode '94 source text into a position-independent
/// [`Program`].
///
/// `file` names the source in error locations only; no I/O happens here.
///
/// # Errors
///
/// Returns the first [`AsmError`] encountered: scanning, grammar, constant
/// and loop expansion errors as they appear, then unresolved symbols and
/// expression failures from the label post-pass.
pub fn assemble(file: &str, source: &str) -> Result<Program, AsmError> {
    let mut scanner = Scanner::new(file, source);
    let mut stmts: Vec<(u32, InstrStmt)> = Vec::new();
    let mut labels: BTreeMap<String, i32> = BTreeMap::new();
    let mut start: Option<(u32, Expr)> = None;

    while let Some(scanned) = scanner.next_statement()? {
        if let Some(label) = scanned.label {
            let offset = offset_i32(stmts.len(), file, scanned.line)?;
            if labels.insert(label.clone(), offset).is_some() {
                return Err(AsmError::new(
                    file,
                    scanned.line,
                    1,
                    AsmErrorKind::LabelCollision(label),
                ));
            }
        }
        match scanned.stmt {
            // The last ORG or END expression to be scanned wins
            ScannedStatement::Org(expr) => start = Some((scanned.line, expr)),
            ScannedStatement::End(Some(expr)) => {
                start = Some((scanned.line, expr));
            }
            ScannedStatement::End(None) => {}
            ScannedStatement::Instr(instr) => stmts.push((scanned.line, instr)),
        }
    }

    // Post-pass: every operand expression collapses to an integer field,
    // PC-relative to its own instruction
    let mut code = Vec::with_capacity(stmts.len());
    for (offset, (line, stmt)) in stmts.iter().enumerate() {
        let origin = offset_i32(offset, file, *line)?;
        let a_field = eval_field(&stmt.a, &labels, origin, file, *line)?;
        let b_field = eval_field(&stmt.b, &labels, origin, file, *line)?;
        code.push(RelaxedCompleteInstruction {
            instr: stmt.instr,
            a_field,
            b_field,
        });
    }

    let start = match start {
        None => 0,
        Some((line, expr)) => {
            let value = eval_field(&expr, &labels, 0, file, line)?;
            let len = offset_i32(code.len(), file, line)?;
            if value < 0 || value >= len {
                return Err(AsmError::new(
                    file,
                    line,
                    1,
                    AsmErrorKind::Syntax(format!(
                        "start offset {value} is outside the program"
                    )),
                ));
            }
            value
        }
    };

    Ok(Program {
        code,
        start,
        labels,
        metadata: scanner.into_metadata(),
    })
}

/// Evaluate an operand or start expression, mapping failures to located
/// assembly errors
fn eval_field(
    expr: &Expr,
    labels: &BTreeMap<String, i32>,
    origin: i32,
    file: &str,
    line: u32,
) -> Result<i32, AsmError> {
    expr.eval(labels, origin).map_err(|err| {
        let kind = match err {
            ExprError::UnknownSymbol(name) => {
                AsmErrorKind::UnknownSymbol(name)
            }
            ExprError::DivByZero => AsmErrorKind::DivByZeroInExpr,
        };
        AsmError::new(file, line, 1, kind)
    })
}

/// Convert an instruction offset to `i32`, erroring on absurdly long
/// programs rather than truncating
fn offset_i32(offset: usize, file: &str, line: u32) -> Result<i32, AsmError> {
    i32::try_from(offset).map_err(|_err| {
        AsmError::new(
            file,
            line,
            1,
            AsmErrorKind::Syntax("program is too long".to_owned()),
        )
    })
}

#[cfg(test)]
mod tests {
    use redcode::{AddrMode, Modifier, Opcode};

    use super::*;

    /// Assemble or panic with the rendered error
    fn asm(source: &str) -> Program {
        assemble("test.red", source)
            .unwrap_or_else(|e| panic!("{}", e.render(source)))
    }

    #[test]
    fn labels_resolve_pc_relative() {
        let program = asm("
            start ADD.AB #4, target
                  JMP start
            target DAT #0, #0
        ");
        assert_eq!(program.len(), 3);
        // `target` is two instructions below the ADD
        assert_eq!(program.code[0].b_field, 2);
        // `start` is one instruction above the JMP
        assert_eq!(program.code[1].a_field, -1);
        assert_eq!(program.labels["target"], 2);
    }

    #[test]
    fn equ_constants_substitute_textually() {
        let program = asm("
            step EQU 2+2
            ADD.AB #step, $step
        ");
        assert_eq!(program.code[0].a_field, 4);
        assert_eq!(program.code[0].b_field, 4);
    }

    #[test]
    fn redefined_constant_is_an_error() {
        let err = assemble("t", "x EQU 1\nx EQU 2\nDAT 0, 0").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::RedefinedConstant("x".to_owned()));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn preamble_is_ignored_when_marker_present() {
        let program = asm("
            this is junk the scanner never parses
            ;redcode-94
            MOV.I $0, $1
        ");
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn lines_after_end_are_ignored() {
        let program = asm("MOV.I $0, $1\nEND\nDAT #9, #9\n");
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn a_marker_after_end_reactivates_scanning() {
        let program =
            asm(";redcode\nNOP 0\nEND\nDAT #9, #9\n;redcode\nNOP 1\n");
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn metadata_comments_accumulate() {
        let program = asm("
            ;name Sleepy
            ;author Nobody
            ;strategy wait
            ;strategy then wait more
            NOP 0
        ");
        assert_eq!(program.metadata.name.as_deref(), Some("Sleepy"));
        assert_eq!(program.metadata.author.as_deref(), Some("Nobody"));
        assert_eq!(
            program.metadata.strategies,
            vec!["wait".to_owned(), "then wait more".to_owned()]
        );
    }

    #[test]
    fn org_and_end_set_the_start_offset() {
        let program = asm("ORG 1\nNOP 0\nNOP 0\n");
        assert_eq!(program.start, 1);
        let program = asm("NOP 0\nNOP 0\nEND 1\n");
        assert_eq!(program.start, 1);
        // the last one scanned wins
        let program = asm("ORG 0\nNOP 0\nNOP 0\nEND 1\n");
        assert_eq!(program.start, 1);
    }

    #[test]
    fn org_may_reference_a_label() {
        let program = asm("
            DAT #0, #0
            begin MOV.I $0, $1
            ORG begin
        ");
        assert_eq!(program.start, 1);
    }

    #[test]
    fn start_offset_outside_program_is_an_error() {
        let err = assemble("t", "NOP 0\nORG 4\n").unwrap_err();
        assert!(matches!(err.kind, AsmErrorKind::Syntax(_)));
    }

    #[test]
    fn unknown_symbol_is_reported_with_location() {
        let err = assemble("t", "NOP 0\nJMP ghost\n").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::UnknownSymbol("ghost".to_owned()));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn label_collision_is_an_error() {
        let err =
            assemble("t", "x NOP 0\nx NOP 0\n").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::LabelCollision("x".to_owned()));
    }

    #[test]
    fn division_by_zero_in_operand_is_fatal() {
        let err = assemble("t", "DAT #1/0, #0\n").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::DivByZeroInExpr);
    }

    #[test]
    fn for_loop_unrolls_the_body() {
        let program = asm("
            COUNT EQU 3
            LBL   FOR COUNT
                  DAT #LBL, #0
                  ROF
        ");
        assert_eq!(program.len(), 3);
        for (i, instr) in program.code.iter().enumerate() {
            assert_eq!(instr.instr.opcode, Opcode::Dat);
            assert_eq!(instr.instr.modifier, Modifier::F);
            assert_eq!(instr.a_field, i32::try_from(i).unwrap() + 1);
        }
    }

    #[test]
    fn for_zero_emits_nothing() {
        let program = asm("FOR 0\nDAT #0, #0\nROF\nNOP 0\n");
        assert_eq!(program.len(), 1);
        assert_eq!(program.code[0].instr.opcode, Opcode::Nop);
    }

    #[test]
    fn for_one_pads_the_ampersand_form() {
        let program = asm("i FOR 1\nwave&i DAT #i, #0\nROF\nJMP wave01\n");
        assert_eq!(program.len(), 2);
        assert_eq!(program.labels["wave01"], 0);
        assert_eq!(program.code[0].a_field, 1);
        // the JMP at offset 1 reaches back to wave01 at offset 0
        assert_eq!(program.code[1].a_field, -1);
    }

    #[test]
    fn nested_for_loops_multiply() {
        let program = asm("
            i FOR 2
            j FOR 3
            DAT #i, #j
            ROF
            ROF
        ");
        assert_eq!(program.len(), 6);
        let fields: Vec<(i32, i32)> = program
            .code
            .iter()
            .map(|c| (c.a_field, c.b_field))
            .collect();
        assert_eq!(
            fields,
            vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]
        );
    }

    #[test]
    fn for_without_rof_is_an_error() {
        let err = assemble("t", "FOR 2\nDAT #0, #0\n").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::ForWithoutRof);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn stray_rof_is_an_error() {
        let err = assemble("t", "ROF\n").unwrap_err();
        assert!(matches!(err.kind, AsmErrorKind::Syntax(_)));
    }

    #[test]
    fn missing_a_operand_is_located() {
        let err = assemble("war.red", "NOP 0\nDAT\n").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::MissingOperand);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn crlf_sources_assemble() {
        let program = asm("MOV.I $0, $1\r\nJMP $-1\r\n");
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn dwarf_assembles_to_the_classic_image() {
        let program = asm("
            ;redcode-94
            ;name Dwarf
            step   EQU 4
                   ADD.AB #step, target
                   MOV.AB #0,    @target
                   JMP    $-2
            target DAT    #0,    #0
                   END
        ");
        assert_eq!(program.len(), 4);
        assert_eq!(program.metadata.name.as_deref(), Some("Dwarf"));
        let add = &program.code[0];
        assert_eq!(add.instr.opcode, Opcode::Add);
        assert_eq!(add.instr.modifier, Modifier::AB);
        assert_eq!(add.a_field, 4);
        assert_eq!(add.b_field, 3);
        let mov = &program.code[1];
        assert_eq!(mov.instr.b_addr_mode, AddrMode::IndirectB);
        assert_eq!(mov.b_field, 2);
        let jmp = &program.code[2];
        assert_eq!(jmp.a_field, -2);
    }

    #[test]
    fn pretty_printed_programs_reassemble_identically() {
        let program = asm("
            ;name Roundtrip
            ;strategy print and parse again
            start ADD.AB #4, target
                  MOV.AB #0, @target
                  JMP start
            target DAT #0, #0
            ORG start
        ");
        let printed = program.to_string();
        let reparsed = asm(&printed);
        assert_eq!(reparsed.code, program.code);
        assert_eq!(reparsed.start, program.start);
        assert_eq!(reparsed.metadata, program.metadata);
    }
}
