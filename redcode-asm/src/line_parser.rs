use nom::{character::complete::space0, error::VerboseError, IResult};
use redcode::{default_modifiers, AddrMode, Instruction, Modifier, Opcode};

use crate::{
    error::AsmErrorKind,
    expr::{expression, Expr},
    primitives::{
        addr_mode, identifier, modifier_from_name, opcode_from_name,
        pseudo_from_name, PseudoOp,
    },
};

/// One parsed source line: an optional label and a statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine {
    /// Label defined on this line.  For `FOR` statements this is the loop
    /// variable rather than an address label.
    pub label: Option<String>,
    /// The statement the line contains
    pub stmt: Statement,
}

/// The statement portion of a source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    /// `EQU` with its raw replacement text; the constant name is the line's
    /// label
    Equ(String),
    /// `ORG <expr>`
    Org(Expr),
    /// `END`, optionally with a start expression
    End(Option<Expr>),
    /// `FOR <count>`; the loop variable, if any, is the line's label
    For(Expr),
    /// `ROF`
    Rof,
    /// An ordinary instruction
    Instr(InstrStmt),
}

/// An instruction statement with unresolved operand expressions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrStmt {
    /// Opcode, modifier (explicit or defaulted), and both addressing modes
    pub instr: Instruction,
    /// The A operand expression
    pub a: Expr,
    /// The B operand expression
    pub b: Expr,
}

/// A located parse failure: 1-indexed column plus the error kind
type LineError = (u32, AsmErrorKind);

/// 1-indexed column of `rest` within `line`
#[allow(clippy::cast_possible_truncation)]
fn col(line: &str, rest: &str) -> u32 {
    (line.len() - rest.len() + 1) as u32
}

/// Advance past horizontal whitespace.  Never fails.
fn skip_space(input: &str) -> &str {
    let spaces: IResult<&str, &str, VerboseError<&str>> = space0(input);
    spaces.map_or(input, |(rest, _)| rest)
}

/// Parse the content of one non-empty, comment-stripped,
/// constant-substituted source line.
///
/// # Errors
///
/// Returns the failing column and error kind; the caller attaches the file
/// and line number.
pub fn parse_line(line: &str) -> Result<ParsedLine, LineError> {
    let rest = skip_space(line);
    let Ok((rest_after, first)) = identifier(rest) else {
        return Err((
            col(line, rest),
            AsmErrorKind::Syntax(
                "expected a label, opcode, or pseudo-op".to_owned(),
            ),
        ));
    };

    if let Some(pseudo) = pseudo_from_name(first) {
        return pseudo_stmt(line, pseudo, None, rest_after);
    }
    if let Some(opcode) = opcode_from_name(first) {
        return instr_stmt(line, opcode, None, rest_after);
    }

    // The first token is a label; the statement follows it
    let label = Some(first.to_owned());
    let rest = skip_space(rest_after);
    let Ok((rest_after, second)) = identifier(rest) else {
        return Err((
            col(line, rest),
            AsmErrorKind::Syntax(
                "expected an opcode or pseudo-op after the label".to_owned(),
            ),
        ));
    };

    if let Some(pseudo) = pseudo_from_name(second) {
        return pseudo_stmt(line, pseudo, label, rest_after);
    }
    if let Some(opcode) = opcode_from_name(second) {
        return instr_stmt(line, opcode, label, rest_after);
    }
    Err((
        col(line, rest),
        AsmErrorKind::Syntax(format!(
            "expected an opcode or pseudo-op, found `{second}`"
        )),
    ))
}

/// Parse the remainder of a pseudo-op line
fn pseudo_stmt(
    line: &str,
    pseudo: PseudoOp,
    label: Option<String>,
    rest: &str,
) -> Result<ParsedLine, LineError> {
    let stmt = match pseudo {
        PseudoOp::Equ => {
            if label.is_none() {
                return Err((
                    col(line, rest),
                    AsmErrorKind::Syntax(
                        "EQU requires a constant name as its label".to_owned(),
                    ),
                ));
            }
            let text = rest.trim();
            if text.is_empty() {
                return Err((
                    col(line, rest),
                    AsmErrorKind::Syntax(
                        "EQU requires replacement text".to_owned(),
                    ),
                ));
            }
            Statement::Equ(text.to_owned())
        }
        PseudoOp::Org => {
            let (rest, expr) = required_expr(line, rest)?;
            expect_line_end(line, rest)?;
            Statement::Org(expr)
        }
        PseudoOp::End => {
            let trimmed = skip_space(rest);
            if trimmed.is_empty() {
                Statement::End(None)
            } else {
                let (rest, expr) = required_expr(line, rest)?;
                expect_line_end(line, rest)?;
                Statement::End(Some(expr))
            }
        }
        PseudoOp::For => {
            let (rest, expr) = required_expr(line, rest)?;
            expect_line_end(line, rest)?;
            Statement::For(expr)
        }
        PseudoOp::Rof => {
            expect_line_end(line, rest)?;
            Statement::Rof
        }
    };
    Ok(ParsedLine { label, stmt })
}

/// Parse the modifier and operands of an instruction line
fn instr_stmt(
    line: &str,
    opcode: Opcode,
    label: Option<String>,
    rest: &str,
) -> Result<ParsedLine, LineError> {
    // Optional explicit `.modifier`, attached directly to the mnemonic
    let (rest, explicit_modifier) = if let Some(after_dot) =
        rest.strip_prefix('.')
    {
        let (rest, name) = identifier(after_dot).map_err(|_err| {
            (
                col(line, after_dot),
                AsmErrorKind::BadModifier(String::new()),
            )
        })?;
        let modifier = modifier_from_name(name).ok_or_else(|| {
            (col(line, after_dot), AsmErrorKind::BadModifier(name.to_owned()))
        })?;
        (rest, Some(modifier))
    } else {
        (rest, None)
    };

    let rest = skip_space(rest);
    if rest.is_empty() {
        return Err((col(line, rest), AsmErrorKind::MissingOperand));
    }
    let (rest, (a_mode, a)) = operand(line, rest)?;

    let rest = skip_space(rest);
    let (rest, (b_mode, b)) = if let Some(after_comma) = rest.strip_prefix(',')
    {
        operand(line, skip_space(after_comma))?
    } else {
        // A missing B operand assembles as `#0`
        (rest, (AddrMode::Immediate, Expr::Number(0)))
    };
    expect_line_end(line, rest)?;

    let modifier: Modifier = explicit_modifier
        .unwrap_or_else(|| default_modifiers(opcode, a_mode, b_mode));
    Ok(ParsedLine {
        label,
        stmt: Statement::Instr(InstrStmt {
            instr: Instruction {
                opcode,
                modifier,
                a_addr_mode: a_mode,
                b_addr_mode: b_mode,
            },
            a,
            b,
        }),
    })
}

/// Parse one operand: an optional mode sigil (defaulting to direct) and an
/// expression
fn operand<'a>(
    line: &str,
    rest: &'a str,
) -> Result<(&'a str, (AddrMode, Expr)), LineError> {
    let (rest, mode) = addr_mode(rest)
        .map_or((rest, AddrMode::Direct), |(rest, mode)| (rest, mode));
    let (rest, expr) = required_expr(line, rest)?;
    Ok((rest, (mode, expr)))
}

/// Parse an expression where the grammar requires one
fn required_expr<'a>(
    line: &str,
    rest: &'a str,
) -> Result<(&'a str, Expr), LineError> {
    expression(rest).map_err(|_err| {
        (
            col(line, skip_space(rest)),
            AsmErrorKind::Syntax("expected an expression".to_owned()),
        )
    })
}

/// Require that nothing but whitespace remains on the line
fn expect_line_end(line: &str, rest: &str) -> Result<(), LineError> {
    let rest = skip_space(rest);
    if rest.is_empty() {
        Ok(())
    } else {
        Err((
            col(line, rest),
            AsmErrorKind::Syntax(format!("unexpected trailing input `{rest}`")),
        ))
    }
}
