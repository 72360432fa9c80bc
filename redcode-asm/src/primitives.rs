use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, digit1},
    combinator::{map, map_res, recognize},
    error::VerboseError,
    multi::many0_count,
    sequence::pair,
    IResult,
};
use redcode::{AddrMode, Modifier, Opcode};

/// Consumes one identifier: a letter or underscore followed by letters,
/// digits, and underscores.
pub fn identifier(
    input: &str,
) -> IResult<&str, &str, VerboseError<&str>> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// Consumes one unsigned decimal literal.  Signs belong to the expression
/// grammar.
pub fn number(input: &str) -> IResult<&str, i32, VerboseError<&str>> {
    map_res(digit1, str::parse)(input)
}

/// Consumes one addressing-mode sigil.
pub fn addr_mode(
    input: &str,
) -> IResult<&str, AddrMode, VerboseError<&str>> {
    alt((
        map(tag("#"), |_| AddrMode::Immediate),
        map(tag("$"), |_| AddrMode::Direct),
        map(tag("*"), |_| AddrMode::IndirectA),
        map(tag("@"), |_| AddrMode::IndirectB),
        map(tag("{"), |_| AddrMode::PredecA),
        map(tag("<"), |_| AddrMode::PredecB),
        map(tag("}"), |_| AddrMode::PostincA),
        map(tag(">"), |_| AddrMode::PostincB),
    ))(input)
}

/// Looks up a whole token as an opcode mnemonic, case-insensitively.
///
/// Whole-token matching (rather than prefix tags) keeps identifiers like
/// `move` usable as labels.
#[must_use]
pub fn opcode_from_name(name: &str) -> Option<Opcode> {
    Some(match name.to_ascii_uppercase().as_str() {
        "DAT" => Opcode::Dat,
        "MOV" => Opcode::Mov,
        "ADD" => Opcode::Add,
        "SUB" => Opcode::Sub,
        "MUL" => Opcode::Mul,
        "DIV" => Opcode::Div,
        "MOD" => Opcode::Mod,
        "JMP" => Opcode::Jmp,
        "JMZ" => Opcode::Jmz,
        "JMN" => Opcode::Jmn,
        "DJN" => Opcode::Djn,
        "SPL" => Opcode::Spl,
        "SLT" => Opcode::Slt,
        "CMP" => Opcode::Cmp,
        "SEQ" => Opcode::Seq,
        "SNE" => Opcode::Sne,
        "NOP" => Opcode::Nop,
        _ => return None,
    })
}

/// Looks up a whole token as a modifier mnemonic, case-insensitively.
/// Exactly `A B AB BA F X I` are modifiers; anything else is rejected.
#[must_use]
pub fn modifier_from_name(name: &str) -> Option<Modifier> {
    Some(match name.to_ascii_uppercase().as_str() {
        "A" => Modifier::A,
        "B" => Modifier::B,
        "AB" => Modifier::AB,
        "BA" => Modifier::BA,
        "F" => Modifier::F,
        "X" => Modifier::X,
        "I" => Modifier::I,
        _ => return None,
    })
}

/// The pseudo-operations recognized by the scanner.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PseudoOp {
    /// `EQU` defines a textual constant
    Equ,
    /// `ORG` sets the start offset
    Org,
    /// `END` stops scanning, optionally setting the start offset
    End,
    /// `FOR` opens an unrolled loop
    For,
    /// `ROF` closes an unrolled loop
    Rof,
}

/// Looks up a whole token as a pseudo-op mnemonic, case-insensitively.
#[must_use]
pub fn pseudo_from_name(name: &str) -> Option<PseudoOp> {
    Some(match name.to_ascii_uppercase().as_str() {
        "EQU" => PseudoOp::Equ,
        "ORG" => PseudoOp::Org,
        "END" => PseudoOp::End,
        "FOR" => PseudoOp::For,
        "ROF" => PseudoOp::Rof,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_shapes() {
        assert_eq!(identifier("imp_1 rest"), Ok((" rest", "imp_1")));
        assert_eq!(identifier("_x"), Ok(("", "_x")));
        assert!(identifier("1abc").is_err());
        assert!(identifier(" leading").is_err());
    }

    #[test]
    fn identifier_stops_at_dot() {
        assert_eq!(identifier("mov.ab"), Ok((".ab", "mov")));
    }

    #[test]
    fn number_is_unsigned() {
        assert_eq!(number("123,"), Ok((",", 123)));
        assert!(number("-1").is_err());
    }

    #[test]
    fn mode_sigils() {
        assert_eq!(addr_mode("#0"), Ok(("0", AddrMode::Immediate)));
        assert_eq!(addr_mode("}4"), Ok(("4", AddrMode::PostincA)));
        assert!(addr_mode("0").is_err());
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        assert_eq!(opcode_from_name("dAt"), Some(Opcode::Dat));
        assert_eq!(opcode_from_name("move"), None);
        assert_eq!(modifier_from_name("ba"), Some(Modifier::BA));
        assert_eq!(modifier_from_name("AF"), None);
        assert_eq!(pseudo_from_name("equ"), Some(PseudoOp::Equ));
        assert_eq!(pseudo_from_name("PIN"), None);
    }
}
