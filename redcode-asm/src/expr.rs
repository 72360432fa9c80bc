use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, space0},
    combinator::map,
    error::VerboseError,
    multi::fold_many0,
    sequence::{delimited, pair, preceded},
    IResult,
};
use thiserror::Error;

use crate::primitives::{identifier, number};

/// Parse result alias shared by the expression grammar
type ExprResult<'a> = IResult<&'a str, Expr, VerboseError<&'a str>>;

/// A unary operator in a Redcode expression.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Boolean not: 1 if the operand is zero, else 0
    Not,
}

/// A binary operator in a Redcode expression.
///
/// Boolean operators treat any nonzero value as true and yield 1 or 0.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`, failing on a zero divisor
    Div,
    /// `%`, failing on a zero divisor
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// An arithmetic or boolean expression over integers and labels.
///
/// Expressions exist only during assembly: the post-pass evaluates every
/// operand down to a plain integer field.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Expr {
    /// A decimal integer literal
    Number(i32),
    /// A label reference, resolved PC-relative at evaluation time
    Symbol(String),
    /// A unary operation
    Unary(UnaryOp, Box<Expr>),
    /// A binary operation
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Failures while evaluating an [`Expr`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// The expression referenced a name absent from the symbol table
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    /// Division or modulo by zero
    #[error("division by zero")]
    DivByZero,
}

impl Expr {
    /// Evaluate the expression against a symbol table.
    ///
    /// Symbols hold absolute program offsets; `origin` (the address of the
    /// instruction under assembly) is subtracted so label references become
    /// PC-relative.  Arithmetic wraps on 32-bit overflow.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::UnknownSymbol`] for a name missing from the
    /// table and [`ExprError::DivByZero`] for a zero divisor.
    pub fn eval(
        &self,
        symbols: &BTreeMap<String, i32>,
        origin: i32,
    ) -> Result<i32, ExprError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Symbol(name) => symbols
                .get(name)
                .map(|absolute| absolute.wrapping_sub(origin))
                .ok_or_else(|| ExprError::UnknownSymbol(name.clone())),
            Self::Unary(op, operand) => {
                let v = operand.eval(symbols, origin)?;
                Ok(match op {
                    UnaryOp::Neg => v.wrapping_neg(),
                    UnaryOp::Not => i32::from(v == 0),
                })
            }
            Self::Binary(op, lhs, rhs) => {
                let l = lhs.eval(symbols, origin)?;
                let r = rhs.eval(symbols, origin)?;
                Ok(match op {
                    BinOp::Add => l.wrapping_add(r),
                    BinOp::Sub => l.wrapping_sub(r),
                    BinOp::Mul => l.wrapping_mul(r),
                    BinOp::Div => {
                        if r == 0 {
                            return Err(ExprError::DivByZero);
                        }
                        l.wrapping_div(r)
                    }
                    BinOp::Rem => {
                        if r == 0 {
                            return Err(ExprError::DivByZero);
                        }
                        l.wrapping_rem(r)
                    }
                    BinOp::Eq => i32::from(l == r),
                    BinOp::Ne => i32::from(l != r),
                    BinOp::Lt => i32::from(l < r),
                    BinOp::Gt => i32::from(l > r),
                    BinOp::Le => i32::from(l <= r),
                    BinOp::Ge => i32::from(l >= r),
                    BinOp::And => i32::from(l != 0 && r != 0),
                    BinOp::Or => i32::from(l != 0 || r != 0),
                })
            }
        }
    }
}

/// Box two operands under a binary operator
fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

/// Parse a full expression: the `||` precedence level and everything above
/// it.
///
/// The grammar builds its tree bottom-up, one function per precedence
/// level, so precedence needs no after-the-fact rebalancing.
pub fn expression(input: &str) -> ExprResult {
    let (input, init) = and_expr(input)?;
    fold_many0(
        pair(preceded(space0, tag("||")), and_expr),
        move || init.clone(),
        |lhs, (_, rhs)| binary(BinOp::Or, lhs, rhs),
    )(input)
}

/// `&&` level
fn and_expr(input: &str) -> ExprResult {
    let (input, init) = cmp_expr(input)?;
    fold_many0(
        pair(preceded(space0, tag("&&")), cmp_expr),
        move || init.clone(),
        |lhs, (_, rhs)| binary(BinOp::And, lhs, rhs),
    )(input)
}

/// Comparison level: `== != <= >= < >`
fn cmp_expr(input: &str) -> ExprResult {
    // Two-character operators must be tried before their one-character
    // prefixes
    let operator = alt((
        map(tag("=="), |_| BinOp::Eq),
        map(tag("!="), |_| BinOp::Ne),
        map(tag("<="), |_| BinOp::Le),
        map(tag(">="), |_| BinOp::Ge),
        map(tag("<"), |_| BinOp::Lt),
        map(tag(">"), |_| BinOp::Gt),
    ));
    let (input, init) = add_expr(input)?;
    fold_many0(
        pair(preceded(space0, operator), add_expr),
        move || init.clone(),
        |lhs, (op, rhs)| binary(op, lhs, rhs),
    )(input)
}

/// Additive level: `+ -`
fn add_expr(input: &str) -> ExprResult {
    let operator = alt((
        map(char('+'), |_| BinOp::Add),
        map(char('-'), |_| BinOp::Sub),
    ));
    let (input, init) = mul_expr(input)?;
    fold_many0(
        pair(preceded(space0, operator), mul_expr),
        move || init.clone(),
        |lhs, (op, rhs)| binary(op, lhs, rhs),
    )(input)
}

/// Multiplicative level: `* / %`
fn mul_expr(input: &str) -> ExprResult {
    let operator = alt((
        map(char('*'), |_| BinOp::Mul),
        map(char('/'), |_| BinOp::Div),
        map(char('%'), |_| BinOp::Rem),
    ));
    let (input, init) = factor(input)?;
    fold_many0(
        pair(preceded(space0, operator), factor),
        move || init.clone(),
        |lhs, (op, rhs)| binary(op, lhs, rhs),
    )(input)
}

/// Unary prefixes (`- ! +`) and atoms.  Unary operators bind tightest, as
/// in pMARS.
fn factor(input: &str) -> ExprResult {
    preceded(
        space0,
        alt((
            map(preceded(char('-'), factor), |e| {
                Expr::Unary(UnaryOp::Neg, Box::new(e))
            }),
            map(preceded(char('!'), factor), |e| {
                Expr::Unary(UnaryOp::Not, Box::new(e))
            }),
            // Unary plus is accepted and discarded
            preceded(char('+'), factor),
            atom,
        )),
    )(input)
}

/// A literal, a label reference, or a parenthesized subexpression
fn atom(input: &str) -> ExprResult {
    alt((
        map(number, Expr::Number),
        map(identifier, |name| Expr::Symbol(name.to_owned())),
        delimited(
            char('('),
            expression,
            preceded(space0, char(')')),
        ),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse a complete expression or panic
    fn parse(input: &str) -> Expr {
        let (rest, expr) = expression(input).expect("expression should parse");
        assert!(rest.trim().is_empty(), "unparsed input: {rest:?}");
        expr
    }

    /// Evaluate with an empty symbol table at origin 0
    fn eval(input: &str) -> i32 {
        parse(input)
            .eval(&BTreeMap::new(), 0)
            .expect("expression should evaluate")
    }

    #[test]
    fn precedence_ladder() {
        assert_eq!(eval("1+2*3"), 7);
        assert_eq!(eval("(1+2)*3"), 9);
        assert_eq!(eval("10-4-3"), 3);
        assert_eq!(eval("7%4*2"), 6);
        assert_eq!(eval("1+2 < 4"), 1);
        assert_eq!(eval("3 < 2 || 1"), 1);
        assert_eq!(eval("1 && 0 || 1"), 1);
        assert_eq!(eval("1 || 0 && 0"), 1);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval("-3"), -3);
        assert_eq!(eval("--3"), 3);
        assert_eq!(eval("!0"), 1);
        assert_eq!(eval("!7"), 0);
        assert_eq!(eval("2*-3"), -6);
        assert_eq!(eval("+5"), 5);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(eval("3 == 3"), 1);
        assert_eq!(eval("3 != 3"), 0);
        assert_eq!(eval("2 <= 2"), 1);
        assert_eq!(eval("2 >= 3"), 0);
    }

    #[test]
    fn symbols_resolve_pc_relative() {
        let mut symbols = BTreeMap::new();
        symbols.insert("target".to_owned(), 7);
        let expr = parse("target+1");
        assert_eq!(expr.eval(&symbols, 3), Ok(5));
        assert_eq!(expr.eval(&symbols, 0), Ok(8));
    }

    #[test]
    fn unknown_symbol_reports_its_name() {
        let expr = parse("ghost");
        assert_eq!(
            expr.eval(&BTreeMap::new(), 0),
            Err(ExprError::UnknownSymbol("ghost".to_owned()))
        );
    }

    #[test]
    fn division_by_zero_fails() {
        let expr = parse("4/(1-1)");
        assert_eq!(expr.eval(&BTreeMap::new(), 0), Err(ExprError::DivByZero));
        let expr = parse("4%0");
        assert_eq!(expr.eval(&BTreeMap::new(), 0), Err(ExprError::DivByZero));
    }
}
