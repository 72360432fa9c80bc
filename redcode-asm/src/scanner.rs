use std::collections::{BTreeMap, HashMap, VecDeque};

use redcode::Metadata;

use crate::{
    error::{AsmError, AsmErrorKind},
    expr::{Expr, ExprError},
    line_parser::{parse_line, InstrStmt, Statement},
    primitives::{identifier, pseudo_from_name, PseudoOp},
};

/// Substitution passes before a constant is declared self-referential
const MAX_SUBST_PASSES: u32 = 8;

/// Split source text into lines, accepting LF, CR, and CRLF terminators.
pub(crate) fn source_lines(source: &str) -> SourceLines<'_> {
    SourceLines {
        rest: Some(source),
    }
}

/// Iterator returned by [`source_lines`]
pub(crate) struct SourceLines<'a> {
    /// Unconsumed input; `None` once exhausted
    rest: Option<&'a str>,
}

impl<'a> Iterator for SourceLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let s = self.rest?;
        match s.find(['\n', '\r']) {
            None => {
                self.rest = None;
                if s.is_empty() {
                    None
                } else {
                    Some(s)
                }
            }
            Some(idx) => {
                let line = &s[..idx];
                let after = if s[idx..].starts_with("\r\n") {
                    &s[idx + 2..]
                } else {
                    &s[idx + 1..]
                };
                self.rest = Some(after);
                Some(line)
            }
        }
    }
}

/// A statement the scanner hands to the assembly driver.  `EQU`, `FOR`, and
/// `ROF` never escape the scanner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ScannedStatement {
    /// `ORG <expr>`
    Org(Expr),
    /// `END [expr]`; scanning is already inactive when this is returned
    End(Option<Expr>),
    /// An instruction with unresolved operand expressions
    Instr(InstrStmt),
}

/// A scanned statement with its source location and optional label
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Scanned {
    /// 1-indexed source line
    pub line: u32,
    /// Address label defined on this line
    pub label: Option<String>,
    /// The statement itself
    pub stmt: ScannedStatement,
}

/// The scanning state machine.
///
/// Lines before a `;redcode` marker are ignored (when a marker exists at
/// all), `END` toggles scanning back off, metadata comments accumulate, and
/// `EQU`/`FOR`/`ROF` are resolved textually before any line reaches the
/// grammar.
pub(crate) struct Scanner<'a> {
    /// Source name for error locations
    file: &'a str,
    /// Pending lines; `FOR` expansion pushes synthesized lines at the front
    worklist: VecDeque<(u32, String)>,
    /// `EQU` table: constant name to raw replacement text
    constants: HashMap<String, String>,
    /// Metadata collected from `;name`, `;author`, and `;strategy`
    metadata: Metadata,
    /// Whether lines are currently being assembled
    active: bool,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over `source`.
    pub fn new(file: &'a str, source: &str) -> Self {
        let has_marker = source_lines(source)
            .any(|line| marker_body(line).is_some());
        let worklist = source_lines(source)
            .zip(1..)
            .map(|(text, number)| (number, text.to_owned()))
            .collect();
        Self {
            file,
            worklist,
            constants: HashMap::new(),
            metadata: Metadata::default(),
            // A source without any marker is active from its first line
            active: !has_marker,
        }
    }

    /// The metadata collected so far; call after scanning completes.
    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }

    /// Produce the next assemblable statement, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns the first assembly error encountered.
    pub fn next_statement(&mut self) -> Result<Option<Scanned>, AsmError> {
        while let Some((line_no, raw)) = self.worklist.pop_front() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(body) = trimmed.strip_prefix(';') {
                if self.active {
                    self.collect_metadata(body);
                } else if marker_body(trimmed).is_some() {
                    self.active = true;
                }
                continue;
            }
            if !self.active {
                continue;
            }

            let code = strip_comment(&raw);
            let code = self.substitute(code, line_no)?;
            if code.trim().is_empty() {
                continue;
            }
            let parsed = parse_line(&code).map_err(|(column, kind)| {
                AsmError::new(self.file, line_no, column, kind)
            })?;
            match parsed.stmt {
                Statement::Equ(text) => {
                    // parse_line guarantees EQU lines carry a name label
                    let name = parsed.label.unwrap_or_default();
                    self.define_constant(name, text, line_no)?;
                }
                Statement::For(count) => {
                    self.unroll(parsed.label, &count, line_no)?;
                }
                Statement::Rof => {
                    return Err(AsmError::new(
                        self.file,
                        line_no,
                        1,
                        AsmErrorKind::Syntax(
                            "ROF without matching FOR".to_owned(),
                        ),
                    ));
                }
                Statement::End(start) => {
                    self.active = false;
                    return Ok(Some(Scanned {
                        line: line_no,
                        label: parsed.label,
                        stmt: ScannedStatement::End(start),
                    }));
                }
                Statement::Org(start) => {
                    return Ok(Some(Scanned {
                        line: line_no,
                        label: parsed.label,
                        stmt: ScannedStatement::Org(start),
                    }));
                }
                Statement::Instr(instr) => {
                    return Ok(Some(Scanned {
                        line: line_no,
                        label: parsed.label,
                        stmt: ScannedStatement::Instr(instr),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Record `;name`, `;author`, and `;strategy` comments
    fn collect_metadata(&mut self, body: &str) {
        let body = body.trim_start();
        let keyword_end = body
            .find(char::is_whitespace)
            .unwrap_or(body.len());
        let (keyword, value) = body.split_at(keyword_end);
        let value = value.trim();
        match keyword.to_ascii_lowercase().as_str() {
            "name" if !value.is_empty() => {
                self.metadata.name = Some(value.to_owned());
            }
            "author" if !value.is_empty() => {
                self.metadata.author = Some(value.to_owned());
            }
            "strategy" => self.metadata.strategies.push(value.to_owned()),
            _ => {}
        }
    }

    /// Define an `EQU` constant, rejecting redefinitions
    fn define_constant(
        &mut self,
        name: String,
        text: String,
        line_no: u32,
    ) -> Result<(), AsmError> {
        if self.constants.contains_key(&name) {
            return Err(AsmError::new(
                self.file,
                line_no,
                1,
                AsmErrorKind::RedefinedConstant(name),
            ));
        }
        self.constants.insert(name, text);
        Ok(())
    }

    /// Replace constant names in a line until the text reaches a fixpoint
    fn substitute(
        &self,
        text: &str,
        line_no: u32,
    ) -> Result<String, AsmError> {
        let mut current = text.to_owned();
        for _pass in 0..MAX_SUBST_PASSES {
            let (next, changed) = substitute_once(&current, &self.constants);
            if !changed {
                return Ok(next);
            }
            current = next;
        }
        Err(AsmError::new(
            self.file,
            line_no,
            1,
            AsmErrorKind::Syntax(
                "EQU substitution did not terminate; \
                 constants refer to each other in a cycle"
                    .to_owned(),
            ),
        ))
    }

    /// Expand `[var] FOR <count> ... ROF`, pushing the unrolled body back
    /// onto the worklist for rescanning.  Nested loops are handled
    /// iteratively: the inner `FOR` lines are rescanned (with the outer
    /// variable already substituted) on a later call.
    fn unroll(
        &mut self,
        var: Option<String>,
        count: &Expr,
        for_line: u32,
    ) -> Result<(), AsmError> {
        let count = count
            .eval(&BTreeMap::new(), 0)
            .map_err(|err| self.expr_error(err, for_line))?;
        if count < 0 {
            return Err(AsmError::new(
                self.file,
                for_line,
                1,
                AsmErrorKind::Syntax(format!(
                    "FOR count must not be negative, got {count}"
                )),
            ));
        }

        // Capture the body verbatim up to the matching ROF
        let mut body: Vec<(u32, String)> = Vec::new();
        let mut depth = 1_u32;
        loop {
            let Some((line_no, raw)) = self.worklist.pop_front() else {
                return Err(AsmError::new(
                    self.file,
                    for_line,
                    1,
                    AsmErrorKind::ForWithoutRof,
                ));
            };
            match classify_loop_line(&raw) {
                Some(PseudoOp::For) => depth += 1,
                Some(PseudoOp::Rof) => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            body.push((line_no, raw));
        }

        // Emit count copies: constants first (their text may name the loop
        // variable), then the loop variable itself
        let mut expanded: Vec<(u32, String)> = Vec::new();
        for i in 1..=count {
            for (line_no, text) in &body {
                let mut line = self.substitute(text, *line_no)?;
                if let Some(var) = &var {
                    line = substitute_loop_var(&line, var, i);
                }
                expanded.push((*line_no, line));
            }
        }
        for item in expanded.into_iter().rev() {
            self.worklist.push_front(item);
        }
        Ok(())
    }

    /// Locate an expression evaluation failure
    fn expr_error(&self, err: ExprError, line_no: u32) -> AsmError {
        let kind = match err {
            ExprError::UnknownSymbol(name) => {
                AsmErrorKind::UnknownSymbol(name)
            }
            ExprError::DivByZero => AsmErrorKind::DivByZeroInExpr,
        };
        AsmError::new(self.file, line_no, 1, kind)
    }
}

/// If the trimmed line is a `;redcode` or `;redcode-94` marker, return its
/// comment body.
fn marker_body(line: &str) -> Option<&str> {
    let body = line.trim().strip_prefix(';')?;
    body.trim()
        .to_ascii_lowercase()
        .starts_with("redcode")
        .then_some(body)
}

/// Drop a trailing `; comment` from a code line
fn strip_comment(line: &str) -> &str {
    line.find(';').map_or(line, |idx| &line[..idx])
}

/// Whether a raw body line opens or closes a loop, for nesting depth.
/// Only the first one or two tokens matter: `FOR ...`, `var FOR ...`,
/// `ROF`, or `label ROF`.
fn classify_loop_line(raw: &str) -> Option<PseudoOp> {
    let code = strip_comment(raw).trim();
    let (rest, first) = identifier(code).ok()?;
    if let Some(op @ (PseudoOp::For | PseudoOp::Rof)) = pseudo_from_name(first)
    {
        return Some(op);
    }
    let (_, second) = identifier(rest.trim_start()).ok()?;
    match pseudo_from_name(second) {
        Some(op @ (PseudoOp::For | PseudoOp::Rof)) => Some(op),
        _ => None,
    }
}

/// Replace whole-identifier occurrences of constant names with their text.
/// Returns the rewritten line and whether anything changed.
fn substitute_once(
    text: &str,
    constants: &HashMap<String, String>,
) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut rest = text;
    while !rest.is_empty() {
        if let Ok((after, name)) = identifier(rest) {
            match constants.get(name) {
                Some(replacement) => {
                    out.push_str(replacement);
                    changed = true;
                }
                None => out.push_str(name),
            }
            rest = after;
        } else {
            // Not at an identifier start: copy one character
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    (out, changed)
}

/// Replace the loop variable: `&var` becomes the zero-padded two-digit
/// iteration number, a bare `var` identifier the decimal number.
fn substitute_loop_var(text: &str, var: &str, iteration: i32) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after_amp) = rest.strip_prefix('&') {
            if let Ok((after, name)) = identifier(after_amp) {
                if name == var {
                    out.push_str(&format!("{iteration:02}"));
                    rest = after;
                    continue;
                }
            }
            out.push('&');
            rest = after_amp;
            continue;
        }
        if let Ok((after, name)) = identifier(rest) {
            if name == var {
                out.push_str(&iteration.to_string());
            } else {
                out.push_str(name);
            }
            rest = after;
            continue;
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_lines_accept_all_terminators() {
        let lines: Vec<&str> =
            source_lines("a\nb\r\nc\rd").collect();
        assert_eq!(lines, vec!["a", "b", "c", "d"]);
        let lines: Vec<&str> = source_lines("a\n").collect();
        assert_eq!(lines, vec!["a"]);
        assert_eq!(source_lines("").count(), 0);
    }

    #[test]
    fn marker_detection() {
        assert!(marker_body(";redcode").is_some());
        assert!(marker_body("  ;redcode-94  ").is_some());
        assert!(marker_body(";ReDCode-94").is_some());
        assert!(marker_body("; not a marker").is_none());
        assert!(marker_body("mov 0, 1").is_none());
    }

    #[test]
    fn substitution_replaces_whole_identifiers_only() {
        let mut constants = HashMap::new();
        constants.insert("step".to_owned(), "4".to_owned());
        let (out, changed) =
            substitute_once("add #step, stepper", &constants);
        assert!(changed);
        assert_eq!(out, "add #4, stepper");
    }

    #[test]
    fn loop_var_substitution_pads_ampersand_form() {
        assert_eq!(
            substitute_loop_var("imp&i dat #i, #0", "i", 3),
            "imp03 dat #3, #0"
        );
        assert_eq!(substitute_loop_var("dat #j, #0", "i", 3), "dat #j, #0");
    }

    #[test]
    fn loop_line_classification() {
        assert_eq!(classify_loop_line("  FOR 3"), Some(PseudoOp::For));
        assert_eq!(classify_loop_line("i for count"), Some(PseudoOp::For));
        assert_eq!(classify_loop_line("ROF ; done"), Some(PseudoOp::Rof));
        assert_eq!(classify_loop_line("mov 0, 1"), None);
        assert_eq!(classify_loop_line("; for the record"), None);
    }
}
