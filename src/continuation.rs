//! Grouping of physical lines into logical records.
//!
//! Several card families let one record spill over several lines: a radius entry
//! owns the `Group=` lines after it, a keyword particle pair runs until the next
//! `Name=`, an isotope's spin group list continues while a sentinel asks for more.
//! A [`ContinuationRule`] states when a line extends the record before it;
//! [`ContinuationAssembler`] applies it before any field is decoded.
use error_stack::Report;

use crate::card_error::{CardError, CardResult};

/// Decides which lines extend the current logical record.
pub trait ContinuationRule {
    /// Whether `line` belongs to the record whose lines so far are `group`.
    fn continues(&self, group: &[&str], line: &str) -> bool;

    /// Whether `group` cannot end yet, i.e. the next line must be a continuation.
    fn demands_next(&self, _group: &[&str]) -> bool {
        false
    }
}

/// The physical lines of one logical record, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationGroup<'l> {
    lines: Vec<&'l str>,
}

impl<'l> ContinuationGroup<'l> {
    /// The line that started the record.
    pub fn head(&self) -> &'l str {
        self.lines[0]
    }

    /// The lines after the head.
    pub fn continuations(&self) -> &[&'l str] {
        &self.lines[1..]
    }

    pub fn lines(&self) -> &[&'l str] {
        &self.lines
    }

    /// All lines joined with single spaces, for families whose fragments form one token stream.
    pub fn joined(&self) -> String {
        self.lines.iter().map(|l| l.trim()).collect::<Vec<_>>().join(" ")
    }
}

/// Splits a card body into [`ContinuationGroup`]s with a family's [`ContinuationRule`].
pub struct ContinuationAssembler<R> {
    family: &'static str,
    rule: R,
}

impl<R: ContinuationRule> ContinuationAssembler<R> {
    pub fn new(family: &'static str, rule: R) -> Self {
        Self { family, rule }
    }

    /// Group lines until a blank line or the end of input.
    ///
    /// Body lines are never checked against card headers: a variable or
    /// parameter may well be named like one. Returns the groups and the number of lines they use. A group that still
    /// demands a continuation when the lines run out is a
    /// [`CardError::MalformedContinuation`].
    pub fn assemble<'l>(&self, lines: &[&'l str]) -> CardResult<(Vec<ContinuationGroup<'l>>, usize)> {
        let mut groups: Vec<ContinuationGroup<'l>> = vec![];
        let mut consumed = 0;

        for &line in lines {
            if line.trim().is_empty() {
                break;
            }

            let extends = groups.last()
                .map(|g| self.rule.demands_next(&g.lines) || self.rule.continues(&g.lines, line))
                .unwrap_or(false);

            match groups.last_mut() {
                Some(g) if extends => g.lines.push(line),
                _ => groups.push(ContinuationGroup { lines: vec![line] }),
            }
            consumed += 1;
        }

        if let Some(g) = groups.last() {
            if self.rule.demands_next(&g.lines) {
                let last = g.lines.last().copied().unwrap_or_default();
                return Err(Report::new(CardError::MalformedContinuation { line: last.to_owned() }))
            }
        }

        Ok((groups, consumed))
    }

    /// Like [`ContinuationAssembler::assemble`], but every line must be used.
    pub fn assemble_all<'l>(&self, lines: &[&'l str]) -> CardResult<Vec<ContinuationGroup<'l>>> {
        let (groups, consumed) = self.assemble(lines)?;
        if let Some(extra) = lines.get(consumed) {
            return Err(Report::new(CardError::unexpected(self.family, extra)));
        }
        Ok(groups)
    }
}
