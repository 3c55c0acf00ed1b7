//! Column layouts of card lines.
//!
//! Each record line is described by a [`Layout`]: an ordered list of [`FieldSlice`]s
//! giving the name, 1-based inclusive column range, and kind of every field.
//! The tables are plain constants; [`LineReader`] and [`LineWriter`] do the
//! cutting and pasting.
use std::borrow::Cow;

use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::numeric::{self, VaryFlag};

/// The nominal width of a card line.
pub const LINE_WIDTH: usize = 80;

/// What kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A real written in scientific notation with (at least) this many decimals
    Real { precision: usize },
    Integer,
    Flag,
    Text,
}

/// One field of a fixed-column line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlice {
    pub name: &'static str,
    /// First column, 1-based
    pub start_col: usize,
    /// Last column, 1-based and inclusive
    pub end_col: usize,
    pub kind: FieldKind,
}

impl FieldSlice {
    pub const fn real(name: &'static str, start_col: usize, end_col: usize, precision: usize) -> Self {
        Self { name, start_col, end_col, kind: FieldKind::Real { precision } }
    }

    pub const fn int(name: &'static str, start_col: usize, end_col: usize) -> Self {
        Self { name, start_col, end_col, kind: FieldKind::Integer }
    }

    pub const fn flag(name: &'static str, start_col: usize, end_col: usize) -> Self {
        Self { name, start_col, end_col, kind: FieldKind::Flag }
    }

    pub const fn text(name: &'static str, start_col: usize, end_col: usize) -> Self {
        Self { name, start_col, end_col, kind: FieldKind::Text }
    }

    pub const fn width(&self) -> usize {
        self.end_col + 1 - self.start_col
    }

    /// Cut this field out of a line. Columns past the end of a short line read as blanks.
    pub fn extract<'l>(&self, line: &'l str) -> &'l str {
        column_range(line, self.start_col - 1, self.end_col)
    }

    /// The 0-based, half-open character range this field covers.
    pub fn range(&self) -> std::ops::Range<usize> {
        (self.start_col - 1)..self.end_col
    }

    fn describe(&self, line: &str) -> String {
        format!("field '{}' (columns {}-{}) of line '{}'", self.name, self.start_col, self.end_col, line)
    }
}

/// An ordered set of fields making up one kind of line.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub name: &'static str,
    pub fields: &'static [FieldSlice],
}

impl Layout {
    pub const fn new(name: &'static str, fields: &'static [FieldSlice]) -> Self {
        Self { name, fields }
    }

    /// The last column any field of this layout uses.
    pub fn width(&self) -> usize {
        self.fields.iter().map(|f| f.end_col).max().unwrap_or(0)
    }

    pub fn get(&self, name: &str) -> Option<&FieldSlice> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check that no two fields share a column.
    pub fn overlaps(&self) -> Option<(&'static str, &'static str)> {
        for (i, a) in self.fields.iter().enumerate() {
            for b in &self.fields[i+1..] {
                if a.start_col <= b.end_col && b.start_col <= a.end_col {
                    return Some((a.name, b.name))
                }
            }
        }
        None
    }

    pub fn reader<'l>(&self, line: &'l str) -> LineReader<'l> {
        LineReader::new(line, self.width())
    }

    pub fn writer(&self) -> LineWriter {
        LineWriter::new(self.width())
    }
}

/// Right-pad a line with blanks to at least `width` characters.
pub fn pad_line(line: &str, width: usize) -> Cow<'_, str> {
    let n = line.chars().count();
    if n >= width {
        Cow::Borrowed(line)
    } else {
        Cow::Owned(format!("{line:<width$}"))
    }
}

/// Whether every column in the range is blank (or past the end of the line).
pub fn is_blank_range(line: &str, start_col: usize, end_col: usize) -> bool {
    column_range(line, start_col - 1, end_col).trim().is_empty()
}

fn column_range(line: &str, start: usize, end: usize) -> &str {
    let mut indices = line.char_indices().map(|(i, _)| i).chain(std::iter::once(line.len()));
    let Some(byte_start) = indices.nth(start) else {
        return ""
    };
    let byte_end = indices.nth(end - start - 1).unwrap_or(line.len());
    &line[byte_start..byte_end]
}

/// Decodes the fields of one line.
pub struct LineReader<'l> {
    line: Cow<'l, str>,
}

impl<'l> LineReader<'l> {
    pub fn new(line: &'l str, width: usize) -> Self {
        Self { line: pad_line(line, width) }
    }

    pub fn line(&self) -> &str {
        self.line.trim_end()
    }

    pub fn raw(&self, field: &FieldSlice) -> &str {
        field.extract(&self.line)
    }

    pub fn is_blank(&self, field: &FieldSlice) -> bool {
        self.raw(field).trim().is_empty()
    }

    pub fn any_populated(&self, fields: &[FieldSlice]) -> bool {
        fields.iter().any(|f| !self.is_blank(f))
    }

    pub fn text(&self, field: &FieldSlice) -> &str {
        self.raw(field).trim()
    }

    pub fn real(&self, field: &FieldSlice) -> CardResult<Option<f64>> {
        numeric::decode_float(self.raw(field))
            .map_err(Report::new)
            .attach_printable_lazy(|| field.describe(self.line()))
    }

    pub fn required_real(&self, field: &FieldSlice) -> CardResult<f64> {
        self.real(field)?
            .ok_or_else(|| Report::new(CardError::MissingField { field: field.name }))
            .attach_printable_lazy(|| field.describe(self.line()))
    }

    pub fn int(&self, field: &FieldSlice) -> CardResult<Option<i64>> {
        numeric::decode_int(self.raw(field))
            .map_err(Report::new)
            .attach_printable_lazy(|| field.describe(self.line()))
    }

    pub fn required_int(&self, field: &FieldSlice) -> CardResult<i64> {
        self.int(field)?
            .ok_or_else(|| Report::new(CardError::MissingField { field: field.name }))
            .attach_printable_lazy(|| field.describe(self.line()))
    }

    pub fn flag(&self, field: &FieldSlice) -> CardResult<VaryFlag> {
        numeric::decode_flag(self.raw(field))
            .map_err(Report::new)
            .attach_printable_lazy(|| field.describe(self.line()))
    }
}

/// Builds one line field by field.
pub struct LineWriter {
    buf: Vec<char>,
}

impl LineWriter {
    pub fn new(width: usize) -> Self {
        Self { buf: vec![' '; width] }
    }

    fn place(&mut self, field: &FieldSlice, encoded: String) {
        let range = field.range();
        if self.buf.len() < range.end {
            self.buf.resize(range.end, ' ');
        }
        for (slot, c) in self.buf[range].iter_mut().zip(encoded.chars()) {
            *slot = c;
        }
    }

    fn describe(field: &FieldSlice) -> String {
        format!("field '{}' (columns {}-{})", field.name, field.start_col, field.end_col)
    }

    /// Write a real using the field's declared precision. `None` leaves the field blank.
    pub fn real(&mut self, field: &FieldSlice, value: Option<f64>) -> CardResult<&mut Self> {
        let Some(v) = value else {
            return Ok(self)
        };
        let precision = match field.kind {
            FieldKind::Real { precision } => precision,
            _ => 4,
        };
        let s = numeric::encode_float(v, field.width(), precision)
            .map_err(Report::new)
            .attach_printable_lazy(|| Self::describe(field))?;
        self.place(field, s);
        Ok(self)
    }

    pub fn int(&mut self, field: &FieldSlice, value: Option<i64>) -> CardResult<&mut Self> {
        let Some(v) = value else {
            return Ok(self)
        };
        let s = numeric::encode_int(v, field.width())
            .map_err(Report::new)
            .attach_printable_lazy(|| Self::describe(field))?;
        self.place(field, s);
        Ok(self)
    }

    pub fn flag(&mut self, field: &FieldSlice, flag: VaryFlag) -> CardResult<&mut Self> {
        let s = numeric::encode_flag(flag, field.width())
            .map_err(Report::new)
            .attach_printable_lazy(|| Self::describe(field))?;
        self.place(field, s);
        Ok(self)
    }

    pub fn text(&mut self, field: &FieldSlice, value: &str) -> CardResult<&mut Self> {
        let s = numeric::encode_text(value, field.width())
            .map_err(Report::new)
            .attach_printable_lazy(|| Self::describe(field))?;
        self.place(field, s);
        Ok(self)
    }

    /// The finished line, without trailing blanks.
    pub fn finish(&self) -> String {
        let s: String = self.buf.iter().collect();
        s.trim_end().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: FieldSlice = FieldSlice::real("a", 1, 10, 3);
    const B: FieldSlice = FieldSlice::flag("b", 11, 12);
    const C: FieldSlice = FieldSlice::text("c", 14, 18);
    const TEST: Layout = Layout::new("test", &[A, B, C]);
    const OVERLAPPING: Layout = Layout::new("bad", &[A, FieldSlice::int("x", 10, 11)]);

    #[test]
    fn test_short_lines() -> CardResult<()> {
        let r = TEST.reader("1.5");
        assert_eq!(r.real(&A)?, Some(1.5));
        assert_eq!(r.flag(&B)?, VaryFlag::No, "Columns past the end of the line should read as blank");
        assert_eq!(r.text(&C), "");
        Ok(())
    }

    #[test]
    fn test_reader_errors() {
        let r = TEST.reader("1.5x       7");
        let e = r.real(&A).unwrap_err();
        assert!(matches!(e.current_context(), CardError::NumericFormat { .. }));
        let e = r.flag(&B).unwrap_err();
        assert!(matches!(e.current_context(), CardError::InvalidFlag { .. }));

        let r = TEST.reader("");
        let e = r.required_real(&A).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MissingField { field: "a" }));
    }

    #[test]
    fn test_writer() -> CardResult<()> {
        let mut w = TEST.writer();
        w.real(&A, Some(2.5))?.flag(&B, VaryFlag::Yes)?.text(&C, "abc")?;
        assert_eq!(w.finish(), " 2.500E+00 1 abc");

        let mut w = TEST.writer();
        w.real(&A, None)?.flag(&B, VaryFlag::Pup)?;
        assert_eq!(w.finish(), "           3", "A missing value should leave its columns blank");

        let e = TEST.writer().text(&C, "too long").map(|_| ()).unwrap_err();
        assert!(matches!(e.current_context(), CardError::FieldOverflow { .. }));
        Ok(())
    }

    #[test]
    fn test_columns() {
        assert_eq!(C.extract("0123456789abcdefghij"), "defgh");
        assert_eq!(C.extract("0123456789abcde"), "de");
        assert_eq!(C.extract("0123"), "");
        assert!(is_blank_range("abc     ", 4, 8));
        assert!(!is_blank_range("abc     ", 3, 8));
        assert_eq!(TEST.overlaps(), None);
        assert_eq!(OVERLAPPING.overlaps(), Some(("a", "x")));
    }
}
