//! Isotopic abundances and masses, with the spin groups that belong to each isotope.
//!
//! The spin group list comes in two widths. The standard form has a two-column
//! flag at 31-32 and two-column groups from column 33; the extended form has a
//! five-column flag at 31-35 and five-column groups from column 36. When the
//! list does not fit, `-1` in the last columns of the line (79-80 standard,
//! 76-80 extended) says the next line carries more groups of the same width,
//! starting at column 1.
use error_stack::ResultExt;

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, GroupWidth, RecordCodec};
use crate::continuation::{ContinuationAssembler, ContinuationGroup, ContinuationRule};
use crate::layout::{FieldSlice, Layout, LineReader, LineWriter, LINE_WIDTH};
use crate::numeric::VaryFlag;

const MASS: FieldSlice = FieldSlice::real("mass", 1, 10, 4);
const ABUNDANCE: FieldSlice = FieldSlice::real("abundance", 11, 20, 4);
const UNCERTAINTY: FieldSlice = FieldSlice::real("uncertainty", 21, 30, 4);

pub(crate) const FRONT: Layout = Layout::new("isotope", &[MASS, ABUNDANCE, UNCERTAINTY]);

/// Column arrangement of one spin group width.
struct GroupFormat {
    flag: FieldSlice,
    width: usize,
    first_col: usize,
    head_slots: usize,
    continuation_slots: usize,
    sentinel: FieldSlice,
}

const STANDARD: GroupFormat = GroupFormat {
    flag: FieldSlice::flag("flag", 31, 32),
    width: 2,
    first_col: 33,
    head_slots: 23,
    continuation_slots: 39,
    sentinel: FieldSlice::int("continuation", 79, 80),
};

const EXTENDED: GroupFormat = GroupFormat {
    flag: FieldSlice::flag("flag", 31, 35),
    width: 5,
    first_col: 36,
    head_slots: 8,
    continuation_slots: 15,
    sentinel: FieldSlice::int("continuation", 76, 80),
};

const SENTINEL: i64 = -1;

impl GroupFormat {
    /// A standard line with groups always has a digit in column 34, the last
    /// column of its first group. In an extended line that column sits inside
    /// the right-aligned flag, which is at most two characters wide, so it is
    /// blank or holds a minus sign.
    fn of_line(line: &str) -> &'static GroupFormat {
        let r = LineReader::new(line, LINE_WIDTH);
        let col34 = r.text(&FieldSlice::text("", 34, 34));
        if r.is_blank(&FieldSlice::text("", 31, 33))
            && (col34.is_empty() || col34 == "-")
            && !r.is_blank(&FieldSlice::text("", 35, 40))
        {
            &EXTENDED
        } else {
            &STANDARD
        }
    }

    fn slot(&self, first_col: usize, i: usize) -> FieldSlice {
        let start = first_col + i * self.width;
        FieldSlice::int("spin_group", start, start + self.width - 1)
    }

    fn is_continued(&self, line: &str) -> bool {
        LineReader::new(line, LINE_WIDTH).text(&self.sentinel) == "-1"
    }

    /// Read groups until the first blank slot.
    fn read_groups(&self, line: &str, first_col: usize, slots: usize, groups: &mut Vec<i64>) -> CardResult<()> {
        let r = LineReader::new(line, LINE_WIDTH);
        for i in 0..slots {
            match r.int(&self.slot(first_col, i))? {
                Some(g) => groups.push(g),
                None => break,
            }
        }
        Ok(())
    }

    fn write_groups(&self, w: &mut LineWriter, first_col: usize, groups: &[i64], continued: bool) -> CardResult<()> {
        for (i, &g) in groups.iter().enumerate() {
            w.int(&self.slot(first_col, i), Some(g))?;
        }
        if continued {
            w.int(&self.sentinel, Some(SENTINEL))?;
        }
        Ok(())
    }
}

struct SpinGroupContinuation;

impl ContinuationRule for SpinGroupContinuation {
    fn continues(&self, _group: &[&str], _line: &str) -> bool {
        false
    }

    fn demands_next(&self, group: &[&str]) -> bool {
        match (group.first(), group.last()) {
            (Some(head), Some(last)) => GroupFormat::of_line(head).is_continued(last),
            _ => false,
        }
    }
}

/// One isotope and its spin groups.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopeRecord {
    /// Atomic mass (amu)
    pub mass: f64,
    /// Fractional abundance
    pub abundance: f64,
    pub uncertainty: Option<f64>,
    pub flag: VaryFlag,
    pub spin_groups: Vec<i64>,
}

impl IsotopeRecord {
    fn from_group(group: &ContinuationGroup) -> CardResult<Self> {
        let head = group.head();
        let fmt = GroupFormat::of_line(head);
        let r = FRONT.reader(head);

        let mut spin_groups = vec![];
        fmt.read_groups(head, fmt.first_col, fmt.head_slots, &mut spin_groups)?;
        for &line in group.continuations() {
            fmt.read_groups(line, 1, fmt.continuation_slots, &mut spin_groups)
                .attach_printable_lazy(|| format!("continuation line '{}'", line.trim_end()))?;
        }

        Ok(Self {
            mass: r.required_real(&MASS)?,
            abundance: r.required_real(&ABUNDANCE)?,
            uncertainty: r.real(&UNCERTAINTY)?,
            flag: LineReader::new(head, LINE_WIDTH).flag(&fmt.flag)?,
            spin_groups,
        })
    }

    fn needs_extended(&self) -> bool {
        self.spin_groups.iter().any(|g| !(-9..=99).contains(g))
    }

    fn to_lines(&self, width: GroupWidth) -> CardResult<Vec<String>> {
        let fmt = match width {
            GroupWidth::Standard => &STANDARD,
            GroupWidth::Extended => &EXTENDED,
            GroupWidth::Auto if self.needs_extended() => &EXTENDED,
            GroupWidth::Auto => &STANDARD,
        };

        let split = self.spin_groups.len().min(fmt.head_slots);
        let (first, rest) = self.spin_groups.split_at(split);
        let chunks: Vec<&[i64]> = rest.chunks(fmt.continuation_slots).collect();

        let mut w = FRONT.writer();
        w.real(&MASS, Some(self.mass))?
            .real(&ABUNDANCE, Some(self.abundance))?
            .real(&UNCERTAINTY, self.uncertainty)?
            .flag(&fmt.flag, self.flag)?;
        fmt.write_groups(&mut w, fmt.first_col, first, !chunks.is_empty())?;
        let mut lines = vec![w.finish()];

        for (i, chunk) in chunks.iter().enumerate() {
            let mut w = LineWriter::new(LINE_WIDTH);
            fmt.write_groups(&mut w, 1, chunk, i + 1 < chunks.len())?;
            lines.push(w.finish());
        }
        Ok(lines)
    }
}

pub struct IsotopeCodec;

impl RecordCodec for IsotopeCodec {
    type Record = IsotopeRecord;

    const FAMILY: CardFamily = CardFamily::IsotopeAbundance;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let groups = ContinuationAssembler::new(Self::FAMILY.name(), SpinGroupContinuation).assemble_all(body)?;
        groups.iter()
            .map(|g| IsotopeRecord::from_group(g)
                .attach_printable_lazy(|| format!("isotope line '{}'", g.head().trim_end())))
            .collect()
    }

    fn encode_body(records: &[Self::Record], settings: &CodecSettings) -> CardResult<Vec<String>> {
        let mut lines = vec![];
        for rec in records {
            lines.extend(rec.to_lines(settings.get_group_width())?);
        }
        Ok(lines)
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::IsotopeAbundance(records)
    }
}
