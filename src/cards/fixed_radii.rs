//! Radius parameters in fixed columns, the older form of the radii card.
//!
//! Each record starts with both radii, a channel switch and two flags, and is
//! followed by a stream of integers: the spin groups, then, when the switch is
//! 1, a `0` and the channel numbers. The standard layout uses two-column
//! integers from column 25; the alternate layout widens the switch and flags
//! to five columns each and uses five-column integers from column 36. A `-1`
//! as the last integer of a line says the stream continues on the next line,
//! in the same columns.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, GroupWidth, RecordCodec};
use crate::continuation::{ContinuationAssembler, ContinuationGroup, ContinuationRule};
use crate::layout::{FieldSlice, LineReader, LineWriter, LINE_WIDTH};
use crate::numeric::VaryFlag;

const EFFECTIVE: FieldSlice = FieldSlice::real("effective_radius", 1, 10, 4);
const TRUE: FieldSlice = FieldSlice::real("true_radius", 11, 20, 4);

const SENTINEL: i64 = -1;
const CHANNEL_MARKER: i64 = 0;

/// Column arrangement of one layout.
struct StreamFormat {
    switch: FieldSlice,
    vary_effective: FieldSlice,
    vary_true: FieldSlice,
    width: usize,
    first_col: usize,
}

const STANDARD: StreamFormat = StreamFormat {
    switch: FieldSlice::int("ichan", 21, 21),
    vary_effective: FieldSlice::flag("vary_effective", 22, 22),
    vary_true: FieldSlice::flag("vary_true", 23, 24),
    width: 2,
    first_col: 25,
};

const ALTERNATE: StreamFormat = StreamFormat {
    switch: FieldSlice::int("ichan", 21, 25),
    vary_effective: FieldSlice::flag("vary_effective", 26, 30),
    vary_true: FieldSlice::flag("vary_true", 31, 35),
    width: 5,
    first_col: 36,
};

impl StreamFormat {
    /// In a standard line column 26 ends the first spin group, so it is never
    /// blank. In an alternate line it is the first column of the right-aligned
    /// effective radius flag, which is at most two characters wide.
    fn of_line(line: &str) -> &'static StreamFormat {
        let r = LineReader::new(line, LINE_WIDTH);
        if r.is_blank(&FieldSlice::text("", 26, 26)) && !r.is_blank(&FieldSlice::text("", 27, LINE_WIDTH)) {
            &ALTERNATE
        } else {
            &STANDARD
        }
    }

    fn slots(&self) -> usize {
        (LINE_WIDTH + 1 - self.first_col) / self.width
    }

    fn slot(&self, i: usize) -> FieldSlice {
        let start = self.first_col + i * self.width;
        FieldSlice::int("spin_group", start, start + self.width - 1)
    }

    /// The integers of one line, up to the first blank slot.
    fn read_stream(&self, line: &str) -> CardResult<Vec<i64>> {
        let r = LineReader::new(line, LINE_WIDTH);
        let mut values = vec![];
        for i in 0..self.slots() {
            match r.int(&self.slot(i))? {
                Some(v) => values.push(v),
                None => break,
            }
        }
        Ok(values)
    }

    fn is_continued(&self, line: &str) -> bool {
        self.read_stream(line)
            .map(|values| values.last() == Some(&SENTINEL))
            .unwrap_or(false)
    }
}

struct StreamContinuation;

impl ContinuationRule for StreamContinuation {
    fn continues(&self, _group: &[&str], _line: &str) -> bool {
        false
    }

    fn demands_next(&self, group: &[&str]) -> bool {
        match (group.first(), group.last()) {
            (Some(head), Some(last)) => StreamFormat::of_line(head).is_continued(last),
            _ => false,
        }
    }
}

/// Radii for a list of spin groups.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedRadiusRecord {
    /// Radius for potential scattering (fm)
    pub effective_radius: f64,
    /// Radius for penetrabilities and shifts (fm)
    pub true_radius: f64,
    pub vary_effective: VaryFlag,
    pub vary_true: VaryFlag,
    pub spin_groups: Vec<i64>,
    /// Channels the radii apply to; `None` means all channels of the groups.
    pub channels: Option<Vec<i64>>,
}

impl FixedRadiusRecord {
    fn from_group(group: &ContinuationGroup) -> CardResult<Self> {
        let head = group.head();
        let fmt = StreamFormat::of_line(head);
        let r = LineReader::new(head, LINE_WIDTH);

        let mut stream = vec![];
        for &line in group.lines() {
            let mut values = fmt.read_stream(line)
                .attach_printable_lazy(|| format!("line '{}'", line.trim_end()))?;
            if values.last() == Some(&SENTINEL) {
                values.pop();
            }
            stream.extend(values);
        }

        let (spin_groups, channels) = match stream.iter().position(|&v| v == CHANNEL_MARKER) {
            Some(i) => (stream[..i].to_vec(), Some(stream[i + 1..].to_vec())),
            None => (stream, None),
        };

        let switch = r.int(&fmt.switch)?.unwrap_or(0);
        match (switch, &channels) {
            (0, None) | (1, Some(_)) => (),
            (0, Some(_)) => return Err(Report::new(CardError::Validation(
                "channel numbers listed but ichan is 0".to_owned()
            ))),
            (1, None) => return Err(Report::new(CardError::Validation(
                "ichan is 1 but no channel numbers follow the spin groups".to_owned()
            ))),
            (other, _) => return Err(Report::new(CardError::Validation(format!("ichan must be 0 or 1, got {other}")))),
        }

        let rec = Self {
            effective_radius: r.required_real(&EFFECTIVE)?,
            true_radius: r.required_real(&TRUE)?,
            vary_effective: r.flag(&fmt.vary_effective)?,
            vary_true: r.flag(&fmt.vary_true)?,
            spin_groups,
            channels,
        };
        rec.validate()?;
        Ok(rec)
    }

    fn validate(&self) -> CardResult<()> {
        if self.spin_groups.is_empty() {
            return Err(Report::new(CardError::MissingField { field: "spin_group" }));
        }
        if let Some(g) = self.spin_groups.iter().find(|&&g| g <= 0) {
            return Err(Report::new(CardError::Validation(format!("spin group numbers must be positive, got {g}"))));
        }
        Ok(())
    }

    fn stream(&self) -> Vec<i64> {
        let mut stream = self.spin_groups.clone();
        if let Some(channels) = &self.channels {
            stream.push(CHANNEL_MARKER);
            stream.extend(channels);
        }
        stream
    }

    fn needs_alternate(&self) -> bool {
        self.stream().iter().any(|v| !(-9..=99).contains(v))
            || self.vary_effective.code() < 0
    }

    fn to_lines(&self, width: GroupWidth) -> CardResult<Vec<String>> {
        self.validate()?;
        let fmt = match width {
            GroupWidth::Standard => &STANDARD,
            GroupWidth::Extended => &ALTERNATE,
            GroupWidth::Auto if self.needs_alternate() => &ALTERNATE,
            GroupWidth::Auto => &STANDARD,
        };

        // Every line but the last gives its final slot to the sentinel
        let stream = self.stream();
        let per_line = fmt.slots() - 1;
        let mut chunks: Vec<&[i64]> = vec![];
        let mut rest = stream.as_slice();
        while rest.len() > fmt.slots() {
            let (chunk, tail) = rest.split_at(per_line);
            chunks.push(chunk);
            rest = tail;
        }
        chunks.push(rest);

        let mut lines = vec![];
        for (i, chunk) in chunks.iter().enumerate() {
            let mut w = LineWriter::new(LINE_WIDTH);
            if i == 0 {
                w.real(&EFFECTIVE, Some(self.effective_radius))?
                    .real(&TRUE, Some(self.true_radius))?
                    .int(&fmt.switch, Some(if self.channels.is_some() { 1 } else { 0 }))?
                    .flag(&fmt.vary_effective, self.vary_effective)?
                    .flag(&fmt.vary_true, self.vary_true)?;
            }
            for (j, &v) in chunk.iter().enumerate() {
                w.int(&fmt.slot(j), Some(v))?;
            }
            if i + 1 < chunks.len() {
                w.int(&fmt.slot(chunk.len()), Some(SENTINEL))?;
            }
            lines.push(w.finish());
        }
        Ok(lines)
    }
}

pub struct FixedRadiiCodec;

impl RecordCodec for FixedRadiiCodec {
    type Record = FixedRadiusRecord;

    const FAMILY: CardFamily = CardFamily::FixedRadii;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let groups = ContinuationAssembler::new(Self::FAMILY.name(), StreamContinuation).assemble_all(body)?;
        groups.iter()
            .map(|g| FixedRadiusRecord::from_group(g)
                .attach_printable_lazy(|| format!("radius line '{}'", g.head().trim_end())))
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
        CardSet::FixedRadii(records)
    }
}
