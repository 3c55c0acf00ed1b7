//! Particle pair definitions.
//!
//! Two physical encodings exist. The keyword one spreads a pair over several
//! lines, starting at each `Name=`:
//!
//! ```text
//! Name=Inc Ch#1 Particle a=neutron Particle b=Other
//!     Za= 0 Zb= 0 Pent= 0 Shift= 0
//!     Sa= 0.5 Sb= 0 Ma= 1.008664915 Mb= 181
//! ```
//!
//! The fixed one puts each pair on a single 80-column line. Which one a card
//! uses is decided by its first data line (see [`sniff_pair_encoding`]).
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, PairEncoding, RecordCodec};
use crate::continuation::{ContinuationAssembler, ContinuationGroup, ContinuationRule};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::decode_float;
use crate::parsing::parse_assignments;

const NAME: FieldSlice = FieldSlice::text("name", 1, 8);
const PA: FieldSlice = FieldSlice::text("particle_a", 9, 10);
const PB: FieldSlice = FieldSlice::text("particle_b", 11, 12);
const ZA: FieldSlice = FieldSlice::int("charge_a", 13, 15);
const ZB: FieldSlice = FieldSlice::int("charge_b", 16, 18);
const PENT: FieldSlice = FieldSlice::int("penetrability", 19, 19);
const SHIFT: FieldSlice = FieldSlice::int("shift", 20, 20);
const SA: FieldSlice = FieldSlice::real("spin_a", 21, 25, 1);
const SB: FieldSlice = FieldSlice::real("spin_b", 26, 30, 1);
const MA: FieldSlice = FieldSlice::real("mass_a", 31, 40, 3);
const MB: FieldSlice = FieldSlice::real("mass_b", 41, 50, 3);
const Q: FieldSlice = FieldSlice::real("q_value", 51, 60, 3);
const RE: FieldSlice = FieldSlice::real("effective_radius", 61, 70, 3);
const RT: FieldSlice = FieldSlice::real("true_radius", 71, 80, 3);

pub(crate) const FIXED_LINE: Layout = Layout::new("particle pair", &[
    NAME, PA, PB, ZA, ZB, PENT, SHIFT, SA, SB, MA, MB, Q, RE, RT,
]);

/// Two particles forming a reaction channel.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParticlePairRecord {
    pub name: String,
    pub particle_a: String,
    pub particle_b: String,
    pub charge_a: i64,
    pub charge_b: i64,
    /// Calculate penetrabilities for this pair
    pub penetrability: bool,
    /// Calculate shift factors for this pair
    pub shift: bool,
    pub spin_a: f64,
    pub spin_b: f64,
    /// Mass of particle a (amu)
    pub mass_a: f64,
    /// Mass of particle b (amu)
    pub mass_b: f64,
    pub q_value: Option<f64>,
    pub threshold: Option<f64>,
    pub effective_radius: Option<f64>,
    pub true_radius: Option<f64>,
}

/// Decide the encoding of a card from its first data line: long lines without
/// any `=` are fixed-column.
pub fn sniff_pair_encoding(line: &str) -> PairEncoding {
    if line.trim_end().len() > 40 && !line.contains('=') {
        PairEncoding::Fixed
    } else {
        PairEncoding::Keyword
    }
}

/// A one-column switch: blank or 0 is off, 1 is on.
fn switch(value: Option<i64>, field: &'static str) -> CardResult<bool> {
    match value {
        None | Some(0) => Ok(false),
        Some(1) => Ok(true),
        Some(other) => Err(Report::new(CardError::Validation(format!("{field} must be 0 or 1, got {other}")))),
    }
}

fn keyword_switch(value: &str, line: &str) -> CardResult<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "" | "0" | "N" | "NO" => Ok(false),
        "1" | "Y" | "YES" => Ok(true),
        _ => Err(Report::new(CardError::Keyword { line: line.to_owned(), reason: format!("'{value}' is not a yes/no value") })),
    }
}

fn yes_no(b: bool) -> i64 {
    if b { 1 } else { 0 }
}

fn keyword_real(value: &str) -> CardResult<Option<f64>> {
    decode_float(value).map_err(Report::new)
}

fn keyword_int(value: &str) -> CardResult<i64> {
    let s = value.trim();
    if s.is_empty() {
        return Ok(0)
    }
    s.parse::<i64>()
        .map_err(|e| Report::new(CardError::NumericFormat { text: s.to_owned(), reason: e.to_string() }))
}

fn is_name_line(line: &str) -> bool {
    line.trim_start()
        .get(..4)
        .map(|k| k.eq_ignore_ascii_case("name"))
        .unwrap_or(false)
        && line.trim_start()[4..].trim_start().starts_with('=')
}

struct PairBlocks;

impl ContinuationRule for PairBlocks {
    fn continues(&self, _group: &[&str], line: &str) -> bool {
        !is_name_line(line)
    }
}

impl ParticlePairRecord {
    fn from_fixed_line(line: &str) -> CardResult<Self> {
        let r = FIXED_LINE.reader(line);
        let name = r.text(&NAME).to_owned();
        if name.is_empty() {
            return Err(Report::new(CardError::MissingField { field: NAME.name }));
        }

        Ok(Self {
            name,
            particle_a: r.text(&PA).to_owned(),
            particle_b: r.text(&PB).to_owned(),
            charge_a: r.int(&ZA)?.unwrap_or(0),
            charge_b: r.int(&ZB)?.unwrap_or(0),
            penetrability: switch(r.int(&PENT)?, PENT.name)?,
            shift: switch(r.int(&SHIFT)?, SHIFT.name)?,
            spin_a: r.real(&SA)?.unwrap_or(0.0),
            spin_b: r.real(&SB)?.unwrap_or(0.0),
            mass_a: r.real(&MA)?.unwrap_or(0.0),
            mass_b: r.real(&MB)?.unwrap_or(0.0),
            q_value: r.real(&Q)?,
            threshold: None,
            effective_radius: r.real(&RE)?,
            true_radius: r.real(&RT)?,
        })
    }

    fn from_keyword_block(block: &ContinuationGroup) -> CardResult<Self> {
        let text = block.joined();
        let assignments = parse_assignments(&text).map_err(Report::new)?;

        let mut rec = Self::default();
        let (mut has_name, mut has_a, mut has_b) = (false, false, false);
        for a in &assignments {
            let key = a.normalized_key();
            match key.as_str() {
                "NAME" => {
                    rec.name = a.value.to_owned();
                    has_name = true;
                },
                "PARTICLEA" | "PA" => {
                    rec.particle_a = a.value.to_owned();
                    has_a = true;
                },
                "PARTICLEB" | "PB" => {
                    rec.particle_b = a.value.to_owned();
                    has_b = true;
                },
                "CHARGEA" | "ZA" => rec.charge_a = keyword_int(a.value)?,
                "CHARGEB" | "ZB" => rec.charge_b = keyword_int(a.value)?,
                "PENETRABILITY" | "PENT" => rec.penetrability = keyword_switch(a.value, &text)?,
                "SHIFT" => rec.shift = keyword_switch(a.value, &text)?,
                "SPINA" | "SA" => rec.spin_a = keyword_real(a.value)?.unwrap_or(0.0),
                "SPINB" | "SB" => rec.spin_b = keyword_real(a.value)?.unwrap_or(0.0),
                "MASSA" | "MA" => rec.mass_a = keyword_real(a.value)?.unwrap_or(0.0),
                "MASSB" | "MB" => rec.mass_b = keyword_real(a.value)?.unwrap_or(0.0),
                "THRESHOLD" => rec.threshold = keyword_real(a.value)?,
                "EFFECTIVERADIUS" | "RE" => rec.effective_radius = keyword_real(a.value)?,
                "TRUERADIUS" | "RT" => rec.true_radius = keyword_real(a.value)?,
                // Q, QVALUE, QV, ...
                k if k.starts_with('Q') => rec.q_value = keyword_real(a.value)?,
                _ => {
                    return Err(Report::new(CardError::Keyword { line: text.clone(), reason: format!("unknown key '{}'", a.key) }))
                }
            }
        }

        for (present, field) in [(has_name, "Name"), (has_a, "Particle a"), (has_b, "Particle b")] {
            if !present {
                return Err(Report::new(CardError::MissingField { field }))
                    .attach_printable_lazy(|| format!("particle pair block '{text}'"));
            }
        }
        Ok(rec)
    }

    fn to_fixed_line(&self) -> CardResult<String> {
        if self.threshold.is_some() {
            return Err(Report::new(CardError::UnsupportedFormat {
                reason: "the fixed particle pair layout has no threshold column".to_owned()
            })).attach_printable_lazy(|| format!("pair '{}'", self.name));
        }

        let mut w = FIXED_LINE.writer();
        w.text(&NAME, &self.name)?
            .text(&PA, &self.particle_a)?
            .text(&PB, &self.particle_b)?
            .int(&ZA, Some(self.charge_a))?
            .int(&ZB, Some(self.charge_b))?
            .int(&PENT, Some(yes_no(self.penetrability)))?
            .int(&SHIFT, Some(yes_no(self.shift)))?
            .real(&SA, Some(self.spin_a))?
            .real(&SB, Some(self.spin_b))?
            .real(&MA, Some(self.mass_a))?
            .real(&MB, Some(self.mass_b))?
            .real(&Q, self.q_value)?
            .real(&RE, self.effective_radius)?
            .real(&RT, self.true_radius)?;
        Ok(w.finish())
    }

    fn to_keyword_lines(&self) -> CardResult<Vec<String>> {
        // An empty value would swallow the next assignment when read back
        for (value, field) in [(&self.name, "Name"), (&self.particle_a, "Particle a"), (&self.particle_b, "Particle b")] {
            if value.trim().is_empty() {
                return Err(Report::new(CardError::MissingField { field }));
            }
            if value.contains('=') {
                return Err(Report::new(CardError::Validation(format!("{field} '{value}' contains '='"))));
            }
        }

        let mut lines = vec![
            format!("Name={:<8} Particle a={:<8} Particle b={}", self.name, self.particle_a, self.particle_b),
            format!("    Za= {} Zb= {} Pent= {} Shift= {}",
                    self.charge_a, self.charge_b, yes_no(self.penetrability), yes_no(self.shift)),
            format!("    Sa= {} Sb= {} Ma= {} Mb= {}", self.spin_a, self.spin_b, self.mass_a, self.mass_b),
        ];

        let optional = [
            ("Q", self.q_value),
            ("Threshold", self.threshold),
            ("Effective radius", self.effective_radius),
            ("True radius", self.true_radius),
        ];
        let extras: Vec<String> = optional.iter()
            .filter_map(|(key, value)| value.map(|v| format!("{key}= {v}")))
            .collect();
        if !extras.is_empty() {
            lines.push(format!("    {}", extras.join(" ")));
        }
        Ok(lines)
    }
}

pub struct ParticlePairCodec;

impl RecordCodec for ParticlePairCodec {
    type Record = ParticlePairRecord;

    const FAMILY: CardFamily = CardFamily::ParticlePair;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let first = body.first().copied().unwrap_or_default();
        match sniff_pair_encoding(first) {
            PairEncoding::Fixed => {
                body.iter()
                    .map(|line| ParticlePairRecord::from_fixed_line(line)
                        .attach_printable_lazy(|| format!("line '{}'", line.trim_end())))
                    .collect()
            },
            PairEncoding::Keyword => {
                let blocks = ContinuationAssembler::new(Self::FAMILY.name(), PairBlocks).assemble_all(body)?;
                if !is_name_line(first) {
                    return Err(Report::new(CardError::unexpected(Self::FAMILY.name(), first)))
                        .attach_printable("a keyword particle pair must start with Name=");
                }
                blocks.iter().map(ParticlePairRecord::from_keyword_block).collect()
            },
        }
    }

    fn encode_body(records: &[Self::Record], settings: &CodecSettings) -> CardResult<Vec<String>> {
        match settings.get_pair_encoding() {
            PairEncoding::Fixed => records.iter().map(|r| r.to_fixed_line()).collect(),
            PairEncoding::Keyword => {
                let mut lines = vec![];
                for rec in records {
                    lines.extend(rec.to_keyword_lines()
                        .attach_printable_lazy(|| format!("pair '{}'", rec.name))?);
                }
                Ok(lines)
            },
        }
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::ParticlePair(records)
    }
}
