//! The Oak Ridge resolution function card.
//!
//! Sections start with a five-letter tag: `BURST`, a moderator (`WATER` or
//! `TANTA`), a detector (`LITHI` or `NE110`), and any number of `CHANN` lines.
//! Untagged lines after a section head carry its uncertainties, the tantalum
//! position and shape parameters, or the NE110 cross section points.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::cards::user_resolution::{BurstParameter, ChannelParameter};
use crate::codec::{CodecSettings, RecordCodec};
use crate::continuation::{ContinuationAssembler, ContinuationGroup, ContinuationRule};
use crate::layout::{FieldSlice, Layout, LineReader, LineWriter, LINE_WIDTH};
use crate::numeric::VaryFlag;

const TAG: FieldSlice = FieldSlice::text("tag", 1, 5);
const TAGS: [&str; 6] = ["BURST", "WATER", "TANTA", "LITHI", "NE110", "CHANN"];

const FLAG_1: FieldSlice = FieldSlice::flag("flag", 7, 7);
const FLAG_2: FieldSlice = FieldSlice::flag("flag", 8, 8);
const FLAG_3: FieldSlice = FieldSlice::flag("flag", 9, 9);
const FLAG_4: FieldSlice = FieldSlice::flag("flag", 10, 10);
const VALUE_1: FieldSlice = FieldSlice::real("value", 11, 20, 3);
const VALUE_2: FieldSlice = FieldSlice::real("value", 21, 30, 3);
const VALUE_3: FieldSlice = FieldSlice::real("value", 31, 40, 3);
const VALUE_4: FieldSlice = FieldSlice::real("value", 41, 50, 3);

const DOF: FieldSlice = FieldSlice::int("dof", 10, 10);
const POINTS: FieldSlice = FieldSlice::int("num_points", 8, 10);

const WATER_LINE: Layout = Layout::new("WATER", &[TAG, FLAG_1, FLAG_2, FLAG_3, DOF, VALUE_1, VALUE_2, VALUE_3]);
const LITHIUM_LINE: Layout = Layout::new("LITHI", &[TAG, FLAG_1, FLAG_2, FLAG_3, VALUE_1, VALUE_2, VALUE_3]);
const NE110_LINE: Layout = Layout::new("NE110", &[TAG, FLAG_1, POINTS, VALUE_1, VALUE_2, VALUE_3]);
const TANTALUM_LINE: Layout = Layout::new("TANTA", &[TAG, FLAG_1, VALUE_1, VALUE_2]);
const POSITION_LINE: Layout = Layout::new("TANTA position", &[FLAG_1, FLAG_2, FLAG_3, FLAG_4, VALUE_1, VALUE_2, VALUE_3, VALUE_4]);
const SHAPE_LINE: Layout = Layout::new("TANTA shape", &[FLAG_1, FLAG_2, VALUE_1, VALUE_2]);
const VALUES_LINE: Layout = Layout::new("values", &[VALUE_1, VALUE_2, VALUE_3, VALUE_4]);

/// A fitted quantity with its flag and optional uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrresParameter {
    pub value: f64,
    pub flag: VaryFlag,
    pub uncertainty: Option<f64>,
}

impl OrresParameter {
    fn read(r: &LineReader, flag: &FieldSlice, value: &FieldSlice) -> CardResult<Self> {
        Ok(Self { value: r.required_real(value)?, flag: r.flag(flag)?, uncertainty: None })
    }
}

/// Fill uncertainties from an untagged line, one per value column.
fn read_uncertainties(line: &str, params: &mut [&mut OrresParameter]) -> CardResult<()> {
    let r = VALUES_LINE.reader(line);
    for (p, field) in params.iter_mut().zip([VALUE_1, VALUE_2, VALUE_3, VALUE_4]) {
        p.uncertainty = r.real(&field)?;
    }
    Ok(())
}

/// The untagged line holding `params`' uncertainties, or `None` if none has one.
fn uncertainty_line(params: &[&OrresParameter]) -> CardResult<Option<String>> {
    if params.iter().all(|p| p.uncertainty.is_none()) {
        return Ok(None);
    }
    let mut w = VALUES_LINE.writer();
    for (p, field) in params.iter().zip([VALUE_1, VALUE_2, VALUE_3, VALUE_4]) {
        w.real(&field, p.uncertainty)?;
    }
    Ok(Some(w.finish()))
}

/// Water moderator: mean free path as a quadratic (mm).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaterModerator {
    /// Degrees of freedom of the chi-squared distribution; `None` leaves SAMMY's default
    pub dof: Option<i64>,
    pub constant: OrresParameter,
    pub linear: OrresParameter,
    pub quadratic: OrresParameter,
}

/// Tantalum moderator.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TantalumModerator {
    /// η' (1/mm)
    pub eta: OrresParameter,
    pub x1: OrresParameter,
    pub x2: OrresParameter,
    pub x3: OrresParameter,
    pub x0: OrresParameter,
    /// β' (1/mm)
    pub beta: OrresParameter,
    pub alpha: OrresParameter,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Moderator {
    Water(WaterModerator),
    Tantalum(TantalumModerator),
}

/// Lithium glass detector.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LithiumDetector {
    pub d: OrresParameter,
    pub f: OrresParameter,
    pub g: OrresParameter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossSectionPoint {
    /// Upper energy of the point (eV)
    pub energy: f64,
    /// Total cross section (b)
    pub sigma: f64,
}

/// NE110 scintillator detector.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ne110Detector {
    /// δ (mm)
    pub delta: OrresParameter,
    /// Molecules per mm·b; `None` leaves SAMMY's default
    pub density: Option<f64>,
    pub cross_sections: Vec<CrossSectionPoint>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Detector {
    Lithium(LithiumDetector),
    Ne110(Ne110Detector),
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrresRecord {
    pub burst: Option<BurstParameter>,
    pub moderator: Option<Moderator>,
    pub detector: Option<Detector>,
    pub channels: Vec<ChannelParameter>,
}

fn tag_of(line: &str) -> Option<&'static str> {
    let tag = line.get(..5)?;
    TAGS.into_iter().find(|t| *t == tag)
}

fn declared_points(head: &str) -> usize {
    NE110_LINE.reader(head).int(&POINTS).ok().flatten()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

struct Sections;

impl ContinuationRule for Sections {
    fn continues(&self, _group: &[&str], line: &str) -> bool {
        tag_of(line).is_none()
    }

    fn demands_next(&self, group: &[&str]) -> bool {
        match group.first() {
            Some(head) if tag_of(head) == Some("NE110") => group.len() < 1 + declared_points(head),
            _ => false,
        }
    }
}

fn single_line(group: &ContinuationGroup) -> CardResult<()> {
    match group.continuations().first() {
        Some(extra) => Err(Report::new(CardError::unexpected(CardFamily::Orres.name(), extra))),
        None => Ok(()),
    }
}

fn at_most_one_more<'l>(group: &ContinuationGroup<'l>) -> CardResult<Option<&'l str>> {
    match group.continuations() {
        [] => Ok(None),
        [unc] => Ok(Some(*unc)),
        [_, extra, ..] => Err(Report::new(CardError::unexpected(CardFamily::Orres.name(), extra))),
    }
}

fn strictly_increasing(energies: impl Iterator<Item = f64>, what: &str) -> CardResult<()> {
    let mut previous = f64::NEG_INFINITY;
    for e in energies {
        if e <= previous {
            return Err(Report::new(CardError::Validation(format!("{what} energies must increase, got {e} after {previous}"))));
        }
        previous = e;
    }
    Ok(())
}

fn has_flags(line: &str) -> bool {
    !LineReader::new(line, LINE_WIDTH).is_blank(&FieldSlice::text("", 7, 10))
}

impl WaterModerator {
    fn from_group(group: &ContinuationGroup) -> CardResult<Self> {
        let r = WATER_LINE.reader(group.head());
        let mut water = Self {
            dof: r.int(&DOF)?,
            constant: OrresParameter::read(&r, &FLAG_1, &VALUE_1)?,
            linear: OrresParameter::read(&r, &FLAG_2, &VALUE_2)?,
            quadratic: OrresParameter::read(&r, &FLAG_3, &VALUE_3)?,
        };
        if let Some(unc) = at_most_one_more(group)? {
            read_uncertainties(unc, &mut [&mut water.constant, &mut water.linear, &mut water.quadratic])?;
        }
        Ok(water)
    }

    fn to_lines(&self) -> CardResult<Vec<String>> {
        let mut w = WATER_LINE.writer();
        w.text(&TAG, "WATER")?
            .flag(&FLAG_1, self.constant.flag)?
            .flag(&FLAG_2, self.linear.flag)?
            .flag(&FLAG_3, self.quadratic.flag)?
            .int(&DOF, self.dof)?
            .real(&VALUE_1, Some(self.constant.value))?
            .real(&VALUE_2, Some(self.linear.value))?
            .real(&VALUE_3, Some(self.quadratic.value))?;
        let mut lines = vec![w.finish()];
        lines.extend(uncertainty_line(&[&self.constant, &self.linear, &self.quadratic])?);
        Ok(lines)
    }
}

impl TantalumModerator {
    /// The lines after the position line are, in order, an optional position
    /// uncertainty line, the shape line, and an optional shape uncertainty
    /// line. Only the shape line carries flags in columns 7-10; when neither
    /// of two lines has flags, the one with values past column 30 holds
    /// position uncertainties.
    fn from_group(group: &ContinuationGroup) -> CardResult<Self> {
        let (position, rest) = match group.continuations() {
            [position, rest @ ..] if !rest.is_empty() => (*position, rest),
            _ => {
                let last = group.lines().last().copied().unwrap_or_default();
                return Err(Report::new(CardError::MalformedContinuation { line: last.to_owned() }))
                    .attach_printable("a TANTA section needs position and shape lines");
            }
        };

        let (position_unc, shape, shape_unc) = match rest {
            [shape] => (None, *shape, None),
            [first, second] => {
                let beyond_shape = VALUES_LINE.reader(first).any_populated(&[VALUE_3, VALUE_4]);
                if !has_flags(first) && (has_flags(second) || beyond_shape) {
                    (Some(*first), *second, None)
                } else {
                    (None, *first, Some(*second))
                }
            },
            [position_unc, shape, shape_unc] => (Some(*position_unc), *shape, Some(*shape_unc)),
            _ => {
                let extra = rest.get(3).copied().unwrap_or_default();
                return Err(Report::new(CardError::unexpected(CardFamily::Orres.name(), extra)));
            },
        };

        let head = TANTALUM_LINE.reader(group.head());
        let mut eta = OrresParameter::read(&head, &FLAG_1, &VALUE_1)?;
        eta.uncertainty = head.real(&VALUE_2)?;

        let p = POSITION_LINE.reader(position);
        let mut ta = Self {
            eta,
            x1: OrresParameter::read(&p, &FLAG_1, &VALUE_1)?,
            x2: OrresParameter::read(&p, &FLAG_2, &VALUE_2)?,
            x3: OrresParameter::read(&p, &FLAG_3, &VALUE_3)?,
            x0: OrresParameter::read(&p, &FLAG_4, &VALUE_4)?,
            ..Default::default()
        };
        if let Some(line) = position_unc {
            read_uncertainties(line, &mut [&mut ta.x1, &mut ta.x2, &mut ta.x3, &mut ta.x0])?;
        }

        let s = SHAPE_LINE.reader(shape);
        ta.beta = OrresParameter::read(&s, &FLAG_1, &VALUE_1)?;
        ta.alpha = OrresParameter::read(&s, &FLAG_2, &VALUE_2)?;
        if let Some(line) = shape_unc {
            read_uncertainties(line, &mut [&mut ta.beta, &mut ta.alpha])?;
        }
        Ok(ta)
    }

    fn to_lines(&self) -> CardResult<Vec<String>> {
        let mut w = TANTALUM_LINE.writer();
        w.text(&TAG, "TANTA")?
            .flag(&FLAG_1, self.eta.flag)?
            .real(&VALUE_1, Some(self.eta.value))?
            .real(&VALUE_2, self.eta.uncertainty)?;
        let mut lines = vec![w.finish()];

        let mut w = POSITION_LINE.writer();
        w.flag(&FLAG_1, self.x1.flag)?
            .flag(&FLAG_2, self.x2.flag)?
            .flag(&FLAG_3, self.x3.flag)?
            .flag(&FLAG_4, self.x0.flag)?
            .real(&VALUE_1, Some(self.x1.value))?
            .real(&VALUE_2, Some(self.x2.value))?
            .real(&VALUE_3, Some(self.x3.value))?
            .real(&VALUE_4, Some(self.x0.value))?;
        lines.push(w.finish());
        lines.extend(uncertainty_line(&[&self.x1, &self.x2, &self.x3, &self.x0])?);

        let mut w = SHAPE_LINE.writer();
        w.flag(&FLAG_1, self.beta.flag)?
            .flag(&FLAG_2, self.alpha.flag)?
            .real(&VALUE_1, Some(self.beta.value))?
            .real(&VALUE_2, Some(self.alpha.value))?;
        lines.push(w.finish());
        lines.extend(uncertainty_line(&[&self.beta, &self.alpha])?);
        Ok(lines)
    }
}

impl LithiumDetector {
    fn from_group(group: &ContinuationGroup) -> CardResult<Self> {
        let r = LITHIUM_LINE.reader(group.head());
        let mut li = Self {
            d: OrresParameter::read(&r, &FLAG_1, &VALUE_1)?,
            f: OrresParameter::read(&r, &FLAG_2, &VALUE_2)?,
            g: OrresParameter::read(&r, &FLAG_3, &VALUE_3)?,
        };
        if let Some(unc) = at_most_one_more(group)? {
            read_uncertainties(unc, &mut [&mut li.d, &mut li.f, &mut li.g])?;
        }
        Ok(li)
    }

    fn to_lines(&self) -> CardResult<Vec<String>> {
        let mut w = LITHIUM_LINE.writer();
        w.text(&TAG, "LITHI")?
            .flag(&FLAG_1, self.d.flag)?
            .flag(&FLAG_2, self.f.flag)?
            .flag(&FLAG_3, self.g.flag)?
            .real(&VALUE_1, Some(self.d.value))?
            .real(&VALUE_2, Some(self.f.value))?
            .real(&VALUE_3, Some(self.g.value))?;
        let mut lines = vec![w.finish()];
        lines.extend(uncertainty_line(&[&self.d, &self.f, &self.g])?);
        Ok(lines)
    }
}

impl Ne110Detector {
    fn from_group(group: &ContinuationGroup) -> CardResult<Self> {
        let head = group.head();
        let r = NE110_LINE.reader(head);
        let mut delta = OrresParameter::read(&r, &FLAG_1, &VALUE_1)?;
        delta.uncertainty = r.real(&VALUE_2)?;

        let declared = declared_points(head);
        if group.continuations().len() != declared {
            return Err(Report::new(CardError::Validation(format!(
                "NE110 declares {declared} cross section points but {} follow", group.continuations().len()
            ))));
        }

        let cross_sections = group.continuations().iter()
            .map(|line| {
                let p = VALUES_LINE.reader(line);
                Ok(CrossSectionPoint { energy: p.required_real(&VALUE_1)?, sigma: p.required_real(&VALUE_2)? })
            })
            .collect::<CardResult<Vec<_>>>()?;
        strictly_increasing(cross_sections.iter().map(|p| p.energy), "NE110 cross section")?;

        Ok(Self { delta, density: r.real(&VALUE_3)?, cross_sections })
    }

    fn to_lines(&self) -> CardResult<Vec<String>> {
        strictly_increasing(self.cross_sections.iter().map(|p| p.energy), "NE110 cross section")?;
        let mut w = NE110_LINE.writer();
        w.text(&TAG, "NE110")?
            .flag(&FLAG_1, self.delta.flag)?
            .int(&POINTS, Some(self.cross_sections.len() as i64))?
            .real(&VALUE_1, Some(self.delta.value))?
            .real(&VALUE_2, self.delta.uncertainty)?
            .real(&VALUE_3, self.density)?;
        let mut lines = vec![w.finish()];

        for point in &self.cross_sections {
            let mut w = VALUES_LINE.writer();
            w.real(&VALUE_1, Some(point.energy))?.real(&VALUE_2, Some(point.sigma))?;
            lines.push(w.finish());
        }
        Ok(lines)
    }
}

impl OrresRecord {
    fn read_section(&mut self, group: &ContinuationGroup) -> CardResult<()> {
        let head = group.head();
        match tag_of(head) {
            Some("BURST") => {
                single_line(group)?;
                if self.burst.is_some() {
                    return Err(Report::new(CardError::Validation("more than one BURST line".to_owned())));
                }
                self.burst = Some(BurstParameter::from_line(head)?);
            },
            Some("CHANN") => {
                single_line(group)?;
                self.channels.push(ChannelParameter::from_line(head)?);
            },
            Some(tag @ ("WATER" | "TANTA")) => {
                if self.moderator.is_some() {
                    return Err(Report::new(CardError::Validation(format!("a second moderator section ({tag})"))));
                }
                self.moderator = Some(match tag {
                    "WATER" => Moderator::Water(WaterModerator::from_group(group)?),
                    _ => Moderator::Tantalum(TantalumModerator::from_group(group)?),
                });
            },
            Some(tag @ ("LITHI" | "NE110")) => {
                if self.detector.is_some() {
                    return Err(Report::new(CardError::Validation(format!("a second detector section ({tag})"))));
                }
                self.detector = Some(match tag {
                    "LITHI" => Detector::Lithium(LithiumDetector::from_group(group)?),
                    _ => Detector::Ne110(Ne110Detector::from_group(group)?),
                });
            },
            _ => return Err(Report::new(CardError::unexpected(CardFamily::Orres.name(), head))),
        }
        Ok(())
    }

    fn to_lines(&self) -> CardResult<Vec<String>> {
        strictly_increasing(self.channels.iter().map(|c| c.energy), "channel")?;

        let mut lines = vec![];
        if let Some(burst) = &self.burst {
            lines.push(burst.to_line()?);
        }
        match &self.moderator {
            Some(Moderator::Water(water)) => lines.extend(water.to_lines()?),
            Some(Moderator::Tantalum(ta)) => lines.extend(ta.to_lines()?),
            None => (),
        }
        match &self.detector {
            Some(Detector::Lithium(li)) => lines.extend(li.to_lines()?),
            Some(Detector::Ne110(ne)) => lines.extend(ne.to_lines()?),
            None => (),
        }
        for ch in &self.channels {
            lines.push(ch.to_line()?);
        }
        Ok(lines)
    }
}

pub struct OrresCodec;

impl RecordCodec for OrresCodec {
    type Record = OrresRecord;

    const FAMILY: CardFamily = CardFamily::Orres;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let sections = ContinuationAssembler::new(Self::FAMILY.name(), Sections).assemble_all(body)?;
        let mut rec = OrresRecord::default();
        for section in &sections {
            rec.read_section(section)
                .attach_printable_lazy(|| format!("section '{}'", section.head().trim_end()))?;
        }
        strictly_increasing(rec.channels.iter().map(|c| c.energy), "channel")?;
        Ok(vec![rec])
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        match records {
            [rec] => rec.to_lines(),
            _ => Err(Report::new(CardError::Validation(
                format!("an ORRES card holds one record, got {}", records.len())
            ))),
        }
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::Orres(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ORRES";

    fn param(value: f64, flag: VaryFlag, uncertainty: Option<f64>) -> OrresParameter {
        OrresParameter { value, flag, uncertainty }
    }

    #[test]
    fn test_layouts() {
        for layout in [WATER_LINE, LITHIUM_LINE, NE110_LINE, TANTALUM_LINE, POSITION_LINE, SHAPE_LINE, VALUES_LINE] {
            assert_eq!(layout.overlaps(), None);
        }
    }

    #[test]
    fn test_water_and_lithium() -> CardResult<()> {
        let lines = [
            HEADER,
            "BURST 1    1.000E+00 2.000E-02",
            "WATER 1004 3.614E+00-8.900E-02 3.700E-02",
            "           1.000E-02 2.000E-03",
            "LITHI 010  2.000E+00 3.000E-01 4.000E-01",
            "CHANN 0    1.000E+03 5.000E+00",
            "CHANN 1    2.000E+04 1.000E+01 1.000E-01",
            "",
        ];
        let records = OrresCodec::decode(&lines)?;
        assert_eq!(records.len(), 1, "The card holds a single record");
        let r = &records[0];

        assert_eq!(r.burst.as_ref().map(|b| b.width), Some(1.0));
        let Some(Moderator::Water(water)) = &r.moderator else {
            panic!("Expected a water moderator, got {:?}", r.moderator);
        };
        assert_eq!(water.dof, Some(4));
        assert_eq!(water.constant, param(3.614, VaryFlag::Yes, Some(0.01)));
        assert_eq!(water.linear, param(-0.089, VaryFlag::No, Some(0.002)));
        assert_eq!(water.quadratic.uncertainty, None);

        let Some(Detector::Lithium(li)) = &r.detector else {
            panic!("Expected a lithium detector, got {:?}", r.detector);
        };
        assert_eq!(li.f.flag, VaryFlag::Yes);
        assert_eq!(li.g.value, 0.4);
        assert_eq!(r.channels.len(), 2);

        let out = OrresCodec::encode(&records)?;
        assert_eq!(out[0], HEADER);
        assert_eq!(OrresCodec::decode(&out)?, records);
        Ok(())
    }

    #[test]
    fn test_tantalum_roles() -> CardResult<()> {
        let ta = TantalumModerator {
            eta: param(0.5, VaryFlag::Yes, Some(0.01)),
            x1: param(1.0, VaryFlag::No, None),
            x2: param(2.0, VaryFlag::No, None),
            x3: param(3.0, VaryFlag::Yes, None),
            x0: param(4.0, VaryFlag::No, None),
            beta: param(0.25, VaryFlag::No, None),
            alpha: param(1.5, VaryFlag::Yes, None),
        };
        let with_position_unc = TantalumModerator {
            x1: param(1.0, VaryFlag::No, Some(0.1)),
            x0: param(4.0, VaryFlag::No, Some(0.4)),
            ..ta.clone()
        };
        let with_shape_unc = TantalumModerator { beta: param(0.25, VaryFlag::No, Some(0.02)), ..ta.clone() };
        let with_both = TantalumModerator { beta: param(0.25, VaryFlag::No, Some(0.02)), ..with_position_unc.clone() };

        for (moderator, expected_lines) in [(ta, 3), (with_position_unc, 4), (with_shape_unc, 4), (with_both, 5)] {
            let rec = OrresRecord { moderator: Some(Moderator::Tantalum(moderator)), ..Default::default() };
            let out = OrresCodec::encode(&[rec.clone()])?;
            assert_eq!(out.len(), expected_lines + 2, "Unexpected line count for {rec:?}");
            assert_eq!(OrresCodec::decode(&out)?, vec![rec]);
        }

        let e = OrresCodec::decode(&[HEADER, "TANTA 1    5.000E-01", "      0010 1.000E+00 2.000E+00 3.000E+00 4.000E+00"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MalformedContinuation { .. }), "The shape line is required");
        Ok(())
    }

    #[test]
    fn test_ne110_points() -> CardResult<()> {
        let lines = [
            HEADER,
            "NE110 1  2 1.000E+00 1.000E-02 4.700E-03",
            "           1.000E+03 4.000E+00",
            "           1.000E+06 2.000E+00",
            "CHANN 0    1.000E+03 5.000E+00",
        ];
        let records = OrresCodec::decode(&lines)?;
        let Some(Detector::Ne110(ne)) = &records[0].detector else {
            panic!("Expected an NE110 detector, got {:?}", records[0].detector);
        };
        assert_eq!(ne.delta, param(1.0, VaryFlag::Yes, Some(0.01)));
        assert_eq!(ne.density, Some(0.0047));
        assert_eq!(ne.cross_sections, vec![
            CrossSectionPoint { energy: 1000.0, sigma: 4.0 },
            CrossSectionPoint { energy: 1.0e6, sigma: 2.0 },
        ]);
        assert_eq!(records[0].channels.len(), 1, "The CHANN line must not be taken as a point");
        assert_eq!(OrresCodec::decode(&OrresCodec::encode(&records)?)?, records);

        let e = OrresCodec::decode(&lines[..3]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MalformedContinuation { .. }), "A declared point is missing");
        Ok(())
    }

    #[test]
    fn test_conflicts_and_order() {
        let e = OrresCodec::decode(&[
            HEADER,
            "WATER 0004 3.614E+00-8.900E-02 3.700E-02",
            "TANTA 1    5.000E-01",
            "      0000 1.000E+00 2.000E+00 3.000E+00 4.000E+00",
            "      00   2.500E-01 1.500E+00",
        ]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)), "Two moderators cannot be combined");

        let e = OrresCodec::decode(&[
            HEADER,
            "LITHI 000  2.000E+00 3.000E-01 4.000E-01",
            "NE110 0  0 1.000E+00",
        ]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)), "Two detectors cannot be combined");

        let e = OrresCodec::decode(&[HEADER, "CHANN 0    2.000E+03 5.000E+00", "CHANN 0    1.000E+03 5.000E+00"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)), "Channel energies must increase");

        let e = OrresCodec::decode(&[
            HEADER,
            "NE110 0  2 1.000E+00",
            "           1.000E+06 4.000E+00",
            "           1.000E+03 2.000E+00",
        ]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)), "Cross section energies must increase");

        let e = OrresCodec::decode(&[HEADER, "WIDTH 1    1.0"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::UnexpectedLine { .. }));
    }
}
