//! The normalization and background card: one main line per angle, each
//! optionally followed by an uncertainty line.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::VaryFlag;

const ANORM: FieldSlice = FieldSlice::real("anorm", 1, 10, 3);
const BACKA: FieldSlice = FieldSlice::real("backa", 11, 20, 3);
const BACKB: FieldSlice = FieldSlice::real("backb", 21, 30, 3);
const BACKC: FieldSlice = FieldSlice::real("backc", 31, 40, 3);
const BACKD: FieldSlice = FieldSlice::real("backd", 41, 50, 3);
const BACKF: FieldSlice = FieldSlice::real("backf", 51, 60, 3);

const FLAG_ANORM: FieldSlice = FieldSlice::flag("flag_anorm", 61, 62);
const FLAG_BACKA: FieldSlice = FieldSlice::flag("flag_backa", 63, 64);
const FLAG_BACKB: FieldSlice = FieldSlice::flag("flag_backb", 65, 66);
const FLAG_BACKC: FieldSlice = FieldSlice::flag("flag_backc", 67, 68);
const FLAG_BACKD: FieldSlice = FieldSlice::flag("flag_backd", 69, 70);
const FLAG_BACKF: FieldSlice = FieldSlice::flag("flag_backf", 71, 72);

const VALUES: [FieldSlice; 6] = [ANORM, BACKA, BACKB, BACKC, BACKD, BACKF];
const FLAGS: [FieldSlice; 6] = [FLAG_ANORM, FLAG_BACKA, FLAG_BACKB, FLAG_BACKC, FLAG_BACKD, FLAG_BACKF];

pub(crate) const MAIN_LINE: Layout = Layout::new("normalization main", &[
    ANORM, BACKA, BACKB, BACKC, BACKD, BACKF,
    FLAG_ANORM, FLAG_BACKA, FLAG_BACKB, FLAG_BACKC, FLAG_BACKD, FLAG_BACKF,
]);
pub(crate) const UNCERTAINTY_LINE: Layout = Layout::new("normalization uncertainty", &VALUES);

/// Normalization and background terms for one angle.
///
/// The values are, in order, the normalization and the constant, 1/E,
/// √E, exponential-amplitude and exponential-rate background terms.
/// Uncertainties are all `None` when the angle had no uncertainty line.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalizationRecord {
    pub anorm: f64,
    pub backa: f64,
    pub backb: f64,
    pub backc: f64,
    pub backd: f64,
    pub backf: f64,
    pub flags: [VaryFlag; 6],
    pub uncertainties: [Option<f64>; 6],
}

impl NormalizationRecord {
    pub fn values(&self) -> [f64; 6] {
        [self.anorm, self.backa, self.backb, self.backc, self.backd, self.backf]
    }

    fn from_main_line(line: &str) -> CardResult<Self> {
        let r = MAIN_LINE.reader(line);
        let mut values = [0.0; 6];
        for (slot, field) in values.iter_mut().zip(VALUES.iter()) {
            *slot = r.real(field)?.unwrap_or(0.0);
        }
        let mut flags = [VaryFlag::No; 6];
        for (slot, field) in flags.iter_mut().zip(FLAGS.iter()) {
            *slot = r.flag(field)?;
        }

        let [anorm, backa, backb, backc, backd, backf] = values;
        Ok(Self { anorm, backa, backb, backc, backd, backf, flags, uncertainties: [None; 6] })
    }

    fn read_uncertainties(&mut self, line: &str) -> CardResult<()> {
        let r = UNCERTAINTY_LINE.reader(line);
        for (slot, field) in self.uncertainties.iter_mut().zip(VALUES.iter()) {
            *slot = r.real(field)?;
        }
        Ok(())
    }

    fn to_lines(&self) -> CardResult<Vec<String>> {
        let mut w = MAIN_LINE.writer();
        for (value, field) in self.values().into_iter().zip(VALUES.iter()) {
            w.real(field, Some(value))?;
        }
        for (flag, field) in self.flags.into_iter().zip(FLAGS.iter()) {
            w.flag(field, flag)?;
        }
        let mut lines = vec![w.finish()];

        if self.uncertainties.iter().any(Option::is_some) {
            let mut w = UNCERTAINTY_LINE.writer();
            for (value, field) in self.uncertainties.into_iter().zip(VALUES.iter()) {
                w.real(field, value)?;
            }
            lines.push(w.finish());
        }
        Ok(lines)
    }
}

/// An uncertainty line carries nothing in the flag columns.
fn is_main_line(line: &str) -> bool {
    MAIN_LINE.reader(line).any_populated(&FLAGS)
}

pub struct NormalizationCodec;

impl RecordCodec for NormalizationCodec {
    type Record = NormalizationRecord;

    const FAMILY: CardFamily = CardFamily::Normalization;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let mut records: Vec<NormalizationRecord> = vec![];
        let mut has_uncertainty = false;

        for &line in body {
            if is_main_line(line) {
                records.push(NormalizationRecord::from_main_line(line)?);
                has_uncertainty = false;
                continue;
            }

            match records.last_mut() {
                Some(rec) if !has_uncertainty => {
                    rec.read_uncertainties(line)
                        .attach_printable_lazy(|| format!("uncertainty line '{}'", line.trim_end()))?;
                    has_uncertainty = true;
                },
                _ => {
                    return Err(Report::new(CardError::unexpected(Self::FAMILY.name(), line)))
                        .attach_printable("an uncertainty line must follow a main line with flag columns");
                }
            }
        }

        Ok(records)
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        let mut lines = vec![];
        for rec in records {
            lines.extend(rec.to_lines()?);
        }
        Ok(lines)
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::Normalization(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "NORMAlization and background are next";
    const MAIN1: &str = "1.000E+00 2.000E-02 3.000E-03 4.000E-04 5.000E-05 6.000E-06  1 0 1 0 1 0";
    const UNC1: &str = "1.000E-02 2.000E-03 3.000E-04 4.000E-05 5.000E-06 6.000E-07";
    const MAIN2: &str = "2.000E+00 3.000E-02 4.000E-03 5.000E-04 6.000E-05 7.000E-06  0 1 0 1 0 1";

    #[test]
    fn test_angles_by_shape() -> CardResult<()> {
        let records = NormalizationCodec::decode(&[HEADER, MAIN1, UNC1, MAIN2, ""])?;
        assert_eq!(records.len(), 2, "Expected two angles");

        assert_eq!(records[0].anorm, 1.0);
        assert_eq!(records[0].backf, 6.0e-6);
        assert_eq!(records[0].flags[0], VaryFlag::Yes);
        assert_eq!(records[0].uncertainties[1], Some(2.0e-3));

        assert_eq!(records[1].anorm, 2.0);
        assert_eq!(records[1].flags[1], VaryFlag::Yes);
        assert_eq!(records[1].uncertainties, [None; 6], "The second angle has no uncertainty line");
        Ok(())
    }

    #[test]
    fn test_round_trip() -> CardResult<()> {
        let records = NormalizationCodec::decode(&[HEADER, MAIN1, UNC1, MAIN2, ""])?;
        let out = NormalizationCodec::encode(&records)?;
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], HEADER);
        assert_eq!(NormalizationCodec::decode(&out)?, records);
        Ok(())
    }

    #[test]
    fn test_orphan_uncertainty() {
        let e = NormalizationCodec::decode(&[HEADER, UNC1]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::UnexpectedLine { .. }));

        let e = NormalizationCodec::decode(&[HEADER, MAIN1, UNC1, UNC1]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::UnexpectedLine { .. }), "An angle has at most one uncertainty line");
    }
}
