//! The broadening card: a main line, its optional uncertainty line, and an
//! optional Gaussian resolution line (DELTC1/DELTC2) with its own uncertainties.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::VaryFlag;

const CRFN: FieldSlice = FieldSlice::real("crfn", 1, 10, 3);
const TEMP: FieldSlice = FieldSlice::real("temp", 11, 20, 3);
const THICK: FieldSlice = FieldSlice::real("thick", 21, 30, 3);
const DELTAL: FieldSlice = FieldSlice::real("deltal", 31, 40, 3);
const DELTAG: FieldSlice = FieldSlice::real("deltag", 41, 50, 3);
const DELTAE: FieldSlice = FieldSlice::real("deltae", 51, 60, 3);
const FLAG_CRFN: FieldSlice = FieldSlice::flag("flag_crfn", 61, 62);
const FLAG_TEMP: FieldSlice = FieldSlice::flag("flag_temp", 63, 64);
const FLAG_THICK: FieldSlice = FieldSlice::flag("flag_thick", 65, 66);
const FLAG_DELTAL: FieldSlice = FieldSlice::flag("flag_deltal", 67, 68);
const FLAG_DELTAG: FieldSlice = FieldSlice::flag("flag_deltag", 69, 70);
const FLAG_DELTAE: FieldSlice = FieldSlice::flag("flag_deltae", 71, 72);

const DELTC1: FieldSlice = FieldSlice::real("deltc1", 1, 10, 3);
const DELTC2: FieldSlice = FieldSlice::real("deltc2", 11, 20, 3);
const FLAG_DELTC1: FieldSlice = FieldSlice::flag("flag_deltc1", 61, 62);
const FLAG_DELTC2: FieldSlice = FieldSlice::flag("flag_deltc2", 63, 64);

const VALUES: [FieldSlice; 6] = [CRFN, TEMP, THICK, DELTAL, DELTAG, DELTAE];
const FLAGS: [FieldSlice; 6] = [FLAG_CRFN, FLAG_TEMP, FLAG_THICK, FLAG_DELTAL, FLAG_DELTAG, FLAG_DELTAE];

pub(crate) const MAIN_LINE: Layout = Layout::new("broadening main", &[
    CRFN, TEMP, THICK, DELTAL, DELTAG, DELTAE,
    FLAG_CRFN, FLAG_TEMP, FLAG_THICK, FLAG_DELTAL, FLAG_DELTAG, FLAG_DELTAE,
]);
pub(crate) const UNCERTAINTY_LINE: Layout = Layout::new("broadening uncertainty", &VALUES);
pub(crate) const GAUSSIAN_LINE: Layout = Layout::new("broadening gaussian", &[DELTC1, DELTC2, FLAG_DELTC1, FLAG_DELTC2]);
pub(crate) const GAUSSIAN_UNCERTAINTY_LINE: Layout = Layout::new("broadening gaussian uncertainty", &[DELTC1, DELTC2]);

/// Doppler and resolution broadening parameters.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BroadeningRecord {
    /// Matching radius (F)
    pub crfn: f64,
    /// Effective temperature (K)
    pub temp: f64,
    /// Sample thickness (atoms/barn)
    pub thick: f64,
    /// Flight path spread (m)
    pub deltal: f64,
    /// Gaussian timing resolution (microseconds)
    pub deltag: f64,
    /// Exponential resolution width
    pub deltae: f64,
    pub flag_crfn: VaryFlag,
    pub flag_temp: VaryFlag,
    pub flag_thick: VaryFlag,
    pub flag_deltal: VaryFlag,
    pub flag_deltag: VaryFlag,
    pub flag_deltae: VaryFlag,

    pub d_crfn: Option<f64>,
    pub d_temp: Option<f64>,
    pub d_thick: Option<f64>,
    pub d_deltal: Option<f64>,
    pub d_deltag: Option<f64>,
    pub d_deltae: Option<f64>,

    /// Gaussian resolution constant term; must be given together with `deltc2`
    pub deltc1: Option<f64>,
    /// Gaussian resolution energy-proportional term; must be given together with `deltc1`
    pub deltc2: Option<f64>,
    pub flag_deltc1: Option<VaryFlag>,
    pub flag_deltc2: Option<VaryFlag>,
    pub d_deltc1: Option<f64>,
    pub d_deltc2: Option<f64>,
}

impl BroadeningRecord {
    /// Check the rules that tie fields together.
    pub fn validate(&self) -> CardResult<()> {
        match (self.deltc1, self.deltc2) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(Report::new(CardError::Validation("DELTC1 and DELTC2 must be given together".to_owned())));
            },
            (Some(_), Some(_)) => {
                if self.flag_deltc1.is_none() || self.flag_deltc2.is_none() {
                    return Err(Report::new(CardError::Validation("DELTC1 and DELTC2 need vary flags".to_owned())));
                }
            },
            (None, None) => {
                if self.d_deltc1.is_some() || self.d_deltc2.is_some() {
                    return Err(Report::new(CardError::Validation("DELTC uncertainties given without DELTC1/DELTC2".to_owned())));
                }
            }
        }
        Ok(())
    }

    fn values_mut(&mut self) -> [&mut f64; 6] {
        [&mut self.crfn, &mut self.temp, &mut self.thick, &mut self.deltal, &mut self.deltag, &mut self.deltae]
    }

    fn values(&self) -> [f64; 6] {
        [self.crfn, self.temp, self.thick, self.deltal, self.deltag, self.deltae]
    }

    fn flags_mut(&mut self) -> [&mut VaryFlag; 6] {
        [&mut self.flag_crfn, &mut self.flag_temp, &mut self.flag_thick, &mut self.flag_deltal, &mut self.flag_deltag, &mut self.flag_deltae]
    }

    fn flags(&self) -> [VaryFlag; 6] {
        [self.flag_crfn, self.flag_temp, self.flag_thick, self.flag_deltal, self.flag_deltag, self.flag_deltae]
    }

    fn uncertainties_mut(&mut self) -> [&mut Option<f64>; 6] {
        [&mut self.d_crfn, &mut self.d_temp, &mut self.d_thick, &mut self.d_deltal, &mut self.d_deltag, &mut self.d_deltae]
    }

    fn uncertainties(&self) -> [Option<f64>; 6] {
        [self.d_crfn, self.d_temp, self.d_thick, self.d_deltal, self.d_deltag, self.d_deltae]
    }
}

pub struct BroadeningCodec;

impl BroadeningCodec {
    fn decode_record(body: &[&str]) -> CardResult<BroadeningRecord> {
        let mut rec = BroadeningRecord::default();

        let main = MAIN_LINE.reader(body[0]);
        for (slot, field) in rec.values_mut().into_iter().zip(VALUES.iter()) {
            *slot = main.required_real(field)?;
        }
        for (slot, field) in rec.flags_mut().into_iter().zip(FLAGS.iter()) {
            *slot = main.flag(field)?;
        }

        // A second line without flag columns is the uncertainty line; with them it is the Gaussian line.
        let mut rest = &body[1..];
        if let Some(line) = rest.first() {
            if !MAIN_LINE.reader(line).any_populated(&FLAGS) {
                let r = UNCERTAINTY_LINE.reader(line);
                for (slot, field) in rec.uncertainties_mut().into_iter().zip(VALUES.iter()) {
                    *slot = r.real(field)?;
                }
                rest = &rest[1..];
            }
        }

        if let Some(line) = rest.first() {
            let r = GAUSSIAN_LINE.reader(line);
            rec.deltc1 = r.real(&DELTC1)?;
            rec.deltc2 = r.real(&DELTC2)?;
            rec.flag_deltc1 = Some(r.flag(&FLAG_DELTC1)?);
            rec.flag_deltc2 = Some(r.flag(&FLAG_DELTC2)?);
            rest = &rest[1..];
        }

        if let Some(line) = rest.first() {
            let r = GAUSSIAN_UNCERTAINTY_LINE.reader(line);
            rec.d_deltc1 = r.real(&DELTC1)?;
            rec.d_deltc2 = r.real(&DELTC2)?;
            rest = &rest[1..];
        }

        if let Some(line) = rest.first() {
            return Err(Report::new(CardError::unexpected(CardFamily::Broadening.name(), line)));
        }

        rec.validate()?;
        Ok(rec)
    }

    fn encode_record(rec: &BroadeningRecord) -> CardResult<Vec<String>> {
        rec.validate()?;
        let mut lines = vec![];

        let mut w = MAIN_LINE.writer();
        for (value, field) in rec.values().into_iter().zip(VALUES.iter()) {
            w.real(field, Some(value))?;
        }
        for (flag, field) in rec.flags().into_iter().zip(FLAGS.iter()) {
            w.flag(field, flag)?;
        }
        lines.push(w.finish());

        let uncertainties = rec.uncertainties();
        if uncertainties.iter().any(Option::is_some) {
            let mut w = UNCERTAINTY_LINE.writer();
            for (value, field) in uncertainties.into_iter().zip(VALUES.iter()) {
                w.real(field, value)?;
            }
            lines.push(w.finish());
        }

        if let (Some(c1), Some(c2)) = (rec.deltc1, rec.deltc2) {
            let mut w = GAUSSIAN_LINE.writer();
            w.real(&DELTC1, Some(c1))?
                .real(&DELTC2, Some(c2))?
                .flag(&FLAG_DELTC1, rec.flag_deltc1.unwrap_or_default())?
                .flag(&FLAG_DELTC2, rec.flag_deltc2.unwrap_or_default())?;
            lines.push(w.finish());

            if rec.d_deltc1.is_some() || rec.d_deltc2.is_some() {
                let mut w = GAUSSIAN_UNCERTAINTY_LINE.writer();
                w.real(&DELTC1, rec.d_deltc1)?.real(&DELTC2, rec.d_deltc2)?;
                lines.push(w.finish());
            }
        }

        Ok(lines)
    }
}

impl RecordCodec for BroadeningCodec {
    type Record = BroadeningRecord;

    const FAMILY: CardFamily = CardFamily::Broadening;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let rec = Self::decode_record(body)
            .attach_printable_lazy(|| format!("broadening lines: {body:?}"))?;
        Ok(vec![rec])
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        if records.len() > 1 {
            return Err(Report::new(CardError::Validation(format!("a broadening card holds one record, got {}", records.len()))));
        }
        let mut lines = vec![];
        for rec in records {
            lines.extend(Self::encode_record(rec)?);
        }
        Ok(lines)
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::Broadening(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "BROADening parameters may be varied";
    const MAIN: &str = "1.234E+00 2.980E+02 1.500E-01 2.500E-02 1.000E+00 5.000E-01  1 0 1 0 1 0";
    const UNC: &str = "1.000E-02 1.000E+00 1.000E-03 1.000E-03 1.000E-02 1.000E-02";
    const GAUSS: &str = "1.000E-01 2.000E-02                                          1 0";
    const GAUSS_UNC: &str = "1.000E-03 2.000E-04";

    #[test]
    fn test_main_only() -> CardResult<()> {
        let records = BroadeningCodec::decode(&[HEADER, MAIN, ""])?;
        assert_eq!(records.len(), 1);
        let b = &records[0];
        assert_eq!(b.crfn, 1.234);
        assert_eq!(b.temp, 298.0);
        assert_eq!(b.deltae, 0.5);
        assert_eq!(b.flag_crfn, VaryFlag::Yes);
        assert_eq!(b.flag_temp, VaryFlag::No);
        assert_eq!(b.flag_thick, VaryFlag::Yes);
        assert_eq!(b.d_crfn, None);
        assert_eq!(b.deltc1, None);
        Ok(())
    }

    #[test]
    fn test_all_lines() -> CardResult<()> {
        let records = BroadeningCodec::decode(&[HEADER, MAIN, UNC, GAUSS, GAUSS_UNC, ""])?;
        let b = &records[0];
        assert_eq!(b.d_temp, Some(1.0));
        assert_eq!(b.deltc1, Some(0.1));
        assert_eq!(b.deltc2, Some(0.02));
        assert_eq!(b.flag_deltc1, Some(VaryFlag::Yes));
        assert_eq!(b.flag_deltc2, Some(VaryFlag::No));
        assert_eq!(b.d_deltc2, Some(2.0e-4));

        let out = BroadeningCodec::encode(&records)?;
        assert_eq!(out.len(), 6, "Expected header, four data lines and the terminator");
        assert_eq!(BroadeningCodec::decode(&out)?, records);
        Ok(())
    }

    #[test]
    fn test_gaussian_without_uncertainties() -> CardResult<()> {
        let records = BroadeningCodec::decode(&[HEADER, MAIN, GAUSS])?;
        let b = &records[0];
        assert_eq!(b.d_crfn, None, "A line with flag columns is not the uncertainty line");
        assert_eq!(b.deltc1, Some(0.1));
        assert_eq!(BroadeningCodec::decode(&BroadeningCodec::encode(&records)?)?, records);
        Ok(())
    }

    #[test]
    fn test_deltc_pairing() -> CardResult<()> {
        let lone = "1.000E-01                                                    1 0";
        let e = BroadeningCodec::decode(&[HEADER, MAIN, UNC, lone]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)), "DELTC1 without DELTC2 must be rejected");

        let mut rec = BroadeningCodec::decode(&[HEADER, MAIN])?.remove(0);
        rec.deltc2 = Some(0.02);
        let e = BroadeningCodec::encode(&[rec.clone()]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)), "DELTC2 without DELTC1 must be rejected");

        rec.deltc1 = Some(0.1);
        rec.flag_deltc1 = Some(VaryFlag::Yes);
        rec.flag_deltc2 = Some(VaryFlag::No);
        let out = BroadeningCodec::encode(&[rec.clone()])?;
        assert_eq!(BroadeningCodec::decode(&out)?, vec![rec]);
        Ok(())
    }

    #[test]
    fn test_extra_lines() {
        let e = BroadeningCodec::decode(&[HEADER, MAIN, UNC, GAUSS, GAUSS_UNC, MAIN]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::UnexpectedLine { .. }));

        let e = BroadeningCodec::decode(&["NORMAlization and background are next", MAIN]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MissingHeader { .. }));
    }
}
