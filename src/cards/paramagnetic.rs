//! Paramagnetic cross section parameters: a nuclide line followed by an isotope line.
use std::fmt::Display;

use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::VaryFlag;

const NUCLIDE: FieldSlice = FieldSlice::text("nuclide", 1, 5);
const FLAG_A: FieldSlice = FieldSlice::flag("flag_a", 7, 7);
const FLAG_B: FieldSlice = FieldSlice::flag("flag_b", 9, 9);
const FLAG_P: FieldSlice = FieldSlice::flag("flag_p", 10, 10);
const A: FieldSlice = FieldSlice::real("a", 11, 20, 3);
const DA: FieldSlice = FieldSlice::real("a_uncertainty", 21, 30, 3);
const B: FieldSlice = FieldSlice::real("b", 31, 40, 3);
const DB: FieldSlice = FieldSlice::real("b_uncertainty", 41, 50, 3);
const P: FieldSlice = FieldSlice::real("p", 51, 60, 3);
const DP: FieldSlice = FieldSlice::real("p_uncertainty", 61, 70, 3);

const ISOTOPE: FieldSlice = FieldSlice::int("isotope", 7, 7);
const FLAG_C: FieldSlice = FieldSlice::flag("flag_c", 9, 9);
const C: FieldSlice = FieldSlice::real("c", 11, 20, 3);
const DC: FieldSlice = FieldSlice::real("c_uncertainty", 21, 30, 3);

pub(crate) const NUCLIDE_LINE: Layout = Layout::new("paramagnetic nuclide", &[
    NUCLIDE, FLAG_A, FLAG_B, FLAG_P, A, DA, B, DB, P, DP,
]);
pub(crate) const ISOTOPE_LINE: Layout = Layout::new("paramagnetic isotope", &[ISOTOPE, FLAG_C, C, DC]);

/// Nuclides with a paramagnetic cross section model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Nuclide {
    Thulium,
    Erbium,
    Holmium,
}

impl Nuclide {
    pub fn symbol(&self) -> &'static str {
        match self {
            Nuclide::Thulium => "TM",
            Nuclide::Erbium => "ER",
            Nuclide::Holmium => "HO",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TM" => Some(Self::Thulium),
            "ER" => Some(Self::Erbium),
            "HO" => Some(Self::Holmium),
            _ => None,
        }
    }
}

impl Display for Nuclide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Paramagnetic parameters of one nuclide.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamagneticRecord {
    pub nuclide: Nuclide,
    pub a: f64,
    pub a_uncertainty: Option<f64>,
    pub b: f64,
    pub b_uncertainty: Option<f64>,
    pub p: f64,
    pub p_uncertainty: Option<f64>,
    /// Isotope number, 1 to 9
    pub isotope: i64,
    pub c: f64,
    pub c_uncertainty: Option<f64>,
    pub flag_a: VaryFlag,
    pub flag_b: VaryFlag,
    pub flag_p: VaryFlag,
    pub flag_c: VaryFlag,
}

impl ParamagneticRecord {
    fn from_lines(nuclide_line: &str, isotope_line: &str) -> CardResult<Self> {
        let r = NUCLIDE_LINE.reader(nuclide_line);
        let symbol = r.text(&NUCLIDE);
        let nuclide = Nuclide::from_symbol(symbol)
            .ok_or_else(|| Report::new(CardError::Validation(
                format!("'{symbol}' is not a paramagnetic nuclide (expected TM, ER or HO)")
            )))?;

        let ri = ISOTOPE_LINE.reader(isotope_line);
        let isotope = ri.required_int(&ISOTOPE)?;
        if isotope <= 0 {
            return Err(Report::new(CardError::Validation(format!("isotope number must be positive, got {isotope}"))));
        }

        Ok(Self {
            nuclide,
            a: r.required_real(&A)?,
            a_uncertainty: r.real(&DA)?,
            b: r.required_real(&B)?,
            b_uncertainty: r.real(&DB)?,
            p: r.required_real(&P)?,
            p_uncertainty: r.real(&DP)?,
            isotope,
            c: ri.required_real(&C)?,
            c_uncertainty: ri.real(&DC)?,
            flag_a: r.flag(&FLAG_A)?,
            flag_b: r.flag(&FLAG_B)?,
            flag_p: r.flag(&FLAG_P)?,
            flag_c: ri.flag(&FLAG_C)?,
        })
    }

    fn to_lines(&self) -> CardResult<[String; 2]> {
        let mut w = NUCLIDE_LINE.writer();
        w.text(&NUCLIDE, self.nuclide.symbol())?
            .flag(&FLAG_A, self.flag_a)?
            .flag(&FLAG_B, self.flag_b)?
            .flag(&FLAG_P, self.flag_p)?
            .real(&A, Some(self.a))?
            .real(&DA, self.a_uncertainty)?
            .real(&B, Some(self.b))?
            .real(&DB, self.b_uncertainty)?
            .real(&P, Some(self.p))?
            .real(&DP, self.p_uncertainty)?;

        let mut wi = ISOTOPE_LINE.writer();
        wi.int(&ISOTOPE, Some(self.isotope))?
            .flag(&FLAG_C, self.flag_c)?
            .real(&C, Some(self.c))?
            .real(&DC, self.c_uncertainty)?;

        Ok([w.finish(), wi.finish()])
    }
}

pub struct ParamagneticCodec;

impl RecordCodec for ParamagneticCodec {
    type Record = ParamagneticRecord;

    const FAMILY: CardFamily = CardFamily::Paramagnetic;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        if body.len() % 2 != 0 {
            let last = body.last().copied().unwrap_or_default();
            return Err(Report::new(CardError::unexpected(Self::FAMILY.name(), last)))
                .attach_printable("paramagnetic lines come in nuclide/isotope pairs");
        }

        body.chunks(2)
            .map(|pair| ParamagneticRecord::from_lines(pair[0], pair[1])
                .attach_printable_lazy(|| format!("lines '{}' and '{}'", pair[0].trim_end(), pair[1].trim_end())))
            .collect()
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        let mut lines = vec![];
        for rec in records {
            lines.extend(rec.to_lines()?);
        }
        Ok(lines)
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::Paramagnetic(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "PARAMagnetic cross section parameters follow";
    const TM_LINE: &str = "TM    1 111.234E+00 2.345E-03 3.456E+00 4.567E-03 5.678E+00 6.789E-03";
    const TM_ISO: &str = "      1 1 1.234E+00 2.345E-03";

    #[test]
    fn test_decode() -> CardResult<()> {
        let records = ParamagneticCodec::decode(&[HEADER, TM_LINE, TM_ISO, ""])?;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.nuclide, Nuclide::Thulium);
        assert_eq!(r.a, 1.234);
        assert_eq!(r.b_uncertainty, Some(4.567e-3));
        assert_eq!(r.p, 5.678);
        assert_eq!((r.flag_a, r.flag_b, r.flag_p), (VaryFlag::Yes, VaryFlag::Yes, VaryFlag::Yes));
        assert_eq!(r.isotope, 1);
        assert_eq!(r.c_uncertainty, Some(2.345e-3));
        assert_eq!(r.flag_c, VaryFlag::Yes);
        Ok(())
    }

    #[test]
    fn test_several_nuclides_round_trip() -> CardResult<()> {
        let ho = "HO    0 03 2.0       0.1       3.0                 4.0";
        let ho_iso = "      2 0 5.0";
        let records = ParamagneticCodec::decode(&[HEADER, TM_LINE, TM_ISO, ho, ho_iso])?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].nuclide, Nuclide::Holmium);
        assert_eq!(records[1].flag_p, VaryFlag::Pup);
        assert_eq!(records[1].b_uncertainty, None);

        let out = ParamagneticCodec::encode(&records)?;
        assert_eq!(out.len(), 6, "Expected header, two line pairs, and the terminator");
        assert_eq!(ParamagneticCodec::decode(&out)?, records);
        Ok(())
    }

    #[test]
    fn test_bad_cards() {
        let e = ParamagneticCodec::decode(&[HEADER, TM_LINE]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::UnexpectedLine { .. }), "A nuclide line needs its isotope line");

        let unknown = TM_LINE.replacen("TM", "XX", 1);
        let e = ParamagneticCodec::decode(&[HEADER, unknown.as_str(), TM_ISO]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)));

        let e = ParamagneticCodec::decode(&[HEADER, TM_LINE, "        1 1.234E+00"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MissingField { .. }), "The isotope number is required");
    }

    #[test]
    fn test_one_column_flags() {
        let rec = ParamagneticRecord {
            nuclide: Nuclide::Erbium, a: 1.0, a_uncertainty: None, b: 1.0, b_uncertainty: None,
            p: 1.0, p_uncertainty: None, isotope: 1, c: 1.0, c_uncertainty: None,
            flag_a: VaryFlag::UseFromParfile, flag_b: VaryFlag::No, flag_p: VaryFlag::No, flag_c: VaryFlag::No,
        };
        let e = ParamagneticCodec::encode(&[rec]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::FieldOverflow { .. }));
    }
}
