//! External R-function parameters, one channel of one spin group per line.
//!
//! The card comes in two layouts with different headers. The `EXTERnal` form
//! has 11-column values and a single logarithmic coefficient followed by its
//! flags; the compact `R-EXTernal` form puts seven one-column flags up front
//! and adds a linear logarithmic coefficient and a quadratic term.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::VaryFlag;

const SPIN_GROUP: FieldSlice = FieldSlice::int("spin_group", 1, 3);
const CHANNEL: FieldSlice = FieldSlice::int("channel", 4, 5);
const E_DOWN: FieldSlice = FieldSlice::real("e_down", 6, 16, 4);
const E_UP: FieldSlice = FieldSlice::real("e_up", 17, 27, 4);
const R_CON: FieldSlice = FieldSlice::real("r_con", 28, 38, 4);
const R_LIN: FieldSlice = FieldSlice::real("r_lin", 39, 49, 4);
const S_ALPHA: FieldSlice = FieldSlice::real("s_alpha", 50, 60, 4);
const FLAG_E_DOWN: FieldSlice = FieldSlice::flag("vary_e_down", 62, 62);
const FLAG_E_UP: FieldSlice = FieldSlice::flag("vary_e_up", 64, 64);
const FLAG_R_CON: FieldSlice = FieldSlice::flag("vary_r_con", 66, 66);
const FLAG_R_LIN: FieldSlice = FieldSlice::flag("vary_r_lin", 68, 68);
const FLAG_S_ALPHA: FieldSlice = FieldSlice::flag("vary_s_alpha", 70, 70);

pub(crate) const EXTERNAL_LINE: Layout = Layout::new("external R-function", &[
    SPIN_GROUP, CHANNEL, E_DOWN, E_UP, R_CON, R_LIN, S_ALPHA,
    FLAG_E_DOWN, FLAG_E_UP, FLAG_R_CON, FLAG_R_LIN, FLAG_S_ALPHA,
]);

mod compact {
    use super::{FieldSlice, Layout};

    pub(super) const SPIN_GROUP: FieldSlice = FieldSlice::int("spin_group", 1, 2);
    pub(super) const CHANNEL: FieldSlice = FieldSlice::int("channel", 3, 3);
    pub(super) const FLAG_E_DOWN: FieldSlice = FieldSlice::flag("vary_e_down", 4, 4);
    pub(super) const FLAG_E_UP: FieldSlice = FieldSlice::flag("vary_e_up", 5, 5);
    pub(super) const FLAG_R_CON: FieldSlice = FieldSlice::flag("vary_r_con", 6, 6);
    pub(super) const FLAG_R_LIN: FieldSlice = FieldSlice::flag("vary_r_lin", 7, 7);
    pub(super) const FLAG_S_CON: FieldSlice = FieldSlice::flag("vary_s_con", 8, 8);
    pub(super) const FLAG_S_LIN: FieldSlice = FieldSlice::flag("vary_s_lin", 9, 9);
    pub(super) const FLAG_R_Q: FieldSlice = FieldSlice::flag("vary_r_q", 10, 10);
    pub(super) const E_DOWN: FieldSlice = FieldSlice::real("e_down", 11, 20, 4);
    pub(super) const E_UP: FieldSlice = FieldSlice::real("e_up", 21, 30, 4);
    pub(super) const R_CON: FieldSlice = FieldSlice::real("r_con", 31, 40, 4);
    pub(super) const R_LIN: FieldSlice = FieldSlice::real("r_lin", 41, 50, 4);
    pub(super) const S_CON: FieldSlice = FieldSlice::real("s_con", 51, 60, 4);
    pub(super) const S_LIN: FieldSlice = FieldSlice::real("s_lin", 61, 70, 4);
    pub(super) const R_Q: FieldSlice = FieldSlice::real("r_q", 71, 80, 4);

    pub(crate) const LINE: Layout = Layout::new("compact external R-function", &[
        SPIN_GROUP, CHANNEL,
        FLAG_E_DOWN, FLAG_E_UP, FLAG_R_CON, FLAG_R_LIN, FLAG_S_CON, FLAG_S_LIN, FLAG_R_Q,
        E_DOWN, E_UP, R_CON, R_LIN, S_CON, S_LIN, R_Q,
    ]);
}

pub(crate) use compact::LINE as COMPACT_LINE;

fn check_log_coefficient(name: &str, value: f64) -> CardResult<()> {
    if value < 0.0 {
        return Err(Report::new(CardError::Validation(format!("{name} must not be negative, got {value}"))));
    }
    Ok(())
}

/// The `EXTERnal` layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExternalRRecord {
    pub spin_group: i64,
    pub channel: i64,
    /// Logarithmic singularity below the energy range (eV)
    pub e_down: f64,
    /// Logarithmic singularity above the energy range (eV)
    pub e_up: f64,
    pub r_con: f64,
    pub r_lin: f64,
    /// Coefficient of the logarithmic term, never negative
    pub s_alpha: f64,
    pub vary_e_down: VaryFlag,
    pub vary_e_up: VaryFlag,
    pub vary_r_con: VaryFlag,
    pub vary_r_lin: VaryFlag,
    pub vary_s_alpha: VaryFlag,
}

impl ExternalRRecord {
    fn from_line(line: &str) -> CardResult<Self> {
        let r = EXTERNAL_LINE.reader(line);
        let rec = Self {
            spin_group: r.required_int(&SPIN_GROUP)?,
            channel: r.required_int(&CHANNEL)?,
            e_down: r.required_real(&E_DOWN)?,
            e_up: r.required_real(&E_UP)?,
            r_con: r.required_real(&R_CON)?,
            r_lin: r.required_real(&R_LIN)?,
            s_alpha: r.required_real(&S_ALPHA)?,
            vary_e_down: r.flag(&FLAG_E_DOWN)?,
            vary_e_up: r.flag(&FLAG_E_UP)?,
            vary_r_con: r.flag(&FLAG_R_CON)?,
            vary_r_lin: r.flag(&FLAG_R_LIN)?,
            vary_s_alpha: r.flag(&FLAG_S_ALPHA)?,
        };
        check_log_coefficient(S_ALPHA.name, rec.s_alpha)?;
        Ok(rec)
    }

    fn to_line(&self) -> CardResult<String> {
        check_log_coefficient(S_ALPHA.name, self.s_alpha)?;
        let mut w = EXTERNAL_LINE.writer();
        w.int(&SPIN_GROUP, Some(self.spin_group))?
            .int(&CHANNEL, Some(self.channel))?
            .real(&E_DOWN, Some(self.e_down))?
            .real(&E_UP, Some(self.e_up))?
            .real(&R_CON, Some(self.r_con))?
            .real(&R_LIN, Some(self.r_lin))?
            .real(&S_ALPHA, Some(self.s_alpha))?
            .flag(&FLAG_E_DOWN, self.vary_e_down)?
            .flag(&FLAG_E_UP, self.vary_e_up)?
            .flag(&FLAG_R_CON, self.vary_r_con)?
            .flag(&FLAG_R_LIN, self.vary_r_lin)?
            .flag(&FLAG_S_ALPHA, self.vary_s_alpha)?;
        Ok(w.finish())
    }
}

/// The compact `R-EXTernal` layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactExternalRRecord {
    pub spin_group: i64,
    pub channel: i64,
    pub e_down: f64,
    pub e_up: f64,
    pub r_con: f64,
    pub r_lin: f64,
    /// Constant coefficient of the logarithmic term, never negative
    pub s_con: f64,
    /// Linear coefficient of the logarithmic term
    pub s_lin: f64,
    /// Quadratic term
    pub r_q: f64,
    pub vary_e_down: VaryFlag,
    pub vary_e_up: VaryFlag,
    pub vary_r_con: VaryFlag,
    pub vary_r_lin: VaryFlag,
    pub vary_s_con: VaryFlag,
    pub vary_s_lin: VaryFlag,
    pub vary_r_q: VaryFlag,
}

impl CompactExternalRRecord {
    fn from_line(line: &str) -> CardResult<Self> {
        let r = COMPACT_LINE.reader(line);
        let rec = Self {
            spin_group: r.required_int(&compact::SPIN_GROUP)?,
            channel: r.required_int(&compact::CHANNEL)?,
            e_down: r.required_real(&compact::E_DOWN)?,
            e_up: r.required_real(&compact::E_UP)?,
            r_con: r.required_real(&compact::R_CON)?,
            r_lin: r.required_real(&compact::R_LIN)?,
            s_con: r.required_real(&compact::S_CON)?,
            s_lin: r.required_real(&compact::S_LIN)?,
            r_q: r.required_real(&compact::R_Q)?,
            vary_e_down: r.flag(&compact::FLAG_E_DOWN)?,
            vary_e_up: r.flag(&compact::FLAG_E_UP)?,
            vary_r_con: r.flag(&compact::FLAG_R_CON)?,
            vary_r_lin: r.flag(&compact::FLAG_R_LIN)?,
            vary_s_con: r.flag(&compact::FLAG_S_CON)?,
            vary_s_lin: r.flag(&compact::FLAG_S_LIN)?,
            vary_r_q: r.flag(&compact::FLAG_R_Q)?,
        };
        check_log_coefficient(compact::S_CON.name, rec.s_con)?;
        Ok(rec)
    }

    fn to_line(&self) -> CardResult<String> {
        check_log_coefficient(compact::S_CON.name, self.s_con)?;
        let mut w = COMPACT_LINE.writer();
        w.int(&compact::SPIN_GROUP, Some(self.spin_group))?
            .int(&compact::CHANNEL, Some(self.channel))?
            .flag(&compact::FLAG_E_DOWN, self.vary_e_down)?
            .flag(&compact::FLAG_E_UP, self.vary_e_up)?
            .flag(&compact::FLAG_R_CON, self.vary_r_con)?
            .flag(&compact::FLAG_R_LIN, self.vary_r_lin)?
            .flag(&compact::FLAG_S_CON, self.vary_s_con)?
            .flag(&compact::FLAG_S_LIN, self.vary_s_lin)?
            .flag(&compact::FLAG_R_Q, self.vary_r_q)?
            .real(&compact::E_DOWN, Some(self.e_down))?
            .real(&compact::E_UP, Some(self.e_up))?
            .real(&compact::R_CON, Some(self.r_con))?
            .real(&compact::R_LIN, Some(self.r_lin))?
            .real(&compact::S_CON, Some(self.s_con))?
            .real(&compact::S_LIN, Some(self.s_lin))?
            .real(&compact::R_Q, Some(self.r_q))?;
        Ok(w.finish())
    }
}

pub struct ExternalRCodec;

impl RecordCodec for ExternalRCodec {
    type Record = ExternalRRecord;

    const FAMILY: CardFamily = CardFamily::ExternalR;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        body.iter()
            .map(|line| ExternalRRecord::from_line(line)
                .attach_printable_lazy(|| format!("line '{}'", line.trim_end())))
            .collect()
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        records.iter().map(ExternalRRecord::to_line).collect()
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::ExternalR(records)
    }
}

pub struct CompactExternalRCodec;

impl RecordCodec for CompactExternalRCodec {
    type Record = CompactExternalRRecord;

    const FAMILY: CardFamily = CardFamily::CompactExternalR;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        body.iter()
            .map(|line| CompactExternalRRecord::from_line(line)
                .attach_printable_lazy(|| format!("line '{}'", line.trim_end())))
            .collect()
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        records.iter().map(CompactExternalRRecord::to_line).collect()
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::CompactExternalR(records)
    }
}
