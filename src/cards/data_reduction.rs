//! The data reduction card: one named parameter per line.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::VaryFlag;

const NAME: FieldSlice = FieldSlice::text("name", 1, 5);
const FLAG: FieldSlice = FieldSlice::flag("flag", 7, 7);
const VALUE: FieldSlice = FieldSlice::real("value", 11, 20, 3);
const UNCERTAINTY: FieldSlice = FieldSlice::real("uncertainty", 21, 30, 3);
const DERIVATIVE: FieldSlice = FieldSlice::real("derivative", 31, 40, 3);

pub(crate) const PARAMETER_LINE: Layout = Layout::new("data reduction", &[NAME, FLAG, VALUE, UNCERTAINTY, DERIVATIVE]);

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataReductionRecord {
    /// Parameter name, up to five characters
    pub name: String,
    pub flag: VaryFlag,
    pub value: f64,
    /// Absolute uncertainty
    pub uncertainty: Option<f64>,
    /// Step used for the partial derivative
    pub derivative: Option<f64>,
}

impl DataReductionRecord {
    fn from_line(line: &str) -> CardResult<Self> {
        let r = PARAMETER_LINE.reader(line);
        let name = r.text(&NAME);
        if name.is_empty() {
            return Err(Report::new(CardError::MissingField { field: NAME.name }));
        }

        Ok(Self {
            name: name.to_owned(),
            flag: r.flag(&FLAG)?,
            value: r.required_real(&VALUE)?,
            uncertainty: r.real(&UNCERTAINTY)?,
            derivative: r.real(&DERIVATIVE)?,
        })
    }

    fn to_line(&self) -> CardResult<String> {
        if self.name.trim().is_empty() {
            return Err(Report::new(CardError::MissingField { field: NAME.name }));
        }
        let mut w = PARAMETER_LINE.writer();
        w.text(&NAME, &self.name)?
            .flag(&FLAG, self.flag)?
            .real(&VALUE, Some(self.value))?
            .real(&UNCERTAINTY, self.uncertainty)?
            .real(&DERIVATIVE, self.derivative)?;
        Ok(w.finish())
    }
}

pub struct DataReductionCodec;

impl RecordCodec for DataReductionCodec {
    type Record = DataReductionRecord;

    const FAMILY: CardFamily = CardFamily::DataReduction;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        body.iter()
            .map(|line| DataReductionRecord::from_line(line)
                .attach_printable_lazy(|| format!("line '{}'", line.trim_end())))
            .collect()
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        records.iter().map(|r| r.to_line()).collect()
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::DataReduction(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "DATA reduction parameters are next";

    #[test]
    fn test_decode_and_round_trip() -> CardResult<()> {
        let lines = [
            HEADER,
            "PAR1  1   1.234E+00 5.000E-02 1.234E+00",
            "PAR2  0   2.5",
            "",
        ];
        let records = DataReductionCodec::decode(&lines)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], DataReductionRecord {
            name: "PAR1".to_owned(),
            flag: VaryFlag::Yes,
            value: 1.234,
            uncertainty: Some(0.05),
            derivative: Some(1.234),
        });
        assert_eq!(records[1].uncertainty, None);

        let out = DataReductionCodec::encode(&records)?;
        assert_eq!(&out[1][..7], "PAR1  1");
        assert_eq!(DataReductionCodec::decode(&out)?, records);
        Ok(())
    }

    #[test]
    fn test_header_named_parameter() -> CardResult<()> {
        let rec = DataReductionRecord {
            name: "DATA".to_owned(),
            flag: VaryFlag::Yes,
            value: 1.25,
            uncertainty: None,
            derivative: None,
        };
        let out = DataReductionCodec::encode(&[rec.clone()])?;
        assert!(out[1].starts_with("DATA "));
        assert_eq!(DataReductionCodec::decode(&out)?, vec![rec]);
        Ok(())
    }

    #[test]
    fn test_required_fields() {
        let e = DataReductionCodec::decode(&[HEADER, "      1   1.234E+00"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MissingField { field: "name" }));

        let e = DataReductionCodec::decode(&[HEADER, "PAR1  1"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MissingField { field: "value" }));

        let rec = DataReductionRecord { name: "TOOLONG".to_owned(), flag: VaryFlag::No, value: 1.0, uncertainty: None, derivative: None };
        let e = DataReductionCodec::encode(&[rec]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::FieldOverflow { .. }));
    }
}
