//! The user-defined resolution function card.
//!
//! Each line is identified by its first five characters: an optional `BURST`
//! line, any number of `CHANN` lines, and `FILE=` lines naming the files that
//! hold the resolution function.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::VaryFlag;

const TAG: FieldSlice = FieldSlice::text("tag", 1, 5);
const FLAG: FieldSlice = FieldSlice::flag("flag", 7, 7);

const BURST_WIDTH: FieldSlice = FieldSlice::real("burst_width", 11, 20, 3);
const BURST_UNCERTAINTY: FieldSlice = FieldSlice::real("burst_uncertainty", 21, 30, 3);

const CHANNEL_ENERGY: FieldSlice = FieldSlice::real("channel_energy", 11, 20, 3);
const CHANNEL_WIDTH: FieldSlice = FieldSlice::real("channel_width", 21, 30, 3);
const CHANNEL_UNCERTAINTY: FieldSlice = FieldSlice::real("channel_uncertainty", 31, 40, 3);

const FILE_NAME: FieldSlice = FieldSlice::text("file_name", 6, 75);

pub(crate) const BURST_LINE: Layout = Layout::new("burst", &[TAG, FLAG, BURST_WIDTH, BURST_UNCERTAINTY]);
pub(crate) const CHANNEL_LINE: Layout = Layout::new("channel", &[TAG, FLAG, CHANNEL_ENERGY, CHANNEL_WIDTH, CHANNEL_UNCERTAINTY]);
pub(crate) const FILE_LINE: Layout = Layout::new("file", &[TAG, FILE_NAME]);

/// Square burst width (ns).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BurstParameter {
    pub flag: VaryFlag,
    pub width: f64,
    pub uncertainty: Option<f64>,
}

/// Channel width applying from `energy` upwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelParameter {
    pub flag: VaryFlag,
    pub energy: f64,
    pub width: f64,
    pub uncertainty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserResolutionRecord {
    pub burst: Option<BurstParameter>,
    pub channels: Vec<ChannelParameter>,
    pub files: Vec<String>,
}

impl BurstParameter {
    pub(crate) fn from_line(line: &str) -> CardResult<Self> {
        let r = BURST_LINE.reader(line);
        Ok(Self {
            flag: r.flag(&FLAG)?,
            width: r.required_real(&BURST_WIDTH)?,
            uncertainty: r.real(&BURST_UNCERTAINTY)?,
        })
    }

    pub(crate) fn to_line(&self) -> CardResult<String> {
        let mut w = BURST_LINE.writer();
        w.text(&TAG, "BURST")?
            .flag(&FLAG, self.flag)?
            .real(&BURST_WIDTH, Some(self.width))?
            .real(&BURST_UNCERTAINTY, self.uncertainty)?;
        Ok(w.finish())
    }
}

impl ChannelParameter {
    pub(crate) fn from_line(line: &str) -> CardResult<Self> {
        let r = CHANNEL_LINE.reader(line);
        Ok(Self {
            flag: r.flag(&FLAG)?,
            energy: r.required_real(&CHANNEL_ENERGY)?,
            width: r.required_real(&CHANNEL_WIDTH)?,
            uncertainty: r.real(&CHANNEL_UNCERTAINTY)?,
        })
    }

    pub(crate) fn to_line(&self) -> CardResult<String> {
        let mut w = CHANNEL_LINE.writer();
        w.text(&TAG, "CHANN")?
            .flag(&FLAG, self.flag)?
            .real(&CHANNEL_ENERGY, Some(self.energy))?
            .real(&CHANNEL_WIDTH, Some(self.width))?
            .real(&CHANNEL_UNCERTAINTY, self.uncertainty)?;
        Ok(w.finish())
    }
}

impl UserResolutionRecord {
    fn read_line(&mut self, line: &str) -> CardResult<()> {
        match line.get(..5).unwrap_or(line) {
            "BURST" => {
                if self.burst.is_some() {
                    return Err(Report::new(CardError::Validation("more than one BURST line".to_owned())));
                }
                self.burst = Some(BurstParameter::from_line(line)?);
            },
            "CHANN" => self.channels.push(ChannelParameter::from_line(line)?),
            "FILE=" => {
                // Check the whole remainder so that long names are refused rather than cut at column 75
                let name = line[5..].trim();
                if name.is_empty() {
                    return Err(Report::new(CardError::MissingField { field: FILE_NAME.name }));
                }
                if name.chars().count() > FILE_NAME.width() {
                    return Err(Report::new(CardError::FieldOverflow { value: name.to_owned(), width: FILE_NAME.width() }));
                }
                self.files.push(name.to_owned());
            },
            _ => return Err(Report::new(CardError::unexpected(CardFamily::UserResolution.name(), line))),
        }
        Ok(())
    }

    fn to_lines(&self) -> CardResult<Vec<String>> {
        let mut lines = vec![];
        if let Some(burst) = &self.burst {
            lines.push(burst.to_line()?);
        }
        for ch in &self.channels {
            lines.push(ch.to_line()?);
        }

        for file in &self.files {
            let mut w = FILE_LINE.writer();
            w.text(&TAG, "FILE=")?.text(&FILE_NAME, file)?;
            lines.push(w.finish());
        }
        Ok(lines)
    }
}

pub struct UserResolutionCodec;

impl RecordCodec for UserResolutionCodec {
    type Record = UserResolutionRecord;

    const FAMILY: CardFamily = CardFamily::UserResolution;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let mut rec = UserResolutionRecord::default();
        for &line in body {
            rec.read_line(line)
                .attach_printable_lazy(|| format!("line '{}'", line.trim_end()))?;
        }
        Ok(vec![rec])
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        match records {
            [rec] => rec.to_lines(),
            _ => Err(Report::new(CardError::Validation(
                format!("a user-defined resolution card holds one record, got {}", records.len())
            ))),
        }
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::UserResolution(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "USER-Defined resolution function";

    #[test]
    fn test_decode() -> CardResult<()> {
        let lines = [
            HEADER,
            "BURST 1    1.234E+00 2.345E-03",
            "CHANN 1    1.234E+03 2.345E+00 3.456E-03",
            "CHANN 0    5.000E+03 6.000E+00",
            "FILE=resolution_data.txt",
            "FILE=   second.dat",
            "",
        ];
        let records = UserResolutionCodec::decode(&lines)?;
        assert_eq!(records.len(), 1, "The card holds a single record");
        let r = &records[0];

        assert_eq!(r.burst, Some(BurstParameter { flag: VaryFlag::Yes, width: 1.234, uncertainty: Some(2.345e-3) }));
        assert_eq!(r.channels.len(), 2);
        assert_eq!(r.channels[0].energy, 1234.0);
        assert_eq!(r.channels[1].uncertainty, None);
        assert_eq!(r.files, vec!["resolution_data.txt", "second.dat"]);

        let out = UserResolutionCodec::encode(&records)?;
        assert_eq!(out[4], "FILE=resolution_data.txt");
        assert_eq!(UserResolutionCodec::decode(&out)?, records);
        Ok(())
    }

    #[test]
    fn test_bad_lines() {
        let e = UserResolutionCodec::decode(&[HEADER, "BURST 1    1.0", "BURST 0    2.0"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Validation(_)));

        let e = UserResolutionCodec::decode(&[HEADER, "WIDTH 1    1.0"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::UnexpectedLine { .. }));

        let long = format!("FILE={}", "x".repeat(71));
        let e = UserResolutionCodec::decode(&[HEADER, long.as_str()]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::FieldOverflow { .. }));

        let e = UserResolutionCodec::decode(&[HEADER, "CHANN 1    1.0"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MissingField { field: "channel_width" }));
    }
}
