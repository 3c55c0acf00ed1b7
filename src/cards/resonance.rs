//! The resonance card: one line per resonance, with no header.
use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::layout::{FieldSlice, Layout};
use crate::numeric::VaryFlag;

const ENERGY: FieldSlice = FieldSlice::real("energy", 1, 11, 4);
const CAPTURE: FieldSlice = FieldSlice::real("capture_width", 12, 22, 4);
const CHANNEL1: FieldSlice = FieldSlice::real("channel1_width", 23, 33, 4);
const CHANNEL2: FieldSlice = FieldSlice::real("channel2_width", 34, 44, 4);
const CHANNEL3: FieldSlice = FieldSlice::real("channel3_width", 45, 55, 4);
const VARY_ENERGY: FieldSlice = FieldSlice::flag("vary_energy", 56, 57);
const VARY_CAPTURE: FieldSlice = FieldSlice::flag("vary_capture_width", 58, 59);
const VARY_CHANNEL1: FieldSlice = FieldSlice::flag("vary_channel1", 60, 61);
const VARY_CHANNEL2: FieldSlice = FieldSlice::flag("vary_channel2", 62, 63);
const VARY_CHANNEL3: FieldSlice = FieldSlice::flag("vary_channel3", 64, 65);
const SPIN_GROUP: FieldSlice = FieldSlice::int("spin_group", 66, 67);
const EXTRA: FieldSlice = FieldSlice::text("extra", 68, 80);

pub(crate) const RESONANCE_LINE: Layout = Layout::new("resonance", &[
    ENERGY, CAPTURE, CHANNEL1, CHANNEL2, CHANNEL3,
    VARY_ENERGY, VARY_CAPTURE, VARY_CHANNEL1, VARY_CHANNEL2, VARY_CHANNEL3,
    SPIN_GROUP, EXTRA,
]);

/// One resonance.
///
/// Channel widths are signed: the magnitude is the physical width and a
/// negative sign marks a negative reduced-width amplitude.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResonanceRecord {
    /// Resonance energy (eV)
    pub energy: f64,
    /// Capture width (meV)
    pub capture_width: f64,
    pub channel1_width: Option<f64>,
    pub channel2_width: Option<f64>,
    pub channel3_width: Option<f64>,
    pub vary_energy: VaryFlag,
    pub vary_capture_width: VaryFlag,
    pub vary_channel1: VaryFlag,
    pub vary_channel2: VaryFlag,
    pub vary_channel3: VaryFlag,
    pub spin_group: i64,
}

impl ResonanceRecord {
    fn from_line(line: &str) -> CardResult<Self> {
        let r = RESONANCE_LINE.reader(line);
        if !r.is_blank(&EXTRA) {
            return Err(Report::new(CardError::UnsupportedFormat {
                reason: "resonances continued onto a second line".to_owned()
            })).attach_printable_lazy(|| format!("line '{line}' has a value in columns 68-80"));
        }

        Ok(Self {
            energy: r.required_real(&ENERGY)?,
            capture_width: r.required_real(&CAPTURE)?,
            channel1_width: r.real(&CHANNEL1)?,
            channel2_width: r.real(&CHANNEL2)?,
            channel3_width: r.real(&CHANNEL3)?,
            vary_energy: r.flag(&VARY_ENERGY)?,
            vary_capture_width: r.flag(&VARY_CAPTURE)?,
            vary_channel1: r.flag(&VARY_CHANNEL1)?,
            vary_channel2: r.flag(&VARY_CHANNEL2)?,
            vary_channel3: r.flag(&VARY_CHANNEL3)?,
            spin_group: r.required_int(&SPIN_GROUP)?,
        })
    }

    fn to_line(&self) -> CardResult<String> {
        let mut w = RESONANCE_LINE.writer();
        w.real(&ENERGY, Some(self.energy))?
            .real(&CAPTURE, Some(self.capture_width))?
            .real(&CHANNEL1, self.channel1_width)?
            .real(&CHANNEL2, self.channel2_width)?
            .real(&CHANNEL3, self.channel3_width)?
            .flag(&VARY_ENERGY, self.vary_energy)?
            .flag(&VARY_CAPTURE, self.vary_capture_width)?
            .flag(&VARY_CHANNEL1, self.vary_channel1)?
            .flag(&VARY_CHANNEL2, self.vary_channel2)?
            .flag(&VARY_CHANNEL3, self.vary_channel3)?
            .int(&SPIN_GROUP, Some(self.spin_group))?;
        Ok(w.finish())
    }
}

pub struct ResonanceCodec;

impl RecordCodec for ResonanceCodec {
    type Record = ResonanceRecord;

    const FAMILY: CardFamily = CardFamily::Resonance;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        body.iter().map(|line| ResonanceRecord::from_line(line)).collect()
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        records.iter().map(|r| r.to_line()).collect()
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::Resonance(records)
    }
}
