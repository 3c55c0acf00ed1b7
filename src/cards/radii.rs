//! The channel radii card in key-word format.
//!
//! Each radius entry starts with a `Radii=` (or `Radius=`) line and owns every
//! following line up to the next one:
//!
//! ```text
//! Radii= 4.136420, 4.136420    Flags=0, 0
//!     Group= 1 Chan= 1, 2,
//!     Group= 2 Chan= 1, 2, 3,
//!        4, 5
//! ```
//!
//! Number-only lines continue the channel list of the group before them, and
//! channel lists of a group named twice are merged.
use error_stack::{Report, ResultExt};
use itertools::Itertools;

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::continuation::{ContinuationAssembler, ContinuationGroup, ContinuationRule};
use crate::numeric::{decode_flag, decode_float, VaryFlag};
use crate::parsing::{parse_assignments, Assignment};

/// Channels assigned to one spin group.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupChannels {
    pub group: i64,
    pub channels: Vec<i64>,
}

/// Which spin groups and channels a radius applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelAssignment {
    /// All spin groups (`Group=all`, or no group given)
    #[default]
    Global,
    Groups(Vec<GroupChannels>),
}

impl ChannelAssignment {
    /// The spin group numbers, or `None` for a global radius.
    pub fn group_numbers(&self) -> Option<Vec<i64>> {
        match self {
            ChannelAssignment::Global => None,
            ChannelAssignment::Groups(g) => Some(g.iter().map(|g| g.group).collect()),
        }
    }
}

/// One radius entry.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadiusRecord {
    /// Radius for potential scattering (F)
    pub effective_radius: f64,
    /// Radius for penetrabilities and shifts (F)
    pub true_radius: Option<f64>,
    pub vary_effective: VaryFlag,
    pub vary_true: VaryFlag,
    pub relative_uncertainty: Option<f64>,
    pub absolute_uncertainty: Option<f64>,
    /// Particle pair name (`PP=`)
    pub particle_pair: Option<String>,
    /// Orbital angular momenta (`L=`): numbers, or "odd"/"even"/"all"
    pub orbital_momentum: Vec<String>,
    pub channels: ChannelAssignment,
}

fn is_radius_line(line: &str) -> bool {
    let upper = line.trim_start().to_ascii_uppercase();
    ["RADIUS", "RADII"].iter().any(|kw| {
        upper.strip_prefix(kw)
            .map(|rest| rest.trim_start().starts_with('='))
            .unwrap_or(false)
    })
}

struct RadiusBlocks;

impl ContinuationRule for RadiusBlocks {
    fn continues(&self, _group: &[&str], line: &str) -> bool {
        !is_radius_line(line)
    }
}

fn parse_real_item(item: &str) -> CardResult<f64> {
    decode_float(item)
        .map_err(Report::new)?
        .ok_or_else(|| Report::new(CardError::NumericFormat { text: item.to_owned(), reason: "empty value".to_owned() }))
}

fn parse_int_item(item: &str) -> CardResult<i64> {
    item.parse::<i64>()
        .map_err(|e| Report::new(CardError::NumericFormat { text: item.to_owned(), reason: e.to_string() }))
}

fn parse_flag_item(item: &str) -> CardResult<VaryFlag> {
    match item.to_ascii_uppercase().as_str() {
        "Y" | "YES" => Ok(VaryFlag::Yes),
        "N" | "NO" => Ok(VaryFlag::No),
        _ => decode_flag(item).map_err(Report::new),
    }
}

/// State while reading one radius block.
#[derive(Default)]
struct BlockReader {
    rec: RadiusRecord,
    has_radius: bool,
    global: bool,
    groups: Vec<GroupChannels>,
    /// Groups named by the latest `Group=`, which `Chan=` and bare lists extend
    current: Vec<i64>,
}

impl BlockReader {
    fn add_channels(&mut self, channels: &[i64], line: &str) -> CardResult<()> {
        if self.global {
            return Ok(())
        }
        if self.current.is_empty() {
            return Err(Report::new(CardError::unexpected(CardFamily::Radii.name(), line)))
                .attach_printable("channels given before any Group=");
        }
        for gc in self.groups.iter_mut().filter(|g| self.current.contains(&g.group)) {
            for &c in channels {
                if !gc.channels.contains(&c) {
                    gc.channels.push(c);
                }
            }
        }
        Ok(())
    }

    fn read_assignment(&mut self, a: &Assignment, line: &str) -> CardResult<()> {
        match a.normalized_key().as_str() {
            "RADII" | "RADIUS" => {
                let values: Vec<f64> = a.items().map(parse_real_item).collect::<CardResult<_>>()?;
                match values.as_slice() {
                    [eff] => self.rec.effective_radius = *eff,
                    [eff, tru] => {
                        self.rec.effective_radius = *eff;
                        self.rec.true_radius = Some(*tru);
                    },
                    _ => return Err(Report::new(CardError::Keyword { line: line.to_owned(), reason: "expected one or two radii".to_owned() })),
                }
                self.has_radius = true;
            },
            "FLAGS" => {
                let flags: Vec<VaryFlag> = a.items().map(parse_flag_item).collect::<CardResult<_>>()?;
                let (eff, tru) = match flags.as_slice() {
                    [] => (VaryFlag::No, VaryFlag::No),
                    [VaryFlag::UseFromParfile] => (VaryFlag::UseFromParfile, VaryFlag::UseFromParfile),
                    [f] => (*f, VaryFlag::No),
                    [f1, f2] => (*f1, *f2),
                    _ => return Err(Report::new(CardError::Keyword { line: line.to_owned(), reason: "expected at most two flags".to_owned() })),
                };
                self.rec.vary_effective = eff;
                self.rec.vary_true = tru;
            },
            "RELATIVE" => self.rec.relative_uncertainty = Some(parse_real_item(a.value)?),
            "ABSOLUTE" => self.rec.absolute_uncertainty = Some(parse_real_item(a.value)?),
            "PP" => self.rec.particle_pair = Some(a.value.to_owned()),
            "L" => self.rec.orbital_momentum = a.items().map(str::to_owned).collect(),
            "GROUP" | "GROUPS" => {
                if a.value.eq_ignore_ascii_case("all") {
                    self.global = true;
                    self.current.clear();
                    return Ok(())
                }
                self.current = a.items().map(parse_int_item).collect::<CardResult<_>>()?;
                for &g in &self.current {
                    if !self.groups.iter().any(|gc| gc.group == g) {
                        self.groups.push(GroupChannels { group: g, channels: vec![] });
                    }
                }
            },
            "CHAN" | "CHANNEL" | "CHANNELS" => {
                let channels: Vec<i64> = a.items().map(parse_int_item).collect::<CardResult<_>>()?;
                self.add_channels(&channels, line)?;
            },
            _ => {
                return Err(Report::new(CardError::Keyword { line: line.to_owned(), reason: format!("unknown key '{}'", a.key) }))
            }
        }
        Ok(())
    }

    fn read_line(&mut self, line: &str) -> CardResult<()> {
        if !line.contains('=') {
            let channels: Vec<i64> = line.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(parse_int_item)
                .collect::<CardResult<_>>()?;
            return self.add_channels(&channels, line)
        }

        let assignments = parse_assignments(line).map_err(Report::new)?;
        for a in &assignments {
            self.read_assignment(a, line)?;
        }
        Ok(())
    }

    fn finish(mut self) -> CardResult<RadiusRecord> {
        if !self.has_radius {
            return Err(Report::new(CardError::MissingField { field: "Radii" }));
        }
        self.rec.channels = if self.global || self.groups.is_empty() {
            ChannelAssignment::Global
        } else {
            ChannelAssignment::Groups(self.groups)
        };
        Ok(self.rec)
    }
}

fn decode_block(block: &ContinuationGroup) -> CardResult<RadiusRecord> {
    if !is_radius_line(block.head()) {
        return Err(Report::new(CardError::unexpected(CardFamily::Radii.name(), block.head())))
            .attach_printable("a radius entry must start with Radii=");
    }

    let mut reader = BlockReader::default();
    for line in block.lines() {
        reader.read_line(line)
            .attach_printable_lazy(|| format!("line '{}'", line.trim_end()))?;
    }
    reader.finish()
}

const FIRST_LINE_CHANNELS: usize = 12;
const CONTINUATION_CHANNELS: usize = 15;

fn encode_record(rec: &RadiusRecord) -> Vec<String> {
    let mut lines = vec![];
    let radii = match rec.true_radius {
        Some(tru) => format!("{}, {}", rec.effective_radius, tru),
        None => format!("{}", rec.effective_radius),
    };
    lines.push(format!("Radii= {radii}    Flags= {}, {}", rec.vary_effective, rec.vary_true));

    if let Some(rel) = rec.relative_uncertainty {
        lines.push(format!("    Relative= {rel}"));
    }
    if let Some(abs) = rec.absolute_uncertainty {
        lines.push(format!("    Absolute= {abs}"));
    }
    if let Some(pp) = &rec.particle_pair {
        lines.push(format!("    PP= {pp}"));
    }
    if !rec.orbital_momentum.is_empty() {
        lines.push(format!("    L= {}", rec.orbital_momentum.join(" ")));
    }

    if let ChannelAssignment::Groups(groups) = &rec.channels {
        for gc in groups {
            if gc.channels.is_empty() {
                lines.push(format!("    Group= {}", gc.group));
                continue;
            }
            let (first, rest) = gc.channels.split_at(gc.channels.len().min(FIRST_LINE_CHANNELS));
            lines.push(format!("    Group= {} Chan= {}", gc.group, first.iter().join(", ")));
            for chunk in &rest.iter().chunks(CONTINUATION_CHANNELS) {
                lines.push(format!("        {}", chunk.into_iter().join(", ")));
            }
        }
    }
    lines
}

pub struct RadiiCodec;

impl RecordCodec for RadiiCodec {
    type Record = RadiusRecord;

    const FAMILY: CardFamily = CardFamily::Radii;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let blocks = ContinuationAssembler::new(Self::FAMILY.name(), RadiusBlocks).assemble_all(body)?;
        let records: Vec<RadiusRecord> = blocks.iter().map(decode_block).collect::<CardResult<_>>()?;
        tracing::trace!(entries = records.len(), "read radius entries");
        Ok(records)
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        Ok(records.iter().flat_map(encode_record).collect())
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::Radii(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "RADII are in KEY-WORD format";

    #[test]
    fn test_group_lines() -> CardResult<()> {
        let lines = [
            HEADER,
            "Radii=4.13642,4.13642 Flags=0,0",
            "    Group= 1 Chan= 1, 2,",
            "    Group= 2 Chan= 1, 2, 3,",
            "    Group= 3 Chan= 1,",
            "Radii= 4.94, 4.94    Flags= 1, 1",
            "    Group= 4 Chan= 1",
            "",
        ];
        let records = RadiiCodec::decode(&lines)?;
        assert_eq!(records.len(), 2, "Expected two radius entries");

        let r = &records[0];
        assert_eq!(r.effective_radius, 4.13642);
        assert_eq!(r.true_radius, Some(4.13642));
        assert_eq!(r.vary_effective, VaryFlag::No);
        let ChannelAssignment::Groups(groups) = &r.channels else {
            panic!("First entry should have explicit groups");
        };
        assert_eq!(groups.len(), 3, "Expected three channel groups");
        assert_eq!(groups[1], GroupChannels { group: 2, channels: vec![1, 2, 3] });

        assert_eq!(records[1].vary_true, VaryFlag::Yes);
        assert_eq!(records[1].channels.group_numbers(), Some(vec![4]));
        Ok(())
    }

    #[test]
    fn test_continued_and_merged_channels() -> CardResult<()> {
        let lines = [
            HEADER,
            "Radius= 3.2",
            "Flags= Y",
            "    Group= 1 Chan= 1, 2,",
            "       3, 4",
            "    Group= 1 Chan= 5",
        ];
        let records = RadiiCodec::decode(&lines)?;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.true_radius, None);
        assert_eq!(r.vary_effective, VaryFlag::Yes, "Flags may be given on the next line");
        assert_eq!(r.vary_true, VaryFlag::No);
        assert_eq!(r.channels, ChannelAssignment::Groups(vec![GroupChannels { group: 1, channels: vec![1, 2, 3, 4, 5] }]));
        Ok(())
    }

    #[test]
    fn test_group_all() -> CardResult<()> {
        let lines = [HEADER, "Radii= 4.1, 4.1 Flags= -1", "    Group= all Chan= 1, 2"];
        let records = RadiiCodec::decode(&lines)?;
        assert_eq!(records[0].channels, ChannelAssignment::Global);
        assert_eq!(records[0].channels.group_numbers(), None);
        assert_eq!(records[0].vary_true, VaryFlag::UseFromParfile, "A lone -1 flag applies to both radii");
        Ok(())
    }

    #[test]
    fn test_extra_keys_round_trip() -> CardResult<()> {
        let lines = [
            HEADER,
            "Radius= 5.0 5.5",
            "Flags= 1 3",
            "Relative= 0.05",
            "Absolute= 0.1",
            "PP= n+Fe56",
            "L= 0 1",
            "Group= 7 Channels= 1",
        ];
        let records = RadiiCodec::decode(&lines)?;
        let r = &records[0];
        assert_eq!(r.vary_true, VaryFlag::Pup);
        assert_eq!(r.relative_uncertainty, Some(0.05));
        assert_eq!(r.particle_pair.as_deref(), Some("n+Fe56"));
        assert_eq!(r.orbital_momentum, vec!["0", "1"]);

        let out = RadiiCodec::encode(&records)?;
        assert_eq!(RadiiCodec::decode(&out)?, records);
        Ok(())
    }

    #[test]
    fn test_long_channel_lists() -> CardResult<()> {
        let rec = RadiusRecord {
            effective_radius: 6.1,
            true_radius: Some(6.2),
            channels: ChannelAssignment::Groups(vec![
                GroupChannels { group: 12, channels: (1..=40).collect() },
                GroupChannels { group: 13, channels: vec![] },
            ]),
            ..Default::default()
        };
        let out = RadiiCodec::encode(&[rec.clone()])?;
        assert!(out.iter().all(|l| l.len() <= 80), "Lines must fit in 80 columns");
        assert!(out.len() > 5, "40 channels should need continuation lines");
        assert_eq!(RadiiCodec::decode(&out)?, vec![rec]);
        Ok(())
    }

    #[test]
    fn test_bad_blocks() {
        let e = RadiiCodec::decode(&[HEADER, "    Group= 1 Chan= 1"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::UnexpectedLine { .. }));

        let e = RadiiCodec::decode(&[HEADER, "Radii= 4.1", "    Grope= 1"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::Keyword { .. }));

        let e = RadiiCodec::decode(&[HEADER, "Radii= 4.1 Flags= 7"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::InvalidFlag { .. }));
    }
}
