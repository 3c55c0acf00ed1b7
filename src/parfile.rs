//! Whole parameter files.
//!
//! A parameter file is a sequence of blocks separated by blank lines. The first
//! block may be the header-less resonance card; a block holding a single number
//! is the fudge factor; every other block is a card set introduced by its header.
use std::io::{BufRead, Write};

use error_stack::{Report, ResultExt};

use crate::card_error::{CardError, CardResult};
use crate::card_set::{is_any_header, CardFamily, CardSet};
use crate::codec::CodecSettings;
use crate::numeric::{decode_float, encode_float};

const FUDGE_WIDTH: usize = 10;

/// A parsed parameter file.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterFile {
    /// Initial step size factor for the fit, if the file gives one
    pub fudge: Option<f64>,
    pub cards: Vec<CardSet>,
}

/// Lines of one block and the 1-based line number of its first line.
struct Block<'l> {
    first_line: usize,
    lines: Vec<&'l str>,
}

/// Split on blank lines, and before any header line so that a card missing its
/// terminator does not swallow the next one.
fn split_blocks<'l>(lines: &[&'l str]) -> Vec<Block<'l>> {
    let mut blocks: Vec<Block<'l>> = vec![];
    let mut current: Option<Block<'l>> = None;

    for (i, &line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            blocks.extend(current.take());
            continue;
        }
        // A missing terminator before the next header only shows up in cards
        // whose lines cannot start with a name
        let open_family = current.as_ref().and_then(|b| CardFamily::from_header(b.lines[0]));
        if is_any_header(line) && !open_family.map(|f| f.has_named_lines()).unwrap_or(false) {
            blocks.extend(current.take());
        }
        current.get_or_insert_with(|| Block { first_line: i + 1, lines: vec![] })
            .lines
            .push(line);
    }
    blocks.extend(current);
    blocks
}

/// A block that is nothing but one number.
fn as_fudge(block: &Block) -> Option<f64> {
    match block.lines.as_slice() {
        [line] => decode_float(line).ok().flatten(),
        _ => None,
    }
}

/// The fudge factor line: four fixed decimals when that keeps the value,
/// otherwise the lossless field encoding.
fn fudge_line(fudge: f64) -> CardResult<String> {
    let fixed = format!("{fudge:10.4}");
    if fixed.len() == FUDGE_WIDTH && decode_float(&fixed).ok().flatten() == Some(fudge) {
        return Ok(fixed);
    }
    encode_float(fudge, FUDGE_WIDTH, 4)
        .map_err(Report::new)
        .attach_printable("fudge factor")
}

fn canonical_rank(family: CardFamily) -> usize {
    CardFamily::ALL.iter().position(|&f| f == family).unwrap_or(CardFamily::ALL.len())
}

impl ParameterFile {
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> CardResult<Self> {
        Self::from_lines_custom(lines, &CodecSettings::default())
    }

    pub fn from_lines_custom<S: AsRef<str>>(lines: &[S], settings: &CodecSettings) -> CardResult<Self> {
        let lines: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
        let mut file = Self::default();

        for (i, block) in split_blocks(&lines).iter().enumerate() {
            let head = block.lines[0];

            if let Some(fudge) = as_fudge(block) {
                if file.fudge.is_some() {
                    return Err(Report::new(CardError::Validation("more than one fudge factor".to_owned())))
                        .attach_printable_lazy(|| format!("line {}", block.first_line));
                }
                tracing::debug!(fudge, line = block.first_line, "read fudge factor");
                file.fudge = Some(fudge);
                continue;
            }

            let card = if i == 0 && !is_any_header(head) {
                CardSet::from_lines_as_custom(CardFamily::Resonance, &block.lines, settings)
            } else {
                CardSet::from_lines_custom(&block.lines, settings)
            };
            let card = card.attach_printable_lazy(|| format!("card starting at line {}", block.first_line))?;
            file.cards.push(card);
        }

        tracing::debug!(cards = file.cards.len(), fudge = file.fudge.is_some(), "read parameter file");
        Ok(file)
    }

    pub fn read_from<R: BufRead>(reader: R) -> CardResult<Self> {
        Self::read_from_custom(reader, &CodecSettings::default())
    }

    pub fn read_from_custom<R: BufRead>(reader: R, settings: &CodecSettings) -> CardResult<Self> {
        let mut lines = vec![];
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Report::new(CardError::io(e)))
                .attach_printable_lazy(|| format!("reading line {}", line_num + 1))?;
            lines.push(line);
        }
        Self::from_lines_custom(&lines, settings)
    }

    /// The first card of a family, if the file has one.
    pub fn card(&self, family: CardFamily) -> Option<&CardSet> {
        self.cards.iter().find(|c| c.family() == family)
    }

    /// Encode the file with the cards in their canonical order: resonances, the
    /// fudge factor, then the other cards.
    pub fn to_lines(&self) -> CardResult<Vec<String>> {
        self.to_lines_custom(&CodecSettings::default())
    }

    pub fn to_lines_custom(&self, settings: &CodecSettings) -> CardResult<Vec<String>> {
        let mut cards: Vec<&CardSet> = self.cards.iter().collect();
        cards.sort_by_key(|c| canonical_rank(c.family()));

        let (resonances, others): (Vec<&CardSet>, Vec<&CardSet>) = cards.into_iter()
            .partition(|c| c.family() == CardFamily::Resonance);

        let mut lines = vec![];
        for card in resonances {
            lines.extend(card.to_lines_custom(settings)?);
        }
        if let Some(fudge) = self.fudge {
            lines.push(fudge_line(fudge)?);
            lines.push(String::new());
        }
        for card in others {
            lines.extend(card.to_lines_custom(settings)?);
        }
        Ok(lines)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> CardResult<()> {
        self.write_to_custom(writer, &CodecSettings::default())
    }

    pub fn write_to_custom<W: Write>(&self, writer: &mut W, settings: &CodecSettings) -> CardResult<()> {
        for line in self.to_lines_custom(settings)? {
            writeln!(writer, "{line}").map_err(|e| Report::new(CardError::io(e)))?;
        }
        Ok(())
    }
}
