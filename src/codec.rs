//! The contract every card family implements, and the settings that tune it.
//!
//! Families only describe how their body lines map to records ([`RecordCodec::decode_body`]
//! and [`RecordCodec::encode_body`]); header checking, the blank terminator, and the
//! empty-card errors are shared by the provided methods. Our convention is that
//! functions that accept settings end in `_custom`, and the versions without the
//! suffix use [`CodecSettings::default()`].
use error_stack::Report;

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};

/// How particle pair definitions are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairEncoding {
    /// `Name=... Particle a=...` lines
    #[default]
    Keyword,
    /// One 80-column line per pair
    Fixed,
}

/// How wide the spin group columns of isotope abundance lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupWidth {
    /// Two-column groups unless some group of the isotope needs more
    #[default]
    Auto,
    /// Always two-column groups
    Standard,
    /// Always five-column groups
    Extended,
}

/// Settings for writing card sets.
///
/// Values are set with the builder pattern:
///
/// ```
/// # use sammy_cards::codec::{CodecSettings, PairEncoding};
///
/// let settings = CodecSettings::default().pair_encoding(PairEncoding::Fixed);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodecSettings {
    pair_encoding: PairEncoding,
    group_width: GroupWidth,
}

impl CodecSettings {
    /// Set the encoding used to write particle pairs.
    ///
    /// Default is [`PairEncoding::Keyword`], which can hold every field. Decoding
    /// always detects the encoding from the lines themselves.
    pub fn pair_encoding(mut self, encoding: PairEncoding) -> Self {
        self.pair_encoding = encoding;
        self
    }

    /// Set the spin group column width used to write isotope abundances.
    ///
    /// Default is [`GroupWidth::Auto`].
    pub fn group_width(mut self, width: GroupWidth) -> Self {
        self.group_width = width;
        self
    }

    pub fn get_pair_encoding(&self) -> PairEncoding {
        self.pair_encoding
    }

    pub fn get_group_width(&self) -> GroupWidth {
        self.group_width
    }
}

/// Decoding and encoding of one card family.
pub trait RecordCodec {
    type Record;

    const FAMILY: CardFamily;

    /// Decode the data lines of a card (header and terminator already removed).
    /// `body` is never empty and holds no blank lines.
    fn decode_body(body: &[&str], settings: &CodecSettings) -> CardResult<Vec<Self::Record>>;

    /// Encode records into data lines, without the header or terminator.
    fn encode_body(records: &[Self::Record], settings: &CodecSettings) -> CardResult<Vec<String>>;

    /// Wrap decoded records in the matching [`CardSet`] variant.
    fn into_card_set(records: Vec<Self::Record>) -> CardSet;

    fn is_header(line: &str) -> bool {
        Self::FAMILY.matches_header(line)
    }

    /// Decode a card: its header (if the family has one), then data lines up to
    /// the first blank line or the end of `lines`.
    fn decode<S: AsRef<str>>(lines: &[S]) -> CardResult<Vec<Self::Record>> {
        Self::decode_custom(lines, &CodecSettings::default())
    }

    fn decode_custom<S: AsRef<str>>(lines: &[S], settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let family = Self::FAMILY;
        let lines: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();

        let body_start = if family.has_header() {
            let first = lines.first().copied().unwrap_or_default();
            if !Self::is_header(first) {
                return Err(Report::new(CardError::MissingHeader { family: family.name(), line: first.to_owned() }));
            }
            1
        } else {
            0
        };

        let body: Vec<&str> = lines[body_start..].iter()
            .copied()
            .take_while(|l| !l.trim().is_empty())
            .collect();

        if body.is_empty() {
            return Err(Report::new(CardError::EmptyRecord { family: family.name() }));
        }

        let records = Self::decode_body(&body, settings)?;
        if records.is_empty() {
            return Err(Report::new(CardError::EmptyRecord { family: family.name() }));
        }

        tracing::debug!(family = family.name(), lines = body.len(), records = records.len(), "decoded card");
        Ok(records)
    }

    /// Encode records as a header (if the family has one), data lines, and one blank line.
    fn encode(records: &[Self::Record]) -> CardResult<Vec<String>> {
        Self::encode_custom(records, &CodecSettings::default())
    }

    fn encode_custom(records: &[Self::Record], settings: &CodecSettings) -> CardResult<Vec<String>> {
        let family = Self::FAMILY;
        if records.is_empty() {
            return Err(Report::new(CardError::EmptyCardSet { family: family.name() }));
        }

        let mut lines = vec![];
        if let Some(header) = family.canonical_header() {
            lines.push(header.to_owned());
        }
        lines.extend(Self::encode_body(records, settings)?);
        lines.push(String::new());
        Ok(lines)
    }
}
