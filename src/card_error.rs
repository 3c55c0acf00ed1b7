//! Errors in card set lines or values
use std::fmt::Display;
use pest::RuleType;

/// Type alias for a `Result` with [`CardError`] as the error type.
///
/// Used by the single-field codecs in [`crate::numeric`], which know nothing
/// about the line they were cut from.
pub type CResult<T> = Result<T, CardError>;

/// Type alias for an [`error_stack`] result with [`CardError`] as the context.
///
/// Record, card and file level functions return this so that the offending
/// line, field name, and (at the file level) line number ride along with the error.
pub type CardResult<T> = error_stack::Result<T, CardError>;


/// An error related to decoding or encoding a card set
#[derive(Debug, Clone, PartialEq)]
pub enum CardError {
    /// The first line of a block is not a header of the family being decoded.
    MissingHeader { family: &'static str, line: String },

    /// The first line of a block is not the header of any known card family.
    InvalidHeader { line: String },

    /// A header was found but no data lines followed it.
    EmptyRecord { family: &'static str },

    /// A card set was asked to encode with no records.
    EmptyCardSet { family: &'static str },

    /// A field could not be parsed as a number.
    NumericFormat { text: String, reason: String },

    /// A flag column held something other than a known vary flag code.
    InvalidFlag { text: String },

    /// A value needs more columns than its field provides.
    FieldOverflow { value: String, width: usize },

    /// A recognized legacy variant this crate does not implement.
    UnsupportedFormat { reason: String },

    /// A continuation was signaled but the line that should continue the list is missing.
    MalformedContinuation { line: String },

    /// A required field was blank.
    MissingField { field: &'static str },

    /// A line whose shape does not belong to any record of the family.
    UnexpectedLine { family: &'static str, line: String },

    /// A keyword line could not be split into `KEY=value` assignments.
    Keyword { line: String, reason: String },

    /// Values that decode individually but violate a rule across fields.
    Validation(String),

    /// Reading or writing a parameter file failed.
    Io { reason: String },
}

impl Display for CardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardError::MissingHeader { family, line } => {
                write!(f, "Expected a {family} header, got '{line}'")
            },
            CardError::InvalidHeader { line } => {
                write!(f, "'{line}' is not the header of any known card")
            },
            CardError::EmptyRecord { family } => {
                write!(f, "The {family} card has a header but no data lines")
            },
            CardError::EmptyCardSet { family } => {
                write!(f, "Cannot write a {family} card with no records")
            },
            CardError::NumericFormat { text, reason } => {
                write!(f, "Could not parse '{text}' as a number: {reason}")
            },
            CardError::InvalidFlag { text } => {
                write!(f, "'{text}' is not a valid vary flag (expected -2, -1, 0, 1, or 3)")
            },
            CardError::FieldOverflow { value, width } => {
                write!(f, "Value {value} cannot be written in {width} columns without losing digits")
            },
            CardError::UnsupportedFormat { reason } => {
                write!(f, "Unsupported format: {reason}")
            },
            CardError::MalformedContinuation { line } => {
                write!(f, "Line '{line}' signals a continuation but no continuation line follows")
            },
            CardError::MissingField { field } => {
                write!(f, "Required field '{field}' is blank")
            },
            CardError::UnexpectedLine { family, line } => {
                write!(f, "Line '{line}' does not belong in a {family} card")
            },
            CardError::Keyword { line, reason } => {
                write!(f, "Could not parse keyword line '{line}': {reason}")
            },
            CardError::Validation(msg) => {
                write!(f, "Invalid values: {msg}")
            },
            CardError::Io { reason } => {
                write!(f, "I/O error: {reason}")
            },
        }
    }
}

impl std::error::Error for CardError {}

impl CardError {
    pub fn from_pest<R: RuleType>(e: pest::error::Error<R>, s: &str) -> Self {
        Self::NumericFormat { text: s.to_owned(), reason: e.to_string() }
    }

    pub fn keyword_from_pest<R: RuleType>(e: pest::error::Error<R>, line: &str) -> Self {
        Self::Keyword { line: line.to_owned(), reason: e.to_string() }
    }

    pub(crate) fn io(e: std::io::Error) -> Self {
        Self::Io { reason: e.to_string() }
    }

    pub(crate) fn unexpected(family: &'static str, line: &str) -> Self {
        Self::UnexpectedLine { family, line: line.to_owned() }
    }
}
