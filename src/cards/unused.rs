//! Unused but correlated variables: a line of up to eight names followed by a
//! line with their values.
use error_stack::{Report, ResultExt};
use itertools::Itertools;

use crate::card_error::{CardError, CardResult};
use crate::card_set::{CardFamily, CardSet};
use crate::codec::{CodecSettings, RecordCodec};
use crate::continuation::{ContinuationAssembler, ContinuationGroup, ContinuationRule};
use crate::layout::{FieldSlice, LineReader, LineWriter, LINE_WIDTH};

const VARIABLES_PER_LINE: usize = 8;

fn name_slot(i: usize) -> FieldSlice {
    FieldSlice::text("name", 10 * i + 1, 10 * i + 5)
}

fn value_slot(i: usize) -> FieldSlice {
    FieldSlice::real("value", 10 * i + 1, 10 * i + 10, 4)
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnusedVariable {
    /// Up to five characters
    pub name: String,
    pub value: f64,
}

struct LinePairs;

impl ContinuationRule for LinePairs {
    fn continues(&self, group: &[&str], _line: &str) -> bool {
        group.len() < 2
    }

    fn demands_next(&self, group: &[&str]) -> bool {
        group.len() < 2
    }
}

fn decode_pair(pair: &ContinuationGroup, variables: &mut Vec<UnusedVariable>) -> CardResult<()> {
    let names = LineReader::new(pair.head(), LINE_WIDTH);
    let values = LineReader::new(pair.continuations()[0], LINE_WIDTH);

    for i in 0..VARIABLES_PER_LINE {
        let name = names.text(&name_slot(i));
        if name.is_empty() {
            continue;
        }
        let value = values.required_real(&value_slot(i))
            .attach_printable_lazy(|| format!("value of variable '{name}'"))?;
        variables.push(UnusedVariable { name: name.to_owned(), value });
    }
    Ok(())
}

pub struct UnusedCorrelatedCodec;

impl RecordCodec for UnusedCorrelatedCodec {
    type Record = UnusedVariable;

    const FAMILY: CardFamily = CardFamily::UnusedCorrelated;

    fn decode_body(body: &[&str], _settings: &CodecSettings) -> CardResult<Vec<Self::Record>> {
        let pairs = ContinuationAssembler::new(Self::FAMILY.name(), LinePairs).assemble_all(body)?;
        let mut variables = vec![];
        for pair in &pairs {
            decode_pair(pair, &mut variables)?;
        }
        Ok(variables)
    }

    fn encode_body(records: &[Self::Record], _settings: &CodecSettings) -> CardResult<Vec<String>> {
        let mut lines = vec![];
        for chunk in &records.iter().chunks(VARIABLES_PER_LINE) {
            let mut names = LineWriter::new(LINE_WIDTH);
            let mut values = LineWriter::new(LINE_WIDTH);
            for (i, var) in chunk.enumerate() {
                if var.name.trim().is_empty() {
                    return Err(Report::new(CardError::MissingField { field: "name" }));
                }
                names.text(&name_slot(i), &var.name)?;
                values.real(&value_slot(i), Some(var.value))?;
            }
            lines.push(names.finish());
            lines.push(values.finish());
        }
        Ok(lines)
    }

    fn into_card_set(records: Vec<Self::Record>) -> CardSet {
        CardSet::UnusedCorrelated(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "UNUSEd but correlated variables come next";

    #[test]
    fn test_decode() -> CardResult<()> {
        let lines = [
            HEADER,
            "NVAR1     NVAR2     NVAR3",
            "1.2304E+002.9800E+021.5000E-01",
            "NVAR4     NVAR5",
            "4.0000E+00-5.000E-01",
            "",
        ];
        let vars = UnusedCorrelatedCodec::decode(&lines)?;
        assert_eq!(vars.len(), 5);
        assert_eq!(vars[0], UnusedVariable { name: "NVAR1".to_owned(), value: 1.2304 });
        assert_eq!(vars[1].value, 298.0);
        assert_eq!(vars[4], UnusedVariable { name: "NVAR5".to_owned(), value: -0.5 });
        Ok(())
    }

    #[test]
    fn test_encode_wraps_at_eight() -> CardResult<()> {
        let vars: Vec<UnusedVariable> = (1..=10)
            .map(|i| UnusedVariable { name: format!("V{i}"), value: i as f64 * 1.5 })
            .collect();
        let out = UnusedCorrelatedCodec::encode(&vars)?;
        assert_eq!(out.len(), 6, "Expected header, two line pairs, and the terminator");
        assert!(out[1].starts_with("V1        V2"));
        assert_eq!(UnusedCorrelatedCodec::decode(&out)?, vars);
        Ok(())
    }

    #[test]
    fn test_names_like_headers() -> CardResult<()> {
        let vars = vec![
            UnusedVariable { name: "PARAM".to_owned(), value: 1.5 },
            UnusedVariable { name: "BROAD".to_owned(), value: 2.0 },
        ];
        let out = UnusedCorrelatedCodec::encode(&vars)?;
        assert_eq!(UnusedCorrelatedCodec::decode(&out)?, vars);
        Ok(())
    }

    #[test]
    fn test_bad_pairs() {
        let e = UnusedCorrelatedCodec::decode(&[HEADER, "NVAR1     NVAR2"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MalformedContinuation { .. }));

        let e = UnusedCorrelatedCodec::decode(&[HEADER, "NVAR1     NVAR2", "1.0"]).unwrap_err();
        assert!(matches!(e.current_context(), CardError::MissingField { field: "value" }));
    }
}
