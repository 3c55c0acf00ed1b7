use pest::Parser;

use crate::card_error::{CardError, CResult};

#[derive(Parser)]
#[grammar = "cards.pest"]
pub(crate) struct CardParser;

/// Parse a (trimmed, non-empty) numeric field, repairing exponents written without their marker letter.
pub(crate) fn parse_real(s: &str) -> CResult<f64> {
    let mut pairs = CardParser::parse(Rule::real, s)
        .map_err(|e| CardError::from_pest(e, s))?;

    let tree = pairs.next()
        .ok_or_else(|| CardError::NumericFormat { text: s.to_owned(), reason: "no number found".to_owned() })?;

    let mut mantissa = "";
    let mut exponent = None;
    for pair in tree.into_inner() {
        match pair.as_rule() {
            Rule::mantissa => mantissa = pair.as_str(),
            Rule::exp_marked | Rule::exp_bare => exponent = Some(pair.as_str()),
            _ => continue,
        }
    }

    let repaired = if let Some(exp) = exponent {
        format!("{mantissa}e{exp}")
    } else {
        mantissa.to_owned()
    };

    let v: f64 = repaired.parse()
        .map_err(|e: std::num::ParseFloatError| CardError::NumericFormat { text: s.to_owned(), reason: e.to_string() })?;

    if v.is_finite() {
        Ok(v)
    } else {
        Err(CardError::NumericFormat { text: s.to_owned(), reason: "value is out of range for a 64-bit float".to_owned() })
    }
}

/// One `KEY=value` piece of a keyword line, both sides trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Assignment<'l> {
    pub(crate) key: &'l str,
    pub(crate) value: &'l str,
}

impl<'l> Assignment<'l> {
    /// The key upper-cased with spaces, underscores, and dashes removed, so that
    /// "Particle a", "PARTICLE_A" and "particlea" all compare equal.
    pub(crate) fn normalized_key(&self) -> String {
        self.key.chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-' | '\t'))
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Split a list value like "4.136420, 4.136420" or "1, 2, 3," into its items.
    pub(crate) fn items(&self) -> impl Iterator<Item = &'l str> {
        self.value.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
    }
}

/// Split a line such as "Group= 1 Chan= 1, 2," into its assignments.
pub(crate) fn parse_assignments(line: &str) -> CResult<Vec<Assignment<'_>>> {
    let mut pairs = CardParser::parse(Rule::keyword_line, line)
        .map_err(|e| CardError::keyword_from_pest(e, line))?;

    let tree = pairs.next()
        .ok_or_else(|| CardError::Keyword { line: line.to_owned(), reason: "no assignments found".to_owned() })?;

    let mut assignments = vec![];
    for pair in tree.into_inner() {
        if pair.as_rule() != Rule::assignment {
            continue;
        }

        let mut inner = pair.into_inner();
        let key = inner.next().map(|p| p.as_str().trim()).unwrap_or_default();
        let value = inner.next().map(|p| p.as_str().trim()).unwrap_or_default();
        assignments.push(Assignment { key, value });
    }

    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_reals() -> CResult<()> {
        assert_eq!(parse_real("1.234E+00")?, 1.234);
        assert_eq!(parse_real("-46.894")?, -46.894);
        assert_eq!(parse_real("12")?, 12.0);
        assert_eq!(parse_real(".5")?, 0.5);
        assert_eq!(parse_real("5.")?, 5.0);
        assert_eq!(parse_real("2.5d3")?, 2500.0, "D exponents should be accepted");
        Ok(())
    }

    #[test]
    fn test_repaired_reals() -> CResult<()> {
        assert_eq!(parse_real("5.00000-5")?, 5.00000e-5);
        assert_eq!(parse_real("5.00000.-5")?, 5.00000e-5);
        assert_eq!(parse_real("1.5+3")?, 1.5e3);
        assert_eq!(parse_real("-2.0-2")?, -2.0e-2);
        Ok(())
    }

    #[test]
    fn test_bad_reals() {
        for s in ["abc", "1.2.3", "1-", "-", "1e", "nan", "inf", "1e999", "1 2"] {
            let e = parse_real(s);
            assert!(matches!(e, Err(CardError::NumericFormat { .. })), "Parsing '{s}' did not return a numeric format error");
        }
    }

    #[test]
    fn test_assignments() -> CResult<()> {
        let a = parse_assignments("Radii= 4.136420, 4.136420    Flags=0, 0")?;
        assert_eq!(a.len(), 2, "Expected two assignments");
        assert_eq!(a[0].key, "Radii");
        assert_eq!(a[0].items().collect::<Vec<_>>(), vec!["4.136420", "4.136420"]);
        assert_eq!(a[1].key, "Flags");
        assert_eq!(a[1].items().collect::<Vec<_>>(), vec!["0", "0"]);

        let a = parse_assignments("    Group= 1 Chan= 1, 2, 3,")?;
        assert_eq!(a[0].value, "1");
        assert_eq!(a[1].items().collect::<Vec<_>>(), vec!["1", "2", "3"]);

        let a = parse_assignments("Name=Inc Ch#1   Particle a=neutron   Particle b=Other")?;
        assert_eq!(a.len(), 3);
        assert_eq!(a[0].value, "Inc Ch#1", "Values may contain spaces");
        assert_eq!(a[1].normalized_key(), "PARTICLEA");
        assert_eq!(a[2].value, "Other");

        let a = parse_assignments("Charge_A= 0  Spin b = 0.5")?;
        assert_eq!(a[0].normalized_key(), "CHARGEA");
        assert_eq!(a[1].normalized_key(), "SPINB");
        assert_eq!(a[1].value, "0.5");
        Ok(())
    }

    #[test]
    fn test_not_keyword() {
        let e = parse_assignments("  1, 2, 3");
        assert!(matches!(e, Err(CardError::Keyword { .. })), "A bare list is not a keyword line");
    }
}
