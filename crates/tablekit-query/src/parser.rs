use pest::Parser;
use pest_derive::Parser;

use crate::error::GrammarMiss;

// ── Pest parser derive ─────────────────────────────────────

#[derive(Parser)]
#[grammar = "src/keys.pest"]
struct KeyParser;

/// Split a filter key into its field and normalized operator token
/// (whitespace collapsed, upper-cased), e.g. `"x not  in"` → `("x", "NOT IN")`.
pub(crate) fn parse_filter_key(key: &str) -> Result<(&str, Option<String>), GrammarMiss> {
    let pair = KeyParser::parse(Rule::filter_key, key)
        .map_err(|_| GrammarMiss::MalformedKey(key.to_string()))?
        .next()
        .ok_or_else(|| GrammarMiss::MalformedKey(key.to_string()))?;

    let mut field = None;
    let mut op = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::filter_field => field = Some(inner.as_str()),
            Rule::sym_op | Rule::word_op => op = Some(normalize_token(inner.as_str())),
            _ => {}
        }
    }

    let field = field.ok_or_else(|| GrammarMiss::MalformedKey(key.to_string()))?;
    Ok((field, op))
}

/// Split a delta key into its field and optional arithmetic token (`"+="` …).
pub(crate) fn parse_delta_key(key: &str) -> Result<(&str, Option<&str>), GrammarMiss> {
    let pair = KeyParser::parse(Rule::delta_key, key)
        .map_err(|_| GrammarMiss::MalformedKey(key.to_string()))?
        .next()
        .ok_or_else(|| GrammarMiss::MalformedKey(key.to_string()))?;

    let mut field = None;
    let mut op = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::delta_field => field = Some(inner.as_str()),
            Rule::arith_op => op = Some(inner.as_str()),
            _ => {}
        }
    }

    let field = field.ok_or_else(|| GrammarMiss::MalformedKey(key.to_string()))?;
    Ok((field, op))
}

fn normalize_token(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_key_without_operator() {
        assert_eq!(parse_filter_key("name").unwrap(), ("name", None));
        assert_eq!(parse_filter_key("  name  ").unwrap(), ("name", None));
    }

    #[test]
    fn filter_key_symbolic_operators() {
        assert_eq!(parse_filter_key("age >").unwrap(), ("age", Some(">".into())));
        assert_eq!(parse_filter_key("age>=").unwrap(), ("age", Some(">=".into())));
        assert_eq!(parse_filter_key("age <>").unwrap(), ("age", Some("<>".into())));
        assert_eq!(parse_filter_key("age != ").unwrap(), ("age", Some("!=".into())));
    }

    #[test]
    fn filter_key_word_operators_are_case_insensitive() {
        assert_eq!(
            parse_filter_key("name not   like").unwrap(),
            ("name", Some("NOT LIKE".into()))
        );
        assert_eq!(parse_filter_key("id In").unwrap(), ("id", Some("IN".into())));
        assert_eq!(
            parse_filter_key("bio RLIKE").unwrap(),
            ("bio", Some("RLIKE".into()))
        );
    }

    #[test]
    fn word_operator_needs_whitespace() {
        // "domain" ends in "in" but is a plain field.
        assert_eq!(parse_filter_key("domain").unwrap(), ("domain", None));
        assert_eq!(parse_filter_key("xNOT IN").unwrap(), ("xNOT", Some("IN".into())));
    }

    #[test]
    fn key_without_field_is_malformed() {
        assert!(parse_filter_key("").is_err());
        assert!(parse_filter_key("   ").is_err());
        assert!(parse_filter_key(">=").is_err());
    }

    #[test]
    fn delta_keys() {
        assert_eq!(parse_delta_key("score").unwrap(), ("score", None));
        assert_eq!(parse_delta_key(" score += ").unwrap(), ("score", Some("+=")));
        assert_eq!(parse_delta_key("price*=").unwrap(), ("price", Some("*=")));
        assert!(parse_delta_key("").is_err());
        assert!(parse_delta_key("-=").is_err());
    }
}
