//! Pre-dispatch parameter validation.
//!
//! Role and option whitelists plus the line-number check. Invalid input is
//! rejected here, before anything is sent to the worker.

use serde_json::Value;

use crate::error::BridgeError;

/// Occurrence roles accepted by `get_occurrences`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reference,
    Definition,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Reference, Role::Definition];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Definition => "definition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reference" => Some(Self::Reference),
            "definition" => Some(Self::Definition),
            _ => None,
        }
    }

    /// Validate a raw role list, preserving order.
    pub fn parse_list(raw: &[String]) -> Result<Vec<Role>, BridgeError> {
        parse_whitelist(raw, Self::parse, "roles", &Self::ALL.map(|r| r.as_str()))
    }
}

/// Search options accepted by `search_pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOption {
    AnchorStart,
    AnchorEnd,
    Subsequence,
    IgnoreCase,
}

impl SearchOption {
    pub const ALL: [SearchOption; 4] = [
        SearchOption::AnchorStart,
        SearchOption::AnchorEnd,
        SearchOption::Subsequence,
        SearchOption::IgnoreCase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnchorStart => "anchorStart",
            Self::AnchorEnd => "anchorEnd",
            Self::Subsequence => "subsequence",
            Self::IgnoreCase => "ignoreCase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "anchorStart" => Some(Self::AnchorStart),
            "anchorEnd" => Some(Self::AnchorEnd),
            "subsequence" => Some(Self::Subsequence),
            "ignoreCase" => Some(Self::IgnoreCase),
            _ => None,
        }
    }

    /// Validate a raw option list, preserving order.
    pub fn parse_list(raw: &[String]) -> Result<Vec<SearchOption>, BridgeError> {
        parse_whitelist(raw, Self::parse, "options", &Self::ALL.map(|o| o.as_str()))
    }
}

fn parse_whitelist<T>(
    raw: &[String],
    parse: fn(&str) -> Option<T>,
    what: &str,
    allowed: &[&str],
) -> Result<Vec<T>, BridgeError> {
    let invalid: Vec<&str> = raw
        .iter()
        .map(String::as_str)
        .filter(|s| parse(s).is_none())
        .collect();
    if !invalid.is_empty() {
        return Err(BridgeError::input_validation(format!(
            "invalid {what} {invalid:?}, must be a subset of {allowed:?}"
        )));
    }
    Ok(raw.iter().filter_map(|s| parse(s)).collect())
}

/// Join validated items into the comma-separated wire form.
pub fn comma_join<T, F>(items: &[T], as_str: F) -> String
where
    F: Fn(&T) -> &'static str,
{
    items.iter().map(as_str).collect::<Vec<_>>().join(",")
}

/// Line numbers are 1-based; zero, negatives, and non-integer JSON values
/// are all rejected.
pub fn parse_line_number(value: &Value) -> Result<i64, BridgeError> {
    match value.as_i64() {
        Some(n) if n >= 1 => Ok(n),
        _ => Err(BridgeError::input_validation(
            "lineNumber must be a positive integer",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_roles_parse_in_order() {
        let roles = Role::parse_list(&strings(&["definition", "reference"])).unwrap();
        assert_eq!(roles, vec![Role::Definition, Role::Reference]);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = Role::parse_list(&strings(&["reference", "declaration"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(err.to_string().contains("declaration"), "{err}");
    }

    #[test]
    fn role_casing_is_exact() {
        let err = Role::parse_list(&strings(&["Reference"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidation);
    }

    #[test]
    fn empty_role_list_is_valid() {
        assert!(Role::parse_list(&[]).unwrap().is_empty());
    }

    #[test]
    fn valid_options_parse() {
        let options =
            SearchOption::parse_list(&strings(&["anchorStart", "ignoreCase"])).unwrap();
        assert_eq!(
            options,
            vec![SearchOption::AnchorStart, SearchOption::IgnoreCase]
        );
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = SearchOption::parse_list(&strings(&["ignoreCase", "fuzzy"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(err.to_string().contains("fuzzy"), "{err}");
    }

    #[test]
    fn comma_join_matches_wire_form() {
        let roles = vec![Role::Reference, Role::Definition];
        assert_eq!(comma_join(&roles, |r| r.as_str()), "reference,definition");

        let options = vec![SearchOption::IgnoreCase];
        assert_eq!(comma_join(&options, |o| o.as_str()), "ignoreCase");
    }

    #[test]
    fn positive_integers_pass() {
        assert_eq!(parse_line_number(&json!(1)).unwrap(), 1);
        assert_eq!(parse_line_number(&json!(4200)).unwrap(), 4200);
    }

    #[test]
    fn non_positive_line_numbers_are_rejected() {
        for value in [json!(0), json!(-1), json!(-4200)] {
            let err = parse_line_number(&value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InputValidation, "value: {value}");
        }
    }

    #[test]
    fn non_integer_line_numbers_are_rejected() {
        for value in [json!(1.5), json!("12"), json!(true), json!(null), json!([1])] {
            let err = parse_line_number(&value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InputValidation, "value: {value}");
        }
    }
}
