//! Mapping between filter expressions and the Google CEL subset used by IAM
//! conditions and Cedar clause bodies.
//!
//! Supported CEL: `&&`, `||`, `!`, `==`, `!=`, `<`, `<=`, `>`, `>=`, `in`,
//! `has(x)`, `x.startsWith(y)`, `x.endsWith(y)`, `x.contains(y)`.

mod export;
mod import;

use tracing::debug;

use crate::error::PolicyError;
use crate::filter::{self, Expression};
use crate::names::AttributeNameMapper;

/// Converts filters to CEL and back, translating attribute names on the way.
#[derive(Debug, Clone, Default)]
pub struct CelMapper {
    names: AttributeNameMapper,
}

impl CelMapper {
    pub fn new(names: AttributeNameMapper) -> Self {
        CelMapper { names }
    }

    pub fn names(&self) -> &AttributeNameMapper {
        &self.names
    }

    /// Render a filter AST as CEL. Attribute names go through `to_provider`.
    pub fn to_cel(&self, expr: &Expression) -> Result<String, PolicyError> {
        let cel = export::emit(expr, &self.names)?;
        debug!(event = "Cel", phase = "Export", filter = %expr, cel = cel.as_str());
        Ok(cel)
    }

    /// Parse CEL text into a filter AST. Attribute names go through `to_idql`.
    pub fn from_cel(&self, cel: &str) -> Result<Expression, PolicyError> {
        let expr = import::parse_cel(cel, &self.names)?;
        debug!(event = "Cel", phase = "Import", cel = cel, filter = %expr);
        Ok(expr)
    }

    /// SCIM filter text to CEL text.
    pub fn filter_to_cel(&self, filter: &str) -> Result<String, PolicyError> {
        self.to_cel(&filter::parse(filter)?)
    }

    /// CEL text to canonical SCIM filter text.
    pub fn cel_to_filter(&self, cel: &str) -> Result<String, PolicyError> {
        Ok(self.from_cel(cel)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use yare::parameterized;

    #[parameterized(
        present = { "title pr", "has(title)" },
        equals = { r#"userName eq "bjensen""#, r#"userName == "bjensen""# },
        not_equals = { "level ne 3", "level != 3" },
        greater = { "level gt 5", "level > 5" },
        greater_eq = { "level ge 5", "level >= 5" },
        less = { "level lt 5", "level < 5" },
        less_eq = { "level le 5.5", "level <= 5.5" },
        starts = { r#"resource.name sw "projects/p1/""#, r#"resource.name.startsWith("projects/p1/")"# },
        ends = { r#"emails ew "@example.com""#, r#"emails.endsWith("@example.com")"# },
        contains = { r#"emails co "example.com""#, r#"emails.contains("example.com")"# },
        membership = { r#"role in ["admin", "ops"]"#, r#"role in ["admin", "ops"]"# },
        boolean = { "active eq true", "active == true" },
        and_chain = { "a pr and b pr and c pr", "has(a) && has(b) && has(c)" },
        or_under_and = { r#"userType eq "Employee" and (emails co "example.com" or emails.value co "example.org")"#, r#"userType == "Employee" && (emails.contains("example.com") || emails.value.contains("example.org"))"# },
        and_under_or = { "a pr or b pr and c pr", "has(a) || has(b) && has(c)" },
        not_logical = { r#"not (emails co "example.com" or emails.value co "example.org")"#, r#"!(emails.contains("example.com") || emails.value.contains("example.org"))"# },
        not_function = { r#"not(emails co "x")"#, r#"!emails.contains("x")"# },
        not_comparison = { "not level gt 5", "!(level > 5)" },
    )]
    fn test_filter_to_cel(filter: &str, expected: &str) {
        let mapper = CelMapper::default();
        assert_eq!(mapper.filter_to_cel(filter).unwrap(), expected);
    }

    #[parameterized(
        equals = { r#"userName == "bjensen""#, r#"userName eq "bjensen""# },
        select = { "resource.size >= 10", "resource.size ge 10" },
        has_select = { "has(resource.labels)", "resource.labels pr" },
        starts = { r#"resource.name.startsWith("projects/p1/")"#, r#"resource.name sw "projects/p1/""# },
        authenticated = { "context.authenticated == true && level < 5", "context.authenticated eq true and level lt 5" },
        or_under_and = { r#"a == 1 && (b == 2 || c == 3)"#, "a eq 1 and (b eq 2 or c eq 3)" },
        or_chain = { "a == 1 || b == 2 || c == 3", "a eq 1 or b eq 2 or c eq 3" },
        not_or = { "!(a == 1 || b == 2)", "not (a eq 1 or b eq 2)" },
        not_attr = { "!(a == 1)", "not(a eq 1)" },
        negated_lhs = { "!active == true", "not(active eq true)" },
        list = { r#"role in ["admin", "ops"]"#, r#"role in ["admin", "ops"]"# },
        float = { "score > 2.5", "score gt 2.5" },
    )]
    fn test_cel_to_filter(cel: &str, expected: &str) {
        let mapper = CelMapper::default();
        assert_eq!(mapper.cel_to_filter(cel).unwrap(), expected);
    }

    #[test]
    fn test_names_are_mapped_both_ways() {
        let names = AttributeNameMapper::builder()
            .map("userName", "userid")
            .map("emails.type", "mail.type")
            .build()
            .unwrap();
        let mapper = CelMapper::new(names);

        let cel = mapper
            .filter_to_cel(r#"userName eq "a" and emails.type.value sw "w" and title pr"#)
            .unwrap();
        assert_snapshot!(cel, @r#"userid == "a" && mail.type.value.startsWith("w") && has(title)"#);

        let filter = mapper.cel_to_filter(&cel).unwrap();
        assert_eq!(
            filter,
            r#"userName eq "a" and emails.type.value sw "w" and title pr"#
        );
    }

    #[test]
    fn test_value_path_is_unsupported() {
        let err = CelMapper::default()
            .filter_to_cel(r#"emails[type eq "work"]"#)
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnsupportedShape(_)));
    }

    #[parameterized(
        unknown_function = { r#"a.matches("x.*")"# },
        size_call = { "size(a) > 2" },
    )]
    fn test_unsupported_cel(cel: &str) {
        assert!(CelMapper::default().from_cel(cel).is_err());
    }

    #[test]
    fn test_unknown_function_is_unsupported_operator() {
        let err = CelMapper::default().from_cel(r#"a.matches("x")"#).unwrap_err();
        assert_eq!(err, PolicyError::UnsupportedOperator("matches".to_string()));
    }

    #[test]
    fn test_arithmetic_is_unsupported_shape() {
        let err = CelMapper::default().from_cel("a + 1 == 2").unwrap_err();
        assert!(matches!(err, PolicyError::UnsupportedShape(_)), "{err:?}");
    }

    #[test]
    fn test_malformed_cel_is_parse_error() {
        let err = CelMapper::default().from_cel("a == ").unwrap_err();
        assert_eq!(err.position(), Some(0));
        match err {
            PolicyError::Parse { lexeme, message, .. } => {
                assert_eq!(lexeme, "a == ");
                assert!(message.starts_with("invalid CEL"), "{message}");
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[parameterized(
        newline = { "a eq \"x\\ny\"", "a == \"x\\ny\"" },
        tab = { "a eq \"x\\ty\"", "a == \"x\\ty\"" },
        quote = { "a eq \"x\\\"y\"", "a == \"x\\\"y\"" },
    )]
    fn test_control_characters_stay_escaped(filter: &str, cel: &str) {
        let mapper = CelMapper::default();
        assert_eq!(mapper.filter_to_cel(filter).unwrap(), cel);
        assert_eq!(mapper.cel_to_filter(cel).unwrap(), filter);
    }

    #[test]
    fn test_newline_in_cel_literal() {
        let mapper = CelMapper::default();
        let filter = mapper.cel_to_filter(r#"a == "x\ny""#).unwrap();
        assert_eq!(filter, r#"a eq "x\ny""#);
        assert!(!filter.contains('\n'));
        assert_eq!(mapper.filter_to_cel(&filter).unwrap(), r#"a == "x\ny""#);
    }

    fn and_chain(terms: usize) -> Expression {
        let mut expr = Expression::present("a");
        for _ in 1..terms {
            expr = Expression::and(expr, Expression::present("b"));
        }
        expr
    }

    #[test]
    fn test_export_depth_limit() {
        let mapper = CelMapper::default();
        assert!(mapper.to_cel(&and_chain(filter::MAX_DEPTH)).is_ok());
        let err = mapper.to_cel(&and_chain(filter::MAX_DEPTH + 1)).unwrap_err();
        assert!(matches!(err, PolicyError::UnsupportedShape(_)), "{err:?}");
    }

    #[parameterized(
        and_chain = { " && " },
        or_chain = { " || " },
    )]
    fn test_import_depth_limit(joiner: &str) {
        let mapper = CelMapper::default();
        let shallow = vec!["has(a)"; filter::MAX_DEPTH / 2].join(joiner);
        assert!(mapper.from_cel(&shallow).is_ok());
        let deep = vec!["has(a)"; filter::MAX_DEPTH * 2].join(joiner);
        let err = mapper.from_cel(&deep).unwrap_err();
        assert!(matches!(err, PolicyError::UnsupportedShape(_)), "{err:?}");
    }

    #[test]
    fn test_deeply_grouped_filter_survives() {
        let groups = 100;
        let input = format!("{}a pr{}", "(".repeat(groups), ")".repeat(groups));
        let mapper = CelMapper::default();
        let cel = mapper.filter_to_cel(&input).unwrap();
        assert_eq!(cel, format!("{}has(a){}", "(".repeat(groups), ")".repeat(groups)));
        assert_eq!(mapper.cel_to_filter(&cel).unwrap(), "a pr");
    }

    #[test]
    fn test_strict_names_fail_on_unknown_attribute() {
        let names = AttributeNameMapper::builder()
            .map("userName", "userid")
            .strict(true)
            .build()
            .unwrap();
        let err = CelMapper::new(names).filter_to_cel("title pr").unwrap_err();
        assert_eq!(err, PolicyError::NameMappingMissing("title".to_string()));
    }
}
