use yare::parameterized;

use crate::cel::CelMapper;
use crate::filter;
use crate::names::AttributeNameMapper;

fn scim_names() -> AttributeNameMapper {
    AttributeNameMapper::builder()
        .map("userName", "userid")
        .map("emails.type", "mail.type")
        .build()
        .unwrap()
}

#[parameterized(
    quote_in_string = { r#"name.familyName co "O'Malley""#, r#"name.familyName co "O'Malley""# },
    operator_case = { r#"userName Eq "bjensen""#, r#"userName eq "bjensen""# },
    bare_word_quoted = { "title eq manager", r#"title eq "manager""# },
    literals_unquoted = { "active eq true and level ge 3", "active eq true and level ge 3" },
    logical_case = { "a pr OR b pr", "a pr or b pr" },
    grouping = { r#"userType eq "Employee" and (emails co "example.com" or emails.value co "example.org")"#, r#"userType eq "Employee" and (emails co "example.com" or emails.value co "example.org")"# },
    negated_group = { "not (a pr or b pr)", "not (a pr or b pr)" },
    value_path = { r#"emails[type eq "work" and value co "@example.com"]"#, r#"emails[type eq "work" and value co "@example.com"]"# },
)]
fn test_serialize_after_parse_is_normalized(input: &str, expected: &str) {
    let printed = filter::parse(input).unwrap().to_string();
    assert_eq!(printed, expected);
    assert_eq!(filter::parse(&printed).unwrap().to_string(), printed);
}

#[parameterized(
    precedence = { r#"userType eq "Employee" and (emails co "example.com" or emails.value co "example.org")"# },
    not_logical = { r#"not (emails co "example.com" or emails.value co "example.org")"# },
    not_function = { r#"not(emails sw "admin")"# },
    not_comparison = { "not(level gt 5)" },
    mixed = { "a pr or b pr and c eq 1" },
    membership = { r#"role in ["admin", "ops"] and score le 2.5"# },
    escapes = { r#"note eq "say \"hi\" \\ bye""# },
    control_escapes = { r#"note eq "line\none\ttab""# },
    mapped_names = { r#"userName eq "bjensen" and emails.type eq "work""# },
)]
fn test_cel_round_trip_is_stable(input: &str) {
    let mapper = CelMapper::new(scim_names());
    let cel = mapper.filter_to_cel(input).unwrap();
    let back = mapper.from_cel(&cel).unwrap();
    assert_eq!(mapper.to_cel(&back).unwrap(), cel);
    assert_eq!(back.to_string(), filter::parse(input).unwrap().to_string());
}

#[test]
fn test_precedence_survives_both_legs() {
    let mapper = CelMapper::default();
    let input = r#"userType eq "Employee" and (emails co "example.com" or emails.value co "example.org")"#;
    let cel = mapper.filter_to_cel(input).unwrap();
    assert_eq!(
        cel,
        r#"userType == "Employee" && (emails.contains("example.com") || emails.value.contains("example.org"))"#
    );
    assert_eq!(mapper.cel_to_filter(&cel).unwrap(), input);
}

#[parameterized(
    single = { "(a pr)", "(has(a))", "a pr", "has(a)" },
    nested_and = { "a pr and (b pr and c pr)", "has(a) && (has(b) && has(c))", "a pr and b pr and c pr", "has(a) && has(b) && has(c)" },
    negated = { "not ((a pr))", "!(has(a))", "not(a pr)", "!has(a)" },
)]
fn test_redundant_parens_settle_after_one_trip(
    input: &str,
    first_cel: &str,
    imported: &str,
    settled_cel: &str,
) {
    let mapper = CelMapper::default();
    let cel = mapper.filter_to_cel(input).unwrap();
    assert_eq!(cel, first_cel);
    let filter = mapper.cel_to_filter(&cel).unwrap();
    assert_eq!(filter, imported);
    let settled = mapper.filter_to_cel(&filter).unwrap();
    assert_eq!(settled, settled_cel);
    assert_eq!(mapper.cel_to_filter(&settled).unwrap(), imported);
}

#[test]
fn test_not_of_logical() {
    let mapper = CelMapper::default();
    let input = r#"not (emails co "example.com" or emails.value co "example.org")"#;
    let cel = mapper.filter_to_cel(input).unwrap();
    assert_eq!(
        cel,
        r#"!(emails.contains("example.com") || emails.value.contains("example.org"))"#
    );
    assert_eq!(mapper.cel_to_filter(&cel).unwrap(), input);
}

#[test]
fn test_name_mapping_through_cel() {
    let mapper = CelMapper::new(scim_names());
    let cel = mapper
        .filter_to_cel(r#"userName eq "bjensen" and emails.type eq "work" and title pr"#)
        .unwrap();
    assert_eq!(
        cel,
        r#"userid == "bjensen" && mail.type == "work" && has(title)"#
    );
    assert_eq!(
        mapper.cel_to_filter(&cel).unwrap(),
        r#"userName eq "bjensen" and emails.type eq "work" and title pr"#
    );
}

#[parameterized(
    user_name = { "userName" },
    email_type = { "emails.type" },
    nested = { "emails.type.primary" },
)]
fn test_name_mapper_is_idempotent(name: &str) {
    let names = scim_names();
    assert_eq!(names.to_idql(&names.to_provider(name)), name);
}
