//! Classification of IDQL subjects and objects for principal/resource slots.
//!
//! Accepted shapes:
//! - `any`, empty: no constraint
//! - `anyAuthenticated`, `jwt`, `saml`, `basic` (optionally `jwt:<issuer>` etc.):
//!   no constraint, but the caller must be authenticated
//! - `kind:id`, `Ns::Kind::"id"`, or a bare word: an entity whose kind is
//!   looked up in the container list to choose `==` or `in`

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]+").unwrap());

pub const ANY: &str = "any";
pub const ANY_AUTHENTICATED: &str = "anyAuthenticated";

const AUTHENTICATED_SCHEMES: [&str; 3] = ["jwt", "saml", "basic"];

/// How a subject constrains the principal slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject<'a> {
    Any,
    AnyAuthenticated,
    /// A single entity, matched with `==`.
    Single(&'a str),
    /// A multi-membered entity such as a group or domain, matched with `in`.
    Container(&'a str),
}

impl<'a> Subject<'a> {
    pub fn classify(subject: &'a str, container_types: &[String]) -> Self {
        let trimmed = subject.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ANY) {
            return Subject::Any;
        }
        if trimmed.eq_ignore_ascii_case(ANY_AUTHENTICATED) || is_authenticated_scheme(trimmed) {
            return Subject::AnyAuthenticated;
        }
        match EntityKind::of(trimmed, container_types) {
            EntityKind::Container => Subject::Container(trimmed),
            EntityKind::Single => Subject::Single(trimmed),
        }
    }
}

fn is_authenticated_scheme(subject: &str) -> bool {
    let scheme = subject.split(':').next().unwrap_or(subject);
    AUTHENTICATED_SCHEMES
        .iter()
        .any(|s| scheme.eq_ignore_ascii_case(s))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Single,
    Container,
}

impl EntityKind {
    /// Entities whose kind appears in `container_types` (case-insensitive) are
    /// containers; everything else, including `file`, `user` and `employee`,
    /// is a single entity.
    pub fn of(entity: &str, container_types: &[String]) -> Self {
        let kind = entity_type(entity);
        if container_types.iter().any(|c| c.eq_ignore_ascii_case(kind)) {
            EntityKind::Container
        } else {
            EntityKind::Single
        }
    }
}

/// The type portion of an entity reference: `Group` in `Ns::Group::"x"`,
/// `group` in `group:admins`, `doc` in `doc1`.
pub fn entity_type(entity: &str) -> &str {
    if let Some((head, _)) = entity
        .split_once("::\"")
        .or_else(|| entity.rsplit_once("::"))
    {
        return head.rsplit("::").next().unwrap_or(head);
    }
    if let Some((kind, _)) = entity.split_once(':') {
        return kind;
    }
    LEADING_WORD
        .find(entity)
        .map(|m| m.as_str())
        .unwrap_or(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn containers() -> Vec<String> {
        ["group", "domain"].iter().map(|s| s.to_string()).collect()
    }

    #[parameterized(
        any = { "any", Subject::Any },
        empty = { "", Subject::Any },
        authenticated = { "anyAuthenticated", Subject::AnyAuthenticated },
        jwt = { "jwt", Subject::AnyAuthenticated },
        jwt_issuer = { "jwt:https://issuer.example.com", Subject::AnyAuthenticated },
        saml = { "saml", Subject::AnyAuthenticated },
        basic = { "basic:realm", Subject::AnyAuthenticated },
        user = { "user:alice", Subject::Single("user:alice") },
        group = { "group:admins", Subject::Container("group:admins") },
        domain = { "domain:example.com", Subject::Container("domain:example.com") },
        cedar_group = { r#"Group::"admins""#, Subject::Container(r#"Group::"admins""#) },
        cedar_user = { r#"App::User::"alice""#, Subject::Single(r#"App::User::"alice""#) },
    )]
    fn test_classify(subject: &str, expected: Subject<'_>) {
        assert_eq!(Subject::classify(subject, &containers()), expected);
    }

    #[parameterized(
        namespaced = { r#"Ns::Group::"x""#, "Group" },
        colons_in_id = { r#"Group::"a::b""#, "Group" },
        unquoted = { "Action::view", "Action" },
        prefixed = { "group:admins", "group" },
        bare = { "doc1", "doc" },
        file = { "file:///tmp/a", "file" },
        symbols = { "/projects/p1", "/projects/p1" },
    )]
    fn test_entity_type(entity: &str, expected: &str) {
        assert_eq!(entity_type(entity), expected);
    }

    #[test]
    fn test_entity_kind() {
        assert_eq!(EntityKind::of("doc1", &containers()), EntityKind::Single);
        assert_eq!(EntityKind::of("file1", &containers()), EntityKind::Single);
        assert_eq!(EntityKind::of("Domain::\"x\"", &containers()), EntityKind::Container);
    }
}
