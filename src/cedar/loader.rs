use crate::error::PolicyError;
use cedar_policy::PolicySet;

/// Compile Cedar policy text with the reference Cedar parser.
///
/// Documents produced from IDQL keep entity text verbatim, so this only
/// succeeds when subjects, actions and objects were written as Cedar entity
/// literals and clause bodies stay inside the Cedar expression language.
///
/// Example:
/// ```rust
/// use policy_interchange::cedar::compile_policy;
/// let policy_text = r#"
///     permit (principal, action, resource);
///     forbid  (principal == User::"evil", action, resource);
/// "#;
/// let set = compile_policy(policy_text).unwrap();
/// assert_eq!(set.policies().count(), 2);
/// ```
pub fn compile_policy(text: &str) -> Result<PolicySet, PolicyError> {
    Ok(text.parse::<PolicySet>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_policy() {
        let policy_text = r#"
            permit (principal == User::"alice", action == Action::"read", resource == Document::"doc1");
            permit (principal == User::"bob", action == Action::"write", resource == Document::"doc2") when { context.authenticated == true };
        "#;
        let policy_set = compile_policy(policy_text).unwrap();
        assert_eq!(policy_set.policies().count(), 2);
    }

    #[test]
    fn test_compile_policy_rejects_garbage() {
        assert!(matches!(
            compile_policy("permit(principal == user:alice, action, resource);"),
            Err(PolicyError::CedarValidation(_))
        ));
    }
}
