//! Permission string helpers.
//!
//! A permission is a dot-separated node such as `post.delete`. A leading `-`
//! negates it (explicit denial). A trailing `*` turns the node into a
//! wildcard: `post.*` covers `post` and every node below it, and a bare `*`
//! covers everything. Comparison is ASCII case-insensitive.

/// Prefix marking a negated (denied) permission.
pub const NEGATION_PREFIX: char = '-';

/// Returns true if the permission string is a denial.
pub fn is_negated(permission: &str) -> bool {
    permission.starts_with(NEGATION_PREFIX)
}

/// Strips the negation prefix, if any.
pub fn base_name(permission: &str) -> &str {
    permission
        .strip_prefix(NEGATION_PREFIX)
        .unwrap_or(permission)
}

/// Returns true if `pattern` (a granted or denied node, negation prefix
/// allowed) covers the queried `permission`.
pub fn matches(pattern: &str, permission: &str) -> bool {
    let pattern = base_name(pattern);
    if pattern == "*" {
        return true;
    }

    match pattern.strip_suffix('*') {
        Some(prefix) => {
            if starts_with_ignore_case(permission, prefix) {
                return true;
            }
            // `post.*` also covers `post` itself.
            prefix
                .strip_suffix('.')
                .is_some_and(|parent| parent.eq_ignore_ascii_case(permission))
        }
        None => pattern.eq_ignore_ascii_case(permission),
    }
}

/// Evaluates an ordered permission list: the first entry covering
/// `permission` decides, a negated entry denies. No match means no grant.
pub fn evaluate<'a, I>(permissions: I, permission: &str) -> Option<bool>
where
    I: IntoIterator<Item = &'a str>,
{
    permissions
        .into_iter()
        .find(|entry| matches(entry, permission))
        .map(|entry| !is_negated(entry))
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
}
