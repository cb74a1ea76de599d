//! Role check between a verified caller and a route.
use std::collections::HashSet;

/// `true` iff the caller holds at least one role the route allows.
///
/// Order and duplicates do not matter. A route with no allowed roles admits
/// nobody.
pub fn authorize(caller_roles: &[String], allowed_roles: &HashSet<String>) -> bool {
    caller_roles.iter().any(|role| allowed_roles.contains(role))
}
