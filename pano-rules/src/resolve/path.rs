use crate::catalog::{Catalog, SHARED};

/// Ordered list of scopes consulted when resolving a name.
///
/// Invariant (closest scope wins): scopes are ordered innermost first. The
/// catalog stores device-group paths outermost → innermost, so the stored
/// path is reversed and `Shared` appended. Taking the first hit here is the
/// same as taking the last hit in a forward scan of the stored path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPath<'a> {
    scopes: Vec<&'a str>,
}

impl<'a> LookupPath<'a> {
    /// Lookup path for `scope`. Scopes missing from the hierarchy resolve as
    /// `[scope, Shared]`.
    pub fn for_scope(catalog: &'a Catalog, scope: &'a str) -> Self {
        let mut scopes: Vec<&'a str> = match catalog.device_group(scope) {
            Some(group) => group.path.iter().rev().map(String::as_str).collect(),
            None => vec![scope],
        };
        if scopes.last() != Some(&SHARED) {
            scopes.push(SHARED);
        }
        Self { scopes }
    }

    pub fn scopes(&self) -> &[&'a str] {
        &self.scopes
    }
}
