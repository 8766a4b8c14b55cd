//! Reference resolution and group expansion.
//!
//! The [`Resolver`] turns names referenced by a rule into concrete values,
//! walking the device-group inheritance chain and flattening static groups.
//!
//! ## Outcomes
//!
//! Every non-empty input name yields exactly one kind of outcome:
//!
//! - the object's leaf value(s), possibly many for a group
//! - `UNKNOWN:<name>` when no scope on the lookup path defines the name
//! - `DAG:<name>` for a dynamic address group
//! - `CYCLE:<name>` when a group is reached again while it is being expanded
//!
//! `any` is reserved and always passes through unchanged.
//!
//! ## Lookup order
//!
//! See [`LookupPath`]: the closest scope defining a name wins. For the
//! expanding categories all scopes are searched for a leaf object before
//! any scope is searched for a group of that name. Group members are resolved
//! from the scope that defines the group.
//!
//! None of the public operations can fail; problems with individual records
//! are reported to the [`Observer`] and converted to markers or empty output.

mod expand;
pub mod outcome;
pub mod path;

pub use expand::Category;
pub use outcome::{Outcome, ANY, CYCLE_PREFIX, DYNAMIC_PREFIX, UNKNOWN_PREFIX};
pub use path::LookupPath;

use crate::catalog::Catalog;
use crate::observe::{Observer, ResolveEvent};

use expand::Expansion;
use outcome::render_unique;

/// Resolves references against one immutable [`Catalog`].
///
/// Holds no state between calls besides the catalog and observer, so a shared
/// reference can be used from several threads.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    observer: &'a dyn Observer,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, observer: &'a dyn Observer) -> Self {
        Self { catalog, observer }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn lookup_path<'s>(&'s self, scope: &'s str) -> LookupPath<'s> {
        LookupPath::for_scope(self.catalog, scope)
    }

    pub fn expand_addresses<S: AsRef<str>>(&self, scope: &str, names: &[S]) -> Vec<String> {
        self.expand(Category::Address, scope, names)
    }

    pub fn expand_services<S: AsRef<str>>(&self, scope: &str, names: &[S]) -> Vec<String> {
        self.expand(Category::Service, scope, names)
    }

    pub fn expand_applications<S: AsRef<str>>(&self, scope: &str, names: &[S]) -> Vec<String> {
        self.expand(Category::Application, scope, names)
    }

    /// Check zone names against the flat zone table. Zones are not scoped, so
    /// `scope` is only used for diagnostics.
    pub fn resolve_zones<S: AsRef<str>>(&self, scope: &str, names: &[S]) -> Vec<String> {
        let mut out = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                self.observer.observe(&ResolveEvent::EmptyReference {
                    scope,
                    category: "zone",
                });
                continue;
            }
            if name == ANY || self.catalog.has_zone(name) {
                out.push(Outcome::Value(name.to_string()));
            } else {
                let outcome = Outcome::Unknown(name.to_string());
                let marker = outcome.to_string();
                self.observer.observe(&ResolveEvent::Unresolved {
                    scope,
                    category: "zone",
                    marker: &marker,
                });
                out.push(outcome);
            }
        }
        render_unique(out)
    }

    /// Expand `names` for any category.
    pub fn expand<S: AsRef<str>>(&self, category: Category, scope: &str, names: &[S]) -> Vec<String> {
        let mut expansion = Expansion::new(self.catalog, self.observer, category);
        let mut out = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                self.observer.observe(&ResolveEvent::EmptyReference {
                    scope,
                    category: category.as_str(),
                });
                continue;
            }
            expansion.resolve(scope, name, &mut out);
        }
        render_unique(out)
    }
}
