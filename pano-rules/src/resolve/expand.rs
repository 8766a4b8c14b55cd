//! Recursive group expansion with cycle detection.
//!
//! One [`Expansion`] is created per public resolver call and per category.
//! Groups currently being expanded sit on `stack`, keyed by the scope that
//! defines them and their name. A group is pushed before its members are
//! resolved and popped afterwards, so sibling branches never see each other's
//! entries while a chain that returns to one of its own ancestors does.
//!
//! Finished group expansions are cached per call under the same key, so a
//! group reached through several branches is expanded once. Results that
//! contain a `CYCLE:` marker depend on the stack they were produced under
//! and are never cached.

use std::collections::{HashMap, HashSet};

use crate::catalog::{Address, AddressGroup, Catalog, ScopeObjects, Service};
use crate::observe::{Observer, ResolveEvent};

use super::outcome::{Outcome, ANY};
use super::path::LookupPath;

/// Object category expanded through the inheritance walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Address,
    Service,
    Application,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Service => "service",
            Self::Application => "application",
        }
    }

    fn leaf<'c>(self, objects: &'c ScopeObjects, name: &str) -> Option<Leaf<'c>> {
        match self {
            Self::Address => objects.address.get(name).map(Leaf::Address),
            Self::Service => objects.service.get(name).map(Leaf::Service),
            Self::Application => objects
                .application
                .get_key_value(name)
                .map(|(key, _)| Leaf::Application(key.as_str())),
        }
    }

    fn group<'c>(self, objects: &'c ScopeObjects, name: &str) -> Option<Group<'c>> {
        match self {
            Self::Address => objects.address_group.get(name).map(|group| match group {
                AddressGroup::Static { members } => Group::Static(members),
                AddressGroup::Dynamic { .. } => Group::Dynamic,
            }),
            Self::Service => objects
                .service_group
                .get(name)
                .map(|group| Group::Static(&group.members)),
            Self::Application => objects
                .application_group
                .get(name)
                .map(|group| Group::Static(&group.members)),
        }
    }
}

enum Leaf<'c> {
    Address(&'c Address),
    Service(&'c Service),
    Application(&'c str),
}

impl Leaf<'_> {
    /// Concrete values of a leaf, or a description of why it has none.
    fn values(&self) -> Result<Vec<String>, &'static str> {
        match self {
            Leaf::Address(address) => {
                if address.value.is_empty() {
                    Err("address has no value")
                } else {
                    Ok(vec![address.value.clone()])
                }
            }
            Leaf::Service(service) => {
                let Some(proto) = &service.proto else {
                    return Err("service has no protocol");
                };
                if service.ports.is_empty() {
                    Ok(vec![proto.label().to_string()])
                } else {
                    Ok(service
                        .ports
                        .iter()
                        .map(|port| format!("{}/{}", proto.label(), port))
                        .collect())
                }
            }
            Leaf::Application(name) => Ok(vec![(*name).to_string()]),
        }
    }
}

enum Group<'c> {
    Static(&'c [String]),
    Dynamic,
}

pub(crate) struct Expansion<'r> {
    catalog: &'r Catalog,
    observer: &'r dyn Observer,
    category: Category,
    stack: Vec<(&'r str, &'r str)>,
    finished: HashMap<(&'r str, &'r str), Vec<Outcome>>,
}

impl<'r> Expansion<'r> {
    pub(crate) fn new(catalog: &'r Catalog, observer: &'r dyn Observer, category: Category) -> Self {
        Self {
            catalog,
            observer,
            category,
            stack: Vec::new(),
            finished: HashMap::new(),
        }
    }

    /// Resolve `name` as seen from `scope`, appending outcomes to `out`.
    pub(crate) fn resolve(&mut self, scope: &'r str, name: &'r str, out: &mut Vec<Outcome>) {
        if name == ANY {
            out.push(Outcome::Value(ANY.to_string()));
            return;
        }

        let path = LookupPath::for_scope(self.catalog, scope);

        for &candidate in path.scopes() {
            let Some(leaf) = self
                .catalog
                .scope(candidate)
                .and_then(|objects| self.category.leaf(objects, name))
            else {
                continue;
            };
            match leaf.values() {
                Ok(values) => out.extend(values.into_iter().map(Outcome::Value)),
                Err(detail) => self.observer.observe(&ResolveEvent::MalformedRecord {
                    scope: candidate,
                    category: self.category.as_str(),
                    name,
                    detail,
                }),
            }
            return;
        }

        for &candidate in path.scopes() {
            let Some(group) = self
                .catalog
                .scope(candidate)
                .and_then(|objects| self.category.group(objects, name))
            else {
                continue;
            };
            if self.stack.contains(&(candidate, name)) {
                self.mark(scope, Outcome::Cycle(name.to_string()), out);
                return;
            }
            match group {
                Group::Dynamic => self.mark(scope, Outcome::Dynamic(name.to_string()), out),
                Group::Static(members) => {
                    if let Some(cached) = self.finished.get(&(candidate, name)) {
                        out.extend(cached.iter().cloned());
                        return;
                    }
                    let start = out.len();
                    self.stack.push((candidate, name));
                    for member in members {
                        let member = member.trim();
                        if member.is_empty() {
                            self.observer.observe(&ResolveEvent::EmptyMember {
                                scope: candidate,
                                category: self.category.as_str(),
                                group: name,
                            });
                            continue;
                        }
                        self.resolve(candidate, member, out);
                    }
                    self.stack.pop();
                    dedup_tail(out, start);
                    let produced = &out[start..];
                    if !produced.iter().any(|o| matches!(o, Outcome::Cycle(_))) {
                        self.finished.insert((candidate, name), produced.to_vec());
                    }
                }
            }
            return;
        }

        self.mark(scope, Outcome::Unknown(name.to_string()), out);
    }

    fn mark(&self, scope: &str, outcome: Outcome, out: &mut Vec<Outcome>) {
        let marker = outcome.to_string();
        self.observer.observe(&ResolveEvent::Unresolved {
            scope,
            category: self.category.as_str(),
            marker: &marker,
        });
        out.push(outcome);
    }
}

/// Drop repeats from `out[start..]`, keeping first occurrences in order.
fn dedup_tail(out: &mut Vec<Outcome>, start: usize) {
    let tail = out.split_off(start);
    let mut seen = HashSet::new();
    out.extend(tail.into_iter().filter(|outcome| seen.insert(outcome.clone())));
}
