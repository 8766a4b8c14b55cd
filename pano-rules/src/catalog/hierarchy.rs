//! Device-group hierarchy construction.
//!
//! Turns the declared `(name, parent)` pairs into [`DeviceGroup`] nodes with
//! children sets and ancestor paths.
//!
//! - A parent that is not itself a declared group is dropped (the group
//!   becomes a root) and a [`IssueKind::MissingParent`] issue is recorded.
//! - Paths are computed in document order and cached. A walk that reaches a
//!   group whose own walk is still in progress has found a loop: the group
//!   whose parent link closes the loop gets the path `[name]`, and every other
//!   member extends that cached path. Each group is walked at most once, so
//!   path computation is bounded by the number of groups.

use std::collections::{BTreeMap, BTreeSet};

use super::{CatalogIssue, DeviceGroup, IssueKind, ObjectCategory, SHARED};

/// Build the hierarchy table from declared groups in document order.
pub fn build_hierarchy(
    declared: &[(String, Option<String>)],
) -> (BTreeMap<String, DeviceGroup>, Vec<CatalogIssue>) {
    let mut issues = Vec::new();
    let names: BTreeSet<&str> = declared.iter().map(|(name, _)| name.as_str()).collect();

    let mut parents: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for (name, parent) in declared {
        if parents.contains_key(name.as_str()) {
            continue;
        }
        let parent = match parent.as_deref() {
            Some(p) if p == name.as_str() || p == SHARED => None,
            Some(p) if !names.contains(p) => {
                issues.push(CatalogIssue {
                    scope: name.clone(),
                    category: ObjectCategory::DeviceGroup,
                    name: name.clone(),
                    kind: IssueKind::MissingParent {
                        parent: p.to_string(),
                    },
                });
                None
            }
            other => other,
        };
        parents.insert(name.as_str(), parent);
    }

    let mut children: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for (name, parent) in &parents {
        if let Some(parent) = parent {
            children
                .entry(*parent)
                .or_default()
                .insert((*name).to_string());
        }
    }

    let mut paths: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, _) in declared {
        if let Some(revisited) = fill_paths(name, &parents, &mut paths) {
            issues.push(CatalogIssue {
                scope: revisited.closing.to_string(),
                category: ObjectCategory::DeviceGroup,
                name: revisited.closing.to_string(),
                kind: IssueKind::ParentCycle {
                    revisited: revisited.parent.to_string(),
                },
            });
        }
    }

    let mut groups = BTreeMap::new();
    for (name, parent) in &parents {
        groups.insert(
            (*name).to_string(),
            DeviceGroup {
                name: (*name).to_string(),
                parent: parent.map(ToOwned::to_owned),
                children: children.remove(name).unwrap_or_default(),
                path: paths.remove(name).unwrap_or_else(|| vec![(*name).to_string()]),
            },
        );
    }

    (groups, issues)
}

/// Parent link that closed a loop.
struct LoopClose<'a> {
    closing: &'a str,
    parent: &'a str,
}

/// Compute and cache the outermost-first path of `name` and of every
/// uncached ancestor on its chain.
fn fill_paths<'a>(
    name: &'a str,
    parents: &BTreeMap<&'a str, Option<&'a str>>,
    paths: &mut BTreeMap<&'a str, Vec<String>>,
) -> Option<LoopClose<'a>> {
    if paths.contains_key(name) {
        return None;
    }

    // Uncached chain, innermost first.
    let mut chain = vec![name];
    let mut in_progress: BTreeSet<&str> = BTreeSet::from([name]);
    let mut closed = None;
    let mut current = parents.get(name).copied().flatten();
    while let Some(parent) = current {
        if paths.contains_key(parent) {
            break;
        }
        if !in_progress.insert(parent) {
            let closing = chain[chain.len() - 1];
            paths.insert(closing, vec![closing.to_string()]);
            closed = Some(LoopClose { closing, parent });
            break;
        }
        chain.push(parent);
        current = parents.get(parent).copied().flatten();
    }

    for &node in chain.iter().rev() {
        if paths.contains_key(node) {
            continue;
        }
        let mut path = parents
            .get(node)
            .copied()
            .flatten()
            .and_then(|parent| paths.get(parent).cloned())
            .unwrap_or_default();
        path.push(node.to_string());
        paths.insert(node, path);
    }

    closed
}
