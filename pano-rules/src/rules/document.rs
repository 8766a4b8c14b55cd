use serde::Serialize;

use crate::resolve::Outcome;

/// One flattened security rule, ready for bulk load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDocument {
    pub panorama_tenant: String,
    pub snapshot_date: String,
    pub device_group: String,
    pub device_group_path: Vec<String>,
    pub rulebase: String,
    pub rule_name: String,
    pub rule_uid: String,
    pub position: usize,
    pub action: String,
    pub disabled: bool,
    pub targets: Targets,
    pub orig: OrigSection,
    pub expanded: ExpandedSection,
    pub meta: Meta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Targets {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// References exactly as written in the rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrigSection {
    pub from_zones: Vec<String>,
    pub to_zones: Vec<String>,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub applications: Vec<String>,
    pub services: Vec<String>,
    pub users: Vec<String>,
    pub tags: Vec<String>,
    pub profiles: Profiles,
    pub comments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profiles {
    pub group: Option<String>,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpandedSection {
    pub from_zones: Vec<String>,
    pub to_zones: Vec<String>,
    pub src_addresses: Vec<String>,
    pub dst_addresses: Vec<String>,
    pub applications: Vec<String>,
    pub services: Vec<String>,
    pub ports: Vec<String>,
    pub users: Vec<String>,
    pub tags: Vec<String>,
}

impl ExpandedSection {
    /// Every resolved list, in field order.
    pub fn resolved_lists(&self) -> [&[String]; 6] {
        [
            &self.from_zones,
            &self.to_zones,
            &self.src_addresses,
            &self.dst_addresses,
            &self.applications,
            &self.services,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub has_dynamic_groups: bool,
    /// Dynamic group names with the `DAG:` prefix stripped.
    pub dynamic_groups_unresolved: Vec<String>,
    /// `UNKNOWN:` and `CYCLE:` markers joined by `"; "`.
    pub unresolved_notes: String,
}

impl Meta {
    pub fn from_expanded(expanded: &ExpandedSection) -> Self {
        let mut dynamic: Vec<String> = Vec::new();
        let mut notes: Vec<String> = Vec::new();

        for value in expanded.resolved_lists().into_iter().flatten() {
            match Outcome::parse(value) {
                Outcome::Dynamic(name) => {
                    if !dynamic.contains(&name) {
                        dynamic.push(name);
                    }
                }
                Outcome::Unknown(_) | Outcome::Cycle(_) => {
                    if !notes.contains(value) {
                        notes.push(value.clone());
                    }
                }
                Outcome::Value(_) => {}
            }
        }

        Self {
            has_dynamic_groups: !dynamic.is_empty(),
            dynamic_groups_unresolved: dynamic,
            unresolved_notes: notes.join("; "),
        }
    }
}

/// Deterministic document id: `{device_group}:{rulebase}:{position}:{rule_name}`
/// with every character outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn rule_uid(device_group: &str, rulebase: &str, position: usize, rule_name: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        sanitize_component(device_group),
        sanitize_component(rulebase),
        position,
        sanitize_component(rule_name)
    )
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{rule_uid, ExpandedSection, Meta};

    #[test]
    fn uid_replaces_unsafe_characters() {
        assert_eq!(
            rule_uid("DG 1", "pre-rules", 3, "allow web/ssl!"),
            "DG_1:pre-rules:3:allow_web_ssl_"
        );
        assert_eq!(rule_uid("dg", "rules", 1, "ünï"), "dg:rules:1:___");
    }

    #[test]
    fn uid_differs_by_position_rulebase_and_group() {
        let uids: BTreeSet<String> = [
            rule_uid("DG1", "pre-rules", 1, "same"),
            rule_uid("DG1", "pre-rules", 2, "same"),
            rule_uid("DG1", "rules", 1, "same"),
            rule_uid("DG1", "post-rules", 1, "same"),
            rule_uid("DG2", "pre-rules", 1, "same"),
        ]
        .into_iter()
        .collect();
        assert_eq!(uids.len(), 5);
    }

    #[test]
    fn meta_collects_dynamic_groups_and_notes() {
        let expanded = ExpandedSection {
            src_addresses: vec![
                "DAG:tagged".to_string(),
                "10.0.0.1".to_string(),
                "UNKNOWN:ghost".to_string(),
            ],
            dst_addresses: vec!["DAG:tagged".to_string(), "CYCLE:loop".to_string()],
            to_zones: vec!["UNKNOWN:ghost".to_string()],
            ..ExpandedSection::default()
        };
        let meta = Meta::from_expanded(&expanded);
        assert!(meta.has_dynamic_groups);
        assert_eq!(meta.dynamic_groups_unresolved, vec!["tagged"]);
        assert_eq!(meta.unresolved_notes, "UNKNOWN:ghost; CYCLE:loop");
    }

    #[test]
    fn meta_is_empty_for_clean_rules() {
        let expanded = ExpandedSection {
            src_addresses: vec!["any".to_string()],
            services: vec!["application-default".to_string()],
            ..ExpandedSection::default()
        };
        assert_eq!(Meta::from_expanded(&expanded), Meta::default());
    }
}
