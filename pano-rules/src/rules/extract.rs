//! Raw reference lists read from one `security/rules/entry` element.

use thiserror::Error;
use xml_tree_core::XmlNode;

use super::document::{Profiles, Targets};

pub const DEFAULT_ACTION: &str = "allow";

/// Rule fields exactly as written in the export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRule {
    pub name: String,
    pub from_zones: Vec<String>,
    pub to_zones: Vec<String>,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub applications: Vec<String>,
    pub services: Vec<String>,
    pub users: Vec<String>,
    pub tags: Vec<String>,
    pub profiles: Profiles,
    pub targets: Targets,
    pub description: String,
    pub action: String,
    pub disabled: bool,
}

/// Why a rule entry produced no document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("rule entry has no name attribute")]
    MissingName,
}

/// Read one rule entry. Only a missing or blank name is fatal for the rule;
/// every other element falls back to an empty list or its default.
pub fn extract_rule(entry: &XmlNode) -> Result<RawRule, SkipReason> {
    let name = entry.attr_or("name", "").trim();
    if name.is_empty() {
        return Err(SkipReason::MissingName);
    }

    Ok(RawRule {
        name: name.to_string(),
        from_zones: members(entry, "from"),
        to_zones: members(entry, "to"),
        sources: members(entry, "source"),
        destinations: members(entry, "destination"),
        applications: members(entry, "application"),
        services: members(entry, "service"),
        users: members(entry, "source-user"),
        tags: members(entry, "tag"),
        profiles: profiles(entry),
        targets: targets(entry),
        description: entry
            .get_child("description")
            .map(|node| node.text_or("").to_string())
            .unwrap_or_default(),
        action: entry
            .get_child("action")
            .map(|node| node.text_or(DEFAULT_ACTION))
            .unwrap_or(DEFAULT_ACTION)
            .to_string(),
        disabled: entry
            .get_child("disabled")
            .is_some_and(|node| parse_flag(node.text_or(""))),
    })
}

fn members(entry: &XmlNode, tag: &str) -> Vec<String> {
    entry
        .get_child(tag)
        .map(XmlNode::member_texts)
        .unwrap_or_default()
}

fn profiles(entry: &XmlNode) -> Profiles {
    let Some(setting) = entry.get_child("profile-setting") else {
        return Profiles::default();
    };
    let group = setting
        .get_child("group")
        .and_then(|group| group.member_texts().into_iter().next());
    let names = setting
        .get_child("profiles")
        .map(|profiles| {
            profiles
                .children
                .iter()
                .flat_map(XmlNode::member_texts)
                .collect()
        })
        .unwrap_or_default();
    Profiles { group, names }
}

/// `target/devices/entry@name`, sorted into `exclude` when `target/negate` is set.
fn targets(entry: &XmlNode) -> Targets {
    let Some(target) = entry.get_child("target") else {
        return Targets::default();
    };
    let devices: Vec<String> = target
        .find_all("devices/entry")
        .into_iter()
        .map(|device| device.attr_or("name", "").trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    let negate = target
        .get_child("negate")
        .is_some_and(|node| parse_flag(node.text_or("")));
    if negate {
        Targets {
            include: Vec::new(),
            exclude: devices,
        }
    } else {
        Targets {
            include: devices,
            exclude: Vec::new(),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "yes" | "true")
}
